use scraper::{ElementRef, Selector};

#[inline]
pub(crate) fn normalize_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Whitespace-normalized text, with blank values treated as absent.
pub fn clean_text(raw: Option<&str>) -> Option<String> {
    raw.map(|s| normalize_whitespace(&s.replace('\u{A0}', " ")))
        .filter(|s| !s.is_empty())
}

pub(crate) fn select_text(element: ElementRef<'_>, selector: &Selector) -> Option<String> {
    element
        .select(selector)
        .next()
        .map(|el| el.text().collect::<String>())
}

pub(crate) fn select_attr(
    element: ElementRef<'_>,
    selector: &Selector,
    attr: &str,
) -> Option<String> {
    element
        .select(selector)
        .next()
        .and_then(|el| el.value().attr(attr))
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_text_is_absent() {
        assert_eq!(clean_text(None), None);
        assert_eq!(clean_text(Some("   \n\t ")), None);
        assert_eq!(clean_text(Some("\u{A0}")), None);
    }

    #[test]
    fn inner_whitespace_collapses() {
        assert_eq!(
            clean_text(Some("  Тіні  забутих\n предків ")),
            Some("Тіні забутих предків".to_string())
        );
    }
}
