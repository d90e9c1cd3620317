use crate::config;
use crate::error::{AppError, AppResult};
use crate::model::common::ListKind;
use crate::model::record::RawRecord;
use crate::transform::fields::{self, RawItemBlock};
use crate::transform::util::{select_attr, select_text};
use scraper::{ElementRef, Html};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ListTotals {
    pub pages: u32,
    pub items: u64,
}

/// Reads the page selector and item counter from the first page of a list.
pub fn extract_totals(html: &str, kind: ListKind) -> AppResult<ListTotals> {
    let document = Html::parse_document(html);

    if document.select(&config::SEL_PAGES_SELECT).next().is_none() {
        return Err(AppError::parse(kind, "page selector control is missing"));
    }
    let page_links = document.select(&config::SEL_PAGE_LINKS).count();
    let pages = u32::try_from(page_links.max(1))
        .map_err(|_| AppError::parse(kind, format!("implausible page count {}", page_links)))?;

    let counter_text = document
        .select(&config::SEL_ITEM_COUNT)
        .next()
        .map(|el| el.text().collect::<String>())
        .ok_or_else(|| AppError::parse(kind, "item counter control is missing"))?;

    let digits: String = config::RE_DIGITS
        .find_iter(&counter_text)
        .map(|m| m.as_str())
        .collect();
    let items = digits.parse::<u64>().map_err(|_| {
        AppError::parse(
            kind,
            format!("item counter has no number: '{}'", counter_text.trim()),
        )
    })?;

    Ok(ListTotals { pages, items })
}

/// Item blocks in document order, using the selector of the given list kind.
pub fn extract_item_blocks(html: &str, kind: ListKind) -> Vec<RawItemBlock> {
    let document = Html::parse_document(html);
    document
        .select(config::item_selector(kind))
        .map(|element| read_block(element, kind))
        .collect()
}

pub fn parse_page_records(html: &str, kind: ListKind) -> Vec<RawRecord> {
    extract_item_blocks(html, kind)
        .iter()
        .map(fields::parse_item)
        .collect()
}

fn read_block(element: ElementRef<'_>, kind: ListKind) -> RawItemBlock {
    let personal_rating_class = match kind {
        ListKind::Completed => element
            .select(&config::SEL_PERSONAL_RATING)
            .next()
            .map(|el| el.value().attr("class").unwrap_or_default().to_string()),
        ListKind::Pending => None,
    };

    RawItemBlock {
        title: select_text(element, &config::SEL_TITLE),
        original_title: select_text(element, &config::SEL_ORIGINAL_TITLE),
        extra_info: select_text(element, &config::SEL_EXTRA_INFO),
        director: select_text(element, &config::SEL_DIRECTOR),
        source_rating: select_text(element, &config::SEL_SOURCE_RATING),
        external_rating: select_text(element, &config::SEL_EXTERNAL_RATING),
        image_url: select_attr(element, &config::SEL_IMAGE, "src"),
        detail_link: select_attr(element, &config::SEL_DETAIL_LINK, "href"),
        personal_rating_class,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const FIRST_PAGE: &str = r#"
        <html><body>
          <div class="filmList__count">Фільмів: 1 234</div>
          <div id="pagesSelect"><ul>
            <li><a href="?page=1">1</a></li>
            <li><a href="?page=2">2</a></li>
            <li><a href="?page=3">3</a></li>
          </ul></div>
        </body></html>"#;

    const RATED_PAGE: &str = r#"
        <html><body>
          <div class="item user-status-list status_rated">
            <a class="filmList__item-title" href="/67530/">
              <span class="movie-title__text">Тіні забутих предків</span>
            </a>
            <span class="item__name-orig">Tini zabutykh predkiv, 1965</span>
            <span class="filmList__extra-info">драма, 1 год 37 хв</span>
            <span class="filmList__extra-info-director">реж. <a href="/p/1/">Сергій Параджанов</a></span>
            <div class="rating_kinorium"><span class="rating__value">8.1</span></div>
            <div class="rating_imdb"><span class="value">8.0</span></div>
            <div class="poster"><img src="https://img.example/1.jpg"></div>
            <span class="myRating number-9"></span>
          </div>
          <div class="item user-status-list status_rated">
            <span class="movie-title__text">Без оцінки</span>
            <span class="myRating"></span>
          </div>
          <div class="item user-status-list status_future">
            <span class="movie-title__text">Wrong list</span>
          </div>
        </body></html>"#;

    #[test]
    fn totals_from_first_page() {
        let totals = extract_totals(FIRST_PAGE, ListKind::Pending).unwrap();
        assert_eq!(totals, ListTotals { pages: 3, items: 1234 });
    }

    #[test]
    fn empty_page_selector_means_one_page() {
        let html = r#"<div class="filmList__count">7</div><div id="pagesSelect"><ul></ul></div>"#;
        let totals = extract_totals(html, ListKind::Completed).unwrap();
        assert_eq!(totals, ListTotals { pages: 1, items: 7 });
    }

    #[test]
    fn missing_controls_are_parse_errors() {
        let no_pager = r#"<div class="filmList__count">7</div>"#;
        assert!(matches!(
            extract_totals(no_pager, ListKind::Pending),
            Err(AppError::ParseError { kind: ListKind::Pending, .. })
        ));

        let no_counter = r#"<div id="pagesSelect"><ul></ul></div>"#;
        assert!(matches!(
            extract_totals(no_counter, ListKind::Completed),
            Err(AppError::ParseError { .. })
        ));

        let empty_counter =
            r#"<div class="filmList__count">—</div><div id="pagesSelect"></div>"#;
        assert!(extract_totals(empty_counter, ListKind::Pending).is_err());
    }

    #[test]
    fn rated_page_uses_its_own_selector() {
        let records = parse_page_records(RATED_PAGE, ListKind::Completed);
        assert_eq!(records.len(), 2);

        let first = &records[0];
        assert_eq!(first.title.as_deref(), Some("Тіні забутих предків"));
        assert_eq!(first.release_year, Some(1965));
        assert_eq!(first.director.as_deref(), Some("Сергій Параджанов"));
        assert_eq!(first.external_rating, Some(8.0));
        assert_eq!(first.image_url.as_deref(), Some("https://img.example/1.jpg"));
        assert_eq!(first.source_link.as_deref(), Some("/67530/"));
        assert_eq!(first.personal_rating, Some(9));

        assert_eq!(records[1].title.as_deref(), Some("Без оцінки"));
        assert_eq!(records[1].personal_rating, None);
    }

    #[test]
    fn pending_page_ignores_rating_markup() {
        let html = r#"
            <div class="item user-status-list status_future">
              <span class="movie-title__text">Later</span>
              <span class="myRating number-5"></span>
            </div>"#;
        let records = parse_page_records(html, ListKind::Pending);
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].personal_rating, None);
    }
}
