pub mod fields;
pub mod page;
pub mod util;
