pub mod catalog;
pub mod common;
pub mod record;
