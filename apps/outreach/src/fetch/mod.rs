// Job page fetching and visible-text extraction.

pub mod fetcher;
pub mod html;
