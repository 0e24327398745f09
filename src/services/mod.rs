mod content_fetcher;
pub mod topics;

pub use content_fetcher::{ContentExtractor, ExtractedPage};
