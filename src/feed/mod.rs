mod fetcher;
mod listing;

pub use fetcher::FeedFetcher;
