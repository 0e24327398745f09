mod publication;
mod summary;

pub use publication::{FeedItem, NewPublication, PublicationFilter, PublicationRecord};
pub use summary::SummaryStatus;
