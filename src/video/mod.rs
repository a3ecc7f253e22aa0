pub mod youtube;

pub use youtube::{MediaFetcher, ensure_uploadable};
