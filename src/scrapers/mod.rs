pub mod extractor;
pub mod fallback;
pub mod fetcher;
pub mod http;
pub mod traits;
pub mod types;

pub use extractor::extract_listings;
pub use fallback::ArtifactStore;
pub use fetcher::Fetcher;
pub use http::HttpTransport;
pub use traits::{Session, Sleeper, TokioSleeper, Transport};
pub use types::{BackoffPolicy, DataSource, FetchParams, FetchReport, Page, SessionProfile};
