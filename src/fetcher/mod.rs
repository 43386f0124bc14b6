// Fetcher module: retrieves product pages and extracts a numeric price.

pub mod http;
pub mod retry;
pub mod traits;

pub use http::PriceFetcher;
pub use retry::RetryPolicy;
pub use traits::PriceSource;
