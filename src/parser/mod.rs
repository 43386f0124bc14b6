// Parser module: site-specific price extraction strategies.

pub mod strategies;

pub use strategies::{Strategy, extract_price, parse_price_text};
