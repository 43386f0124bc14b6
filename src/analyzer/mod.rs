// Analyzer module: derived classifications over a product's price history.

pub mod price_analysis;

pub use price_analysis::analyze;
