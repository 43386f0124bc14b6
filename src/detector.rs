/// Outcome of comparing a new observation against the last known price.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PriceDelta {
    pub change: Option<f64>,
    pub percent: Option<f64>,
}

/// Compares a newly observed price with the previous one.
///
/// The first observation has no basis for comparison and yields an empty
/// delta (the baseline record). A previous price of exactly zero leaves the
/// relative change undefined; the absolute change is still reported.
pub fn detect(previous: Option<f64>, current: f64) -> PriceDelta {
    match previous {
        None => PriceDelta {
            change: None,
            percent: None,
        },
        Some(prev) if prev == 0.0 => PriceDelta {
            change: Some(current),
            percent: None,
        },
        Some(prev) => {
            let change = current - prev;
            PriceDelta {
                change: Some(change),
                percent: Some(change / prev),
            }
        }
    }
}
