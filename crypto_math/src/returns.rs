//! Return calculations over price series

/// Day-over-day percentage change, aligned with the input.
///
/// The first element is always `None`. An element is also `None` when the
/// previous price is zero or either price is not finite.
pub fn pct_change(prices: &[f64]) -> Vec<Option<f64>> {
    let mut out = Vec::with_capacity(prices.len());
    if prices.is_empty() {
        return out;
    }

    out.push(None);
    for w in prices.windows(2) {
        let (prev, curr) = (w[0], w[1]);
        if prev == 0.0 || !prev.is_finite() || !curr.is_finite() {
            out.push(None);
        } else {
            out.push(Some(curr / prev - 1.0));
        }
    }

    out
}

/// Percentage changes with the leading (and any undefined) entries removed
pub fn simple_returns(prices: &[f64]) -> Vec<f64> {
    pct_change(prices).into_iter().flatten().collect()
}

/// Natural-log returns, `ln(p[t] / p[t-1])`, skipping non-positive prices
pub fn log_returns(prices: &[f64]) -> Vec<f64> {
    prices
        .windows(2)
        .filter(|w| w[0] > 0.0 && w[1] > 0.0)
        .map(|w| (w[1] / w[0]).ln())
        .collect()
}
