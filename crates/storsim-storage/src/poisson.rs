//! Probabilities of Poisson-distributed events.

/// Probability of exactly `n` events during `interval` at average event `rate`.
pub fn pn(rate: f64, interval: f64, n: u32) -> f64 {
    let expect = rate * interval;
    let mut p = (-expect).exp();
    for i in 1..=n {
        p *= expect / i as f64;
    }
    p
}

/// Probability of `n` or more events during `interval` at average event `rate`.
pub fn pn_plus(rate: f64, interval: f64, n: u32) -> f64 {
    1. - (0..n).map(|i| pn(rate, interval, i)).sum::<f64>()
}
