//! Queue length approximation.

/// Returns the average queue depth of a resource busy a `rho` fraction of the time.
///
/// Uses the M/M/1 estimate `rho / (1 - rho)` bounded by `max_depth`: a resource at or above full utilization
/// cannot hold more requests than are outstanding, so it reports `max_depth`.
pub fn queue_length(rho: f64, max_depth: f64) -> f64 {
    if rho >= 1. {
        return max_depth;
    }
    let avg = rho.max(0.) / (1. - rho);
    avg.min(max_depth)
}
