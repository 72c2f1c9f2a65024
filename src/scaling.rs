//! Conversions of resource shares and utilizations between machine frames.
//!
//! A share (or a utilization) is a fraction of a machine's *effective* capacity, that is its capacity
//! times its utilization threshold. Rescaling keeps the absolute amount of resource invariant, so
//! scaling from frame A to frame B and back yields the original value.

/// Rescales a resource share from the `src` machine frame to the `dst` machine frame.
///
/// `share' = share * (src_capacity * src_threshold) / (dst_capacity * dst_threshold)`
pub fn scale_resource_share(
    src_capacity: f64,
    src_threshold: f64,
    dst_capacity: f64,
    dst_threshold: f64,
    share: f64,
) -> f64 {
    share * (src_capacity * src_threshold) / (dst_capacity * dst_threshold)
}

/// Same as [`scale_resource_share`] for callers tracking raw capacities only (thresholds equal to 1).
pub fn scale_resource_share_by_capacity(src_capacity: f64, dst_capacity: f64, share: f64) -> f64 {
    scale_resource_share(src_capacity, 1.0, dst_capacity, 1.0, share)
}

/// Moves a measured utilization from the `src` machine frame into the `dst` machine frame.
///
/// The result never exceeds 1, i.e. it never implies more than the whole threshold-limited
/// capacity of the destination machine.
pub fn scale_resource_utilization(
    src_capacity: f64,
    src_threshold: f64,
    dst_capacity: f64,
    dst_threshold: f64,
    utilization: f64,
) -> f64 {
    scale_resource_share(src_capacity, src_threshold, dst_capacity, dst_threshold, utilization).clamp(0.0, 1.0)
}
