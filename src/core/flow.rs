//! Daily fund-flow computation over an aligned series
//!
//! Daily flow is the day-over-day change in shares outstanding valued at the
//! same-day close, a proxy for creation/redemption activity. Rolling sums are
//! over trading observations, not calendar days.

use crate::core::series::AlignedPoint;
use chrono::NaiveDate;

/// Trailing window sizes in trading observations.
pub const WEEKLY_WINDOW: usize = 5;
pub const MONTHLY_WINDOW: usize = 21;
pub const THREE_MONTH_WINDOW: usize = 63;
pub const SIX_MONTH_WINDOW: usize = 126;

/// One computed flow observation. Values carry full precision; rounding
/// happens only when the report is assembled.
#[derive(Debug, Clone, PartialEq)]
pub struct FlowPoint {
    pub date: NaiveDate,
    pub close: f64,
    pub shares: i64,
    pub daily: f64,
    pub weekly: f64,
    pub monthly: f64,
    pub three_month: f64,
    pub six_month: f64,
    pub cumulative: f64,
}

/// Computes the flow sequence for an aligned series.
///
/// The first aligned row has no prior share count and therefore no defined
/// daily flow; it is dropped, so the result has `aligned.len() - 1` rows (or
/// none for series shorter than two rows). Rolling sums use however many
/// observations are available when a full window has not yet accumulated.
pub fn compute_flows(aligned: &[AlignedPoint]) -> Vec<FlowPoint> {
    if aligned.len() < 2 {
        return Vec::new();
    }

    let daily: Vec<f64> = aligned
        .windows(2)
        .map(|w| (w[1].shares - w[0].shares) as f64 * w[1].close)
        .collect();

    // prefix[i] = sum of daily[0..i]; windowed and cumulative sums are exact
    // prefix differences, so they cannot drift from an independent summation.
    let mut prefix = Vec::with_capacity(daily.len() + 1);
    prefix.push(0.0);
    for flow in &daily {
        prefix.push(prefix.last().unwrap() + flow);
    }

    let window_sum = |i: usize, window: usize| {
        let start = (i + 1).saturating_sub(window);
        prefix[i + 1] - prefix[start]
    };

    daily
        .iter()
        .enumerate()
        .map(|(i, flow)| {
            let point = &aligned[i + 1];
            FlowPoint {
                date: point.date,
                close: point.close,
                shares: point.shares,
                daily: *flow,
                weekly: window_sum(i, WEEKLY_WINDOW),
                monthly: window_sum(i, MONTHLY_WINDOW),
                three_month: window_sum(i, THREE_MONTH_WINDOW),
                six_month: window_sum(i, SIX_MONTH_WINDOW),
                cumulative: prefix[i + 1],
            }
        })
        .collect()
}
