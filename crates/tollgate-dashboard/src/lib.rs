//! tollgate-dashboard — composes the operator dashboard snapshot.
//!
//! Pure, on-demand read aggregation over the metric store, the time-series
//! buckets, and the event/error logs. The snapshot carries pre-computed
//! ratios and chart-ready arrays so consumers stay simple. No caching here;
//! the API layer holds a composed snapshot for a short TTL.

pub mod composer;
pub mod views;

pub use composer::{DashboardSources, compose};
pub use views::{ChatRatios, DashboardSnapshot, LatencySummary, SeriesArrays, Totals, percent};
