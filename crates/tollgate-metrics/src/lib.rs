//! tollgate-metrics — in-process observability state for Tollgate.
//!
//! Everything here is purely in memory and lost on restart. All structures
//! are internally synchronized and safe to share behind an `Arc`.
//!
//! # Architecture
//!
//! ```text
//! MetricStore
//!   ├── increment() / set_gauge()      ← named counters and gauges
//!   ├── counter_within()               ← rolling totals from hourly slots
//!   ├── observe()                      ← capped (timestamp, value) histogram
//!   └── percentile() / percentiles()   ← windowed nearest-rank estimate
//!
//! TimeSeriesAggregator
//!   └── record_request()               ← 10 s buckets, one hour retained
//!
//! EventLog / ErrorLog
//!   └── bounded FIFO, read newest-first
//!
//! Prometheus exposition
//!   └── render_prometheus() → text/plain for /metrics
//! ```

pub mod bounded;
pub mod logs;
pub mod names;
pub mod prometheus;
pub mod rolling;
pub mod store;
pub mod timeseries;

pub use logs::{ErrorLog, Event, EventLog, RecentError};
pub use prometheus::render_prometheus;
pub use rolling::HourlyCounters;
pub use store::{MetricStore, Percentiles, Sample};
pub use timeseries::{TimeSeriesAggregator, TimeSeriesBucket};
