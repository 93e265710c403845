//! Sidereal Error Stats - in-process error aggregation.
//!
//! Groups errors by a structural fingerprint and counts occurrences:
//! - **Encoders**: per-type functions registered up front, resolved by
//!   [`TypeId`](std::any::TypeId) regardless of `Box`/`Arc`/`Rc` wrapping.
//!   Error encoders also serve `Box<dyn Error>` and `Arc<dyn Error>` values
//!   holding that type; non-error field types use `set_value_encoder`
//! - **Visiting**: encoders render their fields through a [`Visitor`],
//!   recursing into nested encoders; parts are joined with `"/ "`
//! - **Counters**: one counter per fingerprint, readable as JSON and
//!   reportable as an [`ErrorReport`]
//!
//! ## Architecture
//!
//! ```text
//! log(&err) → registry[TypeId] → encoder(&T, &Visitor)
//!                                      ↓
//!                         visit!(v, field, field, ...) ─→ nested encoders
//!                                      ↓
//!                      counters["a/ b/ c"] += 1 → json() / err_and_reset()
//! ```
//!
//! ## Example
//!
//! ```
//! use sidereal_errorstats::{visit, ErrorStats, Visitor};
//!
//! #[derive(Debug, thiserror::Error)]
//! #[error("upstream {service} failed")]
//! struct Upstream {
//!     service: String,
//!     cause: Box<Timeout>,
//! }
//!
//! #[derive(Debug, thiserror::Error)]
//! #[error("timed out")]
//! struct Timeout {
//!     op: String,
//! }
//!
//! let stats = ErrorStats::new();
//! stats.set_encoder(|e: &Upstream, v: &Visitor<'_>| visit!(v, e.service, e.cause));
//! stats.set_encoder(|e: &Timeout, _: &Visitor<'_>| e.op.clone());
//!
//! stats.log(&Upstream {
//!     service: "billing".to_owned(),
//!     cause: Box::new(Timeout { op: "connect".to_owned() }),
//! });
//!
//! assert_eq!(stats.json(), r#"{"billing/ connect":1}"#);
//! assert!(stats.err_and_reset().is_err());
//! assert!(stats.err().is_ok());
//! ```

pub mod config;
mod encoder;
pub mod error;
mod reporter;
mod stats;
mod visit;

pub use config::StatsConfig;
pub use encoder::{EncoderRegistry, Part};
pub use error::{ErrorReport, Result, StatsError};
pub use reporter::{start_periodic_report, ReportHandle};
pub use stats::ErrorStats;
pub use visit::Visitor;
