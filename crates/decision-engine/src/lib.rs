//! Alert Decision Engine.
//!
//! One ordered pipeline per ticker per scan tick: dip-metric selection →
//! tier classification → zone classification → quality gates → scored
//! confirmations → dedupe. Short-circuits on the first failing stage and
//! always returns a `Decision` with ordered reasons, accepted or not.

pub mod config;
pub mod confirmation;
pub mod dedupe;
pub mod pipeline;
pub mod tier;
pub mod zone;

pub use config::ThresholdConfig;
pub use confirmation::{check_quality_gates, score_confirmations};
pub use dedupe::{DedupeDecision, DedupeEngine};
pub use pipeline::{DecisionPipeline, ScanAudit};
pub use tier::classify_tier;
pub use zone::{classify_zone, ZoneCall};
