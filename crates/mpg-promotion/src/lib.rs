//! mpg-promotion
//!
//! Champion/challenger promotion gate: resolve the newest registered
//! version, evaluate it against absolute metric gates and the current
//! champion, then repoint the serving alias (or tag the rejection) and signal
//! the serving process to reload.
//!
//! [`evaluate`] is a pure function; everything with side effects goes
//! through the [`mpg_registry::ModelRegistry`] and
//! [`mpg_notify::ReloadNotifier`] traits.

mod apply;
mod audit;
mod error;
mod evaluator;
mod pipeline;
mod resolver;
mod types;

pub use apply::{AliasManager, TAG_DECISION, TAG_DECISION_REASONS, TAG_REJECTED_REASON};
pub use audit::{append_decision_event, append_failure_event, AUDIT_TOPIC};
pub use error::PromotionError;
pub use evaluator::{candidate_metrics, evaluate, load_champion, resolve_champion, Champion};
pub use pipeline::PromotionGate;
pub use resolver::resolve_candidate;
pub use types::{
    write_promotion_report_json, Decision, Gate, GateCheck, GateSet, Outcome, PromotionReport,
    ReasonCode, RunStatus, VersionMetrics,
};
