//! # ferry-sync
//!
//! Source collection and output reconciliation.
//!
//! Call [`pipeline::make`] to collect and compile a project, or
//! [`pipeline::gen`] to generate, reconcile and overlay an output directory.
//! The building blocks ([`collect_sources`], [`reconcile()`],
//! [`apply_overlay`]) are public for callers that sequence things themselves.

pub mod collector;
pub mod config;
pub mod error;
pub mod overlay;
pub mod pipeline;
pub mod reconcile;
pub mod walk;

pub use collector::collect_sources;
pub use config::SyncOptions;
pub use error::{FailureKind, SyncError};
pub use overlay::apply_overlay;
pub use pipeline::{GenOutcome, GenRequest};
pub use reconcile::{reconcile, Change, ChangeKind, ProgressSender, ReconcilePlan, ReconcileReport};
