//! The deletion pipeline.
//!
//! ```text
//! Enumerator -> plan -> AuthorResolver -> Transactor -> BackoffGate
//!                                                    -> ProgressRecorder
//! ```
//!
//! [`SweepRunner`] wires the stages together for one target space.

mod author;
mod enumerator;
mod gate;
mod ops;
mod planner;
mod progress;
mod runner;
mod transactor;

pub use author::{AuthorResolver, ResolvedAuthor, synthesized_author_id};
pub use enumerator::{Caps, Enumerator, Snapshot, TypeFilter, is_wallet_address};
pub use gate::{BackoffGate, RecordingSleeper, Sleeper, ThreadSleeper};
pub use ops::{GraphOps, Op, OpValue, OpsBuilder};
pub use planner::{Plan, plan};
pub use progress::ProgressRecorder;
pub use runner::{PassReport, Preview, StopReason, SweepOptions, SweepReport, SweepRunner};
pub use transactor::{BatchOutcome, BatchReport, FailureStage, Transactor, TxState};
