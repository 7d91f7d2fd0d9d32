//! Conversational analysis workflow
//!
//! The workflow walks a user from dataset intake through a goal conversation
//! to one analysis dispatch:
//!
//! ```text
//! intake ──file──▶ conversing ──message──▶ dispatching ──ok──▶ completed
//!                       ▲                        │
//!                       └──── failed ◀───error───┘
//! ```
//!
//! # Architecture
//!
//! - **machine**: `WorkflowState` plus a pure `apply(event)` returning the
//!   next state and the effects to run
//! - **driver**: `Workflow`, which runs effects against a gateway, a pacer and
//!   an optional continuity store
//! - **stage** / **transcript**: the progress board and the ordered message log

mod driver;
mod machine;
mod pacer;
mod stage;
mod transcript;

pub use driver::{submit_direct, Timing, Workflow, WorkflowObserver};
pub use machine::{Effect, Event, Phase, Transition, WorkflowError, WorkflowState};
pub use pacer::{InstantPacer, Pacer, TokioPacer};
pub use stage::{
    initial_stages, running_index, ProgressStage, StageError, StageStatus, STAGE_LABELS,
};
pub use transcript::{EntryId, Role, Transcript, TranscriptEntry};
