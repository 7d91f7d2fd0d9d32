//! Result classification and rendering
//!
//! The analysis service answers with a loosely typed envelope:
//!
//! ```json
//! {"result_type": "table", "data": "[{...}, ...]", "workflow_summary": "..."}
//! ```
//!
//! # Architecture
//!
//! - **classify**: decides the semantic [`ResultKind`] and decodes the payload
//!   through ordered fallback chains. It never fails: anything undecodable
//!   becomes a `raw` envelope carrying a diagnostic.
//! - **render**: maps each kind to one display strategy (chart, grid, ranked
//!   grid, text, workflow summary, raw dump).

mod classify;
mod envelope;
mod render;

pub use classify::{classify, classify_text, classify_visual, DecodeError};
pub use envelope::{
    Payload, PlotFigure, ResultEnvelope, ResultKind, TableData, Visual, WorkflowSummary,
};
pub use render::{
    dark_theme, format_cell, ContextView, Grid, Presentation, Renderer, ResultView,
    VisualPresentation, TABLE_PREVIEW_ROWS,
};
