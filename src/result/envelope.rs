//! Classified result envelope types

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

/// Semantic kind of an analysis result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ResultKind {
    Chart,
    Table,
    RankedTable,
    FreeText,
    CompositeWorkflow,
    Raw,
}

impl ResultKind {
    /// Map a backend discriminator to a kind.
    ///
    /// Accepts both the names the analysis service emits (`plot`,
    /// `leaderboard`, `text`, `workflow`) and the canonical kebab-case names.
    /// Returns `None` for anything unrecognized.
    pub fn from_discriminator(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "chart" | "plot" => Some(Self::Chart),
            "table" => Some(Self::Table),
            "ranked-table" | "leaderboard" => Some(Self::RankedTable),
            "free-text" | "text" => Some(Self::FreeText),
            "composite-workflow" | "workflow" => Some(Self::CompositeWorkflow),
            "raw" => Some(Self::Raw),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Chart => "chart",
            Self::Table => "table",
            Self::RankedTable => "ranked-table",
            Self::FreeText => "free-text",
            Self::CompositeWorkflow => "composite-workflow",
            Self::Raw => "raw",
        }
    }

    /// Kinds whose payload is an encoded structure run through the decode chain.
    pub fn is_structured(&self) -> bool {
        matches!(self, Self::Chart | Self::Table | Self::RankedTable)
    }
}

impl fmt::Display for ResultKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Plot data: a list of traces plus a layout object.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct PlotFigure {
    pub data: Vec<Value>,
    #[serde(default)]
    pub layout: Map<String, Value>,
}

impl PlotFigure {
    pub fn trace_count(&self) -> usize {
        self.data.len()
    }
}

/// A homogeneous sequence of row objects. Columns follow the first row's key order.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct TableData {
    pub columns: Vec<String>,
    pub rows: Vec<Map<String, Value>>,
}

impl TableData {
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// Summary of a multi-agent workflow run.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct WorkflowSummary {
    pub summary: Option<String>,
    pub model_results: Option<Value>,
}

/// A field that may hold an image reference, inline markup, chart data or text.
#[derive(Debug, Clone, PartialEq)]
pub enum Visual {
    /// File name or URL of an image asset
    Image { reference: String },
    /// Inline HTML document or fragment
    Markup(String),
    /// Decoded plot data
    Chart(PlotFigure),
    /// Literal display text
    Text(String),
    /// Structure that matched nothing; dumped as-is
    Raw(Value),
}

/// Decoded payload, one variant per display strategy.
#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    Chart(PlotFigure),
    Table(TableData),
    Text(String),
    Workflow(WorkflowSummary),
    Raw(Value),
}

/// A backend result after classification. Immutable once built.
#[derive(Debug, Clone, PartialEq)]
pub struct ResultEnvelope {
    pub(crate) kind: ResultKind,
    pub(crate) payload: Payload,
    pub(crate) summary: Option<String>,
    pub(crate) visualization: Option<Visual>,
    pub(crate) artifact_path: Option<String>,
    pub(crate) diagnostic: Option<String>,
    pub(crate) raw: Value,
}

impl ResultEnvelope {
    pub fn kind(&self) -> ResultKind {
        self.kind
    }

    pub fn payload(&self) -> &Payload {
        &self.payload
    }

    /// Backend-supplied narrative summary, if any.
    pub fn summary(&self) -> Option<&str> {
        self.summary.as_deref()
    }

    /// Auxiliary visualization attached to the data object.
    pub fn visualization(&self) -> Option<&Visual> {
        self.visualization.as_ref()
    }

    /// Server-side path of a downloadable model artifact.
    pub fn artifact_path(&self) -> Option<&str> {
        self.artifact_path.as_deref()
    }

    /// Why the payload fell back to raw display, for diagnostics only.
    pub fn diagnostic(&self) -> Option<&str> {
        self.diagnostic.as_deref()
    }

    /// The envelope exactly as received.
    pub fn raw(&self) -> &Value {
        &self.raw
    }
}
