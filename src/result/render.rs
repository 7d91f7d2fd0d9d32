//! Renderer dispatch: one display strategy per classified kind

use super::envelope::{Payload, PlotFigure, ResultEnvelope, ResultKind, TableData, Visual};
use crate::context::{AnalysisContext, Outcome};
use crate::gateway::visualization_url;
use serde_json::{json, Map, Value};
use std::fmt;

/// Rows shown by the plain table strategy before truncating.
pub const TABLE_PREVIEW_ROWS: usize = 10;

const TABLE_DECIMALS: usize = 2;
const RANKED_DECIMALS: usize = 4;

const TRANSPARENT: &str = "rgba(0,0,0,0)";
const FOREGROUND: &str = "#ffffff";
const GRID_COLOR: &str = "#374151";

/// A tabular grid of formatted cells.
#[derive(Debug, Clone, PartialEq)]
pub struct Grid {
    pub title: &'static str,
    pub columns: Vec<String>,
    pub rows: Vec<Vec<String>>,
    /// Row count before truncation
    pub total_rows: usize,
}

impl Grid {
    /// Rows left out of the grid.
    pub fn hidden_rows(&self) -> usize {
        self.total_rows.saturating_sub(self.rows.len())
    }

    /// Footer shown when the grid was truncated.
    pub fn footer(&self) -> Option<String> {
        match self.hidden_rows() {
            0 => None,
            hidden => Some(format!(
                "Showing first {} rows of {} total rows ({} more)",
                self.rows.len(),
                self.total_rows,
                hidden
            )),
        }
    }
}

/// Primary display for a result.
#[derive(Debug, Clone, PartialEq)]
pub enum Presentation {
    /// Plot with dark-theme overrides already applied
    Chart(PlotFigure),
    Grid(Grid),
    /// Preformatted text block
    Text(String),
    Workflow {
        summary: String,
        details: Option<String>,
    },
    /// Formatted dump of an unrecognized structure
    Dump {
        body: String,
        diagnostic: Option<String>,
    },
}

/// Secondary visualization block.
#[derive(Debug, Clone, PartialEq)]
pub enum VisualPresentation {
    Image { url: String },
    Markup(String),
    Chart(PlotFigure),
    Text(String),
}

/// Everything shown for one successful result.
#[derive(Debug, Clone, PartialEq)]
pub struct ResultView {
    pub kind: ResultKind,
    pub primary: Presentation,
    pub visualization: Option<VisualPresentation>,
    pub artifact: Option<String>,
}

/// The result screen for an analysis context.
#[derive(Debug, Clone, PartialEq)]
pub enum ContextView {
    Success {
        file_name: String,
        goal: String,
        result: ResultView,
    },
    Failure {
        file_name: String,
        goal: String,
        message: String,
    },
}

/// Maps classified envelopes to presentations.
#[derive(Debug, Clone)]
pub struct Renderer {
    asset_base: String,
}

impl Renderer {
    /// `asset_base` is the backend URL image references resolve against.
    pub fn new(asset_base: impl Into<String>) -> Self {
        Self {
            asset_base: asset_base.into(),
        }
    }

    pub fn render(&self, envelope: &ResultEnvelope) -> ResultView {
        let primary = match (envelope.kind(), envelope.payload()) {
            (ResultKind::Chart, Payload::Chart(figure)) => Presentation::Chart(dark_theme(figure)),
            (ResultKind::Table, Payload::Table(table)) => Presentation::Grid(grid(
                "Data Results",
                table,
                Some(TABLE_PREVIEW_ROWS),
                TABLE_DECIMALS,
            )),
            (ResultKind::RankedTable, Payload::Table(table)) => {
                Presentation::Grid(grid("Model Leaderboard", table, None, RANKED_DECIMALS))
            }
            (ResultKind::FreeText, Payload::Text(text)) => Presentation::Text(text.clone()),
            (ResultKind::CompositeWorkflow, Payload::Workflow(workflow)) => Presentation::Workflow {
                summary: workflow.summary.clone().unwrap_or_default(),
                details: workflow.model_results.as_ref().map(pretty),
            },
            (_, payload) => Presentation::Dump {
                body: dump(payload),
                diagnostic: envelope.diagnostic().map(str::to_string),
            },
        };

        ResultView {
            kind: envelope.kind(),
            primary,
            visualization: envelope.visualization().map(|v| self.render_visual(v)),
            artifact: envelope.artifact_path().map(str::to_string),
        }
    }

    pub fn render_context(&self, context: &AnalysisContext) -> ContextView {
        let file_name = context.file_name().to_string();
        let goal = context.goal().to_string();
        match context.outcome() {
            Outcome::Succeeded(envelope) => ContextView::Success {
                file_name,
                goal,
                result: self.render(envelope),
            },
            Outcome::Failed(message) => ContextView::Failure {
                file_name,
                goal,
                message: message.clone(),
            },
        }
    }

    fn render_visual(&self, visual: &Visual) -> VisualPresentation {
        match visual {
            Visual::Image { reference } => VisualPresentation::Image {
                url: visualization_url(&self.asset_base, reference),
            },
            Visual::Markup(markup) => VisualPresentation::Markup(markup.clone()),
            Visual::Chart(figure) => VisualPresentation::Chart(dark_theme(figure)),
            Visual::Text(text) => VisualPresentation::Text(text.clone()),
            Visual::Raw(value) => VisualPresentation::Text(pretty(value)),
        }
    }
}

/// Layout overrides that keep a figure legible on a dark background.
pub fn dark_theme(figure: &PlotFigure) -> PlotFigure {
    let mut layout = figure.layout.clone();
    layout.insert("paper_bgcolor".into(), json!(TRANSPARENT));
    layout.insert("plot_bgcolor".into(), json!(TRANSPARENT));
    merge_key(&mut layout, "font", "color", FOREGROUND);
    merge_key(&mut layout, "xaxis", "gridcolor", GRID_COLOR);
    merge_key(&mut layout, "yaxis", "gridcolor", GRID_COLOR);
    PlotFigure {
        data: figure.data.clone(),
        layout,
    }
}

fn merge_key(layout: &mut Map<String, Value>, section: &str, key: &str, value: &str) {
    let entry = layout
        .entry(section.to_string())
        .or_insert_with(|| Value::Object(Map::new()));
    if !entry.is_object() {
        *entry = Value::Object(Map::new());
    }
    if let Value::Object(map) = entry {
        map.insert(key.to_string(), json!(value));
    }
}

fn grid(title: &'static str, table: &TableData, limit: Option<usize>, decimals: usize) -> Grid {
    let shown = limit.unwrap_or(table.len()).min(table.len());
    let rows = table.rows[..shown]
        .iter()
        .map(|row| {
            table
                .columns
                .iter()
                .map(|col| format_cell(row.get(col), decimals))
                .collect()
        })
        .collect();
    Grid {
        title,
        columns: table.columns.clone(),
        rows,
        total_rows: table.len(),
    }
}

/// Numbers get fixed decimals; everything else renders as its text.
pub fn format_cell(value: Option<&Value>, decimals: usize) -> String {
    match value {
        None => String::new(),
        Some(Value::Number(n)) => match n.as_f64() {
            Some(f) => format!("{:.*}", decimals, f),
            None => n.to_string(),
        },
        Some(Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
    }
}

fn pretty(value: &Value) -> String {
    serde_json::to_string_pretty(value).unwrap_or_else(|_| value.to_string())
}

fn dump(payload: &Payload) -> String {
    match payload {
        Payload::Raw(Value::String(text)) | Payload::Text(text) => text.clone(),
        Payload::Raw(value) => pretty(value),
        Payload::Chart(figure) => serde_json::to_string_pretty(figure).unwrap_or_default(),
        Payload::Table(table) => pretty(&Value::Array(
            table.rows.iter().cloned().map(Value::Object).collect(),
        )),
        Payload::Workflow(workflow) => workflow
            .model_results
            .as_ref()
            .map(pretty)
            .unwrap_or_else(|| workflow.summary.clone().unwrap_or_default()),
    }
}

// ---------------------------------------------------------------------------
// Terminal output
// ---------------------------------------------------------------------------

impl fmt::Display for Grid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{}", self.title)?;
        if self.columns.is_empty() {
            return writeln!(f, "(no rows)");
        }
        let widths: Vec<usize> = self
            .columns
            .iter()
            .enumerate()
            .map(|(i, col)| {
                self.rows
                    .iter()
                    .map(|row| row[i].chars().count())
                    .chain(std::iter::once(col.chars().count()))
                    .max()
                    .unwrap_or(0)
            })
            .collect();

        let line = |cells: &[String]| {
            cells
                .iter()
                .zip(&widths)
                .map(|(cell, width)| format!("{:<width$}", cell, width = *width))
                .collect::<Vec<_>>()
                .join("  ")
        };

        writeln!(f, "{}", line(self.columns.as_slice()).trim_end())?;
        let rule = widths.iter().sum::<usize>() + 2 * widths.len().saturating_sub(1);
        writeln!(f, "{}", "-".repeat(rule))?;
        for row in &self.rows {
            writeln!(f, "{}", line(row.as_slice()).trim_end())?;
        }
        if let Some(footer) = self.footer() {
            writeln!(f, "{}", footer)?;
        }
        Ok(())
    }
}

fn write_figure(f: &mut fmt::Formatter<'_>, title: &str, figure: &PlotFigure) -> fmt::Result {
    let heading = figure
        .layout
        .get("title")
        .and_then(|t| t.as_str().or_else(|| t.get("text").and_then(Value::as_str)));
    match heading {
        Some(text) => writeln!(f, "{}: {}", title, text)?,
        None => writeln!(f, "{}", title)?,
    }
    for (i, trace) in figure.data.iter().enumerate() {
        let kind = trace.get("type").and_then(Value::as_str).unwrap_or("scatter");
        let points = trace
            .get("x")
            .or_else(|| trace.get("y"))
            .or_else(|| trace.get("values"))
            .and_then(Value::as_array)
            .map(Vec::len)
            .unwrap_or(0);
        match trace.get("name").and_then(Value::as_str) {
            Some(name) => {
                writeln!(f, "  trace {}: {} '{}' ({} points)", i + 1, kind, name, points)?
            }
            None => writeln!(f, "  trace {}: {} ({} points)", i + 1, kind, points)?,
        }
    }
    Ok(())
}

impl fmt::Display for Presentation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Presentation::Chart(figure) => write_figure(f, "Data Visualization", figure),
            Presentation::Grid(grid) => write!(f, "{}", grid),
            Presentation::Text(text) => {
                writeln!(f, "Analysis Results")?;
                writeln!(f, "{}", text)
            }
            Presentation::Workflow { summary, details } => {
                writeln!(f, "Workflow Summary")?;
                writeln!(f, "{}", summary)?;
                if let Some(details) = details {
                    writeln!(f)?;
                    writeln!(f, "Model Results")?;
                    writeln!(f, "{}", details)?;
                }
                Ok(())
            }
            Presentation::Dump { body, diagnostic } => {
                writeln!(f, "Result")?;
                writeln!(f, "{}", body)?;
                if let Some(diagnostic) = diagnostic {
                    writeln!(f)?;
                    writeln!(f, "[diagnostic] {}", diagnostic)?;
                }
                Ok(())
            }
        }
    }
}

impl fmt::Display for VisualPresentation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VisualPresentation::Image { url } => writeln!(f, "Visualization image: {}", url),
            VisualPresentation::Markup(markup) => {
                writeln!(f, "Visualization (HTML, {} bytes)", markup.len())
            }
            VisualPresentation::Chart(figure) => write_figure(f, "Visualization", figure),
            VisualPresentation::Text(text) => {
                writeln!(f, "Visualization")?;
                writeln!(f, "{}", text)
            }
        }
    }
}

impl fmt::Display for ResultView {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.primary)?;
        if let Some(visual) = &self.visualization {
            writeln!(f)?;
            write!(f, "{}", visual)?;
        }
        if let Some(artifact) = &self.artifact {
            writeln!(f)?;
            writeln!(f, "Model artifact: {}", artifact)?;
        }
        Ok(())
    }
}

impl fmt::Display for ContextView {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ContextView::Success {
                file_name,
                goal,
                result,
            } => {
                writeln!(f, "Analysis Complete ({})", file_name)?;
                writeln!(f, "Your query: \"{}\"", goal)?;
                writeln!(f)?;
                write!(f, "{}", result)
            }
            ContextView::Failure {
                file_name,
                goal,
                message,
            } => {
                writeln!(f, "Processing Error ({})", file_name)?;
                writeln!(f, "Your query: \"{}\"", goal)?;
                writeln!(f, "{}", message)?;
                writeln!(f, "Run the analysis again to retry.")
            }
        }
    }
}
