//! Result classification
//!
//! Turns an untyped backend envelope into a [`ResultEnvelope`]. Every decode
//! is an ordered chain of typed probes, each returning `Some` on a match; the
//! first match wins and the last link always succeeds. Decode failures never
//! escape: they are recorded as a diagnostic and the payload degrades to raw
//! display.

use super::envelope::{
    Payload, PlotFigure, ResultEnvelope, ResultKind, TableData, Visual, WorkflowSummary,
};
use serde_json::{Map, Value};
use thiserror::Error;
use tracing::debug;

/// Why a payload could not be decoded into any known shape.
#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("payload is not valid JSON: {0}")]
    Syntax(#[from] serde_json::Error),

    #[error("payload is neither plot data nor a sequence of row objects")]
    UnknownShape,

    #[error("workflow payload is not an object")]
    NotAnObject,

    #[error("envelope is not a JSON object")]
    NotAnEnvelope,

    #[error("unrecognized result kind '{0}'")]
    UnknownKind(String),

    #[error("envelope has no result kind")]
    MissingKind,
}

/// Discriminator field names, in lookup order.
const KIND_FIELDS: [&str; 2] = ["result_type", "kind"];

/// Classify a raw envelope as received from the analysis service.
pub fn classify(raw: &Value) -> ResultEnvelope {
    let Some(envelope) = raw.as_object() else {
        return raw_envelope(raw, DecodeError::NotAnEnvelope);
    };

    let declared = KIND_FIELDS
        .iter()
        .find_map(|field| envelope.get(*field).and_then(Value::as_str));
    let kind = match declared {
        Some(name) => match ResultKind::from_discriminator(name) {
            Some(kind) => kind,
            None => return raw_envelope(raw, DecodeError::UnknownKind(name.to_string())),
        },
        None => return raw_envelope(raw, DecodeError::MissingKind),
    };

    let data = envelope.get("data").unwrap_or(&Value::Null);
    let data_object = data.as_object();

    let summary = envelope
        .get("workflow_summary")
        .and_then(Value::as_str)
        .or_else(|| data_object.and_then(|d| d.get("workflow_summary")).and_then(Value::as_str))
        .map(str::to_string);
    let visualization = data_object
        .and_then(|d| d.get("visualization"))
        .filter(|v| !v.is_null())
        .map(classify_visual);
    let artifact_path = data_object
        .and_then(|d| d.get("model_download_path"))
        .and_then(Value::as_str)
        .filter(|p| !p.is_empty())
        .map(str::to_string);

    let (kind, payload, diagnostic) = match kind {
        k if k.is_structured() => decode_structured(data, k),
        ResultKind::FreeText => (ResultKind::FreeText, Payload::Text(literal_text(data)), None),
        ResultKind::CompositeWorkflow => decode_workflow(data),
        _ => (ResultKind::Raw, Payload::Raw(data.clone()), None),
    };

    ResultEnvelope {
        kind,
        payload,
        summary,
        visualization,
        artifact_path,
        diagnostic,
        raw: raw.clone(),
    }
}

/// Classify text persisted by the continuity store.
///
/// Text that is not JSON is kept as a raw string envelope rather than rejected.
pub fn classify_text(text: &str) -> ResultEnvelope {
    match serde_json::from_str::<Value>(text) {
        Ok(value) => classify(&value),
        Err(e) => raw_envelope(&Value::String(text.to_string()), DecodeError::Syntax(e)),
    }
}

type Decoded = (ResultKind, Payload, Option<String>);

/// Decode chain for encoded payloads: plot data, then rows, then literal.
fn decode_structured(data: &Value, declared: ResultKind) -> Decoded {
    let decoded = match decode_embedded(data) {
        Ok(value) => value,
        Err(e) => return degrade(data, e),
    };

    if let Some(figure) = probe_chart(&decoded) {
        return (ResultKind::Chart, Payload::Chart(figure), None);
    }
    if let Some(table) = probe_rows(&decoded) {
        let kind = match declared {
            ResultKind::RankedTable => ResultKind::RankedTable,
            _ => ResultKind::Table,
        };
        return (kind, Payload::Table(table), None);
    }
    degrade(data, DecodeError::UnknownShape)
}

fn decode_workflow(data: &Value) -> Decoded {
    match data.as_object() {
        Some(object) => {
            let summary = WorkflowSummary {
                summary: object
                    .get("workflow_summary")
                    .and_then(Value::as_str)
                    .map(str::to_string),
                model_results: object.get("model_results").filter(|v| !v.is_null()).cloned(),
            };
            (ResultKind::CompositeWorkflow, Payload::Workflow(summary), None)
        }
        None => degrade(data, DecodeError::NotAnObject),
    }
}

/// The payload is kept for literal display; the error becomes a diagnostic.
fn degrade(data: &Value, error: DecodeError) -> Decoded {
    debug!(%error, "payload fell back to raw display");
    (ResultKind::Raw, Payload::Raw(data.clone()), Some(error.to_string()))
}

fn raw_envelope(raw: &Value, error: DecodeError) -> ResultEnvelope {
    debug!(%error, "envelope classified as raw");
    ResultEnvelope {
        kind: ResultKind::Raw,
        payload: Payload::Raw(raw.clone()),
        summary: None,
        visualization: None,
        artifact_path: None,
        diagnostic: Some(error.to_string()),
        raw: raw.clone(),
    }
}

/// Structured payloads arrive either JSON-encoded in a string or inline.
fn decode_embedded(data: &Value) -> Result<Value, DecodeError> {
    match data {
        Value::String(text) => Ok(serde_json::from_str(text)?),
        other => Ok(other.clone()),
    }
}

fn probe_chart(value: &Value) -> Option<PlotFigure> {
    let object = value.as_object()?;
    let data = object.get("data")?.as_array()?.clone();
    let layout = match object.get("layout") {
        Some(Value::Object(layout)) => layout.clone(),
        _ => Map::new(),
    };
    Some(PlotFigure { data, layout })
}

fn probe_rows(value: &Value) -> Option<TableData> {
    let items = value.as_array()?;
    let rows = items
        .iter()
        .map(|item| item.as_object().cloned())
        .collect::<Option<Vec<_>>>()?;
    let columns = rows
        .first()
        .map(|row| row.keys().cloned().collect())
        .unwrap_or_default();
    Some(TableData { columns, rows })
}

fn literal_text(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        Value::Null => String::new(),
        other => serde_json::to_string_pretty(other).unwrap_or_else(|_| other.to_string()),
    }
}

type VisualProbe = fn(&str) -> Option<Visual>;

/// Probes for string visualizations, tried left to right.
const VISUAL_PROBES: [VisualProbe; 3] = [sniff_image, sniff_markup, parse_chart];

const IMAGE_EXTENSIONS: [&str; 4] = [".png", ".jpg", ".jpeg", ".svg"];

/// Classify a field that may be an image reference, markup, chart data or text.
pub fn classify_visual(value: &Value) -> Visual {
    match value {
        Value::String(text) => VISUAL_PROBES
            .iter()
            .find_map(|probe| probe(text))
            .unwrap_or_else(|| Visual::Text(text.clone())),
        Value::Object(_) => probe_chart(value)
            .map(Visual::Chart)
            .unwrap_or_else(|| Visual::Raw(value.clone())),
        other => Visual::Raw(other.clone()),
    }
}

fn sniff_image(text: &str) -> Option<Visual> {
    let lower = text.to_ascii_lowercase();
    IMAGE_EXTENSIONS
        .iter()
        .any(|ext| lower.contains(ext))
        .then(|| Visual::Image {
            reference: text.trim().to_string(),
        })
}

fn sniff_markup(text: &str) -> Option<Visual> {
    let lower = text.to_ascii_lowercase();
    (lower.contains("<html") || lower.contains("<div")).then(|| Visual::Markup(text.to_string()))
}

fn parse_chart(text: &str) -> Option<Visual> {
    let value: Value = serde_json::from_str(text).ok()?;
    probe_chart(&value).map(Visual::Chart)
}
