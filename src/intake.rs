//! Intake validation for uploaded datasets and analysis goals
//!
//! Nothing reaches the gateway without passing through here. The checks are
//! pure: a file must be present and declared as CSV, and the goal must contain
//! something other than whitespace.

use std::path::Path;
use thiserror::Error;

/// The single tabular media type the backend accepts.
pub const ACCEPTED_MEDIA_TYPE: &str = "text/csv";

/// Reasons an intake is rejected before any network activity.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("no file selected")]
    MissingFile,

    #[error("'{name}' is not a CSV file (declared as {declared})")]
    UnsupportedKind { name: String, declared: String },

    #[error("describe what you want to do with the data")]
    EmptyGoal,

    #[error("cannot read '{path}': {reason}")]
    Unreadable { path: String, reason: String },
}

/// An uploaded file: a named binary blob with a declared media type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IntakeFile {
    pub name: String,
    pub media_type: Option<String>,
    pub bytes: Vec<u8>,
}

impl IntakeFile {
    pub fn new(name: impl Into<String>, media_type: Option<&str>, bytes: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            media_type: media_type.map(str::to_string),
            bytes,
        }
    }

    /// Read a file from disk, declaring its media type from the extension.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, ValidationError> {
        let path = path.as_ref();
        let bytes = std::fs::read(path).map_err(|e| ValidationError::Unreadable {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| path.display().to_string());
        let media_type = media_type_for(&name);
        Ok(Self::new(name, media_type, bytes))
    }

    pub fn size(&self) -> usize {
        self.bytes.len()
    }

    /// Size for display, e.g. `12.5 KB`.
    pub fn display_size(&self) -> String {
        format!("{:.1} KB", self.size() as f64 / 1024.0)
    }
}

/// Media type implied by a file name's extension.
pub fn media_type_for(name: &str) -> Option<&'static str> {
    let ext = Path::new(name).extension()?.to_str()?.to_ascii_lowercase();
    match ext.as_str() {
        "csv" => Some("text/csv"),
        "json" => Some("application/json"),
        "xlsx" => Some("application/vnd.openxmlformats-officedocument.spreadsheetml.sheet"),
        "xls" => Some("application/vnd.ms-excel"),
        "txt" => Some("text/plain"),
        _ => None,
    }
}

/// A validated, immutable request. Consumed once by the gateway.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnalysisRequest {
    file: IntakeFile,
    goal: String,
}

impl AnalysisRequest {
    pub fn file(&self) -> &IntakeFile {
        &self.file
    }

    pub fn goal(&self) -> &str {
        &self.goal
    }

    pub fn file_name(&self) -> &str {
        &self.file.name
    }

    pub fn into_parts(self) -> (IntakeFile, String) {
        (self.file, self.goal)
    }
}

/// Check that a file is present and declared as the accepted tabular format.
pub fn validate_file(file: Option<&IntakeFile>) -> Result<&IntakeFile, ValidationError> {
    let file = file.ok_or(ValidationError::MissingFile)?;
    match file.media_type.as_deref() {
        Some(ACCEPTED_MEDIA_TYPE) => Ok(file),
        other => Err(ValidationError::UnsupportedKind {
            name: file.name.clone(),
            declared: other.unwrap_or("unknown").to_string(),
        }),
    }
}

/// Validate a file and goal together, producing the request the gateway sends.
pub fn validate(file: Option<&IntakeFile>, goal: &str) -> Result<AnalysisRequest, ValidationError> {
    let file = validate_file(file)?;
    if goal.trim().is_empty() {
        return Err(ValidationError::EmptyGoal);
    }
    Ok(AnalysisRequest {
        file: file.clone(),
        goal: goal.to_string(),
    })
}

/// Canned goals offered to users who are unsure what to ask for.
pub const SAMPLE_GOALS: [&str; 5] = [
    "Predict customer churn based on usage patterns and demographics",
    "Forecast sales for the next quarter using historical data",
    "Classify customer feedback sentiment and identify key themes",
    "Detect anomalies in transaction data for fraud prevention",
    "Segment customers based on purchasing behavior",
];
