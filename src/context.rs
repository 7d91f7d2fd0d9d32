//! Analysis context handed from the workflow to the result view

use crate::continuity::ContinuityStore;
use crate::result::{classify_text, ResultEnvelope};
use tracing::{debug, warn};

/// File name used when a context is rebuilt from the continuity store.
pub const REHYDRATED_FILE_NAME: &str = "uploaded_file.csv";
/// Goal text used when a context is rebuilt from the continuity store.
pub const REHYDRATED_GOAL: &str = "Analysis completed";

/// How an analysis cycle ended. Exactly one of envelope or error message.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    Succeeded(ResultEnvelope),
    Failed(String),
}

/// Everything the result view needs. Read-only once built.
#[derive(Debug, Clone, PartialEq)]
pub struct AnalysisContext {
    file_name: String,
    goal: String,
    outcome: Outcome,
}

impl AnalysisContext {
    pub fn succeeded(
        file_name: impl Into<String>,
        goal: impl Into<String>,
        envelope: ResultEnvelope,
    ) -> Self {
        Self {
            file_name: file_name.into(),
            goal: goal.into(),
            outcome: Outcome::Succeeded(envelope),
        }
    }

    pub fn failed(
        file_name: impl Into<String>,
        goal: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            file_name: file_name.into(),
            goal: goal.into(),
            outcome: Outcome::Failed(message.into()),
        }
    }

    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    pub fn goal(&self) -> &str {
        &self.goal
    }

    pub fn outcome(&self) -> &Outcome {
        &self.outcome
    }

    pub fn is_success(&self) -> bool {
        matches!(self.outcome, Outcome::Succeeded(_))
    }

    pub fn envelope(&self) -> Option<&ResultEnvelope> {
        match &self.outcome {
            Outcome::Succeeded(envelope) => Some(envelope),
            Outcome::Failed(_) => None,
        }
    }

    pub fn error_message(&self) -> Option<&str> {
        match &self.outcome {
            Outcome::Succeeded(_) => None,
            Outcome::Failed(message) => Some(message),
        }
    }

    /// Rebuild a context from the continuity slot.
    ///
    /// Returns `None` when the slot is empty or unreadable. A slot holding
    /// text that is not JSON still yields a (raw) context.
    pub fn rehydrate(store: &dyn ContinuityStore) -> Option<Self> {
        let record = match store.load() {
            Ok(Some(record)) => record,
            Ok(None) => {
                debug!("continuity slot is empty");
                return None;
            }
            Err(e) => {
                warn!(error = %e, "failed to read continuity slot");
                return None;
            }
        };
        let envelope = classify_text(&record);
        Some(Self::succeeded(REHYDRATED_FILE_NAME, REHYDRATED_GOAL, envelope))
    }

    /// Prefer the in-memory context; fall back to the continuity slot.
    pub fn resolve(
        in_memory: Option<AnalysisContext>,
        store: Option<&dyn ContinuityStore>,
    ) -> Option<Self> {
        in_memory.or_else(|| store.and_then(|s| Self::rehydrate(s)))
    }

    /// Write the raw envelope to the continuity slot. Best-effort.
    pub fn persist(&self, store: &dyn ContinuityStore) {
        let Some(envelope) = self.envelope() else {
            return;
        };
        let record = envelope.raw().to_string();
        match store.save(&record) {
            Ok(()) => debug!(bytes = record.len(), "saved result to continuity slot"),
            Err(e) => warn!(error = %e, "failed to save result to continuity slot"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::continuity::MemoryStore;
    use crate::result::{classify, ResultKind};
    use serde_json::json;

    #[test]
    fn context_holds_exactly_one_outcome() {
        let ok = AnalysisContext::succeeded(
            "sales.csv",
            "forecast",
            classify(&json!({"result_type": "text", "data": "fine"})),
        );
        assert!(ok.is_success());
        assert!(ok.envelope().is_some());
        assert!(ok.error_message().is_none());

        let failed = AnalysisContext::failed("sales.csv", "forecast", "boom");
        assert!(!failed.is_success());
        assert!(failed.envelope().is_none());
        assert_eq!(failed.error_message(), Some("boom"));
    }

    #[test]
    fn rehydrates_from_populated_slot() {
        let store = MemoryStore::with_record(r#"{"result_type":"text","data":"stored"}"#);
        let context = AnalysisContext::rehydrate(&store).unwrap();
        assert_eq!(context.file_name(), REHYDRATED_FILE_NAME);
        assert_eq!(context.goal(), REHYDRATED_GOAL);
        assert_eq!(context.envelope().unwrap().kind(), ResultKind::FreeText);
    }

    #[test]
    fn empty_slot_yields_nothing() {
        let store = MemoryStore::new();
        assert!(AnalysisContext::rehydrate(&store).is_none());
        assert!(AnalysisContext::resolve(None, Some(&store as &dyn ContinuityStore)).is_none());
        assert!(AnalysisContext::resolve(None, None).is_none());
    }

    #[test]
    fn in_memory_context_wins_over_slot() {
        let store = MemoryStore::with_record(r#"{"result_type":"text","data":"stale"}"#);
        let fresh = AnalysisContext::failed("new.csv", "goal", "boom");
        let resolved =
            AnalysisContext::resolve(Some(fresh.clone()), Some(&store as &dyn ContinuityStore))
                .unwrap();
        assert_eq!(resolved, fresh);
    }

    #[test]
    fn persist_writes_raw_envelope_only_on_success() {
        let store = MemoryStore::new();
        AnalysisContext::failed("a.csv", "g", "boom").persist(&store);
        assert_eq!(store.load().unwrap(), None);

        let raw = json!({"result_type": "text", "data": "kept"});
        AnalysisContext::succeeded("a.csv", "g", classify(&raw)).persist(&store);
        let stored: serde_json::Value =
            serde_json::from_str(&store.load().unwrap().unwrap()).unwrap();
        assert_eq!(stored, raw);
    }
}
