//! Shared fixtures for workflow and gateway integration tests

#![allow(dead_code)]

use async_trait::async_trait;
use insight::gateway::{AnalysisGateway, GatewayError};
use insight::intake::{AnalysisRequest, IntakeFile};
use insight::workflow::{InstantPacer, Workflow};
use serde_json::{json, Value};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

/// Small CSV resembling the sales dataset used across scenarios.
pub const SALES_CSV: &str = "\
month,region,revenue
2024-01,north,1200.5
2024-02,north,1310.25
2024-03,south,980.0
";

pub fn sales_file() -> IntakeFile {
    IntakeFile::new("sales.csv", Some("text/csv"), SALES_CSV.as_bytes().to_vec())
}

/// `n` forecast rows with a stable key order: quarter, forecast, lower, upper.
pub fn forecast_rows(n: usize) -> Value {
    Value::Array(
        (0..n)
            .map(|i| {
                json!({
                    "quarter": format!("Q{}", i + 1),
                    "forecast": 1000.0 + i as f64 * 12.5,
                    "lower": 900.1,
                    "upper": 1100.9
                })
            })
            .collect(),
    )
}

/// Envelope as the service sends it: table rows encoded as a JSON string.
pub fn table_envelope(rows: usize) -> Value {
    json!({
        "result_type": "table",
        "data": forecast_rows(rows).to_string(),
        "workflow_summary": "Revenue is projected to rise next quarter."
    })
}

/// Gateway answering from a queue of outcomes, one per call.
pub struct ScriptedGateway {
    outcomes: Mutex<VecDeque<Result<Value, GatewayError>>>,
    requests: Mutex<Vec<AnalysisRequest>>,
}

impl ScriptedGateway {
    pub fn new(outcomes: impl IntoIterator<Item = Result<Value, GatewayError>>) -> Self {
        Self {
            outcomes: Mutex::new(outcomes.into_iter().collect()),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn requests(&self) -> Vec<AnalysisRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl AnalysisGateway for ScriptedGateway {
    async fn submit(&self, request: AnalysisRequest) -> Result<Value, GatewayError> {
        self.requests.lock().unwrap().push(request);
        self.outcomes
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(GatewayError::Network("script exhausted".into())))
    }
}

/// Workflow with instant pacing and the sales file already accepted.
pub fn ready_workflow(gateway: Arc<dyn AnalysisGateway>) -> (Workflow, Arc<InstantPacer>) {
    let pacer = Arc::new(InstantPacer::new());
    let mut workflow = Workflow::new(gateway).with_pacer(pacer.clone());
    workflow.accept_file(sales_file()).unwrap();
    (workflow, pacer)
}
