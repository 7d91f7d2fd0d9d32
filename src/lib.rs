//! Insight: conversational dataset analysis client
//!
//! Walks a user from uploading a CSV dataset, through a short conversation
//! about what they want from it, to a single request against a remote
//! analysis service, then renders whatever comes back.
//!
//! # Core Concepts
//!
//! - **Intake**: the dataset and the goal, validated before anything is sent
//! - **Workflow**: a versioned state machine narrating progress stages around
//!   one gateway call
//! - **Result envelope**: the service's loosely typed answer, classified into a
//!   semantic kind and rendered by a kind-specific strategy
//! - **Continuity**: the last successful result survives restarts in a single
//!   named slot
//!
//! # Example
//!
//! ```
//! use insight::{classify, Renderer, ResultKind};
//! use serde_json::json;
//!
//! let envelope = classify(&json!({"result_type": "text", "data": "Revenue grew 4%"}));
//! assert_eq!(envelope.kind(), ResultKind::FreeText);
//! let view = Renderer::new("http://localhost:5000").render(&envelope);
//! assert!(view.to_string().contains("Revenue grew 4%"));
//! ```

pub mod config;
pub mod context;
pub mod continuity;
pub mod gateway;
pub mod intake;
pub mod result;
pub mod workflow;

pub use config::{Config, ConfigError};
pub use context::{AnalysisContext, Outcome};
pub use continuity::{ContinuityStore, MemoryStore, OpenStore, SqliteStore, StoreError};
pub use gateway::{AnalysisGateway, GatewayError, HttpGateway, MockGateway};
pub use intake::{AnalysisRequest, IntakeFile, ValidationError};
pub use result::{classify, Presentation, Renderer, ResultEnvelope, ResultKind, ResultView};
pub use workflow::{submit_direct, Phase, Workflow, WorkflowError, WorkflowState};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
