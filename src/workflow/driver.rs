//! Async driver for the workflow state machine
//!
//! Feeds events into [`WorkflowState::apply`] and carries out the effects it
//! returns: stage pauses through the [`Pacer`], the single gateway call, and
//! the delayed hand-off that writes the continuity slot.

use super::machine::{failure_message, Effect, Event, Transition, WorkflowError, WorkflowState};
use super::pacer::{Pacer, TokioPacer};
use crate::context::AnalysisContext;
use crate::continuity::ContinuityStore;
use crate::gateway::AnalysisGateway;
use crate::intake::{validate, IntakeFile, ValidationError};
use crate::result::classify;
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Delays used while narrating a cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timing {
    /// Pause between stage completions
    pub stage_interval: Duration,
    /// Pause between the final answer and the hand-off to the result view
    pub handoff_delay: Duration,
}

impl Default for Timing {
    fn default() -> Self {
        Self {
            stage_interval: Duration::from_millis(1500),
            handoff_delay: Duration::from_millis(2000),
        }
    }
}

/// Notified after every accepted transition.
pub trait WorkflowObserver: Send + Sync {
    fn on_transition(&self, state: &WorkflowState);
}

/// One conversation with the analysis service.
pub struct Workflow {
    state: WorkflowState,
    gateway: Arc<dyn AnalysisGateway>,
    pacer: Arc<dyn Pacer>,
    store: Option<Arc<dyn ContinuityStore>>,
    timing: Timing,
    observers: Vec<Arc<dyn WorkflowObserver>>,
}

impl Workflow {
    /// Wall-clock pacing, no continuity store.
    pub fn new(gateway: Arc<dyn AnalysisGateway>) -> Self {
        Self {
            state: WorkflowState::new(),
            gateway,
            pacer: Arc::new(TokioPacer),
            store: None,
            timing: Timing::default(),
            observers: Vec::new(),
        }
    }

    pub fn with_pacer(mut self, pacer: Arc<dyn Pacer>) -> Self {
        self.pacer = pacer;
        self
    }

    pub fn with_store(mut self, store: Arc<dyn ContinuityStore>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn with_timing(mut self, timing: Timing) -> Self {
        self.timing = timing;
        self
    }

    pub fn with_observer(mut self, observer: Arc<dyn WorkflowObserver>) -> Self {
        self.observers.push(observer);
        self
    }

    pub fn state(&self) -> &WorkflowState {
        &self.state
    }

    pub fn accept_file(&mut self, file: IntakeFile) -> Result<(), WorkflowError> {
        self.step(Event::FileAccepted(file))?;
        Ok(())
    }

    pub fn go_back(&mut self) -> Result<(), WorkflowError> {
        self.step(Event::WentBack)?;
        Ok(())
    }

    /// Run one full dispatch cycle for `message`.
    ///
    /// Returns the context handed to the result view. A failed gateway call
    /// still returns `Ok` with a failed context; `Err` means the message was
    /// rejected and nothing was sent.
    pub async fn submit(
        &mut self,
        message: impl Into<String>,
    ) -> Result<AnalysisContext, WorkflowError> {
        let mut pending: VecDeque<Effect> =
            self.step(Event::MessageSubmitted(message.into()))?.into();
        let cycle = Uuid::new_v4();
        info!(%cycle, "analysis cycle started");

        while let Some(effect) = pending.pop_front() {
            match effect {
                Effect::StagePause => {
                    self.pacer.pause(self.timing.stage_interval).await;
                    pending.extend(self.step(Event::StageElapsed)?);
                }
                Effect::Dispatch(request) => {
                    debug!(%cycle, file = request.file_name(), "dispatching request");
                    let outcome = self.gateway.submit(request).await;
                    match &outcome {
                        Ok(_) => info!(%cycle, "analysis service answered"),
                        Err(e) => warn!(%cycle, error = %e, "analysis request failed"),
                    }
                    pending.extend(self.step(Event::GatewayResolved(outcome))?);
                }
                Effect::Handoff => {
                    self.pacer.pause(self.timing.handoff_delay).await;
                    if let (Some(store), Some(context)) = (&self.store, self.state.context()) {
                        context.persist(store.as_ref());
                    }
                    debug!(%cycle, "handed off to result view");
                }
            }
        }

        self.state
            .context()
            .cloned()
            .ok_or(WorkflowError::InvalidPhase {
                action: "finish a cycle",
                phase: self.state.phase(),
            })
    }

    fn step(&mut self, event: Event) -> Result<Vec<Effect>, WorkflowError> {
        let Transition { state, effects } = self.state.apply(event)?;
        debug!(
            version = state.version(),
            phase = %state.phase(),
            "workflow transition"
        );
        self.state = state;
        for observer in &self.observers {
            observer.on_transition(&self.state);
        }
        Ok(effects)
    }
}

/// Single-form submission: one gateway call, no conversation or stages.
pub async fn submit_direct(
    gateway: &dyn AnalysisGateway,
    file: Option<&IntakeFile>,
    goal: &str,
) -> Result<AnalysisContext, ValidationError> {
    let request = validate(file, goal)?;
    let file_name = request.file_name().to_string();
    let goal = request.goal().to_string();
    info!(file = %file_name, "direct submission");

    Ok(match gateway.submit(request).await {
        Ok(raw) => AnalysisContext::succeeded(file_name, goal, classify(&raw)),
        Err(e) => {
            warn!(error = %e, "direct submission failed");
            AnalysisContext::failed(file_name, goal, failure_message(&e))
        }
    })
}
