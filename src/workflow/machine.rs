//! Workflow state machine
//!
//! `WorkflowState::apply` is a pure transition function: it takes an event,
//! leaves the current state untouched and returns the next state plus the
//! effects the driver must perform (pauses, the gateway call, the hand-off).
//! A rejected event returns an error and no new state.

use super::stage::{initial_stages, running_index, ProgressStage, StageError};
use super::transcript::{EntryId, Role, Transcript, TranscriptEntry};
use crate::context::AnalysisContext;
use crate::gateway::GatewayError;
use crate::intake::{validate, validate_file, AnalysisRequest, IntakeFile, ValidationError};
use crate::result::classify;
use chrono::Utc;
use serde_json::Value;
use std::fmt;
use thiserror::Error;

pub(crate) const ACKNOWLEDGEMENT: &str =
    "Got it. I'll work through your request step by step...";
pub(crate) const GENERIC_SUCCESS: &str = "Analysis completed successfully!";
pub(crate) const GENERIC_FAILURE: &str = "Something went wrong while processing your request. \
Please try again, or contact support if the problem keeps happening.";

fn welcome(file_name: &str) -> String {
    format!(
        "Received \"{}\". Tell me what you'd like to do with this data, for example:\n\n\
         • Clean and analyze the data\n\
         • Create visualizations\n\
         • Build predictive models\n\
         • Generate insights and recommendations",
        file_name
    )
}

fn success(summary: Option<&str>) -> String {
    format!(
        "Your analysis is complete. Here's what I found:\n\n{}\n\n\
         The detailed results, visualizations and any trained models are ready to view.",
        summary.unwrap_or(GENERIC_SUCCESS)
    )
}

fn stage_complete(label: &str) -> String {
    format!("{} - Complete", label)
}

/// Where the conversation is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Phase {
    /// Waiting for a dataset
    Intake,
    /// Dataset accepted; waiting for the user's goal
    Conversing,
    /// Stages are narrating and the request is being processed
    Dispatching,
    Completed,
    /// The last dispatch failed; a new submission retries
    Failed,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Phase::Intake => "intake",
            Phase::Conversing => "conversing",
            Phase::Dispatching => "dispatching",
            Phase::Completed => "completed",
            Phase::Failed => "failed",
        })
    }
}

/// Inputs to the state machine.
#[derive(Debug, Clone)]
pub enum Event {
    /// The user picked a dataset and moved on to the conversation
    FileAccepted(IntakeFile),
    /// The user sent a message describing the goal
    MessageSubmitted(String),
    /// A stage pause elapsed
    StageElapsed,
    /// The gateway call finished
    GatewayResolved(Result<Value, GatewayError>),
    /// The user went back to the intake step
    WentBack,
}

/// Work the driver performs after a transition.
#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    /// Wait one stage interval, then send `StageElapsed`
    StagePause,
    /// Send the request, then send `GatewayResolved`
    Dispatch(AnalysisRequest),
    /// Wait the hand-off delay, then hand the context to the result view
    Handoff,
}

#[derive(Debug, Error)]
pub enum WorkflowError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("an analysis is already in progress")]
    Busy,

    #[error("cannot {action} while {phase}")]
    InvalidPhase { action: &'static str, phase: Phase },

    #[error(transparent)]
    Stage(#[from] StageError),
}

/// The next state and what to do about it.
#[derive(Debug, Clone)]
pub struct Transition {
    pub state: WorkflowState,
    pub effects: Vec<Effect>,
}

/// Owned, versioned workflow state.
#[derive(Debug, Clone, PartialEq)]
pub struct WorkflowState {
    version: u64,
    phase: Phase,
    file: Option<IntakeFile>,
    goal: Option<String>,
    in_flight: Option<AnalysisRequest>,
    transcript: Transcript,
    stages: Vec<ProgressStage>,
    context: Option<AnalysisContext>,
    next_entry: u64,
}

impl Default for WorkflowState {
    fn default() -> Self {
        Self::new()
    }
}

impl WorkflowState {
    pub fn new() -> Self {
        Self {
            version: 0,
            phase: Phase::Intake,
            file: None,
            goal: None,
            in_flight: None,
            transcript: Transcript::new(),
            stages: Vec::new(),
            context: None,
            next_entry: 1,
        }
    }

    /// Incremented by every accepted event.
    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn file(&self) -> Option<&IntakeFile> {
        self.file.as_ref()
    }

    pub fn transcript(&self) -> &Transcript {
        &self.transcript
    }

    pub fn stages(&self) -> &[ProgressStage] {
        &self.stages
    }

    /// Set once a dispatch cycle terminates.
    pub fn context(&self) -> Option<&AnalysisContext> {
        self.context.as_ref()
    }

    pub fn is_dispatching(&self) -> bool {
        self.phase == Phase::Dispatching
    }

    /// Compute the transition for `event` without touching `self`.
    pub fn apply(&self, event: Event) -> Result<Transition, WorkflowError> {
        let mut next = self.clone();
        let effects = match event {
            Event::FileAccepted(file) => next.accept_file(file)?,
            Event::MessageSubmitted(message) => next.submit(message)?,
            Event::StageElapsed => next.advance_stage()?,
            Event::GatewayResolved(outcome) => next.resolve(outcome)?,
            Event::WentBack => next.go_back()?,
        };
        next.version += 1;
        Ok(Transition {
            state: next,
            effects,
        })
    }

    fn say(&mut self, role: Role, text: impl Into<String>) -> EntryId {
        let id = EntryId::new(self.next_entry);
        self.next_entry += 1;
        self.transcript.append(TranscriptEntry {
            id,
            role,
            text: text.into(),
            created_at: Utc::now(),
        });
        id
    }

    fn invalid(&self, action: &'static str) -> WorkflowError {
        WorkflowError::InvalidPhase {
            action,
            phase: self.phase,
        }
    }

    fn accept_file(&mut self, file: IntakeFile) -> Result<Vec<Effect>, WorkflowError> {
        if self.phase != Phase::Intake {
            return Err(self.invalid("accept a file"));
        }
        validate_file(Some(&file))?;
        self.say(Role::System, welcome(&file.name));
        self.file = Some(file);
        self.phase = Phase::Conversing;
        Ok(Vec::new())
    }

    fn submit(&mut self, message: String) -> Result<Vec<Effect>, WorkflowError> {
        match self.phase {
            Phase::Conversing | Phase::Failed => {}
            Phase::Dispatching => return Err(WorkflowError::Busy),
            _ => return Err(self.invalid("submit a message")),
        }
        let request = validate(self.file.as_ref(), &message)?;

        self.say(Role::User, message.clone());
        self.say(Role::Agent, ACKNOWLEDGEMENT);
        self.stages = initial_stages();
        self.goal = Some(message);
        self.in_flight = Some(request);
        self.context = None;
        self.phase = Phase::Dispatching;
        Ok(vec![Effect::StagePause])
    }

    fn advance_stage(&mut self) -> Result<Vec<Effect>, WorkflowError> {
        if self.phase != Phase::Dispatching {
            return Err(self.invalid("advance a stage"));
        }
        let current = running_index(&self.stages).ok_or(self.invalid("advance a stage"))?;

        if current + 1 < self.stages.len() {
            self.stages[current].complete()?;
            let label = self.stages[current].label();
            self.say(Role::System, stage_complete(label));
            self.stages[current + 1].start()?;
            return Ok(vec![Effect::StagePause]);
        }

        // The last stage stays running for the duration of the gateway call.
        let request = self
            .in_flight
            .take()
            .ok_or_else(|| self.invalid("advance a stage"))?;
        Ok(vec![Effect::Dispatch(request)])
    }

    fn resolve(
        &mut self,
        outcome: Result<Value, GatewayError>,
    ) -> Result<Vec<Effect>, WorkflowError> {
        if self.phase != Phase::Dispatching || self.in_flight.is_some() {
            return Err(self.invalid("resolve a request"));
        }
        let current = running_index(&self.stages).ok_or(self.invalid("resolve a request"))?;
        let file_name = self.file.as_ref().map(|f| f.name.clone()).unwrap_or_default();
        let goal = self.goal.clone().unwrap_or_default();

        match outcome {
            Ok(raw) => {
                self.stages[current].complete()?;
                let label = self.stages[current].label();
                self.say(Role::System, stage_complete(label));

                let envelope = classify(&raw);
                self.say(Role::Agent, success(envelope.summary()));
                self.context = Some(AnalysisContext::succeeded(file_name, goal, envelope));
                self.phase = Phase::Completed;
                Ok(vec![Effect::Handoff])
            }
            Err(error) => {
                self.stages[current].fail()?;
                self.say(Role::Agent, GENERIC_FAILURE);
                let message = failure_message(&error);
                self.context = Some(AnalysisContext::failed(file_name, goal, message));
                self.phase = Phase::Failed;
                Ok(Vec::new())
            }
        }
    }

    fn go_back(&mut self) -> Result<Vec<Effect>, WorkflowError> {
        if self.phase == Phase::Dispatching {
            return Err(WorkflowError::Busy);
        }
        let version = self.version;
        let next_entry = self.next_entry;
        *self = Self::new();
        self.version = version;
        // Ids stay unique across the whole session.
        self.next_entry = next_entry;
        Ok(Vec::new())
    }
}

/// Message recorded on a failed context; the transcript only gets the generic line.
pub(crate) fn failure_message(error: &GatewayError) -> String {
    match error {
        GatewayError::Server { message, .. } => message.clone(),
        GatewayError::Network(detail) => {
            format!("Unable to reach the analysis service: {}", detail)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workflow::stage::StageStatus;
    use serde_json::json;

    fn csv() -> IntakeFile {
        IntakeFile::new("sales.csv", Some("text/csv"), b"month,total\n1,10\n".to_vec())
    }

    fn step(state: &WorkflowState, event: Event) -> (WorkflowState, Vec<Effect>) {
        let Transition { state, effects } = state.apply(event).unwrap();
        (state, effects)
    }

    fn conversing() -> WorkflowState {
        step(&WorkflowState::new(), Event::FileAccepted(csv())).0
    }

    #[test]
    fn accepting_file_emits_welcome() {
        let state = conversing();
        assert_eq!(state.phase(), Phase::Conversing);
        assert_eq!(state.transcript().len(), 1);
        let welcome = &state.transcript().entries()[0];
        assert_eq!(welcome.role, Role::System);
        assert!(welcome.text.contains("sales.csv"));
        assert_eq!(state.version(), 1);
    }

    #[test]
    fn non_csv_file_is_rejected_without_state_change() {
        let state = WorkflowState::new();
        let json = IntakeFile::new("a.json", Some("application/json"), vec![]);
        let err = state.apply(Event::FileAccepted(json)).unwrap_err();
        assert!(matches!(err, WorkflowError::Validation(_)));
        assert_eq!(state.phase(), Phase::Intake);
        assert_eq!(state.version(), 0);
    }

    #[test]
    fn message_before_file_is_invalid() {
        let err = WorkflowState::new()
            .apply(Event::MessageSubmitted("hi".into()))
            .unwrap_err();
        assert!(matches!(err, WorkflowError::InvalidPhase { .. }));
    }

    #[test]
    fn blank_message_does_not_dispatch() {
        let state = conversing();
        let err = state.apply(Event::MessageSubmitted("   ".into())).unwrap_err();
        assert!(matches!(
            err,
            WorkflowError::Validation(ValidationError::EmptyGoal)
        ));
    }

    #[test]
    fn submit_starts_dispatch() {
        let (state, effects) = step(&conversing(), Event::MessageSubmitted("forecast".into()));
        assert_eq!(state.phase(), Phase::Dispatching);
        assert_eq!(effects, vec![Effect::StagePause]);

        let roles: Vec<_> = state.transcript().entries().iter().map(|e| e.role).collect();
        assert_eq!(roles, [Role::System, Role::User, Role::Agent]);
        let statuses: Vec<_> = state.stages().iter().map(|s| s.status()).collect();
        assert_eq!(
            statuses,
            [
                StageStatus::Running,
                StageStatus::Pending,
                StageStatus::Pending,
                StageStatus::Pending
            ]
        );
    }

    #[test]
    fn second_submit_while_dispatching_is_busy() {
        let (state, _) = step(&conversing(), Event::MessageSubmitted("forecast".into()));
        let err = state.apply(Event::MessageSubmitted("again".into())).unwrap_err();
        assert!(matches!(err, WorkflowError::Busy));
        assert!(matches!(
            state.apply(Event::WentBack).unwrap_err(),
            WorkflowError::Busy
        ));
    }

    #[test]
    fn stages_advance_in_order_then_dispatch() {
        let (mut state, _) = step(&conversing(), Event::MessageSubmitted("forecast".into()));
        for expected_running in 1..4 {
            let (next, effects) = step(&state, Event::StageElapsed);
            assert_eq!(effects, vec![Effect::StagePause]);
            assert_eq!(next.stages()[expected_running].status(), StageStatus::Running);
            assert!(next.stages()[..expected_running]
                .iter()
                .all(|s| s.status() == StageStatus::Done));
            state = next;
        }

        let (state, effects) = step(&state, Event::StageElapsed);
        let [Effect::Dispatch(request)] = effects.as_slice() else {
            panic!("expected a single dispatch, got {:?}", effects);
        };
        assert_eq!(request.goal(), "forecast");
        assert_eq!(state.stages()[3].status(), StageStatus::Running);

        // The request is handed out exactly once.
        assert!(matches!(
            state.apply(Event::StageElapsed),
            Err(WorkflowError::InvalidPhase {
                phase: Phase::Dispatching,
                ..
            })
        ));
    }

    fn dispatched() -> WorkflowState {
        let (mut state, _) = step(&conversing(), Event::MessageSubmitted("forecast".into()));
        for _ in 0..4 {
            state = step(&state, Event::StageElapsed).0;
        }
        state
    }

    #[test]
    fn success_completes_with_summary_and_handoff() {
        let raw = json!({"result_type": "text", "data": "ok", "workflow_summary": "Sales up 4%"});
        let (state, effects) = step(&dispatched(), Event::GatewayResolved(Ok(raw)));

        assert_eq!(state.phase(), Phase::Completed);
        assert_eq!(effects, vec![Effect::Handoff]);
        assert!(state.stages().iter().all(|s| s.status() == StageStatus::Done));
        let last = state.transcript().last().unwrap();
        assert_eq!(last.role, Role::Agent);
        assert!(last.text.contains("Sales up 4%"));

        let context = state.context().unwrap();
        assert_eq!(context.file_name(), "sales.csv");
        assert_eq!(context.goal(), "forecast");
        assert!(context.is_success());
    }

    #[test]
    fn success_without_summary_uses_generic_line() {
        let raw = json!({"result_type": "text", "data": "ok"});
        let (state, _) = step(&dispatched(), Event::GatewayResolved(Ok(raw)));
        assert!(state.transcript().last().unwrap().text.contains(GENERIC_SUCCESS));
    }

    #[test]
    fn failure_marks_running_stage_and_hides_error_text() {
        let error = GatewayError::Server {
            status: 500,
            message: "Traceback: KeyError".into(),
        };
        let (state, effects) = step(&dispatched(), Event::GatewayResolved(Err(error)));

        assert_eq!(state.phase(), Phase::Failed);
        assert!(effects.is_empty());
        assert_eq!(state.stages()[3].status(), StageStatus::Failed);
        let last = state.transcript().last().unwrap();
        assert_eq!(last.text, GENERIC_FAILURE);
        assert!(!last.text.contains("KeyError"));
        assert_eq!(
            state.context().unwrap().error_message(),
            Some("Traceback: KeyError")
        );
    }

    #[test]
    fn retry_after_failure_resets_stages() {
        let error = GatewayError::Network("connection refused".into());
        let (failed, _) = step(&dispatched(), Event::GatewayResolved(Err(error)));

        let (retry, effects) = step(&failed, Event::MessageSubmitted("try again".into()));
        assert_eq!(retry.phase(), Phase::Dispatching);
        assert_eq!(effects, vec![Effect::StagePause]);
        assert_eq!(retry.stages()[0].status(), StageStatus::Running);
        assert!(retry.stages()[1..]
            .iter()
            .all(|s| s.status() == StageStatus::Pending));
        assert!(retry.context().is_none());
    }

    #[test]
    fn completed_cycle_rejects_new_messages() {
        let raw = json!({"result_type": "text", "data": "ok"});
        let (state, _) = step(&dispatched(), Event::GatewayResolved(Ok(raw)));
        assert!(matches!(
            state.apply(Event::MessageSubmitted("more".into())).unwrap_err(),
            WorkflowError::InvalidPhase { .. }
        ));
    }

    #[test]
    fn going_back_discards_conversation() {
        let (state, _) = step(&conversing(), Event::WentBack);
        assert_eq!(state.phase(), Phase::Intake);
        assert!(state.transcript().is_empty());
        assert!(state.stages().is_empty());
        assert!(state.file().is_none());

        let (again, _) = step(&state, Event::FileAccepted(csv()));
        assert_eq!(again.transcript().entries()[0].id, EntryId::new(2));
    }

    #[test]
    fn going_back_after_completion_starts_over() {
        let raw = json!({"result_type": "text", "data": "ok"});
        let (done, _) = step(&dispatched(), Event::GatewayResolved(Ok(raw)));
        assert_eq!(done.phase(), Phase::Completed);

        let (state, effects) = step(&done, Event::WentBack);
        assert!(effects.is_empty());
        assert_eq!(state.phase(), Phase::Intake);
        assert!(state.transcript().is_empty());
        assert!(state.stages().is_empty());
        assert!(state.file().is_none());
        assert!(state.context().is_none());
        assert_eq!(state.version(), done.version() + 1);

        let (again, _) = step(&state, Event::FileAccepted(csv()));
        assert_eq!(again.phase(), Phase::Conversing);
        assert_eq!(again.transcript().entries()[0].id, EntryId::new(9));
    }

    #[test]
    fn going_back_after_failure_starts_over() {
        let error = GatewayError::Network("connection refused".into());
        let (failed, _) = step(&dispatched(), Event::GatewayResolved(Err(error)));
        assert_eq!(failed.phase(), Phase::Failed);

        let (state, _) = step(&failed, Event::WentBack);
        assert_eq!(state.phase(), Phase::Intake);
        assert!(state.transcript().is_empty());
        assert!(state.stages().is_empty());
        assert!(state.file().is_none());
        assert!(state.context().is_none());
        assert!(matches!(
            state.apply(Event::MessageSubmitted("retry".into())),
            Err(WorkflowError::InvalidPhase {
                phase: Phase::Intake,
                ..
            })
        ));
    }

    #[test]
    fn entry_ids_follow_creation_order() {
        let raw = json!({"result_type": "text", "data": "ok"});
        let (state, _) = step(&dispatched(), Event::GatewayResolved(Ok(raw)));
        let ids: Vec<u64> = state
            .transcript()
            .entries()
            .iter()
            .map(|e| e.id.as_u64())
            .collect();
        let mut sorted = ids.clone();
        sorted.sort_unstable();
        assert_eq!(ids, sorted);
        // welcome, user, ack, four stage completions, final answer
        assert_eq!(ids.len(), 8);
    }

    #[test]
    fn versions_increase_per_transition() {
        let state = dispatched();
        // accept + submit + four stage ticks
        assert_eq!(state.version(), 6);
    }
}
