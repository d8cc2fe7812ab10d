//! Execution records: per-step [`StepRun`] and the aggregated
//! [`WorkflowResult`].

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::capability::{StepError, StepOutput};
use super::graph::StepNode;
use super::schema::CapabilityKind;

/// Lifecycle state of one step.
///
/// `Pending → Ready → Running → {Succeeded | Failed}` or
/// `Pending → Skipped`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepState {
    Pending,
    Ready,
    Running,
    Succeeded,
    Failed,
    Skipped,
}

impl StepState {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            StepState::Succeeded | StepState::Failed | StepState::Skipped
        )
    }

    pub fn can_transition_to(&self, next: StepState) -> bool {
        use StepState::*;
        matches!(
            (self, next),
            (Pending, Ready)
                | (Pending, Skipped)
                | (Ready, Running)
                | (Running, Succeeded)
                | (Running, Failed)
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            StepState::Pending => "pending",
            StepState::Ready => "ready",
            StepState::Running => "running",
            StepState::Succeeded => "succeeded",
            StepState::Failed => "failed",
            StepState::Skipped => "skipped",
        }
    }
}

/// Execution record for one step within one workflow execution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepRun {
    pub name: String,
    pub kind: CapabilityKind,
    pub state: StepState,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finished_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<StepError>,
    /// Dependency whose failure or skip caused this step to be skipped
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub skipped_because: Option<String>,
}

impl StepRun {
    pub fn pending(node: &StepNode) -> Self {
        Self {
            name: node.name.clone(),
            kind: node.kind,
            state: StepState::Pending,
            started_at: None,
            finished_at: None,
            output: None,
            error: None,
            skipped_because: None,
        }
    }

    fn transition(&mut self, next: StepState) {
        debug_assert!(
            self.state.can_transition_to(next),
            "illegal transition {:?} -> {:?} for step '{}'",
            self.state,
            next,
            self.name
        );
        self.state = next;
    }

    pub(crate) fn mark_ready(&mut self) {
        self.transition(StepState::Ready);
    }

    pub(crate) fn mark_running(&mut self) {
        self.transition(StepState::Running);
        self.started_at = Some(Utc::now());
    }

    pub(crate) fn complete(&mut self, result: Result<StepOutput, StepError>) {
        match result {
            Ok(output) => {
                self.transition(StepState::Succeeded);
                self.output = Some(output.into_inner());
            }
            Err(err) => {
                self.transition(StepState::Failed);
                self.error = Some(err);
            }
        }
        self.finished_at = Some(Utc::now());
    }

    pub(crate) fn skip(&mut self, because: Option<String>) {
        self.transition(StepState::Skipped);
        self.skipped_because = because;
        self.finished_at = Some(Utc::now());
    }
}

/// Summary counts by terminal state.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepCounts {
    pub total: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub skipped: usize,
}

impl StepCounts {
    pub fn tally<'a>(runs: impl IntoIterator<Item = &'a StepRun>) -> Self {
        let mut counts = Self::default();
        for run in runs {
            counts.total += 1;
            match run.state {
                StepState::Succeeded => counts.succeeded += 1,
                StepState::Failed => counts.failed += 1,
                StepState::Skipped => counts.skipped += 1,
                _ => {}
            }
        }
        counts
    }
}

/// Terminal snapshot of one workflow execution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowResult {
    pub workflow_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub workflow_name: Option<String>,
    /// Step runs in declaration order
    pub steps: Vec<StepRun>,
    pub counts: StepCounts,
    pub started_at: DateTime<Utc>,
    pub completed_at: DateTime<Utc>,
}

impl WorkflowResult {
    /// True when every step succeeded.
    pub fn success(&self) -> bool {
        self.counts.failed == 0 && self.counts.skipped == 0
    }

    pub fn step(&self, name: &str) -> Option<&StepRun> {
        self.steps.iter().find(|s| s.name == name)
    }

    pub fn states(&self) -> Vec<StepState> {
        self.steps.iter().map(|s| s.state).collect()
    }
}
