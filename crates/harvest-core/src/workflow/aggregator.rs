//! Result aggregator: collects terminal step runs into a [`WorkflowResult`]
//! whose step list follows declaration order, whatever order the steps
//! actually finished in.
//!
//! It is also what the scheduler consults while running: the recorded state
//! of each step and the outputs that later placeholders resolve against.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde_json::Value;

use super::graph::StepGraph;
use super::run::{StepCounts, StepRun, StepState, WorkflowResult};

pub struct ResultAggregator {
    workflow_id: String,
    workflow_name: Option<String>,
    started_at: DateTime<Utc>,
    slots: Vec<StepRun>,
    recorded: Vec<bool>,
    index: HashMap<String, usize>,
    outputs: HashMap<String, Value>,
}

impl ResultAggregator {
    pub fn new(workflow_id: String, workflow_name: Option<String>, graph: &StepGraph) -> Self {
        let slots: Vec<StepRun> = graph.nodes().iter().map(StepRun::pending).collect();
        let index = slots
            .iter()
            .enumerate()
            .map(|(i, run)| (run.name.clone(), i))
            .collect();
        Self {
            workflow_id,
            workflow_name,
            started_at: Utc::now(),
            recorded: vec![false; slots.len()],
            slots,
            index,
            outputs: HashMap::new(),
        }
    }

    /// Record a step that reached a terminal state.
    pub fn record(&mut self, run: StepRun) {
        let Some(&idx) = self.index.get(&run.name) else {
            tracing::warn!("[Aggregator] Ignoring run for undeclared step '{}'", run.name);
            return;
        };
        if !run.state.is_terminal() {
            tracing::warn!(
                "[Aggregator] Ignoring non-terminal run for '{}' ({})",
                run.name,
                run.state.as_str()
            );
            return;
        }
        if self.recorded[idx] {
            tracing::warn!("[Aggregator] Step '{}' recorded twice, keeping the first", run.name);
            return;
        }
        if let Some(output) = &run.output {
            self.outputs.insert(run.name.clone(), output.clone());
        }
        self.slots[idx] = run;
        self.recorded[idx] = true;
    }

    /// Recorded state of the step at declaration index `idx`; `Pending`
    /// until it is recorded.
    pub(crate) fn state(&self, idx: usize) -> StepState {
        self.slots[idx].state
    }

    /// Outputs of every step recorded as succeeded, by step name.
    pub(crate) fn outputs(&self) -> &HashMap<String, Value> {
        &self.outputs
    }

    pub(crate) fn is_complete(&self) -> bool {
        self.recorded.iter().all(|r| *r)
    }

    pub fn finalize(mut self) -> WorkflowResult {
        if !self.is_complete() {
            for (slot, recorded) in self.slots.iter_mut().zip(&self.recorded) {
                if !*recorded && slot.state == StepState::Pending {
                    tracing::warn!("[Aggregator] Step '{}' never reported; marking skipped", slot.name);
                    slot.skip(None);
                }
            }
        }

        let counts = StepCounts::tally(&self.slots);
        WorkflowResult {
            workflow_id: self.workflow_id,
            workflow_name: self.workflow_name,
            steps: self.slots,
            counts,
            started_at: self.started_at,
            completed_at: Utc::now(),
        }
    }
}
