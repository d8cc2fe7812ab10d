//! Execution scheduler.
//!
//! Walks a validated [`StepGraph`] in passes. Each pass:
//!
//! 1. retires every pending step with a Failed or Skipped dependency to
//!    Skipped, in topological order so the skip reaches all descendants in
//!    the same pass;
//! 2. collects the ready steps (all dependencies Succeeded), in declaration
//!    order;
//! 3. dispatches one of them (sequential) or all of them (parallel, one
//!    wave), then waits for every dispatched step to finish before the next
//!    pass.
//!
//! Terminal runs are recorded into a [`ResultAggregator`], which is the only
//! arena of step state: readiness, skips and placeholder outputs are all
//! read back from it. In-flight runs stay local to the pass that launched
//! them; spawned tasks receive owned copies of what they need and hand back
//! a `Result`.

use std::collections::BTreeSet;

use tokio::task::JoinHandle;

use super::aggregator::ResultAggregator;
use super::capability::{StepError, StepOutput};
use super::dispatcher::Dispatcher;
use super::graph::StepGraph;
use super::run::{StepRun, StepState};

pub struct Scheduler {
    dispatcher: Dispatcher,
}

enum Launched {
    Spawned(JoinHandle<Result<StepOutput, StepError>>),
    Finished(Result<StepOutput, StepError>),
}

impl Scheduler {
    pub fn new(dispatcher: Dispatcher) -> Self {
        Self { dispatcher }
    }

    /// Run every runnable step of `graph` to a terminal state, recording each
    /// one into `aggregator` as it gets there.
    pub async fn run(
        &self,
        graph: &StepGraph,
        allow_parallel: bool,
        aggregator: &mut ResultAggregator,
    ) {
        let mut pending: BTreeSet<usize> = (0..graph.len()).collect();
        let order = graph.topological_order();
        let mut wave = 0usize;

        while !pending.is_empty() {
            // ─── Skip propagation ───────────────────────────────────────
            for &idx in &order {
                if !pending.contains(&idx) {
                    continue;
                }
                let blocker = graph.predecessors(idx).iter().copied().find(|&p| {
                    matches!(aggregator.state(p), StepState::Failed | StepState::Skipped)
                });
                if let Some(blocker) = blocker {
                    let node = graph.node(idx);
                    let because = graph.node(blocker).name.clone();
                    tracing::info!(
                        "[Scheduler] Skipping '{}': dependency '{}' did not succeed",
                        node.name,
                        because
                    );
                    let mut run = StepRun::pending(node);
                    run.skip(Some(because));
                    pending.remove(&idx);
                    aggregator.record(run);
                }
            }

            // ─── Readiness ──────────────────────────────────────────────
            let ready: Vec<usize> = pending
                .iter()
                .copied()
                .filter(|&idx| {
                    graph
                        .predecessors(idx)
                        .iter()
                        .all(|&p| aggregator.state(p) == StepState::Succeeded)
                })
                .collect();

            if ready.is_empty() {
                if !pending.is_empty() {
                    tracing::warn!("[Scheduler] {} step(s) were never runnable", pending.len());
                }
                break;
            }

            let batch: Vec<usize> = if allow_parallel {
                ready
            } else {
                ready.into_iter().take(1).collect()
            };

            wave += 1;
            tracing::info!(
                "[Scheduler] Wave {}: dispatching {}",
                wave,
                batch
                    .iter()
                    .map(|&i| graph.node(i).name.as_str())
                    .collect::<Vec<_>>()
                    .join(", ")
            );

            // ─── Dispatch ───────────────────────────────────────────────
            let mut launched = Vec::with_capacity(batch.len());
            for &idx in &batch {
                pending.remove(&idx);
                let node = graph.node(idx).clone();
                let mut run = StepRun::pending(&node);
                run.mark_ready();
                run.mark_running();

                let entry = match self.dispatcher.prepare_input(&node, aggregator.outputs()) {
                    Ok(input) => {
                        let dispatcher = self.dispatcher.clone();
                        Launched::Spawned(tokio::spawn(async move {
                            dispatcher.dispatch(&node, input).await
                        }))
                    }
                    Err(e) => Launched::Finished(Err(e)),
                };
                launched.push((run, entry));
            }

            // ─── Barrier ────────────────────────────────────────────────
            for (mut run, entry) in launched {
                let result = match entry {
                    Launched::Finished(result) => result,
                    Launched::Spawned(handle) => match handle.await {
                        Ok(result) => result,
                        Err(e) => Err(StepError::internal(format!("step task aborted: {}", e))),
                    },
                };

                run.complete(result);
                match &run.error {
                    None => tracing::info!("[Scheduler] Step '{}' succeeded", run.name),
                    Some(err) => tracing::warn!("[Scheduler] Step '{}' failed: {}", run.name, err),
                }
                aggregator.record(run);
            }
        }
    }
}
