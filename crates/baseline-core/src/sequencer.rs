//! Runs steps strictly in their declared order.
//!
//! ```text
//! run:  NotStarted -> InProgress -> Completed
//!                               \-> Aborted
//! step: Pending -> Running -> Succeeded
//!                          \-> Failed
//! ```
//!
//! The first failing operation aborts the whole run. Nothing is rolled
//! back: steps that already succeeded stay applied on disk.

use std::fmt;

use serde::Serialize;

use crate::action::ActionRunner;
use crate::error::{BaselineError, ErrorKind};
use crate::mutation::ProjectTree;
use crate::step::{Step, Workspace};
use crate::template::{Context, TemplateStore};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StepStatus {
    Pending,
    Running,
    Succeeded,
    Failed,
}

impl StepStatus {
    pub const fn can_advance_to(self, next: StepStatus) -> bool {
        matches!(
            (self, next),
            (StepStatus::Pending, StepStatus::Running)
                | (StepStatus::Running, StepStatus::Succeeded)
                | (StepStatus::Running, StepStatus::Failed)
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunState {
    NotStarted,
    InProgress,
    Completed,
    Aborted,
}

impl RunState {
    pub const fn is_terminal(self) -> bool {
        matches!(self, RunState::Completed | RunState::Aborted)
    }
}

/// The step that stopped a run, and why.
#[derive(Debug)]
pub struct StepFailure {
    pub index: usize,
    pub step: String,
    pub operation: String,
    pub error: BaselineError,
}

impl StepFailure {
    pub fn kind(&self) -> ErrorKind {
        self.error.kind()
    }
}

impl fmt::Display for StepFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "step '{}' failed at {}: {}",
            self.step, self.operation, self.error
        )
    }
}

impl std::error::Error for StepFailure {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.error)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct StepRecord {
    pub name: String,
    pub status: StepStatus,
}

/// Emitted as each step changes status.
#[derive(Debug, Clone, Copy)]
pub struct StepEvent<'a> {
    pub index: usize,
    pub name: &'a str,
    pub status: StepStatus,
}

/// Outcome of a run: the final state, every step's status, and the failure if any.
#[derive(Debug)]
pub struct RunReport {
    pub state: RunState,
    pub steps: Vec<StepRecord>,
    pub failure: Option<StepFailure>,
}

impl RunReport {
    pub fn succeeded(&self) -> usize {
        self.count(StepStatus::Succeeded)
    }

    pub fn count(&self, status: StepStatus) -> usize {
        self.steps.iter().filter(|s| s.status == status).count()
    }

    pub fn into_result(self) -> Result<Vec<StepRecord>, StepFailure> {
        match self.failure {
            Some(failure) => Err(failure),
            None => Ok(self.steps),
        }
    }
}

/// Sole writer to the project tree for the duration of a run.
pub struct Sequencer<'a> {
    workspace: Workspace<'a>,
    state: RunState,
    records: Vec<StepRecord>,
}

impl<'a> Sequencer<'a> {
    pub fn new(
        tree: &'a ProjectTree,
        templates: &'a TemplateStore,
        context: &'a Context,
        runner: &'a dyn ActionRunner,
    ) -> Self {
        Self {
            workspace: Workspace {
                tree,
                templates,
                context,
                runner,
            },
            state: RunState::NotStarted,
            records: Vec::new(),
        }
    }

    pub fn run(self, steps: &[Step]) -> RunReport {
        self.run_with(steps, |_| {})
    }

    /// Run `steps` in order, reporting each status change to `observe`.
    pub fn run_with(mut self, steps: &[Step], mut observe: impl FnMut(StepEvent<'_>)) -> RunReport {
        self.records = steps
            .iter()
            .map(|s| StepRecord {
                name: s.name().to_string(),
                status: StepStatus::Pending,
            })
            .collect();
        self.state = RunState::InProgress;
        tracing::info!(steps = steps.len(), root = %self.workspace.tree.root().display(), "starting pipeline");

        for (index, step) in steps.iter().enumerate() {
            self.advance(index, StepStatus::Running);
            observe(StepEvent {
                index,
                name: step.name(),
                status: StepStatus::Running,
            });
            tracing::info!(step = step.name(), index, "running step");

            if let Err(failure) = self.run_step(index, step) {
                self.advance(index, StepStatus::Failed);
                observe(StepEvent {
                    index,
                    name: step.name(),
                    status: StepStatus::Failed,
                });
                self.state = RunState::Aborted;
                tracing::warn!(
                    step = %failure.step,
                    operation = %failure.operation,
                    kind = ?failure.kind(),
                    "pipeline aborted"
                );
                return self.finish(Some(failure));
            }

            self.advance(index, StepStatus::Succeeded);
            tracing::info!(step = step.name(), index, "step succeeded");
            observe(StepEvent {
                index,
                name: step.name(),
                status: StepStatus::Succeeded,
            });
        }

        self.state = RunState::Completed;
        tracing::info!(steps = steps.len(), "pipeline completed");
        self.finish(None)
    }

    fn run_step(&self, index: usize, step: &Step) -> Result<(), StepFailure> {
        for op in step.operations() {
            tracing::debug!(step = step.name(), operation = %op, "applying");
            op.apply(&self.workspace).map_err(|error| StepFailure {
                index,
                step: step.name().to_string(),
                operation: op.to_string(),
                error,
            })?;
        }
        Ok(())
    }

    fn advance(&mut self, index: usize, next: StepStatus) {
        let record = &mut self.records[index];
        debug_assert!(
            record.status.can_advance_to(next),
            "invalid step transition {:?} -> {:?}",
            record.status,
            next
        );
        record.status = next;
    }

    fn finish(self, failure: Option<StepFailure>) -> RunReport {
        debug_assert!(self.state.is_terminal());
        RunReport {
            state: self.state,
            steps: self.records,
            failure,
        }
    }
}
