//! Pipeline state machine.
//!
//! `Idle → Resolving → Fetching → Verifying → Extracting → Installing → Done`,
//! with `Failed` reachable from any non-terminal state. No stage is skipped
//! and nothing leaves `Done` or `Failed`.

use std::fmt;

use serde::Serialize;
use tokio::sync::mpsc::UnboundedSender;

use crate::error::Error;

/// The working stages, in order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Stage {
    Resolving,
    Fetching,
    Verifying,
    Extracting,
    Installing,
}

impl Stage {
    pub const ALL: [Stage; 5] = [
        Stage::Resolving,
        Stage::Fetching,
        Stage::Verifying,
        Stage::Extracting,
        Stage::Installing,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Stage::Resolving => "resolving",
            Stage::Fetching => "fetching",
            Stage::Verifying => "verifying",
            Stage::Extracting => "extracting",
            Stage::Installing => "installing",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", content = "detail", rename_all = "lowercase")]
pub enum PipelineState {
    Idle,
    Running(Stage),
    Done,
    /// Stage that failed and the rendered error.
    Failed { stage: Stage, reason: String },
}

impl PipelineState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, PipelineState::Done | PipelineState::Failed { .. })
    }

    /// Whether `next` is a legal successor of `self`.
    pub fn can_transition_to(&self, next: &PipelineState) -> bool {
        use PipelineState::*;
        match (self, next) {
            (Idle, Running(Stage::Resolving)) => true,
            (Running(a), Running(b)) => successor(*a) == Some(*b),
            (Running(Stage::Installing), Done) => true,
            (Running(a), Failed { stage, .. }) => a == stage,
            _ => false,
        }
    }
}

impl fmt::Display for PipelineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PipelineState::Idle => f.write_str("idle"),
            PipelineState::Running(s) => write!(f, "{}", s),
            PipelineState::Done => f.write_str("done"),
            PipelineState::Failed { stage, reason } => write!(f, "failed while {}: {}", stage, reason),
        }
    }
}

fn successor(stage: Stage) -> Option<Stage> {
    let i = Stage::ALL.iter().position(|s| *s == stage)?;
    Stage::ALL.get(i + 1).copied()
}

/// Error returned by a pipeline run: the stage it stopped in plus the cause.
#[derive(Debug, thiserror::Error)]
#[error("{stage} failed: {source}")]
pub struct PipelineError {
    pub stage: Stage,
    #[source]
    pub source: Error,
}

impl PipelineError {
    pub fn exit_code(&self) -> i32 {
        self.source.exit_code()
    }
}

pub type StateSender = UnboundedSender<PipelineState>;

/// Tracks the current state, logs every transition, and forwards it to an
/// optional observer.
#[derive(Debug)]
pub(crate) struct StateTracker {
    state: PipelineState,
    observer: Option<StateSender>,
}

impl StateTracker {
    pub(crate) fn new(observer: Option<StateSender>) -> Self {
        Self {
            state: PipelineState::Idle,
            observer,
        }
    }

    #[cfg(test)]
    pub(crate) fn state(&self) -> &PipelineState {
        &self.state
    }

    /// Current stage, if running.
    pub(crate) fn stage(&self) -> Option<Stage> {
        match self.state {
            PipelineState::Running(s) => Some(s),
            _ => None,
        }
    }

    pub(crate) fn enter(&mut self, stage: Stage) {
        self.transition(PipelineState::Running(stage));
    }

    pub(crate) fn done(&mut self) {
        self.transition(PipelineState::Done);
    }

    /// Move to `Failed` and wrap `source` with the stage it happened in.
    pub(crate) fn fail(&mut self, source: Error) -> PipelineError {
        let stage = self.stage().unwrap_or(Stage::Resolving);
        self.transition(PipelineState::Failed {
            stage,
            reason: source.to_string(),
        });
        PipelineError { stage, source }
    }

    fn transition(&mut self, next: PipelineState) {
        debug_assert!(
            self.state.can_transition_to(&next),
            "illegal transition {:?} -> {:?}",
            self.state,
            next
        );
        match &next {
            PipelineState::Failed { stage, reason } => {
                tracing::error!(stage = %stage, "pipeline failed: {}", reason)
            }
            other => tracing::info!(state = %other, "pipeline state"),
        }
        if let Some(tx) = &self.observer {
            let _ = tx.send(next.clone());
        }
        self.state = next;
    }
}
