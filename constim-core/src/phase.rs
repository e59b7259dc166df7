use serde::{Deserialize, Serialize};

/// Session lifecycle. `Running` carries the 1-based position of the trial on screen.
#[derive(Copy, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum SessionPhase {
    AwaitingConfig,
    AwaitingStart,
    Running(usize),
    Aborted,
    Completed,
    Persisted,
}

impl Default for SessionPhase {
    fn default() -> Self {
        SessionPhase::AwaitingConfig
    }
}

impl SessionPhase {
    pub fn allows_input(&self) -> bool {
        matches!(self, Self::AwaitingStart | Self::Running(_))
    }

    pub fn is_running(&self) -> bool {
        matches!(self, Self::Running(_))
    }

    /// Aborted or completed, waiting for the single persistence write.
    pub fn is_finished(&self) -> bool {
        matches!(self, Self::Aborted | Self::Completed)
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Persisted)
    }
}

/// Stages of a single trial, in presentation order.
#[derive(Copy, Debug, Clone, PartialEq, Eq, Default)]
pub enum TrialStage {
    #[default]
    Announce,
    Stimulus,
    Question,
}

impl TrialStage {
    pub fn next(&self) -> Option<Self> {
        use TrialStage::*;
        Some(match self {
            Announce => Stimulus,
            Stimulus => Question,
            Question => return None,
        })
    }

    /// Only the question stage waits for the observer.
    pub fn awaits_signal(&self) -> bool {
        matches!(self, TrialStage::Question)
    }
}
