use serde::{Deserialize, Serialize};

/// External per-trial input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Signal {
    Positive,
    Negative,
    Abort,
}

impl Signal {
    /// Maps a typed token to a signal. Anything unrecognized aborts.
    pub fn from_token(token: &str) -> Self {
        match token.trim().to_ascii_lowercase().as_str() {
            "y" | "yes" => Signal::Positive,
            "n" | "no" => Signal::Negative,
            _ => Signal::Abort,
        }
    }

    pub fn answer(&self) -> Option<Answer> {
        match self {
            Signal::Positive => Some(Answer::Detected),
            Signal::Negative => Some(Answer::NotDetected),
            Signal::Abort => None,
        }
    }
}

/// Recorded detection answer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Answer {
    Detected,
    NotDetected,
}

impl Answer {
    pub fn as_int(&self) -> u8 {
        match self {
            Answer::Detected => 1,
            Answer::NotDetected => 0,
        }
    }
}
