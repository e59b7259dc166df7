pub mod phase;
pub mod stimulus;
pub mod trial;

pub use phase::{SessionPhase, TrialStage};
pub use stimulus::{Condition, DrawRequest, Mask, StimulusKind};
pub use trial::{Answer, Signal};
