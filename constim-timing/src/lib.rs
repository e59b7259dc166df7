pub mod timer;

pub use timer::{HighPrecisionTimer, SimulatedTimer, Timer};
