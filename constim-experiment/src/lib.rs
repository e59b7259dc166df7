pub mod conditions;
pub mod config;
pub mod driver;
pub mod results;
pub mod schedule;
pub mod state;
pub mod summary;

pub use conditions::{
    MAX_CONTRAST_LEVELS, contrast_level_count, contrast_range, enumerate_conditions,
};
pub use config::{AppConfig, DisplayMode, ExperimentConfig, Randomization};
pub use driver::{LineSignalSource, Pacing, Presenter, ScriptedSignals, SignalSource, run_session};
pub use results::{
    JsonFileStore, ResponseRecord, ResponseRecorder, ResultsStore, ResultsTable, SessionOutcome,
    results_name,
};
pub use schedule::{Trial, TrialSchedule};
pub use state::{Session, SessionEvent};
pub use summary::{ConditionSummary, summarize};
