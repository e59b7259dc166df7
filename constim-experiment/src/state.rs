use crate::conditions::enumerate_conditions;
use crate::config::ExperimentConfig;
use crate::results::{ResponseRecord, ResponseRecorder, ResultsStore, ResultsTable, SessionOutcome};
use crate::schedule::{Trial, TrialSchedule};
use anyhow::{Result, bail};
use chrono::{DateTime, Utc};
use constim_core::{Condition, DrawRequest, SessionPhase, Signal};
use constim_timing::Timer;
use rand::Rng;
use std::path::PathBuf;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SessionEvent {
    /// Observer is ready; leaves the instruction screen.
    Start,
    /// One observer answer (or abort) for the trial on screen.
    Signal(Signal),
}

/// One observer's run from configuration to the saved results file.
pub struct Session<T: Timer> {
    phase: SessionPhase,
    timer: T,
    config: Option<ExperimentConfig>,
    conditions: Vec<Condition>,
    schedule: TrialSchedule,
    recorder: ResponseRecorder,
    started_at: Option<DateTime<Utc>>,
    finished_at: Option<DateTime<Utc>>,
}

impl<T: Timer> Session<T> {
    pub fn new(timer: T) -> Self {
        Self {
            phase: SessionPhase::AwaitingConfig,
            timer,
            config: None,
            conditions: Vec::new(),
            schedule: TrialSchedule::default(),
            recorder: ResponseRecorder::new(),
            started_at: None,
            finished_at: None,
        }
    }

    /// Fixes the configuration and builds the trial sequence.
    pub fn configure<R: Rng + ?Sized>(&mut self, config: ExperimentConfig, rng: &mut R) -> bool {
        if self.phase != SessionPhase::AwaitingConfig {
            return false;
        }
        self.conditions = enumerate_conditions(&config.contrasts, &config.frequencies);
        self.schedule = TrialSchedule::new(
            &self.conditions,
            config.repetitions,
            config.randomization,
            rng,
        );
        info!(
            observer = %config.observer_name,
            conditions = self.conditions.len(),
            repetitions = config.repetitions,
            trials = self.schedule.total(),
            "session configured"
        );
        self.config = Some(config);
        self.phase = SessionPhase::AwaitingStart;
        true
    }

    pub fn handle_event(&mut self, event: SessionEvent) -> bool {
        match (self.phase, event) {
            (SessionPhase::AwaitingStart, SessionEvent::Start) => {
                self.started_at = Some(Utc::now());
                if self.schedule.is_exhausted() {
                    info!("empty trial sequence, nothing to present");
                    self.finish(SessionPhase::Completed);
                } else {
                    self.phase = SessionPhase::Running(self.schedule.position());
                    debug!(total = self.schedule.total(), "session started");
                }
                true
            }

            (SessionPhase::Running(position), SessionEvent::Signal(signal)) => {
                let Some(trial) = self.schedule.current().copied() else {
                    self.finish(SessionPhase::Completed);
                    return true;
                };
                match signal.answer() {
                    Some(answer) => {
                        let now = self.timer.now();
                        self.recorder.record(&trial, answer, now);
                        debug!(
                            position,
                            contrast = trial.condition.contrast,
                            frequency = trial.condition.frequency,
                            answer = answer.as_int(),
                            "answer recorded"
                        );
                        if self.schedule.advance().is_some() {
                            self.phase = SessionPhase::Running(self.schedule.position());
                        } else {
                            self.finish(SessionPhase::Completed);
                        }
                    }
                    None => {
                        warn!(
                            position,
                            total = self.schedule.total(),
                            "session aborted by observer"
                        );
                        self.finish(SessionPhase::Aborted);
                    }
                }
                true
            }

            _ => false,
        }
    }

    pub fn start(&mut self) -> bool {
        self.handle_event(SessionEvent::Start)
    }

    pub fn submit(&mut self, signal: Signal) -> bool {
        self.handle_event(SessionEvent::Signal(signal))
    }

    fn finish(&mut self, phase: SessionPhase) {
        self.finished_at = Some(Utc::now());
        self.phase = phase;
        info!(
            outcome = ?phase,
            recorded = self.recorder.records().len(),
            total = self.schedule.total(),
            "session finished"
        );
    }

    /// Snapshot of everything recorded so far, once the session has finished.
    pub fn results_table(&self) -> Option<ResultsTable> {
        let outcome = match self.phase {
            SessionPhase::Completed => SessionOutcome::Completed,
            SessionPhase::Aborted => SessionOutcome::Aborted,
            _ => return None,
        };
        let config = self.config.clone()?;
        Some(ResultsTable {
            extra_info: config,
            conditions: self.conditions.clone(),
            trial_order: self
                .schedule
                .trials()
                .iter()
                .map(|t| t.condition.index)
                .collect(),
            records: self.recorder.records().to_vec(),
            outcome,
            started_at: self.started_at,
            finished_at: self.finished_at.unwrap_or_else(Utc::now),
        })
    }

    /// Writes the results table. Allowed exactly once, after completion or abort.
    pub fn persist<S: ResultsStore + ?Sized>(&mut self, store: &S) -> Result<PathBuf> {
        if self.phase.is_terminal() {
            bail!("session results were already saved");
        }
        let Some(table) = self.results_table() else {
            bail!("cannot save results while session is {:?}", self.phase);
        };
        let path = store.save(&table)?;
        self.phase = SessionPhase::Persisted;
        Ok(path)
    }

    pub fn phase(&self) -> SessionPhase {
        self.phase
    }

    pub fn config(&self) -> Option<&ExperimentConfig> {
        self.config.as_ref()
    }

    pub fn conditions(&self) -> &[Condition] {
        &self.conditions
    }

    pub fn schedule(&self) -> &TrialSchedule {
        &self.schedule
    }

    pub fn records(&self) -> &[ResponseRecord] {
        self.recorder.records()
    }

    pub fn timer(&self) -> &T {
        &self.timer
    }

    /// Trial on screen, only while running.
    pub fn current_trial(&self) -> Option<&Trial> {
        if self.phase.is_running() {
            self.schedule.current()
        } else {
            None
        }
    }

    pub fn draw_request(&self) -> Option<DrawRequest> {
        let trial = self.current_trial()?;
        Some(self.config.as_ref()?.draw_request(&trial.condition))
    }

    /// (1-based position, total) while running.
    pub fn progress(&self) -> Option<(usize, usize)> {
        match self.phase {
            SessionPhase::Running(position) => Some((position, self.schedule.total())),
            _ => None,
        }
    }
}
