use std::collections::HashSet;
use std::time::Duration;

use constim_core::{DrawRequest, Mask, SessionPhase, Signal};
use constim_experiment::{
    ExperimentConfig, JsonFileStore, Pacing, Presenter, Randomization, ResultsTable,
    ScriptedSignals, Session, SessionOutcome, run_session, summarize,
};
use constim_timing::{SimulatedTimer, Timer};
use rand::SeedableRng;
use rand::rngs::StdRng;

#[derive(Default)]
struct RecordingPresenter {
    instructions: usize,
    announced: Vec<(usize, usize)>,
    presented: Vec<DrawRequest>,
    questions: usize,
}

impl Presenter for RecordingPresenter {
    fn instructions(&mut self) {
        self.instructions += 1;
    }
    fn announce(&mut self, position: usize, total: usize) {
        self.announced.push((position, total));
    }
    fn present(&mut self, request: &DrawRequest) {
        self.presented.push(*request);
    }
    fn question(&mut self) {
        self.questions += 1;
    }
}

fn pacing() -> Pacing {
    Pacing {
        announce: Duration::from_millis(500),
        stimulus: Duration::from_millis(500),
    }
}

fn configured(config: ExperimentConfig, seed: u64) -> Session<SimulatedTimer> {
    let mut session = Session::new(SimulatedTimer::new());
    assert!(session.configure(config, &mut StdRng::seed_from_u64(seed)));
    session
}

/// `start` consumes the first signal, so trial answers follow it.
fn script(answers: impl IntoIterator<Item = Signal>) -> ScriptedSignals {
    ScriptedSignals::new(std::iter::once(Signal::Positive).chain(answers))
}

#[test]
fn completed_session_persists_every_trial() {
    let tmp = tempfile::tempdir().unwrap();
    let store = JsonFileStore::new(tmp.path());
    let config = ExperimentConfig::new("alice", vec![0.0, 0.05], vec![0.25, 1.0], 2);
    let mut session = configured(config, 9);

    let answers = (0..8).map(|i| if i % 3 == 0 { Signal::Positive } else { Signal::Negative });
    let mut source = script(answers);
    let mut presenter = RecordingPresenter::default();

    let path = run_session(&mut session, &mut source, &mut presenter, pacing(), &store).unwrap();

    assert_eq!(path, tmp.path().join("alice-results.json"));
    assert_eq!(session.phase(), SessionPhase::Persisted);
    assert_eq!(presenter.instructions, 1);
    assert_eq!(presenter.presented.len(), 8);
    assert_eq!(presenter.questions, 8);
    assert_eq!(
        presenter.announced,
        (1..=8).map(|i| (i, 8)).collect::<Vec<_>>()
    );
    assert_eq!(session.timer().now(), 8 * 1_000_000_000);

    let table = ResultsTable::load(&path).unwrap();
    assert_eq!(table.outcome, SessionOutcome::Completed);
    assert_eq!(table.records.len(), 8);
    assert_eq!(table.conditions.len(), 4);
    assert_eq!(table.extra_info.observer_name, "alice");

    let rows = summarize(&table);
    assert!(rows.iter().all(|r| r.presented == 2));
    assert_eq!(rows.iter().map(|r| r.detected).sum::<usize>(), 3);
}

#[test]
fn abort_on_third_trial_keeps_two_answers() {
    let tmp = tempfile::tempdir().unwrap();
    let store = JsonFileStore::new(tmp.path());
    let config = ExperimentConfig::new("bob", vec![0.0, 0.05, 0.1, 0.15, 0.2], vec![1.0], 1);
    let mut session = configured(config, 1);

    let mut source = script([Signal::Positive, Signal::Negative, Signal::Abort]);
    let mut presenter = RecordingPresenter::default();
    let path = run_session(&mut session, &mut source, &mut presenter, pacing(), &store).unwrap();

    assert_eq!(session.phase(), SessionPhase::Persisted);
    assert_eq!(presenter.presented.len(), 3);

    let table = ResultsTable::load(&path).unwrap();
    assert_eq!(table.outcome, SessionOutcome::Aborted);
    assert_eq!(table.n_total(), 5);
    assert_eq!(table.records.len(), 2);
}

#[test]
fn abort_at_any_position_keeps_a_strict_prefix() {
    let contrasts = vec![0.0, 0.05, 0.1];
    let frequencies = vec![0.25, 1.0, 5.0];
    let total = 3 * 3 * 2;

    for abort_at in 1..=total {
        let tmp = tempfile::tempdir().unwrap();
        let store = JsonFileStore::new(tmp.path());
        let config = ExperimentConfig::new("carol", contrasts.clone(), frequencies.clone(), 2)
            .with_randomization(Randomization::Full);
        let mut session = configured(config, abort_at as u64);

        let answers = (1..abort_at)
            .map(|_| Signal::Negative)
            .chain(std::iter::once(Signal::Abort));
        let mut source = script(answers);
        let mut presenter = RecordingPresenter::default();
        let path =
            run_session(&mut session, &mut source, &mut presenter, pacing(), &store).unwrap();

        let table = ResultsTable::load(&path).unwrap();
        assert_eq!(table.records.len(), abort_at - 1, "abort at {abort_at}");
        let distinct: HashSet<usize> = table.records.iter().map(|r| r.trial_index).collect();
        assert_eq!(distinct.len(), abort_at - 1);
        for (expected, record) in table.records.iter().enumerate() {
            assert_eq!(record.trial_index, expected);
            assert_eq!(record.condition.index, table.trial_order[expected]);
        }
    }
}

#[test]
fn empty_configuration_persists_empty_table() {
    let tmp = tempfile::tempdir().unwrap();
    let store = JsonFileStore::new(tmp.path());
    let config = ExperimentConfig::new("dave", vec![0.1, 0.2], vec![], 10);
    let mut session = configured(config, 0);

    let mut source = ScriptedSignals::new([Signal::Positive]);
    let mut presenter = RecordingPresenter::default();
    let path = run_session(&mut session, &mut source, &mut presenter, pacing(), &store).unwrap();

    assert!(presenter.presented.is_empty());
    let table = ResultsTable::load(&path).unwrap();
    assert_eq!(table.outcome, SessionOutcome::Completed);
    assert!(table.records.is_empty());
    assert_eq!(table.n_total(), 0);
}

#[test]
fn exhausted_script_aborts_instead_of_blocking() {
    let tmp = tempfile::tempdir().unwrap();
    let store = JsonFileStore::new(tmp.path());
    let config = ExperimentConfig::new("erin", vec![0.1], vec![1.0, 2.0], 3);
    let mut session = configured(config, 2);

    let mut source = script([Signal::Positive; 4]);
    let mut presenter = RecordingPresenter::default();
    let path = run_session(&mut session, &mut source, &mut presenter, pacing(), &store).unwrap();

    let table = ResultsTable::load(&path).unwrap();
    assert_eq!(table.outcome, SessionOutcome::Aborted);
    assert_eq!(table.records.len(), 4);
}

#[test]
fn draw_requests_carry_the_full_field_set() {
    let tmp = tempfile::tempdir().unwrap();
    let store = JsonFileStore::new(tmp.path());
    let mut config = ExperimentConfig::new("fay", vec![0.2], vec![3.0], 1);
    config.stimulus_size_deg = 4.0;
    config.stimulus_orientation_deg = 45.0;
    config.stimulus_phase_deg = 90.0;
    let mut session = configured(config, 0);

    let mut source = script([Signal::Positive]);
    let mut presenter = RecordingPresenter::default();
    run_session(&mut session, &mut source, &mut presenter, pacing(), &store).unwrap();

    assert_eq!(
        presenter.presented,
        vec![DrawRequest {
            contrast: 0.2,
            frequency: 3.0,
            size_deg: 4.0,
            orientation_deg: 45.0,
            phase_deg: 90.0,
            mask: Mask::Gauss,
        }]
    );
}

#[test]
fn driver_refuses_unconfigured_or_started_sessions() {
    let tmp = tempfile::tempdir().unwrap();
    let store = JsonFileStore::new(tmp.path());
    let mut presenter = RecordingPresenter::default();

    let mut fresh = Session::new(SimulatedTimer::new());
    let mut source = ScriptedSignals::default();
    assert!(run_session(&mut fresh, &mut source, &mut presenter, pacing(), &store).is_err());

    let mut started = configured(ExperimentConfig::new("gus", vec![0.1], vec![1.0], 1), 0);
    started.start();
    assert!(run_session(&mut started, &mut source, &mut presenter, pacing(), &store).is_err());
    assert!(!tmp.path().join("gus-results.json").exists());
}
