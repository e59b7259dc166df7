use crate::config::TimingConfig;
use crate::results::ResultsStore;
use crate::state::Session;
use anyhow::{Result, bail};
use constim_core::{DrawRequest, SessionPhase, Signal};
use constim_timing::Timer;
use std::collections::VecDeque;
use std::io::BufRead;
use std::path::PathBuf;
use std::time::Duration;
use tracing::warn;

/// Blocking source of observer input, one signal per call.
pub trait SignalSource {
    fn next_signal(&mut self) -> Signal;
}

/// Draws what the session asks for. Only `present` is mandatory.
pub trait Presenter {
    fn instructions(&mut self) {}
    fn announce(&mut self, _position: usize, _total: usize) {}
    fn present(&mut self, request: &DrawRequest);
    fn question(&mut self) {}
}

/// Fixed list of signals; aborts once it runs dry.
#[derive(Debug, Clone, Default)]
pub struct ScriptedSignals {
    signals: VecDeque<Signal>,
}

impl ScriptedSignals {
    pub fn new(signals: impl IntoIterator<Item = Signal>) -> Self {
        Self {
            signals: signals.into_iter().collect(),
        }
    }

    pub fn remaining(&self) -> usize {
        self.signals.len()
    }
}

impl SignalSource for ScriptedSignals {
    fn next_signal(&mut self) -> Signal {
        self.signals.pop_front().unwrap_or(Signal::Abort)
    }
}

/// One signal per input line (`y`, `n`, `q`). End of input or a read error aborts.
pub struct LineSignalSource<R: BufRead> {
    reader: R,
}

impl<R: BufRead> LineSignalSource<R> {
    pub fn new(reader: R) -> Self {
        Self { reader }
    }
}

impl<R: BufRead> SignalSource for LineSignalSource<R> {
    fn next_signal(&mut self) -> Signal {
        let mut line = String::new();
        match self.reader.read_line(&mut line) {
            Ok(0) => Signal::Abort,
            Ok(_) => Signal::from_token(&line),
            Err(err) => {
                warn!(%err, "input read failed, treating as abort");
                Signal::Abort
            }
        }
    }
}

/// Delays between the stages of one trial.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pacing {
    pub announce: Duration,
    pub stimulus: Duration,
}

impl From<&TimingConfig> for Pacing {
    fn from(t: &TimingConfig) -> Self {
        Self {
            announce: t.announce(),
            stimulus: t.stimulus(),
        }
    }
}

/// Runs a configured session to the end and saves it.
///
/// Any signal leaves the instruction screen. Each trial is announced, shown,
/// then answered. The results are written once whether the run completes or
/// is aborted.
pub fn run_session<T, S, P, St>(
    session: &mut Session<T>,
    source: &mut S,
    presenter: &mut P,
    pacing: Pacing,
    store: &St,
) -> Result<PathBuf>
where
    T: Timer,
    S: SignalSource + ?Sized,
    P: Presenter + ?Sized,
    St: ResultsStore + ?Sized,
{
    if session.phase() != SessionPhase::AwaitingStart {
        bail!("session must be configured and not started, is {:?}", session.phase());
    }

    presenter.instructions();
    source.next_signal();
    session.start();

    while let SessionPhase::Running(position) = session.phase() {
        let Some(request) = session.draw_request() else {
            break;
        };
        presenter.announce(position, session.schedule().total());
        session.timer().sleep(pacing.announce);

        presenter.present(&request);
        session.timer().sleep(pacing.stimulus);

        presenter.question();
        let signal = source.next_signal();
        session.submit(signal);
    }

    session.persist(store)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn line_source_parses_lines_then_aborts_at_eof() {
        let mut source = LineSignalSource::new(Cursor::new("y\nN\n\nwhat\n"));
        assert_eq!(source.next_signal(), Signal::Positive);
        assert_eq!(source.next_signal(), Signal::Negative);
        assert_eq!(source.next_signal(), Signal::Abort);
        assert_eq!(source.next_signal(), Signal::Abort);
        assert_eq!(source.next_signal(), Signal::Abort);
    }

    #[test]
    fn scripted_source_runs_dry_into_abort() {
        let mut source = ScriptedSignals::new([Signal::Negative]);
        assert_eq!(source.remaining(), 1);
        assert_eq!(source.next_signal(), Signal::Negative);
        assert_eq!(source.next_signal(), Signal::Abort);
    }

    #[test]
    fn pacing_comes_from_timing_config() {
        let pacing = Pacing::from(&TimingConfig::default());
        assert_eq!(pacing.announce, Duration::from_millis(500));
        assert_eq!(pacing.stimulus, Duration::from_millis(500));
    }
}
