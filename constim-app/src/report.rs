use anyhow::{Context, Result};
use constim_experiment::{ResultsTable, SessionOutcome, summarize};
use std::path::Path;

/// Reloads a saved results file and prints detection rates per condition.
pub fn print_summary(path: &Path) -> Result<()> {
    let table = ResultsTable::load(path)
        .with_context(|| format!("reading back {}", path.display()))?;

    println!("\nResults saved to {}", path.display());
    let status = match table.outcome {
        SessionOutcome::Completed => "completed",
        SessionOutcome::Aborted => "aborted",
    };
    println!(
        "Observer {:?}: {status}, {}/{} trials answered",
        table.extra_info.observer_name,
        table.records.len(),
        table.n_total()
    );
    for row in summarize(&table) {
        println!("  {row}");
    }
    println!("Thank you!");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use constim_core::Signal;
    use constim_experiment::{ExperimentConfig, JsonFileStore, Session};
    use constim_timing::SimulatedTimer;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    #[test]
    fn summarizes_a_saved_session() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileStore::new(dir.path());
        let mut session = Session::new(SimulatedTimer::new());
        let config = ExperimentConfig::new("ada", vec![0.0, 0.1], vec![1.0], 2);
        assert!(session.configure(config, &mut StdRng::seed_from_u64(3)));
        session.start();
        session.submit(Signal::Positive);
        session.submit(Signal::Abort);

        let path = session.persist(&store).unwrap();
        assert!(print_summary(&path).is_ok());
    }

    #[test]
    fn missing_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = print_summary(&dir.path().join("nobody-results.json")).unwrap_err();
        assert!(format!("{err:#}").contains("reading back"));
    }
}
