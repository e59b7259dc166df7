mod app;
mod console;
mod keys;
mod report;

use app::App;

use anyhow::{Context, Result, ensure};
use console::ConsolePresenter;
use constim_experiment::config::MonitorConfig;
use constim_experiment::{
    AppConfig, DisplayMode, JsonFileStore, LineSignalSource, Pacing, Session, run_session,
};
use constim_render::Monitor;
use constim_timing::HighPrecisionTimer;
use rand::SeedableRng;
use rand::rngs::StdRng;
use std::io::{self, BufRead, Write};
use std::path::Path;
use tracing::info;
use tracing_subscriber::EnvFilter;

const CONFIG_PATH: &str = "constim.toml";

fn main() -> Result<()> {
    let config = AppConfig::load_or_default(Path::new(CONFIG_PATH));
    config
        .validate()
        .with_context(|| format!("invalid configuration in {CONFIG_PATH}"))?;
    init_tracing(&config.logging.level);

    println!("=== CONTRAST DETECTION EXPERIMENT ===");
    println!("Platform: {}", std::env::consts::OS);
    println!("Architecture: {}", std::env::consts::ARCH);

    let observer = prompt_observer()?;
    let experiment = config.experiment(&observer)?;
    let mut rng = match experiment.seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_os_rng(),
    };

    let mut session = Session::new(HighPrecisionTimer::new());
    ensure!(
        session.configure(experiment, &mut rng),
        "session was configured twice"
    );
    let store = JsonFileStore::new(&config.output.dir);
    let pacing = Pacing::from(&config.timing);

    match config.display.mode {
        DisplayMode::Console => {
            let stdin = io::stdin();
            let mut source = LineSignalSource::new(stdin.lock());
            let mut presenter = ConsolePresenter::default();
            let path = run_session(&mut session, &mut source, &mut presenter, pacing, &store)?;
            info!(path = %path.display(), presented = presenter.presented(), "results saved");
            report::print_summary(&path)?;
        }
        DisplayMode::Window => {
            let monitor = monitor_from_config(&config.monitor);
            let background = monitor.background_value(config.background.mean_luminance);
            let app = App::new(
                session,
                pacing,
                store,
                config.display.clone(),
                monitor,
                background,
                config.monitor.size_pix,
            );
            app.run()?;
        }
    }

    Ok(())
}

/// The filter comes from `[logging] level` only; the environment is not consulted.
fn init_tracing(level: &str) {
    let filter = EnvFilter::try_new(level).unwrap_or_else(|err| {
        eprintln!("Invalid logging.level {level:?}: {err}. Using info.");
        EnvFilter::new("info")
    });
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

fn prompt_observer() -> Result<String> {
    print!("Subject Name: ");
    io::stdout().flush()?;
    let mut name = String::new();
    io::stdin()
        .lock()
        .read_line(&mut name)
        .context("reading observer name")?;
    Ok(name.trim().to_string())
}

fn monitor_from_config(m: &MonitorConfig) -> Monitor {
    Monitor {
        width_cm: m.width_cm,
        distance_cm: m.distance_cm,
        width_pix: m.size_pix[0],
        gamma: m.gamma,
        max_luminance: m.max_luminance,
    }
}
