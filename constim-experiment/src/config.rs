use crate::conditions::{MAX_CONTRAST_LEVELS, contrast_level_count, contrast_range};
use anyhow::{Result, ensure};
use constim_core::{Condition, DrawRequest, StimulusKind};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;

/// How the repeated condition list is ordered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum Randomization {
    /// Every repetition is its own shuffled pass over all conditions.
    #[default]
    Block,
    /// One shuffle over the whole repeated list.
    Full,
    Sequential,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProtocolConfig {
    #[serde(default = "ProtocolConfig::default_repetitions")]
    pub repetitions: usize,
    #[serde(default)]
    pub randomization: Randomization,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seed: Option<u64>,
}

impl ProtocolConfig {
    fn default_repetitions() -> usize {
        10
    }
}

impl Default for ProtocolConfig {
    fn default() -> Self {
        Self {
            repetitions: Self::default_repetitions(),
            randomization: Randomization::default(),
            seed: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StimulusConfig {
    #[serde(default)]
    pub kind: StimulusKind,
    #[serde(default = "StimulusConfig::default_size_deg")]
    pub size_deg: f64,
    #[serde(default = "StimulusConfig::default_orientation_deg")]
    pub orientation_deg: f64,
    #[serde(default)]
    pub phase_deg: f64,
    #[serde(default)]
    pub contrast_start: f64,
    #[serde(default = "StimulusConfig::default_contrast_stop")]
    pub contrast_stop: f64,
    #[serde(default = "StimulusConfig::default_contrast_step")]
    pub contrast_step: f64,
    #[serde(default = "StimulusConfig::default_frequencies")]
    pub frequencies: Vec<f64>,
}

impl StimulusConfig {
    fn default_size_deg() -> f64 {
        5.0
    }
    fn default_orientation_deg() -> f64 {
        90.0
    }
    fn default_contrast_stop() -> f64 {
        0.25
    }
    fn default_contrast_step() -> f64 {
        0.05
    }
    fn default_frequencies() -> Vec<f64> {
        vec![0.25, 1.0, 5.0, 10.0, 20.0]
    }
}

impl Default for StimulusConfig {
    fn default() -> Self {
        Self {
            kind: StimulusKind::default(),
            size_deg: Self::default_size_deg(),
            orientation_deg: Self::default_orientation_deg(),
            phase_deg: 0.0,
            contrast_start: 0.0,
            contrast_stop: Self::default_contrast_stop(),
            contrast_step: Self::default_contrast_step(),
            frequencies: Self::default_frequencies(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackgroundConfig {
    /// cd/m²
    #[serde(default = "BackgroundConfig::default_mean_luminance")]
    pub mean_luminance: f64,
}

impl BackgroundConfig {
    fn default_mean_luminance() -> f64 {
        75.0
    }
}

impl Default for BackgroundConfig {
    fn default() -> Self {
        Self {
            mean_luminance: Self::default_mean_luminance(),
        }
    }
}

/// Physical description of the display, used for degrees → pixels and gamma.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonitorConfig {
    #[serde(default = "MonitorConfig::default_width_cm")]
    pub width_cm: f64,
    #[serde(default = "MonitorConfig::default_distance_cm")]
    pub distance_cm: f64,
    #[serde(default = "MonitorConfig::default_size_pix")]
    pub size_pix: [u32; 2],
    #[serde(default = "MonitorConfig::default_gamma")]
    pub gamma: f64,
    /// cd/m², as measured during display calibration
    #[serde(default = "MonitorConfig::default_max_luminance")]
    pub max_luminance: f64,
}

impl MonitorConfig {
    fn default_width_cm() -> f64 {
        50.0
    }
    // three screen heights away from a 30cm tall screen
    fn default_distance_cm() -> f64 {
        90.0
    }
    fn default_size_pix() -> [u32; 2] {
        [1920, 1080]
    }
    fn default_gamma() -> f64 {
        2.2
    }
    fn default_max_luminance() -> f64 {
        150.0
    }
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            width_cm: Self::default_width_cm(),
            distance_cm: Self::default_distance_cm(),
            size_pix: Self::default_size_pix(),
            gamma: Self::default_gamma(),
            max_luminance: Self::default_max_luminance(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimingConfig {
    #[serde(default = "TimingConfig::default_announce_ms")]
    pub announce_ms: u64,
    #[serde(default = "TimingConfig::default_stimulus_ms")]
    pub stimulus_ms: u64,
}

impl TimingConfig {
    fn default_announce_ms() -> u64 {
        500
    }
    fn default_stimulus_ms() -> u64 {
        500
    }

    pub fn announce(&self) -> Duration {
        Duration::from_millis(self.announce_ms)
    }

    pub fn stimulus(&self) -> Duration {
        Duration::from_millis(self.stimulus_ms)
    }
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            announce_ms: Self::default_announce_ms(),
            stimulus_ms: Self::default_stimulus_ms(),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "kebab-case")]
pub enum DisplayMode {
    #[default]
    Window,
    Console,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DisplayConfig {
    #[serde(default)]
    pub mode: DisplayMode,
    #[serde(default = "DisplayConfig::default_fullscreen")]
    pub fullscreen: bool,
    /// Tried in order; the first readable TrueType file is used for on-screen text.
    #[serde(default = "DisplayConfig::default_font_paths")]
    pub font_paths: Vec<String>,
}

impl DisplayConfig {
    fn default_fullscreen() -> bool {
        true
    }
    fn default_font_paths() -> Vec<String> {
        vec![
            "assets/DejaVuSans.ttf".to_string(),
            "/usr/share/fonts/truetype/dejavu/DejaVuSans.ttf".to_string(),
            "/usr/share/fonts/TTF/DejaVuSans.ttf".to_string(),
            "/Library/Fonts/Arial.ttf".to_string(),
            "C:\\Windows\\Fonts\\arial.ttf".to_string(),
        ]
    }
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            mode: DisplayMode::default(),
            fullscreen: Self::default_fullscreen(),
            font_paths: Self::default_font_paths(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputConfig {
    #[serde(default = "OutputConfig::default_dir")]
    pub dir: String,
}

impl OutputConfig {
    fn default_dir() -> String {
        ".".to_string()
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            dir: Self::default_dir(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// A `tracing` filter directive, e.g. `info` or `constim_experiment=debug`.
    #[serde(default = "LoggingConfig::default_level")]
    pub level: String,
}

impl LoggingConfig {
    fn default_level() -> String {
        "info".to_string()
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: Self::default_level(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub protocol: ProtocolConfig,
    #[serde(default)]
    pub stimulus: StimulusConfig,
    #[serde(default)]
    pub background: BackgroundConfig,
    #[serde(default)]
    pub monitor: MonitorConfig,
    #[serde(default)]
    pub timing: TimingConfig,
    #[serde(default)]
    pub display: DisplayConfig,
    #[serde(default)]
    pub output: OutputConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl AppConfig {
    /// Reads `path`, or writes the defaults there (commented out) when it does not exist.
    ///
    /// An unreadable or unparsable file falls back to defaults. Logging is not
    /// up yet at this point, so problems go to stderr.
    pub fn load_or_default(path: &Path) -> Self {
        if path.exists() {
            match fs::read_to_string(path) {
                Ok(contents) => match toml::from_str(&contents) {
                    Ok(cfg) => return cfg,
                    Err(err) => {
                        eprintln!(
                            "Failed to parse config {}: {err}. Using defaults.",
                            path.display()
                        );
                    }
                },
                Err(err) => {
                    eprintln!(
                        "Failed to read config {}: {err}. Using defaults.",
                        path.display()
                    );
                }
            }
            return Self::default();
        }

        let default_cfg = Self::default();
        if let Ok(text) = toml::to_string_pretty(&default_cfg) {
            let mut commented = String::new();
            for line in text.lines() {
                let trimmed = line.trim();
                if trimmed.is_empty() || (trimmed.starts_with('[') && trimmed.ends_with(']')) {
                    commented.push_str(line);
                } else {
                    commented.push_str("# ");
                    commented.push_str(line);
                }
                commented.push('\n');
            }
            if let Err(err) = fs::write(path, commented) {
                eprintln!("Failed to write default config {}: {err}", path.display());
            }
        }
        default_cfg
    }

    /// Rejects values no session could be run with.
    pub fn validate(&self) -> Result<()> {
        let s = &self.stimulus;
        ensure!(
            s.size_deg.is_finite() && s.size_deg > 0.0,
            "stimulus.size_deg must be positive, got {}",
            s.size_deg
        );
        for c in [s.contrast_start, s.contrast_stop] {
            ensure!(
                (0.0..=1.0).contains(&c),
                "contrast bounds must lie in [0, 1], got {c}"
            );
        }
        ensure!(
            s.contrast_step.is_finite() && s.contrast_step > 0.0,
            "stimulus.contrast_step must be positive, got {}",
            s.contrast_step
        );
        ensure!(
            contrast_level_count(s.contrast_start, s.contrast_stop, s.contrast_step).is_some(),
            "stimulus.contrast_step {} yields more than {MAX_CONTRAST_LEVELS} contrast levels",
            s.contrast_step
        );
        for &f in &s.frequencies {
            ensure!(
                f.is_finite() && f > 0.0,
                "stimulus frequencies must be positive, got {f}"
            );
        }

        let m = &self.monitor;
        ensure!(m.width_cm > 0.0, "monitor.width_cm must be positive");
        ensure!(m.distance_cm > 0.0, "monitor.distance_cm must be positive");
        ensure!(
            m.size_pix[0] > 0 && m.size_pix[1] > 0,
            "monitor.size_pix must be non-zero"
        );
        ensure!(m.gamma > 0.0, "monitor.gamma must be positive");
        ensure!(m.max_luminance > 0.0, "monitor.max_luminance must be positive");
        ensure!(
            (0.0..=m.max_luminance).contains(&self.background.mean_luminance),
            "background.mean_luminance must lie in [0, monitor.max_luminance]"
        );
        Ok(())
    }

    /// Builds the immutable per-session configuration for `observer`.
    pub fn experiment(&self, observer: &str) -> Result<ExperimentConfig> {
        self.validate()?;
        let s = &self.stimulus;
        Ok(ExperimentConfig {
            observer_name: observer.trim().to_string(),
            repetitions: self.protocol.repetitions,
            randomization: self.protocol.randomization,
            seed: self.protocol.seed,
            stimulus_kind: s.kind,
            stimulus_size_deg: s.size_deg,
            stimulus_orientation_deg: s.orientation_deg,
            stimulus_phase_deg: s.phase_deg,
            contrast_step: s.contrast_step,
            contrasts: contrast_range(s.contrast_start, s.contrast_stop, s.contrast_step),
            frequencies: s.frequencies.clone(),
            background_mean_luminance: self.background.mean_luminance,
        })
    }
}

/// Session parameters. Built once, read-only afterwards, and saved alongside the answers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExperimentConfig {
    pub observer_name: String,
    pub repetitions: usize,
    pub randomization: Randomization,
    pub seed: Option<u64>,
    pub stimulus_kind: StimulusKind,
    pub stimulus_size_deg: f64,
    pub stimulus_orientation_deg: f64,
    pub stimulus_phase_deg: f64,
    pub contrast_step: f64,
    pub contrasts: Vec<f64>,
    /// Cycles per degree.
    pub frequencies: Vec<f64>,
    /// cd/m²
    pub background_mean_luminance: f64,
}

impl ExperimentConfig {
    /// Default stimulus parameters with the given levels.
    pub fn new(
        observer: &str,
        contrasts: Vec<f64>,
        frequencies: Vec<f64>,
        repetitions: usize,
    ) -> Self {
        let stimulus = StimulusConfig::default();
        Self {
            observer_name: observer.to_string(),
            repetitions,
            randomization: Randomization::default(),
            seed: None,
            stimulus_kind: stimulus.kind,
            stimulus_size_deg: stimulus.size_deg,
            stimulus_orientation_deg: stimulus.orientation_deg,
            stimulus_phase_deg: stimulus.phase_deg,
            contrast_step: stimulus.contrast_step,
            contrasts,
            frequencies,
            background_mean_luminance: BackgroundConfig::default().mean_luminance,
        }
    }

    pub fn with_randomization(mut self, randomization: Randomization) -> Self {
        self.randomization = randomization;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    pub fn with_kind(mut self, kind: StimulusKind) -> Self {
        self.stimulus_kind = kind;
        self
    }

    pub fn draw_request(&self, condition: &Condition) -> DrawRequest {
        DrawRequest {
            contrast: condition.contrast,
            frequency: condition.frequency,
            size_deg: self.stimulus_size_deg,
            orientation_deg: self.stimulus_orientation_deg,
            phase_deg: self.stimulus_phase_deg,
            mask: self.stimulus_kind.mask(),
        }
    }
}
