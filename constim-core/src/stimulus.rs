use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum StimulusKind {
    #[serde(alias = "sin", alias = "grating")]
    PlainGrating,
    #[default]
    Gabor,
}

impl StimulusKind {
    pub fn mask(&self) -> Mask {
        match self {
            StimulusKind::PlainGrating => Mask::None,
            StimulusKind::Gabor => Mask::Gauss,
        }
    }
}

/// Envelope applied on top of the sinusoid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Mask {
    None,
    Gauss,
}

/// One (contrast, frequency) pairing. `index` is its position in enumeration order.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Condition {
    pub index: usize,
    pub contrast: f64,
    /// Cycles per degree.
    pub frequency: f64,
}

impl Condition {
    pub fn same_levels(&self, other: &Condition) -> bool {
        self.contrast == other.contrast && self.frequency == other.frequency
    }
}

/// Everything the presenter needs to draw one stimulus.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DrawRequest {
    pub contrast: f64,
    pub frequency: f64,
    pub size_deg: f64,
    pub orientation_deg: f64,
    pub phase_deg: f64,
    pub mask: Mask,
}
