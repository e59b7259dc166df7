/// Physical display geometry and luminance response.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Monitor {
    pub width_cm: f64,
    pub distance_cm: f64,
    /// Horizontal resolution the width above refers to.
    pub width_pix: u32,
    pub gamma: f64,
    /// cd/m²
    pub max_luminance: f64,
}

impl Default for Monitor {
    fn default() -> Self {
        Self {
            width_cm: 50.0,
            distance_cm: 90.0,
            width_pix: 1920,
            gamma: 2.2,
            max_luminance: 150.0,
        }
    }
}

impl Monitor {
    /// Pixels per degree of visual angle (small-angle approximation).
    pub fn pixels_per_degree(&self) -> f64 {
        self.distance_cm * std::f64::consts::PI / 180.0 * self.width_pix as f64 / self.width_cm
    }

    pub fn deg_to_pix(&self, deg: f64) -> f64 {
        deg * self.pixels_per_degree()
    }

    /// Mean luminance in cd/m² mapped onto the [-1, 1] signal range.
    pub fn background_value(&self, mean_luminance: f64) -> f64 {
        (-1.0 + 2.0 * mean_luminance / self.max_luminance).clamp(-1.0, 1.0)
    }

    /// Gamma-encoded 8-bit gray level for a signal value in [-1, 1].
    pub fn encode(&self, value: f64) -> u8 {
        let linear = ((value.clamp(-1.0, 1.0) + 1.0) * 0.5).powf(1.0 / self.gamma);
        (linear * 255.0).round() as u8
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_geometry_is_about_sixty_pixels_per_degree() {
        let m = Monitor::default();
        let ppd = m.pixels_per_degree();
        assert!((ppd - 60.319).abs() < 0.01, "{ppd}");
        assert!((m.deg_to_pix(5.0) - 5.0 * ppd).abs() < 1e-9);
    }

    #[test]
    fn background_maps_half_max_to_zero() {
        let m = Monitor::default();
        assert_eq!(m.background_value(75.0), 0.0);
        assert_eq!(m.background_value(0.0), -1.0);
        assert_eq!(m.background_value(150.0), 1.0);
        assert_eq!(m.background_value(400.0), 1.0);
    }

    #[test]
    fn encoding_is_gamma_corrected_and_monotonic() {
        let m = Monitor::default();
        assert_eq!(m.encode(-1.0), 0);
        assert_eq!(m.encode(1.0), 255);
        // 0.5 linear → 0.5^(1/2.2) ≈ 0.7297
        assert_eq!(m.encode(0.0), 186);
        let linear = Monitor { gamma: 1.0, ..m };
        assert_eq!(linear.encode(0.0), 128);
        let mut prev = 0;
        for i in 0..=20 {
            let v = m.encode(-1.0 + i as f64 * 0.1);
            assert!(v >= prev);
            prev = v;
        }
    }
}
