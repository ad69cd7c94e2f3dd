//! Cascaded second-order (biquad) IIR filter sections.
//!
//! Direct Form I difference equation per section:
//! ```text
//! y0 = (b0·x0 + b1·x1 + b2·x2 − a1·y1 − a2·y2) / a0
//! ```
//! Sections are evaluated first-to-last, each section's output feeding the
//! next section's input. Saturation applies to the final section's output
//! only, and the saturated value is what enters that section's output
//! history.

use sea_common::config::{BiquadConfig, ConfigError};

/// One second-order section: coefficient set plus two-sample input/output
/// history. Owned exclusively by the cascade it belongs to.
#[derive(Debug, Clone, Copy)]
pub struct BiquadSection {
    b0: f64,
    b1: f64,
    b2: f64,
    a0: f64,
    a1: f64,
    a2: f64,
    x1: f64, // x[n-1]
    x2: f64, // x[n-2]
    y1: f64, // y[n-1]
    y2: f64, // y[n-2]
}

impl BiquadSection {
    fn from_config(c: &BiquadConfig) -> Self {
        Self {
            b0: c.b0,
            b1: c.b1,
            b2: c.b2,
            a0: c.a0,
            a1: c.a1,
            a2: c.a2,
            x1: 0.0,
            x2: 0.0,
            y1: 0.0,
            y2: 0.0,
        }
    }

    /// One difference-equation step using the pre-update history values.
    ///
    /// When `clamp` is set the output is saturated before the history
    /// shift, so the clamped value is what the section remembers.
    #[inline]
    fn step(&mut self, x0: f64, clamp: Option<(f64, f64)>) -> f64 {
        let mut y0 = (self.b0 * x0 + self.b1 * self.x1 + self.b2 * self.x2
            - self.a1 * self.y1
            - self.a2 * self.y2)
            / self.a0;

        if let Some((lo, hi)) = clamp {
            y0 = y0.clamp(lo, hi);
        }

        self.x2 = self.x1;
        self.x1 = x0;
        self.y2 = self.y1;
        self.y1 = y0;

        y0
    }

    /// Zero the history, preserving coefficients.
    #[inline]
    fn reset(&mut self) {
        self.x1 = 0.0;
        self.x2 = 0.0;
        self.y1 = 0.0;
        self.y2 = 0.0;
    }

    #[cfg(test)]
    fn output_history(&self) -> (f64, f64) {
        (self.y1, self.y2)
    }
}

/// Ordered cascade of biquad sections.
///
/// Section order is fixed at construction. `process` mutates every
/// section's history in place — at most one caller per cascade per tick.
#[derive(Debug, Clone)]
pub struct FilterCascade {
    sections: Vec<BiquadSection>,
}

impl FilterCascade {
    /// Build a cascade from a coefficient table.
    ///
    /// Rejects an empty table and any section with a (near-)zero `a0`,
    /// so a malformed cascade never reaches the control loop.
    pub fn from_config(sections: &[BiquadConfig]) -> Result<Self, ConfigError> {
        if sections.is_empty() {
            return Err(ConfigError::Validation("cascade has no sections".into()));
        }
        for (i, c) in sections.iter().enumerate() {
            c.validate()
                .map_err(|e| ConfigError::Validation(format!("section {i}: {e}")))?;
        }
        Ok(Self {
            sections: sections.iter().map(BiquadSection::from_config).collect(),
        })
    }

    /// A single unity section (`b0 = a0 = 1`): passes input through
    /// unchanged apart from the final clamp.
    pub fn unity() -> Self {
        Self {
            sections: vec![BiquadSection::from_config(&BiquadConfig {
                b0: 1.0,
                b1: 0.0,
                b2: 0.0,
                a0: 1.0,
                a1: 0.0,
                a2: 0.0,
            })],
        }
    }

    /// Number of sections.
    #[inline]
    pub fn len(&self) -> usize {
        self.sections.len()
    }

    /// Whether the cascade has no sections (never true for a constructed one).
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.sections.is_empty()
    }

    /// Zero all section history, preserving coefficients.
    pub fn reset(&mut self) {
        for s in &mut self.sections {
            s.reset();
        }
    }

    /// Push one sample through the cascade.
    ///
    /// The saturating clamp to `[out_min, out_max]` is applied to the final
    /// section's output only; intermediate sections are never clamped.
    /// Caller guarantees `out_min <= out_max`.
    #[inline]
    pub fn process(&mut self, input: f64, out_min: f64, out_max: f64) -> f64 {
        let last = self.sections.len() - 1;
        let mut y0 = input;
        for (i, section) in self.sections.iter_mut().enumerate() {
            let clamp = (i == last).then_some((out_min, out_max));
            y0 = section.step(y0, clamp);
        }
        y0
    }
}

// ─── Tests ──────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn section(b0: f64, b1: f64, b2: f64, a0: f64, a1: f64, a2: f64) -> BiquadConfig {
        BiquadConfig {
            b0,
            b1,
            b2,
            a0,
            a1,
            a2,
        }
    }

    const WIDE: (f64, f64) = (-1e9, 1e9);

    #[test]
    fn unity_section_is_identity() {
        let mut cascade = FilterCascade::unity();
        for x in [0.0, 1.0, -3.5, 1e6, -1e-9, 42.42] {
            let y = cascade.process(x, WIDE.0, WIDE.1);
            assert_eq!(y, x, "unity cascade must pass {x} through");
        }
    }

    #[test]
    fn output_always_within_clamp_range() {
        let mut cascade =
            FilterCascade::from_config(&[section(100.0, 0.0, 0.0, 1.0, 0.0, 0.0)]).unwrap();
        for x in [-10.0, -1.0, 0.0, 0.01, 1.0, 10.0] {
            let y = cascade.process(x, -7.5, 7.5);
            assert!((-7.5..=7.5).contains(&y), "output {y} escaped clamp");
        }
    }

    #[test]
    fn clamped_value_enters_output_history() {
        // y = x + 0.5·y1 with a tight clamp: history must hold the clamped
        // output, not the raw one.
        let mut cascade =
            FilterCascade::from_config(&[section(1.0, 0.0, 0.0, 1.0, -0.5, 0.0)]).unwrap();
        let y = cascade.process(100.0, -1.0, 1.0);
        assert_eq!(y, 1.0);
        assert_eq!(cascade.sections[0].output_history().0, 1.0);
        // Next step: y = 0 + 0.5·1.0 = 0.5, not 0.5·100.
        let y = cascade.process(0.0, -1.0, 1.0);
        assert!((y - 0.5).abs() < 1e-12);
    }

    #[test]
    fn intermediate_sections_are_never_clamped() {
        // First section is a gain of 10, second delays its input by one
        // sample (b1 = 1). If the intermediate value were clamped, the
        // delayed sample would come out at 0.5 instead of 10.
        let sections = [
            section(10.0, 0.0, 0.0, 1.0, 0.0, 0.0),
            section(0.0, 1.0, 0.0, 1.0, 0.0, 0.0),
        ];
        let mut cascade = FilterCascade::from_config(&sections).unwrap();

        let y = cascade.process(1.0, -0.5, 0.5);
        assert_eq!(y, 0.0); // delay section has empty history
        let y = cascade.process(0.0, -100.0, 100.0);
        assert_eq!(y, 10.0, "intermediate output must be stored unclamped");
    }

    #[test]
    fn a0_normalizes_the_output() {
        let mut cascade =
            FilterCascade::from_config(&[section(1.0, 0.0, 0.0, 2.0, 0.0, 0.0)]).unwrap();
        let y = cascade.process(3.0, WIDE.0, WIDE.1);
        assert!((y - 1.5).abs() < 1e-12);
    }

    #[test]
    fn known_first_order_response() {
        // y[n] = x[n] + 0.5·y[n-1]: impulse response 1, 0.5, 0.25, ...
        let mut cascade =
            FilterCascade::from_config(&[section(1.0, 0.0, 0.0, 1.0, -0.5, 0.0)]).unwrap();
        let inputs = [1.0, 0.0, 0.0, 0.0];
        let expected = [1.0, 0.5, 0.25, 0.125];
        for (x, want) in inputs.iter().zip(expected) {
            let y = cascade.process(*x, WIDE.0, WIDE.1);
            assert!((y - want).abs() < 1e-12, "got {y}, want {want}");
        }
    }

    #[test]
    fn cascade_matches_sequential_single_sections() {
        // Feeding a stream through a 3-section cascade must equal chaining
        // three independent single-section cascades sample by sample.
        let coeffs = section(0.2, 0.3, 0.1, 1.0, -0.4, 0.05);
        let mut cascade = FilterCascade::from_config(&[coeffs; 3]).unwrap();
        let mut stages: Vec<FilterCascade> = (0..3)
            .map(|_| FilterCascade::from_config(&[coeffs]).unwrap())
            .collect();

        let stream = [1.0, -0.5, 2.0, 0.0, 0.25, -1.75, 3.0, 0.0];
        for x in stream {
            let combined = cascade.process(x, WIDE.0, WIDE.1);
            let mut y = x;
            for stage in &mut stages {
                y = stage.process(y, WIDE.0, WIDE.1);
            }
            assert!(
                (combined - y).abs() < 1e-12,
                "cascade {combined} != chained {y}"
            );
        }
    }

    #[test]
    fn reset_zeroes_history_and_keeps_coefficients() {
        let mut cascade =
            FilterCascade::from_config(&[section(1.0, 0.0, 0.0, 1.0, -0.9, 0.0)]).unwrap();
        for _ in 0..10 {
            cascade.process(1.0, WIDE.0, WIDE.1);
        }
        cascade.reset();
        let y = cascade.process(1.0, WIDE.0, WIDE.1);
        assert_eq!(y, 1.0, "post-reset step must behave like the first step");
    }

    #[test]
    fn empty_table_rejected() {
        assert!(FilterCascade::from_config(&[]).is_err());
    }

    #[test]
    fn zero_a0_rejected() {
        let err = FilterCascade::from_config(&[section(1.0, 0.0, 0.0, 0.0, 0.0, 0.0)]);
        assert!(err.is_err());
    }
}
