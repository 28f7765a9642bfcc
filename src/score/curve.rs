//! Tempo curve interpolation.
//!
//! A curve runs from the pulse bpm of its start state to the pulse bpm of its
//! end state. Progress is measured in beats and offset by one beat, so the
//! first beat of a curve is already moving away from the start tempo and the
//! end tempo is only reached at the end state.

use serde::{Deserialize, Serialize};

/// A curve resolved against the interpreter's beat index.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CurveSpan {
    pub start_bpm: f64,
    pub end_bpm: f64,
    pub exponent: f64,
    /// Global beat index of the curve start.
    pub start_index: f64,
    /// Beats between the curve start and end.
    pub total_beats: f64,
}

impl CurveSpan {
    /// Pulse bpm of the beat that starts at global beat index `index`.
    pub fn bpm_at(&self, index: f64) -> f64 {
        let elapsed = index - self.start_index;
        let norm = ((elapsed + 1.0) / (self.total_beats + 1.0)).clamp(0.0, 1.0);
        interpolate(self.start_bpm, self.end_bpm, norm, self.exponent)
    }
}

/// `start + (end - start) * norm^exponent`; `exponent = 1` is linear.
pub fn interpolate(start: f64, end: f64, norm: f64, exponent: f64) -> f64 {
    start + (end - start) * norm.clamp(0.0, 1.0).powf(exponent)
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_approx_eq::assert_approx_eq;

    fn span(exponent: f64) -> CurveSpan {
        CurveSpan {
            start_bpm: 60.0,
            end_bpm: 120.0,
            exponent,
            start_index: 0.0,
            total_beats: 4.0,
        }
    }

    #[test]
    fn linear_curve_is_offset_by_one_beat() {
        let curve = span(1.0);
        assert_approx_eq!(curve.bpm_at(0.0), 72.0);
        assert_approx_eq!(curve.bpm_at(1.0), 84.0);
        assert_approx_eq!(curve.bpm_at(2.0), 96.0);
        assert_approx_eq!(curve.bpm_at(3.0), 108.0);
    }

    #[test]
    fn curve_reaches_end_at_end_state() {
        assert_approx_eq!(span(1.0).bpm_at(4.0), 120.0);
        assert_approx_eq!(span(2.0).bpm_at(4.0), 120.0);
    }

    #[test]
    fn curve_clamps_outside_range() {
        let curve = span(1.0);
        assert_approx_eq!(curve.bpm_at(-5.0), 60.0);
        assert_approx_eq!(curve.bpm_at(40.0), 120.0);
    }

    #[test]
    fn exponent_shapes_the_curve() {
        let fast = span(0.5).bpm_at(1.0);
        let linear = span(1.0).bpm_at(1.0);
        let slow = span(2.0).bpm_at(1.0);
        assert!(fast > linear && linear > slow);
    }

    #[test]
    fn decelerating_curve() {
        assert_approx_eq!(interpolate(120.0, 60.0, 0.5, 1.0), 90.0);
        assert_approx_eq!(interpolate(120.0, 60.0, 0.0, 3.0), 120.0);
    }
}
