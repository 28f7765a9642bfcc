//! Derived pulse and beat grouping of a compiled state.
//!
//! A beat is the pulse `1/lower` of the signature, except in irregular meters
//! where each beat is one group of the meter (`3+2+2/8` has three beats of
//! 3, 2 and 2 eighths). Bars with an absolute duration have a single beat.

use serde::{Deserialize, Serialize};

use crate::soap::ast::CompiledState;
use crate::soap::signature::{SignatureKind, TempoBasis};

use super::location::{Location, BEAT_EPSILON};

/// The pulse of a state: `bpm` pulses of `upper/lower` per minute.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Unit {
    pub upper: u32,
    pub lower: u32,
    pub bpm: f64,
}

impl Unit {
    /// Seconds per pulse.
    pub fn seconds(&self) -> f64 {
        60.0 / self.bpm
    }
}

/// Compute the pulse of a state. `None` for a signature bar without tempo.
pub fn unit_of(state: &CompiledState) -> Option<Unit> {
    if let Some(duration) = state.duration {
        return Some(Unit {
            upper: 1,
            lower: 1,
            bpm: 60.0 / duration,
        });
    }
    let signature = state.signature.as_ref()?;
    let tempo = state.tempo.as_ref()?;
    Some(Unit {
        upper: 1,
        lower: signature.lower,
        bpm: tempo.bpm * tempo.basis.upper as f64 * signature.lower as f64
            / tempo.basis.lower as f64,
    })
}

/// Length of each beat of the bar in pulses.
pub fn beat_groups(state: &CompiledState) -> Vec<f64> {
    if state.duration.is_some() {
        return vec![1.0];
    }
    match &state.signature {
        Some(sig) if sig.kind == SignatureKind::Irregular => {
            sig.default_units().into_iter().map(f64::from).collect()
        }
        Some(sig) => vec![1.0; sig.upper as usize],
        None => Vec::new(),
    }
}

/// Pulses elapsed in the bar before `beat`.
pub fn units_before(groups: &[f64], beat: f64) -> f64 {
    if groups.is_empty() {
        return 0.0;
    }
    let whole = (beat.floor() as usize).clamp(1, groups.len());
    let full: f64 = groups[..whole - 1].iter().sum();
    full + (beat - whole as f64) * groups[whole - 1]
}

/// Beat reached after `units` pulses into the bar.
pub fn beat_at_units(groups: &[f64], units: f64) -> f64 {
    let mut acc = 0.0;
    for (idx, group) in groups.iter().enumerate() {
        if units < acc + group - BEAT_EPSILON {
            return snap(idx as f64 + 1.0 + (units - acc) / group);
        }
        acc += group;
    }
    groups.len() as f64 + 1.0
}

/// Location reached by holding `basis` from `location` in `state`'s meter.
///
/// Absolute-duration bars hold until the start of the next bar. `None` when
/// the result would pass the last representable bar.
pub fn advance_by_basis(
    state: &CompiledState,
    location: Location,
    basis: &TempoBasis,
) -> Option<Location> {
    let Some(signature) = state.signature.as_ref().filter(|_| state.duration.is_none()) else {
        return Some(Location::new(location.bar.checked_add(1)?, 1.0));
    };

    let groups = beat_groups(state);
    let bar_units: f64 = groups.iter().sum();
    let offset = units_before(&groups, location.beat) + basis.value() * signature.lower as f64;

    let mut bars = (offset / bar_units).floor();
    let mut rest = offset - bars * bar_units;
    if bar_units - rest < BEAT_EPSILON {
        bars += 1.0;
        rest = 0.0;
    }

    Some(Location::new(
        add_bars(location.bar, bars)?,
        beat_at_units(&groups, rest),
    ))
}

/// `bar + bars`, or `None` past `u32::MAX`.
pub fn add_bars(bar: u32, bars: f64) -> Option<u32> {
    if !(bars >= 0.0) || bars > f64::from(u32::MAX - bar) {
        return None;
    }
    Some(bar + bars as u32)
}

/// Round beats that land within [`BEAT_EPSILON`] of a whole beat.
pub fn snap(beat: f64) -> f64 {
    let rounded = beat.round();
    if (beat - rounded).abs() < BEAT_EPSILON {
        rounded
    } else {
        beat
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::soap::ast::Tempo;
    use crate::soap::signature::{parse_tempo_basis, parse_time_signature};
    use assert_approx_eq::assert_approx_eq;

    fn state(sig: &str, basis: &str, bpm: f64) -> CompiledState {
        let mut s = CompiledState::at(Location::START);
        s.signature = Some(parse_time_signature(sig).unwrap());
        s.tempo = Some(Tempo {
            basis: parse_tempo_basis(basis).unwrap(),
            bpm,
            curve: None,
            equivalence: None,
        });
        s
    }

    #[test]
    fn simple_unit() {
        let unit = unit_of(&state("[4/4]", "[1/4]", 60.0)).unwrap();
        assert_eq!((unit.upper, unit.lower), (1, 4));
        assert_approx_eq!(unit.bpm, 60.0);
        assert_approx_eq!(unit.seconds(), 1.0);
    }

    #[test]
    fn unit_converts_basis() {
        // dotted quarter at 60 → eighths at 180
        let unit = unit_of(&state("[6/8]", "[3/8]", 60.0)).unwrap();
        assert_eq!(unit.lower, 8);
        assert_approx_eq!(unit.bpm, 180.0);

        // eighth at 120 in 4/4 → quarter at 60
        let unit = unit_of(&state("[4/4]", "[1/8]", 120.0)).unwrap();
        assert_approx_eq!(unit.bpm, 60.0);
    }

    #[test]
    fn duration_unit() {
        let mut s = CompiledState::at(Location::START);
        s.duration = Some(4.0);
        let unit = unit_of(&s).unwrap();
        assert_eq!((unit.upper, unit.lower), (1, 1));
        assert_approx_eq!(unit.seconds(), 4.0);
        assert_eq!(beat_groups(&s), vec![1.0]);
    }

    #[test]
    fn signature_without_tempo_has_no_unit() {
        let mut s = CompiledState::at(Location::START);
        s.signature = Some(parse_time_signature("[4/4]").unwrap());
        assert!(unit_of(&s).is_none());
    }

    #[test]
    fn groups_by_meter() {
        assert_eq!(beat_groups(&state("[6/8]", "[3/8]", 60.0)).len(), 6);
        assert_eq!(
            beat_groups(&state("[5/8]", "[3/8]", 60.0)),
            vec![3.0, 2.0]
        );
    }

    #[test]
    fn units_round_trip() {
        let groups = vec![3.0, 2.0, 2.0];
        assert_approx_eq!(units_before(&groups, 1.0), 0.0);
        assert_approx_eq!(units_before(&groups, 2.0), 3.0);
        assert_approx_eq!(units_before(&groups, 2.5), 4.0);
        assert_approx_eq!(beat_at_units(&groups, 4.0), 2.5);
        assert_approx_eq!(beat_at_units(&groups, 5.0), 3.0);
    }

    #[test]
    fn advance_within_bar() {
        let s = state("[4/4]", "[1/4]", 60.0);
        let basis = parse_tempo_basis("[1/4]").unwrap();
        assert_eq!(
            advance_by_basis(&s, Location::new(1, 2.0), &basis),
            Some(Location::new(1, 3.0))
        );
    }

    #[test]
    fn advance_rolls_into_next_bar() {
        let s = state("[4/4]", "[1/4]", 60.0);
        let half = parse_tempo_basis("[1/2]").unwrap();
        assert_eq!(
            advance_by_basis(&s, Location::new(3, 4.0), &half),
            Some(Location::new(4, 2.0))
        );
        let quarter = parse_tempo_basis("[1/4]").unwrap();
        assert_eq!(
            advance_by_basis(&s, Location::new(3, 4.0), &quarter),
            Some(Location::new(4, 1.0))
        );
    }

    #[test]
    fn advance_in_compound_meter_counts_pulses() {
        let s = state("[6/8]", "[3/8]", 60.0);
        let basis = parse_tempo_basis("[3/8]").unwrap();
        assert_eq!(
            advance_by_basis(&s, Location::new(1, 1.0), &basis),
            Some(Location::new(1, 4.0))
        );
    }

    #[test]
    fn advance_in_duration_bar_goes_to_next_bar() {
        let mut s = CompiledState::at(Location::new(5, 1.0));
        s.duration = Some(3.0);
        let basis = parse_tempo_basis("[1/4]").unwrap();
        assert_eq!(
            advance_by_basis(&s, Location::new(5, 1.0), &basis),
            Some(Location::new(6, 1.0))
        );
    }

    #[test]
    fn advance_past_last_bar_is_none() {
        let s = state("[4/4]", "[1/4]", 60.0);
        let half = parse_tempo_basis("[1/2]").unwrap();
        assert_eq!(
            advance_by_basis(&s, Location::new(u32::MAX, 4.0), &half),
            None
        );
        assert_eq!(
            advance_by_basis(&s, Location::new(u32::MAX, 2.0), &half),
            Some(Location::new(u32::MAX, 4.0))
        );
    }

    #[test]
    fn add_bars_checks_range() {
        assert_eq!(add_bars(1, 3.0), Some(4));
        assert_eq!(add_bars(u32::MAX - 1, 1.0), Some(u32::MAX));
        assert_eq!(add_bars(u32::MAX, 1.0), None);
        assert_eq!(add_bars(1, 1e300), None);
    }
}
