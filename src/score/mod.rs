//! Score interpreter — location ↔ position queries over compiled states.
//!
//! The [`Interpreter`] annotates every [`CompiledState`] once at construction
//! with its pulse [`Unit`], beat grouping, global beat index, resolved tempo
//! curve and position in seconds. Queries are then pure lookups plus a walk
//! inside a single state's span, so an interpreter can be shared freely
//! between readers.
//!
//! Fermata spans take their real duration in the position timeline: the
//! absolute duration, `factor ×` the nominal span, or the nominal span for a
//! suspended fermata, whose release time is unknown.

pub mod curve;
pub mod location;
pub mod timeline;
pub mod unit;

pub use curve::CurveSpan;
pub use location::Location;
pub use timeline::Timeline;
pub use unit::Unit;

use serde::Serialize;
use tracing::debug;

use crate::soap::ast::{CompiledState, FermataDuration};
use crate::soap::{Soap, SoapError};

use location::BEAT_EPSILON;
use unit::{add_bars, beat_at_units, beat_groups, snap, unit_of, units_before};

/// Timing information at a location.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LocationInfos {
    pub location: Location,
    /// Pulse at the location; under a curve `bpm` is the curve's bpm there.
    pub unit: Unit,
    /// Seconds from score start.
    pub position: f64,
    /// Nominal seconds to the next whole beat.
    pub duration: f64,
    /// Seconds to the next scheduled occurrence; `+∞` under a suspended fermata.
    pub dt: f64,
    /// The state declared exactly at this location, if any.
    pub event: Option<CompiledState>,
}

/// A compiled state with its derived timing annotations.
#[derive(Debug, Clone)]
struct Annotated {
    state: CompiledState,
    unit: Unit,
    /// Beat lengths in pulses; one entry per beat of the bar.
    groups: Vec<f64>,
    /// Beats elapsed from (1, 1) to this state.
    beat_index: f64,
    /// Seconds elapsed from (1, 1) to this state.
    position: f64,
    /// Real-to-nominal time ratio of the span that starts here.
    scale: f64,
    curve: Option<CurveSpan>,
}

impl Annotated {
    fn location(&self) -> Location {
        self.state.location()
    }

    fn num_beats(&self) -> usize {
        self.groups.len()
    }

    fn bar_units(&self) -> f64 {
        self.groups.iter().sum()
    }

    /// Global beat index of `location`, counted in this state's meter.
    fn index_at(&self, location: Location) -> f64 {
        self.beat_index
            + (location.bar as f64 - self.state.bar as f64) * self.num_beats() as f64
            + (location.beat - self.state.beat)
    }

    /// The whole beat containing `location`.
    fn beat_start(&self, location: Location) -> Location {
        let whole = location.beat.floor().clamp(1.0, self.num_beats() as f64);
        Location::new(location.bar, whole)
    }

    /// The whole beat following the beat that starts at `start`.
    ///
    /// Query locations never sit on the last representable bar.
    fn next_beat(&self, start: Location) -> Location {
        if start.beat as usize >= self.num_beats() {
            Location::new(start.bar.saturating_add(1), 1.0)
        } else {
            Location::new(start.bar, start.beat + 1.0)
        }
    }

    fn bpm_at(&self, start: Location) -> f64 {
        match &self.curve {
            Some(curve) => curve.bpm_at(self.index_at(start)),
            None => self.unit.bpm,
        }
    }

    fn beat_seconds(&self, start: Location) -> f64 {
        let group = self.groups[start.beat as usize - 1];
        group * 60.0 / self.bpm_at(start)
    }

    /// Nominal seconds from `from` to `to` within this state's span.
    fn elapsed(&self, from: Location, to: Location) -> f64 {
        if !from.before(&to) {
            return 0.0;
        }

        if self.curve.is_none() {
            let pulse = self.unit.seconds();
            let bars = to.bar as f64 - from.bar as f64;
            let units = bars * self.bar_units() + units_before(&self.groups, to.beat)
                - units_before(&self.groups, from.beat);
            return units * pulse;
        }

        let mut cursor = from;
        let mut total = 0.0;
        while cursor.before(&to) {
            let start = self.beat_start(cursor);
            let seconds = self.beat_seconds(start);
            let next = self.next_beat(start);
            if to.before(&next) {
                total += seconds * (to.beat - cursor.beat);
                break;
            }
            total += seconds * (start.beat + 1.0 - cursor.beat);
            cursor = next;
        }
        total
    }

    /// Location reached `seconds` of nominal time after `from`.
    fn advance(&self, from: Location, seconds: f64) -> Result<Location, SoapError> {
        if self.curve.is_none() {
            let bar_units = self.bar_units();
            let offset = units_before(&self.groups, from.beat) + seconds / self.unit.seconds();
            let mut bars = (offset / bar_units).floor();
            let mut rest = offset - bars * bar_units;
            if bar_units - rest < BEAT_EPSILON {
                bars += 1.0;
                rest = 0.0;
            }
            let bar = add_bars(from.bar, bars).ok_or_else(past_last_bar)?;
            return Ok(Location::new(bar, beat_at_units(&self.groups, rest)));
        }

        let mut cursor = from;
        let mut left = seconds;
        loop {
            let start = self.beat_start(cursor);
            let beat_seconds = self.beat_seconds(start);
            let remaining = beat_seconds * (start.beat + 1.0 - cursor.beat);
            if left < remaining - BEAT_EPSILON {
                return Ok(Location::new(cursor.bar, snap(cursor.beat + left / beat_seconds)));
            }
            left -= remaining;
            if cursor.bar == u32::MAX {
                return Err(past_last_bar());
            }
            cursor = self.next_beat(start);
            if left <= BEAT_EPSILON {
                return Ok(cursor);
            }
        }
    }
}

/// Answers location ↔ position queries for one compiled score.
#[derive(Debug, Clone)]
pub struct Interpreter {
    states: Vec<Annotated>,
}

impl Interpreter {
    /// Build an interpreter from compiled states.
    pub fn new(states: Vec<CompiledState>) -> Result<Self, SoapError> {
        if states.is_empty() {
            return Err(SoapError::invalid_argument("a score needs at least one state"));
        }

        let mut annotated: Vec<Annotated> = Vec::with_capacity(states.len());
        for state in states {
            let describe = || format!("state at {}", state.location());
            let unit = unit_of(&state).ok_or_else(|| {
                SoapError::invariant("a bar with a time signature needs a tempo", describe())
            })?;
            let groups = beat_groups(&state);
            if groups.is_empty() {
                return Err(SoapError::invariant(
                    "state has neither a signature nor a duration",
                    describe(),
                ));
            }

            let beat_index = match annotated.last() {
                Some(prev) => {
                    if !prev.location().before(&state.location()) {
                        return Err(SoapError::invariant("states are not in order", describe()));
                    }
                    prev.index_at(state.location())
                }
                None => {
                    (state.bar as f64 - 1.0) * groups.len() as f64 + (state.beat - 1.0)
                }
            };

            annotated.push(Annotated {
                state,
                unit,
                groups,
                beat_index,
                position: 0.0,
                scale: 1.0,
                curve: None,
            });
        }

        resolve_curves(&mut annotated)?;
        resolve_positions(&mut annotated);

        debug!(states = annotated.len(), "built score interpreter");
        Ok(Self { states: annotated })
    }

    /// Parse score text and build its interpreter.
    pub fn parse(source: &str) -> Result<Self, SoapError> {
        Self::new(Soap::parse(source)?)
    }

    /// The compiled states, in score order.
    pub fn states(&self) -> impl Iterator<Item = &CompiledState> {
        self.states.iter().map(|a| &a.state)
    }

    /// Location of the `END` marker, if the score declares one.
    pub fn end_location(&self) -> Option<Location> {
        self.states
            .iter()
            .find(|a| a.state.end)
            .map(Annotated::location)
    }

    /// Location reached `position` seconds after score start.
    pub fn location_at_position(&self, position: f64) -> Result<Location, SoapError> {
        if !(position >= 0.0) || !position.is_finite() {
            return Err(SoapError::invalid_argument(format!(
                "position must be a non-negative number of seconds, got {position}"
            )));
        }

        let index = self
            .states
            .partition_point(|a| a.position <= position + BEAT_EPSILON)
            .saturating_sub(1);
        let span = &self.states[index];

        let location = if position < span.position {
            span.advance(Location::START, position)?
        } else {
            span.advance(span.location(), (position - span.position) / span.scale)?
        };
        self.canonical(location)
    }

    /// Seconds from score start to `(bar, beat)`.
    pub fn position_at_location(&self, bar: u32, beat: f64) -> Result<f64, SoapError> {
        let location = self.checked(bar, beat)?;
        Ok(self.position_of(location))
    }

    /// Timing information at `(bar, beat)`.
    pub fn location_infos(&self, bar: u32, beat: f64) -> Result<LocationInfos, SoapError> {
        let location = self.checked(bar, beat)?;
        Ok(self.infos_at(location))
    }

    /// Timing information at the next scheduled occurrence after `(bar, beat)`:
    /// the next whole beat, an earlier state in between, or the release of the
    /// fermata the location is under. `None` at or after the declared end.
    pub fn next_location_infos(
        &self,
        bar: u32,
        beat: f64,
    ) -> Result<Option<LocationInfos>, SoapError> {
        let location = self.checked(bar, beat)?;
        if self
            .end_location()
            .is_some_and(|end| !location.before(&end))
        {
            return Ok(None);
        }

        let index = self.state_index(location);
        let span = &self.states[index];
        let following = self.following(index, location);
        let held = self.covers(index, location) && span.state.fermata.is_some();

        let next = match following {
            Some(release) if held => release.location(),
            _ => {
                let boundary = span.next_beat(span.beat_start(location));
                match following {
                    Some(state) if state.location().before(&boundary) => state.location(),
                    _ => boundary,
                }
            }
        };

        Ok(Some(self.infos_at(self.canonical(next)?)))
    }

    /// Nominal duration of the whole beat containing `(bar, beat)`.
    pub fn beat_duration(&self, bar: u32, beat: f64) -> Result<f64, SoapError> {
        let location = self.checked(bar, beat)?;
        let span = &self.states[self.state_index(location)];
        let start = span.beat_start(location);
        Ok(self.nominal_between(start, span.next_beat(start)))
    }

    /// Pulse bpm at `(bar, beat)` when the location is under a tempo curve.
    pub fn curve_bpm_at(&self, bar: u32, beat: f64) -> Result<Option<f64>, SoapError> {
        let location = self.checked(bar, beat)?;
        let index = self.state_index(location);
        let span = &self.states[index];
        let start = span.beat_start(location);
        Ok(span
            .curve
            .filter(|_| self.covers(index, location))
            .map(|curve| curve.bpm_at(span.index_at(start))))
    }

    /// All labels, in score order.
    pub fn labels(&self) -> Vec<String> {
        self.states
            .iter()
            .filter_map(|a| a.state.label.clone())
            .collect()
    }

    /// Location of the first state labelled `name`.
    pub fn label_location(&self, name: &str) -> Option<Location> {
        self.states
            .iter()
            .find(|a| a.state.label.as_deref() == Some(name))
            .map(Annotated::location)
    }

    /// Position of the first state labelled `name`.
    pub fn label_position(&self, name: &str) -> Option<f64> {
        self.states
            .iter()
            .find(|a| a.state.label.as_deref() == Some(name))
            .map(|a| a.position)
    }

    fn checked(&self, bar: u32, beat: f64) -> Result<Location, SoapError> {
        if bar < 1 {
            return Err(SoapError::invalid_argument(format!(
                "bar must be at least 1, got {bar}"
            )));
        }
        if !(beat >= 1.0) || !beat.is_finite() {
            return Err(SoapError::invalid_argument(format!(
                "beat must be at least 1, got {beat}"
            )));
        }
        self.canonical(Location::new(bar, beat))
    }

    /// Roll beats past the end of their bar into the following bars, one
    /// meter at a time.
    fn canonical(&self, mut location: Location) -> Result<Location, SoapError> {
        location.beat = snap(location.beat);
        loop {
            let beats = self.states[self.state_index(location)].num_beats() as f64;
            if location.beat < beats + 1.0 - BEAT_EPSILON {
                break;
            }

            let mut bars = ((location.beat - 1.0 + BEAT_EPSILON) / beats).floor();
            if let Some(next) = self.states.iter().find(|a| a.state.bar > location.bar) {
                bars = bars.min(f64::from(next.state.bar - location.bar));
            }
            let bar = add_bars(location.bar, bars).ok_or_else(past_last_bar)?;
            location = Location::new(bar, snap((location.beat - bars * beats).max(1.0)));
        }

        if location.bar == u32::MAX {
            return Err(past_last_bar());
        }
        Ok(location)
    }

    /// Whether `location` lies in the span of state `index` rather than
    /// before the first state.
    fn covers(&self, index: usize, location: Location) -> bool {
        !location.before(&self.states[index].location())
    }

    /// The first state after `location`, given the state whose span holds it.
    fn following(&self, index: usize, location: Location) -> Option<&Annotated> {
        if self.covers(index, location) {
            self.states.get(index + 1)
        } else {
            self.states.get(index)
        }
    }

    /// Index of the last state at or before `location` (the first state when
    /// the location precedes every state).
    fn state_index(&self, location: Location) -> usize {
        self.states
            .partition_point(|a| !location.before(&a.location()))
            .saturating_sub(1)
    }

    fn position_of(&self, location: Location) -> f64 {
        let first = &self.states[0];
        if location.before(&first.location()) {
            return first.elapsed(Location::START, location);
        }
        let span = &self.states[self.state_index(location)];
        span.position + span.elapsed(span.location(), location) * span.scale
    }

    /// Nominal seconds between two locations, across state boundaries.
    fn nominal_between(&self, from: Location, to: Location) -> f64 {
        let mut total = 0.0;
        let mut cursor = from;
        while cursor.before(&to) {
            let index = self.state_index(cursor);
            let segment_end = match self.following(index, cursor) {
                Some(next) if next.location().before(&to) => next.location(),
                _ => to,
            };
            total += self.states[index].elapsed(cursor, segment_end);
            cursor = segment_end;
        }
        total
    }

    fn infos_at(&self, location: Location) -> LocationInfos {
        let index = self.state_index(location);
        let span = &self.states[index];
        let start = span.beat_start(location);
        let boundary = span.next_beat(start);

        let inside = self.covers(index, location);
        let unit = Unit {
            bpm: if inside { span.bpm_at(start) } else { span.unit.bpm },
            ..span.unit
        };
        let duration = self.nominal_between(location, boundary);
        let following = self.following(index, location);

        let dt = match span.state.fermata.as_ref().filter(|_| inside) {
            Some(fermata) => match (fermata.duration, following) {
                (FermataDuration::Suspended, _) => f64::INFINITY,
                (_, Some(release)) => span.elapsed(location, release.location()) * span.scale,
                (FermataDuration::Absolute(secs), None) => secs,
                (FermataDuration::Relative(factor), None) => factor * duration,
            },
            None => match following {
                Some(state) if state.location().before(&boundary) => {
                    self.nominal_between(location, state.location())
                }
                _ => duration,
            },
        };

        let event = span
            .location()
            .same_as(&location)
            .then(|| span.state.clone());

        LocationInfos {
            location,
            unit,
            position: self.position_of(location),
            duration,
            dt,
            event,
        }
    }
}

/// Resolve each curve's endpoints to the pulse bpm and beat index of the
/// states it starts and ends on.
fn resolve_curves(states: &mut [Annotated]) -> Result<(), SoapError> {
    fn find(states: &[Annotated], location: Location) -> Option<usize> {
        states.iter().position(|a| a.location().same_as(&location))
    }

    for index in 0..states.len() {
        // absolute-duration bars keep their own length inside a curve
        let Some(curve) = states[index]
            .state
            .tempo
            .as_ref()
            .and_then(|t| t.curve.clone())
            .filter(|_| states[index].state.duration.is_none())
        else {
            continue;
        };

        let start = find(&*states, curve.start.location());
        let end = find(&*states, curve.end.location());
        let (Some(start), Some(end)) = (start, end) else {
            return Err(SoapError::invariant(
                "tempo curve endpoints do not match any state",
                format!("state at {}", states[index].location()),
            ));
        };

        let start_index = states[start].beat_index;
        states[index].curve = Some(CurveSpan {
            start_bpm: states[start].unit.bpm,
            end_bpm: states[end].unit.bpm,
            exponent: curve.exponent,
            start_index,
            total_beats: states[end].beat_index - start_index,
        });
    }

    Ok(())
}

fn past_last_bar() -> SoapError {
    SoapError::invalid_argument("location lies past the last representable bar")
}

/// Accumulate state positions; fermata spans are scaled to their real length.
fn resolve_positions(states: &mut [Annotated]) {
    let first = &states[0];
    let mut position = first.elapsed(Location::START, first.location());

    for index in 0..states.len() {
        let nominal = states
            .get(index + 1)
            .map(|next| states[index].elapsed(states[index].location(), next.location()));

        let span = &mut states[index];
        span.position = position;
        span.scale = match (&span.state.fermata, nominal) {
            (Some(fermata), Some(nominal)) if nominal > 0.0 => match fermata.duration {
                FermataDuration::Absolute(secs) => secs / nominal,
                FermataDuration::Relative(factor) => factor,
                FermataDuration::Suspended => 1.0,
            },
            _ => 1.0,
        };

        if let Some(nominal) = nominal {
            position += nominal * span.scale;
        }
    }
}
