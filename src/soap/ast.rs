//! Score data model.
//!
//! [`PrimitiveEvent`]s are the flat output of the event list builder; the
//! compiler folds them into [`CompiledState`]s, one per location where
//! something changes.

use serde::{Deserialize, Serialize};

use crate::score::Location;

use super::signature::{TempoBasis, TimeSignature};

/// A primitive command located at a bar and beat.
#[derive(Debug, Clone, PartialEq)]
pub struct PrimitiveEvent {
    pub bar: u32,
    pub beat: f64,
    /// The canonical line the event came from.
    pub source: String,
    pub kind: EventKind,
}

impl PrimitiveEvent {
    pub fn location(&self) -> Location {
        Location::new(self.bar, self.beat)
    }
}

/// The command carried by a [`PrimitiveEvent`].
#[derive(Debug, Clone, PartialEq)]
pub enum EventKind {
    Bar {
        meter: Option<Meter>,
    },
    Tempo {
        basis: TempoBasis,
        bpm: f64,
        /// Right-hand basis of an equivalence such as `[3/8]=[1/4]`.
        equivalence: Option<TempoBasis>,
        /// Curve exponent when the tempo starts a curve.
        curve: Option<f64>,
    },
    Fermata(Fermata),
    Label(String),
    End,
}

/// What a `BAR` line declares between brackets.
#[derive(Debug, Clone, PartialEq)]
pub enum Meter {
    Signature(TimeSignature),
    /// Absolute bar length in seconds.
    Duration(f64),
}

/// The score state at one location.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompiledState {
    pub bar: u32,
    pub beat: f64,
    pub signature: Option<TimeSignature>,
    /// Absolute bar length in seconds, exclusive with `signature`.
    pub duration: Option<f64>,
    pub tempo: Option<Tempo>,
    pub fermata: Option<Fermata>,
    pub label: Option<String>,
    #[serde(default)]
    pub end: bool,
}

impl CompiledState {
    /// An empty state at a location.
    pub fn at(location: Location) -> Self {
        Self {
            bar: location.bar,
            beat: location.beat,
            signature: None,
            duration: None,
            tempo: None,
            fermata: None,
            label: None,
            end: false,
        }
    }

    pub fn location(&self) -> Location {
        Location::new(self.bar, self.beat)
    }

    /// The state that follows this one at `location`: meter and tempo are
    /// carried, per-location fields are reset.
    pub fn carry_to(&self, location: Location) -> Self {
        Self {
            bar: location.bar,
            beat: location.beat,
            signature: self.signature.clone(),
            duration: self.duration,
            tempo: self.tempo.clone(),
            fermata: None,
            label: None,
            end: false,
        }
    }

    /// Whether the meter (signature or absolute duration) differs from `other`.
    pub fn meter_differs(&self, other: &CompiledState) -> bool {
        self.signature != other.signature || self.duration != other.duration
    }
}

/// A tempo definition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tempo {
    pub basis: TempoBasis,
    pub bpm: f64,
    pub curve: Option<Curve>,
    /// Set when the tempo was written as an equivalence.
    #[serde(default)]
    pub equivalence: Option<TempoBasis>,
}

/// An interpolated tempo change between two located tempo definitions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Curve {
    pub start: CurvePoint,
    pub end: CurvePoint,
    pub exponent: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CurvePoint {
    pub bar: u32,
    pub beat: f64,
    pub bpm: f64,
}

impl CurvePoint {
    pub fn location(&self) -> Location {
        Location::new(self.bar, self.beat)
    }
}

/// A held pause over `basis`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Fermata {
    pub basis: TempoBasis,
    pub duration: FermataDuration,
}

/// How long a fermata holds.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum FermataDuration {
    /// Seconds, `=10s`.
    Absolute(f64),
    /// Multiple of the nominal duration, `=2*`.
    Relative(f64),
    /// Held until released externally, `=?`.
    Suspended,
}
