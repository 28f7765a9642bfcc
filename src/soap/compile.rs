//! Score compiler — folds primitive events into [`CompiledState`]s.
//!
//! The fold threads a [`Cursor`] through [`transition`], which consumes one
//! primitive and returns the next cursor plus any finished snapshots. A state
//! is snapshotted whenever the location moves forward; a fermata snapshots its
//! own state and leaves the synthesized release state pending.

use tracing::{debug, trace};

use crate::score::unit::{advance_by_basis, beat_groups};
use crate::score::Location;

use super::ast::{CompiledState, Curve, CurvePoint, EventKind, Meter, PrimitiveEvent, Tempo};
use super::error::SoapError;

/// A state under construction and the line that last touched it.
#[derive(Debug, Clone)]
struct Pending {
    state: CompiledState,
    source: String,
    /// Fermata location this state was released from.
    released_from: Option<Location>,
}

/// Compiler state carried between primitives.
#[derive(Debug, Clone, Default)]
struct Cursor {
    /// Fermata state, still open to commands at its own location.
    held: Option<Pending>,
    /// The state being built.
    current: Option<Pending>,
    ended: bool,
}

/// Result of one transition.
struct Step {
    cursor: Cursor,
    snapshots: Vec<CompiledState>,
}

/// Compile a primitive event list into ordered, validated states.
pub fn compile(events: &[PrimitiveEvent]) -> Result<Vec<CompiledState>, SoapError> {
    if events.is_empty() {
        return Err(SoapError::syntax("score is empty", ""));
    }

    let (cursor, mut states) = (0..events.len()).try_fold(
        (Cursor::default(), Vec::new()),
        |(cursor, mut states), index| {
            let step = transition(cursor, events, index)?;
            states.extend(step.snapshots);
            Ok::<_, SoapError>((step.cursor, states))
        },
    )?;

    for pending in [cursor.held, cursor.current].into_iter().flatten() {
        states.push(seal(pending)?);
    }

    debug!(states = states.len(), "compiled score");
    Ok(states)
}

fn transition(mut cursor: Cursor, events: &[PrimitiveEvent], index: usize) -> Result<Step, SoapError> {
    let event = &events[index];
    let location = event.location();
    let mut snapshots = Vec::new();

    if cursor.ended {
        return Err(SoapError::post_end(&event.source));
    }

    if let Some(mut held) = cursor.held.take() {
        if held.state.location().same_as(&location) {
            apply(&mut held.state, events, index)?;
            held.source = event.source.clone();
            cursor.ended = held.state.end;
            cursor.current = release(&held)?;
            cursor.held = Some(held);
            return Ok(Step { cursor, snapshots });
        }
        snapshots.push(seal(held)?);
    }

    let mut pending = match cursor.current.take() {
        None => Pending {
            state: CompiledState::at(location),
            source: event.source.clone(),
            released_from: None,
        },
        Some(current) if current.state.location().same_as(&location) => current,
        // a plain barline crossed while a fermata holds adds nothing
        Some(current) if within_hold(&current, event) => {
            trace!(bar = event.bar, "barline inside fermata hold");
            cursor.current = Some(current);
            return Ok(Step { cursor, snapshots });
        }
        Some(current) if current.state.location().before(&location) => {
            let next = current.state.carry_to(location);
            snapshots.push(seal(current)?);
            Pending {
                state: next,
                source: event.source.clone(),
                released_from: None,
            }
        }
        Some(current) => {
            return Err(SoapError::invariant(
                format!(
                    "{location} comes before {}, which is already scheduled",
                    current.state.location()
                ),
                &event.source,
            ));
        }
    };

    pending.source = event.source.clone();
    apply(&mut pending.state, events, index)?;
    check_beat(&pending.state, event)?;
    trace!(bar = event.bar, beat = event.beat, "applied {:?}", event.kind);

    cursor.ended = pending.state.end;
    if pending.state.fermata.is_some() {
        cursor.current = release(&pending)?;
        cursor.held = Some(pending);
    } else {
        cursor.current = Some(pending);
    }

    Ok(Step { cursor, snapshots })
}

fn apply(state: &mut CompiledState, events: &[PrimitiveEvent], index: usize) -> Result<(), SoapError> {
    let event = &events[index];

    match &event.kind {
        EventKind::Bar { meter } => match meter {
            Some(Meter::Signature(signature)) => {
                state.signature = Some(signature.clone());
                state.duration = None;
            }
            Some(Meter::Duration(secs)) => {
                state.duration = Some(*secs);
                state.signature = None;
            }
            None if state.signature.is_none() && state.duration.is_none() => {
                return Err(SoapError::invariant(
                    "first bar must declare a signature or a duration",
                    &event.source,
                ));
            }
            None => {}
        },
        EventKind::Tempo {
            basis,
            bpm,
            equivalence,
            curve,
        } => {
            let curve = match curve {
                Some(exponent) => Some(close_curve(events, index, *exponent)?),
                // equivalences inside a curve keep it running
                None if equivalence.is_some() => state.tempo.as_ref().and_then(|t| t.curve.clone()),
                None => None,
            };
            state.tempo = Some(Tempo {
                basis: basis.clone(),
                bpm: *bpm,
                curve,
                equivalence: equivalence.clone(),
            });
        }
        EventKind::Fermata(fermata) => state.fermata = Some(fermata.clone()),
        EventKind::Label(text) => state.label = Some(text.clone()),
        EventKind::End => state.end = true,
    }

    Ok(())
}

/// Find the tempo that ends the curve started at `events[index]`.
fn close_curve(events: &[PrimitiveEvent], index: usize, exponent: f64) -> Result<Curve, SoapError> {
    let start = &events[index];
    let EventKind::Tempo { bpm: start_bpm, .. } = start.kind else {
        return Err(SoapError::invariant("curve without tempo", &start.source));
    };

    events[index + 1..]
        .iter()
        .find_map(|e| match e.kind {
            EventKind::Tempo {
                bpm,
                equivalence: None,
                ..
            } => Some(Curve {
                start: CurvePoint {
                    bar: start.bar,
                    beat: start.beat,
                    bpm: start_bpm,
                },
                end: CurvePoint {
                    bar: e.bar,
                    beat: e.beat,
                    bpm,
                },
                exponent,
            }),
            _ => None,
        })
        .ok_or_else(|| SoapError::unterminated_curve(&start.source))
}

/// The state a fermata releases into; `None` once the score has ended.
fn release(held: &Pending) -> Result<Option<Pending>, SoapError> {
    let Some(fermata) = held.state.fermata.as_ref() else {
        return Ok(None);
    };
    if held.state.end {
        return Ok(None);
    }
    let from = held.state.location();
    let location = advance_by_basis(&held.state, from, &fermata.basis).ok_or_else(|| {
        SoapError::invariant("fermata holds past the last representable bar", &held.source)
    })?;
    Ok(Some(Pending {
        state: held.state.carry_to(location),
        source: held.source.clone(),
        released_from: Some(from),
    }))
}

/// A meterless `BAR` between a fermata and the state it releases into.
fn within_hold(current: &Pending, event: &PrimitiveEvent) -> bool {
    let bare_bar = matches!(event.kind, EventKind::Bar { meter: None });
    let location = event.location();
    bare_bar
        && current
            .released_from
            .is_some_and(|from| from.before(&location) && location.before(&current.state.location()))
}

fn check_beat(state: &CompiledState, event: &PrimitiveEvent) -> Result<(), SoapError> {
    let beats = beat_groups(state).len();
    if beats > 0 && event.beat >= beats as f64 + 1.0 {
        return Err(SoapError::invariant(
            format!("beat {} does not exist in a {beats}-beat bar", event.beat),
            &event.source,
        ));
    }
    Ok(())
}

/// Validate a finished state.
fn seal(pending: Pending) -> Result<CompiledState, SoapError> {
    let state = pending.state;
    match (&state.signature, state.duration) {
        (None, None) => Err(SoapError::invariant(
            "state has neither a signature nor a duration",
            pending.source,
        )),
        (Some(_), Some(_)) => Err(SoapError::invariant(
            "state has both a signature and a duration",
            pending.source,
        )),
        (Some(_), None) if state.tempo.is_none() => Err(SoapError::invariant(
            "a bar with a time signature needs a tempo",
            pending.source,
        )),
        _ => Ok(state),
    }
}
