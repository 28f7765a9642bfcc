//! Score writer — [`CompiledState`]s back to canonical SOAP text.
//!
//! Meter and tempo are only written where they change, mirroring how the
//! compiler carries them forward. States released by a fermata are implied
//! by the fermata and only written when they carry changes of their own.

use super::ast::{CompiledState, Fermata, FermataDuration, Tempo};
use super::signature::format_number;
use crate::score::location::BEAT_EPSILON;

/// Serialize compiled states to SOAP text, one `BAR` per line.
pub fn write(states: &[CompiledState]) -> String {
    let mut lines: Vec<String> = Vec::new();
    let mut line_bar: Option<u32> = None;
    let mut prev: Option<&CompiledState> = None;

    for state in states {
        let released = prev.is_some_and(|p| p.fermata.is_some());
        let mut commands = commands_for(state, prev);

        if (state.beat - 1.0).abs() < BEAT_EPSILON {
            let mut line = format!("BAR {}", state.bar);
            if prev.map_or(true, |p| state.meter_differs(p)) {
                line.push(' ');
                line.push_str(&meter_text(state));
            }
            lines.push(line);
            line_bar = Some(state.bar);
        } else {
            if commands.is_empty() && !released {
                // a state with nothing new came from a repeated tempo
                commands.extend(state.tempo.as_ref().map(|t| tempo_text(t, state)));
            }
            if commands.is_empty() {
                prev = Some(state);
                continue;
            }
            if line_bar != Some(state.bar) {
                lines.push(format!("BAR {}", state.bar));
                line_bar = Some(state.bar);
            }
        }

        if let Some(line) = lines.last_mut() {
            let marker = format!("|{}", format_number(state.beat));
            for command in commands {
                line.push(' ');
                line.push_str(&marker);
                line.push(' ');
                line.push_str(&command);
            }
        }
        prev = Some(state);
    }

    let mut text = lines.join("\n");
    text.push('\n');
    text
}

fn commands_for(state: &CompiledState, prev: Option<&CompiledState>) -> Vec<String> {
    let mut commands = Vec::new();

    if let Some(tempo) = &state.tempo {
        if prev.map_or(true, |p| p.tempo.as_ref() != Some(tempo)) {
            commands.push(tempo_text(tempo, state));
        }
    }
    if let Some(fermata) = &state.fermata {
        commands.push(fermata_text(fermata));
    }
    if let Some(label) = &state.label {
        commands.push(format!("LABEL \"{label}\""));
    }
    if state.end {
        commands.push("END".to_string());
    }

    commands
}

fn meter_text(state: &CompiledState) -> String {
    match (&state.signature, state.duration) {
        (_, Some(secs)) => format!("[{}s]", format_number(secs)),
        (Some(signature), None) => signature.to_string(),
        (None, None) => String::new(),
    }
}

fn tempo_text(tempo: &Tempo, state: &CompiledState) -> String {
    let value = match &tempo.equivalence {
        Some(other) => other.to_string(),
        None => format_number(tempo.bpm),
    };
    let mut text = format!("TEMPO {}={value}", tempo.basis);
    if let Some(curve) = &tempo.curve {
        if curve.start.location().same_as(&state.location()) {
            text.push_str(&format!(" curve {}", format_number(curve.exponent)));
        }
    }
    text
}

fn fermata_text(fermata: &Fermata) -> String {
    let value = match fermata.duration {
        FermataDuration::Absolute(secs) => format!("{}s", format_number(secs)),
        FermataDuration::Relative(factor) => format!("{}*", format_number(factor)),
        FermataDuration::Suspended => "?".to_string(),
    };
    format!("FERMATA {}={value}", fermata.basis)
}
