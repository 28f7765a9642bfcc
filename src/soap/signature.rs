//! Signature, tempo basis and duration literals.
//!
//! `[4/4]`, `[6/8]`, `[3+2+2/8]` describe meters; the same `[U/L]` shape is
//! used as the note value a tempo or fermata is expressed in. Durations are
//! written as `10s`, `1.5s` or compound literals like `2h3m4s500ms`.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::error::SoapError;

/// How a meter groups its beats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SignatureKind {
    Simple,
    Compound,
    Irregular,
}

/// A parsed time signature.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimeSignature {
    /// Canonical text without brackets, e.g. `3+2+2/8`.
    pub name: String,
    pub kind: SignatureKind,
    pub upper: u32,
    pub lower: u32,
    /// Explicit `+` groups; empty unless written additively.
    pub additive: Vec<u32>,
}

impl TimeSignature {
    /// The natural subdivision of the bar, in units of `1/lower`.
    ///
    /// `4/4` → `[1, 1, 1, 1]`, `6/8` → `[3, 3]`, `7/8` → `[3, 2, 2]`.
    pub fn default_units(&self) -> Vec<u32> {
        match self.kind {
            SignatureKind::Simple => vec![1; self.upper as usize],
            SignatureKind::Compound => vec![3; (self.upper / 3) as usize],
            SignatureKind::Irregular if !self.additive.is_empty() => self.additive.clone(),
            SignatureKind::Irregular => decompose(self.upper),
        }
    }
}

impl fmt::Display for TimeSignature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}]", self.name)
    }
}

/// The note value a tempo or fermata is expressed in.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TempoBasis {
    pub name: String,
    pub kind: SignatureKind,
    pub upper: u32,
    pub lower: u32,
}

impl TempoBasis {
    /// Length of the basis in whole notes.
    pub fn value(&self) -> f64 {
        self.upper as f64 / self.lower as f64
    }
}

impl fmt::Display for TempoBasis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}]", self.name)
    }
}

/// Parse `[U/L]` or `[U1+U2+…/L]` (brackets optional).
pub fn parse_time_signature(text: &str) -> Result<TimeSignature, SoapError> {
    let body = bracket_body(text);
    let (upper_part, lower_part) = body
        .split_once('/')
        .ok_or_else(|| SoapError::syntax(format!("invalid signature '{text}'"), text))?;

    let lower = parse_positive(lower_part, text)?;
    let groups = upper_part
        .split('+')
        .map(|g| parse_positive(g, text))
        .collect::<Result<Vec<u32>, SoapError>>()?;
    let upper: u32 = groups.iter().sum();
    let additive = if groups.len() > 1 { groups } else { Vec::new() };
    let kind = classify(upper, lower, &additive);

    let name = if additive.is_empty() {
        format!("{upper}/{lower}")
    } else {
        let joined: Vec<String> = additive.iter().map(|g| g.to_string()).collect();
        format!("{}/{lower}", joined.join("+"))
    };

    Ok(TimeSignature {
        name,
        kind,
        upper,
        lower,
        additive,
    })
}

/// Parse a tempo or fermata basis, `[1/4]`, `[3/8]`.
pub fn parse_tempo_basis(text: &str) -> Result<TempoBasis, SoapError> {
    let sig = parse_time_signature(text)?;
    if !sig.additive.is_empty() {
        return Err(SoapError::syntax(
            format!("additive groups are not allowed in a basis '{text}'"),
            text,
        ));
    }
    Ok(TempoBasis {
        name: sig.name,
        kind: sig.kind,
        upper: sig.upper,
        lower: sig.lower,
    })
}

/// Parse a duration literal such as `10s`, `1.5s` or `2h3m4s500ms` into seconds.
pub fn parse_duration(text: &str) -> Result<f64, SoapError> {
    let body = bracket_body(text);
    let chars: Vec<char> = body.chars().collect();
    let invalid = || SoapError::syntax(format!("invalid duration '{text}'"), text);

    let mut pos = 0;
    let mut total = 0.0;
    let mut matched = false;

    while pos < chars.len() {
        let start = pos;
        while pos < chars.len() && (chars[pos].is_ascii_digit() || chars[pos] == '.') {
            pos += 1;
        }
        if pos == start {
            return Err(invalid());
        }
        let number: String = chars[start..pos].iter().collect();
        let value: f64 = number.parse().map_err(|_| invalid())?;

        let unit_start = pos;
        while pos < chars.len() && chars[pos].is_ascii_alphabetic() {
            pos += 1;
        }
        let unit: String = chars[unit_start..pos].iter().collect();
        let scale = match unit.as_str() {
            "h" => 3600.0,
            "m" => 60.0,
            "s" => 1.0,
            "ms" => 0.001,
            _ => return Err(invalid()),
        };

        total += value * scale;
        matched = true;
    }

    if !matched {
        return Err(invalid());
    }
    Ok(total)
}

/// Whether a bracket body looks like a signature rather than a duration.
pub fn is_signature_literal(text: &str) -> bool {
    bracket_body(text).contains('/')
}

/// Format a number the way the notation writes it (`60`, `0.5`, `72.25`).
pub fn format_number(value: f64) -> String {
    format!("{value}")
}

fn bracket_body(text: &str) -> String {
    let trimmed = text.trim();
    let trimmed = trimmed.strip_prefix('[').unwrap_or(trimmed);
    let trimmed = trimmed.strip_suffix(']').unwrap_or(trimmed);
    trimmed.chars().filter(|c| !c.is_whitespace()).collect()
}

fn parse_positive(part: &str, text: &str) -> Result<u32, SoapError> {
    match part.trim().parse::<u32>() {
        Ok(n) if n > 0 => Ok(n),
        _ => Err(SoapError::syntax(
            format!("'{part}' is not a positive integer in '{text}'"),
            text,
        )),
    }
}

fn classify(upper: u32, lower: u32, additive: &[u32]) -> SignatureKind {
    if additive.len() > 1 {
        SignatureKind::Irregular
    } else if upper > 3 && upper % 3 == 0 {
        SignatureKind::Compound
    } else if upper > 3 && upper % 2 == 1 && lower >= 8 {
        SignatureKind::Irregular
    } else {
        SignatureKind::Simple
    }
}

/// Default grouping of an irregular meter: `ceil(upper / 3)` groups, 3-groups
/// first, completed with 2-groups.
fn decompose(upper: u32) -> Vec<u32> {
    let groups = upper.div_ceil(3);
    let threes = upper.saturating_sub(2 * groups);
    let mut units = vec![3; threes as usize];
    units.resize(groups as usize, 2);
    units
}
