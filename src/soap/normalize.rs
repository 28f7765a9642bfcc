//! Text normalizer — raw score text → canonical lines.
//!
//! Canonical form has exactly one line per `BAR`, every command prefixed by
//! its beat marker and single spaces between tokens:
//!
//! ```text
//! BAR 1 [4/4] |1 TEMPO [1/4]=60 |3 LABEL "theme"
//! ```

use tracing::trace;

use super::error::SoapError;

const COMMANDS: [&str; 4] = ["TEMPO", "FERMATA", "LABEL", "END"];

/// A piece of a line, split on whitespace while keeping quoted text,
/// bracket bodies and beat markers whole.
#[derive(Debug, Clone, PartialEq)]
enum Piece {
    Word(String),
    Quoted(String),
    Marker(Option<String>),
}

/// Normalize raw score text into canonical text, one `BAR` per line.
pub fn normalize(source: &str) -> Result<String, SoapError> {
    Ok(normalize_lines(source)?.join("\n"))
}

/// Normalize raw score text into canonical lines.
pub fn normalize_lines(source: &str) -> Result<Vec<String>, SoapError> {
    let mut merged: Vec<String> = Vec::new();

    for raw in source.lines() {
        let line = strip_comment(raw).trim();
        if line.is_empty() {
            continue;
        }

        if line.starts_with('|') {
            let Some(previous) = merged.last_mut() else {
                return Err(SoapError::syntax(
                    "beat continuation line without a preceding BAR",
                    line,
                ));
            };
            previous.push(' ');
            previous.push_str(line);
        } else if line.split_whitespace().next() == Some("BAR") {
            merged.push(line.to_string());
        } else {
            return Err(SoapError::syntax("line must start with BAR or |", line));
        }
    }

    let canonical = merged
        .iter()
        .map(|line| canonicalize(line))
        .collect::<Result<Vec<String>, SoapError>>()?;
    trace!(lines = canonical.len(), "normalized score");
    Ok(canonical)
}

/// Remove a trailing `//` comment, ignoring `//` inside quotes.
fn strip_comment(line: &str) -> &str {
    let mut in_quotes = false;
    let mut prev_slash = false;
    for (idx, ch) in line.char_indices() {
        match ch {
            '"' => {
                in_quotes = !in_quotes;
                prev_slash = false;
            }
            '/' if !in_quotes => {
                if prev_slash {
                    return &line[..idx - 1];
                }
                prev_slash = true;
            }
            _ => prev_slash = false,
        }
    }
    line
}

fn canonicalize(line: &str) -> Result<String, SoapError> {
    let pieces = split_pieces(line)?;

    let mut out: Vec<String> = Vec::with_capacity(pieces.len());
    let mut marker = String::from("1");
    let mut after_marker = false;

    for piece in pieces {
        match piece {
            Piece::Marker(beat) => {
                marker = beat.unwrap_or_else(|| "1".to_string());
                out.push(format!("|{marker}"));
                after_marker = true;
            }
            Piece::Word(word) => {
                if COMMANDS.contains(&word.as_str()) && !after_marker {
                    out.push(format!("|{marker}"));
                }
                out.push(word);
                after_marker = false;
            }
            Piece::Quoted(text) => {
                if out.last().map(String::as_str) != Some("LABEL") {
                    if !after_marker {
                        out.push(format!("|{marker}"));
                    }
                    out.push("LABEL".to_string());
                }
                out.push(format!("\"{text}\""));
                after_marker = false;
            }
        }
    }

    Ok(out.join(" "))
}

fn split_pieces(line: &str) -> Result<Vec<Piece>, SoapError> {
    let chars: Vec<char> = line.chars().collect();
    let mut pieces = Vec::new();
    let mut word = String::new();
    let mut pos = 0;

    let flush = |word: &mut String, pieces: &mut Vec<Piece>| {
        if !word.is_empty() {
            pieces.push(Piece::Word(std::mem::take(word)));
        }
    };

    while pos < chars.len() {
        let ch = chars[pos];
        match ch {
            c if c.is_whitespace() => {
                // `[1/4] = 60` is glued into `[1/4]=60`
                if !word.ends_with('=') {
                    flush(&mut word, &mut pieces);
                }
                pos += 1;
            }
            '=' => {
                if word.is_empty() {
                    if let Some(Piece::Word(previous)) = pieces.last() {
                        word = previous.clone();
                        pieces.pop();
                    }
                }
                word.push('=');
                pos += 1;
            }
            '"' => {
                flush(&mut word, &mut pieces);
                let start = pos + 1;
                let end = chars[start..]
                    .iter()
                    .position(|&c| c == '"')
                    .map(|offset| start + offset)
                    .ok_or_else(|| SoapError::syntax("unclosed quoted label", line))?;
                pieces.push(Piece::Quoted(chars[start..end].iter().collect()));
                pos = end + 1;
            }
            '[' => {
                if !word.ends_with('=') {
                    flush(&mut word, &mut pieces);
                }
                let end = chars[pos..]
                    .iter()
                    .position(|&c| c == ']')
                    .map(|offset| pos + offset)
                    .ok_or_else(|| SoapError::syntax("unclosed bracket", line))?;
                word.extend(chars[pos..=end].iter().filter(|c| !c.is_whitespace()));
                pos = end + 1;
            }
            '|' => {
                flush(&mut word, &mut pieces);
                pos += 1;
                while pos < chars.len() && chars[pos].is_whitespace() {
                    pos += 1;
                }
                let start = pos;
                while pos < chars.len() && (chars[pos].is_ascii_digit() || chars[pos] == '.') {
                    pos += 1;
                }
                let beat: String = chars[start..pos].iter().collect();
                pieces.push(Piece::Marker((!beat.is_empty()).then_some(beat)));
            }
            _ => {
                word.push(ch);
                pos += 1;
            }
        }
    }
    flush(&mut word, &mut pieces);

    Ok(pieces)
}
