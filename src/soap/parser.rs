//! Event list builder — canonical lines → [`PrimitiveEvent`]s.
//!
//! Each canonical line yields one `Bar` primitive followed by the commands
//! attached to its beat markers, in source order.

use tracing::trace;

use super::ast::{EventKind, Fermata, FermataDuration, Meter, PrimitiveEvent};
use super::error::SoapError;
use super::lexer::Lexer;
use super::signature::{
    is_signature_literal, parse_duration, parse_tempo_basis, parse_time_signature, TempoBasis,
};
use super::token::{Token, TokenKind};

/// State shared across lines while building the event list.
#[derive(Debug, Default)]
pub struct BuildContext {
    seen_bar: bool,
    /// Most recently defined tempo, for resolving equivalences.
    last_tempo: Option<(TempoBasis, f64)>,
}

/// Build the primitive event list from canonical lines.
pub fn build_events<S: AsRef<str>>(lines: &[S]) -> Result<Vec<PrimitiveEvent>, SoapError> {
    let mut ctx = BuildContext::default();
    let mut events = Vec::new();

    for line in lines {
        let line = line.as_ref();
        let tokens = Lexer::new(line).tokenize()?;
        let mut parser = Parser::new(tokens, line);
        events.extend(parser.parse_line(&mut ctx)?);
    }

    trace!(events = events.len(), "built event list");
    Ok(events)
}

pub struct Parser<'a> {
    tokens: Vec<Token>,
    pos: usize,
    line: &'a str,
}

impl<'a> Parser<'a> {
    pub fn new(tokens: Vec<Token>, line: &'a str) -> Self {
        Self {
            tokens,
            pos: 0,
            line,
        }
    }

    /// Parse one `BAR` line into its primitives.
    pub fn parse_line(&mut self, ctx: &mut BuildContext) -> Result<Vec<PrimitiveEvent>, SoapError> {
        let mut events = Vec::new();

        self.expect(TokenKind::Bar)?;
        let bar = self.parse_bar_number()?;
        let meter = match self.peek().map(|t| &t.kind) {
            Some(TokenKind::Bracket(body)) => {
                let body = body.clone();
                self.advance();
                Some(self.parse_meter(&body)?)
            }
            _ => None,
        };

        if !ctx.seen_bar && meter.is_none() {
            return Err(SoapError::syntax(
                "first bar must declare a signature or a duration",
                self.line,
            ));
        }
        ctx.seen_bar = true;
        events.push(self.event(bar, 1.0, EventKind::Bar { meter }));

        while let Some(token) = self.advance() {
            let beat = match token.kind {
                TokenKind::Marker(beat) => beat,
                TokenKind::Ident(ref word) => {
                    return Err(SoapError::unknown_command(word.clone(), self.line));
                }
                ref other => {
                    return Err(self.error(format!("unexpected '{}'", other.describe())));
                }
            };
            if beat < 1.0 {
                return Err(self.error(format!("beat {beat} is before the first beat")));
            }

            let kind = self.parse_command(ctx)?;
            events.push(self.event(bar, beat, kind));
        }

        Ok(events)
    }

    fn parse_bar_number(&mut self) -> Result<u32, SoapError> {
        match self.advance().map(|t| t.kind) {
            Some(TokenKind::Number(n)) if n >= 1.0 && n.fract() == 0.0 && n <= u32::MAX as f64 => {
                Ok(n as u32)
            }
            Some(other) => Err(self.error(format!(
                "bar number must be a positive integer, found '{}'",
                other.describe()
            ))),
            None => Err(self.error("missing bar number")),
        }
    }

    fn parse_meter(&self, body: &str) -> Result<Meter, SoapError> {
        if is_signature_literal(body) {
            let signature = parse_time_signature(body).map_err(|e| e.at_line(self.line))?;
            return Ok(Meter::Signature(signature));
        }
        let secs = parse_duration(body).map_err(|e| e.at_line(self.line))?;
        if secs <= 0.0 {
            return Err(self.error("bar duration must be positive"));
        }
        Ok(Meter::Duration(secs))
    }

    fn parse_command(&mut self, ctx: &mut BuildContext) -> Result<EventKind, SoapError> {
        let token = self
            .advance()
            .ok_or_else(|| self.error("beat marker without a command"))?;

        match token.kind {
            TokenKind::Tempo => self.parse_tempo(ctx),
            TokenKind::Fermata => self.parse_fermata(),
            TokenKind::Label => match self.advance().map(|t| t.kind) {
                Some(TokenKind::Str(text)) => Ok(EventKind::Label(text)),
                _ => Err(self.error("LABEL expects a quoted string")),
            },
            TokenKind::End => Ok(EventKind::End),
            TokenKind::Ident(word) => Err(SoapError::unknown_command(word, self.line)),
            other => Err(self.error(format!("expected a command, found '{}'", other.describe()))),
        }
    }

    /// `TEMPO [basis]=bpm` or `TEMPO [basis]=[other]`, optionally `curve <exp>`.
    fn parse_tempo(&mut self, ctx: &mut BuildContext) -> Result<EventKind, SoapError> {
        let basis = self.expect_basis()?;
        self.expect(TokenKind::Eq)?;

        let (bpm, equivalence) = match self.advance().map(|t| t.kind) {
            Some(TokenKind::Number(bpm)) if bpm > 0.0 => (bpm, None),
            Some(TokenKind::Bracket(body)) => {
                let other = parse_tempo_basis(&body).map_err(|e| e.at_line(self.line))?;
                let Some((last_basis, last_bpm)) = &ctx.last_tempo else {
                    return Err(self.error("tempo equivalence needs a previously defined tempo"));
                };
                let bpm = last_bpm * last_basis.value() / other.value();
                (bpm, Some(other))
            }
            _ => return Err(self.error("TEMPO expects a positive bpm or an equivalent basis")),
        };

        let curve = if self.check(&TokenKind::Curve) {
            self.advance();
            match self.peek().map(|t| &t.kind) {
                Some(TokenKind::Number(exponent)) => {
                    let exponent = *exponent;
                    self.advance();
                    if exponent <= 0.0 {
                        return Err(self.error("curve exponent must be positive"));
                    }
                    Some(exponent)
                }
                _ => Some(1.0),
            }
        } else {
            None
        };

        ctx.last_tempo = Some((basis.clone(), bpm));
        Ok(EventKind::Tempo {
            basis,
            bpm,
            equivalence,
            curve,
        })
    }

    /// `FERMATA [basis]=10s`, `=2*` or `=?`.
    fn parse_fermata(&mut self) -> Result<EventKind, SoapError> {
        let basis = self.expect_basis()?;
        self.expect(TokenKind::Eq)?;

        let duration = match self.advance().map(|t| t.kind) {
            Some(TokenKind::Duration(secs)) if secs > 0.0 => FermataDuration::Absolute(secs),
            Some(TokenKind::Number(factor)) if factor > 0.0 && self.check(&TokenKind::Star) => {
                self.advance();
                FermataDuration::Relative(factor)
            }
            Some(TokenKind::Question) => FermataDuration::Suspended,
            _ => {
                return Err(self.error(
                    "FERMATA expects a duration, a relative factor (N*) or '?'",
                ))
            }
        };

        Ok(EventKind::Fermata(Fermata { basis, duration }))
    }

    fn expect_basis(&mut self) -> Result<TempoBasis, SoapError> {
        match self.advance().map(|t| t.kind) {
            Some(TokenKind::Bracket(body)) => {
                parse_tempo_basis(&body).map_err(|e| e.at_line(self.line))
            }
            _ => Err(self.error("expected a basis such as [1/4]")),
        }
    }

    fn event(&self, bar: u32, beat: f64, kind: EventKind) -> PrimitiveEvent {
        PrimitiveEvent {
            bar,
            beat,
            source: self.line.to_string(),
            kind,
        }
    }

    fn error(&self, message: impl Into<String>) -> SoapError {
        SoapError::syntax(message, self.line)
    }

    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn advance(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).cloned();
        if token.is_some() {
            self.pos += 1;
        }
        token
    }

    fn check(&self, kind: &TokenKind) -> bool {
        self.peek().is_some_and(|t| &t.kind == kind)
    }

    fn expect(&mut self, kind: TokenKind) -> Result<(), SoapError> {
        if self.check(&kind) {
            self.advance();
            Ok(())
        } else {
            let found = self
                .peek()
                .map(|t| t.kind.describe())
                .unwrap_or_else(|| "end of line".into());
            Err(self.error(format!("expected '{}', found '{found}'", kind.describe())))
        }
    }
}
