//! Lexer for canonical SOAP lines.
//!
//! Converts one normalized line into a stream of [`Token`]s.

use super::error::SoapError;
use super::signature::parse_duration;
use super::token::{Token, TokenKind};

pub struct Lexer<'a> {
    line: &'a str,
    chars: Vec<char>,
    pos: usize,
}

impl<'a> Lexer<'a> {
    pub fn new(line: &'a str) -> Self {
        Self {
            line,
            chars: line.chars().collect(),
            pos: 0,
        }
    }

    pub fn tokenize(&mut self) -> Result<Vec<Token>, SoapError> {
        let mut tokens = Vec::new();

        loop {
            self.skip_whitespace();
            if self.is_at_end() {
                break;
            }

            let col = self.pos + 1;
            let kind = match self.peek() {
                '=' => self.single_char(TokenKind::Eq),
                '*' => self.single_char(TokenKind::Star),
                '?' => self.single_char(TokenKind::Question),
                '"' => self.lex_string()?,
                '[' => self.lex_bracket()?,
                '|' => self.lex_marker()?,
                '0'..='9' | '.' => self.lex_number()?,
                'a'..='z' | 'A'..='Z' | '_' => self.lex_word(),
                ch => {
                    return Err(SoapError::syntax(
                        format!("unexpected character '{ch}' at column {col}"),
                        self.line,
                    ));
                }
            };

            tokens.push(Token { kind, col });
        }

        Ok(tokens)
    }

    fn peek(&self) -> char {
        self.chars[self.pos]
    }

    fn is_at_end(&self) -> bool {
        self.pos >= self.chars.len()
    }

    fn skip_whitespace(&mut self) {
        while !self.is_at_end() && self.peek().is_whitespace() {
            self.pos += 1;
        }
    }

    fn single_char(&mut self, kind: TokenKind) -> TokenKind {
        self.pos += 1;
        kind
    }

    fn take_while(&mut self, pred: impl Fn(char) -> bool) -> String {
        let start = self.pos;
        while !self.is_at_end() && pred(self.peek()) {
            self.pos += 1;
        }
        self.chars[start..self.pos].iter().collect()
    }

    fn lex_string(&mut self) -> Result<TokenKind, SoapError> {
        self.pos += 1; // opening '"'
        let text = self.take_while(|c| c != '"');
        if self.is_at_end() {
            return Err(SoapError::syntax("unclosed quoted label", self.line));
        }
        self.pos += 1; // closing '"'
        Ok(TokenKind::Str(text))
    }

    fn lex_bracket(&mut self) -> Result<TokenKind, SoapError> {
        self.pos += 1; // '['
        let body = self.take_while(|c| c != ']');
        if self.is_at_end() {
            return Err(SoapError::syntax("unclosed bracket", self.line));
        }
        self.pos += 1; // ']'
        Ok(TokenKind::Bracket(body.trim().to_string()))
    }

    fn lex_marker(&mut self) -> Result<TokenKind, SoapError> {
        self.pos += 1; // '|'
        let text = self.take_while(|c| c.is_ascii_digit() || c == '.');
        if text.is_empty() {
            return Ok(TokenKind::Marker(1.0));
        }
        let beat: f64 = text
            .parse()
            .map_err(|_| SoapError::syntax(format!("invalid beat '|{text}'"), self.line))?;
        Ok(TokenKind::Marker(beat))
    }

    /// A number, or a duration literal when letters follow (`10s`, `1m30s`).
    fn lex_number(&mut self) -> Result<TokenKind, SoapError> {
        let text = self.take_while(|c| c.is_ascii_alphanumeric() || c == '.');
        if text.chars().any(|c| c.is_ascii_alphabetic()) {
            let secs = parse_duration(&text).map_err(|e| e.at_line(self.line))?;
            return Ok(TokenKind::Duration(secs));
        }
        let value: f64 = text
            .parse()
            .map_err(|_| SoapError::syntax(format!("invalid number '{text}'"), self.line))?;
        Ok(TokenKind::Number(value))
    }

    fn lex_word(&mut self) -> TokenKind {
        let word = self.take_while(|c| c.is_ascii_alphanumeric() || c == '_');
        match word.as_str() {
            "BAR" => TokenKind::Bar,
            "TEMPO" => TokenKind::Tempo,
            "FERMATA" => TokenKind::Fermata,
            "LABEL" => TokenKind::Label,
            "END" => TokenKind::End,
            "curve" => TokenKind::Curve,
            _ => TokenKind::Ident(word),
        }
    }
}
