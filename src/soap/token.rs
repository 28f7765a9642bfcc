//! Token types for the SOAP line lexer.

/// A token produced by the lexer.
#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub col: usize,
}

/// The kind of token.
#[derive(Debug, Clone, PartialEq)]
pub enum TokenKind {
    // Keywords
    Bar,
    Tempo,
    Fermata,
    Label,
    End,
    Curve,

    // Literals
    Ident(String),
    Number(f64),
    Duration(f64),
    Bracket(String), // body of `[...]`
    Str(String),
    Marker(f64), // |3, |2.5

    // Symbols
    Eq,       // =
    Star,     // *
    Question, // ?
}

impl TokenKind {
    /// Short human description used in error messages.
    pub fn describe(&self) -> String {
        match self {
            TokenKind::Bar => "BAR".into(),
            TokenKind::Tempo => "TEMPO".into(),
            TokenKind::Fermata => "FERMATA".into(),
            TokenKind::Label => "LABEL".into(),
            TokenKind::End => "END".into(),
            TokenKind::Curve => "curve".into(),
            TokenKind::Ident(s) => s.clone(),
            TokenKind::Number(n) | TokenKind::Duration(n) => n.to_string(),
            TokenKind::Bracket(b) => format!("[{b}]"),
            TokenKind::Str(s) => format!("\"{s}\""),
            TokenKind::Marker(m) => format!("|{m}"),
            TokenKind::Eq => "=".into(),
            TokenKind::Star => "*".into(),
            TokenKind::Question => "?".into(),
        }
    }
}
