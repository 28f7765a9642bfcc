//! SOAP notation — text → canonical lines → primitive events → compiled states.

pub mod ast;
pub mod compile;
pub mod error;
pub mod lexer;
pub mod normalize;
pub mod parser;
pub mod signature;
pub mod token;
pub mod writer;

pub use ast::{
    CompiledState, Curve, CurvePoint, EventKind, Fermata, FermataDuration, Meter, PrimitiveEvent,
    Tempo,
};
pub use error::SoapError;
pub use signature::{
    parse_duration, parse_tempo_basis, parse_time_signature, SignatureKind, TempoBasis,
    TimeSignature,
};

use tracing::debug;

/// Entry points of the SOAP pipeline.
pub struct Soap;

impl Soap {
    /// Normalize raw score text into canonical form.
    pub fn normalize(source: &str) -> Result<String, SoapError> {
        normalize::normalize(source)
    }

    /// Normalize and tokenize score text into primitive events.
    pub fn events(source: &str) -> Result<Vec<PrimitiveEvent>, SoapError> {
        let lines = normalize::normalize_lines(source)?;
        parser::build_events(&lines)
    }

    /// Parse score text into compiled states.
    pub fn parse(source: &str) -> Result<Vec<CompiledState>, SoapError> {
        let events = Self::events(source)?;
        debug!(events = events.len(), "parsing score");
        compile::compile(&events)
    }

    /// Serialize compiled states back to SOAP text.
    pub fn write(states: &[CompiledState]) -> String {
        writer::write(states)
    }
}
