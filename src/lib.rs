//! soap-score — SOAP score notation: parsing, writing, and location ↔ position queries.

pub mod config;
pub mod score;
pub mod soap;

pub use config::CliConfig;
pub use score::{Interpreter, Location, LocationInfos, Timeline, Unit};
pub use soap::{CompiledState, Soap, SoapError};
