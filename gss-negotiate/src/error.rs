use crate::status::GssStatusCode;
use thiserror::Error;

/// Contract violations and parse failures.
///
/// Expected negotiation failures are never reported through this type; they
/// show up in [`GssStatusCode`] after the call.
#[derive(Debug, Error)]
pub enum NegotiateError {
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
    #[error("malformed host specifier {input:?}: {reason}")]
    MalformedHost { input: String, reason: &'static str },
    #[error("malformed service principal name {input:?}: {reason}")]
    MalformedPrincipal { input: String, reason: &'static str },
    #[error("negotiation already finished with status {0}, start a new context")]
    ContextFinished(GssStatusCode),
}

pub type Result<T, E = NegotiateError> = std::result::Result<T, E>;
