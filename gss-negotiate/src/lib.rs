//! Client side SPNEGO / Kerberos negotiation for HTTP `Negotiate`
//! authentication (RFC 4559).
//!
//! A [`NegotiateEngine`] drives one exchange: feed it each server challenge
//! and send back the token it returns until its status is `Complete`.
//! Tickets come from a [`TicketCache`] and tokens from a [`Mechanism`]; with
//! the `gssapi` feature both are provided by the system GSS-API library.
#[macro_use]
extern crate bitflags;
#[macro_use]
extern crate lazy_static;
#[macro_use]
extern crate log;

pub mod channel;
pub mod engine;
pub mod error;
#[cfg(feature = "gssapi")]
pub mod gss;
pub mod http;
pub mod mech;
pub mod runtime;
pub mod status;
pub mod target;
pub mod ticket;
pub mod token;

pub use channel::{ChannelBindings, RawTransport};
pub use engine::{NegotiateEngine, NegotiationContext, TargetSpec, TokenRequest};
pub use error::{NegotiateError, Result};
pub use mech::{ContextRequest, CtxFlags, Mechanism, SecurityContext, StepOutcome};
pub use runtime::{cancel_negotiation, reset_negotiate_timeout, set_negotiate_timeout, NegotiateRuntime};
pub use status::{GssStatusCode, MajorStatus, NegotiationState};
pub use target::{HostSpec, NegotiateMechanism, NegotiationTarget, ServicePrincipal};
pub use ticket::{MemoryTicketCache, Ticket, TicketCache};
pub use token::Token;
