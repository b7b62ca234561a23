//! The negotiation engine: one client-side SPNEGO exchange per context.
//!
//! Every call to [`NegotiateEngine::generate`] records a status. Expected
//! failures (no ticket, a bad challenge, a rejected token) only show up
//! there; `Err` is reserved for misuse of the engine itself.
use crate::{
    channel::{ChannelBindings, RawTransport},
    error::{NegotiateError, Result},
    mech::{ContextRequest, CtxFlags, Mechanism, SecurityContext},
    runtime::{NegotiateRuntime, RequestKind},
    status::{GssStatusCode, NegotiationState},
    target::{NegotiateMechanism, NegotiationTarget, ServicePrincipal},
    ticket::TicketCache,
    token::{decode_challenge, Token},
};
use std::{fmt, sync::Arc};

/// How the caller names the target of a request.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TargetSpec<'a> {
    /// `fqdn[:port]`, negotiated with SPNEGO against `HTTP@fqdn`.
    Host(&'a str),
    /// Legacy addressing by service principal name.
    Principal {
        mechanism: NegotiateMechanism,
        name: &'a str,
    },
}

impl TargetSpec<'_> {
    fn resolve(self) -> Result<NegotiationTarget> {
        match self {
            TargetSpec::Host(host) => Ok(NegotiationTarget::Host(host.parse()?)),
            TargetSpec::Principal { mechanism, name } => Ok(NegotiationTarget::Principal {
                mechanism,
                name: name.parse::<ServicePrincipal>()?,
            }),
        }
    }
}

/// One round of a negotiation.
#[derive(Clone, Copy, Debug)]
pub struct TokenRequest<'a> {
    /// Base64 server challenge, empty on the first round.
    pub challenge: &'a str,
    pub target: TargetSpec<'a>,
    /// Ask for delegation. The KDC may still refuse it.
    pub allow_delegation: bool,
    /// Connected socket to bind the token to. Borrowed, never closed.
    pub transport: Option<RawTransport<'a>>,
}

impl<'a> TokenRequest<'a> {
    pub fn host(challenge: &'a str, host: &'a str, allow_delegation: bool) -> TokenRequest<'a> {
        TokenRequest {
            challenge,
            target: TargetSpec::Host(host),
            allow_delegation,
            transport: None,
        }
    }

    pub fn with_transport(mut self, transport: RawTransport<'a>) -> TokenRequest<'a> {
        self.transport = Some(transport);
        self
    }
}

/// State of one authentication exchange.
#[derive(Default)]
pub struct NegotiationContext {
    status: GssStatusCode,
    initiated: bool,
    target: Option<NegotiationTarget>,
    bindings: Option<ChannelBindings>,
    flags: CtxFlags,
    security: Option<Box<dyn SecurityContext>>,
}

impl NegotiationContext {
    pub fn status(&self) -> GssStatusCode {
        self.status
    }

    pub fn state(&self) -> NegotiationState {
        self.status.into()
    }

    /// True once any token generation was attempted, even a failed one.
    pub fn establishment_initiated(&self) -> bool {
        self.initiated
    }

    /// The target this exchange is fixed to, once the first call named it.
    pub fn target(&self) -> Option<&NegotiationTarget> {
        self.target.as_ref()
    }

    pub fn channel_bindings(&self) -> Option<&ChannelBindings> {
        self.bindings.as_ref()
    }

    /// Flags the mechanism reported on its latest round.
    pub fn granted_flags(&self) -> CtxFlags {
        self.flags
    }

    /// Whether a live security context is held.
    pub fn has_security_context(&self) -> bool {
        self.security.is_some()
    }
}

impl fmt::Debug for NegotiationContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NegotiationContext")
            .field("status", &self.status)
            .field("initiated", &self.initiated)
            .field("target", &self.target)
            .field("bindings", &self.bindings.is_some())
            .field("flags", &self.flags)
            .field("security", &self.security.is_some())
            .finish()
    }
}

type StepResult = (GssStatusCode, Option<Vec<u8>>);

fn failed(status: GssStatusCode) -> StepResult {
    (status, None)
}

pub struct NegotiateEngineBuilder {
    cache: Arc<dyn TicketCache>,
    mechanism: Arc<dyn Mechanism>,
    runtime: Option<Arc<NegotiateRuntime>>,
}

impl NegotiateEngineBuilder {
    /// Use `runtime` instead of the process-wide one.
    pub fn runtime(mut self, runtime: Arc<NegotiateRuntime>) -> NegotiateEngineBuilder {
        self.runtime = Some(runtime);
        self
    }

    pub fn build(self) -> NegotiateEngine {
        NegotiateEngine {
            cache: self.cache,
            mechanism: self.mechanism,
            runtime: self.runtime.unwrap_or_else(NegotiateRuntime::global),
            context: NegotiationContext::default(),
        }
    }
}

/// Generates Negotiate tokens for one exchange at a time.
///
/// An engine is not meant to be shared between threads while a call is
/// running; independent engines may run concurrently.
pub struct NegotiateEngine {
    cache: Arc<dyn TicketCache>,
    mechanism: Arc<dyn Mechanism>,
    runtime: Arc<NegotiateRuntime>,
    context: NegotiationContext,
}

impl NegotiateEngine {
    pub fn new(cache: Arc<dyn TicketCache>, mechanism: Arc<dyn Mechanism>) -> NegotiateEngine {
        NegotiateEngine::builder(cache, mechanism).build()
    }

    pub fn builder(
        cache: Arc<dyn TicketCache>,
        mechanism: Arc<dyn Mechanism>,
    ) -> NegotiateEngineBuilder {
        NegotiateEngineBuilder {
            cache,
            mechanism,
            runtime: None,
        }
    }

    pub fn runtime(&self) -> &Arc<NegotiateRuntime> {
        &self.runtime
    }

    pub fn context(&self) -> &NegotiationContext {
        &self.context
    }

    pub fn status(&self) -> GssStatusCode {
        self.context.status()
    }

    pub fn state(&self) -> NegotiationState {
        self.context.state()
    }

    pub fn context_establishment_initiated(&self) -> bool {
        self.context.establishment_initiated()
    }

    pub fn target(&self) -> Option<&NegotiationTarget> {
        self.context.target()
    }

    pub fn granted_flags(&self) -> CtxFlags {
        self.context.granted_flags()
    }

    /// Whether the finished context carries delegated credentials.
    pub fn delegation_granted(&self) -> bool {
        self.context.flags.contains(CtxFlags::GSS_C_DELEG_FLAG)
    }

    /// Drop the current exchange and start over with a fresh context.
    pub fn reset_context(&mut self) {
        debug!("discarding negotiation context ({})", self.context.status);
        self.context = NegotiationContext::default();
    }

    pub fn generate_token(
        &mut self,
        challenge: &str,
        host: &str,
        allow_delegation: bool,
    ) -> Result<Option<Token>> {
        self.generate(TokenRequest::host(challenge, host, allow_delegation))
    }

    pub fn generate_token_with_channel_binding(
        &mut self,
        challenge: &str,
        host: &str,
        allow_delegation: bool,
        socket: RawTransport<'_>,
    ) -> Result<Option<Token>> {
        self.generate(TokenRequest::host(challenge, host, allow_delegation).with_transport(socket))
    }

    #[deprecated(note = "address the target by host with `generate_token`")]
    pub fn generate_token_for_principal(
        &mut self,
        challenge: &str,
        mechanism: NegotiateMechanism,
        service_principal: &str,
        allow_delegation: bool,
    ) -> Result<Option<Token>> {
        self.generate(TokenRequest {
            challenge,
            target: TargetSpec::Principal {
                mechanism,
                name: service_principal,
            },
            allow_delegation,
            transport: None,
        })
    }

    /// Run one round of the exchange.
    ///
    /// Returns the next token to send, or `None` when nothing usable was
    /// produced; [`status`](Self::status) says which. A context that already
    /// finished is a usage error, unless it failed before the mechanism was
    /// started: then the call begins a fresh exchange, so a caller can cache
    /// a ticket after `no-cred` and simply call again.
    pub fn generate(&mut self, request: TokenRequest<'_>) -> Result<Option<Token>> {
        if self.context.state().is_terminal() {
            if self.context.target.is_some() {
                return Err(NegotiateError::ContextFinished(self.context.status));
            }
            // no mechanism ever ran, e.g. the ticket was missing
            debug!("retrying after {}", self.context.status);
            self.context = NegotiationContext::default();
        }
        self.context.initiated = true;
        let (status, token) = self.step(request);
        let previous = std::mem::replace(&mut self.context.status, status);
        if previous != status {
            debug!("negotiation status {previous} -> {status}");
        }
        if self.context.state().is_terminal() {
            // releases the mechanism's context handle
            self.context.security = None;
        }
        if status.is_error() {
            return Ok(None);
        }
        Ok(token.filter(|t| !t.is_empty()).map(|t| Token::encode(&t)))
    }

    fn step(&mut self, request: TokenRequest<'_>) -> StepResult {
        let input = match decode_challenge(request.challenge) {
            Ok(input) => input,
            Err(e) => {
                debug!("undecodable challenge: {e}");
                return failed(GssStatusCode::CallBadStructure);
            }
        };
        let target = match request.target.resolve() {
            Ok(target) => target,
            Err(e) => {
                debug!("{e}");
                return failed(GssStatusCode::BadName);
            }
        };
        if let Some(fixed) = &self.context.target {
            if *fixed != target {
                warn!("negotiation is fixed to {fixed}, refusing to continue with {target}");
                return failed(GssStatusCode::CallBadStructure);
            }
        }
        let bindings = match request.transport.map(ChannelBindings::from_socket) {
            None => None,
            Some(Ok(bindings)) => Some(bindings),
            Some(Err(e)) => {
                debug!("cannot compute channel bindings: {e}");
                return failed(GssStatusCode::BadBindings);
            }
        };
        if let Some(bindings) = &bindings {
            match &self.context.bindings {
                Some(bound) if bound != bindings => {
                    warn!("context is already bound to a different transport");
                    return failed(GssStatusCode::BadBindings);
                }
                None if self.context.security.is_some() => {
                    warn!("channel bindings must be supplied on the first round");
                    return failed(GssStatusCode::BadBindings);
                }
                _ => (),
            }
        }
        let runtime = Arc::clone(&self.runtime);
        let kind = RequestKind::for_delegation(request.allow_delegation);
        let (_in_flight, control) = runtime.begin(target.host(), kind);
        if self.context.security.is_none() {
            let Some(ticket) = self.cache.lookup(target.host(), &control) else {
                debug!("no cached ticket for {}", target.host());
                return failed(GssStatusCode::NoCred);
            };
            if ticket.is_expired() {
                debug!("ticket for {} ({}) has expired", target.host(), ticket.client);
                return failed(GssStatusCode::CredentialsExpired);
            }
            trace!("using ticket of {} for {target}", ticket.client);
            let flags = CtxFlags::requested(request.allow_delegation);
            let context_request = ContextRequest {
                ticket: &ticket,
                target: &target,
                flags,
                channel_bindings: bindings.as_ref(),
            };
            match self.mechanism.initiate(&context_request) {
                Ok(security) => self.context.security = Some(security),
                Err(outcome) => {
                    debug!("{} refused to start a context (minor {})", target.mechanism(), outcome.minor);
                    return failed(outcome.major.into());
                }
            }
            self.context.bindings = bindings;
            self.context.target = Some(target);
        }
        let Some(security) = self.context.security.as_mut() else {
            return failed(GssStatusCode::NoContext);
        };
        let outcome = security.step(input.as_deref(), &control);
        self.context.flags = outcome.flags;
        if control.is_cancelled() {
            debug!("negotiation was cancelled");
            return failed(GssStatusCode::Failure);
        }
        if control.is_expired() {
            debug!("negotiation exceeded its deadline");
            return failed(GssStatusCode::Unavailable);
        }
        if outcome.major.is_error() {
            debug!("mechanism step failed (minor {})", outcome.minor);
        }
        (outcome.major.into(), outcome.token)
    }
}

impl fmt::Debug for NegotiateEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NegotiateEngine")
            .field("context", &self.context)
            .finish_non_exhaustive()
    }
}
