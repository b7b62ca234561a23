//! The system GSS-API library (MIT krb5 or Heimdal) as a [`Mechanism`] and
//! a [`TicketCache`].
use crate::{
    mech::{ContextRequest, Mechanism, SecurityContext, StepOutcome},
    runtime::StepControl,
    status::GssStatusCode,
    target::HostSpec,
    ticket::{Ticket, TicketCache},
};
use gss_negotiate_sys::OM_uint32;
use std::time::{Duration, SystemTime};

pub mod context;
pub mod credential;
pub mod error;
pub mod name;
pub mod oid;
mod util;

pub use context::ClientCtx;
pub use credential::Cred;
pub use error::GssError;
pub use name::Name;
pub use oid::{Oid, OidSet};
pub use util::Buf;

pub(crate) const GSS_S_COMPLETE: OM_uint32 = 0;
pub(crate) const GSS_C_INDEFINITE: OM_uint32 = 0xffff_ffff;

/// Tokens from `gss_init_sec_context` using the default credential cache.
///
/// The ticket handed over by the engine only gates the attempt; the
/// library reads the actual credentials from the cache itself.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemGss;

impl SystemGss {
    pub fn new() -> SystemGss {
        SystemGss
    }
}

impl Mechanism for SystemGss {
    fn initiate(&self, request: &ContextRequest<'_>) -> Result<Box<dyn SecurityContext>, StepOutcome> {
        let mech = Oid::for_mechanism(request.mechanism());
        let desired_mechs = OidSet::try_from(mech)?;
        let cred = Cred::acquire(None, Some(&desired_mechs))?;
        let target = Name::for_service(&request.target.service_name())?;
        debug!("initiating {} context for {target}", request.mechanism());
        Ok(Box::new(ClientCtx::new(
            cred,
            target,
            mech,
            request.flags,
            request.channel_bindings.cloned(),
        )))
    }
}

/// Reports a ticket for any host while the default credential cache holds
/// unexpired initiator credentials.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemTicketCache;

impl SystemTicketCache {
    pub fn new() -> SystemTicketCache {
        SystemTicketCache
    }
}

impl TicketCache for SystemTicketCache {
    fn lookup(&self, host: &HostSpec, _control: &StepControl) -> Option<Ticket> {
        let service = host.service_name().name;
        let cred = match Cred::acquire(None, None) {
            Ok(cred) => cred,
            Err(e) if e.status() == GssStatusCode::CredentialsExpired => {
                debug!("default credentials have expired");
                return Some(Ticket::new("", service, Duration::ZERO).with_expiry(SystemTime::UNIX_EPOCH));
            }
            Err(e) => {
                debug!("no default credentials: {}", e.to_string().trim_end());
                return None;
            }
        };
        let client = cred.name().map(|n| n.to_string()).unwrap_or_default();
        // an indefinite lifetime comes back as u32::MAX seconds
        let lifetime = cred.lifetime().unwrap_or_else(|e| {
            warn!("cannot read credential lifetime: {}", e.to_string().trim_end());
            Duration::ZERO
        });
        Some(Ticket::new(client, service, lifetime))
    }
}
