//! Kerberos tickets as seen by the engine, and the cache that supplies them.
//!
//! The engine never acquires tickets itself. A [`TicketCache`] is populated
//! by whatever authentication flow the application runs; when no usable
//! ticket exists the engine fails the call and the caller decides whether
//! to obtain one and retry.
use crate::{runtime::StepControl, target::HostSpec};
use bytes::Bytes;
use parking_lot::RwLock;
use std::{
    collections::HashMap,
    fmt,
    time::{Duration, SystemTime},
};

/// A cached service ticket for one host.
#[derive(Clone)]
pub struct Ticket {
    /// Client principal, e.g. `user@EXAMPLE.COM`.
    pub client: String,
    /// Service principal the ticket was issued for.
    pub service: String,
    pub expires_at: SystemTime,
    /// Whether the KDC marked the service as trusted for delegation.
    pub ok_as_delegate: bool,
    /// Opaque credential material understood by the mechanism.
    pub data: Bytes,
}

impl Ticket {
    pub fn new(client: impl Into<String>, service: impl Into<String>, lifetime: Duration) -> Ticket {
        let now = SystemTime::now();
        Ticket {
            client: client.into(),
            service: service.into(),
            expires_at: now.checked_add(lifetime).unwrap_or(now),
            ok_as_delegate: false,
            data: Bytes::new(),
        }
    }

    pub fn with_delegation(mut self, ok_as_delegate: bool) -> Ticket {
        self.ok_as_delegate = ok_as_delegate;
        self
    }

    pub fn with_data(mut self, data: impl Into<Bytes>) -> Ticket {
        self.data = data.into();
        self
    }

    pub fn with_expiry(mut self, expires_at: SystemTime) -> Ticket {
        self.expires_at = expires_at;
        self
    }

    pub fn is_expired(&self) -> bool {
        self.expires_at <= SystemTime::now()
    }

    /// Time left before expiry, zero once expired.
    pub fn remaining(&self) -> Duration {
        self.expires_at
            .duration_since(SystemTime::now())
            .unwrap_or(Duration::ZERO)
    }
}

// never print credential material
impl fmt::Debug for Ticket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Ticket")
            .field("client", &self.client)
            .field("service", &self.service)
            .field("expires_at", &self.expires_at)
            .field("ok_as_delegate", &self.ok_as_delegate)
            .field("data", &format_args!("<{} bytes>", self.data.len()))
            .finish()
    }
}

/// Supplies tickets for target hosts.
///
/// Implementations may block (for example on a keychain or a KDC round
/// trip); they should honour `control` and give up once it is cancelled or
/// past its deadline.
pub trait TicketCache: Send + Sync {
    fn lookup(&self, host: &HostSpec, control: &StepControl) -> Option<Ticket>;
}

/// An in-process ticket cache keyed by host.
///
/// Expired tickets are still returned by `lookup` so the engine can report
/// `credentials-expired` rather than `no-cred`.
#[derive(Debug, Default)]
pub struct MemoryTicketCache {
    tickets: RwLock<HashMap<HostSpec, Ticket>>,
}

impl MemoryTicketCache {
    pub fn new() -> MemoryTicketCache {
        MemoryTicketCache::default()
    }

    /// Cache `ticket` for `host`, returning the ticket it replaced.
    pub fn insert(&self, host: HostSpec, ticket: Ticket) -> Option<Ticket> {
        debug!("caching ticket for {host} (client {})", ticket.client);
        self.tickets.write().insert(host, ticket)
    }

    pub fn remove(&self, host: &HostSpec) -> Option<Ticket> {
        self.tickets.write().remove(host)
    }

    pub fn clear(&self) {
        self.tickets.write().clear()
    }

    pub fn len(&self) -> usize {
        self.tickets.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.tickets.read().is_empty()
    }

    /// Drop every expired ticket, returning how many were removed.
    pub fn purge_expired(&self) -> usize {
        let mut tickets = self.tickets.write();
        let before = tickets.len();
        tickets.retain(|_, ticket| !ticket.is_expired());
        before - tickets.len()
    }
}

impl TicketCache for MemoryTicketCache {
    fn lookup(&self, host: &HostSpec, _control: &StepControl) -> Option<Ticket> {
        self.tickets.read().get(host).cloned()
    }
}
