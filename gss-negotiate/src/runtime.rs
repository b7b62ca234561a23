//! Shared negotiation settings: request timeouts, the registry of in-flight
//! requests, and advisory cancellation.
//!
//! One [`NegotiateRuntime`] is created lazily for the whole process and used
//! by engines that are not given their own. Timeouts are read once when a
//! request starts, so changing them never moves the deadline of a request
//! that is already running.
use crate::{
    error::{NegotiateError, Result},
    target::HostSpec,
};
use parking_lot::Mutex;
use std::{
    collections::HashMap,
    sync::{
        atomic::{AtomicBool, AtomicU64, Ordering},
        Arc,
    },
    time::{Duration, Instant},
};

pub const DEFAULT_KDC_TIMEOUT: Duration = Duration::from_secs(120);
pub const DEFAULT_DIRECT_TIMEOUT: Duration = Duration::from_secs(30);

/// Deadlines further out than this are treated as this far out.
const MAX_DEADLINE: Duration = Duration::from_secs(u32::MAX as u64);

lazy_static! {
    static ref GLOBAL: Arc<NegotiateRuntime> = Arc::new(NegotiateRuntime::new());
}

/// Which timeout knob governs a request.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum RequestKind {
    /// Plain requests for a ticket the client already holds.
    #[default]
    Direct,
    /// Requests that need the KDC to mint a delegated (KCD) ticket.
    KdcMediated,
}

impl RequestKind {
    pub fn for_delegation(allow_delegation: bool) -> RequestKind {
        if allow_delegation {
            RequestKind::KdcMediated
        } else {
            RequestKind::Direct
        }
    }
}

/// The two process-wide timeout knobs, in whole seconds.
#[derive(Debug)]
pub struct NegotiateTimeouts {
    kdc_mediated: AtomicU64,
    direct: AtomicU64,
}

impl Default for NegotiateTimeouts {
    fn default() -> Self {
        NegotiateTimeouts::new()
    }
}

impl NegotiateTimeouts {
    pub const fn new() -> NegotiateTimeouts {
        NegotiateTimeouts {
            kdc_mediated: AtomicU64::new(DEFAULT_KDC_TIMEOUT.as_secs()),
            direct: AtomicU64::new(DEFAULT_DIRECT_TIMEOUT.as_secs()),
        }
    }

    /// Set both knobs to `seconds`. Non-positive values are rejected, never
    /// clamped.
    pub fn set(&self, seconds: i64) -> Result<()> {
        if seconds <= 0 {
            return Err(NegotiateError::InvalidArgument(format!(
                "negotiate timeout must be greater than 0 seconds, got {seconds}"
            )));
        }
        let seconds = seconds as u64;
        self.kdc_mediated.store(seconds, Ordering::Release);
        self.direct.store(seconds, Ordering::Release);
        debug!("negotiate timeout set to {seconds}s");
        Ok(())
    }

    /// Restore the defaults (120s KDC mediated, 30s direct).
    pub fn reset(&self) {
        self.kdc_mediated
            .store(DEFAULT_KDC_TIMEOUT.as_secs(), Ordering::Release);
        self.direct
            .store(DEFAULT_DIRECT_TIMEOUT.as_secs(), Ordering::Release);
        debug!("negotiate timeouts reset to defaults");
    }

    pub fn kdc_mediated(&self) -> Duration {
        Duration::from_secs(self.kdc_mediated.load(Ordering::Acquire))
    }

    pub fn direct(&self) -> Duration {
        Duration::from_secs(self.direct.load(Ordering::Acquire))
    }

    pub fn for_kind(&self, kind: RequestKind) -> Duration {
        match kind {
            RequestKind::Direct => self.direct(),
            RequestKind::KdcMediated => self.kdc_mediated(),
        }
    }
}

/// A shared, cooperative cancellation flag.
#[derive(Clone, Debug, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> CancelFlag {
        CancelFlag::default()
    }

    /// Returns true if this call is the one that cancelled the flag.
    pub fn cancel(&self) -> bool {
        !self.0.swap(true, Ordering::AcqRel)
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

/// Deadline and cancellation state of one request, handed to the ticket
/// cache and to every mechanism step so blocking work can give up early.
#[derive(Clone, Debug)]
pub struct StepControl {
    deadline: Instant,
    cancel: CancelFlag,
}

impl StepControl {
    pub fn new(timeout: Duration) -> StepControl {
        StepControl::with_cancel(timeout, CancelFlag::new())
    }

    pub fn with_cancel(timeout: Duration, cancel: CancelFlag) -> StepControl {
        let now = Instant::now();
        StepControl {
            deadline: saturating_deadline(now, timeout),
            cancel,
        }
    }

    pub fn deadline(&self) -> Instant {
        self.deadline
    }

    pub fn remaining(&self) -> Duration {
        self.deadline.saturating_duration_since(Instant::now())
    }

    pub fn is_expired(&self) -> bool {
        Instant::now() >= self.deadline
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    pub fn cancel_flag(&self) -> &CancelFlag {
        &self.cancel
    }
}

// the largest deadline the clock can represent, capped at MAX_DEADLINE
fn saturating_deadline(now: Instant, timeout: Duration) -> Instant {
    let mut timeout = timeout.min(MAX_DEADLINE);
    loop {
        match now.checked_add(timeout) {
            Some(deadline) => return deadline,
            None => timeout /= 2,
        }
    }
}

/// Requests currently running, keyed by target host.
#[derive(Debug, Default)]
pub struct InFlight {
    next_id: AtomicU64,
    entries: Mutex<HashMap<HostSpec, Vec<(u64, CancelFlag)>>>,
}

impl InFlight {
    pub fn new() -> InFlight {
        InFlight::default()
    }

    /// Record a request for `host`. It stays registered until the guard is
    /// dropped.
    pub fn register(&self, host: &HostSpec) -> (InFlightGuard<'_>, CancelFlag) {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let flag = CancelFlag::new();
        self.entries
            .lock()
            .entry(host.clone())
            .or_default()
            .push((id, flag.clone()));
        let guard = InFlightGuard {
            registry: self,
            host: host.clone(),
            id,
        };
        (guard, flag)
    }

    /// Flag every running request for `host` as cancelled. Returns whether
    /// any request that was not already cancelled was found.
    pub fn cancel(&self, host: &HostSpec) -> bool {
        let entries = self.entries.lock();
        let found = entries
            .get(host)
            .map(|requests| {
                requests
                    .iter()
                    .fold(false, |found, (_, flag)| flag.cancel() || found)
            })
            .unwrap_or(false);
        if found {
            debug!("cancellation dispatched for {host}");
        }
        found
    }

    pub fn is_in_flight(&self, host: &HostSpec) -> bool {
        self.entries
            .lock()
            .get(host)
            .map_or(false, |requests| !requests.is_empty())
    }

    fn remove(&self, host: &HostSpec, id: u64) {
        let mut entries = self.entries.lock();
        if let Some(requests) = entries.get_mut(host) {
            requests.retain(|(i, _)| *i != id);
            if requests.is_empty() {
                entries.remove(host);
            }
        }
    }
}

/// Removes its request from the [`InFlight`] registry when dropped.
#[derive(Debug)]
pub struct InFlightGuard<'a> {
    registry: &'a InFlight,
    host: HostSpec,
    id: u64,
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.registry.remove(&self.host, self.id)
    }
}

/// Timeouts plus the in-flight registry, shared by every engine that uses
/// it.
#[derive(Debug, Default)]
pub struct NegotiateRuntime {
    timeouts: NegotiateTimeouts,
    in_flight: InFlight,
}

impl NegotiateRuntime {
    pub fn new() -> NegotiateRuntime {
        NegotiateRuntime::default()
    }

    /// The process-wide instance. It lives until the process exits.
    pub fn global() -> Arc<NegotiateRuntime> {
        Arc::clone(&GLOBAL)
    }

    pub fn timeouts(&self) -> &NegotiateTimeouts {
        &self.timeouts
    }

    pub fn in_flight(&self) -> &InFlight {
        &self.in_flight
    }

    /// Register a request for `host` and capture its deadline now.
    pub fn begin(&self, host: &HostSpec, kind: RequestKind) -> (InFlightGuard<'_>, StepControl) {
        let (guard, flag) = self.in_flight.register(host);
        let timeout = self.timeouts.for_kind(kind);
        trace!("request for {host} starts with a {timeout:?} deadline");
        (guard, StepControl::with_cancel(timeout, flag))
    }

    /// Best effort: returns whether a cancellable request for `host` was
    /// found, not whether it stopped. A malformed host never matches.
    pub fn cancel(&self, host: &str) -> bool {
        match host.parse::<HostSpec>() {
            Ok(host) => self.in_flight.cancel(&host),
            Err(e) => {
                debug!("not cancelling: {e}");
                false
            }
        }
    }
}

/// Set both timeout knobs of the process-wide runtime.
pub fn set_negotiate_timeout(seconds: i64) -> Result<()> {
    GLOBAL.timeouts.set(seconds)
}

/// Restore the process-wide timeouts to 120s / 30s.
pub fn reset_negotiate_timeout() {
    GLOBAL.timeouts.reset()
}

/// Try to cancel an in-flight negotiation for `host` on the process-wide
/// runtime. See [`NegotiateRuntime::cancel`].
pub fn cancel_negotiation(host: &str) -> bool {
    GLOBAL.cancel(host)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn host(s: &str) -> HostSpec {
        s.parse().unwrap()
    }

    #[test]
    fn timeouts_default_and_reset() {
        let timeouts = NegotiateTimeouts::new();
        assert_eq!(timeouts.kdc_mediated(), Duration::from_secs(120));
        assert_eq!(timeouts.direct(), Duration::from_secs(30));
        timeouts.set(45).unwrap();
        assert_eq!(timeouts.for_kind(RequestKind::KdcMediated), Duration::from_secs(45));
        assert_eq!(timeouts.for_kind(RequestKind::Direct), Duration::from_secs(45));
        timeouts.reset();
        assert_eq!(timeouts.kdc_mediated(), DEFAULT_KDC_TIMEOUT);
        assert_eq!(timeouts.direct(), DEFAULT_DIRECT_TIMEOUT);
    }

    #[test]
    fn non_positive_timeouts_are_rejected() {
        let timeouts = NegotiateTimeouts::new();
        for seconds in [0, -5] {
            let err = timeouts.set(seconds).unwrap_err();
            assert!(matches!(err, NegotiateError::InvalidArgument(_)));
        }
        assert_eq!(timeouts.direct(), DEFAULT_DIRECT_TIMEOUT);
    }

    #[test]
    fn deadline_is_captured_at_start() {
        let runtime = NegotiateRuntime::new();
        let target = host("svc.example.com");
        let (_guard, control) = runtime.begin(&target, RequestKind::Direct);
        let before = control.deadline();
        runtime.timeouts().set(1).unwrap();
        assert_eq!(control.deadline(), before);
        assert!(control.remaining() > Duration::from_secs(1));
    }

    #[test]
    fn huge_timeouts_saturate_instead_of_expiring() {
        let runtime = NegotiateRuntime::new();
        runtime.timeouts().set(i64::MAX).unwrap();
        let (_guard, control) = runtime.begin(&host("svc.example.com"), RequestKind::Direct);
        assert!(!control.is_expired());
        assert!(control.remaining() > Duration::from_secs(365 * 24 * 3600));
        assert!(!StepControl::new(Duration::MAX).is_expired());
    }

    #[test]
    fn cancel_without_request_is_false() {
        let runtime = NegotiateRuntime::new();
        assert!(!runtime.cancel("nohost.example.com"));
        assert!(!runtime.cancel("not a host"));
    }

    #[test]
    fn cancel_reaches_registered_request_once() {
        let runtime = NegotiateRuntime::new();
        let target = host("svc.example.com:8443");
        let (guard, control) = runtime.begin(&target, RequestKind::KdcMediated);
        assert!(runtime.in_flight().is_in_flight(&target));
        assert!(!runtime.cancel("svc.example.com"));
        assert!(runtime.cancel("SVC.example.com:8443"));
        assert!(control.is_cancelled());
        assert!(!runtime.cancel("svc.example.com:8443"));
        drop(guard);
        assert!(!runtime.in_flight().is_in_flight(&target));
    }

    #[test]
    fn guards_only_remove_their_own_entry() {
        let registry = InFlight::new();
        let target = host("svc.example.com");
        let (first, _) = registry.register(&target);
        let (second, second_flag) = registry.register(&target);
        drop(first);
        assert!(registry.is_in_flight(&target));
        assert!(registry.cancel(&target));
        assert!(second_flag.is_cancelled());
        drop(second);
        assert!(!registry.is_in_flight(&target));
    }
}
