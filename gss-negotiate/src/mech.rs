//! The seam between the engine and the GSS-API implementation that actually
//! produces tokens.
use crate::{
    channel::ChannelBindings,
    runtime::StepControl,
    status::MajorStatus,
    target::{NegotiateMechanism, NegotiationTarget},
    ticket::Ticket,
};

bitflags! {
    /// Context flags, with the bit values of RFC 2744.
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
    pub struct CtxFlags: u32 {
        const GSS_C_DELEG_FLAG = 1;
        const GSS_C_MUTUAL_FLAG = 2;
        const GSS_C_REPLAY_FLAG = 4;
        const GSS_C_SEQUENCE_FLAG = 8;
        const GSS_C_CONF_FLAG = 16;
        const GSS_C_INTEG_FLAG = 32;
        const GSS_C_ANON_FLAG = 64;
        const GSS_C_PROT_READY_FLAG = 128;
        const GSS_C_TRANS_FLAG = 256;
        const GSS_C_DELEG_POLICY_FLAG = 32768;
    }
}

impl CtxFlags {
    /// Flags every negotiation asks for. Delegation is added per call.
    pub const REQUESTED: CtxFlags = CtxFlags::GSS_C_MUTUAL_FLAG
        .union(CtxFlags::GSS_C_REPLAY_FLAG)
        .union(CtxFlags::GSS_C_SEQUENCE_FLAG)
        .union(CtxFlags::GSS_C_INTEG_FLAG);

    pub fn requested(allow_delegation: bool) -> CtxFlags {
        if allow_delegation {
            CtxFlags::REQUESTED | CtxFlags::GSS_C_DELEG_POLICY_FLAG
        } else {
            CtxFlags::REQUESTED
        }
    }
}

/// Everything a mechanism needs to start a security context.
#[derive(Debug, Clone, Copy)]
pub struct ContextRequest<'a> {
    pub ticket: &'a Ticket,
    pub target: &'a NegotiationTarget,
    pub flags: CtxFlags,
    pub channel_bindings: Option<&'a ChannelBindings>,
}

impl ContextRequest<'_> {
    pub fn mechanism(&self) -> NegotiateMechanism {
        self.target.mechanism()
    }
}

/// The result of one `init_sec_context` style step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepOutcome {
    pub major: MajorStatus,
    pub minor: u32,
    /// Output token, if the mechanism produced one.
    pub token: Option<Vec<u8>>,
    /// Flags granted so far.
    pub flags: CtxFlags,
}

impl StepOutcome {
    pub fn complete(token: Option<Vec<u8>>) -> StepOutcome {
        StepOutcome {
            major: MajorStatus::COMPLETE,
            minor: 0,
            token,
            flags: CtxFlags::empty(),
        }
    }

    pub fn continue_needed(token: Vec<u8>) -> StepOutcome {
        StepOutcome {
            major: MajorStatus::CONTINUE_NEEDED,
            minor: 0,
            token: Some(token),
            flags: CtxFlags::empty(),
        }
    }

    pub fn error(major: MajorStatus, minor: u32) -> StepOutcome {
        StepOutcome {
            major,
            minor,
            token: None,
            flags: CtxFlags::empty(),
        }
    }

    pub fn with_flags(mut self, flags: CtxFlags) -> StepOutcome {
        self.flags = flags;
        self
    }
}

/// A started security context. Dropping it releases whatever the mechanism
/// holds for it.
pub trait SecurityContext: Send {
    /// Advance the context. `input` is the server's token, absent on the
    /// first step of a client-initiated exchange.
    fn step(&mut self, input: Option<&[u8]>, control: &StepControl) -> StepOutcome;
}

/// Creates security contexts. Shared between engines and threads.
pub trait Mechanism: Send + Sync {
    fn initiate(&self, request: &ContextRequest<'_>) -> Result<Box<dyn SecurityContext>, StepOutcome>;
}
