use super::{
    credential::Cred,
    error::GssError,
    name::Name,
    oid::Oid,
    util::{Buf, BufRef},
    GSS_C_INDEFINITE, GSS_S_COMPLETE,
};
use crate::{
    channel::{ChannelAddress, ChannelBindings},
    mech::{CtxFlags, SecurityContext, StepOutcome},
    runtime::StepControl,
    status::MajorStatus,
};
use gss_negotiate_sys::{
    gss_OID, gss_buffer_desc, gss_channel_bindings_struct, gss_ctx_id_struct, gss_ctx_id_t,
    gss_delete_sec_context, gss_init_sec_context, OM_uint32,
};
use std::{fmt, ptr};

const GSS_C_AF_NULLADDR: OM_uint32 = 255;

fn delete_ctx(mut ctx: gss_ctx_id_t) {
    if !ctx.is_null() {
        let mut minor = GSS_S_COMPLETE;
        let _major = unsafe {
            gss_delete_sec_context(
                &mut minor as *mut OM_uint32,
                &mut ctx as *mut gss_ctx_id_t,
                ptr::null_mut::<gss_buffer_desc>(),
            )
        };
    }
}

fn address_to_c(address: Option<&ChannelAddress>) -> (OM_uint32, BufRef<'_>) {
    match address {
        None => (GSS_C_AF_NULLADDR, BufRef::from(&[][..])),
        Some(address) => (address.family as OM_uint32, BufRef::from(&address.octets[..])),
    }
}

enum ClientCtxState {
    Failed(GssError),
    Uninit,
    Partial(gss_ctx_id_t),
    Complete(gss_ctx_id_t),
}

/// An initiator security context driven through `gss_init_sec_context`.
pub struct ClientCtx {
    state: ClientCtxState,
    cred: Cred,
    target: Name,
    mech: &'static Oid,
    flags: CtxFlags,
    bindings: Option<ChannelBindings>,
}

unsafe impl Send for ClientCtx {}

impl Drop for ClientCtx {
    fn drop(&mut self) {
        match self.state {
            ClientCtxState::Failed(_) | ClientCtxState::Uninit => (),
            ClientCtxState::Partial(ctx) | ClientCtxState::Complete(ctx) => delete_ctx(ctx),
        }
    }
}

impl fmt::Debug for ClientCtx {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = match self.state {
            ClientCtxState::Failed(_) => "failed",
            ClientCtxState::Uninit => "uninit",
            ClientCtxState::Partial(_) => "partial",
            ClientCtxState::Complete(_) => "complete",
        };
        f.debug_struct("ClientCtx")
            .field("state", &state)
            .field("target", &self.target)
            .field("mech", self.mech)
            .field("flags", &self.flags)
            .finish()
    }
}

impl ClientCtx {
    pub fn new(
        cred: Cred,
        target: Name,
        mech: &'static Oid,
        flags: CtxFlags,
        bindings: Option<ChannelBindings>,
    ) -> ClientCtx {
        ClientCtx {
            state: ClientCtxState::Uninit,
            cred,
            target,
            mech,
            flags,
            bindings,
        }
    }

    /// Run one `gss_init_sec_context` call. Returns the raw status, the
    /// output token and the flags granted so far.
    pub fn step_raw(&mut self, tok: Option<&[u8]>) -> Result<(MajorStatus, Buf, CtxFlags), GssError> {
        let mut ctx = match self.state {
            ClientCtxState::Uninit => ptr::null_mut::<gss_ctx_id_struct>(),
            ClientCtxState::Partial(ctx) => ctx,
            ClientCtxState::Failed(e) => return Err(e),
            ClientCtxState::Complete(_) => return Err(GssError::new(MajorStatus::NO_CONTEXT.0, 0)),
        };
        let mut minor = GSS_S_COMPLETE;
        let mut tok = tok.map(BufRef::from);
        let mut out_tok = Buf::empty();
        let mut flag_bits: OM_uint32 = 0;
        let mut bindings = self.bindings.as_ref().map(|cb| {
            let (initiator_addrtype, initiator) = address_to_c(cb.initiator.as_ref());
            let (acceptor_addrtype, acceptor) = address_to_c(cb.acceptor.as_ref());
            let data = BufRef::from(cb.application_data.as_deref().unwrap_or_default());
            gss_channel_bindings_struct {
                initiator_addrtype,
                initiator_address: initiator.desc(),
                acceptor_addrtype,
                acceptor_address: acceptor.desc(),
                application_data: data.desc(),
            }
        });
        let major = unsafe {
            gss_init_sec_context(
                &mut minor as *mut OM_uint32,
                self.cred.to_c(),
                &mut ctx as *mut gss_ctx_id_t,
                self.target.to_c(),
                self.mech.to_c(),
                self.flags.bits(),
                GSS_C_INDEFINITE,
                match bindings {
                    None => ptr::null_mut::<gss_channel_bindings_struct>(),
                    Some(ref mut cb) => cb as *mut gss_channel_bindings_struct,
                },
                match tok {
                    None => ptr::null_mut::<gss_buffer_desc>(),
                    Some(ref mut tok) => tok.to_c(),
                },
                ptr::null_mut::<gss_OID>(),
                out_tok.to_c(),
                &mut flag_bits as *mut OM_uint32,
                ptr::null_mut::<OM_uint32>(),
            )
        };
        let major = MajorStatus(major);
        let flags = CtxFlags::from_bits_truncate(flag_bits);
        if major.is_error() {
            let e = GssError { major, minor };
            self.state = ClientCtxState::Failed(e);
            delete_ctx(ctx);
            Err(e)
        } else if major.is_continue_needed() {
            self.state = ClientCtxState::Partial(ctx);
            Ok((major, out_tok, flags))
        } else {
            self.state = ClientCtxState::Complete(ctx);
            Ok((major, out_tok, flags))
        }
    }
}

impl SecurityContext for ClientCtx {
    fn step(&mut self, input: Option<&[u8]>, control: &StepControl) -> StepOutcome {
        trace!("gss_init_sec_context with {:?} left", control.remaining());
        match self.step_raw(input) {
            Err(e) => {
                debug!("{}", e.to_string().trim_end());
                e.into()
            }
            Ok((major, token, flags)) => StepOutcome {
                major,
                minor: 0,
                token: (!token.is_empty()).then(|| token.to_vec()),
                flags,
            },
        }
    }
}
