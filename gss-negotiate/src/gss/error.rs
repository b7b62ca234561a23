use super::{util::Buf, GSS_S_COMPLETE};
use crate::{
    mech::StepOutcome,
    status::{GssStatusCode, MajorStatus},
};
use gss_negotiate_sys::{gss_OID_desc, gss_display_status, OM_uint32};
use std::{error, fmt, ptr};

const GSS_C_GSS_CODE: i32 = 1;
const GSS_C_MECH_CODE: i32 = 2;

/// A failed call into the GSS-API library.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct GssError {
    pub major: MajorStatus,
    pub minor: u32,
}

impl GssError {
    pub(crate) fn new(major: OM_uint32, minor: OM_uint32) -> GssError {
        GssError {
            major: MajorStatus(major),
            minor,
        }
    }

    pub fn status(&self) -> GssStatusCode {
        self.major.into()
    }

    fn fmt_code(f: &mut fmt::Formatter<'_>, code: u32, kind: i32) -> fmt::Result {
        let name = if kind == GSS_C_GSS_CODE { "major" } else { "minor" };
        let mut message_context: OM_uint32 = 0;
        loop {
            let mut minor = GSS_S_COMPLETE;
            let mut buf = Buf::empty();
            let major = unsafe {
                gss_display_status(
                    &mut minor as *mut OM_uint32,
                    code,
                    kind,
                    ptr::null_mut::<gss_OID_desc>(),
                    &mut message_context as *mut OM_uint32,
                    buf.to_c(),
                )
            };
            if major == GSS_S_COMPLETE {
                writeln!(f, "gssapi {name} error {}", String::from_utf8_lossy(&buf))?;
            } else {
                writeln!(f, "gssapi unknown {name} error code {code}")?;
                break;
            }
            if message_context == 0 {
                break;
            }
        }
        Ok(())
    }
}

impl fmt::Display for GssError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        GssError::fmt_code(f, self.major.0, GSS_C_GSS_CODE)?;
        GssError::fmt_code(f, self.minor, GSS_C_MECH_CODE)
    }
}

impl error::Error for GssError {}

impl From<GssError> for StepOutcome {
    fn from(e: GssError) -> StepOutcome {
        StepOutcome::error(e.major, e.minor)
    }
}
