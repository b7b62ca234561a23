use super::{error::GssError, oid::Oid, util::{Buf, BufRef}, GSS_S_COMPLETE};
use crate::target::ServiceName;
use gss_negotiate_sys::{
    gss_OID, gss_OID_desc, gss_display_name, gss_import_name, gss_name_struct, gss_name_t,
    gss_release_name, OM_uint32,
};
use std::{fmt, ptr};

pub struct Name(gss_name_t);

unsafe impl Send for Name {}
unsafe impl Sync for Name {}

impl Drop for Name {
    fn drop(&mut self) {
        if !self.0.is_null() {
            let mut _minor = GSS_S_COMPLETE;
            let _major = unsafe {
                gss_release_name(&mut _minor as *mut OM_uint32, &mut self.0 as *mut gss_name_t)
            };
        }
    }
}

impl fmt::Debug for Name {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self.display_name() {
            Ok(buf) => write!(f, "{}", String::from_utf8_lossy(&buf)),
            Err(_) => write!(f, "<name can't be displayed>"),
        }
    }
}

impl fmt::Display for Name {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

impl Name {
    pub(crate) unsafe fn to_c(&self) -> gss_name_t {
        self.0
    }

    pub(crate) unsafe fn from_c(ptr: gss_name_t) -> Self {
        Name(ptr)
    }

    /// Parse `s` as a gssapi name of type `kind`, e.g.
    /// `GSS_NT_HOSTBASED_SERVICE`, or the mechanism default.
    pub fn new(s: &[u8], kind: Option<&Oid>) -> Result<Self, GssError> {
        let mut buf = BufRef::from(s);
        let mut minor = GSS_S_COMPLETE;
        let mut name = ptr::null_mut::<gss_name_struct>();
        let major = unsafe {
            gss_import_name(
                &mut minor as *mut OM_uint32,
                buf.to_c(),
                match kind {
                    None => ptr::null_mut::<gss_OID_desc>(),
                    Some(kind) => kind.to_c(),
                },
                &mut name as *mut gss_name_t,
            )
        };
        if major == GSS_S_COMPLETE {
            Ok(Name(name))
        } else {
            Err(GssError::new(major, minor))
        }
    }

    /// Import a negotiation target name with its matching name type.
    pub fn for_service(service: &ServiceName) -> Result<Self, GssError> {
        Name::new(service.name.as_bytes(), Some(Oid::for_name_type(service.kind)))
    }

    pub fn display_name(&self) -> Result<Buf, GssError> {
        let mut out = Buf::empty();
        let mut minor = GSS_S_COMPLETE;
        let mut oid = ptr::null_mut::<gss_OID_desc>();
        let major = unsafe {
            gss_display_name(
                &mut minor as *mut OM_uint32,
                self.to_c(),
                out.to_c(),
                &mut oid as *mut gss_OID,
            )
        };
        if major == GSS_S_COMPLETE {
            Ok(out)
        } else {
            Err(GssError::new(major, minor))
        }
    }
}
