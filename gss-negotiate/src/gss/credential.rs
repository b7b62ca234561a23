use super::{
    error::GssError, name::Name, oid::OidSet, GSS_C_INDEFINITE, GSS_S_COMPLETE,
};
use gss_negotiate_sys::{
    gss_OID_set, gss_acquire_cred, gss_cred_id_struct, gss_cred_id_t, gss_cred_usage_t,
    gss_inquire_cred, gss_name_struct, gss_name_t, gss_release_cred, OM_uint32,
};
use std::{fmt, ptr, time::Duration};

const GSS_C_INITIATE: gss_cred_usage_t = 1;

/// Initiator credentials from the default credential cache.
pub struct Cred(gss_cred_id_t);

impl Drop for Cred {
    fn drop(&mut self) {
        if !self.0.is_null() {
            let mut minor = GSS_S_COMPLETE;
            let _major = unsafe {
                gss_release_cred(&mut minor as *mut OM_uint32, &mut self.0 as *mut gss_cred_id_t)
            };
        }
    }
}

unsafe impl Send for Cred {}
unsafe impl Sync for Cred {}

impl fmt::Debug for Cred {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self.name() {
            Ok(name) => write!(f, "Cred({name})"),
            Err(_) => write!(f, "Cred(<unnamed>)"),
        }
    }
}

impl Cred {
    /// Acquire initiator credentials for `name` or the default principal,
    /// for use with `desired_mechs` or every available mechanism.
    pub fn acquire(name: Option<&Name>, desired_mechs: Option<&OidSet>) -> Result<Cred, GssError> {
        let mut minor = GSS_S_COMPLETE;
        let mut cred = ptr::null_mut::<gss_cred_id_struct>();
        let major = unsafe {
            gss_acquire_cred(
                &mut minor as *mut OM_uint32,
                match name {
                    None => ptr::null_mut::<gss_name_struct>(),
                    Some(n) => n.to_c(),
                },
                GSS_C_INDEFINITE,
                match desired_mechs {
                    None => ptr::null_mut(),
                    Some(desired_mechs) => desired_mechs.to_c(),
                },
                GSS_C_INITIATE,
                &mut cred as *mut gss_cred_id_t,
                ptr::null_mut::<gss_OID_set>(),
                ptr::null_mut::<OM_uint32>(),
            )
        };
        if major == GSS_S_COMPLETE {
            Ok(Cred(cred))
        } else {
            Err(GssError::new(major, minor))
        }
    }

    pub(crate) unsafe fn to_c(&self) -> gss_cred_id_t {
        self.0
    }

    /// The principal these credentials belong to.
    pub fn name(&self) -> Result<Name, GssError> {
        let mut minor = GSS_S_COMPLETE;
        let mut name = ptr::null_mut::<gss_name_struct>();
        let major = unsafe {
            gss_inquire_cred(
                &mut minor as *mut OM_uint32,
                self.0,
                &mut name as *mut gss_name_t,
                ptr::null_mut::<OM_uint32>(),
                ptr::null_mut::<gss_cred_usage_t>(),
                ptr::null_mut::<gss_OID_set>(),
            )
        };
        if major == GSS_S_COMPLETE {
            Ok(unsafe { Name::from_c(name) })
        } else {
            Err(GssError::new(major, minor))
        }
    }

    /// Time left before the underlying tickets expire.
    pub fn lifetime(&self) -> Result<Duration, GssError> {
        let mut minor = GSS_S_COMPLETE;
        let mut lifetime: OM_uint32 = 0;
        let major = unsafe {
            gss_inquire_cred(
                &mut minor as *mut OM_uint32,
                self.0,
                ptr::null_mut::<gss_name_t>(),
                &mut lifetime as *mut OM_uint32,
                ptr::null_mut::<gss_cred_usage_t>(),
                ptr::null_mut::<gss_OID_set>(),
            )
        };
        if major == GSS_S_COMPLETE {
            Ok(Duration::from_secs(lifetime as u64))
        } else {
            Err(GssError::new(major, minor))
        }
    }
}
