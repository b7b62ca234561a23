//! Oids are BER encoded and defined in the various RFCs
use super::{error::GssError, GSS_S_COMPLETE};
use crate::target::{NameType, NegotiateMechanism};
use gss_negotiate_sys::{
    gss_OID, gss_OID_set, gss_OID_set_desc, gss_add_oid_set_member, gss_create_empty_oid_set,
    gss_release_oid_set, OM_uint32,
};
use std::{fmt, ops::Deref, ptr, slice};

pub static GSS_NT_HOSTBASED_SERVICE: Oid =
    Oid::from_slice(b"\x2a\x86\x48\x86\xf7\x12\x01\x02\x01\x04");

pub static GSS_KRB5_NT_PRINCIPAL_NAME: Oid =
    Oid::from_slice(b"\x2a\x86\x48\x86\xf7\x12\x01\x02\x02\x01");

pub static GSS_MECH_KRB5: Oid = Oid::from_slice(b"\x2a\x86\x48\x86\xf7\x12\x01\x02\x02");

pub static GSS_MECH_SPNEGO: Oid = Oid::from_slice(b"\x2b\x06\x01\x05\x05\x02");

// mirrors gss_OID_desc, with the const pointer the standard specifies
#[repr(C)]
pub struct Oid {
    length: u32,
    elements: *const u8,
}

unsafe impl Sync for Oid {}

impl Deref for Oid {
    type Target = [u8];

    fn deref(&self) -> &Self::Target {
        unsafe { slice::from_raw_parts(self.elements, self.length as usize) }
    }
}

impl PartialEq for Oid {
    fn eq(&self, other: &Oid) -> bool {
        **self == **other
    }
}

impl Eq for Oid {}

impl fmt::Debug for Oid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Oid({:02x?})", &**self)
    }
}

impl Oid {
    pub(crate) fn to_c(&self) -> gss_OID {
        self as *const Oid as gss_OID
    }

    pub const fn from_slice(ber: &'static [u8]) -> Oid {
        Oid {
            length: ber.len() as u32,
            elements: ber.as_ptr(),
        }
    }

    pub fn for_mechanism(mechanism: NegotiateMechanism) -> &'static Oid {
        match mechanism {
            NegotiateMechanism::Spnego => &GSS_MECH_SPNEGO,
            NegotiateMechanism::Krb5 => &GSS_MECH_KRB5,
        }
    }

    pub fn for_name_type(kind: NameType) -> &'static Oid {
        match kind {
            NameType::HostBasedService => &GSS_NT_HOSTBASED_SERVICE,
            NameType::KerberosPrincipal => &GSS_KRB5_NT_PRINCIPAL_NAME,
        }
    }
}

/// A set of mechanism oids allocated by gssapi.
pub struct OidSet(gss_OID_set);

unsafe impl Send for OidSet {}
unsafe impl Sync for OidSet {}

impl Drop for OidSet {
    fn drop(&mut self) {
        if !self.0.is_null() {
            let mut minor = GSS_S_COMPLETE;
            let _major = unsafe {
                gss_release_oid_set(&mut minor as *mut OM_uint32, &mut self.0 as *mut gss_OID_set)
            };
        }
    }
}

impl OidSet {
    pub fn new() -> Result<OidSet, GssError> {
        let mut minor = GSS_S_COMPLETE;
        let mut out = ptr::null_mut::<gss_OID_set_desc>();
        let major = unsafe {
            gss_create_empty_oid_set(&mut minor as *mut OM_uint32, &mut out as *mut gss_OID_set)
        };
        if major == GSS_S_COMPLETE {
            Ok(OidSet(out))
        } else {
            Err(GssError::new(major, minor))
        }
    }

    pub(crate) fn to_c(&self) -> gss_OID_set {
        self.0
    }

    pub fn add(&mut self, id: &Oid) -> Result<(), GssError> {
        let mut minor = GSS_S_COMPLETE;
        let major = unsafe {
            gss_add_oid_set_member(
                &mut minor as *mut OM_uint32,
                id.to_c(),
                &mut self.0 as *mut gss_OID_set,
            )
        };
        if major == GSS_S_COMPLETE {
            Ok(())
        } else {
            Err(GssError::new(major, minor))
        }
    }
}

impl TryFrom<&Oid> for OidSet {
    type Error = GssError;

    fn try_from(id: &Oid) -> Result<OidSet, GssError> {
        let mut set = OidSet::new()?;
        set.add(id)?;
        Ok(set)
    }
}

impl fmt::Debug for OidSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "OidSet({:p})", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mechanism_oids_match_target_encoding() {
        for mechanism in [NegotiateMechanism::Spnego, NegotiateMechanism::Krb5] {
            assert_eq!(&**Oid::for_mechanism(mechanism), mechanism.oid());
        }
    }
}
