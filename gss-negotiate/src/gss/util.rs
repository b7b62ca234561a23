use gss_negotiate_sys::{gss_buffer_desc, gss_buffer_desc_struct, gss_buffer_t, gss_release_buffer, OM_uint32};
use std::{ffi, marker::PhantomData, ops::Deref, ptr, slice};

use super::GSS_S_COMPLETE;

/* Only pass this to gssapi functions that take their buffer as input;
 * C can't be stopped from writing through the pointer. */
#[repr(transparent)]
#[derive(Debug)]
pub(crate) struct BufRef<'a>(gss_buffer_desc_struct, PhantomData<&'a [u8]>);

impl<'a> From<&'a [u8]> for BufRef<'a> {
    fn from(s: &'a [u8]) -> Self {
        let gss_buf = gss_buffer_desc_struct {
            length: s.len() as _,
            value: s.as_ptr() as *mut ffi::c_void,
        };
        BufRef(gss_buf, PhantomData)
    }
}

impl<'a> BufRef<'a> {
    pub(crate) unsafe fn to_c(&mut self) -> gss_buffer_t {
        &mut self.0 as gss_buffer_t
    }

    /// The descriptor by value, for embedding in another C struct. It
    /// must not outlive the borrowed bytes.
    pub(crate) fn desc(&self) -> gss_buffer_desc {
        gss_buffer_desc {
            length: self.0.length,
            value: self.0.value,
        }
    }
}

/// A buffer allocated by gssapi, released through the library when
/// dropped.
#[repr(transparent)]
#[derive(Debug)]
pub struct Buf(gss_buffer_desc);

unsafe impl Send for Buf {}
unsafe impl Sync for Buf {}

impl Deref for Buf {
    type Target = [u8];

    fn deref(&self) -> &Self::Target {
        if self.0.value.is_null() {
            &[]
        } else {
            unsafe { slice::from_raw_parts(self.0.value.cast(), self.0.length as usize) }
        }
    }
}

impl Drop for Buf {
    fn drop(&mut self) {
        if !self.0.value.is_null() {
            let mut minor = GSS_S_COMPLETE;
            let _major = unsafe {
                gss_release_buffer(&mut minor as *mut OM_uint32, &mut self.0 as gss_buffer_t)
            };
        }
    }
}

impl Buf {
    pub(crate) fn empty() -> Buf {
        Buf(gss_buffer_desc {
            length: 0,
            value: ptr::null_mut(),
        })
    }

    pub(crate) unsafe fn to_c(&mut self) -> gss_buffer_t {
        &mut self.0 as gss_buffer_t
    }
}
