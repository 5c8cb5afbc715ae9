use std::ffi::{CStr, c_char, c_void};
use std::ptr::null;

use dynlib::DynLib;

type GetProcAddressFn = unsafe extern "C" fn(*const c_char) -> *const c_void;

/// `get_proc_address` of a windowing library, falling back to a plain symbol lookup in the same
/// library for what it does not hand out.
pub struct ProcLoader {
    get_proc_address: GetProcAddressFn,
    // NOTE: must outlive get_proc_address.
    dynlib: DynLib,
}

impl ProcLoader {
    fn load(filenames: &[&CStr], get_proc_address_name: &CStr) -> Result<Self, dynlib::Error> {
        let dynlib = DynLib::open_any(filenames)?;
        let get_proc_address = dynlib.lookup::<GetProcAddressFn>(get_proc_address_name)?;
        Ok(Self {
            get_proc_address,
            dynlib,
        })
    }

    pub fn egl() -> Result<Self, dynlib::Error> {
        Self::load(&[c"libEGL.so.1", c"libEGL.so"], c"eglGetProcAddress")
    }

    pub fn glx() -> Result<Self, dynlib::Error> {
        Self::load(&[c"libGL.so.1", c"libGL.so"], c"glXGetProcAddressARB")
    }

    /// fits [`crate::Context::load_with`]. null when neither way finds `name`.
    pub fn get_proc_address(&self, name: &CStr) -> *const c_void {
        let ptr = unsafe { (self.get_proc_address)(name.as_ptr()) };
        if !ptr.is_null() {
            return ptr;
        }
        // NOTE: egl before 1.5 only hands out extension functions, core ones are plain exports.
        self.dynlib
            .symbol(name)
            .map_or(null(), |ptr| ptr.as_ptr().cast_const())
    }
}
