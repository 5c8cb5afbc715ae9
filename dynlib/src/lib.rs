use std::borrow::Cow;
use std::ffi::{CStr, c_char, c_void};
use std::mem::{size_of, transmute_copy};
use std::ptr::NonNull;

use libc::{dlclose, dlerror, dlopen, dlsym};

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("could not open {filename}: {reason}")]
    Open { filename: String, reason: String },
    #[error("could not look up {name}: {reason}")]
    Lookup { name: String, reason: String },
}

// NOTE: dlerror's string is owned by libc and is only valid until the next dl* call on this
// thread.
unsafe fn last_error() -> Option<String> {
    let err: *const c_char = unsafe { dlerror() };
    if err.is_null() {
        None
    } else {
        Some(unsafe { CStr::from_ptr(err) }.to_string_lossy().into_owned())
    }
}

fn lossy(name: &CStr) -> Cow<'_, str> {
    name.to_string_lossy()
}

pub struct DynLib(NonNull<c_void>);

impl DynLib {
    pub fn open(filename: &CStr) -> Result<Self, Error> {
        unsafe {
            let handle = dlopen(filename.as_ptr(), libc::RTLD_LAZY | libc::RTLD_LOCAL);
            match NonNull::new(handle) {
                Some(handle) => Ok(Self(handle)),
                None => Err(Error::Open {
                    filename: lossy(filename).into_owned(),
                    reason: last_error().unwrap_or_else(|| "unknown dlopen failure".to_string()),
                }),
            }
        }
    }

    /// tries each name in order, returns the first one that opens.
    pub fn open_any(filenames: &[&CStr]) -> Result<Self, Error> {
        let mut last = None;
        for filename in filenames.iter() {
            match Self::open(filename) {
                Ok(lib) => return Ok(lib),
                Err(err) => {
                    log::debug!("{err}");
                    last = Some(err);
                }
            }
        }
        Err(last.unwrap_or_else(|| Error::Open {
            filename: String::new(),
            reason: "no candidates".to_string(),
        }))
    }

    /// the raw symbol address, `None` when the library does not export it.
    pub fn symbol(&self, name: &CStr) -> Option<NonNull<c_void>> {
        unsafe {
            _ = dlerror();
            NonNull::new(dlsym(self.0.as_ptr(), name.as_ptr()))
        }
    }

    /// `F` must be a pointer-sized function pointer type matching the symbol's signature.
    pub fn lookup<F: Copy>(&self, name: &CStr) -> Result<F, Error> {
        if size_of::<F>() != size_of::<*mut c_void>() {
            return Err(Error::Lookup {
                name: lossy(name).into_owned(),
                reason: "not pointer sized".to_string(),
            });
        }
        unsafe {
            _ = dlerror();

            let addr = dlsym(self.0.as_ptr(), name.as_ptr());

            // a symbol may legitimately resolve to null, dlerror is what tells failures apart.
            if let Some(reason) = last_error() {
                return Err(Error::Lookup {
                    name: lossy(name).into_owned(),
                    reason,
                });
            }
            if addr.is_null() {
                return Err(Error::Lookup {
                    name: lossy(name).into_owned(),
                    reason: "symbol is null".to_string(),
                });
            }
            Ok(transmute_copy(&addr))
        }
    }
}

impl Drop for DynLib {
    fn drop(&mut self) {
        unsafe {
            dlclose(self.0.as_ptr());
        }
    }
}
