use std::collections::HashSet;
use std::ffi::{CStr, c_void};
use std::iter;
use std::ptr::NonNull;

use khronos_version::{Api, KhronosVersion};

/// what makes an entry point available: a core version of some api, or an extension advertised
/// on one of `apis`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Requirement {
    Feature {
        api: Api,
        major: u32,
        minor: u32,
    },
    Extension {
        name: &'static str,
        apis: &'static [Api],
    },
}

impl Requirement {
    pub fn is_satisfied_by(&self, version: &KhronosVersion, extensions: &HashSet<String>) -> bool {
        match *self {
            Requirement::Feature { api, major, minor } => {
                version.api == api && version.at_least(major, minor)
            }
            Requirement::Extension { name, apis } => {
                apis.contains(&version.api) && extensions.contains(name)
            }
        }
    }
}

/// a command as the registry describes it. the table of these is generated and never changes at
/// runtime.
#[derive(Debug)]
pub struct EntryPoint {
    pub name: &'static CStr,
    /// other names the same function may be exported under, in the order they are tried.
    pub aliases: &'static [&'static CStr],
    pub required_by: &'static [Requirement],
}

impl EntryPoint {
    /// core name first, then aliases.
    pub fn names(&self) -> impl Iterator<Item = &'static CStr> {
        iter::once(self.name).chain(self.aliases.iter().copied())
    }

    pub fn is_required_by(&self, version: &KhronosVersion, extensions: &HashSet<String>) -> bool {
        self.required_by
            .iter()
            .any(|requirement| requirement.is_satisfied_by(version, extensions))
    }
}

// NOTE: some implementations (older nvidia and amd glx/wgl drivers for example) hand out small
// integers or -1 instead of null for names they don't know.
fn is_valid_address(ptr: *const c_void) -> bool {
    !matches!(ptr as isize, 0 | 1 | 2 | 3 | -1)
}

/// asks `get_proc_address` for the core name, then for each alias; the first usable address
/// wins and the names after it are never asked for. `None` means none of the names resolved,
/// which is not an error here.
pub fn resolve<F>(entry: &EntryPoint, mut get_proc_address: F) -> Option<NonNull<c_void>>
where
    F: FnMut(&CStr) -> *const c_void,
{
    entry.names().find_map(|name| {
        let ptr = get_proc_address(name);
        if !is_valid_address(ptr) {
            return None;
        }
        if name != entry.name {
            log::trace!("resolved {entry_name} as {name:?}", entry_name = entry.name.to_string_lossy());
        }
        NonNull::new(ptr.cast_mut())
    })
}
