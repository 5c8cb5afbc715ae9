use std::collections::HashSet;
use std::ffi::{CStr, c_void};
use std::fmt;
use std::ptr::null;

use khronos_version::KhronosVersion;

use crate::Command;
use crate::symbols;

#[cold]
#[inline(never)]
fn null_fn_ptr_panic(command: Command) -> ! {
    panic!("function {command} was not loaded")
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// one slot per [`Command`]; null until resolved.
///
/// the raw pointers keep the table `!Send` and `!Sync`: a gl context is current on one thread and
/// its function pointers are only meaningful there.
#[derive(Clone)]
pub struct DispatchTable {
    slots: [*const c_void; Command::COUNT],
}

impl DispatchTable {
    pub fn unloaded() -> Self {
        Self {
            slots: [null(); Command::COUNT],
        }
    }

    /// probes every entry point.
    pub fn load_with<F>(mut get_proc_address: F) -> Self
    where
        F: FnMut(&CStr) -> *const c_void,
    {
        let mut table = Self::unloaded();
        for command in Command::ALL {
            table.resolve(command, &mut get_proc_address);
        }
        table
    }

    /// probes only the entry points that `version` or one of `extensions` provides. the rest stay
    /// unloaded.
    pub fn load_for<F>(
        mut get_proc_address: F,
        version: &KhronosVersion,
        extensions: &HashSet<String>,
    ) -> Self
    where
        F: FnMut(&CStr) -> *const c_void,
    {
        let mut table = Self::unloaded();
        for command in Command::ALL {
            if !command.entry_point().is_required_by(version, extensions) {
                continue;
            }
            if !table.resolve(command, &mut get_proc_address) {
                log::debug!("{command} is unavailable even though {version} should provide it");
            }
        }
        table
    }

    /// (re)resolves a single slot, returns whether it is loaded now.
    pub fn resolve<F>(&mut self, command: Command, get_proc_address: F) -> bool
    where
        F: FnMut(&CStr) -> *const c_void,
    {
        let resolved = symbols::resolve(command.entry_point(), get_proc_address);
        self.slots[command as usize] = resolved.map_or(null(), |ptr| ptr.as_ptr().cast_const());
        resolved.is_some()
    }

    #[inline]
    pub fn is_loaded(&self, command: Command) -> bool {
        !self.slots[command as usize].is_null()
    }

    pub fn loaded_count(&self) -> usize {
        self.slots.iter().filter(|slot| !slot.is_null()).count()
    }

    #[inline]
    pub(crate) fn ptr(&self, command: Command) -> *const c_void {
        let ptr = self.slots[command as usize];
        if ptr.is_null() {
            null_fn_ptr_panic(command);
        }
        ptr
    }
}

impl fmt::Debug for DispatchTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DispatchTable")
            .field("loaded", &self.loaded_count())
            .field("total", &Command::COUNT)
            .finish()
    }
}
