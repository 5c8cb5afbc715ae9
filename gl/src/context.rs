use std::collections::HashSet;
use std::ffi::{CStr, c_void};
use std::fmt;

use khronos_version::{Api, GlslVersion, KhronosVersion};

use crate::dispatch::DispatchTable;
use crate::enums::*;
use crate::error::{Error, ErrorCode};
use crate::{Command, types::*};

/// what has to be resolvable before the version and extensions can be asked for.
const BOOTSTRAP: [Command; 4] = [
    Command::GetError,
    Command::GetString,
    Command::GetStringi,
    Command::GetIntegerv,
];

// NOTE: there are at most this many distinct error flags; a lost context may keep reporting
// forever.
const MAX_PENDING_ERRORS: usize = 8;

/// a loaded gl context: the dispatch table together with what the context reported about itself.
///
/// the context has to be current on the calling thread for any of the gl calls to be valid; the
/// type is neither `Send` nor `Sync`.
#[derive(Debug)]
pub struct Context {
    table: DispatchTable,
    version: KhronosVersion,
    glsl_version: Option<GlslVersion>,
    extensions: HashSet<String>,
}

impl Context {
    /// queries the current context for its version and extensions, then resolves every entry
    /// point they provide.
    ///
    /// # Safety
    ///
    /// a context must be current and `get_proc_address` must return functions of that context.
    pub unsafe fn load_with<F>(mut get_proc_address: F) -> Result<Self, Error>
    where
        F: FnMut(&CStr) -> *const c_void,
    {
        let mut table = DispatchTable::unloaded();
        for command in BOOTSTRAP {
            table.resolve(command, &mut get_proc_address);
        }

        let mut context = Self {
            table,
            // placeholder until the context told us.
            version: KhronosVersion::new(1, 0, 0, Api::Gl),
            glsl_version: None,
            extensions: HashSet::new(),
        };
        // NOTE: without glGetError every checked call would be unchecked.
        if !context.table.is_loaded(Command::GetError) {
            return Err(Error::NotLoaded {
                command: Command::GetError,
            });
        }

        context.version = KhronosVersion::parse(&unsafe { context.get_string(VERSION) }?)?;
        context.glsl_version = unsafe { context.query_glsl_version() }?;
        context.extensions = unsafe { context.query_extensions() }?;
        let mut table = DispatchTable::load_for(
            &mut get_proc_address,
            &context.version,
            &context.extensions,
        );
        // keep the queries working even where the registry does not list them for this api.
        for command in BOOTSTRAP {
            if !table.is_loaded(command) && context.table.is_loaded(command) {
                table.resolve(command, &mut get_proc_address);
            }
        }
        context.table = table;

        log::info!(
            "loaded gl {} ({} of {} entry points, {} extensions)",
            context.version,
            context.table.loaded_count(),
            Command::COUNT,
            context.extensions.len(),
        );

        Ok(context)
    }

    /// loads everything again, for when the context was recreated.
    ///
    /// # Safety
    ///
    /// same as [`Context::load_with`].
    pub unsafe fn reload<F>(&mut self, get_proc_address: F) -> Result<(), Error>
    where
        F: FnMut(&CStr) -> *const c_void,
    {
        *self = unsafe { Self::load_with(get_proc_address) }?;
        Ok(())
    }

    unsafe fn query_glsl_version(&self) -> Result<Option<GlslVersion>, Error> {
        // es 1 and gl before 2.0 have no shading language.
        if self.version.api == Api::Gles1 || !self.version.at_least(2, 0) {
            return Ok(None);
        }
        match unsafe { self.get_string(SHADING_LANGUAGE_VERSION) } {
            Ok(version) => Ok(Some(GlslVersion::parse(&version)?)),
            Err(Error::NullString { .. })
            | Err(Error::Gl {
                code: ErrorCode::InvalidEnum,
                ..
            }) => Ok(None),
            Err(err) => Err(err),
        }
    }

    unsafe fn query_extensions(&self) -> Result<HashSet<String>, Error> {
        if self.version.at_least(3, 0) && self.table.is_loaded(Command::GetStringi) {
            let count = unsafe { self.get_integer(NUM_EXTENSIONS) }?;
            (0..count.max(0) as GLuint)
                .map(|index| unsafe { self.get_string_i(EXTENSIONS, index) })
                .collect()
        } else {
            // NOTE: GL_EXTENSIONS is gone from core profiles, but those are all >= 3.0.
            let extensions = unsafe { self.get_string(EXTENSIONS) }?;
            Ok(extensions
                .split_ascii_whitespace()
                .map(str::to_string)
                .collect())
        }
    }

    pub fn version(&self) -> &KhronosVersion {
        &self.version
    }

    pub fn glsl_version(&self) -> Option<&GlslVersion> {
        self.glsl_version.as_ref()
    }

    pub fn extensions(&self) -> &HashSet<String> {
        &self.extensions
    }

    pub fn has_extension(&self, name: &str) -> bool {
        self.extensions.contains(name)
    }

    /// the raw entry points. calls through it skip every check, a call to an unloaded entry
    /// point panics.
    pub fn table(&self) -> &DispatchTable {
        &self.table
    }

    pub fn is_loaded(&self, command: Command) -> bool {
        self.table.is_loaded(command)
    }

    /// turns a pending gl error into an [`Error`] attributed to `command`. any further pending
    /// flags are drained and logged so they don't end up on the next call.
    ///
    /// # Safety
    ///
    /// the context must be current.
    pub unsafe fn poll_error(&self, command: Command) -> Result<(), Error> {
        if !self.table.is_loaded(Command::GetError) {
            return Err(Error::NotLoaded {
                command: Command::GetError,
            });
        }
        let Some(code) = ErrorCode::from_raw(unsafe { self.table.GetError() }) else {
            return Ok(());
        };
        for _ in 1..MAX_PENDING_ERRORS {
            match ErrorCode::from_raw(unsafe { self.table.GetError() }) {
                Some(extra) => log::debug!("{command} also raised {extra}"),
                None => break,
            }
        }
        Err(Error::Gl { command, code })
    }

    /// the single path of every checked call: slot check, optional trace, call, error poll.
    #[inline]
    pub(crate) fn dispatch<R>(
        &self,
        command: Command,
        args: fmt::Arguments<'_>,
        f: impl FnOnce() -> R,
    ) -> Result<R, Error> {
        let ret = self.dispatch_unpolled(command, args, f)?;
        unsafe { self.poll_error(command) }?;
        Ok(ret)
    }

    #[inline]
    pub(crate) fn dispatch_unpolled<R>(
        &self,
        command: Command,
        args: fmt::Arguments<'_>,
        f: impl FnOnce() -> R,
    ) -> Result<R, Error> {
        if !self.table.is_loaded(command) {
            return Err(Error::NotLoaded { command });
        }
        if cfg!(all(feature = "debug", debug_assertions)) {
            log::trace!("{command}({args})");
        }
        Ok(f())
    }
}
