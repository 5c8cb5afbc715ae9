mod context;
mod dispatch;
mod error;
#[cfg(unix)]
mod loader;
mod marshal;
#[cfg(test)]
mod mock;
mod symbols;
mod types;
mod wrap;

#[allow(non_upper_case_globals)]
mod enums {
    use crate::types::*;

    include!(concat!(env!("OUT_DIR"), "/gl_enums_generated.rs"));
}

#[allow(non_camel_case_types)]
#[allow(non_snake_case)]
#[allow(clippy::too_many_arguments)]
mod commands {
    use khronos_version::Api;

    use crate::context::Context;
    use crate::dispatch::DispatchTable;
    use crate::error::Error;
    use crate::symbols::{EntryPoint, Requirement};
    use crate::types::*;

    include!(concat!(env!("OUT_DIR"), "/gl_commands_generated.rs"));
}

pub use commands::{Command, ENTRY_POINTS};
pub use context::Context;
pub use dispatch::DispatchTable;
pub use enums::*;
pub use error::{Error, ErrorCode};
pub use khronos_version::{Api, GlslVersion, KhronosVersion};
#[cfg(unix)]
pub use loader::ProcLoader;
pub use marshal::{GlStrings, gl_len, gl_size};
pub use symbols::{EntryPoint, Requirement, resolve};
pub use types::*;
