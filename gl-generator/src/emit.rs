use std::io;

use anyhow::{Context as _, bail};

use crate::{Command, Registry, Requirement, TypePart};

const ENUM_PREFIX: &str = "GL_";
const COMMAND_PREFIX: &str = "gl";
const ERROR_QUERY: &str = "glGetError";

fn normalize_enum_name(name: &str) -> anyhow::Result<String> {
    let stripped = name
        .strip_prefix(ENUM_PREFIX)
        .with_context(|| format!("enum {name} has no {ENUM_PREFIX} prefix"))?;
    // GL_2D and friends
    if stripped.starts_with(|c: char| c.is_ascii_digit()) {
        Ok(format!("_{stripped}"))
    } else {
        Ok(stripped.to_string())
    }
}

fn normalize_enum_type(r#type: Option<&str>, normalized_name: &str) -> anyhow::Result<&'static str> {
    match r#type {
        Some("u") => Ok("GLuint"),
        Some("ull") => Ok("GLuint64"),
        Some("bitmask") => Ok("GLbitfield"),
        None if normalized_name == "TRUE" || normalized_name == "FALSE" => Ok("GLboolean"),
        None => Ok("GLenum"),
        Some(other) => bail!("unknown gl enum type {other:?}"),
    }
}

fn normalize_enum_value(value: &str) -> &str {
    // the registry spells unsigned literals c-style (0xFFFFFFFFu, 0xFFFFFFFFFFFFFFFFull).
    value.trim_end_matches(['u', 'l'])
}

pub fn emit_enums<W: io::Write>(w: &mut W, registry: &Registry) -> anyhow::Result<()> {
    for e in registry.enums.iter() {
        let name = normalize_enum_name(&e.name)?;
        let ty = normalize_enum_type(e.r#type.as_deref(), &name)?;
        writeln!(w, "pub const {name}: {ty} = {};", normalize_enum_value(&e.value))?;
    }
    writeln!(w)?;
    Ok(())
}

/// `None` is `void`.
fn rust_type(parts: &[TypePart]) -> anyhow::Result<Option<String>> {
    use TypePart::*;
    let ty = match parts {
        [Other(other)] => match other.as_str() {
            "void" => return Ok(None),
            "void *" => "*mut std::ffi::c_void".to_string(),
            "const void *" => "*const std::ffi::c_void".to_string(),
            "const void **" => "*mut *const std::ffi::c_void".to_string(),
            "void **" => "*mut *mut std::ffi::c_void".to_string(),
            "const void *const*" => "*const *const std::ffi::c_void".to_string(),
            other => bail!("unsupported type {other:?}"),
        },
        [Defined(defined)] => defined.clone(),
        [Defined(defined), Other(pointer)] => match pointer.as_str() {
            "*" => format!("*mut {defined}"),
            "**" => format!("*mut *mut {defined}"),
            other => bail!("unsupported pointer {other:?} to {defined}"),
        },
        [Other(qualifier), Defined(defined), Other(pointer)] if qualifier.as_str() == "const" => {
            match pointer.as_str() {
                "*" => format!("*const {defined}"),
                "*const*" => format!("*const *const {defined}"),
                "**" => format!("*mut *const {defined}"),
                other => bail!("unsupported pointer {other:?} to const {defined}"),
            }
        }
        other => bail!("unsupported type {other:?}"),
    };
    Ok(Some(ty))
}

fn normalize_command_name(name: &str) -> anyhow::Result<&str> {
    name.strip_prefix(COMMAND_PREFIX)
        .with_context(|| format!("command {name} has no {COMMAND_PREFIX} prefix"))
}

fn normalize_param_name(name: &str) -> &str {
    match name {
        "type" => "r#type",
        "ref" => "r#ref",
        "in" => "r#in",
        ok => ok,
    }
}

struct Signature<'a> {
    name: &'a str,
    params: Vec<(&'a str, String)>,
    ret: Option<String>,
}

impl<'a> Signature<'a> {
    fn new(cmd: &'a Command) -> anyhow::Result<Self> {
        let name = normalize_command_name(cmd.name())?;
        let params = cmd
            .params
            .iter()
            .map(|param| -> anyhow::Result<(&str, String)> {
                let ty = rust_type(&param.type_parts)
                    .with_context(|| format!("param {} of {}", param.name, cmd.name()))?
                    .with_context(|| format!("param {} of {} is void", param.name, cmd.name()))?;
                Ok((normalize_param_name(&param.name), ty))
            })
            .collect::<anyhow::Result<Vec<_>>>()?;
        let ret = rust_type(&cmd.proto.type_parts)
            .with_context(|| format!("return type of {}", cmd.name()))?;
        Ok(Self { name, params, ret })
    }

    fn param_list(&self) -> String {
        self.params
            .iter()
            .map(|(name, ty)| format!(", {name}: {ty}"))
            .collect()
    }

    fn arg_list(&self) -> String {
        self.params
            .iter()
            .map(|(name, _)| *name)
            .collect::<Vec<_>>()
            .join(", ")
    }

    fn type_list(&self) -> String {
        self.params
            .iter()
            .map(|(_, ty)| ty.as_str())
            .collect::<Vec<_>>()
            .join(", ")
    }

    fn debug_format(&self) -> String {
        vec!["{:?}"; self.params.len()].join(", ")
    }
}

fn emit_requirement<W: io::Write>(w: &mut W, requirement: &Requirement) -> anyhow::Result<()> {
    match requirement {
        Requirement::Feature { api, major, minor } => writeln!(
            w,
            "            Requirement::Feature {{ api: Api::{api:?}, major: {major}, minor: {minor} }},"
        )?,
        Requirement::Extension { name, apis } => {
            let apis = apis
                .iter()
                .map(|api| format!("Api::{api:?}"))
                .collect::<Vec<_>>()
                .join(", ");
            writeln!(
                w,
                "            Requirement::Extension {{ name: \"{name}\", apis: &[{apis}] }},"
            )?
        }
    }
    Ok(())
}

fn emit_command_enum<W: io::Write>(w: &mut W, sigs: &[(&Command, Signature)]) -> anyhow::Result<()> {
    writeln!(w, "#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]")?;
    writeln!(w, "pub enum Command {{")?;
    for (cmd, sig) in sigs.iter() {
        if !cmd.aliases.is_empty() {
            writeln!(w, "    /// Fallbacks: {}", cmd.aliases.join(", "))?;
        }
        writeln!(w, "    {},", sig.name)?;
    }
    writeln!(w, "}}\n")?;

    writeln!(w, "impl Command {{")?;
    writeln!(w, "    pub const COUNT: usize = {};\n", sigs.len())?;
    writeln!(w, "    pub const ALL: [Command; Self::COUNT] = [")?;
    for (_, sig) in sigs.iter() {
        writeln!(w, "        Command::{},", sig.name)?;
    }
    writeln!(w, "    ];\n")?;
    writeln!(w, "    pub const fn name(self) -> &'static str {{")?;
    writeln!(w, "        match self {{")?;
    for (cmd, sig) in sigs.iter() {
        writeln!(w, "            Command::{} => \"{}\",", sig.name, cmd.name())?;
    }
    writeln!(w, "        }}")?;
    writeln!(w, "    }}\n")?;
    writeln!(w, "    #[inline]")?;
    writeln!(w, "    pub fn entry_point(self) -> &'static EntryPoint {{")?;
    writeln!(w, "        &ENTRY_POINTS[self as usize]")?;
    writeln!(w, "    }}")?;
    writeln!(w, "}}\n")?;
    Ok(())
}

fn emit_entry_points<W: io::Write>(w: &mut W, sigs: &[(&Command, Signature)]) -> anyhow::Result<()> {
    writeln!(w, "pub static ENTRY_POINTS: [EntryPoint; Command::COUNT] = [")?;
    for (cmd, _) in sigs.iter() {
        writeln!(w, "    EntryPoint {{")?;
        writeln!(w, "        name: c\"{}\",", cmd.name())?;
        let aliases = cmd
            .aliases
            .iter()
            .map(|alias| format!("c\"{alias}\""))
            .collect::<Vec<_>>()
            .join(", ");
        writeln!(w, "        aliases: &[{aliases}],")?;
        writeln!(w, "        required_by: &[")?;
        for requirement in cmd.required_by.iter() {
            emit_requirement(w, requirement)?;
        }
        writeln!(w, "        ],")?;
        writeln!(w, "    }},")?;
    }
    writeln!(w, "];\n")?;
    Ok(())
}

fn emit_table_impl<W: io::Write>(w: &mut W, sigs: &[(&Command, Signature)]) -> anyhow::Result<()> {
    writeln!(w, "impl DispatchTable {{")?;
    for (_, sig) in sigs.iter() {
        let ret = sig.ret.as_deref().map(|ret| format!(" -> {ret}")).unwrap_or_default();
        writeln!(w, "    #[inline]")?;
        writeln!(w, "    pub unsafe fn {}(&self{}){ret} {{", sig.name, sig.param_list())?;
        writeln!(w, "        type Dst = extern \"system\" fn({}){ret};", sig.type_list())?;
        writeln!(
            w,
            "        unsafe {{ std::mem::transmute::<*const std::ffi::c_void, Dst>(self.ptr(Command::{}))({}) }}",
            sig.name,
            sig.arg_list(),
        )?;
        writeln!(w, "    }}\n")?;
    }
    writeln!(w, "}}\n")?;
    Ok(())
}

fn emit_context_impl<W: io::Write>(w: &mut W, sigs: &[(&Command, Signature)]) -> anyhow::Result<()> {
    writeln!(w, "impl Context {{")?;
    for (cmd, sig) in sigs.iter() {
        let ret = sig.ret.as_deref().unwrap_or("()");
        // polling after the error query itself would swallow the next pending error.
        let dispatch = if cmd.name() == ERROR_QUERY {
            "dispatch_unpolled"
        } else {
            "dispatch"
        };
        let format_args = if sig.params.is_empty() {
            "format_args!(\"\")".to_string()
        } else {
            format!("format_args!(\"{}\", {})", sig.debug_format(), sig.arg_list())
        };
        writeln!(w, "    #[inline]")?;
        writeln!(
            w,
            "    pub unsafe fn {}(&self{}) -> Result<{ret}, Error> {{",
            sig.name,
            sig.param_list()
        )?;
        writeln!(w, "        self.{dispatch}(")?;
        writeln!(w, "            Command::{},", sig.name)?;
        writeln!(w, "            {format_args},")?;
        writeln!(
            w,
            "            || unsafe {{ self.table().{}({}) }},",
            sig.name,
            sig.arg_list()
        )?;
        writeln!(w, "        )")?;
        writeln!(w, "    }}\n")?;
    }
    writeln!(w, "}}")?;
    Ok(())
}

/// emits the `Command` enum, the `ENTRY_POINTS` table, raw `DispatchTable` methods and checked
/// `Context` methods. the including module must bring `EntryPoint`, `Requirement`, `Api`,
/// `DispatchTable`, `Context`, `Error` and the gl types into scope.
pub fn emit_commands<W: io::Write>(w: &mut W, registry: &Registry) -> anyhow::Result<()> {
    let sigs = registry
        .commands
        .iter()
        .map(|cmd| Ok((cmd, Signature::new(cmd)?)))
        .collect::<anyhow::Result<Vec<_>>>()?;

    emit_command_enum(w, &sigs)?;
    emit_entry_points(w, &sigs)?;
    emit_table_impl(w, &sigs)?;
    emit_context_impl(w, &sigs)?;
    Ok(())
}
