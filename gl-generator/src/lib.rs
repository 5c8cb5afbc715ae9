use std::collections::{HashMap, HashSet};

use anyhow::{Context as _, bail};
use khronos_version::KhronosVersion;
use quick_xml::events::{BytesStart, BytesText, Event};
use quick_xml::reader::Reader;

mod emit;

pub use emit::{emit_commands, emit_enums};
pub use khronos_version::Api;

// xml spec:
// https://github.com/KhronosGroup/OpenGL-Registry/blob/8e772a3b0c9e8a85ccb6f471b4cdbf94c8bcd71d/xml/readme.pdf

#[derive(Debug)]
pub struct Enum {
    pub name: String,
    pub value: String,
    pub r#type: Option<String>,
    pub alias: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TypePart {
    Defined(String),
    Other(String),
}

#[derive(Debug)]
pub struct CommandPart {
    pub type_parts: Vec<TypePart>,
    pub name: String,
}

/// what makes a command available: a core version of some api, or an extension.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Requirement {
    Feature { api: Api, major: u32, minor: u32 },
    Extension { name: String, apis: Vec<Api> },
}

#[derive(Debug)]
pub struct Command {
    pub proto: CommandPart,
    pub params: Vec<CommandPart>,
    /// `<alias name="..."/>`, the command this one is another name of.
    pub alias_of: Option<String>,
    /// commands that declare themselves an alias of this one, in registry order.
    pub aliases: Vec<String>,
    pub required_by: Vec<Requirement>,
}

impl Command {
    pub fn name(&self) -> &str {
        &self.proto.name
    }
}

#[derive(Debug, Default)]
pub struct Interface {
    pub enums: Vec<String>,
    pub commands: Vec<String>,
}

#[derive(Debug)]
pub struct Feature {
    pub api: String,
    pub name: String,
    pub number: String,
    pub requires: Vec<Interface>,
    pub removes: Vec<Interface>,
}

#[derive(Debug)]
pub struct Extension {
    pub name: String,
    pub supported: String,
    pub requires: Vec<Interface>,
}

#[derive(Debug)]
pub struct Registry {
    pub enums: Vec<Enum>,
    pub commands: Vec<Command>,
    pub features: Vec<Feature>,
    pub extensions: Vec<Extension>,
}

/// maps a registry api tag to an [`Api`]. `glcore` is a profile of `gl`; tags like `disabled`
/// have no counterpart.
pub fn registry_api(tag: &str) -> Option<Api> {
    match tag {
        "gl" | "glcore" => Some(Api::Gl),
        "gles1" => Some(Api::Gles1),
        "gles2" => Some(Api::Gles2),
        "glsc2" => Some(Api::Glsc2),
        _ => None,
    }
}

fn supported_apis(supported: &str) -> Vec<Api> {
    let mut apis: Vec<Api> = Vec::new();
    for api in supported.split('|').filter_map(registry_api) {
        if !apis.contains(&api) {
            apis.push(api);
        }
    }
    apis
}

type XmlReader<'a> = Reader<&'a [u8]>;

fn is_blank(text: &BytesText) -> bool {
    text.iter().all(|b| b.is_ascii_whitespace())
}

fn get_attr(tag: &BytesStart, key: &str) -> anyhow::Result<Option<String>> {
    match tag.try_get_attribute(key)? {
        Some(attr) => Ok(Some(attr.unescape_value()?.into_owned())),
        None => Ok(None),
    }
}

fn expect_attr(tag: &BytesStart, key: &str) -> anyhow::Result<String> {
    get_attr(tag, key)?.with_context(|| format!("{key} is missing"))
}

fn expect_text(reader: &mut XmlReader) -> anyhow::Result<String> {
    match reader.read_event()? {
        Event::Text(text) => Ok(text.unescape()?.into_owned()),
        other => bail!("unexpected event (got {other:?}, want text)"),
    }
}

fn expect_end(reader: &mut XmlReader, tag_name: &[u8]) -> anyhow::Result<()> {
    match reader.read_event()? {
        Event::End(end) if end.name().as_ref() == tag_name => Ok(()),
        other => bail!(
            "unexpected event (got {other:?}, want end of {})",
            String::from_utf8_lossy(tag_name)
        ),
    }
}

fn parse_enum(empty: &BytesStart, block_type: Option<&str>) -> anyhow::Result<Enum> {
    Ok(Enum {
        name: expect_attr(empty, "name")?,
        value: expect_attr(empty, "value")?,
        r#type: get_attr(empty, "type")?.or(block_type.map(str::to_string)),
        alias: get_attr(empty, "alias")?,
    })
}

fn parse_enum_block_into(
    start: &BytesStart,
    reader: &mut XmlReader,
    enums: &mut Vec<Enum>,
) -> anyhow::Result<()> {
    let block_type = get_attr(start, "type")?;
    loop {
        match reader.read_event()? {
            Event::Empty(empty) => match empty.name().as_ref() {
                b"enum" => {
                    let token = parse_enum(&empty, block_type.as_deref())
                        .context("could not parse enum token attrs")?;
                    enums.push(token);
                }
                b"unused" => {}
                other => bail!("unexpected empty: {}", String::from_utf8_lossy(other)),
            },
            Event::Text(text) if is_blank(&text) => {}
            Event::Comment(_) => {}
            Event::End(end) if end.name().as_ref() == b"enums" => break,
            Event::Eof => bail!("unexpected eof"),
            other => bail!("unexpected event: {other:?}"),
        }
    }
    Ok(())
}

fn parse_command_part(reader: &mut XmlReader, tag_name: &[u8]) -> anyhow::Result<CommandPart> {
    let mut type_parts: Vec<TypePart> = Vec::new();
    let mut name: Option<String> = None;
    loop {
        match reader.read_event()? {
            Event::Text(text) => {
                let text = text.unescape()?;
                let text = text.trim();
                if !text.is_empty() {
                    type_parts.push(TypePart::Other(text.to_string()));
                }
            }
            Event::Start(start) => match start.name().as_ref() {
                b"name" => {
                    if name.is_some() {
                        bail!("duplicate name");
                    }
                    name = Some(expect_text(reader)?);
                    expect_end(reader, b"name")?;
                }
                b"ptype" => {
                    type_parts.push(TypePart::Defined(expect_text(reader)?));
                    expect_end(reader, b"ptype")?;
                }
                other => bail!("unexpected start: {}", String::from_utf8_lossy(other)),
            },
            Event::End(end) if end.name().as_ref() == tag_name => break,
            Event::Eof => bail!("unexpected eof"),
            other => bail!("unexpected event: {other:?}"),
        }
    }
    Ok(CommandPart {
        type_parts,
        name: name.context("name is missing")?,
    })
}

fn parse_command(reader: &mut XmlReader) -> anyhow::Result<Command> {
    let mut proto: Option<CommandPart> = None;
    let mut params: Vec<CommandPart> = Vec::new();
    let mut alias_of: Option<String> = None;
    loop {
        match reader.read_event()? {
            Event::Start(start) => match start.name().as_ref() {
                b"proto" => {
                    if proto.is_some() {
                        bail!("duplicate proto");
                    }
                    proto = Some(
                        parse_command_part(reader, b"proto")
                            .context("could not parse command proto")?,
                    );
                }
                b"param" => {
                    params.push(
                        parse_command_part(reader, b"param")
                            .context("could not parse command param")?,
                    );
                }
                other => bail!("unexpected start: {}", String::from_utf8_lossy(other)),
            },
            Event::Empty(empty) => match empty.name().as_ref() {
                b"alias" => alias_of = Some(expect_attr(&empty, "name")?),
                b"glx" | b"vecequiv" => {}
                other => bail!("unexpected empty: {}", String::from_utf8_lossy(other)),
            },
            Event::End(end) if end.name().as_ref() == b"command" => break,
            Event::Text(text) if is_blank(&text) => {}
            Event::Comment(_) => {}
            Event::Eof => bail!("unexpected eof"),
            other => bail!("unexpected event: {other:?}"),
        }
    }
    Ok(Command {
        proto: proto.context("proto is missing")?,
        params,
        alias_of,
        aliases: Vec::new(),
        required_by: Vec::new(),
    })
}

fn parse_interface(reader: &mut XmlReader, tag_name: &[u8]) -> anyhow::Result<Interface> {
    let mut interface = Interface::default();
    loop {
        match reader.read_event()? {
            Event::Empty(empty) => match empty.name().as_ref() {
                b"type" => {}
                b"enum" => interface.enums.push(expect_attr(&empty, "name")?),
                b"command" => interface.commands.push(expect_attr(&empty, "name")?),
                other => bail!("unexpected empty: {}", String::from_utf8_lossy(other)),
            },
            Event::Text(text) if is_blank(&text) => {}
            Event::Comment(_) => {}
            Event::End(end) if end.name().as_ref() == tag_name => break,
            Event::Eof => bail!("unexpected eof"),
            other => bail!("unexpected event: {other:?}"),
        }
    }
    Ok(interface)
}

fn parse_feature_attrs(start: &BytesStart) -> anyhow::Result<Feature> {
    Ok(Feature {
        api: expect_attr(start, "api")?,
        name: expect_attr(start, "name")?,
        number: expect_attr(start, "number")?,
        requires: Vec::new(),
        removes: Vec::new(),
    })
}

fn parse_feature(start: &BytesStart, reader: &mut XmlReader) -> anyhow::Result<Feature> {
    let mut feature = parse_feature_attrs(start).context("could not parse feature attrs")?;
    loop {
        match reader.read_event()? {
            Event::Start(start) => match start.name().as_ref() {
                b"require" => {
                    let require = parse_interface(reader, b"require")
                        .context("could not parse feature require")?;
                    feature.requires.push(require);
                }
                b"remove" => {
                    let remove = parse_interface(reader, b"remove")
                        .context("could not parse feature remove")?;
                    feature.removes.push(remove);
                }
                other => bail!("unexpected start: {}", String::from_utf8_lossy(other)),
            },
            Event::Empty(empty) if matches!(empty.name().as_ref(), b"require" | b"remove") => {}
            Event::Text(text) if is_blank(&text) => {}
            Event::Comment(_) => {}
            Event::End(end) if end.name().as_ref() == b"feature" => break,
            Event::Eof => bail!("unexpected eof"),
            other => bail!("unexpected event: {other:?}"),
        }
    }
    Ok(feature)
}

fn parse_extension_attrs(start: &BytesStart) -> anyhow::Result<Extension> {
    Ok(Extension {
        name: expect_attr(start, "name")?,
        supported: expect_attr(start, "supported")?,
        requires: Vec::new(),
    })
}

fn parse_extension(start: &BytesStart, reader: &mut XmlReader) -> anyhow::Result<Extension> {
    let mut extension = parse_extension_attrs(start).context("could not parse extension attrs")?;
    loop {
        match reader.read_event()? {
            Event::Start(start) => match start.name().as_ref() {
                b"require" => {
                    let require = parse_interface(reader, b"require")
                        .context("could not parse extension require")?;
                    extension.requires.push(require);
                }
                other => bail!("unexpected start: {}", String::from_utf8_lossy(other)),
            },
            Event::Empty(empty) if empty.name().as_ref() == b"require" => {}
            Event::Text(text) if is_blank(&text) => {}
            Event::Comment(_) => {}
            Event::End(end) if end.name().as_ref() == b"extension" => break,
            Event::Eof => bail!("unexpected eof"),
            other => bail!("unexpected event: {other:?}"),
        }
    }
    Ok(extension)
}

pub fn parse_registry(input: &str) -> anyhow::Result<Registry> {
    let mut enums: Vec<Enum> = Vec::new();
    let mut commands: Vec<Command> = Vec::new();
    let mut features: Vec<Feature> = Vec::new();
    let mut extensions: Vec<Extension> = Vec::new();

    let mut reader = Reader::from_str(input);
    loop {
        match reader.read_event()? {
            Event::Eof => break,
            Event::Start(start) => match start.name().as_ref() {
                b"enums" => {
                    parse_enum_block_into(&start, &mut reader, &mut enums)
                        .context("could not parse enum block")?;
                }
                b"command" => {
                    let command = parse_command(&mut reader).context("could not parse command")?;
                    commands.push(command);
                }
                b"feature" => {
                    let feature = parse_feature(&start, &mut reader)
                        .context("could not parse feature")?;
                    features.push(feature);
                }
                b"extension" => {
                    let extension = parse_extension(&start, &mut reader)
                        .context("could not parse extension")?;
                    extensions.push(extension);
                }
                _ => {}
            },
            Event::Empty(empty) => match empty.name().as_ref() {
                b"feature" => features.push(parse_feature_attrs(&empty)?),
                b"extension" => extensions.push(parse_extension_attrs(&empty)?),
                _ => {}
            },
            _ => {}
        }
    }

    let mut registry = Registry {
        enums,
        commands,
        features,
        extensions,
    };
    link_commands(&mut registry)?;
    Ok(registry)
}

fn push_requirement(
    required_by: &mut HashMap<String, Vec<Requirement>>,
    command: &str,
    requirement: &Requirement,
) {
    let requirements = required_by.entry(command.to_string()).or_default();
    if !requirements.contains(requirement) {
        requirements.push(requirement.clone());
    }
}

/// fills in aliases and requirements of every command. this needs the whole registry, aliases
/// are usually declared by extension commands that filtering drops.
fn link_commands(registry: &mut Registry) -> anyhow::Result<()> {
    let mut aliases: HashMap<String, Vec<String>> = HashMap::new();
    for cmd in registry.commands.iter() {
        if let Some(target) = &cmd.alias_of {
            aliases
                .entry(target.clone())
                .or_default()
                .push(cmd.proto.name.clone());
        }
    }

    let mut required_by: HashMap<String, Vec<Requirement>> = HashMap::new();

    for feat in registry.features.iter() {
        let Some(api) = registry_api(&feat.api) else {
            continue;
        };
        let number = KhronosVersion::parse(&feat.number)
            .with_context(|| format!("invalid number of feature {}", feat.name))?;
        let requirement = Requirement::Feature {
            api,
            major: number.major,
            minor: number.minor,
        };
        for require in feat.requires.iter() {
            for command in require.commands.iter() {
                push_requirement(&mut required_by, command, &requirement);
            }
        }
    }

    for ext in registry.extensions.iter() {
        let apis = supported_apis(&ext.supported);
        if apis.is_empty() {
            continue;
        }
        let requirement = Requirement::Extension {
            name: ext.name.clone(),
            apis,
        };
        for require in ext.requires.iter() {
            for command in require.commands.iter() {
                push_requirement(&mut required_by, command, &requirement);
            }
        }
    }

    // wherever an alias is available, the command it stands for is too.
    for cmd in registry.commands.iter() {
        let Some(target) = &cmd.alias_of else {
            continue;
        };
        let inherited = required_by.get(&cmd.proto.name).cloned().unwrap_or_default();
        for requirement in inherited.iter() {
            push_requirement(&mut required_by, target, requirement);
        }
    }

    for cmd in registry.commands.iter_mut() {
        cmd.aliases = aliases.remove(&cmd.proto.name).unwrap_or_default();
        cmd.required_by = required_by.remove(&cmd.proto.name).unwrap_or_default();
    }

    Ok(())
}

/// keeps enums and commands that `api` up to `version` (minus removals) and the listed
/// extensions need.
pub fn filter_registry(
    mut registry: Registry,
    api: Api,
    version: (u32, u32),
    extensions: &[&str],
) -> anyhow::Result<Registry> {
    let mut wanted_enums: HashSet<String> = HashSet::new();
    let mut wanted_commands: HashSet<String> = HashSet::new();

    let mut found_feature = false;
    for feat in registry.features.iter() {
        if registry_api(&feat.api) != Some(api) {
            continue;
        }

        let number = KhronosVersion::parse(&feat.number)
            .with_context(|| format!("invalid number of feature {}", feat.name))?;
        let feat_version = (number.major, number.minor);
        if feat_version > version {
            continue;
        }
        if feat_version == version {
            found_feature = true;
        }

        for require in feat.requires.iter() {
            wanted_enums.extend(require.enums.iter().cloned());
            wanted_commands.extend(require.commands.iter().cloned());
        }
        for remove in feat.removes.iter() {
            for name in remove.enums.iter() {
                wanted_enums.remove(name);
            }
            for name in remove.commands.iter() {
                wanted_commands.remove(name);
            }
        }
    }
    if !found_feature {
        bail!("could not find {api} {}.{}", version.0, version.1);
    }

    for name in extensions.iter() {
        let Some(ext) = registry.extensions.iter().find(|ext| ext.name == *name) else {
            bail!("unknown extension {name}");
        };
        if !supported_apis(&ext.supported).contains(&api) {
            bail!("{name} is not supported on {api}");
        }
        for require in ext.requires.iter() {
            wanted_enums.extend(require.enums.iter().cloned());
            wanted_commands.extend(require.commands.iter().cloned());
        }
    }

    registry.enums.retain(|e| wanted_enums.contains(&e.name));
    registry
        .commands
        .retain(|c| wanted_commands.contains(&c.proto.name));

    Ok(registry)
}

#[cfg(test)]
pub(crate) const TEST_REGISTRY: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<registry>
    <comment>test registry, 1 &lt; 2</comment>
    <enums namespace="GL" group="ErrorCode">
        <enum value="0" name="GL_NO_ERROR"/>
        <enum value="0x0500" name="GL_INVALID_ENUM"/>
        <unused start="0x0508" end="0x050F"/>
    </enums>
    <enums namespace="GL" group="AttribMask" type="bitmask">
        <enum value="0x00004000" name="GL_COLOR_BUFFER_BIT"/>
    </enums>
    <enums namespace="GL">
        <enum value="0x1F02" name="GL_VERSION"/>
        <enum value="0x91B9" name="GL_COMPUTE_SHADER"/>
        <enum value="0xFFFFFFFFu" name="GL_INVALID_INDEX" type="u"/>
    </enums>
    <commands namespace="GL">
        <command>
            <proto>void <name>glClear</name></proto>
            <param group="ClearBufferMask"><ptype>GLbitfield</ptype> <name>mask</name></param>
            <glx type="render" opcode="127"/>
        </command>
        <command>
            <proto group="String">const <ptype>GLubyte</ptype> *<name>glGetString</name></proto>
            <param><ptype>GLenum</ptype> <name>name</name></param>
        </command>
        <command>
            <proto>void <name>glDispatchCompute</name></proto>
            <param><ptype>GLuint</ptype> <name>num_groups_x</name></param>
            <param><ptype>GLuint</ptype> <name>num_groups_y</name></param>
            <param><ptype>GLuint</ptype> <name>num_groups_z</name></param>
        </command>
        <command>
            <proto>void <name>glShaderSource</name></proto>
            <param><ptype>GLuint</ptype> <name>shader</name></param>
            <param><ptype>GLsizei</ptype> <name>count</name></param>
            <param len="count">const <ptype>GLchar</ptype> *const*<name>string</name></param>
            <param len="count">const <ptype>GLint</ptype> *<name>length</name></param>
        </command>
        <command>
            <proto>void <name>glDispatchComputeARB</name></proto>
            <param><ptype>GLuint</ptype> <name>num_groups_x</name></param>
            <param><ptype>GLuint</ptype> <name>num_groups_y</name></param>
            <param><ptype>GLuint</ptype> <name>num_groups_z</name></param>
            <alias name="glDispatchCompute"/>
        </command>
        <command>
            <proto>void <name>glDispatchComputeEXT</name></proto>
            <param><ptype>GLuint</ptype> <name>num_groups_x</name></param>
            <param><ptype>GLuint</ptype> <name>num_groups_y</name></param>
            <param><ptype>GLuint</ptype> <name>num_groups_z</name></param>
            <alias name="glDispatchCompute"/>
        </command>
        <command>
            <proto>void <name>glMapBufferRangeLegacy</name></proto>
            <param><ptype>GLenum</ptype> <name>target</name></param>
        </command>
    </commands>
    <feature api="gl" name="GL_VERSION_1_0" number="1.0">
        <require>
            <enum name="GL_NO_ERROR"/>
            <enum name="GL_INVALID_ENUM"/>
            <enum name="GL_COLOR_BUFFER_BIT"/>
            <enum name="GL_VERSION"/>
            <command name="glClear"/>
            <command name="glGetString"/>
            <command name="glMapBufferRangeLegacy"/>
        </require>
    </feature>
    <feature api="gl" name="GL_VERSION_2_0" number="2.0">
        <require>
            <command name="glShaderSource"/>
        </require>
    </feature>
    <feature api="gl" name="GL_VERSION_3_2" number="3.2">
        <require/>
        <remove profile="core">
            <command name="glMapBufferRangeLegacy"/>
        </remove>
    </feature>
    <feature api="gl" name="GL_VERSION_4_3" number="4.3">
        <require>
            <enum name="GL_COMPUTE_SHADER"/>
            <command name="glDispatchCompute"/>
        </require>
    </feature>
    <feature api="gles2" name="GL_ES_VERSION_3_1" number="3.1">
        <require>
            <command name="glDispatchCompute"/>
        </require>
    </feature>
    <extensions>
        <extension name="GL_ARB_compute_shader" supported="gl|glcore">
            <require>
                <enum name="GL_COMPUTE_SHADER"/>
                <command name="glDispatchCompute"/>
            </require>
        </extension>
        <extension name="GL_ARB_gone" supported="gl|glcore">
            <require>
                <command name="glDispatchComputeARB"/>
            </require>
        </extension>
        <extension name="GL_EXT_es_only" supported="gles2">
            <require>
                <command name="glDispatchComputeEXT"/>
            </require>
        </extension>
        <extension name="GL_SGIX_nothing" supported="disabled"/>
    </extensions>
</registry>
"#;
