use std::io::{BufWriter, Write as _, stdout};

use anyhow::Context as _;
use gl_generator::{Api, emit_commands, emit_enums, filter_registry, parse_registry};

// prints what gl/build.rs would generate.
//
// cargo run -p gl-generator --example gl-generator -- gles2 3.2 GL_EXT_map_buffer_range

fn main() -> anyhow::Result<()> {
    let mut args = std::env::args().skip(1);
    let api: Api = args.next().as_deref().unwrap_or("gl").parse()?;
    let version = args.next().unwrap_or_else(|| "4.6".to_string());
    let (major, minor) = version
        .split_once('.')
        .context("version must look like <major>.<minor>")?;
    let version = (major.parse()?, minor.parse()?);
    let extensions: Vec<String> = args.collect();
    let extensions: Vec<&str> = extensions.iter().map(String::as_str).collect();

    let spec = std::fs::read_to_string("gl-specs/gl.xml")?;
    let registry = filter_registry(parse_registry(&spec)?, api, version, &extensions)?;

    let mut w = BufWriter::new(stdout());
    emit_enums(&mut w, &registry)?;
    emit_commands(&mut w, &registry)?;
    w.flush()?;

    Ok(())
}
