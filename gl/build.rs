use std::fs::File;
use std::io::{BufWriter, Write as _};
use std::path::PathBuf;
use std::{env, fs};

use anyhow::Context as _;
use gl_generator::Api;

fn generate_gl(api: Api, version: (u32, u32), extensions: &[&str]) -> anyhow::Result<()> {
    println!("cargo:rerun-if-changed=../gl-generator");
    println!("cargo:rerun-if-changed=../gl-specs");

    let out_dir = PathBuf::from(&env::var("OUT_DIR")?);

    let spec = fs::read_to_string("../gl-specs/gl.xml").context("could not read gl.xml")?;
    let registry = gl_generator::filter_registry(
        gl_generator::parse_registry(spec.as_str()).context("could not parse gl.xml")?,
        api,
        version,
        extensions,
    )?;

    let mut enums_out = BufWriter::new(File::create(out_dir.join("gl_enums_generated.rs"))?);
    gl_generator::emit_enums(&mut enums_out, &registry)?;
    enums_out.flush()?;

    let mut commands_out =
        BufWriter::new(File::create(out_dir.join("gl_commands_generated.rs"))?);
    gl_generator::emit_commands(&mut commands_out, &registry)?;
    commands_out.flush()?;

    Ok(())
}

fn main() -> anyhow::Result<()> {
    println!("cargo:rerun-if-changed=build.rs");

    generate_gl(
        Api::Gl,
        (4, 6),
        &[
            #[cfg(feature = "GL_ARB_compute_shader")]
            "GL_ARB_compute_shader",
            #[cfg(feature = "GL_ARB_parallel_shader_compile")]
            "GL_ARB_parallel_shader_compile",
            #[cfg(feature = "GL_KHR_parallel_shader_compile")]
            "GL_KHR_parallel_shader_compile",
        ],
    )?;

    Ok(())
}
