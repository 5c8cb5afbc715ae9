use std::ffi::{CStr, c_char};
use std::slice;

use bytemuck::Pod;
use scopeguard::ScopeGuard;

use crate::Command;
use crate::context::Context;
use crate::enums::*;
use crate::error::Error;
use crate::marshal::{GlStrings, gl_len, gl_size};
use crate::types::*;

unsafe fn string_from_gl(ptr: *const GLubyte, name: GLenum) -> Result<String, Error> {
    if ptr.is_null() {
        return Err(Error::NullString { name });
    }
    let cstr = unsafe { CStr::from_ptr(ptr as *const c_char) };
    Ok(cstr.to_str()?.to_string())
}

// NOTE: everything in here funnels into the generated checked wrappers, so the not-loaded check
// and the error poll apply the same way they do to direct calls.
impl Context {
    pub unsafe fn get_string(&self, name: GLenum) -> Result<String, Error> {
        let ptr = unsafe { self.GetString(name) }?;
        unsafe { string_from_gl(ptr, name) }
    }

    pub unsafe fn get_string_i(&self, name: GLenum, index: GLuint) -> Result<String, Error> {
        let ptr = unsafe { self.GetStringi(name, index) }?;
        unsafe { string_from_gl(ptr, name) }
    }

    pub unsafe fn get_integer(&self, pname: GLenum) -> Result<GLint, Error> {
        let mut value: GLint = 0;
        unsafe { self.GetIntegerv(pname, &mut value) }?;
        Ok(value)
    }

    /// hands all `sources` to the shader in one call, without copying or nul-terminating them.
    pub unsafe fn shader_source(&self, shader: GLuint, sources: &[&str]) -> Result<(), Error> {
        let strings = GlStrings::new(sources)?;
        unsafe { self.ShaderSource(shader, strings.count(), strings.ptrs(), strings.lens()) }
    }

    pub unsafe fn get_shader(&self, shader: GLuint, pname: GLenum) -> Result<GLint, Error> {
        let mut value: GLint = 0;
        unsafe { self.GetShaderiv(shader, pname, &mut value) }?;
        Ok(value)
    }

    pub unsafe fn shader_info_log(&self, shader: GLuint) -> Result<String, Error> {
        let len = unsafe { self.get_shader(shader, INFO_LOG_LENGTH) }?;
        if len <= 0 {
            return Ok(String::new());
        }
        let mut info_log = vec![0u8; len as usize];
        let mut written: GLsizei = 0;
        unsafe {
            self.GetShaderInfoLog(shader, len, &mut written, info_log.as_mut_ptr().cast())
        }?;
        info_log.truncate(written.clamp(0, len) as usize);
        Ok(String::from_utf8_lossy(&info_log).into_owned())
    }

    pub unsafe fn gen_buffers(&self, n: usize) -> Result<Vec<GLuint>, Error> {
        let mut buffers = vec![0; n];
        unsafe { self.GenBuffers(gl_len(n)?, buffers.as_mut_ptr()) }?;
        Ok(buffers)
    }

    pub unsafe fn delete_buffers(&self, buffers: &[GLuint]) -> Result<(), Error> {
        unsafe { self.DeleteBuffers(gl_len(buffers.len())?, buffers.as_ptr()) }
    }

    pub unsafe fn buffer_data<T: Pod>(
        &self,
        target: GLenum,
        data: &[T],
        usage: GLenum,
    ) -> Result<(), Error> {
        let bytes: &[u8] = bytemuck::cast_slice(data);
        unsafe { self.BufferData(target, gl_size(bytes.len())?, bytes.as_ptr().cast(), usage) }
    }

    /// maps `len` bytes at `offset` of the buffer bound to `target`, runs `f` on them and unmaps.
    ///
    /// once the map succeeded the unmap happens on every way out, after `f` returns or when `f`
    /// panics; only the first reports a failed unmap. a failed map leaves the buffer alone, it may
    /// be mapped by someone else.
    pub unsafe fn with_mapped_buffer_range<R>(
        &self,
        target: GLenum,
        offset: usize,
        len: usize,
        access: GLbitfield,
        f: impl FnOnce(&mut [u8]) -> R,
    ) -> Result<R, Error> {
        let offset = gl_size(offset)?;
        let length = gl_size(len)?;

        let ptr = unsafe { self.MapBufferRange(target, offset, length, access) }?;
        if ptr.is_null() {
            return Err(Error::MapFailed {
                command: Command::MapBufferRange,
            });
        }

        let unmap = scopeguard::guard((), |()| {
            if let Err(err) = unsafe { self.unmap_buffer(target) } {
                log::debug!("could not unmap buffer: {err}");
            }
        });
        let ret = f(unsafe { slice::from_raw_parts_mut(ptr.cast::<u8>(), len) });

        ScopeGuard::into_inner(unmap);
        unsafe { self.unmap_buffer(target) }?;
        Ok(ret)
    }

    unsafe fn unmap_buffer(&self, target: GLenum) -> Result<(), Error> {
        // NOTE: GL_FALSE means the contents got corrupted while mapped (a screen mode change for
        // example).
        if unsafe { self.UnmapBuffer(target) }? == FALSE {
            return Err(Error::MapFailed {
                command: Command::UnmapBuffer,
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::panic::{AssertUnwindSafe, catch_unwind};
    use std::ptr::null;

    use super::*;
    use crate::error::ErrorCode;
    use crate::mock;

    unsafe fn load() -> Context {
        mock::reset("4.6 (Core Profile) Mesa 24.0.5");
        unsafe { Context::load_with(mock::proc_address) }.unwrap()
    }

    #[test]
    fn test_get_string() {
        let context = unsafe { load() };
        assert_eq!(
            unsafe { context.get_string(VERSION) }.unwrap(),
            "4.6 (Core Profile) Mesa 24.0.5"
        );
        let err = unsafe { context.get_string(0x1234) }.unwrap_err();
        assert_eq!(err.code(), Some(ErrorCode::InvalidEnum));
    }

    #[test]
    fn test_get_integer() {
        let context = unsafe { load() };
        assert_eq!(unsafe { context.get_integer(MAJOR_VERSION) }.unwrap(), 4);
        assert_eq!(
            unsafe { context.get_integer(NUM_EXTENSIONS) }.unwrap() as usize,
            context.extensions().len()
        );
    }

    #[test]
    fn test_shader_source_and_info_log() {
        let context = unsafe { load() };
        unsafe { context.shader_source(1, &["#version 460\n", "void main() {}\n"]) }.unwrap();
        assert_eq!(
            mock::with(|gl| gl.shader_source.clone()),
            "#version 460\nvoid main() {}\n"
        );
        assert_eq!(
            unsafe { context.shader_info_log(1) }.unwrap(),
            "0:1(1): error: syntax error"
        );

        mock::with(|gl| gl.info_log = c"".to_owned());
        assert_eq!(unsafe { context.shader_info_log(1) }.unwrap(), "");
    }

    #[test]
    fn test_buffers() {
        let context = unsafe { load() };
        let buffers = unsafe { context.gen_buffers(3) }.unwrap();
        assert_eq!(buffers, vec![1, 2, 3]);
        unsafe { context.delete_buffers(&buffers[1..]) }.unwrap();
        assert_eq!(mock::with(|gl| gl.deleted.clone()), vec![2, 3]);

        unsafe { context.buffer_data(ARRAY_BUFFER, &[1.0f32, 2.0, 3.0], STATIC_DRAW) }.unwrap();
        assert_eq!(
            mock::with(|gl| gl.buffer.clone()),
            bytemuck::cast_slice::<f32, u8>(&[1.0, 2.0, 3.0])
        );
    }

    #[test]
    fn test_mapped_buffer_range() {
        let context = unsafe { load() };
        unsafe { context.buffer_data(ARRAY_BUFFER, &[0u8; 8], DYNAMIC_DRAW) }.unwrap();

        let len = unsafe {
            context.with_mapped_buffer_range(ARRAY_BUFFER, 2, 4, MAP_WRITE_BIT, |bytes| {
                assert!(mock::with(|gl| gl.mapped));
                bytes.copy_from_slice(&[1, 2, 3, 4]);
                bytes.len()
            })
        }
        .unwrap();
        assert_eq!(len, 4);
        assert!(!mock::with(|gl| gl.mapped));
        assert_eq!(mock::with(|gl| gl.buffer.clone()), vec![0, 0, 1, 2, 3, 4, 0, 0]);
    }

    #[test]
    fn test_mapped_buffer_range_unmaps_on_panic() {
        let context = unsafe { load() };
        unsafe { context.buffer_data(ARRAY_BUFFER, &[0u8; 8], DYNAMIC_DRAW) }.unwrap();

        let result = catch_unwind(AssertUnwindSafe(|| unsafe {
            context.with_mapped_buffer_range(ARRAY_BUFFER, 0, 8, MAP_READ_BIT, |bytes| -> usize {
                panic!("boom after {} bytes", bytes.len())
            })
        }));
        assert!(result.is_err());
        assert!(!mock::with(|gl| gl.mapped));
        assert!(mock::with(|gl| gl.errors.is_empty()));
    }

    #[test]
    fn test_mapped_buffer_range_leaves_buffer_after_map_error() {
        let context = unsafe { load() };
        unsafe { context.buffer_data(ARRAY_BUFFER, &[0u8; 8], DYNAMIC_DRAW) }.unwrap();
        mock::clear_calls();

        let mut called = false;
        let err = unsafe {
            context.with_mapped_buffer_range(ARRAY_BUFFER, 4, 16, MAP_READ_BIT, |_| called = true)
        }
        .unwrap_err();
        assert!(matches!(
            err,
            Error::Gl {
                command: Command::MapBufferRange,
                code: ErrorCode::InvalidValue
            }
        ));
        assert!(!called);
        assert_eq!(mock::calls(), vec!["glMapBufferRange"]);
        assert!(mock::with(|gl| gl.errors.is_empty()));
        unsafe { context.Clear(COLOR_BUFFER_BIT) }.unwrap();
    }

    #[test]
    fn test_mapped_buffer_range_keeps_existing_mapping() {
        let context = unsafe { load() };
        unsafe { context.buffer_data(ARRAY_BUFFER, &[0u8; 8], DYNAMIC_DRAW) }.unwrap();
        mock::with(|gl| gl.mapped = true);
        mock::clear_calls();

        let err = unsafe {
            context.with_mapped_buffer_range(ARRAY_BUFFER, 0, 4, MAP_READ_BIT, |_| ())
        }
        .unwrap_err();
        assert_eq!(err.code(), Some(ErrorCode::InvalidOperation));
        assert_eq!(mock::calls(), vec!["glMapBufferRange"]);
        assert!(mock::with(|gl| gl.mapped));
    }

    #[test]
    fn test_mapped_buffer_range_not_loaded() {
        mock::reset("4.6");
        let context = unsafe {
            Context::load_with(|name| {
                if name == c"glMapBufferRange" {
                    null()
                } else {
                    mock::proc_address(name)
                }
            })
        }
        .unwrap();
        mock::clear_calls();

        let err = unsafe {
            context.with_mapped_buffer_range(ARRAY_BUFFER, 0, 4, MAP_READ_BIT, |_| ())
        }
        .unwrap_err();
        assert!(matches!(err, Error::NotLoaded { .. }));
        assert!(mock::calls().is_empty());
    }

    #[test]
    fn test_es2_maps_through_extension_aliases() {
        mock::reset("OpenGL ES 2.0 Mesa 23.1");
        mock::with(|gl| {
            gl.glsl_version = Some(c"OpenGL ES GLSL ES 1.0.16".to_owned());
            gl.extensions = vec![
                c"GL_EXT_map_buffer_range".to_owned(),
                c"GL_OES_mapbuffer".to_owned(),
            ];
        });
        // an es 2 driver only exports the suffixed names.
        let context = unsafe {
            Context::load_with(|name| match name.to_bytes() {
                b"glMapBufferRange" | b"glUnmapBuffer" => null(),
                b"glMapBufferRangeEXT" => mock::proc_address(c"glMapBufferRange"),
                b"glUnmapBufferOES" => mock::proc_address(c"glUnmapBuffer"),
                _ => mock::proc_address(name),
            })
        }
        .unwrap();
        assert_eq!(context.glsl_version().unwrap().directive(), "#version 100");

        unsafe { context.buffer_data(ARRAY_BUFFER, &[7u8; 4], DYNAMIC_DRAW) }.unwrap();
        let sum = unsafe {
            context.with_mapped_buffer_range(ARRAY_BUFFER, 0, 4, MAP_READ_BIT, |bytes| {
                bytes.iter().map(|b| *b as u32).sum::<u32>()
            })
        }
        .unwrap();
        assert_eq!(sum, 28);
    }

    #[cfg(feature = "GL_KHR_parallel_shader_compile")]
    #[test]
    fn test_parallel_shader_compile_through_arb_name() {
        mock::reset("4.5");
        mock::with(|gl| gl.extensions = vec![c"GL_ARB_parallel_shader_compile".to_owned()]);
        let context = unsafe {
            Context::load_with(|name| match name.to_bytes() {
                b"glMaxShaderCompilerThreadsKHR" => null(),
                b"glMaxShaderCompilerThreadsARB" => {
                    mock::proc_address(c"glMaxShaderCompilerThreadsKHR")
                }
                _ => mock::proc_address(name),
            })
        }
        .unwrap();

        unsafe { context.MaxShaderCompilerThreadsKHR(4) }.unwrap();
        assert_eq!(mock::with(|gl| gl.compiler_threads), Some(4));
    }
}
