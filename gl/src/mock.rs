//! a tiny software stand-in for a driver, enough to drive the generated dispatch path in tests.
//! state is per thread, tests don't see each other.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::ffi::{CStr, CString, c_void};
use std::ptr::{null, null_mut};
use std::slice;

use khronos_version::KhronosVersion;

use crate::enums::*;
use crate::types::*;

#[derive(Default)]
pub struct MockGl {
    pub version: CString,
    pub glsl_version: Option<CString>,
    pub extensions: Vec<CString>,
    extension_string: CString,
    /// pending error flags, front first.
    pub errors: VecDeque<GLenum>,
    pub error_polls: usize,
    /// every call except glGetError.
    pub calls: Vec<String>,
    pub buffer: Vec<u8>,
    pub mapped: bool,
    next_buffer: GLuint,
    pub deleted: Vec<GLuint>,
    pub shader_source: String,
    pub info_log: CString,
    pub compiler_threads: Option<GLuint>,
}

thread_local! {
    static STATE: RefCell<MockGl> = RefCell::new(MockGl::default());
}

pub fn with<R>(f: impl FnOnce(&mut MockGl) -> R) -> R {
    STATE.with_borrow_mut(f)
}

pub fn reset(version: &str) {
    with(|gl| {
        *gl = MockGl {
            version: CString::new(version).unwrap(),
            glsl_version: Some(c"4.60".to_owned()),
            extensions: vec![
                c"GL_ARB_compute_shader".to_owned(),
                c"GL_ARB_map_buffer_range".to_owned(),
                c"GL_KHR_parallel_shader_compile".to_owned(),
            ],
            info_log: c"0:1(1): error: syntax error".to_owned(),
            ..MockGl::default()
        }
    });
}

pub fn calls() -> Vec<String> {
    with(|gl| gl.calls.clone())
}

pub fn clear_calls() {
    with(|gl| gl.calls.clear());
}

pub fn error_polls() -> usize {
    with(|gl| gl.error_polls)
}

fn record(gl: &mut MockGl, name: &str, error: Option<GLenum>) {
    gl.calls.push(name.to_string());
    if let Some(error) = error {
        gl.errors.push_back(error);
    }
}

extern "system" fn bind_buffer(_target: GLenum, _buffer: GLuint) {
    with(|gl| record(gl, "glBindBuffer", None));
}

extern "system" fn buffer_data(_target: GLenum, size: GLsizeiptr, data: *const c_void, _usage: GLenum) {
    with(|gl| {
        if size < 0 {
            return record(gl, "glBufferData", Some(INVALID_VALUE));
        }
        gl.buffer = if data.is_null() {
            vec![0; size as usize]
        } else {
            unsafe { slice::from_raw_parts(data.cast::<u8>(), size as usize) }.to_vec()
        };
        record(gl, "glBufferData", None);
    });
}

extern "system" fn clear(mask: GLbitfield) {
    let valid = COLOR_BUFFER_BIT | DEPTH_BUFFER_BIT | STENCIL_BUFFER_BIT;
    with(|gl| record(gl, "glClear", (mask & !valid != 0).then_some(INVALID_VALUE)));
}

extern "system" fn enable(cap: GLenum) {
    let known = matches!(cap, DEPTH_TEST | BLEND);
    with(|gl| record(gl, "glEnable", (!known).then_some(INVALID_ENUM)));
}

extern "system" fn dispatch_compute(_x: GLuint, _y: GLuint, _z: GLuint) {
    with(|gl| record(gl, "glDispatchCompute", None));
}

extern "system" fn gen_buffers(n: GLsizei, buffers: *mut GLuint) {
    with(|gl| {
        for i in 0..n.max(0) as usize {
            gl.next_buffer += 1;
            unsafe { *buffers.add(i) = gl.next_buffer };
        }
        record(gl, "glGenBuffers", (n < 0).then_some(INVALID_VALUE));
    });
}

extern "system" fn delete_buffers(n: GLsizei, buffers: *const GLuint) {
    with(|gl| {
        let buffers = unsafe { slice::from_raw_parts(buffers, n.max(0) as usize) };
        gl.deleted.extend_from_slice(buffers);
        record(gl, "glDeleteBuffers", (n < 0).then_some(INVALID_VALUE));
    });
}

extern "system" fn get_error() -> GLenum {
    with(|gl| {
        gl.error_polls += 1;
        gl.errors.pop_front().unwrap_or(NO_ERROR)
    })
}

extern "system" fn get_integerv(pname: GLenum, data: *mut GLint) {
    with(|gl| {
        let version = gl.version.to_str().ok().and_then(|v| KhronosVersion::parse(v).ok());
        let value = match pname {
            NUM_EXTENSIONS => Some(gl.extensions.len() as GLint),
            MAJOR_VERSION => version.map(|v| v.major as GLint),
            MINOR_VERSION => version.map(|v| v.minor as GLint),
            _ => None,
        };
        match value {
            Some(value) => {
                unsafe { *data = value };
                record(gl, "glGetIntegerv", None);
            }
            None => record(gl, "glGetIntegerv", Some(INVALID_ENUM)),
        }
    });
}

extern "system" fn get_shaderiv(_shader: GLuint, pname: GLenum, params: *mut GLint) {
    with(|gl| {
        let value = match pname {
            INFO_LOG_LENGTH => match gl.info_log.as_bytes().len() {
                0 => 0,
                len => len as GLint + 1,
            },
            COMPILE_STATUS => (gl.info_log.as_bytes().is_empty()) as GLint,
            _ => return record(gl, "glGetShaderiv", Some(INVALID_ENUM)),
        };
        unsafe { *params = value };
        record(gl, "glGetShaderiv", None);
    });
}

extern "system" fn get_shader_info_log(
    _shader: GLuint,
    buf_size: GLsizei,
    length: *mut GLsizei,
    info_log: *mut GLchar,
) {
    with(|gl| {
        let bytes = gl.info_log.as_bytes();
        let n = bytes.len().min((buf_size.max(1) - 1) as usize);
        unsafe {
            std::ptr::copy_nonoverlapping(bytes.as_ptr(), info_log.cast::<u8>(), n);
            *info_log.add(n) = 0;
            if !length.is_null() {
                *length = n as GLsizei;
            }
        }
        record(gl, "glGetShaderInfoLog", None);
    });
}

extern "system" fn get_string(name: GLenum) -> *const GLubyte {
    with(|gl| {
        let ptr = match name {
            VERSION => gl.version.as_ptr(),
            SHADING_LANGUAGE_VERSION => gl.glsl_version.as_ref().map_or(null(), |v| v.as_ptr()),
            EXTENSIONS => {
                let joined = gl
                    .extensions
                    .iter()
                    .map(|ext| ext.to_string_lossy())
                    .collect::<Vec<_>>()
                    .join(" ");
                gl.extension_string = CString::new(joined).unwrap();
                gl.extension_string.as_ptr()
            }
            _ => {
                record(gl, "glGetString", Some(INVALID_ENUM));
                return null();
            }
        };
        record(gl, "glGetString", None);
        ptr.cast()
    })
}

extern "system" fn get_stringi(name: GLenum, index: GLuint) -> *const GLubyte {
    with(|gl| {
        if name != EXTENSIONS {
            record(gl, "glGetStringi", Some(INVALID_ENUM));
            return null();
        }
        match gl.extensions.get(index as usize) {
            Some(ext) => {
                let ptr = ext.as_ptr().cast();
                record(gl, "glGetStringi", None);
                ptr
            }
            None => {
                record(gl, "glGetStringi", Some(INVALID_VALUE));
                null()
            }
        }
    })
}

extern "system" fn map_buffer_range(
    _target: GLenum,
    offset: GLintptr,
    length: GLsizeiptr,
    _access: GLbitfield,
) -> *mut c_void {
    with(|gl| {
        if gl.mapped {
            record(gl, "glMapBufferRange", Some(INVALID_OPERATION));
            return null_mut();
        }
        if offset < 0 || length <= 0 || (offset + length) as usize > gl.buffer.len() {
            record(gl, "glMapBufferRange", Some(INVALID_VALUE));
            return null_mut();
        }
        gl.mapped = true;
        record(gl, "glMapBufferRange", None);
        unsafe { gl.buffer.as_mut_ptr().add(offset as usize).cast() }
    })
}

extern "system" fn max_shader_compiler_threads(count: GLuint) {
    with(|gl| {
        gl.compiler_threads = Some(count);
        record(gl, "glMaxShaderCompilerThreadsKHR", None);
    });
}

extern "system" fn shader_source(
    _shader: GLuint,
    count: GLsizei,
    string: *const *const GLchar,
    length: *const GLint,
) {
    let mut source = String::new();
    for i in 0..count.max(0) as usize {
        let bytes = unsafe {
            let ptr = *string.add(i);
            if length.is_null() {
                CStr::from_ptr(ptr).to_bytes()
            } else {
                slice::from_raw_parts(ptr.cast::<u8>(), *length.add(i) as usize)
            }
        };
        source.push_str(&String::from_utf8_lossy(bytes));
    }
    with(|gl| {
        gl.shader_source = source;
        record(gl, "glShaderSource", None);
    });
}

extern "system" fn unmap_buffer(_target: GLenum) -> GLboolean {
    with(|gl| {
        if !gl.mapped {
            record(gl, "glUnmapBuffer", Some(INVALID_OPERATION));
            return FALSE;
        }
        gl.mapped = false;
        record(gl, "glUnmapBuffer", None);
        TRUE
    })
}

/// resolves the core names of everything above, null for the rest.
pub fn proc_address(name: &CStr) -> *const c_void {
    match name.to_bytes() {
        b"glBindBuffer" => bind_buffer as *const c_void,
        b"glBufferData" => buffer_data as *const c_void,
        b"glClear" => clear as *const c_void,
        b"glDeleteBuffers" => delete_buffers as *const c_void,
        b"glDispatchCompute" => dispatch_compute as *const c_void,
        b"glEnable" => enable as *const c_void,
        b"glGenBuffers" => gen_buffers as *const c_void,
        b"glGetError" => get_error as *const c_void,
        b"glGetIntegerv" => get_integerv as *const c_void,
        b"glGetShaderInfoLog" => get_shader_info_log as *const c_void,
        b"glGetShaderiv" => get_shaderiv as *const c_void,
        b"glGetString" => get_string as *const c_void,
        b"glGetStringi" => get_stringi as *const c_void,
        b"glMapBufferRange" => map_buffer_range as *const c_void,
        b"glMaxShaderCompilerThreadsKHR" => max_shader_compiler_threads as *const c_void,
        b"glShaderSource" => shader_source as *const c_void,
        b"glUnmapBuffer" => unmap_buffer as *const c_void,
        _ => null(),
    }
}
