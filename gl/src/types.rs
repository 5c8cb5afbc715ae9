use std::ffi::{c_char, c_double, c_float, c_int, c_short, c_uchar, c_uint, c_ushort, c_void};

pub type GLbitfield = c_uint;
pub type GLboolean = c_uchar;
pub type GLbyte = c_char;
pub type GLchar = c_char;
pub type GLcharARB = c_char;
pub type GLdouble = c_double;
pub type GLenum = c_uint;
pub type GLfloat = c_float;
pub type GLhandleARB = c_uint;
pub type GLint = c_int;
pub type GLint64 = i64;
pub type GLintptr = isize;
pub type GLintptrARB = isize;
pub type GLshort = c_short;
pub type GLsizei = c_int;
pub type GLsizeiptr = isize;
pub type GLsizeiptrARB = isize;
pub type GLsync = *mut c_void;
pub type GLubyte = c_uchar;
pub type GLuint = c_uint;
pub type GLuint64 = u64;
pub type GLushort = c_ushort;
