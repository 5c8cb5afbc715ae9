use std::marker::PhantomData;

use crate::error::Error;
use crate::types::*;

#[inline]
pub fn gl_len(len: usize) -> Result<GLsizei, Error> {
    GLsizei::try_from(len).map_err(|_| Error::LengthOverflow { len })
}

#[inline]
pub fn gl_size(len: usize) -> Result<GLsizeiptr, Error> {
    GLsizeiptr::try_from(len).map_err(|_| Error::LengthOverflow { len })
}

/// the pointer + length arrays that `glShaderSource` and friends take, pointing straight into the
/// borrowed strings. nothing is copied and nothing needs to be nul-terminated.
pub struct GlStrings<'a> {
    ptrs: Vec<*const GLchar>,
    lens: Vec<GLint>,
    _marker: PhantomData<&'a str>,
}

impl<'a> GlStrings<'a> {
    pub fn new(strings: &[&'a str]) -> Result<Self, Error> {
        // validates the count up front, `count()` relies on it.
        gl_len(strings.len())?;
        let lens = strings
            .iter()
            .map(|s| GLint::try_from(s.len()).map_err(|_| Error::LengthOverflow { len: s.len() }))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self {
            ptrs: strings.iter().map(|s| s.as_ptr().cast()).collect(),
            lens,
            _marker: PhantomData,
        })
    }

    pub fn count(&self) -> GLsizei {
        self.ptrs.len() as GLsizei
    }

    pub fn ptrs(&self) -> *const *const GLchar {
        self.ptrs.as_ptr()
    }

    pub fn lens(&self) -> *const GLint {
        self.lens.as_ptr()
    }
}
