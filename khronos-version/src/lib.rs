use std::cmp::Ordering;
use std::fmt;
use std::ops::Deref;
use std::str::FromStr;
use std::sync::LazyLock;

use regex::Regex;

// NOTE: unanchored on purpose. gles drivers prefix the number ("OpenGL ES 3.2 Mesa 23.1"), desktop
// drivers suffix vendor text ("4.6.0 NVIDIA 535.54.03").
static VERSION_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(\d+)\.(\d+)(?:\.(\d+))?").expect("version pattern is valid")
});

static ES_TOKEN_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\bES\b").expect("es token pattern is valid"));

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Error {
    #[error("malformed version string {0:?}")]
    Malformed(String),
    #[error("unsupported api {0:?}")]
    UnsupportedApi(String),
}

/// api tags as they appear in the khronos registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Api {
    Gl,
    Gles1,
    Gles2,
    Glsc2,
    Glsl,
    Essl,
}

impl Api {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Gl => "gl",
            Self::Gles1 => "gles1",
            Self::Gles2 => "gles2",
            Self::Glsc2 => "glsc2",
            Self::Glsl => "glsl",
            Self::Essl => "essl",
        }
    }

    pub fn is_embedded(&self) -> bool {
        matches!(self, Self::Gles1 | Self::Gles2 | Self::Glsc2 | Self::Essl)
    }
}

impl FromStr for Api {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "gl" => Ok(Self::Gl),
            "gles1" => Ok(Self::Gles1),
            "gles2" => Ok(Self::Gles2),
            "glsc2" => Ok(Self::Glsc2),
            "glsl" => Ok(Self::Glsl),
            "essl" => Ok(Self::Essl),
            other => Err(Error::UnsupportedApi(other.to_string())),
        }
    }
}

impl fmt::Display for Api {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

fn parse_number(input: &str, digits: &str) -> Result<u32, Error> {
    digits
        .parse()
        .map_err(|_| Error::Malformed(input.to_string()))
}

fn checked_version_id(major: u32, minor: u32) -> Option<u32> {
    let minor = if minor >= 10 { minor } else { minor * 10 };
    major.checked_mul(100)?.checked_add(minor)
}

fn has_es_token(input: &str) -> bool {
    ES_TOKEN_RE.is_match(input)
}

/// version of a khronos api as reported by a driver (`GL_VERSION` and friends).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct KhronosVersion {
    pub major: u32,
    pub minor: u32,
    pub revision: u32,
    pub api: Api,
}

impl KhronosVersion {
    pub const fn new(major: u32, minor: u32, revision: u32, api: Api) -> Self {
        Self {
            major,
            minor,
            revision,
            api,
        }
    }

    /// accepts `<major>.<minor>[.<revision>]` anywhere in the input. a standalone `ES` token
    /// selects the embedded api.
    pub fn parse(input: &str) -> Result<Self, Error> {
        let caps = VERSION_RE
            .captures(input)
            .ok_or_else(|| Error::Malformed(input.to_string()))?;

        let major = parse_number(input, &caps[1])?;
        let minor = parse_number(input, &caps[2])?;
        let revision = match caps.get(3) {
            Some(m) => parse_number(input, m.as_str())?,
            None => 0,
        };
        if checked_version_id(major, minor).is_none() {
            return Err(Error::Malformed(input.to_string()));
        }

        let api = if !has_es_token(input) {
            Api::Gl
        } else if major == 1 {
            Api::Gles1
        } else {
            Api::Gles2
        };

        Ok(Self::new(major, minor, revision, api))
    }

    /// same as [`KhronosVersion::parse`], but an explicit api tag replaces the inferred one.
    pub fn parse_with_api(input: &str, api: Option<&str>) -> Result<Self, Error> {
        let api = api.map(Api::from_str).transpose()?;
        let mut version = Self::parse(input)?;
        if let Some(api) = api {
            version.api = api;
        }
        Ok(version)
    }

    /// `major * 100` plus the minor in tens. parsed versions always fit, values built with
    /// [`KhronosVersion::new`] that do not saturate at `u32::MAX`.
    pub fn version_id(&self) -> u32 {
        checked_version_id(self.major, self.minor).unwrap_or(u32::MAX)
    }

    pub fn at_least(&self, major: u32, minor: u32) -> bool {
        (self.major, self.minor) >= (major, minor)
    }
}

impl PartialOrd for KhronosVersion {
    /// versions of different apis are not comparable.
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        if self.api != other.api {
            return None;
        }
        Some(
            self.major
                .cmp(&other.major)
                .then(self.minor.cmp(&other.minor))
                .then(self.revision.cmp(&other.revision)),
        )
    }
}

impl fmt::Display for KhronosVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.major, self.minor)?;
        if self.revision != 0 {
            write!(f, ".{}", self.revision)?;
        }
        if self.api.is_embedded() {
            f.write_str(" ES")?;
        }
        Ok(())
    }
}

impl FromStr for KhronosVersion {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

/// shading language version (`GL_SHADING_LANGUAGE_VERSION`).
///
/// glsl spells minors in hundredths ("4.50"), they are normalized to a single digit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd)]
pub struct GlslVersion(KhronosVersion);

impl GlslVersion {
    pub fn parse(input: &str) -> Result<Self, Error> {
        Self::parse_with_api(input, None)
    }

    /// `gl` and `glsl` select desktop glsl, `gles2`, `glsc2` and `essl` select glsl es.
    pub fn parse_with_api(input: &str, api: Option<&str>) -> Result<Self, Error> {
        let api = match api {
            None => None,
            Some("gl" | "glsl") => Some(Api::Glsl),
            Some("gles2" | "glsc2" | "essl") => Some(Api::Essl),
            Some(other) => return Err(Error::UnsupportedApi(other.to_string())),
        };

        let mut version = KhronosVersion::parse(input)?;
        if version.minor >= 10 {
            version.minor /= 10;
        }
        version.api = api.unwrap_or(if version.api.is_embedded() {
            Api::Essl
        } else {
            Api::Glsl
        });

        Ok(Self(version))
    }

    // NOTE: the minor here is already normalized, so the `minor >= 10` arm of the base formula
    // never fires for real glsl versions. kept as is.
    pub fn version_id(&self) -> u32 {
        self.0.version_id()
    }

    /// the `#version` line a shader for this language version starts with.
    pub fn directive(&self) -> String {
        let id = self.version_id();
        // essl 1.00 predates the `es` profile suffix.
        if self.0.api == Api::Essl && id != 100 {
            format!("#version {id} es")
        } else {
            format!("#version {id}")
        }
    }

    pub fn into_inner(self) -> KhronosVersion {
        self.0
    }
}

impl Deref for GlslVersion {
    type Target = KhronosVersion;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl fmt::Display for GlslVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}0", self.0.major, self.0.minor)?;
        if self.0.api == Api::Essl {
            f.write_str(" ES")?;
        }
        Ok(())
    }
}

impl FromStr for GlslVersion {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

#[test]
fn test_parse_well_formed() {
    let v = KhronosVersion::parse("2.1").unwrap();
    assert_eq!((v.major, v.minor, v.revision, v.api), (2, 1, 0, Api::Gl));

    let v = KhronosVersion::parse("4.50").unwrap();
    assert_eq!((v.major, v.minor), (4, 50));

    let v = KhronosVersion::parse("3.00 ES").unwrap();
    assert_eq!((v.major, v.minor, v.api), (3, 0, Api::Gles2));
}

#[test]
fn test_parse_rejects_missing_dot() {
    assert_eq!(
        KhronosVersion::parse("460"),
        Err(Error::Malformed("460".to_string()))
    );
    assert!(GlslVersion::parse("460").is_err());
    assert!(KhronosVersion::parse("").is_err());
}

#[test]
fn test_parse_revision_and_vendor_text() {
    let v = KhronosVersion::parse("4.6.0 NVIDIA 535.54.03").unwrap();
    assert_eq!(v, KhronosVersion::new(4, 6, 0, Api::Gl));

    let v = KhronosVersion::parse("3.3.14761 Core Profile").unwrap();
    assert_eq!(v.revision, 14761);
}

#[test]
fn test_parse_gles_driver_strings() {
    let v = KhronosVersion::parse("OpenGL ES 3.2 Mesa 23.1.4").unwrap();
    assert_eq!(v, KhronosVersion::new(3, 2, 0, Api::Gles2));

    let v = KhronosVersion::parse("OpenGL ES-CM 1.1").unwrap();
    assert_eq!(v.api, Api::Gles1);

    // not a standalone token.
    let v = KhronosVersion::parse("4.6 GLES-ish vendor").unwrap();
    assert_eq!(v.api, Api::Gl);
}

#[test]
fn test_parse_with_api() {
    let v = KhronosVersion::parse_with_api("2.0", Some("glsc2")).unwrap();
    assert_eq!(v.api, Api::Glsc2);

    let v = KhronosVersion::parse_with_api("3.2 ES", None).unwrap();
    assert_eq!(v.api, Api::Gles2);

    assert_eq!(
        KhronosVersion::parse_with_api("2.0", Some("vulkan")),
        Err(Error::UnsupportedApi("vulkan".to_string()))
    );
}

#[test]
fn test_glsl_minor_normalization() {
    let v = GlslVersion::parse("4.50").unwrap();
    assert_eq!((v.major, v.minor, v.api), (4, 5, Api::Glsl));

    let v = GlslVersion::parse("1.00 ES").unwrap();
    assert_eq!((v.major, v.minor, v.api), (1, 0, Api::Essl));

    let v = GlslVersion::parse("OpenGL ES GLSL ES 3.20").unwrap();
    assert_eq!((v.major, v.minor, v.api), (3, 2, Api::Essl));

    let v = GlslVersion::parse("4.6").unwrap();
    assert_eq!(v.minor, 6);
}

#[test]
fn test_glsl_api_override() {
    let v = GlslVersion::parse_with_api("3.0", Some("gles2")).unwrap();
    assert_eq!(v.api, Api::Essl);

    let v = GlslVersion::parse_with_api("3.00 ES", Some("gl")).unwrap();
    assert_eq!(v.api, Api::Glsl);

    assert_eq!(
        GlslVersion::parse_with_api("3.0", Some("bogus")),
        Err(Error::UnsupportedApi("bogus".to_string()))
    );
    // gles1 has no shading language.
    assert!(GlslVersion::parse_with_api("1.0", Some("gles1")).is_err());
}

#[test]
fn test_version_id() {
    assert_eq!(GlslVersion::parse("4.50").unwrap().version_id(), 450);
    assert_eq!(GlslVersion::parse("3.30").unwrap().version_id(), 330);
    assert_eq!(GlslVersion::parse("1.00 ES").unwrap().version_id(), 100);
    assert_eq!(KhronosVersion::new(4, 50, 0, Api::Gl).version_id(), 450);
    assert_eq!(KhronosVersion::new(4, 6, 0, Api::Gl).version_id(), 460);
}

#[test]
fn test_parse_rejects_unrepresentable_version() {
    assert_eq!(
        KhronosVersion::parse("50000000.1"),
        Err(Error::Malformed("50000000.1".to_string()))
    );
    assert!(KhronosVersion::parse("1.4294967295").is_err());
    assert!(GlslVersion::parse("50000000.10").is_err());
    assert_eq!(
        KhronosVersion::parse("42949672.0").unwrap().version_id(),
        4_294_967_200
    );
    assert_eq!(
        KhronosVersion::new(50_000_000, 1, 0, Api::Gl).version_id(),
        u32::MAX
    );
}

#[test]
fn test_directive() {
    assert_eq!(GlslVersion::parse("4.50").unwrap().directive(), "#version 450");
    assert_eq!(
        GlslVersion::parse("3.00 ES").unwrap().directive(),
        "#version 300 es"
    );
    assert_eq!(
        GlslVersion::parse("1.00 ES").unwrap().directive(),
        "#version 100"
    );
}

#[test]
fn test_ordering() {
    let a = KhronosVersion::new(3, 0, 0, Api::Gl);
    let b = KhronosVersion::new(4, 6, 0, Api::Gl);
    let es = KhronosVersion::new(3, 0, 0, Api::Gles2);
    assert!(a < b);
    assert!(b.at_least(4, 5));
    assert!(!a.at_least(3, 1));
    assert_eq!(a.partial_cmp(&es), None);
}

#[test]
fn test_display() {
    assert_eq!(KhronosVersion::new(4, 6, 0, Api::Gl).to_string(), "4.6");
    assert_eq!(KhronosVersion::new(3, 2, 1, Api::Gles2).to_string(), "3.2.1 ES");
    assert_eq!(GlslVersion::parse("4.60").unwrap().to_string(), "4.60");
    assert_eq!(GlslVersion::parse("3.00 ES").unwrap().to_string(), "3.00 ES");
}
