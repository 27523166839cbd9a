//! Argument paths and values for the tool's flag grammar
//!
//! The tool takes long-form `--hyphenated-flag [value]` flags with dotted
//! namespacing for nested configuration, e.g. `--pipeline.model.some-arg 3`.

use crate::staging::PathArg;
use std::fmt;
use std::path::PathBuf;

const VIEWER_PREFIX: &str = "viewer_";

/// A dotted flag name accumulated segment by segment
///
/// Both the raw form (as written by the caller) and the formatted form (as
/// the tool expects it) are kept. Extending returns a new path.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ArgumentPath {
    raw: Vec<String>,
    formatted: Vec<String>,
}

impl ArgumentPath {
    /// A path rooted at `segment`
    pub fn root(segment: &str) -> Self {
        Self::default().extend(segment)
    }

    /// A copy of this path with `segment` appended
    pub fn extend(&self, segment: &str) -> Self {
        let mut next = self.clone();
        let formatted = if next.raw.is_empty() {
            match segment.strip_prefix(VIEWER_PREFIX) {
                Some(rest) => format!("viewer.{}", hyphenate(rest)),
                None => hyphenate(segment),
            }
        } else {
            hyphenate(segment)
        };
        next.raw.push(segment.to_string());
        next.formatted.push(formatted);
        next
    }

    /// Segments joined with `.` as written
    pub fn raw(&self) -> String {
        self.raw.join(".")
    }

    /// Segments joined with `.` in the tool's flag syntax
    pub fn formatted(&self) -> String {
        self.formatted.join(".")
    }

    /// Whether no segment has been added
    pub fn is_empty(&self) -> bool {
        self.raw.is_empty()
    }

    /// The `--name` token; `keep_underscore` uses the raw segments
    pub fn flag(&self, keep_underscore: bool) -> String {
        if keep_underscore {
            format!("--{}", self.raw())
        } else {
            format!("--{}", self.formatted())
        }
    }
}

impl fmt::Display for ArgumentPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.formatted())
    }
}

fn hyphenate(segment: &str) -> String {
    segment.replace('_', "-")
}

/// Value supplied to an argument
#[derive(Debug, Clone, PartialEq)]
pub enum ArgValue {
    /// No value: only the flag token is emitted
    Absent,
    /// Emitted verbatim after the flag
    Literal(String),
    /// Staged first; the resolved path is emitted after the flag
    Path(PathArg),
}

impl From<PathArg> for ArgValue {
    fn from(path: PathArg) -> Self {
        ArgValue::Path(path)
    }
}

impl From<&str> for ArgValue {
    fn from(value: &str) -> Self {
        ArgValue::Literal(value.to_string())
    }
}

impl From<String> for ArgValue {
    fn from(value: String) -> Self {
        ArgValue::Literal(value)
    }
}

impl From<&String> for ArgValue {
    fn from(value: &String) -> Self {
        ArgValue::Literal(value.clone())
    }
}

/// Booleans use the capitalized literals the tool's parser accepts
impl From<bool> for ArgValue {
    fn from(value: bool) -> Self {
        ArgValue::Literal(if value { "True" } else { "False" }.to_string())
    }
}

/// Plain path buffers are passed as literals; wrap with
/// [`path`](crate::path) to stage them
impl From<PathBuf> for ArgValue {
    fn from(value: PathBuf) -> Self {
        ArgValue::Literal(value.to_string_lossy().into_owned())
    }
}

impl<T: Into<ArgValue>> From<Option<T>> for ArgValue {
    fn from(value: Option<T>) -> Self {
        value.map_or(ArgValue::Absent, Into::into)
    }
}

macro_rules! literal_from_display {
    ($($ty:ty),*) => {
        $(
            impl From<$ty> for ArgValue {
                fn from(value: $ty) -> Self {
                    ArgValue::Literal(value.to_string())
                }
            }
        )*
    };
}

literal_from_display!(i8, i16, i32, i64, isize, u8, u16, u32, u64, usize, f32, f64, char);
