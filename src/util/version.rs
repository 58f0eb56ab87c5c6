//! Engine version strings such as `2019.4.1f1` or `5.6.7p3`.

use std::fmt;

/// Parsed engine version. Ordering compares major, minor, then patch.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct EngineVersion {
    pub major: u32,
    pub minor: u32,
    pub patch: u32,
}

impl EngineVersion {
    pub const fn new(major: u32, minor: u32, patch: u32) -> Self {
        Self { major, minor, patch }
    }

    /// Parse the leading digits of each dotted component.
    ///
    /// Suffixes like `f1` are ignored, missing components default to zero.
    /// Returns `None` when the major component has no digits at all.
    pub fn parse(text: &str) -> Option<Self> {
        let mut parts = text.trim().split('.').map(leading_number);
        let major = parts.next().flatten()?;
        let minor = parts.next().flatten().unwrap_or(0);
        let patch = parts.next().flatten().unwrap_or(0);
        Some(Self { major, minor, patch })
    }

    /// True when this version is at least `major.minor`.
    #[inline]
    pub fn at_least(&self, major: u32, minor: u32) -> bool {
        (self.major, self.minor) >= (major, minor)
    }

    /// True for the placeholder `0.0.0` stripped builds write.
    #[inline]
    pub fn is_unknown(&self) -> bool {
        self.major == 0
    }
}

fn leading_number(part: &str) -> Option<u32> {
    let end = part.find(|c: char| !c.is_ascii_digit()).unwrap_or(part.len());
    part[..end].parse().ok()
}

impl fmt::Display for EngineVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)
    }
}
