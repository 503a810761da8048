use std::fmt;
use std::str::FromStr;

/// Declared specification version of an extension, e.g. `3.0`.
///
/// Ordered by `(major, minor)` so capability checks are plain comparisons.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SpecVersion {
    pub major: u32,
    pub minor: u32,
}

impl SpecVersion {
    pub const V2_0: SpecVersion = SpecVersion::new(2, 0);
    pub const V3_0: SpecVersion = SpecVersion::new(3, 0);

    pub const fn new(major: u32, minor: u32) -> Self {
        Self { major, minor }
    }
}

impl fmt::Display for SpecVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.major, self.minor)
    }
}

/// Error parsing a [`SpecVersion`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvalidSpecVersion(pub String);

impl fmt::Display for InvalidSpecVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Invalid specification version \"{}\"", self.0)
    }
}

impl std::error::Error for InvalidSpecVersion {}

impl FromStr for SpecVersion {
    type Err = InvalidSpecVersion;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || InvalidSpecVersion(s.to_string());
        let trimmed = s.trim();
        let (major, minor) = match trimmed.split_once('.') {
            Some((major, minor)) => (major, minor),
            None => (trimmed, "0"),
        };
        Ok(Self {
            major: major.parse().map_err(|_| invalid())?,
            minor: minor.parse().map_err(|_| invalid())?,
        })
    }
}
