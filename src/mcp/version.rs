use std::fmt;
use std::str::FromStr;

use super::McpParseError;

/// The only MCP protocol version this client speaks
pub const PROTOCOL_VERSION: McpVersion = McpVersion::new(2, 1);

/// An MCP version number, `major.minor`
///
/// Ordering compares the major number first, then the minor one, so
/// `1.10` is newer than `1.9`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct McpVersion {
    pub major: u32,
    pub minor: u32,
}

impl McpVersion {
    pub const fn new(major: u32, minor: u32) -> Self {
        Self { major, minor }
    }

    pub fn parse(text: &str) -> Result<Self, McpParseError> {
        let invalid = || McpParseError::InvalidVersion(text.to_string());

        let (major, minor) = text.trim().split_once('.').ok_or_else(invalid)?;
        let major = major.parse().map_err(|_| invalid())?;
        let minor = minor.parse().map_err(|_| invalid())?;
        Ok(Self::new(major, minor))
    }
}

impl fmt::Display for McpVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.major, self.minor)
    }
}

impl FromStr for McpVersion {
    type Err = McpParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

/// Inclusive version range, as advertised in `mcp-negotiate-can`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct VersionRange {
    pub min: McpVersion,
    pub max: McpVersion,
}

impl VersionRange {
    pub fn new(min: McpVersion, max: McpVersion) -> Self {
        Self { min, max }
    }

    pub fn contains(&self, version: McpVersion) -> bool {
        self.min <= version && version <= self.max
    }

    /// The overlap of two ranges, if any
    pub fn intersect(&self, other: &VersionRange) -> Option<VersionRange> {
        let min = self.min.max(other.min);
        let max = self.max.min(other.max);
        (min <= max).then_some(VersionRange { min, max })
    }
}

impl fmt::Display for VersionRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} to {}", self.min, self.max)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_and_display() {
        let version = McpVersion::parse("2.1").unwrap();
        assert_eq!(version, PROTOCOL_VERSION);
        assert_eq!(version.to_string(), "2.1");

        assert!(McpVersion::parse("2").is_err());
        assert!(McpVersion::parse("two.one").is_err());
        assert!(McpVersion::parse("").is_err());
    }

    #[test]
    fn test_ordering_is_numeric() {
        assert!(McpVersion::new(1, 10) > McpVersion::new(1, 9));
        assert!(McpVersion::new(2, 0) > McpVersion::new(1, 99));
        assert_eq!("1.0".parse::<McpVersion>().unwrap(), McpVersion::new(1, 0));
    }

    #[test]
    fn test_range_intersection() {
        let server = VersionRange::new(McpVersion::new(1, 0), McpVersion::new(2, 0));
        let client = VersionRange::new(McpVersion::new(1, 5), McpVersion::new(3, 0));

        let overlap = server.intersect(&client).unwrap();
        assert_eq!(overlap.min, McpVersion::new(1, 5));
        assert_eq!(overlap.max, McpVersion::new(2, 0));
        assert!(overlap.contains(McpVersion::new(1, 7)));
        assert!(!overlap.contains(McpVersion::new(2, 1)));

        let disjoint = VersionRange::new(McpVersion::new(3, 1), McpVersion::new(4, 0));
        assert!(server.intersect(&disjoint).is_none());
    }
}
