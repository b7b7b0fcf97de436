use indexmap::IndexMap;
use std::fmt;

use super::McpParseError;
use super::version::{McpVersion, PROTOCOL_VERSION, VersionRange};

/// The package every MCP session starts with
pub const MCP_PACKAGE: &str = "mcp";

/// Packages the server advertised with `mcp-negotiate-can`
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    packages: IndexMap<String, VersionRange>,
}

impl Catalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, package: impl Into<String>, range: VersionRange) {
        let package = package.into().to_ascii_lowercase();
        tracing::debug!("Server offers {} {}", package, range);
        self.packages.insert(package, range);
    }

    pub fn get(&self, package: &str) -> Option<VersionRange> {
        if package == MCP_PACKAGE {
            return Some(VersionRange::new(PROTOCOL_VERSION, PROTOCOL_VERSION));
        }
        self.packages.get(package).copied()
    }

    pub fn contains(&self, package: &str) -> bool {
        self.get(package).is_some()
    }

    /// Advertised packages in the order the server sent them
    pub fn packages(&self) -> impl Iterator<Item = (&str, VersionRange)> {
        self.packages.iter().map(|(name, range)| (name.as_str(), *range))
    }

    pub fn len(&self) -> usize {
        self.packages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.packages.is_empty()
    }

    /// Split a full message name into `(package, message)`
    ///
    /// The longest known package that is the whole name, or a prefix of it
    /// followed by `-`, wins: with `mcp` and `mcp-negotiate` both known,
    /// `mcp-negotiate-can` resolves to `("mcp-negotiate", "can")`.
    pub fn resolve(&self, name: &str) -> Option<(String, String)> {
        std::iter::once(MCP_PACKAGE)
            .chain(self.packages.keys().map(String::as_str))
            .filter_map(|package| {
                if name == package {
                    Some((package, ""))
                } else {
                    name.strip_prefix(package)
                        .and_then(|rest| rest.strip_prefix('-'))
                        .filter(|message| !message.is_empty())
                        .map(|message| (package, message))
                }
            })
            .max_by_key(|(package, _)| package.len())
            .map(|(package, message)| (package.to_string(), message.to_string()))
    }
}

/// A package the client wants, with an optional explicit version range
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackageRequest {
    pub name: String,
    pub range: Option<VersionRange>,
}

impl PackageRequest {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            range: None,
        }
    }

    pub fn with_range(name: impl Into<String>, min: McpVersion, max: McpVersion) -> Self {
        Self {
            name: name.into(),
            range: Some(VersionRange::new(min, max)),
        }
    }

    /// `name` or `name:min:max`; split from the right
    pub fn parse(text: &str) -> Result<Self, McpParseError> {
        let invalid = || McpParseError::InvalidPackageRequest(text.to_string());

        let parts: Vec<&str> = text.trim().rsplitn(3, ':').collect();
        let request = match parts.as_slice() {
            [name] => Self::new(*name),
            [max, min, name] => {
                let min = McpVersion::parse(min).map_err(|_| invalid())?;
                let max = McpVersion::parse(max).map_err(|_| invalid())?;
                if min > max {
                    return Err(invalid());
                }
                Self::with_range(*name, min, max)
            }
            _ => return Err(invalid()),
        };

        if request.name.is_empty() || request.name.contains(char::is_whitespace) {
            return Err(invalid());
        }
        Ok(Self {
            name: request.name.to_ascii_lowercase(),
            ..request
        })
    }
}

impl fmt::Display for PackageRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.range {
            Some(range) => write!(f, "{}:{}:{}", self.name, range.min, range.max),
            None => write!(f, "{}", self.name),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn range(min: (u32, u32), max: (u32, u32)) -> VersionRange {
        VersionRange::new(McpVersion::new(min.0, min.1), McpVersion::new(max.0, max.1))
    }

    fn fuzzball_catalog() -> Catalog {
        let mut catalog = Catalog::new();
        catalog.record("mcp-negotiate", range((1, 0), (2, 0)));
        catalog.record("org-fuzzball-help", range((1, 0), (1, 0)));
        catalog.record("org-fuzzball-help-extra", range((1, 0), (1, 1)));
        catalog
    }

    #[test]
    fn test_mcp_is_always_known() {
        let catalog = Catalog::new();
        assert!(catalog.contains("mcp"));
        assert!(catalog.is_empty());
        assert_eq!(
            catalog.resolve("mcp"),
            Some(("mcp".to_string(), String::new()))
        );
    }

    #[test]
    fn test_longest_prefix_wins() {
        let catalog = fuzzball_catalog();

        assert_eq!(
            catalog.resolve("mcp-negotiate-can"),
            Some(("mcp-negotiate".to_string(), "can".to_string()))
        );
        assert_eq!(
            catalog.resolve("org-fuzzball-help-entry"),
            Some(("org-fuzzball-help".to_string(), "entry".to_string()))
        );
        assert_eq!(
            catalog.resolve("org-fuzzball-help-extra-more"),
            Some(("org-fuzzball-help-extra".to_string(), "more".to_string()))
        );
        assert_eq!(catalog.resolve("org-fuzzball-helpful"), None);
        assert_eq!(catalog.resolve("dns-com-awns-status"), None);
    }

    #[test]
    fn test_catalog_keeps_server_order() {
        let catalog = fuzzball_catalog();
        let names: Vec<&str> = catalog.packages().map(|(name, _)| name).collect();
        assert_eq!(
            names,
            vec!["mcp-negotiate", "org-fuzzball-help", "org-fuzzball-help-extra"]
        );
        assert_eq!(catalog.len(), 3);
    }

    #[test]
    fn test_package_request_parsing() {
        assert_eq!(
            PackageRequest::parse("org-fuzzball-help").unwrap(),
            PackageRequest::new("org-fuzzball-help")
        );

        let ranged = PackageRequest::parse("org-fuzzball-help:1.0:1.1").unwrap();
        assert_eq!(ranged.range, Some(range((1, 0), (1, 1))));
        assert_eq!(ranged.to_string(), "org-fuzzball-help:1.0:1.1");

        assert!(PackageRequest::parse("pkg:1.0").is_err());
        assert!(PackageRequest::parse("pkg:2.0:1.0").is_err());
        assert!(PackageRequest::parse(":1.0:1.0").is_err());
        assert!(PackageRequest::parse("").is_err());
    }
}
