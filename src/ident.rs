//! Package identity and dependency declarations.
//!
//! A [`PackageId`] is a `(name, version)` pair written `name@version`;
//! `parse` and `Display` round-trip. A [`Dependency`] pairs a package
//! name with a [`VersionRange`], written `name@<range>`.

use std::fmt;

use semver::Version;

use crate::error::{Error, Result};
use crate::version::{parse_version, VersionRange};

/// A unique package ID: a simple name-version pair.
///
/// Ordering is lexicographic on `(name, version)`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PackageId {
    /// The name of the package
    pub name: String,
    /// The version of the package
    pub version: Version,
}

impl PackageId {
    pub fn new(name: impl Into<String>, version: Version) -> Self {
        PackageId {
            name: name.into(),
            version,
        }
    }

    /// Parse the textual `name@version` form.
    pub fn parse(s: &str) -> Result<Self> {
        let (name, version_str) = s.split_once('@').ok_or_else(|| Error::InvalidPkgName {
            name: s.to_string(),
            message: "a package ID must be of the form <name>@<version>".to_string(),
        })?;
        if name.is_empty() {
            return Err(Error::InvalidPkgName {
                name: s.to_string(),
                message: "the package name may not be empty".to_string(),
            });
        }
        let version = parse_version(version_str)?;
        Ok(PackageId {
            name: name.to_string(),
            version,
        })
    }
}

impl fmt::Display for PackageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.name, self.version)
    }
}

/// A dependency declaration: a package name and an acceptable range.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dependency {
    pub name: String,
    pub versions: VersionRange,
}

impl Dependency {
    pub fn new(name: impl Into<String>, versions: VersionRange) -> Self {
        Dependency {
            name: name.into(),
            versions,
        }
    }

    /// Parse a dependency string: `name@1.2.3`, `name@^1.2.3`, or
    /// `name@[low, high)`.
    pub fn parse_depends_string(s: &str) -> Result<Self> {
        let (name, range_str) = s.split_once('@').ok_or_else(|| Error::InvalidPkgName {
            name: s.to_string(),
            message: "a dependency must be of the form <name>@<version-range>".to_string(),
        })?;
        if name.is_empty() {
            return Err(Error::InvalidPkgName {
                name: s.to_string(),
                message: "the package name may not be empty".to_string(),
            });
        }
        let versions = VersionRange::parse(range_str)?;
        Ok(Dependency {
            name: name.to_string(),
            versions,
        })
    }
}

impl fmt::Display for Dependency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.name, self.versions)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn v(s: &str) -> Version {
        Version::parse(s).unwrap()
    }

    #[test]
    fn test_parse_package_id() {
        let id = PackageId::parse("foo@1.2.3").unwrap();
        assert_eq!(id.name, "foo");
        assert_eq!(id.version, v("1.2.3"));
    }

    #[test]
    fn test_package_id_roundtrip() {
        for s in ["foo@1.2.3", "my-lib@0.1.0", "x@2.0.0-beta.1"] {
            let id = PackageId::parse(s).unwrap();
            assert_eq!(PackageId::parse(&id.to_string()).unwrap(), id);
            assert_eq!(id.to_string(), s);
        }
    }

    #[test]
    fn test_parse_package_id_rejects() {
        assert!(PackageId::parse("no-at-sign").is_err());
        assert!(PackageId::parse("@1.2.3").is_err());
        assert!(PackageId::parse("foo@not.a.version").is_err());
    }

    #[test]
    fn test_package_id_ordering() {
        let a1 = PackageId::parse("a@1.0.0").unwrap();
        let a2 = PackageId::parse("a@2.0.0").unwrap();
        let b1 = PackageId::parse("b@0.1.0").unwrap();
        assert!(a1 < a2);
        assert!(a2 < b1);
    }

    #[test]
    fn test_parse_depends_string() {
        let d = Dependency::parse_depends_string("foo@^1.2.0").unwrap();
        assert_eq!(d.name, "foo");
        assert!(d.versions.contains(&v("1.4.0")));
        assert!(!d.versions.contains(&v("2.0.0")));

        let d = Dependency::parse_depends_string("bar@[1.0.0, 1.2.0)").unwrap();
        assert!(d.versions.contains(&v("1.1.9")));
        assert!(!d.versions.contains(&v("1.2.0")));
    }

    #[test]
    fn test_depends_string_roundtrip() {
        for s in ["foo@1.2.3", "bar@^0.4.0", "baz@[1.0.0, 1.5.0)"] {
            let d = Dependency::parse_depends_string(s).unwrap();
            let d2 = Dependency::parse_depends_string(&d.to_string()).unwrap();
            assert_eq!(d, d2, "round-trip failed for {s}");
        }
    }

    #[test]
    fn test_depends_string_rejects() {
        assert!(Dependency::parse_depends_string("foo").is_err());
        assert!(Dependency::parse_depends_string("foo@").is_err());
        assert!(Dependency::parse_depends_string("@^1.0.0").is_err());
    }
}
