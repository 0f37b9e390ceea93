//! # Version Ranges
//!
//! Semantic versions themselves come from the `semver` crate; this
//! module adds the range type used by dependency declarations and the
//! catalog. A [`VersionRange`] is a set of half-open intervals
//! `[low, high)`. Every range stored in the catalog is a single
//! interval; the type supports union so that richer requirements can
//! be expressed later without a schema break.
//!
//! Three textual forms are accepted:
//!
//! - explicit interval: `[1.2.0, 2.0.0)`
//! - caret ("restricted"): `^1.2.3`, meaning `[1.2.3, <next-incompatible>)`
//! - bare version: `1.2.3`, meaning `[1.2.3, 2.0.0)`

use std::fmt;

use semver::Version;

use crate::error::{Error, Result};

/// A half-open version interval `[low, high)`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Interval {
    pub low: Version,
    pub high: Version,
}

/// A set of disjoint, ordered half-open intervals.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VersionRange {
    intervals: Vec<Interval>,
}

/// The next major version after `v` (pre-release and build cleared).
pub fn next_major(v: &Version) -> Version {
    Version::new(v.major + 1, 0, 0)
}

/// The smallest version incompatible with `v` under caret semantics:
/// `^1.2.3 -> 2.0.0`, `^0.2.3 -> 0.3.0`, `^0.0.3 -> 0.0.4`.
pub fn next_incompatible(v: &Version) -> Version {
    if v.major > 0 {
        Version::new(v.major + 1, 0, 0)
    } else if v.minor > 0 {
        Version::new(0, v.minor + 1, 0)
    } else {
        Version::new(0, 0, v.patch + 1)
    }
}

/// Parse a version, mapping failures onto `invalid_version_string`.
pub fn parse_version(s: &str) -> Result<Version> {
    Version::parse(s.trim()).map_err(|_| Error::InvalidVersionString {
        string: s.to_string(),
    })
}

impl VersionRange {
    /// An empty range, satisfied by nothing.
    pub fn empty() -> Self {
        VersionRange { intervals: vec![] }
    }

    /// The single interval `[low, high)`. An inverted or zero-width
    /// pair produces the empty range.
    pub fn interval(low: Version, high: Version) -> Self {
        if low >= high {
            return Self::empty();
        }
        VersionRange {
            intervals: vec![Interval { low, high }],
        }
    }

    /// The range implied by a bare version: `[v, next-major)`.
    pub fn for_version(v: Version) -> Self {
        let high = next_major(&v);
        Self::interval(v, high)
    }

    /// The caret range for a version: `[v, next-incompatible)`.
    pub fn caret(v: Version) -> Self {
        let high = next_incompatible(&v);
        Self::interval(v, high)
    }

    /// Parse any of the accepted textual range forms.
    pub fn parse(s: &str) -> Result<Self> {
        let s = s.trim();
        if s.is_empty() {
            return Err(Error::InvalidVersionRangeString {
                string: s.to_string(),
            });
        }
        if s.starts_with('[') {
            return Self::parse_interval(s);
        }
        Self::parse_restricted(s)
    }

    /// Parse the restricted forms only: `^X.Y.Z` or a bare version.
    pub fn parse_restricted(s: &str) -> Result<Self> {
        let s = s.trim();
        if s.is_empty() {
            return Err(Error::InvalidVersionRangeString {
                string: s.to_string(),
            });
        }
        if let Some(rest) = s.strip_prefix('^') {
            let v = Version::parse(rest.trim()).map_err(|_| Error::InvalidVersionRangeString {
                string: s.to_string(),
            })?;
            return Ok(Self::caret(v));
        }
        let v = Version::parse(s).map_err(|_| Error::InvalidVersionRangeString {
            string: s.to_string(),
        })?;
        Ok(Self::for_version(v))
    }

    fn parse_interval(s: &str) -> Result<Self> {
        let invalid = || Error::InvalidVersionRangeString {
            string: s.to_string(),
        };
        let inner = s
            .strip_prefix('[')
            .and_then(|r| r.strip_suffix(')'))
            .ok_or_else(invalid)?;
        let (low_s, high_s) = inner.split_once(',').ok_or_else(invalid)?;
        let low = Version::parse(low_s.trim()).map_err(|_| invalid())?;
        let high = Version::parse(high_s.trim()).map_err(|_| invalid())?;
        if low >= high {
            return Err(invalid());
        }
        Ok(Self::interval(low, high))
    }

    /// Whether `v` lies inside any interval of this range.
    pub fn contains(&self, v: &Version) -> bool {
        self.intervals
            .iter()
            .any(|iv| *v >= iv.low && *v < iv.high)
    }

    pub fn is_empty(&self) -> bool {
        self.intervals.is_empty()
    }

    pub fn num_intervals(&self) -> usize {
        self.intervals.len()
    }

    pub fn iter_intervals(&self) -> impl Iterator<Item = &Interval> {
        self.intervals.iter()
    }

    /// The intersection of two ranges.
    pub fn intersection(&self, other: &VersionRange) -> VersionRange {
        let mut out = Vec::new();
        for a in &self.intervals {
            for b in &other.intervals {
                let low = std::cmp::max(&a.low, &b.low).clone();
                let high = std::cmp::min(&a.high, &b.high).clone();
                if low < high {
                    out.push(Interval { low, high });
                }
            }
        }
        VersionRange { intervals: out }.normalized()
    }

    /// The union of two ranges, with overlapping and adjacent
    /// intervals coalesced.
    pub fn union(&self, other: &VersionRange) -> VersionRange {
        let mut all = self.intervals.clone();
        all.extend(other.intervals.iter().cloned());
        VersionRange { intervals: all }.normalized()
    }

    fn normalized(mut self) -> Self {
        self.intervals
            .sort_by(|a, b| a.low.cmp(&b.low).then_with(|| a.high.cmp(&b.high)));
        let mut merged: Vec<Interval> = Vec::with_capacity(self.intervals.len());
        for iv in self.intervals {
            match merged.last_mut() {
                Some(last) if iv.low <= last.high => {
                    if iv.high > last.high {
                        last.high = iv.high;
                    }
                }
                _ => merged.push(iv),
            }
        }
        VersionRange { intervals: merged }
    }
}

impl fmt::Display for VersionRange {
    /// The canonical form: a bare version when the range is exactly the
    /// implied-major range of its low bound, a caret form when it is
    /// exactly the caret range, and the explicit interval otherwise.
    /// All single-interval renderings parse back to an equal range.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.intervals.is_empty() {
            return write!(f, "[0.0.0, 0.0.0)");
        }
        let parts: Vec<String> = self
            .intervals
            .iter()
            .map(|iv| {
                if iv.high == next_incompatible(&iv.low) {
                    format!("^{}", iv.low)
                } else if iv.high == next_major(&iv.low) {
                    iv.low.to_string()
                } else {
                    format!("[{}, {})", iv.low, iv.high)
                }
            })
            .collect();
        write!(f, "{}", parts.join(" || "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn v(s: &str) -> Version {
        Version::parse(s).unwrap()
    }

    #[test]
    fn test_parse_bare_version() {
        let r = VersionRange::parse("1.2.3").unwrap();
        assert_eq!(r, VersionRange::interval(v("1.2.3"), v("2.0.0")));
        assert!(r.contains(&v("1.2.3")));
        assert!(r.contains(&v("1.9.0")));
        assert!(!r.contains(&v("2.0.0")));
        assert!(!r.contains(&v("1.2.2")));
    }

    #[test]
    fn test_parse_caret() {
        let r = VersionRange::parse("^1.2.3").unwrap();
        assert_eq!(r, VersionRange::interval(v("1.2.3"), v("2.0.0")));

        let r = VersionRange::parse("^0.2.3").unwrap();
        assert_eq!(r, VersionRange::interval(v("0.2.3"), v("0.3.0")));

        let r = VersionRange::parse("^0.0.3").unwrap();
        assert_eq!(r, VersionRange::interval(v("0.0.3"), v("0.0.4")));
    }

    #[test]
    fn test_parse_explicit_interval() {
        let r = VersionRange::parse("[1.0.0, 1.5.0)").unwrap();
        assert!(r.contains(&v("1.0.0")));
        assert!(r.contains(&v("1.4.9")));
        assert!(!r.contains(&v("1.5.0")));
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!(VersionRange::parse("").is_err());
        assert!(VersionRange::parse("  ").is_err());
        assert!(VersionRange::parse("[1.0.0]").is_err());
        assert!(VersionRange::parse("[2.0.0, 1.0.0)").is_err());
        assert!(VersionRange::parse("^banana").is_err());
        assert!(VersionRange::parse("1.2").is_err());
    }

    #[test]
    fn test_display_roundtrip() {
        for s in ["1.2.3", "^0.2.3", "[1.0.0, 1.5.0)"] {
            let r = VersionRange::parse(s).unwrap();
            let r2 = VersionRange::parse(&r.to_string()).unwrap();
            assert_eq!(r, r2, "round-trip failed for {s}");
        }
    }

    #[test]
    fn test_intersection() {
        let a = VersionRange::interval(v("1.0.0"), v("2.0.0"));
        let b = VersionRange::interval(v("1.5.0"), v("3.0.0"));
        assert_eq!(
            a.intersection(&b),
            VersionRange::interval(v("1.5.0"), v("2.0.0"))
        );

        let c = VersionRange::interval(v("2.0.0"), v("3.0.0"));
        assert!(a.intersection(&c).is_empty());
    }

    #[test]
    fn test_union_coalesces() {
        let a = VersionRange::interval(v("1.0.0"), v("1.5.0"));
        let b = VersionRange::interval(v("1.4.0"), v("2.0.0"));
        let u = a.union(&b);
        assert_eq!(u, VersionRange::interval(v("1.0.0"), v("2.0.0")));

        let c = VersionRange::interval(v("3.0.0"), v("4.0.0"));
        let u2 = a.union(&c);
        assert_eq!(u2.num_intervals(), 2);
    }

    #[test]
    fn test_prerelease_ordering_inside_interval() {
        let r = VersionRange::interval(v("1.0.0"), v("2.0.0"));
        assert!(!r.contains(&v("1.0.0-alpha")));
        assert!(r.contains(&v("1.0.1-alpha")));
    }
}
