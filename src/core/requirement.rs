//
//  Copyright (C) 2022-2024  Chase Ruskin
//
//  This program is free software: you can redistribute it and/or modify
//  it under the terms of the GNU General Public License as published by
//  the Free Software Foundation, either version 3 of the License, or
//  (at your option) any later version.
//
//  This program is distributed in the hope that it will be useful,
//  but WITHOUT ANY WARRANTY; without even the implied warranty of
//  MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
//  GNU General Public License for more details.
//
//  You should have received a copy of the GNU General Public License
//  along with this program.  If not, see <http://www.gnu.org/licenses/>.
//

//! A `requirement` restricts which bindings of a package a dependent accepts.

use crate::core::source::Binding;
use crate::core::version::{Version, VersionError};
use std::cmp::Ordering;
use std::fmt::Display;
use std::str::FromStr;

/// A set of versions between a lower (inclusive) and an upper bound.
#[derive(Debug, PartialEq, Eq, Clone, Hash)]
pub struct VersionRange {
    lower: Version,
    upper: Version,
    upper_inclusive: bool,
}

impl VersionRange {
    pub fn new(lower: Version, upper: Version, upper_inclusive: bool) -> Result<Self, RequirementError> {
        let empty = match lower.cmp_precedence(&upper) {
            Ordering::Less => false,
            Ordering::Equal => upper_inclusive == false,
            Ordering::Greater => true,
        };
        if empty == true {
            return Err(RequirementError::EmptyRange(lower.to_string(), upper.to_string()));
        }
        Ok(Self {
            lower,
            upper,
            upper_inclusive,
        })
    }

    /// Creates the range `[v, next major)`.
    pub fn up_to_next_major(v: Version) -> Result<Self, RequirementError> {
        let upper = match v.next_major() {
            Some(u) => u,
            None => return Err(RequirementError::NoNextMajor(v.to_string())),
        };
        Ok(Self {
            lower: v,
            upper,
            upper_inclusive: false,
        })
    }

    pub fn get_lower(&self) -> &Version {
        &self.lower
    }

    pub fn get_upper(&self) -> &Version {
        &self.upper
    }

    pub fn is_upper_inclusive(&self) -> bool {
        self.upper_inclusive
    }

    /// Checks if `v` falls within the range.
    ///
    /// A pre-release is only accepted when one of the bounds is a pre-release
    /// of the same `major.minor.patch`.
    pub fn contains(&self, v: &Version) -> bool {
        if v.is_prerelease() == true {
            let opted_in = (self.lower.is_prerelease() && self.lower.same_release(v))
                || (self.upper.is_prerelease() && self.upper.same_release(v));
            if opted_in == false {
                return false;
            }
        }
        let above = v.cmp_precedence(&self.lower) != Ordering::Less;
        let below = match v.cmp_precedence(&self.upper) {
            Ordering::Less => true,
            Ordering::Equal => self.upper_inclusive,
            Ordering::Greater => false,
        };
        above && below
    }
}

impl Display for VersionRange {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "[{}, {}{}",
            self.lower,
            self.upper,
            match self.upper_inclusive {
                true => ']',
                false => ')',
            }
        )
    }
}

/// The constraint a dependent places on a package.
#[derive(Debug, PartialEq, Eq, Clone, Hash)]
pub enum Requirement {
    Exact(Version),
    Range(VersionRange),
    Branch(String),
    Revision(String),
}

impl Requirement {
    /// Checks if the requirement is answered by a version search.
    pub fn is_version(&self) -> bool {
        match self {
            Self::Exact(_) | Self::Range(_) => true,
            Self::Branch(_) | Self::Revision(_) => false,
        }
    }

    /// Checks if `v` satisfies a version requirement.
    ///
    /// Branch and revision requirements never accept a tagged version.
    pub fn allows_version(&self, v: &Version) -> bool {
        match self {
            // build metadata has no say in precedence
            Self::Exact(e) => e.cmp_precedence(v) == Ordering::Equal,
            Self::Range(r) => r.contains(v),
            Self::Branch(_) | Self::Revision(_) => false,
        }
    }

    /// Checks if the chosen `binding` satisfies this requirement.
    ///
    /// An edited binding satisfies every requirement.
    pub fn allows(&self, binding: &Binding) -> bool {
        match (self, binding) {
            (_, Binding::Edited(_)) => true,
            (_, Binding::Version(v)) => self.allows_version(v),
            (Self::Branch(a), Binding::Branch(b)) => a == b,
            (Self::Revision(a), Binding::Revision(b)) => a == b,
            _ => false,
        }
    }
}

impl FromStr for Requirement {
    type Err = RequirementError;

    /// Parses the textual version forms: `=1.2.3`, `[1.0.0, 2.0.0)`,
    /// `[1.0.0, 2.0.0]`, and a bare `1.2.3` meaning up to the next major.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if let Some(exact) = s.strip_prefix('=') {
            return Ok(Self::Exact(Version::from_str(exact)?));
        }
        if let Some(inner) = s.strip_prefix('[') {
            let (inner, inclusive) = if let Some(i) = inner.strip_suffix(')') {
                (i, false)
            } else if let Some(i) = inner.strip_suffix(']') {
                (i, true)
            } else {
                return Err(RequirementError::UnclosedRange(s.to_string()));
            };
            let (lower, upper) = match inner.split_once(',') {
                Some(pair) => pair,
                None => return Err(RequirementError::MissingUpperBound(s.to_string())),
            };
            return Ok(Self::Range(VersionRange::new(
                Version::from_str(lower)?,
                Version::from_str(upper)?,
                inclusive,
            )?));
        }
        Ok(Self::Range(VersionRange::up_to_next_major(Version::from_str(s)?)?))
    }
}

impl Display for Requirement {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Exact(v) => write!(f, "={}", v),
            Self::Range(r) => write!(f, "{}", r),
            Self::Branch(b) => write!(f, "branch {}", b),
            Self::Revision(r) => write!(f, "revision {}", r),
        }
    }
}

#[derive(Debug, PartialEq, Clone, thiserror::Error)]
pub enum RequirementError {
    #[error("{0}")]
    BadVersion(#[from] VersionError),
    #[error("range {0:?} is missing its closing bracket")]
    UnclosedRange(String),
    #[error("range {0:?} is missing an upper bound")]
    MissingUpperBound(String),
    #[error("range from {0} to {1} contains no versions")]
    EmptyRange(String, String),
    #[error("version {0} has no next major release")]
    NoNextMajor(String),
}

#[cfg(test)]
mod test {
    use super::*;

    fn v(s: &str) -> Version {
        Version::from_str(s).unwrap()
    }

    fn req(s: &str) -> Requirement {
        Requirement::from_str(s).unwrap()
    }

    #[test]
    fn from_str() {
        assert_eq!(req("=1.2.3"), Requirement::Exact(v("1.2.3")));
        assert_eq!(
            req("[1.0.0, 2.0.0)"),
            Requirement::Range(VersionRange::new(v("1.0.0"), v("2.0.0"), false).unwrap())
        );
        assert_eq!(
            req("[1.0.0,1.0.0]"),
            Requirement::Range(VersionRange::new(v("1.0.0"), v("1.0.0"), true).unwrap())
        );
        assert_eq!(req("1.2.3").to_string(), "[1.2.3, 2.0.0)");
        assert_eq!(req("0.4.1").to_string(), "[0.4.1, 0.5.0)");

        assert!(Requirement::from_str("[1.0.0, 2.0.0").is_err());
        assert!(Requirement::from_str("[1.0.0)").is_err());
        assert_eq!(
            Requirement::from_str("[2.0.0, 1.0.0)"),
            Err(RequirementError::EmptyRange("2.0.0".to_string(), "1.0.0".to_string()))
        );
        assert!(Requirement::from_str("[1.0.0, 1.0.0)").is_err());
        assert!(Requirement::from_str("=abc").is_err());
    }

    #[test]
    fn largest_version_has_no_next_major() {
        assert_eq!(
            Requirement::from_str("18446744073709551615.0.0"),
            Err(RequirementError::NoNextMajor("18446744073709551615.0.0".to_string()))
        );
        assert!(Requirement::from_str("0.18446744073709551615.0").is_err());
        // an explicit range still reaches the top
        assert!(Requirement::from_str("=18446744073709551615.0.0").is_ok());
    }

    #[test]
    fn range_bounds() {
        let r = req("[1.0.0, 2.0.0)");
        assert_eq!(r.allows_version(&v("1.0.0")), true);
        assert_eq!(r.allows_version(&v("1.9.9")), true);
        assert_eq!(r.allows_version(&v("2.0.0")), false);
        assert_eq!(r.allows_version(&v("0.9.0")), false);
        let r = req("[1.0.0, 2.0.0]");
        assert_eq!(r.allows_version(&v("2.0.0")), true);
        assert_eq!(r.allows_version(&v("1.0.0+meta")), true);
    }

    #[test]
    fn prerelease_policy() {
        // not opted in
        let r = req("[1.0.0, 3.0.0)");
        assert_eq!(r.allows_version(&v("2.0.0-beta.1")), false);
        // lower bound opts in pre-releases of 2.0.0 only
        let r = req("[2.0.0-alpha, 3.0.0)");
        assert_eq!(r.allows_version(&v("2.0.0-beta.1")), true);
        assert_eq!(r.allows_version(&v("2.1.0-beta.1")), false);
        assert_eq!(r.allows_version(&v("2.1.0")), true);
        // upper bound that is a pre-release
        let r = req("[1.0.0, 2.0.0-rc.2]");
        assert_eq!(r.allows_version(&v("2.0.0-rc.1")), true);
        assert_eq!(r.allows_version(&v("2.0.0-rc.3")), false);
        assert_eq!(r.allows_version(&v("2.0.0")), false);
        // exact requirement only accepts its own version
        let r = req("=1.0.0-rc.1");
        assert_eq!(r.allows_version(&v("1.0.0-rc.1")), true);
        assert_eq!(r.allows_version(&v("1.0.0")), false);
    }

    #[test]
    fn allows_bindings() {
        let r = req("1.0.0");
        assert_eq!(r.allows(&Binding::Version(v("1.4.0"))), true);
        assert_eq!(r.allows(&Binding::Branch("main".to_string())), false);
        assert_eq!(r.allows(&Binding::Edited("Packages/a".into())), true);

        let b = Requirement::Branch("main".to_string());
        assert_eq!(b.allows(&Binding::Branch("main".to_string())), true);
        assert_eq!(b.allows(&Binding::Branch("dev".to_string())), false);
        assert_eq!(b.allows(&Binding::Version(v("1.0.0"))), false);
        assert_eq!(b.is_version(), false);

        let rev = Requirement::Revision("4f3c2a1".to_string());
        assert_eq!(rev.allows(&Binding::Revision("4f3c2a1".to_string())), true);
        assert_eq!(rev.to_string(), "revision 4f3c2a1");
    }
}
