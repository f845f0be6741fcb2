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

//! A `version` contains numeric values at 3 levels for informing about
//! varying degrees of changes within a project's lifetime, optionally followed
//! by pre-release identifiers and build metadata.

use serde::de::{self};
use serde::Serializer;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::fmt::Display;
use std::num::ParseIntError;
use std::str::FromStr;

type VerNum = u64;

/// A single dot-separated pre-release identifier.
#[derive(Debug, PartialEq, Eq, Clone, Hash)]
pub enum PreId {
    Numeric(VerNum),
    Alpha(String),
}

impl PartialOrd for PreId {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for PreId {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (Self::Numeric(a), Self::Numeric(b)) => a.cmp(b),
            // numeric identifiers always have lower precedence than alphanumeric ones
            (Self::Numeric(_), Self::Alpha(_)) => Ordering::Less,
            (Self::Alpha(_), Self::Numeric(_)) => Ordering::Greater,
            (Self::Alpha(a), Self::Alpha(b)) => a.cmp(b),
        }
    }
}

impl Display for PreId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Numeric(n) => write!(f, "{}", n),
            Self::Alpha(s) => write!(f, "{}", s),
        }
    }
}

impl FromStr for PreId {
    type Err = VersionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.is_empty() == true {
            return Err(VersionError::EmptyIdentifier);
        }
        if let Some(c) = s.chars().find(|c| c.is_ascii_alphanumeric() == false && c != &'-') {
            return Err(VersionError::InvalidIdentifier(s.to_string(), c));
        }
        match s.chars().all(|c| c.is_ascii_digit()) {
            true => Ok(Self::Numeric(s.parse::<VerNum>()?)),
            false => Ok(Self::Alpha(s.to_string())),
        }
    }
}

#[derive(Debug, PartialEq, Clone, Eq, Hash)]
pub struct Version {
    major: VerNum,
    minor: VerNum,
    patch: VerNum,
    pre: Vec<PreId>,
    build: Option<String>,
}

impl Version {
    pub fn new() -> Self {
        Version {
            major: 0,
            minor: 0,
            patch: 0,
            pre: Vec::new(),
            build: None,
        }
    }

    pub fn major(mut self, m: VerNum) -> Self {
        self.major = m;
        self
    }

    pub fn minor(mut self, m: VerNum) -> Self {
        self.minor = m;
        self
    }

    pub fn patch(mut self, p: VerNum) -> Self {
        self.patch = p;
        self
    }

    /// Sets the pre-release identifiers from their dotted form (`alpha.1`).
    pub fn pre(mut self, s: &str) -> Result<Self, VersionError> {
        self.pre = s
            .split('.')
            .map(|p| PreId::from_str(p))
            .collect::<Result<Vec<PreId>, VersionError>>()?;
        Ok(self)
    }

    /// Sets the build metadata.
    pub fn build(mut self, s: &str) -> Result<Self, VersionError> {
        if s.is_empty() == true {
            return Err(VersionError::EmptyIdentifier);
        }
        if let Some(c) = s
            .chars()
            .find(|c| c.is_ascii_alphanumeric() == false && c != &'-' && c != &'.')
        {
            return Err(VersionError::InvalidIdentifier(s.to_string(), c));
        }
        self.build = Some(s.to_string());
        Ok(self)
    }

    pub fn get_major(&self) -> VerNum {
        self.major
    }

    pub fn get_minor(&self) -> VerNum {
        self.minor
    }

    pub fn get_patch(&self) -> VerNum {
        self.patch
    }

    pub fn get_pre(&self) -> &Vec<PreId> {
        &self.pre
    }

    pub fn get_build(&self) -> Option<&String> {
        self.build.as_ref()
    }

    pub fn is_prerelease(&self) -> bool {
        self.pre.is_empty() == false
    }

    /// Checks if `self` and `other` share the same `major.minor.patch` triple.
    pub fn same_release(&self, other: &Version) -> bool {
        self.major == other.major && self.minor == other.minor && self.patch == other.patch
    }

    /// Returns the first version of the next major release.
    ///
    /// For `0.y.z` versions the minor level acts as the major level. Returns
    /// `None` when the level is already at its maximum.
    pub fn next_major(&self) -> Option<Version> {
        match self.major {
            0 => Some(Version::new().minor(self.minor.checked_add(1)?)),
            _ => Some(Version::new().major(self.major.checked_add(1)?)),
        }
    }

    /// Compares by semantic versioning precedence, ignoring build metadata.
    pub fn cmp_precedence(&self, other: &Version) -> Ordering {
        match (self.major, self.minor, self.patch).cmp(&(other.major, other.minor, other.patch)) {
            Ordering::Equal => (),
            ord => return ord,
        }
        match (self.pre.is_empty(), other.pre.is_empty()) {
            (true, true) => Ordering::Equal,
            // a release outranks any of its pre-releases
            (true, false) => Ordering::Greater,
            (false, true) => Ordering::Less,
            (false, false) => self.pre.cmp(&other.pre),
        }
    }

    /// Orders two candidates from most preferred to least preferred.
    ///
    /// Higher precedence comes first. Between versions of equal precedence
    /// (differing only in build metadata), the one without metadata comes
    /// first, then metadata in ascending lexicographic order.
    pub fn cmp_preference(&self, other: &Version) -> Ordering {
        match other.cmp_precedence(self) {
            Ordering::Equal => match (&self.build, &other.build) {
                (None, None) => Ordering::Equal,
                (None, Some(_)) => Ordering::Less,
                (Some(_), None) => Ordering::Greater,
                (Some(a), Some(b)) => a.cmp(b),
            },
            ord => ord,
        }
    }
}

impl PartialOrd for Version {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Version {
    /// Total ordering: precedence first, build metadata breaks the remaining ties.
    fn cmp(&self, other: &Self) -> Ordering {
        match self.cmp_precedence(other) {
            Ordering::Equal => self.build.cmp(&other.build),
            ord => ord,
        }
    }
}

impl FromStr for Version {
    type Err = VersionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        use VersionError::*;

        let s = s.trim();
        // tags are commonly written as `v1.2.3`
        let s = s.strip_prefix('v').unwrap_or(s);
        if s.is_empty() {
            return Err(EmptyVersion);
        }
        // separate the build metadata and then the pre-release identifiers
        let (s, build) = match s.split_once('+') {
            Some((core, b)) => (core, Some(b)),
            None => (s, None),
        };
        let (core, pre) = match s.split_once('-') {
            Some((core, p)) => (core, Some(p)),
            None => (s, None),
        };

        let mut levels = core.split_terminator('.').map(|p| {
            if p.is_empty() == true || p.chars().all(|c| c.is_ascii_digit()) == false {
                Err(InvalidDigit(p.to_string()))
            } else {
                Ok(p.parse::<VerNum>()?)
            }
        });
        let mut version = Version::new()
            .major(match levels.next() {
                Some(v) => v?,
                None => return Err(MissingMajor),
            })
            .minor(match levels.next() {
                Some(v) => v?,
                None => return Err(MissingMinor),
            })
            .patch(match levels.next() {
                Some(v) => v?,
                None => return Err(MissingPatch),
            });
        if levels.next().is_some() {
            return Err(ExtraLevels(4 + levels.count()));
        }
        if core.ends_with('.') == true {
            return Err(MissingPatch);
        }
        if let Some(p) = pre {
            version = version.pre(p)?;
        }
        if let Some(b) = build {
            version = version.build(b)?;
        }
        Ok(version)
    }
}

impl Display for Version {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> Result<(), std::fmt::Error> {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)?;
        if self.pre.is_empty() == false {
            let pre: Vec<String> = self.pre.iter().map(|p| p.to_string()).collect();
            write!(f, "-{}", pre.join("."))?;
        }
        if let Some(b) = &self.build {
            write!(f, "+{}", b)?;
        }
        Ok(())
    }
}

impl<'de> Deserialize<'de> for Version {
    fn deserialize<D>(deserializer: D) -> Result<Version, D::Error>
    where
        D: de::Deserializer<'de>,
    {
        struct LayerVisitor;

        impl<'de> de::Visitor<'de> for LayerVisitor {
            type Value = Version;

            fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
                formatter.write_str("a semantic version number")
            }

            fn visit_str<E>(self, v: &str) -> Result<Self::Value, E>
            where
                E: de::Error,
            {
                match Version::from_str(v) {
                    Ok(v) => Ok(v),
                    Err(e) => Err(de::Error::custom(e)),
                }
            }
        }

        deserializer.deserialize_str(LayerVisitor)
    }
}

impl Serialize for Version {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}

#[derive(Debug, PartialEq, Clone, thiserror::Error)]
pub enum VersionError {
    #[error("empty version")]
    EmptyVersion,
    #[error("missing major number")]
    MissingMajor,
    #[error("missing minor number")]
    MissingMinor,
    #[error("missing patch number")]
    MissingPatch,
    #[error("too many version positions; found {0} expected 3")]
    ExtraLevels(usize),
    #[error("invalid digit in version level {0:?}")]
    InvalidDigit(String),
    #[error("empty pre-release or build identifier")]
    EmptyIdentifier,
    #[error("identifier {0:?} contains invalid character {1:?}")]
    InvalidIdentifier(String, char),
}

impl From<ParseIntError> for VersionError {
    fn from(e: ParseIntError) -> Self {
        VersionError::InvalidDigit(e.to_string())
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn v(s: &str) -> Version {
        Version::from_str(s).unwrap()
    }

    #[test]
    fn new() {
        let ver: Version = Version::new();
        assert_eq!(ver.to_string(), "0.0.0");
        let ver = ver.major(1).minor(2).patch(3);
        assert_eq!(ver, v("1.2.3"));
        assert_eq!(ver.get_major(), 1);
        assert_eq!(ver.get_minor(), 2);
        assert_eq!(ver.get_patch(), 3);
    }

    #[test]
    fn from_str() {
        // valid cases
        assert_eq!(v("19.4.73"), Version::new().major(19).minor(4).patch(73));
        assert_eq!(v("019.004.073"), Version::new().major(19).minor(4).patch(73));
        assert_eq!(v("v1.0.0"), Version::new().major(1));
        assert_eq!(
            v("1.0.0-alpha.1"),
            Version::new().major(1).pre("alpha.1").unwrap()
        );
        assert_eq!(
            v("1.0.0-rc.1+build.5"),
            Version::new()
                .major(1)
                .pre("rc.1")
                .unwrap()
                .build("build.5")
                .unwrap()
        );
        // invalid cases
        assert!(Version::from_str("1.2.").is_err());
        assert!(Version::from_str("1.2").is_err());
        assert!(Version::from_str("1.abc.7").is_err());
        assert!(Version::from_str("").is_err());
        assert!(Version::from_str("1.-4.5").is_err());
        assert_eq!(Version::from_str("1.4.5.9"), Err(VersionError::ExtraLevels(4)));
        assert!(Version::from_str("1.4.1_5").is_err());
        assert!(Version::from_str("1.0.0-").is_err());
        assert!(Version::from_str("1.0.0-alpha..1").is_err());
        assert!(Version::from_str("1.0.0+").is_err());
    }

    #[test]
    fn to_str() {
        assert_eq!(v("20.4.7").to_string(), "20.4.7");
        assert_eq!(v("1.0.0-beta.11").to_string(), "1.0.0-beta.11");
        assert_eq!(v("v1.0.0+exp.sha.5114f85").to_string(), "1.0.0+exp.sha.5114f85");
    }

    #[test]
    fn cmp() {
        let v0 = v("1.2.3");
        assert_eq!(v0 == v("1.2.3"), true);
        assert_eq!(v0 < v("2.2.3"), true);
        assert_eq!(v0 < v("1.3.3"), true);
        assert_eq!(v0 < v("1.2.4"), true);
        assert_eq!(v0 > v("1.2.2"), true);
        assert_eq!(v0 < v("7.80.4"), true);
    }

    #[test]
    fn prerelease_precedence() {
        // example chain from the semantic versioning specification
        let chain = [
            "1.0.0-alpha",
            "1.0.0-alpha.1",
            "1.0.0-alpha.beta",
            "1.0.0-beta",
            "1.0.0-beta.2",
            "1.0.0-beta.11",
            "1.0.0-rc.1",
            "1.0.0",
        ];
        for pair in chain.windows(2) {
            assert_eq!(v(pair[0]) < v(pair[1]), true, "{} < {}", pair[0], pair[1]);
            assert_eq!(v(pair[0]).cmp_precedence(&v(pair[1])), Ordering::Less);
        }
    }

    #[test]
    fn build_metadata_ignored_for_precedence() {
        assert_eq!(v("1.0.0+a").cmp_precedence(&v("1.0.0")), Ordering::Equal);
        // total ordering still tells them apart
        assert_eq!(v("1.0.0") < v("1.0.0+a"), true);
        assert_eq!(v("1.0.0+a") < v("1.0.0+b"), true);
    }

    #[test]
    fn preference_order() {
        let mut list = vec![
            v("1.0.0+b"),
            v("0.9.0"),
            v("1.0.0"),
            v("1.0.0-rc.1"),
            v("1.0.0+a"),
        ];
        list.sort_by(|a, b| a.cmp_preference(b));
        let list: Vec<String> = list.into_iter().map(|f| f.to_string()).collect();
        assert_eq!(list, vec!["1.0.0", "1.0.0+a", "1.0.0+b", "1.0.0-rc.1", "0.9.0"]);
    }

    #[test]
    fn next_major() {
        assert_eq!(v("1.4.2").next_major(), Some(v("2.0.0")));
        assert_eq!(v("0.4.2").next_major(), Some(v("0.5.0")));
        assert_eq!(v("18446744073709551615.0.0").next_major(), None);
        assert_eq!(v("0.18446744073709551615.3").next_major(), None);
        assert_eq!(v("1.0.0-rc.1").same_release(&v("1.0.0")), true);
        assert_eq!(v("1.0.0-rc.1").is_prerelease(), true);
    }

    #[test]
    fn serde_string_form() {
        let ver: Version = serde_json::from_str("\"1.2.3-rc.1\"").unwrap();
        assert_eq!(ver, v("1.2.3-rc.1"));
        assert_eq!(serde_json::to_string(&ver).unwrap(), "\"1.2.3-rc.1\"");
    }
}
