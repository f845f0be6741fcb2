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

//! A `pkgid` is the stable identity of a package, derived from the canonical
//! form of its source location.

use serde::de::{self};
use serde::Serializer;
use serde::{Deserialize, Serialize};
use std::fmt::Display;
use std::str::FromStr;

const SCHEMES: [&str; 5] = ["https://", "http://", "ssh://", "git://", "file://"];

#[derive(Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Clone)]
pub struct PkgId(String);

impl PkgId {
    /// Creates the identity of the package found at `location`.
    pub fn from_location(location: &str) -> Result<Self, PkgIdError> {
        Self::from_str(location)
    }

    /// Returns the default package name: the last path component.
    pub fn get_name(&self) -> &str {
        match self.0.rsplit_once('/') {
            Some((_, n)) => n,
            None => &self.0,
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Normalizes a declared package or product name for collision checks.
///
/// Names compare case-insensitively with `-` and `_` treated as equal.
pub fn normalize_name(s: &str) -> String {
    s.replace('-', "_").to_lowercase()
}

impl FromStr for PkgId {
    type Err = PkgIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut rest = s.trim();
        if rest.is_empty() == true {
            return Err(PkgIdError::Empty);
        }
        let mut had_scheme = false;
        for scheme in SCHEMES {
            if rest.get(..scheme.len()).map(|h| h.eq_ignore_ascii_case(scheme)) == Some(true) {
                rest = &rest[scheme.len()..];
                had_scheme = true;
                break;
            }
        }
        let mut canon = match had_scheme {
            true => {
                // drop any user information from the authority
                let (authority, path) = rest.split_once('/').unwrap_or((rest, ""));
                let authority = match authority.rsplit_once('@') {
                    Some((_, host)) => host,
                    None => authority,
                };
                match path.is_empty() {
                    true => authority.to_string(),
                    false => format!("{}/{}", authority, path),
                }
            }
            false => {
                // scp-like syntax: `user@host:path`
                let (head, tail) = match rest.split_once(':') {
                    Some((h, t)) if h.contains('/') == false => (h, Some(t)),
                    _ => (rest, None),
                };
                let head = match head.rsplit_once('@') {
                    Some((_, host)) => host,
                    None => head,
                };
                match tail {
                    Some(t) => format!("{}/{}", head, t.trim_start_matches('/')),
                    None => head.to_string(),
                }
            }
        };
        while canon.ends_with('/') == true {
            canon.pop();
        }
        let ext = canon.len().checked_sub(4).and_then(|i| canon.get(i..));
        if ext.map(|e| e.eq_ignore_ascii_case(".git")) == Some(true) {
            canon.truncate(canon.len() - 4);
        }
        while canon.ends_with('/') == true {
            canon.pop();
        }
        let canon = canon.to_lowercase();
        if canon.is_empty() == true {
            return Err(PkgIdError::NoPath(s.to_string()));
        }
        if let Some(c) = canon.chars().find(|c| c.is_whitespace()) {
            return Err(PkgIdError::InvalidChar(s.to_string(), c));
        }
        Ok(Self(canon))
    }
}

impl Display for PkgId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl<'de> Deserialize<'de> for PkgId {
    fn deserialize<D>(deserializer: D) -> Result<PkgId, D::Error>
    where
        D: de::Deserializer<'de>,
    {
        struct LayerVisitor;

        impl<'de> de::Visitor<'de> for LayerVisitor {
            type Value = PkgId;

            fn expecting(&self, formatter: &mut std::fmt::Formatter) -> std::fmt::Result {
                formatter.write_str("a package source location")
            }

            fn visit_str<E>(self, v: &str) -> Result<Self::Value, E>
            where
                E: de::Error,
            {
                PkgId::from_str(v).map_err(de::Error::custom)
            }
        }

        deserializer.deserialize_str(LayerVisitor)
    }
}

impl Serialize for PkgId {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&self.0)
    }
}

#[derive(Debug, PartialEq, Clone, thiserror::Error)]
pub enum PkgIdError {
    #[error("empty package location")]
    Empty,
    #[error("package location {0:?} has no path")]
    NoPath(String),
    #[error("package location {0:?} contains invalid character {1:?}")]
    InvalidChar(String, char),
}
