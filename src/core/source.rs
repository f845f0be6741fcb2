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

//! Access to the places packages come from.

use crate::core::version::Version;
use crate::util::anyerror::Fault;
use serde_derive::{Deserialize, Serialize};
use std::fmt::Display;
use std::path::{Path, PathBuf};

/// The concrete choice made for one package.
#[derive(Debug, PartialEq, Eq, Clone, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Binding {
    Version(Version),
    Branch(String),
    Revision(String),
    Edited(PathBuf),
}

impl Binding {
    pub fn as_version(&self) -> Option<&Version> {
        match self {
            Self::Version(v) => Some(v),
            _ => None,
        }
    }

    pub fn is_edited(&self) -> bool {
        match self {
            Self::Edited(_) => true,
            _ => false,
        }
    }
}

impl Display for Binding {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Version(v) => write!(f, "{}", v),
            Self::Branch(b) => write!(f, "branch {}", b),
            Self::Revision(r) => write!(f, "revision {}", r),
            Self::Edited(p) => write!(f, "edited at {}", p.display()),
        }
    }
}

/// A fully resolved, immutable revision identifier (a commit hash for git).
#[derive(Debug, PartialEq, Eq, PartialOrd, Ord, Clone, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RevisionHash(String);

impl RevisionHash {
    pub fn new(s: &str) -> Self {
        Self(s.trim().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for RevisionHash {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The raw text of a manifest as retrieved from a repository.
#[derive(Debug, PartialEq, Clone)]
pub struct ManifestSource {
    contents: String,
}

impl ManifestSource {
    pub fn new(contents: String) -> Self {
        Self { contents }
    }

    /// Reads the manifest file found at `path`.
    pub fn from_file(path: &Path) -> Result<Self, Fault> {
        Ok(Self::new(std::fs::read_to_string(path)?))
    }

    pub fn get_contents(&self) -> &str {
        &self.contents
    }
}

/// Repository access.
///
/// Implementations own transport, credentials and retry policy. They are
/// called from the catalog's worker threads and must be shareable.
pub trait Repository: Send + Sync {
    /// Marks the start of a workspace session.
    ///
    /// Data cached from remotes during an earlier session must be read again.
    fn begin_session(&self) {}

    /// Lists the version tags available at `location`.
    fn list_versions(&self, location: &str) -> Result<Vec<Version>, Fault>;

    /// Resolves a version, branch or revision to an immutable revision hash.
    fn resolve_revision(&self, location: &str, binding: &Binding) -> Result<RevisionHash, Fault>;

    /// Retrieves the manifest text at `revision`.
    fn fetch_manifest(&self, location: &str, revision: &RevisionHash) -> Result<ManifestSource, Fault>;

    /// Materializes `revision` into the `dest` directory.
    ///
    /// A failed checkout must not leave a partially created `dest` behind.
    fn checkout(&self, location: &str, revision: &RevisionHash, dest: &Path) -> Result<(), Fault>;

    /// Reports the revision currently checked out at `dest`, if any.
    fn current_revision(&self, dest: &Path) -> Result<Option<RevisionHash>, Fault>;
}
