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

//! The workspace's record of the working copies it manages.

use crate::core::pkgid::PkgId;
use crate::core::source::{Binding, RevisionHash};
use crate::util::filesystem;
use serde_derive::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

pub const STATE_FILE: &str = "workspace-state.json";

const STATE_VERSION: u32 = 1;

/// A package whose working copy lives in the workspace.
#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
pub struct ManagedPackage {
    location: String,
    /// Working copy directory relative to the workspace directory.
    checkout: PathBuf,
    /// The pinned binding and revision; for an edited package, the pin the
    /// edit started from.
    binding: Binding,
    revision: RevisionHash,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    edited: Option<PathBuf>,
}

impl ManagedPackage {
    pub fn new(location: &str, checkout: PathBuf, binding: Binding, revision: RevisionHash) -> Self {
        Self {
            location: location.to_string(),
            checkout,
            binding,
            revision,
            edited: None,
        }
    }

    pub fn edited(mut self, path: Option<PathBuf>) -> Self {
        self.edited = path;
        self
    }

    pub fn get_location(&self) -> &str {
        &self.location
    }

    pub fn get_checkout(&self) -> &PathBuf {
        &self.checkout
    }

    pub fn get_binding(&self) -> &Binding {
        &self.binding
    }

    pub fn get_revision(&self) -> &RevisionHash {
        &self.revision
    }

    pub fn get_edited(&self) -> Option<&PathBuf> {
        self.edited.as_ref()
    }

    pub fn is_edited(&self) -> bool {
        self.edited.is_some()
    }
}

#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
pub struct WorkspaceState {
    version: u32,
    #[serde(default)]
    packages: BTreeMap<PkgId, ManagedPackage>,
}

impl Default for WorkspaceState {
    fn default() -> Self {
        Self {
            version: STATE_VERSION,
            packages: BTreeMap::new(),
        }
    }
}

impl WorkspaceState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reads the state kept in the workspace directory `dir`.
    ///
    /// A missing file is an empty state. An unreadable one is discarded.
    pub fn load(dir: &Path) -> Self {
        let path = dir.join(STATE_FILE);
        if path.exists() == false {
            return Self::new();
        }
        let parsed = std::fs::read_to_string(&path)
            .map_err(|e| e.to_string())
            .and_then(|s| serde_json::from_str::<Self>(&s).map_err(|e| e.to_string()));
        match parsed {
            Ok(state) if state.version == STATE_VERSION => state,
            Ok(state) => {
                log::warn!(
                    "discarding {} with unsupported version {}",
                    path.display(),
                    state.version
                );
                Self::new()
            }
            Err(e) => {
                log::warn!("discarding unreadable {}: {}", path.display(), e);
                Self::new()
            }
        }
    }

    pub fn save(&self, dir: &Path) -> Result<(), std::io::Error> {
        let text = serde_json::to_string_pretty(self).map_err(std::io::Error::from)?;
        filesystem::write_atomic(&dir.join(STATE_FILE), &text)
    }

    pub fn get(&self, id: &PkgId) -> Option<&ManagedPackage> {
        self.packages.get(id)
    }

    pub fn get_mut(&mut self, id: &PkgId) -> Option<&mut ManagedPackage> {
        self.packages.get_mut(id)
    }

    pub fn insert(&mut self, id: PkgId, package: ManagedPackage) -> Option<ManagedPackage> {
        self.packages.insert(id, package)
    }

    pub fn remove(&mut self, id: &PkgId) -> Option<ManagedPackage> {
        self.packages.remove(id)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&PkgId, &ManagedPackage)> {
        self.packages.iter()
    }

    /// Maps every edited package to its local working copy.
    pub fn get_edits(&self) -> BTreeMap<PkgId, PathBuf> {
        self.packages
            .iter()
            .filter_map(|(id, p)| p.edited.as_ref().map(|e| (id.clone(), e.clone())))
            .collect()
    }

    pub fn set_edited(&mut self, id: &PkgId, path: Option<PathBuf>) -> bool {
        match self.packages.get_mut(id) {
            Some(p) => {
                p.edited = path;
                true
            }
            None => false,
        }
    }
}
