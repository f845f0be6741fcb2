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

use crate::core::catalog;
use crate::core::context;
use crate::core::manifest::FromFile;
use crate::util::anyerror::{AnyError, Fault};
use crate::util::filesystem;
use serde_derive::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::str::FromStr;

pub const CONFIG_FILE: &str = "config.toml";

const DEFAULT_GIT: &str = "git";
const DEFAULT_EDITS_DIR: &str = "Packages";

/// Settings read from `<root>/.tether/config.toml`.
#[derive(PartialEq, Debug, Serialize, Deserialize, Default)]
#[serde(deny_unknown_fields)]
pub struct Config {
    jobs: Option<usize>,
    git: Option<String>,
    cache: Option<String>,
    edits: Option<String>,
}

impl FromStr for Config {
    type Err = toml::de::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        toml::from_str(s)
    }
}

impl FromFile for Config {
    fn from_file(path: &Path) -> Result<Self, Fault> {
        // a missing configuration means defaults everywhere
        if path.exists() == false {
            return Ok(Self::new());
        }
        let contents = std::fs::read_to_string(&path)?;
        match Self::from_str(&contents) {
            Ok(r) => Ok(r),
            Err(e) => Err(AnyError(format!(
                "failed to parse {} file: {}",
                path.display(),
                e
            )))?,
        }
    }
}

impl Config {
    pub fn new() -> Self {
        Self {
            jobs: None,
            git: None,
            cache: None,
            edits: None,
        }
    }

    pub fn jobs(mut self, n: usize) -> Self {
        self.jobs = Some(n);
        self
    }

    pub fn edits(mut self, dir: &str) -> Self {
        self.edits = Some(dir.to_string());
        self
    }

    /// Number of worker threads for prefetching.
    pub fn get_jobs(&self) -> usize {
        match self.jobs {
            Some(n) if n > 0 => n,
            _ => catalog::default_jobs(),
        }
    }

    /// The git executable to invoke.
    pub fn get_git(&self) -> &str {
        self.git.as_deref().unwrap_or(DEFAULT_GIT)
    }

    /// Directory holding repository mirrors, resolved against `root`.
    ///
    /// Defaults to `$TETHER_HOME/repositories`.
    pub fn get_cache(&self, root: &Path) -> PathBuf {
        match &self.cache {
            Some(c) => filesystem::resolve_rel_path(root, c),
            None => match context::home_dir() {
                Some(h) => h.join("repositories"),
                None => root.join(".tether").join("repositories"),
            },
        }
    }

    /// Directory where editable copies are placed, resolved against `root`.
    pub fn get_edits(&self, root: &Path) -> PathBuf {
        filesystem::resolve_rel_path(root, self.edits.as_deref().unwrap_or(DEFAULT_EDITS_DIR))
    }
}
