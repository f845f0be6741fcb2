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

//! A [Repository] backed by an external `git` executable.

use crate::core::config::Config;
use crate::core::manifest::MANIFEST_FILE;
use crate::core::pkgid::PkgId;
use crate::core::source::{Binding, ManifestSource, Repository, RevisionHash};
use crate::core::version::Version;
use crate::util::anyerror::{AnyError, Fault};
use crate::util::filesystem;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::str::FromStr;
use std::sync::Mutex;

/// Runs git commands through subprocesses rather than libgit2 bindings.
///
/// Every remote is kept as a bare mirror under the cache directory. A mirror
/// is refreshed at most once per session.
pub struct GitRepository {
    command: String,
    cache: PathBuf,
    refreshed: Mutex<HashSet<PkgId>>,
}

impl GitRepository {
    pub fn new(cache: &Path) -> Self {
        Self {
            command: String::from("git"),
            cache: cache.to_path_buf(),
            refreshed: Mutex::new(HashSet::new()),
        }
    }

    /// Creates a repository using the `git` and `cache` settings of `config`.
    pub fn from_config(config: &Config, root: &Path) -> Self {
        Self::new(&config.get_cache(root)).command(Some(config.get_git().to_string()))
    }

    /// Sets the command for calling git through processes.
    ///
    /// When `s` is `None`, the command assumes git is on path and is simply `git`.
    pub fn command(mut self, s: Option<String>) -> Self {
        self.command = s.unwrap_or(String::from("git"));
        self
    }

    /// Runs `git <args>` from `dir` and returns what it wrote to stdout.
    fn run(&self, dir: &Path, args: &[&str]) -> Result<String, Fault> {
        let output = Command::new(&self.command)
            .args(args)
            .current_dir(dir)
            .output()?;
        match output.status.code() {
            Some(0) => Ok(String::from_utf8_lossy(&output.stdout).to_string()),
            Some(num) => Err(AnyError(format!(
                "git {} exited with error code {}: {}",
                args.join(" "),
                num,
                String::from_utf8_lossy(&output.stderr).trim()
            )))?,
            None => Err(AnyError(format!("git {} terminated by signal", args.join(" "))))?,
        }
    }

    /// Returns the mirror of `location`, cloning or refreshing it as needed.
    fn mirror(&self, location: &str) -> Result<PathBuf, Fault> {
        let id = PkgId::from_location(location)?;
        let path = self.cache.join(id.as_str());
        {
            let refreshed = self
                .refreshed
                .lock()
                .map_err(|_| AnyError::from("mirror table is poisoned"))?;
            if refreshed.contains(&id) == true {
                return Ok(path);
            }
        }
        match path.exists() {
            true => {
                log::debug!("updating mirror of {}", id);
                self.run(&path, &["remote", "update", "--prune"])?;
            }
            false => {
                log::debug!("cloning mirror of {}", id);
                std::fs::create_dir_all(&self.cache)?;
                // clone next to the destination so a failed clone leaves nothing behind
                let temp = tempfile::tempdir_in(&self.cache)?;
                let staged = temp.path().join("mirror");
                let staged_str = staged.to_string_lossy().to_string();
                self.run(temp.path(), &["clone", "--mirror", location, &staged_str])?;
                if let Some(parent) = path.parent() {
                    std::fs::create_dir_all(parent)?;
                }
                std::fs::rename(&staged, &path)?;
            }
        }
        if let Ok(mut refreshed) = self.refreshed.lock() {
            refreshed.insert(id);
        }
        Ok(path)
    }

    /// Finds the tag name that spells `version`.
    fn find_tag(&self, mirror: &Path, version: &Version) -> Result<Option<String>, Fault> {
        let tags = self.run(mirror, &["tag", "--list"])?;
        Ok(tags
            .lines()
            .map(|t| t.trim())
            .find(|t| Version::from_str(t).map(|v| &v == version).unwrap_or(false))
            .map(|t| t.to_string()))
    }
}

/// Collects the tags that spell a version, skipping any others.
fn parse_tags(list: &str) -> Vec<Version> {
    list.lines()
        .filter_map(|t| Version::from_str(t.trim()).ok())
        .collect()
}

impl Repository for GitRepository {
    fn begin_session(&self) {
        if let Ok(mut refreshed) = self.refreshed.lock() {
            refreshed.clear();
        }
    }

    fn list_versions(&self, location: &str) -> Result<Vec<Version>, Fault> {
        let mirror = self.mirror(location)?;
        Ok(parse_tags(&self.run(&mirror, &["tag", "--list"])?))
    }

    fn resolve_revision(&self, location: &str, binding: &Binding) -> Result<RevisionHash, Fault> {
        let mirror = self.mirror(location)?;
        let refname = match binding {
            Binding::Version(v) => match self.find_tag(&mirror, v)? {
                Some(tag) => format!("refs/tags/{}^{{commit}}", tag),
                None => return Err(AnyError(format!("{} has no tag for version {}", location, v)))?,
            },
            Binding::Branch(b) => format!("refs/heads/{}^{{commit}}", b),
            Binding::Revision(r) => format!("{}^{{commit}}", r),
            Binding::Edited(p) => {
                return Err(AnyError(format!(
                    "an edited working copy at {:?} has no revision",
                    p
                )))?
            }
        };
        let hash = self.run(&mirror, &["rev-parse", "--verify", &refname])?;
        Ok(RevisionHash::new(&hash))
    }

    fn fetch_manifest(&self, location: &str, revision: &RevisionHash) -> Result<ManifestSource, Fault> {
        let mirror = self.mirror(location)?;
        let object = format!("{}:{}", revision.as_str(), MANIFEST_FILE);
        Ok(ManifestSource::new(self.run(&mirror, &["show", &object])?))
    }

    fn checkout(&self, location: &str, revision: &RevisionHash, dest: &Path) -> Result<(), Fault> {
        let mirror = self.mirror(location)?;
        let temp = tempfile::tempdir()?;
        let mirror_str = mirror.to_string_lossy().to_string();
        let work = temp.path().join("work");
        let work_str = work.to_string_lossy().to_string();
        self.run(temp.path(), &["clone", "--no-checkout", &mirror_str, &work_str])?;
        self.run(&work, &["checkout", "--force", "--detach", revision.as_str()])?;

        let existed = dest.exists();
        if let Err(e) = filesystem::copy_dir(&work, dest) {
            if existed == false {
                filesystem::remove_dir(dest)?;
            }
            return Err(e);
        }
        Ok(())
    }

    fn current_revision(&self, dest: &Path) -> Result<Option<RevisionHash>, Fault> {
        if dest.join(".git").exists() == false {
            return Ok(None);
        }
        match self.run(dest, &["rev-parse", "HEAD"]) {
            Ok(hash) => Ok(Some(RevisionHash::new(&hash))),
            Err(_) => Ok(None),
        }
    }
}
