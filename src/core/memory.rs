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

//! An in-memory [Repository] for embedding and testing.

use crate::core::manifest::MANIFEST_FILE;
use crate::core::pkgid::PkgId;
use crate::core::source::{Binding, ManifestSource, Repository, RevisionHash};
use crate::core::version::Version;
use crate::util::anyerror::{AnyError, Fault};
use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;
use std::str::FromStr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

/// File written into every checkout to remember its revision.
pub const REVISION_FILE: &str = ".tether-revision";

#[derive(Debug, Default)]
struct Package {
    tags: BTreeMap<Version, RevisionHash>,
    branches: BTreeMap<String, RevisionHash>,
    revisions: BTreeMap<RevisionHash, String>,
}

#[derive(Debug, Default)]
struct Table {
    packages: BTreeMap<PkgId, Package>,
    broken: BTreeSet<PkgId>,
    generation: u64,
}

#[derive(Debug, Default)]
pub struct MemoryRepository {
    table: Mutex<Table>,
    sessions: AtomicUsize,
    listings: AtomicUsize,
    fetches: AtomicUsize,
    checkouts: AtomicUsize,
}

impl MemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Table>, Fault> {
        self.table
            .lock()
            .map_err(|_| AnyError::from("repository table is poisoned").into())
    }

    /// Stores `manifest` under a fresh revision of the package `id`.
    fn add_revision(table: &mut Table, id: &PkgId, manifest: &str) -> RevisionHash {
        table.generation += 1;
        let hash = RevisionHash::new(&fnv_hex(&format!("{}#{}", id, table.generation)));
        table
            .packages
            .entry(id.clone())
            .or_default()
            .revisions
            .insert(hash.clone(), manifest.to_string());
        hash
    }

    /// Publishes `version` of the package at `location` with the given manifest text.
    pub fn add_version(&self, location: &str, version: &str, manifest: &str) -> Result<RevisionHash, Fault> {
        let id = PkgId::from_location(location)?;
        let version = Version::from_str(version)?;
        let mut table = self.lock()?;
        let hash = Self::add_revision(&mut table, &id, manifest);
        table.packages.entry(id).or_default().tags.insert(version, hash.clone());
        Ok(hash)
    }

    /// Points `branch` of the package at `location` to a new revision.
    pub fn add_branch(&self, location: &str, branch: &str, manifest: &str) -> Result<RevisionHash, Fault> {
        let id = PkgId::from_location(location)?;
        let mut table = self.lock()?;
        let hash = Self::add_revision(&mut table, &id, manifest);
        table
            .packages
            .entry(id)
            .or_default()
            .branches
            .insert(branch.to_string(), hash.clone());
        Ok(hash)
    }

    /// Stores a detached revision named exactly `revision`.
    pub fn add_commit(&self, location: &str, revision: &str, manifest: &str) -> Result<RevisionHash, Fault> {
        let id = PkgId::from_location(location)?;
        let hash = RevisionHash::new(revision);
        self.lock()?
            .packages
            .entry(id)
            .or_default()
            .revisions
            .insert(hash.clone(), manifest.to_string());
        Ok(hash)
    }

    /// Makes every checkout of the package at `location` fail (or succeed again).
    pub fn break_checkouts(&self, location: &str, broken: bool) -> Result<(), Fault> {
        let id = PkgId::from_location(location)?;
        let mut table = self.lock()?;
        match broken {
            true => table.broken.insert(id),
            false => table.broken.remove(&id),
        };
        Ok(())
    }

    /// Number of sessions started so far.
    pub fn session_count(&self) -> usize {
        self.sessions.load(Ordering::SeqCst)
    }

    /// Number of version listings requested so far.
    pub fn listing_count(&self) -> usize {
        self.listings.load(Ordering::SeqCst)
    }

    /// Number of manifests fetched so far.
    pub fn fetch_count(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }

    /// Number of checkouts performed so far.
    pub fn checkout_count(&self) -> usize {
        self.checkouts.load(Ordering::SeqCst)
    }
}

impl Repository for MemoryRepository {
    fn begin_session(&self) {
        self.sessions.fetch_add(1, Ordering::SeqCst);
    }

    fn list_versions(&self, location: &str) -> Result<Vec<Version>, Fault> {
        self.listings.fetch_add(1, Ordering::SeqCst);
        let id = PkgId::from_location(location)?;
        let table = self.lock()?;
        match table.packages.get(&id) {
            Some(p) => Ok(p.tags.keys().cloned().collect()),
            None => Err(AnyError(format!("repository {} does not exist", location)))?,
        }
    }

    fn resolve_revision(&self, location: &str, binding: &Binding) -> Result<RevisionHash, Fault> {
        let id = PkgId::from_location(location)?;
        let table = self.lock()?;
        let pkg = match table.packages.get(&id) {
            Some(p) => p,
            None => return Err(AnyError(format!("repository {} does not exist", location)))?,
        };
        let found = match binding {
            Binding::Version(v) => pkg.tags.get(v).cloned(),
            Binding::Branch(b) => pkg.branches.get(b).cloned(),
            Binding::Revision(r) => {
                let r = RevisionHash::new(r);
                match pkg.revisions.contains_key(&r) {
                    true => Some(r),
                    false => None,
                }
            }
            Binding::Edited(_) => None,
        };
        match found {
            Some(h) => Ok(h),
            None => Err(AnyError(format!("{} has no {}", location, binding)))?,
        }
    }

    fn fetch_manifest(&self, location: &str, revision: &RevisionHash) -> Result<ManifestSource, Fault> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        let id = PkgId::from_location(location)?;
        let table = self.lock()?;
        match table.packages.get(&id).and_then(|p| p.revisions.get(revision)) {
            Some(text) => Ok(ManifestSource::new(text.clone())),
            None => Err(AnyError(format!("{} has no revision {}", location, revision)))?,
        }
    }

    fn checkout(&self, location: &str, revision: &RevisionHash, dest: &Path) -> Result<(), Fault> {
        self.checkouts.fetch_add(1, Ordering::SeqCst);
        let id = PkgId::from_location(location)?;
        let manifest = {
            let table = self.lock()?;
            if table.broken.contains(&id) == true {
                return Err(AnyError(format!("failed to reach {}", location)))?;
            }
            match table.packages.get(&id).and_then(|p| p.revisions.get(revision)) {
                Some(text) => text.clone(),
                None => {
                    return Err(AnyError(format!("{} has no revision {}", location, revision)))?
                }
            }
        };
        std::fs::create_dir_all(dest)?;
        std::fs::write(dest.join(MANIFEST_FILE), manifest)?;
        std::fs::write(dest.join(REVISION_FILE), revision.as_str())?;
        Ok(())
    }

    fn current_revision(&self, dest: &Path) -> Result<Option<RevisionHash>, Fault> {
        let marker = dest.join(REVISION_FILE);
        match marker.exists() {
            true => Ok(Some(RevisionHash::new(&std::fs::read_to_string(marker)?))),
            false => Ok(None),
        }
    }
}

/// Renders the text of a simple `Tether.toml` manifest.
///
/// Each product exposes a module of the same name. Each dependency is given
/// as `(key, url, requirement)` where the requirement is a version
/// requirement, `branch=<name>`, or `revision=<hash>`.
pub fn manifest_text(name: &str, products: &[&str], deps: &[(&str, &str, &str)]) -> String {
    let mut text = format!("[package]\nname = \"{}\"\n", name);
    for p in products {
        text.push_str(&format!("\n[[product]]\nname = \"{}\"\nmodules = [\"{}\"]\n", p, p));
    }
    if deps.is_empty() == false {
        text.push_str("\n[dependencies]\n");
    }
    for (key, url, req) in deps {
        let req = if let Some(b) = req.strip_prefix("branch=") {
            format!("branch = \"{}\"", b)
        } else if let Some(r) = req.strip_prefix("revision=") {
            format!("revision = \"{}\"", r)
        } else {
            format!("version = \"{}\"", req)
        };
        text.push_str(&format!("{} = {{ url = \"{}\", {} }}\n", key, url, req));
    }
    text
}

/// Computes a stable 64-bit FNV-1a digest written as hex.
fn fnv_hex(s: &str) -> String {
    let mut hash: u64 = 0xcbf29ce484222325;
    for b in s.bytes() {
        hash ^= b as u64;
        hash = hash.wrapping_mul(0x100000001b3);
    }
    format!("{:016x}", hash)
}

#[cfg(test)]
mod test {
    use super::*;

    const MAN: &str = "[package]\nname = \"a\"\n";

    #[test]
    fn versions_and_revisions() {
        let repo = MemoryRepository::new();
        let h1 = repo.add_version("https://x.com/a.git", "1.0.0", MAN).unwrap();
        let h2 = repo.add_version("x.com/a", "1.1.0", MAN).unwrap();
        assert_ne!(h1, h2);
        let versions = repo.list_versions("x.com/a").unwrap();
        assert_eq!(versions.len(), 2);
        assert_eq!(repo.listing_count(), 1);
        let v = Version::from_str("1.1.0").unwrap();
        assert_eq!(repo.resolve_revision("x.com/a", &Binding::Version(v)).unwrap(), h2);
        assert_eq!(
            repo.fetch_manifest("x.com/a", &h1).unwrap().get_contents(),
            MAN
        );
        assert_eq!(repo.fetch_count(), 1);
        assert!(repo.list_versions("x.com/missing").is_err());
    }

    #[test]
    fn manifest_text_parses() {
        use crate::core::manifest::Manifest;
        let text = manifest_text(
            "app",
            &["App"],
            &[("b", "x.com/b", "[1.0.0, 2.0.0)"), ("c", "x.com/c", "branch=main")],
        );
        let man = Manifest::from_str(&text).unwrap();
        assert_eq!(man.get_name(), "app");
        assert_eq!(man.has_product("App"), true);
        assert_eq!(man.get_deps().len(), 2);
    }

    #[test]
    fn branches_move() {
        let repo = MemoryRepository::new();
        let first = repo.add_branch("x.com/a", "main", MAN).unwrap();
        let second = repo.add_branch("x.com/a", "main", MAN).unwrap();
        assert_ne!(first, second);
        let head = repo
            .resolve_revision("x.com/a", &Binding::Branch("main".to_string()))
            .unwrap();
        assert_eq!(head, second);
        let c = repo.add_commit("x.com/a", "4f3c2a1", MAN).unwrap();
        assert_eq!(
            repo.resolve_revision("x.com/a", &Binding::Revision("4f3c2a1".to_string()))
                .unwrap(),
            c
        );
    }

    #[test]
    fn checkout_and_break() {
        let dir = tempfile::tempdir().unwrap();
        let repo = MemoryRepository::new();
        let h = repo.add_version("x.com/a", "1.0.0", MAN).unwrap();
        let dest = dir.path().join("a");
        assert_eq!(repo.current_revision(&dest).unwrap(), None);
        repo.checkout("x.com/a", &h, &dest).unwrap();
        assert_eq!(repo.current_revision(&dest).unwrap(), Some(h.clone()));

        repo.break_checkouts("x.com/a", true).unwrap();
        let other = dir.path().join("b");
        assert!(repo.checkout("x.com/a", &h, &other).is_err());
        assert_eq!(other.exists(), false);
        repo.break_checkouts("x.com/a", false).unwrap();
        repo.checkout("x.com/a", &h, &other).unwrap();
        assert_eq!(repo.checkout_count(), 3);
    }
}
