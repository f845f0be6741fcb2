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

//! The catalog memoizes everything retrieved from repositories during one
//! session: version lists, symbolic revisions, and loaded manifests.

use crate::core::manifest::{LoadContext, Manifest, ManifestLoader, MANIFEST_FILE};
use crate::core::pkgid::PkgId;
use crate::core::source::{Binding, ManifestSource, Repository, RevisionHash};
use crate::core::version::Version;
use std::collections::HashMap;
use std::hash::Hash;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::thread;

/// A manifest together with the revision it was read at.
#[derive(Debug, PartialEq, Clone)]
pub struct Loaded {
    revision: Option<RevisionHash>,
    manifest: Arc<Manifest>,
}

impl Loaded {
    /// The revision the manifest came from; `None` for an edited working copy.
    pub fn get_revision(&self) -> Option<&RevisionHash> {
        self.revision.as_ref()
    }

    pub fn get_manifest(&self) -> &Arc<Manifest> {
        &self.manifest
    }
}

type Memo<K, V> = Mutex<HashMap<K, Result<V, String>>>;

pub struct Catalog<'a> {
    repo: &'a dyn Repository,
    loader: &'a dyn ManifestLoader,
    jobs: usize,
    versions: Memo<PkgId, Arc<Vec<Version>>>,
    revisions: Memo<(PkgId, Binding), RevisionHash>,
    manifests: Memo<(PkgId, RevisionHash), Arc<Manifest>>,
    edits: Memo<(PkgId, PathBuf), Arc<Manifest>>,
}

/// Reads a memoized entry without holding the lock afterward.
fn recall<K: Eq + Hash, V: Clone>(memo: &Memo<K, V>, key: &K) -> Option<Result<V, String>> {
    match memo.lock() {
        Ok(m) => m.get(key).cloned(),
        Err(e) => e.into_inner().get(key).cloned(),
    }
}

fn remember<K: Eq + Hash, V: Clone>(memo: &Memo<K, V>, key: K, value: Result<V, String>) -> Result<V, String> {
    let mut m = match memo.lock() {
        Ok(m) => m,
        Err(e) => e.into_inner(),
    };
    // keep the first answer if another worker finished the same fetch first
    m.entry(key).or_insert(value).clone()
}

impl<'a> Catalog<'a> {
    pub fn new(repo: &'a dyn Repository, loader: &'a dyn ManifestLoader) -> Self {
        Self {
            repo,
            loader,
            jobs: default_jobs(),
            versions: Mutex::new(HashMap::new()),
            revisions: Mutex::new(HashMap::new()),
            manifests: Mutex::new(HashMap::new()),
            edits: Mutex::new(HashMap::new()),
        }
    }

    /// Sets the number of worker threads used by [Catalog::prefetch].
    pub fn jobs(mut self, n: usize) -> Self {
        self.jobs = n.max(1);
        self
    }

    pub fn get_jobs(&self) -> usize {
        self.jobs
    }

    /// Returns the versions published for `id`, most preferred first.
    pub fn get_versions(&self, id: &PkgId, location: &str) -> Result<Arc<Vec<Version>>, String> {
        if let Some(hit) = recall(&self.versions, id) {
            return hit;
        }
        let result = self
            .repo
            .list_versions(location)
            .map(|mut list| {
                list.sort_by(|a, b| a.cmp_preference(b));
                list.dedup();
                Arc::new(list)
            })
            .map_err(|e| e.to_string());
        remember(&self.versions, id.clone(), result)
    }

    /// Resolves `binding` of `id` to its immutable revision.
    pub fn get_revision(&self, id: &PkgId, location: &str, binding: &Binding) -> Result<RevisionHash, String> {
        let key = (id.clone(), binding.clone());
        if let Some(hit) = recall(&self.revisions, &key) {
            return hit;
        }
        let result = self
            .repo
            .resolve_revision(location, binding)
            .map_err(|e| e.to_string());
        remember(&self.revisions, key, result)
    }

    /// Seeds the revision a binding resolves to, so a moving branch keeps
    /// the revision already pinned. An existing answer is kept.
    pub fn pin_revision(&self, id: &PkgId, binding: &Binding, revision: RevisionHash) {
        let _ = remember(&self.revisions, (id.clone(), binding.clone()), Ok(revision));
    }

    /// Loads the manifest of `id` at `binding`.
    ///
    /// Each (identity, revision) pair is fetched and parsed at most once.
    pub fn get_manifest(&self, id: &PkgId, location: &str, binding: &Binding) -> Result<Loaded, String> {
        if let Binding::Edited(path) = binding {
            return self.get_edited_manifest(id, path);
        }
        let revision = self.get_revision(id, location, binding)?;
        let key = (id.clone(), revision.clone());
        let manifest = match recall(&self.manifests, &key) {
            Some(hit) => hit?,
            None => {
                let result = self
                    .repo
                    .fetch_manifest(location, &revision)
                    .map_err(|e| e.to_string())
                    .and_then(|src| {
                        self.loader
                            .load(&src, &LoadContext::new(id.clone(), Some(revision.clone())))
                            .map(Arc::new)
                            .map_err(|e| e.to_string())
                    });
                remember(&self.manifests, key, result)?
            }
        };
        Ok(Loaded {
            revision: Some(revision),
            manifest,
        })
    }

    /// Loads the manifest found in the local working copy at `path`.
    pub fn get_edited_manifest(&self, id: &PkgId, path: &PathBuf) -> Result<Loaded, String> {
        let key = (id.clone(), path.clone());
        let manifest = match recall(&self.edits, &key) {
            Some(hit) => hit?,
            None => {
                let result = ManifestSource::from_file(&path.join(MANIFEST_FILE))
                    .map_err(|e| e.to_string())
                    .and_then(|src| {
                        self.loader
                            .load(&src, &LoadContext::new(id.clone(), None))
                            .map(Arc::new)
                            .map_err(|e| e.to_string())
                    });
                remember(&self.edits, key, result)?
            }
        };
        Ok(Loaded {
            revision: None,
            manifest,
        })
    }

    /// Warms the caches for newly discovered packages on the worker pool.
    ///
    /// For every `(identity, location)` the version list is retrieved along
    /// with the manifest of its most preferred version. Failures are memoized
    /// and surface later when the resolver asks for the same data.
    pub fn prefetch(&self, batch: &[(PkgId, String)]) {
        let todo: Vec<&(PkgId, String)> = batch
            .iter()
            .filter(|(id, _)| recall(&self.versions, id).is_none())
            .collect();
        if todo.is_empty() == true {
            return;
        }
        let jobs = self.jobs.clamp(1, todo.len());
        log::debug!("prefetching {} packages on {} workers", todo.len(), jobs);
        if jobs == 1 {
            todo.iter().for_each(|(id, loc)| self.prefetch_one(id, loc));
            return;
        }
        for chunk in todo.chunks(jobs) {
            thread::scope(|scope| {
                for (id, loc) in chunk.iter().copied() {
                    scope.spawn(move || self.prefetch_one(id, loc));
                }
            });
        }
    }

    fn prefetch_one(&self, id: &PkgId, location: &str) {
        if let Ok(versions) = self.get_versions(id, location) {
            if let Some(best) = versions.first() {
                let _ = self.get_manifest(id, location, &Binding::Version(best.clone()));
            }
        }
    }
}

/// Counts the worker threads available on this machine.
pub fn default_jobs() -> usize {
    thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(4)
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::core::manifest::TomlLoader;
    use crate::core::memory::MemoryRepository;
    use std::str::FromStr;

    const MAN: &str = "[package]\nname = \"a\"\n";

    fn id(s: &str) -> PkgId {
        PkgId::from_str(s).unwrap()
    }

    #[test]
    fn versions_are_preference_ordered() {
        let repo = MemoryRepository::new();
        repo.add_version("x.com/a", "1.0.0", MAN).unwrap();
        repo.add_version("x.com/a", "2.0.0-rc.1", MAN).unwrap();
        repo.add_version("x.com/a", "1.2.0", MAN).unwrap();
        let loader = TomlLoader::new();
        let cat = Catalog::new(&repo, &loader);
        let list: Vec<String> = cat
            .get_versions(&id("x.com/a"), "x.com/a")
            .unwrap()
            .iter()
            .map(|v| v.to_string())
            .collect();
        assert_eq!(list, vec!["2.0.0-rc.1", "1.2.0", "1.0.0"]);
        assert!(cat.get_versions(&id("x.com/b"), "x.com/b").is_err());
    }

    #[test]
    fn manifests_are_loaded_once() {
        let repo = MemoryRepository::new();
        let h = repo.add_version("x.com/a", "1.0.0", MAN).unwrap();
        let loader = TomlLoader::new();
        let cat = Catalog::new(&repo, &loader);
        let b = Binding::Version(Version::from_str("1.0.0").unwrap());
        let first = cat.get_manifest(&id("x.com/a"), "x.com/a", &b).unwrap();
        let second = cat.get_manifest(&id("x.com/a"), "x.com/a", &b).unwrap();
        assert_eq!(first.get_revision(), Some(&h));
        assert_eq!(first, second);
        assert_eq!(repo.fetch_count(), 1);
    }

    #[test]
    fn load_failures_are_remembered() {
        let repo = MemoryRepository::new();
        repo.add_version("x.com/a", "1.0.0", "[package]\nname = 7\n").unwrap();
        let loader = TomlLoader::new();
        let cat = Catalog::new(&repo, &loader);
        let b = Binding::Version(Version::from_str("1.0.0").unwrap());
        assert!(cat.get_manifest(&id("x.com/a"), "x.com/a", &b).is_err());
        assert!(cat.get_manifest(&id("x.com/a"), "x.com/a", &b).is_err());
        assert_eq!(repo.fetch_count(), 1);
    }

    #[test]
    fn prefetch_fills_caches() {
        let repo = MemoryRepository::new();
        let loader = TomlLoader::new();
        let mut batch = Vec::new();
        for i in 0..6 {
            let loc = format!("x.com/p{}", i);
            repo.add_version(&loc, "1.0.0", MAN).unwrap();
            repo.add_version(&loc, "1.1.0", MAN).unwrap();
            batch.push((id(&loc), loc));
        }
        let cat = Catalog::new(&repo, &loader).jobs(3);
        cat.prefetch(&batch);
        assert_eq!(repo.fetch_count(), 6);
        // everything needed is now served from memory
        let b = Binding::Version(Version::from_str("1.1.0").unwrap());
        for (i, l) in &batch {
            cat.get_manifest(i, l, &b).unwrap();
        }
        assert_eq!(repo.fetch_count(), 6);
        // a second prefetch is a no-op
        cat.prefetch(&batch);
        assert_eq!(repo.fetch_count(), 6);
    }

    #[test]
    fn edited_manifest_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(MANIFEST_FILE), MAN).unwrap();
        let repo = MemoryRepository::new();
        let loader = TomlLoader::new();
        let cat = Catalog::new(&repo, &loader);
        let b = Binding::Edited(dir.path().to_path_buf());
        let loaded = cat.get_manifest(&id("x.com/a"), "x.com/a", &b).unwrap();
        assert_eq!(loaded.get_revision(), None);
        assert_eq!(loaded.get_manifest().get_name(), "a");
        assert_eq!(repo.fetch_count(), 0);
    }

    #[test]
    fn pinned_branch_revision_is_kept() {
        let repo = MemoryRepository::new();
        let old = repo.add_branch("x.com/a", "main", MAN).unwrap();
        let new = repo.add_branch("x.com/a", "main", MAN).unwrap();
        let loader = TomlLoader::new();
        let cat = Catalog::new(&repo, &loader);
        let b = Binding::Branch("main".to_string());
        cat.pin_revision(&id("x.com/a"), &b, old.clone());
        assert_eq!(cat.get_revision(&id("x.com/a"), "x.com/a", &b), Ok(old));

        let fresh = Catalog::new(&repo, &loader);
        assert_eq!(fresh.get_revision(&id("x.com/a"), "x.com/a", &b), Ok(new));
    }
}
