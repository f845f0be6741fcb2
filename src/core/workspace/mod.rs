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

//! The workspace owns the pin record and the working copies on disk.
//!
//! Every mutating operation holds the [WorkspaceLock] for its whole
//! duration. The pin record is only rewritten after every working copy the
//! new assignment needs is in place.

pub mod lock;
pub mod state;

use crate::core::catalog::Catalog;
use crate::core::config::{Config, CONFIG_FILE};
use crate::core::context::Cancellation;
use crate::core::lockfile::{PinEntry, PinRecord, LOCK_FILE};
use crate::core::manifest::{FromFile, LoadContext, Manifest, ManifestLoader, MANIFEST_FILE};
use crate::core::pkggraph::PackageGraph;
use crate::core::pkgid::PkgId;
use crate::core::resolver::{self, Assignment, ResolveError, Resolver};
use crate::core::source::{ManifestSource, Repository, RevisionHash};
use crate::error::{Error, Hint, LastError};
use crate::util::filesystem;
use lock::WorkspaceLock;
use state::{ManagedPackage, WorkspaceState, STATE_FILE};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

pub const WORKSPACE_DIR: &str = ".tether";
pub const CHECKOUTS_DIR: &str = "checkouts";

#[derive(Debug, PartialEq, Eq, Clone)]
pub enum Phase {
    /// No pin record, or one that no longer matches the working copies.
    Unresolved,
    /// Every pin is checked out at its revision.
    Resolved,
    /// The listed packages are replaced by local working copies.
    Editing(Vec<PkgId>),
}

/// A request to replace a package with a local working copy.
#[derive(Debug, PartialEq, Clone)]
pub struct EditDirective {
    identity: PkgId,
    path: Option<PathBuf>,
}

impl EditDirective {
    pub fn new(identity: PkgId) -> Self {
        Self {
            identity,
            path: None,
        }
    }

    /// Uses the existing directory at `path` instead of a fresh copy.
    pub fn path(mut self, path: &Path) -> Self {
        self.path = Some(path.to_path_buf());
        self
    }

    pub fn get_identity(&self) -> &PkgId {
        &self.identity
    }

    pub fn get_path(&self) -> Option<&PathBuf> {
        self.path.as_ref()
    }
}

/// Directory name of a package's working copy under `checkouts/`.
fn checkout_subpath(id: &PkgId) -> PathBuf {
    PathBuf::from(CHECKOUTS_DIR).join(id.as_str().replace('/', "+"))
}

pub struct Workspace<'a> {
    root: PathBuf,
    config: Config,
    repo: &'a dyn Repository,
    loader: &'a dyn ManifestLoader,
    cancel: Cancellation,
}

impl<'a> Workspace<'a> {
    /// Opens the workspace rooted at the directory holding the root manifest.
    ///
    /// Settings are read from `.tether/config.toml` when present.
    pub fn new(root: &Path, repo: &'a dyn Repository, loader: &'a dyn ManifestLoader) -> Result<Self, Error> {
        let config = Config::from_file(&root.join(WORKSPACE_DIR).join(CONFIG_FILE))
            .map_err(|e| Error::Config(LastError(e.to_string())))?;
        Ok(Self {
            root: root.to_path_buf(),
            config,
            repo,
            loader,
            cancel: Cancellation::new(),
        })
    }

    pub fn config(mut self, config: Config) -> Self {
        self.config = config;
        self
    }

    pub fn cancel(mut self, token: Cancellation) -> Self {
        self.cancel = token;
        self
    }

    pub fn get_root(&self) -> &Path {
        &self.root
    }

    pub fn get_config(&self) -> &Config {
        &self.config
    }

    fn get_workspace_dir(&self) -> PathBuf {
        self.root.join(WORKSPACE_DIR)
    }

    /// Where the working copy of `id` is checked out.
    pub fn get_checkout_dir(&self, id: &PkgId) -> PathBuf {
        self.get_workspace_dir().join(checkout_subpath(id))
    }

    fn root_id(&self) -> Result<PkgId, Error> {
        Ok(PkgId::from_location(&format!("file://{}", self.root.display()))?)
    }

    fn load_root(&self) -> Result<Manifest, Error> {
        let path = self.root.join(MANIFEST_FILE);
        let source = ManifestSource::from_file(&path)
            .map_err(|e| Error::RootManifest(path.clone(), LastError(e.to_string())))?;
        Ok(self.loader.load(&source, &LoadContext::new(self.root_id()?, None))?)
    }

    /// Reads the pin record, discarding it when it cannot be understood.
    fn load_pins(&self) -> Option<PinRecord> {
        match PinRecord::from_path(&self.root) {
            Ok(record) => record,
            Err(e) => {
                log::warn!("discarding corrupt {}: {}", LOCK_FILE, e);
                None
            }
        }
    }

    /// Reports the current phase from what is on disk, without contacting
    /// any repository.
    pub fn phase(&self) -> Result<Phase, Error> {
        let state = WorkspaceState::load(&self.get_workspace_dir());
        let root = self.load_root()?;
        Ok(self.current_phase(&state, &root))
    }

    fn current_phase(&self, state: &WorkspaceState, root: &Manifest) -> Phase {
        let edits: Vec<PkgId> = state.get_edits().into_keys().collect();
        if edits.is_empty() == false {
            return Phase::Editing(edits);
        }
        let pins = match self.load_pins() {
            Some(p) => p,
            None => return Phase::Unresolved,
        };
        // a pin that no longer meets the root requirement is stale
        let pinned = root.get_deps().iter().all(|d| match pins.get(d.get_id()) {
            Some(e) => d.get_requirement().allows(e.get_binding()),
            None => false,
        });
        let checked_out = pins.inner().iter().all(|e| match state.get(e.get_identity()) {
            Some(m) => {
                m.get_revision() == e.get_hash()
                    && self.get_workspace_dir().join(m.get_checkout()).exists() == true
            }
            None => false,
        });
        match pinned && checked_out {
            true => Phase::Resolved,
            false => Phase::Unresolved,
        }
    }

    /// Brings the pin record and the working copies in line with the root
    /// manifest, keeping existing pins wherever they still fit.
    pub fn resolve(&self) -> Result<PackageGraph, Error> {
        self.synchronize(false)
    }

    /// Re-resolves from scratch: existing pins are not preferred and branch
    /// heads are read again.
    pub fn update(&self) -> Result<PackageGraph, Error> {
        self.synchronize(true)
    }

    fn synchronize(&self, fresh: bool) -> Result<PackageGraph, Error> {
        let ws_dir = self.get_workspace_dir();
        let _lock = WorkspaceLock::acquire(&ws_dir)?;
        self.repo.begin_session();

        let root = self.load_root()?;
        let root_id = self.root_id()?;
        let mut state = WorkspaceState::load(&ws_dir);
        let edits = state.get_edits();
        let pins = self.load_pins();

        let catalog = Catalog::new(self.repo, self.loader).jobs(self.config.get_jobs());
        let previous = pins.as_ref().map(|p| Assignment::from(p).with_edits(&edits));

        let assignment = match (&previous, fresh) {
            (Some(prev), false) => {
                // a pinned branch stays at its pinned revision
                for e in pins.iter().flat_map(|p| p.inner()) {
                    catalog.pin_revision(e.get_identity(), e.get_binding(), e.get_hash().clone());
                }
                match resolver::validate(&catalog, &root, prev) {
                    Ok(()) => {
                        log::info!("reusing {} pins from {}", prev.len(), LOCK_FILE);
                        prev.clone()
                    }
                    Err(reason) => {
                        log::info!("resolving dependencies: {}", reason);
                        Resolver::new(&catalog)
                            .prefer(Some(prev))
                            .overrides(edits.clone())
                            .cancel(self.cancel.clone())
                            .resolve(&root)?
                    }
                }
            }
            _ => {
                log::info!("resolving dependencies");
                Resolver::new(&catalog)
                    .overrides(edits.clone())
                    .cancel(self.cancel.clone())
                    .resolve(&root)?
            }
        };

        let mut manifests = BTreeMap::new();
        let mut revisions: BTreeMap<PkgId, RevisionHash> = BTreeMap::new();
        for (id, resolved) in assignment.iter() {
            let loaded = catalog
                .get_manifest(id, resolved.get_location(), resolved.get_binding())
                .map_err(|e| ResolveError::ManifestLoadFailure {
                    id: id.clone(),
                    failures: vec![(resolved.get_binding().clone(), e)],
                })?;
            if let Some(rev) = loaded.get_revision() {
                revisions.insert(id.clone(), rev.clone());
            }
            manifests.insert(id.clone(), loaded.get_manifest().clone());
        }
        let graph = PackageGraph::build(&root_id, Arc::new(root), &assignment, &manifests)?;

        for (id, resolved) in assignment.iter() {
            // edited packages have no revision to check out
            let revision = match revisions.get(id) {
                Some(r) => r,
                None => continue,
            };
            if self.cancel.is_cancelled() == true {
                return Err(Error::Cancelled);
            }
            let dest = self.get_checkout_dir(id);
            let current = self.repo.current_revision(&dest).ok().flatten();
            if current.as_ref() == Some(revision) {
                log::debug!("{} is already at {}", id, revision);
                continue;
            }
            // record the target first so an interrupted checkout reads as unresolved
            state.insert(
                id.clone(),
                ManagedPackage::new(
                    resolved.get_location(),
                    checkout_subpath(id),
                    resolved.get_binding().clone(),
                    revision.clone(),
                ),
            );
            state.save(&ws_dir)?;
            filesystem::remove_dir(&dest)?;
            log::info!("checking out {} ({}) at {}", id, resolved.get_binding(), revision);
            self.repo
                .checkout(resolved.get_location(), revision, &dest)
                .map_err(|e| Error::CheckoutFailure {
                    id: id.clone(),
                    revision: revision.clone(),
                    reason: LastError(e.to_string()),
                })?;
        }

        let mut record = PinRecord::new();
        let mut next = WorkspaceState::new();
        for (id, resolved) in assignment.iter() {
            match revisions.get(id) {
                Some(rev) => {
                    if let Some(entry) = PinEntry::new(
                        id.clone(),
                        resolved.get_location(),
                        resolved.get_binding().clone(),
                        rev.clone(),
                    ) {
                        record.insert(entry);
                    }
                    next.insert(
                        id.clone(),
                        ManagedPackage::new(
                            resolved.get_location(),
                            checkout_subpath(id),
                            resolved.get_binding().clone(),
                            rev.clone(),
                        ),
                    );
                }
                // edited packages keep the pin they started from
                None => {
                    if let Some(entry) = pins.as_ref().and_then(|p| p.get(id)) {
                        record.insert(entry.clone());
                    }
                    if let Some(managed) = state.get(id) {
                        next.insert(id.clone(), managed.clone());
                    }
                }
            }
        }

        let rendered = record.to_string();
        let on_disk = std::fs::read_to_string(self.root.join(LOCK_FILE)).ok();
        if on_disk.as_deref() != Some(rendered.as_str()) {
            record.save_to_disk(&self.root)?;
            log::info!("wrote {} pins to {}", record.len(), LOCK_FILE);
        }

        for (id, old) in state.iter() {
            if next.get(id).is_none() {
                log::info!("removing working copy of {}", id);
                filesystem::remove_dir(&ws_dir.join(old.get_checkout()))?;
            }
        }
        next.save(&ws_dir)?;
        Ok(graph)
    }

    /// Replaces a managed package with a local working copy.
    ///
    /// Without a path, the current checkout is copied into the configured
    /// edits directory (an existing copy there is reused). The override takes
    /// effect on the next resolve.
    pub fn edit(&self, directive: EditDirective) -> Result<Phase, Error> {
        let ws_dir = self.get_workspace_dir();
        let _lock = WorkspaceLock::acquire(&ws_dir)?;
        let mut state = WorkspaceState::load(&ws_dir);
        let id = directive.get_identity();

        let managed = match state.get(id) {
            Some(m) => m.clone(),
            None => return Err(Error::NotManaged(id.clone(), Hint::ResolveFirst)),
        };
        if managed.is_edited() == true {
            return Err(Error::AlreadyEdited(id.clone(), Hint::UneditFirst));
        }
        let path = match directive.get_path() {
            Some(p) => {
                let p = filesystem::resolve_rel_path(&self.root, &p.to_string_lossy());
                if p.join(MANIFEST_FILE).exists() == false {
                    return Err(Error::EditPathMissing(p));
                }
                p
            }
            None => {
                let dest = self.config.get_edits(&self.root).join(id.get_name());
                if dest.join(MANIFEST_FILE).exists() == false {
                    let src = ws_dir.join(managed.get_checkout());
                    if src.join(MANIFEST_FILE).exists() == false {
                        return Err(Error::EditPathMissing(src));
                    }
                    filesystem::copy_dir(&src, &dest)
                        .map_err(|e| Error::CopyFailed(src.clone(), LastError(e.to_string())))?;
                }
                dest
            }
        };
        state.set_edited(id, Some(path.clone()));
        state.save(&ws_dir)?;
        log::info!("editing {} at {}", id, path.display());

        let root = self.load_root()?;
        Ok(self.current_phase(&state, &root))
    }

    /// Returns an edited package to pin-tracked resolution.
    ///
    /// The local directory is left untouched.
    pub fn unedit(&self, id: &PkgId) -> Result<Phase, Error> {
        let ws_dir = self.get_workspace_dir();
        let _lock = WorkspaceLock::acquire(&ws_dir)?;
        let mut state = WorkspaceState::load(&ws_dir);
        if state.get(id).map(|m| m.is_edited()) != Some(true) {
            return Err(Error::NotEdited(id.clone()));
        }
        state.set_edited(id, None);
        state.save(&ws_dir)?;
        log::info!("stopped editing {}", id);

        let root = self.load_root()?;
        Ok(self.current_phase(&state, &root))
    }

    /// Deletes every managed working copy and the workspace state.
    ///
    /// The pin record and edited directories are kept.
    pub fn reset(&self) -> Result<Phase, Error> {
        let ws_dir = self.get_workspace_dir();
        let _lock = WorkspaceLock::acquire(&ws_dir)?;
        filesystem::remove_dir(&ws_dir.join(CHECKOUTS_DIR))?;
        let state_file = ws_dir.join(STATE_FILE);
        if state_file.exists() == true {
            std::fs::remove_file(&state_file)?;
        }
        log::info!("removed all working copies");
        Ok(Phase::Unresolved)
    }
}
