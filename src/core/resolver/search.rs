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

//! Depth-first search for a binding of every reachable package.
//!
//! Each level of the search picks the earliest discovered package that has no
//! binding yet and tries its candidates from most to least preferred. The
//! search state is a value: a level clones it before trying a candidate, so
//! giving up on a candidate is just dropping the clone.
//!
//! Failures carry the set of packages whose choices caused them. A level
//! whose package is not in that set cannot fix the failure by choosing
//! differently, so it passes the failure up immediately (a backjump).

use super::assignment::{Assignment, Resolved};
use super::conflict::{Conflict, ResolveError};
use super::constraint::{self, Constraint, Requirer};
use crate::core::catalog::Catalog;
use crate::core::context::Cancellation;
use crate::core::manifest::Manifest;
use crate::core::pkgid::PkgId;
use crate::core::requirement::Requirement;
use crate::core::source::Binding;
use std::collections::{BTreeMap, BTreeSet};
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Debug, Clone)]
struct Choice {
    binding: Binding,
    manifest: Arc<Manifest>,
}

#[derive(Debug, Clone, Default)]
struct State {
    /// Packages in order of discovery.
    order: Vec<PkgId>,
    locations: BTreeMap<PkgId, String>,
    constraints: BTreeMap<PkgId, Vec<Constraint>>,
    chosen: BTreeMap<PkgId, Choice>,
}

impl State {
    fn get_constraints(&self, id: &PkgId) -> &[Constraint] {
        self.constraints.get(id).map(|v| v.as_slice()).unwrap_or(&[])
    }

    fn get_location<'s>(&'s self, id: &'s PkgId) -> &'s str {
        self.locations.get(id).map(|s| s.as_str()).unwrap_or(id.as_str())
    }

    /// Returns the earliest discovered package without a binding.
    fn next_open(&self) -> Option<&PkgId> {
        self.order.iter().find(|id| self.chosen.contains_key(*id) == false)
    }

    /// Adds the dependencies declared in `manifest` on behalf of `requirer`.
    ///
    /// Returns the identities of the targets, in declaration order, with
    /// newly discovered ones flagged.
    fn merge(&mut self, requirer: &Requirer, manifest: &Manifest) -> Vec<(PkgId, bool)> {
        let mut targets = Vec::with_capacity(manifest.get_deps().len());
        for dep in manifest.get_deps() {
            let id = dep.get_id().clone();
            let fresh = self.locations.contains_key(&id) == false;
            if fresh == true {
                self.order.push(id.clone());
                self.locations.insert(id.clone(), dep.get_location().to_string());
            }
            self.constraints
                .entry(id.clone())
                .or_default()
                .push(Constraint::new(requirer.clone(), dep));
            targets.push((id, fresh));
        }
        targets
    }

    fn into_assignment(self) -> Assignment {
        let mut result = Assignment::new();
        for (id, choice) in self.chosen {
            let location = self
                .locations
                .get(&id)
                .cloned()
                .unwrap_or_else(|| id.to_string());
            result.insert(id, Resolved::new(&location, choice.binding));
        }
        result
    }
}

/// A failed branch of the search.
#[derive(Debug)]
struct Failure {
    culprits: BTreeSet<PkgId>,
    error: ResolveError,
}

impl Failure {
    fn new(error: ResolveError) -> Self {
        Self {
            culprits: BTreeSet::new(),
            error,
        }
    }

    fn blame<'i>(mut self, ids: impl IntoIterator<Item = &'i PkgId>) -> Self {
        self.culprits.extend(ids.into_iter().cloned());
        self
    }

    /// Cancellation ends the whole search.
    fn is_fatal(&self) -> bool {
        self.error == ResolveError::Cancelled
    }
}

pub struct Resolver<'c, 'a> {
    catalog: &'c Catalog<'a>,
    prefer: Option<&'c Assignment>,
    overrides: BTreeMap<PkgId, PathBuf>,
    cancel: Cancellation,
}

impl<'c, 'a> Resolver<'c, 'a> {
    pub fn new(catalog: &'c Catalog<'a>) -> Self {
        Self {
            catalog,
            prefer: None,
            overrides: BTreeMap::new(),
            cancel: Cancellation::new(),
        }
    }

    /// Biases the search toward the bindings in `previous`.
    pub fn prefer(mut self, previous: Option<&'c Assignment>) -> Self {
        self.prefer = previous;
        self
    }

    /// Fixes the listed packages to local working copies.
    pub fn overrides(mut self, edits: BTreeMap<PkgId, PathBuf>) -> Self {
        self.overrides = edits;
        self
    }

    pub fn cancel(mut self, token: Cancellation) -> Self {
        self.cancel = token;
        self
    }

    /// Computes one binding for every package reachable from `root`.
    pub fn resolve(&self, root: &Manifest) -> Result<Assignment, ResolveError> {
        let mut state = State::default();
        let targets = state.merge(&Requirer::Root, root);
        self.prefetch(&state, &targets);
        log::debug!("resolving {} root dependencies", targets.len());
        match self.search(state) {
            Ok(done) => Ok(done.into_assignment()),
            Err(f) => Err(f.error),
        }
    }

    fn search(&self, state: State) -> Result<State, Failure> {
        if self.cancel.is_cancelled() == true {
            return Err(Failure::new(ResolveError::Cancelled));
        }
        let id = match state.next_open() {
            Some(id) => id.clone(),
            None => return Ok(state),
        };
        let constraints = state.get_constraints(&id);
        let candidates = self.candidates(&state, &id)?;

        let mut culprits = BTreeSet::new();
        let mut first: Option<ResolveError> = None;
        let mut load_failures = Vec::new();

        for binding in candidates.iter() {
            let loaded = match self.catalog.get_manifest(&id, state.get_location(&id), binding) {
                Ok(l) => l,
                Err(e) => {
                    log::warn!("excluding {} {}: {}", id, binding, e);
                    load_failures.push((binding.clone(), e));
                    continue;
                }
            };
            let manifest = loaded.get_manifest().clone();

            // every product asked of the package must exist at this candidate
            let missing = missing_products(constraints, &manifest);
            if missing.is_empty() == false {
                log::debug!("skipping {} {}: missing products", id, binding);
                if first.is_none() {
                    first = Some(ResolveError::UnsatisfiableConstraint(
                        Conflict::new(id.clone(), constraints).missing(missing),
                    ));
                }
                continue;
            }

            log::debug!("trying {} {}", id, binding);
            let mut next = state.clone();
            let requirer = Requirer::Package {
                id: id.clone(),
                binding: binding.clone(),
            };
            next.chosen.insert(
                id.clone(),
                Choice {
                    binding: binding.clone(),
                    manifest: manifest.clone(),
                },
            );
            let targets = next.merge(&requirer, &manifest);

            let outcome = match self.forward_check(&next, &id, &targets) {
                Ok(()) => {
                    self.prefetch(&next, &targets);
                    self.search(next)
                }
                Err(f) => Err(f),
            };
            match outcome {
                Ok(done) => return Ok(done),
                Err(f) if f.is_fatal() == true => return Err(f),
                Err(f) if f.culprits.contains(&id) == false => {
                    log::debug!("backjumping over {}", id);
                    return Err(f);
                }
                Err(f) => {
                    culprits.extend(f.culprits);
                    if first.is_none() {
                        first = Some(f.error);
                    }
                }
            }
        }

        // every candidate failed; the choices that shaped this package's
        // candidate list are to blame along with whatever failed deeper
        culprits.remove(&id);
        let error = match first {
            Some(e) => e,
            None => ResolveError::ManifestLoadFailure {
                id: id.clone(),
                failures: load_failures,
            },
        };
        Err(Failure {
            culprits,
            error,
        }
        .blame(constraint::requirers(constraints)))
    }

    /// Lists the bindings worth trying for `id`, most preferred first.
    fn candidates(&self, state: &State, id: &PkgId) -> Result<Vec<Binding>, Failure> {
        let constraints = state.get_constraints(id);
        if let Some(path) = self.overrides.get(id) {
            return Ok(vec![Binding::Edited(path.clone())]);
        }
        let effective = constraint::effective(constraints);
        let conflict = || {
            Failure::new(ResolveError::UnsatisfiableConstraint(Conflict::new(
                id.clone(),
                constraints,
            )))
            .blame(constraint::requirers(constraints))
        };

        // branches and revisions name their single candidate
        let mut fixed = effective
            .iter()
            .filter(|c| c.get_requirement().is_version() == false)
            .map(|c| c.get_requirement());
        if let Some(first) = fixed.next() {
            let binding = match first {
                Requirement::Branch(b) => Binding::Branch(b.clone()),
                Requirement::Revision(r) => Binding::Revision(r.clone()),
                Requirement::Exact(_) | Requirement::Range(_) => return Err(conflict()),
            };
            return match constraint::admits(constraints, &binding) {
                true => Ok(vec![binding]),
                false => Err(conflict()),
            };
        }

        let versions = match self.catalog.get_versions(id, state.get_location(id)) {
            Ok(v) => v,
            Err(reason) => {
                return Err(Failure::new(ResolveError::Unavailable {
                    id: id.clone(),
                    location: state.get_location(id).to_string(),
                    reason,
                })
                .blame(constraint::requirers(constraints)))
            }
        };
        let mut list: Vec<Binding> = versions
            .iter()
            .filter(|v| {
                effective
                    .iter()
                    .all(|c| c.get_requirement().allows_version(v))
            })
            .map(|v| Binding::Version(v.clone()))
            .collect();
        if list.is_empty() == true {
            return Err(Failure::new(ResolveError::UnsatisfiableConstraint(
                Conflict::new(id.clone(), constraints).available(&versions),
            ))
            .blame(constraint::requirers(constraints)));
        }
        // try the previously pinned version first to keep churn low
        if let Some(pinned) = self.prefer.and_then(|p| p.get_binding(id)) {
            if let Some(i) = list.iter().position(|b| b == pinned) {
                let b = list.remove(i);
                list.insert(0, b);
            }
        }
        Ok(list)
    }

    /// Checks the targets that just received constraints from `chosen`.
    fn forward_check(&self, state: &State, chosen: &PkgId, targets: &[(PkgId, bool)]) -> Result<(), Failure> {
        let mut seen = BTreeSet::new();
        for (target, _) in targets {
            if seen.insert(target) == false {
                continue;
            }
            let constraints = state.get_constraints(target);
            match state.chosen.get(target) {
                // the new constraint must agree with a binding made earlier
                Some(choice) => {
                    let missing = missing_products(constraints, &choice.manifest);
                    if constraint::admits(constraints, &choice.binding) == false || missing.is_empty() == false {
                        return Err(Failure::new(ResolveError::UnsatisfiableConstraint(
                            Conflict::new(target.clone(), constraints)
                                .missing(missing)
                                .chosen(choice.binding.clone()),
                        ))
                        .blame([chosen, target])
                        .blame(constraint::requirers(constraints)));
                    }
                }
                None => match self.candidates(state, target) {
                    Ok(_) => (),
                    Err(f) => return Err(f.blame([chosen])),
                },
            }
        }
        Ok(())
    }

    /// Warms the catalog for packages discovered for the first time.
    fn prefetch(&self, state: &State, targets: &[(PkgId, bool)]) {
        let batch: Vec<(PkgId, String)> = targets
            .iter()
            .filter(|(id, fresh)| *fresh == true && self.overrides.contains_key(id) == false)
            .map(|(id, _)| (id.clone(), state.get_location(id).to_string()))
            .collect();
        if batch.len() > 1 {
            self.catalog.prefetch(&batch);
        }
    }
}

/// Pairs each requester with the products it asked for that `manifest` lacks.
fn missing_products(constraints: &[Constraint], manifest: &Manifest) -> Vec<(Requirer, String)> {
    constraints
        .iter()
        .flat_map(|c| {
            c.missing_products(manifest)
                .into_iter()
                .map(move |p| (c.get_requirer().clone(), p.clone()))
        })
        .collect()
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::core::manifest::TomlLoader;
    use crate::core::memory::{manifest_text, MemoryRepository};
    use crate::core::version::Version;
    use std::str::FromStr;

    const A: &str = "https://x.com/acme/a.git";
    const B: &str = "https://x.com/acme/b.git";
    const C: &str = "https://x.com/acme/c.git";
    const D: &str = "https://x.com/acme/d.git";
    const E: &str = "https://x.com/acme/e.git";

    fn id(s: &str) -> PkgId {
        PkgId::from_location(s).unwrap()
    }

    fn ver(s: &str) -> Binding {
        Binding::Version(Version::from_str(s).unwrap())
    }

    fn root(deps: &[(&str, &str, &str)]) -> Manifest {
        Manifest::from_str(&manifest_text("root", &[], deps)).unwrap()
    }

    fn publish(repo: &MemoryRepository, url: &str, version: &str, deps: &[(&str, &str, &str)]) {
        let name = id(url).get_name().to_string();
        repo.add_version(url, version, &manifest_text(&name, &[], deps))
            .unwrap();
    }

    fn resolve(repo: &MemoryRepository, root: &Manifest) -> Result<Assignment, ResolveError> {
        let loader = TomlLoader::new();
        let catalog = Catalog::new(repo, &loader);
        Resolver::new(&catalog).resolve(root)
    }

    #[test]
    fn latest_compatible_with_exact_dependency() {
        let repo = MemoryRepository::new();
        publish(&repo, A, "1.0.0", &[]);
        publish(&repo, A, "1.5.0", &[("b", B, "[1.0.0, 1.0.0]")]);
        publish(&repo, A, "2.0.0", &[]);
        publish(&repo, B, "1.0.0", &[]);
        publish(&repo, B, "1.1.0", &[]);

        let asg = resolve(&repo, &root(&[("a", A, "[1.0.0, 2.0.0)")])).unwrap();
        assert_eq!(asg.len(), 2);
        assert_eq!(asg.get_binding(&id(A)), Some(&ver("1.5.0")));
        assert_eq!(asg.get_binding(&id(B)), Some(&ver("1.0.0")));
        assert_eq!(asg.get(&id(A)).unwrap().get_location(), A);
    }

    #[test]
    fn conflict_names_every_requirer() {
        let repo = MemoryRepository::new();
        publish(&repo, A, "1.0.0", &[("b", B, "[2.0.0, 3.0.0)")]);
        publish(&repo, B, "1.0.0", &[]);
        publish(&repo, B, "2.0.0", &[]);

        let err = resolve(
            &repo,
            &root(&[("a", A, "[1.0.0, 2.0.0)"), ("b", B, "[1.0.0, 2.0.0)")]),
        )
        .unwrap_err();
        let conflict = match err {
            ResolveError::UnsatisfiableConstraint(c) => c,
            e => panic!("unexpected error {}", e),
        };
        assert_eq!(conflict.get_id(), &id(B));
        assert_eq!(conflict.is_required_by(&Requirer::Root), true);
        assert_eq!(
            conflict.is_required_by(&Requirer::Package {
                id: id(A),
                binding: ver("1.0.0")
            }),
            true
        );
        assert_eq!(conflict.get_requirements().len(), 2);
    }

    #[test]
    fn disjoint_root_requirements() {
        let repo = MemoryRepository::new();
        publish(&repo, A, "1.0.0", &[]);
        publish(&repo, A, "2.0.0", &[]);

        let err = resolve(
            &repo,
            &root(&[("a1", A, "[1.0.0, 2.0.0)"), ("a2", A, "[2.0.0, 3.0.0)")]),
        )
        .unwrap_err();
        match err {
            ResolveError::UnsatisfiableConstraint(c) => {
                assert_eq!(c.get_id(), &id(A));
                let reqs: Vec<String> = c
                    .get_requirements()
                    .iter()
                    .map(|(r, q)| format!("{} {}", r, q))
                    .collect();
                assert_eq!(reqs, vec!["root [1.0.0, 2.0.0)", "root [2.0.0, 3.0.0)"]);
            }
            e => panic!("unexpected error {}", e),
        }
    }

    #[test]
    fn backtracks_to_lower_candidate() {
        let repo = MemoryRepository::new();
        publish(&repo, A, "1.0.0", &[("c", C, "[1.0.0, 2.0.0)")]);
        publish(&repo, A, "2.0.0", &[("c", C, "[2.0.0, 3.0.0)")]);
        publish(&repo, C, "1.0.0", &[]);
        publish(&repo, C, "2.0.0", &[]);

        let asg = resolve(
            &repo,
            &root(&[("a", A, "[1.0.0, 3.0.0)"), ("c", C, "[1.0.0, 2.0.0)")]),
        )
        .unwrap();
        assert_eq!(asg.get_binding(&id(A)), Some(&ver("1.0.0")));
        assert_eq!(asg.get_binding(&id(C)), Some(&ver("1.0.0")));
    }

    #[test]
    fn backjumps_over_unrelated_choices() {
        let repo = MemoryRepository::new();
        publish(&repo, A, "1.0.0", &[("d", D, "[1.0.0, 2.0.0)")]);
        publish(&repo, A, "2.0.0", &[("d", D, "[2.0.0, 3.0.0)")]);
        publish(&repo, B, "1.0.0", &[]);
        publish(&repo, B, "2.0.0", &[]);
        publish(&repo, D, "1.0.0", &[]);
        publish(&repo, D, "2.0.0", &[("e", E, "[5.0.0, 6.0.0)")]);
        publish(&repo, E, "1.0.0", &[]);

        let asg = resolve(
            &repo,
            &root(&[("a", A, "[1.0.0, 3.0.0)"), ("b", B, "[1.0.0, 3.0.0)")]),
        )
        .unwrap();
        assert_eq!(asg.get_binding(&id(A)), Some(&ver("1.0.0")));
        assert_eq!(asg.get_binding(&id(B)), Some(&ver("2.0.0")));
        assert_eq!(asg.get_binding(&id(D)), Some(&ver("1.0.0")));
        assert_eq!(asg.contains(&id(E)), false);
        // b 1.0.0 was never tried: a 2.0.0, b 2.0.0, d 2.0.0, a 1.0.0, d 1.0.0
        assert_eq!(repo.fetch_count(), 5);
    }

    #[test]
    fn existing_pin_is_preferred() {
        let repo = MemoryRepository::new();
        publish(&repo, A, "1.0.0", &[]);
        publish(&repo, A, "1.2.0", &[]);
        let root = root(&[("a", A, "1.0.0")]);

        let mut previous = Assignment::new();
        previous.insert(id(A), Resolved::new(A, ver("1.0.0")));
        let loader = TomlLoader::new();
        let catalog = Catalog::new(&repo, &loader);
        let asg = Resolver::new(&catalog)
            .prefer(Some(&previous))
            .resolve(&root)
            .unwrap();
        assert_eq!(asg.get_binding(&id(A)), Some(&ver("1.0.0")));
        // without the bias the latest version wins
        let asg = Resolver::new(&catalog).resolve(&root).unwrap();
        assert_eq!(asg.get_binding(&id(A)), Some(&ver("1.2.0")));
    }

    #[test]
    fn stale_pin_is_not_forced() {
        let repo = MemoryRepository::new();
        publish(&repo, A, "1.0.0", &[]);
        publish(&repo, A, "2.1.0", &[]);
        let mut previous = Assignment::new();
        previous.insert(id(A), Resolved::new(A, ver("1.0.0")));
        let loader = TomlLoader::new();
        let catalog = Catalog::new(&repo, &loader);
        let asg = Resolver::new(&catalog)
            .prefer(Some(&previous))
            .resolve(&root(&[("a", A, "[2.0.0, 3.0.0)")]))
            .unwrap();
        assert_eq!(asg.get_binding(&id(A)), Some(&ver("2.1.0")));
    }

    #[test]
    fn branch_and_revision_requirements() {
        let repo = MemoryRepository::new();
        repo.add_branch(A, "main", &manifest_text("a", &[], &[])).unwrap();
        repo.add_commit(B, "4f3c2a1", &manifest_text("b", &[], &[])).unwrap();
        let asg = resolve(
            &repo,
            &root(&[("a", A, "branch=main"), ("b", B, "revision=4f3c2a1")]),
        )
        .unwrap();
        assert_eq!(asg.get_binding(&id(A)), Some(&Binding::Branch("main".to_string())));
        assert_eq!(asg.get_binding(&id(B)), Some(&Binding::Revision("4f3c2a1".to_string())));
    }

    #[test]
    fn root_branch_overrides_transitive_versions() {
        let repo = MemoryRepository::new();
        repo.add_branch(A, "main", &manifest_text("a", &[], &[])).unwrap();
        publish(&repo, B, "1.0.0", &[("a", A, "[1.0.0, 2.0.0)")]);
        let asg = resolve(&repo, &root(&[("a", A, "branch=main"), ("b", B, "1.0.0")])).unwrap();
        assert_eq!(asg.get_binding(&id(A)), Some(&Binding::Branch("main".to_string())));
        assert_eq!(asg.get_binding(&id(B)), Some(&ver("1.0.0")));
    }

    #[test]
    fn transitive_kinds_must_agree() {
        let repo = MemoryRepository::new();
        publish(&repo, A, "1.0.0", &[]);
        repo.add_branch(A, "main", &manifest_text("a", &[], &[])).unwrap();
        publish(&repo, B, "1.0.0", &[("a", A, "branch=main")]);
        let err = resolve(&repo, &root(&[("a", A, "1.0.0"), ("b", B, "1.0.0")])).unwrap_err();
        match err {
            ResolveError::UnsatisfiableConstraint(c) => assert_eq!(c.get_id(), &id(A)),
            e => panic!("unexpected error {}", e),
        }
    }

    #[test]
    fn candidates_missing_products_are_skipped() {
        let repo = MemoryRepository::new();
        repo.add_version(A, "1.1.0", &manifest_text("a", &["Core", "Extra"], &[]))
            .unwrap();
        repo.add_version(A, "1.2.0", &manifest_text("a", &["Core"], &[]))
            .unwrap();
        let root = Manifest::from_str(&format!(
            "[package]\nname = \"root\"\n[dependencies]\na = {{ url = \"{}\", version = \"1.0.0\", products = [\"Extra\"] }}\n",
            A
        ))
        .unwrap();
        let asg = resolve(&repo, &root).unwrap();
        assert_eq!(asg.get_binding(&id(A)), Some(&ver("1.1.0")));
    }

    #[test]
    fn edited_package_is_constant() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join(crate::core::manifest::MANIFEST_FILE),
            manifest_text("a", &["Core"], &[("b", B, "1.0.0")]),
        )
        .unwrap();
        let repo = MemoryRepository::new();
        publish(&repo, A, "1.0.0", &[]);
        publish(&repo, B, "1.0.0", &[]);
        let root = Manifest::from_str(&format!(
            "[package]\nname = \"root\"\n[dependencies]\na = {{ url = \"{}\", version = \"[7.0.0, 8.0.0)\", products = [\"Core\"] }}\n",
            A
        ))
        .unwrap();

        let mut edits = BTreeMap::new();
        edits.insert(id(A), dir.path().to_path_buf());
        let loader = TomlLoader::new();
        let catalog = Catalog::new(&repo, &loader);
        let asg = Resolver::new(&catalog)
            .overrides(edits.clone())
            .resolve(&root)
            .unwrap();
        assert_eq!(asg.get_binding(&id(A)), Some(&Binding::Edited(dir.path().to_path_buf())));
        // the edited manifest's own dependencies still take part
        assert_eq!(asg.get_binding(&id(B)), Some(&ver("1.0.0")));

        // without the override the version search applies again
        let err = Resolver::new(&catalog).resolve(&root).unwrap_err();
        assert!(matches!(err, ResolveError::UnsatisfiableConstraint(_)));
    }

    #[test]
    fn edited_package_must_provide_products() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join(crate::core::manifest::MANIFEST_FILE),
            manifest_text("a", &["Core"], &[]),
        )
        .unwrap();
        let repo = MemoryRepository::new();
        let root = Manifest::from_str(&format!(
            "[package]\nname = \"root\"\n[dependencies]\na = {{ url = \"{}\", version = \"1.0.0\", products = [\"Gui\"] }}\n",
            A
        ))
        .unwrap();
        let mut edits = BTreeMap::new();
        edits.insert(id(A), dir.path().to_path_buf());
        let loader = TomlLoader::new();
        let catalog = Catalog::new(&repo, &loader);
        let err = Resolver::new(&catalog).overrides(edits).resolve(&root).unwrap_err();
        match err {
            ResolveError::UnsatisfiableConstraint(c) => {
                assert_eq!(c.get_missing(), &vec![(Requirer::Root, "Gui".to_string())]);
            }
            e => panic!("unexpected error {}", e),
        }
    }

    #[test]
    fn broken_manifests_are_excluded() {
        let repo = MemoryRepository::new();
        publish(&repo, A, "1.0.0", &[]);
        repo.add_version(A, "1.1.0", "[package]\nname = 1\n").unwrap();
        let asg = resolve(&repo, &root(&[("a", A, "1.0.0")])).unwrap();
        assert_eq!(asg.get_binding(&id(A)), Some(&ver("1.0.0")));

        let repo = MemoryRepository::new();
        repo.add_version(A, "1.1.0", "[package]\nname = 1\n").unwrap();
        let err = resolve(&repo, &root(&[("a", A, "1.0.0")])).unwrap_err();
        match err {
            ResolveError::ManifestLoadFailure { id: failed, failures } => {
                assert_eq!(failed, id(A));
                assert_eq!(failures.len(), 1);
                assert_eq!(failures[0].0, ver("1.1.0"));
            }
            e => panic!("unexpected error {}", e),
        }
    }

    #[test]
    fn unknown_repository() {
        let repo = MemoryRepository::new();
        let err = resolve(&repo, &root(&[("a", A, "1.0.0")])).unwrap_err();
        assert!(matches!(err, ResolveError::Unavailable { .. }));
    }

    #[test]
    fn deterministic() {
        let repo = MemoryRepository::new();
        publish(&repo, A, "1.0.0", &[("c", C, "1.0.0"), ("d", D, "1.0.0")]);
        publish(&repo, B, "1.0.0", &[("c", C, "[1.1.0, 2.0.0)")]);
        publish(&repo, C, "1.0.0", &[]);
        publish(&repo, C, "1.1.0", &[("d", D, "[1.0.0, 1.1.0)")]);
        publish(&repo, C, "1.2.0", &[("d", D, "[1.1.0, 2.0.0)")]);
        publish(&repo, D, "1.0.0", &[]);
        publish(&repo, D, "1.1.0", &[]);
        let root = root(&[("a", A, "1.0.0"), ("b", B, "1.0.0")]);
        let first = resolve(&repo, &root).unwrap();
        let second = resolve(&repo, &root).unwrap();
        assert_eq!(first, second);
        assert_eq!(first.get_binding(&id(C)), Some(&ver("1.2.0")));
        assert_eq!(first.get_binding(&id(D)), Some(&ver("1.1.0")));
    }

    #[test]
    fn cancellation_stops_the_search() {
        let repo = MemoryRepository::new();
        publish(&repo, A, "1.0.0", &[]);
        let loader = TomlLoader::new();
        let catalog = Catalog::new(&repo, &loader);
        let token = Cancellation::new();
        token.cancel();
        let err = Resolver::new(&catalog)
            .cancel(token)
            .resolve(&root(&[("a", A, "1.0.0")]))
            .unwrap_err();
        assert_eq!(err, ResolveError::Cancelled);
    }
}
