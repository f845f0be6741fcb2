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

use super::assignment::Assignment;
use super::constraint::{self, Constraint, Requirer};
use crate::core::catalog::Catalog;
use crate::core::manifest::Manifest;
use crate::core::pkgid::PkgId;
use std::collections::{BTreeMap, VecDeque};
use std::sync::Arc;

/// Why an existing assignment no longer fits the requirements.
#[derive(Debug, PartialEq, Clone, thiserror::Error)]
pub enum Inconsistency {
    #[error("{0} is required but not pinned")]
    Missing(PkgId),
    #[error("{0} is pinned but no longer required")]
    Extra(PkgId),
    #[error("pinned {0} no longer satisfies its requirements")]
    Unsatisfied(PkgId),
    #[error("pinned {0} lacks product {1:?}")]
    MissingProduct(PkgId, String),
    #[error("manifest of pinned {0} could not be loaded: {1}")]
    Unloadable(PkgId, String),
}

/// Checks that `assignment` still satisfies every requirement reachable
/// from `root`, using only the manifests at the assigned bindings.
///
/// No version search happens here. The assignment must contain exactly the
/// reachable packages.
pub fn validate(catalog: &Catalog, root: &Manifest, assignment: &Assignment) -> Result<(), Inconsistency> {
    let mut constraints: BTreeMap<PkgId, Vec<Constraint>> = BTreeMap::new();
    let mut manifests: BTreeMap<PkgId, Arc<Manifest>> = BTreeMap::new();

    for dep in root.get_deps() {
        constraints
            .entry(dep.get_id().clone())
            .or_default()
            .push(Constraint::new(Requirer::Root, dep));
    }
    let mut frontier: VecDeque<PkgId> = root.get_deps().iter().map(|d| d.get_id().clone()).collect();
    // walk the pinned graph breadth-first, loading each manifest once
    while let Some(id) = frontier.pop_front() {
        if manifests.contains_key(&id) == true {
            continue;
        }
        let resolved = match assignment.get(&id) {
            Some(r) => r,
            None => return Err(Inconsistency::Missing(id)),
        };
        let loaded = catalog
            .get_manifest(&id, resolved.get_location(), resolved.get_binding())
            .map_err(|e| Inconsistency::Unloadable(id.clone(), e))?;
        let manifest = loaded.get_manifest().clone();
        let requirer = Requirer::Package {
            id: id.clone(),
            binding: resolved.get_binding().clone(),
        };
        for dep in manifest.get_deps() {
            constraints
                .entry(dep.get_id().clone())
                .or_default()
                .push(Constraint::new(requirer.clone(), dep));
            frontier.push_back(dep.get_id().clone());
        }
        manifests.insert(id, manifest);
    }

    for (id, cs) in &constraints {
        // every reachable package was loaded above
        let (binding, manifest) = match (assignment.get_binding(id), manifests.get(id)) {
            (Some(b), Some(m)) => (b, m),
            _ => return Err(Inconsistency::Missing(id.clone())),
        };
        if constraint::admits(cs, binding) == false {
            return Err(Inconsistency::Unsatisfied(id.clone()));
        }
        for c in cs {
            if let Some(p) = c.missing_products(manifest).first() {
                return Err(Inconsistency::MissingProduct(id.clone(), p.to_string()));
            }
        }
    }
    if let Some((extra, _)) = assignment.iter().find(|(id, _)| manifests.contains_key(*id) == false) {
        return Err(Inconsistency::Extra(extra.clone()));
    }
    Ok(())
}
