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

use crate::core::manifest::{Dependency, Manifest};
use crate::core::pkgid::PkgId;
use crate::core::requirement::Requirement;
use crate::core::source::Binding;
use std::fmt::Display;

/// Who placed a constraint.
#[derive(Debug, PartialEq, Eq, Clone, Hash)]
pub enum Requirer {
    Root,
    Package { id: PkgId, binding: Binding },
}

impl Requirer {
    pub fn get_id(&self) -> Option<&PkgId> {
        match self {
            Self::Root => None,
            Self::Package { id, .. } => Some(id),
        }
    }

    pub fn is_root(&self) -> bool {
        self == &Self::Root
    }
}

impl Display for Requirer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Root => write!(f, "root"),
            Self::Package { id, binding } => write!(f, "{} ({})", id, binding),
        }
    }
}

/// A requirement placed on one package by one requirer.
#[derive(Debug, PartialEq, Eq, Clone)]
pub struct Constraint {
    requirer: Requirer,
    requirement: Requirement,
    products: Option<Vec<String>>,
}

impl Constraint {
    pub fn new(requirer: Requirer, dep: &Dependency) -> Self {
        Self {
            requirer,
            requirement: dep.get_requirement().clone(),
            products: dep.get_products().cloned(),
        }
    }

    pub fn get_requirer(&self) -> &Requirer {
        &self.requirer
    }

    pub fn get_requirement(&self) -> &Requirement {
        &self.requirement
    }

    pub fn get_products(&self) -> Option<&Vec<String>> {
        self.products.as_ref()
    }

    /// Lists the requested products that `manifest` does not declare.
    pub fn missing_products<'c>(&'c self, manifest: &Manifest) -> Vec<&'c String> {
        match &self.products {
            Some(list) => list.iter().filter(|p| manifest.has_product(p) == false).collect(),
            None => Vec::new(),
        }
    }
}

/// Selects the constraints that decide which bindings are acceptable.
///
/// When the root asks for a branch or a revision, the root's constraints are
/// authoritative and the rest are not enforced.
pub fn effective(constraints: &[Constraint]) -> Vec<&Constraint> {
    let root_pins = constraints
        .iter()
        .any(|c| c.requirer.is_root() && c.requirement.is_version() == false);
    constraints
        .iter()
        .filter(|c| root_pins == false || c.requirer.is_root())
        .collect()
}

/// Checks if `binding` satisfies every effective constraint.
pub fn admits(constraints: &[Constraint], binding: &Binding) -> bool {
    effective(constraints)
        .iter()
        .all(|c| c.requirement.allows(binding))
}

/// Collects the distinct packages whose choices produced `constraints`.
pub fn requirers<'c>(constraints: &'c [Constraint]) -> impl Iterator<Item = &'c PkgId> {
    constraints.iter().filter_map(|c| c.requirer.get_id())
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::core::version::Version;
    use std::str::FromStr;

    fn dep(req: Requirement) -> Dependency {
        Dependency::new("a", "x.com/a", req).unwrap()
    }

    fn pkg(s: &str) -> Requirer {
        Requirer::Package {
            id: PkgId::from_str(s).unwrap(),
            binding: Binding::Version(Version::new().major(1)),
        }
    }

    #[test]
    fn root_branch_is_authoritative() {
        let cs = vec![
            Constraint::new(pkg("x.com/b"), &dep(Requirement::from_str("1.0.0").unwrap())),
            Constraint::new(Requirer::Root, &dep(Requirement::Branch("main".to_string()))),
        ];
        assert_eq!(effective(&cs).len(), 1);
        assert_eq!(admits(&cs, &Binding::Branch("main".to_string())), true);
        assert_eq!(admits(&cs, &Binding::Version(Version::new().major(1))), false);
    }

    #[test]
    fn mixed_kinds_without_root_disagree() {
        let cs = vec![
            Constraint::new(Requirer::Root, &dep(Requirement::from_str("1.0.0").unwrap())),
            Constraint::new(pkg("x.com/b"), &dep(Requirement::Branch("main".to_string()))),
        ];
        assert_eq!(effective(&cs).len(), 2);
        assert_eq!(admits(&cs, &Binding::Branch("main".to_string())), false);
        assert_eq!(admits(&cs, &Binding::Version(Version::new().major(1))), false);
        // edits are accepted regardless
        assert_eq!(admits(&cs, &Binding::Edited("Packages/a".into())), true);
        assert_eq!(requirers(&cs).count(), 1);
    }

    #[test]
    fn requirer_display() {
        assert_eq!(Requirer::Root.to_string(), "root");
        assert_eq!(pkg("https://x.com/b.git").to_string(), "x.com/b (1.0.0)");
    }
}
