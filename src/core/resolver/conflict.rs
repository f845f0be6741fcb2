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

use super::constraint::{Constraint, Requirer};
use crate::core::pkgid::PkgId;
use crate::core::requirement::Requirement;
use crate::core::source::Binding;
use crate::core::version::Version;
use colored::Colorize;
use std::fmt::Display;

/// Why no binding of a package could be chosen.
#[derive(Debug, PartialEq, Clone)]
pub struct Conflict {
    id: PkgId,
    available: Vec<Version>,
    requirements: Vec<(Requirer, Requirement)>,
    missing: Vec<(Requirer, String)>,
    chosen: Option<Binding>,
}

impl Conflict {
    pub fn new(id: PkgId, constraints: &[Constraint]) -> Self {
        Self {
            id,
            available: Vec::new(),
            requirements: constraints
                .iter()
                .map(|c| (c.get_requirer().clone(), c.get_requirement().clone()))
                .collect(),
            missing: Vec::new(),
            chosen: None,
        }
    }

    /// Sets the versions that were available for the package.
    pub fn available(mut self, versions: &[Version]) -> Self {
        self.available = versions.to_vec();
        self.available.sort();
        self
    }

    /// Records the products the candidate `manifest` lacked for each requirer.
    pub fn missing(mut self, missing: Vec<(Requirer, String)>) -> Self {
        self.missing = missing;
        self
    }

    /// Records the binding the package was already fixed to.
    pub fn chosen(mut self, binding: Binding) -> Self {
        self.chosen = Some(binding);
        self
    }

    pub fn get_id(&self) -> &PkgId {
        &self.id
    }

    pub fn get_available(&self) -> &Vec<Version> {
        &self.available
    }

    /// Every (requirer, requirement) pair placed on the package.
    pub fn get_requirements(&self) -> &Vec<(Requirer, Requirement)> {
        &self.requirements
    }

    pub fn get_missing(&self) -> &Vec<(Requirer, String)> {
        &self.missing
    }

    pub fn get_chosen(&self) -> Option<&Binding> {
        self.chosen.as_ref()
    }

    /// Checks if `requirer` placed a requirement on the package.
    pub fn is_required_by(&self, requirer: &Requirer) -> bool {
        self.requirements.iter().any(|(r, _)| r == requirer)
    }

    /// Renders the full chain of requirements for display to a user.
    pub fn explain(&self) -> String {
        let mut text = format!("{} for {}", self.headline(), self.id.to_string().yellow());
        for (requirer, req) in &self.requirements {
            text.push_str(&format!("\n    {} requires {}", requirer, req.to_string().blue()));
        }
        for (requirer, product) in &self.missing {
            text.push_str(&format!(
                "\n    {} uses product {} which is not declared",
                requirer,
                product.red()
            ));
        }
        if let Some(b) = &self.chosen {
            text.push_str(&format!("\n    {} is fixed to {}", self.id, b));
        }
        if self.available.is_empty() == false {
            let list: Vec<String> = self.available.iter().map(|v| v.to_string()).collect();
            text.push_str(&format!("\n    available versions: {}", list.join(", ")));
        }
        text.push_str(&format!(
            "\n\n{}: relax one of the requirements above or edit {} locally",
            "hint".green(),
            self.id
        ));
        text
    }

    fn headline(&self) -> &'static str {
        match (self.missing.is_empty(), &self.chosen) {
            (false, _) => "missing products",
            (true, Some(_)) => "incompatible requirement",
            (true, None) => "no binding satisfies all requirements",
        }
    }
}

impl Display for Conflict {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} for {}", self.headline(), self.id)?;
        let reqs: Vec<String> = self
            .requirements
            .iter()
            .map(|(r, q)| format!("{} requires {}", r, q))
            .collect();
        if reqs.is_empty() == false {
            write!(f, ": {}", reqs.join("; "))?;
        }
        for (r, p) in &self.missing {
            write!(f, "; {} uses missing product {:?}", r, p)?;
        }
        Ok(())
    }
}

#[derive(Debug, PartialEq, Clone, thiserror::Error)]
pub enum ResolveError {
    #[error("{0}")]
    UnsatisfiableConstraint(Conflict),
    #[error("failed to load any manifest of {id}: {}", list_failures(.failures))]
    ManifestLoadFailure {
        id: PkgId,
        failures: Vec<(Binding, String)>,
    },
    #[error("failed to list versions of {id} at {location}: {reason}")]
    Unavailable {
        id: PkgId,
        location: String,
        reason: String,
    },
    #[error("resolution was cancelled")]
    Cancelled,
}

fn list_failures(failures: &[(Binding, String)]) -> String {
    failures
        .iter()
        .map(|(b, e)| format!("{} ({})", b, e))
        .collect::<Vec<String>>()
        .join(", ")
}

impl ResolveError {
    /// Renders the error with its full requirement chain.
    pub fn explain(&self) -> String {
        match self {
            Self::UnsatisfiableConstraint(c) => c.explain(),
            _ => self.to_string(),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::core::manifest::Dependency;
    use std::str::FromStr;

    fn conflict() -> Conflict {
        let a = Requirer::Package {
            id: PkgId::from_str("x.com/a").unwrap(),
            binding: Binding::Version(Version::from_str("1.0.0").unwrap()),
        };
        let cs = vec![
            Constraint::new(
                Requirer::Root,
                &Dependency::new("b", "x.com/b", Requirement::from_str("[1.0.0, 2.0.0)").unwrap())
                    .unwrap(),
            ),
            Constraint::new(
                a,
                &Dependency::new("b", "x.com/b", Requirement::from_str("[2.0.0, 3.0.0)").unwrap())
                    .unwrap(),
            ),
        ];
        Conflict::new(PkgId::from_str("x.com/b").unwrap(), &cs)
            .available(&[Version::from_str("2.1.0").unwrap(), Version::from_str("1.0.0").unwrap()])
    }

    #[test]
    fn display_names_every_requirer() {
        let text = ResolveError::UnsatisfiableConstraint(conflict()).to_string();
        assert_eq!(
            text,
            "no binding satisfies all requirements for x.com/b: root requires [1.0.0, 2.0.0); x.com/a (1.0.0) requires [2.0.0, 3.0.0)"
        );
    }

    #[test]
    fn explain_lists_chain() {
        colored::control::set_override(false);
        let text = conflict().explain();
        assert!(text.contains("\n    root requires [1.0.0, 2.0.0)"));
        assert!(text.contains("\n    x.com/a (1.0.0) requires [2.0.0, 3.0.0)"));
        assert!(text.contains("available versions: 1.0.0, 2.1.0"));
        assert!(text.contains("hint: "));
    }

    #[test]
    fn load_failure_message() {
        let err = ResolveError::ManifestLoadFailure {
            id: PkgId::from_str("x.com/a").unwrap(),
            failures: vec![(
                Binding::Version(Version::from_str("1.0.0").unwrap()),
                "invalid syntax".to_string(),
            )],
        };
        assert_eq!(
            err.to_string(),
            "failed to load any manifest of x.com/a: 1.0.0 (invalid syntax)"
        );
    }
}
