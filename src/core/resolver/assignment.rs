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

use crate::core::lockfile::PinRecord;
use crate::core::pkgid::PkgId;
use crate::core::source::Binding;
use std::collections::BTreeMap;
use std::path::PathBuf;

/// The binding chosen for one package and where the package comes from.
#[derive(Debug, PartialEq, Eq, Clone)]
pub struct Resolved {
    location: String,
    binding: Binding,
}

impl Resolved {
    pub fn new(location: &str, binding: Binding) -> Self {
        Self {
            location: location.to_string(),
            binding,
        }
    }

    pub fn get_location(&self) -> &str {
        &self.location
    }

    pub fn get_binding(&self) -> &Binding {
        &self.binding
    }
}

/// One binding per package reachable from the root.
#[derive(Debug, PartialEq, Eq, Clone, Default)]
pub struct Assignment(BTreeMap<PkgId, Resolved>);

impl Assignment {
    pub fn new() -> Self {
        Self(BTreeMap::new())
    }

    pub fn insert(&mut self, id: PkgId, resolved: Resolved) -> Option<Resolved> {
        self.0.insert(id, resolved)
    }

    pub fn remove(&mut self, id: &PkgId) -> Option<Resolved> {
        self.0.remove(id)
    }

    pub fn get(&self, id: &PkgId) -> Option<&Resolved> {
        self.0.get(id)
    }

    pub fn get_binding(&self, id: &PkgId) -> Option<&Binding> {
        self.0.get(id).map(|r| &r.binding)
    }

    pub fn contains(&self, id: &PkgId) -> bool {
        self.0.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterates over the entries in identity order.
    pub fn iter(&self) -> impl Iterator<Item = (&PkgId, &Resolved)> {
        self.0.iter()
    }

    /// Replaces the bindings of the packages in `edits` with their local paths.
    ///
    /// Packages not in the assignment are left out.
    pub fn with_edits(mut self, edits: &BTreeMap<PkgId, PathBuf>) -> Self {
        for (id, path) in edits {
            if let Some(r) = self.0.get_mut(id) {
                r.binding = Binding::Edited(path.clone());
            }
        }
        self
    }
}

impl From<&PinRecord> for Assignment {
    fn from(record: &PinRecord) -> Self {
        Self(
            record
                .inner()
                .iter()
                .map(|e| {
                    (
                        e.get_identity().clone(),
                        Resolved::new(e.get_location(), e.get_binding().clone()),
                    )
                })
                .collect(),
        )
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::core::lockfile::PinEntry;
    use crate::core::source::RevisionHash;
    use crate::core::version::Version;
    use std::str::FromStr;

    #[test]
    fn from_pin_record() {
        let id = PkgId::from_str("x.com/a").unwrap();
        let binding = Binding::Version(Version::from_str("1.5.0").unwrap());
        let rec = PinRecord::from_entries(vec![PinEntry::new(
            id.clone(),
            "https://x.com/a.git",
            binding.clone(),
            RevisionHash::new("0a"),
        )
        .unwrap()]);
        let asg = Assignment::from(&rec);
        assert_eq!(asg.len(), 1);
        assert_eq!(asg.get_binding(&id), Some(&binding));
        assert_eq!(asg.get(&id).unwrap().get_location(), "https://x.com/a.git");
    }

    #[test]
    fn edits_replace_bindings() {
        let a = PkgId::from_str("x.com/a").unwrap();
        let b = PkgId::from_str("x.com/b").unwrap();
        let mut asg = Assignment::new();
        asg.insert(a.clone(), Resolved::new("x.com/a", Binding::Branch("main".to_string())));
        let mut edits = BTreeMap::new();
        edits.insert(a.clone(), PathBuf::from("Packages/a"));
        edits.insert(b.clone(), PathBuf::from("Packages/b"));
        let asg = asg.with_edits(&edits);
        assert_eq!(asg.get_binding(&a), Some(&Binding::Edited(PathBuf::from("Packages/a"))));
        assert_eq!(asg.contains(&b), false);
    }
}
