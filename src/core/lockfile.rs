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

//! The pin record: the durable form of a resolved assignment.

use crate::core::pkgid::PkgId;
use crate::core::source::{Binding, RevisionHash};
use crate::core::version::Version;
use crate::util::filesystem;
use std::fmt::Display;
use std::path::Path;
use std::str::FromStr;
use toml_edit::{ArrayOfTables, Document, Item, Table};

pub const LOCK_FILE: &str = "Tether.lock";

const LOCK_VERSION: i64 = 1;

const HEADER: &str = "\
# This file is automatically generated by tether.
# It pins every dependency to an exact revision. Do not edit it manually.
";

pub trait FromToml {
    type Err;

    fn from_toml(table: &toml_edit::Table) -> Result<Self, Self::Err>
    where
        Self: Sized;
}

/// Entries kept in ascending identity order.
#[derive(Debug, PartialEq, Clone, Default)]
pub struct PinRecord(Vec<PinEntry>);

impl PinRecord {
    pub fn new() -> Self {
        Self(Vec::new())
    }

    /// Creates a record from `entries`, ordering them by identity.
    ///
    /// A later entry for the same identity replaces an earlier one.
    pub fn from_entries(entries: Vec<PinEntry>) -> Self {
        let mut record = Self::new();
        entries.into_iter().for_each(|e| record.insert(e));
        record
    }

    /// Adds or replaces the pin for the entry's identity.
    pub fn insert(&mut self, entry: PinEntry) {
        match self.0.binary_search_by(|e| e.identity.cmp(&entry.identity)) {
            Ok(i) => self.0[i] = entry,
            Err(i) => self.0.insert(i, entry),
        }
    }

    pub fn get(&self, id: &PkgId) -> Option<&PinEntry> {
        self.0
            .binary_search_by(|e| e.identity.cmp(id))
            .ok()
            .map(|i| &self.0[i])
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn inner(&self) -> &Vec<PinEntry> {
        &self.0
    }

    /// Loads the pin record from the `root` directory.
    ///
    /// Returns `None` when no record exists.
    pub fn from_path(root: &Path) -> Result<Option<Self>, PinRecordError> {
        let lock_file = root.join(LOCK_FILE);
        if lock_file.exists() == false {
            return Ok(None);
        }
        let contents =
            std::fs::read_to_string(&lock_file).map_err(|e| PinRecordError::Unreadable(e.to_string()))?;
        Ok(Some(Self::from_str(&contents)?))
    }

    /// Writes the record to the `root` directory, replacing any existing one
    /// in a single step.
    pub fn save_to_disk(&self, root: &Path) -> Result<(), std::io::Error> {
        filesystem::write_atomic(&root.join(LOCK_FILE), &self.to_string())
    }
}

impl FromStr for PinRecord {
    type Err = PinRecordError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let doc = s
            .parse::<Document>()
            .map_err(|e| PinRecordError::Syntax(e.to_string()))?;
        Self::from_toml(doc.as_table())
    }
}

impl FromToml for PinRecord {
    type Err = PinRecordError;

    fn from_toml(table: &toml_edit::Table) -> Result<Self, Self::Err> {
        match table.get("version").and_then(|v| v.as_integer()) {
            Some(LOCK_VERSION) => (),
            Some(n) => return Err(PinRecordError::UnsupportedVersion(n)),
            None => return Err(PinRecordError::MissingKey(PinSite(None), "version")),
        }
        let mut record = Self::new();
        // take array as tables
        if let Some(item) = table.get("pin") {
            match item.as_array_of_tables() {
                Some(arr) => {
                    for (i, tbl) in arr.iter().enumerate() {
                        let entry = PinEntry::from_toml(tbl).map_err(|e| e.at(i))?;
                        if record.get(&entry.identity).is_some() {
                            return Err(PinRecordError::Duplicate(entry.identity));
                        }
                        record.insert(entry);
                    }
                }
                None => return Err(PinRecordError::NotArrayOfTables),
            }
        }
        Ok(record)
    }
}

impl Display for PinRecord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut doc = Document::new();
        doc["version"] = toml_edit::value(LOCK_VERSION);
        let mut arr = ArrayOfTables::new();
        for entry in &self.0 {
            let mut tbl = Table::new();
            entry.to_toml(&mut tbl);
            arr.push(tbl);
        }
        if arr.is_empty() == false {
            doc["pin"] = Item::ArrayOfTables(arr);
        }
        write!(f, "{}{}", HEADER, doc)
    }
}

/// The pinned state of one package.
#[derive(Debug, PartialEq, Eq, Clone)]
pub struct PinEntry {
    identity: PkgId,
    location: String,
    binding: Binding,
    hash: RevisionHash,
}

impl PinEntry {
    /// Creates a new pin.
    ///
    /// Edited bindings are never pinned.
    pub fn new(identity: PkgId, location: &str, binding: Binding, hash: RevisionHash) -> Option<Self> {
        match binding.is_edited() {
            true => None,
            false => Some(Self {
                identity,
                location: location.to_string(),
                binding,
                hash,
            }),
        }
    }

    pub fn get_identity(&self) -> &PkgId {
        &self.identity
    }

    pub fn get_location(&self) -> &str {
        &self.location
    }

    pub fn get_binding(&self) -> &Binding {
        &self.binding
    }

    pub fn get_hash(&self) -> &RevisionHash {
        &self.hash
    }

    pub fn to_toml(&self, table: &mut toml_edit::Table) -> () {
        table["identity"] = toml_edit::value(self.identity.as_str());
        table["location"] = toml_edit::value(&self.location);
        match &self.binding {
            Binding::Version(v) => table["version"] = toml_edit::value(v.to_string()),
            Binding::Branch(b) => table["branch"] = toml_edit::value(b),
            Binding::Revision(r) => table["revision"] = toml_edit::value(r),
            Binding::Edited(_) => (),
        }
        table["hash"] = toml_edit::value(self.hash.as_str());
    }
}

fn get_str<'t>(table: &'t toml_edit::Table, key: &'static str) -> Result<Option<&'t str>, PinRecordError> {
    match table.get(key) {
        Some(item) => match item.as_str() {
            Some(s) => Ok(Some(s)),
            None => Err(PinRecordError::BadValue(PinSite(None), key, "expects a string".to_string())),
        },
        None => Ok(None),
    }
}

fn require_str<'t>(table: &'t toml_edit::Table, key: &'static str) -> Result<&'t str, PinRecordError> {
    get_str(table, key)?.ok_or(PinRecordError::MissingKey(PinSite(None), key))
}

impl FromToml for PinEntry {
    type Err = PinRecordError;

    fn from_toml(table: &toml_edit::Table) -> Result<Self, Self::Err> {
        let identity = PkgId::from_str(require_str(table, "identity")?)
            .map_err(|e| PinRecordError::BadValue(PinSite(None), "identity", e.to_string()))?;
        let location = require_str(table, "location")?;
        let binding = match (
            get_str(table, "version")?,
            get_str(table, "branch")?,
            get_str(table, "revision")?,
        ) {
            (Some(v), None, None) => Binding::Version(
                Version::from_str(v)
                    .map_err(|e| PinRecordError::BadValue(PinSite(None), "version", e.to_string()))?,
            ),
            (None, Some(b), None) => Binding::Branch(b.to_string()),
            (None, None, Some(r)) => Binding::Revision(r.to_string()),
            (None, None, None) => return Err(PinRecordError::MissingKey(PinSite(None), "version")),
            _ => {
                return Err(PinRecordError::BadValue(
                    PinSite(None),
                    "version",
                    "expects only one of version, branch, or revision".to_string(),
                ))
            }
        };
        let hash = RevisionHash::new(require_str(table, "hash")?);
        if hash.as_str().is_empty() == true {
            return Err(PinRecordError::BadValue(PinSite(None), "hash", "cannot be empty".to_string()));
        }
        Ok(Self {
            identity,
            location: location.to_string(),
            binding,
            hash,
        })
    }
}

#[derive(Debug, PartialEq, Clone, thiserror::Error)]
pub enum PinRecordError {
    #[error("failed to read pin record: {0}")]
    Unreadable(String),
    #[error("invalid syntax: {0}")]
    Syntax(String),
    #[error("unsupported pin record version {0}")]
    UnsupportedVersion(i64),
    #[error("expects \"pin\" to be an array of tables")]
    NotArrayOfTables,
    #[error("{0} is missing key {1:?}")]
    MissingKey(PinSite, &'static str),
    #[error("{0} has invalid {1:?}: {2}")]
    BadValue(PinSite, &'static str, String),
    #[error("package {0} is pinned more than once")]
    Duplicate(PkgId),
}

/// Where in the pin record a problem was found: an entry index or the top level.
#[derive(Debug, PartialEq, Clone, Copy)]
pub struct PinSite(pub Option<usize>);

impl Display for PinSite {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.0 {
            Some(i) => write!(f, "pin entry {}", i + 1),
            None => write!(f, "pin record"),
        }
    }
}

impl PinRecordError {
    /// Attaches the position of the entry that failed to parse.
    fn at(self, index: usize) -> Self {
        match self {
            Self::MissingKey(_, k) => Self::MissingKey(PinSite(Some(index)), k),
            Self::BadValue(_, k, r) => Self::BadValue(PinSite(Some(index)), k, r),
            other => other,
        }
    }
}
