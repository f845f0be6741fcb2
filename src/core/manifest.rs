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

use crate::core::pkgid::{PkgId, PkgIdError};
use crate::core::requirement::{Requirement, RequirementError};
use crate::core::source::{ManifestSource, RevisionHash};
use crate::util::anyerror::{AnyError, Fault};
use serde_derive::Deserialize;
use std::collections::{BTreeMap, HashSet};
use std::error::Error;
use std::fmt::Display;
use std::path::Path;
use std::str::FromStr;

pub const MANIFEST_FILE: &str = "Tether.toml";

pub trait FromFile: FromStr
where
    Self: Sized,
    <Self as std::str::FromStr>::Err: 'static + Error + Send + Sync,
{
    fn from_file(path: &Path) -> Result<Self, Fault> {
        // try to open the file in read-only mode
        let text = std::fs::read_to_string(&path)?;
        Ok(Self::from_str(&text)?)
    }
}

/// The immutable description of a package at one revision.
#[derive(Debug, PartialEq, Clone)]
pub struct Manifest {
    name: String,
    products: Vec<Product>,
    dependencies: Vec<Dependency>,
}

impl FromFile for Manifest {
    fn from_file(path: &Path) -> Result<Self, Fault> {
        let contents = std::fs::read_to_string(&path)?;
        match Self::from_str(&contents) {
            Ok(r) => Ok(r),
            Err(e) => Err(AnyError(format!(
                "failed to parse {} file: {}",
                path.display(),
                e
            )))?,
        }
    }
}

impl Manifest {
    pub fn get_name(&self) -> &str {
        &self.name
    }

    pub fn get_products(&self) -> &Vec<Product> {
        &self.products
    }

    pub fn get_product(&self, name: &str) -> Option<&Product> {
        self.products.iter().find(|p| p.get_name() == name)
    }

    pub fn has_product(&self, name: &str) -> bool {
        self.get_product(name).is_some()
    }

    /// Returns the dependency declarations in key order.
    pub fn get_deps(&self) -> &Vec<Dependency> {
        &self.dependencies
    }

    /// Finds the dependency declared under the key `name`.
    pub fn get_dep(&self, name: &str) -> Option<&Dependency> {
        self.dependencies.iter().find(|d| d.get_name() == name)
    }
}

#[derive(Debug, PartialEq, Eq, Clone)]
pub struct Product {
    name: String,
    modules: Vec<String>,
    dependencies: Vec<ProductRef>,
}

impl Product {
    pub fn get_name(&self) -> &str {
        &self.name
    }

    pub fn get_modules(&self) -> &Vec<String> {
        &self.modules
    }

    pub fn get_deps(&self) -> &Vec<ProductRef> {
        &self.dependencies
    }
}

/// A reference from a product to another product: `<product>` or
/// `<dependency>/<product>`.
#[derive(Debug, PartialEq, Eq, Clone, Hash)]
pub struct ProductRef {
    package: Option<String>,
    product: String,
}

impl ProductRef {
    pub fn get_package(&self) -> Option<&String> {
        self.package.as_ref()
    }

    pub fn get_product(&self) -> &str {
        &self.product
    }
}

impl FromStr for ProductRef {
    type Err = ManifestError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bad = || ManifestError::BadProductRef(s.to_string());
        match s.split_once('/') {
            Some((pkg, prod)) => {
                if pkg.is_empty() == true || prod.is_empty() == true || prod.contains('/') {
                    return Err(bad());
                }
                Ok(Self {
                    package: Some(pkg.to_string()),
                    product: prod.to_string(),
                })
            }
            None => match s.is_empty() {
                true => Err(bad()),
                false => Ok(Self {
                    package: None,
                    product: s.to_string(),
                }),
            },
        }
    }
}

impl Display for ProductRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.package {
            Some(p) => write!(f, "{}/{}", p, self.product),
            None => write!(f, "{}", self.product),
        }
    }
}

/// A declared dependency: where it comes from, which bindings are acceptable,
/// and optionally which of its products are used.
#[derive(Debug, PartialEq, Eq, Clone)]
pub struct Dependency {
    name: String,
    location: String,
    id: PkgId,
    requirement: Requirement,
    products: Option<Vec<String>>,
}

impl Dependency {
    pub fn new(name: &str, location: &str, requirement: Requirement) -> Result<Self, PkgIdError> {
        Ok(Self {
            name: name.to_string(),
            location: location.to_string(),
            id: PkgId::from_location(location)?,
            requirement,
            products: None,
        })
    }

    pub fn products(mut self, products: Option<Vec<String>>) -> Self {
        self.products = products;
        self
    }

    /// The key the dependency is declared under.
    pub fn get_name(&self) -> &str {
        &self.name
    }

    pub fn get_location(&self) -> &str {
        &self.location
    }

    pub fn get_id(&self) -> &PkgId {
        &self.id
    }

    pub fn get_requirement(&self) -> &Requirement {
        &self.requirement
    }

    pub fn get_products(&self) -> Option<&Vec<String>> {
        self.products.as_ref()
    }
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct RawManifest {
    package: RawPackage,
    #[serde(default)]
    product: Vec<RawProduct>,
    #[serde(default)]
    dependencies: BTreeMap<String, RawDependency>,
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct RawPackage {
    name: String,
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct RawProduct {
    name: String,
    #[serde(default)]
    modules: Vec<String>,
    #[serde(default)]
    dependencies: Vec<String>,
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct RawDependency {
    url: String,
    version: Option<String>,
    branch: Option<String>,
    revision: Option<String>,
    products: Option<Vec<String>>,
}

impl FromStr for Manifest {
    type Err = ManifestError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let raw: RawManifest =
            toml::from_str(s).map_err(|e| ManifestError::Syntax(e.to_string()))?;

        if raw.package.name.trim().is_empty() == true {
            return Err(ManifestError::EmptyName);
        }
        let mut seen = HashSet::new();
        let mut products = Vec::with_capacity(raw.product.len());
        for p in raw.product {
            if seen.insert(p.name.clone()) == false {
                return Err(ManifestError::DuplicateProduct(p.name));
            }
            products.push(Product {
                name: p.name,
                modules: p.modules,
                dependencies: p
                    .dependencies
                    .iter()
                    .map(|d| ProductRef::from_str(d))
                    .collect::<Result<Vec<ProductRef>, ManifestError>>()?,
            });
        }

        let mut dependencies = Vec::with_capacity(raw.dependencies.len());
        for (key, dep) in raw.dependencies {
            let requirement = match (dep.version, dep.branch, dep.revision) {
                (Some(v), None, None) => Requirement::from_str(&v).map_err(|e| {
                    ManifestError::BadRequirement(key.clone(), e)
                })?,
                (None, Some(b), None) => Requirement::Branch(b),
                (None, None, Some(r)) => Requirement::Revision(r),
                (None, None, None) => return Err(ManifestError::MissingRequirement(key)),
                _ => return Err(ManifestError::ConflictingRequirement(key)),
            };
            let dependency = Dependency::new(&key, &dep.url, requirement)
                .map_err(|e| ManifestError::BadLocation(key.clone(), e))?
                .products(dep.products);
            dependencies.push(dependency);
        }

        Ok(Self {
            name: raw.package.name,
            products,
            dependencies,
        })
    }
}

/// What the loader knows about the manifest it is asked to load.
#[derive(Debug, PartialEq, Clone)]
pub struct LoadContext {
    id: PkgId,
    revision: Option<RevisionHash>,
}

impl LoadContext {
    pub fn new(id: PkgId, revision: Option<RevisionHash>) -> Self {
        Self { id, revision }
    }

    pub fn get_id(&self) -> &PkgId {
        &self.id
    }

    /// The revision the manifest was read at; `None` for a local working copy.
    pub fn get_revision(&self) -> Option<&RevisionHash> {
        self.revision.as_ref()
    }
}

/// Turns raw manifest text into a [Manifest].
pub trait ManifestLoader: Send + Sync {
    fn load(&self, source: &ManifestSource, context: &LoadContext) -> Result<Manifest, ManifestError>;
}

/// Loads manifests written in the `Tether.toml` format.
#[derive(Debug, PartialEq, Clone, Default)]
pub struct TomlLoader;

impl TomlLoader {
    pub fn new() -> Self {
        Self
    }
}

impl ManifestLoader for TomlLoader {
    fn load(&self, source: &ManifestSource, _context: &LoadContext) -> Result<Manifest, ManifestError> {
        Manifest::from_str(source.get_contents())
    }
}

#[derive(Debug, PartialEq, Clone, thiserror::Error)]
pub enum ManifestError {
    #[error("invalid syntax: {0}")]
    Syntax(String),
    #[error("package name cannot be empty")]
    EmptyName,
    #[error("product {0:?} is declared more than once")]
    DuplicateProduct(String),
    #[error("invalid product reference {0:?}")]
    BadProductRef(String),
    #[error("dependency {0:?} must specify one of \"version\", \"branch\", or \"revision\"")]
    MissingRequirement(String),
    #[error("dependency {0:?} can only specify one of \"version\", \"branch\", or \"revision\"")]
    ConflictingRequirement(String),
    #[error("dependency {0:?} has an invalid version requirement: {1}")]
    BadRequirement(String, RequirementError),
    #[error("dependency {0:?} has an invalid url: {1}")]
    BadLocation(String, PkgIdError),
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::core::version::Version;

    const EX1: &str = r#"
[package]
name = "app"

[[product]]
name = "App"
modules = ["App", "AppSupport"]
dependencies = ["Logging", "utils/Strings"]

[dependencies]
logging = { url = "https://example.com/acme/logging.git", version = "[1.0.0, 2.0.0)", products = ["Logging"] }
utils = { url = "https://example.com/acme/utils.git", branch = "main" }
fmt = { url = "https://example.com/acme/fmt.git", revision = "4f3c2a1" }
"#;

    const EX2: &str = r#"
[package]
name = "tiny"
"#;

    #[test]
    fn from_str_full() {
        let man = Manifest::from_str(EX1).unwrap();
        assert_eq!(man.get_name(), "app");
        assert_eq!(man.get_products().len(), 1);
        let app = man.get_product("App").unwrap();
        assert_eq!(app.get_modules(), &vec!["App".to_string(), "AppSupport".to_string()]);
        assert_eq!(app.get_deps()[0].get_package(), None);
        assert_eq!(app.get_deps()[1].get_package(), Some(&"utils".to_string()));
        assert_eq!(app.get_deps()[1].to_string(), "utils/Strings");

        // dependencies are kept in key order
        let names: Vec<&str> = man.get_deps().iter().map(|d| d.get_name()).collect();
        assert_eq!(names, vec!["fmt", "logging", "utils"]);

        let logging = man.get_dep("logging").unwrap();
        assert_eq!(logging.get_id().as_str(), "example.com/acme/logging");
        assert_eq!(
            logging.get_requirement().allows_version(&Version::new().major(1).minor(3)),
            true
        );
        assert_eq!(logging.get_products(), Some(&vec!["Logging".to_string()]));
        assert_eq!(
            man.get_dep("utils").unwrap().get_requirement(),
            &Requirement::Branch("main".to_string())
        );
        assert_eq!(
            man.get_dep("fmt").unwrap().get_requirement(),
            &Requirement::Revision("4f3c2a1".to_string())
        );
    }

    #[test]
    fn from_str_minimal() {
        let man = Manifest::from_str(EX2).unwrap();
        assert_eq!(man.get_name(), "tiny");
        assert_eq!(man.get_deps().len(), 0);
        assert_eq!(man.has_product("tiny"), false);
    }

    #[test]
    fn from_str_errors() {
        let missing = "[package]\nname = \"a\"\n[dependencies]\nb = { url = \"x.com/b\" }\n";
        assert_eq!(
            Manifest::from_str(missing),
            Err(ManifestError::MissingRequirement("b".to_string()))
        );
        let both = "[package]\nname = \"a\"\n[dependencies]\nb = { url = \"x.com/b\", version = \"1.0.0\", branch = \"main\" }\n";
        assert_eq!(
            Manifest::from_str(both),
            Err(ManifestError::ConflictingRequirement("b".to_string()))
        );
        let unknown = "[package]\nname = \"a\"\nedition = \"2021\"\n";
        assert!(matches!(Manifest::from_str(unknown), Err(ManifestError::Syntax(_))));
        let dup = "[package]\nname = \"a\"\n[[product]]\nname = \"A\"\n[[product]]\nname = \"A\"\n";
        assert_eq!(
            Manifest::from_str(dup),
            Err(ManifestError::DuplicateProduct("A".to_string()))
        );
        let bad_ref = "[package]\nname = \"a\"\n[[product]]\nname = \"A\"\ndependencies = [\"b/\"]\n";
        assert_eq!(
            Manifest::from_str(bad_ref),
            Err(ManifestError::BadProductRef("b/".to_string()))
        );
        let bad_req = "[package]\nname = \"a\"\n[dependencies]\nb = { url = \"x.com/b\", version = \"[2.0.0, 1.0.0)\" }\n";
        assert!(matches!(
            Manifest::from_str(bad_req),
            Err(ManifestError::BadRequirement(_, _))
        ));
        let top = "[package]\nname = \"a\"\n[dependencies]\nb = { url = \"x.com/b\", version = \"18446744073709551615.0.0\" }\n";
        assert!(matches!(
            Manifest::from_str(top),
            Err(ManifestError::BadRequirement(_, _))
        ));
    }

    #[test]
    fn toml_loader() {
        let loader = TomlLoader::new();
        let ctx = LoadContext::new(PkgId::from_location("x.com/tiny").unwrap(), None);
        let man = loader.load(&ManifestSource::new(EX2.to_string()), &ctx).unwrap();
        assert_eq!(man.get_name(), "tiny");
        assert_eq!(ctx.get_revision(), None);
    }

    #[test]
    fn from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(MANIFEST_FILE);
        std::fs::write(&path, EX1).unwrap();
        assert_eq!(Manifest::from_file(&path).unwrap().get_name(), "app");
        std::fs::write(&path, "[package]").unwrap();
        assert!(Manifest::from_file(&path).is_err());
    }
}
