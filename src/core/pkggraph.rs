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

//! Composes the manifests of a resolved assignment into a validated graph of
//! packages and products.

use crate::core::manifest::Manifest;
use crate::core::pkgid::{self, PkgId};
use crate::core::resolver::Assignment;
use crate::core::source::Binding;
use crate::util::graph::{EdgeStatus, NodeIndex};
use crate::util::graphmap::GraphMap;
use std::collections::{BTreeMap, HashMap};
use std::fmt::Display;
use std::sync::Arc;

/// Names a product by its owning package.
#[derive(Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Clone)]
pub struct ProductId {
    package: PkgId,
    name: String,
}

impl ProductId {
    pub fn new(package: PkgId, name: &str) -> Self {
        Self {
            package,
            name: name.to_string(),
        }
    }

    pub fn get_package(&self) -> &PkgId {
        &self.package
    }

    pub fn get_name(&self) -> &str {
        &self.name
    }
}

impl Display for ProductId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.package, self.name)
    }
}

#[derive(Debug, PartialEq, Clone)]
pub struct PackageNode {
    id: PkgId,
    binding: Option<Binding>,
    manifest: Arc<Manifest>,
}

impl PackageNode {
    pub fn get_id(&self) -> &PkgId {
        &self.id
    }

    /// The declared package name.
    pub fn get_name(&self) -> &str {
        self.manifest.get_name()
    }

    /// The chosen binding; `None` for the root package.
    pub fn get_binding(&self) -> Option<&Binding> {
        self.binding.as_ref()
    }

    pub fn get_manifest(&self) -> &Manifest {
        &self.manifest
    }

    pub fn is_root(&self) -> bool {
        self.binding.is_none()
    }
}

#[derive(Debug, PartialEq, Clone)]
pub struct ProductNode {
    id: ProductId,
    modules: Vec<String>,
}

impl ProductNode {
    pub fn get_id(&self) -> &ProductId {
        &self.id
    }

    pub fn get_modules(&self) -> &Vec<String> {
        &self.modules
    }
}

#[derive(Debug, PartialEq, thiserror::Error)]
pub enum GraphError {
    #[error("packages {1} and {2} both use the name {0:?}")]
    NameCollision(String, PkgId, PkgId),
    #[error("dependency cycle detected: {}", .0.join(" -> "))]
    DependencyCycle(Vec<String>),
    #[error("{0} depends on {1} which has no resolved binding")]
    MissingDependency(PkgId, PkgId),
    #[error("{0} uses product {2:?} which {1} does not declare")]
    MissingProduct(PkgId, PkgId, String),
    #[error("product {0} references unknown product {1:?}")]
    UnknownProduct(ProductId, String),
    #[error("no manifest was provided for {0}")]
    MissingManifest(PkgId),
}

/// The read-only graph handed to build and IDE layers.
#[derive(Debug)]
pub struct PackageGraph {
    root: PkgId,
    packages: GraphMap<PkgId, PackageNode, ()>,
    products: GraphMap<ProductId, ProductNode, ()>,
    package_order: Vec<NodeIndex>,
    product_order: Vec<NodeIndex>,
    names: HashMap<String, PkgId>,
}

impl PackageGraph {
    /// Links the `root` manifest and every assigned package's manifest.
    ///
    /// `manifests` must hold the manifest of every package in `assignment`
    /// at its chosen binding.
    pub fn build(
        root_id: &PkgId,
        root: Arc<Manifest>,
        assignment: &Assignment,
        manifests: &BTreeMap<PkgId, Arc<Manifest>>,
    ) -> Result<Self, GraphError> {
        let mut packages: GraphMap<PkgId, PackageNode, ()> = GraphMap::new();
        let mut names: HashMap<String, PkgId> = HashMap::new();

        // the root comes first then every package in identity order
        let mut entries = vec![(root_id.clone(), None, root)];
        for (id, resolved) in assignment.iter() {
            let manifest = match manifests.get(id) {
                Some(m) => m.clone(),
                None => return Err(GraphError::MissingManifest(id.clone())),
            };
            entries.push((id.clone(), Some(resolved.get_binding().clone()), manifest));
        }
        for (id, binding, manifest) in entries {
            let name = pkgid::normalize_name(manifest.get_name());
            if let Some(other) = names.get(&name) {
                return Err(GraphError::NameCollision(
                    manifest.get_name().to_string(),
                    other.clone(),
                    id,
                ));
            }
            names.insert(name, id.clone());
            packages.add_node(
                id.clone(),
                PackageNode {
                    id,
                    binding,
                    manifest,
                },
            );
        }

        let mut edges = Vec::new();
        for i in 0..packages.get_graph().node_count() {
            let node = match packages.get_node_by_index(i) {
                Some(n) => n.as_ref(),
                None => continue,
            };
            for dep in node.get_manifest().get_deps() {
                let target = match packages.get_node_by_key(dep.get_id()) {
                    Some(t) => t,
                    None => {
                        return Err(GraphError::MissingDependency(
                            node.id.clone(),
                            dep.get_id().clone(),
                        ))
                    }
                };
                for product in dep.get_products().into_iter().flatten() {
                    if target.as_ref().get_manifest().has_product(product) == false {
                        return Err(GraphError::MissingProduct(
                            node.id.clone(),
                            dep.get_id().clone(),
                            product.clone(),
                        ));
                    }
                }
                edges.push((i, target.index()));
            }
        }
        for (source, target) in edges {
            if packages.add_edge_by_index(source, target, ()) == EdgeStatus::SelfLoop {
                let id = packages
                    .get_key_by_index(source)
                    .map(|k| k.to_string())
                    .unwrap_or_default();
                return Err(GraphError::DependencyCycle(vec![id.clone(), id]));
            }
        }

        let products = Self::link_products(&packages)?;

        let product_order = match products.get_graph().topological_sort() {
            Some(order) => order,
            None => return Err(Self::cycle(&products)),
        };
        let package_order = match packages.get_graph().topological_sort() {
            Some(order) => order,
            None => return Err(Self::cycle(&packages)),
        };
        Ok(Self {
            root: root_id.clone(),
            packages,
            products,
            package_order,
            product_order,
            names,
        })
    }

    /// Creates a node per declared product and connects product references.
    fn link_products(
        packages: &GraphMap<PkgId, PackageNode, ()>,
    ) -> Result<GraphMap<ProductId, ProductNode, ()>, GraphError> {
        let mut products: GraphMap<ProductId, ProductNode, ()> = GraphMap::new();
        let nodes: Vec<&PackageNode> = (0..packages.get_graph().node_count())
            .filter_map(|i| packages.get_node_by_index(i))
            .map(|n| n.as_ref())
            .collect();
        for node in &nodes {
            for p in node.get_manifest().get_products() {
                let id = ProductId::new(node.id.clone(), p.get_name());
                products.add_node(
                    id.clone(),
                    ProductNode {
                        id,
                        modules: p.get_modules().clone(),
                    },
                );
            }
        }
        for node in &nodes {
            let manifest = node.get_manifest();
            for p in manifest.get_products() {
                let source = ProductId::new(node.id.clone(), p.get_name());
                for r in p.get_deps() {
                    let owner = match r.get_package() {
                        None => Some(node.id.clone()),
                        Some(key) => manifest.get_dep(key).map(|d| d.get_id().clone()),
                    };
                    let target = owner.map(|o| ProductId::new(o, r.get_product()));
                    let status = target.and_then(|t| products.add_edge_by_key(&source, &t, ()));
                    match status {
                        None => return Err(GraphError::UnknownProduct(source, r.to_string())),
                        Some(EdgeStatus::SelfLoop) => {
                            return Err(GraphError::DependencyCycle(vec![
                                source.to_string(),
                                source.to_string(),
                            ]))
                        }
                        Some(_) => (),
                    }
                }
            }
        }
        Ok(products)
    }

    fn cycle<K: Eq + std::hash::Hash + Clone + Display, V>(graph: &GraphMap<K, V, ()>) -> GraphError {
        let path = graph.get_graph().find_cycle().unwrap_or_default();
        GraphError::DependencyCycle(
            path.iter()
                .filter_map(|i| graph.get_key_by_index(*i))
                .map(|k| k.to_string())
                .collect(),
        )
    }

    pub fn get_root(&self) -> Option<&PackageNode> {
        self.get_package(&self.root)
    }

    pub fn get_package(&self, id: &PkgId) -> Option<&PackageNode> {
        self.packages.get_node_by_key(id).map(|n| n.as_ref())
    }

    /// Finds a package by its declared name, ignoring case and `-`/`_`.
    pub fn find_by_name(&self, name: &str) -> Option<&PackageNode> {
        self.names
            .get(&pkgid::normalize_name(name))
            .and_then(|id| self.get_package(id))
    }

    pub fn get_product(&self, id: &ProductId) -> Option<&ProductNode> {
        self.products.get_node_by_key(id).map(|n| n.as_ref())
    }

    /// Iterates over the packages, dependencies first and the root last.
    pub fn packages(&self) -> impl Iterator<Item = &PackageNode> {
        self.package_order
            .iter()
            .filter_map(|i| self.packages.get_node_by_index(*i))
            .map(|n| n.as_ref())
    }

    /// Iterates over the products, dependencies first.
    pub fn products(&self) -> impl Iterator<Item = &ProductNode> {
        self.product_order
            .iter()
            .filter_map(|i| self.products.get_node_by_index(*i))
            .map(|n| n.as_ref())
    }

    /// Lists the packages `id` directly depends on in identity order.
    pub fn dependencies_of(&self, id: &PkgId) -> Vec<&PackageNode> {
        match self.packages.get_node_by_key(id) {
            Some(n) => self
                .packages
                .get_graph()
                .sorted_successors(n.index())
                .into_iter()
                .filter_map(|i| self.packages.get_node_by_index(i))
                .map(|n| n.as_ref())
                .collect(),
            None => Vec::new(),
        }
    }

    /// Lists the products `id` directly references.
    pub fn product_deps(&self, id: &ProductId) -> Vec<&ProductNode> {
        match self.products.get_node_by_key(id) {
            Some(n) => self
                .products
                .get_graph()
                .sorted_successors(n.index())
                .into_iter()
                .filter_map(|i| self.products.get_node_by_index(i))
                .map(|n| n.as_ref())
                .collect(),
            None => Vec::new(),
        }
    }

    /// Collects every product `id` needs, directly or not, dependencies first.
    pub fn product_closure(&self, id: &ProductId) -> Vec<&ProductNode> {
        match self.products.get_node_by_key(id) {
            Some(n) => self
                .products
                .get_graph()
                .reachable(n.index())
                .into_iter()
                .filter_map(|i| self.products.get_node_by_index(i))
                .map(|n| n.as_ref())
                .collect(),
            None => Vec::new(),
        }
    }

    /// Counts the packages including the root.
    pub fn len(&self) -> usize {
        self.package_order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.package_order.is_empty()
    }
}
