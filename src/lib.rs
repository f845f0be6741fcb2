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

//! Dependency resolution, pinning and working-copy management for source
//! packages.
//!
//! A [Workspace] reads the root `Tether.toml`, resolves one binding per
//! reachable package, records the result in `Tether.lock`, and keeps a
//! working copy of each package under `.tether/checkouts/`.

pub mod core;
pub mod error;
pub mod util;

pub use crate::core::extgit::GitRepository;
pub use crate::core::manifest::{Manifest, ManifestLoader, TomlLoader};
pub use crate::core::memory::MemoryRepository;
pub use crate::core::pkggraph::{GraphError, PackageGraph};
pub use crate::core::pkgid::PkgId;
pub use crate::core::resolver::{Assignment, ResolveError, Resolver};
pub use crate::core::source::{Binding, Repository, RevisionHash};
pub use crate::core::workspace::{EditDirective, Phase, Workspace};
pub use crate::error::Error;
