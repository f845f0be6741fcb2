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

//! Selection of one binding per package.

pub mod assignment;
pub mod conflict;
pub mod constraint;
pub mod search;
pub mod validate;

pub use assignment::{Assignment, Resolved};
pub use conflict::{Conflict, ResolveError};
pub use constraint::{Constraint, Requirer};
pub use search::Resolver;
pub use validate::{validate, Inconsistency};
