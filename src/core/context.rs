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

use std::env;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

pub const TETHER_HOME: &str = "TETHER_HOME";

/// Returns the tether home directory.
///
/// Uses the `TETHER_HOME` environment variable when set, otherwise
/// `$HOME/.tether`. The directory is not created.
pub fn home_dir() -> Option<PathBuf> {
    if let Ok(s) = env::var(TETHER_HOME) {
        if s.is_empty() == false {
            return Some(PathBuf::from(s));
        }
    }
    home::home_dir().map(|p| p.join(".tether"))
}

/// A shared flag for aborting a running session between steps.
///
/// Clones observe the same flag.
#[derive(Debug, Clone, Default)]
pub struct Cancellation(Arc<AtomicBool>);

impl Cancellation {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}
