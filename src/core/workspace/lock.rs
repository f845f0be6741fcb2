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

use fs2::FileExt;
use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};

pub const LOCK_NAME: &str = "lock";

/// An exclusive advisory lock over a workspace directory.
///
/// The lock is released when the value is dropped.
#[derive(Debug)]
pub struct WorkspaceLock {
    file: File,
    path: PathBuf,
}

impl WorkspaceLock {
    fn open(dir: &Path) -> Result<(File, PathBuf), std::io::Error> {
        std::fs::create_dir_all(dir)?;
        let path = dir.join(LOCK_NAME);
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&path)?;
        Ok((file, path))
    }

    /// Blocks until the lock inside `dir` is held.
    pub fn acquire(dir: &Path) -> Result<Self, std::io::Error> {
        let (file, path) = Self::open(dir)?;
        if file.try_lock_exclusive().is_err() {
            log::info!("waiting for another session to release {}", path.display());
            file.lock_exclusive()?;
        }
        Ok(Self { file, path })
    }

    /// Takes the lock inside `dir` only if no other session holds it.
    pub fn try_acquire(dir: &Path) -> Result<Option<Self>, std::io::Error> {
        let (file, path) = Self::open(dir)?;
        match file.try_lock_exclusive() {
            Ok(()) => Ok(Some(Self { file, path })),
            Err(e) if e.kind() == fs2::lock_contended_error().kind() => Ok(None),
            Err(e) => Err(e),
        }
    }

    pub fn get_path(&self) -> &Path {
        &self.path
    }
}

impl Drop for WorkspaceLock {
    fn drop(&mut self) {
        let _ = self.file.unlock();
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn exclusive_until_dropped() {
        let dir = tempfile::tempdir().unwrap();
        let first = WorkspaceLock::acquire(dir.path()).unwrap();
        assert_eq!(first.get_path(), dir.path().join(LOCK_NAME));
        assert!(WorkspaceLock::try_acquire(dir.path()).unwrap().is_none());
        drop(first);
        let second = WorkspaceLock::try_acquire(dir.path()).unwrap();
        assert!(second.is_some());
    }
}
