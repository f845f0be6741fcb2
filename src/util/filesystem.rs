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

use crate::util::anyerror::Fault;
use std::io::Write;
use std::path::{Path, PathBuf};

/// Replaces the file at `path` with `contents` in a single rename.
///
/// The data is first written and synced to a temporary file in the same
/// directory, so readers observe either the old file or the new one.
pub fn write_atomic(path: &Path, contents: &str) -> Result<(), std::io::Error> {
    let dir = match path.parent() {
        Some(p) if p.as_os_str().is_empty() == false => p.to_path_buf(),
        _ => PathBuf::from("."),
    };
    std::fs::create_dir_all(&dir)?;
    let mut temp = tempfile::NamedTempFile::new_in(&dir)?;
    temp.write_all(contents.as_bytes())?;
    temp.as_file().sync_all()?;
    temp.persist(path).map_err(|e| e.error)?;
    Ok(())
}

/// Copies the contents of the `src` directory into `dest`, creating `dest` if
/// it does not exist.
pub fn copy_dir(src: &Path, dest: &Path) -> Result<(), Fault> {
    std::fs::create_dir_all(dest)?;
    let mut options = fs_extra::dir::CopyOptions::new();
    options.content_only = true;
    options.overwrite = true;
    fs_extra::dir::copy(src, dest, &options)?;
    Ok(())
}

/// Removes the directory at `path` and everything inside it.
///
/// A missing directory is not an error.
pub fn remove_dir(path: &Path) -> Result<(), std::io::Error> {
    match path.exists() {
        true => std::fs::remove_dir_all(path),
        false => Ok(()),
    }
}

/// Resolves a relative path into a full path if given relative to some `root` path.
///
/// A leading `~` is expanded to the user's home directory.
pub fn resolve_rel_path(root: &Path, s: &str) -> PathBuf {
    if let Some(rest) = s.strip_prefix("~/") {
        if let Some(home) = home::home_dir() {
            return home.join(rest);
        }
    }
    let p = PathBuf::from(s);
    match p.is_relative() {
        true => root.join(p),
        false => p,
    }
}
