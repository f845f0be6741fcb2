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

use crate::core::manifest::ManifestError;
use crate::core::pkggraph::GraphError;
use crate::core::pkgid::{PkgId, PkgIdError};
use crate::core::resolver::ResolveError;
use crate::core::source::RevisionHash;
use colored::Colorize;
use std::{fmt::Display, path::PathBuf};

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("{0}")]
    Resolve(ResolveError),
    #[error("invalid package graph: {0}")]
    Graph(#[from] GraphError),
    #[error("failed to check out {id} at revision {revision}: {reason}")]
    CheckoutFailure {
        id: PkgId,
        revision: RevisionHash,
        reason: LastError,
    },
    #[error("operation was cancelled")]
    Cancelled,
    #[error("package {0} is not managed by this workspace{1}")]
    NotManaged(PkgId, Hint),
    #[error("package {0} is already being edited{1}")]
    AlreadyEdited(PkgId, Hint),
    #[error("package {0} is not being edited")]
    NotEdited(PkgId),
    #[error("no manifest found for edited package at {0:?}")]
    EditPathMissing(PathBuf),
    #[error("failed to read manifest {0:?}: {1}")]
    RootManifest(PathBuf, LastError),
    #[error("invalid manifest: {0}")]
    Manifest(#[from] ManifestError),
    #[error("invalid package location: {0}")]
    Location(#[from] PkgIdError),
    #[error("failed to load configuration: {0}")]
    Config(LastError),
    #[error("failed to copy {0:?}: {1}")]
    CopyFailed(PathBuf, LastError),
    #[error("{0}")]
    Io(#[from] std::io::Error),
}

impl From<ResolveError> for Error {
    fn from(value: ResolveError) -> Self {
        match value {
            ResolveError::Cancelled => Self::Cancelled,
            e => Self::Resolve(e),
        }
    }
}

impl Error {
    pub fn lowerize(s: String) -> String {
        // get the first word
        let first_word = match s.split_whitespace().next() {
            Some(w) => w,
            None => return s,
        };
        // retain punctuation if the first word is all-caps and longer than 1 character
        if first_word.len() > 1
            && first_word
                .chars()
                .find(|c| c.is_ascii_lowercase() == true)
                .is_none()
        {
            s.to_string()
        } else {
            s.char_indices()
                .map(|(i, c)| if i == 0 { c.to_ascii_lowercase() } else { c })
                .collect()
        }
    }

    /// Renders the error with every requirement chain spelled out.
    pub fn explain(&self) -> String {
        match self {
            Self::Resolve(e) => e.explain(),
            _ => self.to_string(),
        }
    }
}

/// The message of an error raised by a collaborator.
#[derive(Debug, PartialEq, Clone)]
pub struct LastError(pub String);

impl Display for LastError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", Error::lowerize(self.0.to_string()))
    }
}

#[derive(Debug, PartialEq)]
pub enum Hint {
    ResolveFirst,
    UneditFirst,
}

impl Display for Hint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let message = match self {
            Self::ResolveFirst => "resolve the workspace so the package is pinned and checked out",
            Self::UneditFirst => "unedit the package before editing it from another path",
        };
        write!(
            f,
            "\n\n{}: {}",
            "hint".green(),
            Error::lowerize(message.to_string())
        )
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn lowerize() {
        assert_eq!(Error::lowerize("Failed to reach".to_string()), "failed to reach");
        assert_eq!(Error::lowerize("HTTP error".to_string()), "HTTP error");
        assert_eq!(Error::lowerize(String::new()), "");
    }

    #[test]
    fn cancelled_resolution_is_cancelled() {
        assert!(matches!(Error::from(ResolveError::Cancelled), Error::Cancelled));
    }

    #[test]
    fn checkout_failure_names_package() {
        colored::control::set_override(false);
        let err = Error::CheckoutFailure {
            id: PkgId::from_str("x.com/a").unwrap(),
            revision: RevisionHash::new("0a1b"),
            reason: LastError("Failed to reach x.com".to_string()),
        };
        assert_eq!(
            err.to_string(),
            "failed to check out x.com/a at revision 0a1b: failed to reach x.com"
        );
        let err = Error::NotManaged(PkgId::from_str("x.com/a").unwrap(), Hint::ResolveFirst);
        assert!(err.to_string().ends_with("hint: resolve the workspace so the package is pinned and checked out"));
    }
}
