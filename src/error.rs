//! Error and outcome types for mirror operations

use std::error::Error;
use std::fmt;
use std::io;
use std::path::{Path, PathBuf};

use crate::entry::EntryKind;

/// Main error type for mirror operations
#[derive(Debug)]
pub enum MirrorError {
	/// A filesystem operation failed on a path
	Fs { op: &'static str, path: PathBuf, source: io::Error },

	/// The notification subsystem failed
	Watch { path: Option<PathBuf>, source: notify::Error },

	/// The ignore file could not be loaded
	Ignore { path: PathBuf, message: String },

	/// Invalid configuration
	Config { message: String },

	/// Generic error message
	Other { message: String },
}

impl MirrorError {
	/// True when the underlying I/O error is "not found"
	pub fn is_not_found(&self) -> bool {
		match self {
			MirrorError::Fs { source, .. } => source.kind() == io::ErrorKind::NotFound,
			_ => false,
		}
	}
}

impl fmt::Display for MirrorError {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			MirrorError::Fs { op, path, source } => {
				write!(f, "{} {}: {}", op, path.display(), source)
			}
			MirrorError::Watch { path: Some(path), source } => {
				write!(f, "Watch error on {}: {}", path.display(), source)
			}
			MirrorError::Watch { path: None, source } => write!(f, "Watch error: {}", source),
			MirrorError::Ignore { path, message } => {
				write!(f, "Cannot load ignore file {}: {}", path.display(), message)
			}
			MirrorError::Config { message } => write!(f, "Invalid configuration: {}", message),
			MirrorError::Other { message } => write!(f, "{}", message),
		}
	}
}

impl Error for MirrorError {
	fn source(&self) -> Option<&(dyn Error + 'static)> {
		match self {
			MirrorError::Fs { source, .. } => Some(source),
			MirrorError::Watch { source, .. } => Some(source),
			_ => None,
		}
	}
}

impl From<notify::Error> for MirrorError {
	fn from(e: notify::Error) -> Self {
		let path = e.paths.first().cloned();
		MirrorError::Watch { path, source: e }
	}
}

/// Build a `map_err` adapter that attaches the attempted operation and path
pub fn fs_err<'a>(op: &'static str, path: &'a Path) -> impl FnOnce(io::Error) -> MirrorError + 'a {
	move |source| MirrorError::Fs { op, path: path.to_path_buf(), source }
}

/// Why an operation left the destination untouched
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
	/// Destination already matches the size/mtime heuristic
	Fresh,
	/// Path is excluded by the ignore rules
	Ignored,
	/// Source is a type that is never mirrored
	Unsupported(EntryKind),
	/// Destination parent directory does not exist yet
	MissingParent,
	/// Nothing was there to act on
	Absent,
}

/// Result of a single reconciliation action
///
/// Keeps "nothing to do" apart from "did something" so a benign skip is
/// never mistaken for a side effect, and an error is never swallowed as one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
	/// The destination was changed
	Applied,
	/// Benign no-op
	Skipped(SkipReason),
}

impl Outcome {
	pub fn is_applied(&self) -> bool {
		matches!(self, Outcome::Applied)
	}
}


// vim: ts=4
