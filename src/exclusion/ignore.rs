//! Ignore file parsing and matching
//!
//! Uses the `ignore` crate (same as ripgrep) for gitignore-style pattern handling.

use super::IgnoreMatcher;
use crate::error::MirrorError;
use ignore::gitignore::{Gitignore, GitignoreBuilder};
use std::path::{Path, PathBuf};

/// Compiled pattern set loaded from a line-oriented ignore file
pub struct IgnoreFileMatcher {
	/// Compiled gitignore matcher, rooted at the source directory
	gitignore: Gitignore,
}

impl IgnoreFileMatcher {
	/// Load patterns from `ignore_file`, anchored at `source_root`
	pub fn from_file(source_root: &Path, ignore_file: &Path) -> Result<Self, MirrorError> {
		let patterns = IgnoreFileParser::parse_file(ignore_file)?;
		Self::from_patterns(source_root, &patterns).map_err(|e| match e {
			MirrorError::Ignore { message, .. } => {
				MirrorError::Ignore { path: ignore_file.to_path_buf(), message }
			}
			other => other,
		})
	}

	/// Compile an in-memory pattern list
	pub fn from_patterns<S: AsRef<str>>(
		source_root: &Path,
		patterns: &[S],
	) -> Result<Self, MirrorError> {
		let mut builder = GitignoreBuilder::new(source_root);
		for pattern in patterns {
			builder.add_line(None, pattern.as_ref()).map_err(|e| MirrorError::Ignore {
				path: PathBuf::new(),
				message: format!("bad pattern {:?}: {}", pattern.as_ref(), e),
			})?;
		}

		let gitignore = builder
			.build()
			.map_err(|e| MirrorError::Ignore { path: PathBuf::new(), message: e.to_string() })?;

		Ok(Self { gitignore })
	}

	/// Number of compiled patterns
	pub fn len(&self) -> usize {
		self.gitignore.num_ignores() as usize + self.gitignore.num_whitelists() as usize
	}

	pub fn is_empty(&self) -> bool {
		self.len() == 0
	}
}

impl IgnoreMatcher for IgnoreFileMatcher {
	fn matches(&self, rel: &Path) -> bool {
		if rel.as_os_str().is_empty() || rel.is_absolute() {
			return false;
		}

		// The kind of a removed path is unknown, so directory-only patterns
		// are applied to every path; parents are always checked as directories.
		self.gitignore.matched_path_or_any_parents(rel, true).is_ignore()
	}
}

/// Parser for individual ignore files
pub struct IgnoreFileParser;

impl IgnoreFileParser {
	/// Parse a single ignore file and return patterns
	pub fn parse_file(path: &Path) -> Result<Vec<String>, MirrorError> {
		let contents = std::fs::read_to_string(path).map_err(|e| MirrorError::Ignore {
			path: path.to_path_buf(),
			message: e.to_string(),
		})?;

		Ok(Self::parse_contents(&contents))
	}

	/// Parse ignore file contents
	pub fn parse_contents(contents: &str) -> Vec<String> {
		contents
			.lines()
			.filter_map(|line| {
				let line = line.trim();

				// Skip empty lines and comments
				if line.is_empty() || line.starts_with('#') {
					return None;
				}

				Some(line.to_string())
			})
			.collect()
	}
}


// vim: ts=4
