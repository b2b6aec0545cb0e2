//! Source/destination root pair and relative path mapping

use std::path::{Path, PathBuf};

use crate::config::STATUS_MARKER;

/// The two trees being mirrored
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Roots {
	source: PathBuf,
	dest: PathBuf,
}

impl Roots {
	pub fn new(source: impl Into<PathBuf>, dest: impl Into<PathBuf>) -> Self {
		Roots { source: source.into(), dest: dest.into() }
	}

	pub fn source(&self) -> &Path {
		&self.source
	}

	pub fn dest(&self) -> &Path {
		&self.dest
	}

	/// Path of `abs` relative to the source root, if it lies under it
	pub fn relative<'a>(&self, abs: &'a Path) -> Option<&'a Path> {
		abs.strip_prefix(&self.source).ok()
	}

	pub fn source_path(&self, rel: &Path) -> PathBuf {
		join(&self.source, rel)
	}

	pub fn dest_path(&self, rel: &Path) -> PathBuf {
		join(&self.dest, rel)
	}

	/// Path of the "initial sync complete" marker
	pub fn status_path(&self) -> PathBuf {
		self.dest.join(STATUS_MARKER)
	}
}

// Path::join("") appends a trailing separator, which changes lstat semantics
// for a root that is itself a symlink
fn join(root: &Path, rel: &Path) -> PathBuf {
	if rel.as_os_str().is_empty() {
		root.to_path_buf()
	} else {
		root.join(rel)
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_relative_mapping() {
		let roots = Roots::new("/src", "/dest");
		assert_eq!(roots.relative(Path::new("/src/a/b.txt")), Some(Path::new("a/b.txt")));
		assert_eq!(roots.relative(Path::new("/src")), Some(Path::new("")));
		assert_eq!(roots.relative(Path::new("/other/a")), None);
		assert_eq!(roots.dest_path(Path::new("a/b.txt")), PathBuf::from("/dest/a/b.txt"));
		assert_eq!(roots.dest_path(Path::new("")), PathBuf::from("/dest"));
		assert_eq!(roots.source_path(Path::new("")), PathBuf::from("/src"));
		assert_eq!(roots.status_path(), PathBuf::from("/dest/.synced"));
	}
}

// vim: ts=4
