//! Configuration for the mirror engine
//!
//! The configuration follows a priority chain:
//! 1. Built-in defaults (MirrorConfig::default())
//! 2. Config file (TOML, given with `--config`)
//! 3. Environment variables (DIRMIRROR_* prefix)
//! 4. CLI flags (highest priority)

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{fs_err, MirrorError};
use crate::roots::Roots;

/// Name of the sentinel file created under the destination root once the
/// initial reconciliation has finished
pub const STATUS_MARKER: &str = ".synced";

/// Settings threaded through every engine component
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct MirrorConfig {
	/// Canonical source tree
	pub source: PathBuf,

	/// Tree kept in sync with the source
	pub dest: PathBuf,

	/// Optional file with patterns to ignore
	pub ignore_file: Option<PathBuf>,

	/// Log a progress marker once per this many directories during the
	/// initial walk
	pub progress_every: usize,

	/// Default log level when RUST_LOG is unset
	pub log_level: String,
}

impl Default for MirrorConfig {
	fn default() -> Self {
		MirrorConfig {
			source: PathBuf::from("/src"),
			dest: PathBuf::from("/dest"),
			ignore_file: None,
			progress_every: 100,
			log_level: "info".to_string(),
		}
	}
}

/// Values gathered from one configuration layer; `None` leaves the lower
/// layer in place
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConfigOverrides {
	pub source: Option<PathBuf>,
	pub dest: Option<PathBuf>,
	pub ignore_file: Option<PathBuf>,
	pub log_level: Option<String>,
}

impl ConfigOverrides {
	/// Read the DIRMIRROR_* environment variables
	pub fn from_env() -> Self {
		Self::from_lookup(|key| std::env::var(key).ok())
	}

	/// Read overrides through an arbitrary lookup (environment stand-in)
	pub fn from_lookup<F: Fn(&str) -> Option<String>>(lookup: F) -> Self {
		let non_empty = |key: &str| lookup(key).filter(|v| !v.is_empty());
		ConfigOverrides {
			source: non_empty("DIRMIRROR_SRC").map(PathBuf::from),
			dest: non_empty("DIRMIRROR_DEST").map(PathBuf::from),
			ignore_file: non_empty("DIRMIRROR_IGNORE").map(PathBuf::from),
			log_level: non_empty("DIRMIRROR_LOG"),
		}
	}
}

impl MirrorConfig {
	/// Parse a TOML config file
	pub fn from_toml_file(path: &Path) -> Result<Self, MirrorError> {
		let text = std::fs::read_to_string(path).map_err(fs_err("reading config", path))?;
		Self::from_toml_str(&text).map_err(|e| MirrorError::Config {
			message: format!("{}: {}", path.display(), e),
		})
	}

	pub fn from_toml_str(text: &str) -> Result<Self, toml::de::Error> {
		toml::from_str(text)
	}

	/// Apply one layer of overrides on top of this configuration
	pub fn apply(mut self, overrides: ConfigOverrides) -> Self {
		if let Some(source) = overrides.source {
			self.source = source;
		}
		if let Some(dest) = overrides.dest {
			self.dest = dest;
		}
		if overrides.ignore_file.is_some() {
			self.ignore_file = overrides.ignore_file;
		}
		if let Some(level) = overrides.log_level {
			self.log_level = level;
		}
		self
	}

	/// Check the settings against the filesystem and resolve the source root
	///
	/// The source is canonicalized so that notification paths, which are
	/// reported under the watched path, map back to relative paths.
	pub fn resolve(&self) -> Result<Roots, MirrorError> {
		let source = self.source.canonicalize().map_err(fs_err("resolving source", &self.source))?;
		if !source.is_dir() {
			return Err(MirrorError::Config {
				message: format!("source {} is not a directory", source.display()),
			});
		}

		let dest = absolute(&self.dest)?;
		let dest_resolved = resolve_existing_prefix(&dest);
		if dest_resolved == source {
			return Err(MirrorError::Config {
				message: format!("source and destination are the same: {}", source.display()),
			});
		}
		if dest_resolved.starts_with(&source) {
			return Err(MirrorError::Config {
				message: format!(
					"destination {} lies inside source {}",
					dest.display(),
					source.display()
				),
			});
		}

		Ok(Roots::new(source, dest))
	}
}

fn absolute(path: &Path) -> Result<PathBuf, MirrorError> {
	if path.is_absolute() {
		return Ok(path.to_path_buf());
	}
	let cwd = std::env::current_dir().map_err(fs_err("reading current directory", path))?;
	Ok(cwd.join(path))
}

// Canonicalize the longest existing ancestor; the destination itself may not
// exist yet
fn resolve_existing_prefix(path: &Path) -> PathBuf {
	let mut tail = Vec::new();
	let mut cur = path;
	loop {
		if let Ok(resolved) = cur.canonicalize() {
			return tail.iter().rev().fold(resolved, |acc, name| acc.join(name));
		}
		match (cur.parent(), cur.file_name()) {
			(Some(parent), Some(name)) => {
				tail.push(name.to_os_string());
				cur = parent;
			}
			_ => return path.to_path_buf(),
		}
	}
}


// vim: ts=4
