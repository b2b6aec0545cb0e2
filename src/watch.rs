//! Watch Registry: directory subscriptions on top of `notify`
//!
//! Each source directory is watched non-recursively, so the set of watched
//! paths is exactly the Watch Set the engine maintains. Events and errors are
//! forwarded from the notify thread into two unbounded tokio channels.

use std::collections::HashSet;
use std::fmt;
use std::ops::{BitOr, BitOrAssign};
use std::path::{Path, PathBuf};

use notify::event::{ModifyKind, RenameMode};
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;

use crate::error::MirrorError;
use crate::logging::*;

/// Bitmask of change kinds carried by a [`WatchEvent`]
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct WatchOp(u8);

impl WatchOp {
	pub const CREATE: WatchOp = WatchOp(1);
	pub const WRITE: WatchOp = WatchOp(1 << 1);
	pub const REMOVE: WatchOp = WatchOp(1 << 2);
	pub const CHMOD: WatchOp = WatchOp(1 << 3);

	pub const fn empty() -> Self {
		WatchOp(0)
	}

	pub fn is_empty(&self) -> bool {
		self.0 == 0
	}

	pub fn contains(&self, other: WatchOp) -> bool {
		self.0 & other.0 == other.0 && !other.is_empty()
	}
}

impl BitOr for WatchOp {
	type Output = WatchOp;

	fn bitor(self, rhs: WatchOp) -> WatchOp {
		WatchOp(self.0 | rhs.0)
	}
}

impl BitOrAssign for WatchOp {
	fn bitor_assign(&mut self, rhs: WatchOp) {
		self.0 |= rhs.0;
	}
}

impl fmt::Debug for WatchOp {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		let names = [
			(WatchOp::CREATE, "CREATE"),
			(WatchOp::WRITE, "WRITE"),
			(WatchOp::REMOVE, "REMOVE"),
			(WatchOp::CHMOD, "CHMOD"),
		];
		let set: Vec<&str> =
			names.iter().filter(|(op, _)| self.contains(*op)).map(|(_, name)| *name).collect();
		if set.is_empty() {
			write!(f, "EMPTY")
		} else {
			write!(f, "{}", set.join("|"))
		}
	}
}

/// A change notification for one absolute source path
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WatchEvent {
	pub path: PathBuf,
	pub op: WatchOp,
}

impl WatchEvent {
	pub fn new(path: impl Into<PathBuf>, op: WatchOp) -> Self {
		WatchEvent { path: path.into(), op }
	}
}

/// Translate a notify event into zero or more watch events
///
/// Renames become a removal of the old name and a creation of the new one.
pub fn translate_event(event: Event) -> Vec<WatchEvent> {
	let op = match event.kind {
		EventKind::Create(_) => WatchOp::CREATE,
		EventKind::Remove(_) => WatchOp::REMOVE,
		EventKind::Modify(ModifyKind::Metadata(_)) => WatchOp::CHMOD,
		EventKind::Modify(ModifyKind::Name(mode)) => return translate_rename(mode, event.paths),
		EventKind::Modify(_) => WatchOp::WRITE,
		EventKind::Access(_) | EventKind::Any | EventKind::Other => return Vec::new(),
	};

	event.paths.into_iter().map(|path| WatchEvent::new(path, op)).collect()
}

fn translate_rename(mode: RenameMode, paths: Vec<PathBuf>) -> Vec<WatchEvent> {
	match mode {
		RenameMode::From => {
			paths.into_iter().map(|p| WatchEvent::new(p, WatchOp::REMOVE)).collect()
		}
		RenameMode::To => paths.into_iter().map(arrival).collect(),
		RenameMode::Both if paths.len() == 2 => {
			let mut paths = paths.into_iter();
			let mut out = Vec::with_capacity(2);
			if let Some(from) = paths.next() {
				out.push(WatchEvent::new(from, WatchOp::REMOVE));
			}
			if let Some(to) = paths.next() {
				out.push(arrival(to));
			}
			out
		}
		// Backend could not tell which side this is; decide by what exists now
		_ => paths
			.into_iter()
			.map(|p| match p.symlink_metadata() {
				Ok(_) => arrival(p),
				Err(_) => WatchEvent::new(p, WatchOp::REMOVE),
			})
			.collect(),
	}
}

// No data event follows a rename, so a regular file arriving under a new name
// must carry its content with it
fn arrival(path: PathBuf) -> WatchEvent {
	let op = match path.symlink_metadata() {
		Ok(meta) if meta.file_type().is_file() => WatchOp::CREATE | WatchOp::WRITE,
		_ => WatchOp::CREATE,
	};
	WatchEvent::new(path, op)
}

/// Directory subscription seam used by the reconciler and the dispatcher
pub trait DirWatch {
	/// Start watching the immediate children of `path`; idempotent
	fn add(&mut self, path: &Path) -> Result<(), MirrorError>;

	/// Stop watching `path` and every watched directory beneath it; a no-op
	/// for paths that were never added
	fn remove(&mut self, path: &Path);

	/// Whether `path` is currently in the Watch Set
	fn is_watched(&self, path: &Path) -> bool;
}

/// Wraps the OS notification facility and tracks the Watch Set
pub struct WatchRegistry {
	watcher: RecommendedWatcher,
	watched: HashSet<PathBuf>,
	events_rx: mpsc::UnboundedReceiver<WatchEvent>,
	errors_rx: mpsc::UnboundedReceiver<notify::Error>,
}

impl WatchRegistry {
	pub fn new() -> Result<Self, MirrorError> {
		let (events_tx, events_rx) = mpsc::unbounded_channel();
		let (errors_tx, errors_rx) = mpsc::unbounded_channel();

		let watcher = RecommendedWatcher::new(
			move |result: notify::Result<Event>| match result {
				Ok(event) => {
					for ev in translate_event(event) {
						if events_tx.send(ev).is_err() {
							debug!("Watch event dropped, registry is closed");
						}
					}
				}
				Err(e) => {
					if errors_tx.send(e).is_err() {
						debug!("Watch error dropped, registry is closed");
					}
				}
			},
			notify::Config::default(),
		)?;

		Ok(Self { watcher, watched: HashSet::new(), events_rx, errors_rx })
	}

	/// Number of directories currently watched
	pub fn len(&self) -> usize {
		self.watched.len()
	}

	pub fn is_empty(&self) -> bool {
		self.watched.is_empty()
	}

	/// Both receivers at once, for use in a single `select!`
	pub(crate) fn streams(
		&mut self,
	) -> (&mut mpsc::UnboundedReceiver<WatchEvent>, &mut mpsc::UnboundedReceiver<notify::Error>) {
		(&mut self.events_rx, &mut self.errors_rx)
	}
}

impl DirWatch for WatchRegistry {
	fn add(&mut self, path: &Path) -> Result<(), MirrorError> {
		if self.watched.contains(path) {
			return Ok(());
		}
		self.watcher.watch(path, RecursiveMode::NonRecursive).map_err(|source| {
			MirrorError::Watch { path: Some(path.to_path_buf()), source }
		})?;
		self.watched.insert(path.to_path_buf());
		Ok(())
	}

	fn remove(&mut self, path: &Path) {
		for dir in take_subtree(&mut self.watched, path) {
			// The kernel drops the watch by itself when the directory is deleted
			if let Err(e) = self.watcher.unwatch(&dir) {
				debug!("unwatch {}: {}", dir.display(), e);
			}
		}
	}

	fn is_watched(&self, path: &Path) -> bool {
		self.watched.contains(path)
	}
}

// Remove `top` and its descendants from the set, parents first
fn take_subtree(watched: &mut HashSet<PathBuf>, top: &Path) -> Vec<PathBuf> {
	let mut taken: Vec<PathBuf> = watched.iter().filter(|p| p.starts_with(top)).cloned().collect();
	taken.sort();
	for p in &taken {
		watched.remove(p);
	}
	taken
}

/// In-memory Watch Set for exercising the engine without OS notifications
#[derive(Debug, Default)]
pub struct RecordingWatch {
	watched: HashSet<PathBuf>,
	pub added: Vec<PathBuf>,
	pub removed: Vec<PathBuf>,
}

impl RecordingWatch {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn len(&self) -> usize {
		self.watched.len()
	}

	pub fn is_empty(&self) -> bool {
		self.watched.is_empty()
	}
}

impl DirWatch for RecordingWatch {
	fn add(&mut self, path: &Path) -> Result<(), MirrorError> {
		if self.watched.insert(path.to_path_buf()) {
			self.added.push(path.to_path_buf());
		}
		Ok(())
	}

	fn remove(&mut self, path: &Path) {
		let taken = take_subtree(&mut self.watched, path);
		self.removed.extend(taken);
	}

	fn is_watched(&self, path: &Path) -> bool {
		self.watched.contains(path)
	}
}


// vim: ts=4
