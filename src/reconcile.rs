//! Tree Reconciler: the initial full pass over the source tree
//!
//! Walks the source depth-first, parents before children, and brings each
//! destination entry into conformity. Every visited directory joins the Watch
//! Set; ignored directories are pruned without descending or watching.

use std::fs::{self, Metadata};
use std::path::Path;

use tokio_util::sync::CancellationToken;
use walkdir::WalkDir;

use crate::entry::{self, EntryKind};
use crate::error::{fs_err, MirrorError, Outcome};
use crate::exclusion::{is_excluded, IgnoreMatcher};
use crate::logging::*;
use crate::transfer::FileTransfer;
use crate::watch::DirWatch;

/// Counters collected during a reconciliation pass
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReconcileStats {
	/// Bytes of regular file content copied
	pub bytes_copied: u64,
	/// Regular files copied
	pub files_copied: u64,
	/// Regular files skipped by the staleness heuristic
	pub files_fresh: u64,
	/// Directories visited (and watched)
	pub dirs: u64,
	/// Symlinks recreated
	pub symlinks: u64,
	/// Devices, sockets and pipes passed over
	pub unsupported: u64,
	/// Entries pruned by the ignore rules
	pub ignored: u64,
}

/// How a reconciliation pass ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WalkOutcome {
	Completed(ReconcileStats),
	Cancelled,
}

/// Walks the source tree once and mirrors it into the destination
pub struct TreeReconciler<'a> {
	transfer: &'a FileTransfer,
	matcher: &'a dyn IgnoreMatcher,
	progress_every: usize,
}

impl<'a> TreeReconciler<'a> {
	pub fn new(transfer: &'a FileTransfer, matcher: &'a dyn IgnoreMatcher) -> Self {
		TreeReconciler { transfer, matcher, progress_every: 100 }
	}

	/// Log a progress marker once per this many directories
	pub fn progress_every(mut self, every: usize) -> Self {
		self.progress_every = every.max(1);
		self
	}

	/// Full pass over the source tree
	pub fn reconcile<W: DirWatch + ?Sized>(
		&self,
		watches: &mut W,
		cancel: &CancellationToken,
	) -> Result<WalkOutcome, MirrorError> {
		info!("Performing initial sync");

		let outcome = self.walk(Path::new(""), watches, cancel)?;
		match &outcome {
			WalkOutcome::Completed(stats) => info!("Initial sync done: {} bytes", stats.bytes_copied),
			WalkOutcome::Cancelled => info!("Initial sync cancelled"),
		}
		Ok(outcome)
	}

	/// Pass over the subtree rooted at `rel`, the directory itself included
	///
	/// Used for directories that show up with content already inside, e.g.
	/// moved in or renamed, since no per-child events will follow.
	pub fn reconcile_subtree<W: DirWatch + ?Sized>(
		&self,
		rel: &Path,
		watches: &mut W,
		cancel: &CancellationToken,
	) -> Result<WalkOutcome, MirrorError> {
		let outcome = self.walk(rel, watches, cancel)?;
		if let WalkOutcome::Completed(stats) = &outcome {
			debug!("Synced subtree {}: {:?}", rel.display(), stats);
		}
		Ok(outcome)
	}

	fn walk<W: DirWatch + ?Sized>(
		&self,
		top: &Path,
		watches: &mut W,
		cancel: &CancellationToken,
	) -> Result<WalkOutcome, MirrorError> {
		let roots = self.transfer.roots();
		let mut stats = ReconcileStats::default();
		let mut nprint = 0usize;

		let mut walker =
			WalkDir::new(roots.source_path(top)).follow_links(false).sort_by_file_name().into_iter();

		while let Some(item) = walker.next() {
			if cancel.is_cancelled() {
				return Ok(WalkOutcome::Cancelled);
			}

			let dent = item.map_err(|e| {
				let path = e.path().unwrap_or_else(|| roots.source()).to_path_buf();
				match e.into_io_error() {
					Some(source) => MirrorError::Fs { op: "walking", path, source },
					None => MirrorError::Other {
						message: format!("walking {}: filesystem loop", path.display()),
					},
				}
			})?;

			let path = dent.path();
			let rel = match roots.relative(path) {
				Some(rel) => rel,
				None => continue,
			};

			if is_excluded(self.matcher, rel) {
				debug!("Ignoring {}", rel.display());
				stats.ignored += 1;
				if dent.file_type().is_dir() {
					walker.skip_current_dir();
				}
				continue;
			}

			let meta = fs::symlink_metadata(path).map_err(fs_err("stating", path))?;

			match EntryKind::of(&meta) {
				EntryKind::Directory => {
					if nprint == 0 {
						info!("=> {}", path.display());
					}
					nprint = (nprint + 1) % self.progress_every;

					watches.add(path)?;
					entry::ensure_dir(&meta, &roots.dest_path(rel))?;
					stats.dirs += 1;
				}
				EntryKind::Symlink => {
					entry::replicate_symlink(path, &roots.dest_path(rel))?;
					stats.symlinks += 1;
				}
				EntryKind::Regular => self.reconcile_file(rel, &meta, &mut stats)?,
				other => {
					debug!("Skipping {} ({})", rel.display(), other.name());
					stats.unsupported += 1;
				}
			}
		}

		Ok(WalkOutcome::Completed(stats))
	}

	fn reconcile_file(
		&self,
		rel: &Path,
		src_meta: &Metadata,
		stats: &mut ReconcileStats,
	) -> Result<(), MirrorError> {
		let dst = self.transfer.roots().dest_path(rel);

		if let Some(dst_meta) = entry::clear_for_regular(&dst)? {
			if entry::is_fresh(src_meta, &dst_meta) {
				stats.files_fresh += 1;
				return Ok(());
			}
		}

		if self.transfer.copy(rel, false)? == Outcome::Applied {
			stats.files_copied += 1;
			stats.bytes_copied += src_meta.len();
		}
		Ok(())
	}
}


// vim: ts=4
