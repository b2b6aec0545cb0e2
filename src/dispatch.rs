//! Event Dispatcher: the steady-state loop
//!
//! One event is fully handled, every flag it carries, before the next one is
//! read. The loop ends on cancellation (success) or on a notification error
//! (fatal).

use std::fs;
use std::path::Path;

use tokio::runtime::{Handle, RuntimeFlavor};
use tokio_util::sync::CancellationToken;

use crate::entry::{self, EntryKind};
use crate::error::{fs_err, MirrorError, Outcome, SkipReason};
use crate::exclusion::{is_excluded, IgnoreMatcher};
use crate::logging::*;
use crate::reconcile::{TreeReconciler, WalkOutcome};
use crate::transfer::FileTransfer;
use crate::watch::{DirWatch, WatchEvent, WatchOp, WatchRegistry};

/// Applies watch events to the destination tree
pub struct EventDispatcher<'a, W: ?Sized> {
	transfer: &'a FileTransfer,
	matcher: &'a dyn IgnoreMatcher,
	watches: &'a mut W,
	// Interrupts subtree passes; `run` replaces it with its own token
	cancel: CancellationToken,
}

impl<'a, W: DirWatch + ?Sized> EventDispatcher<'a, W> {
	pub fn new(
		transfer: &'a FileTransfer,
		matcher: &'a dyn IgnoreMatcher,
		watches: &'a mut W,
	) -> Self {
		EventDispatcher { transfer, matcher, watches, cancel: CancellationToken::new() }
	}

	/// Handle a single event, running each flag it carries in order
	///
	/// The result is `Applied` if any flag changed the destination, otherwise
	/// the first skip reason.
	pub fn handle_event(&mut self, ev: &WatchEvent) -> Result<Outcome, MirrorError> {
		let rel = match self.transfer.roots().relative(&ev.path) {
			Some(rel) => rel,
			None => {
				debug!("Event outside source root: {}", ev.path.display());
				return Ok(Outcome::Skipped(SkipReason::Ignored));
			}
		};

		if is_excluded(self.matcher, rel) {
			debug!("Ignoring event {:?} on {}", ev.op, rel.display());
			return Ok(Outcome::Skipped(SkipReason::Ignored));
		}

		let mut outcomes = Vec::with_capacity(4);

		if ev.op.contains(WatchOp::CREATE) {
			outcomes.push(self.create_entry(rel)?);
		}

		if ev.op.contains(WatchOp::WRITE) {
			outcomes.push(self.transfer.copy(rel, true)?);
		}

		if ev.op.contains(WatchOp::REMOVE) {
			outcomes.push(self.remove_entry(rel)?);
		}

		if ev.op.contains(WatchOp::CHMOD) {
			outcomes.push(self.chmod_entry(rel)?);
		}

		if outcomes.iter().any(Outcome::is_applied) {
			return Ok(Outcome::Applied);
		}
		Ok(outcomes.first().cloned().unwrap_or(Outcome::Skipped(SkipReason::Absent)))
	}

	/// Mirror a newly created source entry
	///
	/// Regular files get an empty placeholder; the write event that follows
	/// supplies the content. A directory may arrive populated (moved in,
	/// renamed, or filled before its watch existed), so its whole subtree is
	/// reconciled and every nested directory joins the Watch Set.
	pub fn create_entry(&mut self, rel: &Path) -> Result<Outcome, MirrorError> {
		let roots = self.transfer.roots();
		let from = roots.source_path(rel);
		let to = roots.dest_path(rel);

		let meta = fs::symlink_metadata(&from).map_err(fs_err("stating", &from))?;

		match EntryKind::of(&meta) {
			EntryKind::Directory => {
				info!("Created directory {}", rel.display());
				let outcome = TreeReconciler::new(self.transfer, self.matcher).reconcile_subtree(
					rel,
					&mut *self.watches,
					&self.cancel,
				)?;
				if outcome == WalkOutcome::Cancelled {
					debug!("Subtree pass for {} cancelled", rel.display());
				}
				Ok(Outcome::Applied)
			}
			EntryKind::Symlink => entry::replicate_symlink(&from, &to),
			EntryKind::Regular => {
				if let Some(dst_meta) = entry::clear_for_regular(&to)? {
					if entry::is_fresh(&meta, &dst_meta) {
						return Ok(Outcome::Skipped(SkipReason::Fresh));
					}
				}

				let perms = entry::permissions_of(&meta);
				fs::OpenOptions::new()
					.write(true)
					.create(true)
					.truncate(true)
					.open(&to)
					.and_then(|f| f.set_permissions(perms))
					.map_err(fs_err("creating file", &to))?;

				info!("Created file {}", rel.display());
				Ok(Outcome::Applied)
			}
			other => Ok(Outcome::Skipped(SkipReason::Unsupported(other))),
		}
	}

	/// Drop the watch (if any) and delete the destination entry
	pub fn remove_entry(&mut self, rel: &Path) -> Result<Outcome, MirrorError> {
		let roots = self.transfer.roots();
		self.watches.remove(&roots.source_path(rel));

		info!("Remove {}", rel.display());
		entry::remove_entry(&roots.dest_path(rel))
	}

	/// Re-stat the source and apply its permission bits
	pub fn chmod_entry(&mut self, rel: &Path) -> Result<Outcome, MirrorError> {
		let roots = self.transfer.roots();
		let outcome = entry::sync_mode(&roots.source_path(rel), &roots.dest_path(rel))?;
		if outcome.is_applied() {
			info!("Chmod {}", rel.display());
		}
		Ok(outcome)
	}
}

impl<'a> EventDispatcher<'a, WatchRegistry> {
	/// Run until cancelled or until the notification subsystem fails
	pub async fn run(&mut self, cancel: &CancellationToken) -> Result<(), MirrorError> {
		self.cancel = cancel.clone();
		loop {
			let ev = {
				let (events, errors) = self.watches.streams();
				tokio::select! {
					biased;

					_ = cancel.cancelled() => {
						info!("Cancelled, stopping event loop");
						return Ok(());
					}
					err = errors.recv() => match err {
						Some(e) => return Err(e.into()),
						None => return Err(closed()),
					},
					ev = events.recv() => match ev {
						Some(ev) => ev,
						None => return Err(closed()),
					},
				}
			};

			if let Outcome::Skipped(reason) = run_blocking(|| self.handle_event(&ev))? {
				debug!("No change for {:?} on {}: {:?}", ev.op, ev.path.display(), reason);
			}
		}
	}
}

/// Run filesystem work without stalling other tasks on the worker
///
/// `block_in_place` is only available on the multi-threaded runtime; on a
/// current-thread runtime the work runs inline.
pub(crate) fn run_blocking<R>(f: impl FnOnce() -> R) -> R {
	match Handle::try_current() {
		Ok(handle) if handle.runtime_flavor() == RuntimeFlavor::MultiThread => {
			tokio::task::block_in_place(f)
		}
		_ => f(),
	}
}

fn closed() -> MirrorError {
	MirrorError::Other { message: "watch stream closed".to_string() }
}


// vim: ts=4
