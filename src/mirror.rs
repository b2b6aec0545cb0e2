//! Engine entry point: initial reconciliation, ready marker, event loop

use std::fs;
use std::io;

use tokio_util::sync::CancellationToken;

use crate::config::MirrorConfig;
use crate::dispatch::{run_blocking, EventDispatcher};
use crate::error::{fs_err, MirrorError};
use crate::exclusion::{IgnoreFileMatcher, IgnoreMatcher, NoIgnore};
use crate::logging::*;
use crate::reconcile::{TreeReconciler, WalkOutcome};
use crate::roots::Roots;
use crate::transfer::FileTransfer;
use crate::watch::{DirWatch, WatchRegistry};

/// A configured one-way mirror from a source tree to a destination tree
pub struct Mirror {
	transfer: FileTransfer,
	matcher: Box<dyn IgnoreMatcher>,
	progress_every: usize,
}

impl Mirror {
	/// Resolve the configuration and load the ignore file, if any
	pub fn from_config(config: &MirrorConfig) -> Result<Self, MirrorError> {
		let roots = config.resolve()?;
		let matcher: Box<dyn IgnoreMatcher> = match &config.ignore_file {
			Some(path) => {
				let matcher = IgnoreFileMatcher::from_file(roots.source(), path)?;
				info!("Loaded {} ignore patterns from {}", matcher.len(), path.display());
				Box::new(matcher)
			}
			None => Box::new(NoIgnore),
		};
		Ok(Self::new(roots, matcher).progress_every(config.progress_every))
	}

	/// Build a mirror over already resolved roots
	///
	/// The source root must be the path notifications will report, i.e.
	/// canonical.
	pub fn new(roots: Roots, matcher: Box<dyn IgnoreMatcher>) -> Self {
		Mirror { transfer: FileTransfer::new(roots), matcher, progress_every: 100 }
	}

	pub fn progress_every(mut self, every: usize) -> Self {
		self.progress_every = every;
		self
	}

	pub fn roots(&self) -> &Roots {
		self.transfer.roots()
	}

	/// Mirror until `cancel` fires or an unrecoverable error occurs
	///
	/// Cancellation at any point is a clean `Ok(())`.
	pub async fn run(&self, cancel: &CancellationToken) -> Result<(), MirrorError> {
		self.clear_status()?;

		let mut registry = WatchRegistry::new()?;
		registry.add(self.roots().source())?;

		let stats = match run_blocking(|| self.reconcile(&mut registry, cancel))? {
			WalkOutcome::Completed(stats) => stats,
			WalkOutcome::Cancelled => return Ok(()),
		};
		debug!("Initial sync stats: {:?}", stats);

		self.touch_status()?;
		info!("Watching for events ({} directories)", registry.len());

		let mut dispatcher = EventDispatcher::new(&self.transfer, &*self.matcher, &mut registry);
		dispatcher.run(cancel).await
	}

	/// Run the initial reconciliation pass on its own
	pub fn reconcile<W: DirWatch + ?Sized>(
		&self,
		watches: &mut W,
		cancel: &CancellationToken,
	) -> Result<WalkOutcome, MirrorError> {
		TreeReconciler::new(&self.transfer, &*self.matcher)
			.progress_every(self.progress_every)
			.reconcile(watches, cancel)
	}

	fn clear_status(&self) -> Result<(), MirrorError> {
		let path = self.roots().status_path();
		match fs::remove_file(&path) {
			Ok(()) => {
				debug!("Removed stale {}", path.display());
				Ok(())
			}
			Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
			Err(e) => Err(fs_err("removing stale status marker", &path)(e)),
		}
	}

	fn touch_status(&self) -> Result<(), MirrorError> {
		let path = self.roots().status_path();
		fs::File::create(&path).map_err(fs_err("creating status marker", &path))?;
		Ok(())
	}
}


// vim: ts=4
