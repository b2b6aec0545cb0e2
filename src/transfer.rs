//! Single-file content transfer from source to destination

use std::fs::OpenOptions;
use std::io;
use std::os::unix::fs::{OpenOptionsExt, PermissionsExt};
use std::path::Path;
use std::time::Instant;

use crate::entry::{permissions_of, EntryKind};
use crate::error::{fs_err, MirrorError, Outcome, SkipReason};
use crate::logging::*;
use crate::roots::Roots;

/// Copies regular file bytes and permission bits between the two roots
#[derive(Debug, Clone)]
pub struct FileTransfer {
	roots: Roots,
}

impl FileTransfer {
	pub fn new(roots: Roots) -> Self {
		FileTransfer { roots }
	}

	pub fn roots(&self) -> &Roots {
		&self.roots
	}

	/// Copy `rel` unconditionally
	///
	/// Devices, pipes, sockets and directories are refused as a benign skip.
	/// A missing destination parent is tolerated; the file is created when its
	/// directory shows up. `announce` logs the size and elapsed time.
	pub fn copy(&self, rel: &Path, announce: bool) -> Result<Outcome, MirrorError> {
		let from = self.roots.source_path(rel);
		let to = self.roots.dest_path(rel);

		// O_NONBLOCK keeps a FIFO from stalling the open; no effect on regular files
		let mut src = OpenOptions::new()
			.read(true)
			.custom_flags(libc::O_NONBLOCK)
			.open(&from)
			.map_err(fs_err("opening", &from))?;
		let meta = src.metadata().map_err(fs_err("stating", &from))?;

		let kind = EntryKind::of(&meta);
		if !kind.is_copyable() {
			warn!("Cowardly refusing to copy {}", kind.name());
			return Ok(Outcome::Skipped(SkipReason::Unsupported(kind)));
		}

		let perms = permissions_of(&meta);
		let mut dst = match OpenOptions::new()
			.write(true)
			.create(true)
			.truncate(true)
			.mode(perms.mode())
			.open(&to)
		{
			Ok(f) => f,
			Err(e) if e.kind() == io::ErrorKind::NotFound => {
				info!("Unable to copy to {}, doesn't exist", rel.display());
				return Ok(Outcome::Skipped(SkipReason::MissingParent));
			}
			Err(e) => return Err(fs_err("opening file for writing", &to)(e)),
		};
		// open() only applies the mode on creation, and through the umask
		dst.set_permissions(perms).map_err(fs_err("chmod", &to))?;

		// Zero-length sources (lock files) need no streaming
		if meta.len() == 0 {
			info!("File {} is 0 bytes, truncating", rel.display());
			return Ok(Outcome::Applied);
		}

		if announce {
			info!("Copying {} ({} bytes)", rel.display(), meta.len());
		}

		let start = Instant::now();
		io::copy(&mut src, &mut dst).map_err(fs_err("copying", &from))?;

		if announce {
			info!(" Copied {} ({:?} elapsed)", rel.display(), start.elapsed());
		}

		Ok(Outcome::Applied)
	}
}


// vim: ts=4
