//! Per-entry reconciliation policy shared by the tree walk and the event
//! dispatcher.
//!
//! Every decision re-stats the live filesystem; nothing here caches metadata.

use std::fs::{self, Metadata};
use std::io;
use std::os::unix::fs::{MetadataExt, PermissionsExt};
use std::path::Path;

use crate::error::{fs_err, MirrorError, Outcome, SkipReason};

/// File type of a source or destination entry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
	Directory,
	Regular,
	Symlink,
	Device,
	CharDevice,
	Pipe,
	Socket,
	Unknown,
}

impl EntryKind {
	/// Classify from the `S_IFMT` type bits of a mode value
	pub fn from_mode(mode: u32) -> Self {
		match mode & libc::S_IFMT as u32 {
			m if m == libc::S_IFDIR as u32 => EntryKind::Directory,
			m if m == libc::S_IFREG as u32 => EntryKind::Regular,
			m if m == libc::S_IFLNK as u32 => EntryKind::Symlink,
			m if m == libc::S_IFBLK as u32 => EntryKind::Device,
			m if m == libc::S_IFCHR as u32 => EntryKind::CharDevice,
			m if m == libc::S_IFIFO as u32 => EntryKind::Pipe,
			m if m == libc::S_IFSOCK as u32 => EntryKind::Socket,
			_ => EntryKind::Unknown,
		}
	}

	pub fn of(meta: &Metadata) -> Self {
		Self::from_mode(meta.mode())
	}

	/// Kinds whose bytes may be streamed
	pub fn is_copyable(&self) -> bool {
		matches!(self, EntryKind::Regular | EntryKind::Symlink)
	}

	pub fn name(&self) -> &'static str {
		match self {
			EntryKind::Directory => "directory",
			EntryKind::Regular => "regular file",
			EntryKind::Symlink => "symlink",
			EntryKind::Device => "devices",
			EntryKind::CharDevice => "character devices",
			EntryKind::Pipe => "named pipe",
			EntryKind::Socket => "socket",
			EntryKind::Unknown => "unknown file type",
		}
	}
}

/// Permission bits of a metadata value, without the type bits
pub fn permissions_of(meta: &Metadata) -> fs::Permissions {
	fs::Permissions::from_mode(meta.mode() & 0o7777)
}

/// `lstat` that maps "not found" to `None`
pub fn lstat(path: &Path) -> Result<Option<Metadata>, MirrorError> {
	match fs::symlink_metadata(path) {
		Ok(meta) => Ok(Some(meta)),
		Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
		Err(e) => Err(fs_err("stating", path)(e)),
	}
}

/// Size/mtime staleness heuristic
///
/// The destination is considered up to date only when its size equals the
/// source size and its mtime is at or after the source mtime.
pub fn is_fresh(src: &Metadata, dst: &Metadata) -> bool {
	if src.len() != dst.len() {
		return false;
	}
	(dst.mtime(), dst.mtime_nsec()) >= (src.mtime(), src.mtime_nsec())
}

/// Create a directory with the given permissions
///
/// `fs::create_dir` is subject to the umask, so the mode is applied again
/// after creation.
fn make_dir(dst: &Path, src_meta: &Metadata) -> Result<(), MirrorError> {
	fs::create_dir(dst).map_err(fs_err("making a directory", dst))?;
	fs::set_permissions(dst, permissions_of(src_meta)).map_err(fs_err("chmod", dst))
}

/// Bring a destination directory in line with its source directory
pub fn ensure_dir(src_meta: &Metadata, dst: &Path) -> Result<Outcome, MirrorError> {
	match lstat(dst)? {
		None => make_dir(dst, src_meta)?,
		Some(meta) if !meta.is_dir() => {
			remove_path(dst, &meta).map_err(fs_err("removing errant non-dir", dst))?;
			make_dir(dst, src_meta)?;
		}
		Some(meta) => {
			if meta.mode() & 0o7777 == src_meta.mode() & 0o7777 {
				return Ok(Outcome::Skipped(SkipReason::Fresh));
			}
			fs::set_permissions(dst, permissions_of(src_meta)).map_err(fs_err("chmod", dst))?;
		}
	}
	Ok(Outcome::Applied)
}

/// Recreate `dst` as a symlink with the same target as `src`
///
/// Targets are copied verbatim, never resolved.
pub fn replicate_symlink(src: &Path, dst: &Path) -> Result<Outcome, MirrorError> {
	let target = fs::read_link(src).map_err(fs_err("reading link from", src))?;

	if let Some(meta) = lstat(dst)? {
		if meta.file_type().is_symlink() {
			if let Ok(current) = fs::read_link(dst) {
				if current == target {
					return Ok(Outcome::Skipped(SkipReason::Fresh));
				}
			}
		}
		remove_path(dst, &meta).map_err(fs_err("removing before symlinking", dst))?;
	}

	std::os::unix::fs::symlink(&target, dst).map_err(fs_err("symlinking", dst))?;
	Ok(Outcome::Applied)
}

/// Make room for a regular file at `dst`
///
/// A destination that exists but is not a regular file is removed along with
/// any subtree. Returns the destination metadata when a regular file remains.
pub fn clear_for_regular(dst: &Path) -> Result<Option<Metadata>, MirrorError> {
	match lstat(dst)? {
		Some(meta) if !meta.is_file() => {
			remove_path(dst, &meta).map_err(fs_err("removing errant non-file", dst))?;
			Ok(None)
		}
		other => Ok(other),
	}
}

/// Delete whatever sits at `dst`
pub fn remove_entry(dst: &Path) -> Result<Outcome, MirrorError> {
	let meta = match lstat(dst)? {
		Some(meta) => meta,
		None => return Ok(Outcome::Skipped(SkipReason::Absent)),
	};
	match remove_path(dst, &meta) {
		Ok(()) => Ok(Outcome::Applied),
		Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(Outcome::Skipped(SkipReason::Absent)),
		Err(e) => Err(fs_err("removing", dst)(e)),
	}
}

/// Apply the permission bits of `src` to `dst`
pub fn sync_mode(src: &Path, dst: &Path) -> Result<Outcome, MirrorError> {
	let src_meta = fs::symlink_metadata(src).map_err(fs_err("stating", src))?;

	// chmod would follow the destination link; link modes mean nothing here
	if src_meta.file_type().is_symlink() {
		return Ok(Outcome::Skipped(SkipReason::Unsupported(EntryKind::Symlink)));
	}

	fs::set_permissions(dst, permissions_of(&src_meta)).map_err(fs_err("chmod", dst))?;
	Ok(Outcome::Applied)
}

fn remove_path(path: &Path, meta: &Metadata) -> io::Result<()> {
	if meta.is_dir() {
		fs::remove_dir_all(path)
	} else {
		fs::remove_file(path)
	}
}


// vim: ts=4
