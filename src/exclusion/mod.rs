//! Ignore rules applied before any sync operation
//!
//! The engine only needs a yes/no answer for a path relative to the source
//! root; the pattern syntax lives behind [`IgnoreMatcher`].

mod ignore;

pub use self::ignore::{IgnoreFileMatcher, IgnoreFileParser};

use std::path::Path;

use crate::config::STATUS_MARKER;

/// Decides whether a source-relative path is excluded from mirroring
pub trait IgnoreMatcher: Send + Sync {
	/// True if `rel` (relative to the source root) must not be mirrored
	fn matches(&self, rel: &Path) -> bool;
}

/// Matcher that excludes nothing
#[derive(Debug, Clone, Copy, Default)]
pub struct NoIgnore;

impl IgnoreMatcher for NoIgnore {
	fn matches(&self, _rel: &Path) -> bool {
		false
	}
}

impl<M: IgnoreMatcher + ?Sized> IgnoreMatcher for Box<M> {
	fn matches(&self, rel: &Path) -> bool {
		(**self).matches(rel)
	}
}

impl<M: IgnoreMatcher + ?Sized> IgnoreMatcher for std::sync::Arc<M> {
	fn matches(&self, rel: &Path) -> bool {
		(**self).matches(rel)
	}
}

/// Whether `rel` is left out of mirroring
///
/// The source root itself is never ignored. A root-level entry named like the
/// status marker always is, so only the engine ever writes or removes the
/// destination marker.
pub(crate) fn is_excluded(matcher: &dyn IgnoreMatcher, rel: &Path) -> bool {
	if rel.as_os_str().is_empty() {
		return false;
	}
	rel == Path::new(STATUS_MARKER) || matcher.matches(rel)
}


// vim: ts=4
