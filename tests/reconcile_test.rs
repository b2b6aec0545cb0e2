/// Reconciliation tests against real directories
///
/// Each test builds a source tree, runs a single reconciliation pass through
/// the public API and inspects the destination. No OS notifications are used;
/// the Watch Set is recorded in memory.
use std::fs;
use std::os::unix::fs::{symlink, MetadataExt, PermissionsExt};
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;

use dirmirror::{
	DirWatch, IgnoreFileMatcher, IgnoreMatcher, Mirror, MirrorError, NoIgnore, RecordingWatch,
	ReconcileStats, Roots, WalkOutcome, STATUS_MARKER,
};

struct Trees {
	_tmp: TempDir,
	src: PathBuf,
	dest: PathBuf,
}

fn trees() -> Trees {
	let tmp = TempDir::new().unwrap();
	let src = tmp.path().join("src");
	let dest = tmp.path().join("dest");
	fs::create_dir(&src).unwrap();
	Trees { src: src.canonicalize().unwrap(), dest, _tmp: tmp }
}

fn mirror(t: &Trees, matcher: Box<dyn IgnoreMatcher>) -> Mirror {
	Mirror::new(Roots::new(&t.src, &t.dest), matcher)
}

fn reconcile(m: &Mirror, watches: &mut RecordingWatch) -> ReconcileStats {
	match m.reconcile(watches, &CancellationToken::new()).unwrap() {
		WalkOutcome::Completed(stats) => stats,
		WalkOutcome::Cancelled => panic!("walk cancelled unexpectedly"),
	}
}

fn mode(path: &Path) -> u32 {
	fs::symlink_metadata(path).unwrap().mode() & 0o7777
}

// ===================================================================
// SCENARIOS
// ===================================================================

#[test]
fn test_populates_empty_destination() {
	let t = trees();
	fs::create_dir(t.src.join("a")).unwrap();
	fs::write(t.src.join("a/b.txt"), b"0123456789").unwrap();
	fs::set_permissions(t.src.join("a/b.txt"), fs::Permissions::from_mode(0o644)).unwrap();
	fs::create_dir(t.src.join("c")).unwrap();
	fs::set_permissions(t.src.join("c"), fs::Permissions::from_mode(0o644)).unwrap();

	let m = mirror(&t, Box::new(NoIgnore));
	let mut watches = RecordingWatch::new();
	let stats = reconcile(&m, &mut watches);

	assert!(t.dest.join("c").is_dir());
	assert_eq!(mode(&t.dest.join("c")), 0o644);
	assert_eq!(fs::read(t.dest.join("a/b.txt")).unwrap(), b"0123456789");
	assert_eq!(mode(&t.dest.join("a/b.txt")), 0o644);
	assert_eq!(stats.files_copied, 1);
	assert_eq!(stats.bytes_copied, 10);

	// Root plus both subdirectories joined the Watch Set
	assert_eq!(watches.len(), 3);
	assert!(watches.is_watched(&t.src));
	assert!(watches.is_watched(&t.src.join("a")));
}

#[test]
fn test_file_replaced_by_directory() {
	let t = trees();
	fs::create_dir(&t.dest).unwrap();
	fs::write(t.dest.join("data"), b"stale file").unwrap();
	fs::create_dir(t.src.join("data")).unwrap();
	fs::write(t.src.join("data/inner"), b"x").unwrap();

	let m = mirror(&t, Box::new(NoIgnore));
	reconcile(&m, &mut RecordingWatch::new());

	assert!(fs::symlink_metadata(t.dest.join("data")).unwrap().is_dir());
	assert_eq!(fs::read(t.dest.join("data/inner")).unwrap(), b"x");
}

#[test]
fn test_directory_replaced_by_file() {
	let t = trees();
	fs::create_dir_all(t.dest.join("data/deep")).unwrap();
	fs::write(t.dest.join("data/deep/old"), b"old").unwrap();
	fs::write(t.src.join("data"), b"now a file").unwrap();

	let m = mirror(&t, Box::new(NoIgnore));
	reconcile(&m, &mut RecordingWatch::new());

	assert!(fs::symlink_metadata(t.dest.join("data")).unwrap().is_file());
	assert_eq!(fs::read(t.dest.join("data")).unwrap(), b"now a file");
}

#[test]
fn test_second_pass_copies_nothing() {
	let t = trees();
	fs::create_dir(t.src.join("d")).unwrap();
	fs::write(t.src.join("d/one"), b"first").unwrap();
	fs::write(t.src.join("two"), b"second").unwrap();
	fs::write(t.src.join("empty"), b"").unwrap();

	let m = mirror(&t, Box::new(NoIgnore));
	let first = reconcile(&m, &mut RecordingWatch::new());
	assert_eq!(first.files_copied, 3);

	let second = reconcile(&m, &mut RecordingWatch::new());
	assert_eq!(second.files_copied, 0);
	assert_eq!(second.files_fresh, 3);
	assert_eq!(second.bytes_copied, 0);
}

#[test]
fn test_symlink_fidelity_over_existing_entries() {
	let t = trees();
	fs::create_dir_all(t.dest.join("was_dir/child")).unwrap();
	fs::write(t.dest.join("was_file"), b"regular").unwrap();
	symlink("../somewhere/else", t.src.join("was_dir")).unwrap();
	symlink("does-not-exist", t.src.join("was_file")).unwrap();

	let m = mirror(&t, Box::new(NoIgnore));
	let stats = reconcile(&m, &mut RecordingWatch::new());

	for (name, target) in &[("was_dir", "../somewhere/else"), ("was_file", "does-not-exist")] {
		let path = t.dest.join(name);
		assert!(fs::symlink_metadata(&path).unwrap().file_type().is_symlink());
		assert_eq!(fs::read_link(&path).unwrap(), Path::new(target));
	}
	assert_eq!(stats.symlinks, 2);
}

#[test]
fn test_ignored_paths_are_never_touched() {
	let t = trees();
	fs::create_dir_all(t.src.join("node_modules/pkg")).unwrap();
	fs::write(t.src.join("node_modules/pkg/index.js"), b"js").unwrap();
	fs::write(t.src.join("app.log"), b"log").unwrap();
	fs::write(t.src.join("keep.txt"), b"keep").unwrap();

	let matcher = IgnoreFileMatcher::from_patterns(&t.src, &["node_modules/", "*.log"]).unwrap();
	let m = mirror(&t, Box::new(matcher));
	let mut watches = RecordingWatch::new();
	let stats = reconcile(&m, &mut watches);

	assert!(!t.dest.join("node_modules").exists());
	assert!(!t.dest.join("app.log").exists());
	assert_eq!(fs::read(t.dest.join("keep.txt")).unwrap(), b"keep");
	assert!(!watches.is_watched(&t.src.join("node_modules")));
	assert!(!watches.is_watched(&t.src.join("node_modules/pkg")));
	assert_eq!(stats.ignored, 2);
}

#[test]
fn test_ignore_file_loaded_from_disk() {
	let t = trees();
	let ignore_file = t.src.join(".mirrorignore");
	fs::write(&ignore_file, "# build output\nbuild/\n\n*.tmp\n").unwrap();
	fs::create_dir(t.src.join("build")).unwrap();
	fs::write(t.src.join("build/out"), b"o").unwrap();
	fs::write(t.src.join("scratch.tmp"), b"t").unwrap();

	let matcher = IgnoreFileMatcher::from_file(&t.src, &ignore_file).unwrap();
	assert_eq!(matcher.len(), 2);

	let m = mirror(&t, Box::new(matcher));
	reconcile(&m, &mut RecordingWatch::new());

	assert!(!t.dest.join("build").exists());
	assert!(!t.dest.join("scratch.tmp").exists());
	assert!(t.dest.join(".mirrorignore").exists());
}

#[test]
fn test_stale_content_is_overwritten() {
	let t = trees();
	fs::create_dir(&t.dest).unwrap();
	fs::write(t.src.join("f"), b"new content").unwrap();
	fs::write(t.dest.join("f"), b"old").unwrap();

	let m = mirror(&t, Box::new(NoIgnore));
	let stats = reconcile(&m, &mut RecordingWatch::new());

	assert_eq!(fs::read(t.dest.join("f")).unwrap(), b"new content");
	assert_eq!(stats.files_copied, 1);
}

#[test]
fn test_cancelled_walk_touches_nothing() {
	let t = trees();
	fs::write(t.src.join("f"), b"x").unwrap();

	let m = mirror(&t, Box::new(NoIgnore));
	let cancel = CancellationToken::new();
	cancel.cancel();

	let outcome = m.reconcile(&mut RecordingWatch::new(), &cancel).unwrap();
	assert_eq!(outcome, WalkOutcome::Cancelled);
	assert!(!t.dest.exists());
}

/// Watch Set that checks the destination marker each time a directory is
/// registered
struct MarkerSpy {
	inner: RecordingWatch,
	marker: PathBuf,
	marker_seen: bool,
}

impl DirWatch for MarkerSpy {
	fn add(&mut self, path: &Path) -> Result<(), MirrorError> {
		self.marker_seen |= self.marker.exists();
		self.inner.add(path)
	}

	fn remove(&mut self, path: &Path) {
		self.inner.remove(path)
	}

	fn is_watched(&self, path: &Path) -> bool {
		self.inner.is_watched(path)
	}
}

#[test]
fn test_marker_absent_while_walk_runs() {
	let t = trees();
	fs::write(t.src.join(STATUS_MARKER), b"user file").unwrap();
	fs::create_dir(t.src.join("zzz")).unwrap();
	fs::write(t.src.join("zzz/f"), b"z").unwrap();

	let m = mirror(&t, Box::new(NoIgnore));
	let mut spy = MarkerSpy {
		inner: RecordingWatch::new(),
		marker: m.roots().status_path(),
		marker_seen: false,
	};
	let outcome = m.reconcile(&mut spy, &CancellationToken::new()).unwrap();

	assert!(matches!(outcome, WalkOutcome::Completed(_)));
	assert!(spy.inner.is_watched(&t.src.join("zzz")));
	assert!(!spy.marker_seen, "marker appeared during the walk");
	assert!(!t.dest.join(STATUS_MARKER).exists());
	assert_eq!(fs::read(t.dest.join("zzz/f")).unwrap(), b"z");
}

// vim: ts=4
