//! # dirmirror - one-way continuous directory mirror
//!
//! dirmirror keeps a destination tree eventually consistent with a source
//! tree: a full reconciliation pass first, then incremental updates driven by
//! filesystem change notifications. A `.synced` marker in the destination root
//! tells observers that the initial pass has finished.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use dirmirror::{Mirror, MirrorConfig};
//! use tokio_util::sync::CancellationToken;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = MirrorConfig { source: "./src".into(), dest: "./dest".into(), ..Default::default() };
//!     let mirror = Mirror::from_config(&config)?;
//!     let cancel = CancellationToken::new();
//!     mirror.run(&cancel).await?;
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod dispatch;
pub mod entry;
pub mod error;
pub mod exclusion;
pub mod logging;
pub mod mirror;
pub mod reconcile;
pub mod roots;
pub mod transfer;
pub mod watch;

// Re-export commonly used types and functions
pub use config::{ConfigOverrides, MirrorConfig, STATUS_MARKER};
pub use dispatch::EventDispatcher;
pub use entry::EntryKind;
pub use error::{MirrorError, Outcome, SkipReason};
pub use exclusion::{IgnoreFileMatcher, IgnoreMatcher, NoIgnore};
pub use mirror::Mirror;
pub use reconcile::{ReconcileStats, TreeReconciler, WalkOutcome};
pub use roots::Roots;
pub use transfer::FileTransfer;
pub use watch::{DirWatch, RecordingWatch, WatchEvent, WatchOp, WatchRegistry};

// vim: ts=4
