//! jarpatch: apply binary deltas to selected members of a jar archive.
//!
//! The crate sequences delegated work. It never decodes deltas or writes
//! archives itself: both capabilities sit behind the [`ArchiveTool`] and
//! [`DiffTool`] traits, with external-process implementations (`jar`,
//! `xdelta3`) and in-process ones (zip library, VCDIFF library).
//!
//! - `resolve`  locates external tools
//! - `extract`  unpacks the tar delta bundle and the selected members
//! - `patch`    decodes each member and swaps it into place
//! - `merge`    writes patched members into the output archive
//! - `pipeline` orders the stages and cleans up after success
//! - `cli`      the `jarpatch` binary (`cli` feature)
//!
//! # Quick Start
//!
//! ```no_run
//! use jarpatch::{LogReporter, Pipeline, PipelineConfig};
//!
//! let config = PipelineConfig::new("forge-installer.jar", "patched-installer.jar");
//! let report = Pipeline::new(config, &LogReporter).run().unwrap();
//! println!("patched {} members into {}", report.patched.len(), report.output.display());
//! ```

pub mod backend;
pub mod config;
pub mod error;
pub mod extract;
pub mod merge;
pub mod patch;
pub mod pipeline;
pub mod report;
pub mod resolve;

#[cfg(feature = "cli")]
pub mod cli;

pub use backend::{ArchiveBackend, ArchiveTool, DiffBackend, DiffTool};
pub use config::{MemberSpec, PatchSet, PipelineConfig};
pub use error::{PatchError, PipelineError};
pub use pipeline::{PatchReport, Pipeline};
pub use report::{LogReporter, RecordingReporter, Reporter, Stage};
