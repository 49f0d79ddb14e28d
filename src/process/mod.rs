//! External process plumbing.
//!
//! This module contains everything that talks to command line tools:
//!
//! - `ProcessRunner`: the seam through which every child process is spawned
//! - `find_tool`: PATH-based lookup with system fallbacks
//! - `hdiutil`: attach/detach argument building and output interpretation

mod hdiutil;
mod runner;
mod tools;

pub use hdiutil::{DiskImageTool, MountResult};
pub(crate) use hdiutil::{clear_attribute_args, is_resource_busy};
pub use runner::{CommandOutput, ProcessRunner, SystemRunner, SPAWN_FAILURE_STATUS};
pub use tools::{find_tool, ToolPaths};
