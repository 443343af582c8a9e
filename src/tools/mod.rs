//! External collaborators: the git and npm executables and the network.
//!
//! Checks only ever see the [`GitClient`] and [`NpmClient`] traits; the
//! `*Cli` types are the process-backed implementations.

pub mod git;
pub mod npm;
pub mod probe;
pub mod process;

pub use git::{GitCli, GitClient};
pub use npm::{Collaborators, NpmCli, NpmClient};
pub use probe::Probe;
