//! The `rdvw` binary: configuration, argument parsing and the run loop
//! that spawns one watcher task per selected portal.

pub mod cli;
pub mod config;
pub mod logging;
pub mod watch;
