//! Playwright-backed driver for the rdvwatch engine.
//!
//! The backend is a small Node sidecar embedded at build time: each session
//! spawns `node` on the script, which loads the `playwright` npm package
//! and drives one Chromium. Rust and the sidecar speak line-delimited JSON
//! over stdin/stdout. There is no direct Rust dependency on a browser
//! library; the sidecar machine needs `node` and `playwright` (with its
//! Chromium download) installed.

mod process;
pub mod protocol;
pub mod session;

pub use session::{LaunchOptions, PlaywrightFactory, PlaywrightSession};
