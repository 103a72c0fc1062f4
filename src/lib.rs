//! # p4checkout
//!
//! Stands up a per-machine Perforce client from a shared template client and
//! syncs it to a requested revision. Usable both as a standalone binary and as
//! a library.
//!
//! ## Library Usage
//!
//! ```toml
//! [dependencies]
//! p4checkout = { version = "0.0.1", default-features = false }
//! ```
//!
//! ```rust,ignore
//! use p4checkout::config::Settings;
//! use p4checkout::p4::P4Process;
//! use p4checkout::sync::Synchronizer;
//!
//! let runner = P4Process::new("p4");
//! let outcome = Synchronizer::new(&runner).synchronize(&settings).await?;
//! println!("{}", outcome.revision);
//! ```
//!
//! ## Feature Flags
//!
//! - `cli` (default): Builds the `p4checkout` binary. Disable with `default-features = false`.

pub mod client;
pub mod config;
pub mod error;
pub mod p4;
pub mod sync;
pub mod types;
