//! # rrdshim
//!
//! Error-normalizing bindings to librrd, the rrdtool library.
//!
//! librrd reports failures through a per-thread error slot that the next call
//! on the same thread overwrites. rrdshim wraps every entry point it forwards
//! so that the error is cleared before the call and copied out right after
//! it, turning that slot into a return value: a null pointer for C callers,
//! `None` for Rust callers, or an owned copy of the message.
//!
//! **Status**: This crate is in early development. The API is not yet stable.
//!
//! ## Layers
//!
//! - [`ffi`]: `rrdshim_*` C exports (feature `native`), declared in
//!   `include/rrdshim.h`
//! - [`forward`]: the clear/call/capture forwarders, generic over
//!   [`RrdLibrary`]
//! - [`Client`]: safe builders and owned results on top of the forwarders
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use rrdshim::{Client, ConsolidationFn, Creator, DsType, Updater};
//!
//! # fn main() -> rrdshim::Result<()> {
//! let client = Client::native();
//!
//! let mut creator = Creator::new("load.rrd", 1_700_000_000, 300);
//! creator
//!     .ds("load", DsType::Gauge, 600, Some(0.0), None)
//!     .rra(ConsolidationFn::Average, 0.5, 1, 288);
//! client.create(&creator)?;
//!
//! let mut updater = Updater::new("load.rrd");
//! updater.cache(Some(1_700_000_300), &[0.42]);
//! client.update(&mut updater)?;
//!
//! let rows = client.fetch("load.rrd", ConsolidationFn::Average, 1_700_000_000, 1_700_000_600, 300)?;
//! for (timestamp, values) in rows.rows() {
//!     println!("{timestamp}: {values:?}");
//! }
//! # Ok(())
//! # }
//! ```
//!
//! ## Features
//!
//! - `native`: link the system librrd (found with pkg-config), enable
//!   `Native` and export the C ABI. Without it the crate builds and tests
//!   against the mock library only.
//! - `mock`: expose `mock::MockLibrary`, an in-process stand-in for librrd,
//!   to integration tests and downstream test suites.

pub mod args;
pub mod capture;
pub mod client;
pub mod config;
pub mod create;
pub mod error;
pub mod ffi;
pub mod fetch;
pub mod forward;
pub mod graph;
pub mod info;
pub mod library;
#[cfg(any(test, feature = "mock"))]
pub mod mock;
pub mod schema;
pub mod sys;
pub mod update;
pub mod xport;

// Re-export primary API types at crate root for convenience.
pub use capture::ErrorMessage;
pub use client::Client;
pub use config::ClientConfig;
pub use create::Creator;
pub use error::{Result, RrdError};
pub use fetch::FetchResult;
pub use graph::{GraphInfo, Grapher, ImageFormat};
pub use info::{Info, InfoValue};
#[cfg(feature = "native")]
pub use library::Native;
pub use library::RrdLibrary;
pub use schema::{ConsolidationFn, DsType};
pub use update::Updater;
pub use xport::{Exporter, XportResult};
