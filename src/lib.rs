//! Batch download client for CMIP5 output on the CEDA FTP archive.
//!
//! The archive is a deep, convention-named tree
//! (`<group>/<model>/<experiment>/<freq>/<realm>/<cmor_table>/<ensemble>/latest/<variable>`).
//! This crate can either expand explicit axis lists into datasets, or discover
//! them by walking the tree with include/exclude filters, and then mirrors the
//! matching files to local storage.
//!
//! ## Quick start
//! - Configure credentials via environment variables (`CEDA_USERNAME`, `CEDA_PASSWORD`) or a
//!   `.cedarc` file (current directory or home directory). Anything missing is prompted for.
//! - Build an [`Archive`] and call [`Archive::fetch`] or [`Archive::discover_and_fetch`].
//!
//! ```no_run
//! use ceda_fetch::{
//!     Archive, ConfigOverrides, FtpConnector, PathGrammar, SavePathTemplate, generate, load_config,
//! };
//!
//! fn main() -> anyhow::Result<()> {
//!     let config = load_config(ConfigOverrides::default())?;
//!     let archive = Archive::new(FtpConnector::new(&config), PathGrammar::new(&config.base_path));
//!
//!     let datasets = generate(
//!         [("MIROC", "MIROC5")],
//!         vec!["sstClim", "sstClimAerosol"],
//!         vec!["mon"],
//!         vec!["aerosol"],
//!         vec!["aero"],
//!         vec!["r1i1p1"],
//!         vec!["cldncl", "cldnci"],
//!     );
//!     let template = SavePathTemplate::new("example/{experiment}/{model}/{variable}")?;
//!     archive.fetch(datasets, &template, false)?;
//!     Ok(())
//! }
//! ```

#![forbid(unsafe_code)]

pub mod archive;
pub mod campaign;
pub mod config;
pub mod error;
pub mod fetcher;
pub mod filter;
pub mod generator;
pub mod grammar;
pub mod session;
pub mod walker;
mod util;

pub use archive::Archive;
pub use campaign::Campaign;
pub use config::{ArchiveConfig, ConfigOverrides, Credentials, load_config};
pub use error::{Error, Result};
pub use fetcher::{BatchFetcher, FetchSummary, SavePathTemplate};
pub use filter::SegmentFilter;
pub use generator::{DatasetAxes, generate};
pub use grammar::{CEDA_BASE_PATH, DatasetDescriptor, LEAF_MARKER, PathGrammar, Segment};
pub use session::{Connect, FtpConnector, RemoteSession};
#[cfg(any(test, feature = "testing"))]
pub use session::MemoryArchive;
pub use walker::{EmptyListing, TreeWalker};
