//! Async client for the external services behind the weather globe.
//!
//! This crate covers the three network dependencies of the globe view:
//!
//! - the static texture host serving the base planet maps,
//! - the image proxy + satellite host for the refreshed cloud layer,
//! - the boundary-geometry service for national border outlines.
//!
//! # Design principles
//!
//! - **Web-compatible**: Works on desktop and WASM via reqwest
//! - **Runtime-agnostic**: Returns `impl Future`, works with any executor
//! - **Sync parsing**: GeoJSON and image decoding are synchronous; the
//!   caller decides where the work happens

mod client;
mod error;
pub mod geometry;

pub use client::{BaseTexture, Client, cloud_imagery_url};
pub use error::{Error, Result};
pub use geometry::{BoundaryGeometry, GeoPoint};
