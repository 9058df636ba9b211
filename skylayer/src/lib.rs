//! SkyLayer - progressive tile cache and loading engine for HiPS sky surveys
//!
//! A survey is a quadtree pyramid of image tiles served over HTTP. This
//! library lets a renderer draw any part of it at any zoom without waiting:
//! tiles are fetched and decoded in the background, kept in a cost-bounded
//! cache, and while a tile is in flight a coarser ancestor (or the
//! whole-sky bootstrap mosaic) is drawn in its place.
//!
//! # Architecture
//!
//! ```text
//! traverse ──► resolver ──► cache ◄── tile ◄── worker (decode)
//!                 │            ▲
//!                 ▼            │
//!               fetch        survey (manifest, mosaic)
//! ```
//!
//! - [`traverse`] walks the visible quadtree nodes at the right depth
//! - [`resolver`] turns a node into a payload, or a stand-in texture
//! - [`cache`] bounds memory, with an eviction veto for in-flight tiles
//! - [`survey`] owns manifest metadata and the bootstrap mosaic
//!
//! All engine state is driven from a single thread through `&mut`; only
//! fetching and decoding run elsewhere.

pub mod cache;
pub mod codec;
pub mod config;
pub mod coord;
pub mod fetch;
pub mod logging;
pub mod resolver;
pub mod survey;
pub mod tile;
pub mod traverse;
pub mod worker;
