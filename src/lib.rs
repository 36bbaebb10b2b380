//! Attachment Viewer
//!
//! Core of an in-page attachment viewer: it discovers attachments in a host
//! document, keeps their payloads in a preloading blob cache, renders
//! documents and images, and searches document text layers.
//!
//! # Modules
//!
//! - `registry`: Attachment discovery and content-hash identity
//! - `cache`: Blob cache, fetching and neighbour preloading
//! - `render`: Document engine seam, raster policy and image probing
//! - `search`: Text-layer search, match geometry and scroll targets
//! - `viewer`: Viewer state machine driven by UI intents
//! - `routes`: HTTP control surface for the host extension and viewer UI

pub mod cache;
pub mod config;
pub mod error;
pub mod registry;
pub mod render;
pub mod routes;
pub mod scheduler;
pub mod search;
pub mod state;
pub mod viewer;
