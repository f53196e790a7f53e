//! Per-image edit sessions with copy-on-write undo history.
//!
//! Each open image keeps a ledger of applied operations and a list of
//! generations. Edits that cannot be undone by repeating them fork the current
//! generation first; flips and rotations mutate in place and are undone by
//! running them again.
//!
//! # Examples
//!
//! Synchronous usage with [`session::registry::SessionRegistry`]:
//! ```
//! use pixledit::{
//!     engine::raster::RasterImage,
//!     op::{OpValue, OperationKind},
//!     session::registry::SessionRegistry,
//!     types::PixelFormat,
//! };
//!
//! let mut registry = SessionRegistry::new(PixelFormat::Rgba8);
//! let image = RasterImage::from_rgba8(2, 2, vec![64; 16]).expect("image");
//! let (session, _) = registry.open("demo.png", image).expect("open");
//!
//! session
//!     .apply_edit(OperationKind::Brighten, Some(OpValue::Scalar(10.0)))
//!     .expect("brighten");
//! session.apply_edit(OperationKind::VerticalFlip, None).expect("flip");
//! assert_eq!(session.generation_count(), 2);
//!
//! session.undo_last().expect("undo flip");
//! session.undo_last().expect("undo brighten");
//! assert_eq!(session.generation_count(), 1);
//! ```
//!
//! Runtime usage with per-session workers:
//! ```no_run
//! use pixledit::{
//!     engine::raster::RasterImage,
//!     op::{OpValue, OperationKind},
//!     runtime::handle::{spawn_editor, RuntimeConfig},
//! };
//!
//! # #[tokio::main]
//! # async fn main() {
//! let editor = spawn_editor::<RasterImage>(RuntimeConfig::default());
//! let id = editor.open_file("photo.png").await.expect("open");
//! let ticket = editor
//!     .apply_edit(id, OperationKind::GaussianBlur, Some(OpValue::Radius(3)))
//!     .await
//!     .expect("queue");
//! ticket.outcome().await.expect("blur");
//! editor.shutdown().await.expect("shutdown");
//! # }
//! ```

/// Headless command-line front-end.
pub mod cli;
/// History ledger, version store and slider values.
pub mod core;
/// Image engine contract and the raster reference engine.
pub mod engine;
/// Operation kinds and history values.
pub mod op;
/// Scratch buffer, display surface and the handoff between them.
pub mod render;
/// Async command loop, per-session workers and events.
pub mod runtime;
/// Image sessions, the operation gate and the registry.
pub mod session;
/// Shared primitive types and enums.
pub mod types;
