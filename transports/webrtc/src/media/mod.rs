//! Received media
//!
//! The viewer never sends media. Remote tracks announced by the engine are
//! wrapped as [`RemoteTrack`] and handed to a [`Renderer`], which reports
//! playback progress back as [`RendererEvent`]s.

pub mod renderer;
pub mod tracks;

pub use renderer::{Renderer, RendererEvent};
pub use tracks::{MediaKind, RemoteTrack};
