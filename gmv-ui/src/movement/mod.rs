//! Movement pipeline: raw events to map layers
//!
//! - [`transform`]: group, order, resolve and pair events into segments
//! - [`quality`]: per-segment data-quality flags
//! - [`geocache`]: client-side geocode cache with background lookups
//! - [`render`]: GeoJSON layers, colors and legend

pub mod geocache;
pub mod quality;
pub mod render;
pub mod transform;

pub use geocache::{CacheEntry, GeocodeCache};
pub use quality::{QualityFlags, QualityLevel};
pub use render::{render, ColorMode, LineStyle, MapLayers, RenderOptions};
pub use transform::{derive, from_precomputed, group_by_person, MovementView};
