//! Weighted-sum site suitability over co-registered raster layers.
//!
//! Flow: [`layer_store`] decodes uploads (through a bounded [`cache`]),
//! [`weights`] validates the user's weights, [`aggregate`] blends the layers,
//! and [`export`] attaches the reference layer's georeferencing so
//! [`raster_io`] can write the result. [`session`] ties the steps together.

pub mod aggregate;
pub mod cache;
pub mod config;
pub mod error;
pub mod export;
pub mod grid;
pub mod layer_store;
pub mod metadata;
pub mod raster_io;
pub mod session;
pub mod weights;

pub use aggregate::{aggregate, CombinedGrid};
pub use cache::DecodeCache;
pub use config::{SessionConfig, Tolerance};
pub use error::{
    AggregateError, DecodeError, EncodeError, MetadataUnavailable, SessionError, WeightError,
};
pub use export::{prepare_export, ExportPayload};
pub use grid::Grid;
pub use layer_store::{BatchReport, LayerStore, RasterLayer};
pub use metadata::{DataType, GeoTags, GeoTransform, SpatialMetadata};
pub use raster_io::{GeoTiffCodec, RasterDecoder, RasterEncoder, RasterSource};
pub use session::Session;
pub use weights::{validate, WeightAssignment};
