//! Georeference propagation: pair a combined grid with its reference metadata.

use crate::aggregate::CombinedGrid;
use crate::error::MetadataUnavailable;
use crate::metadata::{DataType, SpatialMetadata};

/// A combined grid ready for serialization by a [`RasterEncoder`](crate::raster_io::RasterEncoder).
#[derive(Debug, Clone, PartialEq)]
pub struct ExportPayload {
    pub grid: CombinedGrid,
    pub metadata: SpatialMetadata,
}

/// Copy the reference metadata, force Float32 / one band, and attach the grid.
/// Performs no I/O.
pub fn prepare_export(
    reference: Option<&SpatialMetadata>,
    grid: CombinedGrid,
) -> Result<ExportPayload, MetadataUnavailable> {
    let mut metadata = reference.cloned().ok_or(MetadataUnavailable)?;
    metadata.data_type = DataType::F32;
    metadata.band_count = 1;
    Ok(ExportPayload { grid, metadata })
}
