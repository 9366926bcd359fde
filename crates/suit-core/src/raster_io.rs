//! Raster container codec: the decode and encode collaborators of the core.
//!
//! `GeoTiffCodec` is a pure-Rust GeoTIFF implementation on top of the `tiff`
//! crate. It reads band 1 of any integer or float sample type as f32 and writes
//! single-band Float32 GeoTIFFs with the reference layer's georeferencing tags.

use std::fs::File;
use std::io::{BufWriter, Cursor, Seek, Write};
use std::path::Path;

use tiff::decoder::{Decoder, DecodingResult, Limits};
use tiff::encoder::colortype::Gray32Float;
use tiff::encoder::{DirectoryEncoder, TiffEncoder, TiffKind};
use tiff::tags::Tag;
use tiff::TiffResult;

use crate::error::{DecodeError, EncodeError};
use crate::export::ExportPayload;
use crate::grid::Grid;
use crate::metadata::{
    DataType, GeoTags, SpatialMetadata, TAG_GDAL_NODATA, TAG_GEO_ASCII_PARAMS,
    TAG_GEO_DOUBLE_PARAMS, TAG_GEO_KEY_DIRECTORY, TAG_MODEL_PIXEL_SCALE, TAG_MODEL_TIEPOINT,
    TAG_MODEL_TRANSFORMATION,
};

/// Raw bytes of one uploaded raster, named by its identifier.
#[derive(Debug, Clone)]
pub struct RasterSource {
    pub id: String,
    pub bytes: Vec<u8>,
}

impl RasterSource {
    pub fn new(id: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self { id: id.into(), bytes }
    }

    /// Read a file; the identifier is its file name.
    pub fn from_path(path: &Path) -> std::io::Result<Self> {
        let bytes = std::fs::read(path)?;
        let id = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        Ok(Self { id, bytes })
    }
}

/// Band 1 of a decoded source plus its spatial metadata.
#[derive(Debug, Clone)]
pub struct DecodedRaster {
    pub grid: Grid,
    pub metadata: SpatialMetadata,
}

pub trait RasterDecoder: Send + Sync {
    fn decode(&self, source: &RasterSource) -> Result<DecodedRaster, DecodeError>;
}

pub trait RasterEncoder {
    fn encode(&self, payload: &ExportPayload, destination: &Path) -> Result<(), EncodeError>;
}

/// GeoTIFF codec. Decoding is unbounded unless a byte cap is set.
#[derive(Debug, Clone, Copy, Default)]
pub struct GeoTiffCodec {
    max_decode_bytes: Option<usize>,
}

impl GeoTiffCodec {
    pub fn new() -> Self {
        Self::default()
    }

    /// Cap the decoded pixel buffer of a single raster at `bytes`.
    pub fn with_max_decode_bytes(mut self, bytes: usize) -> Self {
        self.max_decode_bytes = Some(bytes);
        self
    }

    fn limits(&self) -> Limits {
        let mut limits = Limits::unlimited();
        if let Some(bytes) = self.max_decode_bytes {
            limits.decoding_buffer_size = bytes;
            limits.intermediate_buffer_size = bytes;
        }
        limits
    }

    /// Encode a payload into an in-memory GeoTIFF.
    pub fn encode_to_bytes(&self, payload: &ExportPayload) -> Result<Vec<u8>, EncodeError> {
        let mut buffer = Cursor::new(Vec::new());
        self.encode_to(payload, &mut buffer)?;
        Ok(buffer.into_inner())
    }

    /// Encode a payload into any seekable writer.
    pub fn encode_to<W: Write + Seek>(
        &self,
        payload: &ExportPayload,
        writer: W,
    ) -> Result<(), EncodeError> {
        let grid = &payload.grid;
        if grid.rows == 0 || grid.cols == 0 {
            return Err(EncodeError::InvalidData("raster has zero dimensions".to_string()));
        }
        if grid.data.len() != grid.rows * grid.cols {
            return Err(EncodeError::InvalidData(format!(
                "raster holds {} cells, expected {}x{}",
                grid.data.len(),
                grid.rows,
                grid.cols
            )));
        }
        let width = u32::try_from(grid.cols)
            .map_err(|_| EncodeError::InvalidData("raster too wide".to_string()))?;
        let height = u32::try_from(grid.rows)
            .map_err(|_| EncodeError::InvalidData("raster too tall".to_string()))?;

        let mut encoder = TiffEncoder::new(writer)?;
        let mut image = encoder.new_image::<Gray32Float>(width, height)?;
        write_geo_tags(image.encoder(), &payload.metadata)?;
        image.write_data(&grid.data)?;
        Ok(())
    }

    fn decode_bytes(&self, bytes: &[u8]) -> TiffResult<Result<DecodedRaster, String>> {
        let mut decoder = Decoder::new(Cursor::new(bytes))?.with_limits(self.limits());
        let (width, height) = decoder.dimensions()?;
        let (cols, rows) = (width as usize, height as usize);
        if cols == 0 || rows == 0 {
            return Ok(Err("raster has zero dimensions".to_string()));
        }
        let samples_per_pixel = decoder
            .find_tag_unsigned::<u16>(Tag::SamplesPerPixel)?
            .unwrap_or(1)
            .max(1);
        let planar = decoder.find_tag_unsigned::<u16>(Tag::PlanarConfiguration)?.unwrap_or(1) == 2;
        let geo = read_geo_tags(&mut decoder)?;
        let nodata = match decoder.find_tag(geo_tag(TAG_GDAL_NODATA))? {
            Some(v) => Some(v.into_string()?.trim_end_matches('\0').trim().to_string()),
            None => None,
        };

        let layout = BandLayout {
            pixels: rows * cols,
            samples_per_pixel: samples_per_pixel as usize,
            planar,
        };
        let (data_type, band) = match decoder.read_image()? {
            DecodingResult::U8(v) => (DataType::U8, layout.band_one(&v, f32::from)),
            DecodingResult::U16(v) => (DataType::U16, layout.band_one(&v, f32::from)),
            DecodingResult::U32(v) => (DataType::U32, layout.band_one(&v, |x| x as f32)),
            DecodingResult::U64(v) => (DataType::U64, layout.band_one(&v, |x| x as f32)),
            DecodingResult::I8(v) => (DataType::I8, layout.band_one(&v, f32::from)),
            DecodingResult::I16(v) => (DataType::I16, layout.band_one(&v, f32::from)),
            DecodingResult::I32(v) => (DataType::I32, layout.band_one(&v, |x| x as f32)),
            DecodingResult::I64(v) => (DataType::I64, layout.band_one(&v, |x| x as f32)),
            DecodingResult::F32(v) => (DataType::F32, layout.band_one(&v, |x| x)),
            DecodingResult::F64(v) => (DataType::F64, layout.band_one(&v, |x| x as f32)),
        };
        let Some(data) = band else {
            return Ok(Err(format!(
                "pixel buffer too short for {rows}x{cols} with {samples_per_pixel} samples per pixel"
            )));
        };
        let grid = Grid { data, rows, cols };
        let metadata = SpatialMetadata {
            data_type,
            band_count: samples_per_pixel,
            nodata,
            geo,
        };
        Ok(Ok(DecodedRaster { grid, metadata }))
    }
}

impl RasterDecoder for GeoTiffCodec {
    fn decode(&self, source: &RasterSource) -> Result<DecodedRaster, DecodeError> {
        match self.decode_bytes(&source.bytes) {
            Ok(Ok(decoded)) => Ok(decoded),
            Ok(Err(reason)) => Err(DecodeError::new(&source.id, reason)),
            Err(e) => Err(DecodeError::new(&source.id, e)),
        }
    }
}

impl RasterEncoder for GeoTiffCodec {
    fn encode(&self, payload: &ExportPayload, destination: &Path) -> Result<(), EncodeError> {
        let file = File::create(destination)?;
        let mut writer = BufWriter::new(file);
        self.encode_to(payload, &mut writer)?;
        writer.flush()?;
        Ok(())
    }
}

/// Where band 1 lives inside a decoded sample buffer.
struct BandLayout {
    pixels: usize,
    samples_per_pixel: usize,
    planar: bool,
}

impl BandLayout {
    /// Band 1 as f32, or None if the buffer is too short.
    fn band_one<T: Copy>(&self, samples: &[T], cast: impl Fn(T) -> f32) -> Option<Vec<f32>> {
        let required = if self.planar { self.pixels } else { self.pixels * self.samples_per_pixel };
        if samples.len() < required {
            return None;
        }
        // Planar rasters store band 1 as one contiguous plane; chunky rasters
        // interleave samples per pixel.
        if self.planar || self.samples_per_pixel == 1 {
            Some(samples[..self.pixels].iter().map(|&s| cast(s)).collect())
        } else {
            Some(
                samples
                    .iter()
                    .step_by(self.samples_per_pixel)
                    .take(self.pixels)
                    .map(|&s| cast(s))
                    .collect(),
            )
        }
    }
}

/// `tiff` names the GeoTIFF tags; a raw `Tag::Unknown` never matches them.
fn geo_tag(code: u16) -> Tag {
    Tag::from_u16_exhaustive(code)
}

fn read_geo_tags<R: std::io::Read + Seek>(decoder: &mut Decoder<R>) -> TiffResult<GeoTags> {
    let f64_tag = |decoder: &mut Decoder<R>, tag: u16| -> TiffResult<Option<Vec<f64>>> {
        decoder.find_tag(geo_tag(tag))?.map(|v| v.into_f64_vec()).transpose()
    };
    let pixel_scale = f64_tag(decoder, TAG_MODEL_PIXEL_SCALE)?;
    let tiepoints = f64_tag(decoder, TAG_MODEL_TIEPOINT)?;
    let transformation = f64_tag(decoder, TAG_MODEL_TRANSFORMATION)?;
    let geo_double_params = f64_tag(decoder, TAG_GEO_DOUBLE_PARAMS)?;
    let geo_key_directory = decoder
        .find_tag(geo_tag(TAG_GEO_KEY_DIRECTORY))?
        .map(|v| v.into_u16_vec())
        .transpose()?;
    let geo_ascii_params = decoder
        .find_tag(geo_tag(TAG_GEO_ASCII_PARAMS))?
        .map(|v| v.into_string())
        .transpose()?;
    Ok(GeoTags {
        pixel_scale,
        tiepoints,
        transformation,
        geo_key_directory,
        geo_double_params,
        geo_ascii_params,
    })
}

fn write_geo_tags<W: Write + Seek, K: TiffKind>(
    dir: &mut DirectoryEncoder<W, K>,
    metadata: &SpatialMetadata,
) -> Result<(), EncodeError> {
    let geo = &metadata.geo;
    if let Some(scale) = &geo.pixel_scale {
        dir.write_tag(geo_tag(TAG_MODEL_PIXEL_SCALE), scale.as_slice())?;
    }
    if let Some(tie) = &geo.tiepoints {
        dir.write_tag(geo_tag(TAG_MODEL_TIEPOINT), tie.as_slice())?;
    }
    if let Some(m) = &geo.transformation {
        dir.write_tag(geo_tag(TAG_MODEL_TRANSFORMATION), m.as_slice())?;
    }
    if let Some(keys) = &geo.geo_key_directory {
        dir.write_tag(geo_tag(TAG_GEO_KEY_DIRECTORY), keys.as_slice())?;
    }
    if let Some(doubles) = &geo.geo_double_params {
        dir.write_tag(geo_tag(TAG_GEO_DOUBLE_PARAMS), doubles.as_slice())?;
    }
    if let Some(ascii) = &geo.geo_ascii_params {
        dir.write_tag(geo_tag(TAG_GEO_ASCII_PARAMS), ascii.as_str())?;
    }
    if let Some(nodata) = &metadata.nodata {
        dir.write_tag(geo_tag(TAG_GDAL_NODATA), nodata.as_str())?;
    }
    Ok(())
}
