//! Spatial metadata carried alongside each decoded layer.
//!
//! The aggregation core treats this as opaque: it is copied from a reference
//! layer and only `data_type` / `band_count` are rewritten on export.

use serde::{Deserialize, Serialize};

pub(crate) const TAG_MODEL_PIXEL_SCALE: u16 = 33550;
pub(crate) const TAG_MODEL_TIEPOINT: u16 = 33922;
pub(crate) const TAG_MODEL_TRANSFORMATION: u16 = 34264;
pub(crate) const TAG_GEO_KEY_DIRECTORY: u16 = 34735;
pub(crate) const TAG_GEO_DOUBLE_PARAMS: u16 = 34736;
pub(crate) const TAG_GEO_ASCII_PARAMS: u16 = 34737;
pub(crate) const TAG_GDAL_NODATA: u16 = 42113;

const GEOGRAPHIC_TYPE_GEO_KEY: u16 = 2048;
const PROJECTED_CS_TYPE_GEO_KEY: u16 = 3072;

/// Sample type of a raster band as stored in its source container.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DataType {
    U8,
    U16,
    U32,
    U64,
    I8,
    I16,
    I32,
    I64,
    F32,
    F64,
}

/// GeoTIFF georeferencing tags, kept verbatim.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GeoTags {
    pub pixel_scale: Option<Vec<f64>>,
    pub tiepoints: Option<Vec<f64>>,
    pub transformation: Option<Vec<f64>>,
    pub geo_key_directory: Option<Vec<u16>>,
    pub geo_double_params: Option<Vec<f64>>,
    pub geo_ascii_params: Option<String>,
}

/// Affine pixel-to-world transform in GDAL order:
/// `x = c + a*col + b*row`, `y = f + d*col + e*row`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GeoTransform {
    pub a: f64,
    pub b: f64,
    pub c: f64,
    pub d: f64,
    pub e: f64,
    pub f: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpatialMetadata {
    pub data_type: DataType,
    pub band_count: u16,
    /// Nodata value as written by GDAL (ASCII).
    pub nodata: Option<String>,
    pub geo: GeoTags,
}

impl SpatialMetadata {
    /// Metadata with no georeferencing at all.
    pub fn bare(data_type: DataType, band_count: u16) -> Self {
        Self {
            data_type,
            band_count,
            nodata: None,
            geo: GeoTags::default(),
        }
    }

    /// Affine transform from ModelTransformation, or from pixel scale plus
    /// the first tie point.
    pub fn geo_transform(&self) -> Option<GeoTransform> {
        if let Some(m) = self.geo.transformation.as_deref().filter(|m| m.len() >= 8) {
            return Some(GeoTransform {
                a: m[0],
                b: m[1],
                c: m[3],
                d: m[4],
                e: m[5],
                f: m[7],
            });
        }
        let scale = self.geo.pixel_scale.as_deref().filter(|s| s.len() >= 2)?;
        let tie = self.geo.tiepoints.as_deref().filter(|t| t.len() >= 6)?;
        // Tie point (i, j, k, x, y, z) anchors raster (i, j) at world (x, y).
        Some(GeoTransform {
            a: scale[0],
            b: 0.0,
            c: tie[3] - tie[0] * scale[0],
            d: 0.0,
            e: -scale[1],
            f: tie[4] + tie[1] * scale[1],
        })
    }

    /// EPSG code from the GeoKey directory, if it names one directly.
    pub fn epsg(&self) -> Option<u16> {
        let dir = self.geo.geo_key_directory.as_deref()?;
        if dir.len() < 4 {
            return None;
        }
        let n_keys = dir[3] as usize;
        let mut projected = None;
        let mut geographic = None;
        for entry in dir[4..].chunks_exact(4).take(n_keys) {
            // Location 0 means the value is stored inline.
            if entry[1] != 0 {
                continue;
            }
            match entry[0] {
                PROJECTED_CS_TYPE_GEO_KEY => projected = Some(entry[3]),
                GEOGRAPHIC_TYPE_GEO_KEY => geographic = Some(entry[3]),
                _ => {}
            }
        }
        // 32767 is "user-defined", not an EPSG code.
        projected.or(geographic).filter(|&code| code != 32767)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn with_geo(geo: GeoTags) -> SpatialMetadata {
        SpatialMetadata { geo, ..SpatialMetadata::bare(DataType::U8, 1) }
    }

    #[test]
    fn transform_from_scale_and_tiepoint() {
        let meta = with_geo(GeoTags {
            pixel_scale: Some(vec![30.0, 30.0, 0.0]),
            tiepoints: Some(vec![0.0, 0.0, 0.0, 500_000.0, 4_100_000.0, 0.0]),
            ..GeoTags::default()
        });
        let gt = meta.geo_transform().unwrap();
        assert_eq!(gt.a, 30.0);
        assert_eq!(gt.e, -30.0);
        assert_eq!(gt.c, 500_000.0);
        assert_eq!(gt.f, 4_100_000.0);
    }

    #[test]
    fn transform_prefers_model_transformation() {
        let mut m = vec![0.0; 16];
        m[0] = 2.0;
        m[3] = 10.0;
        m[5] = -2.0;
        m[7] = 20.0;
        m[15] = 1.0;
        let meta = with_geo(GeoTags {
            transformation: Some(m),
            pixel_scale: Some(vec![99.0, 99.0, 0.0]),
            tiepoints: Some(vec![0.0; 6]),
            ..GeoTags::default()
        });
        let gt = meta.geo_transform().unwrap();
        assert_eq!((gt.a, gt.c, gt.e, gt.f), (2.0, 10.0, -2.0, 20.0));
    }

    #[test]
    fn epsg_prefers_projected_key() {
        let meta = with_geo(GeoTags {
            geo_key_directory: Some(vec![
                1, 1, 0, 3, //
                1024, 0, 1, 1, //
                2048, 0, 1, 4326, //
                3072, 0, 1, 32633,
            ]),
            ..GeoTags::default()
        });
        assert_eq!(meta.epsg(), Some(32633));
    }

    #[test]
    fn missing_georeferencing_yields_none() {
        let meta = SpatialMetadata::bare(DataType::F32, 1);
        assert!(meta.geo_transform().is_none());
        assert!(meta.epsg().is_none());
    }
}
