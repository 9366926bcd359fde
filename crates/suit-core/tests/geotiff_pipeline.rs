//! End-to-end: GeoTIFF uploads through a session to an exported GeoTIFF.

use std::io::Cursor;

use approx::assert_relative_eq;
use suit_core::{
    DataType, GeoTiffCodec, RasterDecoder, RasterSource, Session, SessionConfig, SessionError,
    WeightAssignment, WeightError,
};
use tiff::encoder::colortype::{Gray16, Gray32Float};
use tiff::encoder::TiffEncoder;
use tiff::tags::Tag;

const PIXEL_SCALE: [f64; 3] = [30.0, 30.0, 0.0];
const TIEPOINT: [f64; 6] = [0.0, 0.0, 0.0, 440_720.0, 3_751_320.0, 0.0];
const GEO_KEYS: [u16; 12] = [1, 1, 0, 2, 1024, 0, 1, 1, 3072, 0, 1, 32611];

fn geotiff_f32(cols: u32, rows: u32, data: &[f32]) -> Vec<u8> {
    let mut buf = Cursor::new(Vec::new());
    {
        let mut enc = TiffEncoder::new(&mut buf).unwrap();
        let mut image = enc.new_image::<Gray32Float>(cols, rows).unwrap();
        image.encoder().write_tag(Tag::Unknown(33550), &PIXEL_SCALE[..]).unwrap();
        image.encoder().write_tag(Tag::Unknown(33922), &TIEPOINT[..]).unwrap();
        image.encoder().write_tag(Tag::Unknown(34735), &GEO_KEYS[..]).unwrap();
        image.write_data(data).unwrap();
    }
    buf.into_inner()
}

fn geotiff_u16(cols: u32, rows: u32, data: &[u16]) -> Vec<u8> {
    let mut buf = Cursor::new(Vec::new());
    {
        let mut enc = TiffEncoder::new(&mut buf).unwrap();
        let mut image = enc.new_image::<Gray16>(cols, rows).unwrap();
        image.encoder().write_tag(Tag::Unknown(34735), &GEO_KEYS[..]).unwrap();
        image.write_data(data).unwrap();
    }
    buf.into_inner()
}

#[test]
fn two_layers_blend_and_export_with_reference_georeferencing() {
    let mut session = Session::new(SessionConfig::default(), GeoTiffCodec::new());
    let report = session.upload(&[
        RasterSource::new("distance.tif", geotiff_f32(2, 2, &[1.0, 2.0, 3.0, 4.0])),
        RasterSource::new("landcover.tif", geotiff_u16(2, 2, &[4, 3, 2, 1])),
    ]);
    assert!(report.is_clean(), "{:?}", report.failures);

    let weights: WeightAssignment =
        [("distance.tif", 0.5), ("landcover.tif", 0.5)].into_iter().collect();
    session.set_weights(weights);
    assert_eq!(session.calculate().unwrap().data, vec![2.5; 4]);

    let dir = tempfile::tempdir().unwrap();
    let out = dir.path().join("suitability.tif");
    session.export(&GeoTiffCodec::new(), &out).unwrap();

    let written = RasterSource::from_path(&out).unwrap();
    assert_eq!(written.id, "suitability.tif");
    let back = GeoTiffCodec::new().decode(&written).unwrap();
    assert_eq!(back.grid.data, vec![2.5; 4]);
    assert_eq!(back.metadata.data_type, DataType::F32);
    assert_eq!(back.metadata.band_count, 1);
    assert_eq!(back.metadata.epsg(), Some(32611));
    let gt = back.metadata.geo_transform().unwrap();
    assert_relative_eq!(gt.c, 440_720.0);
    assert_relative_eq!(gt.e, -30.0);
}

#[test]
fn corrupt_upload_is_reported_and_the_rest_load() {
    let mut session = Session::new(SessionConfig::default(), GeoTiffCodec::new());
    let report = session.upload(&[
        RasterSource::new("a.tif", geotiff_f32(3, 1, &[0.0, 0.5, 1.0])),
        RasterSource::new("corrupt.tif", b"II*\0garbage".to_vec()),
        RasterSource::new("b.tif", geotiff_f32(3, 1, &[1.0, 0.5, 0.0])),
    ]);
    assert_eq!(report.loaded, vec!["a.tif", "b.tif"]);
    assert_eq!(report.failures.len(), 1);
    assert_eq!(report.failures[0].id, "corrupt.tif");
    assert_eq!(session.store().len(), 2);

    session.set_weight("a.tif", 0.3);
    session.set_weight("b.tif", 0.3);
    assert!(matches!(
        session.calculate(),
        Err(SessionError::Weights(WeightError::NotNormalized { .. }))
    ));
}

#[test]
fn export_path_errors_surface_as_encode_errors() {
    let mut session = Session::new(SessionConfig::default(), GeoTiffCodec::new());
    session.upload(&[RasterSource::new("a.tif", geotiff_f32(1, 1, &[7.0]))]);
    session.set_weight("a.tif", 1.0);
    session.calculate().unwrap();

    let dir = tempfile::tempdir().unwrap();
    let bad = dir.path().join("missing-dir").join("out.tif");
    assert!(matches!(
        session.export(&GeoTiffCodec::new(), &bad),
        Err(SessionError::Encode(_))
    ));
    // The combined grid is still there for a retry.
    assert_eq!(session.combined().unwrap().data, vec![7.0]);
}
