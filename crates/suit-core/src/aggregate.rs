//! Weighted linear combination of equal-shape layers.
//!
//! Accumulation is in place and in f32, one layer at a time, so peak extra
//! memory is a single grid. Layers are summed in the order given (the store's
//! insertion order); reordering layers can change the last bits of a cell but
//! a fixed order always gives the same result. NaN and Inf pass through.

use tracing::info;

use crate::error::AggregateError;
use crate::grid::Grid;
use crate::layer_store::RasterLayer;
use crate::weights::WeightAssignment;

/// Output of [`aggregate`]: same shape as the inputs.
pub type CombinedGrid = Grid;

/// `sum_k w_k * layer_k`, elementwise.
pub fn aggregate<'a, I>(layers: I, weights: &WeightAssignment) -> Result<CombinedGrid, AggregateError>
where
    I: IntoIterator<Item = &'a RasterLayer>,
{
    let layers: Vec<&RasterLayer> = layers.into_iter().collect();
    let first = layers.first().ok_or(AggregateError::NoLayers)?;
    let expected = first.shape();

    // Check every shape and weight before touching the accumulator.
    let mut weighted = Vec::with_capacity(layers.len());
    for layer in &layers {
        let found = layer.shape();
        if found != expected {
            return Err(AggregateError::ShapeMismatch {
                id: layer.id.clone(),
                expected,
                found,
            });
        }
        let w = weights
            .get(&layer.id)
            .ok_or_else(|| AggregateError::MissingWeight { id: layer.id.clone() })?;
        weighted.push((*layer, w as f32));
    }

    let (rows, cols) = expected;
    let mut combined = Grid::zeros(rows, cols);
    for (layer, w) in weighted {
        for (acc, &v) in combined.data.iter_mut().zip(&layer.grid.data) {
            *acc += w * v;
        }
    }

    info!(layers = layers.len(), rows, cols, "aggregated layers");
    Ok(combined)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::{DataType, SpatialMetadata};
    use approx::assert_relative_eq;
    use rand::rngs::StdRng;
    use rand::seq::SliceRandom;
    use rand::{Rng, SeedableRng};

    fn layer(id: &str, rows: &[&[f32]]) -> RasterLayer {
        RasterLayer {
            id: id.to_string(),
            grid: Grid::from_rows(rows).unwrap(),
            metadata: SpatialMetadata::bare(DataType::F32, 1),
        }
    }

    fn random_layer(rng: &mut StdRng, id: &str, rows: usize, cols: usize) -> RasterLayer {
        let data = (0..rows * cols).map(|_| rng.gen_range(-100.0f32..100.0)).collect();
        RasterLayer {
            id: id.to_string(),
            grid: Grid::from_vec(rows, cols, data).unwrap(),
            metadata: SpatialMetadata::bare(DataType::F32, 1),
        }
    }

    #[test]
    fn half_and_half_of_mirrored_layers() {
        let a = layer("A", &[&[1.0, 2.0], &[3.0, 4.0]]);
        let b = layer("B", &[&[4.0, 3.0], &[2.0, 1.0]]);
        let w: WeightAssignment = [("A", 0.5), ("B", 0.5)].into_iter().collect();
        let out = aggregate([&a, &b], &w).unwrap();
        assert_eq!(out.data, vec![2.5; 4]);
        assert_eq!(out.shape(), (2, 2));
    }

    #[test]
    fn shape_mismatch_is_rejected() {
        let a = layer("A", &[&[1.0, 2.0], &[3.0, 4.0]]);
        let b = layer("B", &[&[1.0, 2.0, 3.0]]);
        let w: WeightAssignment = [("A", 0.5), ("B", 0.5)].into_iter().collect();
        assert_eq!(
            aggregate([&a, &b], &w),
            Err(AggregateError::ShapeMismatch {
                id: "B".to_string(),
                expected: (2, 2),
                found: (1, 3),
            })
        );
    }

    #[test]
    fn transposed_shape_is_a_mismatch() {
        let a = layer("A", &[&[1.0, 2.0, 3.0]]);
        let b = layer("B", &[&[1.0], &[2.0], &[3.0]]);
        let w: WeightAssignment = [("A", 0.5), ("B", 0.5)].into_iter().collect();
        assert!(matches!(
            aggregate([&a, &b], &w),
            Err(AggregateError::ShapeMismatch { .. })
        ));
    }

    #[test]
    fn empty_input_and_missing_weight() {
        let w = WeightAssignment::new();
        assert_eq!(aggregate(std::iter::empty(), &w), Err(AggregateError::NoLayers));
        let a = layer("A", &[&[1.0]]);
        assert_eq!(
            aggregate([&a], &w),
            Err(AggregateError::MissingWeight { id: "A".to_string() })
        );
    }

    #[test]
    fn identity_weight_returns_layer_exactly() {
        let mut rng = StdRng::seed_from_u64(11);
        let layers: Vec<RasterLayer> =
            (0..4).map(|i| random_layer(&mut rng, &format!("L{i}"), 16, 9)).collect();
        for pick in 0..layers.len() {
            let w: WeightAssignment = layers
                .iter()
                .enumerate()
                .map(|(i, l)| (l.id.clone(), if i == pick { 1.0 } else { 0.0 }))
                .collect();
            let out = aggregate(&layers, &w).unwrap();
            assert_eq!(out, layers[pick].grid);
        }
    }

    #[test]
    fn each_cell_is_the_weighted_sum() {
        let mut rng = StdRng::seed_from_u64(3);
        let layers: Vec<RasterLayer> =
            (0..5).map(|i| random_layer(&mut rng, &format!("L{i}"), 8, 12)).collect();
        let raw: Vec<f64> = (0..5).map(|_| rng.gen_range(0.0..1.0)).collect();
        let total: f64 = raw.iter().sum();
        let w: WeightAssignment =
            layers.iter().zip(&raw).map(|(l, r)| (l.id.clone(), r / total)).collect();

        let out = aggregate(&layers, &w).unwrap();
        for r in 0..8 {
            for c in 0..12 {
                let mut expected = 0.0f32;
                for l in &layers {
                    expected += w.get(&l.id).unwrap() as f32 * l.grid.get(r, c);
                }
                assert_eq!(out.get(r, c), expected);
            }
        }
    }

    #[test]
    fn permuted_layer_order_agrees_within_rounding() {
        let mut rng = StdRng::seed_from_u64(19);
        let mut layers: Vec<RasterLayer> =
            (0..6).map(|i| random_layer(&mut rng, &format!("L{i}"), 10, 10)).collect();
        let w = WeightAssignment::uniform(layers.iter().map(|l| l.id.clone()));
        let baseline = aggregate(&layers, &w).unwrap();
        let scale = layers
            .iter()
            .flat_map(|l| l.grid.data.iter())
            .fold(0.0f32, |m, v| m.max(v.abs()));
        for _ in 0..10 {
            layers.shuffle(&mut rng);
            let out = aggregate(&layers, &w).unwrap();
            for (x, y) in out.data.iter().zip(&baseline.data) {
                assert_relative_eq!(
                    *x,
                    *y,
                    epsilon = f32::EPSILON * layers.len() as f32 * scale
                );
            }
        }
    }

    #[test]
    fn same_inputs_give_bit_identical_output() {
        let mut rng = StdRng::seed_from_u64(5);
        let layers: Vec<RasterLayer> =
            (0..3).map(|i| random_layer(&mut rng, &format!("L{i}"), 7, 7)).collect();
        let w = WeightAssignment::uniform(layers.iter().map(|l| l.id.clone()));
        assert_eq!(aggregate(&layers, &w).unwrap(), aggregate(&layers, &w).unwrap());
    }

    #[test]
    fn nan_passes_through() {
        let a = layer("A", &[&[f32::NAN, 1.0]]);
        let b = layer("B", &[&[1.0, 1.0]]);
        let w: WeightAssignment = [("A", 0.5), ("B", 0.5)].into_iter().collect();
        let out = aggregate([&a, &b], &w).unwrap();
        assert!(out.get(0, 0).is_nan());
        assert_eq!(out.get(0, 1), 1.0);
    }
}
