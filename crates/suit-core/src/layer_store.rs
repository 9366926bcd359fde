//! Layer store: decoded rasters keyed by source identifier.
//!
//! Layers keep insertion order; that order drives aggregation and picks the
//! reference layer for export. Decoding goes through a bounded [`DecodeCache`].

use std::sync::Arc;

#[cfg(feature = "threading")]
use rayon::prelude::*;
use tracing::{debug, info, warn};

use crate::cache::{DecodeCache, SourceKey};
use crate::error::DecodeError;
use crate::grid::Grid;
use crate::metadata::SpatialMetadata;
use crate::raster_io::{RasterDecoder, RasterSource};

/// A named single-band grid together with the metadata of its source.
#[derive(Debug, Clone, PartialEq)]
pub struct RasterLayer {
    pub id: String,
    pub grid: Grid,
    pub metadata: SpatialMetadata,
}

impl RasterLayer {
    pub fn shape(&self) -> (usize, usize) {
        self.grid.shape()
    }
}

/// Outcome of loading a batch: one bad source never aborts the rest.
#[derive(Debug, Default)]
pub struct BatchReport {
    /// Ids loaded successfully, each once, in order of first appearance.
    pub loaded: Vec<String>,
    /// Ids that appeared more than once in the batch; the last copy wins.
    pub shadowed: Vec<String>,
    pub failures: Vec<DecodeError>,
}

impl BatchReport {
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }
}

pub struct LayerStore<D> {
    decoder: D,
    cache: DecodeCache,
    layers: Vec<Arc<RasterLayer>>,
    generation: u64,
    parallel: bool,
}

impl<D: RasterDecoder> LayerStore<D> {
    pub fn new(decoder: D, cache_capacity: usize) -> Self {
        Self::with_cache(decoder, DecodeCache::new(cache_capacity))
    }

    /// Build a store on top of an existing (possibly shared) cache.
    pub fn with_cache(decoder: D, cache: DecodeCache) -> Self {
        Self {
            decoder,
            cache,
            layers: Vec::new(),
            generation: 0,
            parallel: true,
        }
    }

    /// Enable or disable parallel batch decoding. Without the `threading`
    /// feature batches always decode sequentially.
    pub fn set_parallel(&mut self, parallel: bool) {
        self.parallel = parallel;
    }

    pub fn cache(&self) -> &DecodeCache {
        &self.cache
    }

    /// Decode one source (or reuse its cached decode) and add it to the store,
    /// replacing any layer with the same id.
    pub fn load(&mut self, source: &RasterSource) -> Result<Arc<RasterLayer>, DecodeError> {
        let layer = fetch(&self.decoder, &self.cache, source)?;
        self.insert(Arc::clone(&layer));
        Ok(layer)
    }

    /// Load every source, collecting per-source failures.
    pub fn load_batch(&mut self, sources: &[RasterSource]) -> BatchReport {
        let mut report = BatchReport::default();
        for result in self.fetch_all(sources) {
            match result {
                Ok(layer) => {
                    if report.loaded.contains(&layer.id) {
                        warn!(source = %layer.id, "duplicate source in batch, keeping the later copy");
                        if !report.shadowed.contains(&layer.id) {
                            report.shadowed.push(layer.id.clone());
                        }
                    } else {
                        report.loaded.push(layer.id.clone());
                    }
                    self.insert(layer);
                }
                Err(e) => {
                    warn!(source = %e.id, reason = %e.reason, "skipping source that failed to decode");
                    report.failures.push(e);
                }
            }
        }
        info!(
            loaded = report.loaded.len(),
            failed = report.failures.len(),
            "batch loaded"
        );
        report
    }

    #[cfg(feature = "threading")]
    fn fetch_all(&self, sources: &[RasterSource]) -> Vec<Result<Arc<RasterLayer>, DecodeError>> {
        if self.parallel && sources.len() > 1 {
            let (decoder, cache) = (&self.decoder, &self.cache);
            return sources.par_iter().map(|s| fetch(decoder, cache, s)).collect();
        }
        sources.iter().map(|s| fetch(&self.decoder, &self.cache, s)).collect()
    }

    #[cfg(not(feature = "threading"))]
    fn fetch_all(&self, sources: &[RasterSource]) -> Vec<Result<Arc<RasterLayer>, DecodeError>> {
        sources.iter().map(|s| fetch(&self.decoder, &self.cache, s)).collect()
    }
}

impl<D> LayerStore<D> {
    fn insert(&mut self, layer: Arc<RasterLayer>) {
        match self.layers.iter_mut().find(|l| l.id == layer.id) {
            Some(slot) => *slot = layer,
            None => self.layers.push(layer),
        }
        self.generation += 1;
    }

    pub fn get(&self, id: &str) -> Option<&Arc<RasterLayer>> {
        self.layers.iter().find(|l| l.id == id)
    }

    /// Layer ids in insertion order.
    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.layers.iter().map(|l| l.id.as_str())
    }

    pub fn layers(&self) -> &[Arc<RasterLayer>] {
        &self.layers
    }

    pub fn len(&self) -> usize {
        self.layers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.layers.is_empty()
    }

    pub fn remove(&mut self, id: &str) -> Option<Arc<RasterLayer>> {
        let idx = self.layers.iter().position(|l| l.id == id)?;
        self.generation += 1;
        Some(self.layers.remove(idx))
    }

    /// Drop every loaded layer. Cached decodes survive.
    pub fn clear(&mut self) {
        if !self.layers.is_empty() {
            self.layers.clear();
            self.generation += 1;
        }
    }

    /// Metadata of the first layer in insertion order.
    pub fn reference_metadata(&self) -> Option<&SpatialMetadata> {
        self.layers.first().map(|l| &l.metadata)
    }

    /// Changes whenever the set of loaded layers changes.
    pub fn generation(&self) -> u64 {
        self.generation
    }
}

fn fetch<D: RasterDecoder>(
    decoder: &D,
    cache: &DecodeCache,
    source: &RasterSource,
) -> Result<Arc<RasterLayer>, DecodeError> {
    let key = SourceKey::new(&source.id, &source.bytes);
    if let Some(hit) = cache.get(&key) {
        debug!(source = %source.id, "decode cache hit");
        return Ok(hit);
    }
    debug!(source = %source.id, bytes = source.bytes.len(), "decoding source");
    let decoded = decoder.decode(source)?;
    let layer = Arc::new(RasterLayer {
        id: source.id.clone(),
        grid: decoded.grid,
        metadata: decoded.metadata,
    });
    Ok(cache.insert(key, layer))
}
