//! Request-scoped suitability session.
//!
//! A session is created at the start of a batch, receives uploads and weight
//! edits, recomputes the combined grid only when the layer set or the weights
//! changed, and is discarded after export. Failed attempts leave the loaded
//! layers and the previous combined grid untouched.

use std::path::Path;
use std::sync::Arc;

use tracing::{debug, info};

use crate::aggregate::{aggregate, CombinedGrid};
use crate::cache::DecodeCache;
use crate::config::SessionConfig;
use crate::error::{DecodeError, Result, SessionError, WeightError};
use crate::export::{prepare_export, ExportPayload};
use crate::layer_store::{BatchReport, LayerStore, RasterLayer};
use crate::metadata::SpatialMetadata;
use crate::raster_io::{RasterDecoder, RasterEncoder, RasterSource};
use crate::weights::{validate, WeightAssignment};

/// Result of the last successful calculation and the inputs it was built from.
struct Calculation {
    generation: u64,
    weights: WeightAssignment,
    grid: CombinedGrid,
    reference: Option<SpatialMetadata>,
}

pub struct Session<D> {
    config: SessionConfig,
    store: LayerStore<D>,
    weights: WeightAssignment,
    last: Option<Calculation>,
}

impl<D: RasterDecoder> Session<D> {
    pub fn new(config: SessionConfig, decoder: D) -> Self {
        let cache = DecodeCache::new(config.cache_capacity);
        Self::with_cache(config, decoder, cache)
    }

    /// Start a session that reuses a decode cache from earlier sessions.
    pub fn with_cache(config: SessionConfig, decoder: D, cache: DecodeCache) -> Self {
        let mut store = LayerStore::with_cache(decoder, cache);
        store.set_parallel(config.parallel_decode);
        Self {
            config,
            store,
            weights: WeightAssignment::new(),
            last: None,
        }
    }

    /// Load a batch of sources; failures are reported per source.
    pub fn upload(&mut self, sources: &[RasterSource]) -> BatchReport {
        self.store.load_batch(sources)
    }

    /// Load a single source.
    pub fn upload_one(
        &mut self,
        source: &RasterSource,
    ) -> std::result::Result<Arc<RasterLayer>, DecodeError> {
        self.store.load(source)
    }
}

impl<D> Session<D> {
    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn store(&self) -> &LayerStore<D> {
        &self.store
    }

    pub fn remove_layer(&mut self, id: &str) -> Option<Arc<RasterLayer>> {
        self.store.remove(id)
    }

    pub fn weights(&self) -> &WeightAssignment {
        &self.weights
    }

    pub fn set_weights(&mut self, weights: WeightAssignment) {
        self.weights = weights;
    }

    pub fn set_weight(&mut self, id: impl Into<String>, weight: f64) {
        self.weights.set(id, weight);
    }

    /// `1 / n` for every loaded layer.
    pub fn default_weights(&self) -> WeightAssignment {
        WeightAssignment::uniform(self.store.ids())
    }

    /// Check the current weights against the currently loaded layers.
    pub fn validate(&self) -> std::result::Result<&WeightAssignment, WeightError> {
        validate(&self.weights, self.store.ids(), &self.config.tolerance)
    }

    /// Validate, then aggregate unless the same layer set and weights were
    /// already combined.
    pub fn calculate(&mut self) -> Result<&CombinedGrid> {
        self.validate()?;

        let generation = self.store.generation();
        let fresh = self
            .last
            .as_ref()
            .is_some_and(|c| c.generation == generation && c.weights == self.weights);
        if fresh {
            debug!("inputs unchanged, reusing combined grid");
        } else {
            let grid = aggregate(self.store.layers().iter().map(|l| &**l), &self.weights)?;
            self.last = Some(Calculation {
                generation,
                weights: self.weights.clone(),
                grid,
                reference: self.store.reference_metadata().cloned(),
            });
        }
        self.combined().ok_or(SessionError::NotCalculated)
    }

    pub fn combined(&self) -> Option<&CombinedGrid> {
        self.last.as_ref().map(|c| &c.grid)
    }

    /// Drop the loaded layers once the combined grid exists. The reference
    /// metadata captured by the calculation stays available for export.
    pub fn release_layers(&mut self) {
        self.store.clear();
        info!("released loaded layers");
    }

    /// Pair the combined grid with the reference layer's metadata.
    pub fn prepare_export(&self) -> Result<ExportPayload> {
        let calc = self.last.as_ref().ok_or(SessionError::NotCalculated)?;
        Ok(prepare_export(calc.reference.as_ref(), calc.grid.clone())?)
    }

    /// Prepare the payload and hand it to an encoder.
    pub fn export<E: RasterEncoder>(&self, encoder: &E, destination: &Path) -> Result<ExportPayload> {
        let payload = self.prepare_export()?;
        encoder.encode(&payload, destination)?;
        info!(destination = %destination.display(), "exported combined grid");
        Ok(payload)
    }

    /// End the session, releasing everything it holds.
    pub fn finish(self) -> Option<CombinedGrid> {
        self.last.map(|c| c.grid)
    }
}
