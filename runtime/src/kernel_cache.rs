//! Per-device program cache.
//!
//! Maps `(device id, element type)` to the compiled bilateral program and its
//! entry point. Each key is compiled at most once for the lifetime of the
//! cache, regardless of how many threads race on first use.
//!
//! # Thread Safety
//!
//! The key → slot map is papaya's lock-free HashMap. Every slot is a
//! `OnceCell`: the first caller for a key runs the compilation while later
//! callers for the same key block on the cell, then share its result. Reads of
//! a populated slot take no locks.
//!
//! # Failures
//!
//! A rejected build is deterministic for a given source and options, so the
//! failure is stored in the slot like a success and reported to every caller
//! without compiling again.

use std::sync::Arc;
use std::time::Instant;

use bilat_device::{BuildOptions, ComputeDevice, Kernel, Program, ProgramSource};
use bilat_dtype::{INDEX_DTYPE, ScalarDType};
use once_cell::sync::{Lazy, OnceCell};
use papaya::HashMap;

use crate::config::RuntimeConfig;
use crate::error::{Error, Result};
use crate::kernels::{self, BILATERAL_ENTRY};
use crate::plan::MAX_FILTER_RADIUS;

/// Compiled program and entry point for one device and element type.
#[derive(Debug)]
pub struct CompiledVariant {
    pub device_id: usize,
    pub dtype: ScalarDType,
    pub program: Arc<dyn Program>,
    pub kernel: Arc<dyn Kernel>,
}

/// Cache key: (device id, element type).
///
/// Color and grayscale launches share one compiled kernel, so the color flag
/// is not part of the key.
type VariantKey = (usize, ScalarDType);

/// Outcome of the single compilation for a key; failures keep the compiler log.
type Outcome = std::result::Result<Arc<CompiledVariant>, String>;

type Slot = Arc<OnceCell<Outcome>>;

pub struct ProgramCache {
    source: ProgramSource,
    extra_options: BuildOptions,
    slots: HashMap<VariantKey, Slot>,
}

impl std::fmt::Debug for ProgramCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProgramCache")
            .field("source", &self.source.name)
            .field("extra_options", &self.extra_options)
            .field("entries", &self.slots.len())
            .finish()
    }
}

impl ProgramCache {
    /// Cache for the bilateral program.
    pub fn new(config: &RuntimeConfig) -> Self {
        Self::with_source(kernels::bilateral(), config)
    }

    /// Cache compiling a custom program that exports the bilateral entry point.
    pub fn with_source(source: ProgramSource, config: &RuntimeConfig) -> Self {
        Self { source, extra_options: config.extra_build_options.clone(), slots: HashMap::new() }
    }

    /// Build options specializing the program for `dtype`.
    pub fn build_options(&self, dtype: ScalarDType) -> BuildOptions {
        BuildOptions::new()
            .define("T", dtype.device_name())
            .define("dim_type", INDEX_DTYPE.device_name())
            .define("MAX_RADIUS", MAX_FILTER_RADIUS.to_string())
            .extend(self.extra_options.clone())
    }

    /// Get the compiled variant for `device`, compiling on first use.
    ///
    /// Thread-safe: concurrent callers with the same key trigger exactly one
    /// compilation and all receive the same `Arc`.
    ///
    /// # Errors
    ///
    /// [`Error::Compile`] with the compiler log if the build failed, now or on
    /// an earlier call.
    pub fn get_or_compile(&self, device: &dyn ComputeDevice, dtype: ScalarDType) -> Result<Arc<CompiledVariant>> {
        let key = (device.id(), dtype);
        let slot = {
            let guard = self.slots.guard();
            Arc::clone(self.slots.get_or_insert_with(key, || Arc::new(OnceCell::new()), &guard))
        };

        if let Some(outcome) = slot.get() {
            tracing::trace!(device.id = key.0, dtype = %dtype, "bilateral kernel cache hit");
            return Self::report(key, outcome);
        }

        let outcome = slot.get_or_init(|| self.compile(device, dtype));
        Self::report(key, outcome)
    }

    fn report((device_id, dtype): VariantKey, outcome: &Outcome) -> Result<Arc<CompiledVariant>> {
        match outcome {
            Ok(variant) => Ok(Arc::clone(variant)),
            Err(log) => Err(Error::Compile { device_id, dtype, log: log.clone() }),
        }
    }

    fn compile(&self, device: &dyn ComputeDevice, dtype: ScalarDType) -> Outcome {
        let options = self.build_options(dtype);
        let started = Instant::now();
        tracing::debug!(device.id = device.id(), dtype = %dtype, options = %options, "compiling bilateral kernel");

        let built = device
            .build_program(&self.source, &options)
            .and_then(|program| program.kernel(BILATERAL_ENTRY).map(|kernel| (program, kernel)));

        match built {
            Ok((program, kernel)) => {
                tracing::debug!(
                    device.id = device.id(),
                    dtype = %dtype,
                    elapsed_ms = started.elapsed().as_secs_f64() * 1e3,
                    "bilateral kernel compiled"
                );
                Ok(Arc::new(CompiledVariant { device_id: device.id(), dtype, program, kernel }))
            }
            Err(error) => {
                let log = match error {
                    bilat_device::Error::Build { log, .. } => log,
                    other => other.to_string(),
                };
                tracing::error!(device.id = device.id(), dtype = %dtype, %log, "bilateral kernel build failed");
                Err(log)
            }
        }
    }

    /// Number of keys that have been requested.
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop every cached variant.
    ///
    /// Intended for test isolation; callers already holding a variant keep it.
    pub fn clear(&self) {
        let guard = self.slots.guard();
        self.slots.clear(&guard);
    }
}

static CACHE: Lazy<ProgramCache> = Lazy::new(|| ProgramCache::new(&RuntimeConfig::from_env()));

/// Get the process-wide program cache.
pub fn global_cache() -> &'static ProgramCache {
    &CACHE
}
