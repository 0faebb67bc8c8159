//! Bilateral filter dispatch.
//!
//! Compiles the bilateral kernel once per device and element type, packs
//! array geometry into a device-readable descriptor, sizes the work-group
//! grid and shared memory from the spatial sigma, and enqueues the launch on
//! the active device.
//!
//! # Flow
//!
//! ```text
//! ProgramCache::get_or_compile → params::upload → LaunchPlan::new → invoke
//! ```
//!
//! Host reference devices execute the kernel through a native body registered
//! by [`host_kernel`].

pub mod bilateral;
pub mod config;
pub mod error;
mod host_kernel;
pub mod invoke;
pub mod kernel_cache;
pub mod kernels;
pub mod params;
pub mod plan;


pub use bilateral::{Bilateral, BilateralElement, bilateral};
pub use config::RuntimeConfig;
pub use error::*;
pub use invoke::invoke;
pub use kernel_cache::{CompiledVariant, ProgramCache, global_cache};
pub use params::{GeometryDescriptor, MAX_RANK, ParamBuffer, upload};
pub use plan::{LaunchPlan, MAX_FILTER_RADIUS, THREADS_X, THREADS_Y, filter_radius};
