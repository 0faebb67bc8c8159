//! Bilateral filter dispatch.
//!
//! # Example
//!
//! ```ignore
//! use bilat_runtime::{GeometryDescriptor, bilateral};
//!
//! let desc = GeometryDescriptor::contiguous([640, 480, 1, 1]);
//! bilateral::<f32, false>(&out, &input, &desc, 2.0, 0.1)?;
//! ```

use bilat_device::{Buffer, DeviceManager, manager};
use bilat_dtype::HasDType;
use snafu::ResultExt;

use crate::error::{InvalidDeviceSnafu, Result};
use crate::invoke::invoke;
use crate::kernel_cache::{ProgramCache, global_cache};
use crate::params::{GeometryDescriptor, upload};
use crate::plan::LaunchPlan;

/// Element types the bilateral kernel is instantiated for.
pub trait BilateralElement: HasDType {}

impl BilateralElement for f32 {}
impl BilateralElement for f64 {}
impl BilateralElement for i8 {}
impl BilateralElement for u8 {}
impl BilateralElement for i16 {}
impl BilateralElement for u16 {}
impl BilateralElement for i32 {}
impl BilateralElement for u32 {}

/// Dispatcher bound to a device manager and a program cache.
#[derive(Debug, Clone, Copy)]
pub struct Bilateral<'a> {
    manager: &'a DeviceManager,
    cache: &'a ProgramCache,
}

impl Bilateral<'static> {
    /// Dispatcher over the global device manager and program cache.
    pub fn global() -> Self {
        Self { manager: manager(), cache: global_cache() }
    }
}

impl<'a> Bilateral<'a> {
    pub fn new(manager: &'a DeviceManager, cache: &'a ProgramCache) -> Self {
        Self { manager, cache }
    }

    /// Enqueue a bilateral filter of `input` into `out` on the active device.
    ///
    /// With `IS_COLOR` every `dims[3]` slice is filtered as an independent
    /// channel; otherwise only `dims[2]` is batched. Returns once the launch is
    /// queued.
    ///
    /// # Errors
    ///
    /// - [`Error::InvalidDevice`](crate::Error::InvalidDevice) if the active device is not registered.
    /// - [`Error::Compile`](crate::Error::Compile) if the kernel failed to build for `T`.
    /// - [`Error::Transfer`](crate::Error::Transfer) if the geometry could not be uploaded.
    /// - [`Error::Launch`](crate::Error::Launch) if the device refused the submission.
    pub fn run<T: BilateralElement, const IS_COLOR: bool>(
        &self,
        out: &Buffer,
        input: &Buffer,
        desc: &GeometryDescriptor,
        spatial_sigma: f32,
        color_sigma: f32,
    ) -> Result<()> {
        let device = self.manager.active_device().context(InvalidDeviceSnafu)?;
        let variant = self.cache.get_or_compile(device.as_ref(), T::DTYPE)?;
        let params = upload(device.as_ref(), desc)?;
        let plan = LaunchPlan::new(&desc.dims, IS_COLOR, spatial_sigma);
        invoke(device.as_ref(), &variant, out, input, &params, spatial_sigma, color_sigma, &plan)
    }
}

/// Enqueue a bilateral filter on the global active device.
///
/// See [`Bilateral::run`].
pub fn bilateral<T: BilateralElement, const IS_COLOR: bool>(
    out: &Buffer,
    input: &Buffer,
    desc: &GeometryDescriptor,
    spatial_sigma: f32,
    color_sigma: f32,
) -> Result<()> {
    Bilateral::global().run::<T, IS_COLOR>(out, input, desc, spatial_sigma, color_sigma)
}
