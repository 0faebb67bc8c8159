//! Argument binding and submission of the bilateral kernel.

use bilat_device::{Buffer, ComputeDevice, KernelArg};
use snafu::ResultExt;

use crate::error::{LaunchSnafu, Result};
use crate::kernel_cache::CompiledVariant;
use crate::params::ParamBuffer;
use crate::plan::LaunchPlan;

/// Bind arguments in kernel order and enqueue the launch.
///
/// Returns once the launch is queued; completion is observed through the
/// device queue. An empty grid is not submitted.
#[allow(clippy::too_many_arguments)]
pub fn invoke(
    device: &dyn ComputeDevice,
    variant: &CompiledVariant,
    out: &Buffer,
    input: &Buffer,
    params: &ParamBuffer,
    spatial_sigma: f32,
    color_sigma: f32,
    plan: &LaunchPlan,
) -> Result<()> {
    if plan.is_empty() {
        tracing::trace!(device.id = device.id(), "empty launch grid, skipping bilateral");
        return Ok(());
    }

    let elem = variant.dtype.bytes();
    let args = vec![
        KernelArg::Buffer(out.clone()),
        KernelArg::Buffer(input.clone()),
        KernelArg::Local { bytes: plan.shared_tile_bytes(elem) },
        KernelArg::Local { bytes: plan.shared_weight_bytes(elem) },
        KernelArg::Buffer(params.buffer().clone()),
        KernelArg::F32(spatial_sigma),
        KernelArg::F32(color_sigma),
        KernelArg::I64(plan.shared_tile_elems as i64),
        KernelArg::I64(plan.blocks[0] as i64),
    ];

    tracing::debug!(
        device.id = device.id(),
        dtype = %variant.dtype,
        global = ?plan.global,
        radius = plan.radius,
        "launching bilateral"
    );
    device.enqueue_kernel(&variant.kernel, args, plan.range()).context(LaunchSnafu)
}
