//! Native body of the bilateral kernel for host devices.
//!
//! Mirrors `bilateral.cl` work-group by work-group: each group stages a
//! clamped, halo-padded tile of its slice, and the shared spatial weight table
//! is held in the element type exactly as the local reservation sizes it.
//! Groups run in parallel; results are written back in one pass once every
//! group has finished.

use std::sync::{Arc, Once};

use bilat_device::error::LaunchSnafu;
use bilat_device::host::{HostLaunch, register_host_kernel};
use bilat_dtype::{HasDType, ScalarDType};
use rayon::prelude::*;
use snafu::ensure;

use crate::kernels::BILATERAL_ENTRY;
use crate::params::GeometryDescriptor;
use crate::plan::filter_radius;

type DeviceResult<T> = bilat_device::Result<T>;

/// Register the native bilateral body. Idempotent.
pub(crate) fn register() {
    static REGISTER: Once = Once::new();
    REGISTER.call_once(|| register_host_kernel(BILATERAL_ENTRY, Arc::new(run)));
}

/// Element types the native body is instantiated for.
trait Pixel: HasDType {
    fn to_f32(self) -> f32;
    fn from_f32(value: f32) -> Self;
}

macro_rules! impl_pixel {
    ($($ty:ty),* $(,)?) => {
        $(impl Pixel for $ty {
            #[inline]
            fn to_f32(self) -> f32 {
                self as f32
            }

            #[inline]
            fn from_f32(value: f32) -> Self {
                value as $ty
            }
        })*
    };
}

impl_pixel!(f32, f64, i8, u8, i16, u16, i32, u32);

fn run(launch: &HostLaunch<'_>) -> DeviceResult<()> {
    match launch.dtype("T")? {
        ScalarDType::Float32 => filter::<f32>(launch),
        ScalarDType::Float64 => filter::<f64>(launch),
        ScalarDType::Int8 => filter::<i8>(launch),
        ScalarDType::UInt8 => filter::<u8>(launch),
        ScalarDType::Int16 => filter::<i16>(launch),
        ScalarDType::UInt16 => filter::<u16>(launch),
        ScalarDType::Int32 => filter::<i32>(launch),
        ScalarDType::UInt32 => filter::<u32>(launch),
        other => LaunchSnafu { reason: format!("{}: unsupported element type {other}", launch.kernel) }.fail(),
    }
}

/// Scalar launch arguments, validated against the range.
struct Geometry {
    desc: GeometryDescriptor,
    radius: i64,
    padded: i64,
    window: i64,
    local: [i64; 2],
    blk_x: i64,
    variance_space: f32,
    variance_range: f32,
}

fn geometry<T: Pixel>(launch: &HostLaunch<'_>) -> DeviceResult<Geometry> {
    let kernel = launch.kernel;
    let elem = std::mem::size_of::<T>();

    let desc = {
        let params = launch.memory(4)?.read();
        GeometryDescriptor::from_bytes(&params).ok_or_else(|| {
            LaunchSnafu { reason: format!("{kernel}: parameter buffer holds {} bytes", params.len()) }.build()
        })?
    };

    let spatial_sigma = launch.f32(5)?;
    let color_sigma = launch.f32(6)?;
    let tile_elems = launch.i64(7)?;
    let blk_x = launch.i64(8)?;

    let radius = filter_radius(spatial_sigma) as i64;
    let window = 2 * radius + 1;
    let overflow = || {
        LaunchSnafu { reason: format!("{kernel}: work-group size {:?} overflows", launch.range.local) }.build()
    };
    let local = [
        i64::try_from(launch.range.local[0]).map_err(|_| overflow())?,
        i64::try_from(launch.range.local[1]).map_err(|_| overflow())?,
    ];
    ensure!(
        local[0] == local[1],
        LaunchSnafu { reason: format!("{kernel}: work-group {:?} must be square", launch.range.local) }
    );
    let padded = local[0].checked_add(2 * radius).ok_or_else(overflow)?;
    let padded_elems = padded.checked_mul(padded).ok_or_else(overflow)?;
    let tile_bytes = usize::try_from(padded_elems).ok().and_then(|n| n.checked_mul(elem)).ok_or_else(overflow)?;

    ensure!(
        tile_elems == padded_elems && launch.local_bytes(2)? >= tile_bytes,
        LaunchSnafu { reason: format!("{kernel}: tile reservation too small for radius {radius}") }
    );
    ensure!(
        launch.local_bytes(3)? >= (window * window) as usize * elem,
        LaunchSnafu { reason: format!("{kernel}: weight reservation too small for radius {radius}") }
    );
    ensure!(blk_x > 0, LaunchSnafu { reason: format!("{kernel}: block count {blk_x} must be positive") });

    Ok(Geometry {
        desc,
        radius,
        padded,
        window,
        local,
        blk_x,
        variance_space: (spatial_sigma * spatial_sigma).max(f32::MIN_POSITIVE),
        variance_range: (color_sigma * color_sigma).max(f32::MIN_POSITIVE),
    })
}

fn filter<T: Pixel>(launch: &HostLaunch<'_>) -> DeviceResult<()> {
    let kernel = launch.kernel;
    let out = launch.buffer(0)?;
    ensure!(
        out.flags().kernel_writable(),
        LaunchSnafu { reason: format!("{kernel}: output buffer is read-only") }
    );
    ensure!(
        !out.same_allocation(launch.buffer(1)?),
        LaunchSnafu { reason: format!("{kernel}: input and output must not alias") }
    );

    let g = geometry::<T>(launch)?;
    let [d0, d1, d2, _] = g.desc.dims;
    if d0 <= 0 || d1 <= 0 || d2 <= 0 {
        return Ok(());
    }

    let weights: Vec<f32> = (0..g.window * g.window)
        .map(|i| {
            let x = (i % g.window - g.radius) as f32;
            let y = (i / g.window - g.radius) as f32;
            T::from_f32((((x * x) + (y * y)) / (-2.0 * g.variance_space)).exp()).to_f32()
        })
        .collect();

    let [groups_x, groups_y] = launch.range.groups();
    let written: Vec<Vec<(usize, T)>> = {
        let guard = launch.memory(1)?.read();
        let input: &[u8] = &guard;
        (0..groups_x * groups_y)
            .into_par_iter()
            .map(|group| {
                let (group_x, group_y) = ((group % groups_x) as i64, (group / groups_x) as i64);
                run_group::<T>(kernel, &g, &weights, input, group_x, group_y)
            })
            .collect::<DeviceResult<_>>()?
    };

    let mut output = launch.memory(0)?.write();
    for (index, value) in written.into_iter().flatten() {
        store(kernel, &mut output, index, value)?;
    }
    Ok(())
}

/// Filter one work-group, returning the output elements it produced.
fn run_group<T: Pixel>(
    kernel: &str,
    g: &Geometry,
    weights: &[f32],
    input: &[u8],
    group_x: i64,
    group_y: i64,
) -> DeviceResult<Vec<(usize, T)>> {
    let desc = &g.desc;
    let [d0, d1, d2, _] = desc.dims;
    let (is, os) = (&desc.in_strides, &desc.out_strides);

    let batch = group_x / g.blk_x;
    let (b2, b3) = (batch % d2, batch / d2);
    let block_x = group_x - batch * g.blk_x;

    let in_base = linear_index(kernel, desc.offset, &[(b2, is[2]), (b3, is[3])])?;
    let out_base = linear_index(kernel, 0, &[(b2, os[2]), (b3, os[3])])?;
    let x0 = g.local[0] * block_x - g.radius;
    let y0 = g.local[1] * group_y - g.radius;

    let mut tile = Vec::with_capacity((g.padded * g.padded) as usize);
    for b in 0..g.padded {
        let sy = (y0 + b).clamp(0, d1 - 1);
        for a in 0..g.padded {
            let sx = (x0 + a).clamp(0, d0 - 1);
            let index = linear_index(kernel, in_base, &[(sx, is[0]), (sy, is[1])])?;
            tile.push(load::<T>(kernel, input, index)?.to_f32());
        }
    }

    let mut produced = Vec::new();
    for ly in 0..g.local[1] {
        let gy = g.local[1] * group_y + ly;
        for lx in 0..g.local[0] {
            let gx = g.local[0] * block_x + lx;
            if gx >= d0 || gy >= d1 {
                continue;
            }

            let center = tile[((ly + g.radius) * g.padded + lx + g.radius) as usize];
            let (mut norm, mut res) = (0.0f32, 0.0f32);
            for wj in 0..g.window {
                for wi in 0..g.window {
                    let value = tile[((ly + wj) * g.padded + lx + wi) as usize];
                    let delta = center - value;
                    let weight = weights[(wj * g.window + wi) as usize]
                        * ((delta * delta) / (-2.0 * g.variance_range)).exp();
                    norm += weight;
                    res += value * weight;
                }
            }

            let index = element_index(kernel, linear_index(kernel, out_base, &[(gx, os[0]), (gy, os[1])])?)?;
            produced.push((index, T::from_f32(res / norm)));
        }
    }
    Ok(produced)
}

/// `base + Σ coord * stride`, or an out-of-bounds error if it overflows.
fn linear_index(kernel: &str, base: i64, terms: &[(i64, i64)]) -> DeviceResult<i64> {
    terms
        .iter()
        .try_fold(base, |acc, &(coord, stride)| coord.checked_mul(stride).and_then(|step| acc.checked_add(step)))
        .ok_or_else(|| LaunchSnafu { reason: format!("{kernel}: element index is out of bounds") }.build())
}

fn element_index(kernel: &str, index: i64) -> DeviceResult<usize> {
    usize::try_from(index)
        .map_err(|_| LaunchSnafu { reason: format!("{kernel}: negative element index {index}") }.build())
}

/// Byte range of element `index`, if it is addressable.
fn byte_range(index: usize, elem: usize) -> Option<std::ops::Range<usize>> {
    let start = index.checked_mul(elem)?;
    Some(start..start.checked_add(elem)?)
}

fn load<T: Pixel>(kernel: &str, bytes: &[u8], index: i64) -> DeviceResult<T> {
    let range = byte_range(element_index(kernel, index)?, std::mem::size_of::<T>());
    match range.and_then(|range| bytes.get(range)) {
        Some(raw) => Ok(bytemuck::pod_read_unaligned(raw)),
        None => LaunchSnafu { reason: format!("{kernel}: read of element {index} is out of bounds") }.fail(),
    }
}

fn store<T: Pixel>(kernel: &str, bytes: &mut [u8], index: usize, value: T) -> DeviceResult<()> {
    match byte_range(index, std::mem::size_of::<T>()).and_then(|range| bytes.get_mut(range)) {
        Some(raw) => {
            raw.copy_from_slice(bytemuck::bytes_of(&value));
            Ok(())
        }
        None => LaunchSnafu { reason: format!("{kernel}: write of element {index} is out of bounds") }.fail(),
    }
}
