//! Array geometry shared byte-for-byte between host and kernel.

use bilat_device::{Buffer, ComputeDevice, MemFlags};
use bytemuck::{Pod, Zeroable};
use snafu::{ResultExt, ensure};

use crate::error::{RankExceededSnafu, Result, TransferSnafu};

/// Number of dimension slots in a descriptor.
pub const MAX_RANK: usize = 4;

/// Geometry of the input and output arrays of one launch.
///
/// Layout matches `KParams` in `bilateral.cl`: an offset followed by three
/// arrays of four signed 64-bit values, with no padding. Unused trailing
/// dimensions have extent 1.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Pod, Zeroable)]
pub struct GeometryDescriptor {
    /// Element offset of the first input element.
    pub offset: i64,
    pub dims: [i64; MAX_RANK],
    /// Input strides in elements.
    pub in_strides: [i64; MAX_RANK],
    /// Output strides in elements.
    pub out_strides: [i64; MAX_RANK],
}

const _: () = assert!(std::mem::size_of::<GeometryDescriptor>() == 104);

impl GeometryDescriptor {
    /// Dense column-major geometry for input and output of the same shape.
    pub fn contiguous(dims: [i64; MAX_RANK]) -> Self {
        let mut strides = [1i64; MAX_RANK];
        for axis in 1..MAX_RANK {
            strides[axis] = strides[axis - 1] * dims[axis - 1].max(1);
        }
        Self { offset: 0, dims, in_strides: strides, out_strides: strides }
    }

    /// Dense geometry for a shape of rank at most [`MAX_RANK`].
    pub fn from_shape(shape: &[usize]) -> Result<Self> {
        ensure!(shape.len() <= MAX_RANK, RankExceededSnafu { rank: shape.len(), max: MAX_RANK });
        let mut dims = [1i64; MAX_RANK];
        for (slot, &extent) in dims.iter_mut().zip(shape) {
            *slot = extent as i64;
        }
        Ok(Self::contiguous(dims))
    }

    pub fn with_offset(mut self, offset: i64) -> Self {
        self.offset = offset;
        self
    }

    pub fn with_in_strides(mut self, strides: [i64; MAX_RANK]) -> Self {
        self.in_strides = strides;
        self
    }

    pub fn with_out_strides(mut self, strides: [i64; MAX_RANK]) -> Self {
        self.out_strides = strides;
        self
    }

    /// Number of output elements described.
    pub fn elements(&self) -> i64 {
        self.dims.iter().map(|&d| d.max(0)).product()
    }

    pub fn as_bytes(&self) -> &[u8] {
        bytemuck::bytes_of(self)
    }

    /// Decode a descriptor from exactly `size_of::<Self>()` bytes.
    ///
    /// The bytes need not be aligned.
    pub fn from_bytes(bytes: &[u8]) -> Option<Self> {
        (bytes.len() == std::mem::size_of::<Self>()).then(|| bytemuck::pod_read_unaligned(bytes))
    }
}

/// Device copy of a descriptor, owned by a single launch.
#[derive(Debug, Clone)]
pub struct ParamBuffer {
    buffer: Buffer,
}

impl ParamBuffer {
    pub fn buffer(&self) -> &Buffer {
        &self.buffer
    }
}

/// Copy `desc` into a fresh read-only buffer on `device`.
///
/// The write is blocking, so the host descriptor may be dropped on return.
pub fn upload(device: &dyn ComputeDevice, desc: &GeometryDescriptor) -> Result<ParamBuffer> {
    let bytes = desc.as_bytes();
    let buffer = device.alloc(bytes.len(), MemFlags::ReadOnly).context(TransferSnafu)?;
    device.write_buffer(&buffer, 0, bytes, true).context(TransferSnafu)?;
    tracing::trace!(device.id = device.id(), bytes = bytes.len(), dims = ?desc.dims, "uploaded geometry descriptor");
    Ok(ParamBuffer { buffer })
}
