//! Launch arguments and ranges for the command queue.

use crate::buffer::Buffer;

/// 2-D launch range in work-item units.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NdRange {
    /// Global work size (total number of work items per dimension).
    pub global: [usize; 2],
    /// Local work size (work group size per dimension).
    pub local: [usize; 2],
}

impl NdRange {
    pub const fn new_2d(global: [usize; 2], local: [usize; 2]) -> Self {
        Self { global, local }
    }

    /// True when the range covers no work items.
    pub const fn is_empty(&self) -> bool {
        self.global[0] == 0 || self.global[1] == 0
    }

    /// Number of work groups per dimension.
    pub const fn groups(&self) -> [usize; 2] {
        [self.global[0].div_ceil(self.local[0]), self.global[1].div_ceil(self.local[1])]
    }

    /// Global size must be a whole number of non-empty work groups.
    pub const fn is_uniform(&self) -> bool {
        self.local[0] > 0
            && self.local[1] > 0
            && self.global[0] % self.local[0] == 0
            && self.global[1] % self.local[1] == 0
    }
}

/// Kernel argument, bound by position.
#[derive(Debug, Clone)]
pub enum KernelArg {
    /// Global memory buffer.
    Buffer(Buffer),
    /// Work-group shared memory reservation of the given size.
    Local { bytes: usize },
    F32(f32),
    I64(i64),
}

/// Argument shape without payload, for launch inspection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArgKind {
    Buffer { bytes: usize },
    Local { bytes: usize },
    F32,
    I64,
}

impl KernelArg {
    pub fn kind(&self) -> ArgKind {
        match self {
            Self::Buffer(buffer) => ArgKind::Buffer { bytes: buffer.size() },
            Self::Local { bytes } => ArgKind::Local { bytes: *bytes },
            Self::F32(_) => ArgKind::F32,
            Self::I64(_) => ArgKind::I64,
        }
    }
}

impl From<Buffer> for KernelArg {
    fn from(buffer: Buffer) -> Self {
        Self::Buffer(buffer)
    }
}

impl From<f32> for KernelArg {
    fn from(value: f32) -> Self {
        Self::F32(value)
    }
}

impl From<i64> for KernelArg {
    fn from(value: i64) -> Self {
        Self::I64(value)
    }
}
