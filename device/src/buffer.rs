use std::any::Any;
use std::fmt;
use std::sync::Arc;

/// Access mode of a device allocation, as seen from kernels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum MemFlags {
    ReadOnly,
    WriteOnly,
    #[default]
    ReadWrite,
}

impl MemFlags {
    pub const fn kernel_writable(&self) -> bool {
        !matches!(self, Self::ReadOnly)
    }
}

/// Backend-owned storage behind a [`Buffer`].
///
/// Backends downcast through `as_any` to reach their concrete memory type.
pub trait DeviceMemory: Send + Sync + fmt::Debug {
    /// Size of the allocation in bytes.
    fn size(&self) -> usize;

    fn as_any(&self) -> &dyn Any;
}

/// Handle to device memory.
///
/// Cloning is cheap and yields another handle to the same allocation. The
/// allocation is released when the last handle is dropped.
#[derive(Debug, Clone)]
pub struct Buffer {
    memory: Arc<dyn DeviceMemory>,
    flags: MemFlags,
    device_id: usize,
}

impl Buffer {
    pub fn new(device_id: usize, flags: MemFlags, memory: Arc<dyn DeviceMemory>) -> Self {
        Self { memory, flags, device_id }
    }

    /// Get the size of this buffer in bytes.
    pub fn size(&self) -> usize {
        self.memory.size()
    }

    pub fn flags(&self) -> MemFlags {
        self.flags
    }

    /// Identifier of the device owning the allocation.
    pub fn device_id(&self) -> usize {
        self.device_id
    }

    pub fn memory(&self) -> &dyn DeviceMemory {
        &*self.memory
    }

    /// Downcast the backing storage to a backend memory type.
    pub fn downcast<M: DeviceMemory + 'static>(&self) -> Option<&M> {
        self.memory.as_any().downcast_ref::<M>()
    }

    /// Whether both handles refer to the same allocation.
    pub fn same_allocation(&self, other: &Buffer) -> bool {
        std::ptr::addr_eq(Arc::as_ptr(&self.memory), Arc::as_ptr(&other.memory))
    }
}
