use std::any::Any;

use parking_lot::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::buffer::DeviceMemory;

/// Host-resident storage for the reference device.
#[derive(Debug)]
pub struct HostMemory {
    data: RwLock<Box<[u8]>>,
    size: usize,
}

impl HostMemory {
    pub fn zeroed(size: usize) -> Self {
        Self { data: RwLock::new(vec![0u8; size].into_boxed_slice()), size }
    }

    pub fn read(&self) -> RwLockReadGuard<'_, Box<[u8]>> {
        self.data.read()
    }

    pub fn write(&self) -> RwLockWriteGuard<'_, Box<[u8]>> {
        self.data.write()
    }
}

impl DeviceMemory for HostMemory {
    fn size(&self) -> usize {
        self.size
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}
