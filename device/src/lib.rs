//! Device collaborators for bilateral dispatch.
//!
//! Provides the device, program, and queue abstractions the runtime compiles
//! and launches against, a [`DeviceManager`] tracking the active device, and
//! a host reference device implementing them in host memory.

pub mod buffer;
pub mod device;
pub mod error;
pub mod host;
pub mod manager;
pub mod queue;


pub use buffer::{Buffer, DeviceMemory, MemFlags};
pub use device::{BuildOptions, ComputeDevice, Kernel, Program, ProgramSource};
pub use error::{Error, Result};
pub use host::{HostDevice, HostStats};
pub use manager::{DeviceManager, MAX_DEVICES, ManagerConfig, manager};
pub use queue::{ArgKind, KernelArg, NdRange};
