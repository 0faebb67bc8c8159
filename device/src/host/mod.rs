//! Host reference device.
//!
//! Runs kernels on the CPU against host-resident buffers. The compiler
//! checks source and build options like a device compiler would, and entry
//! points resolve to native bodies registered with [`register_host_kernel`].

pub mod device;
pub mod memory;
pub mod program;

pub use device::{HostDevice, HostStats, LaunchRecord};
pub use memory::HostMemory;
pub use program::{HostKernel, HostKernelFn, HostLaunch, HostProgram, register_host_kernel};
