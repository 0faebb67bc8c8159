//! Kernel sources compiled by the runtime.

use bilat_device::ProgramSource;

/// Entry point of the bilateral program.
pub const BILATERAL_ENTRY: &str = "bilateral";

const BILATERAL_SOURCE: ProgramSource = ProgramSource::from_static("bilateral.cl", include_str!("bilateral.cl"));

/// The bilateral program source.
///
/// Also registers the native body host devices execute for it.
pub fn bilateral() -> ProgramSource {
    crate::host_kernel::register();
    BILATERAL_SOURCE
}
