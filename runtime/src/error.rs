//! Error types for bilateral dispatch.

use bilat_dtype::ScalarDType;
use snafu::Snafu;

/// Result type for dispatch operations.
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Errors that can occur while compiling, uploading, or launching.
///
/// None of these are transient; dispatch never retries.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum Error {
    /// The device compiler rejected the kernel, or the entry point is missing.
    #[snafu(display("failed to compile bilateral kernel for device {device_id} ({dtype}):\n{log}"))]
    Compile { device_id: usize, dtype: ScalarDType, log: String },

    /// Parameter allocation or upload failed.
    #[snafu(display("parameter transfer failed: {source}"))]
    Transfer { source: bilat_device::Error },

    /// No usable active device.
    #[snafu(display("invalid device: {source}"))]
    InvalidDevice { source: bilat_device::Error },

    /// The device refused the kernel submission.
    #[snafu(display("kernel launch failed: {source}"))]
    Launch { source: bilat_device::Error },

    #[snafu(display("array rank {rank} exceeds the supported maximum of {max}"))]
    RankExceeded { rank: usize, max: usize },
}
