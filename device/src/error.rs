use snafu::Snafu;

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum Error {
    /// The device compiler rejected the program source or build options.
    #[snafu(display("program '{program}' failed to build:\n{log}"))]
    Build { program: String, log: String },

    /// Entry point is not present in a built program.
    #[snafu(display("kernel '{name}' not found in program '{program}'"))]
    KernelNotFound { program: String, name: String },

    #[snafu(display("allocation of {size} bytes failed: {reason}"))]
    Allocation { size: usize, reason: String },

    /// Failed to copy data between host and device.
    #[snafu(display("transfer failed: {reason}"))]
    Transfer { reason: String },

    #[snafu(display("access at offset {offset} + size {size} exceeds buffer size {buffer_size}"))]
    OutOfBounds { offset: usize, size: usize, buffer_size: usize },

    /// Device identifier outside the registered range.
    #[snafu(display("invalid device {id}: {count} device(s) available"))]
    InvalidDevice { id: usize, count: usize },

    #[snafu(display("cannot register more than {max} devices"))]
    TooManyDevices { max: usize },

    #[snafu(display("kernel launch failed: {reason}"))]
    Launch { reason: String },
}
