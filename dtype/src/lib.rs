//! Element type tags for kernel specialization.
//!
//! Every element type a kernel can be built for has a tag here with two
//! properties the dispatch layer relies on: the type name understood by the
//! device compiler (substituted into build options) and its size in bytes
//! (used to size shared-memory reservations).

pub mod ext;


pub use ext::{Complex32, Complex64, HasDType};

/// Scalar element types known to the device compiler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[derive(strum::EnumCount, strum::EnumIter, strum::VariantArray)]
pub enum ScalarDType {
    Int8 = 0,
    UInt8 = 1,
    Int16 = 2,
    UInt16 = 3,
    Int32 = 4,
    UInt32 = 5,
    Int64 = 6,
    UInt64 = 7,

    Float32 = 8,
    Float64 = 9,

    /// Interleaved pair of `f32` (real, imaginary).
    Complex32 = 10,
    /// Interleaved pair of `f64` (real, imaginary).
    Complex64 = 11,
}

/// Type used for indices and sizes inside kernels (`dim_type`).
pub const INDEX_DTYPE: ScalarDType = ScalarDType::Int64;

impl ScalarDType {
    pub const fn bytes(&self) -> usize {
        match self {
            Self::Int8 | Self::UInt8 => 1,
            Self::Int16 | Self::UInt16 => 2,
            Self::Int32 | Self::UInt32 | Self::Float32 => 4,
            Self::Int64 | Self::UInt64 | Self::Float64 => 8,
            Self::Complex32 => 8,
            Self::Complex64 => 16,
        }
    }

    /// Type name as spelled in device kernel source.
    pub const fn device_name(&self) -> &'static str {
        match self {
            Self::Int8 => "char",
            Self::UInt8 => "uchar",
            Self::Int16 => "short",
            Self::UInt16 => "ushort",
            Self::Int32 => "int",
            Self::UInt32 => "uint",
            Self::Int64 => "long",
            Self::UInt64 => "ulong",
            Self::Float32 => "float",
            Self::Float64 => "double",
            Self::Complex32 => "cfloat",
            Self::Complex64 => "cdouble",
        }
    }

    /// Reverse lookup of [`ScalarDType::device_name`].
    pub fn from_device_name(name: &str) -> Option<Self> {
        use strum::VariantArray;
        Self::VARIANTS.iter().copied().find(|dtype| dtype.device_name() == name)
    }
}

impl std::fmt::Display for ScalarDType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.device_name())
    }
}
