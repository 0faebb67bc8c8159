use super::*;

/// Compile-time mapping from a Rust element type to its [`ScalarDType`] tag.
///
/// Types without an impl cannot be dispatched; the mistake surfaces as a
/// trait-bound error instead of a runtime failure.
pub trait HasDType: bytemuck::Pod + Send + Sync + 'static {
    const DTYPE: ScalarDType;
}

macro_rules! impl_dtype_ext {
    ($($ty:ty => $dtype:expr),* $(,)?) => {
        $(impl HasDType for $ty { const DTYPE: ScalarDType = $dtype; })*
    };
}

impl_dtype_ext! {
    i8 => ScalarDType::Int8, i16 => ScalarDType::Int16, i32 => ScalarDType::Int32, i64 => ScalarDType::Int64,
    u8 => ScalarDType::UInt8, u16 => ScalarDType::UInt16, u32 => ScalarDType::UInt32, u64 => ScalarDType::UInt64,
    f32 => ScalarDType::Float32, f64 => ScalarDType::Float64,
    Complex32 => ScalarDType::Complex32, Complex64 => ScalarDType::Complex64,
}

/// Single precision complex value with the device `cfloat` layout.
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct Complex32 {
    pub re: f32,
    pub im: f32,
}

/// Double precision complex value with the device `cdouble` layout.
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct Complex64 {
    pub re: f64,
    pub im: f64,
}
