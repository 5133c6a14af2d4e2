use crate::buffer::{BufferMut, BufferRef, HostBuffer};
use half::{bf16, f16};
use kiln_core::ElementType;

/// Scalar trait is implemented for every resolved [ElementType]
pub trait Scalar: Copy + PartialEq + PartialOrd + Send + Sync + core::fmt::Debug + 'static {
    /// Element type of Self
    const ELEMENT_TYPE: ElementType;
    /// Get zero of Self
    fn zero() -> Self;
    /// From f64, saturating for integers
    fn from_f64(x: f64) -> Self;
    /// Convert self into f64
    fn into_f64(self) -> f64;
    /// From little endian bytes, bytes are at least as long as Self
    fn from_le_bytes(bytes: &[u8]) -> Self;
    /// Wrap values in a host buffer
    fn into_buffer(data: Vec<Self>) -> HostBuffer;
    /// Typed view of buffer, None if element types differ
    fn slice(buffer: BufferRef<'_>) -> Option<&[Self]>;
    /// Typed mutable view of buffer, None if element types differ
    fn slice_mut(buffer: BufferMut<'_>) -> Option<&mut [Self]>;
}

/// Scalars with addition, subtraction, multiplication and division
pub trait Arithmetic: Scalar {
    /// Add
    fn add(self, rhs: Self) -> Self;
    /// Sub
    fn sub(self, rhs: Self) -> Self;
    /// Mul
    fn mul(self, rhs: Self) -> Self;
    /// Div, integer division by zero gives zero
    fn div(self, rhs: Self) -> Self;
}

/// Arithmetic scalars with negation
pub trait Signed: Arithmetic {
    /// Neg
    fn neg(self) -> Self;
}

/// Floating point scalars
pub trait Float: Signed {
    /// Arc cosine
    fn acos(self) -> Self;
    /// Square root
    fn sqrt(self) -> Self;
    /// Exp
    fn exp(self) -> Self;
    /// Ln
    fn ln(self) -> Self;
    /// Round half away from zero
    fn round(self) -> Self;
}

macro_rules! scalar {
    ($t:ty, $variant:ident, $zero:expr, $from:expr, $into:expr, $n:literal) => {
        impl Scalar for $t {
            const ELEMENT_TYPE: ElementType = ElementType::$variant;

            fn zero() -> Self {
                $zero
            }

            fn from_f64(x: f64) -> Self {
                $from(x)
            }

            fn into_f64(self) -> f64 {
                $into(self)
            }

            fn from_le_bytes(bytes: &[u8]) -> Self {
                let mut b = [0u8; $n];
                b.copy_from_slice(&bytes[..$n]);
                <$t>::from_le_bytes(b)
            }

            fn into_buffer(data: Vec<Self>) -> HostBuffer {
                HostBuffer::$variant(data)
            }

            fn slice(buffer: BufferRef<'_>) -> Option<&[Self]> {
                match buffer {
                    BufferRef::$variant(x) => Some(x),
                    _ => None,
                }
            }

            fn slice_mut(buffer: BufferMut<'_>) -> Option<&mut [Self]> {
                match buffer {
                    BufferMut::$variant(x) => Some(x),
                    _ => None,
                }
            }
        }
    };
}

scalar!(bf16, BF16, bf16::ZERO, bf16::from_f64, bf16::to_f64, 2);
scalar!(f16, F16, f16::ZERO, f16::from_f64, f16::to_f64, 2);
scalar!(f32, F32, 0., |x| x as f32, f64::from, 4);
scalar!(f64, F64, 0., |x| x, |x| x, 8);
scalar!(i8, I8, 0, |x| x as i8, f64::from, 1);
scalar!(i16, I16, 0, |x| x as i16, f64::from, 2);
scalar!(i32, I32, 0, |x| x as i32, f64::from, 4);
scalar!(i64, I64, 0, |x| x as i64, |x| x as f64, 8);
scalar!(u8, U8, 0, |x| x as u8, f64::from, 1);
scalar!(u16, U16, 0, |x| x as u16, f64::from, 2);
scalar!(u32, U32, 0, |x| x as u32, f64::from, 4);
scalar!(u64, U64, 0, |x| x as u64, |x| x as f64, 8);

impl Scalar for bool {
    const ELEMENT_TYPE: ElementType = ElementType::Boolean;

    fn zero() -> Self {
        false
    }

    fn from_f64(x: f64) -> Self {
        x != 0.
    }

    fn into_f64(self) -> f64 {
        f64::from(u8::from(self))
    }

    fn from_le_bytes(bytes: &[u8]) -> Self {
        bytes[0] != 0
    }

    fn into_buffer(data: Vec<Self>) -> HostBuffer {
        HostBuffer::Boolean(data)
    }

    fn slice(buffer: BufferRef<'_>) -> Option<&[Self]> {
        match buffer {
            BufferRef::Boolean(x) => Some(x),
            _ => None,
        }
    }

    fn slice_mut(buffer: BufferMut<'_>) -> Option<&mut [Self]> {
        match buffer {
            BufferMut::Boolean(x) => Some(x),
            _ => None,
        }
    }
}

macro_rules! integer {
    ($($t:ty),*) => {
        $(impl Arithmetic for $t {
            fn add(self, rhs: Self) -> Self {
                self.wrapping_add(rhs)
            }

            fn sub(self, rhs: Self) -> Self {
                self.wrapping_sub(rhs)
            }

            fn mul(self, rhs: Self) -> Self {
                self.wrapping_mul(rhs)
            }

            fn div(self, rhs: Self) -> Self {
                self.checked_div(rhs).unwrap_or(0)
            }
        })*
    };
}

integer!(i8, i16, i32, i64, u8, u16, u32, u64);

macro_rules! signed_integer {
    ($($t:ty),*) => {
        $(impl Signed for $t {
            fn neg(self) -> Self {
                self.wrapping_neg()
            }
        })*
    };
}

signed_integer!(i8, i16, i32, i64);

macro_rules! float {
    ($($t:ty),*) => {
        $(impl Arithmetic for $t {
            fn add(self, rhs: Self) -> Self {
                self + rhs
            }

            fn sub(self, rhs: Self) -> Self {
                self - rhs
            }

            fn mul(self, rhs: Self) -> Self {
                self * rhs
            }

            fn div(self, rhs: Self) -> Self {
                self / rhs
            }
        }

        impl Signed for $t {
            fn neg(self) -> Self {
                -self
            }
        })*
    };
}

float!(bf16, f16, f32, f64);

impl Float for f32 {
    fn acos(self) -> Self {
        f32::acos(self)
    }

    fn sqrt(self) -> Self {
        f32::sqrt(self)
    }

    fn exp(self) -> Self {
        f32::exp(self)
    }

    fn ln(self) -> Self {
        f32::ln(self)
    }

    fn round(self) -> Self {
        f32::round(self)
    }
}

impl Float for f64 {
    fn acos(self) -> Self {
        f64::acos(self)
    }

    fn sqrt(self) -> Self {
        f64::sqrt(self)
    }

    fn exp(self) -> Self {
        f64::exp(self)
    }

    fn ln(self) -> Self {
        f64::ln(self)
    }

    fn round(self) -> Self {
        f64::round(self)
    }
}

// 16 bit floats are computed in f32
macro_rules! half_float {
    ($($t:ty),*) => {
        $(impl Float for $t {
            fn acos(self) -> Self {
                <$t>::from_f32(self.to_f32().acos())
            }

            fn sqrt(self) -> Self {
                <$t>::from_f32(self.to_f32().sqrt())
            }

            fn exp(self) -> Self {
                <$t>::from_f32(self.to_f32().exp())
            }

            fn ln(self) -> Self {
                <$t>::from_f32(self.to_f32().ln())
            }

            fn round(self) -> Self {
                <$t>::from_f32(self.to_f32().round())
            }
        })*
    };
}

half_float!(bf16, f16);
