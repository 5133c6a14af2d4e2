use crate::scalar::Scalar;
use half::{bf16, f16};
use kiln_core::{Constant, ElementType};
use std::ops::Range;

macro_rules! buffers {
    ($($variant:ident($t:ty)),* $(,)?) => {
        /// Owned host memory of one element type
        #[derive(Debug, Clone, PartialEq)]
        pub enum HostBuffer {
            $(
                #[doc = concat!("Buffer of ", stringify!($t))]
                $variant(Vec<$t>),
            )*
        }

        /// Borrowed, type erased view of a buffer
        #[derive(Debug, Clone, Copy)]
        pub enum BufferRef<'a> {
            $(
                #[doc = concat!("Slice of ", stringify!($t))]
                $variant(&'a [$t]),
            )*
        }

        /// Mutably borrowed, type erased view of a buffer
        #[derive(Debug)]
        pub enum BufferMut<'a> {
            $(
                #[doc = concat!("Slice of ", stringify!($t))]
                $variant(&'a mut [$t]),
            )*
        }

        impl HostBuffer {
            /// Element type of values
            #[must_use]
            pub const fn element_type(&self) -> ElementType {
                match self {
                    $(Self::$variant(..) => ElementType::$variant,)*
                }
            }

            /// Number of elements
            #[must_use]
            pub fn len(&self) -> usize {
                match self {
                    $(Self::$variant(x) => x.len(),)*
                }
            }

            /// Borrow as type erased view
            #[must_use]
            pub fn as_buffer_ref(&self) -> BufferRef<'_> {
                match self {
                    $(Self::$variant(x) => BufferRef::$variant(x),)*
                }
            }

            /// Borrow as mutable type erased view
            pub fn as_buffer_mut(&mut self) -> BufferMut<'_> {
                match self {
                    $(Self::$variant(x) => BufferMut::$variant(x),)*
                }
            }

            /// Buffer of `len` zeros, None for unresolved element type
            #[must_use]
            pub fn zeros(element_type: ElementType, len: usize) -> Option<Self> {
                match element_type {
                    ElementType::Dynamic => None,
                    $(ElementType::$variant => Some(Self::$variant(vec![<$t as Scalar>::zero(); len])),)*
                }
            }

            /// Decode value of constant
            #[must_use]
            pub fn from_constant(constant: &Constant) -> Option<Self> {
                let bytes = constant.bytes();
                let size = constant.element_type().byte_size();
                match constant.element_type() {
                    ElementType::Dynamic => None,
                    $(ElementType::$variant => Some(Self::$variant(
                        bytes.chunks_exact(size).map(<$t as Scalar>::from_le_bytes).collect(),
                    )),)*
                }
            }

            /// Values converted to f64
            #[must_use]
            pub fn to_f64_vec(&self) -> Vec<f64> {
                match self {
                    $(Self::$variant(x) => x.iter().map(|v| v.into_f64()).collect(),)*
                }
            }
        }

        impl<'a> BufferRef<'a> {
            /// Number of elements
            #[must_use]
            pub fn len(&self) -> usize {
                match self {
                    $(Self::$variant(x) => x.len(),)*
                }
            }

            /// Element type of values
            #[must_use]
            pub const fn element_type(&self) -> ElementType {
                match self {
                    $(Self::$variant(..) => ElementType::$variant,)*
                }
            }

            /// Part of this view, None if range is out of bounds
            #[must_use]
            pub fn range(self, range: Range<usize>) -> Option<BufferRef<'a>> {
                match self {
                    $(Self::$variant(x) => x.get(range).map(BufferRef::$variant),)*
                }
            }
        }

        impl<'a> BufferMut<'a> {
            /// Number of elements
            #[must_use]
            pub fn len(&self) -> usize {
                match self {
                    $(Self::$variant(x) => x.len(),)*
                }
            }

            /// Element type of values
            #[must_use]
            pub const fn element_type(&self) -> ElementType {
                match self {
                    $(Self::$variant(..) => ElementType::$variant,)*
                }
            }

            /// Split into disjoint shards of at most `chunk` elements
            #[must_use]
            pub fn shards(self, chunk: usize) -> Vec<BufferMut<'a>> {
                let chunk = chunk.max(1);
                match self {
                    $(Self::$variant(x) => x.chunks_mut(chunk).map(BufferMut::$variant).collect(),)*
                }
            }
        }
    };
}

buffers! {
    Boolean(bool),
    BF16(bf16),
    F16(f16),
    F32(f32),
    F64(f64),
    I8(i8),
    I16(i16),
    I32(i32),
    I64(i64),
    U8(u8),
    U16(u16),
    U32(u32),
    U64(u64),
}

impl HostBuffer {
    /// Wrap values
    #[must_use]
    pub fn from_vec<T: Scalar>(data: Vec<T>) -> Self {
        T::into_buffer(data)
    }

    /// Copy of values, None if element types differ
    #[must_use]
    pub fn to_vec<T: Scalar>(&self) -> Option<Vec<T>> {
        T::slice(self.as_buffer_ref()).map(<[T]>::to_vec)
    }

    /// Is the buffer empty?
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<T: Scalar> From<Vec<T>> for HostBuffer {
    fn from(data: Vec<T>) -> Self {
        T::into_buffer(data)
    }
}

#[test]
fn constants_decode_to_typed_buffers() {
    let c = Constant::from_f64(ElementType::F16, [3].into(), &[0.5, -2., 4.]).unwrap();
    let buffer = HostBuffer::from_constant(&c).unwrap();
    assert_eq!(buffer.element_type(), ElementType::F16);
    assert_eq!(buffer.to_f64_vec(), [0.5, -2., 4.]);
    assert_eq!(buffer.to_vec::<f32>(), None);

    let c = Constant::from_i64(ElementType::U16, [2, 2].into(), &[7]).unwrap();
    assert_eq!(HostBuffer::from_constant(&c), Some(HostBuffer::U16(vec![7; 4])));
}

#[test]
fn shards_are_disjoint_and_cover_buffer() {
    let mut buffer = HostBuffer::zeros(ElementType::I32, 10).unwrap();
    let shards = buffer.as_buffer_mut().shards(4);
    assert_eq!(shards.iter().map(BufferMut::len).collect::<Vec<_>>(), [4, 4, 2]);
}
