/// Element type of tensor
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ElementType {
    /// Not resolved yet
    Dynamic,
    /// Boolean
    Boolean,
    /// 16 bit brain floating point type
    BF16,
    /// 16 bit floating point type
    F16,
    /// 32 bit floating point type
    F32,
    /// 64 bit floating point type
    F64,
    /// 8 bit signed integer type
    I8,
    /// 16 bit signed integer type
    I16,
    /// 32 bit signed integer type
    I32,
    /// 64 bit signed integer type
    I64,
    /// 8 bit unsigned integer type
    U8,
    /// 16 bit unsigned integer type
    U16,
    /// 32 bit unsigned integer type
    U32,
    /// 64 bit unsigned integer type
    U64,
}

impl ElementType {
    /// All resolved element types
    pub const STATIC: [ElementType; 13] = [
        ElementType::Boolean,
        ElementType::BF16,
        ElementType::F16,
        ElementType::F32,
        ElementType::F64,
        ElementType::I8,
        ElementType::I16,
        ElementType::I32,
        ElementType::I64,
        ElementType::U8,
        ElementType::U16,
        ElementType::U32,
        ElementType::U64,
    ];

    /// Get the size of element type in bytes, dynamic has size 0
    #[must_use]
    pub const fn byte_size(self) -> usize {
        match self {
            Self::Dynamic => 0,
            Self::Boolean | Self::I8 | Self::U8 => 1,
            Self::BF16 | Self::F16 | Self::I16 | Self::U16 => 2,
            Self::F32 | Self::I32 | Self::U32 => 4,
            Self::F64 | Self::I64 | Self::U64 => 8,
        }
    }

    /// Is this type resolved?
    #[must_use]
    pub const fn is_static(self) -> bool {
        !matches!(self, Self::Dynamic)
    }

    /// Check if self is floating point type
    #[must_use]
    pub const fn is_real(self) -> bool {
        matches!(self, Self::BF16 | Self::F16 | Self::F32 | Self::F64)
    }

    /// Check if self is integer type
    #[must_use]
    pub const fn is_integral(self) -> bool {
        matches!(
            self,
            Self::I8 | Self::I16 | Self::I32 | Self::I64 | Self::U8 | Self::U16 | Self::U32 | Self::U64
        )
    }

    /// Check if self can represent negative values
    #[must_use]
    pub const fn is_signed(self) -> bool {
        self.is_real() || matches!(self, Self::I8 | Self::I16 | Self::I32 | Self::I64)
    }

    /// Merge two element types, dynamic merges with anything.
    /// Returns None if both are static and differ.
    #[must_use]
    pub fn merge(self, other: ElementType) -> Option<ElementType> {
        match (self, other) {
            (Self::Dynamic, t) | (t, Self::Dynamic) => Some(t),
            (a, b) if a == b => Some(a),
            _ => None,
        }
    }

    /// Short lowercase name of element type
    #[must_use]
    pub const fn c_type_name(self) -> &'static str {
        match self {
            Self::Dynamic => "dynamic",
            Self::Boolean => "boolean",
            Self::BF16 => "bf16",
            Self::F16 => "f16",
            Self::F32 => "f32",
            Self::F64 => "f64",
            Self::I8 => "i8",
            Self::I16 => "i16",
            Self::I32 => "i32",
            Self::I64 => "i64",
            Self::U8 => "u8",
            Self::U16 => "u16",
            Self::U32 => "u32",
            Self::U64 => "u64",
        }
    }
}

impl std::fmt::Display for ElementType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.c_type_name())
    }
}

#[test]
fn dynamic_merges_with_anything() {
    assert_eq!(ElementType::Dynamic.merge(ElementType::F32), Some(ElementType::F32));
    assert_eq!(ElementType::I64.merge(ElementType::Dynamic), Some(ElementType::I64));
    assert_eq!(ElementType::F32.merge(ElementType::F64), None);
    assert_eq!(ElementType::Dynamic.byte_size(), 0);
    assert_eq!(ElementType::BF16.byte_size(), 2);
}
