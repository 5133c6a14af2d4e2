use crate::axes::AxisSet;
use crate::dtype::ElementType;
use crate::error::KilnError;
use crate::shape::Shape;
use half::{bf16, f16};

/// Constant tensor value, stored as little endian bytes of its element type.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Constant {
    element_type: ElementType,
    shape: Shape,
    data: Box<[u8]>,
}

fn encode_f64(element_type: ElementType, v: f64, out: &mut Vec<u8>) {
    match element_type {
        ElementType::Dynamic => {}
        ElementType::Boolean => out.push(u8::from(v != 0.)),
        ElementType::BF16 => out.extend(bf16::from_f64(v).to_le_bytes()),
        ElementType::F16 => out.extend(f16::from_f64(v).to_le_bytes()),
        ElementType::F32 => out.extend((v as f32).to_le_bytes()),
        ElementType::F64 => out.extend(v.to_le_bytes()),
        ElementType::I8 => out.extend((v as i8).to_le_bytes()),
        ElementType::I16 => out.extend((v as i16).to_le_bytes()),
        ElementType::I32 => out.extend((v as i32).to_le_bytes()),
        ElementType::I64 => out.extend((v as i64).to_le_bytes()),
        ElementType::U8 => out.extend((v as u8).to_le_bytes()),
        ElementType::U16 => out.extend((v as u16).to_le_bytes()),
        ElementType::U32 => out.extend((v as u32).to_le_bytes()),
        ElementType::U64 => out.extend((v as u64).to_le_bytes()),
    }
}

fn encode_i64(element_type: ElementType, v: i64, out: &mut Vec<u8>) {
    match element_type {
        ElementType::Dynamic => {}
        ElementType::Boolean => out.push(u8::from(v != 0)),
        ElementType::BF16 | ElementType::F16 | ElementType::F32 | ElementType::F64 => {
            encode_f64(element_type, v as f64, out);
        }
        ElementType::I8 => out.extend((v as i8).to_le_bytes()),
        ElementType::I16 => out.extend((v as i16).to_le_bytes()),
        ElementType::I32 => out.extend((v as i32).to_le_bytes()),
        ElementType::I64 => out.extend(v.to_le_bytes()),
        ElementType::U8 => out.extend((v as u8).to_le_bytes()),
        ElementType::U16 => out.extend((v as u16).to_le_bytes()),
        ElementType::U32 => out.extend((v as u32).to_le_bytes()),
        ElementType::U64 => out.extend((v as u64).to_le_bytes()),
    }
}

// Reads element at the start of b, b is at least byte_size long.
fn decode_f64(element_type: ElementType, b: &[u8]) -> f64 {
    match element_type {
        ElementType::Dynamic => 0.,
        ElementType::Boolean => f64::from(u8::from(b[0] != 0)),
        ElementType::BF16 => bf16::from_le_bytes([b[0], b[1]]).to_f64(),
        ElementType::F16 => f16::from_le_bytes([b[0], b[1]]).to_f64(),
        ElementType::F32 => f64::from(f32::from_le_bytes([b[0], b[1], b[2], b[3]])),
        ElementType::F64 => f64::from_le_bytes([b[0], b[1], b[2], b[3], b[4], b[5], b[6], b[7]]),
        _ => decode_i64(element_type, b) as f64,
    }
}

fn decode_i64(element_type: ElementType, b: &[u8]) -> i64 {
    match element_type {
        ElementType::Dynamic => 0,
        ElementType::Boolean => i64::from(b[0] != 0),
        ElementType::BF16 | ElementType::F16 | ElementType::F32 | ElementType::F64 => {
            decode_f64(element_type, b) as i64
        }
        ElementType::I8 => i64::from(i8::from_le_bytes([b[0]])),
        ElementType::I16 => i64::from(i16::from_le_bytes([b[0], b[1]])),
        ElementType::I32 => i64::from(i32::from_le_bytes([b[0], b[1], b[2], b[3]])),
        ElementType::I64 => i64::from_le_bytes([b[0], b[1], b[2], b[3], b[4], b[5], b[6], b[7]]),
        ElementType::U8 => i64::from(b[0]),
        ElementType::U16 => i64::from(u16::from_le_bytes([b[0], b[1]])),
        ElementType::U32 => i64::from(u32::from_le_bytes([b[0], b[1], b[2], b[3]])),
        ElementType::U64 => {
            u64::from_le_bytes([b[0], b[1], b[2], b[3], b[4], b[5], b[6], b[7]]) as i64
        }
    }
}

impl Constant {
    fn check(element_type: ElementType, shape: &Shape, len: usize) -> Result<(), KilnError> {
        if !element_type.is_static() {
            return Err(KilnError::node_validation(
                "Constant",
                "constant must have resolved element type",
            ));
        }
        let Some(numel) = shape.checked_numel() else {
            return Err(KilnError::node_validation(
                "Constant",
                format!("number of elements of {shape} overflows"),
            ));
        };
        if len != numel && len != 1 {
            return Err(KilnError::node_validation(
                "Constant",
                format!("{len} values supplied for shape {shape} with {numel} elements"),
            ));
        }
        Ok(())
    }

    fn check_sign(element_type: ElementType, negative: bool) -> Result<(), KilnError> {
        if negative && !element_type.is_signed() && element_type != ElementType::Boolean {
            return Err(KilnError::node_validation(
                "Constant",
                format!("negative value for unsigned {element_type}"),
            ));
        }
        Ok(())
    }

    /// Create constant from integer values. A single value is repeated over the whole shape.
    pub fn from_i64(element_type: ElementType, shape: Shape, values: &[i64]) -> Result<Self, KilnError> {
        Self::check(element_type, &shape, values.len())?;
        Self::check_sign(element_type, values.iter().any(|v| *v < 0))?;
        let n = shape.numel();
        let mut data = Vec::with_capacity(n * element_type.byte_size());
        for i in 0..n {
            let v = if values.len() == 1 { values[0] } else { values[i] };
            encode_i64(element_type, v, &mut data);
        }
        Ok(Self {
            element_type,
            shape,
            data: data.into(),
        })
    }

    /// Create constant from floating point values. A single value is repeated over the whole shape.
    pub fn from_f64(element_type: ElementType, shape: Shape, values: &[f64]) -> Result<Self, KilnError> {
        Self::check(element_type, &shape, values.len())?;
        Self::check_sign(element_type, values.iter().any(|v| *v < 0.))?;
        let n = shape.numel();
        let mut data = Vec::with_capacity(n * element_type.byte_size());
        for i in 0..n {
            let v = if values.len() == 1 { values[0] } else { values[i] };
            encode_f64(element_type, v, &mut data);
        }
        Ok(Self {
            element_type,
            shape,
            data: data.into(),
        })
    }

    /// Scalar constant
    pub fn scalar(element_type: ElementType, value: f64) -> Result<Self, KilnError> {
        Self::from_f64(element_type, Shape::scalar(), &[value])
    }

    /// Rank 1 i64 constant holding a shape or axes
    #[must_use]
    pub fn i64_vector(values: &[i64]) -> Self {
        let mut data = Vec::with_capacity(values.len() * 8);
        for v in values {
            data.extend(v.to_le_bytes());
        }
        Self {
            element_type: ElementType::I64,
            shape: Shape::from([values.len()]),
            data: data.into(),
        }
    }

    /// Element type
    #[must_use]
    pub const fn element_type(&self) -> ElementType {
        self.element_type
    }

    /// Shape
    #[must_use]
    pub const fn shape(&self) -> &Shape {
        &self.shape
    }

    /// Raw little endian bytes
    #[must_use]
    pub fn bytes(&self) -> &[u8] {
        &self.data
    }

    /// Values converted to f64
    #[must_use]
    pub fn to_f64_vec(&self) -> Vec<f64> {
        self.data
            .chunks_exact(self.element_type.byte_size())
            .map(|b| decode_f64(self.element_type, b))
            .collect()
    }

    /// Values converted to i64
    #[must_use]
    pub fn to_i64_vec(&self) -> Vec<i64> {
        self.data
            .chunks_exact(self.element_type.byte_size())
            .map(|b| decode_i64(self.element_type, b))
            .collect()
    }

    /// Interpret values as a shape
    pub fn shape_value(&self) -> Result<Shape, KilnError> {
        self.to_i64_vec()
            .into_iter()
            .map(|d| {
                usize::try_from(d).map_err(|_| KilnError::NegativeDimension {
                    context: "shape constant".into(),
                    shape: format!("{:?}", self.to_i64_vec()),
                })
            })
            .collect()
    }

    /// Interpret values as a set of axes
    pub fn axis_set_value(&self) -> Result<AxisSet, KilnError> {
        self.to_i64_vec()
            .into_iter()
            .map(|a| {
                usize::try_from(a).map_err(|_| {
                    KilnError::node_validation("axes constant", format!("negative axis {a}"))
                })
            })
            .collect()
    }
}

impl std::fmt::Display for Constant {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Constant<{}>{}", self.element_type, self.shape)?;
        if self.element_type.is_real() {
            write!(f, "{:?}", self.to_f64_vec())
        } else {
            write!(f, "{:?}", self.to_i64_vec())
        }
    }
}
