use crate::dtype::ElementType;
use crate::shape::Shape;

/// Memory layout of a tensor, provided by backends or planning passes.
///
/// Tensor descriptors only hold weak references to layouts, the layout
/// itself is owned by whoever created it (usually the [Graph](crate::Graph)).
pub trait TensorLayout: std::fmt::Debug + Send + Sync {
    /// Logical shape described by this layout
    fn shape(&self) -> &Shape;
    /// Element type described by this layout
    fn element_type(&self) -> ElementType;
    /// Number of bytes that must be allocated, including padding
    fn allocated_size(&self) -> usize;
}

/// Row major layout without gaps, the allocation is padded to `alignment` bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DenseTensorLayout {
    shape: Shape,
    element_type: ElementType,
    alignment: usize,
}

impl DenseTensorLayout {
    /// Create new dense layout, alignment of 0 or 1 means no padding
    #[must_use]
    pub fn new(element_type: ElementType, shape: Shape, alignment: usize) -> Self {
        Self {
            shape,
            element_type,
            alignment: alignment.max(1),
        }
    }

    /// Strides in elements
    #[must_use]
    pub fn strides(&self) -> Shape {
        self.shape.strides()
    }
}

impl TensorLayout for DenseTensorLayout {
    fn shape(&self) -> &Shape {
        &self.shape
    }

    fn element_type(&self) -> ElementType {
        self.element_type
    }

    fn allocated_size(&self) -> usize {
        let bytes = self.shape.numel() * self.element_type.byte_size();
        bytes.div_ceil(self.alignment) * self.alignment
    }
}

#[test]
fn dense_layout_pads_to_alignment() {
    let layout = DenseTensorLayout::new(ElementType::F32, Shape::from([3, 5]), 64);
    assert_eq!(layout.allocated_size(), 64);
    let layout = DenseTensorLayout::new(ElementType::F32, Shape::from([3, 5]), 1);
    assert_eq!(layout.allocated_size(), 60);
    assert_eq!(layout.strides(), Shape::from([5, 1]));
}
