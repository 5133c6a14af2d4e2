//! Tensor descriptors describe one output of a node: its element type,
//! shape, validity, name and, after planning, layout and pool offset.

use crate::dtype::ElementType;
use crate::error::KilnError;
use crate::layout::TensorLayout;
use crate::shape::{PartialShape, Shape};
use std::sync::{Arc, OnceLock, Weak};

/// Where is a descriptor in its lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DescriptorState {
    /// Declared, but type inference did not run yet
    Uninferred,
    /// Type inference committed a type
    Valid,
    /// Type inference could not determine a type
    Invalid,
}

// Non owning reference to the producing node, used only to derive the name.
#[derive(Debug, Clone)]
struct Producer {
    node: Weak<str>,
    index: usize,
}

/// Metadata of one graph edge.
///
/// The descriptor is owned by the node that produces it, consumers refer
/// to it by node id and output index. Type state is only ever changed
/// through [`set_tensor_type`](TensorDescriptor::set_tensor_type).
#[derive(Debug, Clone)]
pub struct TensorDescriptor {
    element_type: ElementType,
    // Cache of partial_shape, valid only if partial_shape is static
    shape: Shape,
    partial_shape: PartialShape,
    state: DescriptorState,
    invalidity_explanation: String,
    // Explicit or lazily derived name. OnceLock makes the first derivation
    // happen exactly once even with concurrent readers.
    name: OnceLock<String>,
    producer: Option<Producer>,
    pool_offset: Option<usize>,
    layout: Option<Weak<dyn TensorLayout>>,
}

impl TensorDescriptor {
    /// Create valid descriptor with explicit name.
    /// Empty name means that the name can not be derived.
    #[must_use]
    pub fn new(element_type: ElementType, partial_shape: PartialShape, name: &str) -> Self {
        let name_cell = OnceLock::new();
        if !name.is_empty() {
            let _ = name_cell.set(name.into());
        }
        Self {
            element_type,
            shape: partial_shape.to_shape().unwrap_or_default(),
            partial_shape,
            state: DescriptorState::Valid,
            invalidity_explanation: String::new(),
            name: name_cell,
            producer: None,
            pool_offset: None,
            layout: None,
        }
    }

    /// Create valid descriptor for output `index` of node called `producer`.
    /// Name is derived on first access as `"<producer>_<index>"`.
    #[must_use]
    pub fn for_output(
        element_type: ElementType,
        partial_shape: PartialShape,
        producer: &Arc<str>,
        index: usize,
    ) -> Self {
        Self {
            element_type,
            shape: partial_shape.to_shape().unwrap_or_default(),
            partial_shape,
            state: DescriptorState::Valid,
            invalidity_explanation: String::new(),
            name: OnceLock::new(),
            producer: Some(Producer {
                node: Arc::downgrade(producer),
                index,
            }),
            pool_offset: None,
            layout: None,
        }
    }

    /// Declared output that waits for type inference
    #[must_use]
    pub(crate) fn uninferred(producer: &Arc<str>, index: usize) -> Self {
        let mut desc = Self::for_output(ElementType::Dynamic, PartialShape::dynamic(), producer, index);
        desc.state = DescriptorState::Uninferred;
        desc
    }

    /// The only mutator of type state.
    ///
    /// With `is_valid` the partial shape must not contain negative dimensions,
    /// otherwise nothing is changed and error is returned. Without `is_valid`
    /// the supplied type and shape are ignored, the descriptor becomes
    /// `dynamic` with fully dynamic shape and keeps the explanation.
    pub fn set_tensor_type(
        &mut self,
        element_type: ElementType,
        partial_shape: PartialShape,
        is_valid: bool,
        invalidity_explanation: &str,
    ) -> Result<(), KilnError> {
        if is_valid {
            if !partial_shape.all_non_negative() {
                return Err(KilnError::NegativeDimension {
                    context: format!("set_tensor_type on {}", self.display_name()),
                    shape: partial_shape.to_string(),
                });
            }
            self.shape = partial_shape.to_shape().unwrap_or_default();
            self.partial_shape = partial_shape;
            self.element_type = element_type;
            self.state = DescriptorState::Valid;
            self.invalidity_explanation.clear();
        } else {
            self.shape = Shape::default();
            self.partial_shape = PartialShape::dynamic();
            self.element_type = ElementType::Dynamic;
            self.state = DescriptorState::Invalid;
            self.invalidity_explanation = invalidity_explanation.into();
        }
        Ok(())
    }

    /// Lifecycle state
    #[must_use]
    pub const fn state(&self) -> DescriptorState {
        self.state
    }

    /// Is this descriptor valid?
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.state != DescriptorState::Invalid
    }

    /// Why is this descriptor invalid, empty if it is valid
    #[must_use]
    pub fn invalidity_explanation(&self) -> &str {
        &self.invalidity_explanation
    }

    fn check_valid(&self, getter: &'static str) -> Result<(), KilnError> {
        if self.is_valid() {
            Ok(())
        } else {
            Err(KilnError::InvalidTensorAccess {
                tensor: self.display_name().into(),
                getter,
                explanation: self.invalidity_explanation.clone(),
            })
        }
    }

    /// Element type, fails if descriptor is invalid
    pub fn element_type(&self) -> Result<ElementType, KilnError> {
        self.check_valid("element_type")?;
        Ok(self.element_type)
    }

    /// Static shape, fails if descriptor is invalid or its shape is dynamic
    pub fn shape(&self) -> Result<&Shape, KilnError> {
        self.check_valid("shape")?;
        if self.partial_shape.is_static() {
            Ok(&self.shape)
        } else {
            Err(KilnError::DynamicShape {
                context: self.display_name().into(),
                shape: self.partial_shape.to_string(),
            })
        }
    }

    /// Partial shape, fails if descriptor is invalid
    pub fn partial_shape(&self) -> Result<&PartialShape, KilnError> {
        self.check_valid("partial_shape")?;
        Ok(&self.partial_shape)
    }

    /// Number of bytes needed to store this tensor.
    /// Delegates to attached layout, which may add padding.
    pub fn size(&self) -> Result<usize, KilnError> {
        if let Some(layout) = self.tensor_layout() {
            return Ok(layout.allocated_size());
        }
        Ok(self.shape()?.numel() * self.element_type()?.byte_size())
    }

    /// Attached layout, if it is still alive
    #[must_use]
    pub fn tensor_layout(&self) -> Option<Arc<dyn TensorLayout>> {
        self.layout.as_ref().and_then(Weak::upgrade)
    }

    /// Attach layout. The layout must describe the same static shape and element type,
    /// otherwise the previous layout is kept.
    pub fn set_tensor_layout(&mut self, layout: &Arc<dyn TensorLayout>) -> Result<(), KilnError> {
        let shape = self.shape()?;
        if layout.shape() != shape {
            return Err(KilnError::LayoutShapeMismatch {
                tensor: self.display_name().into(),
                expected: shape.clone(),
                found: layout.shape().clone(),
            });
        }
        let element_type = self.element_type()?;
        if layout.element_type() != element_type {
            return Err(KilnError::LayoutTypeMismatch {
                tensor: self.display_name().into(),
                expected: element_type,
                found: layout.element_type(),
            });
        }
        self.layout = Some(Arc::downgrade(layout));
        Ok(())
    }

    /// Offset into the memory pool, set by memory planning
    #[must_use]
    pub const fn pool_offset(&self) -> Option<usize> {
        self.pool_offset
    }

    /// Set offset into the memory pool
    pub fn set_pool_offset(&mut self, offset: usize) {
        self.pool_offset = Some(offset);
    }

    /// Name of tensor.
    ///
    /// Without explicit name the name is derived from the producing node
    /// on first access and cached, every later call returns the same string.
    /// Returns empty string if there is nothing to derive it from.
    #[must_use]
    pub fn name(&self) -> &str {
        if let Some(name) = self.name.get() {
            return name;
        }
        match self
            .producer
            .as_ref()
            .and_then(|p| p.node.upgrade().map(|node| (node, p.index)))
        {
            Some((node, index)) => self.name.get_or_init(|| format!("{node}_{index}")),
            None => "",
        }
    }

    fn display_name(&self) -> &str {
        let name = self.name();
        if name.is_empty() {
            "<unnamed tensor>"
        } else {
            name
        }
    }
}

impl std::fmt::Display for TensorDescriptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Tensor({})", self.name())
    }
}
