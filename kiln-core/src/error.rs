use crate::dtype::ElementType;
use crate::node::NodeId;
use crate::op::OpKind;
use crate::shape::Shape;
use thiserror::Error;

/// Errors returned by kiln.
///
/// Every variant carries the name of the node or tensor it originated from,
/// so that a diagnostic can point at the failing inference step.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum KilnError {
    /// Static shape was requested, but the shape is dynamic
    #[error("{context}: static shape requested, but shape {shape} is dynamic")]
    DynamicShape {
        /// Tensor or operation that requested the shape
        context: String,
        /// The dynamic shape
        shape: String,
    },
    /// Shape with negative dimension was about to be committed
    #[error("{context}: shape {shape} contains negative dimensions")]
    NegativeDimension {
        /// Tensor or operation that committed the shape
        context: String,
        /// The offending shape
        shape: String,
    },
    /// Two known, unequal dimensions or ranks were merged
    #[error("{context}: incompatible shapes {lhs} and {rhs}")]
    IncompatibleShapes {
        /// Where the merge happened
        context: String,
        /// Left shape
        lhs: String,
        /// Right shape
        rhs: String,
    },
    /// Two resolved, unequal element types were merged
    #[error("{context}: incompatible element types {lhs} and {rhs}")]
    IncompatibleElementTypes {
        /// Where the merge happened
        context: String,
        /// Left element type
        lhs: ElementType,
        /// Right element type
        rhs: ElementType,
    },
    /// Type or shape getter was called on invalid tensor
    #[error("{getter}() called on invalid tensor {tensor}. Original validation error: {explanation}")]
    InvalidTensorAccess {
        /// Tensor name
        tensor: String,
        /// Name of the getter
        getter: &'static str,
        /// Stored invalidity explanation
        explanation: String,
    },
    /// Layout with different shape was attached to tensor
    #[error("setting layout of {tensor} with shape {expected} to a layout with shape {found}")]
    LayoutShapeMismatch {
        /// Tensor name
        tensor: String,
        /// Shape of tensor
        expected: Shape,
        /// Shape of layout
        found: Shape,
    },
    /// Layout with different element type was attached to tensor
    #[error("setting layout of {tensor} with element type {expected} to a layout with element type {found}")]
    LayoutTypeMismatch {
        /// Tensor name
        tensor: String,
        /// Element type of tensor
        expected: ElementType,
        /// Element type of layout
        found: ElementType,
    },
    /// Wrong number of inputs was supplied
    #[error("{node} expects {expected} inputs, but {found} were supplied")]
    ArityMismatch {
        /// Node name
        node: String,
        /// Declared arity
        expected: usize,
        /// Supplied number of inputs
        found: usize,
    },
    /// No kernel is registered for this op and element type
    #[error("no {kind} kernel for element type {element_type}")]
    UnsupportedElementType {
        /// Op kind
        kind: OpKind,
        /// Resolved element type
        element_type: ElementType,
    },
    /// Axis is not smaller than rank
    #[error("{context}: axis {axis} is out of range for rank {rank}")]
    AxisOutOfRange {
        /// Node name
        context: String,
        /// Axis
        axis: usize,
        /// Rank of the shape the axis refers to
        rank: usize,
    },
    /// Malformed combination of inputs and attributes
    #[error("{node}: {message}")]
    NodeValidation {
        /// Node name
        node: String,
        /// What is wrong
        message: String,
    },
    /// Node is not part of the graph
    #[error("node {id} is not in the graph")]
    NodeNotFound {
        /// Id of missing node
        id: NodeId,
    },
    /// Adjoints can not be generated for this node
    #[error("{node} is not differentiable")]
    NotDifferentiable {
        /// Node name
        node: String,
    },
    /// Node could not be translated to another op-set version
    #[error("cannot migrate {node}: {message}")]
    Migration {
        /// Node name
        node: String,
        /// Why
        message: String,
    },
    /// Graph structure is broken
    #[error("graph validation failed: {message}")]
    GraphValidation {
        /// What is broken
        message: String,
    },
    /// Execution input does not match its parameter
    #[error("invalid input for {node}: {message}")]
    InvalidInput {
        /// Parameter name
        node: String,
        /// What is wrong
        message: String,
    },
}

impl KilnError {
    /// Node validation error
    pub fn node_validation(node: &str, message: impl Into<String>) -> Self {
        Self::NodeValidation {
            node: node.into(),
            message: message.into(),
        }
    }

    /// Migration error
    pub fn migration(node: &str, message: impl Into<String>) -> Self {
        Self::Migration {
            node: node.into(),
            message: message.into(),
        }
    }

    /// Replace generic context of shape errors with tensor or node name
    #[must_use]
    pub fn in_context(self, name: &str) -> Self {
        match self {
            Self::DynamicShape { shape, .. } => Self::DynamicShape {
                context: name.into(),
                shape,
            },
            Self::NegativeDimension { shape, .. } => Self::NegativeDimension {
                context: name.into(),
                shape,
            },
            Self::IncompatibleShapes { lhs, rhs, .. } => Self::IncompatibleShapes {
                context: name.into(),
                lhs,
                rhs,
            },
            Self::IncompatibleElementTypes { lhs, rhs, .. } => Self::IncompatibleElementTypes {
                context: name.into(),
                lhs,
                rhs,
            },
            Self::AxisOutOfRange { axis, rank, .. } => Self::AxisOutOfRange {
                context: name.into(),
                axis,
                rank,
            },
            e => e,
        }
    }
}
