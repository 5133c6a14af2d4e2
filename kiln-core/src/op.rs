use crate::axes::AxisSet;
use crate::constant::Constant;
use crate::dtype::ElementType;
use crate::shape::{PartialShape, Shape};
use std::fmt::{Display, Formatter};

/// Unary elementwise arithmetic ops
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UnaryOp {
    /// -x
    Negative,
    /// Arc cosine
    Acos,
    /// Square root
    Sqrt,
    /// Exponential
    Exp,
    /// Natural logarithm
    Log,
    /// Round half away from zero
    Round,
}

/// Binary elementwise arithmetic ops
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BinaryOp {
    /// x + y
    Add,
    /// x - y
    Subtract,
    /// x * y
    Multiply,
    /// x / y
    Divide,
}

/// Binary elementwise comparisons, output is boolean
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CompareOp {
    /// x == y
    Equal,
    /// x != y
    NotEqual,
    /// x < y
    Less,
    /// x <= y
    LessEq,
    /// x > y
    Greater,
    /// x >= y
    GreaterEq,
}

/// Reductions over a set of axes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ReduceOp {
    /// Arithmetic sum
    Sum,
    /// Logical and, input must be boolean
    All,
    /// Logical or, input must be boolean
    Any,
}

/// How a version 1 broadcast maps argument axes to output axes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum AutoBroadcast {
    /// Axes are given by an axes mapping input
    #[default]
    Explicit,
    /// Axes are right aligned and unit dimensions are stretched
    Numpy,
}

/// Operation of a node: kind, version and attributes.
///
/// Version 1 variants take their shape and axes arguments as extra
/// inputs, which are usually constants, instead of attributes.
#[derive(Debug, Clone, PartialEq)]
pub enum Op {
    /// Graph input
    Parameter {
        /// Declared element type
        element_type: ElementType,
        /// Declared shape
        shape: PartialShape,
        /// May a backend cache this input across executions?
        cacheable: bool,
    },
    /// Constant value
    Constant(Constant),
    /// Graph output, identity of its argument
    Result,
    /// Unary elementwise arithmetic
    Unary(UnaryOp),
    /// Binary elementwise arithmetic
    Binary(BinaryOp),
    /// Binary elementwise comparison
    Compare(CompareOp),
    /// Version 0 reduction, axes are an attribute
    Reduce {
        /// Which reduction
        op: ReduceOp,
        /// Reduced axes
        axes: AxisSet,
    },
    /// Version 1 reduction, axes are the second input
    ReduceV1 {
        /// Which reduction
        op: ReduceOp,
        /// Keep reduced axes as unit dimensions
        keep_dims: bool,
    },
    /// Version 0 broadcast
    Broadcast {
        /// Output shape
        shape: Shape,
        /// Axes of output that are not in the argument
        axes: AxisSet,
    },
    /// Version 1 broadcast, inputs are arg, target shape and in explicit mode axes mapping
    BroadcastV1 {
        /// Broadcast mode
        spec: AutoBroadcast,
    },
    /// Version 0 reshape
    Reshape {
        /// Output shape
        shape: Shape,
    },
    /// Version 1 reshape, inputs are arg and pattern
    ReshapeV1,
}

/// Op kinds without attributes, used for registry lookup and for naming nodes
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum OpKind {
    /// Parameter op
    Parameter,
    /// Constant op
    Constant,
    /// Result op
    Result,
    /// Negative op
    Negative,
    /// Acos op
    Acos,
    /// Sqrt op
    Sqrt,
    /// Exp op
    Exp,
    /// Log op
    Log,
    /// Round op
    Round,
    /// Add op
    Add,
    /// Subtract op
    Subtract,
    /// Multiply op
    Multiply,
    /// Divide op
    Divide,
    /// Equal op
    Equal,
    /// NotEqual op
    NotEqual,
    /// Less op
    Less,
    /// LessEq op
    LessEq,
    /// Greater op
    Greater,
    /// GreaterEq op
    GreaterEq,
    /// Sum op
    Sum,
    /// All op
    All,
    /// Any op
    Any,
    /// ReduceSum op
    ReduceSum,
    /// ReduceLogicalAnd op
    ReduceLogicalAnd,
    /// ReduceLogicalOr op
    ReduceLogicalOr,
    /// Broadcast op
    Broadcast,
    /// Reshape op
    Reshape,
}

impl OpKind {
    /// Name of op kind, version 0 and 1 of broadcast and reshape share the name
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            OpKind::Parameter => "Parameter",
            OpKind::Constant => "Constant",
            OpKind::Result => "Result",
            OpKind::Negative => "Negative",
            OpKind::Acos => "Acos",
            OpKind::Sqrt => "Sqrt",
            OpKind::Exp => "Exp",
            OpKind::Log => "Log",
            OpKind::Round => "Round",
            OpKind::Add => "Add",
            OpKind::Subtract => "Subtract",
            OpKind::Multiply => "Multiply",
            OpKind::Divide => "Divide",
            OpKind::Equal => "Equal",
            OpKind::NotEqual => "NotEqual",
            OpKind::Less => "Less",
            OpKind::LessEq => "LessEq",
            OpKind::Greater => "Greater",
            OpKind::GreaterEq => "GreaterEq",
            OpKind::Sum => "Sum",
            OpKind::All => "All",
            OpKind::Any => "Any",
            OpKind::ReduceSum => "ReduceSum",
            OpKind::ReduceLogicalAnd => "ReduceLogicalAnd",
            OpKind::ReduceLogicalOr => "ReduceLogicalOr",
            OpKind::Broadcast => "Broadcast",
            OpKind::Reshape => "Reshape",
        }
    }
}

impl Display for OpKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

impl Op {
    /// Kind of this op
    #[must_use]
    pub const fn kind(&self) -> OpKind {
        match self {
            Op::Parameter { .. } => OpKind::Parameter,
            Op::Constant(..) => OpKind::Constant,
            Op::Result => OpKind::Result,
            Op::Unary(op) => match op {
                UnaryOp::Negative => OpKind::Negative,
                UnaryOp::Acos => OpKind::Acos,
                UnaryOp::Sqrt => OpKind::Sqrt,
                UnaryOp::Exp => OpKind::Exp,
                UnaryOp::Log => OpKind::Log,
                UnaryOp::Round => OpKind::Round,
            },
            Op::Binary(op) => match op {
                BinaryOp::Add => OpKind::Add,
                BinaryOp::Subtract => OpKind::Subtract,
                BinaryOp::Multiply => OpKind::Multiply,
                BinaryOp::Divide => OpKind::Divide,
            },
            Op::Compare(op) => match op {
                CompareOp::Equal => OpKind::Equal,
                CompareOp::NotEqual => OpKind::NotEqual,
                CompareOp::Less => OpKind::Less,
                CompareOp::LessEq => OpKind::LessEq,
                CompareOp::Greater => OpKind::Greater,
                CompareOp::GreaterEq => OpKind::GreaterEq,
            },
            Op::Reduce { op, .. } => match op {
                ReduceOp::Sum => OpKind::Sum,
                ReduceOp::All => OpKind::All,
                ReduceOp::Any => OpKind::Any,
            },
            Op::ReduceV1 { op, .. } => match op {
                ReduceOp::Sum => OpKind::ReduceSum,
                ReduceOp::All => OpKind::ReduceLogicalAnd,
                ReduceOp::Any => OpKind::ReduceLogicalOr,
            },
            Op::Broadcast { .. } | Op::BroadcastV1 { .. } => OpKind::Broadcast,
            Op::Reshape { .. } | Op::ReshapeV1 => OpKind::Reshape,
        }
    }

    /// Op-set version, 0 or 1
    #[must_use]
    pub const fn version(&self) -> u32 {
        match self {
            Op::ReduceV1 { .. } | Op::BroadcastV1 { .. } | Op::ReshapeV1 => 1,
            _ => 0,
        }
    }

    /// Number of inputs this op requires
    #[must_use]
    pub const fn input_arity(&self) -> usize {
        match self {
            Op::Parameter { .. } | Op::Constant(..) => 0,
            Op::Result
            | Op::Unary(..)
            | Op::Reduce { .. }
            | Op::Broadcast { .. }
            | Op::Reshape { .. } => 1,
            Op::Binary(..)
            | Op::Compare(..)
            | Op::ReduceV1 { .. }
            | Op::ReshapeV1
            | Op::BroadcastV1 {
                spec: AutoBroadcast::Numpy,
            } => 2,
            Op::BroadcastV1 {
                spec: AutoBroadcast::Explicit,
            } => 3,
        }
    }

    /// Number of outputs this op produces
    #[must_use]
    pub const fn output_count(&self) -> usize {
        1
    }

    /// Negative, Acos, Sqrt, Exp, Log, Round
    #[must_use]
    pub const fn is_unary_elementwise_arithmetic(&self) -> bool {
        matches!(self, Op::Unary(..))
    }

    /// Add, Subtract, Multiply, Divide
    #[must_use]
    pub const fn is_binary_elementwise_arithmetic(&self) -> bool {
        matches!(self, Op::Binary(..))
    }

    /// Equal, NotEqual, Less, LessEq, Greater, GreaterEq
    #[must_use]
    pub const fn is_binary_elementwise_comparison(&self) -> bool {
        matches!(self, Op::Compare(..))
    }

    /// Sum and ReduceSum
    #[must_use]
    pub const fn is_arithmetic_reduction(&self) -> bool {
        matches!(
            self,
            Op::Reduce {
                op: ReduceOp::Sum,
                ..
            } | Op::ReduceV1 {
                op: ReduceOp::Sum,
                ..
            }
        )
    }

    /// All, Any, ReduceLogicalAnd and ReduceLogicalOr
    #[must_use]
    pub const fn is_logical_reduction(&self) -> bool {
        matches!(
            self,
            Op::Reduce {
                op: ReduceOp::All | ReduceOp::Any,
                ..
            } | Op::ReduceV1 {
                op: ReduceOp::All | ReduceOp::Any,
                ..
            }
        )
    }

    /// Any elementwise op
    #[must_use]
    pub const fn is_elementwise(&self) -> bool {
        self.is_unary_elementwise_arithmetic()
            || self.is_binary_elementwise_arithmetic()
            || self.is_binary_elementwise_comparison()
    }

    /// Parameters and constants have no inputs
    #[must_use]
    pub const fn is_source(&self) -> bool {
        matches!(self, Op::Parameter { .. } | Op::Constant(..))
    }
}

impl Display for Op {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Op::Parameter {
                element_type,
                shape,
                cacheable,
            } => {
                write!(f, "Parameter({shape}, {element_type}")?;
                if *cacheable {
                    f.write_str(", cacheable")?;
                }
                f.write_str(")")
            }
            Op::Constant(c) => write!(f, "Constant({}, {})", c.shape(), c.element_type()),
            Op::Reduce { axes, .. } => write!(f, "{}({axes})", self.kind()),
            Op::ReduceV1 { keep_dims, .. } => {
                write!(f, "{}(keep_dims={keep_dims})", self.kind())
            }
            Op::Broadcast { shape, axes } => write!(f, "Broadcast({shape}, {axes})"),
            Op::BroadcastV1 { spec } => write!(f, "Broadcast:v1({spec:?})"),
            Op::Reshape { shape } => write!(f, "Reshape({shape})"),
            Op::ReshapeV1 => f.write_str("Reshape:v1"),
            _ => f.write_str(self.kind().name()),
        }
    }
}

#[test]
fn capabilities() {
    let all = Op::Reduce {
        op: ReduceOp::All,
        axes: AxisSet::from([0]),
    };
    assert!(all.is_logical_reduction());
    assert!(!all.is_arithmetic_reduction());
    assert!(Op::Compare(CompareOp::LessEq).is_binary_elementwise_comparison());
    assert!(Op::Compare(CompareOp::LessEq).is_elementwise());
    assert_eq!(Op::BroadcastV1 { spec: AutoBroadcast::Explicit }.input_arity(), 3);
    assert_eq!(Op::BroadcastV1 { spec: AutoBroadcast::Numpy }.input_arity(), 2);
    assert_eq!(Op::ReshapeV1.kind(), OpKind::Reshape);
    assert_eq!(Op::ReshapeV1.version(), 1);
}
