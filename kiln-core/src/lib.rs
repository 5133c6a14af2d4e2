//! # kiln-core
//!
//! kiln-core is the core part of the kiln tensor compiler.
//! It contains the shape and element type model, tensor descriptors,
//! the operation vocabulary with its type inference, the graph of nodes,
//! symbolic autodiff and the common error and configuration types
//! used by the compiler passes and backends.
//!
#![forbid(unsafe_code)]
#![forbid(rustdoc::broken_intra_doc_links)]
#![forbid(rustdoc::private_intra_doc_links)]
#![forbid(missing_docs)]
#![forbid(rustdoc::missing_crate_level_docs)]
#![forbid(rustdoc::private_doc_tests)]
#![forbid(rustdoc::invalid_codeblock_attributes)]
#![forbid(rustdoc::invalid_html_tags)]
#![forbid(rustdoc::invalid_rust_codeblocks)]
#![forbid(rustdoc::bare_urls)]
#![forbid(rustdoc::unescaped_backticks)]
#![forbid(rustdoc::redundant_explicit_links)]

/// See [Adjoints](autodiff::Adjoints)
pub mod autodiff;
/// See [AxisSet](axes::AxisSet)
pub mod axes;
/// See [Config](config::Config)
pub mod config;
/// See [Constant](constant::Constant)
pub mod constant;
/// See [ElementType](dtype::ElementType)
pub mod dtype;
/// See [KilnError](error::KilnError)
pub mod error;
/// See [Graph](graph::Graph)
pub mod graph;
/// Shape inference strategies shared by op categories.
pub mod infer;
/// See [TensorLayout](layout::TensorLayout)
pub mod layout;
/// See [Node](node::Node)
pub mod node;
/// See [Op](op::Op)
pub mod op;
/// See [Shape](shape::Shape) and [PartialShape](shape::PartialShape)
pub mod shape;
/// See [TensorDescriptor](tensor::TensorDescriptor)
pub mod tensor;

pub use autodiff::{backprop, Adjoints};
pub use axes::AxisSet;
pub use config::Config;
pub use constant::Constant;
pub use dtype::ElementType;
pub use error::KilnError;
pub use graph::Graph;
pub use layout::{DenseTensorLayout, TensorLayout};
pub use node::{Node, NodeId, Output};
pub use op::{AutoBroadcast, BinaryOp, CompareOp, Op, OpKind, ReduceOp, UnaryOp};
pub use shape::{Dimension, PartialShape, Shape};
pub use tensor::{DescriptorState, TensorDescriptor};
