//! # kiln-cpu
//!
//! Reference kernels and a graph interpreter for the cpu.
//!
//! Kernels are registered in a [`KernelRegistry`] by op kind and element
//! type. The [`Interpreter`] evaluates a [`Graph`](kiln_core::Graph) node by node,
//! splitting elementwise kernels into one shard per execution arena.
//!
//! ```rust
//! use kiln_core::{Config, ElementType, Graph, UnaryOp};
//! use kiln_cpu::{HostBuffer, Interpreter};
//!
//! let mut graph = Graph::with_config(Config::default());
//! let x = graph.parameter(ElementType::F32, [3])?;
//! let y = graph.unary(UnaryOp::Negative, x)?;
//! graph.result(y)?;
//! let outputs = Interpreter::default().execute(&graph, &[HostBuffer::from(vec![1f32, -2., 3.])])?;
//! assert_eq!(outputs[0].to_vec::<f32>(), Some(vec![-1., 2., -3.]));
//! # Ok::<(), kiln_core::KilnError>(())
//! ```

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

mod buffer;
mod interpreter;
pub mod kernel;
mod scalar;

pub use buffer::{BufferMut, BufferRef, HostBuffer};
pub use interpreter::Interpreter;
pub use kernel::{Arena, Kernel, KernelRegistry};
pub use kiln_core::KilnError;
pub use scalar::{Arithmetic, Float, Scalar, Signed};
