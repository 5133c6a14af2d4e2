//! # kiln-compiler
//!
//! Graph passes of the kiln tensor compiler. Passes are registered
//! with a [`PassManager`] and run in registration order over a
//! [`Graph`](kiln_core::Graph).
//!
//! Op-set migration passes translate nodes between version 0 and
//! version 1 of broadcast, reductions and reshape. [`ValidateGraph`]
//! checks structural invariants, [`AssignLayout`] and [`MemoryLayout`]
//! plan buffers for execution.
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

mod downgrade;
mod layout;
mod pass;
mod upgrade;
mod validate;

pub use downgrade::OpsetDowngrade;
pub use kiln_core::KilnError;
pub use layout::{AssignLayout, MemoryLayout};
pub use pass::{rewrite_nodes, Pass, PassManager, PassResult};
pub use upgrade::OpsetUpgrade;
pub use validate::{validate, ValidateGraph};
