//! LLVM code generation for the single-kernel wrapper.
//!
//! # Module Structure
//!
//! - `source`: Loading kernel IR/bitcode into a module
//! - `types`: Scalar, array-descriptor and side-data struct types
//! - `wrapper`: Emission of the fixed-ABI wrapper function
//! - `error`: Error types

pub mod error;
pub mod source;
pub mod types;
pub mod wrapper;

pub use error::{Error, Result};
pub use source::load_module;
pub use wrapper::{emit_single_kernel, single_kernel_name};
