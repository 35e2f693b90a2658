//! Code generation for single-kernel wrappers.
//!
//! This crate turns a [`KernelDescriptor`] (a kernel function plus the kinds
//! and shape templates of its operands) into a wrapper function with the fixed
//! calling convention
//!
//! ```text
//! void (ptr dst, ptr src_ptrs, ptr extra)
//! ```
//!
//! # Architecture
//!
//! - **Descriptor**: Parameter kinds, dimension sizes and shape templates
//! - **Layout**: Side-data block planning, shared with the host runtime
//! - **LLVM**: Wrapper emission with inkwell
//!
//! # Usage
//!
//! ```ignore
//! use kbind_codegen::{KernelDescriptor, ParamKind, ShapeTemplate, SideDataLayout, llvm};
//! use kbind_dtype::ScalarDType;
//!
//! let descriptor = KernelDescriptor::new(ir, "add")
//!     .arg(ParamKind::Scalar(ScalarDType::Float64), ShapeTemplate::scalar())
//!     .arg(ParamKind::Scalar(ScalarDType::Float64), ShapeTemplate::scalar())
//!     .ret(ParamKind::Scalar(ScalarDType::Float64), ShapeTemplate::scalar());
//! let layout = SideDataLayout::plan(&descriptor)?;
//! let module = llvm::load_module(descriptor.source(), "add", &context)?;
//! let wrapper = llvm::emit_single_kernel(&context, &module, &descriptor, &layout)?;
//! ```

pub mod descriptor;
pub mod error;
pub mod layout;
pub mod llvm;

#[cfg(test)]
pub mod test;

pub use descriptor::*;
pub use error::*;
pub use layout::*;
