//! JIT binding of element-wise kernels.
//!
//! [`bind`] takes a [`KernelDescriptor`](kbind_codegen::KernelDescriptor),
//! emits its single-kernel wrapper, optimizes and JIT-compiles it for the host
//! and returns an [`UnboundKernel`]: the entry point, the side-data layout, the
//! shape binder and a handle keeping the compiled module alive.
//!
//! # Configuration
//!
//! [`BindConfig`] selects the optimization level and target features. The
//! default disables AVX; use [`BindConfig::host_native`] to opt in to the
//! full host feature set, or set `KBIND_*` variables and use
//! [`BindConfig::from_env`].
//!
//! # Known limitations
//!
//! Every bind parses the kernel into a fresh context and creates its own
//! execution engine. Engines are never cached or shared between kernels.

pub mod binder;
pub mod config;
pub mod error;
pub mod jit;
pub mod kernel;
pub mod shape;
pub mod side_data;
pub mod target;


pub use binder::ShapeBinder;
pub use config::{BindConfig, CONSERVATIVE_FEATURES, OptLevel};
pub use error::*;
pub use jit::JitModule;
pub use kernel::{BoundKernel, SingleKernelFn, UnboundKernel, bind, bind_with_config};
pub use shape::{DataBuffer, DataDescriptor};
pub use side_data::SideDataBlock;
