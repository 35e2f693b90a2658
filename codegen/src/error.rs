//! Error types for kernel descriptor validation and wrapper emission.

use kbind_dtype::ScalarDType;
use snafu::Snafu;

use crate::descriptor::ArrayLayout;

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Errors that can occur while planning or emitting a single-kernel wrapper.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum Error {
    /// Parameter kind outside scalar, pointer and shaped array.
    #[snafu(display("single-kernel codegen doesn't support the parameter kind {kind:?}"))]
    UnsupportedKind { kind: String },

    /// Array parameter with a layout other than C-contiguous.
    #[snafu(display("parameter {index}: only C-contiguous arrays are supported, got {layout}"))]
    UnsupportedLayout { index: usize, layout: ArrayLayout },

    /// Non-trailing dimension that is neither fixed nor symbolic.
    #[snafu(display("parameter {index}: single-kernel codegen doesn't support dimension {dim} at position {position}"))]
    UnsupportedDimension { index: usize, position: usize, dim: String },

    /// Structurally malformed descriptor.
    #[snafu(display("Invalid kernel descriptor: {reason}"))]
    InvalidDescriptor { reason: String },

    #[snafu(display("Unknown dtype '{name}'"))]
    UnknownDType { name: String },

    /// Kernel IR or bitcode could not be loaded.
    #[snafu(display("Failed to load kernel module: {reason}"))]
    KernelParse { reason: String },

    #[snafu(display("Function '{name}' not found in kernel module"))]
    FunctionNotFound { name: String },

    /// Kernel formals disagree with the descriptor.
    #[snafu(display("Kernel '{name}' takes {actual} parameters, descriptor implies {expected}"))]
    SignatureMismatch { name: String, expected: u32, actual: u32 },

    /// Kernel return type disagrees with the scalar return of the descriptor.
    #[snafu(display("Kernel '{name}' returns {actual}, descriptor expects {expected}"))]
    ReturnTypeMismatch { name: String, expected: ScalarDType, actual: String },

    /// The module already defines a function with the wrapper's name.
    #[snafu(display("Kernel module already defines '{name}'"))]
    WrapperNameTaken { name: String },

    /// LLVM-specific error.
    #[snafu(context(false), display("LLVM error: {source}"))]
    Llvm { source: crate::llvm::Error },
}

impl Error {
    /// Whether this is one of the capability errors raised during planning.
    ///
    /// A kernel failing with one of these should not be offered for binding again.
    pub fn is_unsupported(&self) -> bool {
        matches!(self, Self::UnsupportedKind { .. } | Self::UnsupportedLayout { .. } | Self::UnsupportedDimension { .. })
    }
}
