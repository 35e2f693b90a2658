//! Error types for binding and invoking kernels.

use kbind_dtype::ScalarDType;
use snafu::Snafu;

/// Result type for runtime operations.
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Errors that can occur while binding or invoking a kernel.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum Error {
    /// Codegen error occurred (including unsupported kinds, layouts and dimensions).
    #[snafu(display("Codegen error: {source}"))]
    Codegen { source: kbind_codegen::Error },

    /// Native target could not be initialized.
    #[snafu(display("Target initialization failed: {reason}"))]
    TargetInit { reason: String },

    /// No target machine for the requested triple/cpu/features.
    #[snafu(display("No target machine for triple '{triple}'"))]
    TargetMachine { triple: String },

    /// Optimization pipeline failed.
    #[snafu(display("Optimization failed: {reason}"))]
    Optimization { reason: String },

    /// JIT compilation failed.
    #[snafu(display("JIT compilation failed: {reason}"))]
    JitCompilation { reason: String },

    /// Function not found in the JIT-compiled module.
    #[snafu(display("Function '{name}' not found in module"))]
    FunctionNotFound { name: String },

    /// Wrong number of operands supplied.
    #[snafu(display("Expected {expected} source operands, got {actual}"))]
    ArityMismatch { expected: usize, actual: usize },

    /// Runtime shape has fewer dimensions than the shape template.
    #[snafu(display("Operand {operand}: expected at least {expected} dimensions, got {actual}"))]
    RankMismatch { operand: usize, expected: usize, actual: usize },

    /// Fixed dimension disagrees with the bound shape.
    #[snafu(display("Operand {operand}: dimension {position} is fixed to {expected}, got {actual}"))]
    FixedDimMismatch { operand: usize, position: usize, expected: usize, actual: usize },

    /// Same symbolic dimension bound to two different sizes.
    #[snafu(display("Symbolic dimension '{name}' bound to both {first} and {second}"))]
    ConflictingSymbol { name: String, first: usize, second: usize },

    /// Descriptor element type differs from the parameter's.
    #[snafu(display("Operand {operand}: expected element type {expected}, got {actual}"))]
    DTypeMismatch { operand: usize, expected: ScalarDType, actual: ScalarDType },

    /// Side-data block allocated for a different layout.
    #[snafu(display("Side-data block has {actual} slots, layout requires {expected}"))]
    SideDataSize { expected: usize, actual: usize },

    /// Invalid configuration value.
    #[snafu(display("Invalid configuration: {reason}"))]
    InvalidConfig { reason: String },
}

impl Error {
    /// Whether the kernel descriptor asks for something the binder cannot do.
    ///
    /// Such kernels should not be offered for binding again.
    pub fn is_unsupported(&self) -> bool {
        matches!(self, Self::Codegen { source } if source.is_unsupported())
    }
}

impl From<kbind_codegen::Error> for Error {
    fn from(source: kbind_codegen::Error) -> Self {
        Self::Codegen { source }
    }
}
