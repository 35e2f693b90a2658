//! LLVM-specific error types.
//!
//! Provides type-safe error handling for LLVM builder operations.

use inkwell::builder::BuilderError;
use snafu::Snafu;

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Errors that can occur while emitting the wrapper with inkwell.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum Error {
    // ========================================================================
    // Builder operations
    // ========================================================================
    /// GEP (GetElementPtr) instruction failed.
    #[snafu(display("LLVM build_gep failed for '{what}'"))]
    BuildGep { what: String, source: BuilderError },

    /// Load instruction failed.
    #[snafu(display("LLVM build_load failed for '{what}'"))]
    BuildLoad { what: String, source: BuilderError },

    /// Store instruction failed.
    #[snafu(display("LLVM build_store failed for '{what}'"))]
    BuildStore { what: String, source: BuilderError },

    /// Alloca instruction failed.
    #[snafu(display("LLVM build_alloca failed for '{what}'"))]
    BuildAlloca { what: String, source: BuilderError },

    /// Function call instruction failed.
    #[snafu(display("LLVM build_call failed for '{callee}'"))]
    BuildCall { callee: String, source: BuilderError },

    /// Return instruction failed.
    #[snafu(display("LLVM build_return failed"))]
    BuildReturn { source: BuilderError },

    /// Value extraction from builder result failed.
    #[snafu(display("Failed to extract {expected} from builder result"))]
    ValueExtractionFailed { expected: &'static str },

    /// Function parameter retrieval failed.
    #[snafu(display("Function parameter at index {index} not found"))]
    InvalidFunctionParameter { index: u32 },

    // ========================================================================
    // Module errors
    // ========================================================================
    /// LLVM module verification failed.
    #[snafu(display("Module verification failed: {message}"))]
    ModuleVerification { message: String },
}
