//! Kernel descriptors: parameter kinds, shape templates and kernel source.
//!
//! A [`KernelDescriptor`] describes an already-written kernel function: where
//! its code lives, how each formal is passed, and which dimensions of every
//! shaped-array operand are known at codegen time.
//!
//! The return value is described like any other operand and always comes
//! last in [`KernelDescriptor::params`].

use std::fmt;
use std::str::FromStr;

use kbind_dtype::ScalarDType;
use smallvec::SmallVec;
use snafu::{OptionExt, ensure};

use crate::error::*;

/// Memory arrangement of a shaped-array operand.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ArrayLayout {
    /// Element-contiguous, row-major.
    C,
    /// Element-contiguous, column-major.
    F,
    /// Arbitrary per-dimension strides.
    Strided,
}

impl fmt::Display for ArrayLayout {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::C => f.write_str("C"),
            Self::F => f.write_str("F"),
            Self::Strided => f.write_str("S"),
        }
    }
}

/// How a kernel formal is passed, with its native type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ParamKind {
    /// Passed by value.
    Scalar(ScalarDType),
    /// Passed as a pointer to a value of the given type.
    Pointer(ScalarDType),
    /// Passed as a pointer to a stack-local array descriptor `{ data, shape[] }`.
    Array { layout: ArrayLayout, elem: ScalarDType },
}

impl ParamKind {
    /// C-contiguous array of `elem`.
    pub const fn contiguous(elem: ScalarDType) -> Self {
        Self::Array { layout: ArrayLayout::C, elem }
    }

    /// The native type: scalar type, pointee, or array element.
    pub const fn dtype(&self) -> ScalarDType {
        match self {
            Self::Scalar(dtype) | Self::Pointer(dtype) => *dtype,
            Self::Array { elem, .. } => *elem,
        }
    }

    pub const fn is_array(&self) -> bool {
        matches!(self, Self::Array { .. })
    }
}

impl fmt::Display for ParamKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Scalar(dtype) => write!(f, "scalar:{dtype}"),
            Self::Pointer(dtype) => write!(f, "pointer:{dtype}"),
            Self::Array { layout, elem } => write!(f, "array[{layout}]:{elem}"),
        }
    }
}

/// Parses `scalar:<dtype>`, `pointer:<dtype>` or `array[C|F|S]:<dtype>`.
impl FromStr for ParamKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();
        let (head, dtype) = match s.split_once(':') {
            Some((head, dtype)) => (head.trim(), Some(dtype.trim())),
            None => (s, None),
        };

        let make: fn(ScalarDType) -> ParamKind = match head {
            "scalar" => ParamKind::Scalar,
            "pointer" => ParamKind::Pointer,
            "array[C]" => ParamKind::contiguous,
            "array[F]" => |elem| ParamKind::Array { layout: ArrayLayout::F, elem },
            "array[S]" => |elem| ParamKind::Array { layout: ArrayLayout::Strided, elem },
            _ => return UnsupportedKindSnafu { kind: s }.fail(),
        };

        let dtype = dtype.context(InvalidDescriptorSnafu { reason: format!("kind '{s}' has no element type") })?;
        let dtype = dtype.parse::<ScalarDType>().ok().context(UnknownDTypeSnafu { name: dtype })?;
        Ok(make(dtype))
    }
}

/// Size of one dimension in a shape template.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Dim {
    /// Known at codegen time, baked into the wrapper as a constant.
    Fixed(usize),
    /// Known only once an array instance is bound; read from side data.
    Symbolic(String),
    /// Variable-length dimension. Never supported in a counted position.
    Ragged,
}

impl Dim {
    pub fn symbol(name: impl Into<String>) -> Self {
        Self::Symbolic(name.into())
    }

    pub fn is_symbolic(&self) -> bool {
        matches!(self, Self::Symbolic(_))
    }
}

impl fmt::Display for Dim {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Fixed(n) => write!(f, "{n}"),
            Self::Symbolic(name) => f.write_str(name),
            Self::Ragged => f.write_str("var"),
        }
    }
}

impl From<usize> for Dim {
    fn from(n: usize) -> Self {
        Self::Fixed(n)
    }
}

impl From<&str> for Dim {
    fn from(name: &str) -> Self {
        Self::Symbolic(name.to_string())
    }
}

/// Parses `4` (fixed), `n` (symbolic) or `var` (ragged).
impl FromStr for Dim {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();
        if s == "var" {
            return Ok(Self::Ragged);
        }
        if !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit()) {
            let n = s.parse().ok().context(InvalidDescriptorSnafu { reason: format!("dimension '{s}' overflows") })?;
            return Ok(Self::Fixed(n));
        }

        let mut chars = s.chars();
        let valid = chars.next().is_some_and(|c| c.is_ascii_alphabetic() || c == '_')
            && chars.all(|c| c.is_ascii_alphanumeric() || c == '_');
        ensure!(valid, InvalidDescriptorSnafu { reason: format!("'{s}' is not a dimension") });
        Ok(Self::Symbolic(s.to_string()))
    }
}

/// Ordered dimensions of one operand.
///
/// The last entry is the trailing, contiguous axis. It is never materialized
/// as a counted dimension; only [`ShapeTemplate::counted`] reaches the array
/// descriptor and the side-data block.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ShapeTemplate {
    dims: SmallVec<[Dim; 4]>,
}

impl ShapeTemplate {
    pub fn new<D: Into<Dim>>(dims: impl IntoIterator<Item = D>) -> Self {
        Self { dims: dims.into_iter().map(Into::into).collect() }
    }

    /// Template of a scalar or pointer operand.
    pub fn scalar() -> Self {
        Self::default()
    }

    pub fn dims(&self) -> &[Dim] {
        &self.dims
    }

    pub fn len(&self) -> usize {
        self.dims.len()
    }

    pub fn is_empty(&self) -> bool {
        self.dims.is_empty()
    }

    /// Every dimension except the trailing one.
    pub fn counted(&self) -> &[Dim] {
        &self.dims[..self.dims.len().saturating_sub(1)]
    }

    pub fn trailing(&self) -> Option<&Dim> {
        self.dims.last()
    }

    /// Whether any counted dimension is symbolic.
    pub fn has_symbolic(&self) -> bool {
        self.counted().iter().any(Dim::is_symbolic)
    }
}

impl fmt::Display for ShapeTemplate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, dim) in self.dims.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{dim}")?;
        }
        Ok(())
    }
}

/// Parses a comma-separated dimension list such as `4, n`.
impl FromStr for ShapeTemplate {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        if s.trim().is_empty() {
            return Ok(Self::scalar());
        }
        let dims = s.split(',').map(|d| d.parse::<Dim>()).collect::<Result<SmallVec<[Dim; 4]>>>()?;
        Ok(Self { dims })
    }
}

/// Where the kernel function's code comes from.
///
/// The source is loaded into a fresh module on every bind, so no two
/// artifacts ever share a module.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum KernelSource {
    /// Textual LLVM IR.
    Ir(String),
    /// LLVM bitcode.
    Bitcode(Vec<u8>),
}

impl From<&str> for KernelSource {
    fn from(ir: &str) -> Self {
        Self::Ir(ir.to_string())
    }
}

impl From<String> for KernelSource {
    fn from(ir: String) -> Self {
        Self::Ir(ir)
    }
}

/// One kernel formal: its kind and its shape template.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Param {
    pub kind: ParamKind,
    pub shape: ShapeTemplate,
}

impl Param {
    pub fn new(kind: ParamKind, shape: ShapeTemplate) -> Self {
        Self { kind, shape }
    }

    pub fn parse(kind: &str, shape: &str) -> Result<Self> {
        Ok(Self { kind: kind.parse()?, shape: shape.parse()? })
    }
}

/// Description of a kernel function to wrap in the single-kernel calling convention.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct KernelDescriptor {
    source: KernelSource,
    function: String,
    inputs: Vec<Param>,
    output: Option<Param>,
}

impl KernelDescriptor {
    pub fn new(source: impl Into<KernelSource>, function: impl Into<String>) -> Self {
        Self { source: source.into(), function: function.into(), inputs: Vec::new(), output: None }
    }

    /// Append an input formal.
    pub fn arg(self, kind: ParamKind, shape: ShapeTemplate) -> Self {
        self.with_param(Param::new(kind, shape))
    }

    /// Set the return operand.
    pub fn ret(self, kind: ParamKind, shape: ShapeTemplate) -> Self {
        self.with_return(Param::new(kind, shape))
    }

    pub fn with_param(mut self, param: Param) -> Self {
        self.inputs.push(param);
        self
    }

    pub fn with_return(mut self, param: Param) -> Self {
        self.output = Some(param);
        self
    }

    pub fn source(&self) -> &KernelSource {
        &self.source
    }

    pub fn function(&self) -> &str {
        &self.function
    }

    pub fn inputs(&self) -> &[Param] {
        &self.inputs
    }

    pub fn output(&self) -> Result<&Param> {
        self.output
            .as_ref()
            .context(InvalidDescriptorSnafu { reason: format!("kernel '{}' has no return operand", self.function) })
    }

    /// All operands in order, the return last.
    pub fn params(&self) -> impl Iterator<Item = &Param> {
        self.inputs.iter().chain(self.output.as_ref())
    }

    pub fn kinds(&self) -> impl Iterator<Item = ParamKind> + '_ {
        self.params().map(|p| p.kind)
    }

    pub fn shapes(&self) -> impl Iterator<Item = &ShapeTemplate> {
        self.params().map(|p| &p.shape)
    }

    /// Number of operands including the return.
    pub fn operand_count(&self) -> usize {
        self.inputs.len() + usize::from(self.output.is_some())
    }

    /// Number of formals the kernel function itself declares.
    ///
    /// Pointer and array returns are passed as a trailing argument.
    pub fn kernel_arity(&self) -> Result<u32> {
        let trailing = match self.output()?.kind {
            ParamKind::Scalar(_) => 0,
            ParamKind::Pointer(_) | ParamKind::Array { .. } => 1,
        };
        formal_count(self.inputs.len(), trailing)
    }
}

pub(crate) fn formal_count(inputs: usize, trailing: usize) -> Result<u32> {
    inputs
        .checked_add(trailing)
        .and_then(|n| u32::try_from(n).ok())
        .context(InvalidDescriptorSnafu { reason: format!("{inputs} inputs exceed the kernel parameter limit") })
}
