//! Side-data block layout planning.
//!
//! The side-data block is the per-binding memory handed to the wrapper as its
//! third argument. It is a struct of pointer-sized slots:
//!
//! ```text
//! field 0:    [3 x ptr]       header, reserved for the host runtime
//! field 1..:  [k x intp]      one per array operand with a symbolic counted dimension
//! ```
//!
//! Every field is an array of pointer-sized words, so the struct never has
//! padding and slot offsets can be computed by counting. The same
//! [`SideDataLayout`] produces the LLVM struct type used by the wrapper and the
//! host offsets used by the shape binder.

use snafu::ensure;

use crate::descriptor::{ArrayLayout, Dim, KernelDescriptor, ParamKind};
use crate::error::*;

/// Pointer-sized slots reserved for the host at the start of every block.
pub const HEADER_SLOTS: usize = 3;

/// Planned layout of the side-data block of one kernel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SideDataLayout {
    /// Slot count of every dynamic field, in field order (header excluded).
    fields: Vec<usize>,
    /// Struct field index of each operand, `None` when it has no dynamic field.
    operand_fields: Vec<Option<u32>>,
}

impl SideDataLayout {
    /// Validate every operand of `descriptor` and plan its side-data fields.
    ///
    /// This is the only place capability errors are raised; once it succeeds
    /// the descriptor can be emitted without further kind checks.
    pub fn plan(descriptor: &KernelDescriptor) -> Result<Self> {
        // Fails early when the return operand is missing.
        descriptor.output()?;

        let mut fields = Vec::new();
        let mut operand_fields = Vec::with_capacity(descriptor.operand_count());

        for (index, param) in descriptor.params().enumerate() {
            let field = match param.kind {
                ParamKind::Scalar(_) | ParamKind::Pointer(_) => None,
                ParamKind::Array { layout, .. } => {
                    ensure!(layout == ArrayLayout::C, UnsupportedLayoutSnafu { index, layout });
                    ensure!(
                        !param.shape.is_empty(),
                        InvalidDescriptorSnafu { reason: format!("array parameter {index} has an empty shape template") }
                    );

                    let counted = param.shape.counted();
                    for (position, dim) in counted.iter().enumerate() {
                        match dim {
                            Dim::Fixed(_) | Dim::Symbolic(_) => {}
                            Dim::Ragged => {
                                return UnsupportedDimensionSnafu { index, position, dim: dim.to_string() }.fail();
                            }
                        }
                    }

                    if param.shape.has_symbolic() {
                        fields.push(counted.len());
                        Some(fields.len() as u32)
                    } else {
                        None
                    }
                }
            };
            operand_fields.push(field);
        }

        tracing::debug!(
            kernel = descriptor.function(),
            dynamic_fields = fields.len(),
            slots = HEADER_SLOTS + fields.iter().sum::<usize>(),
            "planned side-data layout"
        );

        Ok(Self { fields, operand_fields })
    }

    /// True when the block holds only the header.
    pub fn is_static(&self) -> bool {
        self.fields.is_empty()
    }

    /// Number of dynamic fields (header excluded).
    pub fn dynamic_field_count(&self) -> usize {
        self.fields.len()
    }

    /// Number of struct fields including the header.
    pub fn field_count(&self) -> usize {
        1 + self.fields.len()
    }

    /// Struct field index of operand `operand`, if it has a dynamic field.
    pub fn field_index(&self, operand: usize) -> Option<u32> {
        self.operand_fields.get(operand).copied().flatten()
    }

    pub fn operand_fields(&self) -> &[Option<u32>] {
        &self.operand_fields
    }

    /// Slot count of struct field `field`; the header is field 0.
    pub fn field_slots(&self, field: u32) -> Option<usize> {
        match field {
            0 => Some(HEADER_SLOTS),
            n => self.fields.get(n as usize - 1).copied(),
        }
    }

    /// Slot counts of all fields, header first.
    pub fn field_sizes(&self) -> impl Iterator<Item = usize> + '_ {
        std::iter::once(HEADER_SLOTS).chain(self.fields.iter().copied())
    }

    /// Offset, in pointer-sized slots from the block start, of `dim` within `field`.
    pub fn slot_offset(&self, field: u32, dim: usize) -> Option<usize> {
        let slots = self.field_slots(field)?;
        if dim >= slots {
            return None;
        }
        let before: usize = self.field_sizes().take(field as usize).sum();
        Some(before + dim)
    }

    /// Total number of pointer-sized slots.
    pub fn slot_count(&self) -> usize {
        self.field_sizes().sum()
    }

    pub fn size_bytes(&self) -> usize {
        self.slot_count() * std::mem::size_of::<usize>()
    }

    pub fn align(&self) -> usize {
        std::mem::align_of::<usize>()
    }

    /// Allocation layout for one block instance.
    pub fn alloc_layout(&self) -> Result<std::alloc::Layout, std::alloc::LayoutError> {
        std::alloc::Layout::from_size_align(self.size_bytes(), self.align())
    }
}
