//! Shape binding: copying concrete runtime shapes into a side-data block.

use std::collections::HashMap;

use kbind_codegen::{Dim, KernelDescriptor, ParamKind, ShapeTemplate, SideDataLayout};
use kbind_dtype::ScalarDType;
use snafu::ensure;

use crate::error::*;
use crate::shape::DataDescriptor;
use crate::side_data::SideDataBlock;

/// How one operand takes part in shape binding.
#[derive(Debug, Clone)]
struct OperandBinding {
    dtype: ScalarDType,
    /// Template and first slot of the operand's side-data field, for arrays with one.
    field: Option<(ShapeTemplate, usize)>,
}

/// The shape-binding procedure of one kernel.
///
/// Built once per bind from the descriptor and its planned layout, then
/// invoked for every new set of concrete shapes.
#[derive(Debug, Clone)]
pub struct ShapeBinder {
    operands: Vec<OperandBinding>,
    inputs: usize,
    slot_count: usize,
}

impl ShapeBinder {
    /// `layout` must have been planned from `descriptor`.
    pub fn new(descriptor: &KernelDescriptor, layout: &SideDataLayout) -> Self {
        let operands = descriptor
            .params()
            .enumerate()
            .map(|(operand, param)| {
                let field = match param.kind {
                    ParamKind::Array { .. } => layout
                        .field_index(operand)
                        .and_then(|field| layout.slot_offset(field, 0))
                        .map(|offset| (param.shape.clone(), offset)),
                    ParamKind::Scalar(_) | ParamKind::Pointer(_) => None,
                };
                OperandBinding { dtype: param.kind.dtype(), field }
            })
            .collect();

        Self { operands, inputs: descriptor.inputs().len(), slot_count: layout.slot_count() }
    }

    /// True when the layout has no dynamic fields and [`ShapeBinder::bind`] does nothing.
    pub fn is_noop(&self) -> bool {
        self.operands.iter().all(|op| op.field.is_none())
    }

    /// Copy the counted dimensions of `srcs` and `dst` into `block`.
    ///
    /// Fixed dimensions are checked against the runtime shape and every use of
    /// a symbolic name must agree. On error the block is left unchanged.
    pub fn bind(&self, block: &mut SideDataBlock, dst: &dyn DataDescriptor, srcs: &[&dyn DataDescriptor]) -> Result<()> {
        if self.is_noop() {
            return Ok(());
        }

        ensure!(block.len() == self.slot_count, SideDataSizeSnafu { expected: self.slot_count, actual: block.len() });
        ensure!(srcs.len() == self.inputs, ArityMismatchSnafu { expected: self.inputs, actual: srcs.len() });

        let mut symbols: HashMap<&str, usize> = HashMap::new();
        let mut writes = Vec::new();

        let descriptors = srcs.iter().copied().chain(std::iter::once(dst));
        for (operand, (binding, data)) in self.operands.iter().zip(descriptors).enumerate() {
            if let Some(actual) = data.dtype() {
                ensure!(actual == binding.dtype, DTypeMismatchSnafu { operand, expected: binding.dtype, actual });
            }

            let Some((template, offset)) = &binding.field else { continue };
            let dims = trimmed_shape(data.shape(), template, operand)?;

            for (position, (dim, &size)) in template.counted().iter().zip(dims).enumerate() {
                match dim {
                    Dim::Fixed(expected) => {
                        ensure!(
                            *expected == size,
                            FixedDimMismatchSnafu { operand, position, expected: *expected, actual: size }
                        );
                    }
                    Dim::Symbolic(name) => {
                        let first = *symbols.entry(name.as_str()).or_insert(size);
                        ensure!(first == size, ConflictingSymbolSnafu { name: name.clone(), first, second: size });
                    }
                    // Rejected when the layout was planned.
                    Dim::Ragged => {}
                }
                writes.push((offset + position, size));
            }

            tracing::debug!(operand, dims = ?dims, "bound operand shape");
        }

        let slots = block.slots_mut();
        for (slot, size) in writes {
            slots[slot] = size;
        }
        Ok(())
    }
}

/// `shape[len - template.len() .. len - 1]`: leading broadcast dimensions and
/// the trailing axis are dropped.
fn trimmed_shape<'a>(shape: &'a [usize], template: &ShapeTemplate, operand: usize) -> Result<&'a [usize]> {
    let (len, tlen) = (shape.len(), template.len());
    ensure!(len >= tlen, RankMismatchSnafu { operand, expected: tlen, actual: len });
    Ok(&shape[len - tlen..len - 1])
}
