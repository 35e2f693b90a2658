//! Emission of the single-kernel wrapper.
//!
//! The wrapper has the fixed signature
//!
//! ```text
//! void @<kernel>_single(ptr %dst_ptr, ptr %src_ptrs, ptr %extra_ptr)
//! ```
//!
//! It reads one pointer per input from `%src_ptrs`, rebuilds array descriptors
//! on the stack (shape from constants or from the side-data block behind
//! `%extra_ptr`), calls the kernel, and routes the result to `%dst_ptr`.

use inkwell::attributes::{Attribute, AttributeLoc};
use inkwell::builder::Builder;
use inkwell::context::Context;
use inkwell::module::Module;
use inkwell::types::{AnyType, IntType, StructType};
use inkwell::values::{BasicMetadataValueEnum, FunctionValue, PointerValue};
use snafu::{OptionExt, ResultExt, ensure};

use crate::descriptor::{Dim, KernelDescriptor, ParamKind, ShapeTemplate};
use crate::error::{
    FunctionNotFoundSnafu, InvalidDescriptorSnafu, Result, ReturnTypeMismatchSnafu, SignatureMismatchSnafu,
    UnsupportedDimensionSnafu, WrapperNameTakenSnafu,
};
use crate::layout::SideDataLayout;
use crate::llvm::error::*;
use crate::llvm::types::{array_struct_type, intp_type, pointer_type, scalar_type, side_data_type};

/// Name of the wrapper emitted for `kernel`.
pub fn single_kernel_name(kernel: &str) -> String {
    format!("{kernel}_single")
}

/// Emit the single-kernel wrapper of `descriptor` into `module`.
///
/// `layout` must have been planned from the same descriptor.
pub fn emit_single_kernel<'ctx>(
    context: &'ctx Context,
    module: &Module<'ctx>,
    descriptor: &KernelDescriptor,
    layout: &SideDataLayout,
) -> Result<FunctionValue<'ctx>> {
    let kernel_name = descriptor.function();
    let kernel = module.get_function(kernel_name).context(FunctionNotFoundSnafu { name: kernel_name })?;

    let expected = descriptor.kernel_arity()?;
    let actual = kernel.count_params();
    ensure!(expected == actual, SignatureMismatchSnafu { name: kernel_name, expected, actual });

    let output = descriptor.output()?;
    if let ParamKind::Scalar(dtype) = output.kind {
        // The store through `dst_ptr` writes whatever the kernel returns.
        let returned = kernel.get_type().get_return_type();
        ensure!(
            returned == Some(scalar_type(dtype, context)),
            ReturnTypeMismatchSnafu {
                name: kernel_name,
                expected: dtype,
                actual: returned.map_or_else(|| "void".to_string(), |ty| ty.print_to_string().to_string()),
            }
        );
    }

    let wrapper_name = single_kernel_name(kernel_name);
    ensure!(module.get_function(&wrapper_name).is_none(), WrapperNameTakenSnafu { name: &wrapper_name });

    let ptr_type = pointer_type(context);
    let fn_type = context.void_type().fn_type(&[ptr_type.into(), ptr_type.into(), ptr_type.into()], false);
    let function = module.add_function(&wrapper_name, fn_type, None);
    add_wrapper_attributes(function, context);

    let builder = context.create_builder();
    builder.position_at_end(context.append_basic_block(function, "entry"));

    let dst_ptr = pointer_param(function, 0, "dst_ptr")?;
    let src_ptrs = pointer_param(function, 1, "src_ptrs")?;
    let extra_ptr = pointer_param(function, 2, "extra_ptr")?;

    let emitter = Emitter {
        context,
        builder: &builder,
        layout,
        intp: intp_type(context),
        side_type: side_data_type(layout, context),
        extra_ptr,
    };

    let mut args: Vec<BasicMetadataValueEnum<'ctx>> = Vec::with_capacity(actual as usize);
    for (operand, param) in descriptor.inputs().iter().enumerate() {
        let src = emitter.load_source(src_ptrs, operand)?;
        let arg = match param.kind {
            ParamKind::Scalar(dtype) => builder
                .build_load(scalar_type(dtype, context), src, &format!("arg{operand}"))
                .context(BuildLoadSnafu { what: format!("scalar operand {operand}") })?
                .into(),
            ParamKind::Pointer(_) => src.into(),
            ParamKind::Array { .. } => emitter.array_descriptor(src, &param.shape, operand)?.into(),
        };
        args.push(arg);
    }

    let callee = kernel_name.to_string();
    match output.kind {
        ParamKind::Scalar(_) => {
            let call = builder.build_call(kernel, &args, "result").context(BuildCallSnafu { callee })?;
            let value = call
                .try_as_basic_value()
                .left()
                .context(ValueExtractionFailedSnafu { expected: "kernel return value" })?;
            builder.build_store(dst_ptr, value).context(BuildStoreSnafu { what: "dst" })?;
        }
        ParamKind::Pointer(_) => {
            args.push(dst_ptr.into());
            builder.build_call(kernel, &args, "").context(BuildCallSnafu { callee })?;
        }
        ParamKind::Array { .. } => {
            let arr = emitter.array_descriptor(dst_ptr, &output.shape, descriptor.inputs().len())?;
            args.push(arr.into());
            builder.build_call(kernel, &args, "").context(BuildCallSnafu { callee })?;
        }
    }

    builder.build_return(None).context(BuildReturnSnafu)?;

    if !function.verify(false) {
        let message = format!("wrapper of '{kernel_name}' failed verification");
        return Err(Error::ModuleVerification { message }.into());
    }

    tracing::trace!(wrapper = %function.print_to_string().to_string(), "emitted single-kernel wrapper");
    Ok(function)
}

/// Per-wrapper emission state.
struct Emitter<'a, 'ctx> {
    context: &'ctx Context,
    builder: &'a Builder<'ctx>,
    layout: &'a SideDataLayout,
    intp: IntType<'ctx>,
    side_type: StructType<'ctx>,
    extra_ptr: PointerValue<'ctx>,
}

impl<'ctx> Emitter<'_, 'ctx> {
    /// Load `src_ptrs[operand]`.
    fn load_source(&self, src_ptrs: PointerValue<'ctx>, operand: usize) -> Result<PointerValue<'ctx>> {
        let ptr_type = pointer_type(self.context);
        let index = self.intp.const_int(operand as u64, false);
        let what = format!("src_ptrs[{operand}]");
        // SAFETY: the host passes one source pointer per input operand.
        let slot = unsafe { self.builder.build_gep(ptr_type, src_ptrs, &[index], &format!("src{operand}_slot")) }
            .context(BuildGepSnafu { what: what.clone() })?;
        let ptr = self.builder.build_load(ptr_type, slot, &format!("src{operand}")).context(BuildLoadSnafu { what })?;
        Ok(ptr.into_pointer_value())
    }

    /// Build `{ data, shape[] }` on the stack and return its address.
    fn array_descriptor(
        &self,
        data: PointerValue<'ctx>,
        shape: &ShapeTemplate,
        operand: usize,
    ) -> Result<PointerValue<'ctx>> {
        let counted = shape.counted();
        let i32_type = self.context.i32_type();
        let arr_type = array_struct_type(counted.len(), self.context);

        let arr = self
            .builder
            .build_alloca(arr_type, &format!("arr{operand}"))
            .context(BuildAllocaSnafu { what: format!("array operand {operand}") })?;
        let data_field = self
            .builder
            .build_struct_gep(arr_type, arr, 0, &format!("arr{operand}_data"))
            .context(BuildGepSnafu { what: format!("arr{operand}.data") })?;
        self.builder.build_store(data_field, data).context(BuildStoreSnafu { what: format!("arr{operand}.data") })?;

        for (position, dim) in counted.iter().enumerate() {
            let value = match dim {
                Dim::Fixed(n) => self.intp.const_int(*n as u64, false),
                Dim::Symbolic(_) => self.load_side_dim(operand, position)?,
                Dim::Ragged => return UnsupportedDimensionSnafu { index: operand, position, dim: dim.to_string() }.fail(),
            };

            let indices = [i32_type.const_zero(), i32_type.const_int(1, false), self.intp.const_int(position as u64, false)];
            // SAFETY: `position` < ndim of `arr_type`.
            let shape_slot =
                unsafe { self.builder.build_gep(arr_type, arr, &indices, &format!("arr{operand}_shape{position}")) }
                    .context(BuildGepSnafu { what: format!("arr{operand}.shape[{position}]") })?;
            self.builder
                .build_store(shape_slot, value)
                .context(BuildStoreSnafu { what: format!("arr{operand}.shape[{position}]") })?;
        }

        Ok(arr)
    }

    /// Load the bound size of dimension `position` of `operand` from the side-data block.
    fn load_side_dim(&self, operand: usize, position: usize) -> Result<inkwell::values::IntValue<'ctx>> {
        let field = self.layout.field_index(operand).context(InvalidDescriptorSnafu {
            reason: format!("operand {operand} has a symbolic dimension but no side-data field"),
        })?;

        let i32_type = self.context.i32_type();
        let indices =
            [i32_type.const_zero(), i32_type.const_int(field as u64, false), self.intp.const_int(position as u64, false)];
        let what = format!("extra.field{field}[{position}]");
        // SAFETY: the layout reserves one slot per counted dimension of `operand`.
        let slot = unsafe {
            self.builder.build_gep(self.side_type, self.extra_ptr, &indices, &format!("extra{operand}_dim{position}"))
        }
        .context(BuildGepSnafu { what: what.clone() })?;
        let value = self
            .builder
            .build_load(self.intp, slot, &format!("dim{operand}_{position}"))
            .context(BuildLoadSnafu { what })?;
        Ok(value.into_int_value())
    }
}

fn pointer_param<'ctx>(function: FunctionValue<'ctx>, index: u32, name: &str) -> Result<PointerValue<'ctx>> {
    let param = function.get_nth_param(index).context(InvalidFunctionParameterSnafu { index })?;
    param.set_name(name);
    Ok(param.into_pointer_value())
}

/// Add function attributes to the wrapper.
fn add_wrapper_attributes<'ctx>(function: FunctionValue<'ctx>, context: &'ctx Context) {
    let nounwind_id = Attribute::get_named_enum_kind_id("nounwind");
    function.add_attribute(AttributeLoc::Function, context.create_enum_attribute(nounwind_id, 0));
}
