//! LLVM type mappings using inkwell.
//!
//! Struct types shared with the host runtime (array descriptors and the
//! side-data block) are built here and nowhere else.

use inkwell::AddressSpace;
use inkwell::context::Context;
use inkwell::types::{BasicType, BasicTypeEnum, IntType, PointerType, StructType};
use kbind_dtype::ScalarDType;

use crate::layout::{HEADER_SLOTS, SideDataLayout};

/// Convert a ScalarDType to the LLVM basic type it is passed as.
pub fn scalar_type<'ctx>(dtype: ScalarDType, context: &'ctx Context) -> BasicTypeEnum<'ctx> {
    match dtype {
        ScalarDType::Bool => context.bool_type().into(),
        ScalarDType::Int8 | ScalarDType::UInt8 => context.i8_type().into(),
        ScalarDType::Int16 | ScalarDType::UInt16 => context.i16_type().into(),
        ScalarDType::Int32 | ScalarDType::UInt32 => context.i32_type().into(),
        ScalarDType::Int64 | ScalarDType::UInt64 => context.i64_type().into(),
        ScalarDType::Float16 => context.f16_type().into(),
        ScalarDType::Float32 => context.f32_type().into(),
        ScalarDType::Float64 => context.f64_type().into(),
        ScalarDType::Index => intp_type(context).into(),
    }
}

/// Get pointer type (opaque pointer in LLVM 15+).
pub fn pointer_type(context: &Context) -> PointerType<'_> {
    context.ptr_type(AddressSpace::default())
}

/// Pointer-sized integer of the host, which is also the JIT target.
pub fn intp_type(context: &Context) -> IntType<'_> {
    context.custom_width_int_type(usize::BITS)
}

/// Stack-local descriptor of a C-contiguous array: `{ ptr data, [ndim x intp] shape }`.
pub fn array_struct_type(ndim: usize, context: &Context) -> StructType<'_> {
    let shape = intp_type(context).array_type(ndim as u32);
    context.struct_type(&[pointer_type(context).into(), shape.into()], false)
}

/// Side-data block: `{ [3 x ptr] header, [k0 x intp], [k1 x intp], ... }`.
pub fn side_data_type<'ctx>(layout: &SideDataLayout, context: &'ctx Context) -> StructType<'ctx> {
    let header = pointer_type(context).array_type(HEADER_SLOTS as u32).as_basic_type_enum();
    let fields: Vec<BasicTypeEnum<'ctx>> = std::iter::once(header)
        .chain(layout.field_sizes().skip(1).map(|slots| intp_type(context).array_type(slots as u32).into()))
        .collect();
    context.struct_type(&fields, false)
}
