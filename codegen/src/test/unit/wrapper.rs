//! Wrapper emission tests. These inspect the emitted IR; execution is covered by the runtime crate.

use inkwell::context::Context;
use kbind_dtype::ScalarDType;

use crate::llvm::{emit_single_kernel, load_module, single_kernel_name};
use crate::{Error, KernelDescriptor, ParamKind, ShapeTemplate, SideDataLayout};

const F64: ScalarDType = ScalarDType::Float64;

const ADD_IR: &str = r#"
define double @add(double %a, double %b) {
entry:
  %r = fadd double %a, %b
  ret double %r
}
"#;

const ROW_IR: &str = r#"
define void @copy_row(ptr %x, ptr %out) {
entry:
  ret void
}
"#;

fn emit(descriptor: &KernelDescriptor) -> Result<String, Error> {
    let context = Context::create();
    let layout = SideDataLayout::plan(descriptor)?;
    let module = load_module(descriptor.source(), descriptor.function(), &context)?;
    emit_single_kernel(&context, &module, descriptor, &layout)?;
    module.verify().map_err(|e| Error::KernelParse { reason: e.to_string() })?;
    Ok(module.print_to_string().to_string())
}

fn add_descriptor() -> KernelDescriptor {
    KernelDescriptor::new(ADD_IR, "add")
        .arg(ParamKind::Scalar(F64), ShapeTemplate::scalar())
        .arg(ParamKind::Scalar(F64), ShapeTemplate::scalar())
        .ret(ParamKind::Scalar(F64), ShapeTemplate::scalar())
}

#[test]
fn test_scalar_wrapper_signature() {
    let ir = emit(&add_descriptor()).unwrap();

    assert!(ir.contains("define void @add_single(ptr %dst_ptr, ptr %src_ptrs, ptr %extra_ptr)"), "{ir}");
    assert!(ir.contains("load double, ptr %src0"), "{ir}");
    assert!(ir.contains("load double, ptr %src1"), "{ir}");
    assert!(ir.contains("call double @add(double %arg0, double %arg1)"), "{ir}");
    assert!(ir.contains("store double %result, ptr %dst_ptr"), "{ir}");
    // No array operands, so nothing is read through the side-data pointer.
    assert!(!ir.contains("%extra0"), "{ir}");
}

#[test]
fn test_array_wrapper_mixes_constants_and_side_data() {
    let descriptor = KernelDescriptor::new(ROW_IR, "copy_row")
        .arg(ParamKind::contiguous(F64), "3, n, 4".parse().unwrap())
        .ret(ParamKind::contiguous(F64), "n, 4".parse().unwrap());
    let ir = emit(&descriptor).unwrap();

    assert!(ir.contains("alloca { ptr, [2 x i64] }"), "{ir}");
    assert!(ir.contains("alloca { ptr, [1 x i64] }"), "{ir}");
    // Fixed dimension is a constant, symbolic one is loaded from the side data.
    assert!(ir.contains("store i64 3, ptr %arr0_shape0"), "{ir}");
    assert!(ir.contains("%dim0_1 = load i64, ptr %extra0_dim1"), "{ir}");
    assert!(ir.contains("%dim1_0 = load i64, ptr %extra1_dim0"), "{ir}");
    assert!(ir.contains("call void @copy_row(ptr %arr0, ptr %arr1)"), "{ir}");
}

#[test]
fn test_pointer_return_is_trailing_argument() {
    let ir_src = r#"
define void @negate(double %a, ptr %out) {
entry:
  %n = fneg double %a
  store double %n, ptr %out
  ret void
}
"#;
    let descriptor = KernelDescriptor::new(ir_src, "negate")
        .arg(ParamKind::Scalar(F64), ShapeTemplate::scalar())
        .ret(ParamKind::Pointer(F64), ShapeTemplate::scalar());
    let ir = emit(&descriptor).unwrap();
    assert!(ir.contains("call void @negate(double %arg0, ptr %dst_ptr)"), "{ir}");
}

#[test]
fn test_missing_function() {
    let descriptor = KernelDescriptor::new(ADD_IR, "sub")
        .arg(ParamKind::Scalar(F64), ShapeTemplate::scalar())
        .ret(ParamKind::Scalar(F64), ShapeTemplate::scalar());
    assert!(matches!(emit(&descriptor), Err(Error::FunctionNotFound { name }) if name == "sub"));
}

#[test]
fn test_arity_mismatch() {
    let descriptor = KernelDescriptor::new(ADD_IR, "add")
        .arg(ParamKind::Scalar(F64), ShapeTemplate::scalar())
        .ret(ParamKind::Scalar(F64), ShapeTemplate::scalar());
    let err = emit(&descriptor).unwrap_err();
    assert!(matches!(err, Error::SignatureMismatch { expected: 1, actual: 2, .. }), "got {err:?}");
}

#[test]
fn test_invalid_ir() {
    let descriptor = KernelDescriptor::new("this is not llvm", "add")
        .arg(ParamKind::Scalar(F64), ShapeTemplate::scalar())
        .ret(ParamKind::Scalar(F64), ShapeTemplate::scalar());
    assert!(matches!(emit(&descriptor), Err(Error::KernelParse { .. })));
}

#[test]
fn test_single_kernel_name() {
    assert_eq!(single_kernel_name("sum_row"), "sum_row_single");
}

#[test]
fn test_scalar_return_type_must_match() {
    let descriptor = KernelDescriptor::new(ADD_IR, "add")
        .arg(ParamKind::Scalar(F64), ShapeTemplate::scalar())
        .arg(ParamKind::Scalar(F64), ShapeTemplate::scalar())
        .ret(ParamKind::Scalar(ScalarDType::Float32), ShapeTemplate::scalar());
    let err = emit(&descriptor).unwrap_err();
    assert!(
        matches!(err, Error::ReturnTypeMismatch { expected: ScalarDType::Float32, ref actual, .. } if actual == "double"),
        "got {err:?}"
    );
}

#[test]
fn test_void_kernel_with_scalar_return() {
    let descriptor = KernelDescriptor::new(ROW_IR, "copy_row")
        .arg(ParamKind::Pointer(F64), ShapeTemplate::scalar())
        .arg(ParamKind::Pointer(F64), ShapeTemplate::scalar())
        .ret(ParamKind::Scalar(F64), ShapeTemplate::scalar());
    let err = emit(&descriptor).unwrap_err();
    assert!(matches!(err, Error::ReturnTypeMismatch { ref actual, .. } if actual == "void"), "got {err:?}");
}

#[test]
fn test_wrapper_name_already_defined() {
    let ir = format!("{ADD_IR}\ndefine void @add_single(ptr %a, ptr %b, ptr %c) {{\nentry:\n  ret void\n}}\n");
    let descriptor = KernelDescriptor::new(ir, "add")
        .arg(ParamKind::Scalar(F64), ShapeTemplate::scalar())
        .arg(ParamKind::Scalar(F64), ShapeTemplate::scalar())
        .ret(ParamKind::Scalar(F64), ShapeTemplate::scalar());
    let err = emit(&descriptor).unwrap_err();
    assert!(matches!(err, Error::WrapperNameTaken { ref name } if name == "add_single"), "got {err:?}");
}
