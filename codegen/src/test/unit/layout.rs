//! Side-data layout planning tests.

use kbind_dtype::ScalarDType;
use kbind_dtype::proptest_gen::scalar_generator;
use proptest::prelude::*;
use test_case::test_case;

use crate::{ArrayLayout, Dim, Error, HEADER_SLOTS, KernelDescriptor, ParamKind, ShapeTemplate, SideDataLayout};

const F64: ScalarDType = ScalarDType::Float64;

fn scalar() -> (ParamKind, ShapeTemplate) {
    (ParamKind::Scalar(F64), ShapeTemplate::scalar())
}

fn array(shape: &str) -> (ParamKind, ShapeTemplate) {
    (ParamKind::contiguous(F64), shape.parse().unwrap())
}

fn descriptor(params: &[(ParamKind, ShapeTemplate)]) -> KernelDescriptor {
    let (inputs, output) = params.split_at(params.len() - 1);
    let descriptor = inputs.iter().fold(KernelDescriptor::new("", "k"), |d, (kind, shape)| d.arg(*kind, shape.clone()));
    descriptor.ret(output[0].0, output[0].1.clone())
}

#[test]
fn test_all_scalar_layout_is_header_only() {
    let layout = SideDataLayout::plan(&descriptor(&[scalar(), scalar(), scalar()])).unwrap();
    assert!(layout.is_static());
    assert_eq!(layout.field_count(), 1);
    assert_eq!(layout.slot_count(), HEADER_SLOTS);
    assert_eq!(layout.operand_fields(), &[None, None, None]);
}

#[test]
fn test_zero_parameter_kernel() {
    let layout = SideDataLayout::plan(&descriptor(&[scalar()])).unwrap();
    assert!(layout.is_static());
    assert_eq!(layout.size_bytes(), HEADER_SLOTS * std::mem::size_of::<usize>());
}

// Slots are reserved per counted dimension, not per symbolic one.
#[test_case("n", None; "one dim, trailing only")]
#[test_case("4, 8", None; "fixed only")]
#[test_case("n, 8", Some(1); "one symbolic")]
#[test_case("4, n, 8", Some(2); "mixed fixed and symbolic")]
#[test_case("m, n, 4, 8", Some(3); "two symbolic among three")]
fn test_array_field_sizing(shape: &str, slots: Option<usize>) {
    let layout = SideDataLayout::plan(&descriptor(&[array(shape), scalar()])).unwrap();
    match slots {
        Some(slots) => {
            assert_eq!(layout.field_index(0), Some(1));
            assert_eq!(layout.field_slots(1), Some(slots));
            assert_eq!(layout.slot_count(), HEADER_SLOTS + slots);
        }
        None => {
            assert_eq!(layout.field_index(0), None);
            assert!(layout.is_static());
        }
    }
}

#[test]
fn test_field_indices_follow_operand_order() {
    let layout =
        SideDataLayout::plan(&descriptor(&[array("n, 4"), scalar(), array("2, 4"), array("a, b, 4"), array("m, 4")]))
            .unwrap();
    assert_eq!(layout.operand_fields(), &[Some(1), None, None, Some(2), Some(3)]);
    assert_eq!(layout.field_sizes().collect::<Vec<_>>(), vec![HEADER_SLOTS, 1, 2, 1]);

    // Offsets count slots of every preceding field.
    assert_eq!(layout.slot_offset(1, 0), Some(HEADER_SLOTS));
    assert_eq!(layout.slot_offset(2, 1), Some(HEADER_SLOTS + 2));
    assert_eq!(layout.slot_offset(3, 0), Some(HEADER_SLOTS + 3));
    assert_eq!(layout.slot_offset(3, 1), None);
    assert_eq!(layout.slot_offset(4, 0), None);
}

#[test]
fn test_alloc_layout_matches_size() {
    let layout = SideDataLayout::plan(&descriptor(&[array("n, m, 4"), scalar()])).unwrap();
    let alloc = layout.alloc_layout().unwrap();
    assert_eq!(alloc.size(), (HEADER_SLOTS + 2) * std::mem::size_of::<usize>());
    assert_eq!(alloc.align(), std::mem::align_of::<usize>());
}

#[test_case(ArrayLayout::F; "fortran order")]
#[test_case(ArrayLayout::Strided; "strided")]
fn test_non_contiguous_layout_rejected(array_layout: ArrayLayout) {
    let d = KernelDescriptor::new("", "k")
        .arg(ParamKind::Scalar(F64), ShapeTemplate::scalar())
        .arg(ParamKind::Array { layout: array_layout, elem: F64 }, "n, 4".parse().unwrap())
        .ret(ParamKind::Scalar(F64), ShapeTemplate::scalar());
    let err = SideDataLayout::plan(&d).unwrap_err();
    assert!(matches!(err, Error::UnsupportedLayout { index: 1, layout } if layout == array_layout), "got {err:?}");
}

#[test]
fn test_ragged_counted_dimension_rejected() {
    let err = SideDataLayout::plan(&descriptor(&[array("4, var, 8"), scalar()])).unwrap_err();
    assert!(matches!(err, Error::UnsupportedDimension { index: 0, position: 1, .. }), "got {err:?}");
}

#[test]
fn test_ragged_trailing_dimension_allowed() {
    let layout = SideDataLayout::plan(&descriptor(&[array("n, var"), scalar()])).unwrap();
    assert_eq!(layout.field_slots(1), Some(1));
}

#[test]
fn test_return_array_gets_field() {
    let layout = SideDataLayout::plan(&descriptor(&[scalar(), array("n, 4")])).unwrap();
    assert_eq!(layout.operand_fields(), &[None, Some(1)]);
}

#[test]
fn test_empty_array_template_is_invalid() {
    let err = SideDataLayout::plan(&descriptor(&[(ParamKind::contiguous(F64), ShapeTemplate::scalar()), scalar()]))
        .unwrap_err();
    assert!(matches!(err, Error::InvalidDescriptor { .. }), "got {err:?}");
}

fn dim() -> impl Strategy<Value = Dim> {
    prop_oneof![(0usize..64).prop_map(Dim::Fixed), "[a-z]{1,3}".prop_map(Dim::Symbolic)]
}

proptest! {
    #[test]
    fn field_slots_equal_counted_dims(dims in prop::collection::vec(dim(), 1..6), elem in scalar_generator()) {
        let shape = ShapeTemplate::new(dims.clone());
        let d = KernelDescriptor::new("", "k")
            .arg(ParamKind::contiguous(elem), shape.clone())
            .ret(ParamKind::Scalar(elem), ShapeTemplate::scalar());
        let layout = SideDataLayout::plan(&d).unwrap();

        if dims[..dims.len() - 1].iter().any(Dim::is_symbolic) {
            prop_assert_eq!(layout.field_slots(1), Some(dims.len() - 1));
            prop_assert_eq!(layout.slot_count(), HEADER_SLOTS + dims.len() - 1);
        } else {
            prop_assert!(layout.is_static());
            prop_assert_eq!(layout.slot_count(), HEADER_SLOTS);
        }
    }
}
