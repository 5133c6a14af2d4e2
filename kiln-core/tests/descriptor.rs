use kiln_core::{
    DenseTensorLayout, DescriptorState, Dimension, ElementType, KilnError, PartialShape, Shape, TensorDescriptor,
    TensorLayout,
};
use proptest::prelude::*;
use proptest::test_runner::Config as ProptestConfig;
use std::sync::Arc;

fn element_type() -> impl Strategy<Value = ElementType> {
    proptest::sample::select(ElementType::STATIC.to_vec())
}

fn dimension() -> impl Strategy<Value = Dimension> {
    prop_oneof![
        3 => (0i64..8).prop_map(Dimension::Known),
        1 => Just(Dimension::Unknown),
    ]
}

fn partial_shape() -> impl Strategy<Value = PartialShape> {
    prop_oneof![
        1 => Just(PartialShape::dynamic()),
        4 => proptest::collection::vec(dimension(), 0..5).prop_map(PartialShape::ranked),
    ]
}

proptest! {
    #![proptest_config(ProptestConfig {
        failure_persistence: None,
        .. ProptestConfig::default()
    })]

    #[test]
    fn invalid_descriptor_rejects_getters(et in element_type(), shape in partial_shape(), why in "[a-z ]{0,20}") {
        let mut desc = TensorDescriptor::new(et, shape.clone(), "t");
        desc.set_tensor_type(et, shape, false, &why).unwrap();
        prop_assert!(!desc.is_valid());
        let is_invalid_access = |e: KilnError| matches!(e, KilnError::InvalidTensorAccess { .. });
        prop_assert!(desc.element_type().map_err(is_invalid_access).unwrap_err());
        prop_assert!(desc.shape().map_err(is_invalid_access).unwrap_err());
        prop_assert!(desc.partial_shape().map_err(is_invalid_access).unwrap_err());
        prop_assert_eq!(desc.invalidity_explanation(), why.as_str());
    }

    #[test]
    fn static_shape_iff_partial_shape_is_static(et in element_type(), shape in partial_shape()) {
        let desc = TensorDescriptor::new(et, shape.clone(), "t");
        prop_assert_eq!(desc.shape().is_ok(), shape.is_static());
        if let Ok(s) = desc.shape() {
            prop_assert_eq!(PartialShape::from(s), shape);
        }
    }

    #[test]
    fn set_tensor_type_is_idempotent(et in element_type(), shape in partial_shape()) {
        let mut desc = TensorDescriptor::new(ElementType::Dynamic, PartialShape::dynamic(), "t");
        desc.set_tensor_type(et, shape.clone(), true, "").unwrap();
        let once = (desc.element_type().unwrap(), desc.partial_shape().unwrap().clone(), desc.shape().ok().cloned());
        desc.set_tensor_type(et, shape, true, "").unwrap();
        let twice = (desc.element_type().unwrap(), desc.partial_shape().unwrap().clone(), desc.shape().ok().cloned());
        prop_assert_eq!(once, twice);
    }

    #[test]
    fn invalidation_overrides_supplied_type(et in element_type(), shape in partial_shape()) {
        let mut desc = TensorDescriptor::new(et, shape.clone(), "t");
        desc.set_tensor_type(et, shape.clone(), false, "broken input").unwrap();
        prop_assert_eq!(desc.state(), DescriptorState::Invalid);
        prop_assert_eq!(desc.size().is_err(), true);
        // Becoming valid again clears the explanation
        desc.set_tensor_type(et, shape.clone(), true, "").unwrap();
        prop_assert_eq!(desc.element_type().unwrap(), et);
        prop_assert_eq!(desc.partial_shape().unwrap(), &shape);
        prop_assert_eq!(desc.invalidity_explanation(), "");
    }
}

#[test]
fn negative_dimensions_are_rejected() -> Result<(), KilnError> {
    let mut desc = TensorDescriptor::new(ElementType::F32, PartialShape::from([2, 3]), "t");
    let negative = PartialShape::ranked([Dimension::Known(2), Dimension::Known(-3)]);
    assert!(matches!(
        desc.set_tensor_type(ElementType::F32, negative, true, ""),
        Err(KilnError::NegativeDimension { .. })
    ));
    // Nothing was committed
    assert_eq!(desc.shape()?, &Shape::from([2, 3]));
    Ok(())
}

#[test]
fn name_is_derived_once() {
    let producer: Arc<str> = Arc::from("Add_7");
    let desc = TensorDescriptor::for_output(ElementType::F32, PartialShape::from([4]), &producer, 1);
    let first = desc.name().to_string();
    assert_eq!(first, "Add_7_1");
    drop(producer);
    // Producer is gone, but the name was memoized
    assert_eq!(desc.name(), first);
    assert_eq!(desc.to_string(), "Tensor(Add_7_1)");

    let orphan = {
        let producer: Arc<str> = Arc::from("Exp_3");
        TensorDescriptor::for_output(ElementType::F32, PartialShape::from([4]), &producer, 0)
    };
    assert_eq!(orphan.name(), "");
    assert_eq!(TensorDescriptor::new(ElementType::F32, PartialShape::dynamic(), "x").name(), "x");
}

#[test]
fn concurrent_name_access_agrees() {
    let producer: Arc<str> = Arc::from("Multiply_2");
    let desc = TensorDescriptor::for_output(ElementType::F32, PartialShape::from([4]), &producer, 0);
    let names: Vec<String> = std::thread::scope(|s| {
        let handles: Vec<_> = (0..8).map(|_| s.spawn(|| desc.name().to_string())).collect();
        handles.into_iter().map(|h| h.join().unwrap()).collect()
    });
    assert!(names.iter().all(|n| n == "Multiply_2_0"));
}

#[test]
fn layout_rejection_keeps_previous_layout() -> Result<(), KilnError> {
    let mut desc = TensorDescriptor::new(ElementType::F32, PartialShape::from([3, 5]), "t");
    assert_eq!(desc.size()?, 60);
    let good: Arc<dyn TensorLayout> = Arc::new(DenseTensorLayout::new(ElementType::F32, Shape::from([3, 5]), 64));
    desc.set_tensor_layout(&good)?;
    assert_eq!(desc.size()?, 64);

    let wrong_shape: Arc<dyn TensorLayout> = Arc::new(DenseTensorLayout::new(ElementType::F32, Shape::from([5, 3]), 1));
    assert!(matches!(
        desc.set_tensor_layout(&wrong_shape),
        Err(KilnError::LayoutShapeMismatch { .. })
    ));
    let wrong_type: Arc<dyn TensorLayout> = Arc::new(DenseTensorLayout::new(ElementType::F64, Shape::from([3, 5]), 1));
    assert!(matches!(
        desc.set_tensor_layout(&wrong_type),
        Err(KilnError::LayoutTypeMismatch { .. })
    ));
    let kept = desc.tensor_layout().expect("layout is still attached");
    assert!(Arc::ptr_eq(&kept, &good));

    // Descriptors do not own layouts
    drop(kept);
    drop(good);
    assert!(desc.tensor_layout().is_none());
    assert_eq!(desc.size()?, 60);
    Ok(())
}

#[test]
fn pool_offset_defaults_to_unset() {
    let mut desc = TensorDescriptor::new(ElementType::I8, PartialShape::from([4]), "t");
    assert_eq!(desc.pool_offset(), None);
    desc.set_pool_offset(128);
    assert_eq!(desc.pool_offset(), Some(128));
}
