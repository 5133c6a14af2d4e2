use kiln_core::{
    backprop, Adjoints, BinaryOp, CompareOp, Config, Constant, DescriptorState, ElementType, Graph,
    KilnError, Op, OpKind, Output, PartialShape, ReduceOp, Shape, UnaryOp,
};

fn graph() -> Graph {
    Graph::with_config(Config::default())
}

#[test]
fn invalid_input_propagates() -> Result<(), KilnError> {
    let mut g = graph();
    let x = g.parameter(ElementType::F32, [2, 3])?;
    let e = g.unary(UnaryOp::Exp, x)?;
    let s = g.reduce(ReduceOp::Sum, e, [1])?;
    let r = g.result(s)?;
    g.invalidate(e.into(), "exp overflowed")?;
    for id in [s, r] {
        let desc = g.descriptor(id.into())?;
        assert_eq!(desc.state(), DescriptorState::Invalid);
        assert!(desc.invalidity_explanation().contains("Exp_1_0"));
        assert!(matches!(desc.element_type(), Err(KilnError::InvalidTensorAccess { .. })));
    }
    // Revalidating the producer restores everything downstream
    g.revalidate(e)?;
    g.revalidate_downstream(&[s].into())?;
    assert_eq!(g.shape(r)?, &Shape::from([2]));
    Ok(())
}

#[test]
fn revalidation_is_idempotent() -> Result<(), KilnError> {
    let mut g = graph();
    let x = g.parameter(ElementType::F64, [4, 5])?;
    let y = g.parameter(ElementType::F64, [4, 5])?;
    let d = g.binary(BinaryOp::Divide, x, y)?;
    let c = g.compare(CompareOp::Greater, d, x)?;
    for id in [d, c] {
        assert!(!g.revalidate(id)?);
    }
    Ok(())
}

#[test]
fn malformed_nodes_name_themselves() {
    let mut g = graph();
    let x = g.parameter(ElementType::F32, [2, 3]).unwrap();
    let y = g.parameter(ElementType::F32, [3, 2]).unwrap();
    let z = g.parameter(ElementType::I32, [2, 3]).unwrap();
    match g.binary(BinaryOp::Add, x, y) {
        Err(KilnError::IncompatibleShapes { context, .. }) => assert!(context.starts_with("Add_")),
        other => panic!("expected shape error, got {other:?}"),
    }
    assert!(matches!(
        g.binary(BinaryOp::Multiply, x, z),
        Err(KilnError::IncompatibleElementTypes { .. })
    ));
    assert!(matches!(
        g.broadcast(x, [3, 2, 4], [0]),
        Err(KilnError::NodeValidation { .. })
    ));
    assert!(matches!(g.reshape(x, [7]), Err(KilnError::NodeValidation { .. })));
    // Failed construction leaves no trace
    assert_eq!(g.len(), 3);
}

#[test]
fn dynamic_rank_flows_through() -> Result<(), KilnError> {
    let mut g = graph();
    let x = g.parameter(ElementType::F32, PartialShape::dynamic())?;
    let n = g.unary(UnaryOp::Negative, x)?;
    let s = g.reduce(ReduceOp::Sum, n, [0, 1])?;
    let desc = g.descriptor(s.into())?;
    assert!(desc.is_valid());
    assert!(!desc.partial_shape()?.is_rank_static());
    Ok(())
}

#[test]
fn v1_reduction_keeps_dims() -> Result<(), KilnError> {
    let mut g = graph();
    let x = g.parameter(ElementType::Boolean, [2, 3, 4])?;
    let axes = g.constant(Constant::i64_vector(&[1]))?;
    let any = g.reduce_v1(ReduceOp::Any, x, axes, true)?;
    assert_eq!(g.node(any)?.op().kind(), OpKind::ReduceLogicalOr);
    assert_eq!(g.shape(any)?, &Shape::from([2, 1, 4]));
    assert_eq!(g.element_type(any)?, ElementType::Boolean);
    Ok(())
}

#[test]
fn backprop_sums_fan_out() -> Result<(), KilnError> {
    let mut g = graph();
    let x = g.parameter(ElementType::F32, [2, 3])?;
    // x is read by three consumers
    let a = g.binary(BinaryOp::Add, x, x)?;
    let m = g.binary(BinaryOp::Multiply, a, x)?;
    let grads = backprop(&mut g, m, &[Output::from(x)])?;
    let dx = grads[0];
    assert_eq!(g.shape(dx)?, &Shape::from([2, 3]));
    // Second and third contributions are summed
    let sum = g.node(dx.node)?;
    assert_eq!(sum.op(), &Op::Binary(BinaryOp::Add));
    let inner = g.node(sum.inputs()[0].node)?;
    assert_eq!(inner.op(), &Op::Binary(BinaryOp::Add));
    Ok(())
}

#[test]
fn acos_adjoint_structure() -> Result<(), KilnError> {
    let mut g = graph();
    let x = g.parameter(ElementType::F32, [5])?;
    let y = g.unary(UnaryOp::Acos, x)?;
    let grads = backprop(&mut g, y, &[x.into()])?;
    // -(d / sqrt(1 - x*x))
    let neg = g.node(grads[0].node)?;
    assert_eq!(neg.op(), &Op::Unary(UnaryOp::Negative));
    let div = g.node(neg.inputs()[0].node)?;
    assert_eq!(div.op(), &Op::Binary(BinaryOp::Divide));
    let sqrt = g.node(div.inputs()[1].node)?;
    assert_eq!(sqrt.op(), &Op::Unary(UnaryOp::Sqrt));
    Ok(())
}

#[test]
fn explicit_root_deltas() -> Result<(), KilnError> {
    let mut g = graph();
    let x = g.parameter(ElementType::F32, [3, 4])?;
    let s = g.reduce(ReduceOp::Sum, x, [1])?;
    let seed = g.parameter(ElementType::F32, [3])?;
    let mut adjoints = Adjoints::new(&mut g, &[s.into()], &[seed.into()])?;
    let dx = adjoints.delta(&mut g, x.into())?;
    assert_eq!(g.shape(dx)?, &Shape::from([3, 4]));
    assert!(matches!(g.node(dx.node)?.op(), Op::Broadcast { .. }));
    let wrong = g.parameter(ElementType::F32, [4])?;
    assert!(Adjoints::new(&mut g, &[s.into()], &[wrong.into()]).is_err());
    Ok(())
}

#[test]
fn broadcast_adjoint_sums_broadcast_axes() -> Result<(), KilnError> {
    let mut g = graph();
    let x = g.parameter(ElementType::F32, [5, 6])?;
    let b = g.broadcast(x, [3, 5, 4, 6], [0, 2])?;
    let grads = backprop(&mut g, b, &[x.into()])?;
    let sum = g.node(grads[0].node)?;
    assert_eq!(
        sum.op(),
        &Op::Reduce {
            op: ReduceOp::Sum,
            axes: [0, 2].into()
        }
    );
    assert_eq!(g.shape(grads[0])?, &Shape::from([5, 6]));
    Ok(())
}

#[test]
fn oversized_shapes_are_rejected() -> Result<(), KilnError> {
    let mut g = graph();
    let x = g.parameter(ElementType::F32, [2])?;
    assert!(matches!(
        g.reshape(x, [usize::MAX, 2]),
        Err(KilnError::NodeValidation { .. })
    ));
    let pattern = g.constant(Constant::i64_vector(&[-1, i64::MAX, 4]))?;
    assert!(matches!(
        g.reshape_v1(x, pattern),
        Err(KilnError::NodeValidation { .. })
    ));
    // Element count fits, byte size does not
    let big = 1usize << 30;
    assert!(matches!(
        g.parameter(ElementType::F64, [big, big, 4]),
        Err(KilnError::NodeValidation { .. })
    ));
    let nodes = g.len();
    assert!(g.broadcast(x, [1 << 40, 1 << 40, 2], [0, 1]).is_err());
    assert_eq!(g.len(), nodes);
    Ok(())
}

#[test]
fn cacheable_parameters() -> Result<(), KilnError> {
    let mut g = graph();
    let w = g.cacheable_parameter(ElementType::F32, [3])?;
    let x = g.parameter(ElementType::F32, [3])?;
    let m = g.binary(BinaryOp::Multiply, w, x)?;
    g.result(m)?;
    assert!(matches!(g.node(w)?.op(), Op::Parameter { cacheable: true, .. }));
    assert!(matches!(g.node(x)?.op(), Op::Parameter { cacheable: false, .. }));
    assert_eq!(g.parameters(), &[w, x]);
    let dot = g.to_dot();
    assert!(dot.contains("Parameter({3}, f32, cacheable)"));
    assert_eq!(dot.matches("cacheable").count(), 1);
    Ok(())
}
