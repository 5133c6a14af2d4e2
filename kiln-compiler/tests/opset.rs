use kiln_compiler::{OpsetDowngrade, OpsetUpgrade, Pass};
use kiln_core::{
    AutoBroadcast, AxisSet, Config, Constant, ElementType, Graph, KilnError, NodeId, Op, OpKind, ReduceOp, Shape,
};

fn graph() -> Graph {
    Graph::with_config(Config::default())
}

// Node read by result r
fn producer(g: &Graph, r: NodeId) -> Result<NodeId, KilnError> {
    Ok(g.node(r)?.inputs()[0].node)
}

fn i64_values(g: &Graph, node: NodeId, slot: usize) -> Result<Vec<i64>, KilnError> {
    let input = g.node(node)?.inputs()[slot];
    Ok(g.constant_value(input).map(Constant::to_i64_vec).unwrap_or_default())
}

#[test]
fn broadcast_v0_upgrades_to_explicit_v1() -> Result<(), KilnError> {
    let mut g = graph();
    let arg = g.parameter(ElementType::F32, [5, 6])?;
    let b = g.broadcast(arg, [3, 5, 4, 6], [0, 2])?;
    let r = g.result(b)?;
    OpsetUpgrade.run_on_graph(&mut g)?;

    let b1 = producer(&g, r)?;
    let node = g.node(b1)?;
    assert_eq!(node.op().kind().name(), "Broadcast");
    assert_eq!(node.op().version(), 1);
    assert_eq!(
        node.op(),
        &Op::BroadcastV1 {
            spec: AutoBroadcast::Explicit
        }
    );
    assert_eq!(node.inputs()[0].node, arg);
    assert_eq!(i64_values(&g, b1, 1)?, vec![3, 5, 4, 6]);
    assert_eq!(i64_values(&g, b1, 2)?, vec![1, 3]);
    assert_eq!(g.broadcast_axes(b1)?, Some(AxisSet::from([0, 2])));
    assert_eq!(g.shape(b1)?, &Shape::from([3, 5, 4, 6]));
    Ok(())
}

#[test]
fn broadcast_v1_downgrades_to_v0() -> Result<(), KilnError> {
    let mut g = graph();
    let arg = g.parameter(ElementType::F32, [1, 2, 3])?;
    let target = g.constant(Constant::i64_vector(&[3, 1, 4, 2, 3]))?;
    let mapping = g.constant(Constant::i64_vector(&[1, 3, 4]))?;
    let b = g.broadcast_v1(arg, target, Some(mapping.into()))?;
    let r = g.result(b)?;
    OpsetDowngrade.run_on_graph(&mut g)?;

    let b0 = producer(&g, r)?;
    let node = g.node(b0)?;
    assert_eq!(node.op().version(), 0);
    assert_eq!(
        node.op(),
        &Op::Broadcast {
            shape: Shape::from([3, 1, 4, 2, 3]),
            axes: AxisSet::from([0, 2]),
        }
    );
    assert_eq!(node.inputs().len(), 1);
    // The shape constants are no longer referenced
    assert!(!g.contains(target));
    assert!(!g.contains(mapping));
    Ok(())
}

#[test]
fn numpy_broadcast_squeezes_stretched_dimensions() -> Result<(), KilnError> {
    let mut g = graph();
    let arg = g.parameter(ElementType::I32, [3, 1])?;
    let target = g.constant(Constant::i64_vector(&[2, 3, 4]))?;
    let b = g.broadcast_v1(arg, target, None)?;
    let r = g.result(b)?;
    assert_eq!(g.broadcast_axes(b)?, Some(AxisSet::from([0, 2])));
    OpsetDowngrade.run_on_graph(&mut g)?;

    let b0 = producer(&g, r)?;
    assert_eq!(
        g.node(b0)?.op(),
        &Op::Broadcast {
            shape: Shape::from([2, 3, 4]),
            axes: AxisSet::from([0, 2]),
        }
    );
    let squeeze = producer(&g, b0)?;
    assert_eq!(
        g.node(squeeze)?.op(),
        &Op::Reshape {
            shape: Shape::from([3])
        }
    );
    assert_eq!(producer(&g, squeeze)?, arg);
    Ok(())
}

#[test]
fn reductions_round_trip() -> Result<(), KilnError> {
    for op in [ReduceOp::Sum, ReduceOp::All, ReduceOp::Any] {
        let mut g = graph();
        let et = if op == ReduceOp::Sum {
            ElementType::F64
        } else {
            ElementType::Boolean
        };
        let x = g.parameter(et, [2, 3, 4])?;
        let red = g.reduce(op, x, [0, 2])?;
        let r = g.result(red)?;
        let original = g.node(red)?.op().clone();

        OpsetUpgrade.run_on_graph(&mut g)?;
        let up = producer(&g, r)?;
        assert_eq!(g.node(up)?.op(), &Op::ReduceV1 { op, keep_dims: false });
        assert_eq!(i64_values(&g, up, 1)?, vec![0, 2]);

        OpsetDowngrade.run_on_graph(&mut g)?;
        let down = producer(&g, r)?;
        assert_eq!(g.node(down)?.op(), &original);
        assert_eq!(g.shape(down)?, &Shape::from([3]));
    }
    Ok(())
}

#[test]
fn keep_dims_downgrade_restores_unit_dimensions() -> Result<(), KilnError> {
    let mut g = graph();
    let x = g.parameter(ElementType::F32, [2, 3, 4])?;
    let axes = g.constant(Constant::i64_vector(&[1]))?;
    let s = g.reduce_v1(ReduceOp::Sum, x, axes, true)?;
    let r = g.result(s)?;
    OpsetDowngrade.run_on_graph(&mut g)?;

    let reshape = producer(&g, r)?;
    assert_eq!(
        g.node(reshape)?.op(),
        &Op::Reshape {
            shape: Shape::from([2, 1, 4])
        }
    );
    let sum = producer(&g, reshape)?;
    assert_eq!(g.node(sum)?.op().kind(), OpKind::Sum);
    assert_eq!(g.shape(sum)?, &Shape::from([2, 4]));
    Ok(())
}

#[test]
fn reshape_round_trips_in_both_directions() -> Result<(), KilnError> {
    let mut g = graph();
    let x = g.parameter(ElementType::U8, [4, 6])?;
    let pattern = g.constant(Constant::i64_vector(&[3, -1]))?;
    let v1 = g.reshape_v1(x, pattern)?;
    let r = g.result(v1)?;

    OpsetDowngrade.run_on_graph(&mut g)?;
    let v0 = producer(&g, r)?;
    assert_eq!(
        g.node(v0)?.op(),
        &Op::Reshape {
            shape: Shape::from([3, 8])
        }
    );
    OpsetUpgrade.run_on_graph(&mut g)?;
    let v1 = producer(&g, r)?;
    assert_eq!(g.node(v1)?.op(), &Op::ReshapeV1);
    // The inferred dimension is now explicit
    assert_eq!(i64_values(&g, v1, 1)?, vec![3, 8]);
    assert_eq!(g.shape(v1)?, &Shape::from([3, 8]));
    Ok(())
}

#[test]
fn broadcast_upgrade_downgrade_is_identity() -> Result<(), KilnError> {
    let mut g = graph();
    let arg = g.parameter(ElementType::F16, [4])?;
    let b = g.broadcast(arg, [2, 4, 3], [0, 2])?;
    let r = g.result(b)?;
    let original = g.node(b)?.op().clone();
    OpsetUpgrade.run_on_graph(&mut g)?;
    OpsetDowngrade.run_on_graph(&mut g)?;
    let back = producer(&g, r)?;
    assert_eq!(g.node(back)?.op(), &original);
    assert_eq!(g.shape(back)?, &Shape::from([2, 4, 3]));
    Ok(())
}

#[test]
fn non_constant_inputs_fail_downgrade() -> Result<(), KilnError> {
    let mut g = graph();
    let x = g.parameter(ElementType::F32, [2, 3])?;
    let axes = g.parameter(ElementType::I64, [1])?;
    let s = g.reduce_v1(ReduceOp::Sum, x, axes, false)?;
    g.result(s)?;
    match OpsetDowngrade.run_on_graph(&mut g) {
        Err(KilnError::Migration { node, .. }) => assert_eq!(node, g.node(s)?.name()),
        other => panic!("expected migration error, got {other:?}"),
    }

    let mut g = graph();
    let x = g.parameter(ElementType::F32, [2, 3])?;
    let target = g.parameter(ElementType::I64, [3])?;
    let b = g.broadcast_v1(x, target, None)?;
    g.result(b)?;
    assert!(matches!(
        OpsetDowngrade.run_on_graph(&mut g),
        Err(KilnError::Migration { .. })
    ));
    Ok(())
}

#[test]
fn unrelated_nodes_are_untouched() -> Result<(), KilnError> {
    let mut g = graph();
    let x = g.parameter(ElementType::F32, [2])?;
    let e = g.unary(kiln_core::UnaryOp::Exp, x)?;
    g.result(e)?;
    let ids: Vec<NodeId> = g.ids().collect();
    assert!(!OpsetUpgrade.run_on_graph(&mut g)?.changed);
    assert!(!OpsetDowngrade.run_on_graph(&mut g)?.changed);
    assert_eq!(g.ids().collect::<Vec<_>>(), ids);
    Ok(())
}

// Element type and shape of the only output of node
fn output_type(g: &Graph, node: NodeId) -> Result<(ElementType, kiln_core::PartialShape), KilnError> {
    let desc = g.descriptor(node.into())?;
    Ok((desc.element_type()?, desc.partial_shape()?.clone()))
}

#[test]
fn explicit_broadcast_v1_downgrade_upgrade_is_identity() -> Result<(), KilnError> {
    let mut g = graph();
    let arg = g.parameter(ElementType::F32, [1, 2, 3])?;
    let target = g.constant(Constant::i64_vector(&[3, 1, 4, 2, 3]))?;
    let mapping = g.constant(Constant::i64_vector(&[1, 3, 4]))?;
    let b = g.broadcast_v1(arg, target, Some(mapping.into()))?;
    let r = g.result(b)?;
    let original = g.node(b)?.op().clone();
    let before = output_type(&g, b)?;

    OpsetDowngrade.run_on_graph(&mut g)?;
    OpsetUpgrade.run_on_graph(&mut g)?;
    let back = producer(&g, r)?;
    assert_eq!(g.node(back)?.op(), &original);
    assert_eq!(g.node(back)?.inputs()[0].node, arg);
    assert_eq!(i64_values(&g, back, 1)?, vec![3, 1, 4, 2, 3]);
    assert_eq!(i64_values(&g, back, 2)?, vec![1, 3, 4]);
    assert_eq!(g.broadcast_axes(back)?, Some(AxisSet::from([0, 2])));
    assert_eq!(output_type(&g, back)?, before);
    assert_eq!(g.shape(back)?, &Shape::from([3, 1, 4, 2, 3]));
    Ok(())
}

#[test]
fn reduce_v1_downgrade_upgrade_is_identity() -> Result<(), KilnError> {
    for op in [ReduceOp::Sum, ReduceOp::All, ReduceOp::Any] {
        let mut g = graph();
        let et = if op == ReduceOp::Sum {
            ElementType::I32
        } else {
            ElementType::Boolean
        };
        let x = g.parameter(et, [2, 3, 4])?;
        let axes = g.constant(Constant::i64_vector(&[0, 2]))?;
        let red = g.reduce_v1(op, x, axes, false)?;
        let r = g.result(red)?;
        let before = output_type(&g, red)?;

        OpsetDowngrade.run_on_graph(&mut g)?;
        let down = producer(&g, r)?;
        assert_eq!(
            g.node(down)?.op(),
            &Op::Reduce {
                op,
                axes: AxisSet::from([0, 2])
            }
        );
        OpsetUpgrade.run_on_graph(&mut g)?;
        let up = producer(&g, r)?;
        assert_eq!(g.node(up)?.op(), &Op::ReduceV1 { op, keep_dims: false });
        assert_eq!(g.node(up)?.inputs()[0].node, x);
        assert_eq!(i64_values(&g, up, 1)?, vec![0, 2]);
        assert_eq!(output_type(&g, up)?, before);
        assert_eq!(g.shape(up)?, &Shape::from([3]));
    }
    Ok(())
}
