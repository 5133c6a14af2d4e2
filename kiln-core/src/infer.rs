//! Every op category shares one inference strategy, ops only pick theirs.
//!
//! Malformed inputs (axis out of range, conflicting dimensions, boolean
//! arguments to arithmetic) are errors. Inputs that are themselves invalid
//! make the outputs invalid, and values that can not be known before
//! execution (non constant shape inputs, unknown ranks) yield valid, but
//! dynamic outputs.

use crate::axes::AxisSet;
use crate::constant::Constant;
use crate::dtype::ElementType;
use crate::error::KilnError;
use crate::node::Output;
use crate::op::{AutoBroadcast, Op};
use crate::shape::{Dimension, PartialShape, Shape};
use crate::tensor::TensorDescriptor;

/// What inference sees of one input
#[derive(Debug, Clone, Copy)]
pub struct InputView<'a> {
    /// Which output is connected
    pub output: Output,
    /// Its descriptor
    pub desc: &'a TensorDescriptor,
    /// Its value, if it is produced by a constant
    pub constant: Option<&'a Constant>,
}

/// Result of inference for one output
#[derive(Debug, Clone, PartialEq)]
pub enum Inferred {
    /// Type and shape to commit
    Valid(ElementType, PartialShape),
    /// Output is invalid, with explanation
    Invalid(String),
}

/// Infer types of all outputs of `op` applied to `inputs`
pub fn infer(node: &str, op: &Op, inputs: &[InputView<'_>]) -> Result<Vec<Inferred>, KilnError> {
    if inputs.len() != op.input_arity() {
        return Err(KilnError::ArityMismatch {
            node: node.into(),
            expected: op.input_arity(),
            found: inputs.len(),
        });
    }
    if let Some((i, input)) = inputs.iter().enumerate().find(|(_, x)| !x.desc.is_valid()) {
        let explanation = format!(
            "input {i} ({}) is invalid: {}",
            input.desc.name(),
            input.desc.invalidity_explanation()
        );
        return Ok(vec![Inferred::Invalid(explanation); op.output_count()]);
    }
    let (element_type, shape) = match op {
        Op::Parameter {
            element_type,
            shape,
            ..
        } => (*element_type, shape.clone()),
        Op::Constant(c) => (c.element_type(), c.shape().into()),
        Op::Result => (
            inputs[0].desc.element_type()?,
            inputs[0].desc.partial_shape()?.clone(),
        ),
        Op::Unary(..) | Op::Binary(..) | Op::Compare(..) | Op::Reduce { .. } | Op::ReduceV1 { .. } => {
            by_capability(node, op, inputs)?
        }
        Op::Broadcast { shape, axes } => {
            let et = inputs[0].desc.element_type()?;
            (et, explicit_broadcast(node, inputs[0].desc.partial_shape()?, shape, axes)?)
        }
        Op::BroadcastV1 { spec } => broadcast_v1(node, *spec, inputs)?,
        Op::Reshape { shape } => {
            let et = inputs[0].desc.element_type()?;
            (et, reshape(node, inputs[0].desc.partial_shape()?, shape)?)
        }
        Op::ReshapeV1 => {
            check_index_input(node, &inputs[1], "pattern")?;
            let et = inputs[0].desc.element_type()?;
            let arg = inputs[0].desc.partial_shape()?;
            let shape = match inputs[1].constant {
                Some(pattern) => resolve_reshape_pattern(node, arg, &pattern.to_i64_vec())?,
                None => dynamic_from_shape_input(&inputs[1])?,
            };
            (et, shape)
        }
    };
    Ok(vec![Inferred::Valid(element_type, shape)])
}

fn reject_boolean(node: &str, element_type: ElementType) -> Result<(), KilnError> {
    if element_type == ElementType::Boolean {
        return Err(KilnError::node_validation(
            node,
            "arguments cannot have boolean element type",
        ));
    }
    Ok(())
}

// Shape and axes inputs must be integers, dynamic is accepted until resolved.
fn check_index_input(node: &str, input: &InputView<'_>, what: &str) -> Result<(), KilnError> {
    let et = input.desc.element_type()?;
    if et.is_static() && !et.is_integral() {
        return Err(KilnError::node_validation(
            node,
            format!("{what} input must have integral element type, got {et}"),
        ));
    }
    if let Some(rank) = input.desc.partial_shape()?.rank() {
        if rank > 1 {
            return Err(KilnError::node_validation(
                node,
                format!("{what} input must be a scalar or vector, got rank {rank}"),
            ));
        }
    }
    Ok(())
}

// Non constant shape input of static length n gives output of rank n.
fn dynamic_from_shape_input(input: &InputView<'_>) -> Result<PartialShape, KilnError> {
    let shape = input.desc.partial_shape()?;
    Ok(match shape.dims() {
        Some([Dimension::Known(n)]) => PartialShape::dynamic_of_rank(*n as usize),
        _ => PartialShape::dynamic(),
    })
}

/// Same element type and shape as the argument, boolean is rejected
pub fn unary_elementwise_arithmetic(
    node: &str,
    arg: &InputView<'_>,
) -> Result<(ElementType, PartialShape), KilnError> {
    let et = arg.desc.element_type()?;
    reject_boolean(node, et)?;
    Ok((et, arg.desc.partial_shape()?.clone()))
}

fn merge_args(
    node: &str,
    lhs: &InputView<'_>,
    rhs: &InputView<'_>,
) -> Result<(ElementType, PartialShape), KilnError> {
    let (l, r) = (lhs.desc.element_type()?, rhs.desc.element_type()?);
    let et = l.merge(r).ok_or_else(|| KilnError::IncompatibleElementTypes {
        context: node.into(),
        lhs: l,
        rhs: r,
    })?;
    let shape = PartialShape::merge(lhs.desc.partial_shape()?, rhs.desc.partial_shape()?)
        .map_err(|e| e.in_context(node))?;
    Ok((et, shape))
}

/// Merged element type and shape of both arguments, boolean is rejected
pub fn binary_elementwise_arithmetic(
    node: &str,
    lhs: &InputView<'_>,
    rhs: &InputView<'_>,
) -> Result<(ElementType, PartialShape), KilnError> {
    let (et, shape) = merge_args(node, lhs, rhs)?;
    reject_boolean(node, et)?;
    Ok((et, shape))
}

/// Merged shape of both arguments, boolean element type
pub fn binary_elementwise_comparison(
    node: &str,
    lhs: &InputView<'_>,
    rhs: &InputView<'_>,
) -> Result<(ElementType, PartialShape), KilnError> {
    let (_, shape) = merge_args(node, lhs, rhs)?;
    Ok((ElementType::Boolean, shape))
}

/// Shape after reducing `axes`. Unknown axes give unknown rank, unless dims are kept.
pub fn reduce_shape(
    node: &str,
    arg: &PartialShape,
    axes: Option<&AxisSet>,
    keep_dims: bool,
) -> Result<PartialShape, KilnError> {
    let Some(dims) = arg.dims() else {
        return Ok(PartialShape::dynamic());
    };
    let Some(axes) = axes else {
        return Ok(if keep_dims {
            PartialShape::dynamic_of_rank(dims.len())
        } else {
            PartialShape::dynamic()
        });
    };
    if let Some(axis) = axes.max() {
        if axis >= dims.len() {
            return Err(KilnError::AxisOutOfRange {
                context: node.into(),
                axis,
                rank: dims.len(),
            });
        }
    }
    Ok(PartialShape::ranked(dims.iter().enumerate().filter_map(
        |(a, d)| match (axes.contains(a), keep_dims) {
            (false, _) => Some(*d),
            (true, true) => Some(Dimension::Known(1)),
            (true, false) => None,
        },
    )))
}

// Elementwise ops and reductions share one strategy per capability group
fn by_capability(node: &str, op: &Op, inputs: &[InputView<'_>]) -> Result<(ElementType, PartialShape), KilnError> {
    if op.is_elementwise() {
        return if op.is_unary_elementwise_arithmetic() {
            unary_elementwise_arithmetic(node, &inputs[0])
        } else if op.is_binary_elementwise_arithmetic() {
            binary_elementwise_arithmetic(node, &inputs[0], &inputs[1])
        } else {
            binary_elementwise_comparison(node, &inputs[0], &inputs[1])
        };
    }
    if op.is_arithmetic_reduction() || op.is_logical_reduction() {
        return reduction(node, op, inputs);
    }
    Err(KilnError::node_validation(node, format!("{op} has no shared inference strategy")))
}

fn reduction(node: &str, op: &Op, inputs: &[InputView<'_>]) -> Result<(ElementType, PartialShape), KilnError> {
    let arg = &inputs[0];
    let et = arg.desc.element_type()?;
    if op.is_logical_reduction() {
        if !matches!(et, ElementType::Boolean | ElementType::Dynamic) {
            return Err(KilnError::node_validation(
                node,
                format!("input element type must be boolean, got {et}"),
            ));
        }
    } else {
        reject_boolean(node, et)?;
    }
    let (axes, keep_dims) = match op {
        Op::Reduce { axes, .. } => (Some(axes.clone()), false),
        Op::ReduceV1 { keep_dims, .. } => {
            check_index_input(node, &inputs[1], "axes")?;
            let axes = inputs[1].constant.map(Constant::axis_set_value).transpose()?;
            (axes, *keep_dims)
        }
        _ => (None, false),
    };
    let shape = reduce_shape(node, arg.desc.partial_shape()?, axes.as_ref(), keep_dims)?;
    Ok((et, shape))
}

/// Broadcast `arg` to `shape`, adding dimensions at broadcast `axes`
pub fn explicit_broadcast(
    node: &str,
    arg: &PartialShape,
    shape: &Shape,
    axes: &AxisSet,
) -> Result<PartialShape, KilnError> {
    if let Some(axis) = axes.max() {
        if axis >= shape.rank() {
            return Err(KilnError::AxisOutOfRange {
                context: node.into(),
                axis,
                rank: shape.rank(),
            });
        }
    }
    if let Some(dims) = arg.dims() {
        let kept = axes.complement(shape.rank());
        if dims.len() != kept.len() {
            return Err(KilnError::node_validation(
                node,
                format!(
                    "argument shape {arg} does not match output shape {shape} with broadcast axes {axes}"
                ),
            ));
        }
        for (d, a) in dims.iter().zip(&kept) {
            if !d.compatible(Dimension::from(shape[a])) {
                return Err(KilnError::node_validation(
                    node,
                    format!(
                        "argument shape {arg} does not match output shape {shape} at axis {a}"
                    ),
                ));
            }
        }
    }
    Ok(shape.into())
}

/// Numpy style broadcast, arg is right aligned with `target` and unit dimensions stretch
pub fn numpy_broadcast(node: &str, arg: &PartialShape, target: &Shape) -> Result<PartialShape, KilnError> {
    if let Some(dims) = arg.dims() {
        if dims.len() > target.rank() {
            return Err(KilnError::node_validation(
                node,
                format!("argument shape {arg} has higher rank than target shape {target}"),
            ));
        }
        let offset = target.rank() - dims.len();
        for (i, d) in dims.iter().enumerate() {
            let t = target[offset + i] as i64;
            if !matches!(d, Dimension::Unknown | Dimension::Known(1)) && *d != Dimension::Known(t) {
                return Err(KilnError::node_validation(
                    node,
                    format!("argument shape {arg} can not be broadcast to {target}"),
                ));
            }
        }
    }
    Ok(target.into())
}

/// Output axes that a numpy broadcast of `arg` to `target` creates, leading axes first
#[must_use]
pub fn numpy_leading_axes(arg: &Shape, target: &Shape) -> AxisSet {
    (0..target.rank().saturating_sub(arg.rank())).collect()
}

/// Output axes where a unit dimension of `arg` is stretched
#[must_use]
pub fn numpy_stretched_axes(arg: &Shape, target: &Shape) -> AxisSet {
    let offset = target.rank().saturating_sub(arg.rank());
    arg.iter()
        .enumerate()
        .filter(|(i, d)| *d == 1 && target[offset + i] != 1)
        .map(|(i, _)| offset + i)
        .collect()
}

fn broadcast_v1(
    node: &str,
    spec: AutoBroadcast,
    inputs: &[InputView<'_>],
) -> Result<(ElementType, PartialShape), KilnError> {
    let et = inputs[0].desc.element_type()?;
    let arg = inputs[0].desc.partial_shape()?;
    check_index_input(node, &inputs[1], "target shape")?;
    let Some(target) = inputs[1].constant else {
        return Ok((et, dynamic_from_shape_input(&inputs[1])?));
    };
    let target = target.shape_value().map_err(|e| e.in_context(node))?;
    let shape = match spec {
        AutoBroadcast::Numpy => numpy_broadcast(node, arg, &target)?,
        AutoBroadcast::Explicit => {
            check_index_input(node, &inputs[2], "axes mapping")?;
            match inputs[2].constant {
                Some(mapping) => {
                    let axes = broadcast_axes_from_mapping(node, &mapping.to_i64_vec(), target.rank())?;
                    explicit_broadcast(node, arg, &target, &axes)?
                }
                None => target.into(),
            }
        }
    };
    Ok((et, shape))
}

/// Convert axes mapping of version 1 broadcast to broadcast axes of version 0.
/// Mapping must be strictly increasing and in range.
pub fn broadcast_axes_from_mapping(
    node: &str,
    mapping: &[i64],
    output_rank: usize,
) -> Result<AxisSet, KilnError> {
    let mut prev = -1;
    for &m in mapping {
        if m <= prev {
            return Err(KilnError::node_validation(
                node,
                format!("axes mapping {mapping:?} is not strictly increasing"),
            ));
        }
        if m as usize >= output_rank {
            return Err(KilnError::AxisOutOfRange {
                context: node.into(),
                axis: m as usize,
                rank: output_rank,
            });
        }
        prev = m;
    }
    let mapping: AxisSet = mapping.iter().map(|m| *m as usize).collect();
    Ok(mapping.complement(output_rank))
}

/// Reshape with static output shape, element count must match static argument
pub fn reshape(node: &str, arg: &PartialShape, shape: &Shape) -> Result<PartialShape, KilnError> {
    let Some(numel) = shape.checked_numel() else {
        return Err(KilnError::node_validation(
            node,
            format!("number of elements of {shape} overflows"),
        ));
    };
    if let Ok(arg) = arg.to_shape() {
        if arg.numel() != numel {
            return Err(KilnError::node_validation(
                node,
                format!("can not reshape {arg} with {} elements to {shape}", arg.numel()),
            ));
        }
    }
    Ok(shape.into())
}

/// Resolve reshape pattern, a single `-1` is inferred from the element count of `arg`
pub fn resolve_reshape_pattern(
    node: &str,
    arg: &PartialShape,
    pattern: &[i64],
) -> Result<PartialShape, KilnError> {
    if pattern.iter().any(|d| *d < -1) || pattern.iter().filter(|d| **d == -1).count() > 1 {
        return Err(KilnError::node_validation(
            node,
            format!("invalid reshape pattern {pattern:?}"),
        ));
    }
    let Some(inferred) = pattern.iter().position(|d| *d == -1) else {
        let shape: Shape = pattern.iter().map(|d| *d as usize).collect();
        return reshape(node, arg, &shape);
    };
    let Ok(arg) = arg.to_shape() else {
        return Ok(PartialShape::ranked(pattern.iter().map(|d| match d {
            -1 => Dimension::Unknown,
            d => Dimension::Known(*d),
        })));
    };
    let known = pattern
        .iter()
        .filter(|d| **d != -1)
        .try_fold(1usize, |n, d| n.checked_mul(*d as usize))
        .ok_or_else(|| {
            KilnError::node_validation(node, format!("number of elements of pattern {pattern:?} overflows"))
        })?;
    if known == 0 || arg.numel() % known != 0 {
        return Err(KilnError::node_validation(
            node,
            format!("can not reshape {arg} with pattern {pattern:?}"),
        ));
    }
    let shape: Shape = pattern
        .iter()
        .enumerate()
        .map(|(i, d)| if i == inferred { arg.numel() / known } else { *d as usize })
        .collect();
    Ok(shape.into())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reductions_remove_or_keep_axes() {
        let arg = PartialShape::from([2, 3, 4]);
        let axes = AxisSet::from([0, 2]);
        assert_eq!(
            reduce_shape("Sum_0", &arg, Some(&axes), false).unwrap(),
            PartialShape::from([3])
        );
        assert_eq!(
            reduce_shape("Sum_0", &arg, Some(&axes), true).unwrap(),
            PartialShape::from([1, 3, 1])
        );
        assert_eq!(
            reduce_shape("Sum_0", &arg, None, true).unwrap(),
            PartialShape::dynamic_of_rank(3)
        );
        assert!(matches!(
            reduce_shape("Sum_0", &arg, Some(&AxisSet::from([3])), false),
            Err(KilnError::AxisOutOfRange { axis: 3, rank: 3, .. })
        ));
    }

    #[test]
    fn mapping_to_broadcast_axes() {
        assert_eq!(
            broadcast_axes_from_mapping("b", &[1, 3, 4], 5).unwrap(),
            AxisSet::from([0, 2])
        );
        assert!(broadcast_axes_from_mapping("b", &[3, 1], 5).is_err());
        assert!(broadcast_axes_from_mapping("b", &[5], 5).is_err());
    }

    #[test]
    fn explicit_broadcast_checks_kept_dimensions() {
        let shape = Shape::from([3, 5, 4, 6]);
        let axes = AxisSet::from([0, 2]);
        assert_eq!(
            explicit_broadcast("b", &PartialShape::from([5, 6]), &shape, &axes).unwrap(),
            PartialShape::from([3, 5, 4, 6])
        );
        assert!(explicit_broadcast("b", &PartialShape::from([6, 5]), &shape, &axes).is_err());
        assert!(explicit_broadcast("b", &PartialShape::from([5]), &shape, &axes).is_err());
    }

    #[test]
    fn numpy_axes() {
        let arg = Shape::from([1, 4]);
        let target = Shape::from([2, 3, 4]);
        assert!(numpy_broadcast("b", &(&arg).into(), &target).is_ok());
        assert_eq!(numpy_leading_axes(&arg, &target), AxisSet::from([0]));
        assert_eq!(numpy_stretched_axes(&arg, &target), AxisSet::from([1]));
        assert!(numpy_broadcast("b", &PartialShape::from([2, 4]), &target).is_err());
    }

    #[test]
    fn reshape_pattern_infers_one_dimension() {
        let arg = PartialShape::from([2, 3, 4]);
        assert_eq!(
            resolve_reshape_pattern("r", &arg, &[6, -1]).unwrap(),
            PartialShape::from([6, 4])
        );
        assert!(resolve_reshape_pattern("r", &arg, &[-1, -1]).is_err());
        assert!(resolve_reshape_pattern("r", &arg, &[5, 5]).is_err());
        assert_eq!(
            resolve_reshape_pattern("r", &PartialShape::dynamic(), &[-1, 2]).unwrap(),
            PartialShape::ranked([Dimension::Unknown, Dimension::Known(2)])
        );
    }
}
