//! Reference kernels.
//!
//! Kernels are pure functions over typed slices of one element type.
//! They never spawn threads, the interpreter hands every call one shard
//! of the output together with the [Arena] describing it.

use crate::buffer::{BufferMut, BufferRef};
use crate::scalar::{Arithmetic, Float, Scalar, Signed};
use half::{bf16, f16};
use kiln_core::{AxisSet, ElementType, KilnError, OpKind, Shape};
use std::collections::BTreeMap;

/// Execution arena a kernel call runs in
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Arena {
    /// Index of the arena
    pub index: usize,
    /// Offset of the first output element of this shard
    pub offset: usize,
}

/// Elementwise kernel with one input
pub type UnaryKernel = fn(BufferRef<'_>, BufferMut<'_>, &Arena) -> Result<(), KilnError>;
/// Elementwise kernel with two inputs
pub type BinaryKernel = fn(BufferRef<'_>, BufferRef<'_>, BufferMut<'_>, &Arena) -> Result<(), KilnError>;
/// Reduction of input with shape over axes
pub type ReduceKernel = fn(BufferRef<'_>, &Shape, &AxisSet, BufferMut<'_>) -> Result<(), KilnError>;
/// Broadcast of input to output shape along broadcast axes
pub type BroadcastKernel = fn(BufferRef<'_>, &Shape, &AxisSet, BufferMut<'_>) -> Result<(), KilnError>;
/// Copy of input to output
pub type CopyKernel = fn(BufferRef<'_>, BufferMut<'_>) -> Result<(), KilnError>;

/// Type erased kernel of one family
#[derive(Clone, Copy)]
pub enum Kernel {
    /// Unary arithmetic
    Unary(UnaryKernel),
    /// Binary arithmetic
    Binary(BinaryKernel),
    /// Comparison, output is boolean
    Compare(BinaryKernel),
    /// Reduction
    Reduce(ReduceKernel),
    /// Broadcast
    Broadcast(BroadcastKernel),
    /// Reshape and result
    Copy(CopyKernel),
}

impl std::fmt::Debug for Kernel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Kernel::Unary(..) => "Unary",
            Kernel::Binary(..) => "Binary",
            Kernel::Compare(..) => "Compare",
            Kernel::Reduce(..) => "Reduce",
            Kernel::Broadcast(..) => "Broadcast",
            Kernel::Copy(..) => "Copy",
        })
    }
}

fn mismatch(found: ElementType, expected: ElementType) -> KilnError {
    KilnError::InvalidInput {
        node: "kernel".into(),
        message: format!("buffer of {found} passed to {expected} kernel"),
    }
}

fn typed<T: Scalar>(x: BufferRef<'_>) -> Result<&[T], KilnError> {
    let found = x.element_type();
    T::slice(x).ok_or_else(|| mismatch(found, T::ELEMENT_TYPE))
}

fn typed_mut<T: Scalar>(x: BufferMut<'_>) -> Result<&mut [T], KilnError> {
    let found = x.element_type();
    T::slice_mut(x).ok_or_else(|| mismatch(found, T::ELEMENT_TYPE))
}

fn check_count(count: usize, lens: &[usize]) -> Result<(), KilnError> {
    if lens.iter().any(|len| *len < count) {
        return Err(KilnError::InvalidInput {
            node: "kernel".into(),
            message: format!("buffers of lengths {lens:?} are shorter than {count} elements"),
        });
    }
    Ok(())
}

/// Apply `f` to the first `count` elements of `x`
pub fn map<T: Scalar, U: Scalar>(
    x: &[T],
    y: &mut [U],
    count: usize,
    _arena: &Arena,
    f: impl Fn(T) -> U,
) -> Result<(), KilnError> {
    check_count(count, &[x.len(), y.len()])?;
    for (y, x) in y[..count].iter_mut().zip(&x[..count]) {
        *y = f(*x);
    }
    Ok(())
}

/// Apply `f` to the first `count` pairs of elements of `x` and `y`
pub fn zip<T: Scalar, U: Scalar>(
    x: &[T],
    y: &[T],
    z: &mut [U],
    count: usize,
    _arena: &Arena,
    f: impl Fn(T, T) -> U,
) -> Result<(), KilnError> {
    check_count(count, &[x.len(), y.len(), z.len()])?;
    for ((z, x), y) in z[..count].iter_mut().zip(&x[..count]).zip(&y[..count]) {
        *z = f(*x, *y);
    }
    Ok(())
}

/// Fold every element of `x` with `shape` into the output element it reduces to
pub fn reduce<T: Scalar>(
    x: &[T],
    shape: &Shape,
    axes: &AxisSet,
    y: &mut [T],
    init: T,
    f: impl Fn(T, T) -> T,
) -> Result<(), KilnError> {
    let res_shape = shape.remove_axes(axes);
    check_count(shape.numel(), &[x.len()])?;
    check_count(res_shape.numel(), &[y.len()])?;
    let strides = shape.strides();
    // Stride in the result of every input axis, zero for reduced axes
    let mut res_strides = vec![0; shape.rank()];
    let kept_strides = res_shape.strides();
    let mut kept = kept_strides.iter();
    for (a, stride) in res_strides.iter_mut().enumerate() {
        if !axes.contains(a) {
            *stride = kept.next().unwrap_or(0);
        }
    }
    y[..res_shape.numel()].fill(init);
    for (i, x) in x[..shape.numel()].iter().enumerate() {
        let j: usize = (0..shape.rank())
            .map(|a| (i / strides[a]) % shape[a] * res_strides[a])
            .sum();
        y[j] = f(y[j], *x);
    }
    Ok(())
}

/// Write to every element of output with `shape` the element of `x` it is broadcast from.
/// `x` has the dimensions of `shape` that are not in `axes`.
pub fn broadcast<T: Scalar>(x: &[T], shape: &Shape, axes: &AxisSet, y: &mut [T]) -> Result<(), KilnError> {
    let arg_shape = Shape::from(
        shape
            .iter()
            .enumerate()
            .map(|(a, d)| if axes.contains(a) { 1 } else { d })
            .collect::<Vec<_>>(),
    );
    check_count(arg_shape.numel(), &[x.len()])?;
    check_count(shape.numel(), &[y.len()])?;
    let strides = shape.strides();
    let arg_strides = arg_shape.strides();
    for (i, y) in y[..shape.numel()].iter_mut().enumerate() {
        let j: usize = (0..shape.rank())
            .filter(|a| !axes.contains(*a))
            .map(|a| (i / strides[a]) % shape[a] * arg_strides[a])
            .sum();
        *y = x[j];
    }
    Ok(())
}

macro_rules! unary_kernels {
    ($($name:ident<$t:ident: $bound:ident>($v:ident) -> $f:expr;)*) => {
        $(fn $name<$t: $bound>(x: BufferRef<'_>, y: BufferMut<'_>, arena: &Arena) -> Result<(), KilnError> {
            let (x, y) = (typed::<$t>(x)?, typed_mut::<$t>(y)?);
            let count = y.len();
            map(x, y, count, arena, |$v| $f)
        })*
    };
}

unary_kernels! {
    negative<T: Signed>(v) -> v.neg();
    acos<T: Float>(v) -> v.acos();
    sqrt<T: Float>(v) -> v.sqrt();
    exp<T: Float>(v) -> v.exp();
    log<T: Float>(v) -> v.ln();
    round<T: Float>(v) -> v.round();
}

macro_rules! binary_kernels {
    ($($name:ident<$t:ident: $bound:ident, $out:ty>($a:ident, $b:ident) -> $f:expr;)*) => {
        $(fn $name<$t: $bound>(x: BufferRef<'_>, y: BufferRef<'_>, z: BufferMut<'_>, arena: &Arena) -> Result<(), KilnError> {
            let (x, y, z) = (typed::<$t>(x)?, typed::<$t>(y)?, typed_mut::<$out>(z)?);
            let count = z.len();
            zip(x, y, z, count, arena, |$a, $b| $f)
        })*
    };
}

binary_kernels! {
    add<T: Arithmetic, T>(a, b) -> a.add(b);
    subtract<T: Arithmetic, T>(a, b) -> a.sub(b);
    multiply<T: Arithmetic, T>(a, b) -> a.mul(b);
    divide<T: Arithmetic, T>(a, b) -> a.div(b);
    equal<T: Scalar, bool>(a, b) -> a == b;
    not_equal<T: Scalar, bool>(a, b) -> a != b;
    less<T: Scalar, bool>(a, b) -> a < b;
    less_eq<T: Scalar, bool>(a, b) -> a <= b;
    greater<T: Scalar, bool>(a, b) -> a > b;
    greater_eq<T: Scalar, bool>(a, b) -> a >= b;
}

fn sum<T: Arithmetic>(x: BufferRef<'_>, shape: &Shape, axes: &AxisSet, y: BufferMut<'_>) -> Result<(), KilnError> {
    reduce(typed::<T>(x)?, shape, axes, typed_mut::<T>(y)?, T::zero(), T::add)
}

fn all(x: BufferRef<'_>, shape: &Shape, axes: &AxisSet, y: BufferMut<'_>) -> Result<(), KilnError> {
    reduce(typed::<bool>(x)?, shape, axes, typed_mut::<bool>(y)?, true, |a, b| a && b)
}

fn any(x: BufferRef<'_>, shape: &Shape, axes: &AxisSet, y: BufferMut<'_>) -> Result<(), KilnError> {
    reduce(typed::<bool>(x)?, shape, axes, typed_mut::<bool>(y)?, false, |a, b| a || b)
}

fn broadcast_kernel<T: Scalar>(x: BufferRef<'_>, shape: &Shape, axes: &AxisSet, y: BufferMut<'_>) -> Result<(), KilnError> {
    broadcast(typed::<T>(x)?, shape, axes, typed_mut::<T>(y)?)
}

fn copy<T: Scalar>(x: BufferRef<'_>, y: BufferMut<'_>) -> Result<(), KilnError> {
    let (x, y) = (typed::<T>(x)?, typed_mut::<T>(y)?);
    check_count(y.len(), &[x.len()])?;
    let n = y.len();
    y.copy_from_slice(&x[..n]);
    Ok(())
}

/// Kernels keyed by op kind and element type
#[derive(Debug, Clone, Default)]
pub struct KernelRegistry {
    kernels: BTreeMap<(OpKind, ElementType), Kernel>,
}

macro_rules! register {
    ($registry:ident, $family:ident, [$($kind:ident => $f:ident),*], $types:tt) => {
        $(register!(@types $registry, $family, $kind, $f, $types);)*
    };
    (@types $registry:ident, $family:ident, $kind:ident, $f:ident, [$($t:ty),*]) => {
        $($registry.register(OpKind::$kind, <$t as Scalar>::ELEMENT_TYPE, Kernel::$family($f::<$t>));)*
    };
}

impl KernelRegistry {
    /// Empty registry
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with reference kernels for every op kind and element type they support
    #[must_use]
    pub fn reference() -> Self {
        let mut r = Self::new();
        register!(r, Unary, [Negative => negative], [bf16, f16, f32, f64, i8, i16, i32, i64]);
        register!(r, Unary, [Acos => acos, Sqrt => sqrt, Exp => exp, Log => log, Round => round], [bf16, f16, f32, f64]);
        register!(
            r,
            Binary,
            [Add => add, Subtract => subtract, Multiply => multiply, Divide => divide],
            [bf16, f16, f32, f64, i8, i16, i32, i64, u8, u16, u32, u64]
        );
        register!(
            r,
            Compare,
            [Equal => equal, NotEqual => not_equal, Less => less, LessEq => less_eq, Greater => greater, GreaterEq => greater_eq],
            [bool, bf16, f16, f32, f64, i8, i16, i32, i64, u8, u16, u32, u64]
        );
        register!(
            r,
            Reduce,
            [Sum => sum, ReduceSum => sum],
            [bf16, f16, f32, f64, i8, i16, i32, i64, u8, u16, u32, u64]
        );
        for kind in [OpKind::All, OpKind::ReduceLogicalAnd] {
            r.register(kind, ElementType::Boolean, Kernel::Reduce(all));
        }
        for kind in [OpKind::Any, OpKind::ReduceLogicalOr] {
            r.register(kind, ElementType::Boolean, Kernel::Reduce(any));
        }
        register!(
            r,
            Broadcast,
            [Broadcast => broadcast_kernel],
            [bool, bf16, f16, f32, f64, i8, i16, i32, i64, u8, u16, u32, u64]
        );
        register!(
            r,
            Copy,
            [Reshape => copy, Result => copy],
            [bool, bf16, f16, f32, f64, i8, i16, i32, i64, u8, u16, u32, u64]
        );
        r
    }

    /// Add or replace kernel
    pub fn register(&mut self, kind: OpKind, element_type: ElementType, kernel: Kernel) {
        self.kernels.insert((kind, element_type), kernel);
    }

    /// Find kernel
    pub fn lookup(&self, kind: OpKind, element_type: ElementType) -> Result<Kernel, KilnError> {
        self.kernels
            .get(&(kind, element_type))
            .copied()
            .ok_or(KilnError::UnsupportedElementType { kind, element_type })
    }

    /// Number of registered kernels
    #[must_use]
    pub fn len(&self) -> usize {
        self.kernels.len()
    }

    /// Is the registry empty?
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.kernels.is_empty()
    }
}
