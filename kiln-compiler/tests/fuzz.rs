use kiln_compiler::{validate, AssignLayout, MemoryLayout, OpsetDowngrade, OpsetUpgrade, Pass, ValidateGraph};
use kiln_core::{
    BinaryOp, Config, Constant, ElementType, Graph, KilnError, NodeId, ReduceOp, Shape, UnaryOp,
};
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};

const UNARY: [UnaryOp; 4] = [UnaryOp::Negative, UnaryOp::Exp, UnaryOp::Sqrt, UnaryOp::Round];
const BINARY: [BinaryOp; 4] = [BinaryOp::Add, BinaryOp::Subtract, BinaryOp::Multiply, BinaryOp::Divide];

// Random node of shape [2, 3] built from nodes in pool
fn random_node(g: &mut Graph, rng: &mut SmallRng, pool: &[NodeId]) -> Result<NodeId, KilnError> {
    let x = pool[rng.gen_range(0..pool.len())];
    let y = pool[rng.gen_range(0..pool.len())];
    Ok(match rng.gen_range(0..6) {
        0 => g.unary(UNARY[rng.gen_range(0..UNARY.len())], x)?,
        1 => g.binary(BINARY[rng.gen_range(0..BINARY.len())], x, y)?,
        2 => {
            let b = g.broadcast(x, [4, 2, 3], [0])?;
            g.reduce(ReduceOp::Sum, b, [0])?
        }
        3 => {
            let target = g.constant(Constant::i64_vector(&[2, 3, 5]))?;
            let mapping = g.constant(Constant::i64_vector(&[0, 1]))?;
            let b = g.broadcast_v1(x, target, Some(mapping.into()))?;
            let axes = g.constant(Constant::i64_vector(&[2]))?;
            g.reduce_v1(ReduceOp::Sum, b, axes, false)?
        }
        4 => {
            let r = g.reshape(x, [3, 2])?;
            let pattern = g.constant(Constant::i64_vector(&[-1, 3]))?;
            g.reshape_v1(r, pattern)?
        }
        _ => {
            let axes = g.constant(Constant::i64_vector(&[0]))?;
            let s = g.reduce_v1(ReduceOp::Sum, x, axes, true)?;
            let target = g.constant(Constant::i64_vector(&[2, 3]))?;
            g.broadcast_v1(s, target, None)?
        }
    })
}

#[test]
fn passes_keep_graph_acyclic_and_consistent() -> Result<(), KilnError> {
    let mut rng = SmallRng::seed_from_u64(420_694_206_942_069);
    for _ in 0..20 {
        let mut g = Graph::with_config(Config::default());
        let mut pool = Vec::new();
        for _ in 0..rng.gen_range(1..4) {
            pool.push(g.parameter(ElementType::F32, [2, 3])?);
        }
        for _ in 0..rng.gen_range(5..30) {
            let node = random_node(&mut g, &mut rng, &pool)?;
            pool.push(node);
        }
        let mut results = Vec::new();
        for _ in 0..rng.gen_range(1..4) {
            let x = pool[rng.gen_range(0..pool.len())];
            results.push(g.result(x)?);
        }
        validate(&g)?;

        let mut passes: Vec<Box<dyn Pass>> = vec![
            Box::new(OpsetUpgrade),
            Box::new(OpsetDowngrade),
            Box::new(AssignLayout::default()),
            Box::new(MemoryLayout::default()),
            Box::new(ValidateGraph),
        ];
        for _ in 0..8 {
            let i = rng.gen_range(0..passes.len());
            passes[i].run_on_graph(&mut g)?;
            validate(&g)?;
            assert_eq!(g.results(), results.as_slice());
            for r in &results {
                assert_eq!(g.shape(*r)?, &Shape::from([2, 3]));
                // Every result still reaches a parameter
                assert!(g.parameters().iter().any(|p| g.depends_on(*r, *p)));
            }
        }
        // Pool nodes nobody reads are dropped
        g.collect_garbage();
        validate(&g)?;
    }
    Ok(())
}
