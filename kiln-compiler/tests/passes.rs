use kiln_compiler::{
    validate, AssignLayout, MemoryLayout, OpsetDowngrade, OpsetUpgrade, Pass, PassManager, PassResult, ValidateGraph,
};
use kiln_core::{BinaryOp, Config, ElementType, Graph, KilnError, Op, ReduceOp, TensorLayout, UnaryOp};
use std::sync::{Arc, Mutex};

fn graph() -> Graph {
    Graph::with_config(Config::default())
}

struct Record {
    name: &'static str,
    log: Arc<Mutex<Vec<&'static str>>>,
}

impl Pass for Record {
    fn name(&self) -> &'static str {
        self.name
    }

    fn run_on_graph(&mut self, _graph: &mut Graph) -> Result<PassResult, KilnError> {
        self.log.lock().unwrap().push(self.name);
        Ok(PassResult::default())
    }
}

struct Fail;

impl Pass for Fail {
    fn name(&self) -> &'static str {
        "Fail"
    }

    fn run_on_graph(&mut self, _graph: &mut Graph) -> Result<PassResult, KilnError> {
        Err(KilnError::GraphValidation {
            message: "fail".into(),
        })
    }
}

#[test]
fn passes_run_in_registration_order() -> Result<(), KilnError> {
    let log = Arc::new(Mutex::new(Vec::new()));
    let mut pm = PassManager::with_config(Config::default());
    for name in ["first", "second", "third"] {
        pm.register_pass(Record {
            name,
            log: log.clone(),
        });
    }
    assert_eq!(pm.pass_names(), ["first", "second", "third"]);
    pm.run(&mut graph())?;
    assert_eq!(*log.lock().unwrap(), ["first", "second", "third"]);
    Ok(())
}

#[test]
fn failing_pass_stops_the_pipeline() {
    let log = Arc::new(Mutex::new(Vec::new()));
    let mut pm = PassManager::with_config(Config::default());
    pm.register_pass(Record {
        name: "before",
        log: log.clone(),
    })
    .register_pass(Fail)
    .register_pass(Record {
        name: "after",
        log: log.clone(),
    });
    assert!(pm.run(&mut graph()).is_err());
    assert_eq!(*log.lock().unwrap(), ["before"]);
}

#[test]
fn results_merge_across_passes() -> Result<(), KilnError> {
    let mut g = graph();
    let x = g.parameter(ElementType::F32, [2, 3])?;
    let s = g.reduce(ReduceOp::Sum, x, [1])?;
    let b = g.broadcast(s, [2, 3], [1])?;
    g.result(b)?;
    let mut pm = PassManager::with_config(Config {
        per_pass_validation: true,
        ..Config::default()
    });
    pm.register_pass(OpsetUpgrade)
        .register_pass(ValidateGraph)
        .register_pass(OpsetDowngrade);
    let result = pm.run(&mut g)?;
    assert_eq!(result, PassResult { changed: true, rewrites: 4 });
    validate(&g)
}

#[test]
fn layouts_are_owned_by_the_graph() -> Result<(), KilnError> {
    let mut g = graph();
    let x = g.parameter(ElementType::F32, [3, 5])?;
    let e = g.unary(UnaryOp::Exp, x)?;
    let r = g.result(e)?;
    let mut assign = AssignLayout::with_alignment(64);
    assert_eq!(assign.run_on_graph(&mut g)?.rewrites, 3);
    let desc = g.descriptor(e.into())?;
    let layout = desc.tensor_layout().expect("layout is attached");
    assert_eq!(layout.allocated_size(), 64);
    assert_eq!(desc.size()?, 64);
    drop(layout);
    // Still alive, the graph keeps it
    assert!(g.descriptor(r.into())?.tensor_layout().is_some());
    // Nothing changes on a second run
    assert!(!assign.run_on_graph(&mut g)?.changed);
    Ok(())
}

#[test]
fn memory_layout_assigns_aligned_offsets() -> Result<(), KilnError> {
    let mut g = graph();
    let x = g.parameter(ElementType::F32, [3])?;
    let y = g.parameter(ElementType::F32, [3])?;
    let a = g.binary(BinaryOp::Add, x, y)?;
    let r = g.result(a)?;
    let mut memory = MemoryLayout::with_alignment(16);
    memory.run_on_graph(&mut g)?;
    let offsets: Vec<Option<usize>> = [x, y, a]
        .into_iter()
        .map(|id| g.descriptor(id.into()).map(|d| d.pool_offset()))
        .collect::<Result<_, _>>()?;
    assert_eq!(offsets, [Some(0), Some(16), Some(32)]);
    assert_eq!(memory.pool_size(), 44);
    assert_eq!(g.descriptor(r.into())?.pool_offset(), None);
    Ok(())
}

#[test]
fn memory_layout_skips_unknown_sizes() -> Result<(), KilnError> {
    let mut g = graph();
    let x = g.parameter(ElementType::F32, kiln_core::PartialShape::dynamic())?;
    let y = g.parameter(ElementType::F32, [4])?;
    let e = g.unary(UnaryOp::Exp, y)?;
    let n = g.unary(UnaryOp::Negative, e)?;
    g.result(x)?;
    g.result(n)?;
    g.invalidate(e.into(), "exp overflowed")?;
    let mut memory = MemoryLayout::with_alignment(8);
    memory.run_on_graph(&mut g)?;
    assert_eq!(g.descriptor(x.into())?.pool_offset(), None);
    assert_eq!(g.descriptor(e.into())?.pool_offset(), None);
    assert_eq!(g.descriptor(n.into())?.pool_offset(), None);
    assert_eq!(g.descriptor(y.into())?.pool_offset(), Some(0));
    assert_eq!(memory.pool_size(), 16);
    Ok(())
}

#[test]
fn upgraded_graph_keeps_parameters_and_results() -> Result<(), KilnError> {
    let mut g = graph();
    let x = g.parameter(ElementType::Boolean, [4, 4])?;
    let all = g.reduce(ReduceOp::All, x, [0])?;
    let r = g.result(all)?;
    OpsetUpgrade.run_on_graph(&mut g)?;
    assert_eq!(g.parameters(), [x]);
    assert_eq!(g.results(), [r]);
    let up = g.node(r)?.inputs()[0];
    assert!(matches!(g.node(up.node)?.op(), Op::ReduceV1 { .. }));
    assert_eq!(up.index, 0);
    validate(&g)
}
