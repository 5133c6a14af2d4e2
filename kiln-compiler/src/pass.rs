use crate::validate::validate;
use kiln_core::{Config, Graph, KilnError, NodeId};

/// Result returned by a [`Pass`] after it runs.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct PassResult {
    /// Whether the pass changed the graph
    pub changed: bool,
    /// Number of nodes rewritten or annotated by the pass
    pub rewrites: usize,
}

impl PassResult {
    /// Merges two run results, accumulating statistics.
    #[must_use]
    pub const fn merge(self, other: PassResult) -> PassResult {
        PassResult {
            changed: self.changed || other.changed,
            rewrites: self.rewrites + other.rewrites,
        }
    }

    /// Result of a pass that rewrote `rewrites` nodes
    #[must_use]
    pub const fn rewrote(rewrites: usize) -> PassResult {
        PassResult {
            changed: rewrites > 0,
            rewrites,
        }
    }
}

/// Transformation or analysis of a whole graph
pub trait Pass {
    /// Name used in logs and errors
    fn name(&self) -> &'static str;
    /// Run the pass. A failing pass may leave the graph partially rewritten.
    fn run_on_graph(&mut self, graph: &mut Graph) -> Result<PassResult, KilnError>;
}

/// Ordered list of passes
pub struct PassManager {
    passes: Vec<Box<dyn Pass>>,
    config: Config,
}

impl std::fmt::Debug for PassManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PassManager")
            .field("passes", &self.passes.iter().map(|p| p.name()).collect::<Vec<_>>())
            .field("config", &self.config)
            .finish()
    }
}

impl Default for PassManager {
    fn default() -> Self {
        Self::with_config(Config::default())
    }
}

impl PassManager {
    /// Empty pass manager with configuration loaded from environment
    #[must_use]
    pub fn new() -> Self {
        Self::with_config(Config::load())
    }

    /// Empty pass manager with given configuration
    #[must_use]
    pub const fn with_config(config: Config) -> Self {
        Self {
            passes: Vec::new(),
            config,
        }
    }

    /// Append pass, passes run in registration order
    pub fn register_pass(&mut self, pass: impl Pass + 'static) -> &mut Self {
        self.passes.push(Box::new(pass));
        self
    }

    /// Names of registered passes in order
    #[must_use]
    pub fn pass_names(&self) -> Vec<&'static str> {
        self.passes.iter().map(|p| p.name()).collect()
    }

    /// Run all passes over graph. Stops at the first failing pass,
    /// changes made by earlier passes are kept.
    pub fn run(&mut self, graph: &mut Graph) -> Result<PassResult, KilnError> {
        let mut total = PassResult::default();
        for pass in &mut self.passes {
            let before = graph.len();
            let result = pass.run_on_graph(graph)?;
            if self.config.debug_passes() {
                log::debug!(
                    "{}: changed {}, {} rewrites, {before} -> {} nodes",
                    pass.name(),
                    result.changed,
                    result.rewrites,
                    graph.len()
                );
            }
            if self.config.debug_dot() {
                log::debug!("Graph after {}:\n{}", pass.name(), graph.to_dot());
            }
            if self.config.per_pass_validation {
                validate(graph).map_err(|e| KilnError::GraphValidation {
                    message: format!("after {}: {e}", pass.name()),
                })?;
            }
            total = total.merge(result);
        }
        Ok(total)
    }
}

/// Visit live nodes in topological order and replace every node for which
/// `rewrite` returns a new node. Returns number of replaced nodes.
///
/// Nodes added by `rewrite` are not visited.
pub fn rewrite_nodes(
    graph: &mut Graph,
    mut rewrite: impl FnMut(&mut Graph, NodeId) -> Result<Option<NodeId>, KilnError>,
) -> Result<usize, KilnError> {
    let mut rewrites = 0;
    for id in graph.topological_order()? {
        // Earlier replacements may have removed the node
        if !graph.contains(id) {
            continue;
        }
        if let Some(new) = rewrite(graph, id)? {
            if graph.config().debug_passes() {
                log::trace!("{} -> {}", graph.node(id)?, graph.node(new)?);
            }
            graph.replace_node(id, new)?;
            rewrites += 1;
        }
    }
    Ok(rewrites)
}
