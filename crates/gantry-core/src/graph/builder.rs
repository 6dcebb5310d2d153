use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashMap, HashSet, VecDeque};
use std::fmt;

use log::debug;

use crate::config::module::{ModuleSet, ServiceDefinition};
use crate::graph::error::{BlockReason, BlockedService, GraphError};

/// Lifecycle position of one node in the current (or last) run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeState {
    Pending,
    Instantiated,
    Started,
    Stopped,
    Failed,
}

impl fmt::Display for NodeState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            NodeState::Pending => "PENDING",
            NodeState::Instantiated => "INSTANTIATED",
            NodeState::Started => "STARTED",
            NodeState::Stopped => "STOPPED",
            NodeState::Failed => "FAILED",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone)]
pub struct ServiceNode {
    pub definition: ServiceDefinition,
    /// Services this node references, deduplicated, in reference order.
    /// Externally registered instances are not listed.
    pub depends_on: Vec<String>,
    /// Services that reference this node, in declaration order.
    pub dependents: Vec<String>,
}

impl ServiceNode {
    pub fn name(&self) -> &str {
        &self.definition.name
    }
}

/// Enabled services plus the order they start in.
///
/// The start order is a topological order of the reference graph; among
/// services whose dependencies are all satisfied, the one declared first
/// goes first, so identical inputs always give identical orders.
#[derive(Debug, Clone)]
pub struct DependencyGraph {
    nodes: Vec<ServiceNode>,
    index: HashMap<String, usize>,
    order: Vec<usize>,
}

impl DependencyGraph {
    /// Build the graph of `modules`. Names in `external` are instances
    /// registered by the embedding program and always resolve.
    pub fn build(modules: &ModuleSet, external: &[String]) -> Result<Self, GraphError> {
        let mut disabled = HashSet::new();
        let mut nodes = Vec::new();
        let mut index = HashMap::new();
        for definition in modules.services() {
            if !definition.enabled {
                debug!("Service '{}' is disabled", definition.name);
                disabled.insert(definition.name.clone());
                continue;
            }
            if external.contains(&definition.name) {
                return Err(GraphError::ExternalConflict {
                    service: definition.name.clone(),
                });
            }
            index.insert(definition.name.clone(), nodes.len());
            nodes.push(ServiceNode {
                definition: definition.clone(),
                depends_on: Vec::new(),
                dependents: Vec::new(),
            });
        }

        for i in 0..nodes.len() {
            let mut deps: Vec<String> = Vec::new();
            for target in nodes[i].definition.references() {
                if index.contains_key(&target) {
                    if !deps.contains(&target) {
                        deps.push(target);
                    }
                } else if external.contains(&target) {
                    continue;
                } else if disabled.contains(&target) {
                    return Err(GraphError::DisabledReference {
                        service: nodes[i].definition.name.clone(),
                        target,
                    });
                } else {
                    return Err(GraphError::MissingReference {
                        service: nodes[i].definition.name.clone(),
                        target,
                    });
                }
            }
            nodes[i].depends_on = deps;
        }
        for i in 0..nodes.len() {
            let name = nodes[i].definition.name.clone();
            for dep in nodes[i].depends_on.clone() {
                nodes[index[&dep]].dependents.push(name.clone());
            }
        }

        let order = stable_topological_order(&nodes, &index)?;
        let graph = Self { nodes, index, order };
        debug!("Start order: {}", graph.start_order().join(", "));
        Ok(graph)
    }

    pub fn node(&self, name: &str) -> Option<&ServiceNode> {
        self.index.get(name).map(|&i| &self.nodes[i])
    }

    /// Nodes in declaration order.
    pub fn nodes(&self) -> &[ServiceNode] {
        &self.nodes
    }

    /// Nodes in start order.
    pub fn ordered(&self) -> impl DoubleEndedIterator<Item = &ServiceNode> + '_ {
        self.order.iter().map(move |&i| &self.nodes[i])
    }

    pub fn start_order(&self) -> Vec<String> {
        self.ordered().map(|n| n.definition.name.clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

/// Kahn's algorithm with a min-heap on declaration index.
fn stable_topological_order(nodes: &[ServiceNode], index: &HashMap<String, usize>) -> Result<Vec<usize>, GraphError> {
    let mut remaining: Vec<usize> = nodes.iter().map(|n| n.depends_on.len()).collect();
    let mut ready: BinaryHeap<Reverse<usize>> = remaining
        .iter()
        .enumerate()
        .filter(|(_, count)| **count == 0)
        .map(|(i, _)| Reverse(i))
        .collect();
    let mut order = Vec::with_capacity(nodes.len());
    while let Some(Reverse(i)) = ready.pop() {
        order.push(i);
        for dependent in &nodes[i].dependents {
            let j = index[dependent];
            remaining[j] -= 1;
            if remaining[j] == 0 {
                ready.push(Reverse(j));
            }
        }
    }
    if order.len() == nodes.len() {
        return Ok(order);
    }

    let placed: HashSet<usize> = order.iter().copied().collect();
    let blocked = (0..nodes.len())
        .filter(|i| !placed.contains(i))
        .map(|i| BlockedService {
            service: nodes[i].definition.name.clone(),
            reason: match find_cycle(nodes, index, &placed, i) {
                Some(cycle) => BlockReason::Cyclic { cycle },
                None => BlockReason::WaitingOn(
                    nodes[i]
                        .depends_on
                        .iter()
                        .filter(|d| !placed.contains(&index[*d]))
                        .cloned()
                        .collect(),
                ),
            },
        })
        .collect();
    Err(GraphError::Unresolvable { blocked })
}

/// Shortest path from `start` back to itself through unplaced nodes.
fn find_cycle(
    nodes: &[ServiceNode],
    index: &HashMap<String, usize>,
    placed: &HashSet<usize>,
    start: usize,
) -> Option<Vec<String>> {
    let mut parent: HashMap<usize, usize> = HashMap::new();
    let mut queue = VecDeque::from([start]);
    let mut seen = HashSet::from([start]);
    while let Some(current) = queue.pop_front() {
        for dep in &nodes[current].depends_on {
            let next = index[dep];
            if placed.contains(&next) {
                continue;
            }
            if next == start {
                let mut path = vec![start];
                let mut at = current;
                while at != start {
                    path.push(at);
                    at = parent[&at];
                }
                path[1..].reverse();
                path.push(start);
                return Some(path.into_iter().map(|i| nodes[i].definition.name.clone()).collect());
            }
            if seen.insert(next) {
                parent.insert(next, current);
                queue.push_back(next);
            }
        }
    }
    None
}
