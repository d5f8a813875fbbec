//! Signal graph topology
//!
//! Collects block declarations and port-to-port connections, checks that the
//! wiring is complete and hands the whole edge set to the device in a single
//! commit. After commit the wiring is frozen.

use std::collections::{HashMap, HashSet};
use std::fmt;

use tracing::{debug, info};

use super::device::Device;
use super::errors::{RadioResult, TopologyError};
use super::ports::{BlockId, BlockKind, PortDirection, PortRef};

/// Lifecycle of a topology
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TopologyState {
    /// Blocks and connections may still be added
    Declared,
    /// Routing is locked in on the device
    Committed,
    /// Committed and the radios were told to stream
    Streaming,
    /// Terminal
    Stopped,
}

/// Directed edge from an output port to an input port
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Connection {
    pub src: BlockId,
    pub src_port: usize,
    pub dst: BlockId,
    pub dst_port: usize,
    /// Marks the edge that completes a cycle in the graph
    pub is_loop_closing: bool,
}

impl Connection {
    pub fn source(&self) -> PortRef {
        self.src.port(PortDirection::Output, self.src_port)
    }

    pub fn destination(&self) -> PortRef {
        self.dst.port(PortDirection::Input, self.dst_port)
    }
}

impl fmt::Display for Connection {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}-->{}", self.source(), self.destination())?;
        if self.is_loop_closing {
            write!(f, " (loop-closing)")?;
        }
        Ok(())
    }
}

/// Block set plus ordered connection list
pub struct GraphTopology {
    blocks: Vec<BlockId>,
    connections: Vec<Connection>,
    state: TopologyState,
}

impl GraphTopology {
    /// Create an empty topology in the `Declared` state
    pub fn new() -> Self {
        Self {
            blocks: Vec::new(),
            connections: Vec::new(),
            state: TopologyState::Declared,
        }
    }

    /// Register a block by identifier, e.g. `"0/FIR#0"`.
    ///
    /// Fails with `UnknownBlock` if the identifier does not parse, names a
    /// different kind, or the device cannot resolve it.
    pub fn declare<D: Device + ?Sized>(
        &mut self,
        device: &D,
        block_id: &str,
        kind: BlockKind,
    ) -> Result<BlockId, TopologyError> {
        let id: BlockId = block_id.parse()?;
        if id.kind != kind {
            return Err(TopologyError::UnknownBlock(block_id.to_string()));
        }
        self.declare_block(device, id)?;
        Ok(id)
    }

    /// Register an already parsed block identifier
    pub fn declare_block<D: Device + ?Sized>(
        &mut self,
        device: &D,
        id: BlockId,
    ) -> Result<(), TopologyError> {
        self.ensure_editable()?;

        device
            .resolve_block(&id)
            .map_err(|_| TopologyError::UnknownBlock(id.to_string()))?;

        if !self.blocks.contains(&id) {
            debug!("Declared block {}", id);
            self.blocks.push(id);
        }
        Ok(())
    }

    /// Append a connection from `src:src_port` to `dst:dst_port`
    pub fn connect(
        &mut self,
        src: BlockId,
        src_port: usize,
        dst: BlockId,
        dst_port: usize,
        loop_closing: bool,
    ) -> Result<(), TopologyError> {
        self.ensure_editable()?;

        for block in [src, dst] {
            if !self.blocks.contains(&block) {
                return Err(TopologyError::UnknownBlock(block.to_string()));
            }
        }

        let connection = Connection {
            src,
            src_port,
            dst,
            dst_port,
            is_loop_closing: loop_closing,
        };

        for port in [connection.source(), connection.destination()] {
            if port.index >= port.block.kind.num_ports(port.direction) {
                return Err(TopologyError::PortOutOfRange {
                    port,
                    direction: port.direction,
                });
            }
        }

        // One edge per input port, one edge per output port. Fan-out happens
        // through the splitter's second output, never by sharing a port.
        if self.connections.iter().any(|c| c.destination() == connection.destination()) {
            return Err(TopologyError::PortAlreadyBound {
                port: connection.destination(),
                direction: PortDirection::Input,
            });
        }
        if self.connections.iter().any(|c| c.source() == connection.source()) {
            return Err(TopologyError::PortAlreadyBound {
                port: connection.source(),
                direction: PortDirection::Output,
            });
        }

        debug!("Connected {}", connection);
        self.connections.push(connection);
        Ok(())
    }

    /// Input ports of declared blocks that have no incoming connection
    pub fn unbound_inputs(&self) -> Vec<PortRef> {
        self.blocks
            .iter()
            .flat_map(|block| {
                (0..block.kind.num_inputs()).map(|i| block.port(PortDirection::Input, i))
            })
            .filter(|port| !self.connections.iter().any(|c| c.destination() == *port))
            .collect()
    }

    /// Validate full port coverage and push the edge set to the device.
    ///
    /// Nothing is committed unless every declared input is bound and the
    /// device accepts the complete set.
    pub fn commit<D: Device + ?Sized>(&mut self, device: &mut D) -> RadioResult {
        self.ensure_editable()?;

        let unbound = self.unbound_inputs();
        if !unbound.is_empty() {
            return Err(TopologyError::IncompleteWiring { unbound }.into());
        }

        device.commit(&self.connections)?;

        self.state = TopologyState::Committed;
        info!(
            "Committed topology with {} blocks and {} connections",
            self.blocks.len(),
            self.connections.len()
        );
        Ok(())
    }

    /// Connections in declaration order. Each call starts from the beginning.
    pub fn enumerate_connections(&self) -> impl Iterator<Item = &Connection> + Clone + '_ {
        self.connections.iter()
    }

    /// Declared blocks in declaration order
    pub fn blocks(&self) -> &[BlockId] {
        &self.blocks
    }

    pub fn num_connections(&self) -> usize {
        self.connections.len()
    }

    pub fn state(&self) -> TopologyState {
        self.state
    }

    /// Move from `expected` to `next`, failing if the topology is elsewhere
    pub(crate) fn transition(
        &mut self,
        expected: TopologyState,
        next: TopologyState,
    ) -> Result<(), TopologyError> {
        if self.state != expected {
            return Err(TopologyError::InvalidState {
                expected,
                actual: self.state,
            });
        }
        self.state = next;
        Ok(())
    }

    /// Enter the terminal state from wherever the topology is
    pub(crate) fn mark_stopped(&mut self) {
        self.state = TopologyState::Stopped;
    }

    fn ensure_editable(&self) -> Result<(), TopologyError> {
        match self.state {
            TopologyState::Declared => Ok(()),
            _ => Err(TopologyError::AlreadyCommitted),
        }
    }
}

impl Default for GraphTopology {
    fn default() -> Self {
        Self::new()
    }
}

/// Check that every cycle in `connections` contains exactly one edge marked
/// as loop-closing.
///
/// Removing the loop-closing edges must leave an acyclic graph, each
/// loop-closing edge must close a cycle over the remaining edges, and no
/// chain of two or more loop-closing edges may lead back to its start.
pub fn check_loop_closure(connections: &[Connection]) -> Result<(), String> {
    let forward: Vec<&Connection> = connections.iter().filter(|c| !c.is_loop_closing).collect();
    let closing: Vec<&Connection> = connections.iter().filter(|c| c.is_loop_closing).collect();

    let mut adjacency: HashMap<BlockId, Vec<BlockId>> = HashMap::new();
    for c in &forward {
        adjacency.entry(c.src).or_default().push(c.dst);
    }

    if let Some(block) = find_cycle(connections, &adjacency) {
        return Err(format!(
            "cycle through {} has no loop-closing edge",
            block
        ));
    }

    for c in &closing {
        if !reaches(&adjacency, c.dst, c.src) {
            return Err(format!("{} is marked loop-closing but closes no cycle", c));
        }
    }

    // Edge i -> j when loop-closing edge i leads into loop-closing edge j
    // without passing another marked edge.
    let chains: Vec<Vec<usize>> = closing
        .iter()
        .enumerate()
        .map(|(i, a)| {
            closing
                .iter()
                .enumerate()
                .filter(|(j, b)| *j != i && reaches(&adjacency, a.dst, b.src))
                .map(|(j, _)| j)
                .collect()
        })
        .collect();

    if has_cycle(&chains) {
        return Err("a cycle contains more than one loop-closing edge".to_string());
    }

    Ok(())
}

/// Kahn's algorithm over the forward edges; returns a block left on a cycle
fn find_cycle(
    connections: &[Connection],
    adjacency: &HashMap<BlockId, Vec<BlockId>>,
) -> Option<BlockId> {
    let mut in_degree: HashMap<BlockId, usize> = HashMap::new();
    for c in connections {
        in_degree.entry(c.src).or_insert(0);
        in_degree.entry(c.dst).or_insert(0);
    }
    for targets in adjacency.values() {
        for dst in targets {
            *in_degree.entry(*dst).or_insert(0) += 1;
        }
    }

    let mut ready: Vec<BlockId> = in_degree
        .iter()
        .filter(|(_, d)| **d == 0)
        .map(|(b, _)| *b)
        .collect();

    while let Some(block) = ready.pop() {
        in_degree.remove(&block);
        for dst in adjacency.get(&block).into_iter().flatten() {
            if let Some(d) = in_degree.get_mut(dst) {
                *d -= 1;
                if *d == 0 {
                    ready.push(*dst);
                }
            }
        }
    }

    in_degree.keys().min_by_key(|b| b.to_string()).copied()
}

fn reaches(adjacency: &HashMap<BlockId, Vec<BlockId>>, from: BlockId, to: BlockId) -> bool {
    let mut visited = HashSet::new();
    let mut stack = vec![from];
    while let Some(block) = stack.pop() {
        if block == to {
            return true;
        }
        if visited.insert(block) {
            stack.extend(adjacency.get(&block).into_iter().flatten().copied());
        }
    }
    false
}

fn has_cycle(graph: &[Vec<usize>]) -> bool {
    // 0 = unvisited, 1 = on stack, 2 = done
    fn visit(node: usize, graph: &[Vec<usize>], marks: &mut [u8]) -> bool {
        marks[node] = 1;
        for &next in &graph[node] {
            if marks[next] == 1 || (marks[next] == 0 && visit(next, graph, marks)) {
                return true;
            }
        }
        marks[node] = 2;
        false
    }

    let mut marks = vec![0u8; graph.len()];
    (0..graph.len()).any(|n| marks[n] == 0 && visit(n, graph, &mut marks))
}
