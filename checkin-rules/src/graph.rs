//! Flow-graph layout of a rule.
//!
//! Conditions become boxes. An `and` chains its children left to right, an
//! `or` lays them out as parallel paths. Nodes live in an arena and refer to
//! each other by index.

use std::collections::VecDeque;

use serde::Serialize;
use tracing::debug;

use crate::expr::Expr;

pub type NodeId = usize;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FlowNode {
    pub id: NodeId,
    pub rule: Expr,
    pub children: Vec<NodeId>,
    pub parents: Vec<NodeId>,
    pub column: usize,
    pub row: usize,
    /// Evaluation annotation copied from the leaf.
    pub result: Option<bool>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct FlowGraph {
    pub nodes: Vec<FlowNode>,
    /// Nodes reached from the start of the diagram.
    pub roots: Vec<NodeId>,
    pub columns: usize,
    pub height: usize,
}

impl FlowGraph {
    /// Builds and lays out the graph. The empty rule yields an empty graph.
    pub fn build(rule: &Expr) -> Self {
        let mut builder = Builder::default();
        let roots = match rule {
            Expr::Empty => Vec::new(),
            other => builder.add_to_graph(other).0,
        };

        let node_count = builder.nodes.len();
        let columns = assign_columns(&builder.nodes, &roots);
        let rows = assign_rows(&builder.nodes, &roots);

        let nodes: Vec<FlowNode> = builder
            .nodes
            .into_iter()
            .zip(columns.into_iter().zip(rows))
            .map(|(pending, (column, row))| FlowNode {
                id: pending.id,
                result: pending.rule.result(),
                rule: pending.rule,
                children: pending.children,
                parents: pending.parents,
                column: column.unwrap_or_default(),
                row: row.unwrap_or_default(),
            })
            .collect();

        let columns = nodes.iter().map(|node| node.column + 1).max().unwrap_or(0);
        let height = nodes.iter().map(|node| node.row + 1).max().unwrap_or(0);
        debug!(nodes = node_count, columns, height, "laid out rule graph");

        Self {
            nodes,
            roots,
            columns,
            height,
        }
    }

    pub fn node(&self, id: NodeId) -> Option<&FlowNode> {
        self.nodes.get(id)
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Edges as `(parent, child)` pairs.
    pub fn edges(&self) -> impl Iterator<Item = (NodeId, NodeId)> + '_ {
        self.nodes
            .iter()
            .flat_map(|node| node.children.iter().map(move |child| (node.id, *child)))
    }

    /// Per node: did this condition pass and did everything before it on
    /// some path from the start pass as well. `None` when the node carries
    /// no result, or when no fully evaluated passing path leads to it.
    pub fn results_incl_parents(&self) -> Vec<Option<bool>> {
        let mut order: Vec<NodeId> = (0..self.nodes.len()).collect();
        order.sort_by_key(|id| self.nodes[*id].column);

        let mut rollup: Vec<Option<bool>> = vec![None; self.nodes.len()];
        for id in order {
            let node = &self.nodes[id];
            let value = match node.result {
                None => None,
                Some(false) => Some(false),
                Some(true) if node.parents.is_empty() => Some(true),
                Some(true) => {
                    let parents = node.parents.iter().map(|parent| rollup[*parent]);
                    let mut unknown = false;
                    let mut passed = false;
                    for parent in parents {
                        match parent {
                            Some(true) => passed = true,
                            None => unknown = true,
                            Some(false) => {}
                        }
                    }
                    if passed {
                        Some(true)
                    } else if unknown {
                        None
                    } else {
                        Some(false)
                    }
                }
            };
            rollup[id] = value;
        }
        rollup
    }

    pub fn result_incl_parents(&self, id: NodeId) -> Option<bool> {
        self.results_incl_parents().get(id).copied().flatten()
    }
}

#[derive(Debug)]
struct PendingNode {
    id: NodeId,
    rule: Expr,
    children: Vec<NodeId>,
    parents: Vec<NodeId>,
}

#[derive(Debug, Default)]
struct Builder {
    nodes: Vec<PendingNode>,
}

impl Builder {
    /// Adds `rule` and returns its `(heads, tails)`: the nodes entered first
    /// and the nodes left last.
    fn add_to_graph(&mut self, rule: &Expr) -> (Vec<NodeId>, Vec<NodeId>) {
        match rule {
            Expr::And(operands) => {
                let mut heads: Vec<NodeId> = Vec::new();
                let mut tails: Option<Vec<NodeId>> = None;
                for operand in operands.iter().rev() {
                    let (operand_heads, operand_tails) = self.add_to_graph(operand);
                    if operand_heads.is_empty() {
                        continue;
                    }
                    for tail in &operand_tails {
                        for head in &heads {
                            self.link(*tail, *head);
                        }
                    }
                    if tails.is_none() {
                        tails = Some(operand_tails);
                    }
                    heads = operand_heads;
                }
                (heads, tails.unwrap_or_default())
            }
            Expr::Or(operands) => {
                let mut heads = Vec::new();
                let mut tails = Vec::new();
                for operand in operands {
                    let (operand_heads, operand_tails) = self.add_to_graph(operand);
                    heads.extend(operand_heads);
                    tails.extend(operand_tails);
                }
                (heads, tails)
            }
            leaf => {
                let id = self.nodes.len();
                self.nodes.push(PendingNode {
                    id,
                    rule: leaf.clone(),
                    children: Vec::new(),
                    parents: Vec::new(),
                });
                (vec![id], vec![id])
            }
        }
    }

    fn link(&mut self, parent: NodeId, child: NodeId) {
        self.nodes[parent].children.push(child);
        self.nodes[child].parents.push(parent);
    }
}

/// Breadth-first relaxation from the roots at column 0. A node moves right
/// whenever a longer path reaches it, so every edge points to a higher
/// column.
fn assign_columns(nodes: &[PendingNode], roots: &[NodeId]) -> Vec<Option<usize>> {
    let mut columns: Vec<Option<usize>> = vec![None; nodes.len()];
    let mut queue: VecDeque<(NodeId, usize)> = roots.iter().map(|id| (*id, 0)).collect();

    while let Some((id, column)) = queue.pop_front() {
        if columns[id].is_some_and(|current| current >= column) {
            continue;
        }
        columns[id] = Some(column);
        queue.extend(nodes[id].children.iter().map(|child| (*child, column + 1)));
    }
    columns
}

/// Depth-first greedy packing. A node keeps the first row it is reached
/// at; sibling subtrees are stacked below each other with one blank row
/// between a subtree taller than one row and the sibling after it.
///
/// The walk keeps its own stack so long chains do not grow the call stack.
fn assign_rows(nodes: &[PendingNode], roots: &[NodeId]) -> Vec<Option<usize>> {
    let mut rows: Vec<Option<usize>> = vec![None; nodes.len()];
    let mut stack = vec![Siblings::new(roots, 0)];

    while let Some(siblings) = stack.last_mut() {
        let Some(&child) = siblings.ids.get(siblings.next) else {
            let consumed = siblings.used.max(1);
            stack.pop();
            match stack.last_mut() {
                Some(parent) => parent.absorb(consumed),
                None => break,
            }
            continue;
        };
        if rows[child].is_some() {
            // Already placed through another path; its subtree is laid out.
            siblings.absorb(1);
            continue;
        }
        let offset = siblings.offset + siblings.used;
        rows[child] = Some(offset);
        stack.push(Siblings::new(&nodes[child].children, offset));
    }
    rows
}

/// Children of one node being packed, top to bottom.
struct Siblings<'a> {
    ids: &'a [NodeId],
    next: usize,
    offset: usize,
    used: usize,
}

impl<'a> Siblings<'a> {
    fn new(ids: &'a [NodeId], offset: usize) -> Self {
        Self {
            ids,
            next: 0,
            offset,
            used: 0,
        }
    }

    /// Accounts for the rows taken by the child at `next` and moves on.
    fn absorb(&mut self, consumed: usize) {
        self.used += consumed;
        if consumed > 1 && self.next + 1 < self.ids.len() {
            self.used += 1;
        }
        self.next += 1;
    }
}
