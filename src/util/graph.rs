//
//  Copyright (C) 2022-2024  Chase Ruskin
//
//  This program is free software: you can redistribute it and/or modify
//  it under the terms of the GNU General Public License as published by
//  the Free Software Foundation, either version 3 of the License, or
//  (at your option) any later version.
//
//  This program is distributed in the hope that it will be useful,
//  but WITHOUT ANY WARRANTY; without even the implied warranty of
//  MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
//  GNU General Public License for more details.
//
//  You should have received a copy of the GNU General Public License
//  along with this program.  If not, see <http://www.gnu.org/licenses/>.
//

//! Basic graph data structure
//! - source: http://smallcultfollowing.com/babysteps/blog/2015/04/06/modeling-graphs-in-rust-using-vector-indices/
//!
//! Edges point from a dependent node (source) to the node it depends on (target).

use std::collections::BTreeSet;

pub type NodeIndex = usize;

type EdgeIndex = usize;

#[derive(Debug, PartialEq)]
struct NodeData<V> {
    node: V,
    first_outgoing_edge: Option<EdgeIndex>,
    first_incoming_edge: Option<EdgeIndex>,
}

#[derive(Debug, PartialEq)]
struct EdgeData<E> {
    edge: E,
    source: NodeIndex,
    target: NodeIndex,
    next_outgoing_edge: Option<EdgeIndex>,
    next_incoming_edge: Option<EdgeIndex>,
}

#[derive(Debug, PartialEq)]
pub struct Graph<V, E> {
    vertices: Vec<NodeData<V>>,
    edges: Vec<EdgeData<E>>,
}

#[derive(Debug, PartialEq)]
pub enum EdgeStatus {
    SelfLoop,
    AlreadyExists,
    Success,
}

impl<V, E> Graph<V, E> {
    /// Creates an empty `Graph` struct.
    pub fn new() -> Self {
        Self {
            edges: Vec::new(),
            vertices: Vec::new(),
        }
    }

    /// Adds a new node to the graph.
    ///
    /// Returns the `NodeIndex` to remember the node.
    pub fn add_node(&mut self, node: V) -> NodeIndex {
        let index = self.vertices.len();
        self.vertices.push(NodeData {
            node: node,
            first_outgoing_edge: None,
            first_incoming_edge: None,
        });
        index
    }

    /// Checks if a given `source` node is connected to the given `target` node.
    pub fn has_edge(&self, source: NodeIndex, target: NodeIndex) -> bool {
        self.successors(source).find(|f| f == &target).is_some()
    }

    /// Returns the number of nodes in the graph.
    pub fn node_count(&self) -> usize {
        self.vertices.len()
    }

    /// Accesses the node data label behind the `node` index.
    pub fn get_node(&self, node: NodeIndex) -> Option<&V> {
        Some(&self.vertices.get(node)?.node)
    }

    /// Adds a new edge to the graph from `source` to `target`.
    ///
    /// The edge is not entered if the relationship already exists or the edge
    /// is a self-loop; the returned status tells which case occurred.
    pub fn add_edge(&mut self, source: NodeIndex, target: NodeIndex, cost: E) -> EdgeStatus {
        // do not allow self-loops
        if source == target {
            return EdgeStatus::SelfLoop;
        }
        // do not allow duplicate edges
        if self.has_edge(source, target) == true {
            return EdgeStatus::AlreadyExists;
        }

        let edge_index = self.edges.len();
        // enter source -> target data
        let next_outgoing_edge = self.vertices[source].first_outgoing_edge;
        self.vertices[source].first_outgoing_edge = Some(edge_index);
        // enter target <- source data
        let next_incoming_edge = self.vertices[target].first_incoming_edge;
        self.vertices[target].first_incoming_edge = Some(edge_index);

        self.edges.push(EdgeData {
            edge: cost,
            source: source,
            target: target,
            next_outgoing_edge: next_outgoing_edge,
            next_incoming_edge: next_incoming_edge,
        });
        EdgeStatus::Success
    }

    /// Returns the number of successors to the `source` node.
    pub fn out_degree(&self, source: NodeIndex) -> usize {
        self.successors(source).count()
    }

    /// Creates an iterator over the incoming nodes to the `target` source.
    pub fn predecessors(&self, target: NodeIndex) -> Predecessors<V, E> {
        let first_incoming_edge = self.vertices[target].first_incoming_edge;
        Predecessors {
            graph: self,
            current_edge_index: first_incoming_edge,
        }
    }

    /// Creates an iterator over the outgoing nodes from the `source` node.
    pub fn successors(&self, source: NodeIndex) -> Successors<V, E> {
        let first_outgoing_edge = self.vertices[source].first_outgoing_edge;
        Successors {
            graph: self,
            current_edge_index: first_outgoing_edge,
        }
    }

    /// Collects the successors of `source` in ascending index order.
    pub fn sorted_successors(&self, source: NodeIndex) -> Vec<NodeIndex> {
        let mut list: Vec<NodeIndex> = self.successors(source).collect();
        list.sort();
        list
    }

    /// Orders the nodes so that every node comes after all of the nodes it
    /// points to (dependencies first).
    ///
    /// Among the nodes that are ready at the same time, the lowest index is
    /// taken first, so the order only depends on the insertion order of the
    /// nodes. Returns `None` if the graph contains a cycle.
    pub fn topological_sort(&self) -> Option<Vec<NodeIndex>> {
        let mut order = Vec::<NodeIndex>::with_capacity(self.node_count());
        // count the unfinished dependencies of each node
        let mut remaining: Vec<usize> = (0..self.node_count())
            .map(|i| self.out_degree(i))
            .collect();
        let mut ready: BTreeSet<NodeIndex> = remaining
            .iter()
            .enumerate()
            .filter_map(|(i, n)| if *n == 0 { Some(i) } else { None })
            .collect();
        while let Some(current) = ready.pop_first() {
            order.push(current);
            for dependent in self.predecessors(current) {
                remaining[dependent] -= 1;
                if remaining[dependent] == 0 {
                    ready.insert(dependent);
                }
            }
        }
        match order.len() == self.node_count() {
            true => Some(order),
            false => None,
        }
    }

    /// Searches for a cycle with depth-first search, visiting nodes and their
    /// successors in ascending index order.
    ///
    /// Returns the cycle as a path that starts and ends at the same node.
    pub fn find_cycle(&self) -> Option<Vec<NodeIndex>> {
        #[derive(Clone, Copy, PartialEq)]
        enum Mark {
            Fresh,
            Active,
            Done,
        }
        let mut marks = vec![Mark::Fresh; self.node_count()];
        for start in 0..self.node_count() {
            if marks[start] != Mark::Fresh {
                continue;
            }
            // stack of (node, its sorted successors, next successor position)
            let mut stack: Vec<(NodeIndex, Vec<NodeIndex>, usize)> =
                vec![(start, self.sorted_successors(start), 0)];
            marks[start] = Mark::Active;
            while let Some((node, succs, pos)) = stack.last_mut() {
                if *pos >= succs.len() {
                    marks[*node] = Mark::Done;
                    stack.pop();
                    continue;
                }
                let next = succs[*pos];
                *pos += 1;
                match marks[next] {
                    Mark::Fresh => {
                        marks[next] = Mark::Active;
                        let succs = self.sorted_successors(next);
                        stack.push((next, succs, 0));
                    }
                    Mark::Active => {
                        // the active part of the stack from `next` onward is the cycle
                        let mut path: Vec<NodeIndex> = stack
                            .iter()
                            .map(|(n, _, _)| *n)
                            .skip_while(|n| n != &next)
                            .collect();
                        path.push(next);
                        return Some(path);
                    }
                    Mark::Done => (),
                }
            }
        }
        None
    }

    /// Collects every node reachable from `source` (excluding `source`) in
    /// dependencies-first order.
    pub fn reachable(&self, source: NodeIndex) -> Vec<NodeIndex> {
        let mut visited = vec![false; self.node_count()];
        let mut order = Vec::new();
        let mut stack: Vec<(NodeIndex, Vec<NodeIndex>, usize)> =
            vec![(source, self.sorted_successors(source), 0)];
        visited[source] = true;
        while let Some((node, succs, pos)) = stack.last_mut() {
            if *pos >= succs.len() {
                let done = *node;
                stack.pop();
                if done != source {
                    order.push(done);
                }
                continue;
            }
            let next = succs[*pos];
            *pos += 1;
            if visited[next] == false {
                visited[next] = true;
                let succs = self.sorted_successors(next);
                stack.push((next, succs, 0));
            }
        }
        order
    }
}

pub struct Successors<'graph, V, E> {
    graph: &'graph Graph<V, E>,
    current_edge_index: Option<EdgeIndex>,
}

impl<'graph, V, E> Iterator for Successors<'graph, V, E> {
    type Item = NodeIndex;

    fn next(&mut self) -> Option<NodeIndex> {
        match self.current_edge_index {
            None => None,
            Some(edge_num) => {
                let edge = &self.graph.edges[edge_num];
                self.current_edge_index = edge.next_outgoing_edge;
                Some(edge.target)
            }
        }
    }
}

pub struct Predecessors<'graph, V, E> {
    graph: &'graph Graph<V, E>,
    current_edge_index: Option<EdgeIndex>,
}

impl<'graph, V, E> Iterator for Predecessors<'graph, V, E> {
    type Item = NodeIndex;

    fn next(&mut self) -> Option<NodeIndex> {
        match self.current_edge_index {
            None => None,
            Some(edge_num) => {
                let edge = &self.graph.edges[edge_num];
                self.current_edge_index = edge.next_incoming_edge;
                Some(edge.source)
            }
        }
    }
}
