//! The parameter dependency graph.
//!
//! Nodes are parameter indices in declaration order. An edge `from -> to`
//! means `to` is computed from `from`. Topological order comes from Kahn's
//! algorithm with the smallest ready index first, so the order is a pure
//! function of the declaration order. When Kahn's algorithm stalls, the
//! strongly connected components (Tarjan) locate every cycle.

use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashMap, VecDeque};

#[derive(Debug, Clone, Default)]
pub struct ConstraintGraph {
    /// `parents[i]`: nodes `i` is computed from.
    parents: Vec<Vec<usize>>,
    /// `children[i]`: nodes computed from `i`.
    children: Vec<Vec<usize>>,
}

impl ConstraintGraph {
    pub fn new(len: usize) -> Self {
        Self {
            parents: vec![Vec::new(); len],
            children: vec![Vec::new(); len],
        }
    }

    pub fn len(&self) -> usize {
        self.parents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.parents.is_empty()
    }

    /// Record that `to` is computed from `from`. Duplicate edges are ignored.
    pub fn add_edge(&mut self, from: usize, to: usize) {
        if !self.parents[to].contains(&from) {
            self.parents[to].push(from);
            self.children[from].push(to);
        }
    }

    pub fn parents(&self, node: usize) -> &[usize] {
        &self.parents[node]
    }

    pub fn edge_count(&self) -> usize {
        self.parents.iter().map(Vec::len).sum()
    }

    /// Every node after all of its parents, or the cycles that prevent it.
    pub fn topological_order(&self) -> Result<Vec<usize>, Vec<Vec<usize>>> {
        let mut in_degree: Vec<usize> = self.parents.iter().map(Vec::len).collect();
        let mut ready: BinaryHeap<Reverse<usize>> = in_degree
            .iter()
            .enumerate()
            .filter(|(_, d)| **d == 0)
            .map(|(i, _)| Reverse(i))
            .collect();

        let mut order = Vec::with_capacity(self.len());
        while let Some(Reverse(node)) = ready.pop() {
            order.push(node);
            for &child in &self.children[node] {
                in_degree[child] -= 1;
                if in_degree[child] == 0 {
                    ready.push(Reverse(child));
                }
            }
        }

        if order.len() == self.len() {
            Ok(order)
        } else {
            Err(self.cycles())
        }
    }

    /// Depth of each node: 0 for nodes that are not `derived`, otherwise one
    /// more than the deepest parent. `order` must be topological.
    pub fn ranks(&self, order: &[usize], derived: impl Fn(usize) -> bool) -> Vec<usize> {
        let mut rank = vec![0; self.len()];
        for &node in order {
            if derived(node) {
                rank[node] = 1 + self.parents[node]
                    .iter()
                    .map(|&p| rank[p])
                    .max()
                    .unwrap_or(0);
            }
        }
        rank
    }

    /// One cycle per strongly connected component that contains one.
    ///
    /// Each cycle starts at the component's smallest index and follows
    /// "is computed from" edges; the last node depends on the first. The
    /// shortest such loop is reported. Cycles are sorted by first node.
    pub fn cycles(&self) -> Vec<Vec<usize>> {
        let mut cycles: Vec<Vec<usize>> = Tarjan::run(self)
            .into_iter()
            .filter(|scc| scc.len() > 1 || self.parents[scc[0]].contains(&scc[0]))
            .filter_map(|scc| self.shortest_cycle(&scc))
            .collect();
        cycles.sort_by_key(|c| c[0]);
        cycles
    }

    fn shortest_cycle(&self, scc: &[usize]) -> Option<Vec<usize>> {
        let start = *scc.iter().min()?;
        let mut prev: HashMap<usize, usize> = HashMap::new();
        let mut queue = VecDeque::from([start]);

        while let Some(node) = queue.pop_front() {
            for &parent in &self.parents[node] {
                if parent == start {
                    let mut path = vec![node];
                    let mut cur = node;
                    while cur != start {
                        cur = prev[&cur];
                        path.push(cur);
                    }
                    path.reverse();
                    return Some(path);
                }
                if scc.contains(&parent) && !prev.contains_key(&parent) {
                    prev.insert(parent, node);
                    queue.push_back(parent);
                }
            }
        }
        None
    }
}

/// Tarjan's strongly connected components over "is computed from" edges.
struct Tarjan<'a> {
    graph: &'a ConstraintGraph,
    index: Vec<Option<usize>>,
    low: Vec<usize>,
    on_stack: Vec<bool>,
    stack: Vec<usize>,
    next: usize,
    components: Vec<Vec<usize>>,
}

impl<'a> Tarjan<'a> {
    fn run(graph: &'a ConstraintGraph) -> Vec<Vec<usize>> {
        let mut t = Tarjan {
            graph,
            index: vec![None; graph.len()],
            low: vec![0; graph.len()],
            on_stack: vec![false; graph.len()],
            stack: Vec::new(),
            next: 0,
            components: Vec::new(),
        };
        for node in 0..graph.len() {
            if t.index[node].is_none() {
                t.visit(node);
            }
        }
        t.components
    }

    fn visit(&mut self, node: usize) {
        self.index[node] = Some(self.next);
        self.low[node] = self.next;
        self.next += 1;
        self.stack.push(node);
        self.on_stack[node] = true;

        let graph = self.graph;
        for &parent in &graph.parents[node] {
            match self.index[parent] {
                None => {
                    self.visit(parent);
                    self.low[node] = self.low[node].min(self.low[parent]);
                }
                Some(idx) if self.on_stack[parent] => {
                    self.low[node] = self.low[node].min(idx);
                }
                Some(_) => {}
            }
        }

        if Some(self.low[node]) == self.index[node] {
            let mut component = Vec::new();
            while let Some(member) = self.stack.pop() {
                self.on_stack[member] = false;
                component.push(member);
                if member == node {
                    break;
                }
            }
            self.components.push(component);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn graph(len: usize, edges: &[(usize, usize)]) -> ConstraintGraph {
        let mut g = ConstraintGraph::new(len);
        for &(from, to) in edges {
            g.add_edge(from, to);
        }
        g
    }

    #[test]
    fn order_follows_declaration_when_unconstrained() {
        let g = graph(4, &[]);
        assert_eq!(g.topological_order().unwrap(), vec![0, 1, 2, 3]);
    }

    #[test]
    fn parents_come_first() {
        // 0 = 3 * 2, 2 = f(1)
        let g = graph(4, &[(3, 0), (2, 0), (1, 2)]);
        let order = g.topological_order().unwrap();
        let pos = |n: usize| order.iter().position(|&x| x == n).unwrap();
        assert!(pos(3) < pos(0));
        assert!(pos(2) < pos(0));
        assert!(pos(1) < pos(2));
        assert_eq!(order, vec![1, 2, 3, 0]);

        let ranks = g.ranks(&order, |n| n == 0 || n == 2);
        assert_eq!(ranks, vec![2, 0, 1, 0]);
    }

    #[test]
    fn duplicate_edges_collapse() {
        let g = graph(2, &[(0, 1), (0, 1)]);
        assert_eq!(g.edge_count(), 1);
        assert_eq!(g.parents(1), &[0]);
    }

    #[test]
    fn two_node_cycle() {
        let g = graph(3, &[(0, 1), (1, 0), (1, 2)]);
        let cycles = g.topological_order().unwrap_err();
        assert_eq!(cycles, vec![vec![0, 1]]);
    }

    #[test]
    fn self_loop_is_a_cycle() {
        let g = graph(2, &[(1, 1)]);
        assert_eq!(g.cycles(), vec![vec![1]]);
    }

    #[test]
    fn three_node_cycle_starts_at_smallest() {
        // 2 from 1, 0 from 2, 1 from 0: 0 <- 2 <- 1 <- 0
        let g = graph(3, &[(1, 2), (2, 0), (0, 1)]);
        // 0 is computed from 2, 2 from 1, 1 from 0
        assert_eq!(g.cycles(), vec![vec![0, 2, 1]]);
    }

    #[test]
    fn independent_cycles_reported_separately() {
        let g = graph(5, &[(0, 1), (1, 0), (3, 4), (4, 3), (0, 2)]);
        assert_eq!(g.cycles(), vec![vec![0, 1], vec![3, 4]]);
    }
}
