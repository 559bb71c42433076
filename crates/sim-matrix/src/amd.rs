//! Approximate minimum degree ordering.
//!
//! Computes a symmetric fill-reducing permutation of `A + Aᵀ` for the
//! precompiled-pattern backend. The elimination graph is kept implicitly as a
//! quotient graph: eliminated nodes become *elements* that stand for the clique
//! of their remaining neighbours, so fill edges are never formed explicitly.
//!
//! ```text
//! while variables remain:
//!     p = variable of least approximate degree      (lazy binary heap)
//!     element(p) = Adj(p) ∪ reach(adjacent elements)
//!     absorb the adjacent elements into element(p)
//!     recompute approximate degree of every variable in element(p)
//! ```
//!
//! The approximate degree counts distinct variables reachable directly or via
//! one element, an upper bound on the true external degree.
//!
//! Reference: Amestoy, Davis, Duff, "An Approximate Minimum Degree Ordering
//! Algorithm", SIAM J. Matrix Anal. Appl. 17(4), 1996.

use std::cmp::Reverse;
use std::collections::BinaryHeap;

#[derive(Debug, Clone)]
pub struct AmdOrdering {
    /// perm[old] = new position
    pub perm: Vec<usize>,
    /// inv_perm[new] = old index
    pub inv_perm: Vec<usize>,
    pub stats: AmdStats,
}

#[derive(Debug, Clone, Default)]
pub struct AmdStats {
    pub n: usize,
    /// Off-diagonal entries of the symmetrized pattern
    pub nnz_sym: usize,
    pub elements_absorbed: usize,
}

/// Order the columns of the n×n CSC pattern `(col_ptr, row_idx)`.
pub fn amd_order(n: usize, col_ptr: &[usize], row_idx: &[usize]) -> AmdOrdering {
    if n == 0 {
        return AmdOrdering {
            perm: Vec::new(),
            inv_perm: Vec::new(),
            stats: AmdStats::default(),
        };
    }

    let mut graph = QuotientGraph::from_pattern(n, col_ptr, row_idx);
    while let Some(p) = graph.next_pivot() {
        graph.eliminate(p);
    }
    log::debug!(
        "amd: n={}, nnz(sym)={}, elements absorbed={}",
        graph.stats.n,
        graph.stats.nnz_sym,
        graph.stats.elements_absorbed
    );

    AmdOrdering {
        perm: graph.perm,
        inv_perm: graph.inv_perm,
        stats: graph.stats,
    }
}

/// Natural (identity) ordering, used when fill reduction is disabled.
pub fn natural_order(n: usize) -> AmdOrdering {
    AmdOrdering {
        perm: (0..n).collect(),
        inv_perm: (0..n).collect(),
        stats: AmdStats {
            n,
            ..Default::default()
        },
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Node {
    Variable { degree: usize },
    Element,
}

struct QuotientGraph {
    nodes: Vec<Node>,
    /// Variables: adjacent variables and elements. Elements: member variables.
    adj: Vec<Vec<usize>>,
    heap: BinaryHeap<Reverse<(usize, usize)>>,
    marker: Vec<usize>,
    mark: usize,
    perm: Vec<usize>,
    inv_perm: Vec<usize>,
    eliminated: usize,
    stats: AmdStats,
}

impl QuotientGraph {
    fn from_pattern(n: usize, col_ptr: &[usize], row_idx: &[usize]) -> Self {
        let mut adj: Vec<Vec<usize>> = vec![Vec::new(); n];
        for col in 0..n {
            for &row in &row_idx[col_ptr[col]..col_ptr[col + 1]] {
                if row < n && row != col {
                    adj[col].push(row);
                    adj[row].push(col);
                }
            }
        }
        let mut nnz_sym = 0;
        for list in &mut adj {
            list.sort_unstable();
            list.dedup();
            nnz_sym += list.len();
        }

        let nodes: Vec<Node> = adj
            .iter()
            .map(|list| Node::Variable { degree: list.len() })
            .collect();
        let heap = adj
            .iter()
            .enumerate()
            .map(|(i, list)| Reverse((list.len(), i)))
            .collect();

        Self {
            nodes,
            adj,
            heap,
            marker: vec![0; n],
            mark: 0,
            perm: vec![0; n],
            inv_perm: vec![0; n],
            eliminated: 0,
            stats: AmdStats {
                n,
                nnz_sym,
                elements_absorbed: 0,
            },
        }
    }

    fn next_mark(&mut self) -> usize {
        self.mark += 1;
        self.mark
    }

    /// Pop the least-degree live variable, skipping stale heap entries.
    fn next_pivot(&mut self) -> Option<usize> {
        while let Some(Reverse((degree, node))) = self.heap.pop() {
            match self.nodes[node] {
                Node::Element => continue,
                Node::Variable { degree: current } if current != degree => continue,
                Node::Variable { .. } => return Some(node),
            }
        }
        None
    }

    fn eliminate(&mut self, p: usize) {
        self.perm[p] = self.eliminated;
        self.inv_perm[self.eliminated] = p;
        self.eliminated += 1;

        let mark = self.next_mark();
        self.marker[p] = mark;
        let mut members = Vec::new();
        let mut absorbed = Vec::new();

        for &a in &self.adj[p] {
            match self.nodes[a] {
                Node::Variable { .. } => {
                    if self.marker[a] != mark {
                        self.marker[a] = mark;
                        members.push(a);
                    }
                }
                Node::Element => absorbed.push(a),
            }
        }
        for &e in &absorbed {
            for &v in &self.adj[e] {
                if matches!(self.nodes[v], Node::Variable { .. }) && self.marker[v] != mark {
                    self.marker[v] = mark;
                    members.push(v);
                }
            }
        }

        self.nodes[p] = Node::Element;
        self.adj[p] = members.clone();

        // Every variable touching an absorbed element now touches p instead.
        for &e in &absorbed {
            let old = std::mem::take(&mut self.adj[e]);
            for v in old {
                if let Some(slot) = self.adj[v].iter().position(|&x| x == e) {
                    self.adj[v][slot] = p;
                }
            }
            self.stats.elements_absorbed += 1;
        }
        for &v in &members {
            if !self.adj[v].contains(&p) {
                self.adj[v].push(p);
            }
            let list = &mut self.adj[v];
            list.sort_unstable();
            list.dedup();
        }

        for &v in &members {
            self.update_degree(v);
        }
    }

    fn update_degree(&mut self, v: usize) {
        let mark = self.next_mark();
        self.marker[v] = mark;
        let mut degree = 0;

        for &a in &self.adj[v] {
            match self.nodes[a] {
                Node::Variable { .. } => {
                    if self.marker[a] != mark {
                        self.marker[a] = mark;
                        degree += 1;
                    }
                }
                Node::Element => {
                    for &w in &self.adj[a] {
                        if matches!(self.nodes[w], Node::Variable { .. }) && self.marker[w] != mark {
                            self.marker[w] = mark;
                            degree += 1;
                        }
                    }
                }
            }
        }

        self.nodes[v] = Node::Variable { degree };
        self.heap.push(Reverse((degree, v)));
    }
}
