//! External ↔ internal index bookkeeping.
//!
//! Device models stamp in external (user-facing) indices. Reordering moves
//! rows and columns so that pivots land on the internal diagonal; the tracker
//! keeps both directions of that mapping for rows and columns independently.
//! All indices are 0-based.

use crate::element::ElementStore;

/// One axis (rows or columns) of the permutation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AxisMap {
    ext_to_int: Vec<usize>,
    int_to_ext: Vec<usize>,
}

impl AxisMap {
    pub fn identity(n: usize) -> Self {
        Self {
            ext_to_int: (0..n).collect(),
            int_to_ext: (0..n).collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.int_to_ext.len()
    }

    pub fn is_empty(&self) -> bool {
        self.int_to_ext.is_empty()
    }

    #[inline]
    pub fn to_internal(&self, ext: usize) -> usize {
        self.ext_to_int[ext]
    }

    #[inline]
    pub fn to_external(&self, int: usize) -> usize {
        self.int_to_ext[int]
    }

    pub fn ext_to_int(&self) -> &[usize] {
        &self.ext_to_int
    }

    pub fn int_to_ext(&self) -> &[usize] {
        &self.int_to_ext
    }

    /// Exchange two internal positions.
    pub fn swap(&mut self, a: usize, b: usize) {
        if a == b {
            return;
        }
        self.int_to_ext.swap(a, b);
        self.ext_to_int[self.int_to_ext[a]] = a;
        self.ext_to_int[self.int_to_ext[b]] = b;
    }

    /// Relabel internal positions: new position `k` takes what was at old
    /// position `order[k]`. `order` must be a permutation of `0..len`.
    pub fn relabel(&mut self, order: &[usize]) {
        debug_assert_eq!(order.len(), self.len());
        let int_to_ext: Vec<usize> = order.iter().map(|&old| self.int_to_ext[old]).collect();
        for (int, &ext) in int_to_ext.iter().enumerate() {
            self.ext_to_int[ext] = int;
        }
        self.int_to_ext = int_to_ext;
    }

    /// Both directions are bijections on `0..len` and inverse to each other.
    pub fn is_consistent(&self) -> bool {
        let n = self.len();
        if self.ext_to_int.len() != n || !is_permutation(&self.int_to_ext) {
            return false;
        }
        (0..n).all(|ext| self.int_to_ext[self.ext_to_int[ext]] == ext)
    }

    /// True when the permutation is odd.
    pub fn parity(&self) -> bool {
        permutation_parity(&self.int_to_ext)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PermutationTracker {
    pub rows: AxisMap,
    pub cols: AxisMap,
}

impl PermutationTracker {
    pub fn new(n: usize) -> Self {
        Self {
            rows: AxisMap::identity(n),
            cols: AxisMap::identity(n),
        }
    }

    pub fn size(&self) -> usize {
        self.rows.len()
    }

    /// Fold a pivot sequence into the maps. `pivots[k] = (row, col)` in the
    /// current internal space is moved to internal position `(k, k)`.
    pub fn apply_pivots(&mut self, pivots: &[(usize, usize)]) {
        let rows: Vec<usize> = pivots.iter().map(|&(r, _)| r).collect();
        let cols: Vec<usize> = pivots.iter().map(|&(_, c)| c).collect();
        self.rows.relabel(&rows);
        self.cols.relabel(&cols);
    }

    /// Combined parity of the row and column permutations (true when odd).
    pub fn swap_parity(&self) -> bool {
        self.rows.parity() ^ self.cols.parity()
    }

    pub fn is_consistent(&self) -> bool {
        self.rows.len() == self.cols.len() && self.rows.is_consistent() && self.cols.is_consistent()
    }
}

pub fn is_permutation(perm: &[usize]) -> bool {
    let mut seen = vec![false; perm.len()];
    for &p in perm {
        if p >= perm.len() || seen[p] {
            return false;
        }
        seen[p] = true;
    }
    true
}

/// Parity by cycle decomposition: a cycle of length L is L-1 transpositions.
/// Returns true for an odd permutation.
pub fn permutation_parity(perm: &[usize]) -> bool {
    let mut visited = vec![false; perm.len()];
    let mut odd = false;
    for start in 0..perm.len() {
        if visited[start] {
            continue;
        }
        let mut len = 0usize;
        let mut i = start;
        while !visited[i] {
            visited[i] = true;
            i = perm[i];
            len += 1;
        }
        if len % 2 == 0 {
            odd = !odd;
        }
    }
    odd
}

// ============================================================================
// MNA preorder
// ============================================================================

/// Swap columns so that structurally missing diagonals are filled from
/// symmetric unit "twins", the pattern voltage sources and inductors stamp.
///
/// For an internal column `j` without a diagonal, a twin pair is an element at
/// internal (i, j) and one at (j, i), both with magnitude exactly 1. Swapping
/// columns i and j puts both on the diagonal. Columns with exactly one twin
/// pair are swapped first; a second pass takes the first pair found for the
/// remaining ambiguous columns. Returns the number of swaps made.
pub fn mna_preorder(tracker: &mut PermutationTracker, elements: &ElementStore) -> usize {
    let n = tracker.size();
    let mut swaps = 0usize;
    let mut relaxed = false;

    loop {
        let mut progress = false;
        let mut ambiguous = false;

        for j in 0..n {
            if has_internal(tracker, elements, j, j) {
                continue;
            }
            let twins = find_twins(tracker, elements, j);
            let pick = match twins.len() {
                0 => None,
                1 => Some(twins[0]),
                _ if relaxed => Some(twins[0]),
                _ => {
                    ambiguous = true;
                    None
                }
            };
            if let Some(i) = pick {
                log::trace!("preorder: swapping internal columns {} and {}", i, j);
                tracker.cols.swap(i, j);
                swaps += 1;
                progress = true;
            }
        }

        if progress {
            relaxed = false;
        } else if ambiguous && !relaxed {
            relaxed = true;
        } else {
            break;
        }
    }

    if swaps > 0 {
        log::debug!("preorder: {} column swaps", swaps);
    }
    swaps
}

fn has_internal(tracker: &PermutationTracker, elements: &ElementStore, row: usize, col: usize) -> bool {
    elements
        .find(tracker.rows.to_external(row), tracker.cols.to_external(col))
        .is_some()
}

fn is_unit(elements: &ElementStore, row: usize, col: usize) -> bool {
    elements
        .find(row, col)
        .map(|h| {
            let v = elements.value(h);
            v.re.abs() == 1.0 && v.im == 0.0
        })
        .unwrap_or(false)
}

/// Internal rows i such that (i, j) and (j, i) are both unit elements.
fn find_twins(tracker: &PermutationTracker, elements: &ElementStore, j: usize) -> Vec<usize> {
    let ext_col_j = tracker.cols.to_external(j);
    let ext_row_j = tracker.rows.to_external(j);
    let mut twins: Vec<usize> = elements
        .column(ext_col_j)
        .filter_map(|h| {
            let e = elements.element(h);
            let i = tracker.rows.to_internal(e.row);
            if i == j {
                return None;
            }
            let ext_col_i = tracker.cols.to_external(i);
            (is_unit(elements, e.row, ext_col_j) && is_unit(elements, ext_row_j, ext_col_i))
                .then_some(i)
        })
        .collect();
    twins.sort_unstable();
    twins
}
