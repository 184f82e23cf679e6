//! Per-traversal state threaded through the tree recursions
//!
//! Every public entry point creates one work tree, mirroring the part of the
//! HSS tree it visits, and drops it when it returns. Sibling subtrees get
//! disjoint work nodes, so the fork-join recursion never shares mutable state.

use hsskit_dense::{Matrix, Scalar};

/// State of the sampling-driven compression, kept across rounds
#[derive(Debug, Clone)]
pub struct WorkCompress<T: Scalar> {
    pub(crate) c: Vec<WorkCompress<T>>,
    /// Global row and column offset of the node
    pub(crate) offset: (usize, usize),
    /// Depth below the root
    pub(crate) lvl: usize,
    /// Global row and column ids of the skeletons
    pub(crate) ir: Vec<usize>,
    pub(crate) ic: Vec<usize>,
    /// Local samples of the off-diagonal block row/column; reduced to the
    /// skeleton rows once the matching basis is compressed
    pub(crate) sr: Matrix<T>,
    pub(crate) sc: Matrix<T>,
    /// Random matrices projected on the column/row basis, `rank x d`
    pub(crate) rr: Matrix<T>,
    pub(crate) rc: Matrix<T>,
    /// Sample columns already present in `sr` and `sc`
    pub(crate) sampled: usize,
    /// Diagonal or coupling blocks already extracted
    pub(crate) blocks_extracted: bool,
}

impl<T: Scalar> WorkCompress<T> {
    pub(crate) fn new(offset: (usize, usize), lvl: usize) -> Self {
        Self {
            c: Vec::new(),
            offset,
            lvl,
            ir: Vec::new(),
            ic: Vec::new(),
            sr: Matrix::zeros(0, 0),
            sc: Matrix::zeros(0, 0),
            rr: Matrix::zeros(0, 0),
            rc: Matrix::zeros(0, 0),
            sampled: 0,
            blocks_extracted: false,
        }
    }
}

/// State of one round of ANN-driven compression
#[derive(Debug, Clone)]
pub struct WorkCompressANN<T: Scalar> {
    pub(crate) c: Vec<WorkCompressANN<T>>,
    pub(crate) offset: usize,
    pub(crate) lvl: usize,
    /// Candidate sample columns sorted by id, with their best distance
    pub(crate) ids: Vec<usize>,
    pub(crate) scores: Vec<f64>,
    /// `A(local rows, ids)`
    pub(crate) s: Matrix<T>,
    /// Skeleton as local rows of `s` and as global ids
    pub(crate) jr: Vec<usize>,
    pub(crate) ir: Vec<usize>,
}

impl<T: Scalar> WorkCompressANN<T> {
    pub(crate) fn new(offset: usize, lvl: usize) -> Self {
        Self {
            c: Vec::new(),
            offset,
            lvl,
            ids: Vec::new(),
            scores: Vec::new(),
            s: Matrix::zeros(0, 0),
            jr: Vec::new(),
            ir: Vec::new(),
        }
    }
}

/// Upward pass of a product with an HSS matrix
#[derive(Debug, Clone)]
pub struct WorkApply<T: Scalar> {
    pub(crate) c: Vec<WorkApply<T>>,
    /// Offset of the node in the operand
    pub(crate) offset: usize,
    /// Operand projected on the node's input basis
    pub(crate) tmp1: Matrix<T>,
}

impl<T: Scalar> WorkApply<T> {
    pub(crate) fn new(offset: usize) -> Self {
        Self {
            c: Vec::new(),
            offset,
            tmp1: Matrix::zeros(0, 0),
        }
    }
}

/// Dense expansion of a subtree
#[derive(Debug, Clone)]
pub struct WorkDense<T: Scalar> {
    /// The subtree as a dense matrix
    pub(crate) d: Matrix<T>,
    /// Nested row basis expanded to all rows of the subtree
    pub(crate) u_big: Matrix<T>,
    /// Nested column basis expanded to all columns of the subtree
    pub(crate) v_big: Matrix<T>,
}

/// Forward elimination state of a solve
#[derive(Debug, Clone)]
pub struct WorkSolve<T: Scalar> {
    pub(crate) c: Vec<WorkSolve<T>>,
    /// Eliminated unknowns of the node
    pub(crate) z0: Matrix<T>,
    /// Right-hand side left for the node's skeleton unknowns
    pub(crate) rhs1: Matrix<T>,
    /// Known part of `V^H x` over the subtree
    pub(crate) ft1: Matrix<T>,
}

impl<T: Scalar> Default for WorkSolve<T> {
    fn default() -> Self {
        Self {
            c: Vec::new(),
            z0: Matrix::zeros(0, 0),
            rhs1: Matrix::zeros(0, 0),
            ft1: Matrix::zeros(0, 0),
        }
    }
}

/// Reduced system a node hands to its parent during factorization
#[derive(Debug, Clone)]
pub struct WorkFactor<T: Scalar> {
    /// Diagonal block left for the node's skeleton unknowns
    pub(crate) d11: Matrix<T>,
    /// Column basis seen from the skeleton unknowns
    pub(crate) vq1: Matrix<T>,
}
