//! HSS matrix tree
//!
//! An [`HSSMatrix`] owns a tree of [`HSSNode`]s mirroring a partition tree.
//! A leaf stores its diagonal block `D`; an internal node stores the two
//! coupling blocks between the skeletons of its children:
//!
//! ```text
//! H = [ D0               U0 B01 V1^H ]
//!     [ U1 B10 V0^H      D1          ]
//! ```
//!
//! where `Ui`/`Vi` are the nested bases of the children.

use crate::basis::HSSBasisID;
use crate::error::{HSSError, Result};
use crate::options::HSSOptions;
use hsskit_clustering::PartitionTree;
use hsskit_dense::{Matrix, Scalar};
use std::fmt;

/// Compression state of one basis
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum State {
    /// Never compressed
    #[default]
    Untouched,
    /// Compressed, but accuracy was not certified; may be retried
    PartiallyCompressed,
    /// Compressed and certified
    Compressed,
}

/// Blocks owned by a node; the variant is fixed at construction
#[derive(Debug, Clone)]
pub enum Blocks<T: Scalar> {
    /// Diagonal block of a leaf
    Leaf { d: Matrix<T> },
    /// Children and their coupling blocks
    Internal {
        children: Box<[HSSNode<T>; 2]>,
        /// `child0 row skeleton x child1 column skeleton`
        b01: Matrix<T>,
        /// `child1 row skeleton x child0 column skeleton`
        b10: Matrix<T>,
    },
}

/// One node of an HSS tree
#[derive(Debug, Clone)]
pub struct HSSNode<T: Scalar> {
    pub(crate) rows: usize,
    pub(crate) cols: usize,
    pub(crate) u_state: State,
    pub(crate) v_state: State,
    pub(crate) u: HSSBasisID<T>,
    pub(crate) v: HSSBasisID<T>,
    pub(crate) blocks: Blocks<T>,
}

impl<T: Scalar> HSSNode<T> {
    fn leaf(rows: usize, cols: usize) -> Self {
        Self {
            rows,
            cols,
            u_state: State::Untouched,
            v_state: State::Untouched,
            u: HSSBasisID::default(),
            v: HSSBasisID::default(),
            blocks: Blocks::Leaf {
                d: Matrix::zeros(0, 0),
            },
        }
    }

    fn internal(c0: HSSNode<T>, c1: HSSNode<T>) -> Self {
        Self {
            rows: c0.rows + c1.rows,
            cols: c0.cols + c1.cols,
            u_state: State::Untouched,
            v_state: State::Untouched,
            u: HSSBasisID::default(),
            v: HSSBasisID::default(),
            blocks: Blocks::Internal {
                children: Box::new([c0, c1]),
                b01: Matrix::zeros(0, 0),
                b10: Matrix::zeros(0, 0),
            },
        }
    }

    /// Halve rows and columns together until both fit in a leaf
    fn halving(rows: usize, cols: usize, leaf_size: usize) -> Self {
        let leaf_size = leaf_size.max(1);
        if (rows <= leaf_size && cols <= leaf_size) || rows < 2 || cols < 2 {
            return Self::leaf(rows, cols);
        }
        Self::internal(
            Self::halving(rows / 2, cols / 2, leaf_size),
            Self::halving(rows - rows / 2, cols - cols / 2, leaf_size),
        )
    }

    fn from_tree(tree: &PartitionTree) -> Self {
        match tree.children.as_slice() {
            [a, b] => Self::internal(Self::from_tree(a), Self::from_tree(b)),
            _ => Self::leaf(tree.size, tree.size),
        }
    }

    /// Number of rows
    pub fn rows(&self) -> usize {
        self.rows
    }

    /// Number of columns
    pub fn cols(&self) -> usize {
        self.cols
    }

    /// True for a leaf
    pub fn is_leaf(&self) -> bool {
        matches!(self.blocks, Blocks::Leaf { .. })
    }

    /// Child `i` (0 or 1) of an internal node
    pub fn child(&self, i: usize) -> Option<&HSSNode<T>> {
        match &self.blocks {
            Blocks::Internal { children, .. } => children.get(i),
            Blocks::Leaf { .. } => None,
        }
    }

    pub(crate) fn children(&self) -> Option<&[HSSNode<T>; 2]> {
        match &self.blocks {
            Blocks::Internal { children, .. } => Some(children),
            Blocks::Leaf { .. } => None,
        }
    }

    /// Row basis
    pub fn u(&self) -> &HSSBasisID<T> {
        &self.u
    }

    /// Column basis
    pub fn v(&self) -> &HSSBasisID<T> {
        &self.v
    }

    /// Row basis state
    pub fn u_state(&self) -> State {
        self.u_state
    }

    /// Column basis state
    pub fn v_state(&self) -> State {
        self.v_state
    }

    /// Rank of the row basis
    pub fn u_rank(&self) -> usize {
        self.u.rank()
    }

    /// Rank of the column basis
    pub fn v_rank(&self) -> usize {
        self.v.rank()
    }

    /// Both bases compressed and certified
    pub fn is_compressed(&self) -> bool {
        self.u_state == State::Compressed && self.v_state == State::Compressed
    }

    /// At least one basis never compressed
    pub fn is_untouched(&self) -> bool {
        self.u_state == State::Untouched || self.v_state == State::Untouched
    }

    /// Largest basis rank in the subtree
    pub fn rank(&self) -> usize {
        let own = self.u_rank().max(self.v_rank());
        match self.children() {
            Some([c0, c1]) => own.max(c0.rank()).max(c1.rank()),
            None => own,
        }
    }

    /// Number of levels of the subtree
    pub fn levels(&self) -> usize {
        match self.children() {
            Some([c0, c1]) => 1 + c0.levels().max(c1.levels()),
            None => 1,
        }
    }

    /// Stored entries of the subtree
    pub fn nonzeros(&self) -> usize {
        let bases = self.u.nonzeros() + self.v.nonzeros();
        match &self.blocks {
            Blocks::Leaf { d } => bases + d.nrows() * d.ncols(),
            Blocks::Internal { children, b01, b10 } => {
                bases
                    + b01.nrows() * b01.ncols()
                    + b10.nrows() * b10.ncols()
                    + children[0].nonzeros()
                    + children[1].nonzeros()
            }
        }
    }

    /// Bytes held by the subtree
    pub fn memory(&self) -> usize {
        let bases = self.u.memory() + self.v.memory();
        let entry = std::mem::size_of::<T>();
        match &self.blocks {
            Blocks::Leaf { d } => bases + d.nrows() * d.ncols() * entry,
            Blocks::Internal { children, b01, b10 } => {
                bases
                    + (b01.nrows() * b01.ncols() + b10.nrows() * b10.ncols()) * entry
                    + children[0].memory()
                    + children[1].memory()
            }
        }
    }

    /// Structural invariants of the subtree
    pub fn check(&self) -> bool {
        if self.is_untouched() {
            return match self.children() {
                Some([c0, c1]) => {
                    c0.rows + c1.rows == self.rows && c0.cols + c1.cols == self.cols
                }
                None => true,
            };
        }
        if !(self.u.check() && self.v.check()) {
            return false;
        }
        match &self.blocks {
            Blocks::Leaf { d } => {
                d.shape() == (self.rows, self.cols)
                    && self.u.rows() == self.rows
                    && self.v.rows() == self.cols
            }
            Blocks::Internal { children, b01, b10 } => {
                let [c0, c1] = &**children;
                c0.check()
                    && c1.check()
                    && self.u.rows() == c0.u_rank() + c1.u_rank()
                    && self.v.rows() == c0.v_rank() + c1.v_rank()
                    && b01.shape() == (c0.u_rank(), c1.v_rank())
                    && b10.shape() == (c1.u_rank(), c0.v_rank())
            }
        }
    }

    fn write_info(&self, out: &mut impl fmt::Write, depth: usize) -> fmt::Result {
        let kind = if self.is_leaf() { "leaf" } else { "node" };
        writeln!(
            out,
            "{:indent$}{kind} {}x{} U: rank {} ({:?}) V: rank {} ({:?})",
            "",
            self.rows,
            self.cols,
            self.u_rank(),
            self.u_state,
            self.v_rank(),
            self.v_state,
            indent = 2 * depth
        )?;
        if let Some([c0, c1]) = self.children() {
            c0.write_info(out, depth + 1)?;
            c1.write_info(out, depth + 1)?;
        }
        Ok(())
    }
}

/// Hierarchically semi-separable matrix
#[derive(Debug, Clone)]
pub struct HSSMatrix<T: Scalar> {
    pub(crate) root: HSSNode<T>,
    pub(crate) opts: HSSOptions,
}

impl<T: Scalar> HSSMatrix<T> {
    /// Uncompressed `m x n` matrix, rows and columns halved together down to
    /// `opts.leaf_size`
    pub fn new(m: usize, n: usize, opts: HSSOptions) -> Self {
        Self {
            root: HSSNode::halving(m, n, opts.leaf_size),
            opts,
        }
    }

    /// Uncompressed square matrix with the structure of `tree`
    pub fn from_tree(tree: &PartitionTree, opts: HSSOptions) -> Result<Self> {
        if !tree.check() {
            return Err(HSSError::InvalidTree {
                message: "children sizes do not add up to their parent".to_string(),
            });
        }
        Ok(Self {
            root: HSSNode::from_tree(tree),
            opts,
        })
    }

    /// Compress a dense matrix
    pub fn from_dense(a: &Matrix<T>, opts: HSSOptions) -> Result<Self> {
        let mut h = Self::new(a.nrows(), a.ncols(), opts);
        h.compress(a)?;
        Ok(h)
    }

    /// Options this matrix was built with
    pub fn options(&self) -> &HSSOptions {
        &self.opts
    }

    /// Root node
    pub fn root(&self) -> &HSSNode<T> {
        &self.root
    }

    /// Number of rows
    pub fn rows(&self) -> usize {
        self.root.rows
    }

    /// Number of columns
    pub fn cols(&self) -> usize {
        self.root.cols
    }

    /// True if the whole matrix is a single leaf
    pub fn is_leaf(&self) -> bool {
        self.root.is_leaf()
    }

    /// Child `i` of the root
    pub fn child(&self, i: usize) -> Option<&HSSNode<T>> {
        self.root.child(i)
    }

    /// Whole tree compressed and certified
    pub fn is_compressed(&self) -> bool {
        self.root.is_compressed()
    }

    /// Compression never ran
    pub fn is_untouched(&self) -> bool {
        self.root.is_untouched()
    }

    /// Largest basis rank
    pub fn rank(&self) -> usize {
        self.root.rank()
    }

    /// Number of tree levels
    pub fn levels(&self) -> usize {
        self.root.levels()
    }

    /// Bytes held by blocks and bases
    pub fn memory(&self) -> usize {
        self.root.memory()
    }

    /// Stored entries of blocks and bases
    pub fn nonzeros(&self) -> usize {
        self.root.nonzeros()
    }

    /// Structural invariants of the tree
    pub fn check(&self) -> bool {
        self.root.check()
    }

    /// Write a per-node summary to `out`
    pub fn print_info(&self, out: &mut impl fmt::Write) -> fmt::Result {
        writeln!(
            out,
            "HSS {}x{}: {} levels, rank {}, {} nonzeros, {:.3} MB",
            self.rows(),
            self.cols(),
            self.levels(),
            self.rank(),
            self.nonzeros(),
            self.memory() as f64 / 1e6
        )?;
        self.root.write_info(out, 1)
    }

    pub(crate) fn ensure_usable(&self) -> Result<()> {
        if self.is_untouched() {
            return Err(HSSError::NotCompressed);
        }
        Ok(())
    }
}
