//! ULV factorization
//!
//! Every non-root node compresses its local diagonal block with the
//! interpolative row basis: `Omega U = [0; I]` decouples the first
//! `s - r` rows from the rest of the matrix, and an LQ factorization of those
//! rows splits the local unknowns into `s - r` eliminated ones and `r` that
//! are passed up. The parent merges its children's reduced blocks through
//! `B01`/`B10`, and the root factors what is left with a dense LU.

use crate::error::{HSSError, Result};
use crate::matrix::{Blocks, HSSMatrix, HSSNode};
use crate::parallel::join_if;
use crate::work::WorkFactor;
use hsskit_dense::{
    block_diag, mat_mul, matmul_op, HouseholderQr, LuFactorization, Matrix, Scalar, Trans,
};

/// Factors of one node
#[derive(Debug, Clone)]
pub(crate) enum FactorKind<T: Scalar> {
    /// Non-root node with `s - r` eliminated unknowns
    Eliminated {
        /// Unitary change of the local unknowns
        q: Matrix<T>,
        /// Lower triangular block of the eliminated equations
        l: Matrix<T>,
        /// Coupling of the eliminated unknowns into the remaining equations
        d10: Matrix<T>,
        /// Column basis seen from the eliminated unknowns
        vq0: Matrix<T>,
    },
    /// Dense LU of the last reduced system
    Root { lu: LuFactorization<T> },
}

#[derive(Debug, Clone)]
pub(crate) struct NodeFactors<T: Scalar> {
    pub(crate) kind: FactorKind<T>,
    pub(crate) children: Vec<NodeFactors<T>>,
}

impl<T: Scalar> NodeFactors<T> {
    fn memory(&self) -> usize {
        let entry = std::mem::size_of::<T>();
        let own = match &self.kind {
            FactorKind::Eliminated { q, l, d10, vq0 } => {
                [q, l, d10, vq0].iter().map(|m| m.as_slice().len()).sum::<usize>() * entry
            }
            FactorKind::Root { lu } => lu.memory(),
        };
        own + self.children.iter().map(NodeFactors::memory).sum::<usize>()
    }
}

/// ULV factorization of an [`HSSMatrix`], used by [`HSSMatrix::solve`]
#[derive(Debug, Clone)]
pub struct HSSFactors<T: Scalar> {
    pub(crate) root: NodeFactors<T>,
    pub(crate) size: usize,
}

impl<T: Scalar> HSSFactors<T> {
    /// Order of the factored matrix
    pub fn size(&self) -> usize {
        self.size
    }

    /// Bytes held by the factors
    pub fn memory(&self) -> usize {
        self.root.memory()
    }
}

/// Factorization of the leading diagonal block `H00` of a 2x2 partitioned
/// matrix, with the projection needed for its Schur complement
#[derive(Debug, Clone)]
pub struct PartialFactors<T: Scalar> {
    /// Factors of `H00`
    pub h00: HSSFactors<T>,
    /// `V0big^H H00^{-1} U0big`
    pub vhat: Matrix<T>,
}

impl<T: Scalar> HSSMatrix<T> {
    /// ULV factorization
    ///
    /// Partially compressed matrices are accepted; the factorization is then
    /// of the approximation actually stored.
    pub fn factor(&self) -> Result<HSSFactors<T>> {
        self.ensure_usable()?;
        if self.rows() != self.cols() {
            return Err(HSSError::NotSquare {
                rows: self.rows(),
                cols: self.cols(),
            });
        }
        let (root, _) = self
            .root
            .factor_rec(true, 0, self.opts.task_recursion_cutoff)?;
        if self.opts.verbose {
            log::info!("ULV factors: {:.3} MB", root.memory() as f64 / 1e6);
        }
        Ok(HSSFactors {
            root,
            size: self.rows(),
        })
    }

    /// Factor `H00 = child(0)` and compute `V0big^H H00^{-1} U0big`
    pub fn partial_factor(&self) -> Result<PartialFactors<T>> {
        self.ensure_usable()?;
        let [c0, _] = self.root.children().ok_or_else(|| HSSError::InvalidTree {
            message: "partial factorization needs a root with two children".to_string(),
        })?;
        if c0.rows != c0.cols {
            return Err(HSSError::NotSquare {
                rows: c0.rows,
                cols: c0.cols,
            });
        }
        let cutoff = self.opts.task_recursion_cutoff;
        let (root, _) = c0.factor_rec(true, 0, cutoff)?;
        let h00 = HSSFactors { root, size: c0.rows };
        let (u0_big, v0_big) = c0.expanded_bases();
        let mut x = u0_big;
        c0.solve_with(&h00.root, &mut x, cutoff)?;
        let vhat = matmul_op(Trans::C, &v0_big, Trans::N, &x);
        Ok(PartialFactors { h00, vhat })
    }
}

impl<T: Scalar> HSSNode<T> {
    pub(crate) fn factor_rec(
        &self,
        is_root: bool,
        depth: usize,
        cutoff: usize,
    ) -> Result<(NodeFactors<T>, WorkFactor<T>)> {
        let (dloc, vh, children) = match &self.blocks {
            Blocks::Leaf { d } => (d.clone(), self.v.dense(), Vec::new()),
            Blocks::Internal { children, b01, b10 } => {
                let [c0, c1] = &**children;
                let (r0, r1) = join_if(
                    depth,
                    cutoff,
                    || c0.factor_rec(false, depth + 1, cutoff),
                    || c1.factor_rec(false, depth + 1, cutoff),
                );
                let ((f0, w0), (f1, w1)) = (r0?, r1?);
                let (k0, k1) = (w0.d11.ncols(), w1.d11.ncols());
                let mut dloc = Matrix::zeros(c0.u_rank() + c1.u_rank(), k0 + k1);
                dloc.set_block(0, 0, &w0.d11);
                dloc.set_block(c0.u_rank(), k0, &w1.d11);
                dloc.set_block(0, k0, &matmul_op(Trans::N, b01, Trans::C, &w1.vq1));
                dloc.set_block(c0.u_rank(), 0, &matmul_op(Trans::N, b10, Trans::C, &w0.vq1));
                let vh = mat_mul(&block_diag(&w0.vq1, &w1.vq1), &self.v.dense());
                (dloc, vh, vec![f0, f1])
            }
        };

        if is_root {
            let lu = LuFactorization::new_in_place(dloc)?;
            let empty = WorkFactor {
                d11: Matrix::zeros(0, 0),
                vq1: Matrix::zeros(0, 0),
            };
            return Ok((
                NodeFactors {
                    kind: FactorKind::Root { lu },
                    children,
                },
                empty,
            ));
        }

        let (s, sc) = dloc.shape();
        let r = self.u_rank();
        let k = s - r;
        let od = self.u.apply_omega(&dloc);
        let qr = HouseholderQr::new(&od.rows_range(0, k).adjoint());
        let q = qr.q();
        let l = qr.r().rows_range(0, k).adjoint();
        let dbot = mat_mul(&od.rows_range(k, r), &q);
        let vq = matmul_op(Trans::C, &q, Trans::N, &vh);
        let work = WorkFactor {
            d11: dbot.cols_range(k, sc - k),
            vq1: vq.rows_range(k, sc - k),
        };
        let kind = FactorKind::Eliminated {
            q,
            l,
            d10: dbot.cols_range(0, k),
            vq0: vq.rows_range(0, k),
        };
        Ok((NodeFactors { kind, children }, work))
    }
}
