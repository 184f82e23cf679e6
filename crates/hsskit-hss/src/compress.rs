//! Randomized sampling-driven compression
//!
//! The driver draws Gaussian matrices `Rr`, `Rc`, samples `Sr = A Rr` and
//! `Sc = A^H Rc` and walks the tree post-order. A leaf turns the global
//! samples into samples of its off-diagonal block row by subtracting
//! `D Rr(J)`; an internal node combines the skeleton rows of its children's
//! samples with the coupling blocks:
//!
//! ```text
//! Sr = [ Sr0(Jr0) - B01 (V1^H Rr1) ]
//!      [ Sr1(Jr1) - B10 (V0^H Rr0) ]
//! ```
//!
//! Only the sample columns added since the last round are computed. A round
//! that leaves nodes uncompressed is followed by a wider one.

use crate::basis::HSSBasisID;
use crate::error::{HSSError, Result};
use crate::matrix::{Blocks, HSSMatrix, HSSNode, State};
use crate::metrics::{CompressionMetrics, CompressionReport};
use crate::options::{CompressionAlgorithm, HSSOptions};
use crate::parallel::join_if;
use crate::sampler::{ElementSampler, MultiplySampler};
use crate::work::WorkCompress;
use hsskit_dense::{
    gaussian_matrix, gemm, interpolative_rows, orthonormal_basis, projection_residual, vconcat,
    IdOptions, Matrix, Scalar, Trans,
};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

/// Global samples and inputs of one compression round
struct SampleCtx<'a, T: Scalar, E: ElementSampler<T>> {
    rr: &'a Matrix<T>,
    rc: &'a Matrix<T>,
    sr: &'a Matrix<T>,
    sc: &'a Matrix<T>,
    /// Sample width of this round
    d: usize,
    /// Samples span the whole range: every basis is accepted
    exhausted: bool,
    elem: &'a E,
    opts: &'a HSSOptions,
    metrics: &'a CompressionMetrics,
}

impl<T: Scalar> HSSMatrix<T> {
    /// Compress a dense matrix
    pub fn compress(&mut self, a: &Matrix<T>) -> Result<CompressionReport> {
        if a.shape() != (self.rows(), self.cols()) {
            return Err(HSSError::DimensionMismatch {
                op: "compress",
                expected_rows: self.rows(),
                expected_cols: self.cols(),
                rows: a.nrows(),
                cols: a.ncols(),
            });
        }
        self.compress_with(a, a)
    }

    /// Compress from random-matrix products and entry access
    ///
    /// The scheme is `opts.compression_algorithm`. Compression never fails on
    /// accuracy: the loop widens the sample until every basis is accepted,
    /// which at the latest happens when the sample width reaches the matrix
    /// size.
    pub fn compress_with<M, E>(&mut self, mult: &M, elem: &E) -> Result<CompressionReport>
    where
        M: MultiplySampler<T>,
        E: ElementSampler<T>,
    {
        match self.opts.compression_algorithm {
            CompressionAlgorithm::Original => self.compress_original(mult, elem),
            CompressionAlgorithm::Stable => self.compress_stable(mult, elem),
        }
    }

    fn compress_original<M, E>(&mut self, mult: &M, elem: &E) -> Result<CompressionReport>
    where
        M: MultiplySampler<T>,
        E: ElementSampler<T>,
    {
        let d0 = self.opts.d0 + self.opts.p;
        let p = self.opts.p;
        self.compress_sampled(mult, elem, d0, |d| 2 * d.saturating_sub(p) + p)
    }

    fn compress_stable<M, E>(&mut self, mult: &M, elem: &E) -> Result<CompressionReport>
    where
        M: MultiplySampler<T>,
        E: ElementSampler<T>,
    {
        let d0 = self.opts.d0 + self.opts.dd;
        let dd = self.opts.dd;
        self.compress_sampled(mult, elem, d0, |d| d + dd)
    }

    fn compress_sampled<M, E>(
        &mut self,
        mult: &M,
        elem: &E,
        d_start: usize,
        grow: impl Fn(usize) -> usize,
    ) -> Result<CompressionReport>
    where
        M: MultiplySampler<T>,
        E: ElementSampler<T>,
    {
        let (m, n) = (self.rows(), self.cols());
        let opts = self.opts.clone();
        let metrics = CompressionMetrics::new();
        let mut rng = ChaCha8Rng::seed_from_u64(opts.random_seed);
        let dmax = m.max(n).max(1);

        let mut rr: Matrix<T> = Matrix::zeros(n, 0);
        let mut rc: Matrix<T> = Matrix::zeros(m, 0);
        let mut sr: Matrix<T> = Matrix::zeros(m, 0);
        let mut sc: Matrix<T> = Matrix::zeros(n, 0);
        let mut w = WorkCompress::new((0, 0), 0);
        let mut d_old = 0;
        let mut d = d_start.clamp(1, dmax);
        let mut rounds = 0;

        loop {
            rounds += 1;
            let new = d - d_old;
            let rr_new: Matrix<T> = gaussian_matrix(n, new, &mut rng);
            let rc_new: Matrix<T> = gaussian_matrix(m, new, &mut rng);
            let mut sr_new = Matrix::zeros(m, new);
            let mut sc_new = Matrix::zeros(n, new);
            mult.sample(&rr_new, &rc_new, &mut sr_new, &mut sc_new);
            metrics.add_sample_columns(new);
            rr.append_cols(&rr_new);
            rc.append_cols(&rc_new);
            sr.append_cols(&sr_new);
            sc.append_cols(&sc_new);

            let ctx = SampleCtx {
                rr: &rr,
                rc: &rc,
                sr: &sr,
                sc: &sc,
                d,
                exhausted: d >= dmax,
                elem,
                opts: &opts,
                metrics: &metrics,
            };
            self.root.compress_node(&ctx, &mut w, 0);

            let done = self.root.is_compressed();
            if opts.verbose {
                log::info!(
                    "{} compression round {rounds}: d = {d}, rank = {}, done = {done}",
                    opts.compression_algorithm,
                    self.root.rank()
                );
            } else {
                log::debug!("compression round {rounds}: d = {d}, done = {done}");
            }
            if done || d >= dmax {
                break;
            }
            d_old = d;
            d = grow(d).clamp(d_old + 1, dmax);
        }

        let compressed = self.root.is_compressed();
        if !compressed {
            log::warn!("HSS compression failed after {rounds} rounds (d = {d})");
        }
        Ok(CompressionReport {
            compressed,
            rounds,
            samples: d,
            rank: self.root.rank(),
            metrics: metrics.snapshot(),
        })
    }
}

impl<T: Scalar> HSSNode<T> {
    fn compress_node<E: ElementSampler<T>>(
        &mut self,
        ctx: &SampleCtx<'_, T, E>,
        w: &mut WorkCompress<T>,
        depth: usize,
    ) {
        let (r0, c0) = w.offset;
        let ready = match &mut self.blocks {
            Blocks::Leaf { d } => {
                if !w.blocks_extracted {
                    let rows: Vec<usize> = (r0..r0 + self.rows).collect();
                    let cols: Vec<usize> = (c0..c0 + self.cols).collect();
                    *d = ctx.elem.extract(&rows, &cols);
                    ctx.metrics.add_elements(self.rows * self.cols);
                    ctx.metrics.add_dense(self.rows * self.cols * std::mem::size_of::<T>());
                    w.blocks_extracted = true;
                }
                true
            }
            Blocks::Internal { children, b01, b10 } => {
                let [ch0, ch1] = &mut **children;
                if w.c.is_empty() {
                    w.c.push(WorkCompress::new(w.offset, w.lvl + 1));
                    w.c.push(WorkCompress::new((r0 + ch0.rows, c0 + ch0.cols), w.lvl + 1));
                }
                let (w0, w1) = w.c.split_at_mut(1);
                let cutoff = ctx.opts.task_recursion_cutoff;
                join_if(
                    depth,
                    cutoff,
                    || ch0.compress_node(ctx, &mut w0[0], depth + 1),
                    || ch1.compress_node(ctx, &mut w1[0], depth + 1),
                );
                let ready = ch0.is_compressed() && ch1.is_compressed();
                if ready && !w.blocks_extracted {
                    *b01 = ctx.elem.extract(&w.c[0].ir, &w.c[1].ic);
                    *b10 = ctx.elem.extract(&w.c[1].ir, &w.c[0].ic);
                    let entries = b01.nrows() * b01.ncols() + b10.nrows() * b10.ncols();
                    ctx.metrics.add_elements(entries);
                    ctx.metrics.add_coupling(entries * std::mem::size_of::<T>());
                    w.blocks_extracted = true;
                }
                ready
            }
        };
        if !ready || (w.lvl == 0 && self.is_compressed()) {
            return;
        }

        if w.lvl == 0 {
            let (nr, nc) = self.local_dims();
            self.u = HSSBasisID::zero_rank(nr);
            self.v = HSSBasisID::zero_rank(nc);
            self.u_state = State::Compressed;
            self.v_state = State::Compressed;
            return;
        }

        self.update_samples(ctx, w);
        match ctx.opts.compression_algorithm {
            CompressionAlgorithm::Original => self.certify_original(ctx, w),
            CompressionAlgorithm::Stable => self.certify_stable(ctx, w),
        }
    }

    /// Rows and columns of the local problem: the node itself for a leaf,
    /// the children's skeletons for an internal node
    pub(crate) fn local_dims(&self) -> (usize, usize) {
        match self.children() {
            Some([c0, c1]) => (c0.u_rank() + c1.u_rank(), c0.v_rank() + c1.v_rank()),
            None => (self.rows, self.cols),
        }
    }

    /// Append the sample columns added since the last visit
    fn update_samples<E: ElementSampler<T>>(&self, ctx: &SampleCtx<'_, T, E>, w: &mut WorkCompress<T>) {
        let start = w.sampled;
        let new = ctx.d - start;
        if new == 0 {
            return;
        }
        let (r0, c0) = w.offset;
        let (mut sr_new, mut sc_new, rr_loc, rc_loc) = match &self.blocks {
            Blocks::Leaf { d } => {
                let rr_loc = ctx.rr.block(c0, start, self.cols, new);
                let rc_loc = ctx.rc.block(r0, start, self.rows, new);
                let mut sr_new = ctx.sr.block(r0, start, self.rows, new);
                gemm(Trans::N, d, Trans::N, &rr_loc, -T::one(), T::one(), &mut sr_new);
                let mut sc_new = ctx.sc.block(c0, start, self.cols, new);
                gemm(Trans::C, d, Trans::N, &rc_loc, -T::one(), T::one(), &mut sc_new);
                (sr_new, sc_new, rr_loc, rc_loc)
            }
            Blocks::Internal { b01, b10, .. } => {
                let (w0, w1) = (&w.c[0], &w.c[1]);
                let cols = |m: &Matrix<T>| m.cols_range(start, new);
                let (rr0, rr1) = (cols(&w0.rr), cols(&w1.rr));
                let (rc0, rc1) = (cols(&w0.rc), cols(&w1.rc));

                let mut top = cols(&w0.sr);
                gemm(Trans::N, b01, Trans::N, &rr1, -T::one(), T::one(), &mut top);
                let mut bottom = cols(&w1.sr);
                gemm(Trans::N, b10, Trans::N, &rr0, -T::one(), T::one(), &mut bottom);
                let sr_new = vconcat(&[&top, &bottom]);

                let mut top = cols(&w0.sc);
                gemm(Trans::C, b10, Trans::N, &rc1, -T::one(), T::one(), &mut top);
                let mut bottom = cols(&w1.sc);
                gemm(Trans::C, b01, Trans::N, &rc0, -T::one(), T::one(), &mut bottom);
                let sc_new = vconcat(&[&top, &bottom]);

                (sr_new, sc_new, vconcat(&[&rr0, &rr1]), vconcat(&[&rc0, &rc1]))
            }
        };

        if self.u_state == State::Compressed {
            sr_new = sr_new.select_rows(self.u.skeleton());
            w.rc.append_cols(&self.u.apply_c(&rc_loc));
        }
        if self.v_state == State::Compressed {
            sc_new = sc_new.select_rows(self.v.skeleton());
            w.rr.append_cols(&self.v.apply_c(&rr_loc));
        }
        w.sr.append_cols(&sr_new);
        w.sc.append_cols(&sc_new);
        w.sampled = ctx.d;
    }

    /// ID options for a basis of `extent` rows: the row basis `U` spans
    /// `self.rows`, the column basis `V` spans `self.cols`
    fn id_options(opts: &HSSOptions, lvl: usize, extent: usize) -> IdOptions {
        let lvl = lvl.max(1) as f64;
        IdOptions {
            rel_tol: opts.rel_tol / lvl,
            abs_tol: opts.abs_tol / lvl,
            max_rank: opts.max_rank.min(extent),
        }
    }

    /// Accept both bases together when the sample width exceeds both ranks
    /// by the oversampling `p`
    fn certify_original<E: ElementSampler<T>>(&mut self, ctx: &SampleCtx<'_, T, E>, w: &mut WorkCompress<T>) {
        if self.is_compressed() {
            return;
        }
        let u_id = interpolative_rows(&w.sr, &Self::id_options(ctx.opts, w.lvl, self.rows));
        let v_id = interpolative_rows(&w.sc, &Self::id_options(ctx.opts, w.lvl, self.cols));
        let width = ctx.d.saturating_sub(ctx.opts.p);
        let accept = ctx.exhausted
            || width >= ctx.opts.max_rank
            || (u_id.rank < width && v_id.rank < width);
        if accept {
            self.set_u(ctx, w, HSSBasisID::from_row_id(u_id));
            self.set_v(ctx, w, HSSBasisID::from_row_id(v_id));
        } else {
            log::trace!(
                "level {} node {}x{}: ranks {}/{} need more than {width} samples",
                w.lvl,
                self.rows,
                self.cols,
                u_id.rank,
                v_id.rank
            );
        }
    }

    /// Certify each basis on its own against the newest `dd` sample columns
    fn certify_stable<E: ElementSampler<T>>(&mut self, ctx: &SampleCtx<'_, T, E>, w: &mut WorkCompress<T>) {
        if self.u_state != State::Compressed {
            let id_opts = Self::id_options(ctx.opts, w.lvl, self.rows);
            if let Some(basis) = stable_basis(&w.sr, ctx.opts.dd, ctx.exhausted, &id_opts) {
                self.set_u(ctx, w, basis);
            }
        }
        if self.v_state != State::Compressed {
            let id_opts = Self::id_options(ctx.opts, w.lvl, self.cols);
            if let Some(basis) = stable_basis(&w.sc, ctx.opts.dd, ctx.exhausted, &id_opts) {
                self.set_v(ctx, w, basis);
            }
        }
        if !self.is_compressed() {
            log::trace!(
                "level {} node {}x{}: U {:?}, V {:?} after {} samples",
                w.lvl,
                self.rows,
                self.cols,
                self.u_state,
                self.v_state,
                ctx.d
            );
        }
    }

    fn set_u<E: ElementSampler<T>>(&mut self, ctx: &SampleCtx<'_, T, E>, w: &mut WorkCompress<T>, basis: HSSBasisID<T>) {
        let (ids, rc_loc) = match self.children() {
            Some(_) => (
                [w.c[0].ir.as_slice(), w.c[1].ir.as_slice()].concat(),
                vconcat(&[&w.c[0].rc, &w.c[1].rc]),
            ),
            None => (
                (w.offset.0..w.offset.0 + self.rows).collect(),
                ctx.rc.block(w.offset.0, 0, self.rows, ctx.d),
            ),
        };
        w.ir = basis.skeleton().iter().map(|&i| ids[i]).collect();
        w.sr = w.sr.select_rows(basis.skeleton());
        w.rc = basis.apply_c(&rc_loc);
        ctx.metrics.add_basis(basis.memory());
        self.u = basis;
        self.u_state = State::Compressed;
    }

    fn set_v<E: ElementSampler<T>>(&mut self, ctx: &SampleCtx<'_, T, E>, w: &mut WorkCompress<T>, basis: HSSBasisID<T>) {
        let (ids, rr_loc) = match self.children() {
            Some(_) => (
                [w.c[0].ic.as_slice(), w.c[1].ic.as_slice()].concat(),
                vconcat(&[&w.c[0].rr, &w.c[1].rr]),
            ),
            None => (
                (w.offset.1..w.offset.1 + self.cols).collect(),
                ctx.rr.block(w.offset.1, 0, self.cols, ctx.d),
            ),
        };
        w.ic = basis.skeleton().iter().map(|&i| ids[i]).collect();
        w.sc = w.sc.select_rows(basis.skeleton());
        w.rr = basis.apply_c(&rr_loc);
        ctx.metrics.add_basis(basis.memory());
        self.v = basis;
        self.v_state = State::Compressed;
    }
}

/// Interpolative basis of `s` if the first `d - dd` columns already capture
/// the last `dd` to within the tolerance
fn stable_basis<T: Scalar>(
    s: &Matrix<T>,
    dd: usize,
    exhausted: bool,
    id_opts: &IdOptions,
) -> Option<HSSBasisID<T>> {
    let (rows, d) = s.shape();
    let q = orthonormal_basis(s, id_opts.rel_tol, id_opts.abs_tol, id_opts.max_rank);
    let full = q.ncols() >= id_opts.max_rank.min(rows);
    let certified = exhausted || full || {
        let dd = dd.min(d);
        let q0 = orthonormal_basis(
            &s.cols_range(0, d - dd),
            id_opts.rel_tol,
            id_opts.abs_tol,
            id_opts.max_rank,
        );
        let res = projection_residual(&q0, &s.cols_range(d - dd, dd));
        let res_norm = (0..dd).map(|j| res.col_norm(j)).fold(0.0, f64::max);
        let scale = (0..d).map(|j| s.col_norm(j)).fold(0.0, f64::max);
        res_norm <= (id_opts.rel_tol * scale).max(id_opts.abs_tol)
    };
    if !certified {
        return None;
    }
    // q has full column rank, so a tight ID only picks the skeleton
    let tight = IdOptions {
        rel_tol: 100.0 * T::epsilon(),
        abs_tol: 0.0,
        max_rank: q.ncols(),
    };
    Some(HSSBasisID::from_sample(&q, &tight))
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use hsskit_dense::{mat_mul, Matrix};

    fn smooth_kernel(n: usize) -> Matrix<f64> {
        Matrix::from_fn(n, n, |i, j| {
            let (x, y) = (i as f64 / n as f64, j as f64 / n as f64);
            (-(x - y).powi(2) / 0.08).exp() + if i == j { 1.0 } else { 0.0 }
        })
    }

    fn small_opts(alg: CompressionAlgorithm) -> HSSOptions {
        HSSOptions::default()
            .with_leaf_size(8)
            .with_rel_tol(1e-8)
            .with_d0(8)
            .with_dd(4)
            .with_compression_algorithm(alg)
    }

    #[test]
    fn test_stable_basis_certifies_low_rank() {
        let mut rng = ChaCha8Rng::seed_from_u64(3);
        let a: Matrix<f64> = gaussian_matrix(20, 2, &mut rng);
        let r: Matrix<f64> = gaussian_matrix(2, 12, &mut rng);
        let s = mat_mul(&a, &r);
        let opts = IdOptions {
            rel_tol: 1e-10,
            abs_tol: 0.0,
            max_rank: 20,
        };
        let basis = stable_basis(&s, 4, false, &opts).unwrap();
        assert_eq!(basis.rank(), 2);
        // the basis reproduces the sample from its skeleton rows
        let approx = basis.apply(&s.select_rows(basis.skeleton()));
        assert!(approx.sub(&s).norm_fro() < 1e-8 * s.norm_fro());
    }

    #[test]
    fn test_stable_basis_rejects_unresolved_sample() {
        // 6 random columns of a rank-20 matrix cannot predict 4 more
        let mut rng = ChaCha8Rng::seed_from_u64(4);
        let s: Matrix<f64> = gaussian_matrix(20, 10, &mut rng);
        let opts = IdOptions {
            rel_tol: 1e-6,
            abs_tol: 0.0,
            max_rank: 20,
        };
        assert!(stable_basis(&s, 4, false, &opts).is_none());
        assert!(stable_basis(&s, 4, true, &opts).is_some());
    }

    #[test]
    fn test_both_schemes_reach_compressed_state() {
        let a = smooth_kernel(64);
        for alg in [CompressionAlgorithm::Original, CompressionAlgorithm::Stable] {
            let mut h = HSSMatrix::new(64, 64, small_opts(alg));
            let report = h.compress(&a).unwrap();
            assert!(report.compressed, "{alg}");
            assert!(h.is_compressed());
            assert!(h.check());
            assert!(report.rounds >= 1);
            assert_eq!(report.metrics.dense_bytes, 64 * 8 * std::mem::size_of::<f64>());
        }
    }

    #[test]
    fn test_root_leaf_is_exact() {
        let a = smooth_kernel(6);
        let mut h = HSSMatrix::new(6, 6, HSSOptions::default());
        h.compress(&a).unwrap();
        assert!(h.is_leaf());
        assert!(h.is_compressed());
        assert_eq!(h.rank(), 0);
        let x = Matrix::from_fn(6, 1, |i, _| i as f64);
        let y = h.apply(&x).unwrap();
        let expected = mat_mul(&a, &x);
        for i in 0..6 {
            assert_abs_diff_eq!(y[[i, 0]], expected[[i, 0]], epsilon = 1e-14);
        }
    }

    #[test]
    fn test_compress_rejects_wrong_shape() {
        let mut h: HSSMatrix<f64> = HSSMatrix::new(10, 10, HSSOptions::default());
        let a = Matrix::zeros(10, 9);
        assert!(matches!(h.compress(&a), Err(HSSError::DimensionMismatch { .. })));
    }

    #[test]
    fn test_rectangular_bases_use_their_own_extent() {
        // 40x24: every node has more rows than columns, so U needs more
        // rank than V to reach the tolerance
        let a = Matrix::from_fn(40, 24, |i, j| (-((i as f64 / 40.0 - j as f64 / 24.0).powi(2))).exp());
        for alg in [CompressionAlgorithm::Original, CompressionAlgorithm::Stable] {
            let opts = HSSOptions::default()
                .with_leaf_size(6)
                .with_rel_tol(1e-10)
                .with_abs_tol(1e-14)
                .with_compression_algorithm(alg);
            let mut h = HSSMatrix::new(40, 24, opts);
            let report = h.compress(&a).unwrap();
            assert!(report.compressed, "{alg}");
            let err = h.dense().unwrap().sub(&a).norm_fro() / a.norm_fro();
            assert!(err < 1e-8, "{alg}: relative error {err}");
        }
    }
}
