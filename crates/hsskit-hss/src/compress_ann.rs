//! Compression from matrix entries guided by approximate nearest neighbors
//!
//! Instead of random projections, every node samples actual columns of its
//! off-diagonal block row: the neighbors of its points that lie outside the
//! node. For kernel matrices these columns carry most of the interaction, so
//! a row ID of `A(I, neighbors)` gives the node's basis. The matrix must be
//! symmetric: the column basis is taken equal to the row basis and
//! `B10 = B01^T`.

use crate::basis::HSSBasisID;
use crate::error::{HSSError, Result};
use crate::matrix::{Blocks, HSSMatrix, HSSNode, State};
use crate::metrics::{CompressionMetrics, CompressionReport};
use crate::options::HSSOptions;
use crate::parallel::join_if;
use crate::sampler::{ElementSampler, PointKernel};
use crate::work::WorkCompressANN;
use hsskit_clustering::{find_approximate_neighbors, AnnOptions, NeighborTable};
use hsskit_dense::{interpolative_rows, IdOptions, Matrix, Scalar};

struct AnnCtx<'a, T: Scalar, E: ElementSampler<T>> {
    table: &'a NeighborTable,
    elem: &'a E,
    opts: &'a HSSOptions,
    metrics: &'a CompressionMetrics,
    n: usize,
    _scalar: std::marker::PhantomData<fn() -> T>,
}

impl<T: Scalar> HSSMatrix<T> {
    /// Compress a symmetric kernel matrix with neighbor-guided sampling
    ///
    /// Starts with `opts.approximate_neighbors` neighbors and doubles the
    /// count, up to `n - 1`, until every node is certified. Neighbor tables
    /// are read from and written to `opts.scratch_folder` when it is set.
    pub fn compress_kernel<K: PointKernel<T>>(&mut self, kernel: &K) -> Result<CompressionReport> {
        let points = kernel.points();
        let n = points.nrows();
        if self.rows() != n || self.cols() != n {
            return Err(HSSError::DimensionMismatch {
                op: "compress_kernel",
                expected_rows: self.rows(),
                expected_cols: self.cols(),
                rows: n,
                cols: n,
            });
        }

        let metrics = CompressionMetrics::new();
        let kmax = n.saturating_sub(1);
        let mut k = self.opts.approximate_neighbors.clamp(1, kmax.max(1)).min(kmax);
        let mut rounds = 0;
        loop {
            let table = self.neighbor_table(points, k)?;
            rounds += 1;
            self.compress_ann_round(&table, kernel, &metrics);
            log::debug!(
                "ANN compression round {rounds}: k = {k}, rank = {}, compressed = {}",
                self.rank(),
                self.is_compressed()
            );
            if self.is_compressed() || k >= kmax {
                break;
            }
            k = (2 * k).min(kmax);
        }

        let compressed = self.is_compressed();
        if compressed {
            if self.opts.verbose {
                log::info!("ANN compression done: k = {k}, rank = {}", self.rank());
            }
        } else {
            log::warn!("ANN compression failed to certify every node with k = {k}");
        }
        Ok(CompressionReport {
            compressed,
            rounds,
            samples: k,
            rank: self.rank(),
            metrics: metrics.snapshot(),
        })
    }

    /// One round of neighbor-guided compression with a given table
    ///
    /// Nodes whose basis is not certified are left
    /// [`State::PartiallyCompressed`]; the matrix is still usable.
    pub fn compress_ann<E: ElementSampler<T>>(
        &mut self,
        table: &NeighborTable,
        elem: &E,
    ) -> Result<CompressionReport> {
        if table.n() != self.rows() || self.rows() != self.cols() {
            return Err(HSSError::DimensionMismatch {
                op: "compress_ann",
                expected_rows: self.rows(),
                expected_cols: self.cols(),
                rows: table.n(),
                cols: table.n(),
            });
        }
        let metrics = CompressionMetrics::new();
        self.compress_ann_round(table, elem, &metrics);
        Ok(CompressionReport {
            compressed: self.is_compressed(),
            rounds: 1,
            samples: table.k(),
            rank: self.rank(),
            metrics: metrics.snapshot(),
        })
    }

    fn compress_ann_round<E: ElementSampler<T>>(
        &mut self,
        table: &NeighborTable,
        elem: &E,
        metrics: &CompressionMetrics,
    ) {
        let ctx = AnnCtx {
            table,
            elem,
            opts: &self.opts,
            metrics,
            n: self.root.rows,
            _scalar: std::marker::PhantomData,
        };
        let mut w = WorkCompressANN::new(0, 0);
        self.root.compress_ann_node(&ctx, &mut w, 0);
    }

    fn neighbor_table(&self, points: &Matrix<f64>, k: usize) -> Result<NeighborTable> {
        let n = points.nrows();
        if let Some(folder) = &self.opts.scratch_folder {
            if let Some(table) = NeighborTable::load(folder, k, n) {
                return Ok(table);
            }
        }
        let ann_opts = AnnOptions {
            k,
            max_iterations: self.opts.ann_iterations,
            seed: self.opts.random_seed,
            ..AnnOptions::default()
        };
        let (table, report) = find_approximate_neighbors(points, &ann_opts)?;
        if self.opts.verbose {
            log::info!(
                "k = {k} neighbors: quality {:.4} after {} iterations",
                report.quality,
                report.iterations
            );
        }
        if let Some(folder) = &self.opts.scratch_folder {
            if let Err(e) = table.save(folder) {
                log::warn!("could not cache neighbors in {}: {e}", folder.display());
            }
        }
        Ok(table)
    }
}

impl<T: Scalar> HSSNode<T> {
    fn compress_ann_node<E: ElementSampler<T>>(
        &mut self,
        ctx: &AnnCtx<'_, T, E>,
        w: &mut WorkCompressANN<T>,
        depth: usize,
    ) {
        let offset = w.offset;
        let rows = self.rows;
        let (local_ids, children_ok) = match &mut self.blocks {
            Blocks::Leaf { d } => {
                if self.u_state == State::Untouched {
                    let ids: Vec<usize> = (offset..offset + rows).collect();
                    *d = ctx.elem.extract(&ids, &ids);
                    ctx.metrics.add_elements(rows * rows);
                    ctx.metrics.add_dense(rows * rows * std::mem::size_of::<T>());
                }
                ((offset..offset + rows).collect::<Vec<_>>(), true)
            }
            Blocks::Internal { children, b01, b10 } => {
                let [ch0, ch1] = &mut **children;
                w.c = vec![
                    WorkCompressANN::new(offset, w.lvl + 1),
                    WorkCompressANN::new(offset + ch0.rows, w.lvl + 1),
                ];
                let (w0, w1) = w.c.split_at_mut(1);
                join_if(
                    depth,
                    ctx.opts.task_recursion_cutoff,
                    || ch0.compress_ann_node(ctx, &mut w0[0], depth + 1),
                    || ch1.compress_ann_node(ctx, &mut w1[0], depth + 1),
                );
                *b01 = ctx.elem.extract(&w.c[0].ir, &w.c[1].ir);
                *b10 = b01.transpose();
                let entries = b01.nrows() * b01.ncols();
                ctx.metrics.add_elements(entries);
                ctx.metrics.add_coupling(2 * entries * std::mem::size_of::<T>());
                (
                    [w.c[0].ir.as_slice(), w.c[1].ir.as_slice()].concat(),
                    ch0.u_state == State::Compressed && ch1.u_state == State::Compressed,
                )
            }
        };

        if w.lvl == 0 {
            let state = if children_ok {
                State::Compressed
            } else {
                State::PartiallyCompressed
            };
            self.u = HSSBasisID::zero_rank(local_ids.len());
            self.v = HSSBasisID::zero_rank(local_ids.len());
            self.u_state = state;
            self.v_state = state;
            return;
        }

        self.collect_candidates(ctx, w);
        self.sample_candidates(ctx, w, &local_ids);

        let lvl = w.lvl as f64;
        let id = interpolative_rows(
            &w.s,
            &IdOptions {
                rel_tol: ctx.opts.rel_tol / lvl,
                abs_tol: ctx.opts.abs_tol / lvl,
                max_rank: ctx.opts.max_rank.min(local_ids.len()),
            },
        );
        let d = w.ids.len();
        let width = d.saturating_sub(ctx.opts.p);
        let accurate = width >= ctx.opts.max_rank || id.rank < width || d + rows >= ctx.n;
        if !accurate {
            log::debug!(
                "level {} node of {rows} rows: rank {} not certified by {d} sample columns",
                w.lvl,
                id.rank
            );
        }

        let basis = HSSBasisID::from_row_id(id);
        w.jr = basis.skeleton().to_vec();
        w.ir = w.jr.iter().map(|&i| local_ids[i]).collect();
        ctx.metrics.add_basis(2 * basis.memory());
        let state = if accurate && children_ok {
            State::Compressed
        } else {
            State::PartiallyCompressed
        };
        self.v = basis.clone();
        self.u = basis;
        self.u_state = state;
        self.v_state = state;
    }

    /// Neighbors of the node's points that lie outside the node, sorted by id
    /// with the best distance per id
    fn collect_candidates<E: ElementSampler<T>>(&self, ctx: &AnnCtx<'_, T, E>, w: &mut WorkCompressANN<T>) {
        let (lo, hi) = (w.offset, w.offset + self.rows);
        let outside = |id: usize| id < lo || id >= hi;
        let mut cand: Vec<(usize, f64)> = match self.children() {
            None => (lo..hi)
                .flat_map(|i| (0..ctx.table.k()).map(move |j| (i, j)))
                .map(|(i, j)| (ctx.table.neighbor(j, i), ctx.table.score(j, i)))
                .filter(|&(id, _)| outside(id))
                .collect(),
            Some(_) => w
                .c
                .iter()
                .flat_map(|c| c.ids.iter().copied().zip(c.scores.iter().copied()))
                .filter(|&(id, _)| outside(id))
                .collect(),
        };
        cand.sort_by(|a, b| a.0.cmp(&b.0).then(a.1.total_cmp(&b.1)));
        cand.dedup_by_key(|c| c.0);

        let keep = self.rows + ctx.opts.dd;
        if ctx.opts.drop_ann_columns && cand.len() > keep {
            cand.sort_by(|a, b| a.1.total_cmp(&b.1).then(a.0.cmp(&b.0)));
            cand.truncate(keep);
            cand.sort_by_key(|c| c.0);
        }
        w.ids = cand.iter().map(|c| c.0).collect();
        w.scores = cand.iter().map(|c| c.1).collect();
    }

    /// Fill `w.s = A(local rows, w.ids)`, reusing columns the children
    /// already sampled
    fn sample_candidates<E: ElementSampler<T>>(
        &self,
        ctx: &AnnCtx<'_, T, E>,
        w: &mut WorkCompressANN<T>,
        local_ids: &[usize],
    ) {
        let ncols = w.ids.len();
        if self.is_leaf() {
            w.s = ctx.elem.extract(local_ids, &w.ids);
            ctx.metrics.add_elements(local_ids.len() * ncols);
            return;
        }
        let mut s = Matrix::zeros(local_ids.len(), ncols);
        let mut row0 = 0;
        for c in &w.c {
            for (k, &id) in w.ids.iter().enumerate() {
                match c.ids.binary_search(&id) {
                    Ok(pos) => {
                        for (r, &jr) in c.jr.iter().enumerate() {
                            s[[row0 + r, k]] = c.s[[jr, pos]];
                        }
                    }
                    Err(_) => {
                        let col = ctx.elem.extract(&c.ir, &[id]);
                        ctx.metrics.add_elements(c.ir.len());
                        for r in 0..c.ir.len() {
                            s[[row0 + r, k]] = col[[r, 0]];
                        }
                    }
                }
            }
            row0 += c.ir.len();
        }
        w.s = s;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hsskit_dense::Matrix;

    struct LineKernel {
        points: Matrix<f64>,
    }

    impl ElementSampler<f64> for LineKernel {
        fn element(&self, i: usize, j: usize) -> f64 {
            let d = self.points[[i, 0]] - self.points[[j, 0]];
            (-d * d / 0.5).exp() + if i == j { 1e-2 } else { 0.0 }
        }
    }

    impl PointKernel<f64> for LineKernel {
        fn points(&self) -> &Matrix<f64> {
            &self.points
        }
    }

    fn line_kernel(n: usize) -> LineKernel {
        LineKernel {
            points: Matrix::from_fn(n, 1, |i, _| i as f64 / n as f64),
        }
    }

    #[test]
    fn test_candidates_exclude_node_and_are_sorted() {
        let kernel = line_kernel(64);
        let (table, _) = find_approximate_neighbors(kernel.points(), &AnnOptions::default().with_k(6)).unwrap();
        let opts = HSSOptions::default().with_leaf_size(16);
        let mut h: HSSMatrix<f64> = HSSMatrix::new(64, 64, opts);
        h.compress_ann(&table, &kernel).unwrap();

        let node = h.child(1).unwrap().child(0).unwrap();
        let metrics = CompressionMetrics::new();
        let ctx = AnnCtx {
            table: &table,
            elem: &kernel,
            opts: h.options(),
            metrics: &metrics,
            n: 64,
            _scalar: std::marker::PhantomData,
        };
        let mut w = WorkCompressANN::new(32, 2);
        node.collect_candidates(&ctx, &mut w);
        assert!(!w.ids.is_empty());
        assert!(w.ids.windows(2).all(|p| p[0] < p[1]));
        assert!(w.ids.iter().all(|&id| !(32..48).contains(&id)));
    }

    #[test]
    fn test_ann_symmetric_bases() {
        let kernel = line_kernel(128);
        let opts = HSSOptions::default()
            .with_leaf_size(16)
            .with_rel_tol(1e-6)
            .with_approximate_neighbors(16);
        let mut h: HSSMatrix<f64> = HSSMatrix::new(128, 128, opts);
        let report = h.compress_kernel(&kernel).unwrap();
        assert!(report.compressed);
        assert!(h.check());
        let c0 = h.child(0).unwrap();
        assert_eq!(c0.u(), c0.v());
        assert!(report.metrics.element_evaluations > 0);
    }

    #[test]
    fn test_compress_ann_rejects_wrong_table() {
        let kernel = line_kernel(20);
        let (table, _) = find_approximate_neighbors(kernel.points(), &AnnOptions::default().with_k(3)).unwrap();
        let mut h: HSSMatrix<f64> = HSSMatrix::new(30, 30, HSSOptions::default());
        assert!(h.compress_ann(&table, &kernel).is_err());
    }
}
