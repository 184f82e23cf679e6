//! Row-major dense matrix

use crate::error::{DenseError, Result};
use crate::scalar::Scalar;
use num_traits::{One, Zero};
use std::ops::{Index, IndexMut};

/// Simple 2D matrix backed by a row-major `Vec`
#[derive(Debug, Clone, PartialEq)]
pub struct Matrix<T> {
    data: Vec<T>,
    nrows: usize,
    ncols: usize,
}

impl<T: Clone> Matrix<T> {
    /// Create a new matrix from dimensions and initial value
    pub fn from_elem(nrows: usize, ncols: usize, elem: T) -> Self {
        Self {
            data: vec![elem; nrows * ncols],
            nrows,
            ncols,
        }
    }

    /// Wrap a row-major buffer
    pub fn from_row_major(nrows: usize, ncols: usize, data: Vec<T>) -> Result<Self> {
        if data.len() != nrows * ncols {
            return Err(DenseError::BufferLength {
                expected: nrows * ncols,
                actual: data.len(),
            });
        }
        Ok(Self { data, nrows, ncols })
    }

    /// Build a matrix entry by entry
    pub fn from_fn(nrows: usize, ncols: usize, mut f: impl FnMut(usize, usize) -> T) -> Self {
        let mut data = Vec::with_capacity(nrows * ncols);
        for i in 0..nrows {
            for j in 0..ncols {
                data.push(f(i, j));
            }
        }
        Self { data, nrows, ncols }
    }

    /// Number of rows
    pub fn nrows(&self) -> usize {
        self.nrows
    }

    /// Number of columns
    pub fn ncols(&self) -> usize {
        self.ncols
    }

    /// `(nrows, ncols)`
    pub fn shape(&self) -> (usize, usize) {
        (self.nrows, self.ncols)
    }

    /// True if the matrix has no entries
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Row-major storage
    pub fn as_slice(&self) -> &[T] {
        &self.data
    }

    /// Mutable row-major storage
    pub fn as_mut_slice(&mut self) -> &mut [T] {
        &mut self.data
    }

    /// Consume the matrix and return its row-major storage
    pub fn into_vec(self) -> Vec<T> {
        self.data
    }

    /// Row `i` as a slice
    pub fn row(&self, i: usize) -> &[T] {
        &self.data[i * self.ncols..(i + 1) * self.ncols]
    }

    /// Row `i` as a mutable slice
    pub fn row_mut(&mut self, i: usize) -> &mut [T] {
        &mut self.data[i * self.ncols..(i + 1) * self.ncols]
    }

    /// Column `j` as a vector
    pub fn col(&self, j: usize) -> Vec<T> {
        (0..self.nrows).map(|i| self[[i, j]].clone()).collect()
    }

    /// Swap two rows in place
    pub fn swap_rows(&mut self, a: usize, b: usize) {
        if a == b {
            return;
        }
        let nc = self.ncols;
        for j in 0..nc {
            self.data.swap(a * nc + j, b * nc + j);
        }
    }

    /// Swap two columns in place
    pub fn swap_cols(&mut self, a: usize, b: usize) {
        if a == b {
            return;
        }
        let nc = self.ncols;
        for i in 0..self.nrows {
            self.data.swap(i * nc + a, i * nc + b);
        }
    }

    /// Rows selected by `rows`, in that order
    pub fn select_rows(&self, rows: &[usize]) -> Self {
        let mut data = Vec::with_capacity(rows.len() * self.ncols);
        for &r in rows {
            data.extend_from_slice(self.row(r));
        }
        Self {
            data,
            nrows: rows.len(),
            ncols: self.ncols,
        }
    }

    /// Columns selected by `cols`, in that order
    pub fn select_cols(&self, cols: &[usize]) -> Self {
        Self::from_fn(self.nrows, cols.len(), |i, j| self[[i, cols[j]]].clone())
    }

    /// Submatrix by selecting specific rows and columns
    pub fn submatrix(&self, rows: &[usize], cols: &[usize]) -> Self {
        Self::from_fn(rows.len(), cols.len(), |i, j| self[[rows[i], cols[j]]].clone())
    }

    /// Contiguous block starting at `(r0, c0)`
    pub fn block(&self, r0: usize, c0: usize, nr: usize, nc: usize) -> Self {
        debug_assert!(r0 + nr <= self.nrows && c0 + nc <= self.ncols);
        let mut data = Vec::with_capacity(nr * nc);
        for i in r0..r0 + nr {
            data.extend_from_slice(&self.row(i)[c0..c0 + nc]);
        }
        Self {
            data,
            nrows: nr,
            ncols: nc,
        }
    }

    /// Rows `start..start + len`
    pub fn rows_range(&self, start: usize, len: usize) -> Self {
        self.block(start, 0, len, self.ncols)
    }

    /// Columns `start..start + len`
    pub fn cols_range(&self, start: usize, len: usize) -> Self {
        self.block(0, start, self.nrows, len)
    }

    /// Overwrite the block starting at `(r0, c0)` with `src`
    pub fn set_block(&mut self, r0: usize, c0: usize, src: &Matrix<T>) {
        debug_assert!(r0 + src.nrows <= self.nrows && c0 + src.ncols <= self.ncols);
        let nc = src.ncols;
        for i in 0..src.nrows {
            self.row_mut(r0 + i)[c0..c0 + nc].clone_from_slice(src.row(i));
        }
    }

    /// Append the columns of `other` to the right
    pub fn append_cols(&mut self, other: &Matrix<T>) {
        if self.ncols == 0 && self.nrows == 0 {
            *self = other.clone();
            return;
        }
        assert_eq!(self.nrows, other.nrows);
        let nc = self.ncols + other.ncols;
        let mut data = Vec::with_capacity(self.nrows * nc);
        for i in 0..self.nrows {
            data.extend_from_slice(self.row(i));
            data.extend_from_slice(other.row(i));
        }
        self.data = data;
        self.ncols = nc;
    }

    /// Transpose the matrix
    pub fn transpose(&self) -> Self {
        Self::from_fn(self.ncols, self.nrows, |i, j| self[[j, i]].clone())
    }
}

impl<T: Clone + Zero> Matrix<T> {
    /// Create a zeros matrix
    pub fn zeros(nrows: usize, ncols: usize) -> Self {
        Self::from_elem(nrows, ncols, T::zero())
    }
}

impl<T: Clone + Zero + One> Matrix<T> {
    /// Create an identity matrix
    pub fn identity(n: usize) -> Self {
        let mut m = Self::zeros(n, n);
        for i in 0..n {
            m[[i, i]] = T::one();
        }
        m
    }
}

impl<T: Scalar> Matrix<T> {
    /// Conjugate transpose
    pub fn adjoint(&self) -> Self {
        Self::from_fn(self.ncols, self.nrows, |i, j| self[[j, i]].conj())
    }

    /// Add `src` into the block starting at `(r0, c0)`
    pub fn add_block(&mut self, r0: usize, c0: usize, src: &Matrix<T>) {
        debug_assert!(r0 + src.nrows <= self.nrows && c0 + src.ncols <= self.ncols);
        for i in 0..src.nrows {
            let row = &mut self.row_mut(r0 + i)[c0..c0 + src.ncols];
            for (a, &b) in row.iter_mut().zip(src.row(i)) {
                *a += b;
            }
        }
    }

    /// `self += alpha * other`
    pub fn axpy(&mut self, alpha: T, other: &Matrix<T>) {
        assert_eq!(self.shape(), other.shape());
        for (a, &b) in self.data.iter_mut().zip(&other.data) {
            *a += alpha * b;
        }
    }

    /// `self - other`
    pub fn sub(&self, other: &Matrix<T>) -> Matrix<T> {
        let mut out = self.clone();
        out.axpy(-T::one(), other);
        out
    }

    /// Multiply every entry by `alpha`
    pub fn scale(&mut self, alpha: T) {
        for a in self.data.iter_mut() {
            *a = *a * alpha;
        }
    }

    /// Frobenius norm
    pub fn norm_fro(&self) -> f64 {
        self.data.iter().map(|x| x.abs_sq()).sum::<f64>().sqrt()
    }

    /// Largest modulus of any entry
    pub fn norm_max(&self) -> f64 {
        self.data.iter().map(|x| x.abs()).fold(0.0, f64::max)
    }

    /// Euclidean norm of column `j`
    pub fn col_norm(&self, j: usize) -> f64 {
        (0..self.nrows)
            .map(|i| self[[i, j]].abs_sq())
            .sum::<f64>()
            .sqrt()
    }

    /// Check for NaN entries
    pub fn has_nan(&self) -> bool {
        self.data.iter().any(|x| x.is_nan())
    }
}

impl<T> Index<[usize; 2]> for Matrix<T> {
    type Output = T;

    fn index(&self, idx: [usize; 2]) -> &Self::Output {
        &self.data[idx[0] * self.ncols + idx[1]]
    }
}

impl<T> IndexMut<[usize; 2]> for Matrix<T> {
    fn index_mut(&mut self, idx: [usize; 2]) -> &mut Self::Output {
        &mut self.data[idx[0] * self.ncols + idx[1]]
    }
}

/// Create a zeros matrix with given dimensions
pub fn zeros<T: Clone + Zero>(nrows: usize, ncols: usize) -> Matrix<T> {
    Matrix::zeros(nrows, ncols)
}

/// Create an identity matrix
pub fn eye<T: Clone + Zero + One>(n: usize) -> Matrix<T> {
    Matrix::identity(n)
}

/// Create a matrix from a 2D vector (row-major)
pub fn from_vec2d<T: Clone + Zero>(data: Vec<Vec<T>>) -> Matrix<T> {
    let nrows = data.len();
    let ncols = if nrows > 0 { data[0].len() } else { 0 };
    Matrix::from_fn(nrows, ncols, |i, j| data[i][j].clone())
}

/// Stack matrices with equal column counts on top of each other
pub fn vconcat<T: Clone + Zero>(parts: &[&Matrix<T>]) -> Matrix<T> {
    let ncols = parts
        .iter()
        .find(|m| m.nrows > 0)
        .or(parts.first())
        .map_or(0, |m| m.ncols);
    let nrows = parts.iter().map(|m| m.nrows).sum();
    let mut data = Vec::with_capacity(nrows * ncols);
    for m in parts {
        if m.nrows == 0 {
            continue;
        }
        assert_eq!(m.ncols, ncols, "vconcat: column count mismatch");
        data.extend_from_slice(&m.data);
    }
    Matrix { data, nrows, ncols }
}

/// Place matrices with equal row counts side by side
pub fn hconcat<T: Clone + Zero>(parts: &[&Matrix<T>]) -> Matrix<T> {
    let nrows = parts
        .iter()
        .find(|m| m.ncols > 0)
        .or(parts.first())
        .map_or(0, |m| m.nrows);
    let ncols = parts.iter().map(|m| m.ncols).sum();
    let mut out = Matrix::zeros(nrows, ncols);
    let mut c0 = 0;
    for m in parts {
        if m.ncols == 0 {
            continue;
        }
        assert_eq!(m.nrows, nrows, "hconcat: row count mismatch");
        out.set_block(0, c0, m);
        c0 += m.ncols;
    }
    out
}

/// Block diagonal matrix `[[a, 0], [0, b]]`
pub fn block_diag<T: Clone + Zero>(a: &Matrix<T>, b: &Matrix<T>) -> Matrix<T> {
    let mut out = Matrix::zeros(a.nrows + b.nrows, a.ncols + b.ncols);
    out.set_block(0, 0, a);
    out.set_block(a.nrows, a.ncols, b);
    out
}
