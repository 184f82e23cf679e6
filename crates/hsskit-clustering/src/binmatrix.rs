//! Binary matrix files: a raw row-major little-endian dump with no header
//!
//! The reader needs the dimensions up front; a file whose length does not
//! match them is rejected.

use crate::error::{ClusteringError, Result};
use hsskit_dense::Matrix;
use std::fs;
use std::io::Write;
use std::path::Path;

/// Element types that can be stored in a binary matrix file
pub trait BinElement: Copy + Sized {
    /// Bytes per element
    const SIZE: usize;

    /// Append the little-endian encoding to `out`
    fn write_le(self, out: &mut Vec<u8>);

    /// Decode from exactly [`Self::SIZE`] bytes
    fn read_le(bytes: &[u8]) -> Self;
}

impl BinElement for u32 {
    const SIZE: usize = 4;

    fn write_le(self, out: &mut Vec<u8>) {
        out.extend_from_slice(&self.to_le_bytes());
    }

    fn read_le(bytes: &[u8]) -> Self {
        let mut b = [0u8; 4];
        b.copy_from_slice(bytes);
        u32::from_le_bytes(b)
    }
}

impl BinElement for f64 {
    const SIZE: usize = 8;

    fn write_le(self, out: &mut Vec<u8>) {
        out.extend_from_slice(&self.to_le_bytes());
    }

    fn read_le(bytes: &[u8]) -> Self {
        let mut b = [0u8; 8];
        b.copy_from_slice(bytes);
        f64::from_le_bytes(b)
    }
}

/// Write `m` to `path`, replacing any existing file
pub fn write_binmatrix<T: BinElement>(path: &Path, m: &Matrix<T>) -> Result<()> {
    let mut buf = Vec::with_capacity(m.as_slice().len() * T::SIZE);
    for &x in m.as_slice() {
        x.write_le(&mut buf);
    }
    let mut f = fs::File::create(path)?;
    f.write_all(&buf)?;
    f.flush()?;
    Ok(())
}

/// Read an `nrows x ncols` matrix from `path`
pub fn read_binmatrix<T: BinElement>(path: &Path, nrows: usize, ncols: usize) -> Result<Matrix<T>> {
    let bytes = fs::read(path)?;
    let expected = nrows * ncols * T::SIZE;
    if bytes.len() != expected {
        return Err(ClusteringError::FileSize {
            path: path.display().to_string(),
            expected: expected as u64,
            actual: bytes.len() as u64,
        });
    }
    let data: Vec<T> = bytes.chunks_exact(T::SIZE).map(T::read_le).collect();
    Ok(Matrix::from_row_major(nrows, ncols, data)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_binmatrix_file_layout() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("m.binmatrix");
        let m = Matrix::from_fn(2, 3, |i, j| (10 * i + j) as u32);
        write_binmatrix(&path, &m).unwrap();

        let bytes = fs::read(&path).unwrap();
        assert_eq!(bytes.len(), 6 * 4);
        // row-major: second element is (0, 1)
        assert_eq!(&bytes[4..8], &1u32.to_le_bytes());
        assert_eq!(&bytes[12..16], &10u32.to_le_bytes());

        let back: Matrix<u32> = read_binmatrix(&path, 2, 3).unwrap();
        assert_eq!(back, m);
    }

    #[test]
    fn test_binmatrix_rejects_wrong_size() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("s.binmatrix");
        let m = Matrix::from_elem(3, 3, 0.5f64);
        write_binmatrix(&path, &m).unwrap();

        let err = read_binmatrix::<f64>(&path, 4, 3).unwrap_err();
        assert!(matches!(err, ClusteringError::FileSize { .. }));
        assert!(read_binmatrix::<f64>(&dir.path().join("missing"), 1, 1).is_err());
    }
}
