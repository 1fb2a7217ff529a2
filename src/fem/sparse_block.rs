use crate::StrError;
use russell_lab::{Matrix, Vector};

/// Holds a sparse matrix block in triplet (coordinate) format
///
/// Repeated (i, j) entries are summed.
#[derive(Clone, Debug, PartialEq)]
pub struct SparseBlock {
    nrow: usize,
    ncol: usize,
    entries: Vec<(usize, usize, f64)>,
}

impl SparseBlock {
    /// Allocates an empty block
    pub fn new(nrow: usize, ncol: usize) -> Self {
        SparseBlock {
            nrow,
            ncol,
            entries: Vec::new(),
        }
    }

    /// Returns the number of rows
    #[inline]
    pub fn nrow(&self) -> usize {
        self.nrow
    }

    /// Returns the number of columns
    #[inline]
    pub fn ncol(&self) -> usize {
        self.ncol
    }

    /// Returns the number of stored entries (including repeated ones)
    #[inline]
    pub fn nnz(&self) -> usize {
        self.entries.len()
    }

    /// Returns the stored entries
    pub fn entries(&self) -> &[(usize, usize, f64)] {
        &self.entries
    }

    /// Adds a value to entry (i, j)
    pub fn put(&mut self, i: usize, j: usize, value: f64) -> Result<(), StrError> {
        if i >= self.nrow || j >= self.ncol {
            return Err("sparse block index is out of range");
        }
        if value != 0.0 {
            self.entries.push((i, j, value));
        }
        Ok(())
    }

    /// Computes v += α · A · u
    pub fn mat_vec_add(&self, v: &mut Vector, alpha: f64, u: &Vector) -> Result<(), StrError> {
        if u.dim() != self.ncol || v.dim() != self.nrow {
            return Err("vectors are incompatible with the sparse block");
        }
        for (i, j, a) in &self.entries {
            v[*i] += alpha * a * u[*j];
        }
        Ok(())
    }

    /// Returns α · A · u
    pub fn mat_vec_mul(&self, alpha: f64, u: &Vector) -> Result<Vector, StrError> {
        let mut v = Vector::new(self.nrow);
        self.mat_vec_add(&mut v, alpha, u)?;
        Ok(v)
    }

    /// Returns the dense version of this block
    pub fn to_dense(&self) -> Matrix {
        let mut a = Matrix::new(self.nrow, self.ncol);
        for (i, j, value) in &self.entries {
            a.set(*i, *j, a.get(*i, *j) + value);
        }
        a
    }
}

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////

#[cfg(test)]
mod tests {
    use super::SparseBlock;
    use russell_lab::Vector;

    #[test]
    fn put_and_multiply_work() {
        let mut a = SparseBlock::new(2, 3);
        assert_eq!(a.put(2, 0, 1.0).err(), Some("sparse block index is out of range"));
        a.put(0, 0, 1.0).unwrap();
        a.put(0, 2, 2.0).unwrap();
        a.put(1, 1, 3.0).unwrap();
        a.put(1, 1, 1.0).unwrap();
        a.put(1, 2, 0.0).unwrap(); // not stored
        assert_eq!(a.nnz(), 4);
        let dense = a.to_dense();
        assert_eq!(dense.get(1, 1), 4.0);
        let u = Vector::from(&[1.0, 2.0, 3.0]);
        let v = a.mat_vec_mul(2.0, &u).unwrap();
        assert_eq!(v.as_data(), &[14.0, 16.0]);
        let mut w = Vector::from(&[1.0, 1.0]);
        a.mat_vec_add(&mut w, -1.0, &u).unwrap();
        assert_eq!(w.as_data(), &[-6.0, -7.0]);
        assert_eq!(
            a.mat_vec_mul(1.0, &w).err(),
            Some("vectors are incompatible with the sparse block")
        );
    }
}
