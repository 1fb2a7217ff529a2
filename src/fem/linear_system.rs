use super::SparseBlock;
use crate::StrError;
use russell_lab::Vector;
use russell_sparse::{Genie, LinSolver, SparseMatrix, Sym};

/// Holds a square sparse linear system A · x = b
#[derive(Clone, Debug)]
pub struct LinearSystem {
    /// Coefficient matrix
    pub matrix: SparseBlock,

    /// Right-hand side vector
    pub rhs: Vector,
}

impl LinearSystem {
    /// Allocates a new instance
    pub fn new(matrix: SparseBlock, rhs: Vector) -> Result<Self, StrError> {
        if matrix.nrow() != matrix.ncol() {
            return Err("the matrix of a linear system must be square");
        }
        if matrix.nrow() != rhs.dim() {
            return Err("the right-hand side is incompatible with the matrix");
        }
        Ok(LinearSystem { matrix, rhs })
    }

    /// Returns the number of equations
    #[inline]
    pub fn dim(&self) -> usize {
        self.rhs.dim()
    }

    /// Solves the linear system with a direct sparse solver
    ///
    /// Returns an error if the factorization fails (e.g., singular matrix) or if the
    /// solution contains NaN or Inf values.
    pub fn solve(&self, genie: Genie, verbose: bool) -> Result<Vector, StrError> {
        let n = self.dim();
        let mut x = Vector::new(n);
        if n == 0 {
            return Ok(x);
        }
        let nnz = usize::max(self.matrix.nnz(), 1);
        let mut kk = SparseMatrix::new_coo(n, n, nnz, Sym::No)?;
        for (i, j, value) in self.matrix.entries() {
            kk.put(*i, *j, *value)?;
        }
        let mut solver = LinSolver::new(genie)?;
        solver.actual.factorize(&mut kk, None)?;
        solver.actual.solve(&mut x, &kk, &self.rhs, verbose)?;
        if x.as_data().iter().any(|v| !v.is_finite()) {
            return Err("the solution of the linear system contains NaN or Inf");
        }
        Ok(x)
    }
}

/// Holds one scaled sub-block of a block operator
struct BlockTerm<'a> {
    row: usize,
    col: usize,
    scale: f64,
    block: &'a SparseBlock,
}

/// Composes a square operator from scaled sub-blocks placed at given offsets
///
/// Overlapping sub-blocks are summed. The sub-blocks are borrowed; nothing is modified in place.
pub struct BlockBuilder<'a> {
    size: usize,
    terms: Vec<BlockTerm<'a>>,
}

impl<'a> BlockBuilder<'a> {
    /// Allocates a new builder of a size × size operator
    pub fn new(size: usize) -> Self {
        BlockBuilder { size, terms: Vec::new() }
    }

    /// Adds scale · block with its first entry at (row, col)
    pub fn add(&mut self, row: usize, col: usize, scale: f64, block: &'a SparseBlock) -> Result<&mut Self, StrError> {
        if row + block.nrow() > self.size || col + block.ncol() > self.size {
            return Err("sub-block does not fit into the operator");
        }
        self.terms.push(BlockTerm { row, col, scale, block });
        Ok(self)
    }

    /// Builds the operator
    pub fn build(&self) -> Result<SparseBlock, StrError> {
        let mut matrix = SparseBlock::new(self.size, self.size);
        for term in &self.terms {
            if term.scale == 0.0 {
                continue;
            }
            for (i, j, value) in term.block.entries() {
                matrix.put(term.row + i, term.col + j, term.scale * value)?;
            }
        }
        Ok(matrix)
    }

    /// Builds the linear system with the given right-hand side
    pub fn build_system(&self, rhs: Vector) -> Result<LinearSystem, StrError> {
        LinearSystem::new(self.build()?, rhs)
    }
}

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////
