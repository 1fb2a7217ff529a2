use super::SparseBlock;
use crate::base::{gauss_points_cell, CellPad, DofIndex, DofMapper, FixedDofs, MultiPatch};
use crate::StrError;
use russell_lab::Vector;

/// Assembles the mass matrix M = ρ ∫ φ φ dΩ of a (vector-valued) field
///
/// Together with M (free × free), the assembler builds the elimination matrix E (free × fixed)
/// such that the contribution of the fixed DOFs to the right-hand side is `-E · fixed`.
/// Thus, new prescribed values can be taken into account without assembling again.
pub struct MassAssembler {
    mapper: DofMapper,
    density: f64,
    fixed: FixedDofs,
    matrix: Option<SparseBlock>,
    elimination: Option<SparseBlock>,
    rhs: Vector,
}

impl MassAssembler {
    /// Allocates a new instance
    pub fn new(mapper: DofMapper, density: f64, fixed: &FixedDofs) -> Result<Self, StrError> {
        if density <= 0.0 {
            return Err("density must be > 0.0");
        }
        mapper.check_fixed(fixed)?;
        let n = mapper.n_free();
        Ok(MassAssembler {
            mapper,
            density,
            fixed: fixed.clone(),
            matrix: None,
            elimination: None,
            rhs: Vector::new(n),
        })
    }

    /// Returns the number of free DOFs
    pub fn n_dof(&self) -> usize {
        self.mapper.n_free()
    }

    /// Returns true if the mass matrix has been assembled
    pub fn assembled(&self) -> bool {
        self.matrix.is_some()
    }

    /// Assembles the mass and elimination matrices on the given geometry
    ///
    /// Returns false if the geometry has cells with a non-positive Jacobian determinant.
    pub fn assemble(&mut self, mesh: &MultiPatch) -> Result<bool, StrError> {
        if mesh.nnode() != self.mapper.nnode() {
            return Err("the mesh is incompatible with the DOF mapper");
        }
        let n_free = self.mapper.n_free();
        let offsets = self.mapper.fixed_offsets();
        let mut mm = SparseBlock::new(n_free, n_free);
        let mut ee = SparseBlock::new(n_free, self.mapper.n_fixed_total());
        let points = gauss_points_cell();
        for (p, patch) in mesh.patches.iter().enumerate() {
            for j in 0..patch.nv {
                for i in 0..patch.nu {
                    let coords = mesh.cell_coords(p, i, j);
                    let nodes = patch.cell_nodes(i, j);
                    let mut local = [[0.0; 4]; 4];
                    for (ksi, weight) in &points {
                        let pad = CellPad::calc(&coords, ksi[0], ksi[1]);
                        if pad.det_jac <= 0.0 {
                            return Ok(false);
                        }
                        for a in 0..4 {
                            for b in 0..4 {
                                local[a][b] += self.density * pad.nn[a] * pad.nn[b] * pad.det_jac * weight;
                            }
                        }
                    }
                    for c in 0..self.mapper.ncomp() {
                        for a in 0..4 {
                            let row = match self.mapper.index(c, nodes[a]) {
                                DofIndex::Free(r) => r,
                                DofIndex::Fixed(_) => continue,
                            };
                            for b in 0..4 {
                                match self.mapper.index(c, nodes[b]) {
                                    DofIndex::Free(col) => mm.put(row, col, local[a][b])?,
                                    DofIndex::Fixed(k) => ee.put(row, offsets[c] + k, local[a][b])?,
                                }
                            }
                        }
                    }
                }
            }
        }
        self.matrix = Some(mm);
        self.elimination = Some(ee);
        Ok(true)
    }

    /// Computes the right-hand side `-E · fixed` from the current fixed DOFs
    pub fn eliminate_fixed_dofs(&mut self) -> Result<(), StrError> {
        let ee = match &self.elimination {
            Some(ee) => ee,
            None => return Err("the mass matrix must be assembled before eliminating the fixed DOFs"),
        };
        let flat = self.mapper.flatten_fixed(&self.fixed)?;
        self.rhs = ee.mat_vec_mul(-1.0, &flat)?;
        Ok(())
    }

    /// Replaces the fixed DOFs
    pub fn set_fixed_dofs(&mut self, fixed: &FixedDofs) -> Result<(), StrError> {
        self.mapper.check_fixed(fixed)?;
        self.fixed = fixed.clone();
        Ok(())
    }

    /// Returns the fixed DOFs
    pub fn fixed_dofs(&self) -> &FixedDofs {
        &self.fixed
    }

    /// Returns the mass matrix (free × free)
    pub fn matrix(&self) -> Result<&SparseBlock, StrError> {
        match &self.matrix {
            Some(mm) => Ok(mm),
            None => Err("the mass matrix has not been assembled"),
        }
    }

    /// Returns the right-hand side due to the fixed DOFs
    pub fn rhs(&self) -> &Vector {
        &self.rhs
    }

    /// Replaces the right-hand side
    pub fn set_rhs(&mut self, rhs: Vector) -> Result<(), StrError> {
        if rhs.dim() != self.n_dof() {
            return Err("the right-hand side has an incorrect dimension");
        }
        self.rhs = rhs;
        Ok(())
    }
}

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////
