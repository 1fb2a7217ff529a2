use super::{gauss_points_cell, q1_shape, CellPad, DofIndex, DofMapper, FixedDofs, MultiPatch, Side};
use crate::StrError;
use russell_lab::{Matrix, Vector};

/// Holds the nodal values of a (vector- or scalar-valued) field on a multi-patch mesh
#[derive(Clone, Debug)]
pub struct Field {
    /// Nodal values (nnode, ncomp)
    pub values: Matrix,
}

impl Field {
    /// Allocates a zero-valued field
    pub fn new(nnode: usize, ncomp: usize) -> Self {
        Field {
            values: Matrix::new(nnode, ncomp),
        }
    }

    /// Decodes a field from free values and fixed DOFs
    ///
    /// `free` holds the block-local free values of the mapper (length `n_free`).
    pub fn from_dofs(mapper: &DofMapper, free: &[f64], fixed: &FixedDofs) -> Result<Self, StrError> {
        if free.len() != mapper.n_free() {
            return Err("the number of free values does not match the number of free DOFs");
        }
        mapper.check_fixed(fixed)?;
        let mut field = Field::new(mapper.nnode(), mapper.ncomp());
        for c in 0..mapper.ncomp() {
            for n in 0..mapper.nnode() {
                let value = match mapper.index(c, n) {
                    DofIndex::Free(i) => free[i],
                    DofIndex::Fixed(k) => fixed.values[mapper.first() + c][k],
                };
                field.values.set(n, c, value);
            }
        }
        Ok(field)
    }

    /// Returns the number of nodes
    #[inline]
    pub fn nnode(&self) -> usize {
        self.values.dims().0
    }

    /// Returns the number of components
    #[inline]
    pub fn ncomp(&self) -> usize {
        self.values.dims().1
    }

    /// Returns the value of a component at a node
    #[inline]
    pub fn get(&self, node: usize, comp: usize) -> f64 {
        self.values.get(node, comp)
    }

    /// Sets the value of a component at a node
    #[inline]
    pub fn set(&mut self, node: usize, comp: usize, value: f64) {
        self.values.set(node, comp, value);
    }

    /// Returns the free values of this field as numbered by the mapper
    pub fn free_values(&self, mapper: &DofMapper) -> Result<Vector, StrError> {
        if mapper.nnode() != self.nnode() || mapper.ncomp() != self.ncomp() {
            return Err("the field is incompatible with the DOF mapper");
        }
        let mut free = Vector::new(mapper.n_free());
        for c in 0..self.ncomp() {
            for n in 0..self.nnode() {
                if let DofIndex::Free(i) = mapper.index(c, n) {
                    free[i] = self.get(n, c);
                }
            }
        }
        Ok(free)
    }

    /// Evaluates the field at the parametric point (u, v) ∈ [0,1]² of a patch
    pub fn eval(&self, mesh: &MultiPatch, patch: usize, u: f64, v: f64) -> Result<Vec<f64>, StrError> {
        self.check_mesh(mesh)?;
        let p = match mesh.patches.get(patch) {
            Some(p) => p,
            None => return Err("patch index is out of range"),
        };
        let (i, j, xi, eta) = p.locate(u, v);
        let nn = q1_shape(xi, eta);
        let nodes = p.cell_nodes(i, j);
        let mut res = vec![0.0; self.ncomp()];
        for c in 0..self.ncomp() {
            for m in 0..4 {
                res[c] += nn[m] * self.get(nodes[m], c);
            }
        }
        Ok(res)
    }

    /// Returns the values along a patch side as a (n_side_node, ncomp) matrix
    pub fn side_values(&self, mesh: &MultiPatch, patch: usize, side: Side) -> Result<Matrix, StrError> {
        self.check_mesh(mesh)?;
        let nodes = mesh.side_nodes(patch, side)?;
        let mut values = Matrix::new(nodes.len(), self.ncomp());
        for (m, n) in nodes.iter().enumerate() {
            for c in 0..self.ncomp() {
                values.set(m, c, self.get(*n, c));
            }
        }
        Ok(values)
    }

    /// Computes the L2 norm of the field over the mesh, i.e., sqrt(∫ |f|² dΩ)
    pub fn l2_norm(&self, mesh: &MultiPatch) -> Result<f64, StrError> {
        self.check_mesh(mesh)?;
        let points = gauss_points_cell();
        let mut sum = 0.0;
        for (p, patch) in mesh.patches.iter().enumerate() {
            for j in 0..patch.nv {
                for i in 0..patch.nu {
                    let coords = mesh.cell_coords(p, i, j);
                    let nodes = patch.cell_nodes(i, j);
                    for (ksi, weight) in &points {
                        let pad = CellPad::calc(&coords, ksi[0], ksi[1]);
                        for c in 0..self.ncomp() {
                            let mut f = 0.0;
                            for m in 0..4 {
                                f += pad.nn[m] * self.get(nodes[m], c);
                            }
                            sum += f * f * pad.det_jac * weight;
                        }
                    }
                }
            }
        }
        Ok(f64::sqrt(sum))
    }

    /// Returns the nodal values as vectors (one entry per node)
    pub fn as_vectors(&self) -> Result<Vec<[f64; 2]>, StrError> {
        if self.ncomp() != 2 {
            return Err("the field must have two components");
        }
        Ok((0..self.nnode()).map(|n| [self.get(n, 0), self.get(n, 1)]).collect())
    }

    fn check_mesh(&self, mesh: &MultiPatch) -> Result<(), StrError> {
        if mesh.nnode() != self.nnode() {
            return Err("the field is incompatible with the mesh");
        }
        Ok(())
    }
}

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////

#[cfg(test)]
mod tests {
    use super::Field;
    use crate::base::{BoundaryConditions, DofMapper, FixedDofs, MultiPatch, Side};
    use russell_lab::approx_eq;

    fn unit_square(n: usize) -> MultiPatch {
        let mut mesh = MultiPatch::new();
        mesh.add_quad_patch([[0.0, 0.0], [1.0, 0.0], [1.0, 1.0], [0.0, 1.0]], n, n)
            .unwrap();
        mesh
    }

    #[test]
    fn from_dofs_works() {
        let mesh = unit_square(1);
        let mut bcs = BoundaryConditions::new();
        bcs.dirichlet(0, Side::West, 0, |x| 10.0 + x[1]);
        let mapper = DofMapper::from_conditions(&mesh, &bcs, 1, 0).unwrap();
        let mut fixed = FixedDofs::new(&[&mapper]);
        mapper.fixed_from_conditions(&mesh, &bcs, &mut fixed).unwrap();
        assert_eq!(
            Field::from_dofs(&mapper, &[1.0], &fixed).err(),
            Some("the number of free values does not match the number of free DOFs")
        );
        let field = Field::from_dofs(&mapper, &[1.0, 2.0], &fixed).unwrap();
        // nodes: 0 (0,0) fixed; 1 (1,0) free; 2 (0,1) fixed; 3 (1,1) free
        assert_eq!(field.get(0, 0), 10.0);
        assert_eq!(field.get(1, 0), 1.0);
        assert_eq!(field.get(2, 0), 11.0);
        assert_eq!(field.get(3, 0), 2.0);
        let free = field.free_values(&mapper).unwrap();
        assert_eq!(free.as_data(), &[1.0, 2.0]);
    }

    #[test]
    fn eval_and_side_values_work() {
        let mesh = unit_square(2);
        let mut field = Field::new(mesh.nnode(), 2);
        for n in 0..mesh.nnode() {
            let x = mesh.coords[n];
            field.set(n, 0, 2.0 * x[0] + 3.0 * x[1]);
            field.set(n, 1, x[0] * x[1]);
        }
        let res = field.eval(&mesh, 0, 0.3, 0.8).unwrap();
        approx_eq(res[0], 0.6 + 2.4, 1e-15);
        approx_eq(res[1], 0.24, 1e-15);
        let side = field.side_values(&mesh, 0, Side::North).unwrap();
        assert_eq!(side.dims(), (3, 2));
        approx_eq(side.get(2, 0), 5.0, 1e-15);
        assert_eq!(field.eval(&mesh, 1, 0.0, 0.0).err(), Some("patch index is out of range"));
        let other = unit_square(1);
        assert_eq!(
            field.eval(&other, 0, 0.0, 0.0).err(),
            Some("the field is incompatible with the mesh")
        );
    }

    #[test]
    fn l2_norm_works() {
        let mesh = unit_square(2);
        let mut field = Field::new(mesh.nnode(), 2);
        for n in 0..mesh.nnode() {
            field.set(n, 0, 3.0);
            field.set(n, 1, 4.0);
        }
        approx_eq(field.l2_norm(&mesh).unwrap(), 5.0, 1e-14);
        let vectors = field.as_vectors().unwrap();
        assert_eq!(vectors[0], [3.0, 4.0]);
    }
}
