use super::{BoundaryConditions, MultiPatch, Side};
use crate::StrError;
use russell_lab::{Matrix, Vector};
use serde::{Deserialize, Serialize};

/// Identifies where the value of a nodal DOF is stored
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum DofIndex {
    /// Position in the (block-local) solution vector
    Free(usize),

    /// Position in the vector of fixed values of the component
    Fixed(usize),
}

/// Maps nodal DOFs of a vector- or scalar-valued field to free and fixed positions
///
/// Free DOFs are numbered component-major: all free values of the first component,
/// then all free values of the second component, and so on. Fixed DOFs are numbered
/// per component following the node order.
#[derive(Clone, Debug)]
pub struct DofMapper {
    /// Index of the first component in the associated FixedDofs
    first: usize,

    /// (ncomp, nnode)
    index: Vec<Vec<DofIndex>>,

    /// Node ids of the fixed DOFs of each component (ncomp)
    fixed_nodes: Vec<Vec<usize>>,

    /// Total number of free DOFs
    n_free: usize,
}

impl DofMapper {
    /// Allocates a new instance
    ///
    /// # Input
    ///
    /// * `fixed` -- (ncomp, nnode) flags indicating the prescribed DOFs
    /// * `first` -- index of the first component in the FixedDofs shared with other mappers
    pub fn new(fixed: &[Vec<bool>], first: usize) -> Result<Self, StrError> {
        if fixed.len() == 0 {
            return Err("the number of components must be ≥ 1");
        }
        let nnode = fixed[0].len();
        let mut index = Vec::with_capacity(fixed.len());
        let mut fixed_nodes = Vec::with_capacity(fixed.len());
        let mut n_free = 0;
        for flags in fixed {
            if flags.len() != nnode {
                return Err("all components must have the same number of nodes");
            }
            let mut idx = Vec::with_capacity(nnode);
            let mut nodes = Vec::new();
            for (n, is_fixed) in flags.iter().enumerate() {
                if *is_fixed {
                    idx.push(DofIndex::Fixed(nodes.len()));
                    nodes.push(n);
                } else {
                    idx.push(DofIndex::Free(n_free));
                    n_free += 1;
                }
            }
            index.push(idx);
            fixed_nodes.push(nodes);
        }
        Ok(DofMapper {
            first,
            index,
            fixed_nodes,
            n_free,
        })
    }

    /// Allocates a new instance from boundary conditions
    pub fn from_conditions(
        mesh: &MultiPatch,
        bcs: &BoundaryConditions,
        ncomp: usize,
        first: usize,
    ) -> Result<Self, StrError> {
        let flags = bcs.fixed_flags(mesh, ncomp)?;
        DofMapper::new(&flags, first)
    }

    /// Returns the number of components
    #[inline]
    pub fn ncomp(&self) -> usize {
        self.index.len()
    }

    /// Returns the number of nodes
    #[inline]
    pub fn nnode(&self) -> usize {
        self.index[0].len()
    }

    /// Returns the index of the first component in the associated FixedDofs
    #[inline]
    pub fn first(&self) -> usize {
        self.first
    }

    /// Returns the total number of free DOFs
    #[inline]
    pub fn n_free(&self) -> usize {
        self.n_free
    }

    /// Returns the number of fixed DOFs of a component
    #[inline]
    pub fn n_fixed(&self, comp: usize) -> usize {
        self.fixed_nodes[comp].len()
    }

    /// Returns the total number of fixed DOFs
    pub fn n_fixed_total(&self) -> usize {
        self.fixed_nodes.iter().map(|f| f.len()).sum()
    }

    /// Returns where the DOF (comp, node) is stored
    #[inline]
    pub fn index(&self, comp: usize, node: usize) -> DofIndex {
        self.index[comp][node]
    }

    /// Returns the node ids of the fixed DOFs of a component
    pub fn fixed_nodes(&self, comp: usize) -> &[usize] {
        &self.fixed_nodes[comp]
    }

    /// Returns the offset of each component in the flattened vector of fixed values
    pub fn fixed_offsets(&self) -> Vec<usize> {
        let mut offsets = Vec::with_capacity(self.ncomp());
        let mut acc = 0;
        for nodes in &self.fixed_nodes {
            offsets.push(acc);
            acc += nodes.len();
        }
        offsets
    }

    /// Collects the fixed values of this mapper's components into one vector
    pub fn flatten_fixed(&self, fixed: &FixedDofs) -> Result<Vector, StrError> {
        self.check_fixed(fixed)?;
        let mut flat = Vector::new(self.n_fixed_total());
        let mut k = 0;
        for c in 0..self.ncomp() {
            for value in &fixed.values[self.first + c] {
                flat[k] = *value;
                k += 1;
            }
        }
        Ok(flat)
    }

    /// Checks whether the fixed values are compatible with this mapper
    pub fn check_fixed(&self, fixed: &FixedDofs) -> Result<(), StrError> {
        if fixed.values.len() < self.first + self.ncomp() {
            return Err("fixed DOFs do not have enough components");
        }
        for c in 0..self.ncomp() {
            if fixed.values[self.first + c].len() != self.n_fixed(c) {
                return Err("fixed DOFs do not match the number of prescribed DOFs");
            }
        }
        Ok(())
    }

    /// Returns the nodal values of the fixed DOFs computed from the boundary conditions
    pub fn fixed_from_conditions(
        &self,
        mesh: &MultiPatch,
        bcs: &BoundaryConditions,
        fixed: &mut FixedDofs,
    ) -> Result<(), StrError> {
        self.check_fixed(fixed)?;
        let values = bcs.nodal_values(mesh, self.ncomp())?;
        for c in 0..self.ncomp() {
            for (k, n) in self.fixed_nodes[c].iter().enumerate() {
                fixed.values[self.first + c][k] = values[c][*n];
            }
        }
        Ok(())
    }

    /// Returns the fixed values along a patch side as a (n_side_node, ncomp) matrix
    pub fn side_fixed(&self, mesh: &MultiPatch, fixed: &FixedDofs, patch: usize, side: Side) -> Result<Matrix, StrError> {
        self.check_fixed(fixed)?;
        let nodes = mesh.side_nodes(patch, side)?;
        let mut values = Matrix::new(nodes.len(), self.ncomp());
        for (m, n) in nodes.iter().enumerate() {
            for c in 0..self.ncomp() {
                match self.index(c, *n) {
                    DofIndex::Fixed(k) => values.set(m, c, fixed.values[self.first + c][k]),
                    DofIndex::Free(_) => return Err("the side contains DOFs that are not fixed"),
                }
            }
        }
        Ok(values)
    }

    /// Sets the fixed values along a patch side from a (n_side_node, ncomp) matrix
    pub fn set_side_fixed(
        &self,
        mesh: &MultiPatch,
        fixed: &mut FixedDofs,
        patch: usize,
        side: Side,
        values: &Matrix,
    ) -> Result<(), StrError> {
        self.check_fixed(fixed)?;
        let nodes = mesh.side_nodes(patch, side)?;
        if values.dims() != (nodes.len(), self.ncomp()) {
            return Err("side values matrix has incompatible dimensions");
        }
        for (m, n) in nodes.iter().enumerate() {
            for c in 0..self.ncomp() {
                match self.index(c, *n) {
                    DofIndex::Fixed(k) => fixed.values[self.first + c][k] = values.get(m, c),
                    DofIndex::Free(_) => return Err("the side contains DOFs that are not fixed"),
                }
            }
        }
        Ok(())
    }
}

/// Holds the prescribed values of the fixed DOFs, one vector per component
#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
pub struct FixedDofs {
    /// Fixed values of each component, in the order given by DofMapper::fixed_nodes
    pub values: Vec<Vec<f64>>,
}

impl FixedDofs {
    /// Allocates zero-valued fixed DOFs for a set of mappers sharing this instance
    pub fn new(mappers: &[&DofMapper]) -> Self {
        let ncomp = mappers.iter().map(|m| m.first() + m.ncomp()).max().unwrap_or(0);
        let mut values = vec![Vec::new(); ncomp];
        for mapper in mappers {
            for c in 0..mapper.ncomp() {
                values[mapper.first() + c] = vec![0.0; mapper.n_fixed(c)];
            }
        }
        FixedDofs { values }
    }

    /// Sets all fixed values to zero
    pub fn homogenize(&mut self) {
        for component in &mut self.values {
            component.iter_mut().for_each(|v| *v = 0.0);
        }
    }

    /// Returns true if all fixed values are zero
    pub fn is_homogeneous(&self) -> bool {
        self.values.iter().all(|c| c.iter().all(|v| *v == 0.0))
    }
}

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////

#[cfg(test)]
mod tests {
    use super::{DofIndex, DofMapper, FixedDofs};
    use crate::base::{BoundaryConditions, MultiPatch, Side};
    use russell_lab::Matrix;

    fn strip() -> MultiPatch {
        // 2 × 1 cells; nodes: 0 1 2 (bottom) 3 4 5 (top)
        let mut mesh = MultiPatch::new();
        mesh.add_quad_patch([[0.0, 0.0], [2.0, 0.0], [2.0, 1.0], [0.0, 1.0]], 2, 1)
            .unwrap();
        mesh
    }

    #[test]
    fn new_captures_errors() {
        assert_eq!(DofMapper::new(&[], 0).err(), Some("the number of components must be ≥ 1"));
        assert_eq!(
            DofMapper::new(&[vec![false; 2], vec![false; 3]], 0).err(),
            Some("all components must have the same number of nodes")
        );
    }

    #[test]
    fn numbering_is_component_major() {
        let mesh = strip();
        let mut bcs = BoundaryConditions::new();
        bcs.fix(0, Side::West, 2).dirichlet(0, Side::South, 1, |x| x[0]);
        let mapper = DofMapper::from_conditions(&mesh, &bcs, 2, 0).unwrap();
        assert_eq!(mapper.ncomp(), 2);
        assert_eq!(mapper.nnode(), 6);
        // x: nodes 0 and 3 fixed; y: nodes 0, 1, 2, 3 fixed
        assert_eq!(mapper.n_fixed(0), 2);
        assert_eq!(mapper.n_fixed(1), 4);
        assert_eq!(mapper.n_free(), 4 + 2);
        assert_eq!(mapper.n_free() + mapper.n_fixed_total(), 2 * mesh.nnode());
        assert_eq!(mapper.index(0, 0), DofIndex::Fixed(0));
        assert_eq!(mapper.index(0, 1), DofIndex::Free(0));
        assert_eq!(mapper.index(0, 5), DofIndex::Free(3));
        assert_eq!(mapper.index(1, 4), DofIndex::Free(4));
        assert_eq!(mapper.index(1, 3), DofIndex::Fixed(3));
        assert_eq!(mapper.fixed_nodes(1), &[0, 1, 2, 3]);
        assert_eq!(mapper.fixed_offsets(), &[0, 2]);
    }

    #[test]
    fn fixed_values_work() {
        let mesh = strip();
        let mut bcs = BoundaryConditions::new();
        bcs.fix(0, Side::West, 2).dirichlet(0, Side::South, 1, |x| x[0]);
        let mapper = DofMapper::from_conditions(&mesh, &bcs, 2, 0).unwrap();
        let mut fixed = FixedDofs::new(&[&mapper]);
        assert_eq!(fixed.values, &[vec![0.0; 2], vec![0.0; 4]]);
        mapper.fixed_from_conditions(&mesh, &bcs, &mut fixed).unwrap();
        // the South condition comes last and wins at node 0
        assert_eq!(fixed.values[1], &[0.0, 1.0, 2.0, 0.0]);
        assert!(!fixed.is_homogeneous());
        let flat = mapper.flatten_fixed(&fixed).unwrap();
        assert_eq!(flat.as_data(), &[0.0, 0.0, 0.0, 1.0, 2.0, 0.0]);

        let south = mapper.side_fixed(&mesh, &fixed, 0, Side::West);
        assert_eq!(south.err(), None);
        assert_eq!(
            mapper.side_fixed(&mesh, &fixed, 0, Side::South).err(),
            Some("the side contains DOFs that are not fixed")
        );

        let values = Matrix::from(&[[7.0, 8.0], [9.0, 10.0]]);
        mapper.set_side_fixed(&mesh, &mut fixed, 0, Side::West, &values).unwrap();
        assert_eq!(fixed.values[0], &[7.0, 9.0]);
        assert_eq!(fixed.values[1], &[8.0, 1.0, 2.0, 10.0]);
        let back = mapper.side_fixed(&mesh, &fixed, 0, Side::West).unwrap();
        assert_eq!(back.get(1, 1), 10.0);

        let wrong = Matrix::new(3, 2);
        assert_eq!(
            mapper.set_side_fixed(&mesh, &mut fixed, 0, Side::West, &wrong).err(),
            Some("side values matrix has incompatible dimensions")
        );

        fixed.homogenize();
        assert!(fixed.is_homogeneous());

        let other = FixedDofs { values: vec![vec![0.0; 2]] };
        assert_eq!(
            mapper.check_fixed(&other).err(),
            Some("fixed DOFs do not have enough components")
        );
        let other = FixedDofs {
            values: vec![vec![0.0; 2], vec![0.0; 3]],
        };
        assert_eq!(
            mapper.check_fixed(&other).err(),
            Some("fixed DOFs do not match the number of prescribed DOFs")
        );
    }

    #[test]
    fn shared_fixed_dofs_work() {
        let mesh = strip();
        let mut bcs = BoundaryConditions::new();
        bcs.fix(0, Side::West, 2);
        let velocity = DofMapper::from_conditions(&mesh, &bcs, 2, 0).unwrap();
        let pressure = DofMapper::new(&[vec![false; mesh.nnode()]], 2).unwrap();
        let fixed = FixedDofs::new(&[&velocity, &pressure]);
        assert_eq!(fixed.values.len(), 3);
        assert_eq!(fixed.values[2].len(), 0);
        assert_eq!(pressure.check_fixed(&fixed), Ok(()));
    }
}
