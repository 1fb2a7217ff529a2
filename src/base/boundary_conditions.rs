use super::{MultiPatch, Side};
use crate::StrError;
use std::fmt;

/// Defines a function of space x returning a prescribed value
pub type FnSpace = Box<dyn Fn(&[f64; 2]) -> f64>;

/// Holds a Dirichlet condition for one component on one patch side
pub struct Dirichlet {
    /// Patch index
    pub patch: usize,

    /// Patch side
    pub side: Side,

    /// Component (e.g., 0 for x-velocity, 1 for y-velocity)
    pub component: usize,

    /// Prescribed value as a function of the coordinates
    pub value: FnSpace,
}

/// Holds a constant traction applied on one patch side
#[derive(Clone, Copy, Debug)]
pub struct Traction {
    /// Patch index
    pub patch: usize,

    /// Patch side
    pub side: Side,

    /// Traction vector (force per unit length)
    pub value: [f64; 2],
}

/// Holds essential (Dirichlet) and natural (traction) boundary conditions
///
/// Sides without conditions are traction-free (do-nothing) boundaries.
/// If two conditions prescribe the same node and component, the last one wins.
pub struct BoundaryConditions {
    /// All Dirichlet conditions
    pub dirichlet: Vec<Dirichlet>,

    /// All traction conditions
    pub tractions: Vec<Traction>,
}

impl BoundaryConditions {
    /// Allocates a new instance without conditions
    pub fn new() -> Self {
        BoundaryConditions {
            dirichlet: Vec::new(),
            tractions: Vec::new(),
        }
    }

    /// Prescribes a value for one component on one patch side
    pub fn dirichlet<F>(&mut self, patch: usize, side: Side, component: usize, f: F) -> &mut Self
    where
        F: Fn(&[f64; 2]) -> f64 + 'static,
    {
        self.dirichlet.push(Dirichlet {
            patch,
            side,
            component,
            value: Box::new(f),
        });
        self
    }

    /// Prescribes zero for all components in 0..ncomp on one patch side
    pub fn fix(&mut self, patch: usize, side: Side, ncomp: usize) -> &mut Self {
        for component in 0..ncomp {
            self.dirichlet(patch, side, component, |_| 0.0);
        }
        self
    }

    /// Applies a constant traction on one patch side
    pub fn traction(&mut self, patch: usize, side: Side, value: [f64; 2]) -> &mut Self {
        self.tractions.push(Traction { patch, side, value });
        self
    }

    /// Checks that all conditions refer to existing patches and components
    pub fn validate(&self, mesh: &MultiPatch, ncomp: usize) -> Result<(), StrError> {
        for bc in &self.dirichlet {
            if bc.patch >= mesh.patches.len() {
                return Err("Dirichlet condition refers to a non-existent patch");
            }
            if bc.component >= ncomp {
                return Err("Dirichlet condition refers to a non-existent component");
            }
        }
        for bc in &self.tractions {
            if bc.patch >= mesh.patches.len() {
                return Err("traction condition refers to a non-existent patch");
            }
        }
        Ok(())
    }

    /// Returns, for each component, a flag per node indicating a prescribed value
    pub fn fixed_flags(&self, mesh: &MultiPatch, ncomp: usize) -> Result<Vec<Vec<bool>>, StrError> {
        self.validate(mesh, ncomp)?;
        let mut flags = vec![vec![false; mesh.nnode()]; ncomp];
        for bc in &self.dirichlet {
            for n in mesh.side_nodes(bc.patch, bc.side)? {
                flags[bc.component][n] = true;
            }
        }
        Ok(flags)
    }

    /// Evaluates the prescribed values at the nodes, for each component
    ///
    /// Entries of nodes without a prescribed value are zero.
    pub fn nodal_values(&self, mesh: &MultiPatch, ncomp: usize) -> Result<Vec<Vec<f64>>, StrError> {
        self.validate(mesh, ncomp)?;
        let mut values = vec![vec![0.0; mesh.nnode()]; ncomp];
        for bc in &self.dirichlet {
            for n in mesh.side_nodes(bc.patch, bc.side)? {
                values[bc.component][n] = (bc.value)(&mesh.coords[n]);
            }
        }
        Ok(values)
    }
}

impl fmt::Display for BoundaryConditions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Boundary conditions\n")?;
        write!(f, "===================\n")?;
        for bc in &self.dirichlet {
            write!(f, "dirichlet: patch {} {:?} component {}\n", bc.patch, bc.side, bc.component)?;
        }
        for bc in &self.tractions {
            write!(f, "traction: patch {} {:?} value {:?}\n", bc.patch, bc.side, bc.value)?;
        }
        Ok(())
    }
}

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////

#[cfg(test)]
mod tests {
    use super::BoundaryConditions;
    use crate::base::{MultiPatch, Side};

    fn unit_square() -> MultiPatch {
        let mut mesh = MultiPatch::new();
        mesh.add_quad_patch([[0.0, 0.0], [1.0, 0.0], [1.0, 1.0], [0.0, 1.0]], 1, 2)
            .unwrap();
        mesh
    }

    #[test]
    fn validate_captures_errors() {
        let mesh = unit_square();
        let mut bcs = BoundaryConditions::new();
        bcs.dirichlet(1, Side::West, 0, |_| 0.0);
        assert_eq!(
            bcs.validate(&mesh, 2).err(),
            Some("Dirichlet condition refers to a non-existent patch")
        );
        let mut bcs = BoundaryConditions::new();
        bcs.fix(0, Side::West, 3);
        assert_eq!(
            bcs.fixed_flags(&mesh, 2).err(),
            Some("Dirichlet condition refers to a non-existent component")
        );
        let mut bcs = BoundaryConditions::new();
        bcs.traction(3, Side::West, [1.0, 0.0]);
        assert_eq!(
            bcs.validate(&mesh, 2).err(),
            Some("traction condition refers to a non-existent patch")
        );
    }

    #[test]
    fn flags_and_values_work() {
        let mesh = unit_square();
        let mut bcs = BoundaryConditions::new();
        bcs.dirichlet(0, Side::West, 0, |x| 2.0 * x[1])
            .dirichlet(0, Side::South, 1, |_| -1.0)
            .traction(0, Side::East, [0.0, 3.0]);
        let flags = bcs.fixed_flags(&mesh, 2).unwrap();
        // nodes: (0,0) (1,0) (0,0.5) (1,0.5) (0,1) (1,1)
        assert_eq!(flags[0], &[true, false, true, false, true, false]);
        assert_eq!(flags[1], &[true, true, false, false, false, false]);
        let values = bcs.nodal_values(&mesh, 2).unwrap();
        assert_eq!(values[0], &[0.0, 0.0, 1.0, 0.0, 2.0, 0.0]);
        assert_eq!(values[1], &[-1.0, -1.0, 0.0, 0.0, 0.0, 0.0]);
        assert_eq!(
            format!("{}", bcs),
            "Boundary conditions\n\
             ===================\n\
             dirichlet: patch 0 West component 0\n\
             dirichlet: patch 0 South component 1\n\
             traction: patch 0 East value [0.0, 3.0]\n"
        );
    }
}
