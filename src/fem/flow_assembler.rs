use super::{BlockBuilder, LinearSystem, NonlinearSystem, SparseBlock};
use crate::base::{gauss_points_cell, q1_shape, CellPad, GAUSS_3};
use crate::base::{BoundaryConditions, DofIndex, DofMapper, Field, FixedDofs, FlowAssembly, MultiPatch, ParamFluid, Side};
use crate::StrError;
use russell_lab::{Matrix, Vector};

/// Holds the blocks of the assembled (stationary) flow system
///
/// ```text
/// ┌          ┐ ┌   ┐   ┌       ┐
/// │ A_vv B_vp│ │ v │   │ rhs_v │
/// │ B_pv   0 │ │ p │ = │ rhs_p │
/// └          ┘ └   ┘   └       ┘
/// ```
///
/// The contributions of the fixed DOFs are already moved to the right-hand side.
#[derive(Clone, Debug)]
pub struct FlowBlocks {
    /// Velocity-velocity block (viscous and convective terms)
    pub a_vv: SparseBlock,

    /// Velocity-pressure block (pressure gradient)
    pub b_vp: SparseBlock,

    /// Pressure-velocity block (divergence)
    pub b_pv: SparseBlock,

    /// Right-hand side of the momentum equations
    pub rhs_v: Vector,

    /// Right-hand side of the continuity equation
    pub rhs_p: Vector,
}

impl FlowBlocks {
    /// Allocates empty blocks
    pub fn new(n_vel: usize, n_pres: usize) -> Self {
        FlowBlocks {
            a_vv: SparseBlock::new(n_vel, n_vel),
            b_vp: SparseBlock::new(n_vel, n_pres),
            b_pv: SparseBlock::new(n_pres, n_vel),
            rhs_v: Vector::new(n_vel),
            rhs_p: Vector::new(n_pres),
        }
    }

    /// Composes the saddle-point system
    pub fn system(&self) -> Result<LinearSystem, StrError> {
        let nv = self.rhs_v.dim();
        let np = self.rhs_p.dim();
        let mut rhs = Vector::new(nv + np);
        for i in 0..nv {
            rhs[i] = self.rhs_v[i];
        }
        for i in 0..np {
            rhs[nv + i] = self.rhs_p[i];
        }
        let mut builder = BlockBuilder::new(nv + np);
        builder
            .add(0, 0, 1.0, &self.a_vv)?
            .add(0, nv, 1.0, &self.b_vp)?
            .add(nv, 0, 1.0, &self.b_pv)?;
        builder.build_system(rhs)
    }
}

/// Holds the force exerted by the fluid on a boundary
#[derive(Clone, Copy, Debug)]
pub struct BoundaryForce {
    /// Total force (pressure plus viscous)
    pub total: [f64; 2],

    /// Pressure contribution (available if split was requested)
    pub pressure: Option<[f64; 2]>,

    /// Viscous contribution (available if split was requested)
    pub viscous: Option<[f64; 2]>,
}

/// Holds the convective state used by the linearized assembly
struct Convection<'a> {
    velocity: &'a Field,
    mesh_velocity: Option<&'a Field>,
    mode: FlowAssembly,
}

/// Assembles the stationary incompressible Navier-Stokes (or Stokes) equations
///
/// The velocity uses Q1 functions on the once-refined mesh and the pressure uses Q1 functions
/// on the coarse mesh (Q1-iso-Q2/Q1 subgrid pair). The fine mesh keeps the node ids of the
/// coarse mesh; hence, coarse node k is also fine node k.
pub struct StationaryFlowAssembler {
    /// Velocity (fine) mesh; this is also the geometry of the flow domain
    mesh: MultiPatch,

    /// Pressure (coarse) mesh
    pressure_mesh: MultiPatch,

    /// Fluid parameters
    param: ParamFluid,

    /// Body force per unit mass
    body_force: [f64; 2],

    /// Velocity DOFs (components 0 and 1 of the fixed DOFs)
    vel_mapper: DofMapper,

    /// Pressure DOFs (component 2 of the fixed DOFs)
    pres_mapper: DofMapper,

    /// Prescribed values
    fixed: FixedDofs,

    /// Assembled blocks
    blocks: FlowBlocks,
}

impl StationaryFlowAssembler {
    /// Allocates a new instance
    ///
    /// # Input
    ///
    /// * `pressure_mesh` -- the coarse mesh; the velocity mesh is obtained by uniform refinement
    /// * `bcs` -- velocity boundary conditions (components 0 and 1); sides without conditions are outflow (do-nothing) boundaries
    /// * `param` -- fluid parameters
    /// * `body_force` -- body force per unit mass
    pub fn new(
        pressure_mesh: MultiPatch,
        bcs: &BoundaryConditions,
        param: ParamFluid,
        body_force: [f64; 2],
    ) -> Result<Self, StrError> {
        if param.density <= 0.0 {
            return Err("fluid density must be > 0.0");
        }
        if param.viscosity <= 0.0 {
            return Err("fluid viscosity must be > 0.0");
        }
        if pressure_mesh.patches.len() == 0 {
            return Err("the flow mesh must have at least one patch");
        }
        let mesh = pressure_mesh.uniform_refine();
        let vel_mapper = DofMapper::from_conditions(&mesh, bcs, 2, 0)?;
        let pres_mapper = DofMapper::new(&[vec![false; pressure_mesh.nnode()]], 2)?;
        let mut fixed = FixedDofs::new(&[&vel_mapper, &pres_mapper]);
        vel_mapper.fixed_from_conditions(&mesh, bcs, &mut fixed)?;
        let blocks = FlowBlocks::new(vel_mapper.n_free(), pres_mapper.n_free());
        Ok(StationaryFlowAssembler {
            mesh,
            pressure_mesh,
            param,
            body_force,
            vel_mapper,
            pres_mapper,
            fixed,
            blocks,
        })
    }

    /// Returns the number of free velocity DOFs
    #[inline]
    pub fn n_dof_velocity(&self) -> usize {
        self.vel_mapper.n_free()
    }

    /// Returns the number of free pressure DOFs
    #[inline]
    pub fn n_dof_pressure(&self) -> usize {
        self.pres_mapper.n_free()
    }

    /// Returns the velocity (fine) mesh, i.e., the current flow geometry
    pub fn mesh(&self) -> &MultiPatch {
        &self.mesh
    }

    /// Returns the pressure (coarse) mesh
    pub fn pressure_mesh(&self) -> &MultiPatch {
        &self.pressure_mesh
    }

    /// Returns the fluid parameters
    pub fn param(&self) -> &ParamFluid {
        &self.param
    }

    /// Returns the velocity DOF mapper
    pub fn velocity_mapper(&self) -> &DofMapper {
        &self.vel_mapper
    }

    /// Returns the pressure DOF mapper
    pub fn pressure_mapper(&self) -> &DofMapper {
        &self.pres_mapper
    }

    /// Returns the assembled blocks
    pub fn blocks(&self) -> &FlowBlocks {
        &self.blocks
    }

    /// Replaces the fixed DOFs
    pub fn set_fixed_dofs(&mut self, fixed: &FixedDofs) -> Result<(), StrError> {
        self.vel_mapper.check_fixed(fixed)?;
        self.pres_mapper.check_fixed(fixed)?;
        self.fixed = fixed.clone();
        Ok(())
    }

    /// Returns the fixed velocity values on a patch side as a (n_side_node, 2) matrix
    pub fn side_fixed_dofs(&self, patch: usize, side: Side) -> Result<Matrix, StrError> {
        self.vel_mapper.side_fixed(&self.mesh, &self.fixed, patch, side)
    }

    /// Sets the fixed velocity values on a patch side from a (n_side_node, 2) matrix
    pub fn set_side_fixed_dofs(&mut self, patch: usize, side: Side, values: &Matrix) -> Result<(), StrError> {
        self.vel_mapper
            .set_side_fixed(&self.mesh, &mut self.fixed, patch, side, values)
    }

    /// Sets all fixed DOFs to zero
    pub fn homogenize_fixed_dofs(&mut self) {
        self.fixed.homogenize();
    }

    /// Moves the flow geometry
    ///
    /// `increment` holds the displacement of every node of the velocity mesh.
    pub fn displace_mesh(&mut self, increment: &[[f64; 2]]) -> Result<(), StrError> {
        if increment.len() != self.mesh.nnode() {
            return Err("the mesh increment must have one entry per velocity node");
        }
        self.mesh.displace(increment)?;
        let n = self.pressure_mesh.nnode();
        self.pressure_mesh.displace(&increment[..n])
    }

    /// Checks the flow geometry; returns the first patch with an invalid cell, if any
    pub fn check_geometry(&self) -> Option<usize> {
        self.mesh.check_geometry()
    }

    /// Assembles the Stokes operator and load vector
    ///
    /// Returns false if the geometry has cells with a non-positive Jacobian determinant.
    pub fn assemble(&mut self) -> Result<bool, StrError> {
        self.assemble_blocks(None)
    }

    /// Assembles the Navier-Stokes operator linearized about a velocity field
    ///
    /// The transport velocity is `velocity - mesh_velocity` (ALE correction).
    /// With `FlowAssembly::Newton`, the solution of the resulting system is the next Newton iterate.
    ///
    /// Returns false if the geometry has cells with a non-positive Jacobian determinant.
    pub fn assemble_linearized(
        &mut self,
        velocity: &Field,
        mesh_velocity: Option<&Field>,
        mode: FlowAssembly,
    ) -> Result<bool, StrError> {
        self.check_velocity_field(velocity)?;
        if let Some(mv) = mesh_velocity {
            self.check_velocity_field(mv)?;
        }
        self.assemble_blocks(Some(Convection {
            velocity,
            mesh_velocity,
            mode,
        }))
    }

    /// Computes the force exerted by the fluid on the given boundary sides
    ///
    /// The traction on the body is `p n - ρν (∇u + ∇uᵀ) n` where n is the outward normal of the flow domain.
    pub fn compute_force(
        &self,
        velocity: &Field,
        pressure: &Field,
        sides: &[(usize, Side)],
        split: bool,
    ) -> Result<BoundaryForce, StrError> {
        self.check_velocity_field(velocity)?;
        if pressure.nnode() != self.pressure_mesh.nnode() || pressure.ncomp() != 1 {
            return Err("the pressure field is incompatible with the pressure mesh");
        }
        let visc = self.param.density * self.param.viscosity;
        let mut fp = [0.0; 2];
        let mut fv = [0.0; 2];
        for (p, side) in sides {
            let patch = match self.mesh.patches.get(*p) {
                Some(patch) => patch,
                None => return Err("boundary side refers to a non-existent patch"),
            };
            let ppatch = &self.pressure_mesh.patches[*p];
            let (k, sign) = side.ccw_tangent();
            for (i, j) in patch.side_cells(*side) {
                let coords = self.mesh.cell_coords(*p, i, j);
                let nodes = patch.cell_nodes(i, j);
                let pnodes = ppatch.cell_nodes(i / 2, j / 2);
                for (t, weight) in GAUSS_3 {
                    let (xi, eta) = side.reference_point(t);
                    let pad = CellPad::calc(&coords, xi, eta);
                    let tangent = pad.tangent(k);
                    let (tx, ty) = (sign * tangent[0], sign * tangent[1]);
                    let len = f64::sqrt(tx * tx + ty * ty);
                    if len == 0.0 {
                        continue;
                    }
                    let n = [ty / len, -tx / len];
                    let w = weight * len;
                    let (xi_c, eta_c) = coarse_coords(i, j, xi, eta);
                    let psi = q1_shape(xi_c, eta_c);
                    let mut pres = 0.0;
                    for q in 0..4 {
                        pres += psi[q] * pressure.get(pnodes[q], 0);
                    }
                    let mut gu = [[0.0; 2]; 2];
                    for m in 0..4 {
                        for c in 0..2 {
                            for d in 0..2 {
                                gu[c][d] += pad.grad[m][d] * velocity.get(nodes[m], c);
                            }
                        }
                    }
                    for c in 0..2 {
                        fp[c] += pres * n[c] * w;
                        for d in 0..2 {
                            fv[c] -= visc * (gu[c][d] + gu[d][c]) * n[d] * w;
                        }
                    }
                }
            }
        }
        Ok(BoundaryForce {
            total: [fp[0] + fv[0], fp[1] + fv[1]],
            pressure: if split { Some(fp) } else { None },
            viscous: if split { Some(fv) } else { None },
        })
    }

    /// Decodes a solution vector [velocity | pressure] into velocity and pressure fields
    pub fn construct_solution(&self, solution: &Vector, fixed: &FixedDofs) -> Result<(Field, Field), StrError> {
        if solution.dim() != self.n_dof() {
            return Err("the solution vector has an incorrect dimension");
        }
        let nv = self.n_dof_velocity();
        let data = solution.as_data();
        let velocity = Field::from_dofs(&self.vel_mapper, &data[..nv], fixed)?;
        let pressure = Field::from_dofs(&self.pres_mapper, &data[nv..], fixed)?;
        Ok((velocity, pressure))
    }

    fn check_velocity_field(&self, field: &Field) -> Result<(), StrError> {
        if field.nnode() != self.mesh.nnode() || field.ncomp() != 2 {
            return Err("the velocity field is incompatible with the velocity mesh");
        }
        Ok(())
    }

    fn assemble_blocks(&mut self, convection: Option<Convection>) -> Result<bool, StrError> {
        let mut blocks = FlowBlocks::new(self.n_dof_velocity(), self.n_dof_pressure());
        let rho = self.param.density;
        let visc = rho * self.param.viscosity;
        let points = gauss_points_cell();
        for (p, patch) in self.mesh.patches.iter().enumerate() {
            let ppatch = &self.pressure_mesh.patches[p];
            for j in 0..patch.nv {
                for i in 0..patch.nu {
                    let coords = self.mesh.cell_coords(p, i, j);
                    let nodes = patch.cell_nodes(i, j);
                    let pnodes = ppatch.cell_nodes(i / 2, j / 2);
                    // local matrices; velocity DOFs are ordered as c * 4 + a
                    let mut kk = [[0.0; 8]; 8];
                    let mut bb = [[0.0; 8]; 4];
                    let mut ff = [0.0; 8];
                    for (ksi, weight) in &points {
                        let pad = CellPad::calc(&coords, ksi[0], ksi[1]);
                        if pad.det_jac <= 0.0 {
                            return Ok(false);
                        }
                        let w = weight * pad.det_jac;
                        let (xi_c, eta_c) = coarse_coords(i, j, ksi[0], ksi[1]);
                        let psi = q1_shape(xi_c, eta_c);
                        for a in 0..4 {
                            for b in 0..4 {
                                let g = pad.grad[a][0] * pad.grad[b][0] + pad.grad[a][1] * pad.grad[b][1];
                                for c in 0..2 {
                                    kk[c * 4 + a][c * 4 + b] += visc * g * w;
                                }
                            }
                            for c in 0..2 {
                                ff[c * 4 + a] += rho * self.body_force[c] * pad.nn[a] * w;
                                for q in 0..4 {
                                    bb[q][c * 4 + a] -= psi[q] * pad.grad[a][c] * w;
                                }
                            }
                        }
                        if let Some(conv) = &convection {
                            let mut u = [0.0; 2];
                            let mut gu = [[0.0; 2]; 2];
                            let mut wm = [0.0; 2];
                            for m in 0..4 {
                                for c in 0..2 {
                                    let value = conv.velocity.get(nodes[m], c);
                                    u[c] += pad.nn[m] * value;
                                    for d in 0..2 {
                                        gu[c][d] += pad.grad[m][d] * value;
                                    }
                                    if let Some(mv) = conv.mesh_velocity {
                                        wm[c] += pad.nn[m] * mv.get(nodes[m], c);
                                    }
                                }
                            }
                            let transport = [u[0] - wm[0], u[1] - wm[1]];
                            for a in 0..4 {
                                for b in 0..4 {
                                    let adv = transport[0] * pad.grad[b][0] + transport[1] * pad.grad[b][1];
                                    for c in 0..2 {
                                        kk[c * 4 + a][c * 4 + b] += rho * pad.nn[a] * adv * w;
                                    }
                                }
                            }
                            if conv.mode == FlowAssembly::Newton {
                                for a in 0..4 {
                                    for b in 0..4 {
                                        let nab = rho * pad.nn[a] * pad.nn[b] * w;
                                        for c in 0..2 {
                                            for d in 0..2 {
                                                kk[c * 4 + a][d * 4 + b] += nab * gu[c][d];
                                            }
                                        }
                                    }
                                    for c in 0..2 {
                                        let ugu = u[0] * gu[c][0] + u[1] * gu[c][1];
                                        ff[c * 4 + a] += rho * pad.nn[a] * ugu * w;
                                    }
                                }
                            }
                        }
                    }
                    self.scatter(&mut blocks, &nodes, &pnodes, &kk, &bb, &ff)?;
                }
            }
        }
        self.blocks = blocks;
        Ok(true)
    }

    /// Adds the local contributions to the blocks, moving fixed columns to the right-hand side
    fn scatter(
        &self,
        blocks: &mut FlowBlocks,
        nodes: &[usize; 4],
        pnodes: &[usize; 4],
        kk: &[[f64; 8]; 8],
        bb: &[[f64; 8]; 4],
        ff: &[f64; 8],
    ) -> Result<(), StrError> {
        let vf = self.vel_mapper.first();
        let pf = self.pres_mapper.first();
        for c in 0..2 {
            for a in 0..4 {
                let row = match self.vel_mapper.index(c, nodes[a]) {
                    DofIndex::Free(r) => r,
                    DofIndex::Fixed(_) => continue,
                };
                blocks.rhs_v[row] += ff[c * 4 + a];
                for d in 0..2 {
                    for b in 0..4 {
                        let value = kk[c * 4 + a][d * 4 + b];
                        match self.vel_mapper.index(d, nodes[b]) {
                            DofIndex::Free(col) => blocks.a_vv.put(row, col, value)?,
                            DofIndex::Fixed(k) => blocks.rhs_v[row] -= value * self.fixed.values[vf + d][k],
                        }
                    }
                }
                for q in 0..4 {
                    let value = bb[q][c * 4 + a];
                    match self.pres_mapper.index(0, pnodes[q]) {
                        DofIndex::Free(col) => blocks.b_vp.put(row, col, value)?,
                        DofIndex::Fixed(k) => blocks.rhs_v[row] -= value * self.fixed.values[pf][k],
                    }
                }
            }
        }
        for q in 0..4 {
            let row = match self.pres_mapper.index(0, pnodes[q]) {
                DofIndex::Free(r) => r,
                DofIndex::Fixed(_) => continue,
            };
            for c in 0..2 {
                for a in 0..4 {
                    let value = bb[q][c * 4 + a];
                    match self.vel_mapper.index(c, nodes[a]) {
                        DofIndex::Free(col) => blocks.b_pv.put(row, col, value)?,
                        DofIndex::Fixed(k) => blocks.rhs_p[row] -= value * self.fixed.values[vf + c][k],
                    }
                }
            }
        }
        Ok(())
    }
}

impl NonlinearSystem for StationaryFlowAssembler {
    fn n_dof(&self) -> usize {
        self.n_dof_velocity() + self.n_dof_pressure()
    }

    fn fixed_dofs(&self) -> &FixedDofs {
        &self.fixed
    }

    /// Assembles the Newton linearization at the trial point (Stokes at zero velocity)
    fn assemble(&mut self, trial: &Vector, fixed: &FixedDofs) -> Result<bool, StrError> {
        self.set_fixed_dofs(fixed)?;
        let (velocity, _) = self.construct_solution(trial, fixed)?;
        self.assemble_linearized(&velocity, None, FlowAssembly::Newton)
    }

    fn linear_system(&self) -> Result<LinearSystem, StrError> {
        self.blocks.system()
    }
}

/// Maps reference coordinates of fine cell (i, j) to the reference coordinates of its coarse parent
#[inline]
fn coarse_coords(i: usize, j: usize, xi: f64, eta: f64) -> (f64, f64) {
    ((i % 2) as f64 + (xi - 1.0) / 2.0, (j % 2) as f64 + (eta - 1.0) / 2.0)
}

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////

#[cfg(test)]
mod tests {
    use super::{coarse_coords, StationaryFlowAssembler};
    use crate::base::{BoundaryConditions, Field, FlowAssembly, MultiPatch, ParamFluid, Side};
    use crate::fem::NonlinearSystem;
    use russell_lab::{approx_eq, Vector};

    fn unit_square(n: usize) -> MultiPatch {
        let mut mesh = MultiPatch::new();
        mesh.add_quad_patch([[0.0, 0.0], [1.0, 0.0], [1.0, 1.0], [0.0, 1.0]], n, n)
            .unwrap();
        mesh
    }

    fn closed_cavity(n: usize) -> StationaryFlowAssembler {
        let mut bcs = BoundaryConditions::new();
        for side in Side::ALL {
            bcs.fix(0, side, 2);
        }
        let param = ParamFluid {
            density: 1.0,
            viscosity: 0.1,
        };
        StationaryFlowAssembler::new(unit_square(n), &bcs, param, [0.0, 0.0]).unwrap()
    }

    #[test]
    fn new_captures_errors() {
        let bcs = BoundaryConditions::new();
        let param = ParamFluid {
            density: 0.0,
            viscosity: 0.1,
        };
        assert_eq!(
            StationaryFlowAssembler::new(unit_square(1), &bcs, param, [0.0, 0.0]).err(),
            Some("fluid density must be > 0.0")
        );
        let param = ParamFluid {
            density: 1.0,
            viscosity: 0.0,
        };
        assert_eq!(
            StationaryFlowAssembler::new(unit_square(1), &bcs, param, [0.0, 0.0]).err(),
            Some("fluid viscosity must be > 0.0")
        );
        let param = ParamFluid {
            density: 1.0,
            viscosity: 1.0,
        };
        assert_eq!(
            StationaryFlowAssembler::new(MultiPatch::new(), &bcs, param, [0.0, 0.0]).err(),
            Some("the flow mesh must have at least one patch")
        );
    }

    #[test]
    fn coarse_coords_works() {
        assert_eq!(coarse_coords(0, 0, -1.0, 1.0), (-1.0, 0.0));
        assert_eq!(coarse_coords(1, 2, -1.0, 1.0), (0.0, 0.0));
        assert_eq!(coarse_coords(3, 1, 1.0, -1.0), (1.0, 0.0));
    }

    #[test]
    fn dof_counts_add_up() {
        let assembler = closed_cavity(2);
        // fine mesh 4×4 cells: 25 nodes, 16 on the boundary
        assert_eq!(assembler.n_dof_velocity(), 2 * 9);
        // coarse mesh 2×2 cells: 9 nodes
        assert_eq!(assembler.n_dof_pressure(), 9);
        assert_eq!(
            assembler.n_dof_velocity() + assembler.n_dof_pressure(),
            assembler.n_dof()
        );
    }

    #[test]
    fn stokes_blocks_are_consistent() {
        let mut assembler = closed_cavity(2);
        assert_eq!(assembler.assemble(), Ok(true));
        let blocks = assembler.blocks();
        let a = blocks.a_vv.to_dense();
        let b_vp = blocks.b_vp.to_dense();
        let b_pv = blocks.b_pv.to_dense();
        let (nv, np) = (assembler.n_dof_velocity(), assembler.n_dof_pressure());
        for i in 0..nv {
            assert!(a.get(i, i) > 0.0);
            for j in 0..nv {
                approx_eq(a.get(i, j), a.get(j, i), 1e-14);
            }
            for q in 0..np {
                approx_eq(b_vp.get(i, q), b_pv.get(q, i), 1e-15);
            }
        }
        // a constant pressure is in the kernel of the gradient for a closed cavity
        let ones = Vector::from(&vec![1.0; np]);
        let grad = blocks.b_vp.mat_vec_mul(1.0, &ones).unwrap();
        for i in 0..nv {
            approx_eq(grad[i], 0.0, 1e-14);
        }
        // no forcing and homogeneous fixed DOFs
        assert!(blocks.rhs_v.as_data().iter().all(|v| *v == 0.0));
        assert!(blocks.rhs_p.as_data().iter().all(|v| *v == 0.0));
    }

    #[test]
    fn newton_and_oseen_residuals_agree_at_the_trial_point() {
        let mut assembler = closed_cavity(2);
        let nv = assembler.n_dof_velocity();
        let mut trial = Vector::new(assembler.n_dof());
        for i in 0..nv {
            trial[i] = f64::sin(i as f64);
        }
        let fixed = assembler.fixed_dofs().clone();
        let (velocity, _) = assembler.construct_solution(&trial, &fixed).unwrap();
        let mut u = Vector::new(nv);
        for i in 0..nv {
            u[i] = trial[i];
        }
        let mut residual = Vec::new();
        for mode in [FlowAssembly::Oseen, FlowAssembly::Newton] {
            assert_eq!(assembler.assemble_linearized(&velocity, None, mode), Ok(true));
            let blocks = assembler.blocks();
            let mut r = blocks.a_vv.mat_vec_mul(1.0, &u).unwrap();
            for i in 0..nv {
                r[i] -= blocks.rhs_v[i];
            }
            residual.push(r);
        }
        for i in 0..nv {
            approx_eq(residual[0][i], residual[1][i], 1e-13);
        }
    }

    #[test]
    fn assemble_detects_inverted_geometry() {
        let mut mesh = MultiPatch::new();
        mesh.add_quad_patch([[0.0, 0.0], [0.0, 1.0], [1.0, 1.0], [1.0, 0.0]], 1, 1)
            .unwrap();
        let param = ParamFluid {
            density: 1.0,
            viscosity: 1.0,
        };
        let bcs = BoundaryConditions::new();
        let mut assembler = StationaryFlowAssembler::new(mesh, &bcs, param, [0.0, 0.0]).unwrap();
        assert_eq!(assembler.assemble(), Ok(false));
        assert_eq!(assembler.check_geometry(), Some(0));
    }

    #[test]
    fn compute_force_works() {
        let param = ParamFluid {
            density: 1.0,
            viscosity: 0.1,
        };
        let bcs = BoundaryConditions::new();
        let assembler = StationaryFlowAssembler::new(unit_square(2), &bcs, param, [0.0, 0.0]).unwrap();
        let mesh = assembler.mesh();
        // shear flow u = (y, 0) and uniform pressure p = 2
        let mut velocity = Field::new(mesh.nnode(), 2);
        for n in 0..mesh.nnode() {
            velocity.set(n, 0, mesh.coords[n][1]);
        }
        let mut pressure = Field::new(assembler.pressure_mesh().nnode(), 1);
        for n in 0..assembler.pressure_mesh().nnode() {
            pressure.set(n, 0, 2.0);
        }
        // bottom side: n = (0, -1); p n = (0, -2); -ρν(∇u+∇uᵀ)n = (0.1, 0)
        let force = assembler
            .compute_force(&velocity, &pressure, &[(0, Side::South)], true)
            .unwrap();
        approx_eq(force.total[0], 0.1, 1e-14);
        approx_eq(force.total[1], -2.0, 1e-14);
        let fp = force.pressure.unwrap();
        let fv = force.viscous.unwrap();
        approx_eq(fp[0], 0.0, 1e-15);
        approx_eq(fp[1], -2.0, 1e-14);
        approx_eq(fv[0], 0.1, 1e-14);
        approx_eq(fv[1], 0.0, 1e-15);
        // the pressure force on a closed boundary vanishes
        let all = [(0, Side::West), (0, Side::East), (0, Side::South), (0, Side::North)];
        let force = assembler.compute_force(&velocity, &pressure, &all, false).unwrap();
        approx_eq(force.total[1], 0.0, 1e-14);
        assert!(force.pressure.is_none());
        assert_eq!(
            assembler
                .compute_force(&velocity, &pressure, &[(1, Side::West)], false)
                .err(),
            Some("boundary side refers to a non-existent patch")
        );
    }

    #[test]
    fn construct_solution_works() {
        let mut assembler = closed_cavity(1);
        let mut values = assembler.side_fixed_dofs(0, Side::North).unwrap();
        for m in 0..values.dims().0 {
            values.set(m, 0, 1.0);
        }
        assembler.set_side_fixed_dofs(0, Side::North, &values).unwrap();
        let fixed = assembler.fixed_dofs().clone();
        // fine mesh 2×2: one free node (the center)
        assert_eq!(assembler.n_dof_velocity(), 2);
        assert_eq!(assembler.n_dof_pressure(), 4);
        let solution = Vector::from(&[0.5, -0.5, 1.0, 2.0, 3.0, 4.0]);
        let (velocity, pressure) = assembler.construct_solution(&solution, &fixed).unwrap();
        let center = assembler.mesh().patches[0].node(1, 1);
        assert_eq!(velocity.get(center, 0), 0.5);
        assert_eq!(velocity.get(center, 1), -0.5);
        let top_left = assembler.mesh().patches[0].node(0, 2);
        assert_eq!(velocity.get(top_left, 0), 1.0);
        assert_eq!(pressure.get(3, 0), 4.0);
        assert_eq!(
            assembler.construct_solution(&Vector::new(3), &fixed).err(),
            Some("the solution vector has an incorrect dimension")
        );
        assembler.homogenize_fixed_dofs();
        assert!(assembler.fixed_dofs().is_homogeneous());
    }
}
