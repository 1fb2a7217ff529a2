use super::{LinearSystem, NonlinearSystem, SparseBlock};
use crate::base::{gauss_points_cell, CellPad, GAUSS_3};
use crate::base::{BoundaryConditions, DofIndex, DofMapper, Field, FixedDofs, MaterialLaw, MultiPatch, ParamSolid};
use crate::base::{Side, Traction};
use crate::StrError;
use russell_lab::{Matrix, Vector};

/// Holds the kinematic and stress state at an integration point
struct MaterialState {
    /// Deformation gradient F
    ff: [[f64; 2]; 2],

    /// Second Piola-Kirchhoff stress (Cauchy stress for the linear law)
    ss: [[f64; 2]; 2],

    /// Material tangent ℂ_JKLM
    dd: [[[[f64; 2]; 2]; 2]; 2],

    /// Includes the geometric (initial stress) term in the tangent
    geometric: bool,
}

impl MaterialState {
    /// Small-strain linear elasticity
    fn linear(lambda: f64, mu: f64, gu: &[[f64; 2]; 2]) -> Self {
        let mut ss = [[0.0; 2]; 2];
        let tr = gu[0][0] + gu[1][1];
        for i in 0..2 {
            for j in 0..2 {
                ss[i][j] = mu * (gu[i][j] + gu[j][i]);
            }
            ss[i][i] += lambda * tr;
        }
        let id = [[1.0, 0.0], [0.0, 1.0]];
        let mut dd = [[[[0.0; 2]; 2]; 2]; 2];
        for a in 0..2 {
            for b in 0..2 {
                for c in 0..2 {
                    for d in 0..2 {
                        dd[a][b][c][d] = lambda * id[a][b] * id[c][d] + mu * (id[a][c] * id[b][d] + id[a][d] * id[b][c]);
                    }
                }
            }
        }
        MaterialState {
            ff: id,
            ss,
            dd,
            geometric: false,
        }
    }

    /// Neo-Hookean law S = λ ln(J) C⁻¹ + μ (I - C⁻¹)
    ///
    /// Returns None if det(F) ≤ 0.
    fn neo_hooke_ln(lambda: f64, mu: f64, gu: &[[f64; 2]; 2]) -> Option<Self> {
        let ff = [[1.0 + gu[0][0], gu[0][1]], [gu[1][0], 1.0 + gu[1][1]]];
        let det_f = ff[0][0] * ff[1][1] - ff[0][1] * ff[1][0];
        if det_f <= 0.0 {
            return None;
        }
        let mut cc = [[0.0; 2]; 2];
        for i in 0..2 {
            for j in 0..2 {
                cc[i][j] = ff[0][i] * ff[0][j] + ff[1][i] * ff[1][j];
            }
        }
        let det_c = det_f * det_f;
        let ci = [
            [cc[1][1] / det_c, -cc[0][1] / det_c],
            [-cc[1][0] / det_c, cc[0][0] / det_c],
        ];
        let ln_j = f64::ln(det_f);
        let id = [[1.0, 0.0], [0.0, 1.0]];
        let mut ss = [[0.0; 2]; 2];
        for i in 0..2 {
            for j in 0..2 {
                ss[i][j] = lambda * ln_j * ci[i][j] + mu * (id[i][j] - ci[i][j]);
            }
        }
        let coef = mu - lambda * ln_j;
        let mut dd = [[[[0.0; 2]; 2]; 2]; 2];
        for a in 0..2 {
            for b in 0..2 {
                for c in 0..2 {
                    for d in 0..2 {
                        dd[a][b][c][d] = lambda * ci[a][b] * ci[c][d] + coef * (ci[a][c] * ci[b][d] + ci[a][d] * ci[b][c]);
                    }
                }
            }
        }
        Some(MaterialState {
            ff,
            ss,
            dd,
            geometric: true,
        })
    }
}

/// Assembles plane-strain elasticity problems (linear and neo-Hookean) in total Lagrangian form
///
/// Also used for the pseudo-elastic ALE mesh problem where the local stiffening makes
/// small cells stiffer.
pub struct ElasticityAssembler {
    mesh: MultiPatch,
    param: ParamSolid,
    lambda: f64,
    mu: f64,
    body_force: [f64; 2],
    tractions: Vec<Traction>,
    mapper: DofMapper,
    fixed: FixedDofs,
    matrix: SparseBlock,
    rhs: Vector,
}

impl ElasticityAssembler {
    /// Allocates a new instance
    ///
    /// # Input
    ///
    /// * `mesh` -- the reference geometry
    /// * `bcs` -- displacement (components 0 and 1) and traction conditions
    /// * `param` -- material parameters
    /// * `body_force` -- body force per unit volume
    pub fn new(
        mesh: MultiPatch,
        bcs: &BoundaryConditions,
        param: ParamSolid,
        body_force: [f64; 2],
    ) -> Result<Self, StrError> {
        if param.young <= 0.0 {
            return Err("Young's modulus must be > 0.0");
        }
        if param.poisson <= -1.0 || param.poisson >= 0.5 {
            return Err("Poisson's coefficient must satisfy -1.0 < ν < 0.5");
        }
        if param.local_stiffening < 0.0 {
            return Err("the local stiffening exponent must be ≥ 0.0");
        }
        let mapper = DofMapper::from_conditions(&mesh, bcs, 2, 0)?;
        let mut fixed = FixedDofs::new(&[&mapper]);
        mapper.fixed_from_conditions(&mesh, bcs, &mut fixed)?;
        let (lambda, mu) = param.lame();
        let n = mapper.n_free();
        Ok(ElasticityAssembler {
            mesh,
            param,
            lambda,
            mu,
            body_force,
            tractions: bcs.tractions.clone(),
            mapper,
            fixed,
            matrix: SparseBlock::new(n, n),
            rhs: Vector::new(n),
        })
    }

    /// Returns the geometry
    pub fn mesh(&self) -> &MultiPatch {
        &self.mesh
    }

    /// Returns the material parameters
    pub fn param(&self) -> &ParamSolid {
        &self.param
    }

    /// Returns the DOF mapper
    pub fn mapper(&self) -> &DofMapper {
        &self.mapper
    }

    /// Returns the last assembled matrix (stiffness or tangent)
    pub fn matrix(&self) -> &SparseBlock {
        &self.matrix
    }

    /// Returns the last assembled right-hand side (load or residual)
    pub fn rhs(&self) -> &Vector {
        &self.rhs
    }

    /// Replaces the fixed DOFs
    pub fn set_fixed_dofs(&mut self, fixed: &FixedDofs) -> Result<(), StrError> {
        self.mapper.check_fixed(fixed)?;
        self.fixed = fixed.clone();
        Ok(())
    }

    /// Returns the fixed displacements on a patch side as a (n_side_node, 2) matrix
    pub fn side_fixed_dofs(&self, patch: usize, side: Side) -> Result<Matrix, StrError> {
        self.mapper.side_fixed(&self.mesh, &self.fixed, patch, side)
    }

    /// Sets the fixed displacements on a patch side from a (n_side_node, 2) matrix
    pub fn set_side_fixed_dofs(&mut self, patch: usize, side: Side, values: &Matrix) -> Result<(), StrError> {
        self.mapper
            .set_side_fixed(&self.mesh, &mut self.fixed, patch, side, values)
    }

    /// Sets all fixed DOFs to zero
    pub fn homogenize_fixed_dofs(&mut self) {
        self.fixed.homogenize();
    }

    /// Moves the reference geometry by a displacement field
    pub fn displace_mesh(&mut self, displacement: &Field) -> Result<(), StrError> {
        let increment = displacement.as_vectors()?;
        if increment.len() != self.mesh.nnode() {
            return Err("the displacement field is incompatible with the mesh");
        }
        self.mesh.displace(&increment)
    }

    /// Checks the deformed geometry
    ///
    /// Returns the index of the first patch with an invalid cell, or None if the deformed mesh is valid.
    pub fn check_solution(&self, displacement: &Field) -> Result<Option<usize>, StrError> {
        let increment = displacement.as_vectors()?;
        if increment.len() != self.mesh.nnode() {
            return Err("the displacement field is incompatible with the mesh");
        }
        let mut deformed = self.mesh.clone();
        deformed.displace(&increment)?;
        Ok(deformed.check_geometry())
    }

    /// Decodes a solution vector into a displacement field
    pub fn construct_solution(&self, solution: &Vector, fixed: &FixedDofs) -> Result<Field, StrError> {
        Field::from_dofs(&self.mapper, solution.as_data(), fixed)
    }

    /// Assembles the small-strain stiffness matrix and the load vector
    ///
    /// The fixed displacements are eliminated into the right-hand side.
    /// Returns false if the geometry has cells with a non-positive Jacobian determinant.
    pub fn assemble(&mut self) -> Result<bool, StrError> {
        self.assemble_system(None)
    }

    /// Assembles the tangent matrix and the residual `f_ext - f_int(u)` at a trial point
    ///
    /// The trial displacement includes the given fixed values; hence, the solution of
    /// the resulting system is an increment with zero fixed components.
    /// Returns false if det(F) ≤ 0 or if the geometry is invalid.
    pub fn assemble_at(&mut self, trial: &Vector, fixed: &FixedDofs) -> Result<bool, StrError> {
        let displacement = self.construct_solution(trial, fixed)?;
        self.assemble_system(Some(&displacement))
    }

    fn assemble_system(&mut self, displacement: Option<&Field>) -> Result<bool, StrError> {
        let n = self.mapper.n_free();
        let mut kk_global = SparseBlock::new(n, n);
        let mut rhs = Vector::new(n);
        let law = match displacement {
            Some(_) => self.param.law,
            None => MaterialLaw::LinearElastic,
        };
        let chi = self.param.local_stiffening;
        let points = gauss_points_cell();
        for (p, patch) in self.mesh.patches.iter().enumerate() {
            for j in 0..patch.nv {
                for i in 0..patch.nu {
                    let coords = self.mesh.cell_coords(p, i, j);
                    let nodes = patch.cell_nodes(i, j);
                    // local DOFs are ordered as c * 4 + a
                    let mut kk = [[0.0; 8]; 8];
                    let mut ff = [0.0; 8];
                    for (ksi, weight) in &points {
                        let pad = CellPad::calc(&coords, ksi[0], ksi[1]);
                        if pad.det_jac <= 0.0 {
                            return Ok(false);
                        }
                        let w = weight * pad.det_jac;
                        let stiffening = if chi > 0.0 { f64::powf(1.0 / pad.det_jac, chi) } else { 1.0 };
                        let lambda = stiffening * self.lambda;
                        let mu = stiffening * self.mu;
                        let mut gu = [[0.0; 2]; 2];
                        if let Some(u) = displacement {
                            for m in 0..4 {
                                for c in 0..2 {
                                    for d in 0..2 {
                                        gu[c][d] += u.get(nodes[m], c) * pad.grad[m][d];
                                    }
                                }
                            }
                        }
                        let state = match law {
                            MaterialLaw::LinearElastic => MaterialState::linear(lambda, mu, &gu),
                            MaterialLaw::NeoHookeLn => match MaterialState::neo_hooke_ln(lambda, mu, &gu) {
                                Some(s) => s,
                                None => return Ok(false),
                            },
                        };
                        for a in 0..4 {
                            for c in 0..2 {
                                ff[c * 4 + a] += pad.nn[a] * self.body_force[c] * w;
                            }
                        }
                        if displacement.is_some() {
                            // internal forces: F S ∇N
                            for a in 0..4 {
                                for c in 0..2 {
                                    let mut f_int = 0.0;
                                    for r in 0..2 {
                                        for s in 0..2 {
                                            f_int += state.ff[c][r] * state.ss[r][s] * pad.grad[a][s];
                                        }
                                    }
                                    ff[c * 4 + a] -= f_int * w;
                                }
                            }
                        }
                        add_tangent(&mut kk, &pad.grad, &state, w);
                    }
                    for c in 0..2 {
                        for a in 0..4 {
                            let row = match self.mapper.index(c, nodes[a]) {
                                DofIndex::Free(r) => r,
                                DofIndex::Fixed(_) => continue,
                            };
                            rhs[row] += ff[c * 4 + a];
                            for d in 0..2 {
                                for b in 0..4 {
                                    let value = kk[c * 4 + a][d * 4 + b];
                                    match self.mapper.index(d, nodes[b]) {
                                        DofIndex::Free(col) => kk_global.put(row, col, value)?,
                                        DofIndex::Fixed(k) => {
                                            if displacement.is_none() {
                                                rhs[row] -= value * self.fixed.values[d][k];
                                            }
                                        }
                                    }
                                }
                            }
                        }
                    }
                }
            }
        }
        self.add_tractions(&mut rhs)?;
        self.matrix = kk_global;
        self.rhs = rhs;
        Ok(true)
    }

    /// Adds the constant side tractions to the right-hand side
    fn add_tractions(&self, rhs: &mut Vector) -> Result<(), StrError> {
        for traction in &self.tractions {
            let patch = match self.mesh.patches.get(traction.patch) {
                Some(patch) => patch,
                None => return Err("traction condition refers to a non-existent patch"),
            };
            let (k, _) = traction.side.ccw_tangent();
            for (i, j) in patch.side_cells(traction.side) {
                let coords = self.mesh.cell_coords(traction.patch, i, j);
                let nodes = patch.cell_nodes(i, j);
                for (t, weight) in GAUSS_3 {
                    let (xi, eta) = traction.side.reference_point(t);
                    let pad = CellPad::calc(&coords, xi, eta);
                    let tangent = pad.tangent(k);
                    let len = f64::sqrt(tangent[0] * tangent[0] + tangent[1] * tangent[1]);
                    for a in 0..4 {
                        for c in 0..2 {
                            if let DofIndex::Free(row) = self.mapper.index(c, nodes[a]) {
                                rhs[row] += pad.nn[a] * traction.value[c] * len * weight;
                            }
                        }
                    }
                }
            }
        }
        Ok(())
    }
}

/// Adds the material (and geometric) tangent contributions of one integration point
fn add_tangent(kk: &mut [[f64; 8]; 8], grad: &[[f64; 2]; 4], state: &MaterialState, w: f64) {
    // G[i][a][J][K] = F_iJ ∂N_a/∂X_K
    let mut g = [[[[0.0; 2]; 2]; 4]; 2];
    for i in 0..2 {
        for a in 0..4 {
            for jj in 0..2 {
                for k in 0..2 {
                    g[i][a][jj][k] = state.ff[i][jj] * grad[a][k];
                }
            }
        }
    }
    for i in 0..2 {
        for a in 0..4 {
            for k in 0..2 {
                for b in 0..4 {
                    let mut value = 0.0;
                    for p in 0..2 {
                        for q in 0..2 {
                            for r in 0..2 {
                                for s in 0..2 {
                                    value += g[i][a][p][q] * state.dd[p][q][r][s] * g[k][b][r][s];
                                }
                            }
                        }
                    }
                    if state.geometric && i == k {
                        for p in 0..2 {
                            for q in 0..2 {
                                value += grad[a][p] * state.ss[p][q] * grad[b][q];
                            }
                        }
                    }
                    kk[i * 4 + a][k * 4 + b] += value * w;
                }
            }
        }
    }
}

impl NonlinearSystem for ElasticityAssembler {
    fn n_dof(&self) -> usize {
        self.mapper.n_free()
    }

    fn fixed_dofs(&self) -> &FixedDofs {
        &self.fixed
    }

    /// Assembles the tangent and residual at the trial point (update mode)
    fn assemble(&mut self, trial: &Vector, fixed: &FixedDofs) -> Result<bool, StrError> {
        self.set_fixed_dofs(fixed)?;
        self.assemble_at(trial, fixed)
    }

    fn linear_system(&self) -> Result<LinearSystem, StrError> {
        LinearSystem::new(self.matrix.clone(), self.rhs.clone())
    }
}

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////
