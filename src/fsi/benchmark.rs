use crate::base::{BoundaryConditions, MultiPatch, PatchCorrespondence, Side};
use crate::StrError;

/// Channel height
pub const CHANNEL_HEIGHT: f64 = 0.41;

/// Block boundaries along x
const BLOCK_X: [f64; 5] = [0.0, 0.15, 0.25, 0.6, 2.5];

/// Block boundaries along y
const BLOCK_Y: [f64; 6] = [0.0, 0.15, 0.19, 0.21, 0.25, 0.41];

/// Number of cells per block column at refinement level zero
const CELLS_U: [usize; 4] = [2, 1, 4, 16];

/// Number of cells per block row at refinement level zero
const CELLS_V: [usize; 5] = [2, 1, 1, 1, 2];

/// Block occupied by the beam
const BEAM_BLOCK: (usize, usize) = (2, 2);

/// Blocks occupied by the rigid obstacle
const OBSTACLE_BLOCKS: [(usize, usize); 3] = [(1, 1), (1, 2), (1, 3)];

/// First block column of the ALE region
const ALE_FIRST_COLUMN: usize = 2;

/// Holds the geometry of the flapping-beam benchmark
///
/// The channel `[0, 2.5] × [0, 0.41]` is split into a 4 × 5 block layout:
///
/// ```text
///  0.41 ┌────┬──┬──────┬────────────────────────┐
///       │    │  │      │                        │
///  0.25 ├────┼──┼──────┼────────────────────────┤
///       │    │▓▓│      │                        │
///  0.21 ├────┤▓▓├──────┤                        │
///       │    │▓▓│ beam │                        │
///  0.19 ├────┤▓▓├──────┤                        │
///       │    │▓▓│      │                        │
///  0.15 ├────┼──┼──────┼────────────────────────┤
///       │    │  │      │                        │
///  0.00 └────┴──┴──────┴────────────────────────┘
///      0.0  0.15 0.25  0.6                      2.5
/// ```
///
/// The obstacle (▓) is a hole in the flow domain; the beam is meshed separately.
/// The blocks of the two right-most columns (except the beam) form the ALE region.
pub struct FlappingBeamGeometry {
    /// Coarse (pressure) mesh of the flow domain
    pub flow: MultiPatch,

    /// Beam mesh at the velocity resolution
    pub beam: MultiPatch,

    /// ALE mesh at the velocity resolution
    pub ale: MultiPatch,

    /// Flow patch ↔ ALE patch correspondence
    pub correspondence: PatchCorrespondence,

    /// Flow patch index of each block (None for the obstacle and the beam)
    flow_blocks: [[Option<usize>; 5]; 4],

    /// ALE patch index of each block
    ale_blocks: [[Option<usize>; 5]; 4],
}

impl FlappingBeamGeometry {
    /// Generates the meshes
    ///
    /// `refine` is the number of uniform refinements of the coarse block layout.
    /// The velocity, ALE and beam meshes are refined once more than the pressure mesh.
    pub fn new(refine: usize) -> Result<Self, StrError> {
        if refine > 6 {
            return Err("the number of refinements must be ≤ 6");
        }
        let factor = 1 << refine;
        let mut flow = MultiPatch::new();
        let mut ale_coarse = MultiPatch::new();
        let mut beam_coarse = MultiPatch::new();
        let mut flow_blocks = [[None; 5]; 4];
        let mut ale_blocks = [[None; 5]; 4];
        let mut pairs = Vec::new();
        for bj in 0..5 {
            for bi in 0..4 {
                let corners = block_corners(bi, bj);
                let (nu, nv) = (CELLS_U[bi] * factor, CELLS_V[bj] * factor);
                if (bi, bj) == BEAM_BLOCK {
                    beam_coarse.add_quad_patch(corners, nu, nv)?;
                    continue;
                }
                if OBSTACLE_BLOCKS.contains(&(bi, bj)) {
                    continue;
                }
                let f = flow.add_quad_patch(corners, nu, nv)?;
                flow_blocks[bi][bj] = Some(f);
                if bi >= ALE_FIRST_COLUMN {
                    let a = ale_coarse.add_quad_patch(corners, nu, nv)?;
                    ale_blocks[bi][bj] = Some(a);
                    pairs.push((f, a));
                }
            }
        }
        Ok(FlappingBeamGeometry {
            flow,
            beam: beam_coarse.uniform_refine(),
            ale: ale_coarse.uniform_refine(),
            correspondence: PatchCorrespondence::new(&pairs)?,
            flow_blocks,
            ale_blocks,
        })
    }

    /// Returns the flow patch of block (bi, bj)
    pub fn flow_patch(&self, bi: usize, bj: usize) -> Result<usize, StrError> {
        match self.flow_blocks.get(bi).and_then(|column| column.get(bj)) {
            Some(Some(p)) => Ok(*p),
            _ => Err("the block is not part of the flow domain"),
        }
    }

    /// Returns the ALE patch of block (bi, bj)
    pub fn ale_patch(&self, bi: usize, bj: usize) -> Result<usize, StrError> {
        match self.ale_blocks.get(bi).and_then(|column| column.get(bj)) {
            Some(Some(p)) => Ok(*p),
            _ => Err("the block is not part of the ALE domain"),
        }
    }

    /// Returns the velocity boundary conditions of the flow
    ///
    /// * parabolic inflow `u = 6 U y (H - y) / H²` on the left wall
    /// * no-slip on the channel walls, the obstacle and the fluid-structure interface
    /// * do-nothing outflow on the right wall
    pub fn flow_conditions(&self, mean_velocity: f64) -> Result<BoundaryConditions, StrError> {
        let mut bcs = BoundaryConditions::new();
        for bi in 0..4 {
            bcs.fix(self.flow_patch(bi, 0)?, Side::South, 2);
            bcs.fix(self.flow_patch(bi, 4)?, Side::North, 2);
        }
        for (p, side) in self.obstacle_sides()? {
            bcs.fix(p, side, 2);
        }
        for (_, (p, side)) in self.interfaces()? {
            bcs.fix(p, side, 2);
        }
        let h = CHANNEL_HEIGHT;
        for bj in 0..5 {
            let p = self.flow_patch(0, bj)?;
            bcs.dirichlet(p, Side::West, 0, move |x| mean_velocity * 6.0 * x[1] * (h - x[1]) / (h * h))
                .dirichlet(p, Side::West, 1, |_| 0.0);
        }
        Ok(bcs)
    }

    /// Returns the conditions of the beam: clamped to the obstacle
    pub fn beam_conditions(&self) -> BoundaryConditions {
        let mut bcs = BoundaryConditions::new();
        bcs.fix(0, Side::West, 2);
        bcs
    }

    /// Returns the conditions of the ALE mesh: zero displacement on the whole boundary
    pub fn ale_conditions(&self) -> BoundaryConditions {
        let mut bcs = BoundaryConditions::new();
        for (p, side) in self.ale.boundary_sides() {
            bcs.fix(p, side, 2);
        }
        bcs
    }

    /// Returns the flow sides along the rigid obstacle
    pub fn obstacle_sides(&self) -> Result<Vec<(usize, Side)>, StrError> {
        Ok(vec![
            (self.flow_patch(0, 1)?, Side::East),
            (self.flow_patch(0, 2)?, Side::East),
            (self.flow_patch(0, 3)?, Side::East),
            (self.flow_patch(1, 0)?, Side::North),
            (self.flow_patch(1, 4)?, Side::South),
            (self.flow_patch(2, 1)?, Side::West),
            (self.flow_patch(2, 3)?, Side::West),
        ])
    }

    /// Returns the fluid-structure interfaces as (beam side, (flow patch, flow side)) pairs
    ///
    /// The flow patches coincide with ALE patches (see `ale_interfaces`).
    pub fn interfaces(&self) -> Result<Vec<(Side, (usize, Side))>, StrError> {
        Ok(vec![
            (Side::North, (self.flow_patch(2, 3)?, Side::South)),
            (Side::South, (self.flow_patch(2, 1)?, Side::North)),
            (Side::East, (self.flow_patch(3, 2)?, Side::West)),
        ])
    }

    /// Returns the fluid-structure interfaces as (beam side, (ALE patch, ALE side)) pairs
    pub fn ale_interfaces(&self) -> Result<Vec<(Side, (usize, Side))>, StrError> {
        Ok(vec![
            (Side::North, (self.ale_patch(2, 3)?, Side::South)),
            (Side::South, (self.ale_patch(2, 1)?, Side::North)),
            (Side::East, (self.ale_patch(3, 2)?, Side::West)),
        ])
    }

    /// Returns the flow sides where the force on the structure is integrated (obstacle and beam)
    pub fn force_sides(&self) -> Result<Vec<(usize, Side)>, StrError> {
        let mut sides = self.obstacle_sides()?;
        for (_, side) in self.interfaces()? {
            sides.push(side);
        }
        Ok(sides)
    }

    /// Returns the pressure probes (patch, u, v) at the front of the obstacle and at the tip of the beam
    pub fn pressure_probes(&self) -> Result<[(usize, f64, f64); 2], StrError> {
        Ok([(self.flow_patch(0, 2)?, 1.0, 0.5), (self.flow_patch(3, 2)?, 0.0, 0.5)])
    }
}

/// Returns the corners of block (bi, bj) in counter-clockwise order
fn block_corners(bi: usize, bj: usize) -> [[f64; 2]; 4] {
    let (xa, xb) = (BLOCK_X[bi], BLOCK_X[bi + 1]);
    let (ya, yb) = (BLOCK_Y[bj], BLOCK_Y[bj + 1]);
    [[xa, ya], [xb, ya], [xb, yb], [xa, yb]]
}

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////
