use super::Side;
use crate::StrError;
use std::collections::HashMap;
use std::fmt;

/// Defines the tolerance (relative to the patch size) used to glue coincident nodes
const GLUE_TOLERANCE: f64 = 1e-10;

/// Holds one structured patch of Q1 cells
///
/// The nodes are numbered lexicographically in the parametric domain:
/// the node at column i and row j is `nodes[j * (nu + 1) + i]`.
#[derive(Clone, Debug)]
pub struct Patch {
    /// Number of cells along u
    pub nu: usize,

    /// Number of cells along v
    pub nv: usize,

    /// Global ids of the (nu + 1) × (nv + 1) nodes
    pub nodes: Vec<usize>,
}

impl Patch {
    /// Returns the global id of the node at (i, j)
    #[inline]
    pub fn node(&self, i: usize, j: usize) -> usize {
        self.nodes[j * (self.nu + 1) + i]
    }

    /// Returns the number of cells
    #[inline]
    pub fn ncell(&self) -> usize {
        self.nu * self.nv
    }

    /// Returns the nodes of cell (i, j) in counter-clockwise order
    pub fn cell_nodes(&self, i: usize, j: usize) -> [usize; 4] {
        [
            self.node(i, j),
            self.node(i + 1, j),
            self.node(i + 1, j + 1),
            self.node(i, j + 1),
        ]
    }

    /// Returns the nodes along a side, sorted by increasing parametric coordinate
    pub fn side_nodes(&self, side: Side) -> Vec<usize> {
        match side {
            Side::West => (0..=self.nv).map(|j| self.node(0, j)).collect(),
            Side::East => (0..=self.nv).map(|j| self.node(self.nu, j)).collect(),
            Side::South => (0..=self.nu).map(|i| self.node(i, 0)).collect(),
            Side::North => (0..=self.nu).map(|i| self.node(i, self.nv)).collect(),
        }
    }

    /// Returns the (i, j) indices of the cells touching a side
    pub fn side_cells(&self, side: Side) -> Vec<(usize, usize)> {
        match side {
            Side::West => (0..self.nv).map(|j| (0, j)).collect(),
            Side::East => (0..self.nv).map(|j| (self.nu - 1, j)).collect(),
            Side::South => (0..self.nu).map(|i| (i, 0)).collect(),
            Side::North => (0..self.nu).map(|i| (i, self.nv - 1)).collect(),
        }
    }

    /// Returns the cell containing the parametric point (u, v) and the reference coordinates (ξ, η)
    pub fn locate(&self, u: f64, v: f64) -> (usize, usize, f64, f64) {
        let su = f64::clamp(u, 0.0, 1.0) * self.nu as f64;
        let sv = f64::clamp(v, 0.0, 1.0) * self.nv as f64;
        let i = usize::min(su.floor() as usize, self.nu - 1);
        let j = usize::min(sv.floor() as usize, self.nv - 1);
        let xi = 2.0 * (su - i as f64) - 1.0;
        let eta = 2.0 * (sv - j as f64) - 1.0;
        (i, j, xi, eta)
    }
}

/// Holds a two-dimensional multi-patch mesh of Q1 cells
///
/// Patches are glued node-wise: nodes shared by two patches have a single global id.
#[derive(Clone, Debug)]
pub struct MultiPatch {
    /// Nodal coordinates
    pub coords: Vec<[f64; 2]>,

    /// All patches
    pub patches: Vec<Patch>,
}

impl MultiPatch {
    /// Allocates an empty multi-patch
    pub fn new() -> Self {
        MultiPatch {
            coords: Vec::new(),
            patches: Vec::new(),
        }
    }

    /// Returns the number of nodes
    #[inline]
    pub fn nnode(&self) -> usize {
        self.coords.len()
    }

    /// Returns the total number of cells
    pub fn ncell(&self) -> usize {
        self.patches.iter().map(|p| p.ncell()).sum()
    }

    /// Adds a bilinear patch with corners given in counter-clockwise order
    ///
    /// The corners correspond to (u,v) = (0,0), (1,0), (1,1), (0,1). Nodes on the new patch
    /// boundary that coincide with existing nodes are glued to them.
    ///
    /// Returns the index of the new patch.
    pub fn add_quad_patch(&mut self, corners: [[f64; 2]; 4], nu: usize, nv: usize) -> Result<usize, StrError> {
        if nu == 0 || nv == 0 {
            return Err("the number of cells along each direction must be ≥ 1");
        }
        let mut size: f64 = 0.0;
        for m in 1..4 {
            size = f64::max(size, f64::abs(corners[m][0] - corners[0][0]));
            size = f64::max(size, f64::abs(corners[m][1] - corners[0][1]));
        }
        if size == 0.0 {
            return Err("the patch corners must not coincide");
        }
        let tol = GLUE_TOLERANCE * size;
        let mut nodes = Vec::with_capacity((nu + 1) * (nv + 1));
        for j in 0..=nv {
            for i in 0..=nu {
                let s = i as f64 / nu as f64;
                let t = j as f64 / nv as f64;
                let mut x = [0.0; 2];
                for d in 0..2 {
                    x[d] = (1.0 - s) * (1.0 - t) * corners[0][d]
                        + s * (1.0 - t) * corners[1][d]
                        + s * t * corners[2][d]
                        + (1.0 - s) * t * corners[3][d];
                }
                let on_boundary = i == 0 || i == nu || j == 0 || j == nv;
                let existing = if on_boundary { self.find_node(&x, tol) } else { None };
                match existing {
                    Some(id) => nodes.push(id),
                    None => {
                        nodes.push(self.coords.len());
                        self.coords.push(x);
                    }
                }
            }
        }
        self.patches.push(Patch { nu, nv, nodes });
        Ok(self.patches.len() - 1)
    }

    /// Returns a new multi-patch with every cell split into four
    ///
    /// The node ids of this multi-patch are preserved: node k of the coarse mesh is
    /// node k of the refined mesh. New nodes are placed at the bilinear midpoints.
    pub fn uniform_refine(&self) -> MultiPatch {
        let mut coords = self.coords.clone();
        let mut mid_edges: HashMap<(usize, usize), usize> = HashMap::new();
        let mut patches = Vec::with_capacity(self.patches.len());
        for patch in &self.patches {
            let (nu, nv) = (2 * patch.nu, 2 * patch.nv);
            let mut nodes = vec![0; (nu + 1) * (nv + 1)];
            for jj in 0..=nv {
                for ii in 0..=nu {
                    let (i, j) = (ii / 2, jj / 2);
                    let id = match (ii % 2, jj % 2) {
                        (0, 0) => patch.node(i, j),
                        (1, 0) => midpoint(&mut coords, &mut mid_edges, patch.node(i, j), patch.node(i + 1, j)),
                        (0, 1) => midpoint(&mut coords, &mut mid_edges, patch.node(i, j), patch.node(i, j + 1)),
                        _ => {
                            let cell = patch.cell_nodes(i, j);
                            let mut x = [0.0; 2];
                            for n in cell {
                                x[0] += 0.25 * self.coords[n][0];
                                x[1] += 0.25 * self.coords[n][1];
                            }
                            coords.push(x);
                            coords.len() - 1
                        }
                    };
                    nodes[jj * (nu + 1) + ii] = id;
                }
            }
            patches.push(Patch { nu, nv, nodes });
        }
        MultiPatch { coords, patches }
    }

    /// Returns the nodal coordinates of cell (i, j) of a patch
    pub fn cell_coords(&self, patch: usize, i: usize, j: usize) -> [[f64; 2]; 4] {
        let nodes = self.patches[patch].cell_nodes(i, j);
        [
            self.coords[nodes[0]],
            self.coords[nodes[1]],
            self.coords[nodes[2]],
            self.coords[nodes[3]],
        ]
    }

    /// Returns the nodes along a side of a patch
    pub fn side_nodes(&self, patch: usize, side: Side) -> Result<Vec<usize>, StrError> {
        match self.patches.get(patch) {
            Some(p) => Ok(p.side_nodes(side)),
            None => Err("patch index is out of range"),
        }
    }

    /// Returns the patch sides that lie on the boundary of the multi-patch domain
    ///
    /// A side is on the boundary if its cell edges are not shared with any other cell.
    pub fn boundary_sides(&self) -> Vec<(usize, Side)> {
        let mut edge_count: HashMap<(usize, usize), usize> = HashMap::new();
        for patch in &self.patches {
            for j in 0..patch.nv {
                for i in 0..patch.nu {
                    let c = patch.cell_nodes(i, j);
                    for m in 0..4 {
                        *edge_count.entry(edge_key(c[m], c[(m + 1) % 4])).or_insert(0) += 1;
                    }
                }
            }
        }
        let mut sides = Vec::new();
        for (p, patch) in self.patches.iter().enumerate() {
            for side in Side::ALL {
                let nodes = patch.side_nodes(side);
                let key = edge_key(nodes[0], nodes[1]);
                if edge_count.get(&key) == Some(&1) {
                    sides.push((p, side));
                }
            }
        }
        sides
    }

    /// Adds a displacement to the nodal coordinates
    ///
    /// `increment[k]` is added to node k; only the first `increment.len()` nodes are moved.
    pub fn displace(&mut self, increment: &[[f64; 2]]) -> Result<(), StrError> {
        if increment.len() > self.coords.len() {
            return Err("the displacement has more entries than the number of nodes");
        }
        for (x, du) in self.coords.iter_mut().zip(increment) {
            x[0] += du[0];
            x[1] += du[1];
        }
        Ok(())
    }

    /// Checks whether all cells have a positive Jacobian determinant
    ///
    /// The determinant of a bilinear map is bilinear; hence, checking the corners suffices.
    ///
    /// Returns the index of the first patch containing an invalid cell or None if the mesh is valid.
    pub fn check_geometry(&self) -> Option<usize> {
        for (p, patch) in self.patches.iter().enumerate() {
            for j in 0..patch.nv {
                for i in 0..patch.nu {
                    let x = self.cell_coords(p, i, j);
                    for m in 0..4 {
                        let next = x[(m + 1) % 4];
                        let prev = x[(m + 3) % 4];
                        let a = [next[0] - x[m][0], next[1] - x[m][1]];
                        let b = [prev[0] - x[m][0], prev[1] - x[m][1]];
                        if a[0] * b[1] - a[1] * b[0] <= 0.0 {
                            return Some(p);
                        }
                    }
                }
            }
        }
        None
    }

    fn find_node(&self, x: &[f64; 2], tol: f64) -> Option<usize> {
        self.coords
            .iter()
            .position(|y| f64::abs(y[0] - x[0]) <= tol && f64::abs(y[1] - x[1]) <= tol)
    }
}

impl fmt::Display for MultiPatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Multi-patch mesh\n")?;
        write!(f, "================\n")?;
        write!(f, "number of patches = {}\n", self.patches.len())?;
        write!(f, "number of cells = {}\n", self.ncell())?;
        write!(f, "number of nodes = {}\n", self.nnode())?;
        for (p, patch) in self.patches.iter().enumerate() {
            write!(f, "patch {}: {} × {} cells\n", p, patch.nu, patch.nv)?;
        }
        Ok(())
    }
}

fn edge_key(a: usize, b: usize) -> (usize, usize) {
    if a < b {
        (a, b)
    } else {
        (b, a)
    }
}

fn midpoint(coords: &mut Vec<[f64; 2]>, mid_edges: &mut HashMap<(usize, usize), usize>, a: usize, b: usize) -> usize {
    let key = edge_key(a, b);
    if let Some(id) = mid_edges.get(&key) {
        return *id;
    }
    let x = [0.5 * (coords[a][0] + coords[b][0]), 0.5 * (coords[a][1] + coords[b][1])];
    coords.push(x);
    let id = coords.len() - 1;
    mid_edges.insert(key, id);
    id
}

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////
