//! Q1 shape functions and Gauss quadrature on the reference square [-1,1]²

/// Holds the coordinates and weights of the 3-point Gauss-Legendre rule on [-1,1]
pub const GAUSS_3: [(f64, f64); 3] = [
    (-0.774596669241483377035853079956, 5.0 / 9.0),
    (0.0, 8.0 / 9.0),
    (0.774596669241483377035853079956, 5.0 / 9.0),
];

/// Holds the (ξ,η) reference coordinates of the Q1 nodes (counter-clockwise)
///
/// ```text
///  3───────2
///  │       │
///  │       │
///  0───────1
/// ```
pub const Q1_NODES: [[f64; 2]; 4] = [[-1.0, -1.0], [1.0, -1.0], [1.0, 1.0], [-1.0, 1.0]];

/// Returns the 3×3 Gauss rule on the reference square as ((ξ,η), weight)
pub fn gauss_points_cell() -> Vec<([f64; 2], f64)> {
    let mut points = Vec::with_capacity(9);
    for (eta, w_eta) in GAUSS_3 {
        for (xi, w_xi) in GAUSS_3 {
            points.push(([xi, eta], w_xi * w_eta));
        }
    }
    points
}

/// Evaluates the Q1 shape functions at (ξ,η)
pub fn q1_shape(xi: f64, eta: f64) -> [f64; 4] {
    let mut nn = [0.0; 4];
    for m in 0..4 {
        let (a, b) = (Q1_NODES[m][0], Q1_NODES[m][1]);
        nn[m] = 0.25 * (1.0 + a * xi) * (1.0 + b * eta);
    }
    nn
}

/// Evaluates the derivatives of the Q1 shape functions with respect to (ξ,η)
pub fn q1_deriv(xi: f64, eta: f64) -> [[f64; 2]; 4] {
    let mut dd = [[0.0; 2]; 4];
    for m in 0..4 {
        let (a, b) = (Q1_NODES[m][0], Q1_NODES[m][1]);
        dd[m][0] = 0.25 * a * (1.0 + b * eta);
        dd[m][1] = 0.25 * b * (1.0 + a * xi);
    }
    dd
}

/// Holds the shape functions, their gradients, and the Jacobian of a Q1 cell at one point
#[derive(Clone, Debug)]
pub struct CellPad {
    /// Shape functions N_m
    pub nn: [f64; 4],

    /// Gradients dN_m/dx (physical coordinates)
    ///
    /// Zero if the Jacobian is singular
    pub grad: [[f64; 2]; 4],

    /// Jacobian matrix jac[i][k] = ∂x_i/∂ξ_k
    pub jac: [[f64; 2]; 2],

    /// Determinant of the Jacobian matrix
    pub det_jac: f64,

    /// Physical coordinates of the point
    pub x: [f64; 2],
}

impl CellPad {
    /// Evaluates the pad of the cell with the given nodal coordinates at (ξ,η)
    pub fn calc(coords: &[[f64; 2]; 4], xi: f64, eta: f64) -> Self {
        let nn = q1_shape(xi, eta);
        let dd = q1_deriv(xi, eta);
        let mut jac = [[0.0; 2]; 2];
        let mut x = [0.0; 2];
        for m in 0..4 {
            for i in 0..2 {
                x[i] += nn[m] * coords[m][i];
                for k in 0..2 {
                    jac[i][k] += coords[m][i] * dd[m][k];
                }
            }
        }
        let det_jac = jac[0][0] * jac[1][1] - jac[0][1] * jac[1][0];
        let mut grad = [[0.0; 2]; 4];
        if det_jac != 0.0 {
            // inverse Jacobian: ∂ξ_k/∂x_i
            let inv = [
                [jac[1][1] / det_jac, -jac[0][1] / det_jac],
                [-jac[1][0] / det_jac, jac[0][0] / det_jac],
            ];
            for m in 0..4 {
                for i in 0..2 {
                    grad[m][i] = dd[m][0] * inv[0][i] + dd[m][1] * inv[1][i];
                }
            }
        }
        CellPad {
            nn,
            grad,
            jac,
            det_jac,
            x,
        }
    }

    /// Returns the column k of the Jacobian matrix, i.e., ∂x/∂ξ_k
    pub fn tangent(&self, k: usize) -> [f64; 2] {
        [self.jac[0][k], self.jac[1][k]]
    }
}

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////
