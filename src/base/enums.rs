use serde::{Deserialize, Serialize};

/// Identifies one side of a patch in the parametric domain (u,v) ∈ [0,1]²
///
/// ```text
///            North (v = 1)
///          ┌──────────────┐
///          │              │
/// West     │              │     East
/// (u = 0)  │              │   (u = 1)
///          │              │
///          └──────────────┘
///            South (v = 0)
/// ```
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq, PartialOrd, Ord, Deserialize, Serialize)]
pub enum Side {
    West,
    East,
    South,
    North,
}

impl Side {
    /// Holds all sides in a fixed order
    pub const ALL: [Side; 4] = [Side::West, Side::East, Side::South, Side::North];

    /// Returns the (ξ,η) reference coordinates of a point on this side of a Q1 cell
    ///
    /// `t ∈ [-1, 1]` runs along the side in the direction of increasing parametric coordinate.
    pub fn reference_point(&self, t: f64) -> (f64, f64) {
        match self {
            Side::West => (-1.0, t),
            Side::East => (1.0, t),
            Side::South => (t, -1.0),
            Side::North => (t, 1.0),
        }
    }

    /// Returns the orientation of this side when the cell boundary is traversed counter-clockwise
    ///
    /// Returns `(k, sign)` such that the counter-clockwise tangent is `sign · ∂x/∂ξ_k`.
    pub fn ccw_tangent(&self) -> (usize, f64) {
        match self {
            Side::South => (0, 1.0),
            Side::East => (1, 1.0),
            Side::North => (0, -1.0),
            Side::West => (1, -1.0),
        }
    }
}

/// Defines the time integration scheme of the flow and elasticity integrators
#[derive(Clone, Copy, Debug, Eq, PartialEq, Deserialize, Serialize)]
pub enum TimeScheme {
    /// Linearizes the nonlinear terms about an extrapolated state and solves once per step
    ImplicitLinear,

    /// Iterates with Newton's method until convergence at each step
    ImplicitNonlinear,
}

/// Defines how the convective term is linearized by the flow assembler
#[derive(Clone, Copy, Debug, Eq, PartialEq, Deserialize, Serialize)]
pub enum FlowAssembly {
    /// Frozen transport velocity (Picard/Oseen linearization)
    Oseen,

    /// Full linearization including the derivative of the convective term
    Newton,
}

/// Defines how the solution of the linear system updates the nonlinear trial point
#[derive(Clone, Copy, Debug, Eq, PartialEq, Deserialize, Serialize)]
pub enum IterationType {
    /// The linear solution is an increment added to the trial point
    Update,

    /// The linear solution replaces the trial point
    Next,
}

/// Defines the constitutive law of the elasticity assembler
#[derive(Clone, Copy, Debug, Eq, PartialEq, Deserialize, Serialize)]
pub enum MaterialLaw {
    /// Small-strain linear elasticity
    LinearElastic,

    /// Neo-Hookean hyperelasticity with a logarithmic volumetric term
    NeoHookeLn,
}

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////
