use fsisim::prelude::*;
use fsisim::StrError;
use russell_lab::{approx_eq, Vector};
use russell_sparse::Genie;

// Plane Poiseuille flow in the channel [0, 2] × [0, 1]
//
//  no-slip
//  ┌──────────────────────────┐
//  │ →                        │
//  │ ──→                      │ do-nothing
//  │ ───→      u(y)           │ outflow
//  │ ──→                      │
//  │ →                        │
//  └──────────────────────────┘
//  no-slip
//
// u = 4 U y (1 - y), v = 0 and p = 8 ρ ν U (L - x) solve both the Stokes and the
// Navier-Stokes equations. The nodal values of the Q1 solution are exact.

const LENGTH: f64 = 2.0;
const MEAN: f64 = 1.0;

fn channel_assembler(param: ParamFluid) -> Result<StationaryFlowAssembler, StrError> {
    let mut mesh = MultiPatch::new();
    mesh.add_quad_patch([[0.0, 0.0], [LENGTH, 0.0], [LENGTH, 1.0], [0.0, 1.0]], 4, 4)?;
    let mut bcs = BoundaryConditions::new();
    bcs.fix(0, Side::South, 2)
        .fix(0, Side::North, 2)
        .dirichlet(0, Side::West, 0, |x| 4.0 * MEAN * x[1] * (1.0 - x[1]))
        .dirichlet(0, Side::West, 1, |_| 0.0);
    StationaryFlowAssembler::new(mesh, &bcs, param, [0.0, 0.0])
}

fn check_poiseuille(velocity: &Field, pressure: &Field, assembler: &StationaryFlowAssembler, tol: f64) {
    let param = assembler.param();
    let mesh = assembler.mesh();
    for n in 0..mesh.nnode() {
        let y = mesh.coords[n][1];
        approx_eq(velocity.get(n, 0), 4.0 * MEAN * y * (1.0 - y), tol);
        approx_eq(velocity.get(n, 1), 0.0, tol);
    }
    let pmesh = assembler.pressure_mesh();
    let scale = 8.0 * param.density * param.viscosity * MEAN;
    for n in 0..pmesh.nnode() {
        let x = pmesh.coords[n][0];
        approx_eq(pressure.get(n, 0) / scale, LENGTH - x, tol);
    }
}

#[test]
fn test_channel_flow_stokes() -> Result<(), StrError> {
    let param = ParamFluid {
        density: 1.0,
        viscosity: 0.1,
    };
    let mut assembler = channel_assembler(param)?;
    assert_eq!(assembler.assemble()?, true);
    let x = assembler.blocks().system()?.solve(Genie::Umfpack, false)?;
    let (velocity, pressure) = assembler.construct_solution(&x, assembler.fixed_dofs())?;
    check_poiseuille(&velocity, &pressure, &assembler, 1e-10);

    // the flow does not exert a net vertical force on the walls
    let force = assembler.compute_force(&velocity, &pressure, &[(0, Side::South), (0, Side::North)], true)?;
    approx_eq(force.total[1], 0.0, 1e-10);
    // wall shear: 2 walls × ρν |du/dy| L along the flow, where du/dy is the
    // slope of the first velocity cell, 4 U (1 - h) with h = 1/8
    approx_eq(force.total[0], 2.0 * 0.1 * 3.5 * LENGTH, 1e-10);
    assert!(force.pressure.is_some() && force.viscous.is_some());
    Ok(())
}

#[test]
fn test_channel_flow_navier_stokes_newton() -> Result<(), StrError> {
    let param = ParamFluid {
        density: 1.0,
        viscosity: 0.1,
    };
    let mut assembler = channel_assembler(param)?;
    let mut config = NonlinearConfig::new();
    config
        .set_iteration_type(IterationType::Next)?
        .set_tolerances(1e-10, 1e-10)?;
    let n = assembler.n_dof();
    let fixed = assembler.fixed_dofs().clone();
    let mut solver = NonlinearSolver::new(&config, Vector::new(n), fixed)?;
    let outcome = solver.solve(&mut assembler)?;
    assert!(outcome.converged());
    assert!(outcome.n_iterations() <= 4);
    let (velocity, pressure) = assembler.construct_solution(solver.solution(), solver.fixed_dofs())?;
    check_poiseuille(&velocity, &pressure, &assembler, 1e-9);
    Ok(())
}

#[test]
fn test_channel_flow_time_integration_reaches_steady_state() -> Result<(), StrError> {
    let param = ParamFluid {
        density: 1.0,
        viscosity: 0.1,
    };
    for scheme in [TimeScheme::ImplicitLinear, TimeScheme::ImplicitNonlinear] {
        let assembler = channel_assembler(param)?;
        let mut config = FlowTimeConfig::new();
        config.set_theta(1.0)?.set_scheme(scheme)?;
        let mut integrator = FlowTimeIntegrator::new(assembler, &config, None)?;
        for _ in 0..10 {
            let outcome = integrator.make_time_step(100.0, false)?;
            assert!(outcome.converged());
        }
        let (velocity, pressure) = integrator.construct_solution()?;
        check_poiseuille(&velocity, &pressure, integrator.assembler(), 1e-6);
    }
    Ok(())
}
