use fsisim::prelude::*;
use fsisim::StrError;
use russell_lab::approx_eq;

// Fluid at rest in the channel [0, 2] × [0, 1] with no-slip walls, a closed inlet and a
// do-nothing outlet, driven by the body force f = (g, 0)
//
// The velocity stays zero and the pressure balances the body force: p = ρ g (x - L).

const LENGTH: f64 = 2.0;
const GRAVITY: f64 = 0.5;

fn integrator(scheme: TimeScheme, theta: f64) -> Result<FlowTimeIntegrator, StrError> {
    let mut mesh = MultiPatch::new();
    mesh.add_quad_patch([[0.0, 0.0], [LENGTH, 0.0], [LENGTH, 1.0], [0.0, 1.0]], 4, 2)?;
    let mut bcs = BoundaryConditions::new();
    bcs.fix(0, Side::South, 2).fix(0, Side::North, 2).fix(0, Side::West, 2);
    let param = ParamFluid {
        density: 1000.0,
        viscosity: 0.001,
    };
    let assembler = StationaryFlowAssembler::new(mesh, &bcs, param, [GRAVITY, 0.0])?;
    let mut config = FlowTimeConfig::new();
    config.set_scheme(scheme)?.set_theta(theta)?;
    FlowTimeIntegrator::new(assembler, &config, None)
}

#[test]
fn test_flow_rest_state() -> Result<(), StrError> {
    for scheme in [TimeScheme::ImplicitLinear, TimeScheme::ImplicitNonlinear] {
        for theta in [0.0, 0.5, 1.0] {
            let mut flow = integrator(scheme, theta)?;
            assert_eq!(flow.initialize()?, true);
            for _ in 0..3 {
                let outcome = flow.make_time_step(0.1, false)?;
                assert!(outcome.converged());
            }
            let (velocity, pressure) = flow.construct_solution()?;
            for n in 0..velocity.nnode() {
                approx_eq(velocity.get(n, 0), 0.0, 1e-10);
                approx_eq(velocity.get(n, 1), 0.0, 1e-10);
            }
            let pmesh = flow.assembler().pressure_mesh();
            for n in 0..pmesh.nnode() {
                let expected = 1000.0 * GRAVITY * (pmesh.coords[n][0] - LENGTH);
                approx_eq(pressure.get(n, 0), expected, 1e-8);
            }
        }
    }
    Ok(())
}

#[test]
fn test_flow_rest_state_captures_errors() -> Result<(), StrError> {
    let mut flow = integrator(TimeScheme::ImplicitLinear, 0.5)?;
    assert_eq!(
        flow.make_time_step(0.1, true).err(),
        Some("the ALE correction requires an ALE link")
    );
    assert_eq!(flow.make_time_step(0.0, false).err(), Some("the time step must be > 0.0"));
    let outcome = flow.make_time_step(0.1, false)?;
    assert_eq!(outcome, SolveOutcome::Converged(1));
    assert_eq!(flow.n_iterations(), 1);
    approx_eq(flow.old_time_step(), 0.1, 1e-15);
    Ok(())
}
