//! NLP solver driver
//!
//! This module owns the interface to the external constrained optimiser. It
//! assembles the variable and constraint bounds, hands the cost and
//! constraint formulation to the solver as callbacks, runs the solve under
//! the configured wall clock budget, and extracts the actuation demands and
//! predicted trajectory from the returned iterate.
//!
//! Running out of time or iterations is an expected condition under tight
//! cycle budgets, the best iterate found so far is still returned, flagged
//! as not converged, and the caller decides whether to apply it.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use log::debug;
use optimization_engine::{
    alm::{
        AlmCache, AlmFactory, AlmOptimizer, AlmProblem, NO_JACOBIAN_MAPPING,
        NO_MAPPING
    },
    constraints::{Ball2, Rectangle},
    core::{panoc::PANOCCache, ExitStatus},
    SolverError
};
use std::time::{Duration, Instant};

// Internal
use crate::indexes::Indexes;
use crate::kinematics::VehicleState;
use crate::nlp::Formulation;
use crate::params::Params;

// ---------------------------------------------------------------------------
// CONSTANTS
// ---------------------------------------------------------------------------

/// Bound applied to the state variables, large enough to never bind.
const UNBOUNDED: f64 = 1.0e19;

/// Tolerance on the inner solver's fixed point residual.
const INNER_TOLERANCE: f64 = 1e-5;

/// Tolerance on constraint satisfaction at exit.
const DELTA_TOLERANCE: f64 = 1e-3;

/// L-BFGS memory length for the inner solver.
const LBFGS_MEMORY: usize = 10;

/// Maximum number of outer penalty iterations.
const MAX_OUTER_ITERATIONS: usize = 50;

/// Initial penalty on constraint violation.
const INITIAL_PENALTY: f64 = 10.0;

/// Radius of the ball the Lagrange multiplier estimates are kept within.
const MULTIPLIER_RADIUS: f64 = 1e12;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Result of a single optimisation pass.
#[derive(Debug, Clone)]
pub struct Solution {
    /// Steering demand for the immediate next step
    pub steer_rad: f64,

    /// Speed demand for the immediate next step
    pub speed_ms: f64,

    /// Predicted vehicle positions over the horizon
    pub predicted_m: Vec<(f64, f64)>,

    /// True if the solver met its tolerances within the budget. When false
    /// the actuations are the best iterate found before the solver stopped.
    pub converged: bool,

    /// Objective value at the returned iterate
    pub cost: f64,

    /// Wall clock time spent in the solver
    pub solve_time_s: f64,

    /// Outer (penalty update) iterations performed
    pub num_outer_iterations: usize,

    /// Total inner iterations performed
    pub num_inner_iterations: usize
}

// ---------------------------------------------------------------------------
// PUBLIC FUNCTIONS
// ---------------------------------------------------------------------------

/// Solve the tracking problem from the given (latency compensated) state.
///
/// `state` provides the five pinned initial values, its speed entry is free
/// in the optimisation since the speed demand is an actuation. An `Err` here
/// means the solver itself failed numerically, not that it failed to
/// converge, the latter is reported through [`Solution::converged`].
pub fn solve(
    params: &Params,
    indexes: &Indexes,
    state: &VehicleState,
    coeffs: &[f64],
    ref_speed_ms: f64
) -> Result<Solution, SolverError> {
    let n = indexes.steps_ahead;
    let n_vars = indexes.num_vars();
    let n_cons = indexes.num_constraints();

    // ---- BOUNDS ----

    // State variables are free, the actuators carry the physical limits
    let mut var_lb = vec![-UNBOUNDED; n_vars];
    let mut var_ub = vec![UNBOUNDED; n_vars];
    for i in indexes.delta_start..indexes.v_start {
        var_lb[i] = -params.max_steer_rad;
        var_ub[i] = params.max_steer_rad;
    }
    for i in indexes.v_start..n_vars {
        var_lb[i] = 0.0;
        var_ub[i] = params.max_speed_ms;
    }

    // Dynamics residuals are pinned to zero, the initial entry of each state
    // trajectory is pinned to the measured state
    let mut con_lb = vec![0.0; n_cons];
    con_lb[indexes.x_start] = state.x_m;
    con_lb[indexes.y_start] = state.y_m;
    con_lb[indexes.psi_start] = state.psi_rad;
    con_lb[indexes.cte_start] = state.cte_m;
    con_lb[indexes.epsi_start] = state.epsi_rad;
    let con_ub = con_lb.clone();

    // ---- PROBLEM ASSEMBLY ----

    let formulation =
        Formulation::new(params, *indexes, coeffs, ref_speed_ms);

    let f = |u: &[f64], cost: &mut f64| -> Result<(), SolverError> {
        *cost = formulation.cost(u);
        Ok(())
    };
    let df = |u: &[f64], grad: &mut [f64]| -> Result<(), SolverError> {
        formulation.cost_gradient(u, grad);
        Ok(())
    };
    let f1 = |u: &[f64], res: &mut [f64]| -> Result<(), SolverError> {
        formulation.constraints(u, res);
        Ok(())
    };
    let jf1t =
        |u: &[f64], d: &[f64], res: &mut [f64]| -> Result<(), SolverError> {
            formulation.jacobian_tr_product(u, d, res);
            Ok(())
        };

    let bounds = Rectangle::new(Some(&var_lb), Some(&var_ub));
    let set_c = Rectangle::new(Some(&con_lb), Some(&con_ub));
    let set_c_alm = Rectangle::new(Some(&con_lb), Some(&con_ub));
    let set_y = Ball2::new(None, MULTIPLIER_RADIUS);

    let factory = AlmFactory::new(
        f,
        df,
        Some(f1),
        Some(jf1t),
        NO_MAPPING,
        NO_JACOBIAN_MAPPING,
        Some(set_c),
        0
    );

    let f1_alm = |u: &[f64], res: &mut [f64]| -> Result<(), SolverError> {
        formulation.constraints(u, res);
        Ok(())
    };

    let problem = AlmProblem::new(
        bounds,
        Some(set_c_alm),
        Some(set_y),
        |u: &[f64], xi: &[f64], cost: &mut f64| -> Result<(), SolverError> {
            factory.psi(u, xi, cost)
        },
        |u: &[f64], xi: &[f64], grad: &mut [f64]| -> Result<(), SolverError> {
            factory.d_psi(u, xi, grad)
        },
        Some(f1_alm),
        NO_MAPPING,
        n_cons,
        0
    );

    let panoc_cache = PANOCCache::new(n_vars, INNER_TOLERANCE, LBFGS_MEMORY);
    let mut alm_cache = AlmCache::new(panoc_cache, n_cons, 0);

    let mut optimizer = AlmOptimizer::new(&mut alm_cache, problem)
        .with_delta_tolerance(DELTA_TOLERANCE)
        .with_epsilon_tolerance(INNER_TOLERANCE)
        .with_initial_penalty(INITIAL_PENALTY)
        .with_max_outer_iterations(MAX_OUTER_ITERATIONS)
        .with_max_duration(Duration::from_secs_f64(params.solver_budget_s));

    // ---- SOLVE ----

    // The initial guess is all zero, the pinning constraints pull the
    // trajectory onto the measured state within the first iterations
    let mut u = vec![0.0; n_vars];

    let solve_start = Instant::now();
    let status = optimizer.solve(&mut u)?;
    let solve_time_s = solve_start.elapsed().as_secs_f64();

    let converged = matches!(status.exit_status(), ExitStatus::Converged);
    let cost = formulation.cost(&u);

    if params.solver_verbose {
        debug!(
            "MPC solve {:?}: {} outer / {} inner iterations, {:.2} ms, \
             cost {:.4}",
            status.exit_status(),
            status.num_outer_iterations(),
            status.num_inner_iterations(),
            solve_time_s * 1e3,
            cost
        );
    }

    // ---- EXTRACTION ----

    let predicted_m = (0..n)
        .map(|t| (u[indexes.x_start + t], u[indexes.y_start + t]))
        .collect();

    Ok(Solution {
        steer_rad: u[indexes.delta_start],
        speed_ms: u[indexes.v_start],
        predicted_m,
        converged,
        cost,
        solve_time_s,
        num_outer_iterations: status.num_outer_iterations(),
        num_inner_iterations: status.num_inner_iterations()
    })
}

// ---------------------------------------------------------------------------
// TESTS
// ---------------------------------------------------------------------------
