//! Implementations for the MpcCtrl state structure

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use log::warn;
use serde::Serialize;

// Internal
use crate::indexes::Indexes;
use crate::kinematics::{self, VehicleState};
use crate::params::Params;
use crate::poly;
use crate::solver;
use crate::MpcCtrlError;
use util::module::State;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// MPC module state
pub struct MpcCtrl {
    params: Params,

    /// Layout of the decision variable vector, derived from the horizon
    /// length at initialisation.
    indexes: Indexes,

    /// Actuation issued on the previous cycle, the command the vehicle is
    /// still executing during the latency window. `None` before the first
    /// solve.
    last_actuation: Option<(f64, f64)>
}

/// Input data to the MPC module for one cycle.
#[derive(Clone, Debug, Default)]
pub struct InputData {
    /// The sensed vehicle state
    pub state: VehicleState,

    /// Waypoints describing the desired path, in the same frame as the
    /// vehicle state
    pub waypoints_m: Vec<(f64, f64)>,

    /// Optional override of the configured reference speed for this cycle
    pub ref_speed_ms: Option<f64>
}

/// Output demands from the MPC module.
#[derive(Clone, Serialize, Debug, Default)]
pub struct OutputData {
    /// Steering demand
    pub steer_dem_rad: f64,

    /// Speed demand
    pub speed_dem_ms: f64,

    /// The predicted vehicle positions over the horizon, for monitoring and
    /// visualisation
    pub predicted_m: Vec<(f64, f64)>
}

/// Status report for MpcCtrl processing.
#[derive(Clone, Copy, Serialize, Debug, Default)]
pub struct StatusReport {
    /// True if the solver converged within its budget. When false the
    /// output demands are the solver's best effort and the caller should
    /// decide whether to apply, clamp or discard them.
    pub converged: bool,

    /// Objective value of the returned plan
    pub cost: f64,

    /// Wall clock time spent in the solver
    pub solve_time_s: f64,

    /// Cross track error of the (latency compensated) state the plan
    /// starts from
    pub cte_m: f64,

    /// Heading error of the (latency compensated) state the plan starts
    /// from
    pub epsi_rad: f64
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl Default for MpcCtrl {
    fn default() -> Self {
        let params = Params::default();
        let indexes = Indexes::new(params.steps_ahead);

        Self {
            params,
            indexes,
            last_actuation: None
        }
    }
}

impl State for MpcCtrl {
    type InitData = Params;
    type InitError = MpcCtrlError;

    type InputData = InputData;
    type OutputData = OutputData;
    type StatusReport = StatusReport;
    type ProcError = MpcCtrlError;

    /// Initialise the MpcCtrl module.
    ///
    /// The parameters are validated here, an invalid set is fatal and the
    /// module refuses to initialise.
    fn init(&mut self, init_data: Params) -> Result<(), MpcCtrlError> {
        init_data.validate()?;

        self.indexes = Indexes::new(init_data.steps_ahead);
        self.params = init_data;
        self.last_actuation = None;

        Ok(())
    }

    /// Process one control cycle.
    ///
    /// Processing involves:
    ///  1. Validating the state and waypoints.
    ///  2. Fitting the reference polynomial to the waypoints.
    ///  3. Projecting the state through the actuation latency window.
    ///  4. Solving the tracking problem and extracting the demands.
    fn proc(&mut self, input_data: &InputData)
        -> Result<(OutputData, StatusReport), MpcCtrlError>
    {
        // ---- INPUT VALIDATION ----

        if !input_data.state.is_finite() {
            return Err(MpcCtrlError::NonFiniteState(input_data.state))
        }

        for (i, waypoint) in input_data.waypoints_m.iter().enumerate() {
            if !(waypoint.0.is_finite() && waypoint.1.is_finite()) {
                return Err(MpcCtrlError::NonFiniteWaypoint(i))
            }
        }

        let required = self.params.poly_degree + 1;
        if input_data.waypoints_m.len() < required {
            return Err(MpcCtrlError::TooFewWaypoints {
                required,
                degree: self.params.poly_degree,
                got: input_data.waypoints_m.len()
            })
        }

        // ---- REFERENCE FIT ----

        let xs: Vec<f64> =
            input_data.waypoints_m.iter().map(|w| w.0).collect();
        let ys: Vec<f64> =
            input_data.waypoints_m.iter().map(|w| w.1).collect();

        let coeffs = poly::fit(&xs, &ys, self.params.poly_degree)?;

        // ---- LATENCY COMPENSATION ----

        let (last_steer_rad, _) = self.last_actuation.unwrap_or((0.0, 0.0));

        let projected = kinematics::project(
            &input_data.state,
            last_steer_rad,
            &coeffs,
            self.params.wheelbase_m,
            self.params.latency_s
        );

        // ---- TARGET SPEED ----

        let mut ref_speed_ms = input_data
            .ref_speed_ms
            .unwrap_or(self.params.ref_speed_ms);

        if ref_speed_ms > self.params.max_speed_ms {
            warn!(
                "Reference speed override of {} m/s exceeds the {} m/s \
                 limit, clamping",
                ref_speed_ms, self.params.max_speed_ms
            );
            ref_speed_ms = self.params.max_speed_ms;
        }

        // ---- SOLVE ----

        let solution = solver::solve(
            &self.params,
            &self.indexes,
            &projected,
            &coeffs,
            ref_speed_ms
        )
        .map_err(MpcCtrlError::SolverFailure)?;

        if !solution.converged {
            warn!(
                "MPC solve did not converge within {} s, returning best \
                 effort demands",
                self.params.solver_budget_s
            );
        }

        self.last_actuation =
            Some((solution.steer_rad, solution.speed_ms));

        let report = StatusReport {
            converged: solution.converged,
            cost: solution.cost,
            solve_time_s: solution.solve_time_s,
            cte_m: projected.cte_m,
            epsi_rad: projected.epsi_rad
        };

        let output = OutputData {
            steer_dem_rad: solution.steer_rad,
            speed_dem_ms: solution.speed_ms,
            predicted_m: solution.predicted_m
        };

        Ok((output, report))
    }
}

// ---------------------------------------------------------------------------
// TESTS
// ---------------------------------------------------------------------------
