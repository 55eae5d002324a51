//! MPC parameters

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use serde::Deserialize;
use thiserror::Error;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Parameters for the MPC module
#[derive(Deserialize, Debug, Clone)]
pub struct Params {

    /// Number of steps in the prediction horizon
    pub steps_ahead: usize,

    /// Time between steps of the prediction horizon
    pub dt_s: f64,

    /// Actuation latency. The incoming vehicle state is projected forward by
    /// this duration before each solve so that the plan starts from the
    /// state the vehicle will be in when the demands take effect.
    pub latency_s: f64,

    /// Degree of the polynomial fitted to the reference waypoints
    pub poly_degree: usize,

    /// Cross track error weight
    pub cte_coeff: f64,

    /// Heading error weight
    pub epsi_coeff: f64,

    /// Reference speed tracking weight
    pub speed_coeff: f64,

    /// Steering magnitude weight
    pub steer_coeff: f64,

    /// Weight on the change between consecutive steering demands
    pub consec_steer_coeff: f64,

    /// Weight on the change between consecutive speed demands
    pub consec_speed_coeff: f64,

    /// Reference speed
    pub ref_speed_ms: f64,

    /// Distance between the front axle and the centre of gravity
    pub wheelbase_m: f64,

    /// Steering demand magnitude limit
    pub max_steer_rad: f64,

    /// Speed demand upper limit
    pub max_speed_ms: f64,

    /// Wall clock budget for a single solve
    pub solver_budget_s: f64,

    /// If true per-solve statistics are logged at debug level
    pub solver_verbose: bool
}

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

/// An error in the parameter values, detected at module initialisation.
#[derive(Debug, Error)]
pub enum ParamsError {
    #[error("Prediction horizon must be at least 2 steps, got {0}")]
    HorizonTooShort(usize),

    #[error("Polynomial degree must be at least 1, got {0}")]
    DegreeTooLow(usize),

    #[error("Horizon timestep must be positive, got {0} s")]
    NonPositiveTimestep(f64),

    #[error("Actuation latency cannot be negative, got {0} s")]
    NegativeLatency(f64),

    #[error("Reference speed ({0} m/s) must be below the speed limit ({1} m/s)")]
    RefSpeedAboveLimit(f64, f64),

    #[error("Steering limit must be positive, got {0} rad")]
    NonPositiveSteerLimit(f64),

    #[error("Wheelbase must be positive, got {0} m")]
    NonPositiveWheelbase(f64),

    #[error("Solver budget must be positive, got {0} s")]
    NonPositiveBudget(f64)
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl Params {
    /// Check the parameter values are usable.
    ///
    /// A violation here is fatal, the module will refuse to initialise.
    pub fn validate(&self) -> Result<(), ParamsError> {
        if self.steps_ahead < 2 {
            return Err(ParamsError::HorizonTooShort(self.steps_ahead))
        }
        if self.poly_degree < 1 {
            return Err(ParamsError::DegreeTooLow(self.poly_degree))
        }
        if self.dt_s <= 0.0 {
            return Err(ParamsError::NonPositiveTimestep(self.dt_s))
        }
        if self.latency_s < 0.0 {
            return Err(ParamsError::NegativeLatency(self.latency_s))
        }
        if self.ref_speed_ms >= self.max_speed_ms {
            return Err(ParamsError::RefSpeedAboveLimit(
                self.ref_speed_ms, self.max_speed_ms
            ))
        }
        if self.max_steer_rad <= 0.0 {
            return Err(ParamsError::NonPositiveSteerLimit(self.max_steer_rad))
        }
        if self.wheelbase_m <= 0.0 {
            return Err(ParamsError::NonPositiveWheelbase(self.wheelbase_m))
        }
        if self.solver_budget_s <= 0.0 {
            return Err(ParamsError::NonPositiveBudget(self.solver_budget_s))
        }

        Ok(())
    }
}

impl Default for Params {
    fn default() -> Self {
        Self {
            steps_ahead: 10,
            dt_s: 0.1,
            latency_s: 0.1,
            poly_degree: 3,
            cte_coeff: 2.0,
            epsi_coeff: 20.0,
            speed_coeff: 0.5,
            steer_coeff: 5.0,
            consec_steer_coeff: 200.0,
            consec_speed_coeff: 1.0,
            ref_speed_ms: 10.0,
            wheelbase_m: 0.325,
            // 25 degrees
            max_steer_rad: 25.0 * std::f64::consts::PI / 180.0,
            max_speed_ms: 40.0,
            solver_budget_s: 0.5,
            solver_verbose: false
        }
    }
}

// ---------------------------------------------------------------------------
// TESTS
// ---------------------------------------------------------------------------
