//! # Model predictive control module
//!
//! This module computes steering and speed demands which keep the vehicle on
//! a reference path described by a list of waypoints. Each processing cycle:
//!
//! 1. A polynomial is fitted to the waypoints, giving a smooth reference
//!    curve the optimiser can evaluate anywhere.
//! 2. The sensed vehicle state is projected forward through the actuation
//!    latency window using the kinematic bicycle model, so that the plan
//!    starts from where the vehicle will actually be when the new demands
//!    take effect.
//! 3. A nonlinear program over the prediction horizon is built and solved:
//!    the decision variables are the predicted state and actuation
//!    trajectories, the constraints are the vehicle dynamics, and the cost
//!    penalises tracking error, actuator effort and actuation chatter.
//! 4. The first actuation of the optimal plan is returned as the demand for
//!    this cycle, along with the predicted path for monitoring.
//!
//! The module follows the standard `init`/`proc` lifecycle of
//! [`util::module::State`]. Configuration is fixed at `init` and invalid
//! parameters are rejected there; per-cycle input problems and solver
//! non-convergence are reported through [`MpcCtrlError`] and the status
//! report respectively.

// ---------------------------------------------------------------------------
// MODULES
// ---------------------------------------------------------------------------

pub mod indexes;
pub mod kinematics;
mod nlp;
pub mod params;
pub mod poly;
pub mod solver;
mod state;

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// Internal
pub use indexes::Indexes;
pub use kinematics::VehicleState;
pub use params::Params;
pub use state::*;

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

/// Possible errors that can occur during MpcCtrl operation.
#[derive(Debug, thiserror::Error)]
pub enum MpcCtrlError {
    #[error("Invalid parameters: {0}")]
    InvalidParams(#[from] params::ParamsError),

    #[error("Vehicle state contains a non-finite value: {0:?}")]
    NonFiniteState(VehicleState),

    #[error("Waypoint {0} contains a non-finite coordinate")]
    NonFiniteWaypoint(usize),

    #[error(
        "Need at least {required} waypoints to fit a degree {degree} \
         polynomial, got {got}"
    )]
    TooFewWaypoints {
        required: usize,
        degree: usize,
        got: usize
    },

    #[error("Could not fit the reference polynomial: {0}")]
    FitError(#[from] poly::FitError),

    /// The solver itself failed, for example because a non-finite value was
    /// produced during the search. Note that running out of time or
    /// iterations is not a failure, such solves yield a best-effort output
    /// flagged as not converged in the status report.
    #[error("The solver reported an internal failure: {0:?}")]
    SolverFailure(optimization_engine::SolverError)
}
