//! Discrete kinematic bicycle model
//!
//! One set of state transition equations serves two purposes: projecting the
//! sensed state forward through the actuation latency window before a solve,
//! and forming the dynamics constraints the solver must satisfy between
//! consecutive horizon steps.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use serde::Serialize;

// Internal
use crate::poly;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Vehicle state at a single instant.
///
/// All values are in one consistent cartesian frame chosen by the caller,
/// the same frame the waypoints are expressed in.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct VehicleState {
    /// Position along the frame x axis
    pub x_m: f64,

    /// Position along the frame y axis
    pub y_m: f64,

    /// Heading angle
    pub psi_rad: f64,

    /// Forward speed
    pub speed_ms: f64,

    /// Cross track error, the offset of the reference curve from the
    /// vehicle at the current x position
    pub cte_m: f64,

    /// Heading error relative to the reference curve tangent
    pub epsi_rad: f64
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl VehicleState {
    /// True if every element of the state is finite.
    pub fn is_finite(&self) -> bool {
        self.x_m.is_finite()
            && self.y_m.is_finite()
            && self.psi_rad.is_finite()
            && self.speed_ms.is_finite()
            && self.cte_m.is_finite()
            && self.epsi_rad.is_finite()
    }
}

// ---------------------------------------------------------------------------
// PUBLIC FUNCTIONS
// ---------------------------------------------------------------------------

/// Advance the state by one timestep under the given actuation.
///
/// `coeffs` is the fitted reference polynomial, used to recompute the
/// tracking errors at the new position. The commanded speed is treated as
/// achieved over the step, matching how the solver's dynamics constraints
/// treat the speed demand.
///
/// The signs of the heading and heading error updates are part of the tuned
/// steering convention (a positive steering angle reduces the heading) and
/// must not be changed independently of the actuator mapping.
pub fn step(
    state: &VehicleState,
    steer_rad: f64,
    speed_dem_ms: f64,
    coeffs: &[f64],
    wheelbase_m: f64,
    dt_s: f64
) -> VehicleState {
    let v = speed_dem_ms;
    let yaw_step_rad = v * steer_rad / wheelbase_m * dt_s;

    let f0 = poly::eval(coeffs, state.x_m);
    let psi_des_rad = poly::eval_diff(coeffs, state.x_m).atan();

    VehicleState {
        x_m: state.x_m + v * state.psi_rad.cos() * dt_s,
        y_m: state.y_m + v * state.psi_rad.sin() * dt_s,
        psi_rad: state.psi_rad - yaw_step_rad,
        speed_ms: v,
        cte_m: f0 - state.y_m + v * state.epsi_rad.sin() * dt_s,
        epsi_rad: state.psi_rad - psi_des_rad - yaw_step_rad
    }
}

/// Project the sensed state forward through the actuation latency window.
///
/// `steer_rad` is the steering demand currently being executed by the
/// vehicle, i.e. the one issued on the previous cycle. The speed is held at
/// its sensed value over the window. A zero latency returns the state
/// untouched.
pub fn project(
    state: &VehicleState,
    steer_rad: f64,
    coeffs: &[f64],
    wheelbase_m: f64,
    latency_s: f64
) -> VehicleState {
    if latency_s <= 0.0 {
        return *state;
    }

    step(
        state,
        steer_rad,
        state.speed_ms,
        coeffs,
        wheelbase_m,
        latency_s
    )
}

// ---------------------------------------------------------------------------
// TESTS
// ---------------------------------------------------------------------------
