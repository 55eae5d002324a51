//! Main MPC demonstration executable entry point.
//!
//! # Architecture
//!
//! This executable closes the loop around the MPC module with a simulated
//! vehicle:
//!
//!     - Initialise logging and load the controller parameters
//!     - Initialise the MPC module
//!     - Main loop:
//!         - Window the reference waypoints ahead of the vehicle
//!         - Compute the tracking errors of the simulated vehicle
//!         - MPC processing
//!         - Step the simulated vehicle with the commanded actuation
//!
//! The plant uses the same kinematic bicycle model the controller predicts
//! with, so the demonstration shows the controller's behaviour unclouded by
//! model mismatch. Non-converged solves hold the previous demands, the
//! fallback policy an integrating vehicle would apply.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use color_eyre::{eyre::WrapErr, Report};
use log::{debug, info, warn};
use std::env;

// Internal
use mpc_ctrl::{kinematics, poly, InputData, MpcCtrl, OutputData, Params};
use util::{
    logger::{logger_init, LevelFilter},
    maths,
    module::State,
    params
};

// ---------------------------------------------------------------------------
// CONSTANTS
// ---------------------------------------------------------------------------

/// Number of simulation cycles to run.
const NUM_CYCLES: usize = 100;

/// Number of waypoints passed to the controller each cycle.
const WINDOW_LEN: usize = 12;

/// Parameter file used when none is given on the command line.
const DEFAULT_PARAMS_PATH: &str = "params/mpc_ctrl.toml";

// ---------------------------------------------------------------------------
// FUNCTIONS
// ---------------------------------------------------------------------------

/// Executable main function, entry point.
fn main() -> Result<(), Report> {

    // ---- EARLY INITIALISATION ----

    color_eyre::install()?;

    logger_init(LevelFilter::Debug)
        .wrap_err("Failed to initialise logging")?;

    info!("MPC Demonstration Executable\n");

    // ---- LOAD PARAMETERS ----

    let params_path = env::args()
        .nth(1)
        .unwrap_or_else(|| DEFAULT_PARAMS_PATH.into());

    let params: Params = params::load(&params_path)
        .wrap_err("Could not load MPC params")?;

    info!("Parameters loaded from {:?}", params_path);

    // ---- INITIALISE MODULE ----

    let mut mpc = MpcCtrl::default();
    mpc.init(params.clone())
        .wrap_err("Failed to initialise the MPC module")?;

    info!(
        "MPC module initialised: {} step horizon at {} s",
        params.steps_ahead, params.dt_s
    );

    // ---- REFERENCE PATH ----

    // A gentle sine weave, sampled every metre
    let waypoints: Vec<(f64, f64)> = (0..=120)
        .map(|i| {
            let x = i as f64;
            (x, 2.0 * (0.05 * x).sin())
        })
        .collect();

    // The vehicle starts at rest, offset one metre from the path
    let mut state = kinematics::VehicleState {
        y_m: 1.0,
        ..Default::default()
    };
    let start_m = (state.x_m, state.y_m);

    let mut last_output: Option<OutputData> = None;
    let mut cycles_run = 0;

    // ---- MAIN LOOP ----

    for cycle in 0..NUM_CYCLES {

        // Window the waypoints ahead of the vehicle, keeping a couple of
        // points behind it to anchor the fit
        let window: Vec<(f64, f64)> = waypoints
            .iter()
            .copied()
            .filter(|w| w.0 > state.x_m - 2.0)
            .take(WINDOW_LEN)
            .collect();

        if window.len() < params.poly_degree + 1 {
            info!("End of the reference path reached");
            break;
        }

        let xs: Vec<f64> = window.iter().map(|w| w.0).collect();
        let ys: Vec<f64> = window.iter().map(|w| w.1).collect();
        let coeffs = poly::fit(&xs, &ys, params.poly_degree)
            .wrap_err("Failed to fit the reference polynomial")?;

        // Tracking errors of the simulated vehicle against the reference
        state.cte_m = poly::eval(&coeffs, state.x_m) - state.y_m;
        state.epsi_rad = maths::get_ang_dist_2pi(
            poly::eval_diff(&coeffs, state.x_m).atan(),
            state.psi_rad
        );

        // ---- MPC PROCESSING ----

        let input = InputData {
            state,
            waypoints_m: window,
            ref_speed_ms: None
        };

        let (output, report) = mpc.proc(&input)
            .wrap_err("MPC processing failed")?;

        if report.converged || last_output.is_none() {
            last_output = Some(output);
        }
        else {
            warn!(
                "Cycle {}: holding previous demands after a non-converged \
                 solve",
                cycle
            );
        }

        // Guaranteed to be Some by the block above
        let demands = last_output.as_ref().unwrap();

        debug!(
            "cycle {:03}: cte {:+.3} m, epsi {:+.3} rad, v {:5.2} m/s -> \
             steer {:+.4} rad, speed {:5.2} m/s ({:5.1} ms solve)",
            cycle,
            report.cte_m,
            report.epsi_rad,
            state.speed_ms,
            demands.steer_dem_rad,
            demands.speed_dem_ms,
            report.solve_time_s * 1e3
        );

        // ---- PLANT SIMULATION ----

        state = kinematics::step(
            &state,
            demands.steer_dem_rad,
            demands.speed_dem_ms,
            &coeffs,
            params.wheelbase_m,
            params.dt_s
        );

        cycles_run = cycle + 1;
    }

    // ---- SUMMARY ----

    let travelled_m = maths::norm(
        &[start_m.0, start_m.1],
        &[state.x_m, state.y_m]
    )
    .unwrap_or(0.0);

    info!(
        "Simulation complete: {} cycles, {:.1} m travelled, final cross \
         track error {:+.3} m",
        cycles_run, travelled_m, state.cte_m
    );

    Ok(())
}
