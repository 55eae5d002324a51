//! Cost and constraint formulation for the MPC nonlinear program
//!
//! The solver calls back into this formulation many times per solve, in
//! whatever order its search requires, so everything here is a pure function
//! of the decision variables and the values captured at construction. The
//! solver consumes derivatives as well as values, the gradient of the cost
//! and the Jacobian transpose product of the constraints are therefore
//! derived analytically alongside each term.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// Internal
use crate::indexes::Indexes;
use crate::kinematics::{self, VehicleState};
use crate::params::Params;
use crate::poly;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// One cycle's optimisation problem: the weights, variable layout, fitted
/// reference curve and reference speed, captured immutably for the duration
/// of a single solve.
pub struct Formulation<'a> {
    params: &'a Params,
    indexes: Indexes,
    coeffs: &'a [f64],
    ref_speed_ms: f64
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl<'a> Formulation<'a> {
    pub fn new(
        params: &'a Params,
        indexes: Indexes,
        coeffs: &'a [f64],
        ref_speed_ms: f64
    ) -> Self {
        Self {
            params,
            indexes,
            coeffs,
            ref_speed_ms
        }
    }

    /// Evaluate the scalar cost of a candidate trajectory.
    pub fn cost(&self, vars: &[f64]) -> f64 {
        let p = self.params;
        let idx = &self.indexes;
        let n = idx.steps_ahead;

        let mut cost = 0.0;

        // Tracking error over the whole horizon
        for t in 0..n {
            cost += p.cte_coeff * vars[idx.cte_start + t].powi(2);
            cost += p.epsi_coeff * vars[idx.epsi_start + t].powi(2);
        }

        // Actuator effort
        for t in 0..n - 1 {
            cost += p.speed_coeff
                * (vars[idx.v_start + t] - self.ref_speed_ms).powi(2);
            cost += p.steer_coeff * vars[idx.delta_start + t].powi(2);
        }

        // Chatter between consecutive actuations
        for t in 0..n - 2 {
            cost += p.consec_steer_coeff
                * (vars[idx.delta_start + t + 1] - vars[idx.delta_start + t])
                    .powi(2);
            cost += p.consec_speed_coeff
                * (vars[idx.v_start + t + 1] - vars[idx.v_start + t]).powi(2);
        }

        cost
    }

    /// Evaluate the gradient of the cost into `grad`.
    pub fn cost_gradient(&self, vars: &[f64], grad: &mut [f64]) {
        let p = self.params;
        let idx = &self.indexes;
        let n = idx.steps_ahead;

        for g in grad.iter_mut() {
            *g = 0.0;
        }

        for t in 0..n {
            grad[idx.cte_start + t] +=
                2.0 * p.cte_coeff * vars[idx.cte_start + t];
            grad[idx.epsi_start + t] +=
                2.0 * p.epsi_coeff * vars[idx.epsi_start + t];
        }

        for t in 0..n - 1 {
            grad[idx.v_start + t] += 2.0 * p.speed_coeff
                * (vars[idx.v_start + t] - self.ref_speed_ms);
            grad[idx.delta_start + t] +=
                2.0 * p.steer_coeff * vars[idx.delta_start + t];
        }

        for t in 0..n - 2 {
            let steer_delta =
                vars[idx.delta_start + t + 1] - vars[idx.delta_start + t];
            grad[idx.delta_start + t + 1] +=
                2.0 * p.consec_steer_coeff * steer_delta;
            grad[idx.delta_start + t] -=
                2.0 * p.consec_steer_coeff * steer_delta;

            let speed_delta =
                vars[idx.v_start + t + 1] - vars[idx.v_start + t];
            grad[idx.v_start + t + 1] +=
                2.0 * p.consec_speed_coeff * speed_delta;
            grad[idx.v_start + t] -=
                2.0 * p.consec_speed_coeff * speed_delta;
        }
    }

    /// Evaluate the constraint residuals into `residuals`.
    ///
    /// The first entry of each state trajectory is passed through unchanged,
    /// the solver driver pins those residuals to the measured state through
    /// the constraint bounds. The remaining residuals are the difference
    /// between each state entry and the kinematic prediction from the entry
    /// before it, and are pinned to zero.
    pub fn constraints(&self, vars: &[f64], residuals: &mut [f64]) {
        let idx = &self.indexes;
        let n = idx.steps_ahead;

        residuals[idx.x_start] = vars[idx.x_start];
        residuals[idx.y_start] = vars[idx.y_start];
        residuals[idx.psi_start] = vars[idx.psi_start];
        residuals[idx.cte_start] = vars[idx.cte_start];
        residuals[idx.epsi_start] = vars[idx.epsi_start];

        for t in 1..n {
            let s = t - 1;

            let prev = VehicleState {
                x_m: vars[idx.x_start + s],
                y_m: vars[idx.y_start + s],
                psi_rad: vars[idx.psi_start + s],
                speed_ms: vars[idx.v_start + s],
                cte_m: vars[idx.cte_start + s],
                epsi_rad: vars[idx.epsi_start + s]
            };

            let pred = kinematics::step(
                &prev,
                vars[idx.delta_start + s],
                vars[idx.v_start + s],
                self.coeffs,
                self.params.wheelbase_m,
                self.params.dt_s
            );

            residuals[idx.x_start + t] = vars[idx.x_start + t] - pred.x_m;
            residuals[idx.y_start + t] = vars[idx.y_start + t] - pred.y_m;
            residuals[idx.psi_start + t] =
                vars[idx.psi_start + t] - pred.psi_rad;
            residuals[idx.cte_start + t] =
                vars[idx.cte_start + t] - pred.cte_m;
            residuals[idx.epsi_start + t] =
                vars[idx.epsi_start + t] - pred.epsi_rad;
        }
    }

    /// Evaluate the product of the constraint Jacobian transpose with the
    /// multiplier vector `mult` into `out`.
    ///
    /// Each residual touches only a handful of variables, so the product is
    /// accumulated residual by residual from the analytic partials of the
    /// kinematic model.
    pub fn jacobian_tr_product(
        &self,
        vars: &[f64],
        mult: &[f64],
        out: &mut [f64]
    ) {
        let idx = &self.indexes;
        let n = idx.steps_ahead;
        let lf = self.params.wheelbase_m;
        let dt = self.params.dt_s;

        for o in out.iter_mut() {
            *o = 0.0;
        }

        // Pinned initial entries, the residual is the variable itself
        out[idx.x_start] += mult[idx.x_start];
        out[idx.y_start] += mult[idx.y_start];
        out[idx.psi_start] += mult[idx.psi_start];
        out[idx.cte_start] += mult[idx.cte_start];
        out[idx.epsi_start] += mult[idx.epsi_start];

        for t in 1..n {
            let s = t - 1;

            let x0 = vars[idx.x_start + s];
            let psi0 = vars[idx.psi_start + s];
            let epsi0 = vars[idx.epsi_start + s];
            let delta0 = vars[idx.delta_start + s];
            let v0 = vars[idx.v_start + s];

            let slope = poly::eval_diff(self.coeffs, x0);
            let curvature = poly::eval_diff2(self.coeffs, x0);

            // x residual: x1 - x0 - v0 cos(psi0) dt
            let m = mult[idx.x_start + t];
            out[idx.x_start + t] += m;
            out[idx.x_start + s] -= m;
            out[idx.psi_start + s] += m * v0 * psi0.sin() * dt;
            out[idx.v_start + s] -= m * psi0.cos() * dt;

            // y residual: y1 - y0 - v0 sin(psi0) dt
            let m = mult[idx.y_start + t];
            out[idx.y_start + t] += m;
            out[idx.y_start + s] -= m;
            out[idx.psi_start + s] -= m * v0 * psi0.cos() * dt;
            out[idx.v_start + s] -= m * psi0.sin() * dt;

            // psi residual: psi1 - psi0 + v0 delta0 / Lf dt
            let m = mult[idx.psi_start + t];
            out[idx.psi_start + t] += m;
            out[idx.psi_start + s] -= m;
            out[idx.delta_start + s] += m * v0 / lf * dt;
            out[idx.v_start + s] += m * delta0 / lf * dt;

            // cte residual: cte1 - f(x0) + y0 - v0 sin(epsi0) dt
            let m = mult[idx.cte_start + t];
            out[idx.cte_start + t] += m;
            out[idx.x_start + s] -= m * slope;
            out[idx.y_start + s] += m;
            out[idx.epsi_start + s] -= m * v0 * epsi0.cos() * dt;
            out[idx.v_start + s] -= m * epsi0.sin() * dt;

            // epsi residual: epsi1 - psi0 + atan(f'(x0)) + v0 delta0 / Lf dt
            let m = mult[idx.epsi_start + t];
            out[idx.epsi_start + t] += m;
            out[idx.psi_start + s] -= m;
            out[idx.x_start + s] += m * curvature / (1.0 + slope * slope);
            out[idx.delta_start + s] += m * v0 / lf * dt;
            out[idx.v_start + s] += m * delta0 / lf * dt;
        }
    }
}

// ---------------------------------------------------------------------------
// TESTS
// ---------------------------------------------------------------------------

#[cfg(test)]
mod test {
    use super::*;

    fn test_params() -> Params {
        Params {
            steps_ahead: 8,
            dt_s: 0.1,
            wheelbase_m: 2.67,
            ..Default::default()
        }
    }

    /// Deterministic but unstructured variable fill for derivative checks.
    fn test_vars(n: usize, scale: f64, phase: f64) -> Vec<f64> {
        (0..n)
            .map(|i| scale * ((i as f64) * 0.37 + phase).sin())
            .collect()
    }

    #[test]
    fn test_cost_zero_on_reference() {
        let params = test_params();
        let indexes = Indexes::new(params.steps_ahead);
        let coeffs = [0.0];
        let formulation =
            Formulation::new(&params, indexes, &coeffs, 10.0);

        // Perfect tracking: no errors, actuators at reference
        let mut vars = vec![0.0; indexes.num_vars()];
        for t in 0..params.steps_ahead - 1 {
            vars[indexes.v_start + t] = 10.0;
        }

        assert!(formulation.cost(&vars).abs() < 1e-12);
    }

    #[test]
    fn test_cost_gradient_matches_finite_difference() {
        let params = test_params();
        let indexes = Indexes::new(params.steps_ahead);
        let coeffs = [0.5, 0.1, -0.02];
        let formulation = Formulation::new(&params, indexes, &coeffs, 8.0);

        let vars = test_vars(indexes.num_vars(), 0.6, 0.13);
        let mut grad = vec![0.0; indexes.num_vars()];
        formulation.cost_gradient(&vars, &mut grad);

        let h = 1e-6;
        for j in 0..vars.len() {
            let mut up = vars.clone();
            let mut down = vars.clone();
            up[j] += h;
            down[j] -= h;

            let fd = (formulation.cost(&up) - formulation.cost(&down))
                / (2.0 * h);
            assert!(
                (grad[j] - fd).abs() < 1e-4 * (1.0 + fd.abs()),
                "gradient mismatch at {}: {} vs {}",
                j,
                grad[j],
                fd
            );
        }
    }

    /// A trajectory rolled out through the kinematic model must satisfy
    /// every dynamics residual exactly.
    #[test]
    fn test_constraints_zero_on_rollout() {
        let params = test_params();
        let indexes = Indexes::new(params.steps_ahead);
        let coeffs = [1.0, 0.2, -0.05];
        let formulation = Formulation::new(&params, indexes, &coeffs, 8.0);

        let n = params.steps_ahead;
        let mut vars = vec![0.0; indexes.num_vars()];

        // Arbitrary actuation plan
        for t in 0..n - 1 {
            vars[indexes.delta_start + t] = 0.02 * (t as f64 - 2.0);
            vars[indexes.v_start + t] = 5.0 + 0.3 * t as f64;
        }

        // Roll the model forward and write each state into the trajectory
        let mut state = VehicleState {
            x_m: 0.0,
            y_m: 0.4,
            psi_rad: 0.1,
            speed_ms: 5.0,
            cte_m: 0.6,
            epsi_rad: -0.1
        };
        for t in 0..n {
            vars[indexes.x_start + t] = state.x_m;
            vars[indexes.y_start + t] = state.y_m;
            vars[indexes.psi_start + t] = state.psi_rad;
            vars[indexes.cte_start + t] = state.cte_m;
            vars[indexes.epsi_start + t] = state.epsi_rad;

            if t < n - 1 {
                state = kinematics::step(
                    &state,
                    vars[indexes.delta_start + t],
                    vars[indexes.v_start + t],
                    &coeffs,
                    params.wheelbase_m,
                    params.dt_s
                );
            }
        }

        let mut residuals = vec![0.0; indexes.num_constraints()];
        formulation.constraints(&vars, &mut residuals);

        // The pinned residuals report the initial state itself
        assert!((residuals[indexes.x_start] - 0.0).abs() < 1e-12);
        assert!((residuals[indexes.y_start] - 0.4).abs() < 1e-12);
        assert!((residuals[indexes.psi_start] - 0.1).abs() < 1e-12);
        assert!((residuals[indexes.cte_start] - 0.6).abs() < 1e-12);
        assert!((residuals[indexes.epsi_start] + 0.1).abs() < 1e-12);

        // Every dynamics residual is zero on the rollout
        for t in 1..n {
            for start in &[
                indexes.x_start,
                indexes.y_start,
                indexes.psi_start,
                indexes.cte_start,
                indexes.epsi_start
            ] {
                assert!(
                    residuals[start + t].abs() < 1e-10,
                    "non-zero residual at offset {} step {}",
                    start,
                    t
                );
            }
        }
    }

    #[test]
    fn test_jacobian_product_matches_finite_difference() {
        let params = test_params();
        let indexes = Indexes::new(params.steps_ahead);
        let coeffs = [0.3, -0.1, 0.04, 0.01];
        let formulation = Formulation::new(&params, indexes, &coeffs, 8.0);

        let n_vars = indexes.num_vars();
        let n_cons = indexes.num_constraints();
        let vars = test_vars(n_vars, 0.5, 0.41);
        let mult = test_vars(n_cons, 0.8, 1.7);

        let mut product = vec![0.0; n_vars];
        formulation.jacobian_tr_product(&vars, &mult, &mut product);

        let h = 1e-6;
        let mut up_res = vec![0.0; n_cons];
        let mut down_res = vec![0.0; n_cons];

        for j in 0..n_vars {
            let mut up = vars.clone();
            let mut down = vars.clone();
            up[j] += h;
            down[j] -= h;

            formulation.constraints(&up, &mut up_res);
            formulation.constraints(&down, &mut down_res);

            let mut fd = 0.0;
            for i in 0..n_cons {
                fd += mult[i] * (up_res[i] - down_res[i]) / (2.0 * h);
            }

            assert!(
                (product[j] - fd).abs() < 1e-4 * (1.0 + fd.abs()),
                "jacobian product mismatch at {}: {} vs {}",
                j,
                product[j],
                fd
            );
        }
    }
}
