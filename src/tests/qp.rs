use float_cmp::assert_approx_eq;
use spsolve::rlu::RLU;

use crate::tests::Recorder;
use crate::{NlpProblem, Problem, SolveStatus};

/// Convex QP from 'doc quadprog' with a known optimum:
///
/// ```txt
///       min 1/2 x'*H*x + c'*x      H = [1 -1; -1 2], c = (-2, -6)
///       s.t. x0 + x1 <= 2, -x0 + 2 x1 <= 2, 2 x0 + x1 <= 3, x >= 0
/// ```
///
/// Optimum x = (2/3, 4/3), f = -74/9, active multipliers (28/9, 4/9).
struct ConstrainedQp;

const H: [[f64; 2]; 2] = [[1.0, -1.0], [-1.0, 2.0]];
const C: [f64; 2] = [-2.0, -6.0];
const A: [[f64; 2]; 3] = [[1.0, 1.0], [-1.0, 2.0], [2.0, 1.0]];

impl NlpProblem for ConstrainedQp {
    fn objective(&self, x: &[f64], _new_x: bool, obj_value: &mut f64) -> bool {
        let hx = [
            H[0][0] * x[0] + H[0][1] * x[1],
            H[1][0] * x[0] + H[1][1] * x[1],
        ];
        *obj_value = 0.5 * (x[0] * hx[0] + x[1] * hx[1]) + C[0] * x[0] + C[1] * x[1];
        true
    }

    fn gradient(&self, x: &[f64], _new_x: bool, grad_f: &mut [f64]) -> bool {
        grad_f[0] = H[0][0] * x[0] + H[0][1] * x[1] + C[0];
        grad_f[1] = H[1][0] * x[0] + H[1][1] * x[1] + C[1];
        true
    }

    fn constraints(&self, x: &[f64], _new_x: bool, g: &mut [f64]) -> bool {
        for (j, row) in A.iter().enumerate() {
            g[j] = row[0] * x[0] + row[1] * x[1];
        }
        true
    }

    fn jacobian_pattern(&self, rows: &mut [usize], cols: &mut [usize]) -> bool {
        let mut idx = 0;
        for row in 0..3 {
            for col in 0..2 {
                rows[idx] = row;
                cols[idx] = col;
                idx += 1;
            }
        }
        true
    }

    fn jacobian_values(&self, _x: &[f64], _new_x: bool, values: &mut [f64]) -> bool {
        let mut idx = 0;
        for row in A.iter() {
            for &v in row {
                values[idx] = v;
                idx += 1;
            }
        }
        true
    }

    fn hessian_pattern(&self, rows: &mut [usize], cols: &mut [usize]) -> bool {
        rows.copy_from_slice(&[0, 1, 1]);
        cols.copy_from_slice(&[0, 0, 1]);
        true
    }

    fn hessian_values(
        &self,
        _x: &[f64],
        _new_x: bool,
        obj_factor: f64,
        _lambda: &[f64],
        _new_lambda: bool,
        values: &mut [f64],
    ) -> bool {
        values[0] = obj_factor * H[0][0];
        values[1] = obj_factor * H[1][0];
        values[2] = obj_factor * H[1][1];
        true
    }
}

fn problem() -> Problem<ConstrainedQp> {
    Problem::new(
        ConstrainedQp,
        &[0.0, 0.0],
        &[1e20, 1e20],
        &[-1e20, -1e20, -1e20],
        &[2.0, 2.0, 3.0],
        6,
        3,
    )
    .unwrap()
}

#[test]
fn constrained_qp_from_interior_point() {
    let mut p = problem();
    p.set_num_option("tol", 1e-8).unwrap();

    let solver = RLU::default();
    // strictly feasible interior starting point
    let mut x = vec![0.5, 0.5];
    let sol = p.solve(&solver, &mut x, None);

    assert_eq!(sol.status, SolveStatus::SolveSucceeded);
    assert_approx_eq!(f64, sol.obj_value, -74.0 / 9.0, epsilon = 1e-6);
    assert_approx_eq!(f64, x[0], 2.0 / 3.0, epsilon = 1e-5);
    assert_approx_eq!(f64, x[1], 4.0 / 3.0, epsilon = 1e-5);
    // upper-active rows carry positive multipliers in the g + lambda
    // convention, the inactive row none
    assert_approx_eq!(f64, sol.mult_g[0], 28.0 / 9.0, epsilon = 1e-4);
    assert_approx_eq!(f64, sol.mult_g[1], 4.0 / 9.0, epsilon = 1e-4);
    assert!(sol.mult_g[2].abs() < 1e-5);
}

#[test]
fn qp_feasible_at_convergence() {
    let mut p = problem();
    p.set_num_option("tol", 1e-8).unwrap();

    let solver = RLU::default();
    let recorder = Recorder::default();
    let mut x = vec![0.5, 0.5];
    let sol = p.solve(&solver, &mut x, Some(&recorder));

    assert_eq!(sol.status, SolveStatus::SolveSucceeded);
    // every constraint violation is within the tolerance
    assert!(sol.g[0] <= 2.0 + 1e-8);
    assert!(sol.g[1] <= 2.0 + 1e-8);
    assert!(sol.g[2] <= 3.0 + 1e-8);
    assert!(x.iter().all(|&v| v >= -1e-8));
    // mu never increases, under the monotone strategy here
    let mus = recorder.mus.borrow();
    assert!(mus.windows(2).all(|w| w[1] <= w[0]));
}

#[test]
fn qp_adaptive_strategy_also_monotone() {
    let mut p = problem();
    p.set_str_option("mu_strategy", "adaptive").unwrap();

    let solver = RLU::default();
    let recorder = Recorder::default();
    let mut x = vec![0.5, 0.5];
    let sol = p.solve(&solver, &mut x, Some(&recorder));

    assert_eq!(sol.status, SolveStatus::SolveSucceeded);
    let mus = recorder.mus.borrow();
    assert!(mus.windows(2).all(|w| w[1] <= w[0]));
}
