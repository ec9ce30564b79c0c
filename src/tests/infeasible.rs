use spsolve::rlu::RLU;

use crate::{NlpProblem, Problem, SolveStatus};

/// f(x) = x^2 with a single constraint g(x) = x^2 whose bounds are set per
/// test.
struct Quadratic;

impl NlpProblem for Quadratic {
    fn objective(&self, x: &[f64], _new_x: bool, obj_value: &mut f64) -> bool {
        *obj_value = x[0] * x[0];
        true
    }
    fn gradient(&self, x: &[f64], _new_x: bool, grad_f: &mut [f64]) -> bool {
        grad_f[0] = 2.0 * x[0];
        true
    }
    fn constraints(&self, x: &[f64], _new_x: bool, g: &mut [f64]) -> bool {
        for gj in g.iter_mut() {
            *gj = x[0] * x[0];
        }
        true
    }
    fn jacobian_pattern(&self, rows: &mut [usize], cols: &mut [usize]) -> bool {
        for (j, row) in rows.iter_mut().enumerate() {
            *row = j;
        }
        cols.fill(0);
        true
    }
    fn jacobian_values(&self, x: &[f64], _new_x: bool, values: &mut [f64]) -> bool {
        values.fill(2.0 * x[0]);
        true
    }
    fn hessian_pattern(&self, rows: &mut [usize], cols: &mut [usize]) -> bool {
        rows[0] = 0;
        cols[0] = 0;
        true
    }
    fn hessian_values(
        &self,
        _x: &[f64],
        _new_x: bool,
        obj_factor: f64,
        lambda: &[f64],
        _new_lambda: bool,
        values: &mut [f64],
    ) -> bool {
        values[0] = 2.0 * obj_factor + 2.0 * lambda.iter().sum::<f64>();
        true
    }
}

#[test]
fn empty_bound_interval_is_infeasible() {
    // g_l > g_u: no point can satisfy the constraint interval
    let mut p = Problem::new(Quadratic, &[-5.0], &[5.0], &[1.0], &[0.0], 1, 1).unwrap();
    let solver = RLU::default();
    let mut x = vec![0.5];
    let sol = p.solve(&solver, &mut x, None);
    assert_eq!(sol.status, SolveStatus::InfeasibleProblemDetected);
    // detected structurally, before any iteration was spent
    assert_eq!(sol.iterations, 0);
}

#[test]
fn locally_infeasible_constraint_is_detected() {
    // x^2 <= -1 has no solution; the restoration phase bottoms out at the
    // stationary point of the violation
    let mut p = Problem::new(Quadratic, &[-5.0], &[5.0], &[-2e19], &[-1.0], 1, 1).unwrap();
    let solver = RLU::default();
    let mut x = vec![0.5];
    let sol = p.solve(&solver, &mut x, None);
    assert_eq!(sol.status, SolveStatus::InfeasibleProblemDetected);
    assert!(sol.iterations <= p.options_mut().max_iter);
}

#[test]
fn too_many_equalities_lack_degrees_of_freedom() {
    // two equality rows on a single variable
    let mut p = Problem::new(
        Quadratic,
        &[-5.0],
        &[5.0],
        &[1.0, 2.0],
        &[1.0, 2.0],
        2,
        1,
    )
    .unwrap();
    let solver = RLU::default();
    let mut x = vec![0.5];
    let sol = p.solve(&solver, &mut x, None);
    assert_eq!(sol.status, SolveStatus::NotEnoughDegreesOfFreedom);
}
