//! # Budget-Constrained QP
//!
//! $$
//! \min_{\mathbf{x}} \tfrac12 \mathbf{x}^\top Q \mathbf{x}
//! \quad \text{s.t.} \quad \mathbf{a}^\top \mathbf{x} = 1,\ \mathbf{x} \ge 0
//! $$
//!
//! Primal active-set method. Each iteration solves the equality-constrained
//! KKT system on the free coordinates; a blocking bound is added to the
//! working set, a bound with a negative multiplier is released. Ties resolve
//! to the lowest index, so the iterates are fully deterministic.

use nalgebra::DMatrix;
use nalgebra::DVector;
use ndarray::Array1;
use ndarray::Array2;

use super::error::OptimizationError;

/// Iteration cap and convergence tolerance of [`solve_budget_qp`].
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SolverConfig {
  pub max_iterations: usize,
  /// Step and multiplier tolerance, relative to the iterate and gradient scale.
  pub tolerance: f64,
}

impl Default for SolverConfig {
  fn default() -> Self {
    Self {
      max_iterations: 500,
      tolerance: 1e-10,
    }
  }
}

#[derive(Clone, Debug, PartialEq)]
pub struct QpSolution {
  pub x: Array1<f64>,
  pub iterations: usize,
}

/// Tolerance on `a'x0 = 1` for the starting point.
const FEASIBILITY_TOLERANCE: f64 = 1e-9;

/// Solve `min ½ x'Qx` s.t. `a'x = 1`, `x >= 0` starting from the feasible `x0`.
pub fn solve_budget_qp(
  q: &Array2<f64>,
  a: &Array1<f64>,
  x0: Array1<f64>,
  config: &SolverConfig,
) -> Result<QpSolution, OptimizationError> {
  let n = a.len();
  if q.dim() != (n, n) || x0.len() != n {
    return Err(OptimizationError::Infeasible(format!(
      "dimension mismatch: Q is {:?}, a has {n} entries, x0 has {}",
      q.dim(),
      x0.len()
    )));
  }
  if x0.iter().any(|&v| !(v >= 0.0)) || (a.dot(&x0) - 1.0).abs() > FEASIBILITY_TOLERANCE {
    return Err(OptimizationError::Infeasible(
      "starting point violates a'x = 1, x >= 0".into(),
    ));
  }

  let mut x = x0;
  let mut active: Vec<bool> = x.iter().map(|&v| v == 0.0).collect();

  for iteration in 0..config.max_iterations {
    let free: Vec<usize> = (0..n).filter(|&i| !active[i]).collect();
    if free.is_empty() {
      return Err(OptimizationError::Infeasible(
        "every coordinate is bound at zero".into(),
      ));
    }

    let g = q.dot(&x);
    let (step, multiplier) = solve_kkt(q, a, &g, &free)?;

    let x_scale = x.iter().fold(1.0_f64, |m, v| m.max(v.abs()));
    let step_norm = step.iter().fold(0.0_f64, |m, v| m.max(v.abs()));

    if step_norm <= config.tolerance * x_scale {
      let g_scale = g.iter().fold(1.0_f64, |m, v| m.max(v.abs()));
      let mut release = None;
      let mut most_negative = -config.tolerance * g_scale;
      for i in (0..n).filter(|&i| active[i]) {
        let lambda = g[i] + multiplier * a[i];
        if lambda < most_negative {
          most_negative = lambda;
          release = Some(i);
        }
      }

      match release {
        Some(i) => active[i] = false,
        None => {
          return Ok(QpSolution {
            x,
            iterations: iteration + 1,
          })
        }
      }
      continue;
    }

    let mut alpha = 1.0;
    let mut blocking = None;
    for (k, &i) in free.iter().enumerate() {
      if step[k] < 0.0 {
        let ratio = x[i] / -step[k];
        if ratio < alpha {
          alpha = ratio;
          blocking = Some(i);
        }
      }
    }

    for (k, &i) in free.iter().enumerate() {
      x[i] = (x[i] + alpha * step[k]).max(0.0);
    }
    if let Some(i) = blocking {
      x[i] = 0.0;
      active[i] = true;
    }
  }

  Err(OptimizationError::NotConverged {
    iterations: config.max_iterations,
  })
}

/// Solve `[Q_FF a_F; a_F' 0] [p; m] = [-g_F; 0]`.
///
/// LU first; singular systems fall back to the SVD least-squares solution.
fn solve_kkt(
  q: &Array2<f64>,
  a: &Array1<f64>,
  g: &Array1<f64>,
  free: &[usize],
) -> Result<(Vec<f64>, f64), OptimizationError> {
  let m = free.len();
  let mut kkt = DMatrix::<f64>::zeros(m + 1, m + 1);
  let mut rhs = DVector::<f64>::zeros(m + 1);

  for (r, &i) in free.iter().enumerate() {
    for (c, &j) in free.iter().enumerate() {
      kkt[(r, c)] = q[[i, j]];
    }
    kkt[(r, m)] = a[i];
    kkt[(m, r)] = a[i];
    rhs[r] = -g[i];
  }

  let solution = match kkt.clone().lu().solve(&rhs) {
    Some(s) if s.iter().all(|v| v.is_finite()) => s,
    _ => kkt
      .svd(true, true)
      .solve(&rhs, 1e-14)
      .map_err(|_| OptimizationError::SingularSystem)?,
  };

  if solution.iter().any(|v| !v.is_finite()) {
    return Err(OptimizationError::SingularSystem);
  }

  let step = solution.rows(0, m).iter().copied().collect();
  Ok((step, solution[m]))
}

#[cfg(test)]
mod tests {
  use approx::assert_abs_diff_eq;
  use ndarray::array;

  use super::*;

  #[test]
  fn inverse_variance_weights_for_diagonal_covariance() {
    let q = array![[1.0, 0.0], [0.0, 4.0]];
    let sol = solve_budget_qp(&q, &array![1.0, 1.0], array![0.5, 0.5], &SolverConfig::default()).unwrap();

    assert_abs_diff_eq!(sol.x[0], 0.8, epsilon = 1e-12);
    assert_abs_diff_eq!(sol.x[1], 0.2, epsilon = 1e-12);
    assert_eq!(sol.iterations, 2);
  }

  #[test]
  fn bound_stays_active_when_multiplier_is_positive() {
    let q = array![[1.0, 0.0], [0.0, 1.0]];
    let sol = solve_budget_qp(&q, &array![1.0, -0.5], array![1.0, 0.0], &SolverConfig::default()).unwrap();

    assert_abs_diff_eq!(sol.x[0], 1.0, epsilon = 1e-12);
    assert_eq!(sol.x[1], 0.0);
  }

  #[test]
  fn blocking_bound_enters_working_set() {
    // Unconstrained optimum is (1.5, -0.5); the bound on x1 must bind.
    let q = array![[1.0, 2.0], [2.0, 5.0]];
    let sol = solve_budget_qp(&q, &array![1.0, 1.0], array![0.5, 0.5], &SolverConfig::default()).unwrap();

    assert_abs_diff_eq!(sol.x[0], 1.0, epsilon = 1e-12);
    assert_abs_diff_eq!(sol.x[1], 0.0, epsilon = 1e-12);
  }

  #[test]
  fn released_bound_reenters_solution() {
    let q = array![[1.0, 0.0, 0.0], [0.0, 1.0, 0.0], [0.0, 0.0, 1.0]];
    let sol = solve_budget_qp(
      &q,
      &array![1.0, 1.0, 1.0],
      array![1.0, 0.0, 0.0],
      &SolverConfig::default(),
    )
    .unwrap();

    for w in sol.x.iter() {
      assert_abs_diff_eq!(*w, 1.0 / 3.0, epsilon = 1e-12);
    }
  }

  #[test]
  fn infeasible_start_is_rejected() {
    let q = array![[1.0, 0.0], [0.0, 1.0]];
    let err = solve_budget_qp(&q, &array![1.0, 1.0], array![0.2, 0.2], &SolverConfig::default()).unwrap_err();
    assert!(matches!(err, OptimizationError::Infeasible(_)));
  }

  #[test]
  fn iteration_cap_surfaces_as_not_converged() {
    let q = array![[1.0, 0.0], [0.0, 4.0]];
    let config = SolverConfig {
      max_iterations: 1,
      ..Default::default()
    };
    let err = solve_budget_qp(&q, &array![1.0, 1.0], array![0.5, 0.5], &config).unwrap_err();
    assert_eq!(err, OptimizationError::NotConverged { iterations: 1 });
  }

  #[test]
  fn zero_objective_keeps_starting_point() {
    let q = Array2::zeros((3, 3));
    let x0 = Array1::from_elem(3, 1.0 / 3.0);
    let sol = solve_budget_qp(&q, &Array1::ones(3), x0.clone(), &SolverConfig::default()).unwrap();
    assert_eq!(sol.x, x0);
  }
}
