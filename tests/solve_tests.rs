//! Solve tests for the convex problem driver.
//!
//! Pattern: define test cases as data, then run them programmatically.

use dsprust::prelude::*;

/// Tolerance for comparing floating point results
const TOL: f64 = 1e-4;

/// A test case definition
struct TestCase {
    name: &'static str,
    /// Function that builds the problem and returns (problem, expected_value)
    build: fn() -> (Problem, f64),
}

/// All minimize test cases
fn minimize_test_cases() -> Vec<TestCase> {
    vec![
        // ========== Linear Programs ==========
        TestCase {
            name: "sum_nonneg_constraint",
            build: || {
                // minimize sum(x) s.t. x >= 1, x in R^5
                // optimal: x = [1,1,1,1,1], value = 5
                let x = variable(5);
                let prob = Problem::minimize(sum(&x))
                    .subject_to([x.geq(&constant(1.0))])
                    .build();
                (prob, 5.0)
            },
        },
        TestCase {
            name: "sum_equality_constraint",
            build: || {
                // minimize sum(x) s.t. x == 2, x in R^3
                // optimal: x = [2,2,2], value = 6
                let x = variable(3);
                let prob = Problem::minimize(sum(&x))
                    .subject_to([x.equals(&constant(2.0))])
                    .build();
                (prob, 6.0)
            },
        },
        TestCase {
            name: "weighted_sum",
            build: || {
                // minimize 2*x + 3*y s.t. x >= 1, y >= 2
                // optimal: x=1, y=2, value = 2 + 6 = 8
                let x = variable(1);
                let y = variable(1);
                let obj = &(2.0 * &x) + &(3.0 * &y);
                let prob = Problem::minimize(sum(&obj))
                    .subject_to([x.geq(&constant(1.0)), y.geq(&constant(2.0))])
                    .build();
                (prob, 8.0)
            },
        },
        TestCase {
            name: "matmul_lp",
            build: || {
                // minimize sum(A x) s.t. x >= 1, A = [[1, 2], [3, 4]]
                // optimal: x = [1, 1], value = 10
                let x = variable(2);
                let a = constant_matrix(2, 2, &[1.0, 2.0, 3.0, 4.0]);
                let prob = Problem::minimize(sum(&matmul(&a, &x)))
                    .subject_to([x.geq(&constant(1.0))])
                    .build();
                (prob, 10.0)
            },
        },
        // ========== Norms (SOCP) ==========
        TestCase {
            name: "norm2_equality",
            build: || {
                // minimize ||x||_2 s.t. sum(x) = 5, x in R^5
                // optimal: x = [1,1,1,1,1], value = sqrt(5)
                let x = variable(5);
                let prob = Problem::minimize(norm2(&x))
                    .subject_to([sum(&x).equals(&constant(5.0))])
                    .build();
                (prob, 5.0_f64.sqrt())
            },
        },
        TestCase {
            name: "norm2_zero",
            build: || {
                // minimize ||x||_2 + 1 s.t. x == 0, x in R^3
                // optimal: x = [0,0,0], value = 1
                let x = variable(3);
                let obj = &norm2(&x) + &constant(1.0);
                let prob = Problem::minimize(obj)
                    .subject_to([x.equals(&constant(0.0))])
                    .build();
                (prob, 1.0)
            },
        },
        TestCase {
            name: "sum_squares_equality",
            build: || {
                // minimize ||x||_2^2 s.t. sum(x) = 2, x in R^2
                // optimal: x = [1,1], value = 2
                let x = variable(2);
                let prob = Problem::minimize(sum_squares(&x))
                    .subject_to([sum(&x).equals(&constant(2.0))])
                    .build();
                (prob, 2.0)
            },
        },
        TestCase {
            name: "least_squares",
            build: || {
                // minimize ||A x - b||_2^2, A = I, b = [1, 2]
                // optimal: x = b, value = 0
                let x = variable(2);
                let a = eye(2);
                let b = constant_vec(vec![1.0, 2.0]);
                let prob = Problem::minimize(sum_squares(&(&matmul(&a, &x) - &b))).build();
                (prob, 0.0)
            },
        },
        // ========== Exponential cone ==========
        TestCase {
            name: "exp_lower_bound",
            build: || {
                // minimize sum(exp(x)) s.t. x >= 1, scalar
                // optimal: x = 1, value = e
                let x = variable(1);
                let prob = Problem::minimize(sum(&exp(&x)))
                    .subject_to([x.geq(&constant(1.0))])
                    .build();
                (prob, 1.0_f64.exp())
            },
        },
        // ========== Piecewise linear ==========
        TestCase {
            name: "max_of_affine",
            build: || {
                // minimize max(x, 2 - x), scalar
                // optimal: x = 1, value = 1
                let x = variable(1);
                let other = &constant(2.0) - &x;
                let prob = Problem::minimize(sum(&max2(&x, &other))).build();
                (prob, 1.0)
            },
        },
        // ========== Inner extrema ==========
        TestCase {
            name: "sup_extremum_matrix_game",
            build: || {
                // minimize sup_y { x'y : y in simplex } over x in simplex.
                // The inner sup picks the largest x_i, so the optimum
                // spreads x evenly: value = 1/2.
                let x = variable(2);
                let y = local_variable(2);
                let sup = saddle_max(
                    inner(&x, &y).unwrap(),
                    vec![
                        y.geq(&constant(0.0)),
                        sum(&y).equals(&constant(1.0)),
                    ],
                )
                .unwrap();
                let prob = Problem::minimize(sup)
                    .subject_to([
                        x.geq(&constant(0.0)),
                        sum(&x).equals(&constant(1.0)),
                    ])
                    .build();
                (prob, 0.5)
            },
        },
    ]
}

/// All maximize test cases
fn maximize_test_cases() -> Vec<TestCase> {
    vec![
        TestCase {
            name: "log_upper_bound",
            build: || {
                // maximize log(x) s.t. x <= 10, scalar
                // optimal: x = 10, value = log(10)
                let x = variable(1);
                let prob = Problem::maximize(sum(&log(&x)))
                    .subject_to([x.leq(&constant(10.0))])
                    .build();
                (prob, 10.0_f64.ln())
            },
        },
        TestCase {
            name: "min_of_affine",
            build: || {
                // maximize min(x, 4 - x), scalar
                // optimal: x = 2, value = 2
                let x = variable(1);
                let other = &constant(4.0) - &x;
                let prob = Problem::maximize(sum(&min2(&x, &other))).build();
                (prob, 2.0)
            },
        },
        TestCase {
            name: "neg_sum_squares",
            build: || {
                // maximize -||x - 1||_2^2, x in R^3
                // optimal: x = 1, value = 0
                let x = variable(3);
                let shifted = &x - &constant(1.0);
                let prob = Problem::maximize(-&sum_squares(&shifted)).build();
                (prob, 0.0)
            },
        },
        TestCase {
            name: "inf_extremum_matrix_game",
            build: || {
                // maximize inf_x { x'y : x in simplex } over y in simplex.
                // Dual of the sup case above: value = 1/2.
                let y = variable(2);
                let x = local_variable(2);
                let inf = saddle_min(
                    inner(&x, &y).unwrap(),
                    vec![
                        x.geq(&constant(0.0)),
                        sum(&x).equals(&constant(1.0)),
                    ],
                )
                .unwrap();
                let prob = Problem::maximize(inf)
                    .subject_to([
                        y.geq(&constant(0.0)),
                        sum(&y).equals(&constant(1.0)),
                    ])
                    .build();
                (prob, 0.5)
            },
        },
    ]
}

fn infeasible_test_cases() -> Vec<(&'static str, Problem)> {
    let x = variable(2);
    let contradictory = Problem::minimize(sum(&x))
        .subject_to([x.geq(&constant(1.0)), x.leq(&constant(0.0))])
        .build();
    vec![("contradictory_bounds", contradictory)]
}

fn unbounded_test_cases() -> Vec<(&'static str, Problem)> {
    let x = variable(2);
    let below = Problem::minimize(sum(&x))
        .subject_to([x.leq(&constant(0.0))])
        .build();
    vec![("sum_unbounded_below", below)]
}

#[test]
fn test_minimize_atoms() {
    for case in minimize_test_cases() {
        let (prob, expected) = (case.build)();

        assert!(prob.is_dcp(), "Problem '{}' should be DCP", case.name);

        let result = prob.solve();
        assert!(
            result.is_ok(),
            "Problem '{}' should solve: {:?}",
            case.name,
            result.err()
        );

        let solution = result.unwrap();
        assert_eq!(
            solution.status,
            SolveStatus::Optimal,
            "Problem '{}' should be optimal, got {:?}",
            case.name,
            solution.status
        );

        let value = solution.value.expect("should have value");
        let rel_err = (value - expected).abs() / (1.0 + expected.abs());
        assert!(
            rel_err < TOL,
            "Problem '{}': expected {}, got {} (rel_err={})",
            case.name,
            expected,
            value,
            rel_err
        );
    }
}

#[test]
fn test_maximize_atoms() {
    for case in maximize_test_cases() {
        let (prob, expected) = (case.build)();

        assert!(prob.is_dcp(), "Problem '{}' should be DCP", case.name);

        let result = prob.solve();
        assert!(
            result.is_ok(),
            "Problem '{}' should solve: {:?}",
            case.name,
            result.err()
        );

        let solution = result.unwrap();
        assert_eq!(
            solution.status,
            SolveStatus::Optimal,
            "Problem '{}' should be optimal, got {:?}",
            case.name,
            solution.status
        );

        let value = solution.value.expect("should have value");
        let rel_err = (value - expected).abs() / (1.0 + expected.abs());
        assert!(
            rel_err < TOL,
            "Problem '{}': expected {}, got {} (rel_err={})",
            case.name,
            expected,
            value,
            rel_err
        );
    }
}

#[test]
fn test_infeasible() {
    for (name, prob) in infeasible_test_cases() {
        let result = prob.solve();
        match result {
            Err(DspError::Solver(msg)) if msg.contains("infeasible") => {}
            Ok(solution) if solution.status == SolveStatus::Infeasible => {}
            other => {
                panic!("Problem '{}' should be infeasible, got {:?}", name, other);
            }
        }
    }
}

#[test]
fn test_unbounded() {
    for (name, prob) in unbounded_test_cases() {
        let result = prob.solve();
        match result {
            Err(DspError::Solver(msg)) if msg.contains("unbounded") => {}
            Ok(solution) if solution.status == SolveStatus::Unbounded => {}
            other => {
                panic!("Problem '{}' should be unbounded, got {:?}", name, other);
            }
        }
    }
}

#[test]
fn test_non_dcp_rejected() {
    // Maximizing a convex function is rejected before the solver runs.
    let x = variable(3);
    let result = Problem::maximize(norm2(&x)).solve();
    assert!(matches!(result, Err(DspError::Curvature(_))));
}

#[test]
fn test_solution_accessors() {
    let x = variable(1);
    let solution = Problem::minimize(sum(&x))
        .subject_to([x.geq(&constant(2.0))])
        .solve()
        .expect("solve failed");

    // The variable is a 1-vector, so it unpacks as a scalar.
    let value = solution.try_value(&x).expect("scalar value");
    assert!((value - 2.0).abs() < TOL);
}
