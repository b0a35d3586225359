//! End-to-end tests for saddle problems: two-pass solves, extremum
//! evaluation, and the switching transform.

use std::collections::HashSet;

use dsprust::prelude::*;
use dsprust::expr::VariableData;
use dsprust::saddle::atoms::atom_k_repr;
use dsprust::saddle::eval::ConcaveEvaluator;
use dsprust::saddle::layout::{Side, VariableLayout};
use dsprust::saddle::switch::{stacked_side, switch_repr};
use nalgebra::DVector;

const TOL: f64 = 1e-3;

fn data(e: &Expr) -> VariableData {
    match e {
        Expr::Variable(v) => v.clone(),
        _ => panic!("not a variable"),
    }
}

fn simplex(v: &Expr) -> Vec<Constraint> {
    vec![sum(v).equals(&constant(1.0)), v.geq(&zeros(v.shape()))]
}

#[test]
fn test_matrix_game() {
    // min_x max_y x' A y over two probability simplices.
    //
    // x'A = [x1 + 3 x2, 2 x1 + 4 x2]; the second entry dominates, so the
    // inner max is 2 x1 + 4 x2, minimized at x = (1, 0). Value 2, y = (0, 1).
    let x = variable(2);
    let y = variable(2);
    let a = constant_matrix(2, 2, &[1.0, 2.0, 3.0, 4.0]);
    let objective = inner(&x, &matmul(&a, &y)).unwrap();

    let mut constraints = simplex(&x);
    constraints.extend(simplex(&y));

    let problem = SaddleProblem::new(MinimizeMaximize::new(objective), constraints).unwrap();
    let solution = problem.solve().unwrap();

    assert!((solution.value - 2.0).abs() < TOL, "value = {}", solution.value);

    let xv = solution
        .get_value(x.variable_id().unwrap())
        .unwrap()
        .to_dense();
    let yv = solution
        .get_value(y.variable_id().unwrap())
        .unwrap()
        .to_dense();
    assert!((xv[(0, 0)] - 1.0).abs() < TOL && xv[(1, 0)].abs() < TOL, "x = {xv}");
    assert!((yv[(1, 0)] - 1.0).abs() < TOL && yv[(0, 0)].abs() < TOL, "y = {yv}");
}

#[test]
fn test_bilinear_with_side_terms() {
    // min_x max_y x y + x - y with x in [0, 2], y in [0, 1].
    //
    // For fixed x the inner max is x + max(0, x - 1) y-wise, so the outer
    // minimum sits at the saddle point (0, 0) with value 0.
    let x = variable(1);
    let y = variable(1);
    let objective = &(&inner(&x, &y).unwrap() + &sum(&x)) - &sum(&y);

    let constraints = vec![
        x.geq(&zeros(1)),
        x.leq(&constant(2.0)),
        y.geq(&zeros(1)),
        y.leq(&constant(1.0)),
    ];

    let problem = SaddleProblem::new(MinimizeMaximize::new(objective), constraints).unwrap();
    let solution = problem.solve().unwrap();

    assert!(solution.value.abs() < TOL, "value = {}", solution.value);
    assert_eq!(solution.status, SolveStatus::Optimal);
}

#[test]
fn test_weighted_log_sum_exp_saddle() {
    // min_x max_y log(y1 e^{x1} + y2 e^{x2}) with x pinned to (1, 3) and y
    // on the simplex: the max concentrates on the largest exponent, so the
    // value is 3. The uncertified weight argument produces one diagnostic.
    let x = variable(2);
    let y = variable(2);
    let objective = weighted_log_sum_exp(&x, &y).unwrap();

    let mut constraints = vec![x.equals(&constant_vec(vec![1.0, 3.0]))];
    constraints.extend(simplex(&y));

    let problem = SaddleProblem::new(MinimizeMaximize::new(objective), constraints).unwrap();
    let solution = problem.solve().unwrap();

    assert!((solution.value - 3.0).abs() < TOL, "value = {}", solution.value);
    assert_eq!(solution.diagnostics.len(), 1);
    assert!(solution.diagnostics[0].message.contains("nonneg"));
}

#[test]
fn test_extremum_evaluate() {
    // f(x) = sup_{0 <= y <= 1} 2 log(y1 e^{x1} + y2 e^{x2}) + y1 + e^{x1}.
    //
    // The objective increases in both weights, so the sup sits at y = (1, 1):
    // f(1, 1) = 2 log(2e) + 1 + e.
    let x = variable(2);
    let y = local_variable(2);
    let wlse = weighted_log_sum_exp(&x, &y).unwrap();
    let objective = &(&(2.0 * &wlse) + &index(&y, 0)) + &exp(&index(&x, 0));
    let f = saddle_max(objective, vec![y.leq(&ones(2))]).unwrap();

    // Unset exponent values are an error, not a silent default.
    let mut assignment = Assignment::new();
    match evaluate(&f, &assignment) {
        Err(DspError::UnsetValue(_)) => {}
        other => panic!("expected UnsetValue, got {other:?}"),
    }

    assignment.set_vector(x.variable_id().unwrap(), &[1.0, 1.0]);
    let value = evaluate(&f, &assignment).unwrap();
    let expected = 2.0 * (2.0 * 1f64.exp()).ln() + 1.0 + 1f64.exp();
    assert!(
        (value[(0, 0)] - expected).abs() < TOL,
        "value = {}, expected {}",
        value[(0, 0)],
        expected
    );
}

#[test]
fn test_extremum_inside_minimization() {
    // The matrix game again, but with the inner player folded into a
    // sup-extremum so the outer problem is plain convex minimization.
    let x = variable(2);
    let y = local_variable(2);
    let a = constant_matrix(2, 2, &[1.0, 2.0, 3.0, 4.0]);
    let objective = inner(&x, &matmul(&a, &y)).unwrap();
    let worst_case = saddle_max(
        objective,
        vec![sum(&y).equals(&constant(1.0)), y.geq(&zeros(2))],
    )
    .unwrap();

    let problem = Problem::minimize(worst_case)
        .subject_to(simplex(&x))
        .build();
    let solution = problem.solve().unwrap();
    let value = solution.value.expect("should have value");
    assert!((value - 2.0).abs() < TOL, "value = {value}");
}

#[test]
fn test_switch_twice_recovers_support_values() {
    // Switching a bilinear representation exchanges the roles; switching the
    // result again must describe the original function. Compare support
    // values of the natural and twice-switched representations at a few
    // numeric points against x' A y computed directly.
    let x = variable(2);
    let y = variable(2);
    let a = constant_matrix(2, 2, &[1.0, 2.0, 3.0, 4.0]);
    let expr = inner(&x, &matmul(&a, &y)).unwrap();
    let atom = match &expr {
        Expr::Saddle(atom) => atom.clone(),
        _ => panic!("not a saddle atom"),
    };

    let mut layout = VariableLayout::new(vec![data(&x)], vec![data(&y)]).unwrap();
    let natural = atom_k_repr(&atom, &mut layout, false).unwrap();

    // First switch: y becomes the convex group, x the pairing.
    let flipped = layout.flipped();
    let pairing = stacked_side(&layout, Side::Concave);
    let mut dualize: HashSet<ExprId> = HashSet::new();
    collect_aux(&natural, &layout, &mut dualize);
    let once = switch_repr(
        &natural,
        &pairing,
        &dualize,
        &flipped,
        ConcaveEvaluator::Constant(0.0),
    )
    .unwrap();

    // Second switch restores the original orientation.
    let pairing_back = stacked_side(&flipped, Side::Concave);
    let mut dualize_back: HashSet<ExprId> = HashSet::new();
    collect_aux(&once, &flipped, &mut dualize_back);
    let twice = switch_repr(
        &once,
        &pairing_back,
        &dualize_back,
        &layout,
        ConcaveEvaluator::Constant(0.0),
    )
    .unwrap();

    let settings = Settings::default();
    let points = [
        (vec![1.0, 0.0], vec![0.0, 1.0]),
        (vec![0.5, 0.5], vec![0.25, 0.75]),
        (vec![2.0, -1.0], vec![1.0, 1.0]),
    ];
    for (xv, yv) in points {
        let expected = bilinear_value(&xv, &yv);
        let fixed = [(x.variable_id().unwrap(), DVector::from_vec(xv.clone()))];
        let pairing_values = DVector::from_vec(yv.clone());

        let direct = natural
            .support_value(&pairing_values, &fixed, &settings)
            .unwrap();
        let round_trip = twice
            .support_value(&pairing_values, &fixed, &settings)
            .unwrap();
        assert!((direct - expected).abs() < TOL, "direct {direct} vs {expected}");
        assert!(
            (round_trip - expected).abs() < TOL,
            "round trip {round_trip} vs {expected}"
        );
    }
}

fn bilinear_value(x: &[f64], y: &[f64]) -> f64 {
    let a = [[1.0, 2.0], [3.0, 4.0]];
    let mut total = 0.0;
    for (i, xi) in x.iter().enumerate() {
        for (j, yj) in y.iter().enumerate() {
            total += xi * a[i][j] * yj;
        }
    }
    total
}

fn collect_aux(
    repr: &dsprust::saddle::k_repr::KRepr,
    layout: &VariableLayout,
    out: &mut HashSet<ExprId>,
) {
    let mut absorb = |ids: Vec<ExprId>| {
        for id in ids {
            if layout.side_of(id).is_none() {
                out.insert(id);
            }
        }
    };
    absorb(repr.f.variables());
    absorb(repr.t.variables());
    for c in &repr.constraints {
        absorb(c.variable_sizes().keys().copied().collect());
    }
}
