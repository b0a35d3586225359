//! Matrix Game Example
//!
//! Solves the zero-sum matrix game
//!
//! min_x max_y  x' A y
//! subject to   x, y on the probability simplex
//!
//! in a single shot: both players' optimal mixed strategies come out of
//! one `SaddleProblem::solve` call.

use dsprust::prelude::*;

fn main() {
    println!("=== Zero-Sum Matrix Game ===\n");

    // Payoff matrix (row player pays column player)
    let a = constant_matrix(2, 2, &[1.0, 2.0, 3.0, 4.0]);

    let x = variable(2);
    let y = variable(2);

    let objective = inner(&x, &matmul(&a, &y)).expect("bilinear pairing");

    let constraints = vec![
        sum(&x).equals(&constant(1.0)),
        x.geq(&zeros(2)),
        sum(&y).equals(&constant(1.0)),
        y.geq(&zeros(2)),
    ];

    println!("Solving...");
    let problem = SaddleProblem::new(MinimizeMaximize::new(objective), constraints)
        .expect("problem is DSP");
    let solution = problem.solve().expect("solve failed");

    println!("\nResults:");
    println!("  Status: {:?}", solution.status);
    println!("  Game value: {:.4}", solution.value);

    let xv = solution
        .get_value(x.variable_id().unwrap())
        .unwrap()
        .to_dense();
    let yv = solution
        .get_value(y.variable_id().unwrap())
        .unwrap()
        .to_dense();
    println!("  Row strategy:    ({:.4}, {:.4})", xv[(0, 0)], xv[(1, 0)]);
    println!("  Column strategy: ({:.4}, {:.4})", yv[(0, 0)], yv[(1, 0)]);
}
