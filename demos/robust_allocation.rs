//! Robust Allocation Example
//!
//! Picks an allocation whose worst-case log-sum-exp risk over an
//! adversarial weighting is smallest:
//!
//! min_x  sup_{w in W}  log(w' exp(x))
//! subject to  sum(x) = 1
//!
//! The inner sup is a `saddle_max` extremum over a local variable, so the
//! outer problem is an ordinary convex minimization.

use dsprust::prelude::*;

fn main() {
    println!("=== Robust Allocation ===\n");

    let x = variable(3);
    let w = local_variable(3);

    let risk = weighted_log_sum_exp(&x, &w).expect("wlse atom");
    let worst_case = saddle_max(
        risk,
        vec![sum(&w).equals(&constant(1.0)), w.geq(&zeros(3))],
    )
    .expect("inner sup is DSP");

    println!("Solving...");
    let solution = Problem::minimize(worst_case)
        .subject_to([sum(&x).equals(&constant(1.0))])
        .solve()
        .expect("solve failed");

    println!("\nResults:");
    println!("  Status: {:?}", solution.status);
    println!("  Worst-case risk: {:.4}", solution.value.unwrap_or(f64::NAN));

    let xv = solution
        .get_value(x.variable_id().unwrap())
        .unwrap()
        .to_dense();
    println!(
        "  Allocation: ({:.4}, {:.4}, {:.4})",
        xv[(0, 0)],
        xv[(1, 0)],
        xv[(2, 0)]
    );
}
