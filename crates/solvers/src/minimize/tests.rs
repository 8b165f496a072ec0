use std::{
    convert::Infallible,
    sync::{Arc, Mutex},
};

use approx::assert_relative_eq;
use curvefit_core::Options;

use super::{
    Action, Error, Event, Method, Status, initial_simplex, minimize, minimize_unobserved,
};

/// Rotated, unevenly scaled bowl with its minimum at (1, -2).
fn bowl(x: &[f64]) -> Result<f64, Infallible> {
    let (a, b) = (x[0] - 1.0, x[1] + 2.0);
    Ok(a * a + 10.0 * b * b + a * b)
}

fn rosenbrock(x: &[f64]) -> Result<f64, Infallible> {
    Ok((1.0 - x[0]).powi(2) + 100.0 * (x[1] - x[0] * x[0]).powi(2))
}

#[test]
fn lbfgsb_converges() {
    let solution =
        minimize_unobserved(bowl, &[3.0, 3.0], None, Method::LBfgsB, &Options::new()).unwrap();

    assert!(solution.success, "{}", solution.message);
    assert_eq!(solution.status, 0);
    assert_relative_eq!(solution.x[0], 1.0, epsilon = 1e-4);
    assert_relative_eq!(solution.x[1], -2.0, epsilon = 1e-4);
    assert!(solution.njev.unwrap() > 0);
    assert!(solution.jac.is_some());
    assert_eq!(solution.nhev, None);
    assert_eq!(solution.maxcv, None);
}

#[test]
fn nelder_mead_converges() {
    let options = Options::new()
        .with("fatol", 1e-12)
        .with("maxiter", 5000)
        .with("maxfev", 5000);
    let solution =
        minimize_unobserved(bowl, &[0.0, 0.0], None, Method::NelderMead, &options).unwrap();

    assert_eq!(solution.reason, Status::Converged);
    assert_relative_eq!(solution.x[0], 1.0, epsilon = 1e-4);
    assert_relative_eq!(solution.x[1], -2.0, epsilon = 1e-4);
    assert_eq!(solution.njev, None);
    assert_eq!(solution.jac, None);
}

#[test]
fn powell_converges() {
    let options = Options::new()
        .with("ftol", 1e-10)
        .with("xtol", 1e-8)
        .with("maxfev", 100_000);
    let solution = minimize_unobserved(bowl, &[2.0, 2.0], None, Method::Powell, &options).unwrap();

    assert_eq!(solution.reason, Status::Converged);
    assert_relative_eq!(solution.x[0], 1.0, epsilon = 1e-4);
    assert_relative_eq!(solution.x[1], -2.0, epsilon = 1e-4);
}

#[test]
fn tnc_reaches_the_minimum() {
    let solution =
        minimize_unobserved(bowl, &[3.0, 3.0], None, Method::Tnc, &Options::new()).unwrap();

    assert_relative_eq!(solution.x[0], 1.0, epsilon = 1e-5);
    assert_relative_eq!(solution.x[1], -2.0, epsilon = 1e-5);
    assert_relative_eq!(solution.fun, 0.0, epsilon = 1e-9);
    assert!(solution.nhev.unwrap() > 0);
    assert!(solution.njev.unwrap() > 0);
}

#[test]
fn bounded_methods_stay_feasible() {
    let bounds = [(-0.5, 0.5), (-1.0, 1.0)];

    for method in Method::ALL {
        let solution =
            minimize_unobserved(bowl, &[0.0, 0.0], Some(&bounds), method, &Options::new())
                .unwrap();

        for (x, (lo, hi)) in solution.x.iter().zip(bounds) {
            assert!((lo..=hi).contains(x), "{method}: {x} outside [{lo}, {hi}]");
        }
        assert_eq!(solution.maxcv, Some(0.0));
    }

    // The unconstrained minimum lies outside; the bounded one sits on a corner.
    let solution = minimize_unobserved(
        bowl,
        &[0.0, 0.0],
        Some(&bounds),
        Method::LBfgsB,
        &Options::new(),
    )
    .unwrap();
    assert_relative_eq!(solution.x[0], 0.5, epsilon = 1e-4);
    assert_relative_eq!(solution.x[1], -1.0, epsilon = 1e-4);
}

#[test]
fn nelder_mead_moves_off_a_start_on_the_bound() {
    let bounds = [(0.0, 2.0), (-3.0, 0.0)];
    let options = Options::new()
        .with("fatol", 1e-12)
        .with("maxiter", 5000)
        .with("maxfev", 5000);
    let solution =
        minimize_unobserved(bowl, &[2.0, 0.0], Some(&bounds), Method::NelderMead, &options)
            .unwrap();

    assert_eq!(solution.reason, Status::Converged);
    assert_relative_eq!(solution.x[0], 1.0, epsilon = 1e-4);
    assert_relative_eq!(solution.x[1], -2.0, epsilon = 1e-4);
}

#[test]
fn initial_simplex_fits_inside_the_bounds() {
    let bounds = [(0.0, 2.0), (0.0, 2.0), (1.0, 1.0), (0.0, 1e-4)];
    let simplex = initial_simplex(&[2.0, 0.0, 1.0, 1e-4], |i| bounds[i]);

    assert_eq!(simplex[0], [2.0, 0.0, 1.0, 1e-4]);
    assert_relative_eq!(simplex[1][0], 1.9);
    assert_relative_eq!(simplex[2][1], 0.000_25);
    assert_relative_eq!(simplex[3][2], 1.0);
    assert_relative_eq!(simplex[4][3], 0.95e-4);
    for vertex in &simplex {
        for (v, (lo, hi)) in vertex.iter().zip(bounds) {
            assert!((lo..=hi).contains(v));
        }
    }
}

#[test]
fn rejects_a_flat_initial_simplex() {
    let options = Options::new().with(
        "initial_simplex",
        vec![vec![0.0, 0.0], vec![1.0, 1.0], vec![2.0, 2.0]],
    );
    let error =
        minimize_unobserved(bowl, &[0.0, 0.0], None, Method::NelderMead, &options).unwrap_err();
    assert!(matches!(error, Error::InvalidOption { ref key, .. } if key == "initial_simplex"));

    // Clamping the last vertex onto the first collapses the second coordinate.
    let options = Options::new().with(
        "initial_simplex",
        vec![vec![0.0, 1.0], vec![1.0, 1.0], vec![0.0, 3.0]],
    );
    let bounds = [(0.0, 1.0), (0.0, 1.0)];
    let error = minimize_unobserved(bowl, &[0.0, 0.0], Some(&bounds), Method::NelderMead, &options)
        .unwrap_err();
    assert!(matches!(error, Error::InvalidOption { ref key, .. } if key == "initial_simplex"));
}

#[test]
fn powell_resolves_short_steps_in_a_wide_box() {
    let bounds = [(-10.0, 10.0), (-10.0, 10.0)];
    let options = Options::new().with("ftol", 1e-12).with("maxfev", 100_000);
    let solution =
        minimize_unobserved(bowl, &[2.0, 2.0], Some(&bounds), Method::Powell, &options).unwrap();

    assert_eq!(solution.reason, Status::Converged);
    assert!(solution.fun < 1e-8, "fun = {}", solution.fun);
    assert_relative_eq!(solution.x[0], 1.0, epsilon = 1e-4);
    assert_relative_eq!(solution.x[1], -2.0, epsilon = 1e-4);
}

#[test]
fn stops_when_budget_is_used() {
    let options = Options::new().with("maxfev", 10);
    let solution =
        minimize_unobserved(rosenbrock, &[-1.2, 1.0], None, Method::NelderMead, &options).unwrap();

    assert_eq!(solution.reason, Status::EvaluationLimit);
    assert_eq!(solution.status, 1);
    assert!(!solution.success);
    assert_eq!(solution.nfev, 10);
    assert!(solution.fun < rosenbrock(&[-1.2, 1.0]).unwrap());
}

#[test]
fn stops_at_iteration_limit() {
    let options = Options::new().with("maxiter", 1);
    let solution =
        minimize_unobserved(rosenbrock, &[-1.2, 1.0], None, Method::Powell, &options).unwrap();

    assert_eq!(solution.reason, Status::IterationLimit);
    assert_eq!(solution.status, 2);
    assert_eq!(solution.nit, 1);
}

#[test]
fn observer_can_stop_early() {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let log = Arc::clone(&seen);

    let solution = minimize(
        rosenbrock,
        &[-1.2, 1.0],
        None,
        Method::LBfgsB,
        &Options::new(),
        move |event: &Event<'_>| {
            log.lock().unwrap().push((event.iteration, event.fun));
            (event.iteration == 2).then_some(Action::StopEarly)
        },
    )
    .unwrap();

    let seen = seen.lock().unwrap();
    assert_eq!(seen.len(), 2);
    assert_eq!(seen[0].0, 1);
    assert!(seen[1].1 <= seen[0].1);

    assert_eq!(solution.reason, Status::StoppedByObserver);
    assert_eq!(solution.status, 3);
    assert_eq!(solution.nit, 2);
    assert_eq!(solution.fun, seen[1].1);
}

#[test]
fn ignores_options_for_other_methods() {
    let options = Options::new()
        .with("stds", vec![0.1, 0.1])
        .with("popsize", 12)
        .with("gtol", 1e-8);

    let solution = minimize_unobserved(bowl, &[3.0, 3.0], None, Method::LBfgsB, &options).unwrap();
    assert!(solution.success, "{}", solution.message);
}

#[test]
fn objective_errors_propagate() {
    let failing = |x: &[f64]| {
        if x[0] > 5.0 {
            Err("too far")
        } else {
            Ok(x[0] * x[0])
        }
    };

    let error =
        minimize_unobserved(failing, &[10.0], None, Method::Powell, &Options::new()).unwrap_err();
    match error {
        Error::Objective(source) => assert_eq!(source.to_string(), "too far"),
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn validates_inputs() {
    let options = Options::new();

    let error = minimize_unobserved(bowl, &[], None, Method::Powell, &options).unwrap_err();
    assert!(matches!(error, Error::EmptyStart));

    let error = minimize_unobserved(bowl, &[0.0, 0.0], Some(&[(0.0, 1.0)]), Method::Tnc, &options)
        .unwrap_err();
    assert!(matches!(
        error,
        Error::BoundsLength {
            got: 1,
            expected: 2
        }
    ));

    let bounds = [(0.0, 1.0), (2.0, 1.0)];
    let error = minimize_unobserved(bowl, &[0.0, 0.0], Some(&bounds), Method::Tnc, &options)
        .unwrap_err();
    assert!(matches!(error, Error::Bounds { index: 1 }));

    let options = Options::new().with("initial_simplex", vec![vec![0.0, 0.0], vec![1.0, 0.0]]);
    let error =
        minimize_unobserved(bowl, &[0.0, 0.0], None, Method::NelderMead, &options).unwrap_err();
    assert!(matches!(error, Error::InvalidOption { ref key, .. } if key == "initial_simplex"));
}
