use std::convert::Infallible;

use approx::assert_relative_eq;
use curvefit_core::Options;

use super::{
    Action, CmaEvolutionStrategy, ConfigError, Error, Event, RunLimits, Status, minimize,
    minimize_unobserved,
};

fn sphere(x: &[f64]) -> Result<f64, Infallible> {
    Ok(x.iter().map(|v| v * v).sum())
}

fn shifted(x: &[f64]) -> Result<f64, Infallible> {
    Ok(x.iter().map(|v| (v - 3.0).powi(2)).sum())
}

fn seeded(seed: i64) -> Options {
    Options::new().with("seed", seed).with("verbose", -9)
}

#[test]
fn minimizes_sphere() {
    let solution = minimize_unobserved(
        sphere,
        &[1.0, -2.0, 0.5],
        0.5,
        &seeded(7),
        &RunLimits::default(),
    )
    .expect("should converge");

    assert_eq!(solution.status, Status::Terminated);
    assert!(!solution.stop.is_empty());
    assert!(solution.fbest < 1e-10, "fbest = {}", solution.fbest);
    for x in &solution.xbest {
        assert_relative_eq!(*x, 0.0, epsilon = 1e-4);
    }
    assert!(solution.evals_best <= solution.evaluations);
}

#[test]
fn respects_bounds() {
    let options = seeded(3).with("bounds", vec![vec![0.0], vec![1.0]]);

    let solution = minimize_unobserved(
        shifted,
        &[0.5, 0.5],
        0.3,
        &options,
        &RunLimits::default(),
    )
    .expect("should converge");

    for x in &solution.xbest {
        assert!((0.0..=1.0).contains(x));
        assert_relative_eq!(*x, 1.0, epsilon = 1e-3);
    }
}

#[test]
fn ask_returns_feasible_points() {
    let options = seeded(11).with("bounds", vec![vec![-0.1, 0.0], vec![0.1, 0.2]]);
    let mut strategy = CmaEvolutionStrategy::new(&[0.0, 0.1], 5.0, &options).unwrap();

    let points = strategy.ask();
    assert_eq!(points.len(), strategy.popsize());
    for x in &points {
        assert!((-0.1..=0.1).contains(&x[0]));
        assert!((0.0..=0.2).contains(&x[1]));
    }

    let error = strategy.tell(&[1.0]).unwrap_err();
    assert!(matches!(error, Error::Dimension { got: 1, .. }));
}

#[test]
fn observer_can_stop_early() {
    let mut seen = Vec::new();

    let solution = minimize(
        sphere,
        &[1.0, 1.0],
        0.5,
        &seeded(5),
        &RunLimits::default(),
        |event: &Event<'_>| {
            seen.push(event.iteration);
            (event.iteration == 3).then_some(Action::StopEarly)
        },
    )
    .expect("should stop cleanly");

    assert_eq!(seen, [1, 2, 3]);
    assert_eq!(solution.status, Status::StoppedByObserver);
    assert_eq!(solution.iterations, 3);
    assert_eq!(solution.stop.get("callback"), Some(&1.0));
}

#[test]
fn stops_at_run_limits() {
    let limits = RunLimits {
        iterations: Some(4),
        ..RunLimits::default()
    };
    let mut strategy = CmaEvolutionStrategy::new(&[1.0, 1.0, 1.0], 0.5, &seeded(9)).unwrap();
    let lambda = strategy.popsize();

    let solution = strategy.optimize(sphere, &limits, ()).unwrap().result();
    assert_eq!(solution.status, Status::IterationLimit);
    assert_eq!(solution.iterations, 4);
    assert_eq!(solution.evaluations, 4 * lambda);

    // A second call continues from the current state.
    let solution = strategy.optimize(sphere, &limits, ()).unwrap().result();
    assert_eq!(solution.iterations, 8);

    let limits = RunLimits {
        maxfun: Some(10 * lambda),
        ..RunLimits::default()
    };
    let solution = strategy.optimize(sphere, &limits, ()).unwrap().result();
    assert_eq!(solution.status, Status::EvaluationLimit);
    assert_eq!(solution.evaluations, 10 * lambda);
}

#[test]
fn seeded_runs_are_reproducible() {
    let run = |n_jobs| {
        let limits = RunLimits {
            iterations: Some(30),
            n_jobs,
            ..RunLimits::default()
        };
        minimize_unobserved(sphere, &[2.0, -1.0], 1.0, &seeded(42), &limits).unwrap()
    };

    let first = run(1);
    assert_eq!(first, run(1));
    assert_eq!(first, run(4));
}

#[test]
fn rejects_unknown_options() {
    let options = Options::new().with("not_an_option", 1);
    let error = CmaEvolutionStrategy::new(&[0.0], 1.0, &options).err().unwrap();

    assert!(matches!(
        error,
        Error::Config(ConfigError::UnknownOption(ref key)) if key == "not_an_option"
    ));
}

#[test]
fn validates_dimensions_and_step_size() {
    let options = Options::new().with("CMA_stds", vec![0.1, 0.2]);
    let error = CmaEvolutionStrategy::new(&[0.0, 0.0, 0.0], 1.0, &options)
        .err()
        .unwrap();
    assert!(matches!(
        error,
        Error::Dimension {
            got: 2,
            expected: 3,
            ..
        }
    ));

    let error = CmaEvolutionStrategy::new(&[], 1.0, &Options::new()).err().unwrap();
    assert!(matches!(error, Error::EmptyStart));

    let error = CmaEvolutionStrategy::new(&[0.0], 0.0, &Options::new()).err().unwrap();
    assert!(matches!(error, Error::StepSize));

    let options = Options::new().with("popsize", 1);
    let error = CmaEvolutionStrategy::new(&[0.0], 1.0, &options).err().unwrap();
    assert!(matches!(error, Error::Config(ConfigError::PopulationSize)));
}

#[test]
fn objective_errors_abort_the_run() {
    let failing = |x: &[f64]| {
        if x[0] > 0.0 {
            Err("positive input")
        } else {
            Ok(x[0].abs())
        }
    };

    let error = minimize_unobserved(failing, &[1.0], 0.5, &seeded(1), &RunLimits::default())
        .unwrap_err();

    match error {
        Error::Objective(source) => assert_eq!(source.to_string(), "positive input"),
        other => panic!("unexpected error: {other}"),
    }
}
