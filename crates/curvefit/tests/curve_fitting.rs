use std::sync::{Arc, Mutex};

use approx::assert_abs_diff_eq;
use curvefit::{
    CurveFit, Data, Error, ParameterSpec,
    core::{Action, Iteration, OptimizeResult, Persist},
    registry,
};

const EQUATION: &str = "a * x ^ 3 + b * y ^2 + c * z";

fn linspace(start: f64, stop: f64, n: usize) -> Vec<f64> {
    let step = (stop - start) / (n - 1) as f64;
    (0..n).map(|i| start + step * i as f64).collect()
}

/// Target generated by the equation itself at `a = b = c = 1`.
fn cubic() -> CurveFit {
    let x = linspace(0.0, 1.0, 100);
    let target = x.iter().map(|v| v.powi(3) + v.powi(2) + v).collect();
    let data = Data::from([
        ("x".to_owned(), x.clone()),
        ("y".to_owned(), x.clone()),
        ("z".to_owned(), x),
    ]);

    let mut fit = CurveFit::new(EQUATION, data, target)
        .initial("a", 1.5)
        .initial("b", 0.5)
        .initial("c", 2.0);
    for name in ["a", "b", "c"] {
        fit = fit.bound(name, (0.0, 2.0)).spread(name, 0.1);
    }
    fit
}

#[test]
fn evolution_strategy_recovers_known_parameters() {
    let result = cubic()
        .option("maxiter", 1000)
        .option("maxfun", 10_000)
        .option("n_jobs", 1)
        .option("seed", 42)
        .option("verbose", -9)
        .fit()
        .unwrap();

    assert!(result.fun < 1e-5, "fun = {}", result.fun);
    for value in &result.x {
        assert_abs_diff_eq!(*value, 1.0, epsilon = 0.1);
    }

    assert_eq!(result.optimize_keys, ["a", "b", "c"]);
    assert_eq!(result.parameters["b"], result.x[1]);
    assert!(result.evals_best.is_some());
    assert!(result.duration > 0.0);
}

/// The start of `c` sits on its upper bound, so every method has to move
/// off the boundary to find the fit.
#[test]
fn local_search_runs_end_to_end() {
    // Derivative-free methods get close; the gradient methods see the kink of
    // the RMS at an exact fit and stop earlier.
    let methods = [
        ("Scipy-NelderMead", 1e-6),
        ("Scipy-Powell", 1e-6),
        ("Scipy-LBFGSB", 1e-2),
        ("Scipy-TNC", 1e-2),
    ];

    for (method, tolerance) in methods {
        let result = cubic()
            .method(method)
            .option("maxiter", 5000)
            .option("maxfun", 20_000)
            .option("fatol", 1e-12)
            .option("ftol", 1e-12)
            .fit_with(&registry::builtin())
            .unwrap();

        assert!(result.fun < tolerance, "{method}: fun = {}", result.fun);
        assert!(result.message.is_some());
        assert_eq!(result.maxcv, Some(0.0));
        assert_eq!(result.optimize_keys, ["a", "b", "c"]);
        for (name, (lo, hi)) in ["a", "b", "c"].iter().zip([(0.0, 2.0); 3]) {
            let value = result.parameters[*name];
            assert!((lo..=hi).contains(&value), "{method}: {name} = {value}");
        }
    }
}

#[test]
fn derivative_free_searches_recover_known_parameters() {
    for method in ["Scipy-NelderMead", "Scipy-Powell"] {
        let result = cubic()
            .method(method)
            .option("maxiter", 5000)
            .option("maxfun", 20_000)
            .option("fatol", 1e-12)
            .option("ftol", 1e-12)
            .fit_with(&registry::builtin())
            .unwrap();

        for value in &result.x {
            assert_abs_diff_eq!(*value, 1.0, epsilon = 1e-2);
        }
    }
}

#[test]
fn callbacks_follow_the_run_through_the_registry() {
    let seen = Arc::new(Mutex::new(0));
    let count = Arc::clone(&seen);

    let implementation = registry::resolve("PYCMA-CMAES").unwrap();
    let x0 = vec![1.5, 0.5, 2.0];
    let objective = curvefit::core::Objective::new(|x: &[f64]| {
        Ok::<_, std::convert::Infallible>(x.iter().map(|v| (v - 1.0).powi(2)).sum())
    });
    let problem = curvefit::core::Problem::new(objective, x0)
        .option("seed", 5)
        .option("verbose", -9)
        .callback(move |it: &Iteration<'_>| {
            *count.lock().unwrap() += 1;
            (it.iteration == 20).then_some(Action::StopEarly)
        });

    let result = implementation.fmin(problem).unwrap();
    assert_eq!(result.nit, 20);
    assert_eq!(*seen.lock().unwrap(), 20);
}

#[test]
fn missing_parameter_spec_fails_before_optimizing() {
    let fit = cubic();
    let mut data = Data::new();
    data.insert("x".to_owned(), linspace(0.0, 1.0, 100));
    data.insert("y".to_owned(), linspace(0.0, 1.0, 100));
    data.insert("z".to_owned(), linspace(0.0, 1.0, 100));

    let error = CurveFit::new(format!("{EQUATION} + d"), data, vec![0.0; 100])
        .initial("a", 1.0)
        .initial("b", 1.0)
        .initial("c", 1.0)
        .fit()
        .unwrap_err();
    assert!(matches!(
        error,
        Error::MissingParameterSpec { ref name, spec: ParameterSpec::Initial } if name == "d"
    ));

    let error = fit.method("Scipy-Bogus").fit().unwrap_err();
    assert!(matches!(
        error,
        Error::Optimizer(curvefit::core::Error::UnknownOptimizer { .. })
    ));
}

#[test]
fn results_persist_with_their_labels() {
    let result = cubic()
        .method("Scipy-Powell")
        .fit_with(&registry::builtin())
        .unwrap();

    let restored = OptimizeResult::from_bytes(&result.to_bytes().unwrap()).unwrap();
    assert_eq!(restored, result);
    assert_eq!(restored.optimize_keys, ["a", "b", "c"]);
}
