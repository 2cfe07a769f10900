use eyre::Result;
use tncore::prelude::*;

fn settings(l2: f64) -> Settings {
    let mut settings = Settings::new();
    settings.model.l2 = l2;
    settings.solver.tol = 1e-6;
    settings
}

#[test]
fn fits_separable_synthetic_data() -> Result<()> {
    let data = synthetic::classification(2000, 5, true, 22)?;
    let (train, test) = data.split(0.7)?;

    let fit = fit_logistic(train.features.view(), train.labels.view(), &settings(1.0))?;
    assert!(fit.outcome.is_converged());
    assert!(fit.intercept().is_some());
    assert_eq!(fit.coefficients().len(), 5);

    let train_accuracy = fit.accuracy(train.features.view(), train.labels.view())?;
    let test_accuracy = fit.accuracy(test.features.view(), test.labels.view())?;
    assert!(train_accuracy >= 0.95, "train accuracy {}", train_accuracy);
    assert!(test_accuracy >= 0.9, "test accuracy {}", test_accuracy);

    // The fitted hyperplane points the same way as the generating one
    let truth = data.params.as_ref().unwrap();
    let fitted = fit.params();
    let cosine = fitted.dot(truth) / (linalg::l2_norm(&fitted) * linalg::l2_norm(truth));
    assert!(cosine > 0.9, "cosine similarity {}", cosine);
    Ok(())
}

#[test]
fn fit_without_intercept() -> Result<()> {
    let data = synthetic::classification(1000, 3, false, 3)?;
    let mut settings = settings(0.5);
    settings.model.fit_intercept = false;

    let fit = fit_logistic(data.features.view(), data.labels.view(), &settings)?;
    assert!(fit.outcome.is_converged());
    assert!(fit.intercept().is_none());
    assert_eq!(fit.params().len(), 3);

    let predicted = fit.predict(data.features.view())?;
    assert!(predicted.iter().all(|&y| y == 0.0 || y == 1.0));
    let proba = fit.predict_proba(data.features.view())?;
    assert!(proba.iter().all(|&p| (0.0..=1.0).contains(&p)));
    Ok(())
}

#[test]
fn results_do_not_depend_on_thread_count() -> Result<()> {
    // Large enough for the chunked reductions to be split across tasks
    let data = synthetic::classification(10_000, 4, true, 11)?;
    let settings = settings(1.0);

    let run = |threads: usize| {
        rayon::ThreadPoolBuilder::new()
            .num_threads(threads)
            .build()
            .unwrap()
            .install(|| fit_logistic(data.features.view(), data.labels.view(), &settings))
    };

    let single = run(1)?;
    let multi = run(4)?;
    assert_eq!(single.outcome.iterations, multi.outcome.iterations);
    assert_eq!(
        single.outcome.inner_iterations,
        multi.outcome.inner_iterations
    );
    assert_eq!(single.outcome.value.to_bits(), multi.outcome.value.to_bits());
    for (a, b) in single.params().iter().zip(multi.params().iter()) {
        assert_eq!(a.to_bits(), b.to_bits());
    }
    Ok(())
}

#[test]
fn single_precision_fit() -> Result<()> {
    let data = synthetic::classification(500, 2, true, 9)?;
    let features = data.features.mapv(|x| x as f32);
    let labels = data.labels.mapv(|y| y as f32);
    let mut settings = settings(1.0);
    settings.solver.tol = 1e-2;

    let fit = fit_logistic(features.view(), labels.view(), &settings)?;
    assert!(fit.outcome.is_converged());
    assert!(fit.accuracy(features.view(), labels.view())? >= 0.95);
    Ok(())
}

#[test]
fn rejects_invalid_labels() -> Result<()> {
    let data = synthetic::classification(10, 2, true, 1)?;
    let labels = data.labels.mapv(|_| 2.0);
    assert!(fit_logistic(data.features.view(), labels.view(), &Settings::new()).is_err());

    let mut settings = Settings::new();
    settings.model.l2 = -1.0;
    assert!(fit_logistic(data.features.view(), data.labels.view(), &settings).is_err());
    Ok(())
}
