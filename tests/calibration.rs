use misreg::{
    BuildStrategy, Builder, Calibration, FromBuilder, InstrumentBuilder, MisregistrationCost,
    PerturbationVector, Report, Sampling, SolverFamily,
};

fn instrument() -> InstrumentBuilder {
    InstrumentBuilder::default()
        .teldiam(2.0)
        .nsubx(10)
        .nactux(17)
}

#[test]
fn least_squares() -> anyhow::Result<()> {
    let calibration = Calibration::builder()
        .instrument(instrument())
        .seed(1)
        .build()?;
    let report = calibration.run()?;
    println!("{report}");
    assert!(report.solution.converged);
    assert_eq!(report.n_sample, 1000);
    report
        .solution
        .estimate
        .iter()
        .zip(report.truth.iter())
        .for_each(|(e, t)| assert!((e - t).abs() < 1e-3, "{e} vs {t}"));
    Ok(())
}

#[test]
fn per_layer_filtered() -> anyhow::Result<()> {
    let calibration = Calibration::builder()
        .instrument(
            InstrumentBuilder::default()
                .teldiam(1.0)
                .nsubx(6)
                .nactux(11)
                .on_ring(8, 10.0),
        )
        .strategy(BuildStrategy::PerLayer { filter: true })
        .sampling(Sampling::WithoutReplacement)
        .target_count(600)
        .seed(2)
        .build()?;
    let report = calibration.run()?;
    println!("{report}");
    assert!(report.solution.converged);
    assert_eq!(report.n_unique, 600);
    assert!(report.error() < 1e-3);
    Ok(())
}

#[test]
fn nelder_mead() -> anyhow::Result<()> {
    let calibration = Calibration::builder()
        .instrument(instrument())
        .solver(SolverFamily::Minimize {
            max_iters: 300,
            sd_tolerance: 1e-12,
            initial_step: 0.05,
        })
        .target_count(300)
        .seed(3)
        .build()?;
    let reference = calibration.initialize()?;
    let cost = MisregistrationCost::new(
        calibration.imat_builder(),
        &reference.values,
        &reference.indices,
    );
    let initial_cost = cost.cost(&PerturbationVector::zeros())?;
    let report = calibration.optimize(&reference)?;
    println!("{report}");
    assert!(report.solution.cost < initial_cost);
    assert!(report.solution.n_evaluations > report.solution.n_iterations);
    assert!(report.solution.n_iterations <= 300);
    Ok(())
}

#[test]
fn max_iterations() -> anyhow::Result<()> {
    let calibration = Calibration::builder()
        .instrument(instrument())
        .solver(SolverFamily::Minimize {
            max_iters: 5,
            sd_tolerance: 1e-12,
            initial_step: 0.05,
        })
        .target_count(300)
        .seed(5)
        .build()?;
    let report = calibration.run()?;
    println!("{report}");
    assert!(!report.solution.converged);
    assert!(report.solution.termination.contains("MaxItersReached"));
    assert_eq!(report.solution.n_iterations, 5);
    assert!(report.solution.cost.is_finite());
    Ok(())
}

#[test]
fn insufficient_sensitivity() -> anyhow::Result<()> {
    let calibration = Calibration::builder()
        .instrument(InstrumentBuilder::default().teldiam(1.0).nsubx(4).nactux(9))
        .sampling(Sampling::WithoutReplacement)
        .target_count(1_000_000)
        .build()?;
    let err = calibration.initialize().unwrap_err();
    assert!(err.is_configuration());
    Ok(())
}

#[test]
fn report_pickle() -> anyhow::Result<()> {
    let calibration = Calibration::builder()
        .instrument(InstrumentBuilder::default().teldiam(1.0).nsubx(4).nactux(11))
        .target_count(200)
        .seed(4)
        .build()?;
    let reference = calibration.initialize()?;
    assert!(calibration.time_sparse_build(&reference, 3)?.as_nanos() > 0);
    calibration.time_sparse_build(&reference, 0)?;
    let report = calibration.optimize(&reference)?;
    let path = std::env::temp_dir().join("misreg_report.pkl");
    report.dump(path.display().to_string())?;
    assert_eq!(Report::load(&path)?, report);
    Ok(())
}
