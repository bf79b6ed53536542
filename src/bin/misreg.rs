use misreg::{Builder, Calibration, CalibrationBuilder, FromBuilder};
use std::{env, time::Instant};

fn main() -> anyhow::Result<()> {
    env_logger::init();

    let builder = match env::var("MISREG_CONFIG") {
        Ok(path) => CalibrationBuilder::load(path)?,
        Err(_) => Calibration::builder(),
    };
    let calibration = builder.progress().build()?;

    let now = Instant::now();
    let reference = calibration.initialize()?;
    println!("Initialization in {:.3}s", now.elapsed().as_secs_f64());
    let sparse = calibration.time_sparse_build(&reference, 10)?;
    println!(
        "Sparse interaction matrix build ({} elements) in {:.3}ms",
        reference.len(),
        sparse.as_secs_f64() * 1e3
    );

    let report = calibration.optimize(&reference)?;
    println!("{report}");

    if let Ok(path) = env::var("MISREG_REPORT") {
        report.dump(path)?;
    }
    Ok(())
}
