use anyhow::Context;

/// Write a plain-text log of a finished run: header lines followed by one
/// CSV row per day of network-wide totals. Returns the written path.
#[allow(clippy::too_many_arguments)]
pub fn write_run_log(
    out_dir: impl AsRef<std::path::Path>,
    run_id: &str,
    seed: u64,
    susceptible: &[f64],
    exposed: &[f64],
    infected: &[f64],
    deceased: &[f64],
    ili: &[f64],
) -> anyhow::Result<std::path::PathBuf> {
    use std::io::Write;

    anyhow::ensure!(
        exposed.len() == susceptible.len()
            && infected.len() == susceptible.len()
            && deceased.len() == susceptible.len()
            && ili.len() == susceptible.len(),
        "timeline length mismatch"
    );

    std::fs::create_dir_all(out_dir.as_ref()).context("create logs dir failed")?;
    let path = out_dir.as_ref().join(format!("seatird_{}.txt", run_id));
    let mut f = std::fs::File::create(&path)
        .with_context(|| format!("create run log file failed (path={:?})", path))?;

    writeln!(f, "run_id={}", run_id)?;
    writeln!(f, "seed={}", seed)?;
    writeln!(f, "days={}", susceptible.len().saturating_sub(1))?;
    writeln!(f)?;
    writeln!(f, "day,susceptible,exposed,infected,deceased,ili")?;

    for day in 0..susceptible.len() {
        writeln!(
            f,
            "{},{:.0},{:.0},{:.0},{:.0},{:.6}",
            day, susceptible[day], exposed[day], infected[day], deceased[day], ili[day]
        )?;
    }

    Ok(path)
}
