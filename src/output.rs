//! CSV sinks for sweep results

use std::fs::{self, File};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

use chrono::Local;
use tracing::info;

use crate::simulation::{RunRecord, ShareCurve, SweepResults};

#[derive(Debug, thiserror::Error)]
pub enum OutputError {
    #[error("could not create output directory {}", .path.display())]
    CreateDir {
        path: PathBuf,
        source: io::Error,
    },
    #[error("could not write output file {}", .path.display())]
    WriteFile {
        path: PathBuf,
        source: io::Error,
    },
}

/// Creates a `YYYYMMDD_HHMMSS`-stamped directory under `root` and returns
/// its path.
pub fn create_timestamp_dir(root: &Path) -> Result<PathBuf, OutputError> {
    let stamp = Local::now().format("%Y%m%d_%H%M%S").to_string();
    let dir = root.join(stamp);
    fs::create_dir_all(&dir).map_err(|source| OutputError::CreateDir {
        path: dir.clone(),
        source,
    })?;

    Ok(dir)
}

/// Writes every CSV artifact of a sweep into `dir`: the per-delay summary
/// table, one share curve per run, and one share curve per tracked miner
/// per run.
pub fn write_sweep(dir: &Path, sweep: &SweepResults) -> Result<(), OutputError> {
    write_summary(dir, sweep)?;
    for run in sweep.runs() {
        write_share_curves(dir, sweep, run)?;
    }

    Ok(())
}

/// The `delay,pi_A,pi_O,w_A,w_O,avg_block_interval` table, one row per
/// swept delay.
fn write_summary(dir: &Path, sweep: &SweepResults) -> Result<(), OutputError> {
    let path = dir.join(format!(
        "{}_{}_{}_{}_{}_w_pi.csv",
        sweep.flavor_name, sweep.node_count, sweep.end_round, sweep.rule_name, sweep.difficulty_name
    ));
    info!("writing sweep summary to {}", path.display());

    write_file(&path, |file| write!(file, "{}", sweep))
}

fn write_share_curves(dir: &Path, sweep: &SweepResults, run: &RunRecord) -> Result<(), OutputError> {
    let suffix = format!(
        "{}_{}_{}_{}_{}_{}_share.csv",
        sweep.flavor_name,
        run.delay,
        sweep.node_count,
        sweep.end_round,
        sweep.rule_name,
        sweep.difficulty_name
    );

    let path = dir.join(&suffix);
    info!("writing share curve to {}", path.display());
    write_file(&path, |file| write_curve(file, run.share_curve()))?;

    for (miner, curve) in run.miner_share_curves().enumerate() {
        let path = dir.join(format!("miner_{}_{}", miner, suffix));
        write_file(&path, |file| write_curve(file, curve))?;
    }

    Ok(())
}

fn write_curve(file: &mut BufWriter<File>, curve: ShareCurve<'_>) -> io::Result<()> {
    for (height, share) in curve {
        writeln!(file, "{}: {}", height, share)?;
    }

    Ok(())
}

fn write_file<F>(path: &Path, body: F) -> Result<(), OutputError>
where
    F: FnOnce(&mut BufWriter<File>) -> io::Result<()>,
{
    let write = || -> io::Result<()> {
        let mut file = BufWriter::new(File::create(path)?);
        body(&mut file)?;
        file.flush()
    };

    write().map_err(|source| OutputError::WriteFile {
        path: path.to_path_buf(),
        source,
    })
}
