use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use clap::Subcommand;
use slipstream_core::{GhostDocument, GhostStore, SplitDefinition, interpolate};

#[derive(Subcommand)]
pub enum GhostCommand {
    /// Create a new empty ghost file
    Create {
        path: PathBuf,
        /// Split boundary as NAME:PERCENT, repeatable
        #[arg(short, long = "split", value_name = "NAME:PCT")]
        splits: Vec<String>,
    },
    /// Summarize a ghost file
    Show { path: PathBuf },
    /// Replace the splits of an existing ghost
    SetSplits {
        path: PathBuf,
        /// Split boundaries as NAME:PERCENT
        #[arg(value_name = "NAME:PCT", required = true)]
        splits: Vec<String>,
    },
    /// Print the ghost timer at a progress percentage
    Interpolate { path: PathBuf, percent: f64 },
}

pub fn execute(command: GhostCommand) -> Result<()> {
    match command {
        GhostCommand::Create { path, splits } => create(&path, &splits),
        GhostCommand::Show { path } => show(&path),
        GhostCommand::SetSplits { path, splits } => set_splits(&path, &splits),
        GhostCommand::Interpolate { path, percent } => interpolate_at(&path, percent),
    }
}

fn create(path: &Path, split_specs: &[String]) -> Result<()> {
    let splits = parse_splits(split_specs)?;
    let document = GhostDocument::create(path, splits)?;
    println!(
        "Created {} with {} split(s)",
        path.display(),
        document.splits.len()
    );
    Ok(())
}

fn show(path: &Path) -> Result<()> {
    let document = GhostDocument::load(path)?;

    println!("Ghost: {}", path.display());
    if document.splits.is_empty() {
        println!("  splits: none (whole run)");
    } else {
        println!("  splits:");
        for split in &document.splits {
            println!("    {:>6.2}%  {}", split.race_completion, split.name);
        }
    }
    println!("  best-split points: {}", document.best_splits.len());
    if let Some(total) = interpolate(&document.best_splits, 100.0) {
        println!("  final region time: {:.0} ms", total);
    }
    println!("  last run frames: {}", document.race_data.len());
    Ok(())
}

fn set_splits(path: &Path, split_specs: &[String]) -> Result<()> {
    let splits = parse_splits(split_specs)?;
    let mut store = GhostStore::new();
    store.load_ghost(path)?;
    store.set_splits(splits)?;
    println!("Updated splits of {}", path.display());
    Ok(())
}

fn interpolate_at(path: &Path, percent: f64) -> Result<()> {
    let document = GhostDocument::load(path)?;
    match interpolate(&document.best_splits, percent) {
        Some(timer) => println!("{:.0}", timer),
        None => println!("no best splits recorded"),
    }
    Ok(())
}

fn parse_splits(specs: &[String]) -> Result<Vec<SplitDefinition>> {
    specs.iter().map(|spec| parse_split(spec)).collect()
}

fn parse_split(spec: &str) -> Result<SplitDefinition> {
    let Some((name, pct)) = spec.rsplit_once(':') else {
        bail!("Split '{}' is not NAME:PERCENT", spec);
    };
    let race_completion: f64 = pct
        .parse()
        .with_context(|| format!("Split '{}' has a non-numeric percentage", spec))?;
    if !(0.0..=100.0).contains(&race_completion) {
        bail!("Split '{}' is outside 0-100%", spec);
    }
    Ok(SplitDefinition {
        name: name.to_string(),
        race_completion,
    })
}
