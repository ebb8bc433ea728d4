//! Squat Sense replay tool
//!
//! Feeds a recorded JSON-lines stream of pose frames through an analysis
//! session, printing feedback as it appears and the session summary at the
//! end. For library use, see lib.rs.

use std::collections::HashSet;
use std::path::PathBuf;

use anyhow::{Context, Result};
use indicatif::{ProgressBar, ProgressStyle};
use squat_sense::{EngineConfig, ExerciseKind, ExerciseSession, PoseFrame};
use structopt::StructOpt;
use tracing::{debug, info, warn};
use tracing_subscriber::layer::SubscriberExt;

#[derive(structopt::StructOpt)]
#[structopt(name = "squat-sense")]
struct Opt {
    /// JSON-lines file with one pose frame per line.
    #[structopt(required = true, parse(from_os_str))]
    frames: PathBuf,

    /// TOML engine configuration; defaults are used when omitted.
    #[structopt(short, long, parse(from_os_str))]
    config: Option<PathBuf>,

    #[structopt(short, long, default_value = "info", env = "RUST_LOG")]
    log_level: tracing_subscriber::filter::EnvFilter,

    #[structopt(short, long)]
    show_progress: bool,

    /// Print the final summary as JSON.
    #[structopt(long)]
    json: bool,
}

fn main() -> Result<()> {
    let opt = Opt::from_args();

    tracing::subscriber::set_global_default(
        tracing_subscriber::registry()
            .with(tracing_subscriber::fmt::layer())
            .with(opt.log_level),
    )?;

    let config = match &opt.config {
        Some(path) => EngineConfig::load(path)
            .with_context(|| format!("failed loading config from {}", path.display()))?,
        None => EngineConfig::default(),
    };

    let input = std::fs::read_to_string(&opt.frames)
        .with_context(|| format!("failed reading frames from {}", opt.frames.display()))?;
    let lines: Vec<(usize, &str)> = input
        .lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .collect();

    info!(
        message = "replaying frames",
        path = %opt.frames.display(),
        frames = lines.len()
    );

    let mut session = ExerciseSession::new(ExerciseKind::Squat, config)
        .context("failed constructing analysis session")?;

    let pb = if opt.show_progress {
        Some(
            ProgressBar::new(lines.len() as u64).with_style(
                ProgressStyle::default_bar()
                    .template("{prefix:.bold.dim} [{bar:40}] {pos}/{len} {wide_msg}")
                    .progress_chars("=> "),
            ),
        )
    } else {
        None
    };
    if let Some(pb) = &pb {
        pb.set_prefix("analyzing");
    }

    let mut seen = HashSet::new();
    let mut last_reps = 0;
    let mut skipped = 0usize;

    for (line_no, line) in lines {
        let frame: PoseFrame = match serde_json::from_str(line) {
            Ok(frame) => frame,
            Err(e) => {
                warn!(message = "skipping unparseable frame", line = line_no + 1, error = %e);
                skipped += 1;
                continue;
            }
        };

        let result = session.analyze(&frame);

        for item in &result.feedback {
            if seen.insert((item.message.clone(), item.created_at_ms)) {
                let text = format!(
                    "[{:>8}ms] {:?}/{:?} {}",
                    result.timestamp_ms, item.kind, item.severity, item.message
                );
                match &pb {
                    Some(pb) => pb.println(text),
                    None => println!("{}", text),
                }
            }
        }

        if result.rep_count != last_reps {
            last_reps = result.rep_count;
            let text = format!(
                "[{:>8}ms] rep {} (overall {:.0})",
                result.timestamp_ms, result.rep_count, result.overall_score
            );
            match &pb {
                Some(pb) => pb.println(text),
                None => println!("{}", text),
            }
        }

        if let Some(pb) = &pb {
            pb.set_message(format!("{} reps, phase {}", result.rep_count, result.phase));
            pb.inc(1);
        }
    }

    if let Some(pb) = pb {
        pb.finish_and_clear();
    }
    debug!(message = "replay finished", skipped);

    let summary = session.finalize();
    if opt.json {
        println!("{}", summary.to_json().context("failed serializing summary")?);
    } else {
        println!(
            "{} reps ({} rejected), overall {:.1}, best {}",
            summary.rep_count,
            summary.rejected_reps,
            summary.overall_score,
            summary
                .best_score
                .map(|s| format!("{:.1}", s))
                .unwrap_or_else(|| "-".to_string())
        );
        for (category, score) in summary.category_scores.iter() {
            println!("  {:<10} {:>5.1}", category.as_str(), score);
        }
    }

    Ok(())
}
