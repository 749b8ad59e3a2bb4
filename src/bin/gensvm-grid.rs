//! `gensvm-grid`: run a warm-started grid search described by a
//! grid-specification file and report the consistent top configuration(s).

use std::process::ExitCode;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use clap::Parser;

use gensvm::data::Dataset;
use gensvm::grid::{self, Task};
use gensvm::io;
use gensvm::rng::GenSvmRng;

#[derive(Parser)]
#[clap(name = "gensvm-grid", about = "Grid search over GenSVM hyperparameters")]
struct Args {
    /// Path to the grid-specification file.
    spec: String,

    /// RNG seed; defaults to the current time for a fresh run each invocation.
    #[clap(long)]
    seed: Option<u32>,
}

fn default_seed() -> u32 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as u32)
        .unwrap_or(1)
}

fn report(tasks: &[Task]) {
    let best = tasks
        .iter()
        .filter_map(|t| t.performance.map(|perf| (t, perf)))
        .max_by(|a, b| a.1.partial_cmp(&b.1).unwrap());
    match best {
        Some((task, perf)) => println!(
            "best task {}: p={} lambda={} kappa={} kernel={} hitrate={:.4}%",
            task.id, task.params.p, task.params.lambda, task.params.kappa, task.kernel.name(), perf
        ),
        None => println!("no task completed (cancelled before the first result)"),
    }
}

fn run(args: Args) -> anyhow::Result<()> {
    let grid_file = io::parse_grid_spec(&args.spec)?;
    let train: Dataset = io::read_dataset(&grid_file.train)?;
    let test: Option<Dataset> = grid_file.test.as_ref().map(|p| io::read_dataset(p)).transpose()?;

    let mut tasks = grid::make_queue(&grid_file.spec);
    println!("enumerated {} tasks", tasks.len());

    let cancel = Arc::new(AtomicBool::new(false));
    {
        let cancel = Arc::clone(&cancel);
        ctrlc::set_handler(move || {
            log::info!("interrupt received, stopping at the next fold/task boundary");
            cancel.store(true, Ordering::Relaxed);
        })?;
    }

    let mut rng = GenSvmRng::new(args.seed.unwrap_or_else(default_seed));

    match &test {
        Some(test) => grid::run_queue_tt(&train, test, &mut tasks, &cancel)?,
        None => grid::run_queue_cv(&train, &mut tasks, &mut rng, &cancel)?,
    }

    report(&tasks);

    if cancel.load(Ordering::Relaxed) {
        return Err(gensvm::GenSvmError::Cancelled.into());
    }

    if grid_file.spec.repeats > 0 {
        let outcomes = grid::consistency_repeats(&train, &tasks, grid_file.spec.repeats, &mut rng, &cancel)?;
        let selected = grid::select_consistent(&outcomes);
        for task_id in &selected {
            if let Some(outcome) = outcomes.iter().find(|o| o.task_id == *task_id) {
                println!(
                    "consistent task {}: mean={:.4}% std={:.4}",
                    outcome.task_id, outcome.mean, outcome.std_dev
                );
            }
        }
    }
    Ok(())
}

fn main() -> ExitCode {
    env_logger::init();
    let args = Args::parse();
    match run(args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("gensvm-grid: {}", e);
            ExitCode::FAILURE
        }
    }
}
