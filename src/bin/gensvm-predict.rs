//! `gensvm-predict`: apply a fitted model to a dataset and report (or
//! write) the predicted labels.

use std::process::ExitCode;

use clap::Parser;

use gensvm::data::Dataset;
use gensvm::{io, predict};

#[derive(Parser)]
#[clap(name = "gensvm-predict", about = "Predict labels for a dataset using a fitted model")]
struct Args {
    /// Path to the dataset to predict on.
    dataset: String,

    /// Path to a model file produced by `gensvm-train`.
    model: String,

    /// Optional predictions file path; printed to stdout if omitted.
    #[clap(short = 'o', long)]
    out: Option<String>,
}

fn run(args: Args) -> anyhow::Result<()> {
    let data: Dataset = io::read_dataset(&args.dataset)?;
    let model_file = io::read_model_file(&args.model)?;

    let predicted = predict::predict_labels(&data, &model_file.v, model_file.k);

    if let Some(y) = &data.y {
        let perf = predict::prediction_perf(y, &predicted);
        println!("hitrate = {:.4}%", perf);
    }

    match &args.out {
        Some(path) => io::write_predictions(path, &data, &predicted)?,
        None => {
            for label in &predicted {
                println!("{}", label);
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
            eprintln!("gensvm-predict: {}", e);
            ExitCode::FAILURE
        }
    }
}
