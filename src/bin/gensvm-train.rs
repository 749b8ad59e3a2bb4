//! `gensvm-train`: fit a single GenSVM model on a dataset and write a
//! model file.

use std::process::ExitCode;

use clap::Parser;

use gensvm::data::Dataset;
use gensvm::io::model::ModelFile;
use gensvm::kernel::KernelKind;
use gensvm::model::{Hyperparams, Model, WeightScheme};
use gensvm::{io, solver};

#[derive(Parser)]
#[clap(name = "gensvm-train", about = "Fit a GenSVM model on a labeled dataset")]
struct Args {
    /// Path to the training dataset.
    dataset: String,

    /// Regularization parameter lambda.
    #[clap(short = 'l', long, default_value = "1e-8")]
    lambda: f64,

    /// Loss exponent p, in [1, 2].
    #[clap(short = 'p', long, default_value = "1.0")]
    p: f64,

    /// Huber smoothness kappa.
    #[clap(short = 'k', long, default_value = "0.0")]
    kappa: f64,

    /// Stopping tolerance epsilon.
    #[clap(short = 'e', long, default_value = "1e-6")]
    epsilon: f64,

    /// Instance weighting scheme: 1 = unit, 2 = group-rebalanced.
    #[clap(short = 'r', long, default_value = "1")]
    weight: i32,

    /// Kernel type: LINEAR, POLY, RBF, or SIGMOID.
    #[clap(short = 't', long, default_value = "LINEAR")]
    kerneltype: String,

    /// Kernel gamma (ignored for LINEAR).
    #[clap(short = 'g', long, default_value = "1.0")]
    gamma: f64,

    /// Kernel coef (ignored for LINEAR and RBF).
    #[clap(short = 'c', long, default_value = "0.0")]
    coef: f64,

    /// Kernel polynomial degree (POLY only).
    #[clap(short = 'd', long, default_value = "2.0")]
    degree: f64,

    /// Path to a previous model file to warm-start V from.
    #[clap(short = 'm', long)]
    seed_model: Option<String>,

    /// Output model file path.
    #[clap(short = 'o', long, default_value = "model.gensvm")]
    out: String,

    /// Suppress the stdout progress report.
    #[clap(short = 'q', long)]
    quiet: bool,
}

fn weight_scheme(idx: i32) -> WeightScheme {
    match idx {
        2 => WeightScheme::GroupRebalanced,
        _ => WeightScheme::Unit,
    }
}

fn kernel_from_args(args: &Args) -> anyhow::Result<KernelKind> {
    Ok(match args.kerneltype.to_uppercase().as_str() {
        "LINEAR" => KernelKind::Linear,
        "POLY" => KernelKind::Poly {
            gamma: args.gamma,
            coef: args.coef,
            degree: args.degree,
        },
        "RBF" => KernelKind::Rbf { gamma: args.gamma },
        "SIGMOID" => KernelKind::Sigmoid {
            gamma: args.gamma,
            coef: args.coef,
        },
        other => anyhow::bail!("unknown kernel type `{}`", other),
    })
}

fn run(args: Args) -> anyhow::Result<()> {
    let mut data: Dataset = io::read_dataset(&args.dataset)?;
    let kernel = kernel_from_args(&args)?;
    data.apply_kernel(kernel)?;

    let params = Hyperparams {
        p: args.p,
        lambda: args.lambda,
        kappa: args.kappa,
        epsilon: args.epsilon,
        weights: weight_scheme(args.weight),
    };

    let mut model = Model::allocate(&data, params, kernel);
    if let Some(seed_path) = &args.seed_model {
        let seeded = io::read_model_file(seed_path)?;
        model.seed_from(&seeded.v);
    }

    let iterations = solver::optimize(&mut model, &data.z)?;

    io::write_model_file(
        &args.out,
        &ModelFile {
            params: model.params,
            kernel: model.kernel,
            filename: args.dataset.clone(),
            n: model.n,
            m: model.m,
            k: model.k,
            v: model.v.clone(),
        },
    )?;

    if !args.quiet {
        println!(
            "converged after {} iterations, training_error = {:.8}",
            iterations, model.training_error
        );
        println!("model written to {}", args.out);
    }
    Ok(())
}

fn main() -> ExitCode {
    env_logger::init();
    let args = Args::parse();
    match run(args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("gensvm-train: {}", e);
            ExitCode::FAILURE
        }
    }
}
