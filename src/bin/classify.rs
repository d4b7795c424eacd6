//! Online binary classification over LIBSVM-format sparse data.
//!
//! Trains one of the top-k feature estimators and prints a JSON report
//! (echoed parameters, timings, error rates, and the top-k feature
//! weights) on stdout. Progress and diagnostics go to stderr.

use std::path::PathBuf;
use std::time::{Instant, SystemTime, UNIX_EPOCH};

use clap::error::ErrorKind;
use clap::Parser;
use serde_json::json;
use tracing::info;
use tracing_subscriber::EnvFilter;

use featherweight::dataset::{read_libsvm, SparseDataset};
use featherweight::run::{evaluate, train, TrainOptions};
use featherweight::{Estimator, EstimatorConfig, Method};

#[derive(Parser)]
#[command(
    name = "classify",
    about = "Streaming top-k feature discovery for online binary classification"
)]
struct Cli {
    /// Training data in LIBSVM format.
    #[arg(long)]
    train: PathBuf,

    /// Test data in LIBSVM format.
    #[arg(long)]
    test: Option<PathBuf>,

    /// Estimation method.
    #[arg(short, long, value_enum, default_value = "activeset_logistic")]
    method: Method,

    /// Base-2 logarithm of sketch width.
    #[arg(short = 'w', long = "log2_width", default_value_t = 10)]
    log2_width: u32,

    /// Sketch depth.
    #[arg(short, long, default_value_t = 1)]
    depth: u32,

    /// Random seed (defaults to system time).
    #[arg(short, long)]
    seed: Option<i64>,

    /// Number of training epochs.
    #[arg(short, long, default_value_t = 1)]
    epochs: u32,

    /// Number of steps in each epoch (0 ⇒ dataset size when sampling).
    #[arg(short = 'T', long, default_value_t = 0)]
    iters: u32,

    /// Number of high-magnitude weights to estimate (0 ⇒ feature dim).
    #[arg(short = 'k', long, default_value_t = 512)]
    topk: u32,

    /// Initial learning rate.
    #[arg(long = "lr_init", default_value_t = 0.1)]
    lr_init: f32,

    /// L2 regularization parameter.
    #[arg(long = "l2_reg", default_value_t = 1e-6)]
    l2_reg: f32,

    /// Laplace smoothing for the counter-based baselines.
    #[arg(long = "count_smooth", default_value_t = 1.0)]
    count_smooth: f32,

    /// Exponent for the probabilistic truncation method (higher ⇒ less
    /// likely to retain low-weight features).
    #[arg(long, default_value_t = 1.0)]
    pow: f32,

    /// Use median weight estimates in the forward pass instead of the
    /// random-projection (mean) update.
    #[arg(long = "median_update")]
    median_update: bool,

    /// Conservative-update heuristic for Count-Min sketches.
    #[arg(long = "consv_update")]
    consv_update: bool,

    /// Train without a bias term.
    #[arg(long = "no_bias")]
    no_bias: bool,

    /// Sample training examples with replacement instead of a linear pass.
    #[arg(long)]
    sample: bool,
}

fn parse_cli() -> Cli {
    match Cli::try_parse() {
        Ok(cli) => cli,
        Err(err)
            if matches!(
                err.kind(),
                ErrorKind::DisplayHelp | ErrorKind::DisplayVersion
            ) =>
        {
            print!("{err}");
            std::process::exit(0);
        }
        Err(err) => {
            eprint!("{err}");
            std::process::exit(1);
        }
    }
}

fn run(cli: Cli) -> featherweight::Result<()> {
    let seed = cli.seed.unwrap_or_else(|| {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as i64)
            .unwrap_or(0)
    });
    let seed = seed as u64;

    let start = Instant::now();
    let mut train_dataset = read_libsvm(&cli.train)?;
    info!(
        path = %cli.train.display(),
        ms = start.elapsed().as_millis() as u64,
        examples = train_dataset.num_examples(),
        feature_dim = train_dataset.feature_dim,
        "read training data"
    );

    let mut test_dataset = SparseDataset::from_examples(Vec::new());
    if let Some(path) = &cli.test {
        let start = Instant::now();
        test_dataset = read_libsvm(path)?;
        info!(
            path = %path.display(),
            ms = start.elapsed().as_millis() as u64,
            examples = test_dataset.num_examples(),
            "read test data"
        );
    }

    let k = if cli.topk == 0 {
        train_dataset.feature_dim
    } else {
        cli.topk
    };

    // Sketch-backed methods hash with an offset seed so the sketch tables
    // and the training-order sampler draw independent streams.
    let est_seed = match cli.method {
        Method::Logistic | Method::TruncatedLogistic | Method::ProbtruncatedLogistic => seed,
        _ => seed.wrapping_add(1),
    };

    let config = EstimatorConfig {
        k,
        dim: train_dataset.feature_dim,
        log2_width: cli.log2_width,
        depth: cli.depth,
        seed: est_seed,
        lr_init: cli.lr_init,
        l2_reg: cli.l2_reg,
        count_smooth: cli.count_smooth,
        pow: cli.pow,
        median_update: cli.median_update,
        consv_update: cli.consv_update,
        no_bias: cli.no_bias,
    };

    let params = json!({
        "method": cli.method,
        "train_path": cli.train,
        "test_path": cli.test,
        "log2_width": cli.log2_width,
        "depth": cli.depth,
        "sketch_size": cli.depth as u64 * (1u64 << cli.log2_width),
        "seed": seed,
        "epochs": cli.epochs,
        "iters": cli.iters,
        "topk": k,
        "lr_init": cli.lr_init,
        "l2_reg": cli.l2_reg,
        "count_smooth": cli.count_smooth,
        "median_update": cli.median_update,
        "consv_update": cli.consv_update,
        "no_bias": cli.no_bias,
        "num_examples": train_dataset.num_examples(),
        "feature_dim": train_dataset.feature_dim,
        "pow": cli.pow,
        "sample": cli.sample,
    });
    eprintln!("{params:#}");

    let mut model = Estimator::new(cli.method, &config)?;

    let train_stats = train(
        &mut model,
        &mut train_dataset,
        &TrainOptions {
            epochs: cli.epochs,
            iters: cli.iters,
            seed,
            sample: cli.sample,
        },
    );

    let test_stats = evaluate(&mut model, &test_dataset);

    let top = model.top_k();
    let top_indices: Vec<u32> = top.iter().map(|&(k, _)| k).collect();
    let top_weights: Vec<f32> = top.iter().map(|&(_, w)| w).collect();

    let results = json!({
        "train_ms": train_stats.runtime_ms,
        "train_err_count": train_stats.err_count,
        "train_count": train_stats.count,
        "train_err_rate": train_stats.err_rate(),
        "bias": model.bias(),
        "test_ms": test_stats.runtime_ms,
        "test_precision": test_stats.precision,
        "test_recall": test_stats.recall,
        "test_f1": test_stats.f1(),
        "top_indices": top_indices,
        "top_weights": top_weights,
    });

    let output = json!({ "params": params, "results": results });
    println!("{output}");
    Ok(())
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let cli = parse_cli();
    if let Err(err) = run(cli) {
        eprintln!("error: {err}");
        std::process::exit(1);
    }
}
