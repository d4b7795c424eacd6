//! Streaming pointwise mutual information estimation over text.
//!
//! Feeds whitespace-delimited tokens (lowercased; one sentence per line)
//! through the streaming SGNS trainer and prints the token pairs with the
//! highest estimated PMI as a JSON report on stdout.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::PathBuf;
use std::time::{Instant, SystemTime, UNIX_EPOCH};

use clap::error::ErrorKind;
use clap::Parser;
use serde_json::json;
use tracing::info;
use tracing_subscriber::EnvFilter;

use featherweight::{Error, SgnsConfig, StreamingSgns};

#[derive(Parser)]
#[command(
    name = "pmi",
    about = "Streaming PMI estimation with a sketched skip-gram model"
)]
struct Cli {
    /// Whitespace-delimited list of input text paths.
    #[arg(long)]
    data: String,

    /// Base-2 logarithm of sketch width.
    #[arg(short = 'w', long = "log2_width", default_value_t = 12)]
    log2_width: u32,

    /// Sketch depth.
    #[arg(short, long, default_value_t = 1)]
    depth: u32,

    /// Negative samples per positive pair.
    #[arg(long = "neg_samples", default_value_t = 5)]
    neg_samples: u32,

    /// Context window size.
    #[arg(long = "window_size", default_value_t = 5)]
    window_size: u32,

    /// Unigram reservoir size.
    #[arg(long = "reservoir_size", default_value_t = 4000)]
    reservoir_size: u32,

    /// Random seed (defaults to system time).
    #[arg(short, long)]
    seed: Option<i64>,

    /// Number of high-magnitude PMI pairs to track.
    #[arg(short = 'k', long, default_value_t = 1024)]
    topk: u32,

    /// Initial learning rate.
    #[arg(long = "lr_init", default_value_t = 0.1)]
    lr_init: f32,

    /// L2 regularization parameter.
    #[arg(long = "l2_reg", default_value_t = 1e-7)]
    l2_reg: f32,
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

    let config = SgnsConfig {
        k: cli.topk,
        log2_width: cli.log2_width,
        depth: cli.depth,
        neg_samples: cli.neg_samples,
        window_size: cli.window_size,
        reservoir_size: cli.reservoir_size,
        seed: seed as u64,
        lr_init: cli.lr_init,
        l2_reg: cli.l2_reg,
    };

    let mut params = serde_json::to_value(&config).unwrap_or_default();
    params["data"] = json!(cli.data);
    eprintln!("{params:#}");

    let mut sgns = StreamingSgns::new(&config)?;

    let start = Instant::now();
    let mut num_tokens = 0u64;

    // Each line is a sentence: the window flushes at end of line so pairs
    // never straddle a sentence boundary.
    for path in cli.data.split_whitespace() {
        let file = File::open(path).map_err(|source| Error::Io {
            path: PathBuf::from(path),
            source,
        })?;
        for line in BufReader::new(file).lines() {
            let line = line.map_err(|source| Error::Io {
                path: PathBuf::from(path),
                source,
            })?;
            for token in line.split_whitespace() {
                sgns.update(&token.to_lowercase());
                num_tokens += 1;
            }
            sgns.flush();
        }
        info!(path, num_tokens, "processed input file");
    }

    let train_ms = start.elapsed().as_millis() as u64;

    // Pairs with negative PMI estimates are noise under the SGNS
    // objective; suppress them from the report.
    let mut tokens = Vec::new();
    let mut weights = Vec::new();
    for ((a, b), w) in sgns.top_k() {
        if w < 0.0 {
            continue;
        }
        tokens.push(json!([a, b]));
        weights.push(w);
    }

    let results = json!({
        "train_ms": train_ms,
        "num_tokens": num_tokens,
        "tokens": tokens,
        "weights": weights,
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
