use anyhow::Result;
use bpcscore::Config;
use clap::Parser;
use std::path::PathBuf;
use tokio::io::BufWriter;

/// Computes bits per character entropy for strings.
#[derive(Parser, Debug)]
#[command(name = "bpcscore", version)]
struct Args {
    /// Input file path
    #[arg(long)]
    corpus: PathBuf,

    /// Input LM FST path
    #[arg(long)]
    lm: PathBuf,

    /// Token type, or path to symbol table
    #[arg(long = "token_type", alias = "token-type", default_value = "byte")]
    token_type: String,

    /// Number of lines scored in parallel (default: available cores)
    #[arg(long)]
    jobs: Option<usize>,
}

impl Args {
    fn into_config(self) -> Config {
        let jobs = self.jobs.unwrap_or_else(|| {
            std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(1)
        });
        Config {
            corpus: self.corpus,
            lm: self.lm,
            token_type: self.token_type,
            jobs: jobs.max(1),
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let config = Args::parse().into_config();
    let mut out = BufWriter::new(tokio::io::stdout());
    bpcscore::run(&config, &mut out).await?;
    Ok(())
}
