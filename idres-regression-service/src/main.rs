use clap::Parser;
use idres_service::dto::RunConfig;
use idres_service::error::ServiceError;
use idres_service::pipeline::run_regression_export;
use idres_service::response::make_report_payload;
use serde_json::Value;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "idres-regression-service")]
#[command(about = "Write labeled matcher scores for fitting compound matcher weights")]
struct Cli {
    /// Run configuration (JSON)
    #[arg(long, short = 'c')]
    config: PathBuf,

    /// Where to write the training CSV, overriding the configuration
    #[arg(long, short = 'o')]
    output: Option<PathBuf>,

    /// Seed for the negative sampling, overriding the configuration
    #[arg(long)]
    seed: Option<u64>,
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let payload = make_report_payload(export(&cli));
    let code = payload.status_code.code();
    match serde_json::to_string_pretty(&payload) {
        Ok(json) => println!("{}", json),
        Err(err) => tracing::error!("could not serialize report: {}", err),
    }
    ExitCode::from(code)
}

fn export(cli: &Cli) -> Result<Value, ServiceError> {
    let mut config = RunConfig::from_file(&cli.config)?;
    if let Some(output) = &cli.output {
        config.regression_output = Some(output.clone());
    }
    if cli.seed.is_some() {
        config.seed = cli.seed;
    }
    run_regression_export(&config)
}
