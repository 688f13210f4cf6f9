use clap::Parser;
use idres_service::dto::RunConfig;
use idres_service::error::ServiceError;
use idres_service::pipeline::run_matching;
use idres_service::response::make_report_payload;
use serde_json::Value;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "idres-match-service")]
#[command(about = "Match two record collections and score the result against a gold standard")]
struct Cli {
    /// Run configuration (JSON)
    #[arg(long, short = 'c')]
    config: PathBuf,

    /// Where to write the matched pairs, overriding the configuration
    #[arg(long, short = 'o')]
    output: Option<PathBuf>,
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let payload = make_report_payload(process(&cli));
    let code = payload.status_code.code();
    match serde_json::to_string_pretty(&payload) {
        Ok(json) => println!("{}", json),
        Err(err) => tracing::error!("could not serialize report: {}", err),
    }
    ExitCode::from(code)
}

fn process(cli: &Cli) -> Result<Value, ServiceError> {
    let start = std::time::Instant::now();
    let mut config = RunConfig::from_file(&cli.config)?;
    if let Some(output) = &cli.output {
        config.output = Some(output.clone());
    }
    let result = run_matching(&config);
    tracing::info!(
        "Run completed in {:.4} secs",
        start.elapsed().as_secs_f64()
    );
    result
}
