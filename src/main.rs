//! parity - run the same SQL against two data sources and compare.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::sync::Arc;

use db_parity::cli::{Cli, OutputFormat};
use db_parity::compare::{BatchDriver, BatchSummary, Comparator, DualRunner};
use db_parity::config::{CompareConfig, Config, SourceConfig};
use db_parity::connection::ConnectionProvider;
use db_parity::db::{ClientOptions, DEFAULT_MAX_CONNECTIONS};
use db_parity::error::{ParityError, Result};
use db_parity::logging;
use db_parity::report::{JsonReporter, TextReporter};
use db_parity::statements::read_statements;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

/// Every statement was consistent.
const EXIT_CONSISTENT: i32 = 0;
/// The run itself failed.
const EXIT_ERROR: i32 = 1;
/// At least one inconsistency was reported.
const EXIT_INCONSISTENT: i32 = 2;

#[tokio::main]
async fn main() {
    // Sources may be given through PARITY_SOURCE_A / PARITY_SOURCE_B in .env
    let _ = dotenvy::dotenv();

    let cli = Cli::parse_args();
    logging::init_stderr_logging(cli.verbose);

    let code = match run(&cli).await {
        Ok(summary) if summary.is_consistent() => EXIT_CONSISTENT,
        Ok(summary) => {
            warn!("{} inconsistent statement(s)", summary.inconsistent);
            EXIT_INCONSISTENT
        }
        Err(e) => {
            error!("{}: {}", e.category(), e);
            EXIT_ERROR
        }
    };
    std::process::exit(code);
}

async fn run(cli: &Cli) -> Result<BatchSummary> {
    let config_path = cli.config_path();
    info!("Loading config from: {}", config_path.display());
    let config = Config::load_from_file(&config_path)?;

    // CLI flags > config file > defaults
    let compare = cli.apply_to(config.compare.clone());
    let source_a = config.resolve_source(&cli.source_a)?;
    let source_b = config.resolve_source(&cli.source_b)?;
    info!("Source A: {}", source_a.display_string());
    info!("Source B: {}", source_b.display_string());

    let statements = read_statements(cli.input_path().as_deref())?;
    info!("Loaded {} statement(s)", statements.len());

    let provider = ConnectionProvider::new(client_options(cli, None, &compare));
    let result = compare_sources(cli, &provider, &source_a, &source_b, &compare, &statements).await;

    if let Err(e) = provider.close_all().await {
        warn!("Failed to close connections: {}", e);
    }
    result
}

async fn compare_sources(
    cli: &Cli,
    provider: &ConnectionProvider,
    source_a: &SourceConfig,
    source_b: &SourceConfig,
    compare: &CompareConfig,
    statements: &[String],
) -> Result<BatchSummary> {
    let a = provider
        .get_with(&source_a.url, &client_options(cli, Some(source_a), compare))
        .await?;
    let b = provider
        .get_with(&source_b.url, &client_options(cli, Some(source_b), compare))
        .await?;

    let runner = DualRunner::new(a, b).with_classifier(Arc::from(compare.classifier.build()));
    let driver = BatchDriver::new(
        runner,
        Comparator::new(compare.mode, compare.failure_policy),
    );

    let cancel = CancellationToken::new();
    let interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted, cancelling the comparison");
            interrupt.cancel();
        }
    });

    let out = open_output(cli)?;
    match cli.format {
        OutputFormat::Text => {
            let mut reporter = TextReporter::new(out);
            driver.run_cancellable(statements, &mut reporter, &cancel).await
        }
        OutputFormat::Json => {
            let mut reporter = JsonReporter::new(out);
            driver.run_cancellable(statements, &mut reporter, &cancel).await
        }
    }
}

/// Pool options for one source. The CLI pool size wins over the source's.
fn client_options(
    cli: &Cli,
    source: Option<&SourceConfig>,
    compare: &CompareConfig,
) -> ClientOptions {
    ClientOptions {
        max_connections: cli
            .max_connections
            .or_else(|| source.and_then(|s| s.max_connections))
            .unwrap_or(DEFAULT_MAX_CONNECTIONS),
        max_rows: compare.max_rows,
    }
}

fn open_output(cli: &Cli) -> Result<Box<dyn Write>> {
    match &cli.output_file {
        Some(path) => {
            let file = File::create(path).map_err(|e| {
                ParityError::report(format!("Failed to create {}: {e}", path.display()))
            })?;
            Ok(Box::new(BufWriter::new(file)))
        }
        None => Ok(Box::new(std::io::stdout())),
    }
}
