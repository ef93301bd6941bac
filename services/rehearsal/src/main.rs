use anyhow::{Context, Result, bail};
use clap::Parser;
use rehearsal_core::Intent;
use rehearsal_core::evaluator::{OfflineEvaluator, SharedEvaluator};
use rehearsal_core::interview_api::{ApiConfig, InterviewApiClient};
use rehearsal_core::runner::{Ports, SessionRunner};
use rehearsal_core::session::Status;
use rehearsal_service::config::Config;
use rehearsal_service::console::{self, ConsoleSpeechInput, ConsoleSpeechOutput};
use rehearsal_service::question_loader::load_question_blob;
use secrecy::ExposeSecret;
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::fmt::time::ChronoLocal;

#[derive(Parser)]
#[command(version, about = "Rehearse interview questions for a job application")]
struct Cli {
    /// The application to rehearse for
    application_id: String,
    /// A pre-generated question file, one question per line
    #[arg(long, value_name = "FILE")]
    questions: Option<PathBuf>,
    /// Score answers locally instead of asking the interview backend
    #[arg(long, requires = "questions")]
    offline: bool,
    /// Print the final session snapshot as JSON
    #[arg(long)]
    json: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    // --- 1. Load Configuration ---
    let config = Config::from_env().context("Failed to load application configuration")?;

    // --- 2. Initialize Logging ---
    tracing_subscriber::fmt()
        .with_max_level(config.log_level)
        .with_timer(ChronoLocal::rfc_3339())
        .with_writer(std::io::stderr)
        .init();

    tracing::info!("Configuration loaded successfully. Starting rehearsal service...");

    // --- 3. Parse Command-Line Arguments ---
    let args = Cli::parse();

    let blob = match &args.questions {
        Some(path) => Some(load_question_blob(path).context("Failed to load questions")?),
        None => None,
    };

    // --- 4. Initialize API Clients ---
    let mut api_config = ApiConfig::builder().with_base_url(&config.api_base_url);
    if let Some(token) = &config.api_token {
        api_config = api_config.with_token(token.expose_secret());
    }
    let client = Arc::new(
        InterviewApiClient::new(api_config.build()).context("Failed to create interview API client")?,
    );
    let evaluator: SharedEvaluator = if args.offline {
        tracing::info!("Scoring answers offline");
        Arc::new(OfflineEvaluator)
    } else {
        client.clone()
    };

    // --- 5. Wire the console front end ---
    let input = Arc::new(ConsoleSpeechInput::new());
    let ports = Ports {
        speech_output: Arc::new(ConsoleSpeechOutput::new(config.word_delay)),
        speech_input: input.clone(),
        evaluator,
        starter: client,
    };
    let runner = SessionRunner::new(args.application_id.clone(), blob, ports);
    let presenter = tokio::spawn(console::present(
        runner.snapshot(),
        runner.subscribe_transitions(),
    ));

    let (intent_tx, intent_rx) = tokio::sync::mpsc::channel::<Intent>(32);
    // The router owns the only strong sender, so end of input closes the session.
    let interrupt_tx = intent_tx.downgrade();
    tokio::spawn(console::route_lines(
        console::spawn_stdin_reader(),
        input,
        intent_tx,
    ));
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("Ctrl-C received, closing the session");
            if let Some(tx) = interrupt_tx.upgrade() {
                let _ = tx.send(Intent::Close).await;
            }
        }
    });

    // --- 6. Run the session ---
    let last = runner.run(intent_rx).await;
    if let Err(e) = presenter.await {
        tracing::warn!("Presenter task failed: {:?}", e);
    }

    if args.json {
        let summary =
            serde_json::to_string_pretty(&last).context("Failed to serialize the session summary")?;
        println!("{}", summary);
    }

    if last.status == Status::FatalError {
        bail!(
            "{}",
            last.last_error
                .unwrap_or_else(|| "The rehearsal session failed.".to_string())
        );
    }
    Ok(())
}
