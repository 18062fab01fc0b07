// ██████╗ ██╗███████╗████████╗██████╗ ███████╗███████╗███████╗
// ██╔══██╗██║██╔════╝╚══██╔══╝██╔══██╗██╔════╝██╔════╝██╔════╝
// ██║  ██║██║███████╗   ██║   ██████╔╝█████╗  ███████╗███████╗
// ██║  ██║██║╚════██║   ██║   ██╔══██╗██╔══╝  ╚════██║╚════██║
// ██████╔╝██║███████║   ██║   ██║  ██║███████╗███████║███████║
// ╚═════╝ ╚═╝╚══════╝   ╚═╝   ╚═╝  ╚═╝╚══════╝╚══════╝╚══════╝
//
// R A D A R
//
// An interactive terminal session around the dialogue orchestrator.
// Plain lines are company names (or questions once a company is chosen);
// slash commands edit and confirm figures, ask, reset, and quit.

use std::io::Write;
use std::sync::Arc;

use anyhow::Result;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::signal;
use tracing::{info, warn};
use tracing_subscriber::{fmt, EnvFilter};

use distress_radar::circuit_breaker::CircuitBreakerSnapshot;
use distress_radar::config::Config;
use distress_radar::dataset::CsvDistressDataset;
use distress_radar::metrics::DialogueMetrics;
use distress_radar::models::FinancialField;
use distress_radar::orchestrator::{Author, Collaborators, DialogueOrchestrator, Step};
use distress_radar::services::assistant::ChatAssistant;
use distress_radar::services::dart::DartClient;
use distress_radar::services::data_store::{DataStoreClient, DataStoreDirectory, DataStoreRatioStore};

fn print_banner() {
    let banner = r#"
    ╔══════════════════════════════════════════════════════════════╗
    ║                                                              ║
    ║              D I S T R E S S    R A D A R                    ║
    ║                                                              ║
    ║   Filings:    DART annual statements                         ║
    ║   Scoring:    five-rule distress scorecard                   ║
    ║   Lookalikes: cosine search over delisted companies          ║
    ║                                                              ║
    ║   Commands:   /set <field> <value>  /confirm  /ask <text>    ║
    ║               /reset  /quit                                  ║
    ║                                                              ║
    ╚══════════════════════════════════════════════════════════════╝
    "#;
    println!("{}", banner);
}

/// One line of user input, interpreted.
#[derive(Debug, PartialEq)]
enum Command {
    Text(String),
    Set(FinancialField, f64),
    Confirm,
    Ask(String),
    Reset,
    Quit,
    Empty,
    Invalid(String),
}

fn parse_command(line: &str) -> Command {
    let line = line.trim();
    if line.is_empty() {
        return Command::Empty;
    }
    let Some(rest) = line.strip_prefix('/') else {
        return Command::Text(line.to_string());
    };

    let (verb, args) = rest
        .split_once(char::is_whitespace)
        .map_or((rest, ""), |(verb, args)| (verb, args.trim()));

    match verb.to_lowercase().as_str() {
        "confirm" => Command::Confirm,
        "reset" => Command::Reset,
        "quit" | "exit" => Command::Quit,
        "ask" if !args.is_empty() => Command::Ask(args.to_string()),
        "ask" => Command::Invalid("usage: /ask <question>".to_string()),
        "set" => {
            let mut parts = args.split_whitespace();
            let (Some(field), Some(value), None) = (parts.next(), parts.next(), parts.next()) else {
                return Command::Invalid("usage: /set <field> <value>".to_string());
            };
            let field = match field.parse::<FinancialField>() {
                Ok(field) => field,
                Err(e) => return Command::Invalid(e),
            };
            match value.replace(',', "").parse::<f64>() {
                Ok(value) if value.is_finite() => Command::Set(field, value),
                _ => Command::Invalid(format!("'{value}' is not a number")),
            }
        }
        other => Command::Invalid(format!("unknown command /{other}")),
    }
}

/// Prints every message appended since the last call.
fn print_new_messages(orchestrator: &DialogueOrchestrator, printed: &mut usize) {
    let messages = &orchestrator.session().messages;
    for message in messages.iter().skip(*printed) {
        if message.author == Author::System {
            println!("\n{}\n", message.text);
        }
    }
    *printed = messages.len();
}

async fn handle(orchestrator: &mut DialogueOrchestrator, command: Command) {
    let outcome = match command {
        Command::Text(text) if orchestrator.step() == Step::CollectingName => {
            orchestrator.submit_company_name(&text).await
        }
        Command::Text(text) | Command::Ask(text) => {
            orchestrator.ask(&text).await;
            Ok(())
        }
        Command::Set(field, value) => orchestrator.update_financial_field(field, value),
        Command::Confirm => {
            let draft = orchestrator.session().aggregates.unwrap_or_default();
            orchestrator.submit_financials(draft).await
        }
        Command::Reset => {
            orchestrator.reset();
            Ok(())
        }
        Command::Invalid(reason) => {
            println!("! {reason}");
            Ok(())
        }
        Command::Empty | Command::Quit => Ok(()),
    };

    if let Err(err) = outcome {
        println!("! {err}");
    }
}

#[tokio::main(flavor = "multi_thread")]
async fn main() -> Result<()> {
    fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_target(true)
        .with_file(true)
        .with_line_number(true)
        .with_writer(std::io::stderr)
        .init();

    print_banner();

    let config = Config::from_env();
    info!(
        data_store = %config.data_store_url,
        dart = %config.dart_base_url,
        model = %config.completion.model,
        dataset = %config.dataset_path.display(),
        "Configuration loaded"
    );
    for (name, key) in [
        ("DISTRESS_RADAR_DATA_STORE_KEY", &config.data_store_key),
        ("DISTRESS_RADAR_DART_KEY", &config.dart_api_key),
        ("DISTRESS_RADAR_ASSISTANT_KEY", &config.assistant_api_key),
    ] {
        if key.is_empty() {
            warn!(variable = name, "API key not set, calls to this service will fail");
        }
    }

    let store = Arc::new(DataStoreClient::new(
        config.data_store_url.clone(),
        config.data_store_key.clone(),
        config.request_timeout,
        config.breaker,
    )?);
    let dart = Arc::new(DartClient::new(
        config.dart_base_url.clone(),
        config.dart_api_key.clone(),
        config.request_timeout,
        config.breaker,
    )?);
    let assistant = Arc::new(ChatAssistant::new(
        config.assistant_url.clone(),
        config.assistant_api_key.clone(),
        config.completion.clone(),
        config.request_timeout,
        config.breaker,
    )?);

    let services = Collaborators {
        directory: Arc::new(DataStoreDirectory::new(store.clone(), config.directory_table.clone())),
        filings: dart.clone(),
        ratios: Arc::new(DataStoreRatioStore::new(store.clone(), config.ratio_table.clone())),
        dataset: Arc::new(CsvDistressDataset::new(config.dataset_path.clone())),
        assistant: assistant.clone(),
    };
    let metrics = Arc::new(DialogueMetrics::new());
    let mut orchestrator = DialogueOrchestrator::new(services, config.dialogue_settings(), metrics.clone());

    let mut printed = 0;
    print_new_messages(&orchestrator, &mut printed);

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        print!("[{}] > ", orchestrator.step());
        std::io::stdout().flush()?;

        let line = tokio::select! {
            line = lines.next_line() => line?,
            _ = signal::ctrl_c() => {
                info!("Ctrl-C received, closing the session");
                break;
            }
        };
        let Some(line) = line else {
            break;
        };

        let command = parse_command(&line);
        if command == Command::Quit {
            break;
        }
        handle(&mut orchestrator, command).await;
        print_new_messages(&orchestrator, &mut printed);
    }

    let breakers: Vec<CircuitBreakerSnapshot> = vec![
        store.breaker().snapshot(),
        dart.breaker().snapshot(),
        assistant.breaker().snapshot(),
    ];
    info!(
        metrics = %serde_json::to_string(&metrics.snapshot())?,
        breakers = %serde_json::to_string(&breakers)?,
        "Session closed"
    );
    Ok(())
}
