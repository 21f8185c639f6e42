//! # nyaya
//!
//! Terminal client for the Constitutional Bench: submits a procurement case
//! for review, follows the bench's progress live, prints the verdict, and
//! lets the reviewer question the bench afterwards.

#![deny(unsafe_code)]

mod config;
mod render;

use std::io::Write as _;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use nyaya_core::{CaseRecord, ParticipantId, RosterVariant};
use nyaya_service::{CrossExamination, SampleKind, ServiceClient};
use nyaya_session::{projection, ReviewDesk, ReviewOutcome, ReviewRunner, Session, SessionController, WsConnector};
use nyaya_telemetry::{init_telemetry, JournalQuery, TelemetryConfig, TelemetryGuard};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::Level;

use crate::config::AppConfig;

#[derive(Parser, Debug)]
#[command(name = "nyaya", about = "Put procurement cases before the Constitutional Bench")]
struct Cli {
    /// Log at info level instead of warn.
    #[arg(long, short, global = true)]
    verbose: bool,

    /// Emit logs on stderr as JSON lines.
    #[arg(long, global = true)]
    json_logs: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Review a case live against the reviewing service.
    Review(ReviewArgs),
    /// Fold a recorded frame transcript (one JSON frame per line) through a
    /// session without a network and print the result.
    Replay {
        /// Case record the transcript belongs to.
        #[arg(long)]
        case: PathBuf,
        transcript: PathBuf,
        #[arg(long)]
        roster: Option<RosterVariant>,
    },
    /// List journaled protocol anomalies and transport failures, newest
    /// first, followed by a count per kind.
    Anomalies(AnomalyArgs),
    /// Check that the reviewing service is up.
    Health {
        #[arg(long)]
        service_url: Option<String>,
    },
}

#[derive(Args, Debug)]
struct ReviewArgs {
    #[command(flatten)]
    source: CaseSource,

    /// standard (4 participants) or extended (adds social justice).
    #[arg(long)]
    roster: Option<RosterVariant>,

    #[arg(long)]
    service_url: Option<String>,

    /// After the verdict, read questions for the bench from stdin.
    #[arg(long)]
    cross_examine: bool,
}

#[derive(Args, Debug)]
struct AnomalyArgs {
    #[arg(long)]
    session: Option<String>,
    /// Only anomalies raised about this participant (e.g. equity).
    #[arg(long)]
    participant: Option<ParticipantId>,
    /// protocol, hangup, connect, receive, service_error, review_failed, ...
    #[arg(long)]
    kind: Option<String>,
    #[arg(long, default_value_t = 20)]
    limit: u32,
}

#[derive(Args, Debug)]
#[group(required = true, multiple = false)]
struct CaseSource {
    /// One of the service's canned cases: violation or compliant.
    #[arg(long)]
    sample: Option<SampleKind>,

    /// A case record as JSON.
    #[arg(long)]
    case: Option<PathBuf>,

    /// Raw tender text for the service to extract a case from.
    #[arg(long)]
    paste: Option<PathBuf>,
}

fn main() -> Result<ExitCode> {
    let cli = Cli::parse();
    let config = AppConfig::from_env()?;

    let telemetry = init_telemetry(TelemetryConfig {
        log_level: if cli.verbose { Level::INFO } else { Level::WARN },
        json_output: cli.json_logs,
        journal_path: Some(config.journal_path()),
    });

    // One session at a time, processed frame by frame.
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("failed to build the async runtime")?;
    runtime.block_on(run(cli.command, config, &telemetry))
}

async fn run(command: Command, mut config: AppConfig, telemetry: &TelemetryGuard) -> Result<ExitCode> {
    match command {
        Command::Review(args) => {
            if let Some(url) = args.service_url.clone() {
                config.service_url = url;
            }
            if let Some(roster) = args.roster {
                config.roster = roster;
            }
            review(args, &config).await
        }
        Command::Replay {
            case,
            transcript,
            roster,
        } => {
            if let Some(roster) = roster {
                config.roster = roster;
            }
            replay(&case, &transcript, &config)
        }
        Command::Anomalies(args) => anomalies(telemetry, args),
        Command::Health { service_url } => {
            if let Some(url) = service_url {
                config.service_url = url;
            }
            health(&config).await
        }
    }
}

async fn review(args: ReviewArgs, config: &AppConfig) -> Result<ExitCode> {
    let service = ServiceClient::new(&config.service_config())?;
    let case = intake(&service, &args.source).await?;
    print!("{}", render::case_header(&case));

    let connector = WsConnector::new(config.ws_endpoint()?);
    let runner = Arc::new(ReviewRunner::new(Arc::new(connector), config.roster()));
    let mut desk = ReviewDesk::new(runner);
    let mut updates = desk.start(case).await;

    let mut last_line = String::new();
    loop {
        tokio::select! {
            changed = updates.changed() => {
                if changed.is_err() {
                    break;
                }
                let line = render::progress_line(&projection::view(&updates.borrow_and_update()));
                if line != last_line {
                    println!("{line}");
                    last_line = line;
                }
            }
            _ = tokio::signal::ctrl_c() => {
                desk.abandon().await;
                eprintln!("Review abandoned.");
                return Ok(ExitCode::from(130));
            }
        }
    }

    let Some(outcome) = desk.wait().await else {
        bail!("review task ended unexpectedly");
    };
    let Some(session) = outcome.session() else {
        return Ok(ExitCode::FAILURE);
    };
    println!("\n{}", render::report(&projection::view(session)));

    match &outcome {
        ReviewOutcome::Completed(session) => {
            if args.cross_examine {
                cross_examine(&service, session).await?;
            }
            Ok(ExitCode::SUCCESS)
        }
        _ => Ok(ExitCode::FAILURE),
    }
}

async fn intake(service: &ServiceClient, source: &CaseSource) -> Result<CaseRecord> {
    if let Some(kind) = source.sample {
        return service
            .sample_case(kind)
            .await
            .with_context(|| format!("could not fetch the {kind} sample case"));
    }
    if let Some(path) = &source.case {
        return read_case(path);
    }
    if let Some(path) = &source.paste {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        return service
            .extract_case(&text)
            .await
            .context("could not extract structured data from the pasted text");
    }
    bail!("no case source given")
}

fn read_case(path: &Path) -> Result<CaseRecord> {
    let json = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    CaseRecord::from_json(&json).with_context(|| format!("{} is not a reviewable case", path.display()))
}

async fn cross_examine(service: &ServiceClient, session: &Session) -> Result<()> {
    let record = session
        .analysis_record()
        .context("the session has no verdict to examine")?;
    let mut examination = CrossExamination::new(session.case().clone(), record);

    println!("You may now question the reasoning of the Bench (empty line to finish).");
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        print!("> ");
        std::io::stdout().flush()?;
        let Some(line) = lines.next_line().await? else {
            break;
        };
        if line.trim().is_empty() {
            break;
        }
        if let Some(answer) = examination.ask(service, &line).await {
            println!("Bench: {answer}\n");
        }
    }
    Ok(())
}

fn replay(case_path: &Path, transcript_path: &Path, config: &AppConfig) -> Result<ExitCode> {
    let case = read_case(case_path)?;
    let transcript = std::fs::read_to_string(transcript_path)
        .with_context(|| format!("failed to read {}", transcript_path.display()))?;

    let mut controller = SessionController::new(case, config.roster());
    controller.start()?;
    // No connection: the case frame is not sent anywhere.
    controller.on_connected()?;
    for frame in transcript.lines().filter(|l| !l.trim().is_empty()) {
        controller.on_frame(frame);
        if controller.phase().is_terminal() {
            break;
        }
    }
    // The transcript ending is the stream ending.
    controller.on_transport_closed();

    let session = controller.into_session();
    print!("{}", render::case_header(session.case()));
    println!("\n{}", render::report(&projection::view(&session)));
    if !session.anomalies().is_empty() {
        println!("{} protocol anomaly(ies) absorbed:", session.anomalies().len());
        for anomaly in session.anomalies() {
            println!("  - {}", anomaly.detail);
        }
    }
    Ok(match session.verdict() {
        Some(_) => ExitCode::SUCCESS,
        None => ExitCode::FAILURE,
    })
}

fn anomalies(telemetry: &TelemetryGuard, args: AnomalyArgs) -> Result<ExitCode> {
    let journal = telemetry
        .journal()
        .context("the anomaly journal is unavailable")?;
    let query = JournalQuery {
        session_id: args.session,
        participant: args.participant.map(|p| p.key().to_string()),
        kind: args.kind,
        limit: Some(args.limit),
    };
    let entries = journal.entries(&query)?;
    if entries.is_empty() {
        println!("No anomalies recorded.");
        return Ok(ExitCode::SUCCESS);
    }
    for entry in &entries {
        println!("{}", render::journal_entry(entry));
    }
    println!("\n{}", render::tally(&journal.tally(&query)?));
    Ok(ExitCode::SUCCESS)
}

async fn health(config: &AppConfig) -> Result<ExitCode> {
    let service = ServiceClient::new(&config.service_config())?;
    let health = service
        .health()
        .await
        .with_context(|| format!("{} is unreachable", config.service_url))?;
    println!("{}: {} (llm: {})", config.service_url, health.status, health.llm);
    Ok(if health.is_healthy() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}
