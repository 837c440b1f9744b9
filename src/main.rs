use std::path::Path;
use std::sync::{Arc, Mutex};

use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use tokio::sync::broadcast;
use tracing_subscriber::EnvFilter;

use smsc_broadcast::config::{AppConfig, SmscCredentials};
use smsc_broadcast::db;
use smsc_broadcast::models::SmsMessage;
use smsc_broadcast::services::dispatch::send_and_check;
use smsc_broadcast::services::gateway::fake::FakeGateway;
use smsc_broadcast::services::gateway::smsc::{SmscGateway, SMSC_HOST};
use smsc_broadcast::services::gateway::{map_vendor_status, SmsGateway};
use smsc_broadcast::services::phones::parse_phone_list;
use smsc_broadcast::services::reconciler::StatusReconciler;
use smsc_broadcast::state::{AppState, STATUS_CHANNEL_CAPACITY};

/// Bulk SMS broadcasting backed by smsc.ru
#[derive(Parser)]
#[command(name = "smsc-broadcast")]
#[command(version)]
struct Cli {
    /// Log verbosity (-v warn, -vv info, -vvv debug)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the mailing dashboard
    Serve(ServeArgs),
    /// Send one mailing from the console and print each recipient's status
    Send(SendArgs),
}

#[derive(Args)]
struct ServeArgs {
    /// Path to a file with phone numbers, or the numbers themselves,
    /// separated by ';' or ','
    #[arg(long)]
    phones: String,

    /// Message lifetime in hours (1-24)
    #[arg(long, env = "SMSC_VALID")]
    valid: Option<i64>,

    /// Mailing store location
    #[arg(short, long, env = "DATABASE_URL")]
    db: Option<String>,

    /// Port for the HTTP server
    #[arg(short, long)]
    port: Option<u16>,

    /// Answer from an in-process gateway instead of smsc.ru
    #[arg(long)]
    fake_gateway: bool,
}

#[derive(Args)]
struct SendArgs {
    /// smsc.ru account login
    #[arg(long, env = "SMSC_LOGIN")]
    login: String,

    /// smsc.ru account password
    #[arg(long, env = "SMSC_PSW", hide_env_values = true)]
    psw: String,

    /// Message lifetime in hours (1-24)
    #[arg(long, env = "SMSC_VALID", default_value_t = 1)]
    valid: i64,

    /// Path to a file with phone numbers, or the numbers themselves,
    /// separated by ';' or ','
    #[arg(long)]
    phones: String,

    /// Message text
    #[arg(long)]
    mes: String,

    /// Gateway base URL
    #[arg(long, env = "SMSC_HOST", default_value = SMSC_HOST)]
    host: String,
}

fn log_level(verbose: u8) -> &'static str {
    match verbose {
        0 => "error",
        1 => "warn",
        2 => "info",
        _ => "debug",
    }
}

fn read_phones(arg: &str) -> anyhow::Result<Vec<String>> {
    let raw = if Path::new(arg).is_file() {
        std::fs::read_to_string(arg).with_context(|| format!("failed to read phone list {arg}"))?
    } else {
        arg.to_string()
    };
    Ok(parse_phone_list(&raw)?)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| log_level(cli.verbose).into()),
        )
        .init();

    match cli.command {
        Commands::Serve(args) => serve(args).await,
        Commands::Send(args) => send_once(args).await,
    }
}

async fn send_once(args: SendArgs) -> anyhow::Result<()> {
    let phones = read_phones(&args.phones)?;
    let message = SmsMessage::new(phones, &args.mes, args.valid)?;

    let gateway = SmscGateway::new(
        SmscCredentials {
            login: args.login,
            password: args.psw,
        },
        args.host,
    );

    let report = send_and_check(&gateway, &message)
        .await
        .context("failed to send mailing")?;

    println!(
        "Mailing {} sent to {} phone numbers",
        report.receipt.vendor_id, report.receipt.accepted
    );
    for recipient in &report.recipients {
        match &recipient.code {
            Ok(code) => println!(
                "{}: status {code} ({})",
                recipient.phone,
                map_vendor_status(*code).as_str()
            ),
            Err(e) => println!("{}: status unknown ({e})", recipient.phone),
        }
    }

    Ok(())
}

async fn serve(args: ServeArgs) -> anyhow::Result<()> {
    let mut config = AppConfig::from_env();
    config.phones = read_phones(&args.phones)?;
    if let Some(valid) = args.valid {
        config.valid_hours = valid;
    }
    if let Some(db) = args.db {
        config.database_url = db;
    }
    if let Some(port) = args.port {
        config.port = port;
    }
    config.fake_gateway = args.fake_gateway;

    tracing::info!(phones = config.phones.len(), valid_hours = config.valid_hours, "loaded mailing list");

    let conn = db::init_db(&config.database_url)?;

    let gateway: Arc<dyn SmsGateway> = if config.fake_gateway {
        tracing::warn!("using fake SMS gateway, no messages will be sent");
        Arc::new(FakeGateway::for_store(&conn, 1).context("failed to read stored mailing ids")?)
    } else {
        anyhow::ensure!(
            !config.smsc.login.is_empty() && !config.smsc.password.is_empty(),
            "SMSC_LOGIN and SMSC_PSW must be set"
        );
        tracing::info!("using smsc gateway (host: {})", config.smsc_host);
        Arc::new(SmscGateway::new(config.smsc.clone(), config.smsc_host.clone()))
    };

    let (status_tx, _) = broadcast::channel(STATUS_CHANNEL_CAPACITY);

    let state = Arc::new(AppState {
        db: Arc::new(Mutex::new(conn)),
        config: config.clone(),
        gateway,
        status_tx,
    });

    tokio::spawn(StatusReconciler::from_state(&state).run());

    let app = smsc_broadcast::router(state);

    let addr = config.bind_addr();
    tracing::info!("starting server on {addr}");

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
