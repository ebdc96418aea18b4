use std::path::PathBuf;
use std::time::Duration;

use authgate_session::config::{self, GatewayConfig};
use authgate_session::observability::init_observability;
use authgate_session::{AesGcmCipher, FieldCipher, RequestContext, SessionCodec, build_provider};
use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(name = "authgate-session")]
#[command(about = "Inspect, verify and refresh authentication gateway sessions", long_about = None)]
#[command(version)]
struct Args {
    /// Configuration file path
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Enable JSON logging output
    #[arg(long)]
    json_logs: bool,

    /// Deadline for provider calls in seconds
    #[arg(long, default_value = "30")]
    timeout: u64,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Decode a stored session value and print its summary
    Decode { value: String },
    /// Build a session from a bearer identity token
    Verify { token: String },
    /// Decode a session, refresh it when expired and print the new value
    Refresh { value: String },
    /// Print the provider login URL
    LoginUrl {
        #[arg(long)]
        redirect_uri: String,
        #[arg(long, default_value = "")]
        state: String,
        #[arg(long, default_value = "")]
        nonce: String,
    },
    /// Generate a random cookie secret
    GenerateSecret,
}

fn load(args: &Args) -> anyhow::Result<GatewayConfig> {
    let mut builder = if let Some(ref path) = args.config {
        config::load_config_from_path(path)?
    } else {
        config::load_config()?
    };

    if args.verbose {
        builder = builder.log_level("debug");
    }
    if args.json_logs {
        builder = builder.json_logs(true);
    }

    Ok(builder.build()?)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    if matches!(args.command, Command::GenerateSecret) {
        println!("{}", AesGcmCipher::generate_secret());
        return Ok(());
    }

    let config = load(&args)?;
    init_observability(&config.telemetry)?;

    let cipher = config.cipher()?;
    let cipher_ref = cipher.as_ref().map(|c| c as &dyn FieldCipher);
    let ctx = RequestContext::new().with_timeout(Duration::from_secs(args.timeout));

    match args.command {
        Command::Decode { value } => {
            let session = SessionCodec::decode(&value, cipher_ref)?;
            println!("{session}");
        }
        Command::Verify { token } => {
            let provider = build_provider(&config).await?;
            let session = provider.create_session_from_token(&ctx, &token).await?;
            println!("{session}");
            if !provider.authorize(&session) {
                anyhow::bail!("session is not in an allowed group");
            }
        }
        Command::Refresh { value } => {
            let provider = build_provider(&config).await?;
            let mut session = SessionCodec::decode(&value, cipher_ref)?;
            let refreshed = provider.refresh_session_if_needed(&ctx, &mut session).await?;
            tracing::info!(refreshed, "{session}");
            println!("{}", SessionCodec::encode(&session, cipher_ref)?);
        }
        Command::LoginUrl {
            redirect_uri,
            state,
            nonce,
        } => {
            let provider = build_provider(&config).await?;
            println!("{}", provider.login_url(&redirect_uri, &state, &nonce)?);
        }
        Command::GenerateSecret => {}
    }

    Ok(())
}
