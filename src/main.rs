use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use screenrec::host::Desktop;
use screenrec::media::{DeviceKind, MediaDevices, VideoBlob, MP4_MIME, WEBM_VP9_MIME};
use screenrec::{
    create_router, App, AppState, Config, HeadlessDesktop, NatsClient, SaveOutcome, SyntheticMedia,
    VideoSaver,
};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "screenrec", version, about = "Screen recorder service")]
struct Cli {
    /// Config file, without extension
    #[arg(short, long, default_value = "config/screenrec")]
    config: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the recorder and its HTTP control API
    Serve {
        /// Override the configured port
        #[arg(long)]
        port: Option<u16>,
    },
    /// Convert a capture to another container, keeping the original on failure
    Convert {
        input: PathBuf,
        output: PathBuf,
        #[arg(long)]
        codec: Option<String>,
    },
    /// Print capture sources and microphones as JSON
    Sources,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("screenrec=info,tower_http=info")),
        )
        .init();

    let cli = Cli::parse();
    let cfg = Config::load(&cli.config)?;

    match cli.command {
        Command::Serve { port } => serve(cfg, port).await,
        Command::Convert {
            input,
            output,
            codec,
        } => convert(cfg, input, output, codec).await,
        Command::Sources => sources(cfg).await,
    }
}

async fn serve(cfg: Config, port: Option<u16>) -> Result<()> {
    info!("Screenrec v{}", env!("CARGO_PKG_VERSION"));

    let output_dir = cfg.output_dir();
    std::fs::create_dir_all(&output_dir)
        .with_context(|| format!("Failed to create {}", output_dir.display()))?;
    info!("Recordings will be saved to {}", output_dir.display());

    let media = Arc::new(SyntheticMedia::default());
    let desktop = Arc::new(HeadlessDesktop::new(output_dir).launching_external(true));
    let transcoder = Arc::new(cfg.transcoder());

    let mut app = App::launch(&cfg, media, desktop, transcoder).await?;

    if let Some(url) = &cfg.nats.url {
        match NatsClient::connect(url, cfg.service.name.clone()).await {
            Ok(client) => app.attach_nats(Arc::new(client), cfg.nats.forward_cursor),
            Err(e) => warn!("Continuing without NATS: {:#}", e),
        }
    }

    let state = AppState::from(&app).with_upload_limit_mb(cfg.service.http.max_upload_mb);
    let router = create_router(state);
    let addr = format!("{}:{}", cfg.service.http.bind, port.unwrap_or(cfg.service.http.port));
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    info!("HTTP API listening on {}", addr);

    axum::serve(listener, router)
        .with_graceful_shutdown(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                warn!("Failed to listen for Ctrl-C: {}", e);
            }
        })
        .await
        .context("HTTP server failed")?;

    app.shutdown().await;
    Ok(())
}

async fn convert(cfg: Config, input: PathBuf, output: PathBuf, codec: Option<String>) -> Result<()> {
    let data = tokio::fs::read(&input)
        .await
        .with_context(|| format!("Failed to read {}", input.display()))?;
    let mime_type = match input.extension().and_then(|e| e.to_str()) {
        Some(ext) if ext.eq_ignore_ascii_case("mp4") => MP4_MIME,
        Some(ext) if ext.eq_ignore_ascii_case("mkv") => "video/x-matroska",
        _ => WEBM_VP9_MIME,
    };

    let mut settings = cfg.save_settings();
    if let Some(codec) = codec {
        settings.video_codec = codec;
    }
    let saver = VideoSaver::new(Arc::new(cfg.transcoder()), settings);

    match saver.save(&VideoBlob::new(data, mime_type), &output).await? {
        SaveOutcome::Saved { file_path } => info!("Saved {}", file_path.display()),
        SaveOutcome::ConversionFailed {
            fallback_path,
            error,
        } => warn!("{} ({})", error, fallback_path.display()),
        SaveOutcome::Canceled => {}
    }
    Ok(())
}

async fn sources(cfg: Config) -> Result<()> {
    let desktop = HeadlessDesktop::new(cfg.output_dir());
    let media = SyntheticMedia::default();

    let sources = desktop.capture_sources()?;
    let microphones: Vec<_> = media
        .enumerate_devices()
        .await
        .context("Failed to enumerate devices")?
        .into_iter()
        .filter(|d| d.kind == DeviceKind::AudioInput)
        .collect();

    let listing = serde_json::json!({
        "sources": sources,
        "microphones": microphones,
    });
    println!("{}", serde_json::to_string_pretty(&listing)?);
    Ok(())
}
