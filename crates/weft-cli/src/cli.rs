//! CLI entry and dispatch.

use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result, bail};
use clap::Parser;
use tracing_subscriber::EnvFilter;
use weft_core::cancel::CancelledError;
use weft_core::client::run_chat;
use weft_core::config::Config;
use weft_core::markup::CmarkRenderer;
use weft_core::{AttachmentRef, CancelToken, ChatClient, ChatRequest, HttpTransport, Locale};

#[derive(Parser)]
#[command(name = "weft")]
#[command(version)]
#[command(about = "Stream an agent conversation into rendered HTML")]
struct Cli {
    /// Agent to talk to
    #[arg(value_name = "AGENT_ID")]
    agent_id: String,

    /// User message to send
    #[arg(value_name = "MESSAGE")]
    message: String,

    /// Continue an earlier conversation by its session token
    #[arg(long, value_name = "TOKEN")]
    session: Option<String>,

    /// Attach an uploaded file, as FILENAME:CONTENT_TYPE:KEY (repeatable)
    #[arg(long, value_name = "SPEC")]
    attach: Vec<String>,

    /// Write the rendered HTML here, updated after every frame
    #[arg(long, value_name = "FILE")]
    out: Option<PathBuf>,

    /// Config file path (default: ./weft.toml when present)
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Display language for labels and messages
    #[arg(long, default_value = "en", value_parser = parse_locale)]
    locale: Locale,
}

fn parse_locale(raw: &str) -> Result<Locale, String> {
    match raw {
        "en" => Ok(Locale::En),
        "zh" => Ok(Locale::Zh),
        other => Err(format!("unknown locale '{other}' (expected en or zh)")),
    }
}

fn parse_attachment(spec: &str) -> Result<AttachmentRef> {
    let mut parts = spec.splitn(3, ':');
    match (parts.next(), parts.next(), parts.next()) {
        (Some(filename), Some(content_type), Some(key))
            if !filename.is_empty() && !content_type.is_empty() && !key.is_empty() =>
        {
            Ok(AttachmentRef {
                filename: filename.to_string(),
                content_type: content_type.to_string(),
                key: key.to_string(),
            })
        }
        _ => bail!("invalid --attach '{spec}', expected FILENAME:CONTENT_TYPE:KEY"),
    }
}

fn install_ctrl_c(cancel: CancelToken) -> Result<()> {
    // First Ctrl+C cancels the in-flight request; second force-exits.
    ctrlc::set_handler(move || {
        if cancel.is_cancelled() {
            std::process::exit(130);
        }
        cancel.cancel();
    })
    .context("set Ctrl+C handler")
}

pub fn run() -> Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_env("WEFT_LOG"))
        .with_writer(std::io::stderr)
        .init();

    let rt = tokio::runtime::Runtime::new().context("create tokio runtime")?;
    rt.block_on(dispatch(cli))
}

async fn dispatch(cli: Cli) -> Result<()> {
    let default_config = PathBuf::from("weft.toml");
    let config_path = cli.config.clone().or_else(|| {
        default_config.exists().then_some(default_config)
    });
    let config = Config::load(config_path.as_deref()).context("load config")?;

    let transport = HttpTransport::new(config).context("build transport")?;
    let client = ChatClient::with_locale(transport, CmarkRenderer, cli.locale);

    let attachments = cli
        .attach
        .iter()
        .map(|spec| parse_attachment(spec))
        .collect::<Result<Vec<_>>>()?;

    let request = ChatRequest {
        agent_id: cli.agent_id.clone(),
        message: cli.message.clone(),
        session_token: cli.session.clone(),
        attachments,
    };

    let cancel = CancelToken::new();
    install_ctrl_c(cancel.clone())?;

    let out_path = cli.out.clone();
    let outcome = run_chat(&client, request, &cancel, |html| {
        if let Some(path) = &out_path
            && let Err(err) = fs::write(path, html)
        {
            tracing::warn!(%err, path = %path.display(), "failed to write progress output");
        }
    })
    .await
    .context("stream chat")?;

    if let Some(token) = &outcome.session_token {
        tracing::info!(%token, "session token bound");
        eprintln!("session: {token}");
    }

    let Some(html) = outcome.final_html else {
        return Err(CancelledError.into());
    };
    match &cli.out {
        Some(path) => {
            fs::write(path, &html).with_context(|| format!("write {}", path.display()))?;
        }
        None => println!("{html}"),
    }
    Ok(())
}
