//! Echo Bot Example
//!
//! Polls the Rubika Bot API (or serves a webhook) and answers a handful of
//! commands:
//!
//! ```text
//! /start        - Welcome message with a keypad
//! /echo <text>  - Echo text
//! /ping         - Pong!
//! /help         - This help
//! ```
//!
//! Files are acknowledged with their detected type, and messages sent by
//! other bots are ignored by a before-phase listener.
//!
//! # Usage
//!
//! ```bash
//! RUBOT_BOT__TOKEN=... cargo run --package echo-bot
//! cargo run --package echo-bot -- --config rubot.toml --webhook
//! ```

use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;
use rubot::core::SenderType;
use rubot::prelude::*;
use tracing::{error, info};

const HELP_TEXT: &str = "Echo Bot - Commands
/echo <text> - Echo text
/ping        - Pong!
/help        - This help";

#[derive(Debug, Parser)]
#[command(name = "echo-bot", about = "Echo bot for the Rubika Bot API")]
struct Args {
    /// Configuration file (rubot.toml is searched for otherwise).
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Bot token; overrides the configuration.
    #[arg(short, long, env = "RUBIKA_TOKEN")]
    token: Option<String>,

    /// Receive updates on the configured webhook instead of polling.
    #[arg(long)]
    webhook: bool,
}

// ============================================================================
// Handlers
// ============================================================================

async fn on_command(ctx: std::sync::Arc<Context>) -> Result<(), BoxError> {
    let Some(command) = ctx.command() else {
        return Ok(());
    };

    match command.name.as_str() {
        "start" => {
            let keypad = Keypad::new()
                .row([Button::simple("ping", "/ping"), Button::simple("help", "/help")])
                .resize(true);
            ctx.api()
                .send_message(
                    ctx.chat_id(),
                    "Hi! Send me anything and I will echo it.",
                    SendMessageOptions::default().chat_keypad(keypad),
                )
                .await?;
        }
        "echo" if !command.args.is_empty() => {
            ctx.reply(&command.args.join(" ")).await?;
        }
        "ping" => {
            ctx.reply("Pong!").await?;
        }
        "help" => {
            ctx.reply(HELP_TEXT).await?;
        }
        other => info!(command = other, "Ignoring unknown command"),
    }
    Ok(())
}

async fn on_file(ctx: std::sync::Arc<Context>) -> Result<(), BoxError> {
    if let Some(file) = ctx.file() {
        let text = format!(
            "Got {} ({}, {} bytes)",
            file.file_name.as_deref().unwrap_or(&file.file_id),
            file.file_type,
            file.size.unwrap_or_default()
        );
        ctx.reply(&text).await?;
    }
    Ok(())
}

fn from_bot(ctx: &Context) -> bool {
    ctx.message()
        .and_then(|m| m.sender_type)
        .is_some_and(|s| s == SenderType::Bot)
}

fn register_handlers(bot: &Rubot) -> Result<()> {
    bot.use_middleware(from_fn(|ctx: std::sync::Arc<Context>, next| async move {
        info!(chat_id = %ctx.chat_id(), kind = ?ctx.kind(), text = ctx.text(), "Incoming update");
        next.run().await
    }));

    bot.on_before(
        EventKind::NewMessage,
        Listener::gated_sync(|ctx: &Context, next| {
            if from_bot(ctx) {
                return Ok(Flow::Stop);
            }
            Ok(next.proceed())
        }),
    )?;

    bot.on(EventKind::Command, Listener::observer(on_command))?;
    bot.on(EventKind::File, Listener::observer(on_file))?;
    bot.on(
        EventKind::StartedBot,
        Listener::observer(|ctx: std::sync::Arc<Context>| async move {
            ctx.send("Welcome! Send /help to see what I can do.").await?;
            Ok::<(), BoxError>(())
        }),
    )?;
    bot.on(
        EventKind::Error,
        Listener::error(|err, _span| error!(error = %err, "Bot error")),
    )?;
    Ok(())
}

// ============================================================================
// Main Entry Point
// ============================================================================

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let mut builder = Rubot::builder();
    if let Some(path) = &args.config {
        builder = builder.config_file(path);
    }
    if let Some(token) = args.token {
        builder = builder.token(token);
    }
    let bot = builder.build()?;

    register_handlers(&bot)?;

    let me = bot.api().get_me().await?;
    info!(bot = ?me, "Connected");

    if args.webhook {
        bot.run_webhook().await?;
    } else {
        bot.run().await?;
    }

    Ok(())
}
