//! Send command implementation

use anyhow::{Context, Result};
use clap::Args;
use pigeonhole_core::{Address, Message, SendMessages, SendOutcome};
use serde::Serialize;
use std::io::Read;
use std::path::PathBuf;
use std::time::Duration;

use super::GlobalArgs;

/// Write a message into a queue
#[derive(Args, Debug)]
pub struct SendArgs {
    /// Destination (queue or queue@machine)
    address: Address,

    /// Message id (default: random UUID)
    #[arg(long)]
    id: Option<String>,

    /// Correlation id
    #[arg(long)]
    correlation_id: Option<String>,

    /// Reply-to address (queue or queue@machine)
    #[arg(long)]
    reply_to: Option<Address>,

    /// Expire the message this many seconds from now
    #[arg(long)]
    ttl_secs: Option<u64>,

    /// Header as key=value (repeatable)
    #[arg(long = "header", value_parser = parse_header)]
    headers: Vec<(String, String)>,

    /// Message body text
    #[arg(long, conflicts_with = "stdin")]
    body: Option<String>,

    /// Read the message body from stdin
    #[arg(long, conflicts_with = "body")]
    stdin: bool,

    /// Mark the message as not recoverable
    #[arg(long)]
    not_recoverable: bool,

    /// Output as JSON
    #[arg(long)]
    json: bool,
}

#[derive(Serialize)]
struct SendReport<'a> {
    id: &'a str,
    address: String,
    delivered: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    path: Option<&'a PathBuf>,
}

/// Execute the send command
pub fn execute(global: &GlobalArgs, args: SendArgs) -> Result<()> {
    let config = global.resolve(None)?;
    let transport = config.transport();

    let message = build_message(&args)?;
    let outcome = transport.send(&message, &args.address)?;

    if args.json {
        let path = match &outcome {
            SendOutcome::Delivered { path } => Some(path),
            SendOutcome::Dropped => None,
        };
        let report = SendReport {
            id: &message.id,
            address: args.address.to_string(),
            delivered: path.is_some(),
            path,
        };
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    match outcome {
        SendOutcome::Delivered { path } => println!("{}", path.display()),
        SendOutcome::Dropped => println!(
            "Working root unavailable; message {} to {} dropped",
            message.id, args.address
        ),
    }
    Ok(())
}

fn build_message(args: &SendArgs) -> Result<Message> {
    let mut message = match &args.id {
        Some(id) => Message::new(id.clone()),
        None => Message::with_random_id(),
    };

    if let Some(correlation_id) = &args.correlation_id {
        message = message.with_correlation_id(correlation_id.clone());
    }
    if let Some(reply_to) = &args.reply_to {
        message = message.with_reply_to(reply_to.clone());
    }
    if let Some(secs) = args.ttl_secs {
        message = message.with_time_to_live(Duration::from_secs(secs));
    }
    for (key, value) in &args.headers {
        message = message.with_header(key.clone(), value.clone());
    }
    message = message.with_recoverable(!args.not_recoverable);

    if args.stdin {
        let mut body = Vec::new();
        std::io::stdin()
            .read_to_end(&mut body)
            .context("Failed to read message body from stdin")?;
        message = message.with_body(body);
    } else if let Some(body) = &args.body {
        message = message.with_body(body.as_bytes().to_vec());
    }

    Ok(message)
}

fn parse_header(raw: &str) -> Result<(String, String), String> {
    match raw.split_once('=') {
        Some((key, value)) if !key.trim().is_empty() => {
            Ok((key.trim().to_string(), value.to_string()))
        }
        _ => Err(format!("expected key=value, got '{raw}'")),
    }
}
