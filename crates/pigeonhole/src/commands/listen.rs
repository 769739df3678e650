//! Listen command implementation

use anyhow::Result;
use chrono::SecondsFormat;
use clap::Args;
use pigeonhole_core::receive::CriticalError;
use pigeonhole_core::{Address, Expiry, Message};
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::info;

use super::GlobalArgs;

/// Receive messages from a queue and print them
#[derive(Args, Debug)]
pub struct ListenArgs {
    /// Queue to receive from (queue, or queue@machine for another machine's queue)
    address: Address,

    /// Number of concurrent workers
    #[arg(long)]
    concurrency: Option<usize>,

    /// Stop after this many messages
    #[arg(long)]
    max_messages: Option<usize>,

    /// Print one JSON object per message
    #[arg(long)]
    json: bool,
}

#[derive(Serialize)]
struct ReceivedMessage<'a> {
    id: &'a str,
    correlation_id: Option<&'a str>,
    reply_to: Option<String>,
    recoverable: bool,
    expires: Option<String>,
    headers: &'a BTreeMap<String, String>,
    body: Option<String>,
}

impl<'a> From<&'a Message> for ReceivedMessage<'a> {
    fn from(message: &'a Message) -> Self {
        Self {
            id: &message.id,
            correlation_id: message.correlation_id.as_deref(),
            reply_to: message.reply_to.as_ref().map(ToString::to_string),
            recoverable: message.recoverable,
            expires: match message.expiry {
                Expiry::Never => None,
                Expiry::At(at) => Some(at.to_rfc3339_opts(SecondsFormat::Millis, true)),
            },
            headers: &message.headers,
            body: message
                .body
                .as_deref()
                .map(|b| String::from_utf8_lossy(b).into_owned()),
        }
    }
}

/// Execute the listen command
///
/// Runs until Ctrl-C, or until `--max-messages` have been printed. Messages
/// that other workers were already handling when the limit was reached are
/// printed too, since their files are gone by then.
pub fn execute(global: &GlobalArgs, args: ListenArgs) -> Result<()> {
    let config = global.resolve(args.concurrency)?;
    let transport = config.transport();
    let concurrency = transport.receive_settings().concurrency;

    let (tx, mut rx) = mpsc::unbounded_channel::<Message>();
    let dispatch = Arc::new(move |message: &Message| -> Result<()> {
        tx.send(message.clone())?;
        Ok(())
    });
    let on_critical = Arc::new(|critical: &CriticalError| {
        eprintln!("Critical: {critical}");
    });

    let mut receiver = transport.listen(args.address.clone(), dispatch, on_critical);
    let _monitor = match config.report_interval() {
        Some(interval) => Some(transport.spawn_outgoing_monitor(interval)?),
        None => None,
    };

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;

    receiver.start(concurrency)?;
    let result = runtime.block_on(print_until_done(&mut rx, &args));

    receiver.stop();
    drop(receiver);
    while let Ok(message) = rx.try_recv() {
        print_message(&message, args.json)?;
    }

    result
}

async fn print_until_done(
    rx: &mut mpsc::UnboundedReceiver<Message>,
    args: &ListenArgs,
) -> Result<()> {
    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    let mut printed = 0usize;
    while !args.max_messages.is_some_and(|max| printed >= max) {
        tokio::select! {
            signal = &mut ctrl_c => {
                info!("Interrupted, stopping receiver for {}", args.address);
                return Ok(signal?);
            }
            received = rx.recv() => match received {
                Some(message) => {
                    print_message(&message, args.json)?;
                    printed += 1;
                }
                None => break,
            },
        }
    }
    Ok(())
}

fn print_message(message: &Message, json: bool) -> Result<()> {
    let view = ReceivedMessage::from(message);
    if json {
        println!("{}", serde_json::to_string(&view)?);
        return Ok(());
    }

    println!("Message {}", view.id);
    if let Some(correlation_id) = view.correlation_id {
        println!("  correlation: {correlation_id}");
    }
    if let Some(reply_to) = &view.reply_to {
        println!("  reply-to:    {reply_to}");
    }
    if let Some(expires) = &view.expires {
        println!("  expires:     {expires}");
    }
    if !view.recoverable {
        println!("  recoverable: false");
    }
    for (key, value) in view.headers {
        println!("  {key}: {value}");
    }
    if let Some(body) = &view.body {
        println!();
        println!("{body}");
    }
    Ok(())
}
