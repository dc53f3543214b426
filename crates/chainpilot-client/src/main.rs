use anyhow::Result;
use clap::{Parser, Subcommand};
use serde_json::Value;

mod client;

use client::{EngineClient, parse_params};

#[derive(Parser)]
#[command(author, version, about = "Command-line client for a chainpilot server")]
struct Cli {
    /// Base URL of the chainpilot server
    #[arg(long, env = "CHAINPILOT_URL", default_value = "http://localhost:8080")]
    url: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run an action, e.g. `action prepareTransaction '{"to":"0x...","amount":"0.1"}'`
    Action {
        name: String,
        /// JSON object with the action parameters
        params: Option<String>,
    },
    /// List status cards, newest first
    Cards,
    /// Close a settled status card
    Dismiss { hash: String },
    /// Show the connected account, chain and pending operation
    Session,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let client = EngineClient::new(cli.url);

    match cli.command {
        Command::Action { name, params } => {
            let params = parse_params(params.as_deref())?;
            let reply = client.action(&name, params).await?;
            print_reply(&reply);
        }
        Command::Cards => {
            let cards = client.cards().await?;
            let rendered: Vec<_> = cards
                .as_array()
                .into_iter()
                .flatten()
                .filter_map(|card| card.get("rendered").and_then(Value::as_str))
                .collect();
            if rendered.is_empty() {
                println!("No status cards.");
            }
            for card in rendered {
                println!("{card}\n");
            }
        }
        Command::Dismiss { hash } => {
            client.dismiss(&hash).await?;
            println!("Closed {hash}");
        }
        Command::Session => {
            let session = client.session().await?;
            println!("{}", serde_json::to_string_pretty(&session)?);
        }
    }
    Ok(())
}

fn print_reply(reply: &Value) {
    let ok = reply.get("ok").and_then(Value::as_bool).unwrap_or(false);
    if let Some(content) = reply.get("content").and_then(Value::as_array) {
        for block in content.iter().filter_map(Value::as_str) {
            println!("{block}\n");
        }
    }
    if !ok {
        if let Some(kind) = reply.get("errorKind").and_then(Value::as_str) {
            eprintln!("[{kind}]");
        }
    }
}
