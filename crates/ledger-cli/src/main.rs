use anyhow::Result;
use clap::{Parser, Subcommand};
use reqwest::{Client, RequestBuilder};
use serde::Serialize;
use tracing::debug;
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Parser, Debug)]
#[command(name = "ledger-cli")]
#[command(about = "CLI client for the proof-of-work ledger node")]
struct Cli {
    /// Node base URL (e.g. http://127.0.0.1:8080)
    #[arg(long, global = true, env = "LEDGER_NODE", default_value = "http://127.0.0.1:8080")]
    node: String,

    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Submit a transaction to the mempool
    Submit {
        /// Sender
        #[arg(long)]
        author: String,
        /// Payload
        #[arg(long)]
        content: String,
    },
    /// Mine the pending transactions into a block
    Mine,
    /// Print the node's chain
    Chain,
    /// Print pending transactions
    Mempool,
    /// List known peers
    Peers,
    /// Register a peer by address
    AddPeer {
        #[arg(long)]
        address: String,
    },
    /// Run longest-chain consensus against the node's peers
    Consensus,
    /// Print a summary of the node
    State,
}

#[derive(Serialize)]
struct TxIn {
    author: String,
    content: String,
}

#[derive(Serialize)]
struct PeerIn {
    address: String,
}

fn request(client: &Client, node: &str, cmd: Command) -> RequestBuilder {
    let node = node.trim_end_matches('/');
    match cmd {
        Command::Submit { author, content } => client
            .post(format!("{node}/tx"))
            .json(&TxIn { author, content }),
        Command::Mine => client.post(format!("{node}/mine")),
        Command::Chain => client.get(format!("{node}/chain")),
        Command::Mempool => client.get(format!("{node}/mempool")),
        Command::Peers => client.get(format!("{node}/peers")),
        Command::AddPeer { address } => client
            .post(format!("{node}/peers"))
            .json(&PeerIn { address }),
        Command::Consensus => client.get(format!("{node}/consensus")),
        Command::State => client.get(format!("{node}/state")),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .pretty()
        .init();

    let cli = Cli::parse();
    let client = Client::new();
    let req = request(&client, &cli.node, cli.cmd).build()?;
    debug!("{} {}", req.method(), req.url());

    let res = client.execute(req).await?;
    let status = res.status();
    let body = res.text().await?;
    println!("status: {}", status);
    match serde_json::from_str::<serde_json::Value>(&body) {
        Ok(json) => println!("{}", serde_json::to_string_pretty(&json)?),
        Err(_) => println!("{body}"),
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn submit_posts_json_to_tx() {
        let client = Client::new();
        let cmd = Command::Submit {
            author: "alice".into(),
            content: "hi".into(),
        };
        let req = request(&client, "http://node:8080/", cmd).build().unwrap();
        assert_eq!(req.method(), reqwest::Method::POST);
        assert_eq!(req.url().as_str(), "http://node:8080/tx");
        let body = req.body().and_then(|b| b.as_bytes()).unwrap();
        let json: serde_json::Value = serde_json::from_slice(body).unwrap();
        assert_eq!(json["author"], "alice");
        assert_eq!(json["content"], "hi");
    }

    #[test]
    fn parses_subcommands() {
        let cli = Cli::try_parse_from(["ledger-cli", "--node", "http://x:1", "add-peer", "--address", "y:2"]).unwrap();
        assert_eq!(cli.node, "http://x:1");
        assert!(matches!(cli.cmd, Command::AddPeer { ref address } if address == "y:2"));

        let client = Client::new();
        let req = request(&client, &cli.node, cli.cmd).build().unwrap();
        assert_eq!(req.url().as_str(), "http://x:1/peers");
    }
}
