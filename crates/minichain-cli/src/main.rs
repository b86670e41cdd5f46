use anyhow::Result;
use clap::{Parser, Subcommand};
use serde::Serialize;
use serde_json::json;
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Parser, Debug)]
#[command(name = "minichain-cli")]
#[command(about = "CLI client for a running minichain node")]
struct Cli {
    /// Node base URL (e.g. http://127.0.0.1:8080)
    #[arg(long, global = true, default_value = "http://127.0.0.1:8080")]
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
        from: String,
        /// Recipient
        #[arg(long)]
        to: String,
        /// Amount
        #[arg(long)]
        amount: u64,
    },
    /// Mine the mempool into a new block
    Mine {
        /// Address credited with the mining reward
        #[arg(long)]
        miner: String,
    },
    /// Show an address balance
    Balance { address: String },
    /// Dump the full chain
    Chain,
    /// Show the chain head
    Head,
    /// Show pending transactions
    Mempool,
    /// Run longest-chain conflict resolution against the node's peers
    Resolve,
    /// List known peers
    Peers,
}

#[derive(Serialize)]
struct Tx {
    from: String,
    to: String,
    amount: u64,
}

#[tokio::main]
async fn main() -> Result<()> {
    fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .pretty()
        .init();

    let cli = Cli::parse();
    let client = reqwest::Client::new();
    let node = cli.node;

    let res = match cli.cmd {
        Command::Submit { from, to, amount } => {
            let tx = Tx { from, to, amount };
            client
                .post(format!("{node}/transactions"))
                .json(&tx)
                .send()
                .await?
        }
        Command::Mine { miner } => {
            client
                .post(format!("{node}/mine"))
                .json(&json!({ "miner": miner }))
                .send()
                .await?
        }
        Command::Balance { address } => client.get(format!("{node}/balance/{address}")).send().await?,
        Command::Chain => client.get(format!("{node}/chain")).send().await?,
        Command::Head => client.get(format!("{node}/chain/head")).send().await?,
        Command::Mempool => client.get(format!("{node}/mempool")).send().await?,
        Command::Resolve => client.post(format!("{node}/resolve")).send().await?,
        Command::Peers => client.get(format!("{node}/peers")).send().await?,
    };

    let status = res.status();
    let body = res.text().await?;
    println!("status: {}", status);
    println!("{body}");
    Ok(())
}
