use clap::{Parser, Subcommand};
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use serde_json::{json, Value};

#[derive(Parser)]
#[command(name = "donation-cli")]
#[command(about = "Management CLI for the Donation Gateway", long_about = None)]
struct Cli {
    #[arg(short, long, default_value = "http://localhost:8080")]
    url: String,

    /// Admin API key (only needed for admin commands).
    #[arg(short, long, default_value = "")]
    key: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show donation progress against the goal
    Progress,
    /// Show the donor leaderboard
    Leaderboard {
        /// Force a full history rescan
        #[arg(long)]
        refresh: bool,
    },
    /// Show the campaign token balance of an address
    Balance { address: String },
    /// Show the gateway wallet address and balance
    Wallet,
    /// Donate tokens from the gateway wallet
    Donate { amount: f64 },
    /// Check gateway system status (admin)
    Status,
    /// Inspect the leaderboard cache (admin)
    Cache,
    /// Force a leaderboard rescan (admin)
    Rescan,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let client = reqwest::Client::new();

    let mut headers = HeaderMap::new();
    if !cli.key.is_empty() {
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&format!("Bearer {}", cli.key))?,
        );
    }

    match cli.command {
        Commands::Progress => {
            let res = client
                .get(format!("{}/api/progress", cli.url))
                .send()
                .await?;
            print_response(res).await?;
        }
        Commands::Leaderboard { refresh } => {
            let res = client
                .get(format!("{}/api/leaderboard?refresh={}", cli.url, refresh))
                .send()
                .await?;
            print_response(res).await?;
        }
        Commands::Balance { address } => {
            let res = client
                .get(format!("{}/api/balance/{}", cli.url, address))
                .send()
                .await?;
            print_response(res).await?;
        }
        Commands::Wallet => {
            let res = client.get(format!("{}/api/wallet", cli.url)).send().await?;
            print_response(res).await?;
        }
        Commands::Donate { amount } => {
            let res = client
                .post(format!("{}/api/donate", cli.url))
                .json(&json!({ "amount": amount }))
                .send()
                .await?;
            print_response(res).await?;
        }
        Commands::Status => {
            let res = client
                .get(format!("{}/admin/status", cli.url))
                .headers(headers)
                .send()
                .await?;
            print_response(res).await?;
        }
        Commands::Cache => {
            let res = client
                .get(format!("{}/admin/cache", cli.url))
                .headers(headers)
                .send()
                .await?;
            print_response(res).await?;
        }
        Commands::Rescan => {
            let res = client
                .post(format!("{}/admin/rescan", cli.url))
                .headers(headers)
                .send()
                .await?;
            print_response(res).await?;
        }
    }

    Ok(())
}

async fn print_response(res: reqwest::Response) -> Result<(), Box<dyn std::error::Error>> {
    let status = res.status();
    if !status.is_success() {
        eprintln!("Error: gateway returned status {}", status);
        if let Ok(text) = res.text().await {
            eprintln!("Response: {}", text);
        }
        return Ok(());
    }

    let json: Value = res.json().await?;
    println!("{}", serde_json::to_string_pretty(&json)?);
    Ok(())
}
