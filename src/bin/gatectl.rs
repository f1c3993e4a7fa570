use clap::{Parser, Subcommand};
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use reqwest::StatusCode;
use serde_json::Value;

#[derive(Parser)]
#[command(name = "gatectl")]
#[command(about = "Management CLI for the admission gateway", long_about = None)]
struct Cli {
    /// Admin API base URL
    #[arg(short, long, default_value = "http://127.0.0.1:8081")]
    url: String,

    /// Admin API key
    #[arg(short, long, env = "GATECTL_KEY")]
    key: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Check gateway status and admission policy
    Status,
    /// Show window, failure and ban state for a client
    Inspect { client: String },
    /// Lift a client's ban and clear its failure count
    Release { client: String },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let client = reqwest::Client::new();
    let base = cli.url.trim_end_matches('/');

    let mut headers = HeaderMap::new();
    headers.insert(
        AUTHORIZATION,
        HeaderValue::from_str(&format!("Bearer {}", cli.key))?,
    );

    let res = match &cli.command {
        Commands::Status => client.get(format!("{base}/admin/status")),
        Commands::Inspect { client: id } => client.get(format!("{base}/admin/clients/{id}")),
        Commands::Release { client: id } => {
            client.delete(format!("{base}/admin/clients/{id}/jail"))
        }
    }
    .headers(headers)
    .send()
    .await?;

    if let Commands::Release { client: id } = &cli.command {
        if res.status() == StatusCode::NO_CONTENT {
            println!("Released {id}");
            return Ok(());
        }
    }
    print_response(res).await
}

async fn print_response(res: reqwest::Response) -> Result<(), Box<dyn std::error::Error>> {
    let status = res.status();
    if !status.is_success() {
        eprintln!("Error: Admin API returned status {}", status);
        if let Ok(text) = res.text().await {
            eprintln!("Response: {}", text);
        }
        std::process::exit(1);
    }

    let json: Value = res.json().await?;
    println!("{}", serde_json::to_string_pretty(&json)?);
    Ok(())
}
