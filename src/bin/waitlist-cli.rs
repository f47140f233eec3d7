use clap::{Parser, Subcommand};
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use serde_json::{json, Value};

#[derive(Parser)]
#[command(name = "waitlist-cli")]
#[command(about = "Management CLI for the waitlist intake service", long_about = None)]
struct Cli {
    #[arg(short, long, default_value = "http://localhost:8080")]
    url: String,

    /// Admin token (sent as a Bearer credential).
    #[arg(short, long, env = "WAITLIST_ADMIN_TOKEN", default_value = "")]
    token: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show service version and encryption mode
    Status,
    /// List stored signups, newest first
    Signups {
        /// Only signups for this address
        #[arg(long)]
        email: Option<String>,
        /// Page size
        #[arg(long)]
        limit: Option<u32>,
        /// Cursor returned by the previous page
        #[arg(long)]
        cursor: Option<String>,
    },
    /// Submit a signup through the public endpoint
    Submit {
        #[arg(long)]
        email: String,
        #[arg(long)]
        name: String,
        #[arg(long)]
        interest: String,
        #[arg(long, default_value = "1")]
        policy_version: String,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let client = reqwest::Client::new();

    let mut headers = HeaderMap::new();
    if !cli.token.is_empty() {
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&format!("Bearer {}", cli.token))?,
        );
    }

    match cli.command {
        Commands::Status => {
            let res = client
                .get(format!("{}/api/admin/status", cli.url))
                .headers(headers)
                .send()
                .await?;
            print_response(res).await?;
        }
        Commands::Signups {
            email,
            limit,
            cursor,
        } => {
            let mut query: Vec<(&str, String)> = Vec::new();
            if let Some(email) = email {
                query.push(("email", email));
            }
            if let Some(limit) = limit {
                query.push(("limit", limit.to_string()));
            }
            if let Some(cursor) = cursor {
                query.push(("cursor", cursor));
            }
            let res = client
                .get(format!("{}/api/admin/signups", cli.url))
                .headers(headers)
                .query(&query)
                .send()
                .await?;
            print_response(res).await?;
        }
        Commands::Submit {
            email,
            name,
            interest,
            policy_version,
        } => {
            let body = json!({
                "email": email,
                "fullName": name,
                "mainInterest": interest,
                "policyVersion": policy_version,
                "consentToContact": true,
            });
            let res = client
                .post(format!("{}/api/waitlist", cli.url))
                .json(&body)
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
        eprintln!("Error: service returned status {}", status);
        if let Some(retry) = res.headers().get("retry-after").and_then(|v| v.to_str().ok()) {
            eprintln!("Retry after: {}s", retry);
        }
        if let Ok(text) = res.text().await {
            eprintln!("Response: {}", text);
        }
        return Ok(());
    }

    let json: Value = res.json().await?;
    println!("{}", serde_json::to_string_pretty(&json)?);
    Ok(())
}
