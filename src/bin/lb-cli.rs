use clap::{Parser, Subcommand, ValueEnum};
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use reqwest::Method;
use serde_json::Value;

#[derive(Parser)]
#[command(name = "lb-cli")]
#[command(about = "Management CLI for the adaptive load balancer", long_about = None)]
struct Cli {
    #[arg(short, long, default_value = "http://127.0.0.1:5000", env = "LB_ADMIN_URL")]
    url: String,

    #[arg(short, long, default_value = "", env = "LB_ADMIN_KEY")]
    key: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show version, active algorithm and adaptive mode
    Status,
    /// Show the health snapshot
    Health,
    /// List servers with live statistics and scores
    Servers,
    /// Pin a routing algorithm (disables adaptive mode)
    Algorithm {
        /// round_robin, least_connections, weighted_round_robin,
        /// least_response_time, ip_hash or random
        name: String,
    },
    /// Turn adaptive algorithm selection on or off
    Adaptive { mode: Toggle },
    /// Ask for a routing decision
    Route {
        /// Client identifier used by ip_hash
        #[arg(long)]
        client: Option<String>,
    },
    /// Register a server
    Add {
        id: String,
        host: String,
        port: u16,
        #[arg(long, default_value_t = 1)]
        weight: u32,
        #[arg(long)]
        health_check_path: Option<String>,
    },
    /// Deregister a server
    Remove { id: String },
}

#[derive(Clone, Copy, ValueEnum)]
enum Toggle {
    On,
    Off,
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

    let base = cli.url.trim_end_matches('/');
    let request = match cli.command {
        Commands::Status => client.get(format!("{}/admin/status", base)),
        Commands::Health => client.get(format!("{}/admin/health", base)),
        Commands::Servers => client.get(format!("{}/admin/servers", base)),
        Commands::Algorithm { name } => {
            client.request(Method::PUT, format!("{}/admin/algorithm/{}", base, name))
        }
        Commands::Adaptive { mode } => {
            let mode = match mode {
                Toggle::On => "on",
                Toggle::Off => "off",
            };
            client.request(Method::PUT, format!("{}/admin/adaptive/{}", base, mode))
        }
        Commands::Route { client: id } => {
            let request = client.get(format!("{}/route", base));
            match id {
                Some(id) => request.query(&[("client", id)]),
                None => request,
            }
        }
        Commands::Add {
            id,
            host,
            port,
            weight,
            health_check_path,
        } => client
            .post(format!("{}/admin/servers", base))
            .json(&serde_json::json!({
                "id": id,
                "host": host,
                "port": port,
                "weight": weight,
                "health_check_path": health_check_path,
            })),
        Commands::Remove { id } => client.delete(format!("{}/admin/servers/{}", base, id)),
    };

    let res = request.headers(headers).send().await?;
    print_response(res).await
}

async fn print_response(res: reqwest::Response) -> Result<(), Box<dyn std::error::Error>> {
    let status = res.status();
    let text = res.text().await?;

    if !status.is_success() {
        eprintln!("Error: Admin API returned status {}", status);
        if !text.is_empty() {
            eprintln!("Response: {}", text);
        }
        std::process::exit(1);
    }

    if text.is_empty() {
        println!("{}", status);
        return Ok(());
    }

    match serde_json::from_str::<Value>(&text) {
        Ok(json) => println!("{}", serde_json::to_string_pretty(&json)?),
        Err(_) => println!("{}", text),
    }
    Ok(())
}
