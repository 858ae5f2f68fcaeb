use clap::{Parser, Subcommand, ValueEnum};
use futures_util::StreamExt;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use serde_json::{json, Value};
use tokio_tungstenite::tungstenite::{client::IntoClientRequest, Message};

#[derive(Parser)]
#[command(name = "qmr-cli")]
#[command(about = "Control CLI for the qmr-proxyd daemon", long_about = None)]
struct Cli {
    /// Control API base URL
    #[arg(short, long, default_value = "http://127.0.0.1:7895")]
    url: String,

    /// API key, when the daemon has one configured
    #[arg(short, long, default_value = "")]
    key: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show core state, pid, source and port
    Status,
    /// Start the core (first source unless told otherwise)
    Start {
        /// Explicit subscription URL
        #[arg(long, conflicts_with = "index")]
        url: Option<String>,
        /// Index into the sources file
        #[arg(long)]
        index: Option<usize>,
    },
    /// Stop the core and disable the system proxy
    Stop,
    /// Stop, then start again
    Restart {
        #[arg(long, conflicts_with = "index")]
        url: Option<String>,
        #[arg(long)]
        index: Option<usize>,
    },
    /// Toggle automatic restart after unexpected exits
    AutoRestart {
        #[arg(value_enum)]
        mode: Toggle,
    },
    /// List configured sources
    Sources,
    /// Show the OS proxy settings
    SystemProxy,
    /// Stream core status and log events
    Watch,
}

#[derive(Clone, Copy, ValueEnum)]
enum Toggle {
    On,
    Off,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let base = cli.url.trim_end_matches('/').to_string();

    let mut headers = HeaderMap::new();
    if !cli.key.is_empty() {
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&format!("Bearer {}", cli.key))?,
        );
    }
    let client = reqwest::Client::builder()
        .no_proxy()
        .default_headers(headers.clone())
        .build()?;

    let res = match cli.command {
        Commands::Status => client.get(format!("{}/core/status", base)).send().await?,
        Commands::Start { url, index } => {
            client
                .post(format!("{}/core/start", base))
                .json(&json!({ "url": url, "index": index }))
                .send()
                .await?
        }
        Commands::Stop => client.post(format!("{}/core/stop", base)).send().await?,
        Commands::Restart { url, index } => {
            client
                .post(format!("{}/core/restart", base))
                .json(&json!({ "url": url, "index": index }))
                .send()
                .await?
        }
        Commands::AutoRestart { mode } => {
            client
                .put(format!("{}/core/auto-restart", base))
                .json(&json!({ "enabled": matches!(mode, Toggle::On) }))
                .send()
                .await?
        }
        Commands::Sources => client.get(format!("{}/sources", base)).send().await?,
        Commands::SystemProxy => client.get(format!("{}/system-proxy", base)).send().await?,
        Commands::Watch => return watch(&base, headers).await,
    };

    print_response(res).await
}

async fn print_response(res: reqwest::Response) -> Result<(), Box<dyn std::error::Error>> {
    let status = res.status();
    let json: Value = match res.json().await {
        Ok(json) => json,
        Err(e) => {
            eprintln!("Error: control API returned status {} with an unreadable body: {}", status, e);
            std::process::exit(1);
        }
    };

    println!("{}", serde_json::to_string_pretty(&json)?);
    if !status.is_success() {
        std::process::exit(1);
    }
    Ok(())
}

async fn watch(base: &str, headers: HeaderMap) -> Result<(), Box<dyn std::error::Error>> {
    let ws_url = if let Some(rest) = base.strip_prefix("https://") {
        format!("wss://{}/events", rest)
    } else if let Some(rest) = base.strip_prefix("http://") {
        format!("ws://{}/events", rest)
    } else {
        format!("{}/events", base)
    };

    let mut request = ws_url.as_str().into_client_request()?;
    request.headers_mut().extend(headers);

    let (mut stream, _) = tokio_tungstenite::connect_async(request).await?;
    eprintln!("Watching {} (Ctrl+C to quit)", ws_url);

    while let Some(message) = stream.next().await {
        match message? {
            Message::Text(text) => println!("{}", text.as_str()),
            Message::Close(_) => break,
            _ => {}
        }
    }
    Ok(())
}
