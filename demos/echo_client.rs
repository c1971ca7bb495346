//! Echo Client - concurrent calls through the connection pool.
//!
//! Start `echo_server` first, then:
//!
//! ```text
//! cargo run --example echo_client -- --server 127.0.0.1:3000 --calls 20
//! ```

use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use serde::{Deserialize, Serialize};
use tracing::{info, warn, Level};
use tracing_subscriber::FmtSubscriber;
use wirepool::{Client, ClientConfig};

#[derive(Parser, Debug)]
#[command(name = "echo_client")]
#[command(about = "wirepool demo client")]
struct Args {
    /// Server address
    #[arg(short, long, default_value = "127.0.0.1:3000")]
    server: String,

    /// Number of pooled connections
    #[arg(short, long, default_value = "4")]
    pool_size: usize,

    /// Number of concurrent echo calls
    #[arg(short, long, default_value = "10")]
    calls: usize,

    /// Per-read/per-write deadline in milliseconds
    #[arg(long)]
    timeout_ms: Option<u64>,

    /// Enable debug logging
    #[arg(short, long)]
    debug: bool,
}

#[derive(Serialize, Debug)]
struct ReqEcho {
    message: String,
}

#[derive(Deserialize, Debug)]
struct ResEcho {
    echo: String,
}

#[derive(Serialize, Debug)]
struct ReqLogin {
    username: String,
    password: String,
}

#[derive(Deserialize, Debug)]
struct ResLogin {
    code: i32,
    token: String,
}

#[derive(Serialize, Debug)]
struct ReqGetInfo {
    username: String,
    token: String,
}

#[derive(Deserialize, Debug)]
struct ResGetInfo {
    nickname: String,
    code: i32,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let log_level = if args.debug { Level::DEBUG } else { Level::INFO };
    FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_target(false)
        .compact()
        .init();

    let mut config = ClientConfig::new(args.pool_size, args.server.clone());
    if let Some(ms) = args.timeout_ms {
        config = config.with_io_timeout(Duration::from_millis(ms));
    }
    let client = Arc::new(Client::connect(config).await?);
    info!("Connected {} connections to {}", client.pool_size(), args.server);

    let mut tasks = Vec::with_capacity(args.calls);
    for i in 0..args.calls {
        let client = client.clone();
        tasks.push(tokio::spawn(async move {
            let req = ReqEcho {
                message: format!("hello #{}", i),
            };
            client.call_with_retry::<_, ResEcho>("echo", &req).await
        }));
    }
    for task in tasks {
        match task.await? {
            Ok(res) => info!("echo: {}", res.echo),
            Err(e) => warn!("echo failed: {}", e),
        }
    }

    let login: ResLogin = client
        .call_with_retry(
            "Login",
            &ReqLogin {
                username: "alice".to_string(),
                password: "wonderland".to_string(),
            },
        )
        .await?;
    info!("Login code {}", login.code);

    let info: ResGetInfo = client
        .call_with_retry(
            "GetInfo",
            &ReqGetInfo {
                username: "alice".to_string(),
                token: login.token,
            },
        )
        .await?;
    info!("GetInfo code {}, nickname {:?}", info.code, info.nickname);

    client.close();
    Ok(())
}
