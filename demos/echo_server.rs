//! Echo Server - a small account service on top of wirepool.
//!
//! This example demonstrates:
//! - Registering typed handlers for several operations
//! - Reporting domain failures through a `code` field in the response
//! - Checking at startup that every expected operation is served
//!
//! # Running
//!
//! ```text
//! cargo run --example echo_server -- --listen 127.0.0.1:3000
//! cargo run --example echo_client -- --server 127.0.0.1:3000
//! ```

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use clap::Parser;
use serde::{Deserialize, Serialize};
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;
use wirepool::{Server, ServerConfig};

const SUCCESS: i32 = 200;
const ERR_USER_NOT_FOUND: i32 = 1001;
const ERR_BAD_PASSWORD: i32 = 1002;
const ERR_BAD_TOKEN: i32 = 1006;

#[derive(Parser, Debug)]
#[command(name = "echo_server")]
#[command(about = "wirepool demo server")]
struct Args {
    /// Address to listen on
    #[arg(short, long, default_value = "127.0.0.1:3000")]
    listen: String,

    /// JSON server config (overrides --listen)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long)]
    debug: bool,
}

#[derive(Deserialize, Serialize, Debug)]
struct ReqEcho {
    message: String,
}

#[derive(Deserialize, Serialize, Debug)]
struct ResEcho {
    echo: String,
}

#[derive(Deserialize, Serialize, Debug)]
struct ReqLogin {
    username: String,
    password: String,
}

#[derive(Deserialize, Serialize, Debug)]
struct ResLogin {
    username: String,
    code: i32,
    token: String,
}

#[derive(Deserialize, Serialize, Debug)]
struct ReqGetInfo {
    username: String,
    token: String,
}

#[derive(Deserialize, Serialize, Debug)]
struct ResGetInfo {
    username: String,
    nickname: String,
    code: i32,
}

#[derive(Default)]
struct Accounts {
    passwords: HashMap<String, String>,
    nicknames: HashMap<String, String>,
    tokens: HashMap<String, String>,
}

impl Accounts {
    fn seeded() -> Self {
        let mut accounts = Self::default();
        for (user, password, nickname) in [("alice", "wonderland", "Al"), ("bob", "builder", "Bobby")] {
            accounts.passwords.insert(user.to_string(), password.to_string());
            accounts.nicknames.insert(user.to_string(), nickname.to_string());
        }
        accounts
    }

    fn login(&mut self, req: ReqLogin) -> ResLogin {
        let code = match self.passwords.get(&req.username) {
            None => ERR_USER_NOT_FOUND,
            Some(p) if *p != req.password => ERR_BAD_PASSWORD,
            Some(_) => SUCCESS,
        };

        let token = if code == SUCCESS {
            let token = format!("{}-{}", req.username, self.tokens.len() + 1);
            self.tokens.insert(req.username.clone(), token.clone());
            token
        } else {
            String::new()
        };

        ResLogin {
            username: req.username,
            code,
            token,
        }
    }

    fn get_info(&self, req: ReqGetInfo) -> ResGetInfo {
        if self.tokens.get(&req.username) != Some(&req.token) {
            return ResGetInfo {
                username: req.username,
                nickname: String::new(),
                code: ERR_BAD_TOKEN,
            };
        }

        ResGetInfo {
            nickname: self.nicknames.get(&req.username).cloned().unwrap_or_default(),
            username: req.username,
            code: SUCCESS,
        }
    }
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

    let config = match &args.config {
        Some(path) => ServerConfig::from_json_file(path)?,
        None => ServerConfig::default().listen_address(args.listen.clone()),
    };

    let accounts = Arc::new(Mutex::new(Accounts::seeded()));
    let mut server = Server::from_config(config);

    server.register("echo", |req: ReqEcho| async move {
        ResEcho { echo: req.message }
    })?;

    let login_accounts = accounts.clone();
    server.register("Login", move |req: ReqLogin| {
        let accounts = login_accounts.clone();
        async move {
            let mut accounts = accounts.lock().unwrap_or_else(|e| e.into_inner());
            accounts.login(req)
        }
    })?;

    let info_accounts = accounts.clone();
    server.register("GetInfo", move |req: ReqGetInfo| {
        let accounts = info_accounts.clone();
        async move {
            let accounts = accounts.lock().unwrap_or_else(|e| e.into_inner());
            accounts.get_info(req)
        }
    })?;

    server.require(&["echo", "Login", "GetInfo"])?;

    let listener = server.bind().await?;
    info!("Listening on {}", listener.local_addr()?);

    let shutdown = listener.shutdown_handle();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Ctrl-C received, shutting down");
            shutdown.shutdown();
        }
    });

    server.serve(listener).await?;
    Ok(())
}
