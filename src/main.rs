mod backend;
mod cache;
mod calc;
mod config;
mod db;
mod export;
mod gate;
mod ipc;
mod session;
mod translate;
mod validate;

use std::io::{self, BufRead, Write};

fn main() {
    init_tracing();

    let config = config::Config::from_env();
    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        api_base_url = %config.api_base_url,
        "cobranzad starting"
    );
    let mut state = match ipc::AppState::new(config) {
        Ok(s) => s,
        Err(e) => {
            tracing::error!(error = %e, "failed to build http client");
            return;
        }
    };

    let stdin = io::stdin();
    let mut stdout = io::stdout();

    for line in stdin.lock().lines() {
        let line = match line {
            Ok(v) => v,
            Err(_) => break,
        };
        if line.trim().is_empty() {
            continue;
        }

        let req: ipc::Request = match serde_json::from_str(&line) {
            Ok(v) => v,
            Err(e) => {
                // Can't reply without id.
                let _ = writeln!(
                    stdout,
                    "{}",
                    serde_json::json!({
                        "ok": false,
                        "error": { "code": "bad_json", "message": e.to_string() }
                    })
                );
                let _ = stdout.flush();
                continue;
            }
        };

        let resp = ipc::handle_request(&mut state, req);
        let _ = writeln!(
            stdout,
            "{}",
            serde_json::to_string(&resp).unwrap_or_else(|_| "{\"ok\":false}".to_string())
        );
        let _ = stdout.flush();
    }

    tracing::info!("stdin closed, exiting");
}

fn init_tracing() {
    // stdout carries the protocol; logs go to stderr.
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(io::stderr)
        .try_init();
}
