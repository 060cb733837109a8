//! Ansible module entry point.
//!
//! Ansible runs a binary module with the path of a JSON arguments file as
//! its only argument and reads a JSON result object from stdout.
//!
//! # Usage
//!
//! ```bash
//! cat > args.json <<'JSON'
//! {
//!   "host": "10.1.1.20",
//!   "username": "ansible",
//!   "password": "secret",
//!   "bootrom": "kxz10101.bin",
//!   "tftpServer": "10.1.1.5",
//!   "logfileDirectory": "/tmp/poststage",
//!   "operation": "post_stage"
//! }
//! JSON
//! RUST_LOG=debug cargo run --example ansible_module -- args.json
//! ```

use std::env;
use std::fs;
use std::process::ExitCode;

use poststage::{ModuleParams, ResultRecord};

#[tokio::main]
async fn main() -> ExitCode {
    // Logs go to stderr; stdout carries only the result object
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let record = match run().await {
        Ok(record) => record,
        Err(msg) => ResultRecord {
            changed: false,
            failed: true,
            msg: Some(msg),
            failed_step: None,
        },
    };

    match serde_json::to_string(&record) {
        Ok(json) => println!("{}", json),
        Err(e) => {
            println!(r#"{{"changed": false, "failed": true, "msg": "{}"}}"#, e);
            return ExitCode::FAILURE;
        }
    }

    if record.is_success() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}

async fn run() -> Result<ResultRecord, String> {
    let path = env::args()
        .nth(1)
        .ok_or_else(|| "usage: ansible_module <args.json>".to_string())?;
    let raw = fs::read_to_string(&path).map_err(|e| format!("cannot read {}: {}", path, e))?;
    let params: ModuleParams =
        serde_json::from_str(&raw).map_err(|e| format!("invalid module arguments: {}", e))?;

    let host = params.host.clone();
    let (builder, operation) = params.into_stage().map_err(|e| e.to_string())?;
    let stage = match builder.build() {
        Ok(stage) => stage,
        Err(e) => return Ok(ResultRecord::failure(&host, &e)),
    };

    Ok(stage.run(&operation).await)
}
