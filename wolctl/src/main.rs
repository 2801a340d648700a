mod client;

use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use client::RegistryClient;
use reqwest::Method;
use serde_json::{json, Value};
use tracing::{debug, error};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "wolctl", about = "Manage devices and send wake requests through the registry")]
struct Cli {
    /// Base URL of the registry service
    #[arg(long, env = "WOL_SERVER", default_value = "http://localhost:3000")]
    server: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Check that the service is up
    Health,
    /// List all devices
    List,
    /// Show one device
    Get { id: String },
    /// Register a device
    Add {
        name: String,
        mac: String,
        #[command(flatten)]
        fields: DeviceFields,
    },
    /// Replace a device's MAC, IP, description and group
    Update {
        id: String,
        mac: String,
        #[command(flatten)]
        fields: DeviceFields,
    },
    /// Delete a device
    Remove { id: String },
    /// List device groups
    Groups,
    /// Wake one device and log it
    Wake { id: String },
    /// Wake several devices; failures do not stop the batch
    BulkWake {
        #[arg(required = true)]
        ids: Vec<String>,
    },
    /// Send a magic packet to a raw MAC address without logging
    WakeMac { mac: String },
    /// List activities
    Activities {
        #[arg(long)]
        device: Option<String>,
        #[arg(long)]
        status: Option<String>,
        /// RFC 3339 timestamp, inclusive
        #[arg(long)]
        start: Option<String>,
        /// RFC 3339 timestamp, inclusive
        #[arg(long)]
        end: Option<String>,
    },
    /// Delete activities, all of them unless --device is given
    PurgeActivities {
        #[arg(long)]
        device: Option<String>,
    },
}

#[derive(Debug, Args)]
struct DeviceFields {
    #[arg(long)]
    ip: Option<String>,
    #[arg(long)]
    description: Option<String>,
    #[arg(long)]
    group: Option<String>,
}

fn device_body(name: Option<&str>, mac: &str, fields: &DeviceFields) -> Value {
    let mut body = json!({
        "macAddress": mac,
        "ipAddress": fields.ip,
        "description": fields.description,
        "group": fields.group,
    });
    if let Some(name) = name {
        body["name"] = Value::String(name.to_string());
    }
    body
}

fn query_pairs(pairs: [(&'static str, &Option<String>); 4]) -> Vec<(&'static str, String)> {
    pairs
        .into_iter()
        .filter_map(|(key, value)| value.clone().map(|v| (key, v)))
        .collect()
}

async fn run(client: &RegistryClient, command: Command) -> Result<Value> {
    match command {
        Command::Health => client.request(Method::GET, "/api/health", &[], None).await,
        Command::List => client.request(Method::GET, "/api/devices", &[], None).await,
        Command::Get { id } => {
            client
                .request(Method::GET, &format!("/api/devices/{}", id), &[], None)
                .await
        }
        Command::Add { name, mac, fields } => {
            let body = device_body(Some(&name), &mac, &fields);
            client
                .request(Method::POST, "/api/devices", &[], Some(&body))
                .await
        }
        Command::Update { id, mac, fields } => {
            let body = device_body(None, &mac, &fields);
            client
                .request(Method::PUT, &format!("/api/devices/{}", id), &[], Some(&body))
                .await
        }
        Command::Remove { id } => {
            client
                .request(Method::DELETE, &format!("/api/devices/{}", id), &[], None)
                .await
        }
        Command::Groups => client.request(Method::GET, "/api/groups", &[], None).await,
        Command::Wake { id } => {
            client
                .request(Method::POST, &format!("/api/devices/{}/wake", id), &[], None)
                .await
        }
        Command::BulkWake { ids } => {
            let body = json!({ "ids": ids });
            client
                .request(Method::POST, "/api/devices/bulk-wake", &[], Some(&body))
                .await
        }
        Command::WakeMac { mac } => {
            let body = json!({ "mac": mac });
            client.request(Method::POST, "/wake", &[], Some(&body)).await
        }
        Command::Activities {
            device,
            status,
            start,
            end,
        } => {
            let query = query_pairs([
                ("device", &device),
                ("status", &status),
                ("start", &start),
                ("end", &end),
            ]);
            client
                .request(Method::GET, "/api/activities", &query, None)
                .await
        }
        Command::PurgeActivities { device } => {
            let query: Vec<(&str, String)> =
                device.into_iter().map(|d| ("device", d)).collect();
            client
                .request(Method::DELETE, "/api/activities", &query, None)
                .await
        }
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    debug!("Using registry at {}", cli.server);
    let client = RegistryClient::new(&cli.server);

    match run(&client, cli.command).await {
        Ok(body) => match serde_json::to_string_pretty(&body) {
            Ok(text) => println!("{}", text),
            Err(e) => {
                error!("Failed to format response: {}", e);
                std::process::exit(1);
            }
        },
        Err(e) => {
            error!("{:#}", e);
            std::process::exit(1);
        }
    }
}
