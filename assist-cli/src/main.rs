//! assist-cli: command-line client for the service-booking assistant
//!
//! Talks to the assistant's HTTP API. Handy for poking at a running server
//! and for scripting conversations.
//!
//! # Subcommands
//! - `session [--customer-id <id>] [--vin <vin>]`: start a conversation
//! - `send <message> [--session <id>] [...] [--json]`: run one turn
//! - `services [--json]`: list the service catalog
//! - `status`: show server health

use clap::{Parser, Subcommand};
use serde::Deserialize;

const DEFAULT_SERVER: &str = "http://127.0.0.1:8787";

// ============================================================================
// CLI Definition
// ============================================================================

#[derive(Debug, Parser)]
#[command(
    name = "assist-cli",
    version,
    about = "Service-booking assistant: HTTP API client"
)]
struct Cli {
    /// Assistant HTTP server URL (overrides ASSIST_HTTP_URL env var)
    #[arg(long, env = "ASSIST_HTTP_URL", default_value = DEFAULT_SERVER)]
    server: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Start a chat session
    Session {
        #[arg(long)]
        customer_id: Option<String>,

        #[arg(long)]
        vin: Option<String>,
    },

    /// Send one message
    Send {
        /// Message text
        message: String,

        /// Session to continue; omit to start a new one
        #[arg(short, long, env = "ASSIST_SESSION")]
        session: Option<String>,

        #[arg(long)]
        customer_id: Option<String>,

        #[arg(long)]
        vin: Option<String>,

        /// Customer latitude, used for dealership ranking
        #[arg(long, requires = "lng", allow_negative_numbers = true)]
        lat: Option<f64>,

        /// Customer longitude
        #[arg(long, requires = "lat", allow_negative_numbers = true)]
        lng: Option<f64>,

        /// Print the raw JSON result
        #[arg(long)]
        json: bool,
    },

    /// List the service catalog
    Services {
        #[arg(long)]
        json: bool,
    },

    /// Show assistant server status
    Status,
}

// ============================================================================
// API Response Types
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct ServiceEntry {
    pub service_code: String,
    pub name: String,
    #[serde(default)]
    pub average_time_minutes: u32,
}

#[derive(Debug, Deserialize)]
pub struct ServicesResponse {
    pub services: Vec<ServiceEntry>,
}

// ============================================================================
// Formatting
// ============================================================================

/// Request body for POST /chat/message.
pub fn message_body(
    message: &str,
    session: Option<&str>,
    customer_id: Option<&str>,
    vin: Option<&str>,
    coordinates: Option<(f64, f64)>,
) -> serde_json::Value {
    let mut body = serde_json::json!({ "message": message });
    if let Some(obj) = body.as_object_mut() {
        if let Some(s) = session {
            obj.insert("session_id".to_string(), serde_json::json!(s));
        }
        if let Some(c) = customer_id {
            obj.insert("customer_id".to_string(), serde_json::json!(c));
        }
        if let Some(v) = vin {
            obj.insert("vin".to_string(), serde_json::json!(v));
        }
        if let Some((lat, lng)) = coordinates {
            obj.insert(
                "coordinates".to_string(),
                serde_json::json!({ "lat": lat, "lng": lng }),
            );
        }
    }
    body
}

/// Human-readable rendering of one turn result.
pub fn format_turn(result: &serde_json::Value) -> String {
    let mut out = String::new();
    out.push_str(result["reply"].as_str().unwrap_or(""));
    out.push('\n');

    let outcome = result["outcome"].as_str().unwrap_or("unknown");
    out.push_str(&format!("\n[{}] session {}\n", outcome, result["session_id"].as_str().unwrap_or("?")));

    if let Some(recs) = result["recommendations"].as_array() {
        let codes: Vec<&str> = recs.iter().filter_map(|r| r["service_code"].as_str()).collect();
        out.push_str(&format!("Recommended: {}\n", codes.join(", ")));
    }

    if let Some(rankings) = result["rankings"].as_array() {
        for (i, r) in rankings.iter().enumerate() {
            out.push_str(&format!(
                "  {}. {}{}\n",
                i + 1,
                r["dealership_id"].as_str().unwrap_or("?"),
                delay_suffix(r)
            ));
        }
    }

    let dealership = &result["selected_dealership"];
    if !dealership.is_null() {
        out.push_str(&format!(
            "Selected: {}{}\n",
            dealership["dealership_id"].as_str().unwrap_or("?"),
            delay_suffix(dealership)
        ));
    }

    let appointment = &result["appointment"];
    if !appointment.is_null() {
        let id = appointment["appointment_id"]
            .as_str()
            .or_else(|| appointment["id"].as_str())
            .unwrap_or("(no id)");
        out.push_str(&format!("Appointment: {}\n", id));
    }

    out
}

fn delay_suffix(candidate: &serde_json::Value) -> String {
    match candidate["estimated_delay_minutes"].as_f64() {
        Some(m) if m > 0.0 => format!(" (~{} min delay)", m.round()),
        _ => String::new(),
    }
}

pub fn format_services(services: &[ServiceEntry]) -> String {
    let mut out = String::new();
    for s in services {
        out.push_str(&format!(
            "{:<20} {} ({} min)\n",
            s.service_code, s.name, s.average_time_minutes
        ));
    }
    out
}

// ============================================================================
// HTTP Client Calls
// ============================================================================

fn client(timeout_secs: u64) -> anyhow::Result<reqwest::blocking::Client> {
    Ok(reqwest::blocking::Client::builder()
        .timeout(std::time::Duration::from_secs(timeout_secs))
        .build()?)
}

/// Send the request and return the JSON body, exiting on transport or
/// server errors.
fn fetch_json(request: reqwest::blocking::RequestBuilder, url: &str) -> serde_json::Value {
    let resp = match request.send() {
        Ok(r) => r,
        Err(e) => {
            eprintln!("assist-cli: connection failed to {}: {}", url, e);
            std::process::exit(1);
        }
    };

    if !resp.status().is_success() {
        let status = resp.status();
        let body: serde_json::Value = resp.json().unwrap_or_default();
        let reason = body["error"]
            .as_str()
            .or_else(|| body["message"].as_str())
            .unwrap_or("no details");
        eprintln!("assist-cli: server returned {}: {}", status, reason);
        std::process::exit(1);
    }

    match resp.json() {
        Ok(v) => v,
        Err(e) => {
            eprintln!("assist-cli: failed to parse response from {}: {}", url, e);
            std::process::exit(1);
        }
    }
}

fn do_session(server: &str, customer_id: Option<String>, vin: Option<String>) -> anyhow::Result<()> {
    let url = format!("{}/chat/session", server);
    let body = serde_json::json!({ "customer_id": customer_id, "vin": vin });
    let resp = fetch_json(client(10)?.post(&url).json(&body), &url);

    println!("{}", resp["session_id"].as_str().unwrap_or("?"));
    if let Some(msg) = resp["message"].as_str() {
        eprintln!("{}", msg);
    }
    Ok(())
}

fn do_send(server: &str, body: serde_json::Value, json_output: bool) -> anyhow::Result<()> {
    // Turns can wait on four backend calls and the reply model.
    let url = format!("{}/chat/message", server);
    let resp = fetch_json(client(120)?.post(&url).json(&body), &url);

    if json_output {
        println!("{}", serde_json::to_string_pretty(&resp)?);
    } else {
        print!("{}", format_turn(&resp));
    }
    Ok(())
}

fn do_services(server: &str, json_output: bool) -> anyhow::Result<()> {
    let url = format!("{}/services", server);
    let resp = fetch_json(client(10)?.get(&url), &url);

    if json_output {
        println!("{}", serde_json::to_string_pretty(&resp)?);
        return Ok(());
    }

    let parsed: ServicesResponse = serde_json::from_value(resp)?;
    if parsed.services.is_empty() {
        eprintln!("No services in catalog");
        return Ok(());
    }
    print!("{}", format_services(&parsed.services));
    Ok(())
}

/// Show the server status by calling GET /health.
fn do_status(server: &str) -> anyhow::Result<()> {
    let client = client(10)?;

    let url = format!("{}/health", server);
    let resp = client.get(&url).send();

    match resp {
        Ok(r) if r.status().is_success() => {
            let body: serde_json::Value = r.json().unwrap_or_default();
            println!("Assistant:  {}", body["status"].as_str().unwrap_or("unknown"));
            println!("Version:    {}", body["version"].as_str().unwrap_or("?"));
            println!("Sessions:   {}", body["sessions"].as_u64().unwrap_or(0));
            println!("Renderer:   {}", body["renderer"].as_str().unwrap_or("?"));
            println!("Inventory:  {}", body["inventory_source"].as_str().unwrap_or("?"));
            println!(
                "Backend:    {} ({})",
                body["backend"]["url"].as_str().unwrap_or("-"),
                if body["backend"]["reachable"].as_bool().unwrap_or(false) {
                    "reachable"
                } else {
                    "unreachable"
                }
            );
            println!("Socket:     {}", body["socket"].as_str().unwrap_or("?"));
        }
        Ok(r) => {
            let status = r.status();
            eprintln!("assist-cli: server unhealthy (HTTP {})", status);
            std::process::exit(1);
        }
        Err(e) => {
            eprintln!("assist-cli: cannot reach {}: {}", url, e);
            std::process::exit(1);
        }
    }

    Ok(())
}

// ============================================================================
// Main
// ============================================================================

fn main() {
    let cli = Cli::parse();
    let server = cli.server.trim_end_matches('/').to_string();

    let result = match cli.command {
        Commands::Session { customer_id, vin } => do_session(&server, customer_id, vin),
        Commands::Send {
            message,
            session,
            customer_id,
            vin,
            lat,
            lng,
            json,
        } => {
            let body = message_body(
                &message,
                session.as_deref(),
                customer_id.as_deref(),
                vin.as_deref(),
                lat.zip(lng),
            );
            do_send(&server, body, json)
        }
        Commands::Services { json } => do_services(&server, json),
        Commands::Status => do_status(&server),
    };

    if let Err(e) = result {
        eprintln!("assist-cli: {}", e);
        std::process::exit(1);
    }
}

// ============================================================================
// Tests
// ============================================================================
