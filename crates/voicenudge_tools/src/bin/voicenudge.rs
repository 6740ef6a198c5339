#![forbid(unsafe_code)]

use std::env;
use std::io::{self, IsTerminal, Read};

use voicenudge_engines::secret_vault::SecretVault;
use voicenudge_kernel_contracts::provider_secrets::ProviderSecretId;
use voicenudge_tools::secrets_cli::{execute_secrets_command, parse_provider_secret_id};

const USAGE: &str = "usage: voicenudge <secrets|unlock> ...\n  voicenudge secrets <set|has|del|ls> [key_id]\n  voicenudge unlock <email>";

fn main() {
    if let Err(err) = run() {
        eprintln!("{err}");
        std::process::exit(2);
    }
}

fn run() -> Result<(), String> {
    let args: Vec<String> = env::args().skip(1).collect();
    match args.first().map(String::as_str) {
        Some("secrets") => run_secrets(&args[1..]),
        Some("unlock") => run_unlock(&args[1..]),
        _ => Err(USAGE.to_string()),
    }
}

fn run_secrets(args: &[String]) -> Result<(), String> {
    let subcommand = args
        .first()
        .ok_or_else(|| "usage: voicenudge secrets <set|has|del|ls> [key_id]".to_string())?
        .as_str();
    let key_id = args.get(1).map(String::as_str);
    let value = if subcommand == "set" {
        let key = key_id.ok_or_else(|| "usage: voicenudge secrets set <key_id>".to_string())?;
        let parsed = parse_provider_secret_id(key)?;
        Some(read_secret_value(parsed.as_str())?)
    } else {
        None
    };

    let vault = SecretVault::default_local();
    let output = execute_secrets_command(&vault, subcommand, key_id, value.as_deref())?;
    if !output.is_empty() {
        println!("{output}");
    }
    Ok(())
}

/// Clears a voice lock through the running adapter's operator endpoint.
fn run_unlock(args: &[String]) -> Result<(), String> {
    let email = args
        .first()
        .ok_or_else(|| "usage: voicenudge unlock <email>".to_string())?;
    let base = env::var("VOICENUDGE_ADAPTER_URL")
        .unwrap_or_else(|_| "http://127.0.0.1:8080".to_string());
    let admin_token = resolve_admin_token()?;

    let response = ureq::post(&format!("{}/v1/admin/unlock", base.trim_end_matches('/')))
        .send_json(serde_json::json!({
            "admin_token": admin_token,
            "email": email,
        }))
        .map_err(|err| match err {
            ureq::Error::Status(code, resp) => format!(
                "unlock refused ({code}): {}",
                resp.into_string().unwrap_or_default()
            ),
            other => format!("unlock request failed: {other}"),
        })?;
    let body: serde_json::Value = response
        .into_json()
        .map_err(|err| format!("unlock response unreadable: {err}"))?;
    match body.get("user_id").and_then(|v| v.as_str()) {
        Some(user_id) => println!("OK {user_id}"),
        None => println!("OK"),
    }
    Ok(())
}

fn resolve_admin_token() -> Result<String, String> {
    if let Ok(token) = env::var("VOICENUDGE_ADMIN_TOKEN") {
        let trimmed = token.trim();
        if !trimmed.is_empty() {
            return Ok(trimmed.to_string());
        }
    }
    let vault = SecretVault::default_local();
    vault
        .resolve_secret(ProviderSecretId::AdminUnlockToken)
        .map_err(|err| format!("vault lookup failed: {err}"))?
        .ok_or_else(|| {
            "no admin unlock token: set VOICENUDGE_ADMIN_TOKEN or `voicenudge secrets set admin_unlock_token`"
                .to_string()
        })
}

fn read_secret_value(key_id: &str) -> Result<String, String> {
    if io::stdin().is_terminal() {
        let prompt = format!("Enter value for {key_id}:");
        let value = rpassword::prompt_password(prompt).map_err(|e| e.to_string())?;
        if value.trim().is_empty() {
            return Err("secret value must not be empty".to_string());
        }
        Ok(value)
    } else {
        let mut input = String::new();
        io::stdin()
            .read_to_string(&mut input)
            .map_err(|e| e.to_string())?;
        let trimmed = input.trim().to_string();
        if trimmed.is_empty() {
            return Err("secret value must not be empty".to_string());
        }
        Ok(trimmed)
    }
}
