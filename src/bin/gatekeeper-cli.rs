use std::path::PathBuf;
use std::time::Duration;

use axum::http::Method;
use clap::{Parser, Subcommand};
use reqwest::header::{HeaderValue, AUTHORIZATION};
use serde_json::Value;

use gatekeeper::config::profile::PROFILES_ENV;
use gatekeeper::config::{load_profiled, ActiveProfiles, GatekeeperConfig};
use gatekeeper::security::chain::SecurityChain;
use gatekeeper::security::firewall;
use gatekeeper::security::principal::Principal;
use gatekeeper::security::spa;
use gatekeeper::security::token::TokenIssuer;

#[derive(Parser)]
#[command(name = "gatekeeper-cli")]
#[command(about = "Operator CLI for the gatekeeper security gateway", long_about = None)]
struct Cli {
    /// Directory holding application.toml and its profile overlays
    #[arg(short, long, env = "GATEKEEPER_CONFIG_DIR", default_value = "config")]
    config_dir: PathBuf,

    /// Comma-separated active profiles (defaults to `dev`)
    #[arg(short, long, env = PROFILES_ENV)]
    profile: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the effective rule table, flagging shadowed rules
    Rules,
    /// Evaluate a request against the rule table without sending it
    Decide {
        method: String,
        path: String,
        /// Evaluate as an authenticated user holding these authorities
        #[arg(short, long = "authority")]
        authorities: Vec<String>,
        /// Evaluate as an anonymous request (ignores --authority)
        #[arg(long)]
        anonymous: bool,
    },
    /// Mint a bearer token with the configured secret
    Token {
        subject: String,
        #[arg(short, long = "authority")]
        authorities: Vec<String>,
        /// Override security.jwt.token_validity_secs
        #[arg(long)]
        validity_secs: Option<u64>,
    },
    /// Send a request to a running gateway and show status and security headers
    Probe {
        #[arg(short, long, default_value = "http://localhost:8080")]
        url: String,
        path: String,
        #[arg(short, long)]
        token: Option<String>,
    },
}

fn load(cli: &Cli) -> Result<GatekeeperConfig, Box<dyn std::error::Error>> {
    let profiles = ActiveProfiles::resolve(cli.profile.as_deref());
    Ok(load_profiled(&cli.config_dir, &profiles)?)
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    match &cli.command {
        Commands::Rules => {
            let chain = SecurityChain::from_config(&load(&cli)?)?;
            let table = chain.rules();
            let shadowed = table.shadowed_rules();
            for (index, rule) in table.rules().iter().enumerate() {
                let patterns: Vec<&str> = rule.patterns().iter().map(|p| p.as_str()).collect();
                println!(
                    "{:>3}  {:<7} {:<60} {}{}",
                    index,
                    rule.method().map(Method::as_str).unwrap_or("*"),
                    patterns.join(" "),
                    rule.access(),
                    if shadowed.contains(&index) { "  (shadowed)" } else { "" }
                );
            }
        }
        Commands::Decide {
            method,
            path,
            authorities,
            anonymous,
        } => {
            if let Err(rejection) = firewall::inspect(path) {
                println!("REJECTED (400): {}", rejection);
                return Ok(());
            }

            let chain = SecurityChain::from_config(&load(&cli)?)?;
            let method = Method::from_bytes(method.to_ascii_uppercase().as_bytes())?;
            let effective = spa::forward_path(path).unwrap_or(path.as_str());
            let principal = (!anonymous).then(|| Principal::new("cli", authorities.iter().cloned()));

            let matched = chain.rules().matching_rule(effective, &method);
            let decision = chain.rules().evaluate(effective, &method, principal.as_ref());

            if effective != path {
                println!("forwarded to {}", effective);
            }
            match matched {
                Some((index, rule)) => println!("rule {}: {}", index, rule.access()),
                None => println!("no rule matched"),
            }
            println!("{} ({})", decision.as_str(), decision.status());
        }
        Commands::Token {
            subject,
            authorities,
            validity_secs,
        } => {
            let config = load(&cli)?;
            let issuer = TokenIssuer::from_config(&config.security.jwt)?;
            let token = match validity_secs {
                Some(secs) => issuer.issue_with_validity(subject, authorities, Duration::from_secs(*secs))?,
                None => issuer.issue(subject, authorities)?,
            };
            println!("{}", token);
        }
        Commands::Probe { url, path, token } => {
            let client = reqwest::Client::new();
            let mut request = client.get(format!("{}{}", url.trim_end_matches('/'), path));
            if let Some(token) = token {
                request = request.header(AUTHORIZATION, HeaderValue::from_str(&format!("Bearer {}", token))?);
            }
            print_response(request.send().await?).await?;
        }
    }

    Ok(())
}

const SHOWN_HEADERS: [&str; 8] = [
    "www-authenticate",
    "content-security-policy",
    "x-frame-options",
    "referrer-policy",
    "permissions-policy",
    "strict-transport-security",
    "cache-control",
    "x-request-id",
];

async fn print_response(res: reqwest::Response) -> Result<(), Box<dyn std::error::Error>> {
    println!("{}", res.status());
    for name in SHOWN_HEADERS {
        if let Some(value) = res.headers().get(name) {
            println!("{}: {}", name, value.to_str().unwrap_or("<binary>"));
        }
    }

    let text = res.text().await?;
    match serde_json::from_str::<Value>(&text) {
        Ok(json) => println!("{}", serde_json::to_string_pretty(&json)?),
        Err(_) if !text.is_empty() => println!("{}", text),
        Err(_) => {}
    }
    Ok(())
}
