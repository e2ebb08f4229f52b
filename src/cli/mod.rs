//! Command-line interface for Warden
//!
//! `serve` runs the authorization server; the other commands provision
//! users and clients directly against the configured storage.

use crate::auth::{ClientRegistrationRequest, ClientRegistry};
use crate::config::Config;
use crate::constants::CONFIG_FILE_NAME;
use crate::model::User;
use crate::storage::create_storage_from_config;
use crate::{Result, WardenError};
use clap::{Arg, ArgAction, ArgMatches, Command};
use serde_json::json;

/// Main CLI entry point
pub async fn run() -> Result<()> {
    let matches = build_cli().get_matches();

    let mut config = load_config(&matches)?;
    crate::init_logging(config.log.as_ref().and_then(|l| l.level.as_deref()));

    match matches.subcommand() {
        Some(("serve", sub)) => handle_serve_command(&mut config, sub).await,
        Some(("users", sub)) => handle_users_command(&config, sub).await,
        Some(("clients", sub)) => handle_clients_command(&config, sub).await,
        Some(("tokens", sub)) => handle_tokens_command(&config, sub).await,
        _ => {
            eprintln!("No command specified. Use --help for usage information.");
            std::process::exit(1);
        }
    }
}

/// Build the command tree
pub fn build_cli() -> Command {
    Command::new("warden")
        .about("Warden - OAuth 2.0 authorization server for MCP services")
        .version(env!("CARGO_PKG_VERSION"))
        .arg(
            Arg::new("config")
                .long("config")
                .short('c')
                .global(true)
                .help("Path to the configuration file (JSON or YAML)"),
        )
        .subcommand(
            Command::new("serve")
                .about("Start the authorization server")
                .arg(Arg::new("host").long("host").help("Host to bind to"))
                .arg(
                    Arg::new("port")
                        .long("port")
                        .value_parser(clap::value_parser!(u16))
                        .help("Port to bind to"),
                ),
        )
        .subcommand(
            Command::new("users")
                .about("User whitelist management")
                .subcommand_required(true)
                .subcommand(
                    Command::new("add")
                        .about("Whitelist a user")
                        .arg(Arg::new("email").long("email").required(true))
                        .arg(Arg::new("name").long("name"))
                        .arg(Arg::new("role").long("role").default_value("user")),
                ),
        )
        .subcommand(
            Command::new("clients")
                .about("OAuth client management")
                .subcommand_required(true)
                .subcommand(
                    Command::new("register")
                        .about("Register an OAuth client")
                        .arg(Arg::new("name").long("name"))
                        .arg(
                            Arg::new("redirect-uri")
                                .long("redirect-uri")
                                .action(ArgAction::Append)
                                .help("Allowed redirect URI (repeatable)"),
                        )
                        .arg(Arg::new("json").long("json").action(ArgAction::SetTrue)),
                ),
        )
        .subcommand(
            Command::new("tokens")
                .about("Token record maintenance")
                .subcommand_required(true)
                .subcommand(Command::new("purge").about("Delete expired token records")),
        )
}

fn load_config(matches: &ArgMatches) -> Result<Config> {
    let path = matches
        .get_one::<String>("config")
        .map(String::as_str)
        .unwrap_or(CONFIG_FILE_NAME);

    let mut config = Config::load_from_path(path)?;
    config.apply_env()?;
    config.validate()?;
    Ok(config)
}

fn required<'a>(matches: &'a ArgMatches, key: &str) -> Result<&'a String> {
    matches
        .get_one::<String>(key)
        .ok_or_else(|| WardenError::validation(format!("--{} is required", key)))
}

async fn handle_serve_command(config: &mut Config, matches: &ArgMatches) -> Result<()> {
    if let Some(host) = matches.get_one::<String>("host") {
        config.http.host = host.clone();
    }
    if let Some(port) = matches.get_one::<u16>("port") {
        config.http.port = *port;
    }

    println!(
        "Starting Warden on {}:{}",
        config.http.host, config.http.port
    );
    println!("   Issuer:   {}", config.server_url());
    println!("   Provider: {}", config.provider.name);
    println!("   Press Ctrl+C to stop\n");

    crate::http::start_server(config.clone()).await
}

async fn handle_users_command(config: &Config, matches: &ArgMatches) -> Result<()> {
    let storage = create_storage_from_config(&config.storage).await?;

    if let Some(("add", sub)) = matches.subcommand() {
        let email = required(sub, "email")?;
        let name = sub.get_one::<String>("name").unwrap_or(email);
        let role = required(sub, "role")?;

        if storage.find_user_by_email(email).await?.is_some() {
            return Err(WardenError::validation(format!(
                "User {} already exists",
                email
            )));
        }

        let user = User::new(email.clone(), name.clone(), role.clone());
        storage.save_user(&user).await?;
        println!("User {} added ({})", user.email, user.id);
    }

    Ok(())
}

async fn handle_clients_command(config: &Config, matches: &ArgMatches) -> Result<()> {
    let storage = create_storage_from_config(&config.storage).await?;
    let registry = ClientRegistry::new(storage);

    if let Some(("register", sub)) = matches.subcommand() {
        let redirect_uris: Option<Vec<String>> = sub
            .get_many::<String>("redirect-uri")
            .map(|uris| uris.cloned().collect());

        let client = registry
            .register(ClientRegistrationRequest {
                client_name: sub.get_one::<String>("name").cloned(),
                redirect_uris,
                ..Default::default()
            })
            .await?;

        if sub.get_flag("json") {
            println!(
                "{}",
                serde_json::to_string_pretty(&json!({
                    "client_id": client.id,
                    "client_secret": client.secret,
                    "redirect_uris": client.redirect_uris,
                }))?
            );
        } else {
            println!("\nOAuth client registered");
            println!("Client ID:     {}", client.id);
            println!("Client Secret: {}", client.secret);
            println!("Redirect URIs: {}", client.redirect_uris.join(", "));
        }
    }

    Ok(())
}

async fn handle_tokens_command(config: &Config, matches: &ArgMatches) -> Result<()> {
    let storage = create_storage_from_config(&config.storage).await?;

    if let Some(("purge", _)) = matches.subcommand() {
        let removed = storage.cleanup_expired_tokens().await?;
        println!("Removed {} expired token records", removed);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_definition_is_consistent() {
        build_cli().debug_assert();
    }

    #[test]
    fn test_parse_repeated_redirect_uris() {
        let matches = build_cli()
            .try_get_matches_from([
                "warden",
                "clients",
                "register",
                "--name",
                "Inspector",
                "--redirect-uri",
                "http://localhost:3000/a",
                "--redirect-uri",
                "http://localhost:3000/b",
            ])
            .unwrap();

        let Some(("clients", clients)) = matches.subcommand() else {
            panic!("expected clients subcommand");
        };
        let Some(("register", register)) = clients.subcommand() else {
            panic!("expected register subcommand");
        };
        let uris: Vec<&String> = register.get_many::<String>("redirect-uri").unwrap().collect();
        assert_eq!(uris.len(), 2);
    }

    #[test]
    fn test_serve_port_must_be_numeric() {
        let result = build_cli().try_get_matches_from(["warden", "serve", "--port", "http"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_global_config_flag() {
        let matches = build_cli()
            .try_get_matches_from(["warden", "tokens", "purge", "--config", "custom.yaml"])
            .unwrap();
        assert_eq!(
            matches.get_one::<String>("config").map(String::as_str),
            Some("custom.yaml")
        );
    }
}
