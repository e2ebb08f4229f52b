//! Warden CLI - OAuth 2.0 authorization server
//!
//! Run with: cargo run --bin warden -- <command>
//! Or after build: ./target/release/warden <command>

#[tokio::main]
async fn main() {
    // Load .env before configuration reads the environment
    let _ = dotenvy::dotenv();

    // Logging starts once the configured level is known
    if let Err(e) = warden::cli::run().await {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}
