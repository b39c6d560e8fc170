//! `concierge` binary entrypoint.

#[tokio::main]
async fn main() {
    std::process::exit(concierge_cli::run().await);
}
