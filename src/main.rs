use clap::Parser;
use secretsync::cli::{self, Cli};

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    // Config loading can fail before the subscriber exists, so errors are
    // printed directly.
    let code = match cli::execute(cli).await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("error: {e:#}");
            1
        }
    };
    std::process::exit(code);
}
