use clap::Parser;
use tubesift::cli::{exit_code, run, Cli};
use tubesift_core::error::SyncError;

#[tokio::main]
async fn main() {
    // Load environment
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    if let Err(err) = run(cli).await {
        eprintln!("[ERROR] {err:#}");
        if let Some(remedy) = err.downcast_ref::<SyncError>().and_then(SyncError::remedy) {
            eprintln!("{remedy}");
        }
        std::process::exit(exit_code(&err));
    }
}
