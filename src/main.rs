use clap::Parser;

#[tokio::main]
async fn main() {
    let cli = weeproxy::cli::Cli::parse();
    if let Err(e) = weeproxy::cmd::dispatch(cli).await {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}
