#[tokio::main]
async fn main() {
    let parsed = groundwork::cli::parse();
    if let Err(e) = groundwork::cmd::dispatch(parsed).await {
        groundwork::log::sync();
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}
