#[tokio::main]
async fn main() {
    if let Err(e) = graphscout_cli::run().await {
        let colored = !std::env::args().any(|arg| arg == "--no-color")
            && graphscout_cli::formatter::use_color(false);
        std::process::exit(graphscout_cli::display_error(&e, colored));
    }
}
