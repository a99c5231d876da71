#[tokio::main]
async fn main() {
    if let Err(e) = sketch_server::run_with_config().await {
        tracing::error!(error = %e, "server exited with error");
        std::process::exit(1);
    }
}
