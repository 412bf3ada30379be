#[tokio::main]
async fn main() -> std::io::Result<()> {
    space_client::run_with_config().await
}
