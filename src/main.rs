#[tokio::main]
async fn main() -> anyhow::Result<()> {
    glucolog_lib::run().await
}
