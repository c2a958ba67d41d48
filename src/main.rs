#[tokio::main]
async fn main() -> anyhow::Result<()> {
    cartelera_lib::run().await
}
