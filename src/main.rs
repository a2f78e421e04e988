#[tokio::main]
async fn main() -> Result<(), anyhow::Error> {
    voxmemo::app::run().await
}
