use anyhow::Result;

#[tokio::main]
async fn main() -> Result<()> {
    nvchat::run().await
}
