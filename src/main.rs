#[tokio::main]
async fn main() -> anyhow::Result<()> {
    if let Err(e) = cbt_portal::run().await {
        eprintln!("cbt-portal fatal: {e:#}");
        std::process::exit(1);
    }
    Ok(())
}
