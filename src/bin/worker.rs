#[tokio::main]
async fn main() -> anyhow::Result<()> {
    if let Err(e) = cbt_portal::run_worker().await {
        eprintln!("cbt-worker fatal: {e:#}");
        std::process::exit(1);
    }
    Ok(())
}
