use drive_mirror::config::MirrorConfig;
use drive_mirror::runtime::MirrorRuntime;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let config = MirrorConfig::from_env()?;
    let runtime = MirrorRuntime::bootstrap(config).await?;
    runtime.run().await
}
