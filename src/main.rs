use std::sync::Arc;

use anyhow::Result;
use tracing::{error, info};

use oj_core::core::languages::load_languages;
use oj_core::core::{Config, StoreKind};
use oj_core::engine::sandbox::DockerRuntime;
use oj_core::infra::{MemoryStore, RedisManager, RedisStore, Store};
use oj_core::JudgeCore;

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("oj_core=info".parse()?),
        )
        .init();

    let config = Config::from_env()?;
    info!("Starting judge worker...");

    let store: Arc<dyn Store> = match config.store {
        StoreKind::Redis => Arc::new(RedisStore::with_url(&config.redis_url).await?),
        StoreKind::Memory => Arc::new(MemoryStore::new()),
    };

    let languages = load_languages(config.languages_path.as_deref())?;
    for language in languages {
        info!("Registered language {} (id {})", language.name, language.id);
        store.insert_language(language).await?;
    }

    let runtime = Arc::new(DockerRuntime::new(&config.sandbox));
    let core = JudgeCore::start(&config, store, runtime);

    let mut queue = RedisManager::with_url(&config.redis_url).await?;
    info!("Waiting for jobs...");

    loop {
        tokio::select! {
            job = queue.pop_job() => match job {
                Ok(job) => {
                    info!("Received {:?}", job);
                    if let Err(e) = core.submit(job).await {
                        error!("Failed to dispatch job: {:#}", e);
                    }
                }
                Err(e) => {
                    error!("Job queue failed: {:#}", e);
                    break;
                }
            },
            _ = tokio::signal::ctrl_c() => {
                info!("Shutdown requested, draining queued jobs...");
                break;
            }
        }
    }

    core.shutdown().await;
    Ok(())
}
