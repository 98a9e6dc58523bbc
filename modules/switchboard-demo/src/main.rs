mod config;
mod items;

use std::sync::Arc;

use anyhow::Result;
use futures::StreamExt;
use tokio::runtime::Handle;
use tracing::info;
use tracing_subscriber::EnvFilter;

use config::DemoConfig;
use items::{summary, FixtureSource, ItemsEvent, ItemsState};
use switchboard_store::{create, Diagnostics, Projection, StoreConfig, TracingLogger};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("switchboard=info".parse()?))
        .init();

    info!("Switchboard demo starting...");

    let config = DemoConfig::from_env()?;

    let source = Arc::new(FixtureSource::new(
        vec!["alpha".into(), "bravo".into(), "charlie".into()],
        config.fetch_delay,
    ));

    let mut store_config = StoreConfig::builder()
        .initial_state(ItemsState::default())
        .delegates(items::delegates(source))
        .executor(Handle::current())
        .init_events(vec![ItemsEvent::Load])
        .build();
    if config.diagnostics {
        store_config.diagnostics = Some(Diagnostics::new(
            config.store_name.clone(),
            TracingLogger::new(),
        ));
    }
    let store = create(store_config);

    // The "UI": render every projected summary until the store goes away.
    let view = Projection::new(
        &store.handle(),
        summary,
        config.projection_stop,
        Handle::current(),
    );
    let mut frames = view.observe();
    let renderer = tokio::spawn(async move {
        while let Some(frame) = frames.next().await {
            info!(frame = %frame, "render");
        }
    });

    tokio::time::sleep(config.fetch_delay * 2).await;
    store.accept(ItemsEvent::Select(1));
    store.accept(ItemsEvent::Refresh);
    tokio::time::sleep(config.fetch_delay * 2).await;
    store.accept(ItemsEvent::Select(2));

    info!(state = %serde_json::to_string(&store.state())?, "final state");

    store.dispose();
    renderer.await?;

    info!("Switchboard demo finished");
    Ok(())
}
