use std::sync::Arc;

use tokio::sync::watch;
use tracing_subscriber::EnvFilter;

use sales_dialogue::adapters::ai::{DisabledReplyGenerator, OpenAIConfig, OpenAIReplyGenerator};
use sales_dialogue::adapters::http::{api_router, AppState};
use sales_dialogue::adapters::storage::{
    FileOrderStore, FilePriceStore, FileScriptStore, FileSessionArchive, FileStatsStore,
    WriteBehindSessionStore,
};
use sales_dialogue::adapters::transport::{LoggingTransport, WebhookTransport};
use sales_dialogue::adapters::websocket::{DashboardBridge, DEFAULT_CAPACITY};
use sales_dialogue::adapters::InMemoryEventBus;
use sales_dialogue::application::runtime::{
    ChatDispatcher, SessionFlusher, SessionFlusherConfig, UpkeepScheduler,
};
use sales_dialogue::application::{
    DialogueEngine, EngineDeps, EngineSettings, EscalationManager, EscalationSettings, PriceBook,
    ScriptLibrary, VariantAllocator,
};
use sales_dialogue::config::{AiProvider, AppConfig, LoggingConfig};
use sales_dialogue::ports::{MessageTransport, ReplyGenerator};

type BoxError = Box<dyn std::error::Error + Send + Sync>;

#[tokio::main]
async fn main() -> Result<(), BoxError> {
    let config = AppConfig::load()?;
    init_tracing(&config.logging);
    config.validate()?;

    let data_dir = &config.storage.data_dir;
    tracing::info!(data_dir = %data_dir.display(), "starting sales-dialogue");

    let bus = Arc::new(InMemoryEventBus::new());
    let bridge = DashboardBridge::new_shared(DEFAULT_CAPACITY);
    bridge.register(bus.as_ref());

    let transport = build_transport(&config)?;
    let generator = build_generator(&config)?;

    let scripts = ScriptLibrary::load(Arc::new(FileScriptStore::new(data_dir))).await?;
    let prices = PriceBook::load(Arc::new(FilePriceStore::new(data_dir))).await?;
    let (allocator, allocator_task) =
        VariantAllocator::spawn(Arc::new(FileStatsStore::new(data_dir)), None).await?;
    let sessions =
        Arc::new(WriteBehindSessionStore::load(Arc::new(FileSessionArchive::new(data_dir))).await?);

    let escalation = EscalationManager::new(
        transport.clone(),
        bus.clone(),
        EscalationSettings {
            admin_numbers: config.alerts.admin_numbers()?,
            dedup_window: config.alerts.dedup_window(),
            max_resolved: config.alerts.max_resolved,
        },
    );

    let deps = EngineDeps {
        sessions: sessions.clone(),
        scripts: Arc::new(scripts),
        prices: Arc::new(prices),
        allocator,
        escalation: Arc::new(escalation),
        generator,
        transport,
        publisher: bus.clone(),
        orders: Arc::new(FileOrderStore::new(data_dir)),
    };
    let engine = Arc::new(DialogueEngine::new(
        deps,
        EngineSettings::from_config(&config.engine, &config.ai, &config.scheduler),
    ));
    let dispatcher = Arc::new(ChatDispatcher::new(engine, config.engine.worker_idle()));

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let flusher = SessionFlusher::new(
        sessions,
        SessionFlusherConfig::from_storage(&config.storage),
    );
    // Stops before the workers drain; the flusher stops after them
    let (scheduler_stop, scheduler_rx) = watch::channel(false);
    let scheduler_task = config.scheduler.enabled.then(|| {
        let scheduler = UpkeepScheduler::new(dispatcher.clone(), &config.scheduler);
        tokio::spawn(async move { scheduler.run(scheduler_rx).await })
    });
    let flusher_task = tokio::spawn(async move { flusher.run(shutdown_rx).await });

    let state = AppState {
        dispatcher: dispatcher.clone(),
        bridge,
        inbound_secret: config.transport.inbound_secret.clone(),
    };
    let app = api_router(state, &config.server);

    let addr = config.server.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(%addr, "listening");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    let _ = scheduler_stop.send(true);
    if let Some(task) = scheduler_task {
        if let Err(error) = task.await {
            tracing::error!(%error, "upkeep scheduler panicked");
        }
    }

    tracing::info!("draining chat workers");
    dispatcher.close().await;
    drop(dispatcher);

    let _ = shutdown_tx.send(true);
    match flusher_task.await {
        Ok(report) if report.failed > 0 => {
            tracing::error!(failed = report.failed, "sessions left unsaved at shutdown")
        }
        Ok(_) => {}
        Err(error) => tracing::error!(%error, "session flusher panicked"),
    }
    allocator_task.abort();
    Ok(())
}

fn init_tracing(logging: &LoggingConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(logging.filter.clone()));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    if logging.json {
        builder.json().init();
    } else {
        builder.init();
    }
}

fn build_transport(config: &AppConfig) -> Result<Arc<dyn MessageTransport>, BoxError> {
    match &config.transport.send_url {
        Some(url) => Ok(Arc::new(WebhookTransport::new(
            url.clone(),
            config.transport.send_token.clone(),
            config.transport.timeout(),
        )?)),
        None => {
            tracing::warn!("no gateway send_url configured, outbound messages are only logged");
            Ok(Arc::new(LoggingTransport))
        }
    }
}

fn build_generator(config: &AppConfig) -> Result<Arc<dyn ReplyGenerator>, BoxError> {
    let ai = &config.ai;
    match (ai.provider, &ai.api_key) {
        (AiProvider::OpenAI, Some(key)) => {
            let openai = OpenAIConfig::new(key.clone())
                .with_model(ai.model.clone())
                .with_base_url(ai.base_url.clone())
                .with_system_prompt(ai.system_prompt.clone())
                .with_timeout(ai.timeout())
                .with_max_retries(ai.max_retries);
            Ok(Arc::new(OpenAIReplyGenerator::new(openai)?))
        }
        _ => Ok(Arc::new(DisabledReplyGenerator)),
    }
}

async fn shutdown_signal() {
    if let Err(error) = tokio::signal::ctrl_c().await {
        tracing::error!(%error, "failed to listen for shutdown signal");
    }
    tracing::info!("shutdown requested");
}
