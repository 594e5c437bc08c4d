//! Shared wiring for integration tests: in-memory stores, a recording
//! transport and a mock reply generator behind a real dispatcher.

#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use sales_dialogue::adapters::ai::MockReplyGenerator;
use sales_dialogue::adapters::http::AppState;
use sales_dialogue::adapters::storage::{
    InMemoryOrderStore, InMemoryPriceStore, InMemoryScriptStore, InMemorySessionArchive,
    InMemoryStatsStore, WriteBehindSessionStore,
};
use sales_dialogue::adapters::transport::RecordingTransport;
use sales_dialogue::adapters::websocket::{DashboardBridge, DEFAULT_CAPACITY};
use sales_dialogue::adapters::InMemoryEventBus;
use sales_dialogue::application::runtime::ChatDispatcher;
use sales_dialogue::application::{
    DialogueEngine, EngineDeps, EngineSettings, EscalationManager, EscalationSettings, PriceBook,
    ScriptLibrary, VariantAllocator,
};
use sales_dialogue::domain::foundation::ChatId;
use sales_dialogue::ports::ScriptStore;

pub fn chat(id: &str) -> ChatId {
    ChatId::new(id).unwrap()
}

pub struct TestApp {
    pub dispatcher: Arc<ChatDispatcher>,
    pub bus: Arc<InMemoryEventBus>,
    pub transport: Arc<RecordingTransport>,
    pub generator: MockReplyGenerator,
    pub archive: Arc<InMemorySessionArchive>,
    pub orders: Arc<InMemoryOrderStore>,
    pub bridge: Arc<DashboardBridge>,
}

pub struct TestAppBuilder {
    scripts: Arc<InMemoryScriptStore>,
    generator: MockReplyGenerator,
    admin_numbers: Vec<ChatId>,
}

impl TestAppBuilder {
    pub fn new() -> Self {
        Self {
            scripts: Arc::new(InMemoryScriptStore::new()),
            generator: MockReplyGenerator::new(),
            admin_numbers: Vec::new(),
        }
    }

    /// Scripts saved here are what the library loads.
    pub fn script_store(&self) -> &Arc<InMemoryScriptStore> {
        &self.scripts
    }

    pub fn generator(mut self, generator: MockReplyGenerator) -> Self {
        self.generator = generator;
        self
    }

    pub fn admin(mut self, number: &str) -> Self {
        self.admin_numbers.push(chat(number));
        self
    }

    pub async fn build(self) -> TestApp {
        let bus = Arc::new(InMemoryEventBus::new());
        let bridge = DashboardBridge::new_shared(DEFAULT_CAPACITY);
        bridge.register(bus.as_ref());
        let transport = Arc::new(RecordingTransport::new());
        let archive = Arc::new(InMemorySessionArchive::new());
        let orders = Arc::new(InMemoryOrderStore::new());

        let scripts = ScriptLibrary::load(self.scripts.clone() as Arc<dyn ScriptStore>)
            .await
            .unwrap();
        let prices = PriceBook::load(Arc::new(InMemoryPriceStore::new()))
            .await
            .unwrap();
        let (allocator, _task) =
            VariantAllocator::spawn(Arc::new(InMemoryStatsStore::new()), Some(3))
                .await
                .unwrap();
        let escalation = EscalationManager::new(
            transport.clone(),
            bus.clone(),
            EscalationSettings {
                admin_numbers: self.admin_numbers,
                ..EscalationSettings::default()
            },
        );

        let deps = EngineDeps {
            sessions: Arc::new(WriteBehindSessionStore::new(archive.clone())),
            scripts: Arc::new(scripts),
            prices: Arc::new(prices),
            allocator,
            escalation: Arc::new(escalation),
            generator: Arc::new(self.generator.clone()),
            transport: transport.clone(),
            publisher: bus.clone(),
            orders: orders.clone(),
        };
        let engine = Arc::new(DialogueEngine::new(deps, EngineSettings::default()));
        TestApp {
            dispatcher: Arc::new(ChatDispatcher::new(engine, Duration::from_secs(30))),
            bus,
            transport,
            generator: self.generator,
            archive,
            orders,
            bridge,
        }
    }
}

impl TestApp {
    pub async fn new() -> Self {
        TestAppBuilder::new().build().await
    }

    pub fn state(&self) -> AppState {
        AppState {
            dispatcher: self.dispatcher.clone(),
            bridge: self.bridge.clone(),
            inbound_secret: None,
        }
    }

    /// Sends each message in order and waits for every turn.
    pub async fn say(&self, chat_id: &str, messages: &[&str]) {
        for text in messages {
            self.dispatcher
                .dispatch_inbound(&chat(chat_id), *text, Vec::new())
                .await
                .unwrap();
        }
    }
}
