//! End-to-end chat scenarios through the per-chat dispatcher.

mod common;

use std::collections::BTreeMap;
use std::time::Duration;

use common::{chat, TestApp, TestAppBuilder};
use sales_dialogue::adapters::ai::MockReplyGenerator;
use sales_dialogue::domain::conversation::{OrderStatus, Role};
use sales_dialogue::domain::escalation::{AdminCommand, AlertReason, AlertStatus};
use sales_dialogue::domain::script::{
    FlowStep, Phase, ScriptDocument, ScriptVersionName, StepKey, StepRef,
};
use sales_dialogue::ports::ScriptStore;

const ADDRESS: &str = "Juan Perez, Av. Siempreviva 742, 1414 CABA";
const ACCEPTANCE: &str = "Leí y acepto las condiciones de envío";

fn version(name: &str) -> ScriptVersionName {
    ScriptVersionName::new(name).unwrap()
}

#[tokio::test]
async fn weight_answer_moves_to_recommendation_with_the_plan_price() {
    let app = TestApp::new().await;
    app.say("c1", &["hola", "si"]).await;

    let outcome = app
        .dispatcher
        .dispatch_inbound(&chat("c1"), "60", Vec::new())
        .await
        .unwrap();

    assert_eq!(outcome.step, Some("recommendation".parse().unwrap()));
    assert!(outcome.texts()[0].contains("46.900"));
    assert!(outcome.alert_raised.is_none());
    assert!(app.dispatcher.engine().escalation().open_alerts().is_empty());
}

#[tokio::test]
async fn asking_for_a_person_raises_an_alert_with_the_order_snapshot() {
    let app = TestApp::new().await;
    app.say("c1", &["hola", "si", "60", "capsulas", "dale", "120"])
        .await;

    let outcome = app
        .dispatcher
        .dispatch_inbound(&chat("c1"), "quiero hablar con una persona", Vec::new())
        .await
        .unwrap();

    let engine = app.dispatcher.engine();
    assert_eq!(
        outcome.texts(),
        vec![engine.settings().handoff_message.as_str()]
    );
    let state = engine.sessions().get(&chat("c1")).await.unwrap().unwrap();
    assert!(!state.is_paused());

    let alert = engine.escalation().open_for(&chat("c1")).unwrap();
    assert_eq!(alert.reason(), AlertReason::HumanRequested);
    assert!(alert.order().is_some());
    assert_eq!(alert.order(), state.order());
}

#[tokio::test]
async fn confirming_an_order_resolves_its_alert_without_pausing() {
    let app = TestApp::new().await;
    app.say("c1", &["hola", "si", "60", "capsulas", "dale", "60", "si", ADDRESS])
        .await;
    let engine = app.dispatcher.engine();
    assert!(engine.escalation().open_for(&chat("c1")).is_some());

    app.dispatcher
        .admin_command(&chat("c1"), AdminCommand::parse("confirmar").unwrap())
        .await
        .unwrap();

    let state = engine.sessions().get(&chat("c1")).await.unwrap().unwrap();
    assert_eq!(state.order().unwrap().status, OrderStatus::Confirmed);
    assert_eq!(state.order().unwrap().status.label(), "Confirmado");
    assert!(!state.is_paused());
    assert!(engine.escalation().open_for(&chat("c1")).is_none());
    let resolved = engine.escalation().resolved_alerts();
    assert_eq!(resolved.len(), 1);
    assert_eq!(resolved[0].status(), AlertStatus::Resolved);
    assert!(app.bus.has_event("conversation.order_confirmed.v1"));
    assert!(app.bus.has_event("escalation.alert_resolved.v1"));
}

#[tokio::test]
async fn completion_counts_one_conversion_however_long_the_chat_goes_on() {
    let app = TestApp::new().await;
    app.say(
        "c1",
        &["hola", "si", "60", "capsulas", "dale", "120", "si", ADDRESS, ACCEPTANCE],
    )
    .await;
    app.say("c1", &["gracias", "cuando llega?", "gracias de nuevo"])
        .await;

    let stats = app
        .dispatcher
        .engine()
        .allocator()
        .stats(&version("v1"))
        .await
        .unwrap();
    assert_eq!(stats.started, 1);
    assert_eq!(stats.completed, 1);
    assert_eq!(
        app.bus
            .events_of_type("conversation.conversion_recorded.v1")
            .len(),
        1
    );
}

#[tokio::test]
async fn history_only_grows() {
    let app = TestApp::new().await;
    let engine = app.dispatcher.engine().clone();
    let mut previous = Vec::new();

    for text in ["hola", "si", "60", "no se", "capsulas"] {
        app.say("c1", &[text]).await;
        let history = engine
            .sessions()
            .get(&chat("c1"))
            .await
            .unwrap()
            .unwrap()
            .history()
            .to_vec();
        assert!(history.len() > previous.len());
        assert_eq!(&history[..previous.len()], previous.as_slice());
        previous = history;
    }
}

#[tokio::test]
async fn dangling_next_keeps_the_session_where_it_is() {
    let builder = TestAppBuilder::new();
    let greeting = StepKey::new("greeting").unwrap();
    let mut flow = BTreeMap::new();
    flow.insert(
        greeting.clone(),
        FlowStep::new(Phase::Greeting, "¡Hola! ¿Te cuento cómo funciona?")
            .with_next(StepRef::Step(StepKey::new("ghost").unwrap())),
    );
    builder
        .script_store()
        .save(&version("broken"), &ScriptDocument::new(greeting.clone(), flow))
        .await
        .unwrap();
    let app = builder.build().await;

    app.say("c1", &["hola", "si", "dale"]).await;

    let state = app
        .dispatcher
        .engine()
        .sessions()
        .get(&chat("c1"))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(state.script_version(), &version("broken"));
    assert_eq!(state.current_step(), &StepRef::Step(greeting));
}

#[tokio::test]
async fn reset_starts_the_chat_over() {
    let app = TestApp::new().await;
    app.say("c1", &["hola", "si", "60"]).await;

    assert!(app.dispatcher.reset(&chat("c1")).await.unwrap());
    assert!(app
        .dispatcher
        .engine()
        .sessions()
        .get(&chat("c1"))
        .await
        .unwrap()
        .is_none());

    let outcome = app
        .dispatcher
        .dispatch_inbound(&chat("c1"), "hola", Vec::new())
        .await
        .unwrap();
    assert_eq!(outcome.step, Some("greeting".parse().unwrap()));
    assert!(app.bus.has_event("conversation.session_reset.v1"));
}

#[tokio::test]
async fn paused_chat_is_recorded_but_not_answered() {
    let app = TestApp::new().await;
    app.say("c1", &["hola"]).await;
    assert!(app.dispatcher.set_paused(&chat("c1"), true).await.unwrap());
    app.transport.clear();

    let outcome = app
        .dispatcher
        .dispatch_inbound(&chat("c1"), "sigo aca", Vec::new())
        .await
        .unwrap();

    assert!(outcome.outbound.is_empty());
    assert!(app.transport.texts_to(&chat("c1")).is_empty());
    let state = app
        .dispatcher
        .engine()
        .sessions()
        .get(&chat("c1"))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(state.history().last().unwrap().content, "sigo aca");
}

#[tokio::test]
async fn queued_messages_are_handled_in_arrival_order() {
    let app = TestApp::new().await;
    let texts: Vec<String> = (0..6).map(|i| format!("mensaje {i}")).collect();
    for text in &texts {
        app.dispatcher
            .submit_inbound(&chat("c1"), text.clone(), Vec::new())
            .unwrap();
    }
    app.say("c1", &["ultimo"]).await;

    let state = app
        .dispatcher
        .engine()
        .sessions()
        .get(&chat("c1"))
        .await
        .unwrap()
        .unwrap();
    let received: Vec<&str> = state
        .history()
        .iter()
        .filter(|entry| entry.role == Role::Customer)
        .map(|entry| entry.content.as_str())
        .collect();
    let mut expected: Vec<&str> = texts.iter().map(String::as_str).collect();
    expected.push("ultimo");
    assert_eq!(received, expected);
}

#[tokio::test]
async fn reset_discards_a_reply_still_being_generated() {
    let generator = MockReplyGenerator::new()
        .with_delay(Duration::from_millis(100))
        .with_response("respuesta vieja");
    let app = TestAppBuilder::new().generator(generator).build().await;
    app.say("c1", &["hola", "si"]).await;

    let pending = {
        let dispatcher = app.dispatcher.clone();
        tokio::spawn(async move {
            dispatcher
                .dispatch_inbound(&chat("c1"), "mi gato se llama Michi", Vec::new())
                .await
        })
    };
    tokio::time::sleep(Duration::from_millis(20)).await;
    assert!(app.dispatcher.reset(&chat("c1")).await.unwrap());

    let outcome = pending.await.unwrap().unwrap();
    assert!(outcome.discarded);
    assert!(app
        .transport
        .texts_to(&chat("c1"))
        .iter()
        .all(|text| text != "respuesta vieja"));
    assert!(app
        .dispatcher
        .engine()
        .sessions()
        .get(&chat("c1"))
        .await
        .unwrap()
        .is_none());
}
