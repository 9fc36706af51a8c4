// End-to-end turns through DialogApp: state resolution, hooks, directive
// ordering and error recovery, observed through a TextReply.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::{json, Map, Value};

use parley_core::config::EngineConfig;
use parley_core::directive::ANY_PLATFORM;
use parley_core::{
    reply_as, Directive, DirectiveContext, DialogEvent, HandlerOutput, ParleyError, Reply,
    Result, SessionId, Transition,
};
use parley_engine::{handler_fn, DialogApp, IntentMap, JsonViews, TextReply};
use parley_hooks::{
    after_state_fn, before_reply_fn, before_state_fn, error_fn, session_started_fn, unhandled_fn,
    BeforeAction,
};

fn views() -> JsonViews {
    JsonViews::new(json!({
        "Launch": { "Welcome": "Welcome!", "Ask": "What next?" },
        "Greeting": { "Hello": "Hello", "World": "world" },
        "Help": "Say launch to start.",
        "Blocked": "Not now.",
        "Fallback": "Sorry, I did not get that.",
        "Error": { "Generic": "Something broke, starting over." },
        "Step": { "One": "one", "Two": "two", "Three": "three" }
    }))
}

fn app() -> DialogApp {
    app_with(EngineConfig::default())
}

fn app_with(config: EngineConfig) -> DialogApp {
    DialogApp::new(config, Arc::new(views()))
}

fn resume(intent: &str, state: &str) -> DialogEvent {
    let mut attrs = Map::new();
    attrs.insert("state".to_string(), json!(state));
    attrs.insert("model".to_string(), json!({}));
    DialogEvent::new("text", intent).with_session(SessionId::from("s-1"), attrs)
}

/// Records its tag as a directive on a text reply.
struct Tag(&'static str);

#[async_trait]
impl Directive for Tag {
    fn key(&self) -> &'static str {
        "tag"
    }

    fn platform(&self) -> &'static str {
        ANY_PLATFORM
    }

    async fn write_to_reply(&self, reply: &mut dyn Reply, _ctx: &DirectiveContext<'_>) -> Result<()> {
        let text = reply_as::<TextReply>(reply, self.key())?;
        text.push_directive(self.0, Value::Null);
        Ok(())
    }
}

/// Needs prior spoken content, like a media response.
struct Media;

#[async_trait]
impl Directive for Media {
    fn key(&self) -> &'static str {
        "media"
    }

    fn platform(&self) -> &'static str {
        ANY_PLATFORM
    }

    async fn write_to_reply(&self, reply: &mut dyn Reply, _ctx: &DirectiveContext<'_>) -> Result<()> {
        if !reply.has_messages() {
            return Err(ParleyError::Directive(
                "media requires a prior statement".to_string(),
            ));
        }
        reply_as::<TextReply>(reply, self.key())?.push_directive("media", Value::Null);
        Ok(())
    }
}

#[tokio::test]
async fn launch_intent_routes_into_launch_state() {
    let mut app = app();
    app.on_intents("entry", IntentMap::new().route("LaunchIntent", "launch"))
        .unwrap();
    app.on_state(
        "launch",
        handler_fn(|_e, _m| Ok(HandlerOutput::Content("Launch.Welcome".to_string()))),
    )
    .unwrap();

    let mut reply = TextReply::new();
    let outcome = app
        .execute(DialogEvent::new("text", "LaunchIntent"), &mut reply)
        .await;

    assert!(outcome.error.is_none());
    assert_eq!(outcome.state, "launch");
    assert_eq!(outcome.hops, 1);
    assert!(reply.has_terminated());
    assert_eq!(reply.speech(), "Welcome!");
    assert_eq!(reply.session()["state"], "launch");
}

#[tokio::test]
async fn missing_to_stays_in_current_state() {
    let mut app = app();
    app.on_state(
        "launch",
        handler_fn(|_e, _m| Ok(Transition::reply("Launch.Ask").into())),
    )
    .unwrap();

    let mut reply = TextReply::new();
    let outcome = app.execute(resume("AnyIntent", "launch"), &mut reply).await;

    assert!(outcome.error.is_none());
    assert_eq!(outcome.state, "launch");
    assert_eq!(outcome.hops, 0);
    assert!(!reply.has_terminated());
    assert_eq!(reply.speech(), "What next?");
}

#[tokio::test]
async fn statements_concatenate_in_order() {
    let mut app = app();
    app.on_intent(
        "GreetIntent",
        handler_fn(|_e, _m| {
            Ok(Transition::reply("Greeting.Hello")
                .with_reply("Greeting.World")
                .into())
        }),
    )
    .unwrap();

    let mut reply = TextReply::new();
    app.execute(DialogEvent::new("text", "GreetIntent"), &mut reply)
        .await;
    assert_eq!(reply.speech(), "Hello world");
}

#[tokio::test]
async fn chained_states_accumulate_content() {
    let mut app = app();
    app.on_intents("entry", IntentMap::new().route("GoIntent", "one"))
        .unwrap();
    app.on_state(
        "one",
        handler_fn(|_e, _m| Ok(Transition::reply("Step.One").with_to("two").into())),
    )
    .unwrap();
    app.on_state(
        "two",
        handler_fn(|_e, _m| {
            Ok(Transition::reply("Step.Two")
                .with_to("three")
                .with_directive(Tag("from-two"))
                .into())
        }),
    )
    .unwrap();
    app.on_state(
        "three",
        handler_fn(|_e, _m| Ok(Transition::reply("Step.Three").into())),
    )
    .unwrap();

    let mut reply = TextReply::new();
    let outcome = app
        .execute(DialogEvent::new("text", "GoIntent"), &mut reply)
        .await;

    assert!(outcome.error.is_none());
    assert_eq!(outcome.hops, 3);
    assert_eq!(outcome.state, "three");
    assert_eq!(reply.speech(), "one two three");
    assert_eq!(reply.directive_types(), vec!["from-two"]);
}

#[tokio::test]
async fn directives_apply_in_list_order() {
    for (first, second) in [("A", "B"), ("B", "A")] {
        let mut app = app();
        app.on_intent(
            "TagIntent",
            handler_fn(move |_e, _m| {
                Ok(Transition::reply("Help")
                    .with_directive(Tag(first))
                    .with_directive(Tag(second))
                    .into())
            }),
        )
        .unwrap();

        let mut reply = TextReply::new();
        app.execute(DialogEvent::new("text", "TagIntent"), &mut reply)
            .await;
        assert_eq!(reply.directive_types(), vec![first, second]);
    }
}

#[tokio::test]
async fn unmapped_intent_without_hook_yields_apology() {
    let mut app = app();
    app.on_intents("entry", IntentMap::new().route("LaunchIntent", "entry"))
        .unwrap();

    let mut reply = TextReply::new();
    let outcome = app
        .execute(DialogEvent::new("text", "WeatherIntent"), &mut reply)
        .await;

    let err = outcome.error.expect("unhandled intent is fatal");
    assert_eq!(err.code(), "UNHANDLED_INTENT");
    assert_eq!(outcome.state, "entry");
    assert!(reply.has_terminated());
    assert_eq!(reply.speech(), app.config().apology);
}

#[tokio::test]
async fn unhandled_hook_supplies_fallback() {
    let mut app = app();
    app.on_intents("entry", IntentMap::new().route("LaunchIntent", "entry"))
        .unwrap();
    app.hooks_mut().on_unhandled_state(
        "fallback",
        unhandled_fn(|_e, _m, _state| Ok(Some(Transition::reply("Fallback")))),
    );

    let mut reply = TextReply::new();
    let outcome = app
        .execute(DialogEvent::new("text", "WeatherIntent"), &mut reply)
        .await;

    assert!(outcome.error.is_none());
    assert_eq!(outcome.state, "entry");
    assert!(!reply.has_terminated());
    assert_eq!(reply.speech(), "Sorry, I did not get that.");
}

#[tokio::test]
async fn error_hook_transition_recovers_turn() {
    let mut app = app();
    app.on_state("launch", handler_fn(|_e, _m| Err(ParleyError::handler("boom"))))
        .unwrap();
    app.on_state(
        "entry",
        handler_fn(|_e, _m| Ok(Transition::reply("Help").into())),
    )
    .unwrap();
    app.hooks_mut().on_error(
        "generic",
        error_fn(|_e, err| {
            (err.code() == "HANDLER_ERROR").then(|| Transition::reply("Error.Generic").with_to("entry"))
        }),
    );

    let mut reply = TextReply::new();
    let outcome = app.execute(resume("AnyIntent", "launch"), &mut reply).await;

    assert_eq!(outcome.error.as_ref().map(ParleyError::code), Some("HANDLER_ERROR"));
    assert_eq!(outcome.state, "entry");
    assert_eq!(reply.speech(), "Something broke, starting over.");
    assert!(!reply.has_terminated());
    assert_eq!(reply.session()["state"], "entry");
}

#[tokio::test]
async fn directive_precondition_failure_leaves_no_partial_payload() {
    let mut app = app();
    app.on_intent(
        "PlayIntent",
        handler_fn(|_e, _m| Ok(Transition::default().with_directive(Media).into())),
    )
    .unwrap();

    let mut reply = TextReply::new();
    let outcome = app
        .execute(DialogEvent::new("text", "PlayIntent"), &mut reply)
        .await;

    assert_eq!(outcome.error.as_ref().map(ParleyError::code), Some("DIRECTIVE_ERROR"));
    assert!(!reply.has_directive(&"media".into()));
    assert_eq!(reply.speech(), app.config().apology);
}

#[tokio::test]
async fn directive_after_content_succeeds() {
    let mut app = app();
    app.on_intent(
        "PlayIntent",
        handler_fn(|_e, _m| Ok(Transition::reply("Help").with_directive(Media).into())),
    )
    .unwrap();

    let mut reply = TextReply::new();
    let outcome = app
        .execute(DialogEvent::new("text", "PlayIntent"), &mut reply)
        .await;

    assert!(outcome.error.is_none());
    assert!(reply.has_directive(&"media".into()));
}

#[tokio::test]
async fn cycle_is_cut_off_by_hop_budget() {
    let mut app = app_with(EngineConfig {
        max_hops: 4,
        ..EngineConfig::default()
    });
    app.on_intents("entry", IntentMap::new().route("LoopIntent", "ping"))
        .unwrap();
    app.on_state("ping", handler_fn(|_e, _m| Ok(Transition::to("pong").into())))
        .unwrap();
    app.on_state("pong", handler_fn(|_e, _m| Ok(Transition::to("ping").into())))
        .unwrap();

    let mut reply = TextReply::new();
    let outcome = app
        .execute(DialogEvent::new("text", "LoopIntent"), &mut reply)
        .await;

    assert_eq!(outcome.error.as_ref().map(ParleyError::code), Some("INFINITE_LOOP"));
    assert!(reply.has_terminated());
}

#[tokio::test]
async fn unknown_target_state_is_fatal() {
    let mut app = app();
    app.on_intent(
        "LostIntent",
        handler_fn(|_e, _m| Ok(Transition::to("nowhere").into())),
    )
    .unwrap();

    let mut reply = TextReply::new();
    let outcome = app
        .execute(DialogEvent::new("text", "LostIntent"), &mut reply)
        .await;

    match outcome.error {
        Some(ParleyError::UnknownState { name }) => assert_eq!(name, "nowhere"),
        other => panic!("expected unknown state, got {other:?}"),
    }
}

#[tokio::test]
async fn terminal_marker_ends_session_and_restarts_at_entry() {
    let mut app = app();
    app.on_intents("entry", IntentMap::new().route("StopIntent", "die").route("LaunchIntent", "launch"))
        .unwrap();
    app.on_state(
        "launch",
        handler_fn(|_e, _m| Ok(Transition::reply("Launch.Ask").into())),
    )
    .unwrap();

    let mut reply = TextReply::new();
    let outcome = app
        .execute(DialogEvent::new("text", "StopIntent"), &mut reply)
        .await;
    assert_eq!(outcome.state, "die");
    assert!(reply.has_terminated());

    // A session persisted in the terminal marker resumes from entry.
    let mut reply = TextReply::new();
    let outcome = app.execute(resume("LaunchIntent", "die"), &mut reply).await;
    assert!(outcome.error.is_none());
    assert_eq!(outcome.state, "launch");
}

#[tokio::test]
async fn before_hook_redirect_and_short_circuit() {
    let mut app = app();
    app.on_state(
        "launch",
        handler_fn(|_e, _m| Ok(Transition::reply("Launch.Ask").into())),
    )
    .unwrap();
    app.on_state("help", handler_fn(|_e, _m| Ok(Transition::reply("Help").into())))
        .unwrap();
    app.hooks_mut().on_before_state_changed(
        "gate",
        before_state_fn(|event, _m, state| {
            Ok(match (event.intent_name.as_str(), state) {
                ("HelpIntent", "launch") => BeforeAction::Redirect("help".to_string()),
                ("BlockedIntent", _) => BeforeAction::Handled(Transition::tell("Blocked")),
                _ => BeforeAction::Continue,
            })
        }),
    );

    let mut reply = TextReply::new();
    let outcome = app.execute(resume("HelpIntent", "launch"), &mut reply).await;
    assert!(outcome.error.is_none());
    assert_eq!(outcome.state, "help");
    assert_eq!(reply.speech(), "Say launch to start.");

    let mut reply = TextReply::new();
    let outcome = app.execute(resume("BlockedIntent", "launch"), &mut reply).await;
    assert!(outcome.error.is_none());
    assert_eq!(outcome.state, "launch");
    assert!(reply.has_terminated());
    assert_eq!(reply.speech(), "Not now.");
}

#[tokio::test]
async fn before_hook_redirect_to_terminal_marker_ends_session() {
    let mut app = app();
    app.on_state(
        "launch",
        handler_fn(|_e, _m| Ok(Transition::reply("Launch.Ask").into())),
    )
    .unwrap();
    app.hooks_mut().on_before_state_changed(
        "quit",
        before_state_fn(|event, _m, _state| {
            Ok(if event.intent_name == "QuitIntent" {
                BeforeAction::Redirect("die".to_string())
            } else {
                BeforeAction::Continue
            })
        }),
    );

    let mut reply = TextReply::new();
    let outcome = app.execute(resume("QuitIntent", "launch"), &mut reply).await;

    assert!(outcome.error.is_none());
    assert_eq!(outcome.state, "die");
    assert_eq!(outcome.hops, 0);
    assert!(reply.has_terminated());
    assert!(reply.speech().is_empty());
    assert_eq!(reply.session()["state"], "die");
}

#[tokio::test]
async fn after_hook_can_redirect_and_add_directives() {
    let mut app = app();
    app.on_state(
        "one",
        handler_fn(|_e, _m| Ok(Transition::reply("Step.One").into())),
    )
    .unwrap();
    app.on_state(
        "two",
        handler_fn(|_e, _m| Ok(Transition::reply("Step.Two").into())),
    )
    .unwrap();
    app.hooks_mut().on_after_state_changed(
        "detour",
        after_state_fn(|_e, _m, state, transition| {
            if state == "one" {
                transition.to = Some("two".to_string());
                transition.directives.push(Box::new(Tag("after")));
            }
            Ok(())
        }),
    );

    let mut reply = TextReply::new();
    let outcome = app.execute(resume("GoIntent", "one"), &mut reply).await;

    assert!(outcome.error.is_none());
    assert_eq!(outcome.state, "two");
    assert_eq!(outcome.hops, 1);
    assert_eq!(reply.speech(), "one two");
    assert_eq!(reply.directive_types(), vec!["after"]);
}

#[tokio::test]
async fn session_started_hooks_run_only_for_new_sessions() {
    let calls = Arc::new(AtomicUsize::new(0));
    let mut app = app();
    app.on_state("entry", handler_fn(|_e, _m| Ok(Transition::reply("Help").into())))
        .unwrap();
    let counter = Arc::clone(&calls);
    app.hooks_mut().on_session_started(
        "greet",
        session_started_fn(move |_e, model| {
            counter.fetch_add(1, Ordering::SeqCst);
            model.set("greeted", true);
            Ok(())
        }),
    );

    let mut reply = TextReply::new();
    app.execute(resume("AnyIntent", "entry"), &mut reply).await;
    assert_eq!(calls.load(Ordering::SeqCst), 0);
    assert!(reply.session()["model"].get("greeted").is_none());

    let mut reply = TextReply::new();
    app.execute(DialogEvent::new("text", "AnyIntent"), &mut reply)
        .await;
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert_eq!(reply.session()["model"]["greeted"], true);
}

#[tokio::test]
async fn before_reply_sees_settled_state_before_directives() {
    let seen: Arc<Mutex<Vec<(String, bool, Vec<&'static str>)>>> = Arc::default();
    let mut app = app();
    app.on_state(
        "one",
        handler_fn(|_e, _m| Ok(Transition::reply("Step.One").with_to("two").into())),
    )
    .unwrap();
    app.on_state(
        "two",
        handler_fn(|_e, _m| {
            Ok(Transition::reply("Step.Two")
                .with_directive(Tag("from-two"))
                .into())
        }),
    )
    .unwrap();
    let log = Arc::clone(&seen);
    app.hooks_mut().on_before_reply_sent(
        "preamble",
        before_reply_fn(move |_e, model, reply, transition| {
            log.lock().unwrap().push((
                model.state.clone(),
                reply.has_messages(),
                transition.directive_keys(),
            ));
            reply.add_statement("Heads up.", true);
            Ok(())
        }),
    );

    let mut reply = TextReply::new();
    let outcome = app.execute(resume("GoIntent", "one"), &mut reply).await;

    assert!(outcome.error.is_none());
    assert_eq!(
        *seen.lock().unwrap(),
        vec![("two".to_string(), false, vec!["tag"])]
    );
    assert_eq!(reply.speech(), "Heads up. one two");
    assert_eq!(reply.directive_types(), vec!["from-two"]);
}

#[tokio::test]
async fn declared_edges_report_dangling_targets() {
    let mut app = app();
    app.on_intents(
        "entry",
        IntentMap::new()
            .route("LaunchIntent", "launch")
            .route("StopIntent", "die")
            .route("HelpIntent", "help"),
    )
    .unwrap();
    app.on_state("launch", handler_fn(|_e, _m| Ok(HandlerOutput::Unhandled)))
        .unwrap();

    let edges = app.machine().declared_edges();
    assert_eq!(edges.len(), 3);
    let dangling = app.machine().dangling_edges();
    assert_eq!(dangling.len(), 1);
    assert_eq!(dangling[0].to, "help");
}
