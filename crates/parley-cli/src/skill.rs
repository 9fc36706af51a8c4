//! Demo audio skill used by `parley replay`: greets the user, resumes a
//! playlist from the position the device reports, and says goodbye.

use std::sync::Arc;

use serde_json::{json, Map, Value};

use parley_channels::alexa::{HomeCard, PlayAudio, PlayBehavior, StopAudio, ALEXA};
use parley_channels::dialogflow::{MediaResponse, Suggestions, DIALOGFLOW};
use parley_core::config::EngineConfig;
use parley_core::{DialogEvent, ParleyError, Renderer, Result, SessionModel, Transition};
use parley_engine::{handler_fn, DialogApp, IntentMap, JsonViews};
use parley_hooks::unhandled_fn;

pub const TRACKS: [&str; 3] = [
    "https://s3.amazonaws.com/alexa-voice-service/welcome_message.mp3",
    "https://s3.amazonaws.com/alexa-voice-service/bad_response.mp3",
    "https://s3.amazonaws.com/alexa-voice-service/goodbye_response.mp3",
];

const DEMO_VIEWS: &str = include_str!("../views/demo.json");

pub fn demo_views() -> Result<JsonViews> {
    Ok(JsonViews::new(serde_json::from_str(DEMO_VIEWS)?))
}

/// Playback position saved in the audio token.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
struct Position {
    index: usize,
    offset_ms: u64,
}

impl Position {
    fn from_event(event: &DialogEvent) -> Result<Self> {
        let Some(player) = event.raw_payload.pointer("/context/AudioPlayer") else {
            return Ok(Self::default());
        };
        let token: Value = match player.get("token").and_then(Value::as_str) {
            Some(raw) => serde_json::from_str(raw)?,
            None => Value::Null,
        };
        let index = token
            .get("index")
            .and_then(Value::as_u64)
            .and_then(|i| usize::try_from(i).ok())
            .filter(|i| *i < TRACKS.len())
            .unwrap_or(0);
        Ok(Self {
            index,
            offset_ms: player
                .get("offsetInMilliseconds")
                .and_then(Value::as_u64)
                .unwrap_or(0),
        })
    }

    fn token(&self) -> String {
        json!({ "index": self.index, "shuffle": 0, "loop": 0 }).to_string()
    }
}

fn count_visit(model: &mut SessionModel) {
    let mut user = match model.get("user") {
        Some(Value::Object(user)) => user.clone(),
        _ => Map::new(),
    };
    let visits = user.get("visits").and_then(Value::as_u64).unwrap_or(0) + 1;
    user.insert("visits".to_string(), json!(visits));
    model.set("user", Value::Object(user));
}

fn resume(event: &DialogEvent, model: &mut SessionModel) -> Result<Transition> {
    let position = Position::from_event(event)?;
    model.set("track", position.index + 1);
    let url = TRACKS[position.index];

    let transition = Transition::reply("ResumeIntent.Resuming");
    Ok(match event.platform.as_str() {
        ALEXA => transition
            .with_directive(PlayAudio::new(
                url,
                position.token(),
                position.offset_ms,
                PlayBehavior::ReplaceAll,
            ))
            .with_directive(HomeCard::view("Cards.NowPlaying")),
        DIALOGFLOW => transition
            .with_directive(MediaResponse::new(json!({
                "name": format!("Track {}", position.index + 1),
                "contentUrl": url,
            })))
            .with_directive(Suggestions::view("Suggestions")),
        _ => transition,
    })
}

/// Build the demo skill on top of `renderer`.
pub fn build(config: EngineConfig, renderer: Arc<dyn Renderer>) -> Result<DialogApp> {
    let mut app = DialogApp::new(config, renderer);

    app.on_intents(
        "entry",
        IntentMap::new()
            .route("LaunchIntent", "launch")
            .route("ResumeIntent", "resume")
            .route("PlaybackController.PlayCommandIssued", "resume")
            .route("StopIntent", "exit")
            .route("CancelIntent", "exit")
            .handle(
                "HelpIntent",
                handler_fn(|_e, _m| Ok(Transition::reply("Help.Text").into())),
            ),
    )?;

    // Catch-all states hand every other intent back to the entry map.
    app.on_state(
        "launch",
        handler_fn(|event, model| {
            if event.intent_name == "LaunchIntent" {
                count_visit(model);
                Ok(Transition::reply("LaunchIntent.OpenResponse").into())
            } else {
                Ok(Transition::to("entry").into())
            }
        }),
    )?;
    app.on_state(
        "resume",
        handler_fn(|event, model| match event.intent_name.as_str() {
            "ResumeIntent" | "PlaybackController.PlayCommandIssued" => {
                Ok(resume(event, model)?.into())
            }
            _ => Ok(Transition::to("entry").into()),
        }),
    )?;
    app.on_state(
        "exit",
        handler_fn(|event, _m| {
            let mut farewell = Transition::tell("ExitIntent.Farewell").with_to("die");
            if event.platform == ALEXA {
                farewell = farewell.with_directive(StopAudio);
            }
            Ok(farewell.into())
        }),
    )?;

    app.hooks_mut().on_unhandled_state(
        "help_fallback",
        unhandled_fn(|_e, _m, _state| Ok(Some(Transition::reply("Help.Text").with_to("entry")))),
    );

    let dangling = app.machine().dangling_edges();
    if let Some(edge) = dangling.first() {
        return Err(ParleyError::Config(format!(
            "{} --{}--> {} targets an unregistered state",
            edge.from, edge.intent, edge.to
        )));
    }
    Ok(app)
}

#[cfg(test)]
mod tests {
    use super::*;
    use parley_channels::AlexaReply;
    use parley_core::{Reply, SessionId};

    fn app() -> DialogApp {
        build(EngineConfig::default(), Arc::new(demo_views().unwrap())).unwrap()
    }

    fn alexa(intent: &str, state: Option<&str>) -> DialogEvent {
        let event = DialogEvent::new(ALEXA, intent).with_user("user-xyz");
        match state {
            Some(state) => {
                let attrs = json!({ "state": state, "model": {} });
                event.with_session(SessionId::from("s"), attrs.as_object().unwrap().clone())
            }
            None => event,
        }
    }

    #[test]
    fn graph_has_no_dangling_edges() {
        let app = app();
        assert_eq!(app.machine().declared_edges().len(), 5);
        assert!(app.machine().dangling_edges().is_empty());
    }

    #[tokio::test]
    async fn launch_counts_visits() {
        let app = app();
        let mut reply = AlexaReply::new();
        let outcome = app.execute(alexa("LaunchIntent", None), &mut reply).await;

        assert!(outcome.error.is_none());
        assert_eq!(outcome.state, "launch");
        assert!(reply.speech().contains("Say play"));
        assert_eq!(reply.session_attributes()["model"]["user"]["visits"], 1);
    }

    #[tokio::test]
    async fn launch_state_hands_other_intents_to_entry() {
        let app = app();
        let mut reply = AlexaReply::new();
        let outcome = app
            .execute(alexa("StopIntent", Some("launch")), &mut reply)
            .await;

        assert_eq!(outcome.state, "die");
        assert!(reply.has_terminated());
        assert!(reply.has_directive(&"AudioPlayer.Stop".into()));
    }

    #[tokio::test]
    async fn resume_defaults_to_first_track() {
        let app = app();
        let mut reply = AlexaReply::new();
        app.execute(alexa("ResumeIntent", None), &mut reply).await;

        let play = &reply.directives()[0];
        assert_eq!(play["audioItem"]["stream"]["url"], TRACKS[0]);
        assert_eq!(play["audioItem"]["stream"]["offsetInMilliseconds"], 0);
        assert_eq!(reply.card().unwrap()["content"], "Track 1");
    }

    #[tokio::test]
    async fn unknown_intent_gets_help() {
        let app = app();
        let mut reply = AlexaReply::new();
        let outcome = app
            .execute(alexa("WeatherIntent", Some("entry")), &mut reply)
            .await;

        assert!(outcome.error.is_none());
        assert_eq!(outcome.state, "entry");
        assert!(reply.speech().contains("You can say play"));
        assert!(reply.reprompt().contains("What would you like"));
    }
}
