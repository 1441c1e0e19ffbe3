use gloo_events::EventListener;
use shared::ServerEvent;
use wasm_bindgen::JsCast;
use web_sys::{EventSource, MessageEvent};
use yew::html::Scope;

use crate::{Model, Msg};

/// Open `/api/events` stream; closed when dropped.
pub struct EventConnection {
    source: EventSource,
    _listeners: Vec<EventListener>,
}

impl EventConnection {
    pub fn open(link: Scope<Model>) -> Result<Self, String> {
        let source = EventSource::new("/api/events").map_err(|e| format!("{:?}", e))?;

        let on_message = {
            let link = link.clone();
            EventListener::new(&source, "message", move |event| {
                let Some(data) = event
                    .dyn_ref::<MessageEvent>()
                    .and_then(|message| message.data().as_string())
                else {
                    return;
                };
                match serde_json::from_str::<ServerEvent>(&data) {
                    Ok(server_event) => link.send_message(Msg::Server(server_event)),
                    Err(e) => log::warn!("Ignoring malformed server event: {}", e),
                }
            })
        };

        let on_open = {
            let link = link.clone();
            EventListener::new(&source, "open", move |_| {
                link.send_message(Msg::EventsConnected(true))
            })
        };

        let on_error = EventListener::new(&source, "error", move |_| {
            log::warn!("Event stream interrupted, browser will reconnect");
            link.send_message(Msg::EventsConnected(false))
        });

        Ok(Self {
            source,
            _listeners: vec![on_message, on_open, on_error],
        })
    }
}

impl Drop for EventConnection {
    fn drop(&mut self) {
        self.source.close();
    }
}
