use std::{convert::Infallible, time::Duration};

use axum::{
    extract::{
        ws::{Message, WebSocket},
        State, WebSocketUpgrade,
    },
    response::{
        sse::{Event, KeepAlive, Sse},
        IntoResponse,
    },
};
use engine::Subscription;
use futures::{Stream, StreamExt};
use tracing::{debug, error};

use crate::app_state::{Shutdown, StatusFeed};

pub async fn ws_events(
    ws: WebSocketUpgrade,
    State(StatusFeed(status)): State<StatusFeed>,
    State(shutdown): State<Shutdown>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_ws_events(socket, status.subscribe(), shutdown))
}

async fn handle_ws_events(
    mut socket: WebSocket,
    mut subscription: Subscription,
    shutdown: Shutdown,
) {
    let stopped = shutdown.wait();
    tokio::pin!(stopped);

    loop {
        tokio::select! {
            () = &mut stopped => {
                debug!("Closing WebSocket for shutdown");
                let _ = socket.send(Message::Close(None)).await;
                break;
            }
            res = socket.recv() => {
                match res {
                    Some(Ok(Message::Close(_))) | None => {
                        debug!("WebSocket closed by client");
                        break;
                    }
                    Some(Ok(_)) => {}
                    Some(Err(error)) => {
                        debug!("WebSocket receive error: {error:?}");
                        break;
                    }
                }
            }
            update = subscription.recv() => {
                let Some(status) = update else {
                    break;
                };

                match serde_json::to_string(&status) {
                    Ok(text) => {
                        if let Err(error) = socket.send(Message::Text(text)).await {
                            debug!("Failed to send status to WebSocket: {error:?}");
                            break;
                        }
                    }
                    Err(error) => {
                        error!("Failed to serialize status: {error:?}");
                    }
                }
            }
        }
    }
}

pub async fn sse_events(
    State(StatusFeed(status)): State<StatusFeed>,
    State(shutdown): State<Shutdown>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let events = status_events(status.subscribe()).take_until(shutdown.wait());

    Sse::new(events).keep_alive(KeepAlive::new().interval(Duration::from_secs(15)))
}

fn status_events(subscription: Subscription) -> impl Stream<Item = Result<Event, Infallible>> {
    subscription.filter_map(|status| async move {
        match Event::default().event("pipeline_update").json_data(&status) {
            Ok(event) => Some(Ok(event)),
            Err(error) => {
                error!("Failed to serialize status: {error:?}");
                None
            }
        }
    })
}
