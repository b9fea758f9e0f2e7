//! Live notification stream

use crate::api::CurrentUser;
use crate::error::ApiResult;
use crate::state::AppState;
use axum::{
    extract::State,
    response::sse::{Event, KeepAlive, Sse},
};
use futures::stream::{self, Stream};
use std::convert::Infallible;
use std::time::Duration;
use tokio::sync::broadcast::error::RecvError;

/// Stream lifecycle notifications via SSE
pub async fn stream_events(
    State(state): State<AppState>,
    caller: CurrentUser,
) -> ApiResult<Sse<impl Stream<Item = Result<Event, Infallible>>>> {
    caller.require_government()?;
    let rx = state.broadcast.subscribe();
    tracing::debug!(
        subscriber = %caller.0.id,
        subscribers = state.broadcast.subscriber_count(),
        "Event stream opened"
    );

    let stream = stream::unfold(rx, |mut rx| async move {
        match rx.recv().await {
            Ok(event) => {
                let sse_event = match Event::default().event(event.kind.as_str()).json_data(&event) {
                    Ok(sse_event) => sse_event,
                    Err(err) => Event::default().comment(format!("unencodable event: {err}")),
                };
                Some((Ok(sse_event), rx))
            }
            Err(RecvError::Lagged(skipped)) => {
                tracing::warn!(skipped, "Event stream subscriber lagged");
                Some((Ok(Event::default().comment("lagged")), rx))
            }
            Err(RecvError::Closed) => None,
        }
    });

    Ok(Sse::new(stream).keep_alive(
        KeepAlive::new()
            .interval(Duration::from_secs(15))
            .text("ping"),
    ))
}
