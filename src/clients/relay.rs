use std::time::Duration;

use reqwest::Client;
use serde::Serialize;

use crate::error::AppError;

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    RideRequest,
    RideAccepted,
    RideCompleted,
    RideCancelled,
}

/// The `{type, room, payload}` envelope the relay fans out to connected clients.
#[derive(Debug, Clone, Serialize)]
pub struct RelayEvent {
    #[serde(rename = "type")]
    pub kind: EventKind,
    pub room: String,
    pub payload: serde_json::Value,
}

impl RelayEvent {
    pub fn new(kind: EventKind, room: String, payload: &impl Serialize) -> Result<Self, AppError> {
        let payload = serde_json::to_value(payload)
            .map_err(|err| AppError::Internal(format!("failed to serialize event payload: {err}")))?;

        Ok(Self {
            kind,
            room,
            payload,
        })
    }
}

pub fn driver_room(clerk_driver_id: &str) -> String {
    format!("driver:{clerk_driver_id}")
}

pub fn user_room(clerk_user_id: &str) -> String {
    format!("user:{clerk_user_id}")
}

pub struct EventRelay {
    client: Client,
    url: String,
}

impl EventRelay {
    pub fn new(url: String, timeout: Duration) -> Result<Self, AppError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|err| AppError::Internal(format!("failed to build relay client: {err}")))?;

        Ok(Self { client, url })
    }

    pub async fn emit(&self, event: &RelayEvent) -> Result<(), AppError> {
        let response = self
            .client
            .post(&self.url)
            .json(event)
            .send()
            .await
            .map_err(|err| AppError::Gateway(format!("event relay unreachable: {err}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::Gateway(format!(
                "event relay rejected {:?} for {}: {status} {body}",
                event.kind, event.room
            )));
        }

        tracing::debug!(kind = ?event.kind, room = %event.room, "event relayed");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use serde_json::json;
    use wiremock::matchers::{body_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::{driver_room, user_room, EventKind, EventRelay, RelayEvent};

    #[test]
    fn rooms_are_prefixed_by_principal_kind() {
        assert_eq!(driver_room("drv_1"), "driver:drv_1");
        assert_eq!(user_room("usr_1"), "user:usr_1");
    }

    #[tokio::test]
    async fn emit_posts_type_room_and_payload() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/emit"))
            .and(body_json(json!({
                "type": "ride_accepted",
                "room": "user:usr_1",
                "payload": { "id": 7 }
            })))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        let relay = EventRelay::new(format!("{}/emit", server.uri()), Duration::from_secs(2)).unwrap();
        let event = RelayEvent::new(
            EventKind::RideAccepted,
            user_room("usr_1"),
            &json!({ "id": 7 }),
        )
        .unwrap();

        relay.emit(&event).await.unwrap();
    }

    #[tokio::test]
    async fn non_success_status_is_a_gateway_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let relay = EventRelay::new(format!("{}/emit", server.uri()), Duration::from_secs(2)).unwrap();
        let event = RelayEvent::new(EventKind::RideRequest, driver_room("drv_1"), &json!({})).unwrap();

        let err = relay.emit(&event).await.unwrap_err();
        assert!(matches!(err, crate::error::AppError::Gateway(_)));
    }

    #[tokio::test]
    async fn slow_relay_times_out() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_millis(500)))
            .mount(&server)
            .await;

        let relay = EventRelay::new(format!("{}/emit", server.uri()), Duration::from_millis(50)).unwrap();
        let event = RelayEvent::new(EventKind::RideRequest, driver_room("drv_1"), &json!({})).unwrap();

        assert!(relay.emit(&event).await.is_err());
    }
}
