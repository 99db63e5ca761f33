//! JSON protocol spoken with provider binaries over stdin/stdout.

use serde::{Deserialize, Serialize, de::DeserializeOwned};

use crate::event::EventRecord;

pub trait ProviderCommand: Serialize {
    type Response: DeserializeOwned;
    fn command() -> Command;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Command {
    AccessToken,
    ListEvents,
    CreateEvent,
    UpdateEvent,
    DeleteEvent,
}

/// Request sent to the provider.
#[derive(Debug, Serialize, Deserialize)]
pub struct Request {
    pub command: Command,
    #[serde(default)]
    pub params: serde_json::Value,
}

/// Response sent back by the provider.
#[derive(Debug, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Response<T> {
    Success { data: T },
    Error { error: String },
}

/// Ask the provider for a currently valid access token.
#[derive(Debug, Serialize, Deserialize)]
pub struct AccessToken {
    #[serde(flatten)]
    pub remote_config: serde_json::Map<String, serde_json::Value>,
}

impl ProviderCommand for AccessToken {
    type Response = Option<String>;
    fn command() -> Command {
        Command::AccessToken
    }
}

/// List events within a time range (RFC 3339 bounds, both inclusive).
#[derive(Debug, Serialize, Deserialize)]
pub struct ListEvents {
    #[serde(flatten)]
    pub remote_config: serde_json::Map<String, serde_json::Value>,
    pub access_token: String,
    pub from: String,
    pub to: String,
}

impl ProviderCommand for ListEvents {
    type Response = Vec<EventRecord>;
    fn command() -> Command {
        Command::ListEvents
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CreateEvent {
    #[serde(flatten)]
    pub remote_config: serde_json::Map<String, serde_json::Value>,
    pub access_token: String,
    pub event: EventRecord,
}

impl ProviderCommand for CreateEvent {
    type Response = EventRecord;
    fn command() -> Command {
        Command::CreateEvent
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct UpdateEvent {
    #[serde(flatten)]
    pub remote_config: serde_json::Map<String, serde_json::Value>,
    pub access_token: String,
    pub event: EventRecord,
}

impl ProviderCommand for UpdateEvent {
    type Response = EventRecord;
    fn command() -> Command {
        Command::UpdateEvent
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct DeleteEvent {
    #[serde(flatten)]
    pub remote_config: serde_json::Map<String, serde_json::Value>,
    pub access_token: String,
    pub event_id: String,
}

impl ProviderCommand for DeleteEvent {
    type Response = ();
    fn command() -> Command {
        Command::DeleteEvent
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_list_events_flattens_remote_config() {
        let mut remote_config = serde_json::Map::new();
        remote_config.insert("google_calendar_id".into(), "primary".into());

        let params = serde_json::to_value(ListEvents {
            remote_config,
            access_token: "tok".into(),
            from: "2025-06-01T00:00:00+00:00".into(),
            to: "2025-06-30T23:59:59.999+00:00".into(),
        })
        .unwrap();
        let request = Request {
            command: ListEvents::command(),
            params,
        };

        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["command"], "list_events");
        assert_eq!(json["params"]["google_calendar_id"], "primary");
        assert_eq!(json["params"]["access_token"], "tok");
    }

    #[test]
    fn test_response_is_tagged_by_status() {
        let ok: Response<Option<String>> =
            serde_json::from_str(r#"{"status":"success","data":"abc"}"#).unwrap();
        assert!(matches!(ok, Response::Success { data: Some(ref t) } if t == "abc"));

        let err: Response<Vec<EventRecord>> =
            serde_json::from_str(r#"{"status":"error","error":"quota exceeded"}"#).unwrap();
        assert!(matches!(err, Response::Error { ref error } if error == "quota exceeded"));
    }
}
