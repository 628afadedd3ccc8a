//! Protocol message types for daemon communication.

use std::fmt;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use hwa_core::ResourceName;

use crate::version::ProtocolVersion;

/// What a request addresses: one named resource, or every resource the
/// daemon manages.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Target {
    /// Every managed resource. Valid for `off` and `status` only.
    All,

    /// A single resource by name.
    Named(ResourceName),
}

impl Target {
    pub fn named(name: impl Into<String>) -> Self {
        Self::Named(ResourceName::new(name))
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::All => write!(f, "all"),
            Self::Named(name) => write!(f, "{name}"),
        }
    }
}

// On the wire a target is a bare string; "all" is reserved and cannot
// name a resource.
impl Serialize for Target {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::All => serializer.serialize_str("all"),
            Self::Named(name) => serializer.serialize_str(name.as_str()),
        }
    }
}

impl<'de> Deserialize<'de> for Target {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        if raw == "all" {
            Ok(Self::All)
        } else {
            Ok(Self::Named(ResourceName::new(raw)))
        }
    }
}

/// What the client wants done with the target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Action {
    /// Switch an output on. Rejected for `all`.
    On,

    /// Switch an output off. For `all`, applies to every switchable.
    Off,

    /// Report current status without switching anything.
    Status,
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::On => write!(f, "on"),
            Self::Off => write!(f, "off"),
            Self::Status => write!(f, "status"),
        }
    }
}

/// One request line from client to daemon.
///
/// Unknown fields are rejected so that typos fail loudly instead of
/// being silently ignored.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Request {
    /// Protocol version, checked on every request.
    pub protocol_version: ProtocolVersion,

    /// The resource (or `all`) this request addresses.
    pub resource: Target,

    /// The action to perform.
    pub action: Action,
}

impl Request {
    /// Creates a request with the current protocol version.
    pub fn new(resource: Target, action: Action) -> Self {
        Self {
            protocol_version: ProtocolVersion::CURRENT,
            resource,
            action,
        }
    }
}

/// Machine-readable failure category carried in error replies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    /// The named resource is not managed by this daemon instance.
    UnknownResource,

    /// The action is not valid for the target's capability.
    IncompatibleAction,

    /// The hardware transaction failed.
    Hardware,

    /// The request line was not valid JSON or not a valid request.
    Malformed,

    /// The request's protocol version is incompatible.
    Version,
}

/// One resource's status within a reply.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusEntry {
    /// Resource name.
    pub resource: ResourceName,

    /// Rendered status value ("on", "off", "2.5113", "60.02", "high",
    /// "low", "unknown", or "error" when that resource's transaction
    /// failed inside an `all` request).
    pub value: String,
}

impl StatusEntry {
    pub fn new(resource: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            resource: ResourceName::new(resource),
            value: value.into(),
        }
    }
}

/// One reply line from daemon to client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Reply {
    /// The request succeeded; one entry per addressed resource, in the
    /// daemon's declaration order.
    Status { entries: Vec<StatusEntry> },

    /// Another client holds the arbitration lock. The daemon closes the
    /// connection after sending this.
    Busy { detail: String },

    /// The request failed.
    Error { message: String, code: ErrorCode },
}

impl Reply {
    /// Reply for a single-resource request.
    pub fn single(resource: impl Into<String>, value: impl Into<String>) -> Self {
        Self::Status {
            entries: vec![StatusEntry::new(resource, value)],
        }
    }

    /// Reply carrying one entry per resource.
    pub fn status(entries: Vec<StatusEntry>) -> Self {
        Self::Status { entries }
    }

    /// Busy rejection sent to a second concurrent client.
    pub fn busy(detail: impl Into<String>) -> Self {
        Self::Busy {
            detail: detail.into(),
        }
    }

    /// Error reply with a machine-readable code.
    pub fn error(message: impl Into<String>, code: ErrorCode) -> Self {
        Self::Error {
            message: message.into(),
            code,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_wire_shape() {
        let request = Request::new(Target::named("valve1"), Action::On);
        let json = serde_json::to_string(&request).unwrap();
        assert_eq!(
            json,
            r#"{"protocol_version":{"major":1,"minor":0},"resource":"valve1","action":"on"}"#
        );
    }

    #[test]
    fn test_all_target_serializes_as_plain_string() {
        let request = Request::new(Target::All, Action::Off);
        let json = serde_json::to_string(&request).unwrap();
        assert!(json.contains(r#""resource":"all""#));

        let back: Request = serde_json::from_str(&json).unwrap();
        assert_eq!(back.resource, Target::All);
    }

    #[test]
    fn test_named_target_roundtrip() {
        let back: Target = serde_json::from_str(r#""pump1""#).unwrap();
        assert_eq!(back, Target::named("pump1"));
    }

    #[test]
    fn test_unknown_field_rejected() {
        let result: Result<Request, _> = serde_json::from_str(
            r#"{"protocol_version":{"major":1,"minor":0},"resource":"valve1","action":"on","extra":1}"#,
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_missing_action_rejected() {
        let result: Result<Request, _> = serde_json::from_str(
            r#"{"protocol_version":{"major":1,"minor":0},"resource":"valve1"}"#,
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_invalid_action_rejected() {
        let result: Result<Request, _> = serde_json::from_str(
            r#"{"protocol_version":{"major":1,"minor":0},"resource":"valve1","action":"toggle"}"#,
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_status_reply_wire_shape() {
        let reply = Reply::single("valve1", "on");
        let json = serde_json::to_string(&reply).unwrap();
        assert_eq!(
            json,
            r#"{"type":"status","entries":[{"resource":"valve1","value":"on"}]}"#
        );
    }

    #[test]
    fn test_busy_reply_wire_shape() {
        let reply = Reply::busy("locked by another client");
        let json = serde_json::to_string(&reply).unwrap();
        assert_eq!(
            json,
            r#"{"type":"busy","detail":"locked by another client"}"#
        );
    }

    #[test]
    fn test_error_reply_roundtrip() {
        let reply = Reply::error("no such resource 'valveX'", ErrorCode::UnknownResource);
        let json = serde_json::to_string(&reply).unwrap();
        assert!(json.contains(r#""code":"unknown_resource""#));

        let back: Reply = serde_json::from_str(&json).unwrap();
        assert_eq!(back, reply);
    }

    #[test]
    fn test_entries_preserve_order() {
        let reply = Reply::status(vec![
            StatusEntry::new("valve2", "off"),
            StatusEntry::new("valve1", "on"),
            StatusEntry::new("pump1", "off"),
        ]);
        let json = serde_json::to_string(&reply).unwrap();
        let back: Reply = serde_json::from_str(&json).unwrap();

        match back {
            Reply::Status { entries } => {
                let names: Vec<&str> = entries.iter().map(|e| e.resource.as_str()).collect();
                assert_eq!(names, vec!["valve2", "valve1", "pump1"]);
            }
            other => panic!("expected status reply, got {other:?}"),
        }
    }
}
