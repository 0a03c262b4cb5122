//! # Command Parsing
//!
//! JSON requests arrive as one object with a `command` field and optional
//! parameters; parsing validates shape and size before any component is
//! touched. A raw struct of optional fields absorbs the JSON, then each
//! command extracts and checks what it needs.

use serde::Deserialize;

use crate::identity::Role;

use super::response::{ErrorBody, ErrorKind};

/// A validated inbound request
#[derive(Debug, Clone)]
pub struct CommandRequest {
    /// Bearer token; absent only for `register` and `login`
    pub token: Option<String>,
    pub command: Command,
}

/// The command surface
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Register {
        username: String,
        password: String,
        role: Option<Role>,
    },
    Login {
        username: String,
        password: String,
    },
    Logout,
    ListMessages {
        page: Option<u32>,
        limit: Option<u32>,
    },
    CreateMessage {
        body: String,
    },
    UpdateMessage {
        id: i64,
        body: String,
    },
    DeleteMessage {
        id: i64,
    },
    AcquireWriter,
    ReleaseWriter,
    GetStatus,
    ListAudit {
        page: Option<u32>,
        limit: Option<u32>,
    },
    SetWriterEnabled {
        enabled: bool,
    },
}

#[derive(Debug, Deserialize)]
struct RawCommand {
    command: String,
    #[serde(default)]
    token: Option<String>,
    #[serde(default)]
    username: Option<String>,
    #[serde(default)]
    password: Option<String>,
    #[serde(default)]
    role: Option<Role>,
    #[serde(default)]
    page: Option<u32>,
    #[serde(default)]
    limit: Option<u32>,
    #[serde(default)]
    id: Option<i64>,
    #[serde(default)]
    body: Option<String>,
    #[serde(default)]
    enabled: Option<bool>,
}

fn invalid(message: impl Into<String>) -> ErrorBody {
    ErrorBody::new(ErrorKind::InvalidInput, message)
}

fn required<T>(value: Option<T>, field: &str) -> Result<T, ErrorBody> {
    value.ok_or_else(|| invalid(format!("missing field '{}'", field)))
}

impl CommandRequest {
    /// Parse and validate one request.
    ///
    /// `max_bytes` caps the accepted input size (1 MiB by default).
    pub fn parse(input: &str, max_bytes: usize) -> Result<Self, ErrorBody> {
        if input.len() > max_bytes {
            return Err(invalid(format!(
                "request exceeds {} bytes",
                max_bytes
            )));
        }

        let raw: RawCommand = serde_json::from_str(input)
            .map_err(|e| invalid(format!("invalid JSON request: {}", e)))?;

        let command = match raw.command.as_str() {
            "register" => Command::Register {
                username: required(raw.username, "username")?,
                password: required(raw.password, "password")?,
                role: raw.role,
            },
            "login" => Command::Login {
                username: required(raw.username, "username")?,
                password: required(raw.password, "password")?,
            },
            "logout" => Command::Logout,
            "list_messages" => Command::ListMessages {
                page: raw.page,
                limit: raw.limit,
            },
            "create_message" => Command::CreateMessage {
                body: required(raw.body, "body")?,
            },
            "update_message" => Command::UpdateMessage {
                id: required(raw.id, "id")?,
                body: required(raw.body, "body")?,
            },
            "delete_message" => Command::DeleteMessage {
                id: required(raw.id, "id")?,
            },
            "acquire_writer" => Command::AcquireWriter,
            "release_writer" => Command::ReleaseWriter,
            "get_status" => Command::GetStatus,
            "list_audit" => Command::ListAudit {
                page: raw.page,
                limit: raw.limit,
            },
            "set_writer_enabled" => Command::SetWriterEnabled {
                enabled: required(raw.enabled, "enabled")?,
            },
            other => return Err(invalid(format!("unknown command: {}", other))),
        };

        Ok(CommandRequest {
            token: raw.token,
            command,
        })
    }
}
