//! TCP control-channel wire messages (spec §4.3, §6.1).

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::error::SrsError;
use crate::model::ClientInfo;

/// Client version string sent on SYNC.
pub const SRS_VERSION: &str = "2.1.0.7";

/// `MsgType` discriminator values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum MessageType {
    Update = 0,
    Ping = 1,
    Sync = 2,
    RadioUpdate = 3,
    ServerSettings = 4,
    ClientDisconnect = 5,
    VersionMismatch = 6,
    ExternalAwacsModePassword = 7,
    ExternalAwacsModeDisconnect = 8,
}

impl TryFrom<u8> for MessageType {
    type Error = SrsError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Ok(match value {
            0 => MessageType::Update,
            1 => MessageType::Ping,
            2 => MessageType::Sync,
            3 => MessageType::RadioUpdate,
            4 => MessageType::ServerSettings,
            5 => MessageType::ClientDisconnect,
            6 => MessageType::VersionMismatch,
            7 => MessageType::ExternalAwacsModePassword,
            8 => MessageType::ExternalAwacsModeDisconnect,
            other => {
                return Err(SrsError::ProtocolError(format!(
                    "unknown message type: {other}"
                )))
            }
        })
    }
}

/// A single line of the JSON control protocol. Every field beyond `MsgType` is
/// optional because the set of populated fields varies by message type (spec §3,
/// "Server settings"; this mirrors the TypedDict union the protocol was built from).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetworkMessage {
    #[serde(rename = "MsgType")]
    pub msg_type: u8,
    #[serde(rename = "Version", skip_serializing_if = "Option::is_none", default)]
    pub version: Option<String>,
    #[serde(rename = "Client", skip_serializing_if = "Option::is_none", default)]
    pub client: Option<ClientInfo>,
    #[serde(rename = "Clients", skip_serializing_if = "Option::is_none", default)]
    pub clients: Option<Vec<ClientInfo>>,
    #[serde(
        rename = "ServerSettings",
        skip_serializing_if = "Option::is_none",
        default
    )]
    pub server_settings: Option<HashMap<String, String>>,
    #[serde(
        rename = "ExternalAWACSModePassword",
        skip_serializing_if = "Option::is_none",
        default
    )]
    pub external_awacs_mode_password: Option<String>,
}

impl NetworkMessage {
    pub fn message_type(&self) -> Result<MessageType, SrsError> {
        MessageType::try_from(self.msg_type)
    }
}

/// Build a SYNC message announcing the local client's identity and radio state.
pub fn sync_message(client_info: ClientInfo) -> NetworkMessage {
    NetworkMessage {
        msg_type: MessageType::Sync as u8,
        version: Some(SRS_VERSION.to_string()),
        client: Some(client_info),
        clients: None,
        server_settings: None,
        external_awacs_mode_password: None,
    }
}

/// Build a RADIO_UPDATE message carrying the client's current (full) radio state.
pub fn radio_update_message(client_info: ClientInfo) -> NetworkMessage {
    NetworkMessage {
        msg_type: MessageType::RadioUpdate as u8,
        version: Some(SRS_VERSION.to_string()),
        client: Some(client_info),
        clients: None,
        server_settings: None,
        external_awacs_mode_password: None,
    }
}

/// Build an EXTERNAL_AWACS_MODE_PASSWORD request.
pub fn external_awacs_mode_password_message(
    client_info: ClientInfo,
    password: impl Into<String>,
) -> NetworkMessage {
    NetworkMessage {
        msg_type: MessageType::ExternalAwacsModePassword as u8,
        version: Some(SRS_VERSION.to_string()),
        client: Some(client_info),
        clients: None,
        server_settings: None,
        external_awacs_mode_password: Some(password.into()),
    }
}
