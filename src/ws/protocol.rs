//! WebSocket protocol message definitions
//!
//! Every frame is a JSON object `{"command": "<name>", "data": {...}}`.
//! These are the wire types for both directions.

use std::fmt;
use std::str::FromStr;

use glam::Vec3;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

/// Client-chosen player identifier
pub type PlayerId = String;

/// Commands the server accepts
pub const CLIENT_COMMANDS: &[&str] = &[
    "connect",
    "leave",
    "updatePosition",
    "updateOrientation",
    "createProjectile",
    "removeProjectile",
    "playerHit",
    "collectPowerUp",
];

#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("malformed frame: {0}")]
    Malformed(#[source] serde_json::Error),

    #[error("frame has no command")]
    MissingCommand,

    #[error("unknown command: {0}")]
    UnknownCommand(String),

    #[error("invalid payload for {command}: {source}")]
    InvalidPayload {
        command: String,
        #[source]
        source: serde_json::Error,
    },
}

/// `{x, y, z}` on the wire
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct WireVec3 {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl From<Vec3> for WireVec3 {
    fn from(v: Vec3) -> Self {
        Self {
            x: v.x,
            y: v.y,
            z: v.z,
        }
    }
}

impl From<WireVec3> for Vec3 {
    fn from(v: WireVec3) -> Self {
        Vec3::new(v.x, v.y, v.z)
    }
}

/// Power-up kinds a map can place
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PowerUpKind {
    /// Faster movement
    #[default]
    Speed,
    /// Higher jumps
    Jump,
    /// Reduced gravity
    Gravity,
}

impl FromStr for PowerUpKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "speed" => Ok(Self::Speed),
            "jump" => Ok(Self::Jump),
            "gravity" => Ok(Self::Gravity),
            other => Err(format!("unknown power-up type '{}'", other)),
        }
    }
}

impl fmt::Display for PowerUpKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Speed => "speed",
            Self::Jump => "jump",
            Self::Gravity => "gravity",
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ProjectileOptions {
    /// Units per second
    pub speed: f32,
    pub damage: f32,
}

/// A fired projectile, relayed as-is to the rest of the room
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectileSpawn {
    pub id: String,
    pub origin: WireVec3,
    pub direction: WireVec3,
    pub projectile_options: ProjectileOptions,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub weapon_id: Option<String>,
}

/// Messages sent from client to server
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "command", content = "data", rename_all = "camelCase")]
pub enum ClientMsg {
    /// Join the room for `map_url`
    #[serde(rename_all = "camelCase")]
    Connect {
        player_id: PlayerId,
        map_url: String,
        /// Display name shown to other players
        #[serde(default, skip_serializing_if = "Option::is_none")]
        name: Option<String>,
    },

    /// Leave the room and end the session
    Leave {},

    UpdatePosition {
        position: WireVec3,
    },

    UpdateOrientation {
        yaw: f32,
        pitch: f32,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        scoped: Option<bool>,
    },

    CreateProjectile(ProjectileSpawn),

    RemoveProjectile {
        id: String,
    },

    /// The sender's projectile hit player `id`
    PlayerHit {
        id: PlayerId,
        damage: f32,
    },

    CollectPowerUp {
        id: String,
    },
}

impl ClientMsg {
    /// Decode a text frame, separating broken JSON from unknown commands
    /// and bad payloads
    pub fn parse(text: &str) -> Result<Self, ProtocolError> {
        let value: Value = serde_json::from_str(text).map_err(ProtocolError::Malformed)?;
        let command = value
            .get("command")
            .and_then(Value::as_str)
            .ok_or(ProtocolError::MissingCommand)?
            .to_string();

        if !CLIENT_COMMANDS.contains(&command.as_str()) {
            return Err(ProtocolError::UnknownCommand(command));
        }

        serde_json::from_value(value).map_err(|source| ProtocolError::InvalidPayload { command, source })
    }

    pub fn command(&self) -> &'static str {
        match self {
            ClientMsg::Connect { .. } => "connect",
            ClientMsg::Leave {} => "leave",
            ClientMsg::UpdatePosition { .. } => "updatePosition",
            ClientMsg::UpdateOrientation { .. } => "updateOrientation",
            ClientMsg::CreateProjectile(_) => "createProjectile",
            ClientMsg::RemoveProjectile { .. } => "removeProjectile",
            ClientMsg::PlayerHit { .. } => "playerHit",
            ClientMsg::CollectPowerUp { .. } => "collectPowerUp",
        }
    }

    /// Per-frame movement, the only commands subject to the inbound rate limit
    pub fn is_movement(&self) -> bool {
        matches!(self, ClientMsg::UpdatePosition { .. } | ClientMsg::UpdateOrientation { .. })
    }

    pub fn encode(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

/// Full player record sent when someone becomes visible to a client
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayerRecord {
    pub id: PlayerId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub position: WireVec3,
    pub yaw: f32,
    pub pitch: f32,
    pub health: f32,
}

/// Partial player update; absent fields are unchanged
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PlayerUpdate {
    pub id: PlayerId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub position: Option<WireVec3>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub yaw: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pitch: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scoped: Option<bool>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeathSource {
    pub id: PlayerId,
}

/// Messages sent from server to client
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "command", content = "data", rename_all = "camelCase")]
pub enum ServerMsg {
    AddPlayer(PlayerRecord),

    UpdatePlayer(PlayerUpdate),

    RemovePlayer {
        id: PlayerId,
    },

    /// Authoritative health of the receiving player
    UpdateHealth {
        health: f32,
    },

    #[serde(rename_all = "camelCase")]
    Death {
        player_id: PlayerId,
        source: DeathSource,
    },

    #[serde(rename_all = "camelCase")]
    Respawn {
        player_id: PlayerId,
    },

    SpawnPowerUp {
        position: WireVec3,
        id: String,
        #[serde(rename = "type")]
        kind: PowerUpKind,
    },

    RemovePowerUp {
        id: String,
    },

    /// Sent to the collector only
    PickupPowerUp {
        id: String,
        #[serde(rename = "type")]
        kind: PowerUpKind,
    },

    CreateProjectile(ProjectileSpawn),

    RemoveProjectile {
        id: String,
    },
}

impl ServerMsg {
    pub fn encode(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    pub fn decode(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_connect() {
        let msg = ClientMsg::parse(
            r#"{"command":"connect","data":{"playerId":"p1","mapUrl":"/maps/ascent.smf"}}"#,
        )
        .unwrap();
        assert_eq!(
            msg,
            ClientMsg::Connect {
                player_id: "p1".into(),
                map_url: "/maps/ascent.smf".into(),
                name: None,
            }
        );
        assert_eq!(msg.command(), "connect");
    }

    #[test]
    fn test_parse_leave_and_projectile() {
        assert_eq!(
            ClientMsg::parse(r#"{"command":"leave","data":{}}"#).unwrap(),
            ClientMsg::Leave {}
        );

        let frame = json!({
            "command": "createProjectile",
            "data": {
                "id": "0.123",
                "origin": {"x": 1.0, "y": 2.0, "z": 1.45},
                "direction": {"x": 0.0, "y": 1.0, "z": 0.0},
                "projectileOptions": {"speed": 75.0, "damage": 8.0}
            }
        });
        match ClientMsg::parse(&frame.to_string()).unwrap() {
            ClientMsg::CreateProjectile(spawn) => {
                assert_eq!(spawn.id, "0.123");
                assert_eq!(spawn.projectile_options.damage, 8.0);
                assert_eq!(spawn.weapon_id, None);
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_parse_errors() {
        assert!(matches!(ClientMsg::parse("{not json"), Err(ProtocolError::Malformed(_))));
        assert!(matches!(
            ClientMsg::parse(r#"{"data":{}}"#),
            Err(ProtocolError::MissingCommand)
        ));
        assert!(matches!(
            ClientMsg::parse(r#"{"command":"teleport","data":{}}"#),
            Err(ProtocolError::UnknownCommand(c)) if c == "teleport"
        ));
        assert!(matches!(
            ClientMsg::parse(r#"{"command":"playerHit","data":{"id":"p2"}}"#),
            Err(ProtocolError::InvalidPayload { command, .. }) if command == "playerHit"
        ));
    }

    #[test]
    fn test_server_msg_wire_shape() {
        let death = ServerMsg::Death {
            player_id: "p2".into(),
            source: DeathSource { id: "p1".into() },
        };
        let value: Value = serde_json::from_str(&death.encode().unwrap()).unwrap();
        assert_eq!(
            value,
            json!({"command": "death", "data": {"playerId": "p2", "source": {"id": "p1"}}})
        );

        let pickup = ServerMsg::PickupPowerUp {
            id: "abc".into(),
            kind: PowerUpKind::Gravity,
        };
        let value: Value = serde_json::to_value(&pickup).unwrap();
        assert_eq!(
            value,
            json!({"command": "pickupPowerUp", "data": {"id": "abc", "type": "gravity"}})
        );

        let update = ServerMsg::UpdatePlayer(PlayerUpdate {
            id: "p1".into(),
            yaw: Some(1.0),
            pitch: Some(0.0),
            ..Default::default()
        });
        let value: Value = serde_json::to_value(&update).unwrap();
        assert_eq!(
            value,
            json!({"command": "updatePlayer", "data": {"id": "p1", "yaw": 1.0, "pitch": 0.0}})
        );
    }

    #[test]
    fn test_power_up_kind_names() {
        assert_eq!("jump".parse::<PowerUpKind>(), Ok(PowerUpKind::Jump));
        assert!("fly".parse::<PowerUpKind>().is_err());
        assert_eq!(PowerUpKind::Speed.to_string(), "speed");
    }
}
