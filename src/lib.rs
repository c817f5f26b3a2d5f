//! Client-side core of the Simple Radio Standard (SRS) voice protocol:
//! a TCP JSON control channel, a UDP voice channel, and the session
//! controller that ties identity, roster, and both transports together.
//!
//! This crate does not ship a binary, a logging subscriber, or audio
//! capture/playback; it is meant to be embedded by something that does.

pub mod codec;
pub mod error;
pub mod guid;
pub mod messages;
pub mod model;
pub mod roster;
pub mod session;
pub mod tcp;
pub mod voice;

pub use codec::{Frequency, VoicePacket};
pub use error::{Result, SrsError};
pub use guid::make_short_guid;
pub use messages::{MessageType, NetworkMessage, SRS_VERSION};
pub use model::{
    Ambient, ClientInfo, Coalition, IffControlMode, IffStatus, LatLngPosition, Modulation,
    RadioInfo, RadioInformation, Transponder, RADIO_SLOT_COUNT,
};
pub use roster::{Roster, ServerSettings};
pub use session::{SessionState, SrsClient};
