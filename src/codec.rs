//! Voice packet codec: bit-exact little-endian variable-length UDP frame (spec §4.2).
//!
//! ```text
//! offset  size   field
//! 0       2      total_packet_length (u16)
//! 2       2      audio_length        (u16)
//! 4       2      frequency_length    (u16)
//! 6       A      audio_data          (A = audio_length)
//! 6+A     F      frequency_segment   (F = frequency_length, F = 10 * N_frequencies)
//!                  per frequency: freq_hz (f64) | modulation (u8) | encryption (u8)
//! 6+A+F   4      unit_id      (u32)
//! ...     8      packet_id    (u64)
//! ...     1      hop_count    (u8)
//! ...     22     original_client_guid (ASCII)
//! end-22  22     sender_client_guid  (ASCII)
//! ```

use crate::error::{Result, SrsError};
use crate::guid::GUID_LEN;
use crate::model::Modulation;

const HEADER_LEN: usize = 6;
const FREQUENCY_LEN: usize = 10;
const TRAILER_LEN: usize = 4 + 8 + 1 + GUID_LEN + GUID_LEN;

/// A tuned frequency/modulation pair, as carried per-entry in a voice packet.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Frequency {
    pub frequency_hz: f64,
    pub modulation: Modulation,
}

impl Frequency {
    pub fn new(frequency_hz: f64, modulation: Modulation) -> Self {
        Self {
            frequency_hz,
            modulation,
        }
    }
}

/// A framed UDP voice packet.
#[derive(Debug, Clone, PartialEq)]
pub struct VoicePacket {
    pub audio_data: Vec<u8>,
    pub frequencies: Vec<Frequency>,
    pub unit_id: u32,
    pub packet_id: u64,
    pub guid: String,
    pub hop_count: u8,
    /// GUID of the client whose transmission this packet relays from. Empty at
    /// construction time means "defaults to `guid`" at serialization time.
    pub original_client_guid: String,
}

impl VoicePacket {
    /// Serialize to wire bytes. Does not mutate `self`; if `original_client_guid`
    /// is empty, `guid` is substituted for the duration of this call only.
    pub fn serialize(&self) -> Result<Vec<u8>> {
        let original_guid = if self.original_client_guid.is_empty() {
            &self.guid
        } else {
            &self.original_client_guid
        };
        check_guid(original_guid)?;
        check_guid(&self.guid)?;

        let audio_length = self.audio_data.len();
        let frequency_length = FREQUENCY_LEN * self.frequencies.len();
        let packet_length = HEADER_LEN + audio_length + frequency_length + TRAILER_LEN;

        let mut buf = Vec::with_capacity(packet_length);
        buf.extend_from_slice(&(packet_length as u16).to_le_bytes());
        buf.extend_from_slice(&(audio_length as u16).to_le_bytes());
        buf.extend_from_slice(&(frequency_length as u16).to_le_bytes());
        buf.extend_from_slice(&self.audio_data);
        for f in &self.frequencies {
            buf.extend_from_slice(&f.frequency_hz.to_le_bytes());
            buf.push(f.modulation as u8);
            buf.push(0); // encryption byte: always 0 on send
        }
        buf.extend_from_slice(&self.unit_id.to_le_bytes());
        buf.extend_from_slice(&self.packet_id.to_le_bytes());
        buf.push(self.hop_count);
        buf.extend_from_slice(original_guid.as_bytes());
        buf.extend_from_slice(self.guid.as_bytes());

        Ok(buf)
    }

    /// Deserialize from wire bytes, verifying `total_packet_length == data.len()`
    /// (a deliberate strengthening over the source, which does not re-check this;
    /// see spec §9).
    pub fn deserialize(data: &[u8]) -> Result<Self> {
        if data.len() < HEADER_LEN + TRAILER_LEN {
            return Err(SrsError::TruncatedFrame);
        }

        let total_packet_length = read_u16_le(data, 0) as usize;
        let audio_length = read_u16_le(data, 2) as usize;
        let frequency_length = read_u16_le(data, 4) as usize;

        if total_packet_length != data.len() {
            return Err(SrsError::TruncatedFrame);
        }
        if HEADER_LEN + audio_length + frequency_length + TRAILER_LEN != data.len() {
            return Err(SrsError::TruncatedFrame);
        }

        let audio_data = data[HEADER_LEN..HEADER_LEN + audio_length].to_vec();

        let freq_start = HEADER_LEN + audio_length;
        let mut frequencies = Vec::with_capacity(frequency_length / FREQUENCY_LEN);
        for chunk_start in (0..frequency_length).step_by(FREQUENCY_LEN) {
            let offset = freq_start + chunk_start;
            let frequency_hz = read_f64_le(data, offset);
            let modulation = Modulation::try_from(data[offset + 8])?;
            frequencies.push(Frequency::new(frequency_hz, modulation));
        }

        let trailer_start = freq_start + frequency_length;
        let unit_id = read_u32_le(data, trailer_start);
        let packet_id = read_u64_le(data, trailer_start + 4);
        let hop_count = data[trailer_start + 12];

        let len = data.len();
        let original_client_guid = ascii_guid(&data[len - 44..len - 22])?;
        let guid = ascii_guid(&data[len - 22..len])?;

        Ok(Self {
            audio_data,
            frequencies,
            unit_id,
            packet_id,
            guid,
            hop_count,
            original_client_guid,
        })
    }
}

fn check_guid(guid: &str) -> Result<()> {
    if guid.len() != GUID_LEN || !guid.is_ascii() {
        return Err(SrsError::InvalidGuid);
    }
    Ok(())
}

fn ascii_guid(bytes: &[u8]) -> Result<String> {
    let s = std::str::from_utf8(bytes).map_err(|_| SrsError::InvalidGuid)?;
    if !s.is_ascii() {
        return Err(SrsError::InvalidGuid);
    }
    Ok(s.to_string())
}

fn read_u16_le(data: &[u8], offset: usize) -> u16 {
    u16::from_le_bytes([data[offset], data[offset + 1]])
}

fn read_u32_le(data: &[u8], offset: usize) -> u32 {
    let mut b = [0u8; 4];
    b.copy_from_slice(&data[offset..offset + 4]);
    u32::from_le_bytes(b)
}

fn read_u64_le(data: &[u8], offset: usize) -> u64 {
    let mut b = [0u8; 8];
    b.copy_from_slice(&data[offset..offset + 8]);
    u64::from_le_bytes(b)
}

fn read_f64_le(data: &[u8], offset: usize) -> f64 {
    let mut b = [0u8; 8];
    b.copy_from_slice(&data[offset..offset + 8]);
    f64::from_le_bytes(b)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sender_guid() -> String {
        "A".repeat(GUID_LEN)
    }

    #[test]
    fn minimal_voice_packet_round_trip() {
        let packet = VoicePacket {
            audio_data: vec![0x00, 0x01, 0x02],
            frequencies: vec![Frequency::new(251_000_000.0, Modulation::Am)],
            unit_id: 7,
            packet_id: 42,
            guid: sender_guid(),
            hop_count: 0,
            original_client_guid: String::new(),
        };

        let bytes = packet.serialize().unwrap();
        assert_eq!(bytes.len(), 76);
        assert_eq!(read_u16_le(&bytes, 0) as usize, bytes.len());

        let decoded = VoicePacket::deserialize(&bytes).unwrap();
        assert_eq!(decoded.original_client_guid, sender_guid());
        assert_eq!(decoded.frequencies.len(), 1);
        assert_eq!(decoded.frequencies[0].modulation, Modulation::Am);
        assert_eq!(decoded.audio_data, vec![0x00, 0x01, 0x02]);
        assert_eq!(decoded.unit_id, 7);
        assert_eq!(decoded.packet_id, 42);
        assert_eq!(decoded.hop_count, 0);
    }

    #[test]
    fn two_frequency_packet_header_lengths() {
        let packet = VoicePacket {
            audio_data: vec![0u8; 512],
            frequencies: vec![
                Frequency::new(243_000_000.0, Modulation::Am),
                Frequency::new(30_000_000.0, Modulation::Fm),
            ],
            unit_id: 1,
            packet_id: 1,
            guid: sender_guid(),
            hop_count: 0,
            original_client_guid: String::new(),
        };

        let bytes = packet.serialize().unwrap();
        assert_eq!(read_u16_le(&bytes, 0) as usize, 595);
        assert_eq!(read_u16_le(&bytes, 2) as usize, 512);
        assert_eq!(read_u16_le(&bytes, 4) as usize, 20);
        assert_eq!(bytes.len(), 595);

        let decoded = VoicePacket::deserialize(&bytes).unwrap();
        assert_eq!(decoded.frequencies.len(), 2);
        assert_eq!(decoded.frequencies[1].modulation, Modulation::Fm);
    }

    #[test]
    fn serialized_length_matches_header() {
        let packet = VoicePacket {
            audio_data: vec![7u8; 17],
            frequencies: vec![Frequency::new(1.0, Modulation::Intercom)],
            unit_id: 0,
            packet_id: 0,
            guid: sender_guid(),
            hop_count: 3,
            original_client_guid: sender_guid(),
        };
        let bytes = packet.serialize().unwrap();
        assert_eq!(read_u16_le(&bytes, 0) as usize, bytes.len());
    }

    #[test]
    fn truncated_serialization_does_not_deserialize() {
        let packet = VoicePacket {
            audio_data: vec![1, 2, 3, 4, 5],
            frequencies: vec![Frequency::new(100_000_000.0, Modulation::Fm)],
            unit_id: 9,
            packet_id: 100,
            guid: sender_guid(),
            hop_count: 0,
            original_client_guid: String::new(),
        };
        let bytes = packet.serialize().unwrap();
        for len in 1..bytes.len() {
            assert!(VoicePacket::deserialize(&bytes[..len]).is_err());
        }
    }

    #[test]
    fn unknown_modulation_byte_is_rejected() {
        let packet = VoicePacket {
            audio_data: vec![],
            frequencies: vec![Frequency::new(1.0, Modulation::Am)],
            unit_id: 0,
            packet_id: 0,
            guid: sender_guid(),
            hop_count: 0,
            original_client_guid: String::new(),
        };
        let mut bytes = packet.serialize().unwrap();
        let freq_start = HEADER_LEN; // no audio data
        bytes[freq_start + 8] = 99; // corrupt modulation byte
        let err = VoicePacket::deserialize(&bytes).unwrap_err();
        assert!(matches!(err, SrsError::UnknownModulation(99)));
    }

    #[test]
    fn invalid_guid_rejected_on_serialize() {
        let packet = VoicePacket {
            audio_data: vec![],
            frequencies: vec![],
            unit_id: 0,
            packet_id: 0,
            guid: "tooshort".to_string(),
            hop_count: 0,
            original_client_guid: String::new(),
        };
        assert!(matches!(packet.serialize(), Err(SrsError::InvalidGuid)));
    }
}
