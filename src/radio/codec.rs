//! Gateway envelope codec.
//!
//! Packets cross the process boundary as one JSON object per line, in the
//! shape a packet forwarder uses:
//!
//! - uplink (radio → gateway): `{"rxpk":[{ ..., "size":N, "data":"<base64>" }]}`
//! - downlink (gateway → radio): `{"txpk":{"data":"<base64>", ...}}`
//!
//! Payload bytes are carried as standard, padded base64.
//!
//! # Example
//!
//! ```
//! use lora_sim_radio::radio::{decode_downlink, RX_BUFFER_CAPACITY};
//!
//! let payload = decode_downlink(br#"{"txpk":{"data":"SGVsbG8="}}"#, RX_BUFFER_CAPACITY).unwrap();
//! assert_eq!(payload, b"Hello");
//! ```

use super::config::UplinkMetadata;
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Timestamp layout of the `time` field. Sub-second digits are always zero.
pub const UPLINK_TIME_FORMAT: &str = "%Y-%m-%dT%H:%M:%S.000000Z";

/// Encode bytes as standard base64 with `=` padding.
pub fn encode_payload(bytes: &[u8]) -> String {
    STANDARD.encode(bytes)
}

/// Decode standard base64, rejecting results longer than `capacity` bytes.
pub fn decode_payload(text: &str, capacity: usize) -> Result<Vec<u8>, CodecError> {
    let bytes = STANDARD.decode(text).map_err(CodecError::InvalidBase64)?;
    if bytes.len() > capacity {
        return Err(CodecError::PayloadOverflow {
            size: bytes.len(),
            capacity,
        });
    }
    Ok(bytes)
}

/// One received-packet report inside an uplink envelope.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RxPacket {
    pub time: String,
    pub tmst: u32,
    pub chan: u8,
    pub rfch: u8,
    pub freq: f64,
    pub stat: i8,
    pub modu: String,
    pub datr: String,
    pub codr: String,
    pub rssi: i16,
    pub lsnr: f32,
    pub size: u8,
    pub data: String,
}

impl RxPacket {
    /// Build a report for `payload` transmitted at `now` on `freq_mhz`.
    ///
    /// `payload` must be at most 255 bytes; `size` is a single byte.
    pub fn new(now: DateTime<Utc>, freq_mhz: f64, meta: &UplinkMetadata, payload: &[u8]) -> Self {
        Self {
            time: now.format(UPLINK_TIME_FORMAT).to_string(),
            // Epoch milliseconds, truncated to 32 bits
            tmst: now.timestamp_millis() as u32,
            chan: meta.chan,
            rfch: meta.rfch,
            freq: freq_mhz,
            stat: meta.stat,
            modu: meta.modu.clone(),
            datr: meta.datr.clone(),
            codr: meta.codr.clone(),
            rssi: meta.rssi,
            lsnr: meta.lsnr,
            size: payload.len() as u8,
            data: encode_payload(payload),
        }
    }
}

/// Uplink envelope.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UplinkReport {
    pub rxpk: Vec<RxPacket>,
}

impl UplinkReport {
    pub fn single(packet: RxPacket) -> Self {
        Self { rxpk: vec![packet] }
    }

    /// Serialize to a single line of JSON (no line terminator).
    pub fn to_line(&self) -> Result<String, CodecError> {
        serde_json::to_string(self).map_err(CodecError::Json)
    }
}

/// Downlink envelope. Only `txpk.data` is consumed; other fields are ignored.
#[derive(Debug, Clone, Deserialize)]
pub struct DownlinkCommand {
    pub txpk: Option<TxPacket>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TxPacket {
    pub data: Option<String>,
}

/// Parse a downlink line and decode its payload.
///
/// The whole line must be UTF-8, including fields that are otherwise
/// ignored.
pub fn decode_downlink(line: &[u8], capacity: usize) -> Result<Vec<u8>, CodecError> {
    let text = std::str::from_utf8(line).map_err(CodecError::Utf8)?;
    let command: DownlinkCommand = serde_json::from_str(text).map_err(CodecError::Json)?;
    let txpk = command.txpk.ok_or(CodecError::MissingTxpk)?;
    let data = txpk.data.ok_or(CodecError::MissingData)?;
    decode_payload(&data, capacity)
}

/// Envelope errors.
#[derive(Debug)]
pub enum CodecError {
    /// Line is not UTF-8.
    Utf8(std::str::Utf8Error),
    /// Line is not valid JSON of the expected shape.
    Json(serde_json::Error),
    /// No `txpk` object in the downlink.
    MissingTxpk,
    /// No `data` string in `txpk`.
    MissingData,
    /// `data` is not valid padded base64.
    InvalidBase64(base64::DecodeError),
    /// Decoded payload does not fit the receive buffer.
    PayloadOverflow { size: usize, capacity: usize },
}

impl CodecError {
    /// True for errors in the envelope itself, as opposed to its payload.
    ///
    /// The radio treats these like a reception timeout: nothing addressed to
    /// it arrived.
    pub fn is_malformed_envelope(&self) -> bool {
        matches!(self, Self::Utf8(_) | Self::Json(_) | Self::MissingTxpk | Self::MissingData)
    }
}

impl fmt::Display for CodecError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Utf8(e) => write!(f, "line is not UTF-8: {}", e),
            Self::Json(e) => write!(f, "JSON error: {}", e),
            Self::MissingTxpk => write!(f, "no txpk object in downlink"),
            Self::MissingData => write!(f, "no data field in txpk"),
            Self::InvalidBase64(e) => write!(f, "invalid base64 payload: {}", e),
            Self::PayloadOverflow { size, capacity } => {
                write!(f, "payload too large: {} bytes (capacity {})", size, capacity)
            }
        }
    }
}

impl std::error::Error for CodecError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Utf8(e) => Some(e),
            Self::Json(e) => Some(e),
            Self::InvalidBase64(e) => Some(e),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use lora_sim_radio_macros::sim_test;

    #[sim_test]
    fn test_base64_round_trip() {
        let all_bytes: Vec<u8> = (0..=255u8).collect();
        let cases: [&[u8]; 5] = [b"", b"f", b"fo", b"foo", &all_bytes[..255]];
        for case in cases {
            let encoded = encode_payload(case);
            assert_eq!(encoded.len() % 4, 0);
            assert_eq!(decode_payload(&encoded, 512).unwrap(), case);
        }
    }

    #[sim_test]
    fn test_base64_padding() {
        assert_eq!(encode_payload(b"Hello"), "SGVsbG8=");
        assert_eq!(encode_payload(b"Hi"), "SGk=");
        assert_eq!(encode_payload(b""), "");
    }

    #[sim_test]
    fn test_base64_rejects_malformed() {
        assert!(matches!(
            decode_payload("SGVs*G8=", 512),
            Err(CodecError::InvalidBase64(_))
        ));
        assert!(matches!(
            decode_payload("SGVsbG8", 512),
            Err(CodecError::InvalidBase64(_))
        ));
        assert!(matches!(
            decode_payload("SGVsbG8==", 512),
            Err(CodecError::InvalidBase64(_))
        ));
    }

    #[sim_test]
    fn test_decode_respects_capacity() {
        let encoded = encode_payload(&[0xAA; 513]);
        assert!(matches!(
            decode_payload(&encoded, 512),
            Err(CodecError::PayloadOverflow {
                size: 513,
                capacity: 512
            })
        ));

        let encoded = encode_payload(&[0xAA; 512]);
        assert_eq!(decode_payload(&encoded, 512).unwrap().len(), 512);
    }

    #[sim_test]
    fn test_downlink_hello() {
        let payload = decode_downlink(br#"{"txpk":{"data":"SGVsbG8="}}"#, 512).unwrap();
        assert_eq!(payload, b"Hello");
    }

    #[sim_test]
    fn test_downlink_ignores_other_fields() {
        let line = br#"{"txpk":{"imme":true,"freq":869.525,"powe":14,"datr":"SF9BW125","size":2,"data":"AQI="}}"#;
        assert_eq!(decode_downlink(line, 512).unwrap(), vec![1, 2]);
    }

    #[sim_test]
    fn test_downlink_accepts_line_terminator() {
        let payload = decode_downlink(b"{\"txpk\":{\"data\":\"AQI=\"}}\r\n", 512).unwrap();
        assert_eq!(payload, vec![1, 2]);
    }

    #[sim_test]
    fn test_downlink_envelope_errors() {
        let err = decode_downlink(br#"{"foo":1}"#, 512).unwrap_err();
        assert!(matches!(err, CodecError::MissingTxpk));
        assert!(err.is_malformed_envelope());

        let err = decode_downlink(br#"{"txpk":{"size":3}}"#, 512).unwrap_err();
        assert!(matches!(err, CodecError::MissingData));
        assert!(err.is_malformed_envelope());

        let err = decode_downlink(b"not json", 512).unwrap_err();
        assert!(matches!(err, CodecError::Json(_)));
        assert!(err.is_malformed_envelope());

        let err = decode_downlink(br#"{"txpk":42}"#, 512).unwrap_err();
        assert!(err.is_malformed_envelope());
    }

    #[sim_test]
    fn test_downlink_invalid_utf8_is_envelope_error() {
        let err = decode_downlink(b"{\"txpk\":{\"x\":\"\xFF\",\"data\":\"AQ==\"}}", 512).unwrap_err();
        assert!(matches!(err, CodecError::Utf8(_)));
        assert!(err.is_malformed_envelope());
    }

    #[sim_test]
    fn test_downlink_payload_errors_are_not_envelope_errors() {
        let err = decode_downlink(br#"{"txpk":{"data":"!!!!"}}"#, 512).unwrap_err();
        assert!(matches!(err, CodecError::InvalidBase64(_)));
        assert!(!err.is_malformed_envelope());
    }

    #[sim_test]
    fn test_uplink_line_shape() {
        let now = Utc.with_ymd_and_hms(2024, 3, 1, 12, 30, 45).unwrap();
        let packet = RxPacket::new(now, 868.1, &UplinkMetadata::default(), b"Hello");
        let line = UplinkReport::single(packet).to_line().unwrap();

        assert!(line.starts_with(r#"{"rxpk":[{"time":"2024-03-01T12:30:45.000000Z","tmst":"#));
        assert!(line.ends_with(
            r#""chan":2,"rfch":0,"freq":868.1,"stat":1,"modu":"LORA","datr":"SF7BW125","codr":"4/6","rssi":-35,"lsnr":5.1,"size":5,"data":"SGVsbG8="}]}"#
        ));
        assert!(!line.contains('\n'));
    }

    #[sim_test]
    fn test_uplink_tmst_is_truncated_epoch_millis() {
        let now = Utc.with_ymd_and_hms(2024, 3, 1, 12, 30, 45).unwrap();
        let packet = RxPacket::new(now, 868.1, &UplinkMetadata::default(), &[]);
        assert_eq!(packet.tmst, now.timestamp_millis() as u32);
        assert_eq!(packet.size, 0);
        assert_eq!(packet.data, "");
    }
}
