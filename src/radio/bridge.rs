//! Packet bridge: radio frames in, gateway envelopes out.
//!
//! A transmitted frame becomes one `rxpk` uplink line, as if a gateway had
//! just received it. A reception reads one `txpk` downlink line and turns it
//! into a frame with fixed link quality.

use super::codec::{decode_downlink, RxPacket, UplinkReport};
use super::config::{SimConfig, UplinkMetadata};
use super::transport::{LineTransport, TransportError};
use chrono::Utc;
use log::{debug, log_enabled, trace, warn, Level};
use std::io::{self, Write};
use std::time::Duration;

/// A frame delivered by the gateway.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReceivedPacket {
    pub data: Vec<u8>,
    /// RSSI in dBm
    pub rssi: i16,
    /// SNR in dB
    pub snr: i8,
}

/// Result of one receive attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RxOutcome {
    /// A valid downlink arrived.
    Packet(ReceivedPacket),
    /// Nothing usable arrived: the deadline passed or the line was not a
    /// downlink envelope.
    Timeout,
    /// A downlink arrived but its payload could not be decoded.
    Error,
}

/// Moves frames between the radio and the line transport.
pub struct PacketBridge<W: Write> {
    transport: LineTransport<W>,
    rx_capacity: usize,
    rx_rssi: i16,
    rx_snr: i8,
}

impl<W: Write> PacketBridge<W> {
    pub fn new(transport: LineTransport<W>, config: &SimConfig) -> Self {
        Self {
            transport,
            rx_capacity: config.rx_buffer_capacity,
            rx_rssi: config.rx_rssi,
            rx_snr: config.rx_snr,
        }
    }

    /// Report `payload` as an uplink received on `freq_hz`.
    pub fn send(&mut self, payload: &[u8], freq_hz: u32, meta: &UplinkMetadata) -> Result<(), TransportError> {
        let freq_mhz = f64::from(freq_hz) / 1e6;
        let packet = RxPacket::new(Utc::now(), freq_mhz, meta, payload);
        let line = UplinkReport::single(packet)
            .to_line()
            .map_err(|e| TransportError::Io(io::Error::new(io::ErrorKind::InvalidData, e)))?;

        debug!("Tx: {} bytes at {:.6} MHz", payload.len(), freq_mhz);
        self.transport.write_line(&line)
    }

    /// Wait for the next downlink.
    ///
    /// Returns `Err` only when the transport itself fails or input has ended.
    pub fn receive(&mut self, deadline: Option<Duration>) -> Result<RxOutcome, TransportError> {
        let line = match self.transport.read_line(deadline)? {
            Some(line) => line,
            None => {
                debug!("Rx: deadline expired");
                return Ok(RxOutcome::Timeout);
            }
        };

        match decode_downlink(&line, self.rx_capacity) {
            Ok(data) => {
                debug!("Rx: {} bytes, RSSI {} dBm, SNR {} dB", data.len(), self.rx_rssi, self.rx_snr);
                if log_enabled!(Level::Trace) {
                    trace!("Rx data: {}", hex_dump(&data));
                }
                Ok(RxOutcome::Packet(ReceivedPacket {
                    data,
                    rssi: self.rx_rssi,
                    snr: self.rx_snr,
                }))
            }
            Err(e) if e.is_malformed_envelope() => {
                warn!("Rx: ignoring line: {}", e);
                Ok(RxOutcome::Timeout)
            }
            Err(e) => {
                warn!("Rx: bad payload: {}", e);
                Ok(RxOutcome::Error)
            }
        }
    }

    pub fn transport(&self) -> &LineTransport<W> {
        &self.transport
    }
}

fn hex_dump(data: &[u8]) -> String {
    data.iter()
        .map(|b| format!("{:02x}", b))
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::radio::codec::encode_payload;
    use lora_sim_radio_macros::sim_test;
    use std::io::Cursor;

    fn bridge(input: &str) -> PacketBridge<Vec<u8>> {
        let transport = LineTransport::new(Cursor::new(input.as_bytes().to_vec()), Vec::new());
        PacketBridge::new(transport, &SimConfig::default())
    }

    fn written_lines(bridge: &PacketBridge<Vec<u8>>) -> Vec<String> {
        let text = String::from_utf8(bridge.transport().writer().clone()).unwrap();
        text.split_terminator("\r\n").map(str::to_string).collect()
    }

    #[sim_test]
    fn test_send_writes_one_uplink() {
        let mut bridge = bridge("");
        bridge
            .send(b"Hello", 868_100_000, &UplinkMetadata::default())
            .unwrap();

        let lines = written_lines(&bridge);
        assert_eq!(lines.len(), 1);
        let report: UplinkReport = serde_json::from_str(&lines[0]).unwrap();
        assert_eq!(report.rxpk.len(), 1);
        let packet = &report.rxpk[0];
        assert_eq!(packet.freq, 868.1);
        assert_eq!(packet.size, 5);
        assert_eq!(packet.data, "SGVsbG8=");
        assert!(packet.time.ends_with(".000000Z"));
    }

    #[sim_test]
    fn test_send_uses_given_metadata() {
        let mut bridge = bridge("");
        let meta = UplinkMetadata {
            datr: "SF12BW125".to_string(),
            codr: "4/5".to_string(),
            ..UplinkMetadata::default()
        };
        bridge.send(&[0; 3], 915_000_000, &meta).unwrap();

        let report: UplinkReport = serde_json::from_str(&written_lines(&bridge)[0]).unwrap();
        assert_eq!(report.rxpk[0].datr, "SF12BW125");
        assert_eq!(report.rxpk[0].codr, "4/5");
        assert_eq!(report.rxpk[0].freq, 915.0);
    }

    #[sim_test]
    fn test_receive_packet() {
        let mut bridge = bridge("{\"txpk\":{\"data\":\"SGVsbG8=\"}}\n");
        assert_eq!(
            bridge.receive(None).unwrap(),
            RxOutcome::Packet(ReceivedPacket {
                data: b"Hello".to_vec(),
                rssi: -110,
                snr: 5,
            })
        );
    }

    #[sim_test]
    fn test_receive_classifies_failures() {
        let oversize = encode_payload(&[0; 513]);
        let input = format!(
            "{{\"foo\":1}}\n\n{{\"txpk\":{{\"data\":\"%%%\"}}}}\n{{\"txpk\":{{\"data\":\"{}\"}}}}\n",
            oversize
        );
        let mut bridge = bridge(&input);
        assert_eq!(bridge.receive(None).unwrap(), RxOutcome::Timeout);
        assert_eq!(bridge.receive(None).unwrap(), RxOutcome::Timeout);
        assert_eq!(bridge.receive(None).unwrap(), RxOutcome::Error);
        assert_eq!(bridge.receive(None).unwrap(), RxOutcome::Error);
        assert!(matches!(bridge.receive(None), Err(TransportError::Closed)));
    }

    #[sim_test]
    fn test_hex_dump() {
        assert_eq!(hex_dump(&[0x00, 0xAB, 0x10]), "00 ab 10");
        assert_eq!(hex_dump(&[]), "");
    }
}
