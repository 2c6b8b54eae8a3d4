//! Simulated LoRa/FSK radio.
//!
//! This module contains:
//! - [`config`]: Region defaults and simulator constants
//! - [`params`]: Modulation and packet parameter model
//! - [`airtime`]: Time-on-air calculation for FSK and LoRa packets
//! - [`codec`]: Base64 payloads and gateway JSON envelopes
//! - [`transport`]: Line transport over stdin/stdout or any byte streams
//! - [`bridge`]: Converts frames to and from envelopes
//! - [`irq`]: IRQ flags and operating modes
//! - [`events`]: Upper-layer callbacks
//! - [`driver`]: Driver operation table and the simulated radio

pub mod airtime;
pub mod bridge;
pub mod codec;
pub mod config;
pub mod driver;
pub mod events;
pub mod irq;
pub mod params;
pub mod transport;

pub use airtime::{calculate_fsk_airtime_ms, calculate_lora_airtime_ms, lora_symbol_time_ms};
pub use bridge::{PacketBridge, ReceivedPacket, RxOutcome};
pub use codec::{
    decode_downlink, decode_payload, encode_payload, CodecError, DownlinkCommand, RxPacket, TxPacket,
    UplinkReport,
};
pub use config::{
    Region, SimConfig, UplinkMetadata, DEFAULT_MAX_PAYLOAD_LENGTH, LORA_SYNC_WORD_PRIVATE,
    LORA_SYNC_WORD_PUBLIC, RANDOM_VALUE, RX_BUFFER_CAPACITY, RX_RSSI_DBM, RX_SNR_DB, WAKEUP_TIME_MS,
};
pub use driver::{RadioDriver, RadioError, SimRadio};
pub use events::{NoEvents, RadioEvents};
pub use irq::{IrqFlags, OperatingMode, RadioState};
pub use params::{
    fsk_bandwidth, fsk_bandwidth_reg_value, ConfigError, FskBandwidth, FskParams, HeaderType,
    LoRaBandwidth, LoRaModulation, LoRaParams, ModemKind, ModemParams, RxConfig, TxConfig,
};
pub use transport::{LineTransport, TransportError, MAX_LINE_LENGTH};
