//! Radio driver contract and its simulated implementation.
//!
//! [`RadioDriver`] is the operation table an upper layer (typically a LoRaWAN
//! MAC) drives. [`SimRadio`] implements it without hardware: transmissions
//! become uplink envelopes on the transport, receptions wait for a downlink
//! envelope, and everything else updates in-memory state.
//!
//! Every operation that completes asynchronously on a real chip raises IRQ
//! flags here instead, and the flags are dispatched through
//! [`RadioDriver::irq_process`] before the operation returns. Callbacks
//! therefore always fire synchronously on the caller's thread.
//!
//! # Example
//!
//! ```
//! use lora_sim_radio::radio::{LineTransport, NoEvents, RadioDriver, SimConfig, SimRadio, TxConfig};
//! use std::io::Cursor;
//!
//! let transport = LineTransport::new(Cursor::new(Vec::new()), Vec::new());
//! let mut radio = SimRadio::init(transport, NoEvents, SimConfig::default());
//! radio.set_tx_config(&TxConfig::default()).unwrap();
//! radio.send(b"ping").unwrap();
//! assert!(radio.writer().starts_with(b"{\"rxpk\":["));
//! ```

use super::airtime::time_on_air;
use super::bridge::{PacketBridge, ReceivedPacket, RxOutcome};
use super::config::{Region, SimConfig, UplinkMetadata, LORA_SYNC_WORD_PRIVATE, LORA_SYNC_WORD_PUBLIC};
use super::events::RadioEvents;
use super::irq::{IrqFlags, OperatingMode, RadioState};
use super::params::{
    fsk_bandwidth, ConfigError, FskBandwidth, FskParams, LoRaParams, ModemKind, ModemParams, RxConfig,
    TxConfig,
};
use super::transport::{LineTransport, TransportError};
use log::{debug, info, trace, warn};
use std::fmt;
use std::io::Write;
use std::time::Duration;

/// Driver operation table.
///
/// Frequencies are in Hz, times in milliseconds unless noted.
pub trait RadioDriver {
    /// Coarse state derived from the operating mode.
    fn get_status(&self) -> RadioState;

    /// Select the active modem.
    fn set_modem(&mut self, modem: ModemKind);

    /// Set the carrier frequency.
    fn set_channel(&mut self, freq_hz: u32);

    /// Carrier sense. Always reports a free channel.
    fn is_channel_free(
        &mut self,
        modem: ModemKind,
        freq_hz: u32,
        rssi_thresh: i16,
        max_carrier_sense_time: u32,
    ) -> bool;

    /// A 32-bit value from the radio. Not random in the simulator.
    fn random(&mut self) -> u32;

    fn set_rx_config(&mut self, config: &RxConfig) -> Result<(), RadioError>;

    fn set_tx_config(&mut self, config: &TxConfig) -> Result<(), RadioError>;

    /// Whether the hardware supports `freq_hz`. Always true.
    fn check_rf_frequency(&self, freq_hz: u32) -> bool;

    /// Airtime of a `payload_len`-byte packet with the parameters last set
    /// for `modem`.
    ///
    /// The modem must have been configured through `set_tx_config` or
    /// `set_rx_config` first; otherwise 0 is returned.
    fn time_on_air(&self, modem: ModemKind, payload_len: u8) -> u32;

    /// Transmit `buffer`.
    ///
    /// Fires exactly one of `tx_done` or `tx_timeout`. The maximum payload
    /// length applies to reception only; buffers up to 255 bytes are always
    /// sent.
    fn send(&mut self, buffer: &[u8]) -> Result<(), RadioError>;

    fn sleep(&mut self);

    fn standby(&mut self);

    /// Receive one packet. `timeout_ms == 0` waits indefinitely.
    fn rx(&mut self, timeout_ms: u32) -> Result<(), RadioError>;

    /// Receive with boosted LNA gain.
    fn rx_boosted(&mut self, timeout_ms: u32) -> Result<(), RadioError>;

    /// Channel activity detection.
    fn start_cad(&mut self);

    /// Emit an unmodulated carrier for `time_s` seconds.
    fn set_tx_continuous_wave(&mut self, freq_hz: u32, power: i8, time_s: u16);

    /// Current RSSI in dBm.
    fn rssi(&mut self, modem: ModemKind) -> i16;

    fn write_register(&mut self, addr: u16, data: u8);

    fn read_register(&mut self, addr: u16) -> u8;

    fn write_buffer(&mut self, addr: u16, buffer: &[u8]);

    fn read_buffer(&mut self, addr: u16, buffer: &mut [u8]);

    fn set_max_payload_length(&mut self, modem: ModemKind, max: u8);

    /// Select the public or private LoRa sync word.
    fn set_public_network(&mut self, enable: bool);

    /// Board plus radio wakeup time.
    fn wakeup_time(&self) -> u32;

    /// Dispatch pending IRQ flags to the event sink.
    fn irq_process(&mut self);

    /// Alternate between Rx for `rx_time` and sleep for `sleep_time`.
    fn set_rx_duty_cycle(&mut self, rx_time: u32, sleep_time: u32);
}

/// Simulated radio backed by a line transport.
pub struct SimRadio<W: Write, E: RadioEvents> {
    bridge: PacketBridge<W>,
    events: E,
    config: SimConfig,
    modem: ModemKind,
    params: ModemParams,
    frequency_hz: u32,
    mode: OperatingMode,
    pending_irq: IrqFlags,
    last_rx: Option<ReceivedPacket>,
    max_payload_length: u8,
    tx_power: i8,
    tx_timeout_ms: u32,
    rx_timeout_ms: u32,
    rx_continuous: bool,
    symb_timeout: u16,
    fsk_bandwidth_afc: Option<FskBandwidth>,
    rx_duty_cycle: Option<(u32, u32)>,
    sync_word: u16,
}

impl<W: Write, E: RadioEvents> SimRadio<W, E> {
    /// Initialize the radio with its transport and event sink.
    ///
    /// The channel starts at the default region's frequency, the LoRa modem
    /// is selected, and no modem is configured yet.
    pub fn init(transport: LineTransport<W>, events: E, config: SimConfig) -> Self {
        let bridge = PacketBridge::new(transport, &config);
        let frequency_hz = Region::default().frequency();
        info!(
            "Simulated radio ready at {:.1} MHz (Rx buffer {} bytes)",
            f64::from(frequency_hz) / 1e6,
            config.rx_buffer_capacity
        );
        Self {
            bridge,
            events,
            max_payload_length: config.max_payload_length,
            config,
            modem: ModemKind::LoRa,
            params: ModemParams::default(),
            frequency_hz,
            mode: OperatingMode::Idle,
            pending_irq: IrqFlags::NONE,
            last_rx: None,
            tx_power: 0,
            tx_timeout_ms: 0,
            rx_timeout_ms: 0,
            rx_continuous: false,
            symb_timeout: 0,
            fsk_bandwidth_afc: None,
            rx_duty_cycle: None,
            sync_word: LORA_SYNC_WORD_PUBLIC,
        }
    }

    pub fn events(&self) -> &E {
        &self.events
    }

    pub fn operating_mode(&self) -> OperatingMode {
        self.mode
    }

    pub fn modem(&self) -> ModemKind {
        self.modem
    }

    /// Parameters last configured for each modem.
    pub fn params(&self) -> &ModemParams {
        &self.params
    }

    pub fn frequency(&self) -> u32 {
        self.frequency_hz
    }

    pub fn max_payload_length(&self) -> u8 {
        self.max_payload_length
    }

    pub fn sync_word(&self) -> u16 {
        self.sync_word
    }

    pub fn tx_power(&self) -> i8 {
        self.tx_power
    }

    pub fn tx_timeout(&self) -> u32 {
        self.tx_timeout_ms
    }

    pub fn rx_timeout(&self) -> u32 {
        self.rx_timeout_ms
    }

    pub fn rx_continuous(&self) -> bool {
        self.rx_continuous
    }

    /// Symbol timeout from the last `set_rx_config`.
    pub fn symb_timeout(&self) -> u16 {
        self.symb_timeout
    }

    /// AFC bandwidth from the last FSK `set_rx_config`.
    pub fn fsk_bandwidth_afc(&self) -> Option<FskBandwidth> {
        self.fsk_bandwidth_afc
    }

    /// `(rx_time, sleep_time)` from the last `set_rx_duty_cycle`.
    pub fn rx_duty_cycle(&self) -> Option<(u32, u32)> {
        self.rx_duty_cycle
    }

    /// Output side of the transport.
    pub fn writer(&self) -> &W {
        self.bridge.transport().writer()
    }

    fn uplink_metadata(&self) -> UplinkMetadata {
        let mut meta = self.config.uplink.clone();
        if self.config.report_live_modulation && self.modem == ModemKind::LoRa {
            if let Some(lora) = &self.params.lora {
                meta.datr = lora.modulation.datr();
                meta.codr = lora.modulation.codr();
            }
        }
        meta
    }

    fn receive(&mut self, timeout_ms: u32) -> Result<(), RadioError> {
        debug!("Radio Rx with timeout {}", timeout_ms);
        self.rx_timeout_ms = timeout_ms;
        self.mode = OperatingMode::Rx;

        let deadline = if self.config.enforce_rx_timeout && timeout_ms != 0 {
            Some(Duration::from_millis(u64::from(timeout_ms)))
        } else {
            None
        };

        let outcome = match self.bridge.receive(deadline) {
            Ok(outcome) => outcome,
            Err(e) => {
                self.mode = OperatingMode::StandbyRc;
                return Err(e.into());
            }
        };

        match outcome {
            RxOutcome::Packet(packet) => {
                self.last_rx = Some(packet);
                self.pending_irq |= IrqFlags::HEADER_VALID | IrqFlags::RX_DONE;
            }
            RxOutcome::Timeout => self.pending_irq |= IrqFlags::RX_TX_TIMEOUT,
            RxOutcome::Error => self.pending_irq |= IrqFlags::CRC_ERROR,
        }
        self.irq_process();
        Ok(())
    }

    fn end_rx(&mut self) {
        if !self.rx_continuous {
            self.mode = OperatingMode::StandbyRc;
        }
    }
}

impl<W: Write, E: RadioEvents> RadioDriver for SimRadio<W, E> {
    fn get_status(&self) -> RadioState {
        RadioState::from(self.mode)
    }

    fn set_modem(&mut self, modem: ModemKind) {
        if self.modem != modem {
            debug!("Modem: {} -> {}", self.modem, modem);
        }
        self.modem = modem;
    }

    fn set_channel(&mut self, freq_hz: u32) {
        debug!("Channel: {:.6} MHz", f64::from(freq_hz) / 1e6);
        self.frequency_hz = freq_hz;
    }

    fn is_channel_free(
        &mut self,
        modem: ModemKind,
        freq_hz: u32,
        rssi_thresh: i16,
        max_carrier_sense_time: u32,
    ) -> bool {
        trace!(
            "Carrier sense {} at {} Hz (threshold {} dBm, {} ms): free",
            modem,
            freq_hz,
            rssi_thresh,
            max_carrier_sense_time
        );
        true
    }

    fn random(&mut self) -> u32 {
        self.config.random_value
    }

    fn set_rx_config(&mut self, config: &RxConfig) -> Result<(), RadioError> {
        match config.modem {
            ModemKind::Fsk => {
                let fsk = FskParams::new(
                    config.datarate,
                    0,
                    config.bandwidth,
                    config.preamble_len,
                    config.fix_len,
                    config.crc_on,
                )?;
                self.params.fsk = Some(fsk);
                self.fsk_bandwidth_afc = Some(fsk_bandwidth(config.bandwidth_afc));
            }
            ModemKind::LoRa => {
                let payload_len = if config.fix_len {
                    config.payload_len.min(self.max_payload_length)
                } else {
                    self.max_payload_length
                };
                let lora = LoRaParams::new(
                    config.bandwidth,
                    config.datarate,
                    config.coderate,
                    config.preamble_len,
                    config.fix_len,
                    payload_len,
                    config.crc_on,
                    config.iq_inverted,
                )?;
                self.params.lora = Some(lora);
            }
        }

        self.rx_continuous = config.rx_continuous;
        self.symb_timeout = if config.rx_continuous {
            0
        } else {
            config.symb_timeout
        };
        self.mode = OperatingMode::StandbyRc;
        self.set_modem(config.modem);
        debug!("Rx config: {:?}", config);
        Ok(())
    }

    fn set_tx_config(&mut self, config: &TxConfig) -> Result<(), RadioError> {
        match config.modem {
            ModemKind::Fsk => {
                let fsk = FskParams::new(
                    config.datarate,
                    config.fdev,
                    config.bandwidth,
                    config.preamble_len,
                    config.fix_len,
                    config.crc_on,
                )?;
                self.params.fsk = Some(fsk);
            }
            ModemKind::LoRa => {
                let lora = LoRaParams::new(
                    config.bandwidth,
                    config.datarate,
                    config.coderate,
                    config.preamble_len,
                    config.fix_len,
                    self.max_payload_length,
                    config.crc_on,
                    config.iq_inverted,
                )?;
                self.params.lora = Some(lora);
            }
        }

        self.tx_power = config.power;
        self.tx_timeout_ms = config.timeout_ms;
        self.mode = OperatingMode::StandbyRc;
        self.set_modem(config.modem);
        debug!("Tx config: {:?}", config);
        Ok(())
    }

    fn check_rf_frequency(&self, _freq_hz: u32) -> bool {
        true
    }

    fn time_on_air(&self, modem: ModemKind, payload_len: u8) -> u32 {
        match time_on_air(&self.params, modem, payload_len) {
            Some(airtime) => airtime,
            None => {
                warn!("Time on air requested for unconfigured {} modem", modem);
                0
            }
        }
    }

    fn send(&mut self, buffer: &[u8]) -> Result<(), RadioError> {
        if buffer.len() > usize::from(u8::MAX) {
            return Err(RadioError::PayloadTooLarge {
                size: buffer.len(),
                max: usize::from(u8::MAX),
            });
        }

        self.mode = OperatingMode::Tx;
        let meta = self.uplink_metadata();
        let result = self.bridge.send(buffer, self.frequency_hz, &meta);
        self.pending_irq |= match result {
            Ok(()) => IrqFlags::TX_DONE,
            Err(_) => IrqFlags::RX_TX_TIMEOUT,
        };
        self.irq_process();
        result.map_err(RadioError::from)
    }

    fn sleep(&mut self) {
        self.mode = OperatingMode::Idle;
    }

    fn standby(&mut self) {
        self.mode = OperatingMode::StandbyRc;
    }

    fn rx(&mut self, timeout_ms: u32) -> Result<(), RadioError> {
        self.receive(timeout_ms)
    }

    fn rx_boosted(&mut self, timeout_ms: u32) -> Result<(), RadioError> {
        self.receive(timeout_ms)
    }

    fn start_cad(&mut self) {
        self.mode = OperatingMode::Cad;
        self.pending_irq |= IrqFlags::CAD_DONE;
        self.irq_process();
    }

    fn set_tx_continuous_wave(&mut self, freq_hz: u32, power: i8, time_s: u16) {
        self.set_channel(freq_hz);
        self.tx_power = power;
        info!(
            "Continuous wave at {:.6} MHz, {} dBm for {} s",
            f64::from(freq_hz) / 1e6,
            power,
            time_s
        );
    }

    fn rssi(&mut self, _modem: ModemKind) -> i16 {
        self.config.rx_rssi
    }

    fn write_register(&mut self, addr: u16, data: u8) {
        trace!("Write register 0x{:04x} = 0x{:02x}", addr, data);
    }

    fn read_register(&mut self, _addr: u16) -> u8 {
        0
    }

    fn write_buffer(&mut self, addr: u16, buffer: &[u8]) {
        trace!("Write buffer 0x{:04x}: {} bytes", addr, buffer.len());
    }

    fn read_buffer(&mut self, _addr: u16, buffer: &mut [u8]) {
        buffer.fill(0);
    }

    fn set_max_payload_length(&mut self, modem: ModemKind, max: u8) {
        self.max_payload_length = max;
        if modem == ModemKind::LoRa {
            if let Some(lora) = self.params.lora.as_mut() {
                lora.packet.payload_len = max;
            }
        }
        debug!("Max payload length: {}", max);
    }

    fn set_public_network(&mut self, enable: bool) {
        self.sync_word = if enable {
            LORA_SYNC_WORD_PUBLIC
        } else {
            LORA_SYNC_WORD_PRIVATE
        };
        debug!("Sync word: 0x{:04x}", self.sync_word);
    }

    fn wakeup_time(&self) -> u32 {
        self.config.wakeup_time_ms
    }

    fn irq_process(&mut self) {
        let flags = self.pending_irq.take();
        if flags.is_empty() {
            return;
        }
        trace!("IRQ {} in {:?}", flags, self.mode);

        if flags.contains(IrqFlags::TX_DONE) {
            self.mode = OperatingMode::StandbyRc;
            self.events.tx_done();
        }

        if flags.contains(IrqFlags::RX_DONE) {
            self.end_rx();
            if let Some(packet) = self.last_rx.take() {
                self.events.rx_done(&packet.data, packet.rssi, packet.snr);
            }
        }

        if flags.contains(IrqFlags::CRC_ERROR) {
            self.end_rx();
            self.events.rx_error();
        }

        if flags.contains(IrqFlags::CAD_DONE) {
            self.mode = OperatingMode::StandbyRc;
            self.events
                .cad_done(flags.contains(IrqFlags::CAD_ACTIVITY_DETECTED));
        }

        if flags.contains(IrqFlags::RX_TX_TIMEOUT) {
            match self.mode {
                OperatingMode::Tx => {
                    self.mode = OperatingMode::StandbyRc;
                    self.events.tx_timeout();
                }
                OperatingMode::Rx => {
                    self.mode = OperatingMode::StandbyRc;
                    self.events.rx_timeout();
                }
                _ => {}
            }
        }

        if flags.contains(IrqFlags::HEADER_ERROR) {
            self.end_rx();
            self.events.rx_timeout();
        }
    }

    fn set_rx_duty_cycle(&mut self, rx_time: u32, sleep_time: u32) {
        self.rx_duty_cycle = Some((rx_time, sleep_time));
        self.mode = OperatingMode::RxDutyCycle;
    }
}

impl<W: Write, E: RadioEvents> fmt::Debug for SimRadio<W, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SimRadio")
            .field("modem", &self.modem)
            .field("frequency_hz", &self.frequency_hz)
            .field("mode", &self.mode)
            .field("max_payload_length", &self.max_payload_length)
            .finish_non_exhaustive()
    }
}

/// Radio errors.
#[derive(Debug)]
pub enum RadioError {
    /// Rejected configuration; previous parameters are kept.
    Config(ConfigError),
    /// Transport failed or input ended.
    Transport(TransportError),
    /// Payload longer than a frame can carry.
    PayloadTooLarge { size: usize, max: usize },
}

impl RadioError {
    /// True if the input side has ended and no more packets will arrive.
    pub fn is_input_closed(&self) -> bool {
        matches!(self, Self::Transport(TransportError::Closed))
    }
}

impl fmt::Display for RadioError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Config(e) => write!(f, "configuration error: {}", e),
            Self::Transport(e) => write!(f, "transport error: {}", e),
            Self::PayloadTooLarge { size, max } => {
                write!(f, "payload too large: {} bytes (max {})", size, max)
            }
        }
    }
}

impl std::error::Error for RadioError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Config(e) => Some(e),
            Self::Transport(e) => Some(e),
            Self::PayloadTooLarge { .. } => None,
        }
    }
}

impl From<ConfigError> for RadioError {
    fn from(e: ConfigError) -> Self {
        Self::Config(e)
    }
}

impl From<TransportError> for RadioError {
    fn from(e: TransportError) -> Self {
        Self::Transport(e)
    }
}
