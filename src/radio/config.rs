//! Simulator configuration.
//!
//! The simulated radio has no registers to tune, so everything a physical
//! chip would report from the air (link quality, random numbers, wakeup
//! latency) is a constant here. [`SimConfig`] collects them with the
//! defaults the gateway-side tooling expects.

/// Frequency band region.
///
/// Only used to pick a default channel; the simulated radio accepts any
/// frequency.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Region {
    /// EU 863-870 MHz band
    Eu868,
    /// US 902-928 MHz band
    Us915,
    /// Australia 915-928 MHz
    Au915,
    /// Asia 920-923 MHz
    As923,
}

impl Region {
    /// Get the default channel frequency for this region in Hz.
    pub fn frequency(self) -> u32 {
        match self {
            Self::Eu868 => 868_100_000,
            Self::Us915 => 915_000_000,
            Self::Au915 => 915_000_000,
            Self::As923 => 923_200_000,
        }
    }

    /// Parse a region name such as `eu868` (case-insensitive).
    pub fn from_name(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "eu868" => Some(Self::Eu868),
            "us915" => Some(Self::Us915),
            "au915" => Some(Self::Au915),
            "as923" => Some(Self::As923),
            _ => None,
        }
    }
}

impl Default for Region {
    fn default() -> Self {
        Self::Eu868
    }
}

// ==================== Simulator Constants ====================

/// Receive buffer capacity in bytes. Decoded downlinks larger than this are
/// rejected.
pub const RX_BUFFER_CAPACITY: usize = 512;

/// Maximum payload length until `set_max_payload_length` is called.
pub const DEFAULT_MAX_PAYLOAD_LENGTH: u8 = 0xFF;

/// RSSI reported with every received packet (dBm).
pub const RX_RSSI_DBM: i16 = -110;

/// SNR reported with every received packet (dB).
pub const RX_SNR_DB: i8 = 5;

/// Value returned by `random()`. Not random.
pub const RANDOM_VALUE: u32 = 5;

/// Board plus radio wakeup time (ms).
pub const WAKEUP_TIME_MS: u32 = 5;

/// LoRa sync word for public networks.
pub const LORA_SYNC_WORD_PUBLIC: u16 = 0x3444;

/// LoRa sync word for private networks.
pub const LORA_SYNC_WORD_PRIVATE: u16 = 0x1424;

/// Metadata attached to every `rxpk` uplink report.
///
/// The simulator does not vary these per packet; they describe a fixed
/// gateway reception.
#[derive(Debug, Clone, PartialEq)]
pub struct UplinkMetadata {
    pub chan: u8,
    pub rfch: u8,
    pub stat: i8,
    pub modu: String,
    pub datr: String,
    pub codr: String,
    pub rssi: i16,
    pub lsnr: f32,
}

impl Default for UplinkMetadata {
    fn default() -> Self {
        Self {
            chan: 2,
            rfch: 0,
            stat: 1,
            modu: "LORA".to_string(),
            datr: "SF7BW125".to_string(),
            codr: "4/6".to_string(),
            rssi: -35,
            lsnr: 5.1,
        }
    }
}

/// Simulated radio configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct SimConfig {
    /// Largest decoded downlink accepted by `rx`.
    pub rx_buffer_capacity: usize,
    /// Initial maximum payload length.
    pub max_payload_length: u8,
    /// RSSI passed to `rx_done`.
    pub rx_rssi: i16,
    /// SNR passed to `rx_done`.
    pub rx_snr: i8,
    /// Value returned by `random()`.
    pub random_value: u32,
    /// Value returned by `wakeup_time()`.
    pub wakeup_time_ms: u32,
    /// Fixed fields of the uplink report.
    pub uplink: UplinkMetadata,
    /// Derive `datr`/`codr` from the active LoRa configuration instead of
    /// using the fixed placeholders.
    pub report_live_modulation: bool,
    /// Honour the `rx` timeout as a real deadline. When false `rx` blocks
    /// until a line arrives.
    pub enforce_rx_timeout: bool,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            rx_buffer_capacity: RX_BUFFER_CAPACITY,
            max_payload_length: DEFAULT_MAX_PAYLOAD_LENGTH,
            rx_rssi: RX_RSSI_DBM,
            rx_snr: RX_SNR_DB,
            random_value: RANDOM_VALUE,
            wakeup_time_ms: WAKEUP_TIME_MS,
            uplink: UplinkMetadata::default(),
            report_live_modulation: false,
            enforce_rx_timeout: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lora_sim_radio_macros::sim_test;

    #[sim_test]
    fn test_region_frequencies() {
        assert_eq!(Region::Eu868.frequency(), 868_100_000);
        assert_eq!(Region::Us915.frequency(), 915_000_000);
        assert_eq!(Region::Au915.frequency(), 915_000_000);
        assert_eq!(Region::As923.frequency(), 923_200_000);
    }

    #[sim_test]
    fn test_region_from_name() {
        assert_eq!(Region::from_name("EU868"), Some(Region::Eu868));
        assert_eq!(Region::from_name("as923"), Some(Region::As923));
        assert_eq!(Region::from_name("cn470"), None);
    }

    #[sim_test]
    fn test_default_region() {
        assert_eq!(Region::default(), Region::Eu868);
    }

    #[sim_test]
    fn test_default_sim_config() {
        let config = SimConfig::default();
        assert_eq!(config.rx_buffer_capacity, 512);
        assert_eq!(config.max_payload_length, 255);
        assert_eq!(config.rx_rssi, -110);
        assert_eq!(config.rx_snr, 5);
        assert!(!config.enforce_rx_timeout);
        assert!(!config.report_live_modulation);
    }

    #[sim_test]
    fn test_default_uplink_placeholders() {
        let meta = UplinkMetadata::default();
        assert_eq!(meta.chan, 2);
        assert_eq!(meta.rfch, 0);
        assert_eq!(meta.stat, 1);
        assert_eq!(meta.modu, "LORA");
        assert_eq!(meta.datr, "SF7BW125");
        assert_eq!(meta.codr, "4/6");
        assert_eq!(meta.rssi, -35);
        assert_eq!(meta.lsnr, 5.1);
    }
}
