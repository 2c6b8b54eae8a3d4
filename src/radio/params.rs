//! Modulation and packet parameters.
//!
//! Holds the physical-layer settings for each modem the way the chip would
//! after a `SetTxConfig`/`SetRxConfig` call. Derived values (low data rate
//! optimization, the SF5/SF6 preamble floor, the clamped FSK bandwidth) are
//! computed by the constructors.

use std::fmt;

/// Active modulation scheme.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModemKind {
    Fsk,
    LoRa,
}

impl fmt::Display for ModemKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Fsk => write!(f, "FSK"),
            Self::LoRa => write!(f, "LoRa"),
        }
    }
}

/// Lowest supported LoRa spreading factor.
pub const MIN_SPREADING_FACTOR: u8 = 5;

/// Highest supported LoRa spreading factor.
pub const MAX_SPREADING_FACTOR: u8 = 12;

/// Minimum preamble length (symbols) at SF5 and SF6.
pub const SF5_SF6_MIN_PREAMBLE: u16 = 12;

/// FSK sync word length in bits (3 bytes).
pub const FSK_SYNC_WORD_BITS: u8 = 3 << 3;

/// One row of the FSK receiver bandwidth table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FskBandwidth {
    /// Bandwidth in Hz.
    pub bandwidth: u32,
    /// Register value selecting this bandwidth.
    pub reg_value: u8,
}

const fn bw(bandwidth: u32, reg_value: u8) -> FskBandwidth {
    FskBandwidth {
        bandwidth,
        reg_value,
    }
}

/// Register-mapped FSK bandwidths, ascending.
pub const FSK_BANDWIDTHS: [FskBandwidth; 21] = [
    bw(4_800, 0x1F),
    bw(5_800, 0x17),
    bw(7_300, 0x0F),
    bw(9_700, 0x1E),
    bw(11_700, 0x16),
    bw(14_600, 0x0E),
    bw(19_500, 0x1D),
    bw(23_400, 0x15),
    bw(29_300, 0x0D),
    bw(39_000, 0x1C),
    bw(46_900, 0x14),
    bw(58_600, 0x0C),
    bw(78_200, 0x1B),
    bw(93_800, 0x13),
    bw(117_300, 0x0B),
    bw(156_200, 0x1A),
    bw(187_200, 0x12),
    bw(234_300, 0x0A),
    bw(312_000, 0x19),
    bw(373_600, 0x11),
    bw(467_000, 0x09),
];

/// Clamp a requested FSK bandwidth to the table.
///
/// Picks the smallest tabulated bandwidth that is at least `requested`,
/// or the largest entry when `requested` exceeds them all.
pub fn fsk_bandwidth(requested: u32) -> FskBandwidth {
    FSK_BANDWIDTHS
        .iter()
        .copied()
        .find(|entry| entry.bandwidth >= requested)
        .unwrap_or(FSK_BANDWIDTHS[FSK_BANDWIDTHS.len() - 1])
}

/// Register value for a requested FSK bandwidth.
pub fn fsk_bandwidth_reg_value(requested: u32) -> u8 {
    fsk_bandwidth(requested).reg_value
}

/// LoRa bandwidth class.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoRaBandwidth {
    Khz125,
    Khz250,
    Khz500,
}

impl LoRaBandwidth {
    /// Map the driver-level bandwidth index (0: 125 kHz, 1: 250 kHz,
    /// 2: 500 kHz).
    pub fn from_index(index: u32) -> Result<Self, ConfigError> {
        match index {
            0 => Ok(Self::Khz125),
            1 => Ok(Self::Khz250),
            2 => Ok(Self::Khz500),
            other => Err(ConfigError::UnsupportedBandwidth(other)),
        }
    }

    /// Row in the symbol-time table.
    pub fn index(self) -> usize {
        match self {
            Self::Khz125 => 0,
            Self::Khz250 => 1,
            Self::Khz500 => 2,
        }
    }

    /// Chip register value (the table row plus a base of 4).
    pub fn reg_value(self) -> u8 {
        self.index() as u8 + 4
    }

    /// Bandwidth in kHz.
    pub fn khz(self) -> u32 {
        match self {
            Self::Khz125 => 125,
            Self::Khz250 => 250,
            Self::Khz500 => 500,
        }
    }
}

/// Packet length mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeaderType {
    /// Length known to both sides, no length byte / implicit header.
    Fixed,
    /// Length carried in the packet.
    Variable,
}

impl HeaderType {
    fn from_fix_len(fix_len: bool) -> Self {
        if fix_len {
            Self::Fixed
        } else {
            Self::Variable
        }
    }
}

/// FSK CRC mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FskCrc {
    Off,
    TwoBytesCcit,
}

/// FSK pulse shaping. The driver always selects Gaussian BT 1.0.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModulationShaping {
    GaussianBt1,
}

/// FSK modulation parameters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FskModulation {
    pub bit_rate: u32,
    pub fdev: u32,
    pub bandwidth: FskBandwidth,
    pub shaping: ModulationShaping,
}

/// FSK packet parameters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FskPacket {
    /// Preamble length in bits (bytes × 8).
    pub preamble_bits: u32,
    pub sync_word_bits: u8,
    pub address_filtering: bool,
    pub header_type: HeaderType,
    pub crc: FskCrc,
    pub whitening: bool,
}

/// LoRa modulation parameters.
///
/// Fields are private so that the low data rate optimization flag is always
/// the one derived from the current spreading factor and bandwidth.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoRaModulation {
    spreading_factor: u8,
    bandwidth: LoRaBandwidth,
    coding_rate: u8,
    low_data_rate_optimize: bool,
}

impl LoRaModulation {
    /// Build LoRa modulation parameters.
    ///
    /// # Arguments
    ///
    /// * `spreading_factor` - 5 to 12
    /// * `bandwidth` - bandwidth class
    /// * `coding_rate` - 1 to 4 (4/5 to 4/8)
    pub fn new(
        spreading_factor: u8,
        bandwidth: LoRaBandwidth,
        coding_rate: u8,
    ) -> Result<Self, ConfigError> {
        if !(MIN_SPREADING_FACTOR..=MAX_SPREADING_FACTOR).contains(&spreading_factor) {
            return Err(ConfigError::UnsupportedSpreadingFactor(u32::from(
                spreading_factor,
            )));
        }
        if !(1..=4).contains(&coding_rate) {
            return Err(ConfigError::UnsupportedCodingRate(coding_rate));
        }
        Ok(Self {
            spreading_factor,
            bandwidth,
            coding_rate,
            low_data_rate_optimize: needs_low_data_rate_optimize(bandwidth, spreading_factor),
        })
    }

    pub fn spreading_factor(&self) -> u8 {
        self.spreading_factor
    }

    pub fn bandwidth(&self) -> LoRaBandwidth {
        self.bandwidth
    }

    pub fn coding_rate(&self) -> u8 {
        self.coding_rate
    }

    pub fn low_data_rate_optimize(&self) -> bool {
        self.low_data_rate_optimize
    }

    /// Gateway data-rate string, e.g. `SF7BW125`.
    pub fn datr(&self) -> String {
        format!("SF{}BW{}", self.spreading_factor, self.bandwidth.khz())
    }

    /// Gateway coding-rate string, e.g. `4/5`.
    pub fn codr(&self) -> String {
        format!("4/{}", self.coding_rate + 4)
    }
}

/// Low data rate optimization is required for the long-symbol
/// configurations: SF11/SF12 at 125 kHz and SF12 at 250 kHz.
pub fn needs_low_data_rate_optimize(bandwidth: LoRaBandwidth, spreading_factor: u8) -> bool {
    matches!(
        (bandwidth, spreading_factor),
        (LoRaBandwidth::Khz125, 11) | (LoRaBandwidth::Khz125, 12) | (LoRaBandwidth::Khz250, 12)
    )
}

/// LoRa packet parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoRaPacket {
    /// Preamble length in symbols (after the SF5/SF6 floor).
    pub preamble_len: u16,
    pub header_type: HeaderType,
    pub payload_len: u8,
    pub crc_on: bool,
    pub iq_inverted: bool,
}

/// Effective LoRa preamble length: SF5 and SF6 need at least 12 symbols.
pub fn lora_preamble_len(spreading_factor: u8, requested: u16) -> u16 {
    if matches!(spreading_factor, 5 | 6) && requested < SF5_SF6_MIN_PREAMBLE {
        SF5_SF6_MIN_PREAMBLE
    } else {
        requested
    }
}

/// Complete FSK parameter set.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FskParams {
    pub modulation: FskModulation,
    pub packet: FskPacket,
}

impl FskParams {
    /// Build FSK parameters from driver-level arguments.
    ///
    /// `preamble_len` is in bytes; it is stored in bits.
    pub fn new(
        bit_rate: u32,
        fdev: u32,
        bandwidth: u32,
        preamble_len: u16,
        fix_len: bool,
        crc_on: bool,
    ) -> Result<Self, ConfigError> {
        if bit_rate == 0 {
            return Err(ConfigError::ZeroBitRate);
        }
        Ok(Self {
            modulation: FskModulation {
                bit_rate,
                fdev,
                bandwidth: fsk_bandwidth(bandwidth),
                shaping: ModulationShaping::GaussianBt1,
            },
            packet: FskPacket {
                preamble_bits: u32::from(preamble_len) << 3,
                sync_word_bits: FSK_SYNC_WORD_BITS,
                address_filtering: false,
                header_type: HeaderType::from_fix_len(fix_len),
                crc: if crc_on {
                    FskCrc::TwoBytesCcit
                } else {
                    FskCrc::Off
                },
                whitening: true,
            },
        })
    }
}

/// Complete LoRa parameter set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoRaParams {
    pub modulation: LoRaModulation,
    pub packet: LoRaPacket,
}

impl LoRaParams {
    /// Build LoRa parameters from driver-level arguments.
    ///
    /// `bandwidth` is the driver index (0: 125 kHz, 1: 250 kHz, 2: 500 kHz),
    /// `datarate` the spreading factor.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        bandwidth: u32,
        datarate: u32,
        coding_rate: u8,
        preamble_len: u16,
        fix_len: bool,
        payload_len: u8,
        crc_on: bool,
        iq_inverted: bool,
    ) -> Result<Self, ConfigError> {
        let spreading_factor = u8::try_from(datarate)
            .map_err(|_| ConfigError::UnsupportedSpreadingFactor(datarate))?;
        let modulation =
            LoRaModulation::new(spreading_factor, LoRaBandwidth::from_index(bandwidth)?, coding_rate)?;
        Ok(Self {
            modulation,
            packet: LoRaPacket {
                preamble_len: lora_preamble_len(spreading_factor, preamble_len),
                header_type: HeaderType::from_fix_len(fix_len),
                payload_len,
                crc_on,
                iq_inverted,
            },
        })
    }
}

/// Last parameters configured for each modem.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ModemParams {
    pub fsk: Option<FskParams>,
    pub lora: Option<LoRaParams>,
}

/// Transmission settings, as passed to `set_tx_config`.
#[derive(Debug, Clone, PartialEq)]
pub struct TxConfig {
    pub modem: ModemKind,
    /// Output power (dBm).
    pub power: i8,
    /// Frequency deviation (FSK only, Hz).
    pub fdev: u32,
    /// FSK: bandwidth in Hz. LoRa: 0 = 125 kHz, 1 = 250 kHz, 2 = 500 kHz.
    pub bandwidth: u32,
    /// FSK: bits/s. LoRa: spreading factor.
    pub datarate: u32,
    /// LoRa coding rate, 1 = 4/5 .. 4 = 4/8.
    pub coderate: u8,
    /// FSK: bytes. LoRa: symbols.
    pub preamble_len: u16,
    pub fix_len: bool,
    pub crc_on: bool,
    pub freq_hop_on: bool,
    pub hop_period: u8,
    pub iq_inverted: bool,
    /// Transmission timeout (ms).
    pub timeout_ms: u32,
}

impl Default for TxConfig {
    /// LoRa SF7/125 kHz, 4/5, 8-symbol preamble, explicit header, CRC on.
    fn default() -> Self {
        Self {
            modem: ModemKind::LoRa,
            power: 14,
            fdev: 0,
            bandwidth: 0,
            datarate: 7,
            coderate: 1,
            preamble_len: 8,
            fix_len: false,
            crc_on: true,
            freq_hop_on: false,
            hop_period: 0,
            iq_inverted: false,
            timeout_ms: 3000,
        }
    }
}

/// Reception settings, as passed to `set_rx_config`.
#[derive(Debug, Clone, PartialEq)]
pub struct RxConfig {
    pub modem: ModemKind,
    /// FSK: bandwidth in Hz. LoRa: 0 = 125 kHz, 1 = 250 kHz, 2 = 500 kHz.
    pub bandwidth: u32,
    /// FSK: bits/s. LoRa: spreading factor.
    pub datarate: u32,
    pub coderate: u8,
    /// AFC bandwidth (FSK only, Hz).
    pub bandwidth_afc: u32,
    pub preamble_len: u16,
    /// Single-Rx timeout. FSK: bytes. LoRa: symbols.
    pub symb_timeout: u16,
    pub fix_len: bool,
    /// Payload length when `fix_len` is set.
    pub payload_len: u8,
    pub crc_on: bool,
    pub freq_hop_on: bool,
    pub hop_period: u8,
    pub iq_inverted: bool,
    pub rx_continuous: bool,
}

impl Default for RxConfig {
    fn default() -> Self {
        Self {
            modem: ModemKind::LoRa,
            bandwidth: 0,
            datarate: 7,
            coderate: 1,
            bandwidth_afc: 0,
            preamble_len: 8,
            symb_timeout: 5,
            fix_len: false,
            payload_len: 0,
            crc_on: true,
            freq_hop_on: false,
            hop_period: 0,
            iq_inverted: true,
            rx_continuous: false,
        }
    }
}

/// Configuration errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// Spreading factor outside 5..=12.
    UnsupportedSpreadingFactor(u32),
    /// LoRa bandwidth index outside 0..=2.
    UnsupportedBandwidth(u32),
    /// Coding rate outside 1..=4.
    UnsupportedCodingRate(u8),
    /// FSK bit rate of zero.
    ZeroBitRate,
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnsupportedSpreadingFactor(sf) => {
                write!(f, "unsupported spreading factor: SF{}", sf)
            }
            Self::UnsupportedBandwidth(bw) => write!(f, "unsupported LoRa bandwidth index: {}", bw),
            Self::UnsupportedCodingRate(cr) => write!(f, "unsupported coding rate: {}", cr),
            Self::ZeroBitRate => write!(f, "FSK bit rate must be > 0"),
        }
    }
}

impl std::error::Error for ConfigError {}
