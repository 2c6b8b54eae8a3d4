//! Simulated radio node.
//!
//! Drives a [`SimRadio`] over stdin/stdout the way a minimal MAC would:
//! transmit an uplink, open a receive window, repeat. Pair it with a
//! gateway simulator that reads `rxpk` lines from this process's stdout and
//! writes `txpk` lines to its stdin.
//!
//! Logs go to stderr; stdout carries only envelopes.
//!
//! # Usage
//!
//! ```bash
//! cargo run --bin sim-node -- [region] [spreading-factor]
//! cargo run --bin sim-node -- eu868 9
//! ```
//!
//! The process exits when its input ends.

use log::{error, info, warn};
use lora_sim_radio::radio::{
    LineTransport, ModemKind, RadioDriver, RadioEvents, Region, RxConfig, SimConfig, SimRadio,
    TxConfig,
};

/// Receive window opened after each uplink (ms).
const RX_WINDOW_MS: u32 = 3000;

const DEFAULT_SPREADING_FACTOR: u32 = 7;

#[derive(Debug, Default)]
struct NodeEvents {
    uplinks: u32,
    downlinks: u32,
}

impl RadioEvents for NodeEvents {
    fn tx_done(&mut self) {
        self.uplinks += 1;
        info!("Uplink #{} sent", self.uplinks);
    }

    fn tx_timeout(&mut self) {
        warn!("Uplink #{} failed", self.uplinks + 1);
    }

    fn rx_done(&mut self, payload: &[u8], rssi: i16, snr: i8) {
        self.downlinks += 1;
        info!(
            "Downlink #{}: {} bytes (RSSI {} dBm, SNR {} dB): {}",
            self.downlinks,
            payload.len(),
            rssi,
            snr,
            String::from_utf8_lossy(payload)
        );
    }

    fn rx_timeout(&mut self) {
        info!("Receive window closed without downlink");
    }

    fn rx_error(&mut self) {
        warn!("Downlink could not be decoded");
    }
}

fn parse_args() -> Result<(Region, u32), String> {
    let mut args = std::env::args().skip(1);

    let region = match args.next() {
        Some(name) => Region::from_name(&name).ok_or_else(|| format!("unknown region: {}", name))?,
        None => Region::default(),
    };
    let spreading_factor = match args.next() {
        Some(sf) => sf
            .parse()
            .map_err(|_| format!("invalid spreading factor: {}", sf))?,
        None => DEFAULT_SPREADING_FACTOR,
    };

    Ok((region, spreading_factor))
}

fn main() {
    // Initialize logging
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let (region, spreading_factor) = match parse_args() {
        Ok(args) => args,
        Err(e) => {
            error!("{}", e);
            error!("Usage: sim-node [eu868|us915|au915|as923] [5-12]");
            std::process::exit(2);
        }
    };

    info!("=== Simulated radio node starting ===");

    let mut radio = SimRadio::init(LineTransport::stdio(), NodeEvents::default(), SimConfig::default());
    radio.set_channel(region.frequency());

    let tx_config = TxConfig {
        datarate: spreading_factor,
        ..TxConfig::default()
    };
    let rx_config = RxConfig {
        datarate: spreading_factor,
        ..RxConfig::default()
    };
    if let Err(e) = radio
        .set_tx_config(&tx_config)
        .and_then(|_| radio.set_rx_config(&rx_config))
    {
        error!("Radio configuration failed: {}", e);
        std::process::exit(2);
    }

    info!(
        "{:?} at {:.1} MHz, SF{}: 16-byte uplink takes {} ms",
        region,
        f64::from(region.frequency()) / 1e6,
        spreading_factor,
        radio.time_on_air(ModemKind::LoRa, 16)
    );

    let mut counter = 0u32;
    loop {
        counter = counter.wrapping_add(1);
        let frame = format!("uplink {}", counter);
        if let Err(e) = radio.send(frame.as_bytes()) {
            error!("Send failed: {}", e);
            std::process::exit(1);
        }

        if let Err(e) = radio.rx(RX_WINDOW_MS) {
            if e.is_input_closed() {
                info!(
                    "Input closed after {} uplinks, {} downlinks",
                    radio.events().uplinks,
                    radio.events().downlinks
                );
                std::process::exit(0);
            }
            error!("Receive failed: {}", e);
            std::process::exit(1);
        }
    }
}
