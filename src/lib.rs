//! Simulated LoRa/FSK radio driver.
//!
//! Stands in for a radio transceiver so that a protocol stack can run
//! without hardware. Transmitted frames are written as gateway `rxpk`
//! envelopes, one JSON line each, and received frames are read from `txpk`
//! envelopes on the input stream.

pub mod radio;

// Re-export commonly used items
pub use radio::{
    LineTransport, ModemKind, RadioDriver, RadioError, RadioEvents, Region, RxConfig, SimConfig,
    SimRadio, TxConfig,
};
