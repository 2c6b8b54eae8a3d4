//! Upper-layer event sink.

/// Callbacks fired by the radio.
///
/// Every method has an empty default so a consumer only implements the
/// events it cares about. Callbacks run synchronously on the thread that
/// called into the driver, one at a time.
pub trait RadioEvents {
    /// Transmission finished.
    fn tx_done(&mut self) {}

    /// Transmission could not complete.
    fn tx_timeout(&mut self) {}

    /// A frame was received. `rssi` is in dBm, `snr` in dB.
    fn rx_done(&mut self, _payload: &[u8], _rssi: i16, _snr: i8) {}

    /// Reception ended without a frame.
    fn rx_timeout(&mut self) {}

    /// A frame arrived but could not be decoded.
    fn rx_error(&mut self) {}

    /// Channel activity detection finished.
    fn cad_done(&mut self, _channel_activity_detected: bool) {}
}

/// Sink that ignores every event.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoEvents;

impl RadioEvents for NoEvents {}
