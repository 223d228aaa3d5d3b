//! Text encoding shared by the transmit path and the receive pump
//!
//! Both directions use UTF-8 so text sent and text received round-trip.
//! Inbound bytes that are not valid UTF-8 are replaced with U+FFFD rather
//! than rejected.

/// Encode outbound text
pub fn encode(text: &str) -> Vec<u8> {
    text.as_bytes().to_vec()
}

/// Decode an inbound byte run
pub fn decode(bytes: &[u8]) -> String {
    String::from_utf8_lossy(bytes).into_owned()
}
