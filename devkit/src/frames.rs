/*!
Builders for appliance status documents and wire frames

Synthesizes the length-prefixed framing and `ESATMUpdate` XML documents the
status service emits, so tests can exercise the check against known inputs.
*/

use std::fmt::Write;

/// Fixed header size of the appliance framing.
pub const HEADER_LEN: usize = 16;

/// Wraps a status document in the appliance envelope: a 16-byte header whose
/// trailing 4 bytes carry the body length as a big-endian signed 32-bit
/// integer, then the body, then one pad byte counted by that length.
pub fn encode_frame(document: &[u8]) -> Vec<u8> {
    let body_len = (document.len() + 1) as i32;
    let mut frame = Vec::with_capacity(HEADER_LEN + document.len() + 1);
    frame.extend_from_slice(&[0u8; HEADER_LEN - 4]);
    frame.extend_from_slice(&body_len.to_be_bytes());
    frame.extend_from_slice(document);
    frame.push(0);
    frame
}

/// Builds a frame whose header declares `declared_len` regardless of the
/// actual body, for framing-violation tests.
pub fn encode_frame_with_length(declared_len: i32, body: &[u8]) -> Vec<u8> {
    let mut frame = Vec::with_capacity(HEADER_LEN + body.len());
    frame.extend_from_slice(&[0u8; HEADER_LEN - 4]);
    frame.extend_from_slice(&declared_len.to_be_bytes());
    frame.extend_from_slice(body);
    frame
}

/// Builder for `ESATMUpdate` status documents.
///
/// Defaults describe a healthy device at 50% usage with the factory
/// yellow/red thresholds and no populated slots.
#[derive(Debug, Clone)]
pub struct StatusDocumentBuilder {
    total_capacity: i64,
    used_capacity: i64,
    yellow_threshold: i64,
    red_threshold: i64,
    slots: Vec<(i64, i64)>,
}

impl Default for StatusDocumentBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl StatusDocumentBuilder {
    pub fn new() -> Self {
        Self {
            total_capacity: 100,
            used_capacity: 50,
            yellow_threshold: 8500,
            red_threshold: 9500,
            slots: Vec::new(),
        }
    }

    pub fn capacity(mut self, total: i64, used: i64) -> Self {
        self.total_capacity = total;
        self.used_capacity = used;
        self
    }

    pub fn thresholds(mut self, yellow: i64, red: i64) -> Self {
        self.yellow_threshold = yellow;
        self.red_threshold = red;
        self
    }

    /// Appends a slot record; slots appear in insertion order.
    pub fn slot(mut self, number: i64, status: i64) -> Self {
        self.slots.push((number, status));
        self
    }

    /// Renders the XML document.
    pub fn build_xml(&self) -> String {
        let mut xml = String::from("<ESATMUpdate>");
        let _ = write!(
            xml,
            "<mTotalCapacityProtected>{}</mTotalCapacityProtected>\
             <mUsedCapacityProtected>{}</mUsedCapacityProtected>\
             <mYellowThreshold>{}</mYellowThreshold>\
             <mRedThreshold>{}</mRedThreshold>",
            self.total_capacity, self.used_capacity, self.yellow_threshold, self.red_threshold,
        );
        xml.push_str("<mSlotsExp>");
        for (number, status) in &self.slots {
            let _ = write!(
                xml,
                "<mSlot><mSlotNumber>{number}</mSlotNumber><mStatus>{status}</mStatus></mSlot>",
            );
        }
        xml.push_str("</mSlotsExp></ESATMUpdate>");
        xml
    }

    /// Renders the document and wraps it in the wire envelope.
    pub fn build_frame(&self) -> Vec<u8> {
        encode_frame(self.build_xml().as_bytes())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frame_declares_body_plus_pad() {
        let frame = encode_frame(b"abc");
        assert_eq!(frame.len(), HEADER_LEN + 4);
        assert_eq!(&frame[HEADER_LEN - 4..HEADER_LEN], &4i32.to_be_bytes());
        assert_eq!(&frame[HEADER_LEN..HEADER_LEN + 3], b"abc");
        assert_eq!(frame[HEADER_LEN + 3], 0);
    }

    #[test]
    fn builder_renders_slots_in_order() {
        let xml = StatusDocumentBuilder::new().slot(0, 3).slot(1, 5).build_xml();
        assert!(xml.starts_with("<ESATMUpdate>"));
        let first = xml.find("<mSlotNumber>0</mSlotNumber>").unwrap();
        let second = xml.find("<mSlotNumber>1</mSlotNumber>").unwrap();
        assert!(first < second);
        assert!(xml.contains("<mStatus>5</mStatus>"));
    }
}
