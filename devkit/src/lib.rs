/*!
# Drobo DevKit - Stubs and Helpers for Check Development

Library supporting development and testing of the appliance check without
real hardware:
- Stub appliance serving canned status frames over TCP
- Builders for status documents and wire frames
- Delivery-mode control (chunked, truncated) for transport edge cases
*/

pub mod frames;
pub mod stub;

pub use frames::{encode_frame, encode_frame_with_length, StatusDocumentBuilder};
pub use stub::{DeliveryMode, StubAppliance};
