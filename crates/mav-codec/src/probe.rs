//! Builder for the keep-alive probe frame.
//!
//! The probe is a COMMAND_LONG carrying MAV_CMD_REQUEST_MESSAGE for a
//! configurable message id (PROTOCOL_VERSION by default). A desynchronized
//! or freshly plugged-in autopilot answers it, which restarts the stream of
//! parseable traffic.

use crate::codec::{crc_x25, MAGIC_V2};
use crate::messages::{self, MAV_CMD_REQUEST_MESSAGE, MSG_ID_COMMAND_LONG};

/// Source ids the probe is stamped with, GCS convention.
const PROBE_SOURCE_SYSTEM: u8 = 255;
const PROBE_SOURCE_COMPONENT: u8 = 190;
const TARGET_COMPONENT: u8 = 1;

/// COMMAND_LONG wire payload: seven f32 params, u16 command, then
/// target_system, target_component, confirmation.
const COMMAND_LONG_PAYLOAD_LEN: usize = 33;

#[derive(Debug)]
pub struct ProbeBuilder {
    target_system: u8,
    request_msg_id: u32,
    seq: u8,
}

impl ProbeBuilder {
    pub fn new(target_system: u8, request_msg_id: u32) -> Self {
        Self {
            target_system,
            request_msg_id,
            seq: 0,
        }
    }

    /// Wire bytes of the next probe frame. Each call advances the MAVLink
    /// sequence number.
    pub fn build(&mut self) -> Vec<u8> {
        let mut payload = [0u8; COMMAND_LONG_PAYLOAD_LEN];
        payload[0..4].copy_from_slice(&(self.request_msg_id as f32).to_le_bytes());
        payload[28..30].copy_from_slice(&MAV_CMD_REQUEST_MESSAGE.to_le_bytes());
        payload[30] = self.target_system;
        payload[31] = TARGET_COMPONENT;
        // payload[32] is confirmation = 0 and gets truncated below.

        // MAVLink v2 trailing-zero truncation, at least one payload byte.
        let mut len = COMMAND_LONG_PAYLOAD_LEN;
        while len > 1 && payload[len - 1] == 0 {
            len -= 1;
        }

        let mut frame = vec![
            MAGIC_V2,
            len as u8,
            0,
            0,
            self.seq,
            PROBE_SOURCE_SYSTEM,
            PROBE_SOURCE_COMPONENT,
            (MSG_ID_COMMAND_LONG & 0xFF) as u8,
            0,
            0,
        ];
        frame.extend_from_slice(&payload[..len]);

        let crc_extra = messages::lookup(MSG_ID_COMMAND_LONG)
            .map(|def| def.crc_extra)
            .unwrap_or_default();
        let crc = crc_x25(&frame[1..], crc_extra);
        frame.extend_from_slice(&crc.to_le_bytes());

        self.seq = self.seq.wrapping_add(1);
        frame
    }
}
