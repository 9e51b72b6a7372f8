//! Known-message table for the MAVLink common dialect subset this bridge
//! carries. Each entry pairs a message id with the CRC_EXTRA seed that the
//! checksum folds in; an id missing from this table cannot be validated and
//! parses as an invalid frame.

/// MAVLink message id of COMMAND_LONG.
pub const MSG_ID_COMMAND_LONG: u32 = 76;

/// MAVLink message id of PROTOCOL_VERSION, the default probe request target.
pub const MSG_ID_PROTOCOL_VERSION: u32 = 300;

/// MAV_CMD_REQUEST_MESSAGE command code carried by probe frames.
pub const MAV_CMD_REQUEST_MESSAGE: u16 = 512;

#[derive(Debug, Clone, Copy)]
pub struct MessageDef {
    pub id: u32,
    pub name: &'static str,
    pub crc_extra: u8,
}

const MESSAGES: &[MessageDef] = &[
    MessageDef { id: 0, name: "HEARTBEAT", crc_extra: 50 },
    MessageDef { id: 1, name: "SYS_STATUS", crc_extra: 124 },
    MessageDef { id: 22, name: "PARAM_VALUE", crc_extra: 220 },
    MessageDef { id: 24, name: "GPS_RAW_INT", crc_extra: 24 },
    MessageDef { id: 30, name: "ATTITUDE", crc_extra: 39 },
    MessageDef { id: 33, name: "GLOBAL_POSITION_INT", crc_extra: 104 },
    MessageDef { id: 42, name: "MISSION_CURRENT", crc_extra: 28 },
    MessageDef { id: 65, name: "RC_CHANNELS", crc_extra: 118 },
    MessageDef { id: 74, name: "VFR_HUD", crc_extra: 20 },
    MessageDef { id: 76, name: "COMMAND_LONG", crc_extra: 152 },
    MessageDef { id: 77, name: "COMMAND_ACK", crc_extra: 143 },
    MessageDef { id: 141, name: "ALTITUDE", crc_extra: 47 },
    MessageDef { id: 147, name: "BATTERY_STATUS", crc_extra: 154 },
    MessageDef { id: 253, name: "STATUSTEXT", crc_extra: 83 },
    MessageDef { id: 300, name: "PROTOCOL_VERSION", crc_extra: 217 },
];

pub fn lookup(id: u32) -> Option<&'static MessageDef> {
    MESSAGES.iter().find(|def| def.id == id)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookup_known_ids() {
        let heartbeat = lookup(0).unwrap();
        assert_eq!(heartbeat.name, "HEARTBEAT");
        assert_eq!(heartbeat.crc_extra, 50);

        let cmd = lookup(MSG_ID_COMMAND_LONG).unwrap();
        assert_eq!(cmd.name, "COMMAND_LONG");
    }

    #[test]
    fn lookup_unknown_id() {
        assert!(lookup(9999).is_none());
    }

    #[test]
    fn ids_are_unique_and_sorted() {
        for pair in MESSAGES.windows(2) {
            assert!(pair[0].id < pair[1].id);
        }
    }
}
