pub mod codec;
pub mod messages;
pub mod probe;

pub use codec::{Frame, MavParser};
pub use messages::{MAV_CMD_REQUEST_MESSAGE, MSG_ID_COMMAND_LONG, MSG_ID_PROTOCOL_VERSION};
pub use probe::ProbeBuilder;
