//! # Status Beacon
//!
//! Small control messages the relay sends to its peers while the link is
//! up: one registration per connection, then a periodic status tick.
//!
//! Layout: `token_id, token_value, command, argument`.

/// 'M'
pub const BEACON_TOKEN_ID: u8 = 0x4D;
/// 'e'
pub const BEACON_TOKEN_VALUE: u8 = 0x65;

pub const BEACON_CMD_STATUS: u8 = 0xFE;
pub const BEACON_CMD_REGISTER: u8 = 0xFF;

pub type BeaconMessage = [u8; 4];

pub fn registration_message() -> BeaconMessage {
    [BEACON_TOKEN_ID, BEACON_TOKEN_VALUE, BEACON_CMD_REGISTER, 0x01]
}

/// Status tick carrying the low byte of the tick counter
pub fn status_message(counter: u32) -> BeaconMessage {
    [
        BEACON_TOKEN_ID,
        BEACON_TOKEN_VALUE,
        BEACON_CMD_STATUS,
        (counter & 0xFF) as u8,
    ]
}

/// Is this datagram a beacon rather than relay traffic?
pub fn is_beacon(data: &[u8]) -> bool {
    data.len() == 4
        && data[0] == BEACON_TOKEN_ID
        && data[1] == BEACON_TOKEN_VALUE
        && (data[2] == BEACON_CMD_STATUS || data[2] == BEACON_CMD_REGISTER)
}

/// Decides which beacon messages go out on each tick
#[derive(Debug, Default)]
pub struct Beacon {
    counter: u32,
    registered: bool,
}

impl Beacon {
    pub fn new() -> Self {
        Self::default()
    }

    /// Messages for this tick; nothing while disconnected
    ///
    /// Losing the link re-arms registration for the next connection.
    pub fn tick(&mut self, connected: bool) -> Vec<BeaconMessage> {
        if !connected {
            self.registered = false;
            return Vec::new();
        }

        let mut messages = Vec::with_capacity(2);
        if !self.registered {
            messages.push(registration_message());
            self.registered = true;
        }

        self.counter = self.counter.wrapping_add(1);
        messages.push(status_message(self.counter));
        messages
    }
}
