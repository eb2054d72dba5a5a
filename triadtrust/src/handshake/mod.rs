// Handshake module declarations

pub mod codec;
pub mod messages;
pub mod protocol;
pub mod state;
pub mod trusted;
