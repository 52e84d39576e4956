pub mod channel;
pub mod handshake;
pub mod protocol;

pub use channel::{LineChannel, LineStream, LinkError, open_serial};
pub use handshake::{Handshake, HandshakeError, HandshakeState};
pub use protocol::{ARMING_SEQUENCE, Command, Response};
