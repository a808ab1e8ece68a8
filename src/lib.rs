//! Crate for driving a CH9329 serial-to-USB-HID bridge chip.
//!
//! This crate is structured around two key traits: [`Encode`](encode::Encode) and [`Decode`](decode::Decode).
//! These traits are used to encode commands sent to the chip and decode the replies it sends back.
//! Every command and reply payload in [`packets`] has an [`Encode`](encode::Encode) or [`Decode`](decode::Decode) implementation,
//! and [`frame`] wraps them in the chip's checksummed frame format.
//!
//! A [`Connection`] correlates requests with replies over any [`Transport`](connection::Transport).
//! Operations return `Result<Outcome<T>, ConnectionError>`: the outer error means the channel broke,
//! the inner [`SoftFailure`] means this one request failed and may be retried.
//!
//! For typing text, clicking and dragging, see [`HidController`](automation::HidController).

pub mod automation;
pub mod connection;
pub mod decode;
pub mod encode;
pub mod frame;
pub mod packets;
pub mod string;

pub use connection::{Connection, ConnectionError, ConnectionOptions, Outcome, SoftFailure};

#[cfg(feature = "serial")]
pub use connection::serial;
