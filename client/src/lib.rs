#![warn(rust_2018_idioms)]

use std::io;
use std::net::SocketAddr;
use std::time::Duration;

use snafu::Snafu;

use netjack_game::protocol;

pub mod discovery;
pub mod session;
pub mod settings;
pub mod table;

pub use discovery::{discover, Discovery, ServerOffer};
pub use session::{request_session, Session};
pub use table::{Event, Table};

#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum Error {
    #[snafu(display("could not listen for offers on {}: {}", addr, source))]
    Listen { addr: String, source: io::Error },

    #[snafu(display("{} did not resolve to any address", addr))]
    NoAddress { addr: String },

    #[snafu(display("while waiting for offers: {}", source))]
    Receive { source: io::Error },

    #[snafu(display("cancelled"))]
    Cancelled,

    #[snafu(display("could not connect to {}: {}", addr, source))]
    Connect { addr: SocketAddr, source: io::Error },

    #[snafu(display("connection with {} failed: {}", addr, source))]
    Connection {
        addr: SocketAddr,
        source: protocol::Error,
    },

    #[snafu(display("{} sent nothing for {:?}", addr, timeout))]
    Timeout { addr: SocketAddr, timeout: Duration },

    #[snafu(display("{} closed the connection", addr))]
    Disconnected { addr: SocketAddr },

    #[snafu(display("the server is waiting for a move"))]
    MovePending,

    #[snafu(display("it is not the player's turn"))]
    NotYourTurn,
}
