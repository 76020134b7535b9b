//! The binary wire protocol shared by the server and the client.
//!
//! Every message is a fixed-size frame: a 4-byte magic cookie, a 1-byte
//! message type, then a body whose size depends only on the message kind.
//! All integers are big-endian. There is no resynchronisation; a frame that
//! fails to decode invalidates the whole datagram or connection.

use std::fmt;
use std::io;
use std::marker::PhantomData;

use bytes::{Buf, BufMut, Bytes, BytesMut};
use snafu::{ensure, OptionExt, Snafu};
use tokio_util::codec::{Decoder, Encoder};

use crate::model::{Card, Outcome, Rank, Suit};

pub const MAGIC_COOKIE: u32 = 0xABCD_DCBA;

/// The UDP port clients listen on for offers.
pub const DISCOVERY_PORT: u16 = 13122;

/// Width of the zero-padded name fields in offers and requests.
pub const NAME_LEN: usize = 32;

const HEADER_LEN: usize = 5;

#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum Error {
    #[snafu(display("message truncated: expected {} bytes, got {}", expected, actual))]
    Truncated { expected: usize, actual: usize },

    #[snafu(display("bad magic cookie {:#010x}", cookie))]
    BadCookie { cookie: u32 },

    #[snafu(display("unexpected message type {:#04x}, expected {:#04x}", actual, expected))]
    UnexpectedType { expected: u8, actual: u8 },

    #[snafu(display("unknown result code {}", code))]
    UnknownResult { code: u8 },

    #[snafu(display("invalid card on the wire: rank {}, suit {}", rank, suit))]
    InvalidCard { rank: u16, suit: u8 },

    #[snafu(context(false), display("I/O error: {}", source))]
    Io { source: io::Error },
}

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
#[repr(u8)]
pub enum MessageType {
    Offer = 0x2,
    Request = 0x3,
    /// Shared by card payloads (server to client) and moves (client to
    /// server); the direction and frame size tell them apart.
    Payload = 0x4,
}

/// A fixed-size protocol message.
pub trait Message: Sized {
    const KIND: MessageType;
    /// Size of the whole frame, header included.
    const LEN: usize;

    fn encode_body(&self, dst: &mut BytesMut);

    /// Decode the body; `body` is exactly `LEN - 5` bytes long.
    fn decode_body(body: &[u8]) -> Result<Self, Error>;

    fn encode(&self, dst: &mut BytesMut) {
        dst.reserve(Self::LEN);
        dst.put_u32(MAGIC_COOKIE);
        dst.put_u8(Self::KIND as u8);
        self.encode_body(dst);
    }

    fn to_bytes(&self) -> Bytes {
        let mut buf = BytesMut::with_capacity(Self::LEN);
        self.encode(&mut buf);
        buf.freeze()
    }

    /// Decode a frame, checking the cookie and the type before the body.
    /// Bytes past `LEN` are ignored.
    fn decode(frame: &[u8]) -> Result<Self, Error> {
        ensure!(
            frame.len() >= Self::LEN,
            TruncatedSnafu {
                expected: Self::LEN,
                actual: frame.len(),
            }
        );
        let mut buf = &frame[..Self::LEN];
        let cookie = buf.get_u32();
        ensure!(cookie == MAGIC_COOKIE, BadCookieSnafu { cookie });
        let kind = buf.get_u8();
        ensure!(
            kind == Self::KIND as u8,
            UnexpectedTypeSnafu {
                expected: Self::KIND as u8,
                actual: kind,
            }
        );
        Self::decode_body(buf)
    }
}

/// Broadcast by the server to advertise where it accepts game sessions.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct Offer {
    pub port: u16,
    pub server_name: String,
}

impl Message for Offer {
    const KIND: MessageType = MessageType::Offer;
    const LEN: usize = HEADER_LEN + 2 + NAME_LEN;

    fn encode_body(&self, dst: &mut BytesMut) {
        dst.put_u16(self.port);
        put_name(dst, &self.server_name);
    }

    fn decode_body(mut body: &[u8]) -> Result<Self, Error> {
        let port = body.get_u16();
        Ok(Offer {
            port,
            server_name: get_name(body),
        })
    }
}

/// Sent by the client right after connecting, asking for a number of rounds.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct Request {
    pub rounds: u8,
    pub team_name: String,
}

impl Message for Request {
    const KIND: MessageType = MessageType::Request;
    const LEN: usize = HEADER_LEN + 1 + NAME_LEN;

    fn encode_body(&self, dst: &mut BytesMut) {
        dst.put_u8(self.rounds);
        put_name(dst, &self.team_name);
    }

    fn decode_body(mut body: &[u8]) -> Result<Self, Error> {
        let rounds = body.get_u8();
        Ok(Request {
            rounds,
            team_name: get_name(body),
        })
    }
}

#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
#[repr(u8)]
pub enum ResultCode {
    Ongoing = 0,
    Tie = 1,
    Loss = 2,
    Win = 3,
}

impl ResultCode {
    pub fn from_u8(code: u8) -> Option<ResultCode> {
        match code {
            0 => Some(ResultCode::Ongoing),
            1 => Some(ResultCode::Tie),
            2 => Some(ResultCode::Loss),
            3 => Some(ResultCode::Win),
            _ => None,
        }
    }

    /// The outcome carried by the code, or `None` while the round goes on.
    pub fn outcome(self) -> Option<Outcome> {
        match self {
            ResultCode::Ongoing => None,
            ResultCode::Tie => Some(Outcome::Tie),
            ResultCode::Loss => Some(Outcome::Loss),
            ResultCode::Win => Some(Outcome::Win),
        }
    }
}

impl From<Outcome> for ResultCode {
    fn from(outcome: Outcome) -> Self {
        match outcome {
            Outcome::Win => ResultCode::Win,
            Outcome::Loss => ResultCode::Loss,
            Outcome::Tie => ResultCode::Tie,
        }
    }
}

/// A card dealt by the server, a round result, or both.
///
/// A bust is announced by sending the busting card with a `Loss` result;
/// other end-of-round results travel without a card (rank 0 on the wire).
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct Payload {
    pub result: ResultCode,
    pub card: Option<Card>,
}

impl Payload {
    pub fn card(card: Card) -> Self {
        Payload {
            result: ResultCode::Ongoing,
            card: Some(card),
        }
    }

    pub fn result(outcome: Outcome) -> Self {
        Payload {
            result: outcome.into(),
            card: None,
        }
    }
}

impl Message for Payload {
    const KIND: MessageType = MessageType::Payload;
    const LEN: usize = HEADER_LEN + 1 + 2 + 1;

    fn encode_body(&self, dst: &mut BytesMut) {
        dst.put_u8(self.result as u8);
        match self.card {
            Some(card) => {
                dst.put_u16(card.rank.wire());
                dst.put_u8(card.suit.wire());
            }
            None => {
                dst.put_u16(0);
                dst.put_u8(0);
            }
        }
    }

    fn decode_body(mut body: &[u8]) -> Result<Self, Error> {
        let code = body.get_u8();
        let result = ResultCode::from_u8(code).context(UnknownResultSnafu { code })?;
        let rank = body.get_u16();
        let suit = body.get_u8();
        let card = if rank == 0 {
            None
        } else {
            let r = Rank::from_wire(rank).context(InvalidCardSnafu { rank, suit })?;
            let s = Suit::from_wire(suit).context(InvalidCardSnafu { rank, suit })?;
            Some(Card::new(r, s))
        };
        Ok(Payload { result, card })
    }
}

/// The player's decision, sent by the client during its turn.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum Move {
    Hit,
    Stand,
}

const MOVE_TOKEN_LEN: usize = 5;

impl Move {
    fn token(self) -> &'static [u8; MOVE_TOKEN_LEN] {
        match self {
            Move::Hit => b"Hittt",
            Move::Stand => b"Stand",
        }
    }

    /// Interpret a move token leniently: anything mentioning "hit" is a hit,
    /// everything else stands. Kept for compatibility with existing clients,
    /// not something new clients should rely on.
    pub fn parse_lenient(token: &[u8]) -> Move {
        let text = String::from_utf8_lossy(token);
        let text = text
            .trim_matches(|c: char| c == '\0' || c.is_whitespace())
            .to_lowercase();
        if text.contains("hit") {
            Move::Hit
        } else {
            Move::Stand
        }
    }
}

impl fmt::Display for Move {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Move::Hit => f.write_str("hit"),
            Move::Stand => f.write_str("stand"),
        }
    }
}

impl Message for Move {
    const KIND: MessageType = MessageType::Payload;
    const LEN: usize = HEADER_LEN + MOVE_TOKEN_LEN;

    fn encode_body(&self, dst: &mut BytesMut) {
        dst.put_slice(self.token());
    }

    fn decode_body(body: &[u8]) -> Result<Self, Error> {
        Ok(Move::parse_lenient(body))
    }
}

fn put_name(dst: &mut BytesMut, name: &str) {
    let mut end = name.len().min(NAME_LEN);
    while !name.is_char_boundary(end) {
        end -= 1;
    }
    dst.put_slice(&name.as_bytes()[..end]);
    dst.put_bytes(0, NAME_LEN - end);
}

fn get_name(field: &[u8]) -> String {
    String::from_utf8_lossy(&field[..NAME_LEN])
        .trim_matches('\0')
        .to_string()
}

/// Frames a byte stream into messages of kind `M`, and encodes any message
/// kind on the way out.
pub struct WireCodec<M> {
    inbound: PhantomData<fn() -> M>,
}

impl<M> WireCodec<M> {
    pub fn new() -> Self {
        WireCodec {
            inbound: PhantomData,
        }
    }
}

impl<M> Default for WireCodec<M> {
    fn default() -> Self {
        WireCodec::new()
    }
}

impl<M> fmt::Debug for WireCodec<M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WireCodec").finish()
    }
}

impl<M: Message> Decoder for WireCodec<M> {
    type Item = M;
    type Error = Error;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<M>, Error> {
        if src.len() < M::LEN {
            src.reserve(M::LEN - src.len());
            return Ok(None);
        }
        let frame = src.split_to(M::LEN);
        M::decode(&frame).map(Some)
    }
}

impl<M, T: Message> Encoder<T> for WireCodec<M> {
    type Error = Error;

    fn encode(&mut self, item: T, dst: &mut BytesMut) -> Result<(), Error> {
        item.encode(dst);
        Ok(())
    }
}
