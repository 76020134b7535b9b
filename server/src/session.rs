//! One client connection, from the handshake to the last round.

use std::net::SocketAddr;
use std::time::Duration;

use futures::{SinkExt, StreamExt};
use log::{debug, info};
use snafu::{ResultExt, Snafu};
use tokio::net::TcpStream;
use tokio::sync::watch;
use tokio::time;
use tokio_util::codec::Framed;

use netjack_game::protocol::{self, Message, Move, Payload, Request, WireCodec};
use netjack_game::{Outcome, Round, Shuffler};

#[derive(Debug, Snafu)]
pub enum Error {
    #[snafu(display("connection with {} failed: {}", addr, source))]
    Connection {
        addr: SocketAddr,
        source: protocol::Error,
    },

    #[snafu(display("{} sent nothing for {:?}", addr, timeout))]
    Timeout { addr: SocketAddr, timeout: Duration },

    #[snafu(display("{} disconnected", addr))]
    Disconnected { addr: SocketAddr },

    #[snafu(display("server shutting down"))]
    ShuttingDown,
}

/// What a client asked for, and how it went.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct Session {
    team_name: String,
    rounds: u8,
    outcomes: Vec<Outcome>,
}

impl Session {
    pub fn new(request: Request) -> Self {
        Session {
            team_name: request.team_name,
            rounds: request.rounds,
            outcomes: Vec::with_capacity(request.rounds as usize),
        }
    }

    pub fn team_name(&self) -> &str {
        &self.team_name
    }

    /// The number of rounds agreed at the handshake.
    pub fn rounds(&self) -> u8 {
        self.rounds
    }

    pub fn outcomes(&self) -> &[Outcome] {
        &self.outcomes
    }

    pub fn rounds_played(&self) -> usize {
        self.outcomes.len()
    }

    pub fn wins(&self) -> usize {
        self.outcomes.iter().filter(|&&o| o == Outcome::Win).count()
    }

    pub fn is_complete(&self) -> bool {
        self.rounds_played() == self.rounds as usize
    }

    fn record(&mut self, outcome: Outcome) {
        self.outcomes.push(outcome);
    }
}

/// Serve a single client: read its request, then play the requested number
/// of rounds. Every read is bounded by `read_timeout`, and a change on
/// `stopped` aborts the session.
pub async fn serve<S: Shuffler + ?Sized>(
    stream: TcpStream,
    addr: SocketAddr,
    read_timeout: Duration,
    shuffler: &mut S,
    stopped: watch::Receiver<bool>,
) -> Result<Session, Error> {
    let mut conn = Connection {
        framed: Framed::new(stream, WireCodec::<Request>::new()),
        addr,
        read_timeout,
        stopped,
    };
    let request = conn.receive().await?;
    info!(
        "{} is team {:?} and wants {} rounds",
        addr, request.team_name, request.rounds
    );

    let mut conn = conn.expect::<Move>();
    let mut session = Session::new(request);
    let mut round = Round::new();
    for n in 1..=session.rounds() {
        let stopped = *conn.stopped.borrow();
        if stopped {
            return ShuttingDownSnafu.fail();
        }
        debug!("round {} of {} starting for {}", n, session.rounds(), addr);
        let outcome = conn.play_round(&mut round, shuffler).await?;
        info!(
            "round {} for {:?}: {} (player {}, dealer {})",
            n,
            session.team_name(),
            outcome,
            round.player().value(),
            round.dealer().value()
        );
        session.record(outcome);
    }
    Ok(session)
}

struct Connection<M> {
    framed: Framed<TcpStream, WireCodec<M>>,
    addr: SocketAddr,
    read_timeout: Duration,
    stopped: watch::Receiver<bool>,
}

impl<M: Message> Connection<M> {
    async fn receive(&mut self) -> Result<M, Error> {
        let addr = self.addr;
        let timeout = self.read_timeout;
        tokio::select! {
            _ = self.stopped.changed() => ShuttingDownSnafu.fail(),
            read = time::timeout(timeout, self.framed.next()) => match read {
                Err(_) => TimeoutSnafu { addr, timeout }.fail(),
                Ok(None) => DisconnectedSnafu { addr }.fail(),
                Ok(Some(msg)) => msg.context(ConnectionSnafu { addr }),
            },
        }
    }

    /// Switch to reading another kind of message, keeping buffered bytes.
    fn expect<N>(self) -> Connection<N> {
        Connection {
            framed: self.framed.map_codec(|_| WireCodec::<N>::new()),
            addr: self.addr,
            read_timeout: self.read_timeout,
            stopped: self.stopped,
        }
    }
}

impl Connection<Move> {
    async fn play_round<S: Shuffler + ?Sized>(
        &mut self,
        round: &mut Round,
        shuffler: &mut S,
    ) -> Result<Outcome, Error> {
        let opening = round.start(shuffler);
        self.send_all(opening).await?;
        loop {
            if let Some(outcome) = round.outcome() {
                return Ok(outcome);
            }
            let mv = self.receive().await?;
            debug!(
                "{} chose {} holding {}",
                self.addr,
                mv,
                round.player().value()
            );
            let payloads = round.play(mv);
            self.send_all(payloads).await?;
        }
    }

    async fn send_all(&mut self, payloads: Vec<Payload>) -> Result<(), Error> {
        let addr = self.addr;
        for payload in payloads {
            self.framed
                .feed(payload)
                .await
                .context(ConnectionSnafu { addr })?;
        }
        SinkExt::<Payload>::flush(&mut self.framed)
            .await
            .context(ConnectionSnafu { addr })
    }
}
