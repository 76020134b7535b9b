//! The client side of a game session.

use std::collections::VecDeque;
use std::net::SocketAddr;
use std::time::Duration;

use futures::{SinkExt, StreamExt};
use log::{debug, info};
use snafu::{ensure, ResultExt};
use tokio::net::TcpStream;
use tokio::time;
use tokio_util::codec::Framed;

use netjack_game::protocol::{Move, Payload, Request, WireCodec};
use netjack_game::Outcome;

use crate::table::{Event, Table};
use crate::{
    ConnectSnafu, ConnectionSnafu, DisconnectedSnafu, Error, MovePendingSnafu, NotYourTurnSnafu,
    TimeoutSnafu,
};

/// Connect to `server` and ask for `rounds` rounds.
pub async fn request_session(
    server: SocketAddr,
    rounds: u8,
    team_name: &str,
    read_timeout: Duration,
) -> Result<Session, Error> {
    let stream = TcpStream::connect(server)
        .await
        .context(ConnectSnafu { addr: server })?;
    let mut framed = Framed::new(stream, WireCodec::<Payload>::new());
    framed
        .send(Request {
            rounds,
            team_name: team_name.to_string(),
        })
        .await
        .context(ConnectionSnafu { addr: server })?;
    info!("requested {} rounds from {}", rounds, server);
    Ok(Session {
        framed,
        server,
        rounds,
        round: 0,
        table: Table::new(0),
        pending: VecDeque::new(),
        wins: 0,
        read_timeout,
    })
}

/// A connected session. Drive it with `next_event`, answering each
/// `TurnPrompt` with `submit_move`.
pub struct Session {
    framed: Framed<TcpStream, WireCodec<Payload>>,
    server: SocketAddr,
    rounds: u8,
    round: u8,
    table: Table,
    pending: VecDeque<Event>,
    wins: usize,
    read_timeout: Duration,
}

impl Session {
    /// The next thing that happened at the table, or `None` once every
    /// requested round is resolved.
    ///
    /// Fails with `MovePending` while a `TurnPrompt` is unanswered.
    pub async fn next_event(&mut self) -> Result<Option<Event>, Error> {
        loop {
            if let Some(event) = self.pending.pop_front() {
                return Ok(Some(event));
            }
            ensure!(!self.table.is_awaiting_move(), MovePendingSnafu);
            if self.round == 0 || self.table.is_resolved() {
                if self.round >= self.rounds {
                    return Ok(None);
                }
                self.round += 1;
                self.table = Table::new(self.round);
                return Ok(Some(Event::RoundStarted {
                    round: self.round,
                    rounds: self.rounds,
                }));
            }

            let payload = self.receive().await?;
            debug!("{:?} from {}", payload, self.server);
            for event in self.table.observe(payload) {
                if let Event::RoundResolved {
                    outcome: Outcome::Win,
                    ..
                } = event
                {
                    self.wins += 1;
                }
                self.pending.push_back(event);
            }
        }
    }

    pub async fn submit_move(&mut self, mv: Move) -> Result<(), Error> {
        ensure!(self.table.is_awaiting_move(), NotYourTurnSnafu);
        let addr = self.server;
        self.framed
            .send(mv)
            .await
            .context(ConnectionSnafu { addr })?;
        self.table.moved(mv);
        Ok(())
    }

    pub fn server(&self) -> SocketAddr {
        self.server
    }

    pub fn rounds(&self) -> u8 {
        self.rounds
    }

    pub fn wins(&self) -> usize {
        self.wins
    }

    /// Wins over requested rounds; zero when no rounds were requested.
    pub fn win_rate(&self) -> f64 {
        if self.rounds == 0 {
            0.0
        } else {
            self.wins as f64 / self.rounds as f64
        }
    }

    /// One-line report of the session, with the win rate as a whole
    /// percentage.
    pub fn summary(&self) -> String {
        format!(
            "Finished playing {} rounds, win rate: {:.0}%",
            self.rounds,
            self.win_rate() * 100.0
        )
    }

    /// The round in progress, or the last one played.
    pub fn table(&self) -> &Table {
        &self.table
    }

    async fn receive(&mut self) -> Result<Payload, Error> {
        let addr = self.server;
        let timeout = self.read_timeout;
        match time::timeout(timeout, self.framed.next()).await {
            Err(_) => TimeoutSnafu { addr, timeout }.fail(),
            Ok(None) => DisconnectedSnafu { addr }.fail(),
            Ok(Some(payload)) => payload.context(ConnectionSnafu { addr }),
        }
    }
}
