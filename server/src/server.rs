use std::io;
use std::net::SocketAddr;
use std::time::Duration;

use futures::stream::futures_unordered::FuturesUnordered;
use futures::StreamExt;
use log::{debug, error, info, warn};
use rand::rngs::StdRng;
use rand::SeedableRng;
use snafu::{OptionExt, ResultExt, Snafu};
use tokio::net::{lookup_host, TcpListener, TcpStream, UdpSocket};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time;

use netjack_game::protocol::{Message, Offer};
use netjack_game::{RandomShuffler, Shuffler};

use crate::session;
use crate::settings;

#[derive(Debug, Snafu)]
pub enum Error {
    #[snafu(display("could not resolve {}: {}", addr, source))]
    Resolve { addr: String, source: io::Error },

    #[snafu(display("{} did not resolve to any address", addr))]
    NoAddress { addr: String },

    #[snafu(display("could not bind {}: {}", addr, source))]
    Bind { addr: String, source: io::Error },

    #[snafu(display("could not set up offer broadcasts: {}", source))]
    Broadcast { source: io::Error },
}

#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub struct Stats {
    pub total_accepted_connections: usize,
    /// Sessions that played every round they asked for.
    pub completed_sessions: usize,
    pub offers_sent: usize,
}

/// Execute the entire life-cycle of the netjack server.
pub async fn run(
    server: settings::Server,
    shutdown_rx: watch::Receiver<bool>,
) -> Result<Stats, Error> {
    let bound = bind(server).await?;
    Ok(bound
        .serve(shutdown_rx, || RandomShuffler(StdRng::from_entropy()))
        .await)
}

/// Bind the game listener and the offer socket, without serving anything yet.
pub async fn bind(server: settings::Server) -> Result<Bound, Error> {
    let listener = TcpListener::bind(&server.bind_addr)
        .await
        .context(BindSnafu {
            addr: server.bind_addr.clone(),
        })?;
    let local_addr = listener.local_addr().context(BindSnafu {
        addr: server.bind_addr.clone(),
    })?;

    let broadcast_to = lookup_host(&server.broadcast_addr)
        .await
        .context(ResolveSnafu {
            addr: server.broadcast_addr.clone(),
        })?
        .next()
        .context(NoAddressSnafu {
            addr: server.broadcast_addr.clone(),
        })?;
    let offers = UdpSocket::bind("0.0.0.0:0")
        .await
        .context(BroadcastSnafu)?;
    offers.set_broadcast(true).context(BroadcastSnafu)?;

    Ok(Bound {
        listener,
        local_addr,
        offers,
        broadcast_to,
        settings: server,
    })
}

/// A server with its sockets bound.
pub struct Bound {
    listener: TcpListener,
    local_addr: SocketAddr,
    offers: UdpSocket,
    broadcast_to: SocketAddr,
    settings: settings::Server,
}

impl Bound {
    /// The address game sessions are accepted on.
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Broadcast offers and serve sessions until `shutdown_rx` changes, then
    /// wait for every session to finish.
    ///
    /// Each session gets its own shuffler from `new_shuffler`.
    pub async fn serve<F, S>(
        self,
        mut shutdown_rx: watch::Receiver<bool>,
        mut new_shuffler: F,
    ) -> Stats
    where
        F: FnMut() -> S,
        S: Shuffler + Send + 'static,
    {
        let mut stats = Stats::default();
        let offer = Offer {
            port: self.local_addr.port(),
            server_name: self.settings.name.clone(),
        };
        let broadcaster = tokio::spawn(broadcast_offers(
            self.offers,
            self.broadcast_to,
            offer,
            self.settings.offer_interval(),
            shutdown_rx.clone(),
        ));
        info!(
            "netjack server {:?} running on {}",
            self.settings.name, self.local_addr
        );

        // Main loop: wait for incoming connections, spawn tasks for each one.
        let read_timeout = self.settings.read_timeout();
        let mut connection_tasks = FuturesUnordered::new();
        loop {
            tokio::select! {
                _ = shutdown_rx.changed() => {
                    info!("received shutdown notice");
                    break
                },
                accepted = self.listener.accept() => match accepted {
                    Ok((stream, addr)) => {
                        stats.total_accepted_connections += 1;
                        info!("accepted connection from {}", addr);
                        connection_tasks.push(spawn_session(
                            stream,
                            addr,
                            read_timeout,
                            new_shuffler(),
                            shutdown_rx.clone(),
                        ));
                    }
                    Err(e) => error!("while accepting a connection: {}", e),
                },
                Some(result) = connection_tasks.next() => reap(result, &mut stats),
            }
        }

        // Gracefully shutdown and await all connection tasks.
        info!("reaping {} connection tasks", connection_tasks.len());
        while let Some(result) = connection_tasks.next().await {
            reap(result, &mut stats);
        }
        match broadcaster.await {
            Ok(sent) => stats.offers_sent = sent,
            Err(e) => error!("offer broadcaster: {}", e),
        }
        stats
    }
}

fn spawn_session<S>(
    stream: TcpStream,
    addr: SocketAddr,
    read_timeout: Duration,
    mut shuffler: S,
    stopped: watch::Receiver<bool>,
) -> JoinHandle<bool>
where
    S: Shuffler + Send + 'static,
{
    tokio::spawn(async move {
        match session::serve(stream, addr, read_timeout, &mut shuffler, stopped).await {
            Ok(session) => {
                info!(
                    "team {:?} at {} finished: {} wins in {} rounds",
                    session.team_name(),
                    addr,
                    session.wins(),
                    session.rounds_played()
                );
                session.is_complete()
            }
            Err(session::Error::Disconnected { .. }) => {
                info!("{} disconnected", addr);
                false
            }
            Err(e @ session::Error::ShuttingDown) => {
                debug!("stopped handling {}: {}", addr, e);
                false
            }
            Err(e) => {
                error!("while handling {}: {}", addr, e);
                false
            }
        }
    })
}

fn reap(result: Result<bool, tokio::task::JoinError>, stats: &mut Stats) {
    match result {
        Ok(true) => stats.completed_sessions += 1,
        Ok(false) => {}
        Err(e) => error!("connection task: {}", e),
    }
}

// Sends the same offer on every tick until told to stop. Returns how many
// offers went out.
async fn broadcast_offers(
    socket: UdpSocket,
    target: SocketAddr,
    offer: Offer,
    interval: Duration,
    mut stopped: watch::Receiver<bool>,
) -> usize {
    let datagram = offer.to_bytes();
    let mut ticker = time::interval(interval);
    let mut sent = 0;
    let mut failing = false;
    info!("broadcasting offers to {} every {:?}", target, interval);
    loop {
        tokio::select! {
            _ = stopped.changed() => break,
            _ = ticker.tick() => match socket.send_to(&datagram, target).await {
                Ok(_) => {
                    sent += 1;
                    failing = false;
                }
                Err(e) => {
                    if !failing {
                        warn!("while broadcasting an offer to {}: {}", target, e);
                    }
                    failing = true;
                }
            },
        }
    }
    debug!("offer broadcaster stopped after {} offers", sent);
    sent
}
