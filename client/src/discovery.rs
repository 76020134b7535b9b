use std::io;
use std::net::SocketAddr;
use std::time::Duration;

use log::{debug, info};
use snafu::{OptionExt, ResultExt};
use socket2::{Domain, Protocol, Socket, Type};
use tokio::net::{lookup_host, ToSocketAddrs, UdpSocket};
use tokio::sync::watch;
use tokio::time;

use netjack_game::protocol::{Message, Offer};

use crate::settings;
use crate::{CancelledSnafu, Error, ListenSnafu, NoAddressSnafu, ReceiveSnafu};

/// A server that advertised itself.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct ServerOffer {
    /// The sender's IP with the advertised game port.
    pub addr: SocketAddr,
    pub name: String,
}

/// Listens for offer broadcasts.
pub struct Discovery {
    socket: UdpSocket,
    poll_interval: Duration,
}

impl Discovery {
    /// Bind the offer port. The port is shared, so several clients on one
    /// host all hear the same broadcasts.
    pub async fn bind<A: ToSocketAddrs + ToString>(
        addr: A,
        poll_interval: Duration,
    ) -> Result<Self, Error> {
        let name = addr.to_string();
        let local = lookup_host(addr)
            .await
            .context(ListenSnafu { addr: name.clone() })?
            .next()
            .context(NoAddressSnafu { addr: name.clone() })?;
        let socket = shared_socket(local).context(ListenSnafu { addr: name })?;
        Ok(Discovery {
            socket,
            poll_interval,
        })
    }

    pub fn local_addr(&self) -> Result<SocketAddr, Error> {
        self.socket.local_addr().context(ReceiveSnafu)
    }

    /// Wait for the first valid offer. Anything that does not decode as an
    /// offer is dropped. `stop` is checked once per poll interval.
    pub async fn next_offer(&self, stop: &watch::Receiver<bool>) -> Result<ServerOffer, Error> {
        let mut buf = [0u8; 1024];
        loop {
            let stopped = *stop.borrow();
            if stopped {
                return CancelledSnafu.fail();
            }
            let received = time::timeout(self.poll_interval, self.socket.recv_from(&mut buf)).await;
            let (len, from) = match received {
                Err(_) => continue,
                Ok(res) => res.context(ReceiveSnafu)?,
            };
            match Offer::decode(&buf[..len]) {
                Ok(offer) => {
                    info!("offer from {:?} at {}", offer.server_name, from);
                    return Ok(ServerOffer {
                        addr: SocketAddr::new(from.ip(), offer.port),
                        name: offer.server_name,
                    });
                }
                Err(e) => debug!("ignoring datagram from {}: {}", from, e),
            }
        }
    }
}

fn shared_socket(addr: SocketAddr) -> io::Result<UdpSocket> {
    let socket = Socket::new(Domain::for_address(addr), Type::DGRAM, Some(Protocol::UDP))?;
    socket.set_reuse_address(true)?;
    #[cfg(unix)]
    socket.set_reuse_port(true)?;
    socket.set_nonblocking(true)?;
    socket.bind(&addr.into())?;
    UdpSocket::from_std(socket.into())
}

/// Listen on the configured discovery port until a server offers itself.
pub async fn discover(
    client: &settings::Client,
    stop: &watch::Receiver<bool>,
) -> Result<ServerOffer, Error> {
    Discovery::bind(client.discovery_addr(), client.poll_interval())
        .await?
        .next_offer(stop)
        .await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn skips_garbage_and_takes_the_first_offer() {
        let discovery = Discovery::bind("127.0.0.1:0", Duration::from_millis(50))
            .await
            .expect("bind");
        let target = discovery.local_addr().expect("addr");
        let sender = UdpSocket::bind("127.0.0.1:0").await.expect("bind");

        let mut bad_cookie = Offer {
            port: 1,
            server_name: "impostor".into(),
        }
        .to_bytes()
        .to_vec();
        bad_cookie[0] ^= 0xFF;
        sender.send_to(&bad_cookie, target).await.expect("send");
        sender.send_to(b"hello", target).await.expect("send");
        let good = Offer {
            port: 5555,
            server_name: "TeamTzion".into(),
        };
        sender.send_to(&good.to_bytes(), target).await.expect("send");

        let (_stop_tx, stop_rx) = watch::channel(false);
        let offer = discovery.next_offer(&stop_rx).await.expect("offer");
        assert_eq!(offer.name, "TeamTzion");
        assert_eq!(offer.addr, "127.0.0.1:5555".parse::<SocketAddr>().expect("addr"));
    }

    #[tokio::test]
    async fn clients_on_one_host_share_the_port() {
        let first = Discovery::bind("0.0.0.0:0", Duration::from_millis(50))
            .await
            .expect("bind");
        let port = first.local_addr().expect("addr").port();
        let second = Discovery::bind(format!("0.0.0.0:{}", port), Duration::from_millis(50))
            .await
            .expect("second bind on the same port");

        let sender = UdpSocket::bind("127.0.0.1:0").await.expect("bind");
        sender.set_broadcast(true).expect("broadcast");
        let offer = Offer {
            port: 5555,
            server_name: "TeamShared".into(),
        };
        sender
            .send_to(&offer.to_bytes(), ("127.255.255.255", port))
            .await
            .expect("send");

        let (_stop_tx, stop_rx) = watch::channel(false);
        let wait = Duration::from_secs(2);
        for discovery in &[first, second] {
            let heard = time::timeout(wait, discovery.next_offer(&stop_rx))
                .await
                .expect("offer in time")
                .expect("offer");
            assert_eq!(heard.name, "TeamShared");
            assert_eq!(heard.addr.port(), 5555);
        }
    }

    #[tokio::test]
    async fn stops_within_a_poll_interval() {
        let discovery = Discovery::bind("127.0.0.1:0", Duration::from_millis(20))
            .await
            .expect("bind");
        let (stop_tx, stop_rx) = watch::channel(false);
        let waiting = tokio::spawn(async move { discovery.next_offer(&stop_rx).await });
        time::sleep(Duration::from_millis(50)).await;
        stop_tx.send(true).expect("still waiting");
        let result = time::timeout(Duration::from_secs(1), waiting)
            .await
            .expect("stopped in time")
            .expect("task");
        assert!(matches!(result, Err(Error::Cancelled)));
    }
}
