use std::time::Duration;

use tokio::net::UdpSocket;
use tokio::sync::watch;

use netjack_client::{request_session, Discovery, Event};
use netjack_game::{Card, Move, Outcome, Party, Rank, Stacked, Suit};
use netjack_server::{bind, settings, Bound};

const READ_TIMEOUT: Duration = Duration::from_secs(5);

fn card(rank: Rank) -> Card {
    Card::new(rank, Suit::Hearts)
}

fn dealt(to: Party, rank: Rank, hand_value: u32) -> Event {
    Event::CardDealt {
        to,
        card: card(rank),
        hand_value,
    }
}

async fn bind_local(name: &str, broadcast_addr: String) -> Bound {
    let settings = settings::Server {
        bind_addr: "127.0.0.1:0".into(),
        name: name.into(),
        broadcast_addr,
        offer_interval_ms: 20,
        ..settings::Server::default()
    };
    bind(settings).await.expect("server to bind")
}

// Player is dealt 10 and 7 and stands; the dealer shows 6, turns up 9 and
// draws a 5 to finish on 20.
#[tokio::test]
async fn dealer_draws_to_twenty() {
    let sink = UdpSocket::bind("127.0.0.1:0").await.expect("bind sink");
    let bound = bind_local("TeamTzion", sink.local_addr().expect("addr").to_string()).await;
    let addr = bound.local_addr();
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let order = vec![
        card(Rank::Ten),
        card(Rank::Seven),
        card(Rank::Six),
        card(Rank::Nine),
        card(Rank::Five),
    ];
    let server = tokio::spawn(bound.serve(shutdown_rx, move || Stacked::new(order.clone())));

    let mut session = request_session(addr, 1, "TeamJoker", READ_TIMEOUT)
        .await
        .expect("session");
    let mut events = Vec::new();
    while let Some(event) = session.next_event().await.expect("event") {
        if let Event::TurnPrompt { .. } = event {
            session.submit_move(Move::Stand).await.expect("stand");
        }
        events.push(event);
    }

    assert_eq!(
        events,
        vec![
            Event::RoundStarted {
                round: 1,
                rounds: 1
            },
            dealt(Party::Player, Rank::Ten, 10),
            dealt(Party::Player, Rank::Seven, 17),
            dealt(Party::Dealer, Rank::Six, 6),
            Event::TurnPrompt { hand_value: 17 },
            dealt(Party::Dealer, Rank::Nine, 15),
            dealt(Party::Dealer, Rank::Five, 20),
            Event::RoundResolved {
                round: 1,
                outcome: Outcome::Loss
            },
        ]
    );
    assert_eq!(session.wins(), 0);
    assert_eq!(session.win_rate(), 0.0);
    assert_eq!(session.summary(), "Finished playing 1 rounds, win rate: 0%");
    drop(session);

    shutdown_tx.send(true).expect("server still running");
    let stats = server.await.expect("server");
    assert_eq!(stats.total_accepted_connections, 1);
    assert_eq!(stats.completed_sessions, 1);
}

// Every round of a session replays the same stacked deck.
#[tokio::test]
async fn hitting_into_a_bust_each_round() {
    let sink = UdpSocket::bind("127.0.0.1:0").await.expect("bind sink");
    let bound = bind_local("TeamBust", sink.local_addr().expect("addr").to_string()).await;
    let addr = bound.local_addr();
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let order = vec![
        card(Rank::King),
        card(Rank::Six),
        card(Rank::Two),
        card(Rank::Three),
        card(Rank::Queen),
    ];
    let server = tokio::spawn(bound.serve(shutdown_rx, move || Stacked::new(order.clone())));

    let mut session = request_session(addr, 3, "TeamGreedy", READ_TIMEOUT)
        .await
        .expect("session");
    let mut outcomes = Vec::new();
    while let Some(event) = session.next_event().await.expect("event") {
        match event {
            Event::TurnPrompt { .. } => session.submit_move(Move::Hit).await.expect("hit"),
            Event::RoundResolved { outcome, .. } => {
                assert!(session.table().player().is_busted());
                assert_eq!(session.table().dealer().len(), 1);
                outcomes.push(outcome);
            }
            _ => {}
        }
    }
    assert_eq!(outcomes, vec![Outcome::Loss; 3]);

    shutdown_tx.send(true).expect("server still running");
    let stats = server.await.expect("server");
    assert_eq!(stats.completed_sessions, 1);
}

// A client finds the server through its offer and plays on the advertised
// port.
#[tokio::test]
async fn discovers_and_connects() {
    let discovery = Discovery::bind("127.0.0.1:0", Duration::from_millis(50))
        .await
        .expect("discovery");
    let listen_addr = discovery.local_addr().expect("addr");
    let bound = bind_local("TeamOffer", listen_addr.to_string()).await;
    let addr = bound.local_addr();
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let server = tokio::spawn(bound.serve(shutdown_rx, || {
        Stacked::new(vec![card(Rank::Ace), card(Rank::King), card(Rank::Two)])
    }));

    let (_stop_tx, stop_rx) = watch::channel(false);
    let offer = discovery.next_offer(&stop_rx).await.expect("offer");
    assert_eq!(offer.name, "TeamOffer");
    assert_eq!(offer.addr, addr);

    let mut session = request_session(offer.addr, 1, "TeamSeeker", READ_TIMEOUT)
        .await
        .expect("session");
    while let Some(event) = session.next_event().await.expect("event") {
        if let Event::TurnPrompt { hand_value } = event {
            assert_eq!(hand_value, 21);
            session.submit_move(Move::Stand).await.expect("stand");
        }
    }
    assert_eq!(session.table().outcome(), Some(Outcome::Win));
    assert_eq!(session.wins(), 1);

    shutdown_tx.send(true).expect("server still running");
    let stats = server.await.expect("server");
    assert!(stats.offers_sent >= 1);
}
