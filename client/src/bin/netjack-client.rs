#![warn(rust_2018_idioms)]

use std::io::Write;
use std::str::FromStr;
use std::sync::atomic::{AtomicUsize, Ordering};

use docopt::Docopt;
use flexi_logger::{LogSpecBuilder, LoggerHandle};
use log::{info, warn, LevelFilter};
use serde::Deserialize;
use tokio::io::{self, AsyncBufReadExt, BufReader, Lines, Stdin};
use tokio::sync::watch;

use netjack_client::{discover, request_session, settings, Error, Event, ServerOffer};
use netjack_game::{Move, Outcome, Party, StandOn, Strategy};

const USAGE: &str = "
netjack-client - play Blackjack against a server on the local network.

Usage:
    netjack-client [--rounds=<n>] [--team=<name>] [--auto=<n>] [--once]
    netjack-client (-h | --help)
    netjack-client --version

Options:
    -h --help        Show this screen.
    -V --version     Show version.
    --rounds=<n>     Rounds to request from each server; asked for if absent.
    --team=<name>    Team name to introduce ourselves with.
    --auto=<n>       Play without asking: hit while the hand is below n.
    --once           Quit after the first session instead of looking for
                     another server.
";

#[derive(Debug, Deserialize)]
struct Args {
    flag_rounds: Option<u8>,
    flag_team: Option<String>,
    flag_auto: Option<u32>,
    flag_once: bool,
}

type Input = Lines<BufReader<Stdin>>;

fn main() -> anyhow::Result<()> {
    let args: Args = Docopt::new(USAGE)
        .and_then(|d| {
            d.version(Some(env!("CARGO_PKG_VERSION").to_string()))
                .deserialize()
        })
        .unwrap_or_else(|e| e.exit());
    let mut settings = settings::load()?;
    if let Some(team) = &args.flag_team {
        settings.client.team_name = team.clone();
    }
    let _logger = setup_logger(&settings.logging)?;
    let stop_rx = setup_signal()?;
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;
    runtime.block_on(play(args, settings.client, stop_rx))
}

async fn play(
    args: Args,
    client: settings::Client,
    mut stop: watch::Receiver<bool>,
) -> anyhow::Result<()> {
    let mut input = BufReader::new(io::stdin()).lines();
    let strategy = args.flag_auto.map(StandOn);
    println!("Client started, listening for offer requests...");
    loop {
        let rounds = match args.flag_rounds {
            Some(n) => n,
            None => {
                let asked = tokio::select! {
                    _ = stop.changed() => break,
                    asked = ask_rounds(&mut input) => asked?,
                };
                match asked {
                    Some(n) => n,
                    None => break,
                }
            }
        };

        let offer = match discover(&client, &stop).await {
            Ok(offer) => offer,
            Err(Error::Cancelled) => break,
            Err(e) => return Err(e.into()),
        };
        println!(
            "Received offer from {} at {}, attempting to connect...",
            offer.name, offer.addr
        );

        let played = tokio::select! {
            _ = stop.changed() => break,
            played = play_session(&offer, rounds, &client, strategy.as_ref(), &mut input) => played,
        };
        if let Err(e) = played {
            warn!("session with {} ended early: {}", offer.addr, e);
            println!("Session with {} ended early: {}", offer.name, e);
        }

        let stopped = *stop.borrow();
        if args.flag_once || stopped {
            break;
        }
        println!("\nListening for offer requests...");
    }
    info!("client stopped");
    Ok(())
}

async fn play_session(
    offer: &ServerOffer,
    rounds: u8,
    client: &settings::Client,
    strategy: Option<&StandOn>,
    input: &mut Input,
) -> anyhow::Result<()> {
    let mut session =
        request_session(offer.addr, rounds, &client.team_name, client.read_timeout()).await?;
    let mut dealer_cards = 0;
    while let Some(event) = session.next_event().await? {
        match event {
            Event::RoundStarted { round, rounds } => {
                dealer_cards = 0;
                println!("\nRound {} of {}", round, rounds);
            }
            Event::CardDealt {
                to: Party::Player,
                card,
                ..
            } => println!("You got: {}", card),
            Event::CardDealt {
                to: Party::Dealer,
                card,
                hand_value,
            } => {
                dealer_cards += 1;
                if dealer_cards == 1 {
                    println!("Dealer shows: {}", card);
                } else {
                    println!("Dealer dealt: {} (dealer has {})", card, hand_value);
                }
            }
            Event::TurnPrompt { hand_value } => {
                println!("Your Hand Value: {}", hand_value);
                let mv = match strategy {
                    Some(strategy) => {
                        let mv = strategy.decide(session.table().player());
                        println!("> {}", mv);
                        mv
                    }
                    None => ask_move(input).await?,
                };
                session.submit_move(mv).await?;
            }
            Event::RoundResolved { outcome, .. } => println!(
                "{}",
                match outcome {
                    Outcome::Win => "You Won!",
                    Outcome::Loss => "You Lost!",
                    Outcome::Tie => "It's a Tie!",
                }
            ),
        }
    }
    println!("\n{}", session.summary());
    Ok(())
}

/// Ask how many rounds to play. `None` once stdin is closed.
async fn ask_rounds(input: &mut Input) -> anyhow::Result<Option<u8>> {
    loop {
        prompt("How many rounds would you like to play? ")?;
        let line = match input.next_line().await? {
            Some(line) => line,
            None => return Ok(None),
        };
        match line.trim().parse::<u8>() {
            Ok(n) if n > 0 => return Ok(Some(n)),
            _ => println!("Please enter a number between 1 and 255."),
        }
    }
}

async fn ask_move(input: &mut Input) -> anyhow::Result<Move> {
    loop {
        prompt("Hit or stand? ")?;
        let line = input
            .next_line()
            .await?
            .ok_or_else(|| anyhow::anyhow!("stdin closed while waiting for a move"))?;
        match line.trim().to_lowercase().chars().next() {
            Some('h') => return Ok(Move::Hit),
            Some('s') => return Ok(Move::Stand),
            _ => println!("Type \"hit\" or \"stand\"."),
        }
    }
}

fn prompt(text: &str) -> anyhow::Result<()> {
    let mut stdout = std::io::stdout();
    stdout.write_all(text.as_bytes())?;
    stdout.flush()?;
    Ok(())
}

fn setup_logger(l: &settings::Logging) -> anyhow::Result<LoggerHandle> {
    let level = LevelFilter::from_str(&l.level)
        .map_err(|e| anyhow::anyhow!("invalid log level {:?}: {}", l.level, e))?;
    let mut spec_builder = LogSpecBuilder::new();
    spec_builder.default(level);
    let handle = flexi_logger::Logger::with(spec_builder.build())
        .format(flexi_logger::default_format)
        .start()?;
    Ok(handle)
}

/// The first interrupt stops the client gracefully, the second one exits.
fn setup_signal() -> anyhow::Result<watch::Receiver<bool>> {
    let (stop_tx, stop_rx) = watch::channel(false);
    let interrupts = AtomicUsize::new(0);
    ctrlc::set_handler(move || {
        if interrupts.fetch_add(1, Ordering::SeqCst) > 0 {
            std::process::exit(130);
        }
        info!("received interrupt signal");
        if stop_tx.send(true).is_err() {
            warn!("client already gone");
        }
    })?;
    Ok(stop_rx)
}
