use std::io::{self, Write as _};

use clap::Parser;
use roomchat::protocol::{Message, MessageTime};
use roomchat::{ChatConfig, ChatError, Connection, JoinParams, Notice, RoomState, identity};
use tokio::io::{AsyncBufReadExt, BufReader, Lines, Stdin};
use tokio::sync::watch;
use tracing::warn;

#[derive(Parser, Debug)]
#[command(name = "roomchat", about = "Terminal client for a Socket.IO chat room")]
struct Cli {
    #[arg(long, env = "ROOMCHAT_BACKEND_URL")]
    backend_url: Option<String>,

    #[arg(long)]
    name: Option<String>,

    #[arg(long)]
    room: Option<String>,

    #[arg(long, help = "Chat location such as ?name=Ann&room=lobby")]
    link: Option<String>,
}

type StdinLines = Lines<BufReader<Stdin>>;

#[tokio::main]
async fn main() -> Result<(), ChatError> {
    tracing_subscriber::fmt().with_writer(io::stderr).init();

    let cli = Cli::parse();
    let mut config = ChatConfig::from_env()?;
    if let Some(url) = &cli.backend_url {
        config = config.with_backend_url(url);
    }

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let Some(params) = entry(&cli, &mut lines).await? else {
        return Ok(());
    };

    let mut conn = Connection::open(&config, params).await?;
    println!("joined {} as {} (/who lists the room, /quit leaves)", conn.view().room, conn.view().self_name);

    let render = tokio::spawn(render_loop(conn.subscribe()));

    loop {
        tokio::select! {
            line = lines.next_line() => match line? {
                None => break,
                Some(line) => match line.trim() {
                    "/quit" => break,
                    "/who" => println!("{}", roster_line(&conn.view())),
                    _ => {
                        conn.input(&line)?;
                        conn.submit()?;
                    }
                },
            },
            notice = conn.next_notice() => match notice {
                Some(Notice::SendFailed(reason)) => eprintln!("message not sent: {reason}"),
                Some(Notice::Disconnected(reason)) => {
                    eprintln!("disconnected: {reason}");
                    break;
                }
                None => break,
            },
        }
    }

    conn.close().await?;
    if let Err(error) = render.await {
        warn!(%error, "render task failed");
    }
    Ok(())
}

/// Resolve join parameters from flags, falling back to prompting until the
/// name and room are both present. `None` when stdin closes first.
async fn entry(cli: &Cli, lines: &mut StdinLines) -> Result<Option<JoinParams>, ChatError> {
    let from_flags = match &cli.link {
        Some(link) => identity::from_query(link.split_once('?').map_or(link.as_str(), |(_, query)| query)),
        None => identity::validate(cli.name.as_deref().unwrap_or_default(), cli.room.as_deref().unwrap_or_default()),
    };
    match from_flags {
        Ok(params) => return Ok(Some(params)),
        Err(error) if cli.link.is_some() || cli.name.is_some() || cli.room.is_some() => eprintln!("{error}"),
        Err(_) => {}
    }

    loop {
        let Some(name) = prompt("Name: ", lines).await? else {
            return Ok(None);
        };
        let Some(room) = prompt("Room: ", lines).await? else {
            return Ok(None);
        };
        match identity::validate(&name, &room) {
            Ok(params) => {
                println!("opening {}", identity::to_query(&params));
                return Ok(Some(params));
            }
            Err(error) => eprintln!("{error}"),
        }
    }
}

async fn prompt(label: &str, lines: &mut StdinLines) -> Result<Option<String>, ChatError> {
    print!("{label}");
    io::stdout().flush()?;
    Ok(lines.next_line().await?)
}

// =============================================================================
// RENDERING
// =============================================================================

#[derive(Default)]
struct Screen {
    printed: usize,
    roster: Vec<String>,
    typing: Option<String>,
}

impl Screen {
    fn draw(&mut self, state: &RoomState) {
        let messages = state.transcript.messages();
        // History replaced the transcript: print it again from the top.
        if messages.len() < self.printed {
            self.printed = 0;
        }
        for msg in &messages[self.printed..] {
            println!("{}", message_line(state, msg));
        }
        self.printed = messages.len();

        let roster: Vec<String> = state.roster.participants().iter().map(|p| p.name.clone()).collect();
        if roster != self.roster {
            println!("{}", roster_line(state));
            self.roster = roster;
        }

        let typing = state.typing_label();
        if typing != self.typing {
            if let Some(label) = &typing {
                println!("  {label}");
            }
            self.typing = typing;
        }
    }
}

async fn render_loop(mut view: watch::Receiver<RoomState>) {
    let mut screen = Screen::default();
    loop {
        let state = view.borrow_and_update().clone();
        screen.draw(&state);
        if view.changed().await.is_err() {
            break;
        }
    }
}

fn message_line(state: &RoomState, msg: &Message) -> String {
    let own = if state.is_own(msg) { " (you)" } else { "" };
    match msg.time.as_ref().and_then(MessageTime::clock_label) {
        Some(clock) => format!("[{clock}] {}{own}: {}", msg.user, msg.text),
        None => format!("{}{own}: {}", msg.user, msg.text),
    }
}

fn roster_line(state: &RoomState) -> String {
    let names: Vec<&str> = state.roster.participants().iter().map(|p| p.name.as_str()).collect();
    let room = state.roster.room().unwrap_or(&state.room);
    format!("in {room}: {}", names.join(", "))
}
