use anyhow::{Context, Result};
use clap::Parser;
use colored::*;
use dialoguer::Input;
use duet_client::{
    ConnectionState, RtcTransportFactory, SessionController, SessionHandle, SessionNotice,
    SyntheticMediaSource, TransportConfig, WsRelay,
};
use duet_core::utils::DEFAULT_RELAY_URL;
use duet_core::{RoomId, TrackKind};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

const RECONNECT_ATTEMPTS: u32 = 5;
const RECONNECT_DELAY: Duration = Duration::from_secs(2);

/// Joins a two-party room on a duet relay.
#[derive(Parser, Debug)]
#[command(name = "duet-peer", version, about)]
struct PeerArgs {
    /// WebSocket URL of the relay
    #[arg(long, default_value = DEFAULT_RELAY_URL, env = "DUET_RELAY")]
    relay: String,

    /// Room to join; prompted for when omitted
    #[arg(long)]
    room: Option<String>,

    /// Additional STUN server urls
    #[arg(long = "stun")]
    stun: Vec<String>,

    /// Skip the default public STUN servers
    #[arg(long)]
    local_only: bool,
}

impl PeerArgs {
    fn transport_config(&self) -> TransportConfig {
        let base = if self.local_only {
            TransportConfig::local_only()
        } else {
            TransportConfig::default()
        };
        base.with_stun(self.stun.clone())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Command {
    ToggleAudio,
    ToggleVideo,
    ToggleAll,
    Join(String),
    Leave,
    Quit,
    Help,
    Unknown(String),
}

impl Command {
    fn parse(line: &str) -> Option<Self> {
        let line = line.trim();
        let (cmd, rest) = line.split_once(' ').unwrap_or((line, ""));
        let parsed = match cmd {
            "" => return None,
            "a" | "audio" => Self::ToggleAudio,
            "v" | "video" => Self::ToggleVideo,
            "m" | "mute" => Self::ToggleAll,
            "j" | "join" => Self::Join(rest.trim().to_owned()),
            "l" | "leave" => Self::Leave,
            "q" | "quit" => Self::Quit,
            "h" | "help" | "?" => Self::Help,
            other => Self::Unknown(other.to_owned()),
        };
        Some(parsed)
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "warn".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = PeerArgs::parse();

    println!("{}", format!("🔌 Connecting to {}...", args.relay).cyan());
    let (relay, relay_rx) = WsRelay::connect(&args.relay)
        .await
        .with_context(|| format!("Failed to reach relay at {}", args.relay))?;
    let mut relay = Arc::new(relay);

    let (handle, mut notices) = SessionController::spawn(
        relay.clone(),
        relay_rx,
        Arc::new(SyntheticMediaSource::new()),
        Arc::new(RtcTransportFactory::new(args.transport_config())),
    );

    handle.ready().await.context("Failed to acquire local media")?;

    let room = match args.room {
        Some(room) => room,
        None => prompt_room().await?,
    };
    let mut current_room = None;
    match handle.join(&room).await {
        Ok(()) => current_room = Some(room),
        Err(e) => println!("{}", format!("❌ {}", e).red()),
    }
    print_help();

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut audio_on = true;
    let mut video_on = true;

    loop {
        tokio::select! {
            notice = notices.recv() => {
                let Some(notice) = notice else { break };
                print_notice(&notice);
                match notice {
                    SessionNotice::RoomFull(_) | SessionNotice::Failed(_) => current_room = None,
                    SessionNotice::Disconnected => {
                        let Some(fresh) = reconnect(&args.relay, &handle).await else {
                            println!("{}", "🔌 Giving up on the relay".red().bold());
                            break;
                        };
                        relay = fresh;
                        if let Some(room) = &current_room
                            && let Err(e) = handle.join(room).await
                        {
                            println!("{}", format!("❌ {}", e).red());
                            current_room = None;
                        }
                    }
                    _ => {}
                }
            }
            line = lines.next_line() => {
                let Some(line) = line.context("Failed to read stdin")? else {
                    break;
                };
                let Some(input) = Command::parse(&line) else { continue };
                match input {
                    Command::ToggleAudio => {
                        audio_on = !audio_on;
                        set_kind(&handle, TrackKind::Audio, audio_on).await?;
                    }
                    Command::ToggleVideo => {
                        video_on = !video_on;
                        set_kind(&handle, TrackKind::Video, video_on).await?;
                    }
                    Command::ToggleAll => {
                        if let Some(enabled) = handle.toggle_media().await? {
                            audio_on = enabled;
                            video_on = enabled;
                            println!("{}", format!("🎚  All media {}", on_off(enabled)).cyan());
                        }
                    }
                    Command::Join(room) => match handle.join(&room).await {
                        Ok(()) => current_room = Some(room),
                        Err(e) => println!("{}", format!("❌ {}", e).red()),
                    },
                    Command::Leave => {
                        handle.leave().await?;
                        current_room = None;
                    }
                    Command::Quit => break,
                    Command::Help => print_help(),
                    Command::Unknown(cmd) => {
                        println!("{}", format!("Unknown command `{}`, try `help`", cmd).yellow());
                    }
                }
            }
            _ = tokio::signal::ctrl_c() => break,
        }
    }

    handle.leave().await?;
    relay.close();
    println!("{}", "👋 Bye".green());
    Ok(())
}

/// Retries the relay a few times and hands the new connection to the
/// session. The caller rejoins its room.
async fn reconnect(url: &str, handle: &SessionHandle) -> Option<Arc<WsRelay>> {
    for attempt in 1..=RECONNECT_ATTEMPTS {
        tokio::time::sleep(RECONNECT_DELAY).await;
        println!(
            "{}",
            format!("🔄 Reconnecting to {} ({}/{})...", url, attempt, RECONNECT_ATTEMPTS).cyan()
        );
        match WsRelay::connect(url).await {
            Ok((relay, relay_rx)) => {
                let relay = Arc::new(relay);
                handle.reconnect(relay.clone(), relay_rx).await.ok()?;
                return Some(relay);
            }
            Err(e) => println!("{}", format!("   {}", e).dimmed()),
        }
    }
    None
}

async fn prompt_room() -> Result<String> {
    tokio::task::spawn_blocking(|| {
        Input::<String>::new()
            .with_prompt("Room id")
            .validate_with(|input: &String| RoomId::parse(input).map(|_| ()))
            .interact_text()
    })
    .await
    .context("Room prompt panicked")?
    .context("Failed to read room id")
}

async fn set_kind(handle: &SessionHandle, kind: TrackKind, enabled: bool) -> Result<()> {
    let touched = handle.set_enabled(kind, enabled).await?;
    if touched == 0 {
        println!("{}", format!("No local {} track", kind).yellow());
    } else {
        println!("{}", format!("🎚  {} {}", kind, on_off(enabled)).cyan());
    }
    Ok(())
}

fn on_off(enabled: bool) -> &'static str {
    if enabled { "on" } else { "off" }
}

fn print_notice(notice: &SessionNotice) {
    let line = match notice {
        SessionNotice::Ready => "🎙  Local media ready".green(),
        SessionNotice::Joined { room_id } => {
            format!("✅ Joined room #{}, waiting for a peer", room_id).green().bold()
        }
        SessionNotice::PeerJoined { room_id } => {
            format!("👥 Peer joined #{}, calling...", room_id).cyan()
        }
        SessionNotice::RoomFull(err) => format!("🚫 {}", err).red(),
        SessionNotice::PeerLeft { room_id } => {
            format!("👤 Peer left #{}, waiting for the next one", room_id).yellow()
        }
        SessionNotice::RemoteTrack { kind, id } => {
            format!("📡 Receiving {} ({})", kind, id).cyan()
        }
        SessionNotice::ConnectionState(state) => match state {
            ConnectionState::Connected => "🔗 Connected".green().bold(),
            ConnectionState::Failed => "💥 Connection failed".red(),
            other => format!("   connection {}", other).dimmed(),
        },
        SessionNotice::Left { room_id } => format!("🚪 Left room #{}", room_id).yellow(),
        SessionNotice::Disconnected => "🔌 Relay connection lost".red().bold(),
        SessionNotice::Failed(err) => format!("❌ Session failed: {}", err).red().bold(),
    };
    println!("{}", line);
}

fn print_help() {
    println!(
        "{}",
        "Commands: a(udio) v(ideo) m(ute all) j(oin) <room> l(eave) q(uit)".dimmed()
    );
}
