use clap::Parser;
use client::camera::Viewport;
use client::config::{ClientConfig, MATCH_LOADING_GRACE, RECONNECT_DELAY};
use client::input::key_event;
use client::lifecycle::{FileRoomStore, RoomStore, View};
use client::rendering::Renderer;
use client::session::{Directive, Session, SessionEvent};
use log::info;
use macroquad::prelude::*;
use std::path::PathBuf;
use std::time::Duration;

const NOTICE_TTL: Duration = Duration::from_secs(4);

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// WebSocket URL of the arena server
    #[arg(short = 's', long, env = "ARENA_SERVER", default_value = "ws://127.0.0.1:3000")]
    server: String,

    /// File holding the credential token
    #[arg(long, env = "ARENA_TOKEN_FILE", default_value = "token")]
    token_file: PathBuf,

    /// Persisted key bindings
    #[arg(long, default_value = "controls.json")]
    controls: PathBuf,

    /// Where the current room code is kept
    #[arg(long, default_value = "room_code")]
    room_file: PathBuf,

    /// Name shown to other players
    #[arg(short = 'u', long, env = "ARENA_USER_NAME")]
    user_name: Option<String>,

    /// Room code to join
    #[arg(short = 'r', long)]
    room: Option<String>,

    /// Window width
    #[arg(short = 'w', long, default_value = "800")]
    width: usize,

    /// Window height (no short flag to avoid conflict with --help)
    #[arg(long, default_value = "600")]
    height: usize,
}

impl Args {
    fn config(&self) -> ClientConfig {
        ClientConfig {
            server_url: self.server.clone(),
            token_file: self.token_file.clone(),
            controls_file: self.controls.clone(),
            room_file: self.room_file.clone(),
            user_name: self.user_name.clone(),
            loading_grace: MATCH_LOADING_GRACE,
            reconnect_delay: RECONNECT_DELAY,
        }
    }
}

fn window_conf() -> Conf {
    let args = Args::parse();
    Conf {
        window_title: "Arena".to_owned(),
        window_width: args.width as i32,
        window_height: args.height as i32,
        ..Default::default()
    }
}

#[macroquad::main(window_conf)]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    if std::env::var("RUST_LOG").is_err() {
        eprintln!("Set RUST_LOG=info for detailed logging");
    }

    let args = Args::parse();
    run(args).await
}

async fn run(args: Args) -> Result<(), Box<dyn std::error::Error>> {
    // Transport tasks live on tokio; the session itself stays on this thread.
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;

    let config = args.config();
    if let Some(code) = &args.room {
        FileRoomStore::new(&config.room_file).set_room_code(code);
    }

    info!("Starting client...");
    info!("Connecting to: {}", config.server_url);

    prevent_quit();
    let mut renderer = Renderer::new(args.width, args.height);

    'session: loop {
        let mut session = Session::new(
            config.clone(),
            runtime.handle().clone(),
            Box::new(FileRoomStore::new(&config.room_file)),
        );
        session.start()?;
        let mut viewport = None;

        loop {
            let current = Viewport::new(screen_width(), screen_height());
            if viewport != Some(current) {
                viewport = Some(current);
                renderer.resize(current.width, current.height);
                session.push(SessionEvent::Viewport(current));
            }

            if is_quit_requested() {
                session.push(SessionEvent::CloseRequested);
            }
            for key in get_keys_pressed() {
                if let Some(event) = key_pressed(&session, key) {
                    session.push(event);
                }
            }
            for key in get_keys_released() {
                session.push(SessionEvent::KeyUp(key_event(key)));
            }

            match session.drain() {
                Directive::Continue => {}
                Directive::Reload => {
                    info!("Reloading session");
                    session.teardown();
                    continue 'session;
                }
                Directive::Quit => {
                    session.teardown();
                    break 'session;
                }
            }

            session.expire_notices(NOTICE_TTL);
            renderer.render(&session);
            next_frame().await;
        }
    }

    info!("Client shut down");
    Ok(())
}

/// Routes a fresh key press to the prompt, the current view, or the mapper
fn key_pressed(session: &Session, key: KeyCode) -> Option<SessionEvent> {
    if session.guard().prompt_visible() {
        return match key {
            KeyCode::Y => Some(SessionEvent::LeaveConfirmed),
            KeyCode::N | KeyCode::Escape => Some(SessionEvent::LeaveCancelled),
            _ => None,
        };
    }

    match (session.view(), key) {
        (_, KeyCode::F5) => Some(SessionEvent::ReloadRequested),
        (View::Match, _) => Some(SessionEvent::KeyDown(key_event(key))),
        (View::Home, KeyCode::Enter) => session
            .room_code()
            .map(|code| SessionEvent::JoinRoom { code }),
        (View::Home, KeyCode::R) => Some(SessionEvent::ResetBindings),
        (View::Home, KeyCode::Q) => Some(SessionEvent::SignOut),
        (View::Lobby, KeyCode::Enter) => Some(SessionEvent::StartMatch),
        (View::Lobby, KeyCode::Escape) => Some(SessionEvent::LeaveRoom),
        (View::Results { .. }, KeyCode::Enter) => Some(SessionEvent::ReturnHome),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_args_build_config() {
        let args = Args::try_parse_from(["client", "--server", "ws://arena:3000", "-u", "ana"]).unwrap();
        let config = args.config();

        assert_eq!(config.server_url, "ws://arena:3000");
        assert_eq!(config.user_name.as_deref(), Some("ana"));
        assert_eq!(config.reconnect_delay, RECONNECT_DELAY);
    }

    #[test]
    fn test_unknown_flag_is_an_error() {
        assert!(Args::try_parse_from(["client", "--teleport"]).is_err());
    }
}
