//! The single owner of a client session.
//!
//! Transport reports, timers, key edges, viewport changes and user decisions
//! all arrive as [`SessionEvent`]s on one queue. The queue has exactly one
//! consumer, so every handler sees the session state without interference
//! from the others even though the transport runs on tokio worker threads.

use crate::bindings::{Action, ControlsFile};
use crate::camera::{CameraController, Viewport};
use crate::colors::ColorAssigner;
use crate::config::ClientConfig;
use crate::credentials::{route_guard, Access, CredentialStore};
use crate::error::ClientError;
use crate::game::{MatchState, StateObserver};
use crate::input::{InputMapper, KeyEvent, KeyOutcome};
use crate::lifecycle::{LeaveDecision, LeaveGuard, LeaveIntent, RoomStore, View};
use crate::network::{ConnectionManager, TransportEvent};
use log::{debug, error, info, warn};
use shared::{InboundEvent, OutboundEvent, ResponseKind};
use std::collections::VecDeque;
use std::time::{Duration, Instant, SystemTime};
use tokio::runtime::Handle;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// The server's message when the creator starts the match
pub const ROOM_STARTED: &str = "The room is started";

const MAX_NOTICES: usize = 4;

#[derive(Debug)]
pub enum SessionEvent {
    /// Report from the transport task of link `link`
    Transport { link: u64, event: TransportEvent },
    KeyDown(KeyEvent),
    KeyUp(KeyEvent),
    Viewport(Viewport),
    LoadingFinished { generation: u64 },
    /// Time to reopen a transport that dropped
    Reconnect { generation: u64 },
    CloseRequested,
    ReloadRequested,
    LeaveConfirmed,
    LeaveCancelled,
    JoinRoom { code: String },
    StartMatch,
    LeaveRoom,
    /// Leave the results view
    ReturnHome,
    Rebind { action: Action, key: String },
    ResetBindings,
    SignOut,
}

/// What the frame loop must do after an event was handled
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Directive {
    Continue,
    /// Tear the session down and start a fresh one
    Reload,
    Quit,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeLevel {
    Info,
    Success,
    Warning,
    Error,
}

#[derive(Debug, Clone)]
pub struct Notice {
    pub level: NoticeLevel,
    pub message: String,
    pub raised: Instant,
}

/// A delayed event on the session queue; dropping it cancels the delivery
struct Timer {
    generation: u64,
    task: JoinHandle<()>,
}

impl Drop for Timer {
    fn drop(&mut self) {
        self.task.abort();
    }
}

pub struct Session {
    config: ClientConfig,
    runtime: Handle,
    connection: ConnectionManager,
    state: MatchState,
    colors: ColorAssigner,
    camera: CameraController,
    observers: Vec<Box<dyn StateObserver>>,
    input: InputMapper,
    controls: ControlsFile,
    guard: LeaveGuard,
    rooms: Box<dyn RoomStore>,
    credentials: CredentialStore,
    view: View,
    notices: VecDeque<Notice>,
    loading: Option<Timer>,
    reconnect: Option<Timer>,
    timer_generation: u64,
    events_tx: mpsc::UnboundedSender<SessionEvent>,
    events_rx: mpsc::UnboundedReceiver<SessionEvent>,
}

impl Session {
    pub fn new(config: ClientConfig, runtime: Handle, rooms: Box<dyn RoomStore>) -> Self {
        let (events_tx, events_rx) = mpsc::unbounded_channel();

        Self {
            connection: ConnectionManager::new(runtime.clone(), events_tx.clone()),
            controls: ControlsFile::new(&config.controls_file),
            credentials: CredentialStore::new(&config.token_file),
            config,
            runtime,
            state: MatchState::new(),
            colors: ColorAssigner::new(),
            camera: CameraController::new(),
            observers: Vec::new(),
            input: InputMapper::new(),
            guard: LeaveGuard::new(),
            rooms,
            view: View::Login,
            notices: VecDeque::new(),
            loading: None,
            reconnect: None,
            timer_generation: 0,
            events_tx,
            events_rx,
        }
    }

    /// Loads the binding table and connects when the stored credential
    /// passes the route guard. Without one the session stays on the login view.
    pub fn start(&mut self) -> Result<(), ClientError> {
        self.input.set_bindings(self.controls.load());

        match route_guard(&self.credentials, SystemTime::now()) {
            Access::Granted(token) => {
                self.view = View::Home;
                self.connection.connect(&self.config.server_url, &token)?;
            }
            Access::RedirectToLogin(reason) => {
                info!("Login required: {}", reason);
                self.view = View::Login;
            }
        }
        Ok(())
    }

    /// Queue handle for producers outside the session
    pub fn sender(&self) -> mpsc::UnboundedSender<SessionEvent> {
        self.events_tx.clone()
    }

    pub fn push(&self, event: SessionEvent) {
        // The receiver lives in self, so this cannot fail while self exists.
        let _ = self.events_tx.send(event);
    }

    /// Handles everything queued so far, stopping early on a directive
    pub fn drain(&mut self) -> Directive {
        while let Ok(event) = self.events_rx.try_recv() {
            let directive = self.handle(event);
            if directive != Directive::Continue {
                return directive;
            }
        }
        Directive::Continue
    }

    /// Waits for the next event and handles it
    pub async fn process_next(&mut self) -> Directive {
        match self.events_rx.recv().await {
            Some(event) => self.handle(event),
            None => Directive::Quit,
        }
    }

    pub fn handle(&mut self, event: SessionEvent) -> Directive {
        match event {
            SessionEvent::Transport { link, event } => {
                if self.connection.on_transport_event(link, &event) {
                    self.on_transport(event);
                }
            }
            SessionEvent::KeyDown(key) => {
                if self.view == View::Match {
                    let outcome = self.input.key_down(&key, &mut self.connection);
                    if let KeyOutcome::Local(action) = outcome {
                        debug!("{:?} has no effect on the server", action);
                    }
                }
            }
            SessionEvent::KeyUp(key) => self.input.key_up(&key),
            SessionEvent::Viewport(viewport) => {
                self.camera.set_viewport(viewport, &self.state);
            }
            SessionEvent::LoadingFinished { generation } => self.finish_loading(generation),
            SessionEvent::Reconnect { generation } => self.reconnect(generation),
            SessionEvent::CloseRequested => {
                match self.guard.on_close_requested(self.connection.is_connected()) {
                    LeaveDecision::Allow => return Directive::Quit,
                    LeaveDecision::Confirm => debug!("Asking before closing"),
                }
            }
            SessionEvent::ReloadRequested => {
                match self.guard.on_reload_requested(self.connection.is_connected()) {
                    LeaveDecision::Allow => return Directive::Reload,
                    LeaveDecision::Confirm => debug!("Asking before reloading"),
                }
            }
            SessionEvent::LeaveConfirmed => match self.guard.confirm() {
                Some(LeaveIntent::Close) => return Directive::Quit,
                Some(LeaveIntent::Reload) => return Directive::Reload,
                None => debug!("No leave request to confirm"),
            },
            SessionEvent::LeaveCancelled => self.guard.cancel(),
            SessionEvent::JoinRoom { code } => {
                self.rooms.set_room_code(&code);
                self.enter_lobby();
            }
            SessionEvent::StartMatch => {
                self.start_match();
            }
            SessionEvent::LeaveRoom => self.leave_room(),
            SessionEvent::ReturnHome => self.go_home(),
            SessionEvent::Rebind { action, key } => self.rebind(action, &key),
            SessionEvent::ResetBindings => self.reset_bindings(),
            SessionEvent::SignOut => self.sign_out(),
        }
        Directive::Continue
    }

    fn on_transport(&mut self, event: TransportEvent) {
        match event {
            TransportEvent::Connected { id } => {
                // Snapshot numbering restarts with every connection.
                self.state.reset_sequence();
                self.reconnect = None;
                self.camera.set_local_player(Some(id));
                if self.view == View::Home && self.rooms.room_code().is_some() {
                    self.enter_lobby();
                }
            }
            TransportEvent::Disconnected { reason } => {
                self.input.release_all();
                self.notify(NoticeLevel::Warning, format!("Disconnected: {}", reason));
                self.schedule_reconnect();
            }
            TransportEvent::Inbound(inbound) => self.on_inbound(inbound),
        }
    }

    fn on_inbound(&mut self, event: InboundEvent) {
        match event {
            InboundEvent::StateUpdate(snapshot) => {
                let changes = self.state.apply_snapshot(snapshot);
                if changes.any() {
                    self.colors.state_changed(&self.state, &changes);
                    self.camera.state_changed(&self.state, &changes);
                    for observer in &mut self.observers {
                        observer.state_changed(&self.state, &changes);
                    }
                }
            }
            InboundEvent::MatchDeleted { message } => self.on_match_deleted(message),
            InboundEvent::RoomResponse { kind, message } => match kind {
                ResponseKind::Success => {
                    let started = message == ROOM_STARTED;
                    self.notify(NoticeLevel::Success, message);
                    if started {
                        self.enter_match();
                    }
                }
                ResponseKind::Error => {
                    self.notify(NoticeLevel::Error, message);
                    self.go_home();
                }
            },
            InboundEvent::StateUpdateInfo { message } => self.notify(NoticeLevel::Info, message),
            InboundEvent::Connect { id } => debug!("Unexpected handshake for {}", id),
        }
    }

    fn on_match_deleted(&mut self, message: String) {
        match self.view {
            View::Match => {
                info!("Match ended");
                self.notify(NoticeLevel::Info, "Match Ended!".to_string());
                self.rooms.clear();
                self.loading = None;
                self.input.begin_loading();
                self.input.release_all();
                self.view = View::results(Some(self.state.roster()));
            }
            View::Lobby => {
                info!("Room closed: {}", message);
                if !message.is_empty() {
                    self.notify(NoticeLevel::Info, message);
                }
                self.rooms.clear();
                self.view = View::Home;
            }
            _ => debug!("Ignoring matchDeleted outside a room"),
        }
    }

    /// Joins the stored room. Needs a room code, a user name and a live
    /// connection; without them the session returns home.
    pub fn enter_lobby(&mut self) -> bool {
        let (Some(room_id), Some(user_name)) =
            (self.rooms.room_code(), self.config.user_name.clone())
        else {
            self.notify(NoticeLevel::Error, "Missing room code or user name".to_string());
            self.go_home();
            return false;
        };

        if !self.connection.is_connected() {
            self.notify(NoticeLevel::Error, "Not connected to the server".to_string());
            self.go_home();
            return false;
        }

        info!("Joining room {} as {}", room_id, user_name);
        self.view = View::Lobby;
        self.connection.send(OutboundEvent::JoinRoom { user_name, room_id })
    }

    fn enter_match(&mut self) {
        info!("Entering match");
        self.view = View::Match;
        self.input.release_all();
        self.input.begin_loading();

        let timer = self.schedule(self.config.loading_grace, |generation| {
            SessionEvent::LoadingFinished { generation }
        });
        // Replacing the timer drops and aborts the previous one.
        self.loading = Some(timer);
    }

    fn schedule<F>(&mut self, delay: Duration, event: F) -> Timer
    where
        F: FnOnce(u64) -> SessionEvent + Send + 'static,
    {
        self.timer_generation += 1;
        let generation = self.timer_generation;
        let events = self.events_tx.clone();
        let task = self.runtime.spawn(async move {
            tokio::time::sleep(delay).await;
            let _ = events.send(event(generation));
        });
        Timer { generation, task }
    }

    fn schedule_reconnect(&mut self) {
        if self.view == View::Login || self.guard.is_leaving() {
            return;
        }
        let delay = self.config.reconnect_delay;
        debug!("Reconnecting in {:?}", delay);
        let timer = self.schedule(delay, |generation| SessionEvent::Reconnect { generation });
        self.reconnect = Some(timer);
    }

    /// Reopens the transport when the credential still passes the route
    /// guard. A failed attempt reports a disconnect, which schedules the next.
    fn reconnect(&mut self, generation: u64) {
        if self.reconnect.as_ref().map(|t| t.generation) != Some(generation) {
            debug!("Ignoring stale reconnect timer {}", generation);
            return;
        }
        self.reconnect = None;
        if self.connection.link().is_some() {
            return;
        }

        match route_guard(&self.credentials, SystemTime::now()) {
            Access::Granted(token) => {
                info!("Reconnecting to {}", self.config.server_url);
                if let Err(e) = self.connection.connect(&self.config.server_url, &token) {
                    error!("Could not reconnect: {}", e);
                }
            }
            Access::RedirectToLogin(reason) => {
                info!("Not reconnecting, login required: {}", reason);
                self.loading = None;
                self.view = View::Login;
            }
        }
    }

    fn finish_loading(&mut self, generation: u64) {
        match &self.loading {
            Some(timer) if timer.generation == generation => {
                self.loading = None;
                if self.view == View::Match {
                    debug!("Loading finished, accepting input");
                    self.input.finish_loading();
                }
            }
            _ => debug!("Ignoring stale loading timer {}", generation),
        }
    }

    pub fn start_match(&mut self) -> bool {
        let Some(room_id) = self.rooms.room_code() else {
            warn!("No room to start");
            return false;
        };
        if !self.is_room_creator() {
            self.notify(NoticeLevel::Warning, "Only the room creator can start the match".to_string());
            return false;
        }
        self.connection.send(OutboundEvent::StartMatch { room_id })
    }

    pub fn leave_room(&mut self) {
        if let Some(room_id) = self.rooms.room_code() {
            self.connection.send(OutboundEvent::RemovePlayer { room_id });
        }
        self.rooms.clear();
        self.go_home();
    }

    pub fn is_room_creator(&self) -> bool {
        self.state.is_created_by(self.connection.session_id())
    }

    /// Rebinds and persists. A conflict leaves the table as it was and
    /// raises an error notice.
    pub fn rebind(&mut self, action: Action, key: &str) {
        let Some(table) = self.input.bindings_mut() else {
            warn!("Bindings not loaded yet");
            return;
        };

        match self.controls.rebind(table, action, key) {
            Ok(()) => self.notify(NoticeLevel::Success, format!("{} bound to {}", action.name(), key)),
            Err(e) => self.notify(NoticeLevel::Error, e.to_string()),
        }
    }

    pub fn reset_bindings(&mut self) {
        let Some(table) = self.input.bindings_mut() else {
            return;
        };
        match self.controls.reset(table) {
            Ok(()) => self.notify(NoticeLevel::Info, "Controls reset to defaults".to_string()),
            Err(e) => self.notify(NoticeLevel::Error, e.to_string()),
        }
    }

    fn sign_out(&mut self) {
        info!("Signing out");
        self.credentials.clear();
        self.teardown();
        self.view = View::Login;
    }

    fn go_home(&mut self) {
        self.loading = None;
        self.input.begin_loading();
        self.view = View::Home;
    }

    /// Cancels pending timers and closes the transport. Nothing queued
    /// afterwards can reach the state of this session through a stale link.
    pub fn teardown(&mut self) {
        self.loading = None;
        self.reconnect = None;
        self.input.begin_loading();
        self.input.release_all();
        self.connection.teardown();
    }

    pub fn subscribe(&mut self, observer: Box<dyn StateObserver>) {
        self.observers.push(observer);
    }

    fn notify(&mut self, level: NoticeLevel, message: String) {
        match level {
            NoticeLevel::Error => error!("{}", message),
            NoticeLevel::Warning => warn!("{}", message),
            _ => info!("{}", message),
        }
        if self.notices.len() == MAX_NOTICES {
            self.notices.pop_front();
        }
        self.notices.push_back(Notice {
            level,
            message,
            raised: Instant::now(),
        });
    }

    /// Drops notices older than `max_age`
    pub fn expire_notices(&mut self, max_age: Duration) {
        self.notices.retain(|notice| notice.raised.elapsed() < max_age);
    }

    pub fn notices(&self) -> impl Iterator<Item = &Notice> {
        self.notices.iter()
    }

    pub fn view(&self) -> &View {
        &self.view
    }

    pub fn state(&self) -> &MatchState {
        &self.state
    }

    pub fn colors(&self) -> &ColorAssigner {
        &self.colors
    }

    pub fn camera(&self) -> &CameraController {
        &self.camera
    }

    pub fn input(&self) -> &InputMapper {
        &self.input
    }

    pub fn connection(&self) -> &ConnectionManager {
        &self.connection
    }

    pub fn guard(&self) -> &LeaveGuard {
        &self.guard
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn room_code(&self) -> Option<String> {
        self.rooms.room_code()
    }

    pub fn is_loading(&self) -> bool {
        self.loading.is_some()
    }

    pub fn is_reconnecting(&self) -> bool {
        self.reconnect.is_some()
    }

    #[cfg(test)]
    fn connect_test_link(&mut self, id: &str) -> mpsc::UnboundedReceiver<OutboundEvent> {
        let (link, outbound) = self.connection.attach_test_link();
        self.handle(SessionEvent::Transport {
            link,
            event: TransportEvent::Connected { id: id.to_string() },
        });
        outbound
    }

    #[cfg(test)]
    fn inbound(&mut self, event: InboundEvent) -> Directive {
        let link = self.connection.link().map(|l| l.id()).unwrap_or(0);
        self.handle(SessionEvent::Transport {
            link,
            event: TransportEvent::Inbound(event),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lifecycle::MemoryRoomStore;
    use shared::{Direction, Player, RoomStatus, Snapshot};
    use std::collections::HashMap;
    use std::cell::Cell;
    use std::rc::Rc;

    fn config() -> ClientConfig {
        let dir = std::env::temp_dir();
        let pid = std::process::id();
        ClientConfig {
            token_file: dir.join(format!("arena-session-token-{}", pid)),
            controls_file: dir.join(format!("arena-session-controls-{}.json", pid)),
            user_name: Some("ana".to_string()),
            loading_grace: Duration::from_millis(20),
            reconnect_delay: Duration::from_millis(20),
            ..ClientConfig::default()
        }
    }

    fn session(room: Option<&str>) -> Session {
        let mut session = Session::new(
            config(),
            Handle::current(),
            Box::new(MemoryRoomStore::new(room)),
        );
        session.input.set_bindings(Default::default());
        session.view = View::Home;
        session
    }

    fn snapshot(players: &[(&str, i64)]) -> Snapshot {
        let players: HashMap<_, _> = players
            .iter()
            .map(|(id, score)| {
                let mut player = Player::new(id, 1, 1);
                player.score = *score;
                (id.to_string(), player)
            })
            .collect();
        Snapshot {
            players: Some(players),
            status: Some(RoomStatus::Active),
            time_left: Some(60_000),
            created_by: Some("me".to_string()),
            ..Snapshot::default()
        }
    }

    fn room_started() -> InboundEvent {
        InboundEvent::RoomResponse {
            kind: ResponseKind::Success,
            message: ROOM_STARTED.to_string(),
        }
    }

    #[tokio::test]
    async fn test_connect_with_room_enters_lobby() {
        let mut session = session(Some("ROOM1"));
        let mut outbound = session.connect_test_link("me");

        assert_eq!(session.view(), &View::Lobby);
        assert_eq!(
            outbound.try_recv().unwrap(),
            OutboundEvent::JoinRoom {
                user_name: "ana".to_string(),
                room_id: "ROOM1".to_string()
            }
        );
    }

    #[tokio::test]
    async fn test_connect_without_room_stays_home() {
        let mut session = session(None);
        let mut outbound = session.connect_test_link("me");

        assert_eq!(session.view(), &View::Home);
        assert!(outbound.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_lobby_requires_connection() {
        let mut session = session(None);
        session.handle(SessionEvent::JoinRoom {
            code: "ROOM1".to_string(),
        });

        assert_eq!(session.view(), &View::Home);
        assert!(session
            .notices()
            .any(|n| n.level == NoticeLevel::Error));
    }

    #[tokio::test]
    async fn test_room_error_returns_home() {
        let mut session = session(Some("ROOM1"));
        session.connect_test_link("me");

        session.inbound(InboundEvent::RoomResponse {
            kind: ResponseKind::Error,
            message: "Room full".to_string(),
        });

        assert_eq!(session.view(), &View::Home);
        let last = session.notices().last().unwrap();
        assert_eq!(last.message, "Room full");
        assert_eq!(last.level, NoticeLevel::Error);
    }

    #[tokio::test]
    async fn test_input_waits_for_loading_grace() {
        let mut session = session(Some("ROOM1"));
        let mut outbound = session.connect_test_link("me");
        outbound.try_recv().unwrap();

        session.inbound(room_started());
        assert_eq!(session.view(), &View::Match);
        assert!(session.is_loading());

        session.handle(SessionEvent::KeyDown(KeyEvent::new("ArrowUp", "ArrowUp")));
        assert!(outbound.try_recv().is_err());

        let directive = session.process_next().await;
        assert_eq!(directive, Directive::Continue);
        assert!(!session.is_loading());
        assert!(session.input().is_accepting());

        session.handle(SessionEvent::KeyDown(KeyEvent::new("ArrowUp", "ArrowUp")));
        assert_eq!(
            outbound.try_recv().unwrap(),
            OutboundEvent::MovePlayer { dir: Direction::Up }
        );
    }

    #[tokio::test]
    async fn test_stale_loading_timer_is_ignored() {
        let mut session = session(Some("ROOM1"));
        session.connect_test_link("me");
        session.inbound(room_started());
        let first = session.loading.as_ref().map(|t| t.generation).unwrap();
        session.inbound(room_started());

        session.handle(SessionEvent::LoadingFinished { generation: first });
        assert!(session.is_loading());
        assert!(!session.input().is_accepting());
    }

    #[tokio::test]
    async fn test_keys_ignored_outside_match() {
        let mut session = session(Some("ROOM1"));
        let mut outbound = session.connect_test_link("me");
        outbound.try_recv().unwrap();
        session.input.finish_loading();

        session.handle(SessionEvent::KeyDown(KeyEvent::new(" ", "Space")));

        assert!(outbound.try_recv().is_err());
        assert_eq!(session.input().pressed_count(), 0);
    }

    #[tokio::test]
    async fn test_match_end_shows_results() {
        let mut session = session(Some("ROOM1"));
        session.connect_test_link("me");
        session.inbound(room_started());
        session.inbound(InboundEvent::StateUpdate(snapshot(&[("a", 3), ("b", 7)])));

        session.inbound(InboundEvent::MatchDeleted {
            message: String::new(),
        });

        match session.view() {
            View::Results { players } => {
                let scores: Vec<i64> = players.iter().map(|p| p.score).collect();
                assert_eq!(scores, vec![7, 3]);
            }
            other => panic!("Expected results, got {:?}", other),
        }
        assert_eq!(session.room_code(), None);
        assert!(!session.is_loading());
        assert!(session.notices().any(|n| n.message == "Match Ended!"));
    }

    #[tokio::test]
    async fn test_match_deleted_in_lobby_goes_home() {
        let mut session = session(Some("ROOM1"));
        session.connect_test_link("me");

        session.inbound(InboundEvent::MatchDeleted {
            message: "Host left".to_string(),
        });

        assert_eq!(session.view(), &View::Home);
        assert_eq!(session.room_code(), None);
    }

    #[tokio::test]
    async fn test_only_creator_starts_match() {
        let mut session = session(Some("ROOM1"));
        let mut outbound = session.connect_test_link("other");
        outbound.try_recv().unwrap();
        session.inbound(InboundEvent::StateUpdate(snapshot(&[("other", 0)])));

        assert!(!session.is_room_creator());
        assert!(!session.start_match());

        session.teardown();
        let mut outbound = session.connect_test_link("me");
        session.inbound(InboundEvent::StateUpdate(snapshot(&[("me", 0)])));
        assert!(session.is_room_creator());
        assert!(session.start_match());
        assert_eq!(
            outbound.try_recv().unwrap(),
            OutboundEvent::StartMatch {
                room_id: "ROOM1".to_string()
            }
        );
    }

    #[tokio::test]
    async fn test_leave_room_notifies_server() {
        let mut session = session(Some("ROOM1"));
        let mut outbound = session.connect_test_link("me");
        outbound.try_recv().unwrap();

        session.handle(SessionEvent::LeaveRoom);

        assert_eq!(
            outbound.try_recv().unwrap(),
            OutboundEvent::RemovePlayer {
                room_id: "ROOM1".to_string()
            }
        );
        assert_eq!(session.room_code(), None);
        assert_eq!(session.view(), &View::Home);
    }

    #[tokio::test]
    async fn test_close_request_is_guarded_while_connected() {
        let mut session = session(None);
        assert_eq!(session.handle(SessionEvent::CloseRequested), Directive::Quit);

        session.connect_test_link("me");
        assert_eq!(session.handle(SessionEvent::CloseRequested), Directive::Continue);
        assert!(session.guard().prompt_visible());

        session.handle(SessionEvent::LeaveCancelled);
        assert!(!session.guard().prompt_visible());

        session.handle(SessionEvent::CloseRequested);
        assert_eq!(session.handle(SessionEvent::LeaveConfirmed), Directive::Quit);
    }

    #[tokio::test]
    async fn test_confirmed_reload_restarts_session() {
        let mut session = session(None);
        session.connect_test_link("me");

        assert_eq!(session.handle(SessionEvent::ReloadRequested), Directive::Continue);
        assert!(session.guard().prompt_visible());
        assert_eq!(session.handle(SessionEvent::LeaveConfirmed), Directive::Reload);
    }

    #[tokio::test]
    async fn test_disconnect_schedules_reconnect() {
        let mut session = session(None);
        let (link, _outbound) = session.connection.attach_test_link();
        session.handle(SessionEvent::Transport {
            link,
            event: TransportEvent::Connected { id: "me".to_string() },
        });
        assert!(!session.is_reconnecting());

        session.handle(SessionEvent::Transport {
            link,
            event: TransportEvent::Disconnected {
                reason: "reset".to_string(),
            },
        });
        assert!(session.is_reconnecting());

        session.teardown();
        assert!(!session.is_reconnecting());
    }

    #[tokio::test]
    async fn test_reconnect_without_credential_goes_to_login() {
        let mut session = session(None);
        session.credentials = CredentialStore::new(
            std::env::temp_dir().join(format!("arena-session-no-token-{}", std::process::id())),
        );
        let (link, _outbound) = session.connection.attach_test_link();
        session.handle(SessionEvent::Transport {
            link,
            event: TransportEvent::Disconnected {
                reason: "refused".to_string(),
            },
        });

        session.handle(SessionEvent::Reconnect { generation: 0 });
        assert!(session.is_reconnecting());

        let generation = session.reconnect.as_ref().map(|t| t.generation).unwrap();
        session.handle(SessionEvent::Reconnect { generation });

        assert!(!session.is_reconnecting());
        assert!(session.connection().link().is_none());
        assert_eq!(session.view(), &View::Login);
    }

    #[tokio::test]
    async fn test_teardown_ignores_late_events() {
        let mut session = session(Some("ROOM1"));
        let (link, _outbound) = session.connection.attach_test_link();
        session.handle(SessionEvent::Transport {
            link,
            event: TransportEvent::Connected { id: "me".to_string() },
        });
        session.inbound(room_started());

        session.teardown();
        assert!(!session.is_loading());

        session.handle(SessionEvent::Transport {
            link,
            event: TransportEvent::Inbound(InboundEvent::StateUpdate(snapshot(&[("me", 1)]))),
        });
        assert!(session.state().players.is_empty());
    }

    #[tokio::test]
    async fn test_rebind_conflict_raises_notice() {
        let mut session = session(None);

        session.handle(SessionEvent::Rebind {
            action: Action::Shoot,
            key: "ArrowUp".to_string(),
        });

        let bindings = session.input().bindings().unwrap();
        assert_eq!(bindings.key_for(Action::Shoot), "Space");
        let last = session.notices().last().unwrap();
        assert_eq!(last.level, NoticeLevel::Error);
        assert!(last.message.contains("already assigned"));
    }

    #[tokio::test]
    async fn test_subscribers_see_applied_snapshots() {
        struct Counter(Rc<Cell<usize>>);

        impl StateObserver for Counter {
            fn state_changed(&mut self, _: &MatchState, _: &crate::game::StateChanges) {
                self.0.set(self.0.get() + 1);
            }
        }

        let mut session = session(None);
        let seen = Rc::new(Cell::new(0));
        session.subscribe(Box::new(Counter(seen.clone())));
        session.connect_test_link("me");

        session.inbound(InboundEvent::StateUpdate(snapshot(&[("me", 0)])));
        session.inbound(InboundEvent::StateUpdate(snapshot(&[("me", 0)])));

        assert_eq!(seen.get(), 1);
        assert_eq!(session.colors().color_of("me"), Some(shared::PALETTE[0]));
    }

    #[tokio::test]
    async fn test_sign_out_forgets_credentials() {
        let mut session = session(None);
        session.credentials.store("a.b.c").unwrap();
        session.connect_test_link("me");

        session.handle(SessionEvent::SignOut);

        assert_eq!(session.view(), &View::Login);
        assert!(session.credentials.token().is_none());
        assert!(!session.connection().is_connected());
        assert!(session.connection().link().is_none());
    }

    #[tokio::test]
    async fn test_notices_are_bounded() {
        let mut session = session(None);
        for i in 0..10 {
            session.notify(NoticeLevel::Info, format!("notice {}", i));
        }
        assert_eq!(session.notices().count(), MAX_NOTICES);
        assert_eq!(session.notices().last().unwrap().message, "notice 9");
    }
}
