use crate::bindings::Action;
use crate::camera::CameraOffset;
use crate::lifecycle::{LeaveIntent, View};
use crate::session::{Notice, NoticeLevel, Session};
use macroquad::prelude::*;
use shared::{Cell, Player, PlayerStatus, CELL_SIZE};

const BACKGROUND: Color = Color::new(0.10, 0.10, 0.10, 1.0);
const WALL: Color = Color::new(0.27, 0.27, 0.27, 1.0);
const FLOOR: Color = Color::new(0.16, 0.16, 0.18, 1.0);

/// Parses `#RRGGBB`, falling back to white
pub fn hex_color(hex: &str) -> Color {
    let digits = hex.trim_start_matches('#');
    match u32::from_str_radix(digits, 16) {
        Ok(rgb) if digits.len() == 6 => Color::from_rgba(
            ((rgb >> 16) & 0xFF) as u8,
            ((rgb >> 8) & 0xFF) as u8,
            (rgb & 0xFF) as u8,
            255,
        ),
        _ => WHITE,
    }
}

/// `MM:SS` for a millisecond countdown
pub fn format_time_left(millis: u64) -> String {
    let seconds = millis / 1000;
    format!("{:02}:{:02}", seconds / 60, seconds % 60)
}

pub struct Renderer {
    width: f32,
    height: f32,
}

impl Renderer {
    pub fn new(width: usize, height: usize) -> Self {
        Renderer {
            width: width as f32,
            height: height as f32,
        }
    }

    pub fn resize(&mut self, width: f32, height: f32) {
        self.width = width;
        self.height = height;
    }

    pub fn render(&mut self, session: &Session) {
        clear_background(BACKGROUND);

        match session.view() {
            View::Login => self.draw_centered(&[
                "Sign in required",
                "Store a valid token in the configured token file and restart",
            ]),
            View::Home => self.draw_home(session),
            View::Lobby => self.draw_lobby(session),
            View::Match => self.draw_match(session),
            View::Results { players } => self.draw_results(players),
        }

        self.draw_notices(session.notices());

        if let Some(intent) = session.guard().pending() {
            self.draw_leave_prompt(intent);
        }
    }

    fn draw_home(&mut self, session: &Session) {
        let connection = if session.connection().is_connected() {
            "Connected"
        } else {
            "Connecting..."
        };
        let room = match session.room_code() {
            Some(code) => format!("Enter: join room {}", code),
            None => "No room code set (use --room)".to_string(),
        };
        self.draw_centered(&[connection, room.as_str(), "R: reset controls    Q: sign out"]);
    }

    fn draw_lobby(&mut self, session: &Session) {
        let state = session.state();
        let code = session.room_code().unwrap_or_default();
        let header = format!("Room {}", code);
        let waiting = format!("{} / {} players", state.players.len(), state.spawn_count);
        let start = if session.is_room_creator() {
            "Enter: start match    Escape: leave room"
        } else {
            "Waiting for the creator to start    Escape: leave room"
        };
        self.draw_centered(&[header.as_str(), waiting.as_str(), start]);

        for (i, player) in state.roster().iter().enumerate() {
            draw_text(
                &player.user_name,
                20.0,
                self.height / 2.0 + 80.0 + i as f32 * 20.0,
                18.0,
                WHITE,
            );
        }
    }

    fn draw_match(&mut self, session: &Session) {
        let state = session.state();
        let offset = session.camera().offset();

        if let Some(map) = &state.map {
            for (y, row) in map.iter().enumerate() {
                for (x, cell) in row.iter().enumerate() {
                    let color = match cell {
                        Cell::Wall => WALL,
                        Cell::Open => FLOOR,
                    };
                    let (px, py) = to_screen(offset, x as i32, y as i32);
                    draw_rectangle(px, py, CELL_SIZE, CELL_SIZE, color);
                }
            }
        }

        for bullet in state.bullets.iter().flatten() {
            let (px, py) = to_screen(offset, bullet.position.x, bullet.position.y);
            draw_circle(px + CELL_SIZE / 2.0, py + CELL_SIZE / 2.0, CELL_SIZE / 6.0, YELLOW);
        }

        let local = session.connection().session_id();
        for (id, player) in &state.players {
            if player.status == PlayerStatus::Dead {
                continue;
            }
            let color = session
                .colors()
                .color_of(id)
                .map(hex_color)
                .unwrap_or(WHITE);
            self.draw_player(offset, player, color, Some(id.as_str()) == local);
        }

        self.draw_hud(session);

        let eliminated = local
            .and_then(|id| state.players.get(id))
            .and_then(elimination_lines);
        if let Some((score, kills)) = eliminated {
            draw_rectangle(0.0, 0.0, self.width, self.height, Color::new(0.5, 0.0, 0.0, 0.35));
            self.draw_centered(&["ELIMINATED", score.as_str(), kills.as_str()]);
        }

        if session.is_loading() {
            self.draw_centered(&["Get ready..."]);
        }
    }

    fn draw_player(&mut self, offset: CameraOffset, player: &Player, color: Color, is_local: bool) {
        let (px, py) = to_screen(offset, player.position.x, player.position.y);

        draw_rectangle(px + 2.0, py + 2.0, CELL_SIZE - 4.0, CELL_SIZE - 4.0, color);
        if is_local {
            draw_rectangle_lines(px + 1.0, py + 1.0, CELL_SIZE - 2.0, CELL_SIZE - 2.0, 2.0, WHITE);
        }

        let health = player.health.min(100) as f32 / 100.0;
        draw_rectangle(px, py - 6.0, CELL_SIZE, 3.0, Color::from_rgba(51, 51, 51, 255));
        draw_rectangle(px, py - 6.0, CELL_SIZE * health, 3.0, GREEN);
    }

    fn draw_hud(&mut self, session: &Session) {
        let state = session.state();
        let timer = format_time_left(state.time_left);
        draw_text(&timer, self.width / 2.0 - 30.0, 30.0, 32.0, WHITE);

        let mut ranked: Vec<(&String, &Player)> = state.players.iter().collect();
        ranked.sort_by(|a, b| b.1.score.cmp(&a.1.score).then_with(|| a.0.cmp(b.0)));

        for (i, (id, player)) in ranked.iter().enumerate() {
            let y = 20.0 + i as f32 * 18.0;
            let color = session
                .colors()
                .color_of(id)
                .map(hex_color)
                .unwrap_or(WHITE);
            draw_rectangle(10.0, y - 9.0, 10.0, 10.0, color);
            let line = format!(
                "{}  {} pts  {} kills",
                player.user_name, player.score, player.kills
            );
            draw_text(&line, 26.0, y, 16.0, WHITE);
        }

        if let Some(bindings) = session.input().bindings() {
            let hint = format!(
                "Shoot: {}   Exit: {}",
                bindings.key_for(Action::Shoot),
                bindings.key_for(Action::Exit)
            );
            draw_text(&hint, 10.0, self.height - 10.0, 14.0, GRAY);
        }
    }

    fn draw_results(&mut self, players: &[Player]) {
        self.draw_centered(&["Match results", "Enter: back home"]);

        for (rank, player) in players.iter().enumerate() {
            let line = format!(
                "{}. {}  {} pts  {} kills",
                rank + 1,
                player.user_name,
                player.score,
                player.kills
            );
            draw_text(
                &line,
                self.width / 2.0 - 120.0,
                self.height / 2.0 + 60.0 + rank as f32 * 22.0,
                20.0,
                WHITE,
            );
        }
    }

    fn draw_notices<'a>(&mut self, notices: impl Iterator<Item = &'a Notice>) {
        for (i, notice) in notices.enumerate() {
            let color = match notice.level {
                NoticeLevel::Info => SKYBLUE,
                NoticeLevel::Success => GREEN,
                NoticeLevel::Warning => ORANGE,
                NoticeLevel::Error => RED,
            };
            let y = self.height - 40.0 - i as f32 * 20.0;
            draw_text(&notice.message, self.width - 320.0, y, 16.0, color);
        }
    }

    fn draw_leave_prompt(&mut self, intent: LeaveIntent) {
        draw_rectangle(0.0, 0.0, self.width, self.height, Color::new(0.0, 0.0, 0.0, 0.6));
        let question = match intent {
            LeaveIntent::Close => "Quit the game?",
            LeaveIntent::Reload => "Restart the session?",
        };
        self.draw_centered(&[question, "Y: leave    N: stay"]);
    }

    fn draw_centered(&mut self, lines: &[&str]) {
        for (i, line) in lines.iter().enumerate() {
            let size = if i == 0 { 32.0 } else { 20.0 };
            let dims = measure_text(line, None, size as u16, 1.0);
            draw_text(
                line,
                (self.width - dims.width) / 2.0,
                self.height / 2.0 - 40.0 + i as f32 * 30.0,
                size,
                WHITE,
            );
        }
    }
}

/// Final score and kill lines for a local player who has been eliminated
pub fn elimination_lines(player: &Player) -> Option<(String, String)> {
    (player.status == PlayerStatus::Dead).then(|| {
        (
            format!("Final score: {}", player.score),
            format!("Kills: {}", player.kills),
        )
    })
}

fn to_screen(offset: CameraOffset, x: i32, y: i32) -> (f32, f32) {
    (
        offset.x + x as f32 * CELL_SIZE,
        offset.y + y as f32 * CELL_SIZE,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hex_color() {
        let color = hex_color("#FF2E63");
        assert_eq!(color, Color::from_rgba(255, 46, 99, 255));
        assert_eq!(hex_color("nonsense"), WHITE);
    }

    #[test]
    fn test_elimination_lines_only_for_dead_players() {
        let mut player = Player::new("ana", 0, 0);
        player.status = PlayerStatus::Alive;
        assert_eq!(elimination_lines(&player), None);

        player.status = PlayerStatus::Dead;
        player.score = 42;
        player.kills = 3;
        assert_eq!(
            elimination_lines(&player),
            Some(("Final score: 42".to_string(), "Kills: 3".to_string()))
        );
    }

    #[test]
    fn test_format_time_left() {
        assert_eq!(format_time_left(0), "00:00");
        assert_eq!(format_time_left(61_999), "01:01");
        assert_eq!(format_time_left(600_000), "10:00");
    }
}
