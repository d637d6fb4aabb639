//! Performance benchmarks for the per-frame and per-snapshot paths

use client::camera::{compute_offset, CameraInputs, Viewport};
use client::colors::{assign_colors, ColorAssigner};
use client::game::MatchState;
use shared::{decode, Cell, Player, PlayerId, Position, RoomStatus, Snapshot, CELL_SIZE};
use std::collections::HashMap;
use std::time::Instant;

fn roster(count: usize) -> HashMap<PlayerId, Player> {
    (0..count)
        .map(|i| {
            let mut player = Player::new(&format!("player{}", i), i as i32, i as i32);
            player.score = i as i64;
            (format!("id-{:03}", i), player)
        })
        .collect()
}

fn full_snapshot(players: usize, map: usize) -> Snapshot {
    Snapshot {
        players: Some(roster(players)),
        status: Some(RoomStatus::Active),
        time_left: Some(60_000),
        spawn_count: Some(players as u32),
        created_by: Some("id-000".to_string()),
        map: Some(vec![vec![Cell::Open; map]; map]),
        bullets: Some(Vec::new()),
        ..Snapshot::default()
    }
}

/// Benchmarks merging full snapshots into the match state
#[test]
fn benchmark_snapshot_merge() {
    let iterations = 1_000;
    let mut state = MatchState::new();
    let snapshots: Vec<Snapshot> = (0..iterations).map(|_| full_snapshot(12, 40)).collect();

    let start = Instant::now();

    for snapshot in snapshots {
        state.apply_snapshot(snapshot);
    }

    let duration = start.elapsed();
    println!(
        "Snapshot merge: {} iterations in {:?} ({:.2} µs/iter)",
        iterations,
        duration,
        duration.as_micros() as f64 / iterations as f64
    );

    assert_eq!(state.players.len(), 12);
    assert!(duration.as_millis() < 2000);
}

/// Benchmarks decoding snapshot frames off the wire
#[test]
fn benchmark_snapshot_decode() {
    let mut players = serde_json::Map::new();
    for i in 0..12 {
        players.insert(
            format!("id-{}", i),
            serde_json::json!({"position": {"x": i, "y": i}, "health": 100, "userName": format!("p{}", i)}),
        );
    }
    let frame = serde_json::json!({
        "event": "stateUpdate",
        "data": {"players": players, "roomStatus": "active", "timeLeft": 1000}
    })
    .to_string();

    let iterations = 10_000;
    let start = Instant::now();

    for _ in 0..iterations {
        let _ = decode(&frame).unwrap();
    }

    let duration = start.elapsed();
    println!(
        "Snapshot decode: {} iterations in {:?} ({:.2} µs/iter)",
        iterations,
        duration,
        duration.as_micros() as f64 / iterations as f64
    );

    assert!(duration.as_millis() < 5000);
}

/// Benchmarks color assignment for a full room
#[test]
fn benchmark_color_assignment() {
    let players = roster(12);
    let iterations = 10_000;
    let start = Instant::now();

    for _ in 0..iterations {
        let _ = assign_colors(players.keys());
    }

    let duration = start.elapsed();
    println!(
        "Color assignment: {} iterations in {:?} ({:.2} ns/iter)",
        iterations,
        duration,
        duration.as_nanos() as f64 / iterations as f64
    );

    assert!(duration.as_millis() < 1000);
}

/// Unchanged membership must stay on the cheap comparison path
#[test]
fn benchmark_color_memo_hits() {
    let players = roster(12);
    let mut assigner = ColorAssigner::new();
    assert!(assigner.update(&players));

    let iterations = 10_000;
    let start = Instant::now();

    for _ in 0..iterations {
        assert!(!assigner.update(&players));
    }

    let duration = start.elapsed();
    println!(
        "Color memo: {} iterations in {:?} ({:.2} ns/iter)",
        iterations,
        duration,
        duration.as_nanos() as f64 / iterations as f64
    );

    assert!(duration.as_millis() < 1000);
}

/// Benchmarks the camera offset computation
#[test]
fn benchmark_camera_offset() {
    let iterations = 100_000;
    let start = Instant::now();

    for i in 0..iterations {
        let inputs = CameraInputs {
            player: Position {
                x: (i % 40) as i32,
                y: (i % 25) as i32,
            },
            cell_size: CELL_SIZE,
            map: (40, 25),
            viewport: Viewport::new(800.0, 600.0),
        };
        let _ = compute_offset(&inputs);
    }

    let duration = start.elapsed();
    println!(
        "Camera offset: {} iterations in {:?} ({:.2} ns/iter)",
        iterations,
        duration,
        duration.as_nanos() as f64 / iterations as f64
    );

    assert!(duration.as_millis() < 100);
}
