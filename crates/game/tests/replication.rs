use std::sync::atomic::{AtomicU16, Ordering};
use std::thread;
use std::time::{Duration, Instant};

use glam::Vec3;
use tether::{
    EngineConfig, FrameLoop, FrameTimer, LevelWorld, NetRole, ScriptedInput, World,
};

static PORT_COUNTER: AtomicU16 = AtomicU16::new(43000);

type Node = FrameLoop<LevelWorld, ScriptedInput>;

fn config() -> EngineConfig {
    EngineConfig {
        port: PORT_COUNTER.fetch_add(1, Ordering::SeqCst),
        ..EngineConfig::default()
    }
}

fn node(config: &EngineConfig, role: NetRole, level: Option<i32>) -> Node {
    let mut world = LevelWorld::new(config);
    if let Some(level) = level {
        world.set_level_index(level).unwrap();
    }
    let mut node = FrameLoop::new(config, world, ScriptedInput::idle())
        .with_timer(FrameTimer::fixed(1.0 / 60.0));
    node.start_session(role).unwrap();
    node
}

/// Runs a frame on every node until `done` holds or two seconds pass.
fn run_until<F>(nodes: &mut [&mut Node], mut done: F) -> bool
where
    F: FnMut(&[&mut Node]) -> bool,
{
    let start = Instant::now();
    while start.elapsed() < Duration::from_secs(2) {
        for node in nodes.iter_mut() {
            node.run_frame();
        }
        if done(nodes) {
            return true;
        }
        thread::sleep(Duration::from_millis(2));
    }
    false
}

#[test]
fn joining_peer_receives_level_and_index() {
    let config = config();
    let mut authority = node(&config, NetRole::Authority, Some(1));
    let mut peer = node(&config, NetRole::Peer, None);

    let joined = run_until(&mut [&mut authority, &mut peer], |n| {
        n[1].world().level_index() == 1 && n[1].session().own_index() == 1
    });

    assert!(joined);
    assert_eq!(authority.session().connection_count(), 1);
    assert_eq!(peer.session().scene_selected(), 1);
    assert!(authority.world().active_player().is_some());
}

#[test]
fn authority_tracks_peer_pose() {
    let config = config();
    let mut authority = node(&config, NetRole::Authority, Some(1));
    let mut peer = node(&config, NetRole::Peer, None);

    let tracked = run_until(&mut [&mut authority, &mut peer], |n| {
        n[0].session().remote_slots().get(1).is_some()
    });

    assert!(tracked);
    let slot = authority.session().remote_slots().get(1).unwrap();
    assert!(slot.active);
    assert!((slot.transform.position.x).abs() < 1.0);
}

#[test]
fn finishing_peer_moves_everyone_to_next_level() {
    let config = config();
    let mut authority = node(&config, NetRole::Authority, Some(1));
    let mut runner = node(&config, NetRole::Peer, None);
    let mut watcher = node(&config, NetRole::Peer, None);

    assert!(run_until(&mut [&mut authority, &mut runner, &mut watcher], |n| {
        n[1].session().own_index() != 0 && n[2].session().own_index() != 0
    }));
    for _ in 0..10 {
        for node in [&mut authority, &mut runner, &mut watcher] {
            node.run_frame();
        }
        thread::sleep(Duration::from_millis(1));
    }
    assert_eq!(runner.world().level_index(), 1);
    assert_eq!(watcher.world().level_index(), 1);

    runner.world_mut().teleport_player(Vec3::new(0.0, 1.0, 40.0));

    let advanced = run_until(&mut [&mut authority, &mut runner, &mut watcher], |n| {
        n.iter().all(|node| node.world().level_index() == 2)
    });

    assert!(advanced);
    assert_eq!(runner.session().scene_selected(), 2);
    assert_eq!(watcher.session().scene_selected(), 2);

    // the authority's rebroadcast of the same level changes nothing
    for _ in 0..20 {
        for node in [&mut authority, &mut runner, &mut watcher] {
            node.run_frame();
        }
        thread::sleep(Duration::from_millis(1));
    }
    assert_eq!(authority.world().level_index(), 2);
    assert_eq!(runner.world().level_index(), 2);
    assert_eq!(watcher.world().level_index(), 2);
}

#[test]
fn peers_see_each_other_through_the_authority() {
    let config = config();
    let mut authority = node(&config, NetRole::Authority, Some(1));
    let mut first = node(&config, NetRole::Peer, None);
    let mut second = node(&config, NetRole::Peer, None);

    let visible = run_until(&mut [&mut authority, &mut first, &mut second], |n| {
        let (a, b) = (n[1].session().own_index(), n[2].session().own_index());
        a != 0
            && b != 0
            && n[1].session().remote_slots().get(b).is_some()
            && n[2].session().remote_slots().get(a).is_some()
    });

    assert!(visible);
    let (a, b) = (first.session().own_index(), second.session().own_index());
    assert_ne!(a, b);
    assert!(first.session().remote_slots().get(a).is_none());
    assert!(second.session().remote_slots().get(b).is_none());
    assert!(!first.world().drawn_puppets().is_empty());
}

#[test]
fn window_close_on_peer_frees_its_slot() {
    let config = config();
    let mut authority = node(&config, NetRole::Authority, Some(1));
    let mut peer = node(&config, NetRole::Peer, None);

    assert!(run_until(&mut [&mut authority, &mut peer], |n| {
        n[0].session().remote_slots().get(1).is_some()
    }));

    peer.queue_mut().push(tether::EventKind::WindowClose, 0.0);
    peer.run_frame();
    assert!(!peer.is_running());
    assert!(!peer.session().is_active());

    let freed = run_until(&mut [&mut authority], |n| {
        n[0].session().remote_slots().iter_active().count() == 0
    });
    assert!(freed);
}
