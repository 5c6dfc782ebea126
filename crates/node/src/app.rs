use std::thread;
use std::time::{Duration, Instant};

use anyhow::Result;
use tether::{
    EngineConfig, FrameLoop, LevelWorld, NetRole, PacketLossSimulation, ScriptedInput, World,
};

const STATS_INTERVAL: Duration = Duration::from_secs(5);

/// Drives one frame loop at a steady frame rate without a window.
pub struct NodeApp {
    frames: FrameLoop<LevelWorld, ScriptedInput>,
    role: NetRole,
    frame_time: Duration,
}

impl NodeApp {
    pub fn new(
        config: &EngineConfig,
        role: NetRole,
        input: ScriptedInput,
        frame_rate: u32,
    ) -> Self {
        let world = LevelWorld::new(config);
        Self {
            frames: FrameLoop::new(config, world, input),
            role,
            frame_time: Duration::from_secs_f64(1.0 / frame_rate.max(1) as f64),
        }
    }

    pub fn select_level(&mut self, level: i32) -> Result<()> {
        self.frames.world_mut().set_level_index(level)?;
        Ok(())
    }

    /// Opens the session. A transport that fails to come up is logged and
    /// the node keeps running offline.
    pub fn start(&mut self, packet_loss: Option<PacketLossSimulation>) {
        if let Some(simulation) = packet_loss {
            self.frames.session_mut().set_packet_loss(simulation);
        }
        if let Err(e) = self.frames.start_session(self.role) {
            log::error!("Running without network: {}", e);
        }
    }

    /// Runs until the window closes or `limit` frames have passed. Returns
    /// the number of frames run.
    pub fn run(&mut self, limit: Option<u64>) -> u64 {
        let mut last_report = Instant::now();

        while self.frames.is_running() && limit.is_none_or(|limit| self.frames.frames() < limit) {
            let started = Instant::now();
            let stats = self.frames.run_frame();
            log::trace!("{:?}", stats);

            if last_report.elapsed() >= STATS_INTERVAL {
                last_report = Instant::now();
                self.report();
            }

            if let Some(remaining) = self.frame_time.checked_sub(started.elapsed()) {
                thread::sleep(remaining);
            }
        }

        self.frames.session_mut().shutdown();
        self.frames.frames()
    }

    fn report(&self) {
        let session = self.frames.session();
        let world = self.frames.world();
        let timer = self.frames.timer();

        log::info!(
            "level {} | peer index {} | remotes {} | {:.0} fps",
            world.level_index(),
            session.own_index(),
            session.remote_slots().iter_active().count(),
            timer.fps(),
        );
        if let Some(player) = world.active_player()
            && self.role == NetRole::Peer
        {
            log::info!("player at {}", player.position);
        }
    }
}
