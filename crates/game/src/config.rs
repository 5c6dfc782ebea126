use serde::{Deserialize, Serialize};

use crate::event::DEFAULT_STALE_PASSES;
use crate::net::DEFAULT_PORT;
use crate::simulation::{DEFAULT_MAX_STEPS_PER_FRAME, DEFAULT_TICK_RATE};

/// One playable level: where the player spawns and where the finish sits.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LevelConfig {
    pub name: String,
    pub spawn: [f32; 3],
    pub finish_z: f32,
}

impl LevelConfig {
    pub fn new(name: impl Into<String>, spawn: [f32; 3], finish_z: f32) -> Self {
        Self {
            name: name.into(),
            spawn,
            finish_z,
        }
    }
}

/// Runtime knobs shared by every subsystem. Missing fields in a config file
/// fall back to the defaults below.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub tick_rate: u32,
    pub max_steps_per_frame: u32,
    /// Capacity of the remote player table and the authority's peer limit.
    pub max_peers: usize,
    pub port: u16,
    pub authority_host: String,
    pub stale_event_passes: u32,
    pub connection_timeout_secs: u64,
    pub connect_timeout_secs: u64,
    pub player_force: f32,
    pub jump_force: f32,
    pub player_mass: f32,
    pub levels: Vec<LevelConfig>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            tick_rate: DEFAULT_TICK_RATE,
            max_steps_per_frame: DEFAULT_MAX_STEPS_PER_FRAME,
            max_peers: 2,
            port: DEFAULT_PORT,
            authority_host: "127.0.0.1".to_string(),
            stale_event_passes: DEFAULT_STALE_PASSES,
            connection_timeout_secs: 10,
            connect_timeout_secs: 5,
            player_force: 30.0,
            jump_force: 400.0,
            player_mass: 1.0,
            levels: vec![
                LevelConfig::new("Meadow", [0.0, 1.0, 0.0], 60.0),
                LevelConfig::new("Canyon", [0.0, 1.0, 0.0], 90.0),
                LevelConfig::new("Summit", [0.0, 1.0, 0.0], 120.0),
            ],
        }
    }
}

impl EngineConfig {
    pub fn level(&self, index: i32) -> Option<&LevelConfig> {
        if index < 1 {
            return None;
        }
        self.levels.get(index as usize - 1)
    }

    pub fn level_count(&self) -> i32 {
        self.levels.len() as i32
    }
}
