mod app;
mod config;

use std::path::PathBuf;

use anyhow::{Result, bail};
use clap::{Parser, ValueEnum};

use app::NodeApp;
use tether::{NetRole, PacketLossSimulation, ScriptedInput};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Role {
    /// Run the authority that owns the active level
    Host,
    /// Join an authority as a peer
    Join,
}

impl From<Role> for NetRole {
    fn from(role: Role) -> Self {
        match role {
            Role::Host => NetRole::Authority,
            Role::Join => NetRole::Peer,
        }
    }
}

#[derive(Parser)]
#[command(name = "tether-node")]
#[command(about = "Headless tether session node")]
pub struct Args {
    #[arg(short, long, value_enum, default_value_t = Role::Host)]
    role: Role,

    #[arg(short, long)]
    port: Option<u16>,

    #[arg(long, help = "Authority address to join")]
    host: Option<String>,

    #[arg(short, long, help = "Stop after this many frames")]
    frames: Option<u64>,

    #[arg(long, default_value_t = 60)]
    frame_rate: u32,

    #[arg(short, long, help = "TOML file with engine settings")]
    config: Option<PathBuf>,

    #[arg(short, long, default_value = "idle", help = "Input script: idle, run, hop, explore")]
    script: String,

    #[arg(short, long, default_value_t = 1, help = "Level the host starts on")]
    level: i32,

    #[arg(long, help = "Enable packet loss simulation")]
    simulate_packet_loss: bool,

    #[arg(long, default_value_t = 0.0, help = "Packet loss percentage (0-100)")]
    loss_percent: f32,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    let engine = config::load(&args)?;

    let Some(input) = ScriptedInput::by_name(&args.script) else {
        bail!("unknown input script '{}'", args.script);
    };

    let packet_loss = args
        .simulate_packet_loss
        .then(|| PacketLossSimulation::with_loss(args.loss_percent));

    let mut app = NodeApp::new(&engine, args.role.into(), input, args.frame_rate);
    if args.role == Role::Host {
        app.select_level(args.level)?;
    }
    app.start(packet_loss);

    log::info!("Node running as {:?}", args.role);
    let frames = app.run(args.frames);
    log::info!("Node stopped after {} frames", frames);

    Ok(())
}
