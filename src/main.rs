/*!
# Lobby Sync Client

Headless client that joins a lobby, writes its own throttled position and
mirrors everyone else's as remote avatar entities.

The hosted database is replaced by an in-process `InMemoryStore`; `--bots`
simulated users write to the same store from their own runtime so there is
somebody to see. Run with `RUST_LOG=lobby_sync=debug` for the per-second
roster dump.
*/

use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use bevy::app::ScheduleRunnerPlugin;
use bevy::prelude::*;
use bevy::time::Real;
use clap::Parser;
use glam::Vec3;
use rand::Rng;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use lobby_sync::ecs::plugins::player::Wander;
use lobby_sync::ecs::{DebugPlugin, PlayerPlugin, StoreBridgePlugin, SyncPlugin, SyncSession};
use lobby_sync::store::validate_key;
use lobby_sync::{Coordinate, InMemoryStore, LobbyStore, SyncConfig, UpdateThrottler};

/// Frame rate of the headless loop.
const FRAME_HZ: f64 = 60.0;
const BOT_TICK: Duration = Duration::from_millis(200);

#[derive(Parser, Debug)]
#[command(name = "lobby_sync", about = "Throttled lobby position sync client")]
struct Args {
    /// Lobby to join
    #[arg(long, default_value = "lobby1")]
    lobby: String,

    /// User id to write under
    #[arg(long, default_value = "player")]
    user: String,

    /// Simulated remote users writing to the same store
    #[arg(long, default_value_t = 2)]
    bots: usize,

    /// Exit after this many seconds instead of running forever
    #[arg(long)]
    run_for_secs: Option<f64>,

    /// JSON file overriding sync defaults
    #[arg(long)]
    config: Option<PathBuf>,

    /// Delete every lobby before exiting
    #[arg(long)]
    reset_on_exit: bool,
}

#[derive(Resource)]
struct RunLimit(Duration);

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("lobby_sync=info")),
        )
        .init();

    let args = Args::parse();
    validate_key(&args.lobby)?;
    validate_key(&args.user)?;
    let config = match &args.config {
        Some(path) => SyncConfig::load(path)?,
        None => SyncConfig::default(),
    };

    info!("🚀 Starting lobby sync client");
    info!(
        lobby = %args.lobby,
        user = %args.user,
        max_writes_per_second = config.max_writes_per_second(),
        "📡 joining lobby"
    );

    let store = LobbyStore::new(Arc::new(InMemoryStore::new()));
    let bots = BotSwarm::start(store.clone(), &args.lobby, args.bots, &config)?;

    let mut app = App::new();
    app.add_plugins(
        MinimalPlugins.set(ScheduleRunnerPlugin::run_loop(Duration::from_secs_f64(1.0 / FRAME_HZ))),
    )
    .add_plugins(SyncPlugin::new(
        SyncSession::new(&args.lobby, &args.user),
        config.clone(),
    ))
    .add_plugins(StoreBridgePlugin::new(store.clone(), config.resubscribe_delay()))
    .add_plugins(PlayerPlugin::wandering(Wander::default()))
    .add_plugins(DebugPlugin);

    if let Some(secs) = args.run_for_secs {
        app.insert_resource(RunLimit(Duration::from_secs_f64(secs)))
            .add_systems(Update, exit_after_run_limit_system);
    }

    let exit = app.run();
    info!(?exit, "🛑 client stopped");
    bots.stop();

    if args.reset_on_exit {
        reset_store(&store)?;
    }
    Ok(())
}

fn exit_after_run_limit_system(
    limit: Res<RunLimit>,
    time: Res<Time<Real>>,
    mut exit: EventWriter<AppExit>,
) {
    if time.elapsed() >= limit.0 {
        exit.send(AppExit::Success);
    }
}

fn reset_store(store: &LobbyStore) -> anyhow::Result<()> {
    let rt = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;
    rt.block_on(async {
        info!(lobbies = ?store.lobbies().await?, "🧹 clearing every lobby");
        store.clear_all().await?;
        info!(lobbies = ?store.lobbies().await?, "lobbies after reset");
        Ok::<(), anyhow::Error>(())
    })
}

/// Simulated remote users, each circling its own spot.
///
/// Bots run outside the ECS, so each one throttles with [`UpdateThrottler::poll`].
struct BotSwarm {
    stop: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

impl BotSwarm {
    fn start(store: LobbyStore, lobby: &str, count: usize, config: &SyncConfig) -> anyhow::Result<Self> {
        let stop = Arc::new(AtomicBool::new(false));
        if count == 0 {
            return Ok(Self { stop, handle: None });
        }

        let mut rng = rand::thread_rng();
        let phases: Vec<f32> = (0..count)
            .map(|_| rng.gen_range(0.0..std::f32::consts::TAU))
            .collect();
        let lobby = lobby.to_string();
        let config = config.clone();
        let flag = stop.clone();

        let handle = thread::Builder::new()
            .name("bots".to_string())
            .spawn(move || {
                let rt = match tokio::runtime::Builder::new_current_thread().enable_all().build() {
                    Ok(rt) => rt,
                    Err(error) => {
                        warn!(%error, "failed to build bot runtime");
                        return;
                    }
                };
                rt.block_on(async move {
                    let mut tasks = tokio::task::JoinSet::new();
                    for (index, phase) in phases.into_iter().enumerate() {
                        tasks.spawn(run_bot(
                            store.clone(),
                            UpdateThrottler::from_config(&config),
                            lobby.clone(),
                            format!("bot-{index}"),
                            index,
                            phase,
                            flag.clone(),
                        ));
                    }
                    while tasks.join_next().await.is_some() {}
                });
            })?;

        info!(count, "🤖 bots started");
        Ok(Self {
            stop,
            handle: Some(handle),
        })
    }

    fn stop(mut self) {
        self.stop.store(true, Ordering::Relaxed);
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                warn!("bot thread panicked");
            }
        }
    }
}

async fn run_bot(
    store: LobbyStore,
    mut throttler: UpdateThrottler,
    lobby: String,
    user: String,
    index: usize,
    mut phase: f32,
    stop: Arc<AtomicBool>,
) {
    let center = Vec3::new(index as f32 * 15.0, 0.5, 20.0);
    let mut ticker = tokio::time::interval(BOT_TICK);
    while !stop.load(Ordering::Relaxed) {
        ticker.tick().await;
        phase += 0.25;
        let position = center + Vec3::new(phase.cos(), 0.0, phase.sin()) * 6.0;
        throttler.offer(&lobby, Coordinate::from_vec3(&user, position));
        let Some(request) = throttler.poll(Instant::now()) else {
            continue;
        };
        if let Err(error) = store.write(&request.lobby, &request.coordinate).await {
            warn!(%user, %error, "bot write failed");
        }
    }
}
