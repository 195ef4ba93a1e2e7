//! Headless Skirmish Runner
//!
//! Spawns a mixed group of agents around a scripted player, runs the
//! decision core for a fixed number of ticks and prints a summary.

use clap::Parser;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::Serialize;

use skirmish_ai::agent::Archetype;
use skirmish_ai::core::config::{load_config, AiConfig};
use skirmish_ai::core::types::{direction, AgentId, Vec2};
use skirmish_ai::difficulty::{EngagementObserver, MetricKind};
use skirmish_ai::perception::PlayerState;
use skirmish_ai::simulation::{SimulationContext, SimulationStats, SpawnRequest, TickInput};

const ROSTER: [Archetype; 8] = [
    Archetype::Grunt,
    Archetype::Grunt,
    Archetype::Scout,
    Archetype::Heavy,
    Archetype::Sniper,
    Archetype::Support,
    Archetype::Elite,
    Archetype::Brute,
];

/// Headless Skirmish Runner - scripted player against the AI
#[derive(Parser, Debug)]
#[command(name = "skirmish_runner")]
#[command(about = "Run the skirmish AI against a scripted player and report what happened")]
struct Args {
    /// Config preset name (loaded from data/ai_config/)
    #[arg(long, default_value = "default")]
    config: String,

    /// Number of agents to spawn
    #[arg(long, default_value_t = 12)]
    agents: usize,

    /// Ticks to simulate
    #[arg(long, default_value_t = 600)]
    ticks: u64,

    /// Seconds per tick
    #[arg(long, default_value_t = 0.1)]
    dt: f32,

    /// Random seed for deterministic runs
    #[arg(long)]
    seed: Option<u64>,

    /// Output format: json or text
    #[arg(long, default_value = "json")]
    format: String,

    /// Log every tick at debug level
    #[arg(long, short = 'v')]
    verbose: bool,
}

#[derive(Serialize)]
struct RunSummary {
    config: String,
    seed: u64,
    ticks: u64,
    agents_spawned: usize,
    agents_remaining: usize,
    squads_remaining: usize,
    attacks: u64,
    volleys_fired: u64,
    player_health: f32,
    final_difficulty: f32,
    multipliers: std::collections::BTreeMap<&'static str, f32>,
    stats: SimulationStats,
}

/// Player stand-in: walks a circle, shoots the nearest agent in range
struct ScriptedPlayer {
    position: Vec2,
    angle: f32,
    health: f32,
    shots: u32,
    hits: u32,
    kills: u32,
    damage_taken: f32,
}

impl ScriptedPlayer {
    const RADIUS: f32 = 200.0;
    const RANGE: f32 = 250.0;
    const DAMAGE: f32 = 25.0;
    const ACCURACY: f32 = 0.6;

    fn new() -> Self {
        Self {
            position: Vec2::new(Self::RADIUS, 0.0),
            angle: 0.0,
            health: 1000.0,
            shots: 0,
            hits: 0,
            kills: 0,
            damage_taken: 0.0,
        }
    }

    fn step(&mut self, dt: f32) -> Vec2 {
        let before = self.position;
        self.angle += 0.2 * dt;
        self.position = direction(self.angle) * Self::RADIUS;
        if dt > 0.0 {
            (self.position - before) / dt
        } else {
            Vec2::ZERO
        }
    }

    fn metrics(&self, elapsed: f32) -> Vec<(MetricKind, f32)> {
        let mut readings = vec![(MetricKind::SurvivalTime, elapsed)];
        if self.shots > 0 {
            readings.push((MetricKind::Accuracy, self.hits as f32 / self.shots as f32));
        }
        if elapsed > 0.0 {
            readings.push((MetricKind::KillRate, self.kills as f32 * 60.0 / elapsed));
            readings.push((MetricKind::DamageTakenRate, self.damage_taken / elapsed));
        }
        readings
    }
}

fn main() {
    let args = Args::parse();

    let default_level = if args.verbose { "skirmish_ai=debug" } else { "skirmish_ai=info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .init();

    let seed = args.seed.unwrap_or_else(rand::random);
    let mut rng = StdRng::seed_from_u64(seed);

    let config = load_config(&args.config).unwrap_or_else(|e| {
        tracing::warn!(preset = %args.config, error = %e, "failed to load config, using defaults");
        AiConfig::default()
    });

    let mut sim = match SimulationContext::new(config, seed) {
        Ok(sim) => sim,
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }
    };
    sim.add_adaptation_layer(Box::new(EngagementObserver::new()));

    for i in 0..args.agents {
        let archetype = ROSTER[i % ROSTER.len()];
        let position = Vec2::new(rng.gen_range(-400.0..400.0), rng.gen_range(-400.0..400.0));
        sim.spawn_agent(&SpawnRequest {
            archetype,
            position,
            facing: rng.gen_range(-std::f32::consts::PI..std::f32::consts::PI),
        });
    }
    tracing::info!(agents = args.agents, seed, preset = %args.config, "skirmish started");

    let mut player = ScriptedPlayer::new();
    let mut attacks = 0u64;
    let mut volleys = 0u64;
    let mut ticks = 0u64;

    while ticks < args.ticks && player.health > 0.0 && !sim.agents.is_empty() {
        let velocity = player.step(args.dt);
        let target = nearest_in_range(&sim, player.position, ScriptedPlayer::RANGE);

        let input = TickInput {
            dt: args.dt,
            player: PlayerState {
                position: player.position,
                velocity,
                health_ratio: (player.health / 1000.0).clamp(0.0, 1.0),
                is_moving: true,
                is_firing: target.is_some(),
            },
            metrics: player.metrics(sim.time()),
        };
        let report = sim.tick(&input);
        ticks += 1;

        for intent in &report.intents {
            if let Some(attack) = intent.attack {
                attacks += 1;
                if rng.gen::<f32>() < attack.accuracy {
                    player.health -= attack.damage;
                    player.damage_taken += attack.damage;
                }
            }
        }
        volleys += report
            .squads
            .iter()
            .filter(|s| s.volley == Some(skirmish_ai::coordination::Volley::Fired))
            .count() as u64;

        sim.apply_intents(&report.intents, args.dt);

        if let Some(id) = target {
            player.shots += 1;
            if rng.gen::<f32>() < ScriptedPlayer::ACCURACY {
                player.hits += 1;
                if let Ok(true) = sim.apply_hit(id, ScriptedPlayer::DAMAGE, player.position) {
                    player.kills += 1;
                }
            }
        }

        tracing::debug!(
            tick = report.tick,
            attacks = report.attacks(),
            squads = report.squads.len(),
            difficulty = report.difficulty,
            "tick"
        );
    }

    let summary = RunSummary {
        config: args.config.clone(),
        seed,
        ticks,
        agents_spawned: args.agents,
        agents_remaining: sim.agents.len(),
        squads_remaining: sim.squads.len(),
        attacks,
        volleys_fired: volleys,
        player_health: player.health.max(0.0),
        final_difficulty: sim.difficulty.difficulty(),
        multipliers: sim.difficulty.multipliers().as_map(),
        stats: sim.stats(),
    };

    if args.format == "json" {
        match serde_json::to_string_pretty(&summary) {
            Ok(json) => println!("{}", json),
            Err(e) => eprintln!("Error: {}", e),
        }
    } else {
        println!("=== Skirmish Result ===");
        println!("Seed: {}  Ticks: {}", summary.seed, summary.ticks);
        println!(
            "Agents: {}/{} remaining, {} squads",
            summary.agents_remaining, summary.agents_spawned, summary.squads_remaining
        );
        println!("Attacks: {} ({} volleys)", summary.attacks, summary.volleys_fired);
        println!("Player health: {:.1}", summary.player_health);
        println!("Difficulty: {:.3}", summary.final_difficulty);
        println!(
            "Faults: {} invalid transitions, {} missing references, {} degenerate geometry",
            summary.stats.invalid_transitions, summary.stats.missing_references, summary.stats.degenerate_geometry
        );
    }
}

fn nearest_in_range(sim: &SimulationContext, from: Vec2, range: f32) -> Option<AgentId> {
    sim.agents
        .iter()
        .map(|a| (a.id, a.position.distance(from)))
        .filter(|&(_, d)| d <= range)
        .min_by(|a, b| a.1.total_cmp(&b.1).then(a.0.cmp(&b.0)))
        .map(|(id, _)| id)
}
