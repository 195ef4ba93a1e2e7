//! Simulation context - owns every registry the decision core mutates
//!
//! There are no globals: agents, squads, the difficulty controller, the
//! obstacle list and the RNG all live here and are handed to each phase.

use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

use crate::agent::{Agent, AgentRegistry, Archetype, HitRecord};
use crate::behavior::{AgentIntent, DirectPathfinder, Pathfinder};
use crate::core::config::AiConfig;
use crate::core::error::{AiError, Result};
use crate::core::types::{Aabb, AgentId, SquadId, Tick, Vec2};
use crate::difficulty::{AdaptationLayer, DifficultyController};
use crate::fsm::{on_enter, on_exit, AgentState, Transition};
use crate::simulation::report::SimulationStats;
use crate::squad::{assign_slots, detach_member, select_formation, Formation, Squad, SquadRegistry};

/// Host request to create an agent
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct SpawnRequest {
    pub archetype: Archetype,
    pub position: Vec2,
    #[serde(default)]
    pub facing: f32,
}

/// Host-authoritative state pushed into an agent; `None` fields are left alone
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct AgentUpdate {
    pub position: Option<Vec2>,
    pub velocity: Option<Vec2>,
    pub facing: Option<f32>,
    pub health: Option<f32>,
}

pub struct SimulationContext {
    pub config: AiConfig,
    pub agents: AgentRegistry,
    pub squads: SquadRegistry,
    pub difficulty: DifficultyController,
    pub(crate) obstacles: Vec<Aabb>,
    pub(crate) pathfinder: Box<dyn Pathfinder>,
    pub(crate) adaptation: Vec<Box<dyn AdaptationLayer>>,
    pub(crate) rng: ChaCha8Rng,
    pub(crate) tick: Tick,
    pub(crate) time: f32,
    pub(crate) stats: SimulationStats,
    /// Deaths not yet reported by a tick
    pub(crate) pending_casualties: Vec<AgentId>,
    /// Squads dissolved outside a tick, not yet reported
    pub(crate) pending_dissolved: Vec<SquadId>,
}

impl SimulationContext {
    /// Validate the config and build an empty context
    pub fn new(config: AiConfig, seed: u64) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            difficulty: DifficultyController::new(config.difficulty.clone()),
            config,
            agents: AgentRegistry::new(),
            squads: SquadRegistry::new(),
            obstacles: Vec::new(),
            pathfinder: Box::new(DirectPathfinder),
            adaptation: Vec::new(),
            rng: ChaCha8Rng::seed_from_u64(seed),
            tick: 0,
            time: 0.0,
            stats: SimulationStats::default(),
            pending_casualties: Vec::new(),
            pending_dissolved: Vec::new(),
        })
    }

    pub fn with_pathfinder(mut self, pathfinder: Box<dyn Pathfinder>) -> Self {
        self.pathfinder = pathfinder;
        self
    }

    pub fn add_adaptation_layer(&mut self, layer: Box<dyn AdaptationLayer>) {
        self.adaptation.push(layer);
    }

    /// Replace the static obstacle list
    pub fn set_obstacles(&mut self, obstacles: Vec<Aabb>) {
        self.obstacles = obstacles;
    }

    pub fn obstacles(&self) -> &[Aabb] {
        &self.obstacles
    }

    pub fn current_tick(&self) -> Tick {
        self.tick
    }

    /// Simulation time in seconds
    pub fn time(&self) -> f32 {
        self.time
    }

    pub fn stats(&self) -> SimulationStats {
        self.stats
    }

    pub fn agent(&self, id: AgentId) -> Option<&Agent> {
        self.agents.get(id)
    }

    /// The agent's squad, `None` when it is ungrouped
    pub fn squad_of(&self, id: AgentId) -> Result<Option<&Squad>> {
        let agent = self.agents.get(id).ok_or(AiError::AgentNotFound(id))?;
        match agent.squad_id() {
            None => Ok(None),
            Some(squad) => self
                .squads
                .get(squad)
                .map(Some)
                .ok_or_else(|| AiError::MissingReference(format!("{} links to {}", id, squad))),
        }
    }

    /// Pin a squad's formation, or hand it back to automatic selection with `None`
    pub fn override_formation(&mut self, id: SquadId, formation: Option<Formation>) -> Result<()> {
        let squad = self.squads.get_mut(id).ok_or(AiError::SquadNotFound(id))?;
        match formation {
            Some(formation) => squad.override_formation(formation),
            None => {
                squad.clear_formation_override();
                let archetypes: Vec<Archetype> = squad
                    .members()
                    .iter()
                    .filter_map(|&m| self.agents.get(m))
                    .map(|a| a.archetype)
                    .collect();
                squad.formation = select_formation(&archetypes);
            }
        }
        assign_slots(squad, &mut self.agents, self.config.formation.slot_spacing);
        Ok(())
    }

    /// Create an agent; enemy health is scaled by the current difficulty
    pub fn spawn_agent(&mut self, request: &SpawnRequest) -> AgentId {
        let id = self.agents.allocate_id();
        let mut stats = request.archetype.stats();
        stats.max_health *= self.difficulty.multipliers().health;

        let agent = Agent::new(id, request.archetype, stats, request.position, request.facing, self.time);
        tracing::debug!(agent = %id, archetype = request.archetype.label(), "agent spawned");
        self.agents.insert(agent);
        id
    }

    /// Remove an agent, releasing it from its squad in the same call
    pub fn despawn_agent(&mut self, id: AgentId) -> Result<Agent> {
        let squad = self.agents.get(id).ok_or(AiError::AgentNotFound(id))?.squad_id();
        if let Some(squad) = squad {
            if detach_member(&mut self.agents, &mut self.squads, squad, id, &self.config.formation) {
                self.pending_dissolved.push(squad);
            }
        }
        let agent = self.agents.remove(id).ok_or(AiError::AgentNotFound(id))?;
        tracing::debug!(agent = %id, "agent despawned");
        Ok(agent)
    }

    /// Damage an agent; returns true if it died (and was removed)
    pub fn apply_hit(&mut self, id: AgentId, damage: f32, source: Vec2) -> Result<bool> {
        let now = self.time;
        let agent = self.agents.get_mut(id).ok_or(AiError::AgentNotFound(id))?;
        let damage = if damage.is_finite() { damage.max(0.0) } else { 0.0 };
        agent.health -= damage;
        agent.last_hit = Some(HitRecord { at: now, damage, source });

        if agent.is_alive() {
            return Ok(false);
        }
        self.kill(id)?;
        Ok(true)
    }

    /// Push host-authoritative position/health into an agent
    pub fn sync_agent(&mut self, id: AgentId, update: &AgentUpdate) -> Result<()> {
        let agent = self.agents.get_mut(id).ok_or(AiError::AgentNotFound(id))?;
        if let Some(position) = update.position.filter(|p| p.is_finite()) {
            agent.position = position;
        }
        if let Some(velocity) = update.velocity.filter(|v| v.is_finite()) {
            agent.velocity = velocity;
        }
        if let Some(facing) = update.facing.filter(|f| f.is_finite()) {
            agent.facing = facing;
        }
        if let Some(health) = update.health.filter(|h| !h.is_nan()) {
            agent.health = health.min(agent.stats.max_health);
        }

        if !agent.is_alive() {
            self.kill(id)?;
        }
        Ok(())
    }

    fn kill(&mut self, id: AgentId) -> Result<()> {
        self.despawn_agent(id)?;
        self.stats.casualties += 1;
        self.pending_casualties.push(id);
        Ok(())
    }

    /// Despawn every agent further than `despawn_distance` from the player
    pub fn cleanup_distant(&mut self, player_position: Vec2) -> Vec<AgentId> {
        let limit = self.config.simulation.despawn_distance;
        let far: Vec<AgentId> = self
            .agents
            .sorted_ids()
            .into_iter()
            .filter(|&id| {
                self.agents
                    .get(id)
                    .is_some_and(|a| a.position.distance(player_position) > limit)
            })
            .collect();

        far.into_iter().filter(|&id| self.despawn_agent(id).is_ok()).collect()
    }

    /// Strict transition request from outside the tick
    ///
    /// Illegal targets are counted and rejected; the state is unchanged.
    pub fn request_transition(&mut self, id: AgentId, to: AgentState) -> Result<Transition> {
        let agent = self.agents.get_mut(id).ok_or(AiError::AgentNotFound(id))?;
        let result = transition_agent(
            agent,
            to,
            self.time,
            &self.obstacles,
            &self.config.state_machine,
            &mut self.rng,
        );
        if result.is_err() {
            self.stats.invalid_transitions += 1;
        }
        result
    }

    /// Move agents along their intents; for hosts without their own physics
    pub fn apply_intents(&mut self, intents: &[AgentIntent], dt: f32) {
        let dt = if dt.is_finite() { dt.max(0.0) } else { 0.0 };
        for intent in intents {
            if let Some(agent) = self.agents.get_mut(intent.agent) {
                agent.velocity = intent.velocity;
                agent.facing = intent.facing;
                agent.position += intent.velocity * dt;
            }
        }
    }
}

/// Request a transition and run the exit/entry hooks if it was legal
pub(crate) fn transition_agent(
    agent: &mut Agent,
    to: AgentState,
    now: f32,
    obstacles: &[Aabb],
    config: &crate::core::config::StateMachineConfig,
    rng: &mut ChaCha8Rng,
) -> Result<Transition> {
    let transition = agent.machine.request(agent.id, to, now)?;
    on_exit(agent, transition.from, now);
    let threat = agent.memory.last_known;
    on_enter(agent, to, threat, obstacles, config, rng);
    Ok(transition)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn context() -> SimulationContext {
        SimulationContext::new(AiConfig::default(), 7).expect("default config is valid")
    }

    fn spawn(ctx: &mut SimulationContext, archetype: Archetype, position: Vec2) -> AgentId {
        ctx.spawn_agent(&SpawnRequest {
            archetype,
            position,
            facing: 0.0,
        })
    }

    #[test]
    fn test_spawn_and_despawn() {
        let mut ctx = context();
        let id = spawn(&mut ctx, Archetype::Grunt, Vec2::ZERO);
        assert!(ctx.agent(id).is_some());
        assert!(ctx.despawn_agent(id).is_ok());
        assert!(matches!(ctx.despawn_agent(id), Err(AiError::AgentNotFound(_))));
    }

    #[test]
    fn test_lethal_hit_removes_agent() {
        let mut ctx = context();
        let id = spawn(&mut ctx, Archetype::Scout, Vec2::ZERO);
        assert!(!ctx.apply_hit(id, 10.0, Vec2::ONE).unwrap());
        assert!(ctx.apply_hit(id, 500.0, Vec2::ONE).unwrap());
        assert!(ctx.agent(id).is_none());
        assert_eq!(ctx.stats().casualties, 1);
    }

    #[test]
    fn test_strict_request_counts_invalid() {
        let mut ctx = context();
        let id = spawn(&mut ctx, Archetype::Grunt, Vec2::ZERO);
        assert!(ctx.request_transition(id, AgentState::Combat).is_err());
        assert_eq!(ctx.agent(id).unwrap().state(), AgentState::Idle);
        assert_eq!(ctx.stats().invalid_transitions, 1);

        let t = ctx.request_transition(id, AgentState::Patrol).unwrap();
        assert_eq!(t.to, AgentState::Patrol);
        assert!(!ctx.agent(id).unwrap().scratch.patrol_route.is_empty());
    }

    #[test]
    fn test_cleanup_distant() {
        let mut ctx = context();
        let near = spawn(&mut ctx, Archetype::Grunt, Vec2::new(100.0, 0.0));
        let far = spawn(&mut ctx, Archetype::Grunt, Vec2::new(2000.0, 0.0));
        assert_eq!(ctx.cleanup_distant(Vec2::ZERO), vec![far]);
        assert!(ctx.agent(near).is_some());
    }

    #[test]
    fn test_sync_to_zero_health_kills() {
        let mut ctx = context();
        let id = spawn(&mut ctx, Archetype::Grunt, Vec2::ZERO);
        ctx.sync_agent(
            id,
            &AgentUpdate {
                position: Some(Vec2::new(5.0, 5.0)),
                health: Some(0.0),
                ..Default::default()
            },
        )
        .unwrap();
        assert!(ctx.agent(id).is_none());
    }

    #[test]
    fn test_formation_override_round_trip() {
        let mut ctx = context();
        let ids: Vec<AgentId> = [0.0, 20.0, 40.0]
            .into_iter()
            .map(|x| spawn(&mut ctx, Archetype::Grunt, Vec2::new(x, 0.0)))
            .collect();
        crate::squad::form_squads(&mut ctx.agents, &mut ctx.squads, &ctx.config.formation, 0.0);
        let squad = ctx.squad_of(ids[0]).unwrap().unwrap().id;

        ctx.override_formation(squad, Some(Formation::Circle)).unwrap();
        assert_eq!(ctx.squads.get(squad).unwrap().formation, Formation::Circle);
        ctx.override_formation(squad, None).unwrap();
        assert_eq!(ctx.squads.get(squad).unwrap().formation, Formation::Line);

        assert!(matches!(
            ctx.override_formation(SquadId(99), None),
            Err(AiError::SquadNotFound(_))
        ));
    }

    #[test]
    fn test_dangling_squad_link_is_reported() {
        let mut ctx = context();
        let id = spawn(&mut ctx, Archetype::Grunt, Vec2::ZERO);
        assert!(ctx.squad_of(id).unwrap().is_none());

        ctx.agents.get_mut(id).unwrap().squad = Some(crate::agent::SquadLink {
            squad: SquadId(7),
            role: crate::agent::SquadRole::Follower,
            slot_offset: Vec2::ZERO,
        });
        assert!(matches!(ctx.squad_of(id), Err(AiError::MissingReference(_))));
    }

    #[test]
    fn test_spawn_health_scaled_by_difficulty() {
        let mut ctx = context();
        ctx.difficulty.set_manual_difficulty(2.0);
        let id = spawn(&mut ctx, Archetype::Grunt, Vec2::ZERO);
        assert!(ctx.agent(id).unwrap().stats.max_health > Archetype::Grunt.stats().max_health);
    }
}
