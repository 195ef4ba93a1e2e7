//! Tick system - runs one decision step for every agent and squad
//!
//! Order matters: every agent perceives before anyone decides, every agent
//! acts before squads coordinate, and cooldowns are only committed once
//! coordination has had its say over who fires.

use ahash::AHashMap;
use serde::{Deserialize, Serialize};

use crate::agent::{Agent, AgentRegistry};
use crate::behavior::{execute, AgentIntent, CombatModifiers, ExecutionContext, NeighborInfo};
use crate::coordination::{coordinate_squad, CoordinationContext};
use crate::core::config::StateMachineConfig;
use crate::core::types::{AgentId, Vec2};
use crate::difficulty::MetricKind;
use crate::fsm::{next_hop, select_state, DecisionInputs, StateContext, Transition};
use crate::perception::{apply_perception, sense, AllyReport, PlayerState};
use crate::simulation::context::{transition_agent, SimulationContext};
use crate::simulation::report::{SquadReport, TickReport};
use crate::spatial::SparseHashGrid;
use crate::squad::{dissolve_invalid, form_squads, SquadRegistry};

/// Host input for one tick
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TickInput {
    /// Seconds since the previous tick
    pub dt: f32,
    pub player: PlayerState,
    /// Player metric readings taken this tick
    #[serde(default)]
    pub metrics: Vec<(MetricKind, f32)>,
}

impl SimulationContext {
    /// Advance the decision core by one tick
    ///
    /// Phases:
    /// 1. Clock and attack cooldowns
    /// 2. Perception (allies' callouts come from last tick's memory)
    /// 3. Decision and at most one legal state hop per agent
    /// 4. Behavior execution into intents
    /// 5. Squad upkeep: dissolve invalid squads, form new ones
    /// 6. Squad coordination over the intents
    /// 7. Commit cooldowns, facing and velocity
    /// 8. Difficulty sampling, retune and adaptation layers
    pub fn tick(&mut self, input: &TickInput) -> TickReport {
        let dt = if input.dt.is_finite() { input.dt.max(0.0) } else { 0.0 };

        // Phase 1
        self.tick += 1;
        self.time += dt;
        let now = self.time;
        for agent in self.agents.iter_mut() {
            agent.attack_cooldown = (agent.attack_cooldown - dt).max(0.0);
        }

        // Phase 2
        self.perceive(&input.player, dt);

        // Phase 3
        let transitions = self.decide_all();

        // Phase 4
        let modifiers = self.difficulty.multipliers().combat_modifiers();
        let mut intents = self.execute_all(&input.player, modifiers, dt);

        // Phase 5
        let dissolved = dissolve_invalid(&mut self.agents, &mut self.squads, &self.config.formation);
        self.stats.missing_references += u64::from(dissolved.missing_references);
        let mut squads_dissolved = std::mem::take(&mut self.pending_dissolved);
        squads_dissolved.extend(dissolved.dissolved);
        let formed = form_squads(&mut self.agents, &mut self.squads, &self.config.formation, now);

        // Phase 6
        let squads = self.coordinate_all(&mut intents, modifiers);

        // Phase 7
        let intents = commit_intents(&mut self.agents, intents, self.config.coordination.suppress_interval_factor);

        // Phase 8
        self.difficulty.sample(&input.metrics);
        let retune = self.difficulty.update(dt);

        let mut report = TickReport {
            tick: self.tick,
            time: now,
            intents,
            transitions,
            squads_formed: formed,
            squads_dissolved,
            squads,
            casualties: std::mem::take(&mut self.pending_casualties),
            retune,
            difficulty: self.difficulty.difficulty(),
        };

        for layer in self.adaptation.iter_mut() {
            layer.observe(&report);
            let nudges = layer.propose();
            if !nudges.is_empty() {
                self.difficulty.apply_nudges(&nudges);
            }
        }
        report.difficulty = self.difficulty.difficulty();

        self.stats.ticks += 1;
        self.stats.squads_formed += report.squads_formed.len() as u64;
        self.stats.squads_dissolved += report.squads_dissolved.len() as u64;
        if report.retune.is_some() {
            self.stats.retunes += 1;
        }

        tracing::trace!(
            tick = report.tick,
            agents = report.intents.len(),
            squads = report.squads.len(),
            attacks = report.attacks(),
            "tick complete"
        );
        report
    }

    fn perceive(&mut self, player: &PlayerState, dt: f32) {
        let now = self.time;
        let ids = self.agents.sorted_ids();
        let allies: Vec<AllyReport> = ids
            .iter()
            .filter_map(|&id| self.agents.get(id))
            .map(AllyReport::from_agent)
            .collect();

        for id in ids {
            let Some(agent) = self.agents.get_mut(id) else {
                continue;
            };
            let result = sense(agent, player, &allies, &self.obstacles, now, dt, &self.config.perception);
            apply_perception(agent, &result, now);
        }
    }

    fn decide_all(&mut self) -> Vec<Transition> {
        let now = self.time;
        let mut transitions = Vec::new();

        for id in self.agents.sorted_ids() {
            let Some(agent) = self.agents.get_mut(id) else {
                continue;
            };

            if let Some(squad) = agent.squad_id() {
                if !squad_holds(&self.squads, squad, id) {
                    tracing::warn!(agent = %id, %squad, "dropping dangling squad reference");
                    agent.leave_squad();
                    self.stats.missing_references += 1;
                }
            }

            let desired = desired_state(agent, now, &self.config.state_machine);
            let Some(hop) = next_hop(agent.state(), desired) else {
                continue;
            };
            match transition_agent(agent, hop, now, &self.obstacles, &self.config.state_machine, &mut self.rng) {
                Ok(transition) => {
                    tracing::debug!(agent = %id, from = transition.from.label(), to = transition.to.label(), "state changed");
                    transitions.push(transition);
                }
                Err(_) => self.stats.invalid_transitions += 1,
            }
        }

        transitions
    }

    fn execute_all(
        &mut self,
        player: &PlayerState,
        modifiers: CombatModifiers,
        dt: f32,
    ) -> AHashMap<AgentId, AgentIntent> {
        let now = self.time;
        let behavior = &self.config.behavior;
        let radius = behavior.ally_radius.max(behavior.support_search_radius);

        let snapshot: AHashMap<AgentId, NeighborInfo> = self
            .agents
            .iter()
            .map(|a| {
                let info = NeighborInfo {
                    id: a.id,
                    position: a.position,
                    velocity: a.velocity,
                    health_ratio: a.health_ratio(),
                };
                (a.id, info)
            })
            .collect();
        let mut grid = SparseHashGrid::new(radius.max(1.0));
        grid.rebuild(snapshot.values().map(|n| (n.id, n.position)));

        let mut intents = AHashMap::with_capacity(snapshot.len());
        for id in self.agents.sorted_ids() {
            let Some(agent) = self.agents.get_mut(id) else {
                continue;
            };
            let neighbors: Vec<NeighborInfo> = grid
                .query_radius(agent.position, radius)
                .into_iter()
                .filter(|&(other, _)| other != id)
                .filter_map(|(other, _)| snapshot.get(&other).copied())
                .collect();

            let ctx = ExecutionContext {
                config: behavior,
                retreat_distance: self.config.state_machine.retreat_distance,
                obstacles: &self.obstacles,
                pathfinder: self.pathfinder.as_ref(),
                player,
                neighbors: &neighbors,
                modifiers,
                now,
                dt,
            };

            let intent = match execute(agent, &ctx) {
                Ok(intent) => intent,
                Err(err) => {
                    tracing::warn!(agent = %id, error = %err, "behavior failed, holding position");
                    self.stats.behavior_fallbacks += 1;
                    self.stats.degenerate_geometry += 1;
                    AgentIntent::fallback(agent)
                }
            };
            intents.insert(id, intent);
        }

        intents
    }

    fn coordinate_all(
        &mut self,
        intents: &mut AHashMap<AgentId, AgentIntent>,
        modifiers: CombatModifiers,
    ) -> Vec<SquadReport> {
        let ctx = CoordinationContext {
            config: &self.config.coordination,
            formation: &self.config.formation,
            behavior: &self.config.behavior,
            modifiers,
            target_memory: self.config.state_machine.search_memory,
            now: self.time,
        };

        let mut reports = Vec::with_capacity(self.squads.len());
        for id in self.squads.sorted_ids() {
            let Some(squad) = self.squads.get_mut(id) else {
                continue;
            };
            let outcome = coordinate_squad(squad, &mut self.agents, intents, &ctx);
            self.stats.degenerate_geometry += u64::from(outcome.degenerate_geometry);

            reports.push(SquadReport {
                squad: id,
                leader: squad.leader(),
                size: squad.size(),
                formation: squad.formation,
                state: squad.state,
                tactic: outcome.tactic,
                volley: outcome.volley,
            });
        }
        reports
    }
}

fn squad_holds(squads: &SquadRegistry, squad: crate::core::types::SquadId, member: AgentId) -> bool {
    squads.get(squad).is_some_and(|s| s.contains(member))
}

/// Where the decision rules want this agent to be
fn desired_state(agent: &Agent, now: f32, config: &StateMachineConfig) -> crate::fsm::AgentState {
    let seen = agent.memory.seen_within(now, config.memory_window);
    let visible_target_distance = agent
        .memory
        .last_known
        .filter(|_| seen)
        .map(|t| agent.position.distance(t));

    let inputs = DecisionInputs {
        current: agent.state(),
        health_ratio: agent.health_ratio(),
        alert_level: agent.alert_level,
        visible_target_distance,
        has_patrol_route: agent.patrols,
    };
    let context = StateContext {
        search_lead: !seen && agent.memory.age(now).is_some_and(|age| age <= config.search_memory),
        search_exhausted: agent.scratch.search_exhausted(),
        directive: agent.directive.map(|d| d.state),
    };

    select_state(&inputs, &context, config)
}

/// Start cooldowns for the attacks that survived coordination
fn commit_intents(
    agents: &mut AgentRegistry,
    intents: AHashMap<AgentId, AgentIntent>,
    suppress_interval_factor: f32,
) -> Vec<AgentIntent> {
    let mut intents: Vec<AgentIntent> = intents.into_values().collect();
    intents.sort_by_key(|i| i.agent);

    for intent in &intents {
        let Some(agent) = agents.get_mut(intent.agent) else {
            continue;
        };
        if let Some(attack) = intent.attack {
            let interval = agent.stats.attack_interval;
            agent.attack_cooldown = if attack.suppressive {
                interval * suppress_interval_factor.max(0.0)
            } else {
                interval
            };
        }
        agent.facing = intent.facing;
        agent.velocity = if intent.velocity.is_finite() { intent.velocity } else { Vec2::ZERO };
    }

    intents
}
