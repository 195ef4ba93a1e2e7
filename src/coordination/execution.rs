//! Per-squad coordination pass
//!
//! Runs after every member's behavior has produced an intent. Issues squad
//! directives for the next decision, then rewrites this tick's intents:
//! suppressive fire, volley gating, slot pull and flocking, in that order.

use ahash::AHashMap;
use serde::{Deserialize, Serialize};

use crate::agent::{AgentRegistry, SquadDirective};
use crate::behavior::{make_attack, AgentIntent, AttackIntent, CombatModifiers};
use crate::coordination::flocking::{flocking_force, Boid};
use crate::coordination::tactics::{
    away_bearing, flank_points, flank_side, is_covering, retreat_point, select_tactic, SquadTactic,
};
use crate::core::config::{BehaviorConfig, CoordinationConfig, FormationConfig};
use crate::core::types::{heading, AgentId, Vec2};
use crate::fsm::AgentState;
use crate::squad::{compute_slot_targets, slot_steering, Squad};

pub struct CoordinationContext<'a> {
    pub config: &'a CoordinationConfig,
    pub formation: &'a FormationConfig,
    pub behavior: &'a BehaviorConfig,
    pub modifiers: CombatModifiers,
    /// Oldest last-known position the squad still acts on
    pub target_memory: f32,
    pub now: f32,
}

/// Outcome of a synchronized-attack check
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Volley {
    Fired,
    Held,
}

#[derive(Debug, Clone, Default)]
pub struct CoordinationOutcome {
    pub tactic: Option<SquadTactic>,
    pub target: Option<Vec2>,
    pub volley: Option<Volley>,
    pub suppressors: Vec<AgentId>,
    pub degenerate_geometry: u32,
}

/// Coordinate one squad for this tick
pub fn coordinate_squad(
    squad: &mut Squad,
    agents: &mut AgentRegistry,
    intents: &mut AHashMap<AgentId, AgentIntent>,
    ctx: &CoordinationContext,
) -> CoordinationOutcome {
    let mut outcome = CoordinationOutcome::default();
    squad.refresh_metrics(agents, ctx.formation.formation_distance);

    for &member in squad.members() {
        if let Some(agent) = agents.get_mut(member) {
            agent.suppressing = false;
        }
    }

    let target = squad.shared_target(agents, ctx.now, ctx.target_memory);
    outcome.target = target;

    match target.and_then(|t| select_tactic(squad, t, ctx.config).map(|tactic| (t, tactic))) {
        Some((target, tactic)) => {
            if squad.tactic != Some(tactic) {
                tracing::debug!(squad = %squad.id, tactic = tactic.label(), "squad tactic changed");
            }
            squad.set_tactic(tactic, ctx.now);
            issue_directives(squad, agents, tactic, target, ctx);
            outcome.tactic = Some(tactic);
        }
        None => {
            squad.tactic = None;
            for &member in squad.members() {
                if let Some(agent) = agents.get_mut(member) {
                    agent.directive = None;
                }
            }
        }
    }

    if let Some(target) = target {
        outcome.suppressors = suppressive_overlay(squad, agents, intents, target, ctx);
        if outcome.tactic == Some(SquadTactic::SynchronizedAttack) {
            outcome.volley = synchronize_volley(squad, agents, intents, target, &outcome.suppressors, ctx);
        }
    }

    apply_slot_forces(squad, agents, intents, target, ctx);
    outcome.degenerate_geometry += apply_flocking(squad, agents, intents, ctx);

    for &member in squad.members() {
        if let (Some(agent), Some(intent)) = (agents.get(member), intents.get_mut(&member)) {
            let max_speed = agent.stats.speed * ctx.modifiers.speed.max(0.0);
            intent.velocity = intent.velocity.clamp_length_max(max_speed);
        }
    }

    outcome
}

fn issue_directives(
    squad: &Squad,
    agents: &mut AgentRegistry,
    tactic: SquadTactic,
    target: Vec2,
    ctx: &CoordinationContext,
) {
    let members = squad.members();
    let size = members.len();
    let (leader_position, leader_facing) = agents
        .get(squad.leader())
        .map_or((squad.centroid, 0.0), |a| (a.position, a.facing));

    let flanks = flank_points(squad.centroid, target, leader_facing, ctx.config);
    let bearing = away_bearing(squad.centroid, target, leader_facing);
    let regroup = squad.centroid.distance(target) > ctx.config.regroup_distance;
    let elapsed = ctx.now - squad.tactic_since;

    for (index, &member) in members.iter().enumerate() {
        let Some(agent) = agents.get_mut(member) else {
            continue;
        };

        agent.directive = match tactic {
            SquadTactic::SynchronizedAttack => None,
            SquadTactic::FlankingManeuver => Some(SquadDirective {
                state: AgentState::Flank,
                target: Some(flanks[flank_side(index, size)]),
            }),
            SquadTactic::CoverAndAdvance if is_covering(index, elapsed, ctx.config) => Some(SquadDirective {
                state: AgentState::Cover,
                target: None,
            }),
            SquadTactic::CoverAndAdvance => Some(SquadDirective {
                state: AgentState::Chase,
                target: Some(target),
            }),
            SquadTactic::TacticalRetreat if regroup => Some(SquadDirective {
                state: AgentState::Regroup,
                target: Some(leader_position),
            }),
            SquadTactic::TacticalRetreat => Some(SquadDirective {
                state: AgentState::Retreat,
                target: Some(retreat_point(agent.position, bearing, index, size, ctx.config)),
            }),
        };
    }
}

/// Sniper/heavy members inside their band hold still and lay down fire
fn suppressive_overlay(
    squad: &Squad,
    agents: &mut AgentRegistry,
    intents: &mut AHashMap<AgentId, AgentIntent>,
    target: Vec2,
    ctx: &CoordinationContext,
) -> Vec<AgentId> {
    let mut suppressors = Vec::new();

    for &member in squad.members() {
        let Some(agent) = agents.get_mut(member) else {
            continue;
        };
        let Some((near, far)) = agent.archetype.suppression_band() else {
            continue;
        };
        if !agent.is_alive() || !agent.state().is_engaged() {
            continue;
        }
        let distance = agent.position.distance(target);
        if distance < near || distance > far {
            continue;
        }
        let Some(intent) = intents.get_mut(&member) else {
            continue;
        };

        agent.suppressing = true;
        intent.velocity = Vec2::ZERO;
        intent.facing = heading(target - agent.position).unwrap_or(intent.facing);
        intent.attack = (agent.attack_cooldown <= 0.0).then(|| AttackIntent {
            accuracy: (ctx.behavior.base_accuracy * ctx.modifiers.accuracy * ctx.config.suppress_accuracy_factor)
                .clamp(0.0, 1.0),
            suppressive: true,
            ..make_attack(agent, target, ctx.modifiers, ctx.behavior.base_accuracy)
        });
        suppressors.push(member);
    }

    suppressors
}

/// All in-range members fire together or nobody does
fn synchronize_volley(
    squad: &Squad,
    agents: &mut AgentRegistry,
    intents: &mut AHashMap<AgentId, AgentIntent>,
    target: Vec2,
    suppressors: &[AgentId],
    ctx: &CoordinationContext,
) -> Option<Volley> {
    let cohort: Vec<AgentId> = squad
        .members()
        .iter()
        .copied()
        .filter(|m| !suppressors.contains(m) && intents.contains_key(m))
        .filter(|&m| {
            agents.get(m).is_some_and(|a| {
                a.is_alive()
                    && a.state().is_engaged()
                    && a.memory.seen_within(ctx.now, 0.0)
                    && a.position.distance(target) <= a.stats.attack_range
            })
        })
        .collect();
    if cohort.is_empty() {
        return None;
    }

    let grace = ctx.config.sync_grace;
    let ready = cohort
        .iter()
        .all(|&m| agents.get(m).is_some_and(|a| a.attack_cooldown <= grace));

    for &member in &cohort {
        let (Some(agent), Some(intent)) = (agents.get_mut(member), intents.get_mut(&member)) else {
            continue;
        };
        if ready {
            intent.attack = Some(make_attack(agent, target, ctx.modifiers, ctx.behavior.base_accuracy));
        } else {
            intent.attack = None;
            agent.attack_cooldown = agent.attack_cooldown.max(grace);
        }
    }

    Some(if ready { Volley::Fired } else { Volley::Held })
}

fn follows_slot(state: AgentState) -> bool {
    matches!(
        state,
        AgentState::Idle
            | AgentState::Patrol
            | AgentState::Alert
            | AgentState::Investigate
            | AgentState::Chase
            | AgentState::Combat
            | AgentState::Search
            | AgentState::Support
    )
}

fn apply_slot_forces(
    squad: &Squad,
    agents: &AgentRegistry,
    intents: &mut AHashMap<AgentId, AgentIntent>,
    target: Option<Vec2>,
    ctx: &CoordinationContext,
) {
    let slots = compute_slot_targets(squad, agents, target, ctx.formation.slot_spacing);

    for &member in squad.members().iter().skip(1) {
        let (Some(agent), Some(intent), Some(&slot)) = (agents.get(member), intents.get_mut(&member), slots.get(&member))
        else {
            continue;
        };
        if agent.suppressing || !follows_slot(agent.state()) || agent.directive.is_some_and(|d| d.target.is_some()) {
            continue;
        }
        let speed = agent.stats.speed * ctx.modifiers.speed.max(0.0);
        intent.velocity += slot_steering(agent.position, slot, speed, ctx.formation);
    }
}

fn apply_flocking(
    squad: &Squad,
    agents: &AgentRegistry,
    intents: &mut AHashMap<AgentId, AgentIntent>,
    ctx: &CoordinationContext,
) -> u32 {
    let flock: Vec<Boid> = squad
        .members()
        .iter()
        .filter_map(|&m| {
            let agent = agents.get(m)?;
            let velocity = intents.get(&m).map_or(agent.velocity, |i| i.velocity);
            Some(Boid {
                id: m,
                position: agent.position,
                velocity,
            })
        })
        .collect();

    let forces: Vec<(AgentId, Vec2, u32)> = flock
        .iter()
        .filter_map(|boid| {
            let agent = agents.get(boid.id)?;
            if agent.suppressing {
                return None;
            }
            let speed = agent.stats.speed * ctx.modifiers.speed.max(0.0);
            let (force, degenerate) = flocking_force(boid, &flock, speed, ctx.config);
            Some((boid.id, force, degenerate))
        })
        .collect();

    let mut degenerate_total = 0;
    for (id, force, degenerate) in forces {
        degenerate_total += degenerate;
        if let Some(intent) = intents.get_mut(&id) {
            intent.velocity += force;
        }
    }
    degenerate_total
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::{Agent, Archetype};
    use crate::behavior::Behavior;
    use crate::core::types::SquadId;
    use crate::squad::Formation;

    struct Fixture {
        agents: AgentRegistry,
        intents: AHashMap<AgentId, AgentIntent>,
        coordination: CoordinationConfig,
        formation: FormationConfig,
        behavior: BehaviorConfig,
    }

    impl Fixture {
        fn new() -> Self {
            Self {
                agents: AgentRegistry::new(),
                intents: AHashMap::new(),
                coordination: CoordinationConfig::default(),
                formation: FormationConfig::default(),
                behavior: BehaviorConfig::default(),
            }
        }

        /// Engaged agent that saw the target at `now`
        fn add(&mut self, archetype: Archetype, position: Vec2, target: Vec2, now: f32) -> AgentId {
            let id = self.agents.allocate_id();
            let mut agent = Agent::new(id, archetype, archetype.stats(), position, 0.0, 0.0);
            for state in [AgentState::Alert, AgentState::Combat] {
                agent.machine.request(id, state, 0.0).unwrap();
            }
            agent.memory.record_sighting(target, now);
            self.intents.insert(
                id,
                AgentIntent {
                    agent: id,
                    velocity: Vec2::ZERO,
                    facing: 0.0,
                    attack: None,
                    state: AgentState::Combat,
                    behavior: Behavior::Hold,
                },
            );
            self.agents.insert(agent);
            id
        }

        fn squad(&self, ids: &[AgentId]) -> Squad {
            Squad::new(SquadId(1), ids[0], ids, Formation::Line, 0.0)
        }

        fn run(&mut self, squad: &mut Squad, now: f32) -> CoordinationOutcome {
            let ctx = CoordinationContext {
                config: &self.coordination,
                formation: &self.formation,
                behavior: &self.behavior,
                modifiers: CombatModifiers::default(),
                target_memory: 5.0,
                now,
            };
            coordinate_squad(squad, &mut self.agents, &mut self.intents, &ctx)
        }
    }

    fn link(fx: &mut Fixture, squad: &Squad) {
        crate::squad::assign_slots(squad, &mut fx.agents, fx.formation.slot_spacing);
    }

    #[test]
    fn test_volley_held_until_everyone_ready() {
        let mut fx = Fixture::new();
        let target = Vec2::new(60.0, 0.0);
        let ids: Vec<AgentId> = (0..3)
            .map(|i| fx.add(Archetype::Grunt, Vec2::new(0.0, i as f32 * 20.0), target, 1.0))
            .collect();
        fx.agents.get_mut(ids[2]).unwrap().attack_cooldown = 0.5;
        let mut squad = fx.squad(&ids);
        link(&mut fx, &squad);

        let outcome = fx.run(&mut squad, 1.0);
        assert_eq!(outcome.tactic, Some(SquadTactic::SynchronizedAttack));
        assert_eq!(outcome.volley, Some(Volley::Held));
        assert!(ids.iter().all(|id| fx.intents[id].attack.is_none()));
        assert!(ids.iter().all(|id| fx.agents.get(*id).unwrap().attack_cooldown >= fx.coordination.sync_grace));
    }

    #[test]
    fn test_volley_fires_inside_grace() {
        let mut fx = Fixture::new();
        let target = Vec2::new(60.0, 0.0);
        let ids: Vec<AgentId> = (0..3)
            .map(|i| fx.add(Archetype::Grunt, Vec2::new(0.0, i as f32 * 20.0), target, 1.0))
            .collect();
        fx.agents.get_mut(ids[1]).unwrap().attack_cooldown = 0.05;
        let mut squad = fx.squad(&ids);
        link(&mut fx, &squad);

        let outcome = fx.run(&mut squad, 1.0);
        assert_eq!(outcome.volley, Some(Volley::Fired));
        assert!(ids.iter().all(|id| fx.intents[id].attack.is_some()));
    }

    #[test]
    fn test_low_health_retreats_despite_sync_distance() {
        let mut fx = Fixture::new();
        let target = Vec2::new(60.0, 0.0);
        let ids: Vec<AgentId> = (0..3)
            .map(|i| fx.add(Archetype::Grunt, Vec2::new(0.0, i as f32 * 20.0), target, 1.0))
            .collect();
        for id in &ids {
            fx.agents.get_mut(*id).unwrap().health = 30.0;
        }
        let mut squad = fx.squad(&ids);
        link(&mut fx, &squad);

        let outcome = fx.run(&mut squad, 1.0);
        assert_eq!(outcome.tactic, Some(SquadTactic::TacticalRetreat));
        for id in &ids {
            let directive = fx.agents.get(*id).unwrap().directive.unwrap();
            assert_eq!(directive.state, AgentState::Retreat);
            // Away from the target
            assert!(directive.target.unwrap().x < 0.0);
        }
    }

    #[test]
    fn test_flankers_split_left_and_right() {
        let mut fx = Fixture::new();
        let target = Vec2::new(150.0, 0.0);
        let ids: Vec<AgentId> = (0..4)
            .map(|i| fx.add(Archetype::Grunt, Vec2::new(0.0, i as f32 * 10.0 - 15.0), target, 1.0))
            .collect();
        let mut squad = fx.squad(&ids);
        link(&mut fx, &squad);

        let outcome = fx.run(&mut squad, 1.0);
        assert_eq!(outcome.tactic, Some(SquadTactic::FlankingManeuver));
        let spots: Vec<Vec2> = ids
            .iter()
            .map(|id| fx.agents.get(*id).unwrap().directive.unwrap().target.unwrap())
            .collect();
        assert_eq!(spots[0], spots[1]);
        assert_eq!(spots[2], spots[3]);
        assert!(spots[0].y * spots[2].y < 0.0);
    }

    #[test]
    fn test_sniper_suppresses_in_band() {
        let mut fx = Fixture::new();
        let target = Vec2::new(300.0, 0.0);
        let sniper = fx.add(Archetype::Sniper, Vec2::ZERO, target, 1.0);
        let grunt = fx.add(Archetype::Grunt, Vec2::new(0.0, 30.0), target, 1.0);
        fx.intents.get_mut(&sniper).unwrap().velocity = Vec2::new(50.0, 0.0);
        let mut squad = fx.squad(&[sniper, grunt]);
        link(&mut fx, &squad);

        let outcome = fx.run(&mut squad, 1.0);
        assert_eq!(outcome.suppressors, vec![sniper]);
        let intent = &fx.intents[&sniper];
        let attack = intent.attack.unwrap();
        assert!(attack.suppressive);
        assert!(attack.accuracy < fx.behavior.base_accuracy);
        assert!(fx.agents.get(sniper).unwrap().suppressing);
    }

    #[test]
    fn test_no_target_clears_directives() {
        let mut fx = Fixture::new();
        let a = fx.add(Archetype::Grunt, Vec2::ZERO, Vec2::new(50.0, 0.0), 0.0);
        let b = fx.add(Archetype::Grunt, Vec2::new(10.0, 0.0), Vec2::new(50.0, 0.0), 0.0);
        fx.agents.get_mut(a).unwrap().directive = Some(SquadDirective {
            state: AgentState::Flank,
            target: None,
        });
        let mut squad = fx.squad(&[a, b]);
        link(&mut fx, &squad);

        // Memory is 20s old, past the 5s window
        let outcome = fx.run(&mut squad, 20.0);
        assert!(outcome.tactic.is_none());
        assert!(fx.agents.get(a).unwrap().directive.is_none());
    }

    #[test]
    fn test_velocities_stay_within_speed() {
        let mut fx = Fixture::new();
        let target = Vec2::new(500.0, 0.0);
        let ids: Vec<AgentId> = (0..3)
            .map(|i| fx.add(Archetype::Grunt, Vec2::new(i as f32 * 3.0, 0.0), target, 1.0))
            .collect();
        for id in &ids {
            fx.intents.get_mut(id).unwrap().velocity = Vec2::new(90.0, 0.0);
        }
        let mut squad = fx.squad(&ids);
        link(&mut fx, &squad);
        fx.run(&mut squad, 1.0);

        for id in &ids {
            assert!(fx.intents[id].velocity.length() <= Archetype::Grunt.stats().speed + 1e-3);
        }
    }
}
