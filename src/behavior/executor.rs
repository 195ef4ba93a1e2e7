//! Behavior executor - turns a state into velocity, facing and attack intent

use serde::{Deserialize, Serialize};

use crate::agent::Agent;
use crate::behavior::combat::{find_cover_point, select_combat_tactic, standoff_distance, CombatTactic};
use crate::behavior::pathing::{next_waypoint, Pathfinder};
use crate::behavior::steering::{arrive, avoid_obstacles, flee, hold_range, pursuit, seek};
use crate::core::config::BehaviorConfig;
use crate::core::error::{AiError, Result};
use crate::core::types::{heading, rotate, Aabb, AgentId, Vec2};
use crate::fsm::{compute_retreat_target, AgentState};
use crate::perception::PlayerState;

/// Seconds between strafe direction flips
const STRAFE_PERIOD: f32 = 1.5;
/// Seconds of look-ahead when leading a visible target
const PURSUIT_LOOKAHEAD: f32 = 1.0;

/// Concrete behavior run for a state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Behavior {
    Hold,
    FollowPatrol,
    Scan,
    Investigate,
    Pursue,
    Fight(CombatTactic),
    Flee,
    Flank,
    TakeCover,
    Sweep,
    Regroup,
    Assist,
}

impl Behavior {
    /// Dispatch table from state to behavior
    pub fn for_state(state: AgentState, tactic: CombatTactic) -> Self {
        match state {
            AgentState::Idle => Behavior::Hold,
            AgentState::Patrol => Behavior::FollowPatrol,
            AgentState::Alert => Behavior::Scan,
            AgentState::Investigate => Behavior::Investigate,
            AgentState::Chase => Behavior::Pursue,
            AgentState::Combat => Behavior::Fight(tactic),
            AgentState::Retreat => Behavior::Flee,
            AgentState::Flank => Behavior::Flank,
            AgentState::Cover => Behavior::TakeCover,
            AgentState::Search => Behavior::Sweep,
            AgentState::Regroup => Behavior::Regroup,
            AgentState::Support => Behavior::Assist,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Behavior::Hold => "hold",
            Behavior::FollowPatrol => "follow_patrol",
            Behavior::Scan => "scan",
            Behavior::Investigate => "investigate",
            Behavior::Pursue => "pursue",
            Behavior::Fight(tactic) => tactic.label(),
            Behavior::Flee => "flee",
            Behavior::Flank => "flank",
            Behavior::TakeCover => "take_cover",
            Behavior::Sweep => "sweep",
            Behavior::Regroup => "regroup",
            Behavior::Assist => "assist",
        }
    }

    fn may_attack(self) -> bool {
        matches!(
            self,
            Behavior::Pursue | Behavior::Fight(_) | Behavior::Flank | Behavior::TakeCover | Behavior::Assist
        )
    }
}

/// Multipliers published by the difficulty controller
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CombatModifiers {
    pub speed: f32,
    pub damage: f32,
    pub accuracy: f32,
}

impl Default for CombatModifiers {
    fn default() -> Self {
        Self {
            speed: 1.0,
            damage: 1.0,
            accuracy: 1.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AttackIntent {
    pub target: Vec2,
    pub damage: f32,
    /// Hit chance in [0, 1]
    pub accuracy: f32,
    pub suppressive: bool,
}

/// Outbound per-agent result of a tick
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentIntent {
    pub agent: AgentId,
    pub velocity: Vec2,
    pub facing: f32,
    pub attack: Option<AttackIntent>,
    pub state: AgentState,
    pub behavior: Behavior,
}

impl AgentIntent {
    /// Debug label of the agent's state
    pub fn state_label(&self) -> &'static str {
        self.state.label()
    }

    /// Keep moving the way the agent already was
    pub fn fallback(agent: &Agent) -> Self {
        Self {
            agent: agent.id,
            velocity: if agent.velocity.is_finite() { agent.velocity } else { Vec2::ZERO },
            facing: agent.facing,
            attack: None,
            state: agent.state(),
            behavior: Behavior::Hold,
        }
    }
}

/// Another agent as seen by the executor
#[derive(Debug, Clone, Copy)]
pub struct NeighborInfo {
    pub id: AgentId,
    pub position: Vec2,
    pub velocity: Vec2,
    pub health_ratio: f32,
}

/// Everything the executor reads besides the agent itself
pub struct ExecutionContext<'a> {
    pub config: &'a BehaviorConfig,
    pub retreat_distance: f32,
    pub obstacles: &'a [Aabb],
    pub pathfinder: &'a dyn Pathfinder,
    pub player: &'a PlayerState,
    pub neighbors: &'a [NeighborInfo],
    pub modifiers: CombatModifiers,
    pub now: f32,
    pub dt: f32,
}

/// Run the agent's current behavior for one tick
pub fn execute(agent: &mut Agent, ctx: &ExecutionContext) -> Result<AgentIntent> {
    let state = agent.state();
    let max_speed = agent.stats.speed * ctx.modifiers.speed.max(0.0);
    let target = agent.memory.last_known;
    let visible_now = agent.memory.seen_within(ctx.now, 0.0);

    let tactic = match target {
        Some(t) => select_combat_tactic(
            agent.health_ratio(),
            allies_near(agent, ctx),
            agent.position.distance(t),
            ctx.config,
        ),
        None => CombatTactic::DirectAttack,
    };
    let behavior = Behavior::for_state(state, tactic);

    let desired = match behavior {
        Behavior::Hold => Vec2::ZERO,
        Behavior::FollowPatrol => follow_patrol(agent, max_speed * ctx.config.patrol_speed_factor, ctx),
        Behavior::Scan => Vec2::ZERO,
        Behavior::Investigate => match target {
            Some(t) => travel(agent, t, max_speed * ctx.config.investigate_speed_factor, ctx),
            None => Vec2::ZERO,
        },
        Behavior::Pursue => match target {
            Some(t) if visible_now => {
                pursuit(agent.position, t, ctx.player.velocity, max_speed, PURSUIT_LOOKAHEAD)
            }
            Some(t) => travel(agent, t, max_speed, ctx),
            None => Vec2::ZERO,
        },
        Behavior::Fight(tactic) => match target {
            Some(t) => fight(agent, tactic, t, max_speed, ctx),
            None => Vec2::ZERO,
        },
        Behavior::Flee => flee_velocity(agent, max_speed, ctx)?,
        Behavior::Flank => match (directive_target(agent), target) {
            (Some(spot), _) => travel(agent, spot, max_speed, ctx),
            (None, Some(t)) => fight(agent, CombatTactic::DirectAttack, t, max_speed, ctx),
            (None, None) => Vec2::ZERO,
        },
        Behavior::TakeCover => take_cover(agent, target, max_speed, ctx),
        Behavior::Sweep => sweep(agent, max_speed * ctx.config.investigate_speed_factor, ctx),
        Behavior::Regroup => {
            let rally = directive_target(agent).unwrap_or(agent.spawn_point);
            arrive(
                agent.position,
                rally,
                max_speed * 0.8,
                ctx.config.support_follow_distance * 2.0,
                ctx.config.support_follow_distance,
            )
        }
        Behavior::Assist => assist(agent, max_speed, ctx),
    };

    let avoidance = avoid_obstacles(
        agent.position,
        desired,
        ctx.obstacles,
        ctx.config.avoidance_margin,
        ctx.config.avoidance_lookahead,
    );
    let velocity = (desired + avoidance).clamp_length_max(max_speed);
    if !velocity.is_finite() {
        return Err(AiError::DegenerateGeometry("non-finite steering velocity"));
    }

    let engaged_target = target.filter(|_| behavior.may_attack() || matches!(behavior, Behavior::Scan));
    let facing = engaged_target
        .and_then(|t| heading(t - agent.position))
        .or_else(|| heading(velocity))
        .unwrap_or(agent.facing);

    let attack = if behavior.may_attack() && visible_now {
        target.and_then(|t| attack_intent(agent, t, ctx.modifiers, ctx.config.base_accuracy))
    } else {
        None
    };

    Ok(AgentIntent {
        agent: agent.id,
        velocity,
        facing,
        attack,
        state,
        behavior,
    })
}

/// Attack if in range and off cooldown
pub fn attack_intent(
    agent: &Agent,
    target: Vec2,
    modifiers: CombatModifiers,
    base_accuracy: f32,
) -> Option<AttackIntent> {
    if agent.attack_cooldown > 0.0 || agent.position.distance(target) > agent.stats.attack_range {
        return None;
    }
    Some(make_attack(agent, target, modifiers, base_accuracy))
}

/// Attack intent without readiness checks
pub fn make_attack(agent: &Agent, target: Vec2, modifiers: CombatModifiers, base_accuracy: f32) -> AttackIntent {
    AttackIntent {
        target,
        damage: agent.stats.damage * modifiers.damage,
        accuracy: (base_accuracy * modifiers.accuracy).clamp(0.0, 1.0),
        suppressive: false,
    }
}

fn allies_near(agent: &Agent, ctx: &ExecutionContext) -> usize {
    ctx.neighbors
        .iter()
        .filter(|n| n.id != agent.id && n.position.distance(agent.position) <= ctx.config.ally_radius)
        .count()
}

fn directive_target(agent: &Agent) -> Option<Vec2> {
    agent.directive.and_then(|d| d.target)
}

fn travel(agent: &Agent, to: Vec2, speed: f32, ctx: &ExecutionContext) -> Vec2 {
    if agent.position.distance(to) <= ctx.config.waypoint_tolerance {
        return Vec2::ZERO;
    }
    let waypoint = next_waypoint(ctx.pathfinder, agent.position, to, ctx.obstacles);
    seek(agent.position, waypoint, speed)
}

fn follow_patrol(agent: &mut Agent, speed: f32, ctx: &ExecutionContext) -> Vec2 {
    let route_len = agent.scratch.patrol_route.len();
    if route_len == 0 {
        return Vec2::ZERO;
    }
    let index = agent.scratch.patrol_index % route_len;
    let waypoint = agent.scratch.patrol_route[index];
    if agent.position.distance(waypoint) <= ctx.config.waypoint_tolerance {
        // Closed loop
        agent.scratch.patrol_index = (index + 1) % route_len;
        return Vec2::ZERO;
    }
    travel(agent, waypoint, speed, ctx)
}

fn sweep(agent: &mut Agent, speed: f32, ctx: &ExecutionContext) -> Vec2 {
    let Some(&waypoint) = agent.scratch.search_route.get(agent.scratch.search_index) else {
        return Vec2::ZERO;
    };
    if agent.position.distance(waypoint) <= ctx.config.waypoint_tolerance {
        agent.scratch.search_index += 1;
        return Vec2::ZERO;
    }
    travel(agent, waypoint, speed, ctx)
}

fn fight(agent: &mut Agent, tactic: CombatTactic, target: Vec2, speed: f32, ctx: &ExecutionContext) -> Vec2 {
    let standoff = standoff_distance(agent, ctx.config);
    let tolerance = ctx.config.waypoint_tolerance;

    match tactic {
        CombatTactic::DirectAttack => hold_range(agent.position, target, standoff, speed, tolerance),
        CombatTactic::StrafingAttack => {
            if agent.archetype.is_melee() {
                return hold_range(agent.position, target, standoff, speed, tolerance);
            }
            agent.scratch.strafe_timer += ctx.dt;
            if agent.scratch.strafe_timer >= STRAFE_PERIOD {
                agent.scratch.strafe_timer = 0.0;
                agent.scratch.strafe_sign = -agent.scratch.strafe_sign;
            }
            let radial = hold_range(agent.position, target, standoff, speed * 0.5, tolerance);
            let lateral = match (target - agent.position).try_normalize() {
                Some(toward) => {
                    rotate(toward, std::f32::consts::FRAC_PI_2)
                        * agent.scratch.strafe_sign
                        * speed
                        * ctx.config.strafe_factor
                }
                None => Vec2::ZERO,
            };
            radial + lateral
        }
        CombatTactic::CoverSeekingAttack => {
            match find_cover_point(agent.position, target, ctx.obstacles, ctx.config) {
                Some(cover) => arrive(agent.position, cover, speed, tolerance * 3.0, tolerance),
                None => hold_range(agent.position, target, standoff, speed, tolerance),
            }
        }
        CombatTactic::FightingRetreat => {
            let open_to = standoff.max(agent.stats.attack_range * 0.5) * 1.5;
            if agent.position.distance(target) < open_to {
                flee(agent.position, target, speed * 0.8)
            } else {
                Vec2::ZERO
            }
        }
    }
}

fn flee_velocity(agent: &mut Agent, speed: f32, ctx: &ExecutionContext) -> Result<Vec2> {
    if let Some(spot) = directive_target(agent) {
        return Ok(arrive(agent.position, spot, speed, 0.0, ctx.config.waypoint_tolerance));
    }

    if agent.scratch.retreat_target.is_none() {
        agent.scratch.retreat_target = compute_retreat_target(
            agent.position,
            agent.memory.last_known,
            agent.facing,
            ctx.retreat_distance,
            ctx.obstacles,
        );
    }

    let spot = agent
        .scratch
        .retreat_target
        .ok_or(AiError::DegenerateGeometry("no valid retreat direction"))?;
    Ok(arrive(agent.position, spot, speed, 0.0, ctx.config.waypoint_tolerance))
}

fn take_cover(agent: &Agent, target: Option<Vec2>, speed: f32, ctx: &ExecutionContext) -> Vec2 {
    let tolerance = ctx.config.waypoint_tolerance;
    let spot = directive_target(agent)
        .or_else(|| target.and_then(|t| find_cover_point(agent.position, t, ctx.obstacles, ctx.config)));

    match (spot, target) {
        (Some(spot), _) => arrive(agent.position, spot, speed, tolerance * 3.0, tolerance),
        (None, Some(t)) => hold_range(agent.position, t, standoff_distance(agent, ctx.config), speed, tolerance),
        (None, None) => Vec2::ZERO,
    }
}

fn assist(agent: &Agent, speed: f32, ctx: &ExecutionContext) -> Vec2 {
    let in_reach = ctx
        .neighbors
        .iter()
        .filter(|n| n.id != agent.id)
        .filter(|n| n.position.distance(agent.position) <= ctx.config.support_search_radius);

    // Most wounded ally first, nearest as tie-break
    let ward = in_reach.min_by(|a, b| {
        a.health_ratio
            .total_cmp(&b.health_ratio)
            .then_with(|| {
                a.position
                    .distance_squared(agent.position)
                    .total_cmp(&b.position.distance_squared(agent.position))
            })
    });

    match ward {
        Some(ward) => arrive(
            agent.position,
            ward.position,
            speed,
            ctx.config.support_follow_distance * 2.0,
            ctx.config.support_follow_distance,
        ),
        None => Vec2::ZERO,
    }
}
