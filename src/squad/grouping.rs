//! Squad formation, slot assignment and dissolution

use ahash::{AHashMap, AHashSet};

use crate::agent::{Agent, AgentRegistry, SquadLink, SquadRole};
use crate::behavior::steering::{arrive, seek};
use crate::core::config::FormationConfig;
use crate::core::types::{heading, rotate, AgentId, SquadId, Vec2, DIRECTION_EPSILON};
use crate::spatial::SparseHashGrid;
use crate::squad::formation::select_formation;
use crate::squad::registry::SquadRegistry;
use crate::squad::squad::Squad;

/// Result of a dissolution pass
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DissolveOutcome {
    pub dissolved: Vec<SquadId>,
    /// Member ids that no longer resolved to an agent
    pub missing_references: u32,
}

/// Highest archetype priority, then healthiest, then lowest id
pub fn elect_leader<'a>(candidates: impl IntoIterator<Item = &'a Agent>) -> Option<AgentId> {
    candidates
        .into_iter()
        .max_by(|a, b| {
            a.archetype
                .leadership_priority()
                .cmp(&b.archetype.leadership_priority())
                .then_with(|| a.health_ratio().total_cmp(&b.health_ratio()))
                .then_with(|| b.id.cmp(&a.id))
        })
        .map(|a| a.id)
}

/// Group clustered ungrouped agents into new squads
///
/// Seeds are visited in id order; a seed with at least `min_group_size - 1`
/// ungrouped neighbors inside `formation_distance` takes up to
/// `max_group_size - 1` of the nearest.
pub fn form_squads(
    agents: &mut AgentRegistry,
    squads: &mut SquadRegistry,
    config: &FormationConfig,
    now: f32,
) -> Vec<SquadId> {
    let ungrouped: Vec<(AgentId, Vec2)> = agents
        .sorted_ids()
        .into_iter()
        .filter_map(|id| agents.get(id))
        .filter(|a| a.is_alive() && a.squad.is_none())
        .map(|a| (a.id, a.position))
        .collect();

    let min_size = config.min_group_size.max(2);
    let max_size = config.max_group_size.max(min_size);
    if ungrouped.len() < min_size {
        return Vec::new();
    }

    let mut grid = SparseHashGrid::new(config.formation_distance);
    grid.rebuild(ungrouped.iter().copied());

    let mut taken: AHashSet<AgentId> = AHashSet::new();
    let mut formed = Vec::new();

    for &(seed, position) in &ungrouped {
        if taken.contains(&seed) {
            continue;
        }

        let neighbors: Vec<AgentId> = grid
            .query_radius(position, config.formation_distance)
            .into_iter()
            .map(|(id, _)| id)
            .filter(|&id| id != seed && !taken.contains(&id))
            .collect();
        if neighbors.len() + 1 < min_size {
            continue;
        }

        let mut members = vec![seed];
        members.extend(neighbors.into_iter().take(max_size - 1));

        let Some(leader) = elect_leader(members.iter().filter_map(|&id| agents.get(id))) else {
            continue;
        };
        let archetypes: Vec<_> = members.iter().filter_map(|&id| agents.get(id)).map(|a| a.archetype).collect();
        let formation = select_formation(&archetypes);

        let id = squads.allocate_id();
        let squad = Squad::new(id, leader, &members, formation, now);
        assign_slots(&squad, agents, config.slot_spacing);
        squad_formed_log(&squad);

        taken.extend(members.iter().copied());
        squads.insert(squad);
        formed.push(id);
    }

    formed
}

fn squad_formed_log(squad: &Squad) {
    tracing::debug!(
        squad = %squad.id,
        leader = %squad.leader(),
        size = squad.size(),
        formation = squad.formation.label(),
        "squad formed"
    );
}

/// Write squad links (role and slot offset) onto every member
pub fn assign_slots(squad: &Squad, agents: &mut AgentRegistry, spacing: f32) {
    let slots = squad.formation.positions(squad.size(), spacing);
    for (index, (&member, slot)) in squad.members().iter().zip(slots).enumerate() {
        if let Some(agent) = agents.get_mut(member) {
            agent.squad = Some(SquadLink {
                squad: squad.id,
                role: if index == 0 { SquadRole::Leader } else { SquadRole::Follower },
                slot_offset: slot.offset,
            });
        }
    }
}

/// Remove a squad and clear every member's linkage
pub fn dissolve_squad(agents: &mut AgentRegistry, squads: &mut SquadRegistry, id: SquadId) -> Option<Squad> {
    let squad = squads.remove(id)?;
    for &member in squad.members() {
        if let Some(agent) = agents.get_mut(member) {
            if agent.squad_id() == Some(id) {
                agent.leave_squad();
            }
        }
    }
    tracing::debug!(squad = %id, "squad dissolved");
    Some(squad)
}

/// Drop one member right away, dissolving the squad if that breaks it
///
/// Returns true when the squad was dissolved.
pub fn detach_member(
    agents: &mut AgentRegistry,
    squads: &mut SquadRegistry,
    squad_id: SquadId,
    member: AgentId,
    config: &FormationConfig,
) -> bool {
    let Some(squad) = squads.get_mut(squad_id) else {
        return false;
    };
    squad.remove_member(member);
    if let Some(agent) = agents.get_mut(member) {
        agent.leave_squad();
    }

    if squad.size() < config.min_group_size.max(2) || !squad.has_leader() {
        dissolve_squad(agents, squads, squad_id);
        return true;
    }
    refit(squad_id, agents, squads, config);
    false
}

/// Prune dead or vanished members and dissolve squads that became invalid
pub fn dissolve_invalid(agents: &mut AgentRegistry, squads: &mut SquadRegistry, config: &FormationConfig) -> DissolveOutcome {
    let mut outcome = DissolveOutcome::default();
    let min_size = config.min_group_size.max(2);

    for id in squads.sorted_ids() {
        let Some(squad) = squads.get_mut(id) else {
            continue;
        };

        let mut changed = false;
        for member in squad.members().to_vec() {
            let (exists, valid) = match agents.get(member) {
                None => (false, false),
                Some(agent) => (true, agent.is_alive() && agent.squad_id() == Some(id)),
            };
            if valid {
                continue;
            }

            squad.remove_member(member);
            changed = true;
            if !exists {
                outcome.missing_references += 1;
                tracing::debug!(squad = %id, agent = %member, "squad member missing");
            } else if let Some(agent) = agents.get_mut(member) {
                if agent.squad_id() == Some(id) {
                    agent.leave_squad();
                }
            }
        }

        let leader_ok = squad.has_leader() && agents.get(squad.leader()).is_some_and(|a| a.is_alive());
        if squad.size() < min_size || !leader_ok {
            dissolve_squad(agents, squads, id);
            outcome.dissolved.push(id);
        } else if changed {
            refit(id, agents, squads, config);
        }
    }

    outcome
}

/// Re-pick the formation after a composition change and reassign slots
fn refit(id: SquadId, agents: &mut AgentRegistry, squads: &mut SquadRegistry, config: &FormationConfig) {
    let Some(squad) = squads.get_mut(id) else {
        return;
    };
    if !squad.formation_locked {
        let archetypes: Vec<_> = squad.members().iter().filter_map(|&m| agents.get(m)).map(|a| a.archetype).collect();
        squad.formation = select_formation(&archetypes);
    }
    assign_slots(squad, agents, config.slot_spacing);
}

/// World-space slot targets for every member
///
/// The layout is rotated to the leader's bearing toward `target` (or the
/// leader's facing without one) and translated to the squad centroid.
pub fn compute_slot_targets(
    squad: &Squad,
    agents: &AgentRegistry,
    target: Option<Vec2>,
    spacing: f32,
) -> AHashMap<AgentId, Vec2> {
    let Some(leader) = agents.get(squad.leader()) else {
        return AHashMap::new();
    };
    let angle = target
        .and_then(|t| heading(t - leader.position))
        .unwrap_or(leader.facing);

    squad
        .members()
        .iter()
        .zip(squad.formation.positions(squad.size(), spacing))
        .map(|(&member, slot)| (member, squad.centroid + rotate(slot.offset, angle)))
        .collect()
}

/// Additive pull toward a formation slot
///
/// Members further than the catch-up distance close the gap at full weight.
pub fn slot_steering(position: Vec2, slot: Vec2, speed: f32, config: &FormationConfig) -> Vec2 {
    let distance = position.distance(slot);
    if distance <= DIRECTION_EPSILON {
        return Vec2::ZERO;
    }
    if distance > config.slot_catchup_distance {
        seek(position, slot, speed) * config.catchup_weight
    } else {
        arrive(position, slot, speed, config.slot_catchup_distance, 0.0) * config.slot_weight
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::Archetype;
    use crate::squad::formation::Formation;

    fn spawn(agents: &mut AgentRegistry, archetype: Archetype, position: Vec2) -> AgentId {
        let id = agents.allocate_id();
        agents.insert(Agent::new(id, archetype, archetype.stats(), position, 0.0, 0.0));
        id
    }

    #[test]
    fn test_sniper_leads_scouts_in_diamond() {
        let mut agents = AgentRegistry::new();
        let mut squads = SquadRegistry::new();
        let config = FormationConfig::default();

        spawn(&mut agents, Archetype::Scout, Vec2::new(0.0, 0.0));
        let sniper = spawn(&mut agents, Archetype::Sniper, Vec2::new(40.0, 0.0));
        spawn(&mut agents, Archetype::Scout, Vec2::new(0.0, 40.0));
        spawn(&mut agents, Archetype::Scout, Vec2::new(40.0, 40.0));

        let formed = form_squads(&mut agents, &mut squads, &config, 0.0);
        assert_eq!(formed.len(), 1);
        let squad = squads.get(formed[0]).unwrap();
        assert_eq!(squad.leader(), sniper);
        assert_eq!(squad.formation, Formation::Diamond);
        assert!(agents.get(sniper).unwrap().is_leader());
        assert!(agents.iter().all(|a| a.squad_id() == Some(squad.id)));
    }

    #[test]
    fn test_isolated_agents_stay_ungrouped() {
        let mut agents = AgentRegistry::new();
        let mut squads = SquadRegistry::new();
        spawn(&mut agents, Archetype::Grunt, Vec2::ZERO);
        spawn(&mut agents, Archetype::Grunt, Vec2::new(500.0, 0.0));
        assert!(form_squads(&mut agents, &mut squads, &FormationConfig::default(), 0.0).is_empty());
    }

    #[test]
    fn test_group_size_capped() {
        let mut agents = AgentRegistry::new();
        let mut squads = SquadRegistry::new();
        for i in 0..11 {
            spawn(&mut agents, Archetype::Grunt, Vec2::new(i as f32 * 5.0, 0.0));
        }
        let config = FormationConfig::default();
        let formed = form_squads(&mut agents, &mut squads, &config, 0.0);
        assert_eq!(formed.len(), 2);
        assert!(squads.iter().all(|s| s.size() <= config.max_group_size));
        assert_eq!(squads.iter().map(|s| s.size()).sum::<usize>(), 11);
    }

    #[test]
    fn test_leader_tie_break_by_health() {
        let mut agents = AgentRegistry::new();
        let a = spawn(&mut agents, Archetype::Grunt, Vec2::ZERO);
        let b = spawn(&mut agents, Archetype::Grunt, Vec2::ONE);
        agents.get_mut(a).unwrap().health = 50.0;
        assert_eq!(elect_leader([agents.get(a).unwrap(), agents.get(b).unwrap()]), Some(b));
    }

    #[test]
    fn test_dead_leader_dissolves_squad() {
        let mut agents = AgentRegistry::new();
        let mut squads = SquadRegistry::new();
        let config = FormationConfig::default();
        let heavy = spawn(&mut agents, Archetype::Heavy, Vec2::ZERO);
        spawn(&mut agents, Archetype::Grunt, Vec2::new(20.0, 0.0));
        spawn(&mut agents, Archetype::Grunt, Vec2::new(0.0, 20.0));
        form_squads(&mut agents, &mut squads, &config, 0.0);

        agents.get_mut(heavy).unwrap().health = 0.0;
        let outcome = dissolve_invalid(&mut agents, &mut squads, &config);
        assert_eq!(outcome.dissolved.len(), 1);
        assert!(squads.is_empty());
        assert!(agents.iter().all(|a| a.squad.is_none()));
    }

    #[test]
    fn test_missing_member_counted_and_squad_refit() {
        let mut agents = AgentRegistry::new();
        let mut squads = SquadRegistry::new();
        let config = FormationConfig::default();
        spawn(&mut agents, Archetype::Heavy, Vec2::ZERO);
        spawn(&mut agents, Archetype::Grunt, Vec2::new(20.0, 0.0));
        spawn(&mut agents, Archetype::Grunt, Vec2::new(0.0, 20.0));
        let gone = spawn(&mut agents, Archetype::Grunt, Vec2::new(20.0, 20.0));
        let formed = form_squads(&mut agents, &mut squads, &config, 0.0);
        assert_eq!(squads.get(formed[0]).unwrap().formation, Formation::Diamond);

        agents.remove(gone);
        let outcome = dissolve_invalid(&mut agents, &mut squads, &config);
        assert!(outcome.dissolved.is_empty());
        assert_eq!(outcome.missing_references, 1);
        let squad = squads.get(formed[0]).unwrap();
        assert_eq!(squad.size(), 3);
        assert_eq!(squad.formation, Formation::Line);
    }

    #[test]
    fn test_detach_below_minimum_dissolves() {
        let mut agents = AgentRegistry::new();
        let mut squads = SquadRegistry::new();
        let config = FormationConfig::default();
        spawn(&mut agents, Archetype::Grunt, Vec2::ZERO);
        let b = spawn(&mut agents, Archetype::Grunt, Vec2::new(10.0, 0.0));
        let formed = form_squads(&mut agents, &mut squads, &config, 0.0);
        assert!(detach_member(&mut agents, &mut squads, formed[0], b, &config));
        assert!(squads.is_empty());
    }

    #[test]
    fn test_slot_targets_follow_bearing() {
        let mut agents = AgentRegistry::new();
        let a = spawn(&mut agents, Archetype::Grunt, Vec2::ZERO);
        let b = spawn(&mut agents, Archetype::Grunt, Vec2::new(0.0, 10.0));
        let mut squad = Squad::new(SquadId(1), a, &[a, b], Formation::Line, 0.0);
        squad.centroid = Vec2::new(0.0, 5.0);

        // Target straight up: the line turns sideways along x
        let targets = compute_slot_targets(&squad, &agents, Some(Vec2::new(0.0, 500.0)), 40.0);
        let pa = targets[&a];
        let pb = targets[&b];
        assert!((pa.y - 5.0).abs() < 1e-3 && (pb.y - 5.0).abs() < 1e-3);
        assert!((pa.distance(pb) - 40.0).abs() < 1e-3);
    }

    #[test]
    fn test_slot_steering_weights() {
        let config = FormationConfig::default();
        let far = slot_steering(Vec2::ZERO, Vec2::new(100.0, 0.0), 10.0, &config);
        let near = slot_steering(Vec2::ZERO, Vec2::new(10.0, 0.0), 10.0, &config);
        assert!((far.length() - 10.0 * config.catchup_weight).abs() < 1e-4);
        assert!(near.length() < 10.0 * config.slot_weight + 1e-4);
        assert_eq!(slot_steering(Vec2::ONE, Vec2::ONE, 10.0, &config), Vec2::ZERO);
    }
}
