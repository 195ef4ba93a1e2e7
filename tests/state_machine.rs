//! Agent state machine integration tests
//!
//! Decision rules, strict transition requests and the one-hop walk toward
//! the decided state.

use proptest::prelude::*;

use skirmish_ai::agent::Archetype;
use skirmish_ai::core::config::{AiConfig, StateMachineConfig};
use skirmish_ai::core::types::Vec2;
use skirmish_ai::fsm::{decide, next_hop, AgentState, DecisionInputs, StateMachine};
use skirmish_ai::perception::PlayerState;
use skirmish_ai::simulation::{SimulationContext, SpawnRequest, TickInput};

const ALL_STATES: [AgentState; 12] = [
    AgentState::Idle,
    AgentState::Patrol,
    AgentState::Alert,
    AgentState::Investigate,
    AgentState::Chase,
    AgentState::Combat,
    AgentState::Retreat,
    AgentState::Flank,
    AgentState::Cover,
    AgentState::Search,
    AgentState::Regroup,
    AgentState::Support,
];

fn inputs(current: AgentState) -> DecisionInputs {
    DecisionInputs {
        current,
        health_ratio: 1.0,
        alert_level: 0.0,
        visible_target_distance: None,
        has_patrol_route: true,
    }
}

#[test]
fn test_distant_target_keeps_patrolling() {
    let config = StateMachineConfig::default();
    let mut i = inputs(AgentState::Patrol);
    i.visible_target_distance = Some(400.0);
    i.alert_level = 0.1;
    assert_eq!(decide(&i, &config), AgentState::Patrol);
}

#[test]
fn test_low_health_retreats_even_at_point_blank() {
    let config = StateMachineConfig::default();
    let mut i = inputs(AgentState::Combat);
    i.health_ratio = 0.15;
    i.visible_target_distance = Some(10.0);
    i.alert_level = 1.0;
    assert_eq!(decide(&i, &config), AgentState::Retreat);
}

#[test]
fn test_distance_bands() {
    let config = StateMachineConfig::default();
    let mut i = inputs(AgentState::Alert);
    i.visible_target_distance = Some(100.0);
    assert_eq!(decide(&i, &config), AgentState::Combat);
    i.visible_target_distance = Some(200.0);
    assert_eq!(decide(&i, &config), AgentState::Chase);
}

#[test]
fn test_no_route_idles() {
    let config = StateMachineConfig::default();
    let mut i = inputs(AgentState::Idle);
    i.has_patrol_route = false;
    assert_eq!(decide(&i, &config), AgentState::Idle);
}

#[test]
fn test_agent_at_400_stays_on_patrol() {
    let mut sim = SimulationContext::new(AiConfig::default(), 3).unwrap();
    let id = sim.spawn_agent(&SpawnRequest {
        archetype: Archetype::Grunt,
        position: Vec2::ZERO,
        facing: 0.0,
    });

    let input = TickInput {
        dt: 0.1,
        player: PlayerState {
            position: Vec2::new(400.0, 0.0),
            health_ratio: 1.0,
            ..Default::default()
        },
        metrics: Vec::new(),
    };
    for _ in 0..10 {
        sim.tick(&input);
    }
    assert_eq!(sim.agent(id).unwrap().state(), AgentState::Patrol);
}

#[test]
fn test_every_state_reaches_patrol() {
    for state in ALL_STATES {
        if state == AgentState::Patrol {
            continue;
        }
        let mut current = state;
        let mut steps = 0;
        while let Some(hop) = next_hop(current, AgentState::Patrol) {
            assert!(current.can_transition_to(hop));
            current = hop;
            steps += 1;
            assert!(steps < 12);
        }
        assert_eq!(current, AgentState::Patrol, "{:?} cannot reach Patrol", state);
    }
}

fn state_strategy() -> impl Strategy<Value = AgentState> {
    (0..ALL_STATES.len()).prop_map(|i| ALL_STATES[i])
}

proptest! {
    #[test]
    fn prop_requests_only_follow_legal_edges(requests in prop::collection::vec(state_strategy(), 1..40)) {
        let mut machine = StateMachine::new(AgentState::Idle, 0.0);
        let mut rejected = 0;

        for (step, &to) in requests.iter().enumerate() {
            let before = machine.state();
            match machine.request(skirmish_ai::core::types::AgentId(1), to, step as f32) {
                Ok(t) => {
                    prop_assert!(before.can_transition_to(to));
                    prop_assert_eq!(t.from, before);
                    prop_assert_eq!(machine.state(), to);
                }
                Err(_) => {
                    rejected += 1;
                    prop_assert!(!before.can_transition_to(to));
                    prop_assert_eq!(machine.state(), before);
                }
            }
        }
        prop_assert_eq!(machine.invalid_transitions(), rejected);
    }

    #[test]
    fn prop_next_hop_is_always_legal(from in state_strategy(), to in state_strategy()) {
        if let Some(hop) = next_hop(from, to) {
            prop_assert!(from.can_transition_to(hop));
        } else {
            prop_assert!(from == to || to == AgentState::Support);
        }
    }
}
