//! Per-tick decision function
//!
//! `decide` is the prioritized rule list (first match wins). `select_state`
//! layers the context the rules cannot see on top of it: lost contact turns
//! into a search, support roles hold their post, and squad directives steer
//! engaged members.

use crate::core::config::StateMachineConfig;
use crate::fsm::state::AgentState;

/// Per-agent facts the rule list looks at
#[derive(Debug, Clone, Copy)]
pub struct DecisionInputs {
    pub current: AgentState,
    pub health_ratio: f32,
    pub alert_level: f32,
    /// Distance to the target if it was seen within the memory window
    pub visible_target_distance: Option<f32>,
    pub has_patrol_route: bool,
}

/// Context from memory and the agent's squad
#[derive(Debug, Clone, Copy, Default)]
pub struct StateContext {
    /// A last-known position recent enough to be worth searching
    pub search_lead: bool,
    /// The current search pattern has been walked
    pub search_exhausted: bool,
    /// State requested by the squad's tactic
    pub directive: Option<AgentState>,
}

/// Prioritized rule list
pub fn decide(inputs: &DecisionInputs, config: &StateMachineConfig) -> AgentState {
    let health = clamp_unit(inputs.health_ratio);
    let alert = clamp_unit(inputs.alert_level);

    if health < config.retreat_health {
        return AgentState::Retreat;
    }

    if let Some(distance) = inputs.visible_target_distance {
        let distance = distance.max(0.0);
        if distance < config.combat_distance {
            return AgentState::Combat;
        }
        if distance < config.chase_distance {
            return AgentState::Chase;
        }
    }

    if alert > config.investigate_alert {
        AgentState::Investigate
    } else if alert > config.alert_threshold {
        AgentState::Alert
    } else if inputs.has_patrol_route {
        AgentState::Patrol
    } else {
        AgentState::Idle
    }
}

/// Rule list refined by memory, role and squad context
pub fn select_state(
    inputs: &DecisionInputs,
    context: &StateContext,
    config: &StateMachineConfig,
) -> AgentState {
    let base = decide(inputs, config);

    match base {
        // Low health pre-empts everything, including squad orders
        AgentState::Retreat => AgentState::Retreat,
        AgentState::Combat | AgentState::Chase => context.directive.unwrap_or(base),
        _ => {
            if let Some(directive @ (AgentState::Retreat | AgentState::Regroup)) = context.directive {
                return directive;
            }

            let hunting = matches!(
                inputs.current,
                AgentState::Chase
                    | AgentState::Combat
                    | AgentState::Flank
                    | AgentState::Cover
                    | AgentState::Search
            );
            if hunting && context.search_lead && !context.search_exhausted {
                return AgentState::Search;
            }

            if inputs.current == AgentState::Support {
                return AgentState::Support;
            }

            base
        }
    }
}

fn clamp_unit(value: f32) -> f32 {
    if value.is_nan() {
        0.0
    } else {
        value.clamp(0.0, 1.0)
    }
}
