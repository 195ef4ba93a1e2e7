//! Agent states and the transition table

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};

/// Discrete behavior state of an agent
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum AgentState {
    Idle,
    Patrol,
    Alert,
    Investigate,
    Chase,
    Combat,
    Retreat,
    Flank,
    Cover,
    Search,
    Regroup,
    Support,
}

impl AgentState {
    pub const ALL: [AgentState; 12] = [
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

    /// States reachable in one step from this one
    pub fn allowed_transitions(self) -> &'static [AgentState] {
        use AgentState::*;
        match self {
            Idle => &[Patrol, Alert, Investigate],
            Patrol => &[Idle, Alert, Investigate, Chase],
            Alert => &[Patrol, Investigate, Chase, Combat],
            Investigate => &[Patrol, Alert, Chase, Combat],
            Chase => &[Combat, Search, Patrol],
            Combat => &[Chase, Retreat, Flank, Cover],
            Retreat => &[Cover, Regroup, Patrol],
            Flank => &[Combat, Chase, Cover],
            Cover => &[Combat, Retreat, Regroup],
            Search => &[Patrol, Chase, Investigate],
            Regroup => &[Patrol, Combat, Cover],
            Support => &[Combat, Cover, Retreat],
        }
    }

    pub fn can_transition_to(self, to: AgentState) -> bool {
        self.allowed_transitions().contains(&to)
    }

    /// Is the agent actively fighting in this state?
    pub fn is_engaged(self) -> bool {
        matches!(
            self,
            AgentState::Chase | AgentState::Combat | AgentState::Flank | AgentState::Cover
        )
    }

    pub fn label(self) -> &'static str {
        match self {
            AgentState::Idle => "idle",
            AgentState::Patrol => "patrol",
            AgentState::Alert => "alert",
            AgentState::Investigate => "investigate",
            AgentState::Chase => "chase",
            AgentState::Combat => "combat",
            AgentState::Retreat => "retreat",
            AgentState::Flank => "flank",
            AgentState::Cover => "cover",
            AgentState::Search => "search",
            AgentState::Regroup => "regroup",
            AgentState::Support => "support",
        }
    }

    fn index(self) -> usize {
        self as usize
    }
}

/// First legal step on the shortest path from `from` to `to`
///
/// Returns `None` when already there or when `to` cannot be reached
/// (nothing leads back into Support).
pub fn next_hop(from: AgentState, to: AgentState) -> Option<AgentState> {
    if from == to {
        return None;
    }
    if from.can_transition_to(to) {
        return Some(to);
    }

    // BFS, remembering the first hop that led to each state
    let mut first_hop: [Option<AgentState>; 12] = [None; 12];
    let mut visited = [false; 12];
    let mut queue = VecDeque::new();
    visited[from.index()] = true;

    for &next in from.allowed_transitions() {
        visited[next.index()] = true;
        first_hop[next.index()] = Some(next);
        queue.push_back(next);
    }

    while let Some(state) = queue.pop_front() {
        if state == to {
            return first_hop[state.index()];
        }
        for &next in state.allowed_transitions() {
            if !visited[next.index()] {
                visited[next.index()] = true;
                first_hop[next.index()] = first_hop[state.index()];
                queue.push_back(next);
            }
        }
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use AgentState::*;

    #[test]
    fn test_table_examples() {
        assert!(Idle.can_transition_to(Patrol));
        assert!(!Idle.can_transition_to(Combat));
        assert!(Combat.can_transition_to(Flank));
        assert!(!Flank.can_transition_to(Retreat));
        assert!(Support.can_transition_to(Retreat));
    }

    #[test]
    fn test_no_state_transitions_to_itself() {
        for state in AgentState::ALL {
            assert!(!state.can_transition_to(state));
        }
    }

    #[test]
    fn test_nothing_enters_support() {
        for state in AgentState::ALL {
            assert!(!state.can_transition_to(Support));
            if state != Support {
                assert_eq!(next_hop(state, Support), None);
            }
        }
    }

    #[test]
    fn test_next_hop_direct() {
        assert_eq!(next_hop(Alert, Combat), Some(Combat));
        assert_eq!(next_hop(Combat, Combat), None);
    }

    #[test]
    fn test_next_hop_multi_step() {
        // Idle -> Alert -> Combat
        let hop = next_hop(Idle, Combat).expect("combat reachable from idle");
        assert!(Idle.can_transition_to(hop));
        assert_eq!(next_hop(hop, Combat), Some(Combat));

        // Idle reaches Retreat via Combat
        let mut state = Idle;
        let mut steps = 0;
        while state != Retreat {
            state = next_hop(state, Retreat).expect("retreat reachable");
            steps += 1;
            assert!(steps < 12);
        }
        assert_eq!(steps, 3);
    }

    #[test]
    fn test_every_state_but_support_reachable() {
        for from in AgentState::ALL {
            for to in AgentState::ALL {
                if from == to || to == Support {
                    continue;
                }
                let hop = next_hop(from, to);
                assert!(hop.is_some(), "{:?} -> {:?} unreachable", from, to);
                assert!(from.can_transition_to(hop.unwrap()));
            }
        }
    }
}
