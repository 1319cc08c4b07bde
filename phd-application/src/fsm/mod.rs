//! Protocol state machine
//!
//! The machine only knows states, events and the transition tables. Actions
//! are carried out by the connection context, which owns the transport and
//! the service table.

pub mod event;
pub mod state;
pub mod table;

pub use event::FsmEvent;
pub use state::FsmState;
pub use table::Action;

use phd_core::protocol::Role;

/// One row of a transition table
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rule {
    /// State entered when the rule applies
    pub next: FsmState,
    /// Action run after the state is set
    pub action: Option<Action>,
}

/// Result of feeding one event to the machine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FsmOutcome {
    /// A rule applied and the state changed
    Changed,
    /// A rule applied and the state stayed the same
    Unchanged,
    /// No rule exists for the event in the current state
    NotProcessed,
}

/// Transition about to be carried out
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transition {
    pub from: FsmState,
    pub to: FsmState,
    pub action: Option<Action>,
}

impl Transition {
    #[must_use]
    pub fn outcome(&self) -> FsmOutcome {
        if self.from == self.to {
            FsmOutcome::Unchanged
        } else {
            FsmOutcome::Changed
        }
    }
}

/// State holder for one connection
#[derive(Debug, Clone)]
pub struct StateMachine {
    role: Role,
    state: FsmState,
}

impl StateMachine {
    pub fn new(role: Role) -> Self {
        Self {
            role,
            state: FsmState::Disconnected,
        }
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn state(&self) -> FsmState {
        self.state
    }

    /// Look up the rule for `event` without applying it
    pub fn rule(&self, event: FsmEvent) -> Option<Rule> {
        match self.role {
            Role::Manager => table::manager_rule(self.state, event),
            Role::Agent => table::agent_rule(self.state, event),
        }
    }

    /// Apply `event`, setting the next state
    ///
    /// # Returns
    ///
    /// The transition taken, or `None` if the event is not processed in the
    /// current state
    pub fn process(&mut self, event: FsmEvent) -> Option<Transition> {
        let Some(rule) = self.rule(event) else {
            log::warn!(
                "{} state machine: event {} not processed in state {}",
                self.role,
                event,
                self.state
            );
            return None;
        };
        let transition = Transition {
            from: self.state,
            to: rule.next,
            action: rule.action,
        };
        self.state = rule.next;
        log::debug!(
            "{} state machine: {} --{}--> {}",
            self.role,
            transition.from,
            event,
            transition.to
        );
        Some(transition)
    }

    #[cfg(test)]
    pub(crate) fn force_state(&mut self, state: FsmState) {
        self.state = state;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connect_and_associate_agent() {
        let mut fsm = StateMachine::new(Role::Agent);
        assert_eq!(fsm.state(), FsmState::Disconnected);

        let t = fsm.process(FsmEvent::IndTransportConnection).unwrap();
        assert_eq!(t.outcome(), FsmOutcome::Changed);
        assert_eq!(t.action, Some(Action::AgentMds));

        let t = fsm.process(FsmEvent::ReqAssoc).unwrap();
        assert_eq!(t.to, FsmState::Associating);
        assert_eq!(t.action, Some(Action::AarqTx));
    }

    #[test]
    fn test_unprocessed_event_keeps_state() {
        let mut fsm = StateMachine::new(Role::Manager);
        assert!(fsm.process(FsmEvent::ReqAssoc).is_none());
        assert_eq!(fsm.state(), FsmState::Disconnected);
    }

    #[test]
    fn test_unchanged_outcome() {
        let mut fsm = StateMachine::new(Role::Manager);
        fsm.force_state(FsmState::Unassociated);
        let t = fsm.process(FsmEvent::RxAbrt).unwrap();
        assert_eq!(t.outcome(), FsmOutcome::Unchanged);
        assert_eq!(t.action, None);
    }
}
