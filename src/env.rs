use std::fmt::Debug;
use std::hash::Hash;

use rand::distributions::{Distribution, WeightedIndex};
use rand::rngs::StdRng;

use crate::error::{MdpError, Result};

/// One entry of an outcome distribution: a resulting state and the
/// probability of transitioning into it.
#[derive(Clone, Debug, PartialEq)]
pub struct Outcome<S> {
    pub next_state: S,
    pub prob: f64,
}

/// Represents one episodic finite Markov decision process.
///
/// This trait is a full model of the environment's dynamics: every state can
/// be enumerated up front, and transitions are expressed as explicit outcome
/// distributions instead of sampled steps. Implementations must be pure.
/// `outcomes` and `reward` take `&self`, so anything an environment would
/// normally hide in instance fields (concealed cards, accumulated drift) has
/// to be threaded through the `State` type to keep transitions reproducible.
pub trait Environment {
    /// A representation of one configuration of the environment
    type State: Clone + Eq + Hash + Debug;

    /// A representation of an action an agent can take
    type Action: Clone + Eq + Hash + Debug;

    /// Enumerate every state of the environment
    ///
    /// The enumeration is finite and restartable; its order is the
    /// implementation's own convention and nothing more.
    fn states(&self) -> Vec<Self::State>;

    /// The fixed action set of the environment
    fn actions(&self) -> Vec<Self::Action>;

    /// Determine whether a state is terminal
    fn is_terminal(&self, state: &Self::State) -> bool;

    /// Determine whether an action is legal in a state
    ///
    /// No action is ever legal at a terminal state. The default accepts any
    /// action from the action set elsewhere; environments with
    /// state-dependent restrictions override this.
    fn is_action_legal(&self, state: &Self::State, action: &Self::Action) -> bool {
        !self.is_terminal(state) && self.actions().contains(action)
    }

    /// Get the legal actions for a state (empty for terminal states)
    fn legal_actions(&self, state: &Self::State) -> Vec<Self::Action> {
        self.actions()
            .into_iter()
            .filter(|a| self.is_action_legal(state, a))
            .collect()
    }

    /// Get the outcome distribution for taking `action` in `state`
    ///
    /// Probabilities sum to 1; deterministic environments return a single
    /// entry of probability 1. Callers must not assume determinism.
    ///
    /// **Errors** with [`MdpError::IllegalAction`] if the action is not
    /// legal in the state.
    fn outcomes(
        &self,
        state: &Self::State,
        action: &Self::Action,
    ) -> Result<Vec<Outcome<Self::State>>>;

    /// Get the scalar reward for the transition `(state, action, next_state)`
    fn reward(&self, state: &Self::State, action: &Self::Action, next_state: &Self::State) -> f64;

    /// Get the state episodes start from
    fn starting_state(&self) -> Self::State;
}

/// Sample a concrete next state from an outcome distribution.
///
/// **Errors** with [`MdpError::InvalidConfiguration`] if the distribution is
/// empty or its probabilities are not positive finite weights.
pub fn resolve_outcome<S: Clone>(outcomes: &[Outcome<S>], rng: &mut StdRng) -> Result<S> {
    let dist = WeightedIndex::new(outcomes.iter().map(|o| o.prob)).map_err(|e| {
        MdpError::invalid_configuration(format!("malformed outcome distribution: {e}"))
    })?;
    Ok(outcomes[dist.sample(rng)].next_state.clone())
}
