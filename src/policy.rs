use std::collections::HashMap;
use std::fmt::Debug;
use std::hash::Hash;

use crate::env::Environment;
use crate::error::{MdpError, Result};

/// A tabular stochastic policy: for every non-terminal state, a probability
/// distribution over that state's legal actions.
///
/// Probabilities over a state's actions sum to 1. Terminal states have no
/// entry; looking one up is an [`MdpError::UnknownState`] defect. The policy
/// is kept as a full distribution rather than a single best action because
/// Monte Carlo control needs soft, non-degenerate probabilities.
#[derive(Clone, Debug)]
pub struct Policy<S, A> {
    probs: HashMap<S, HashMap<A, f64>>,
}

impl<S, A> PartialEq for Policy<S, A>
where
    S: Eq + Hash,
    A: Eq + Hash,
{
    fn eq(&self, other: &Self) -> bool {
        self.probs == other.probs
    }
}

impl<S, A> Policy<S, A>
where
    S: Clone + Eq + Hash + Debug,
    A: Clone + Eq + Hash + Debug,
{
    /// Build a uniform policy: equal probability across the legal actions of
    /// every non-terminal state.
    ///
    /// **Errors** with [`MdpError::EmptyStateSpace`] if the environment
    /// declares no states, and [`MdpError::NoLegalActions`] if a
    /// non-terminal state has no legal action.
    pub fn uniform<E>(env: &E) -> Result<Self>
    where
        E: Environment<State = S, Action = A>,
    {
        let states = env.states();
        if states.is_empty() {
            return Err(MdpError::EmptyStateSpace);
        }

        let mut probs = HashMap::with_capacity(states.len());
        for state in states {
            if env.is_terminal(&state) {
                continue;
            }
            let actions = env.legal_actions(&state);
            if actions.is_empty() {
                return Err(MdpError::no_legal_actions(&state));
            }
            let p = 1.0 / actions.len() as f64;
            probs.insert(state, actions.into_iter().map(|a| (a, p)).collect());
        }

        Ok(Self { probs })
    }

    /// Get the action distribution at a state
    pub fn action_probs(&self, state: &S) -> Result<&HashMap<A, f64>> {
        self.probs
            .get(state)
            .ok_or_else(|| MdpError::unknown_state(state))
    }

    /// Collapse the distribution at `state` to probability 1 on `action`, 0
    /// elsewhere
    pub fn set_action(&mut self, state: &S, action: &A) -> Result<()> {
        let dist = self
            .probs
            .get_mut(state)
            .ok_or_else(|| MdpError::unknown_state(state))?;
        if !dist.contains_key(action) {
            return Err(MdpError::illegal_action(state, action));
        }
        for (a, p) in dist.iter_mut() {
            *p = if a == action { 1.0 } else { 0.0 };
        }
        Ok(())
    }

    /// Get a maximum-probability action at a state.
    ///
    /// Ties fall to whichever maximal action the table yields first; callers
    /// that need random tie-breaking go through
    /// [`Agent::pick_action`](crate::agent::Agent::pick_action).
    pub fn greedy_action(&self, state: &S) -> Result<&A> {
        let dist = self.action_probs(state)?;
        Ok(dist
            .iter()
            .max_by(|a, b| a.1.partial_cmp(b.1).expect("probabilities are not NaN"))
            .map(|(a, _)| a)
            .expect("policy rows are never empty"))
    }

    /// Get every action attaining the maximum probability at a state
    pub fn max_prob_actions(&self, state: &S) -> Result<Vec<&A>> {
        let dist = self.action_probs(state)?;
        let max = dist
            .values()
            .cloned()
            .fold(f64::NEG_INFINITY, f64::max);
        Ok(dist
            .iter()
            .filter(|(_, p)| **p == max)
            .map(|(a, _)| a)
            .collect())
    }

    /// Rewrite the distribution at `state` epsilon-soft: probability
    /// `1 - ε + ε/|A(s)|` on `best` and `ε/|A(s)|` on every other legal
    /// action.
    pub fn make_epsilon_soft(&mut self, state: &S, best: &A, epsilon: f64) -> Result<()> {
        let dist = self
            .probs
            .get_mut(state)
            .ok_or_else(|| MdpError::unknown_state(state))?;
        if !dist.contains_key(best) {
            return Err(MdpError::illegal_action(state, best));
        }
        let base = epsilon / dist.len() as f64;
        for (a, p) in dist.iter_mut() {
            *p = if a == best { 1.0 - epsilon + base } else { base };
        }
        Ok(())
    }

    /// Iterate over the states the policy covers
    pub fn states(&self) -> impl Iterator<Item = &S> {
        self.probs.keys()
    }
}
