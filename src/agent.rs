use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};

use crate::env::{resolve_outcome, Environment};
use crate::episode::{Episode, Transition};
use crate::error::{MdpError, Result};
use crate::policy::Policy;

/// An agent holding the policy for one environment.
///
/// The agent owns the run's single random source: epsilon draws,
/// tie-breaking, and stochastic outcome resolution all consume the same
/// seeded [`StdRng`], so identical seeds reproduce identical runs. Solvers
/// mutate the policy exclusively through the agent's operations.
pub struct Agent<E: Environment> {
    policy: Policy<E::State, E::Action>,
    rng: StdRng,
}

impl<E: Environment> Agent<E> {
    /// Initialize an agent with a uniform policy over the environment's
    /// legal actions and a seeded random source
    pub fn new(env: &E, seed: u64) -> Result<Self> {
        Ok(Self {
            policy: Policy::uniform(env)?,
            rng: StdRng::seed_from_u64(seed),
        })
    }

    /// Get the agent's policy
    pub fn policy(&self) -> &Policy<E::State, E::Action> {
        &self.policy
    }

    pub(crate) fn rng_mut(&mut self) -> &mut StdRng {
        &mut self.rng
    }

    pub(crate) fn policy_and_rng(
        &mut self,
    ) -> (&mut Policy<E::State, E::Action>, &mut StdRng) {
        (&mut self.policy, &mut self.rng)
    }

    /// Reset the policy to uniform probabilities across legal actions.
    ///
    /// With `hardline`, immediately collapse each state's distribution onto
    /// one arbitrarily chosen action, leaving only probabilities of 0 and 1.
    pub fn initialize_policy(&mut self, env: &E, hardline: bool) -> Result<()> {
        self.policy = Policy::uniform(env)?;
        if hardline {
            let Self { policy, rng } = self;
            let states: Vec<E::State> = policy.states().cloned().collect();
            for state in states {
                let choices = policy.max_prob_actions(&state)?;
                let pick = (*choices.choose(rng).expect("policy rows are never empty")).clone();
                policy.set_action(&state, &pick)?;
            }
        }
        Ok(())
    }

    /// Choose an action at a state with epsilon-greedy exploration.
    ///
    /// With probability `epsilon` the action is drawn uniformly from all
    /// legal actions; otherwise uniformly from the actions attaining the
    /// policy's maximum probability at the state. Returns `None` for a
    /// terminal state.
    pub fn pick_action(
        &mut self,
        env: &E,
        state: &E::State,
        epsilon: f64,
    ) -> Result<Option<E::Action>> {
        if env.is_terminal(state) {
            return Ok(None);
        }
        let Self { policy, rng } = self;
        Self::choose(env, policy, rng, state, epsilon).map(Some)
    }

    /// Collapse the policy at `state` to probability 1 on `action`; used
    /// after every greedy-improvement step
    pub fn set_action(&mut self, state: &E::State, action: &E::Action) -> Result<()> {
        self.policy.set_action(state, action)
    }

    /// Rewrite the policy at `state` to an epsilon-soft distribution peaked
    /// on `best`
    pub fn make_epsilon_soft(
        &mut self,
        state: &E::State,
        best: &E::Action,
        epsilon: f64,
    ) -> Result<()> {
        self.policy.make_epsilon_soft(state, best, epsilon)
    }

    /// Roll out one episode under the agent's live policy
    ///
    /// The episode ends at the first terminal state or after `max_steps`
    /// steps, whichever comes first; truncation is not an error.
    pub fn episode(
        &mut self,
        env: &E,
        epsilon: f64,
        max_steps: usize,
    ) -> Result<Episode<E::State, E::Action>> {
        let Self { policy, rng } = self;
        Self::rollout(env, policy, rng, epsilon, max_steps)
    }

    /// Roll out one episode under an explicit behavior policy, leaving the
    /// agent's own policy untouched
    pub fn episode_with(
        &mut self,
        env: &E,
        behavior: &Policy<E::State, E::Action>,
        epsilon: f64,
        max_steps: usize,
    ) -> Result<Episode<E::State, E::Action>> {
        Self::rollout(env, behavior, &mut self.rng, epsilon, max_steps)
    }

    fn choose(
        env: &E,
        policy: &Policy<E::State, E::Action>,
        rng: &mut StdRng,
        state: &E::State,
        epsilon: f64,
    ) -> Result<E::Action> {
        if rng.gen::<f64>() < epsilon {
            let legal = env.legal_actions(state);
            if legal.is_empty() {
                return Err(MdpError::no_legal_actions(state));
            }
            Ok(legal.choose(rng).expect("checked non-empty").clone())
        } else {
            let best = policy.max_prob_actions(state)?;
            Ok((*best.choose(rng).expect("policy rows are never empty")).clone())
        }
    }

    fn rollout(
        env: &E,
        policy: &Policy<E::State, E::Action>,
        rng: &mut StdRng,
        epsilon: f64,
        max_steps: usize,
    ) -> Result<Episode<E::State, E::Action>> {
        let mut state = env.starting_state();
        let mut trace = Vec::new();
        for _ in 0..max_steps {
            if env.is_terminal(&state) {
                break;
            }
            let action = Self::choose(env, policy, rng, &state, epsilon)?;
            let outcomes = env.outcomes(&state, &action)?;
            let next_state = resolve_outcome(&outcomes, rng)?;
            let reward = env.reward(&state, &action, &next_state);
            trace.push(Transition {
                state: state.clone(),
                action,
                reward,
                next_state: next_state.clone(),
            });
            state = next_state;
        }
        Ok(trace)
    }
}

#[cfg(test)]
mod tests {
    use crate::env::tests::{Corridor, CorridorAction, TwoChoice, TwoChoiceAction};

    use super::*;

    #[test]
    fn pick_action_returns_none_for_terminal_states() {
        let env = TwoChoice;
        let mut agent = Agent::new(&env, 0).unwrap();
        assert_eq!(agent.pick_action(&env, &2, 0.5).unwrap(), None);
    }

    #[test]
    fn pick_action_rejects_unknown_states() {
        let env = TwoChoice;
        let mut agent = Agent::new(&env, 0).unwrap();
        assert!(matches!(
            agent.pick_action(&env, &9, 0.0),
            Err(MdpError::UnknownState { .. })
        ));
    }

    #[test]
    fn greedy_pick_follows_collapsed_policy() {
        let env = TwoChoice;
        let mut agent = Agent::new(&env, 0).unwrap();
        agent.set_action(&0, &TwoChoiceAction::Jump).unwrap();

        for _ in 0..20 {
            assert_eq!(
                agent.pick_action(&env, &0, 0.0).unwrap(),
                Some(TwoChoiceAction::Jump),
                "Epsilon 0 always exploits the unique maximum"
            );
        }
    }

    #[test]
    fn hardline_initialization_collapses_every_state() {
        let env = TwoChoice;
        let mut agent = Agent::new(&env, 11).unwrap();
        agent.initialize_policy(&env, true).unwrap();

        for state in [0usize, 1] {
            let dist = agent.policy().action_probs(&state).unwrap();
            let ones = dist.values().filter(|p| **p == 1.0).count();
            let zeros = dist.values().filter(|p| **p == 0.0).count();
            assert_eq!(ones, 1, "Exactly one action keeps probability 1");
            assert_eq!(zeros, dist.len() - 1);
        }
    }

    #[test]
    fn episode_terminates_at_terminal_state() {
        let env = Corridor::<4>;
        let mut agent = Agent::new(&env, 5).unwrap();
        let trace = agent.episode(&env, 0.0, 100).unwrap();

        assert_eq!(trace.len(), 3, "Three steps reach the terminal cell");
        assert_eq!(trace[0].state, 0);
        assert_eq!(trace[2].next_state, 3);
        assert_eq!(trace[2].reward, 1.0);
        assert!(trace.iter().all(|t| t.action == CorridorAction::Forward));
    }

    #[test]
    fn episode_truncates_at_max_steps() {
        let env = Corridor::<10>;
        let mut agent = Agent::new(&env, 5).unwrap();
        let trace = agent.episode(&env, 0.0, 4).unwrap();
        assert_eq!(trace.len(), 4, "Truncation is not an error");
    }

    #[test]
    fn identical_seeds_reproduce_identical_traces() {
        let env = TwoChoice;
        let mut a = Agent::new(&env, 42).unwrap();
        let mut b = Agent::new(&env, 42).unwrap();

        let ta: Vec<_> = (0..10).map(|_| a.episode(&env, 0.3, 50).unwrap()).collect();
        let tb: Vec<_> = (0..10).map(|_| b.episode(&env, 0.3, 50).unwrap()).collect();
        assert_eq!(ta, tb, "Same seed, same trajectories");
    }

    #[test]
    fn frozen_behavior_policy_is_left_untouched() {
        let env = TwoChoice;
        let mut agent = Agent::new(&env, 1).unwrap();
        let frozen = agent.policy().clone();

        agent.set_action(&0, &TwoChoiceAction::Jump).unwrap();
        let trace = agent.episode_with(&env, &frozen, 0.0, 50).unwrap();
        assert!(!trace.is_empty());
        assert_eq!(
            frozen.action_probs(&0).unwrap()[&TwoChoiceAction::Advance],
            0.5,
            "Snapshot keeps its uniform probabilities"
        );
    }
}
