use log::{debug, info};

use crate::agent::Agent;
use crate::assert_interval;
use crate::env::Environment;
use crate::error::{MdpError, Result};
use crate::tables::ValueTable;

/// Sweep-based dynamic-programming solver over the full state space.
///
/// Requires the complete model of the environment's dynamics through
/// [`Environment::outcomes`]. Every sweep loop is bounded by `max_sweeps`;
/// exceeding it reports [`MdpError::NonConvergence`] instead of silently
/// truncating.
pub struct DpSolver {
    gamma: f64,
    accuracy: f64,
    max_sweeps: usize,
}

impl DpSolver {
    /// Initialize a new `DpSolver`
    ///
    /// ### Parameters
    /// - `gamma` - The discount factor - must be between 0 and 1
    /// - `accuracy` - The per-sweep convergence threshold on the maximum
    ///   absolute state-value change - must be positive
    /// - `max_sweeps` - Iteration cap for every sweep loop
    ///
    /// **Panics** if `gamma` is not in the interval `[0,1]` or `accuracy`
    /// is not positive
    pub fn new(gamma: f64, accuracy: f64, max_sweeps: usize) -> Self {
        assert_interval!(gamma, 0.0, 1.0);
        assert!(accuracy > 0.0, "Invalid value for `accuracy`. Must be positive.");
        Self {
            gamma,
            accuracy,
            max_sweeps,
        }
    }

    /// Probability-weighted one-step lookahead
    /// `Σ_s' p(s'|s,a)·(r(s,a,s') + γ·V(s'))`
    fn lookahead<E>(
        &self,
        env: &E,
        state: &E::State,
        action: &E::Action,
        v: &ValueTable<E::State>,
    ) -> Result<f64>
    where
        E: Environment,
    {
        let mut total = 0.0;
        for outcome in env.outcomes(state, action)? {
            let next_value = v
                .get(&outcome.next_state)
                .copied()
                .ok_or_else(|| MdpError::unknown_state(&outcome.next_state))?;
            let reward = env.reward(state, action, &outcome.next_state);
            total += outcome.prob * (reward + self.gamma * next_value);
        }
        Ok(total)
    }

    /// Iterative policy evaluation: compute the state-value table of the
    /// agent's current policy.
    ///
    /// Every non-terminal state's value is recomputed per sweep as the
    /// policy-weighted expectation of the one-step lookahead; terminal
    /// values stay fixed at 0. Sweeps repeat until the maximum absolute
    /// per-state change drops below the accuracy threshold.
    pub fn policy_evaluation<E>(&self, env: &E, agent: &Agent<E>) -> Result<ValueTable<E::State>>
    where
        E: Environment,
    {
        let states = env.states();
        if states.is_empty() {
            return Err(MdpError::EmptyStateSpace);
        }
        let mut v: ValueTable<E::State> = states.iter().cloned().map(|s| (s, 0.0)).collect();

        let mut delta = f64::INFINITY;
        for sweep in 1..=self.max_sweeps {
            delta = 0.0;
            for state in &states {
                if env.is_terminal(state) {
                    continue;
                }
                let old = v[state];
                let mut new = 0.0;
                for (action, prob) in agent.policy().action_probs(state)? {
                    if *prob == 0.0 {
                        continue;
                    }
                    new += prob * self.lookahead(env, state, action, &v)?;
                }
                *v.get_mut(state).expect("v covers every state") = new;
                delta = delta.max((old - new).abs());
            }
            if delta < self.accuracy {
                debug!("policy evaluation converged after {sweep} sweeps (delta {delta:.6})");
                return Ok(v);
            }
        }

        Err(MdpError::NonConvergence {
            sweeps: self.max_sweeps,
            delta,
            threshold: self.accuracy,
        })
    }

    /// Greedy policy improvement against a state-value table.
    ///
    /// For every non-terminal state, the action maximizing the one-step
    /// lookahead is written into the agent's policy via `set_action`.
    ///
    /// **Returns** whether the policy was already stable: no state's
    /// distribution changed.
    pub fn policy_improvement<E>(
        &self,
        env: &E,
        agent: &mut Agent<E>,
        v: &ValueTable<E::State>,
    ) -> Result<bool>
    where
        E: Environment,
    {
        let mut stable = true;
        for state in env.states() {
            if env.is_terminal(&state) {
                continue;
            }

            let mut best: Option<(E::Action, f64)> = None;
            for action in env.legal_actions(&state) {
                let value = self.lookahead(env, &state, &action, v)?;
                // first maximum wins, which keeps ties deterministic
                if best.as_ref().map_or(true, |(_, b)| value > *b) {
                    best = Some((action, value));
                }
            }
            let (best_action, _) = best.ok_or_else(|| MdpError::no_legal_actions(&state))?;

            let already_set =
                agent.policy().action_probs(&state)?.get(&best_action).copied() == Some(1.0);
            agent.set_action(&state, &best_action)?;
            if !already_set {
                debug!("state {state:?}: better action found, {best_action:?}");
                stable = false;
            }
        }
        Ok(stable)
    }

    /// Policy iteration: alternate evaluation and greedy improvement until
    /// the policy is stable.
    ///
    /// **Returns** the state-value table of the converged policy.
    pub fn policy_iteration<E>(&self, env: &E, agent: &mut Agent<E>) -> Result<ValueTable<E::State>>
    where
        E: Environment,
    {
        for iteration in 1..=self.max_sweeps {
            debug!("policy iteration {iteration}");
            let v = self.policy_evaluation(env, agent)?;
            if self.policy_improvement(env, agent, &v)? {
                info!("policy stable after {iteration} iterations");
                return Ok(v);
            }
        }
        Err(MdpError::NonConvergence {
            sweeps: self.max_sweeps,
            delta: f64::INFINITY,
            threshold: self.accuracy,
        })
    }

    /// Value iteration: combined sweeps taking the maximum over legal
    /// actions of the one-step lookahead, followed by one greedy-extraction
    /// pass writing the optimal policy into the agent.
    ///
    /// **Returns** the optimal state-value table.
    pub fn value_iteration<E>(&self, env: &E, agent: &mut Agent<E>) -> Result<ValueTable<E::State>>
    where
        E: Environment,
    {
        let states = env.states();
        if states.is_empty() {
            return Err(MdpError::EmptyStateSpace);
        }
        let mut v: ValueTable<E::State> = states.iter().cloned().map(|s| (s, 0.0)).collect();

        let mut converged = false;
        let mut delta = f64::INFINITY;
        for sweep in 1..=self.max_sweeps {
            delta = 0.0;
            for state in &states {
                if env.is_terminal(state) {
                    continue;
                }
                let old = v[state];
                let mut new = f64::NEG_INFINITY;
                for action in env.legal_actions(state) {
                    new = new.max(self.lookahead(env, state, &action, &v)?);
                }
                if new == f64::NEG_INFINITY {
                    return Err(MdpError::no_legal_actions(state));
                }
                *v.get_mut(state).expect("v covers every state") = new;
                delta = delta.max((old - new).abs());
            }
            if delta < self.accuracy {
                info!("value iteration converged after {sweep} sweeps");
                converged = true;
                break;
            }
        }
        if !converged {
            return Err(MdpError::NonConvergence {
                sweeps: self.max_sweeps,
                delta,
                threshold: self.accuracy,
            });
        }

        // greedy extraction against the converged values
        self.policy_improvement(env, agent, &v)?;
        Ok(v)
    }
}
