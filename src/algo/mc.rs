use std::collections::HashMap;

use log::{debug, info};

use crate::agent::Agent;
use crate::assert_interval;
use crate::decay::{self, Decay};
use crate::env::Environment;
use crate::error::Result;
use crate::tables::QTable;

/// Which occurrences of a state within a trace record a return
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Visit {
    /// Record only at the state's earliest occurrence in the trace
    First,
    /// Record at every occurrence
    Every,
}

/// Configuration for [`McControl`]
pub struct McConfig<D: Decay> {
    /// Discount factor
    pub gamma: f64,
    /// Per-episode epsilon schedule; also sets the softness of the policy
    /// rewrite
    pub exploration: D,
    pub visit: Visit,
    /// Roll episodes out under a snapshot of the policy taken at the start
    /// of the run instead of the live policy
    pub off_policy: bool,
    pub num_episodes: usize,
    /// Per-episode step bound; hitting it truncates the episode
    pub max_steps: usize,
}

impl Default for McConfig<decay::Constant> {
    fn default() -> Self {
        Self {
            gamma: 1.0,
            exploration: decay::Constant::new(0.1),
            visit: Visit::First,
            off_policy: false,
            num_episodes: 1000,
            max_steps: 100,
        }
    }
}

/// Monte Carlo control: learn action values from complete episode returns
/// and keep the policy epsilon-soft around the empirically best actions.
pub struct McControl<D: Decay> {
    gamma: f64,
    exploration: D,
    visit: Visit,
    off_policy: bool,
    num_episodes: usize,
    max_steps: usize,
}

impl<D: Decay> McControl<D> {
    /// Initialize a new `McControl` run
    ///
    /// **Panics** if `gamma` is not in the interval `[0,1]`
    pub fn new(config: McConfig<D>) -> Self {
        assert_interval!(config.gamma, 0.0, 1.0);
        Self {
            gamma: config.gamma,
            exploration: config.exploration,
            visit: config.visit,
            off_policy: config.off_policy,
            num_episodes: config.num_episodes,
            max_steps: config.max_steps,
        }
    }

    /// Run episodic control and return the learned action-value table.
    ///
    /// Each episode is rolled out in full, then walked backward accumulating
    /// the discounted return `G = γ·G + r`. Recorded returns feed a running
    /// empirical mean per (state, action), and every recorded update
    /// rewrites the policy at that state epsilon-soft around the current
    /// best estimate (ties broken uniformly at random).
    pub fn run<E>(&self, env: &E, agent: &mut Agent<E>) -> Result<QTable<E::State, E::Action>>
    where
        E: Environment,
    {
        let mut q = QTable::zeroed(env)?;
        let mut counts: HashMap<(E::State, E::Action), usize> = HashMap::new();

        // off-policy: freeze the behavior once, before any updates
        let frozen = self.off_policy.then(|| agent.policy().clone());

        for episode in 0..self.num_episodes {
            let epsilon = self.exploration.evaluate(episode as f64);
            let trace = match &frozen {
                Some(behavior) => agent.episode_with(env, behavior, epsilon, self.max_steps)?,
                None => agent.episode(env, epsilon, self.max_steps)?,
            };
            debug!("episode {episode}: {} steps (epsilon {epsilon:.4})", trace.len());

            let mut g = 0.0;
            for t in (0..trace.len()).rev() {
                let transition = &trace[t];
                g = self.gamma * g + transition.reward;

                let record = match self.visit {
                    Visit::Every => true,
                    Visit::First => !trace[..t].iter().any(|prev| prev.state == transition.state),
                };
                if !record {
                    continue;
                }

                let n = counts
                    .entry((transition.state.clone(), transition.action.clone()))
                    .or_insert(0);
                *n += 1;
                let old = q.get(&transition.state, &transition.action)?;
                q.set(
                    &transition.state,
                    &transition.action,
                    old + (g - old) / *n as f64,
                )?;

                let best = q
                    .greedy_action(&transition.state, agent.rng_mut())?
                    .expect("trace states are non-terminal");
                agent.make_epsilon_soft(&transition.state, &best, epsilon)?;
            }
        }

        info!(
            "monte carlo control ({:?} visit) finished {} episodes",
            self.visit, self.num_episodes
        );
        Ok(q)
    }
}

#[cfg(test)]
mod tests {
    use float_eq::assert_float_eq;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    use crate::algo::dp::DpSolver;
    use crate::env::tests::{Corridor, CorridorAction, TwoChoice};

    use super::*;

    fn config(visit: Visit, off_policy: bool, num_episodes: usize) -> McConfig<decay::Constant> {
        McConfig {
            gamma: 1.0,
            exploration: decay::Constant::new(0.2),
            visit,
            off_policy,
            num_episodes,
            max_steps: 30,
        }
    }

    #[test]
    fn backward_pass_accumulates_exact_returns() {
        // single path, so every recorded return is the true one and the
        // running means are exact
        let env = Corridor::<4>;
        let mut agent = Agent::new(&env, 0).unwrap();
        let q = McControl::new(config(Visit::First, true, 10))
            .run(&env, &mut agent)
            .unwrap();

        assert_float_eq!(q.get(&2, &CorridorAction::Forward).unwrap(), 1.0, abs <= 1e-12);
        assert_float_eq!(q.get(&1, &CorridorAction::Forward).unwrap(), 0.0, abs <= 1e-12);
        assert_float_eq!(q.get(&0, &CorridorAction::Forward).unwrap(), -1.0, abs <= 1e-12);
    }

    #[test]
    fn every_visit_matches_first_visit_without_revisits() {
        let env = Corridor::<4>;
        let mut first_agent = Agent::new(&env, 3).unwrap();
        let mut every_agent = Agent::new(&env, 3).unwrap();

        let q_first = McControl::new(config(Visit::First, false, 20))
            .run(&env, &mut first_agent)
            .unwrap();
        let q_every = McControl::new(config(Visit::Every, false, 20))
            .run(&env, &mut every_agent)
            .unwrap();
        assert_eq!(q_first, q_every, "A revisit-free trace records identically");
    }

    #[test]
    fn first_visit_control_agrees_with_value_iteration() {
        let env = TwoChoice;

        let mut vi_agent = Agent::new(&env, 7).unwrap();
        DpSolver::new(1.0, 0.001, 1_000)
            .value_iteration(&env, &mut vi_agent)
            .unwrap();

        let mut mc_agent = Agent::new(&env, 21).unwrap();
        let q = McControl::new(config(Visit::First, false, 2_000))
            .run(&env, &mut mc_agent)
            .unwrap();

        let mut rng = StdRng::seed_from_u64(0);
        for state in [0usize, 1] {
            assert_eq!(
                q.greedy_action(&state, &mut rng).unwrap().as_ref(),
                Some(vi_agent.policy().greedy_action(&state).unwrap()),
                "Monte Carlo finds the optimal action at state {state}"
            );
        }
    }

    #[test]
    fn policy_stays_epsilon_soft() {
        let env = TwoChoice;
        let mut agent = Agent::new(&env, 4).unwrap();
        McControl::new(config(Visit::First, false, 200))
            .run(&env, &mut agent)
            .unwrap();

        let epsilon = 0.2;
        for state in [0usize, 1] {
            let dist = agent.policy().action_probs(&state).unwrap();
            let mut probs: Vec<f64> = dist.values().cloned().collect();
            probs.sort_by(|a, b| a.partial_cmp(b).unwrap());
            assert_float_eq!(probs[0], epsilon / 2.0, abs <= 1e-9);
            assert_float_eq!(probs[1], 1.0 - epsilon + epsilon / 2.0, abs <= 1e-9);
        }
    }
}
