use log::{debug, info};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::Rng;

use crate::agent::Agent;
use crate::assert_interval;
use crate::decay::{self, Decay};
use crate::env::{resolve_outcome, Environment};
use crate::error::{MdpError, Result};
use crate::policy::Policy;
use crate::tables::QTable;

/// The backup-target rule driving one run of [`TdControl`]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TdVariant {
    /// On-policy: bootstrap from the action actually chosen next
    Sarsa,
    /// Bootstrap from the policy-weighted expectation over next actions
    ExpectedSarsa,
    /// Off-policy: bootstrap from the maximizing next action
    QLearning,
    /// Two tables, a fair coin picking which one each update lands in;
    /// the result is their elementwise average
    DoubleQLearning,
    /// Harmonically decaying step size over a two-step-lagged Bellman target
    SpeedyQLearning,
}

/// Configuration for [`TdControl`]
pub struct TdConfig<D: Decay> {
    /// Learning rate (ignored by Speedy Q-Learning, which owns its
    /// harmonic step size)
    pub alpha: f64,
    /// Discount factor
    pub gamma: f64,
    /// Per-episode epsilon schedule
    pub exploration: D,
    pub num_episodes: usize,
    /// Per-episode step bound; hitting it truncates the episode
    pub max_steps: usize,
}

impl Default for TdConfig<decay::Constant> {
    fn default() -> Self {
        Self {
            alpha: 0.5,
            gamma: 1.0,
            exploration: decay::Constant::new(0.1),
            num_episodes: 1000,
            max_steps: 100,
        }
    }
}

/// Temporal-difference control: one episodic update loop shared by every
/// [`TdVariant`].
///
/// Each episode steps through the environment choosing actions
/// epsilon-greedily from the live action-value estimates; the table is
/// updated after every single transition, and the agent's policy is
/// refreshed to the greedy argmax of each updated state. Terminal
/// transitions drop the bootstrap term in every variant.
pub struct TdControl<D: Decay> {
    alpha: f64,
    gamma: f64,
    exploration: D,
    num_episodes: usize,
    max_steps: usize,
}

impl<D: Decay> TdControl<D> {
    /// Initialize a new `TdControl` run
    ///
    /// **Panics** if `alpha` or `gamma` is not in the interval `[0,1]`
    pub fn new(config: TdConfig<D>) -> Self {
        assert_interval!(config.alpha, 0.0, 1.0);
        assert_interval!(config.gamma, 0.0, 1.0);
        Self {
            alpha: config.alpha,
            gamma: config.gamma,
            exploration: config.exploration,
            num_episodes: config.num_episodes,
            max_steps: config.max_steps,
        }
    }

    /// Run episodic control and return the learned action-value table.
    ///
    /// The agent's policy ends greedy with respect to the returned table
    /// over the whole state space.
    pub fn run<E>(
        &self,
        env: &E,
        agent: &mut Agent<E>,
        variant: TdVariant,
    ) -> Result<QTable<E::State, E::Action>>
    where
        E: Environment,
    {
        let mut backup = Backup::new(env, variant)?;

        for episode in 0..self.num_episodes {
            let epsilon = self.exploration.evaluate(episode as f64);
            let mut state = env.starting_state();
            if env.is_terminal(&state) {
                break;
            }
            let mut action = backup.epsilon_greedy(env, &state, epsilon, agent.rng_mut())?;
            let mut steps = 0;

            for _ in 0..self.max_steps {
                let outcomes = env.outcomes(&state, &action)?;
                let next_state = resolve_outcome(&outcomes, agent.rng_mut())?;
                let reward = env.reward(&state, &action, &next_state);
                let terminal = env.is_terminal(&next_state);
                let next_action = if terminal {
                    None
                } else {
                    Some(backup.epsilon_greedy(env, &next_state, epsilon, agent.rng_mut())?)
                };
                steps += 1;

                {
                    let (policy, rng) = agent.policy_and_rng();
                    backup.update(
                        &state,
                        &action,
                        reward,
                        &next_state,
                        next_action.as_ref(),
                        self.alpha,
                        self.gamma,
                        policy,
                        rng,
                    )?;
                }
                if let Some(best) = backup.greedy_action(&state, agent.rng_mut())? {
                    agent.set_action(&state, &best)?;
                }

                match next_action {
                    Some(a) => {
                        state = next_state;
                        action = a;
                    }
                    None => break,
                }
            }
            debug!("episode {episode}: {steps} steps (epsilon {epsilon:.4})");
        }

        // leave the policy greedy over the whole state space, not just the
        // states the final episodes happened to touch
        for state in env.states() {
            if env.is_terminal(&state) {
                continue;
            }
            if let Some(best) = backup.greedy_action(&state, agent.rng_mut())? {
                agent.set_action(&state, &best)?;
            }
        }

        info!("{variant:?} finished {} episodes", self.num_episodes);
        backup.into_q_table()
    }
}

/// Per-variant table state behind the shared update loop
enum Backup<S, A> {
    Sarsa(QTable<S, A>),
    ExpectedSarsa(QTable<S, A>),
    QLearning(QTable<S, A>),
    Double(QTable<S, A>, QTable<S, A>),
    Speedy {
        current: QTable<S, A>,
        lagged: QTable<S, A>,
        updates: usize,
    },
}

impl<S, A> Backup<S, A>
where
    S: Clone + Eq + std::hash::Hash + std::fmt::Debug,
    A: Clone + Eq + std::hash::Hash + std::fmt::Debug,
{
    fn new<E>(env: &E, variant: TdVariant) -> Result<Self>
    where
        E: Environment<State = S, Action = A>,
    {
        let q = QTable::zeroed(env)?;
        Ok(match variant {
            TdVariant::Sarsa => Self::Sarsa(q),
            TdVariant::ExpectedSarsa => Self::ExpectedSarsa(q),
            TdVariant::QLearning => Self::QLearning(q),
            TdVariant::DoubleQLearning => Self::Double(q.clone(), q),
            TdVariant::SpeedyQLearning => Self::Speedy {
                current: q.clone(),
                lagged: q,
                updates: 0,
            },
        })
    }

    /// The estimates behavior derives from: the single table, or the
    /// elementwise mean of the double tables
    fn behavior_value(&self, state: &S, action: &A) -> Result<f64> {
        match self {
            Self::Sarsa(q) | Self::ExpectedSarsa(q) | Self::QLearning(q) => q.get(state, action),
            Self::Double(q1, q2) => Ok((q1.get(state, action)? + q2.get(state, action)?) / 2.0),
            Self::Speedy { current, .. } => current.get(state, action),
        }
    }

    fn primary(&self) -> &QTable<S, A> {
        match self {
            Self::Sarsa(q) | Self::ExpectedSarsa(q) | Self::QLearning(q) => q,
            Self::Double(q1, _) => q1,
            Self::Speedy { current, .. } => current,
        }
    }

    /// Epsilon-greedy selection over the behavior values
    fn epsilon_greedy<E>(
        &self,
        env: &E,
        state: &S,
        epsilon: f64,
        rng: &mut StdRng,
    ) -> Result<A>
    where
        E: Environment<State = S, Action = A>,
    {
        if rng.gen::<f64>() < epsilon {
            let legal = env.legal_actions(state);
            if legal.is_empty() {
                return Err(MdpError::no_legal_actions(state));
            }
            Ok(legal.choose(rng).expect("checked non-empty").clone())
        } else {
            self.greedy_action(state, rng)?
                .ok_or_else(|| MdpError::no_legal_actions(state))
        }
    }

    /// Argmax over behavior values, ties broken uniformly at random; `None`
    /// for terminal states
    fn greedy_action(&self, state: &S, rng: &mut StdRng) -> Result<Option<A>> {
        let actions = self.primary().actions(state)?;
        if actions.is_empty() {
            return Ok(None);
        }
        let mut values = Vec::with_capacity(actions.len());
        for action in &actions {
            values.push(self.behavior_value(state, action)?);
        }
        let max = values.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
        let best: Vec<A> = actions
            .into_iter()
            .zip(&values)
            .filter(|(_, v)| **v == max)
            .map(|(a, _)| a)
            .collect();
        Ok(Some(best.choose(rng).expect("non-empty row").clone()))
    }

    /// Apply one transition's backup; `next_action` is present exactly when
    /// `next_state` is non-terminal
    #[allow(clippy::too_many_arguments)]
    fn update(
        &mut self,
        state: &S,
        action: &A,
        reward: f64,
        next_state: &S,
        next_action: Option<&A>,
        alpha: f64,
        gamma: f64,
        policy: &Policy<S, A>,
        rng: &mut StdRng,
    ) -> Result<()> {
        match self {
            Self::Sarsa(q) => {
                let bootstrap = match next_action {
                    Some(a) => q.get(next_state, a)?,
                    None => 0.0,
                };
                let target = reward + gamma * bootstrap;
                let old = q.get(state, action)?;
                q.set(state, action, old + alpha * (target - old))?;
            }
            Self::ExpectedSarsa(q) => {
                let bootstrap = match next_action {
                    Some(_) => q.expected_value(next_state, policy.action_probs(next_state)?)?,
                    None => 0.0,
                };
                let target = reward + gamma * bootstrap;
                let old = q.get(state, action)?;
                q.set(state, action, old + alpha * (target - old))?;
            }
            Self::QLearning(q) => {
                let bootstrap = match next_action {
                    Some(_) => q.max_value(next_state)?,
                    None => 0.0,
                };
                let target = reward + gamma * bootstrap;
                let old = q.get(state, action)?;
                q.set(state, action, old + alpha * (target - old))?;
            }
            Self::Double(q1, q2) => {
                // fair coin picks which table learns this step; the other
                // one evaluates the chosen argmax
                let (learner, evaluator) = if rng.gen::<bool>() {
                    (&mut *q1, &*q2)
                } else {
                    (&mut *q2, &*q1)
                };
                let bootstrap = match next_action {
                    Some(_) => {
                        let argmax = learner
                            .greedy_action(next_state, rng)?
                            .expect("non-terminal states have actions");
                        evaluator.get(next_state, &argmax)?
                    }
                    None => 0.0,
                };
                let target = reward + gamma * bootstrap;
                let old = learner.get(state, action)?;
                learner.set(state, action, old + alpha * (target - old))?;
            }
            Self::Speedy {
                current,
                lagged,
                updates,
            } => {
                // textbook speedy update: harmonic step size over the
                // Bellman targets of the current and previous tables
                let alpha_t = 1.0 / (*updates as f64 + 1.0);
                let (bq_cur, bq_prev) = match next_action {
                    Some(_) => (
                        reward + gamma * current.max_value(next_state)?,
                        reward + gamma * lagged.max_value(next_state)?,
                    ),
                    None => (reward, reward),
                };
                let old = current.get(state, action)?;
                let new = old + alpha_t * (bq_prev - old) + (1.0 - alpha_t) * (bq_cur - bq_prev);
                lagged.set(state, action, old)?;
                current.set(state, action, new)?;
                *updates += 1;
            }
        }
        Ok(())
    }

    fn into_q_table(self) -> Result<QTable<S, A>> {
        match self {
            Self::Sarsa(q) | Self::ExpectedSarsa(q) | Self::QLearning(q) => Ok(q),
            Self::Double(q1, q2) => QTable::average(&q1, &q2),
            Self::Speedy { current, .. } => Ok(current),
        }
    }
}
