use std::collections::HashMap;
use std::fmt::Debug;
use std::hash::Hash;

use rand::rngs::StdRng;
use rand::seq::SliceRandom;

use crate::env::Environment;
use crate::error::{MdpError, Result};

/// A state-value table, transient output of the dynamic-programming
/// routines; terminal entries stay pinned at 0.
pub type ValueTable<S> = HashMap<S, f64>;

/// A tabular action-value function: state → action → estimated return.
///
/// Built eagerly over state × legal-action before any backup runs, because
/// the backup equations index unconditionally. Terminal states carry an
/// empty row, so a missing row means the state is outside the declared state
/// space rather than terminal.
#[derive(Clone, Debug)]
pub struct QTable<S, A> {
    values: HashMap<S, HashMap<A, f64>>,
}

impl<S, A> PartialEq for QTable<S, A>
where
    S: Eq + Hash,
    A: Eq + Hash,
{
    fn eq(&self, other: &Self) -> bool {
        self.values == other.values
    }
}

impl<S, A> QTable<S, A>
where
    S: Clone + Eq + Hash + Debug,
    A: Clone + Eq + Hash + Debug,
{
    /// Build a zero-initialized table over the whole state space.
    ///
    /// **Errors** with [`MdpError::EmptyStateSpace`] if the environment
    /// declares no states.
    pub fn zeroed<E>(env: &E) -> Result<Self>
    where
        E: Environment<State = S, Action = A>,
    {
        let states = env.states();
        if states.is_empty() {
            return Err(MdpError::EmptyStateSpace);
        }

        let mut values = HashMap::with_capacity(states.len());
        for state in states {
            let row = env
                .legal_actions(&state)
                .into_iter()
                .map(|a| (a, 0.0))
                .collect();
            values.insert(state, row);
        }
        Ok(Self { values })
    }

    fn row(&self, state: &S) -> Result<&HashMap<A, f64>> {
        self.values
            .get(state)
            .ok_or_else(|| MdpError::unknown_state(state))
    }

    /// Get the estimate for a state-action pair
    pub fn get(&self, state: &S, action: &A) -> Result<f64> {
        self.row(state)?
            .get(action)
            .copied()
            .ok_or_else(|| MdpError::illegal_action(state, action))
    }

    /// Overwrite the estimate for a state-action pair
    pub fn set(&mut self, state: &S, action: &A, value: f64) -> Result<()> {
        let row = self
            .values
            .get_mut(state)
            .ok_or_else(|| MdpError::unknown_state(state))?;
        match row.get_mut(action) {
            Some(v) => {
                *v = value;
                Ok(())
            }
            None => Err(MdpError::illegal_action(state, action)),
        }
    }

    /// Max over the state's action estimates; 0 for a terminal state's empty
    /// row, which is exactly the dropped bootstrap term.
    pub fn max_value(&self, state: &S) -> Result<f64> {
        let row = self.row(state)?;
        if row.is_empty() {
            return Ok(0.0);
        }
        Ok(row.values().cloned().fold(f64::NEG_INFINITY, f64::max))
    }

    /// An action attaining the maximum estimate, ties broken uniformly at
    /// random; `None` for a terminal state's empty row.
    pub fn greedy_action(&self, state: &S, rng: &mut StdRng) -> Result<Option<A>> {
        let row = self.row(state)?;
        if row.is_empty() {
            return Ok(None);
        }
        let max = row.values().cloned().fold(f64::NEG_INFINITY, f64::max);
        let best: Vec<&A> = row.iter().filter(|(_, v)| **v == max).map(|(a, _)| a).collect();
        Ok(Some((*best.choose(rng).expect("non-empty row")).clone()))
    }

    /// The actions recorded for a state (its legal actions; empty for a
    /// terminal state)
    pub fn actions(&self, state: &S) -> Result<Vec<A>> {
        Ok(self.row(state)?.keys().cloned().collect())
    }

    /// Probability-weighted expectation `Σ_a π(a|s)·Q(s,a)` over the given
    /// action distribution
    pub fn expected_value(&self, state: &S, probs: &HashMap<A, f64>) -> Result<f64> {
        let row = self.row(state)?;
        let mut total = 0.0;
        for (action, p) in probs {
            let q = row
                .get(action)
                .copied()
                .ok_or_else(|| MdpError::illegal_action(state, action))?;
            total += p * q;
        }
        Ok(total)
    }

    /// Elementwise mean of two tables over the same state-action layout
    pub fn average(a: &Self, b: &Self) -> Result<Self> {
        let mut values = HashMap::with_capacity(a.values.len());
        for (state, row_a) in &a.values {
            let row_b = b.row(state)?;
            let mut row = HashMap::with_capacity(row_a.len());
            for (action, qa) in row_a {
                let qb = row_b
                    .get(action)
                    .copied()
                    .ok_or_else(|| MdpError::illegal_action(state, action))?;
                row.insert(action.clone(), (qa + qb) / 2.0);
            }
            values.insert(state.clone(), row);
        }
        Ok(Self { values })
    }

    /// Iterate over every (state, action, estimate) entry
    pub fn iter(&self) -> impl Iterator<Item = (&S, &A, f64)> {
        self.values
            .iter()
            .flat_map(|(s, row)| row.iter().map(move |(a, v)| (s, a, *v)))
    }
}

#[cfg(test)]
mod tests {
    use rand::SeedableRng;

    use crate::env::tests::{Corridor, TwoChoice, TwoChoiceAction};

    use super::*;

    #[test]
    fn zeroed_populates_state_by_legal_action() {
        let env = TwoChoice;
        let q = QTable::zeroed(&env).unwrap();

        assert_eq!(q.get(&0, &TwoChoiceAction::Advance).unwrap(), 0.0);
        assert_eq!(q.get(&1, &TwoChoiceAction::Retreat).unwrap(), 0.0);
        assert!(
            matches!(
                q.get(&0, &TwoChoiceAction::Retreat),
                Err(MdpError::IllegalAction { .. })
            ),
            "Illegal pairs are absent, not zero"
        );
        assert!(matches!(q.get(&9, &TwoChoiceAction::Advance), Err(MdpError::UnknownState { .. })));
    }

    #[test]
    fn terminal_rows_are_empty() {
        let env = Corridor::<3>;
        let q = QTable::zeroed(&env).unwrap();
        let mut rng = StdRng::seed_from_u64(0);

        assert_eq!(q.max_value(&2).unwrap(), 0.0, "Empty row backs up as 0");
        assert_eq!(q.greedy_action(&2, &mut rng).unwrap(), None);
    }

    #[test]
    fn greedy_action_prefers_max_estimate() {
        let env = TwoChoice;
        let mut q = QTable::zeroed(&env).unwrap();
        q.set(&0, &TwoChoiceAction::Jump, 2.5).unwrap();

        let mut rng = StdRng::seed_from_u64(3);
        for _ in 0..10 {
            assert_eq!(
                q.greedy_action(&0, &mut rng).unwrap(),
                Some(TwoChoiceAction::Jump)
            );
        }
    }

    #[test]
    fn max_value_handles_all_negative_rows() {
        let env = TwoChoice;
        let mut q = QTable::zeroed(&env).unwrap();
        q.set(&0, &TwoChoiceAction::Advance, -2.0).unwrap();
        q.set(&0, &TwoChoiceAction::Jump, -5.0).unwrap();
        assert_eq!(q.max_value(&0).unwrap(), -2.0);
    }

    #[test]
    fn expected_value_weights_by_probability() {
        let env = TwoChoice;
        let mut q = QTable::zeroed(&env).unwrap();
        q.set(&0, &TwoChoiceAction::Advance, 2.0).unwrap();
        q.set(&0, &TwoChoiceAction::Jump, -4.0).unwrap();

        let probs = HashMap::from([(TwoChoiceAction::Advance, 0.75), (TwoChoiceAction::Jump, 0.25)]);
        assert_eq!(q.expected_value(&0, &probs).unwrap(), 0.5);
    }

    #[test]
    fn average_lies_between_pointwise_min_and_max() {
        let env = TwoChoice;
        let mut q1 = QTable::zeroed(&env).unwrap();
        let mut q2 = QTable::zeroed(&env).unwrap();
        q1.set(&0, &TwoChoiceAction::Advance, 3.0).unwrap();
        q2.set(&0, &TwoChoiceAction::Advance, -1.0).unwrap();
        q1.set(&1, &TwoChoiceAction::Retreat, 0.5).unwrap();
        q2.set(&1, &TwoChoiceAction::Retreat, 0.7).unwrap();

        let avg = QTable::average(&q1, &q2).unwrap();
        for (s, a, v) in avg.iter() {
            let v1 = q1.get(s, a).unwrap();
            let v2 = q2.get(s, a).unwrap();
            assert!(v >= v1.min(v2) && v <= v1.max(v2), "Average stays inside [min, max]");
        }
        assert_eq!(avg.get(&0, &TwoChoiceAction::Advance).unwrap(), 1.0);
    }
}
