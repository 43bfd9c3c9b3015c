use crate::env::{Environment, Outcome};
use crate::error::{MdpError, Result};

use super::grid::{shift, GridAction, Pos};

/// The cliff-walking grid: stepping into a cliff cell throws the walker
/// back to the start at a heavy penalty.
///
/// Cliff cells never appear as resulting states; the redirect happens
/// inside the transition, so they are unreachable rather than terminal.
pub struct CliffWalking {
    height: usize,
    width: usize,
    terminal_states: Vec<Pos>,
    starting_state: Pos,
    cliffs: Vec<Pos>,
    penalty: f64,
}

impl CliffWalking {
    /// Initialize a new `CliffWalking` environment
    ///
    /// `penalty` is the reward for any transition that steps into a cliff
    /// cell; every other transition pays -1.
    pub fn new(
        height: usize,
        width: usize,
        terminal_states: Vec<Pos>,
        starting_state: Pos,
        cliffs: Vec<Pos>,
        penalty: f64,
    ) -> Self {
        let in_bounds = |p: &Pos| p.0 < height && p.1 < width;
        assert!(
            terminal_states.iter().chain(&cliffs).all(in_bounds),
            "terminal and cliff cells must lie inside the grid"
        );
        assert!(in_bounds(&starting_state), "starting state must lie inside the grid");
        Self {
            height,
            width,
            terminal_states,
            starting_state,
            cliffs,
            penalty,
        }
    }

    /// Where a move actually lands before any cliff redirect
    fn target(&self, state: &Pos, action: &GridAction) -> Pos {
        shift(*state, action.delta(), self.height, self.width)
    }
}

impl Environment for CliffWalking {
    type State = Pos;
    type Action = GridAction;

    fn states(&self) -> Vec<Pos> {
        (0..self.height)
            .flat_map(|row| (0..self.width).map(move |col| (row, col)))
            .filter(|pos| !self.cliffs.contains(pos))
            .collect()
    }

    fn actions(&self) -> Vec<GridAction> {
        GridAction::ALL.to_vec()
    }

    fn is_terminal(&self, state: &Pos) -> bool {
        self.terminal_states.contains(state)
    }

    fn outcomes(&self, state: &Pos, action: &GridAction) -> Result<Vec<Outcome<Pos>>> {
        if !self.is_action_legal(state, action) {
            return Err(MdpError::illegal_action(state, action));
        }
        let target = self.target(state, action);
        let next_state = if self.cliffs.contains(&target) {
            self.starting_state
        } else {
            target
        };
        Ok(vec![Outcome {
            next_state,
            prob: 1.0,
        }])
    }

    fn reward(&self, state: &Pos, action: &GridAction, _next_state: &Pos) -> f64 {
        // recomputing the un-redirected target keeps walking onto the start
        // tile distinct from being thrown back to it
        if self.cliffs.contains(&self.target(state, action)) {
            self.penalty
        } else {
            -1.0
        }
    }

    fn starting_state(&self) -> Pos {
        self.starting_state
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// The classic 4x12 layout: start bottom-left, goal bottom-right, the
    /// cliff strip between them.
    fn classic() -> CliffWalking {
        let cliffs: Vec<Pos> = (1..11).map(|col| (3, col)).collect();
        CliffWalking::new(4, 12, vec![(3, 11)], (3, 0), cliffs, -100.0)
    }

    #[test]
    fn cliff_walking_functional() {
        let env = classic();
        assert_eq!(env.states().len(), 4 * 12 - 10, "Cliff cells are not states");
        assert!(env.is_terminal(&(3, 11)));

        let outcomes = env.outcomes(&(2, 5), &GridAction::Up).unwrap();
        assert_eq!(outcomes[0].next_state, (1, 5));
        assert_eq!(env.reward(&(2, 5), &GridAction::Up, &(1, 5)), -1.0);
    }

    #[test]
    fn stepping_into_the_cliff_redirects_to_start() {
        let env = classic();
        let outcomes = env.outcomes(&(2, 5), &GridAction::Down).unwrap();
        assert_eq!(outcomes[0].next_state, (3, 0), "Thrown back to the start");
        assert_eq!(env.reward(&(2, 5), &GridAction::Down, &(3, 0)), -100.0);
    }

    #[test]
    fn walking_onto_the_start_is_not_penalized() {
        let env = classic();
        let outcomes = env.outcomes(&(2, 0), &GridAction::Down).unwrap();
        assert_eq!(outcomes[0].next_state, (3, 0));
        assert_eq!(
            env.reward(&(2, 0), &GridAction::Down, &(3, 0)),
            -1.0,
            "Only cliff transitions pay the penalty"
        );
    }
}
