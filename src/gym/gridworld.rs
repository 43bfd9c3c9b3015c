use crate::env::{Environment, Outcome};
use crate::error::{MdpError, Result};

use super::grid::{shift, GridAction, Pos};

/// A rectangular grid MDP with absorbing goal cells.
///
/// Every move costs -1, moving off the grid leaves the position unchanged,
/// and all four directions stay legal at non-terminal states. Intended for
/// the dynamic-programming solvers, where its optimal values count steps
/// along shortest paths to the nearest terminal cell.
pub struct Gridworld {
    height: usize,
    width: usize,
    terminal_states: Vec<Pos>,
    starting_state: Pos,
}

impl Gridworld {
    /// Initialize a new `Gridworld`
    ///
    /// **Panics** if a terminal state or the starting state lies outside the
    /// grid
    pub fn new(
        height: usize,
        width: usize,
        terminal_states: Vec<Pos>,
        starting_state: Pos,
    ) -> Self {
        let in_bounds = |p: &Pos| p.0 < height && p.1 < width;
        assert!(
            terminal_states.iter().all(in_bounds),
            "terminal states must lie inside the grid"
        );
        assert!(in_bounds(&starting_state), "starting state must lie inside the grid");
        Self {
            height,
            width,
            terminal_states,
            starting_state,
        }
    }
}

impl Environment for Gridworld {
    type State = Pos;
    type Action = GridAction;

    fn states(&self) -> Vec<Pos> {
        (0..self.height)
            .flat_map(|row| (0..self.width).map(move |col| (row, col)))
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
        Ok(vec![Outcome {
            next_state: shift(*state, action.delta(), self.height, self.width),
            prob: 1.0,
        }])
    }

    fn reward(&self, _state: &Pos, _action: &GridAction, _next_state: &Pos) -> f64 {
        -1.0
    }

    fn starting_state(&self) -> Pos {
        self.starting_state
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gridworld_functional() {
        let env = Gridworld::new(4, 4, vec![(0, 0), (3, 3)], (2, 1));

        assert_eq!(env.states().len(), 16, "Every cell is a state");
        assert!(env.is_terminal(&(0, 0)));
        assert!(!env.is_terminal(&(2, 2)));
        assert!(env.legal_actions(&(0, 0)).is_empty());
        assert_eq!(env.legal_actions(&(1, 1)).len(), 4);

        let outcomes = env.outcomes(&(1, 1), &GridAction::Up).unwrap();
        assert_eq!(outcomes, vec![Outcome { next_state: (0, 1), prob: 1.0 }]);
        assert_eq!(env.reward(&(1, 1), &GridAction::Up, &(0, 1)), -1.0);
    }

    #[test]
    fn moves_off_the_grid_stay_in_place() {
        let env = Gridworld::new(4, 4, vec![(0, 0)], (2, 1));
        let outcomes = env.outcomes(&(0, 3), &GridAction::Up).unwrap();
        assert_eq!(outcomes[0].next_state, (0, 3));
    }
}
