use crate::env::{Environment, Outcome};
use crate::error::{MdpError, Result};

use super::grid::{shift, GridAction, Pos};

/// A grid with a per-column wind that shoves the walker after every move.
///
/// The wind of the column a move lands in is applied on top of the move; a
/// shove that would leave the grid is discarded rather than clamped.
pub struct WindyGridworld {
    height: usize,
    width: usize,
    terminal_states: Vec<Pos>,
    starting_state: Pos,
    forces: Vec<(i64, i64)>,
}

impl WindyGridworld {
    /// Initialize a new `WindyGridworld`
    ///
    /// `forces` holds one (row, column) shove per grid column.
    ///
    /// **Panics** if `forces` does not cover every column
    pub fn new(
        height: usize,
        width: usize,
        terminal_states: Vec<Pos>,
        starting_state: Pos,
        forces: Vec<(i64, i64)>,
    ) -> Self {
        assert_eq!(forces.len(), width, "one wind force per column");
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
            forces,
        }
    }
}

impl Environment for WindyGridworld {
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
        let moved = shift(*state, action.delta(), self.height, self.width);
        let blown = shift(moved, self.forces[moved.1], self.height, self.width);
        Ok(vec![Outcome {
            next_state: blown,
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

    /// Sutton's 7x10 layout: upward wind of strength 0-2 per column.
    fn classic() -> WindyGridworld {
        let strengths: [i64; 10] = [0, 0, 0, 1, 1, 1, 2, 2, 1, 0];
        let forces = strengths.iter().map(|s| (-s, 0)).collect();
        WindyGridworld::new(7, 10, vec![(3, 7)], (3, 0), forces)
    }

    #[test]
    fn windy_gridworld_functional() {
        let env = classic();
        assert_eq!(env.states().len(), 70);
        assert!(env.is_terminal(&(3, 7)));

        // calm column: a plain move
        let outcomes = env.outcomes(&(3, 0), &GridAction::Up).unwrap();
        assert_eq!(outcomes[0].next_state, (2, 0));
    }

    #[test]
    fn wind_shoves_after_the_move() {
        let env = classic();
        // moving right into column 3 catches a strength-1 updraft
        let outcomes = env.outcomes(&(3, 2), &GridAction::Right).unwrap();
        assert_eq!(outcomes[0].next_state, (2, 3));
    }

    #[test]
    fn a_shove_off_the_grid_is_discarded() {
        let env = classic();
        // row 0 in a windy column: the updraft would leave the grid
        let outcomes = env.outcomes(&(0, 5), &GridAction::Right).unwrap();
        assert_eq!(outcomes[0].next_state, (0, 6), "The move lands, the shove does not");
    }
}
