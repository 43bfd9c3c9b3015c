use crate::env::{Environment, Outcome};
use crate::error::{MdpError, Result};

use super::grid::{shift, GridAction, Pos};

/// A frozen lake: reach a goal without falling through a hole.
///
/// Holes and goals are both terminal; reaching a goal pays 1, everything
/// else pays 0. On a slippery lake every move lands on the intended cell or
/// slips to one of the two perpendicular neighbors, each with probability
/// 1/3; slips that collide on one cell merge their probability.
pub struct FrozenLake {
    height: usize,
    width: usize,
    goals: Vec<Pos>,
    holes: Vec<Pos>,
    starting_state: Pos,
    slippery: bool,
}

impl FrozenLake {
    /// Initialize a new `FrozenLake`
    pub fn new(
        height: usize,
        width: usize,
        goals: Vec<Pos>,
        holes: Vec<Pos>,
        starting_state: Pos,
        slippery: bool,
    ) -> Self {
        let in_bounds = |p: &Pos| p.0 < height && p.1 < width;
        assert!(
            goals.iter().chain(&holes).all(in_bounds),
            "goal and hole cells must lie inside the grid"
        );
        assert!(in_bounds(&starting_state), "starting state must lie inside the grid");
        Self {
            height,
            width,
            goals,
            holes,
            starting_state,
            slippery,
        }
    }
}

impl Environment for FrozenLake {
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
        self.goals.contains(state) || self.holes.contains(state)
    }

    fn outcomes(&self, state: &Pos, action: &GridAction) -> Result<Vec<Outcome<Pos>>> {
        if !self.is_action_legal(state, action) {
            return Err(MdpError::illegal_action(state, action));
        }
        if !self.slippery {
            return Ok(vec![Outcome {
                next_state: shift(*state, action.delta(), self.height, self.width),
                prob: 1.0,
            }]);
        }

        let [left, right] = action.perpendicular();
        let mut outcomes: Vec<Outcome<Pos>> = Vec::with_capacity(3);
        for direction in [*action, left, right] {
            let next_state = shift(*state, direction.delta(), self.height, self.width);
            // directions colliding on one cell accumulate, keeping the
            // distribution summed to 1
            match outcomes.iter_mut().find(|o| o.next_state == next_state) {
                Some(outcome) => outcome.prob += 1.0 / 3.0,
                None => outcomes.push(Outcome {
                    next_state,
                    prob: 1.0 / 3.0,
                }),
            }
        }
        Ok(outcomes)
    }

    fn reward(&self, _state: &Pos, _action: &GridAction, next_state: &Pos) -> f64 {
        if self.goals.contains(next_state) {
            1.0
        } else {
            0.0
        }
    }

    fn starting_state(&self) -> Pos {
        self.starting_state
    }
}
