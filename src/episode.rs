/// A single transition in an episode trace
#[derive(Clone, Debug, PartialEq)]
pub struct Transition<S, A> {
    /// The state the action was taken from
    pub state: S,
    /// The action taken
    pub action: A,
    /// The reward received for the transition
    pub reward: f64,
    /// The state the transition landed in (possibly terminal)
    pub next_state: S,
}

/// An ordered trace of one episode, from the starting state to termination
/// or truncation
pub type Episode<S, A> = Vec<Transition<S, A>>;
