//! Breadth-first search over board states, advanced one phase at a time.
//!
//! Each call to [`Solver::step`] performs either an expansion of the frontier
//! head into fresh neighbors or a commit of those neighbors into the frontier
//! and the visited set, so a caller can observe the search between the two.

use std::num::NonZeroUsize;
use std::sync::mpsc;
use std::time::Duration;

use crate::tape::{Tape, TapeError};
use crate::{BoardState, Direction};

type IndexMap<K, V> = indexmap::IndexMap<K, V, fxhash::FxBuildHasher>;

/// Parent index of the root state.
const ROOT_PARENT: usize = !0;

const DEFAULT_WINDOW: NonZeroUsize = match NonZeroUsize::new(9) {
    Some(size) => size,
    None => unreachable!(),
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, derive_more::IsVariant)]
pub enum Mode {
    Solving,
    Victory,
    Defeated,
}

/// Which half of a search step runs next.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Phase {
    Expand,
    /// Neighbors produced by the visited state at `parent` await commit.
    Commit { parent: usize },
}

/// Terminal outcome, delivered once to the solver's [`Sink`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notification {
    /// `path` runs from `root` to the solved state, both inclusive.
    Victory {
        root: BoardState,
        path: Vec<BoardState>,
    },
    Defeat {
        root: BoardState,
    },
}

pub trait Sink {
    fn notify(&mut self, notification: Notification);
}

impl<F: FnMut(Notification)> Sink for F {
    fn notify(&mut self, notification: Notification) {
        self(notification)
    }
}

impl Sink for mpsc::Sender<Notification> {
    fn notify(&mut self, notification: Notification) {
        if self.send(notification).is_err() {
            log::debug!("Notification receiver is gone");
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SolverConfig {
    /// Number of items each tape shows at once.
    pub window_size: usize,
    /// Wall-clock time between steps when driven by [`Solver::update`].
    pub step_interval: Duration,
}

impl Default for SolverConfig {
    fn default() -> Self {
        Self {
            window_size: DEFAULT_WINDOW.get(),
            step_interval: Duration::from_millis(100),
        }
    }
}

/// Converts elapsed time into a number of due steps.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Cadence {
    interval: Duration,
    pending: Duration,
}

impl Cadence {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            pending: Duration::ZERO,
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Accumulates `elapsed` and returns how many steps are due. A zero
    /// interval yields exactly one step per tick.
    pub fn tick(&mut self, elapsed: Duration) -> usize {
        if self.interval.is_zero() {
            return 1;
        }
        self.pending += elapsed;
        let mut due = 0;
        while self.pending >= self.interval {
            self.pending -= self.interval;
            due += 1;
        }
        due
    }
}

pub struct Solver<S> {
    root: BoardState,
    sink: S,
    mode: Mode,
    phase: Phase,
    frontier: Tape<BoardState>,
    neighbors: Tape<BoardState>,
    history: Tape<BoardState>,
    /// Every state ever enqueued, mapped to its parent's index in this map.
    visited: IndexMap<BoardState, usize>,
    current: Option<usize>,
    solution: Option<Vec<BoardState>>,
    cadence: Cadence,
    steps: usize,
}

impl<S: Sink> Solver<S> {
    pub fn new(root: BoardState, sink: S) -> Self {
        let interval = SolverConfig::default().step_interval;
        Self::build(root, DEFAULT_WINDOW, interval, sink)
    }

    pub fn with_config(
        root: BoardState,
        config: SolverConfig,
        sink: S,
    ) -> Result<Self, TapeError> {
        let window = NonZeroUsize::new(config.window_size).ok_or(TapeError::ZeroWindow)?;
        Ok(Self::build(root, window, config.step_interval, sink))
    }

    fn build(root: BoardState, window: NonZeroUsize, interval: Duration, sink: S) -> Self {
        let mut frontier = Tape::with_window(window);
        frontier.add(root.clone());
        frontier.set_head(0);
        let mut history = Tape::with_window(window);
        history.add(root.clone());
        let mut visited = IndexMap::default();
        visited.insert(root.clone(), ROOT_PARENT);

        Self {
            root,
            sink,
            mode: Mode::Solving,
            phase: Phase::Expand,
            frontier,
            neighbors: Tape::with_window(window),
            history,
            visited,
            current: None,
            solution: None,
            cadence: Cadence::new(interval),
            steps: 0,
        }
    }

    /// Runs one phase. Does nothing once the search has finished.
    pub fn step(&mut self) -> Mode {
        if !self.mode.is_solving() {
            return self.mode;
        }
        self.steps += 1;
        match self.phase {
            Phase::Expand => {
                if let Some(parent) = self.expand() {
                    self.phase = Phase::Commit { parent };
                }
            }
            Phase::Commit { parent } => {
                self.commit(parent);
                self.phase = Phase::Expand;
            }
        }
        self.mode
    }

    /// Feeds wall-clock time into the cadence and runs the steps it releases.
    pub fn update(&mut self, elapsed: Duration) -> Mode {
        for _ in 0..self.cadence.tick(elapsed) {
            if !self.step().is_solving() {
                break;
            }
        }
        self.mode
    }

    /// Steps until the search finishes or `max_steps` steps have run.
    pub fn run(&mut self, max_steps: Option<usize>) -> Mode {
        let mut taken = 0;
        while self.mode.is_solving() && max_steps.map_or(true, |max| taken < max) {
            self.step();
            taken += 1;
        }
        self.mode
    }

    /// Pops the frontier head and collects its unvisited neighbors. Returns
    /// the popped state's index unless the search has just finished.
    fn expand(&mut self) -> Option<usize> {
        self.neighbors.clear();

        let Some(state) = self.frontier.pop_front() else {
            log::info!(
                "Search exhausted after visiting {} states",
                self.visited.len()
            );
            self.mode = Mode::Defeated;
            self.current = None;
            self.sink.notify(Notification::Defeat {
                root: self.root.clone(),
            });
            return None;
        };
        let index = self
            .visited
            .get_index_of(&state)
            .expect("Frontier states are always visited");
        self.current = Some(index);

        if state.is_victory() {
            let path = self.path_to(index);
            log::info!(
                "Solved in {} moves after visiting {} states",
                path.len() - 1,
                self.visited.len()
            );
            self.mode = Mode::Victory;
            self.solution = Some(path.clone());
            self.sink.notify(Notification::Victory {
                root: self.root.clone(),
                path,
            });
            return None;
        }

        for dir in state.valid_moves() {
            let Some(next) = state.apply(dir) else { continue };
            if self.visited.contains_key(&next) {
                continue;
            }
            log::trace!("Neighbor {dir} of state {index}: player at {}", next.player());
            self.neighbors.add(next);
        }
        log::debug!(
            "Expanded state {index}: {} new neighbors, {} queued",
            self.neighbors.len(),
            self.frontier.len()
        );
        Some(index)
    }

    fn commit(&mut self, parent: usize) {
        for state in self.neighbors.drain() {
            self.history.add(state.clone());
            self.frontier.add(state.clone());
            self.visited.entry(state).or_insert(parent);
        }
        log::debug!(
            "Committed neighbors of state {parent}: {} queued, {} visited",
            self.frontier.len(),
            self.visited.len()
        );
    }

    fn path_to(&self, index: usize) -> Vec<BoardState> {
        let mut path = std::iter::successors(Some(index), |&i| {
            let (_, &parent) = self.visited.get_index(i)?;
            (parent != ROOT_PARENT).then_some(parent)
        })
        .filter_map(|i| self.visited.get_index(i).map(|(state, _)| state.clone()))
        .collect::<Vec<_>>();
        path.reverse();
        path
    }
}

impl<S> Solver<S> {
    pub fn root(&self) -> &BoardState {
        &self.root
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// Number of phases run so far.
    pub fn steps(&self) -> usize {
        self.steps
    }

    /// The state most recently taken off the frontier.
    pub fn current(&self) -> Option<&BoardState> {
        let (state, _) = self.visited.get_index(self.current?)?;
        Some(state)
    }

    pub fn frontier(&self) -> &Tape<BoardState> {
        &self.frontier
    }

    /// Candidates from the last expansion that have not been committed yet.
    pub fn neighbors(&self) -> &Tape<BoardState> {
        &self.neighbors
    }

    /// Every visited state in insertion order.
    pub fn history(&self) -> &Tape<BoardState> {
        &self.history
    }

    pub fn visited_len(&self) -> usize {
        self.visited.len()
    }

    pub fn is_visited(&self, state: &BoardState) -> bool {
        self.visited.contains_key(state)
    }

    pub fn visited(&self) -> impl Iterator<Item = &BoardState> + '_ {
        self.visited.keys()
    }

    /// The state that first reached `state`, if it was visited and is not the root.
    pub fn parent_of(&self, state: &BoardState) -> Option<&BoardState> {
        let &parent = self.visited.get(state)?;
        let (parent, _) = self.visited.get_index(parent)?;
        Some(parent)
    }

    /// The path from root to goal, once solved.
    pub fn solution(&self) -> Option<&[BoardState]> {
        self.solution.as_deref()
    }
}

/// Recovers the direction of each transition along `path`. Returns `None` if
/// two consecutive states are not one move apart.
pub fn path_directions(path: &[BoardState]) -> Option<Vec<Direction>> {
    path.windows(2)
        .map(|w| {
            Direction::ALL
                .into_iter()
                .find(|&dir| w[0].apply(dir).as_ref() == Some(&w[1]))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use std::collections::{HashMap, HashSet, VecDeque};

    use super::*;

    fn state(map: &str) -> BoardState {
        map.parse().unwrap()
    }

    type ChannelSolver = Solver<mpsc::Sender<Notification>>;

    fn channel_solver(root: BoardState) -> (ChannelSolver, mpsc::Receiver<Notification>) {
        let (tx, rx) = mpsc::channel();
        (Solver::new(root, tx), rx)
    }

    fn reachable(root: &BoardState) -> HashMap<BoardState, usize> {
        let mut dist = HashMap::from([(root.clone(), 0)]);
        let mut queue = VecDeque::from([root.clone()]);
        while let Some(state) = queue.pop_front() {
            let d = dist[&state];
            for dir in Direction::ALL {
                if let Some(next) = state.apply(dir) {
                    if !dist.contains_key(&next) {
                        dist.insert(next.clone(), d + 1);
                        queue.push_back(next);
                    }
                }
            }
        }
        dist
    }

    const CORRIDOR: &str = "
        ######
        #pb_.#
        ######
    ";

    const DEAD: &str = "
        #####
        #_.b#
        #..p#
        #####
    ";

    const OPEN: &str = "
        #######
        #.._..#
        #.b...#
        #..p..#
        #######
    ";

    #[test]
    fn test_single_push_solution() {
        let root = state(CORRIDOR);
        let (mut solver, rx) = channel_solver(root.clone());

        assert_eq!(solver.step(), Mode::Solving);
        assert_eq!(solver.phase(), Phase::Commit { parent: 0 });
        assert_eq!(solver.current(), Some(&root));
        assert_eq!(solver.neighbors().len(), 1);
        assert!(solver.frontier().is_empty());
        assert_eq!(solver.visited_len(), 1);

        assert_eq!(solver.step(), Mode::Solving);
        assert_eq!(solver.phase(), Phase::Expand);
        assert!(solver.neighbors().is_empty());
        assert_eq!(solver.frontier().len(), 1);
        assert_eq!(solver.visited_len(), 2);
        assert_eq!(solver.history().len(), 2);

        assert_eq!(solver.step(), Mode::Victory);
        let path = solver.solution().unwrap().to_vec();
        assert_eq!(path.len(), 2);
        assert_eq!(path[0], root);
        assert!(path[1].is_victory());
        assert_eq!(path_directions(&path), Some(vec![Direction::Right]));
        assert_eq!(solver.parent_of(&path[1]), Some(&root));
        assert_eq!(solver.parent_of(&root), None);

        let notifications = rx.try_iter().collect::<Vec<_>>();
        assert_eq!(notifications, [Notification::Victory { root, path }]);
    }

    #[test]
    fn test_frozen_boulder_is_defeated() {
        let root = state(DEAD);
        let (mut solver, rx) = channel_solver(root.clone());

        assert_eq!(solver.run(None), Mode::Defeated);
        assert!(solver.frontier().is_empty());
        assert!(solver.solution().is_none());

        let expected = reachable(&root);
        assert_eq!(solver.visited_len(), 5);
        assert_eq!(solver.visited_len(), expected.len());
        assert!(expected.keys().all(|state| solver.is_visited(state)));

        let steps = solver.steps();
        assert_eq!(solver.step(), Mode::Defeated);
        assert_eq!(solver.steps(), steps);
        assert_eq!(rx.try_iter().collect::<Vec<_>>(), [Notification::Defeat { root }]);
    }

    #[test]
    fn test_no_targets_is_solved_at_once() {
        let root = state("p.");
        let mut solver = Solver::new(root.clone(), |_: Notification| {});
        assert_eq!(solver.step(), Mode::Victory);
        assert_eq!(solver.solution(), Some(&[root][..]));
    }

    #[test]
    fn test_path_is_shortest() {
        let root = state(OPEN);
        let dist = reachable(&root);
        let best = dist
            .iter()
            .filter(|(state, _)| state.is_victory())
            .map(|(_, &d)| d)
            .min()
            .unwrap();

        let (mut solver, _rx) = channel_solver(root.clone());
        assert_eq!(solver.run(None), Mode::Victory);
        let path = solver.solution().unwrap();
        assert_eq!(path.len() - 1, best);
        assert_eq!(path.first(), Some(&root));

        let dirs = path_directions(path).unwrap();
        let mut replay = root;
        for dir in dirs {
            replay.go(dir).unwrap();
        }
        assert!(replay.is_victory());
    }

    #[test]
    fn test_visited_only_grows() {
        let (mut solver, _rx) = channel_solver(state(OPEN));
        let mut seen = Vec::new();
        while solver.step().is_solving() {
            assert!(solver.visited_len() >= seen.len());
            assert_eq!(solver.history().len(), solver.visited_len());
            assert!(seen.iter().all(|state| solver.is_visited(state)));
            seen = solver.history().iter().cloned().collect();
        }
        let unique = seen.iter().collect::<HashSet<_>>();
        assert_eq!(unique.len(), seen.len());
    }

    #[test]
    fn test_step_cap() {
        let (mut solver, rx) = channel_solver(state(OPEN));
        assert_eq!(solver.run(Some(3)), Mode::Solving);
        assert_eq!(solver.steps(), 3);
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_update_follows_cadence() {
        let config = SolverConfig {
            window_size: 4,
            step_interval: Duration::from_millis(100),
        };
        let mut solver =
            Solver::with_config(state(OPEN), config, |_: Notification| {}).unwrap();
        solver.update(Duration::from_millis(50));
        assert_eq!(solver.steps(), 0);
        solver.update(Duration::from_millis(50));
        assert_eq!(solver.steps(), 1);
        solver.update(Duration::from_millis(250));
        assert_eq!(solver.steps(), 3);
        assert_eq!(solver.history().window_size(), 4);
    }

    #[test]
    fn test_zero_interval_steps_once_per_tick() {
        let mut cadence = Cadence::new(Duration::ZERO);
        assert_eq!(cadence.tick(Duration::ZERO), 1);
        assert_eq!(cadence.tick(Duration::from_secs(5)), 1);
    }

    #[test]
    fn test_zero_window_is_rejected() {
        let config = SolverConfig {
            window_size: 0,
            ..SolverConfig::default()
        };
        let solver = Solver::with_config(state(CORRIDOR), config, |_: Notification| {});
        assert!(matches!(solver, Err(TapeError::ZeroWindow)));
    }

    #[test]
    fn test_callback_sink_fires_once() {
        let mut count = 0;
        let mut solver = Solver::new(state(CORRIDOR), |_: Notification| count += 1);
        solver.run(None);
        solver.run(None);
        drop(solver);
        assert_eq!(count, 1);
    }
}
