//! [`SearchStrategy`] – in-place scan used while the target marker is out of
//! sight.
//!
//! The robot rotates at a constant rate in one direction for a timing
//! window, then reverses.  The first window of a task is short (a quick
//! glance around the initial heading); every later window is longer so the
//! sweep widens.  Timing is based on elapsed wall time, not on call count,
//! so at most one reversal happens per call however long the gap between
//! calls was.
//!
//! # Example
//!
//! ```rust
//! use std::time::{Duration, Instant};
//! use dockbot_runtime::search::SearchStrategy;
//! use dockbot_types::{SearchConfig, TurnDirection};
//!
//! let search = SearchStrategy::new(SearchConfig::default());
//! let t0 = Instant::now();
//!
//! let (cmd, state) = search.decide(t0, search.initial_state());
//! assert!(cmd.angular.z < 0.0); // starts turning right
//!
//! let (cmd, state) = search.decide(t0 + Duration::from_secs(4), state);
//! assert_eq!(state.direction, TurnDirection::Left);
//! assert!(cmd.angular.z > 0.0);
//! ```

use std::time::{Duration, Instant};

use dockbot_types::{SearchConfig, TurnDirection, VelocityCommand};
use tracing::debug;

/// Scan bookkeeping for one docking task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SearchState {
    pub direction: TurnDirection,
    /// Start of the current window; `None` until the first search step.
    pub window_start: Option<Instant>,
    /// `true` until the first window of the task has elapsed.
    pub using_startup_window: bool,
}

impl SearchState {
    pub fn new(direction: TurnDirection) -> Self {
        Self {
            direction,
            window_start: None,
            using_startup_window: true,
        }
    }
}

/// Decides the scan motion from the current [`SearchState`].
#[derive(Debug, Clone)]
pub struct SearchStrategy {
    config: SearchConfig,
}

impl SearchStrategy {
    pub fn new(config: SearchConfig) -> Self {
        Self { config }
    }

    /// Fresh state for a new task: short window, configured direction.
    pub fn initial_state(&self) -> SearchState {
        SearchState::new(self.config.initial_direction)
    }

    /// Length of the window `state` is currently in.
    pub fn window(&self, state: &SearchState) -> Duration {
        if state.using_startup_window {
            self.config.first_window()
        } else {
            self.config.subsequent_window()
        }
    }

    /// Compute the scan command for `now` and the state to carry forward.
    ///
    /// The command is a pure rotation at `turn_speed` in the active
    /// direction.  When the current window has elapsed the direction flips
    /// before the command is built and a long window starts at `now`.
    pub fn decide(&self, now: Instant, state: SearchState) -> (VelocityCommand, SearchState) {
        let mut next = state;
        match state.window_start {
            None => next.window_start = Some(now),
            Some(start) if now.saturating_duration_since(start) >= self.window(&state) => {
                next.direction = state.direction.flipped();
                next.window_start = Some(now);
                next.using_startup_window = false;
                debug!(direction = ?next.direction, "search window elapsed; reversing scan");
            }
            Some(_) => {}
        }

        let command = VelocityCommand::turn(next.direction.sign() * self.config.turn_speed);
        (command, next)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn secs(s: f64) -> Duration {
        Duration::from_secs_f64(s)
    }

    #[test]
    fn first_call_starts_short_window_without_flipping() {
        let search = SearchStrategy::new(SearchConfig::default());
        let t0 = Instant::now();
        let (cmd, state) = search.decide(t0, search.initial_state());
        assert_eq!(state.direction, TurnDirection::Right);
        assert_eq!(state.window_start, Some(t0));
        assert!(state.using_startup_window);
        assert_eq!(cmd, VelocityCommand::turn(-0.5));
    }

    #[test]
    fn holds_direction_inside_window() {
        let search = SearchStrategy::new(SearchConfig::default());
        let t0 = Instant::now();
        let (_, mut state) = search.decide(t0, search.initial_state());
        for ms in [500u64, 1500, 2900] {
            let (cmd, next) = search.decide(t0 + Duration::from_millis(ms), state);
            assert_eq!(next.direction, TurnDirection::Right);
            assert!(cmd.linear == dockbot_types::Vector3::zero());
            state = next;
        }
        assert_eq!(state.window_start, Some(t0));
    }

    #[test]
    fn three_calls_over_seven_seconds_flip_exactly_once() {
        let search = SearchStrategy::new(SearchConfig::default());
        let t0 = Instant::now();
        let mut state = search.initial_state();
        let mut flips = 0;
        for t in [0.0, 3.5, 7.0] {
            let before = state.direction;
            let (_, next) = search.decide(t0 + secs(t), state);
            if next.direction != before {
                flips += 1;
            }
            state = next;
        }
        assert_eq!(flips, 1);
        assert!(!state.using_startup_window);
        assert_eq!(state.direction, TurnDirection::Left);
    }

    #[test]
    fn long_pause_flips_only_once_per_call() {
        let search = SearchStrategy::new(SearchConfig::default());
        let t0 = Instant::now();
        let (_, state) = search.decide(t0, search.initial_state());
        let (_, state) = search.decide(t0 + secs(60.0), state);
        assert_eq!(state.direction, TurnDirection::Left);
        assert_eq!(state.window_start, Some(t0 + secs(60.0)));
        // Next call right after must not flip again.
        let (_, state) = search.decide(t0 + secs(60.1), state);
        assert_eq!(state.direction, TurnDirection::Left);
    }

    #[test]
    fn later_windows_use_the_long_duration() {
        let search = SearchStrategy::new(SearchConfig::default());
        let t0 = Instant::now();
        let (_, state) = search.decide(t0, search.initial_state());
        let (_, state) = search.decide(t0 + secs(3.0), state);
        assert_eq!(search.window(&state), secs(6.0));
        // 5 s into the long window: no flip.
        let (_, state) = search.decide(t0 + secs(8.0), state);
        assert_eq!(state.direction, TurnDirection::Left);
        // 6 s: flip back to the right.
        let (cmd, state) = search.decide(t0 + secs(9.0), state);
        assert_eq!(state.direction, TurnDirection::Right);
        assert!(cmd.angular.z < 0.0);
    }

    #[test]
    fn honours_configured_speed_and_direction() {
        let config = SearchConfig {
            turn_speed: 0.2,
            initial_direction: TurnDirection::Left,
            ..SearchConfig::default()
        };
        let search = SearchStrategy::new(config);
        let (cmd, _) = search.decide(Instant::now(), search.initial_state());
        assert_eq!(cmd, VelocityCommand::turn(0.2));
    }
}
