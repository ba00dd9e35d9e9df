//! Two-threshold hysteresis decision logic

use crate::error::ConfigError;
use crate::sampler::LoadSample;
use std::fmt;

/// Whether the managed workload is currently permitted to run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ControllerState {
    #[default]
    Running,
    Suspended,
}

impl fmt::Display for ControllerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ControllerState::Running => write!(f, "running"),
            ControllerState::Suspended => write!(f, "suspended"),
        }
    }
}

/// Command to send to the workload manager on a transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlAction {
    Start,
    Stop,
}

impl fmt::Display for ControlAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ControlAction::Start => write!(f, "start"),
            ControlAction::Stop => write!(f, "stop"),
        }
    }
}

/// Stop/start thresholds. Construction guarantees `stop > start`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Thresholds {
    stop: LoadSample,
    start: LoadSample,
}

impl Thresholds {
    pub fn new(stop: LoadSample, start: LoadSample) -> Result<Self, ConfigError> {
        if stop <= start {
            return Err(ConfigError::Invalid(format!(
                "stop threshold ({}) must be greater than start threshold ({})",
                stop, start
            )));
        }
        Ok(Self { stop, start })
    }

    pub fn stop(&self) -> LoadSample {
        self.stop
    }

    pub fn start(&self) -> LoadSample {
        self.start
    }

    /// True for samples in `[start, stop]`, where no transition can happen.
    pub fn in_dead_zone(&self, sample: LoadSample) -> bool {
        sample >= self.start && sample <= self.stop
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Decision {
    pub next: ControllerState,
    pub transitioned: bool,
}

impl Decision {
    /// The control command this decision calls for, if any.
    pub fn action(&self) -> Option<ControlAction> {
        if !self.transitioned {
            return None;
        }
        Some(match self.next {
            ControllerState::Running => ControlAction::Start,
            ControllerState::Suspended => ControlAction::Stop,
        })
    }
}

/// Decide the next state for `sample`. Comparisons are strict: a sample
/// equal to a threshold never transitions.
pub fn decide(current: ControllerState, sample: LoadSample, thresholds: &Thresholds) -> Decision {
    match current {
        ControllerState::Running if sample > thresholds.stop => Decision {
            next: ControllerState::Suspended,
            transitioned: true,
        },
        ControllerState::Suspended if sample < thresholds.start => Decision {
            next: ControllerState::Running,
            transitioned: true,
        },
        _ => Decision {
            next: current,
            transitioned: false,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ControllerState::{Running, Suspended};

    fn thresholds() -> Thresholds {
        Thresholds::new(35, 10).unwrap()
    }

    #[test]
    fn test_rejects_inverted_thresholds() {
        assert!(matches!(Thresholds::new(5, 10), Err(ConfigError::Invalid(_))));
        assert!(matches!(Thresholds::new(10, 10), Err(ConfigError::Invalid(_))));
        assert!(Thresholds::new(1, 0).is_ok());
    }

    #[test]
    fn test_running_stops_only_above_stop_threshold() {
        for (stop, start) in [(35, 10), (5, 4), (100, 0)] {
            let t = Thresholds::new(stop, start).unwrap();
            for s in 0..=stop + 20 {
                let d = decide(Running, s, &t);
                if s > stop {
                    assert_eq!((d.next, d.transitioned), (Suspended, true), "at {}", s);
                } else {
                    assert_eq!((d.next, d.transitioned), (Running, false), "at {}", s);
                }
            }
        }
    }

    #[test]
    fn test_suspended_starts_only_below_start_threshold() {
        for (stop, start) in [(35, 10), (5, 4), (100, 0)] {
            let t = Thresholds::new(stop, start).unwrap();
            for s in 0..=stop + 20 {
                let d = decide(Suspended, s, &t);
                if s < start {
                    assert_eq!((d.next, d.transitioned), (Running, true), "at {}", s);
                } else {
                    assert_eq!((d.next, d.transitioned), (Suspended, false), "at {}", s);
                }
            }
        }
    }

    #[test]
    fn test_stop_boundary() {
        let t = thresholds();
        assert_eq!(decide(Running, 35, &t).next, Running);
        assert_eq!(decide(Running, 36, &t).next, Suspended);
    }

    #[test]
    fn test_start_boundary() {
        let t = thresholds();
        assert_eq!(decide(Suspended, 10, &t).next, Suspended);
        assert_eq!(decide(Suspended, 9, &t).next, Running);
    }

    #[test]
    fn test_dead_zone_never_transitions() {
        let t = thresholds();
        assert!(!t.in_dead_zone(9));
        assert!(!t.in_dead_zone(36));
        for initial in [Running, Suspended] {
            let mut state = initial;
            for _ in 0..3 {
                for s in 10..=35 {
                    assert!(t.in_dead_zone(s));
                    let d = decide(state, s, &t);
                    assert!(!d.transitioned);
                    state = d.next;
                }
            }
            assert_eq!(state, initial);
        }
    }

    #[test]
    fn test_suspended_holds_while_load_stays_at_or_above_start() {
        let t = thresholds();
        let mut state = Suspended;
        for s in [10, 500, 36, 35, 11, 10, 1000, 10] {
            state = decide(state, s, &t).next;
            assert_eq!(state, Suspended);
        }
    }

    #[test]
    fn test_sample_sequence() {
        let t = thresholds();
        let mut state = Running;
        let mut states = Vec::new();
        let mut actions = Vec::new();
        for (i, s) in [5, 20, 40, 40, 8, 50].into_iter().enumerate() {
            let d = decide(state, s, &t);
            if let Some(action) = d.action() {
                actions.push((i + 1, action));
            }
            state = d.next;
            states.push(state);
        }
        assert_eq!(
            states,
            vec![Running, Running, Suspended, Suspended, Running, Suspended]
        );
        assert_eq!(
            actions,
            vec![
                (3, ControlAction::Stop),
                (5, ControlAction::Start),
                (6, ControlAction::Stop),
            ]
        );
    }

    #[test]
    fn test_no_action_without_transition() {
        let d = Decision {
            next: Suspended,
            transitioned: false,
        };
        assert_eq!(d.action(), None);
    }
}
