use std::sync::Mutex;

use quill_util::Quark;

use crate::error::EvalResult;
use crate::interp::Interp;
use crate::literal::{apply_literal, Boolean, Integer, Literal};
use crate::nameset::Nameset;
use crate::object::{Obj, Object};

quark_zone! {
    static COUNTER_ZONE {
        RESET = "reset",
        STEP = "step",
        VALID_P = "valid-p",
        GET = "get",
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct CounterState {
    start: i64,
    end: i64,
    current: i64,
}

impl CounterState {
    /// Counting direction, inferred from the bounds.
    fn is_up(&self) -> bool {
        self.start <= self.end
    }

    fn is_valid(&self) -> bool {
        if self.is_up() {
            self.current < self.end
        } else {
            self.current > self.end
        }
    }
}

/// A bounded integer stepper counting from `start` toward `end`.
///
/// The counter is valid while its current value has not reached `end`, so a counter from 0 to
/// 10 and one from 0 to -10 both step exactly ten times.
#[derive(Debug)]
pub struct Counter {
    state: Mutex<CounterState>,
}

impl Counter {
    pub fn new(start: i64, end: i64) -> Counter {
        Counter::with_current(start, end, start)
    }

    pub fn with_current(start: i64, end: i64, current: i64) -> Counter {
        Counter {
            state: Mutex::new(CounterState {
                start,
                end,
                current,
            }),
        }
    }

    fn state(&self) -> std::sync::MutexGuard<CounterState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn reset(&self) {
        let mut state = self.state();
        state.current = state.start;
    }

    /// Move one step toward the end. Returns `false` without moving once the counter is
    /// exhausted.
    pub fn step(&self) -> bool {
        let mut state = self.state();
        if !state.is_valid() {
            return false;
        }
        if state.is_up() {
            state.current += 1;
        } else {
            state.current -= 1;
        }
        true
    }

    pub fn is_valid(&self) -> bool {
        self.state().is_valid()
    }

    pub fn get(&self) -> i64 {
        self.state().current
    }

    pub fn bounds(&self) -> (i64, i64) {
        let state = self.state();
        (state.start, state.end)
    }
}

impl Literal for Counter {
    fn to_literal(&self) -> String {
        let state = *self.state();
        format!("Counter({} {} {})", state.start, state.end, state.current)
    }

    fn to_display(&self) -> String {
        self.get().to_string()
    }

    fn clone_literal(&self) -> Obj {
        let state = *self.state();
        Obj::new(Counter::with_current(state.start, state.end, state.current))
    }

    fn literal_eq(&self, other: &Obj) -> bool {
        match other.downcast::<Counter>() {
            Some(other) if std::ptr::eq(self, other) => true,
            Some(other) => {
                // never hold both locks, another thread may compare the other way around
                let theirs = *other.state();
                *self.state() == theirs
            }
            None => false,
        }
    }
}

impl Object for Counter {
    literal_object!("Counter", COUNTER_ZONE);

    fn apply(&self, _interp: &Interp, _nset: &Nameset, quark: Quark, argv: &[Obj]) -> EvalResult {
        if argv.is_empty() {
            if quark == RESET {
                self.reset();
                return Ok(Obj::nil());
            } else if quark == STEP {
                return Ok(Boolean::obj(self.step()));
            } else if quark == VALID_P {
                return Ok(Boolean::obj(self.is_valid()));
            } else if quark == GET {
                return Ok(Integer::obj(self.get()));
            }
        }
        apply_literal(self, quark, argv)
    }
}

#[cfg(test)]
mod tests {
    use test_env_log::test;

    use super::*;

    fn count_steps(counter: &Counter) -> usize {
        let mut steps = 0;
        while counter.is_valid() {
            assert!(counter.step());
            steps += 1;
            assert!(steps <= 1000, "counter never terminates");
        }
        steps
    }

    #[test]
    fn test_counts_up() {
        let counter = Counter::new(0, 10);
        assert_eq!(count_steps(&counter), 10);
        assert_eq!(counter.get(), 10);
        assert!(!counter.step());
        assert_eq!(counter.get(), 10);
    }

    #[test]
    fn test_counts_down() {
        let counter = Counter::new(0, -10);
        assert_eq!(count_steps(&counter), 10);
        assert_eq!(counter.get(), -10);
    }

    #[test]
    fn test_empty_range_is_invalid() {
        let counter = Counter::new(5, 5);
        assert!(!counter.is_valid());
        assert_eq!(count_steps(&counter), 0);
    }

    #[test]
    fn test_reset() {
        let counter = Counter::new(3, 6);
        counter.step();
        counter.step();
        assert_eq!(counter.get(), 5);
        counter.reset();
        assert_eq!(counter.get(), 3);
        assert_eq!(counter.bounds(), (3, 6));
    }

    #[test]
    fn test_literal_form() {
        let counter = Counter::new(0, 4);
        counter.step();
        assert_eq!(counter.to_literal(), "Counter(0 4 1)");
        assert_eq!(counter.to_display(), "1");

        let copy = counter.clone_literal();
        assert!(counter.literal_eq(&copy));
        counter.step();
        assert!(!counter.literal_eq(&copy));
    }

    #[test]
    fn test_crossed_comparisons_do_not_deadlock() {
        let a = Obj::new(Counter::with_current(0, 10, 0));
        let b = Obj::new(Counter::with_current(0, 10, 0));

        let (tx, rx) = std::sync::mpsc::channel();
        for (x, y) in [(a.clone(), b.clone()), (b, a)] {
            let tx = tx.clone();
            std::thread::spawn(move || {
                let x = x.downcast::<Counter>().unwrap();
                for _ in 0..200_000 {
                    assert!(x.literal_eq(&y));
                }
                tx.send(()).unwrap();
            });
        }
        for _ in 0..2 {
            rx.recv_timeout(std::time::Duration::from_secs(20))
                .expect("comparison threads deadlocked");
        }
    }
}
