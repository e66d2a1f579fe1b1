use crate::runtime::error::ConfigError;
use crate::runtime::estimator::{Countdown, Estimator, Exact, Reservoir, Velocity};
use crate::runtime::machine::Rts;
use std::cell::RefCell;
use std::rc::Rc;
use std::str::FromStr;
use std::time::Duration;

/// Snapshot strategy for the frame stack. `Retval` keeps the eager stack;
/// it differs only in how generated code threads return values, which the
/// runtime does not observe. `Fudge` disables capture entirely and exists
/// to measure instrumentation overhead.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Transform {
    Eager,
    Lazy,
    Retval,
    Fudge,
}

impl FromStr for Transform {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Transform, ConfigError> {
        match s {
            "eager" => Ok(Transform::Eager),
            "lazy" => Ok(Transform::Lazy),
            "retval" => Ok(Transform::Retval),
            "fudge" => Ok(Transform::Fudge),
            other => Err(ConfigError::UnknownTransform(other.to_string())),
        }
    }
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum EstimatorKind {
    Exact,
    Countdown,
    Reservoir,
    Velocity,
}

impl FromStr for EstimatorKind {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<EstimatorKind, ConfigError> {
        match s {
            "exact" => Ok(EstimatorKind::Exact),
            "countdown" => Ok(EstimatorKind::Countdown),
            "reservoir" => Ok(EstimatorKind::Reservoir),
            "velocity" => Ok(EstimatorKind::Velocity),
            other => Err(ConfigError::UnknownEstimator(other.to_string())),
        }
    }
}

#[derive(Clone, Debug)]
pub struct Opts {
    pub transform: Transform,
    pub estimator: EstimatorKind,
    /// Countdown period: checkpoints per yield.
    pub time_per_elapsed: u32,
    pub yield_interval: Duration,
    pub resample_interval: Duration,
    /// Debug builds checkpoint every statement instead of every call.
    pub debug: bool,
}

impl Default for Opts {
    fn default() -> Opts {
        Opts {
            transform: Transform::Eager,
            estimator: EstimatorKind::Velocity,
            time_per_elapsed: 1000,
            yield_interval: Duration::from_millis(100),
            resample_interval: Duration::from_millis(10),
            debug: false,
        }
    }
}

pub fn make_estimator(opts: &Opts) -> Box<dyn Estimator> {
    match opts.estimator {
        EstimatorKind::Exact => Box::new(Exact::new(opts.yield_interval)),
        EstimatorKind::Countdown => Box::new(Countdown::new(opts.time_per_elapsed)),
        EstimatorKind::Reservoir => Box::new(Reservoir::new(opts.yield_interval)),
        EstimatorKind::Velocity => Box::new(Velocity::new(
            opts.yield_interval,
            opts.resample_interval,
        )),
    }
}

thread_local! {
    static RTS: RefCell<Option<Rc<Rts>>> = RefCell::new(None);
}

/// Initializes this thread's runtime. There is exactly one per thread and
/// it is never replaced; a second call fails rather than silently
/// discarding live continuations.
pub fn make_rts(opts: Opts) -> Result<Rc<Rts>, ConfigError> {
    RTS.with(|slot| {
        let mut slot = slot.borrow_mut();
        if slot.is_some() {
            return Err(ConfigError::AlreadyInitialized);
        }
        let rts = Rc::new(Rts::new(opts));
        *slot = Some(rts.clone());
        Ok(rts)
    })
}

pub fn get_rts() -> Result<Rc<Rts>, ConfigError> {
    RTS.with(|slot| slot.borrow().clone().ok_or(ConfigError::NotInitialized))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn option_strings_parse() {
        assert_eq!("lazy".parse::<Transform>().unwrap(), Transform::Lazy);
        assert_eq!(
            "velocity".parse::<EstimatorKind>().unwrap(),
            EstimatorKind::Velocity
        );
        assert!(matches!(
            "never".parse::<Transform>(),
            Err(ConfigError::UnknownTransform(_))
        ));
        assert!(matches!(
            "psychic".parse::<EstimatorKind>(),
            Err(ConfigError::UnknownEstimator(_))
        ));
    }

    #[test]
    fn the_slot_initializes_once_per_thread() {
        std::thread::spawn(|| {
            assert!(matches!(get_rts(), Err(ConfigError::NotInitialized)));
            let first = make_rts(Opts::default());
            assert!(first.is_ok());
            assert!(matches!(
                make_rts(Opts::default()),
                Err(ConfigError::AlreadyInitialized)
            ));
            assert!(get_rts().is_ok());
        })
        .join()
        .unwrap();
    }

    #[test]
    fn threads_do_not_share_a_runtime() {
        std::thread::spawn(|| {
            make_rts(Opts::default()).unwrap();
        })
        .join()
        .unwrap();
        std::thread::spawn(|| {
            // A fresh thread starts uninitialized.
            assert!(matches!(get_rts(), Err(ConfigError::NotInitialized)));
        })
        .join()
        .unwrap();
    }
}
