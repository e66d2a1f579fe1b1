use crate::runtime::error::RuntimeError;
use crate::runtime::estimator::Estimator;
use crate::runtime::frame::{EagerStack, Frame, ResumeFn, SharedStack, Snapshot, StackRepr};
use crate::runtime::rts::{make_estimator, Opts, Transform};
use crate::runtime::value::{Ctor, Value};
use std::cell::{Cell, RefCell};
use std::rc::Rc;

/// Execution phase. `Restoring` only holds while a snapshot is being
/// replayed frame by frame; the moment a resumed frame runs forward again
/// the mode flips back to `Running`.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Mode {
    Running,
    Capturing,
    Restoring,
}

/// Control transfer raised out of hosted code. Ordinary faults travel in
/// `Err` so a single `?` chain moves both control and errors outward.
#[derive(Debug)]
pub enum Signal {
    Capture { receiver: Receiver, stack: Snapshot },
    Restore { stack: Snapshot },
    Err(RuntimeError),
}

impl From<RuntimeError> for Signal {
    fn from(e: RuntimeError) -> Signal {
        Signal::Err(e)
    }
}

/// Who gets the continuation built from a captured stack: a hosted
/// function supplied to `capture_cc`, or the host itself at a preemption
/// point.
#[derive(Debug)]
pub enum Receiver {
    Host(Value),
    Yield,
}

pub type Run<T> = Result<T, Signal>;

/// Classification of one bounded run, with the capture flag already
/// cleared. The driver loop turns these back into jobs.
#[derive(Debug)]
pub enum RunResult {
    Normal(Value),
    Capture { receiver: Receiver, stack: Snapshot },
    Restore(Snapshot),
    Exception(RuntimeError),
}

/// What the driver hands back to the host: a final value, or a pause with
/// the pending continuation parked inside the runtime.
#[derive(Debug)]
pub enum Outcome {
    Done(Value),
    Yielded,
}

enum Job {
    Start(Box<dyn FnOnce(&Rts) -> Run<Value>>),
    Apply(Value, Vec<Value>),
    Replay(Snapshot),
}

/// The continuation runtime. Single-threaded by construction: every handle
/// is an `Rc`, and the frame stack, mode, and estimator live behind
/// interior mutability so hosted closures can reach them through `&Rts`.
pub struct Rts {
    strategy: Transform,
    stack: RefCell<Box<dyn StackRepr>>,
    mode: Cell<Mode>,
    estimator: RefCell<Box<dyn Estimator>>,
    breakpoints: RefCell<Vec<u32>>,
    stopped: Cell<bool>,
    step_mode: Cell<bool>,
    pause_hit: Cell<bool>,
    resumable: RefCell<Option<Value>>,
    on_stop: RefCell<Option<Rc<dyn Fn()>>>,
    builtins: Vec<Rc<Ctor>>,
}

impl Rts {
    pub fn new(opts: Opts) -> Rts {
        let stack: Box<dyn StackRepr> = match opts.transform {
            Transform::Lazy => Box::new(SharedStack::new()),
            Transform::Eager | Transform::Retval | Transform::Fudge => {
                Box::new(EagerStack::new())
            }
        };
        Rts {
            strategy: opts.transform,
            stack: RefCell::new(stack),
            mode: Cell::new(Mode::Running),
            estimator: RefCell::new(make_estimator(&opts)),
            breakpoints: RefCell::new(Vec::new()),
            stopped: Cell::new(false),
            step_mode: Cell::new(false),
            pause_hit: Cell::new(false),
            resumable: RefCell::new(None),
            on_stop: RefCell::new(None),
            builtins: vec![
                Ctor::new("Object", |_, _, _| Ok(Value::Undefined)),
                Ctor::new("Array", |_, _, args| Ok(Value::array(args.to_vec()))),
            ],
        }
    }

    pub fn strategy(&self) -> Transform {
        self.strategy
    }

    pub fn mode(&self) -> Mode {
        self.mode.get()
    }

    pub fn builtin(&self, name: &str) -> Option<Value> {
        self.builtins
            .iter()
            .find(|c| c.name == name)
            .map(|c| Value::Ctor(c.clone()))
    }

    fn is_builtin(&self, ctor: &Rc<Ctor>) -> bool {
        self.builtins.iter().any(|c| Rc::ptr_eq(c, ctor))
    }

    fn set_mode(&self, mode: Mode) {
        self.mode.set(mode);
    }

    fn push_frame(&self, frame: Frame) {
        self.stack.borrow_mut().push(frame);
    }

    fn pop_frame(&self) -> Option<Frame> {
        self.stack.borrow_mut().pop()
    }

    fn snapshot(&self) -> Snapshot {
        self.stack.borrow().snapshot()
    }

    fn clear_stack(&self) {
        self.stack.borrow_mut().clear();
    }

    pub fn stack_depth(&self) -> usize {
        self.stack.borrow().depth()
    }

    // ------------------------------------------------------------------
    // Capture and restore
    // ------------------------------------------------------------------

    /// Reifies the current continuation and unwinds to the driver, which
    /// applies `receiver` to the new continuation value on a fresh stack.
    pub fn capture_cc(&self, receiver: Value) -> Run<Value> {
        if self.strategy == Transform::Fudge {
            return Err(RuntimeError::CaptureUnsupported.into());
        }
        self.set_mode(Mode::Capturing);
        Err(Signal::Capture {
            receiver: Receiver::Host(receiver),
            stack: self.snapshot(),
        })
    }

    fn make_cont(&self, stack: Snapshot) -> Value {
        Value::Cont(crate::runtime::value::Continuation { snapshot: stack })
    }

    /// Runs `body` with a pending caller on the stack. A normal return
    /// pops the frame and feeds the result to `resume`; a capture leaves
    /// the frame in place so the snapshot carries the caller.
    pub fn with_frame(
        &self,
        resume: ResumeFn,
        body: impl FnOnce(&Rts) -> Run<Value>,
    ) -> Run<Value> {
        self.push_frame(Frame::K {
            resume: resume.clone(),
        });
        let result = body(self)?;
        self.pop_frame();
        resume(self, result)
    }

    pub fn apply(&self, f: &Value, args: &[Value]) -> Run<Value> {
        match f {
            Value::Fn(native) => (native.f)(self, args),
            Value::Cont(c) => {
                if self.stopped.get() {
                    return Err(RuntimeError::ContinuationAfterStop.into());
                }
                let value = args.first().cloned().unwrap_or(Value::Undefined);
                Err(Signal::Restore {
                    stack: c.snapshot.with_top(value),
                })
            }
            Value::Ctor(_) => self.handle_new(f, args),
            other => Err(RuntimeError::NotCallable {
                type_name: other.type_name(),
            }
            .into()),
        }
    }

    /// Construction with capture support. Known built-ins cannot suspend,
    /// so they bypass the frame bookkeeping entirely. Everything else gets
    /// a construction frame recording the object under way; a replayed
    /// construction recovers that object instead of allocating, which
    /// preserves identity across a suspension.
    pub fn handle_new(&self, ctor_val: &Value, args: &[Value]) -> Run<Value> {
        let ctor = match ctor_val {
            Value::Ctor(c) => c.clone(),
            other => {
                return Err(RuntimeError::NotAConstructor {
                    type_name: other.type_name(),
                }
                .into())
            }
        };
        if self.is_builtin(&ctor) {
            let obj = Value::object_with_proto(&ctor);
            let result = (ctor.construct)(self, &obj, args)?;
            return Ok(if result.is_object() { result } else { obj });
        }
        let obj = match self.mode.get() {
            Mode::Restoring => match self.pop_frame() {
                Some(Frame::Rest { locals, .. }) => match locals.into_iter().next() {
                    Some(obj) => {
                        self.set_mode(Mode::Running);
                        obj
                    }
                    None => {
                        return Err(RuntimeError::BadRestoreFrame { found: "rest" }.into())
                    }
                },
                Some(other) => {
                    return Err(RuntimeError::BadRestoreFrame {
                        found: other.kind_name(),
                    }
                    .into())
                }
                None => return Err(RuntimeError::EmptyRestore.into()),
            },
            _ => Value::object_with_proto(&ctor),
        };
        self.push_frame(Frame::Rest {
            ctor: ctor.clone(),
            args: Rc::from(args),
            locals: vec![obj.clone()],
            index: 0,
        });
        let result = (ctor.construct)(self, &obj, args)?;
        self.pop_frame();
        Ok(if result.is_object() { result } else { obj })
    }

    /// Replays a snapshot top-down: the seated top value flows into the
    /// first resumable frame, each resumed caller runs forward until it
    /// returns, and a construction frame applies the object-or-result rule
    /// using the identity it saved.
    fn replay(&self, snapshot: &Snapshot) -> Run<Value> {
        self.stack.borrow_mut().load(snapshot);
        self.set_mode(Mode::Restoring);
        let mut value = match self.pop_frame() {
            Some(Frame::Top { value }) => value,
            Some(other) => {
                return Err(RuntimeError::BadRestoreFrame {
                    found: other.kind_name(),
                }
                .into())
            }
            None => return Err(RuntimeError::EmptyRestore.into()),
        };
        loop {
            match self.pop_frame() {
                None => {
                    self.set_mode(Mode::Running);
                    return Ok(value);
                }
                Some(Frame::K { resume }) => {
                    self.set_mode(Mode::Running);
                    value = resume(self, value)?;
                    self.set_mode(Mode::Restoring);
                }
                Some(Frame::Rest { locals, .. }) => {
                    let obj = locals.into_iter().next().unwrap_or(Value::Undefined);
                    value = if value.is_object() { value } else { obj };
                }
                Some(frame @ Frame::Top { .. }) => {
                    return Err(RuntimeError::BadRestoreFrame {
                        found: frame.kind_name(),
                    }
                    .into())
                }
            }
        }
    }

    // ------------------------------------------------------------------
    // Preemption
    // ------------------------------------------------------------------

    fn should_yield(&self, line: Option<u32>) -> bool {
        if self.strategy == Transform::Fudge {
            return false;
        }
        if self.stopped.get() {
            return true;
        }
        if self.step_mode.get() {
            self.pause_hit.set(true);
            return true;
        }
        if let Some(line) = line {
            if self.breakpoints.borrow().contains(&line) {
                self.pause_hit.set(true);
                return true;
            }
        }
        self.estimator.borrow_mut().elapsed()
    }

    /// Checkpoint at a call boundary. When the runtime decides to yield,
    /// the pending application itself becomes the top frame of the
    /// captured continuation, so the call is neither lost nor repeated
    /// across the pause.
    pub fn suspend_apply(
        &self,
        line: Option<u32>,
        fun: &Value,
        args: &[Value],
    ) -> Run<Value> {
        if !self.should_yield(line) {
            return self.apply(fun, args);
        }
        let fun = fun.clone();
        let args: Vec<Value> = args.to_vec();
        let redo: ResumeFn = Rc::new(move |rts: &Rts, _seed: Value| rts.apply(&fun, &args));
        self.push_frame(Frame::K { resume: redo });
        self.set_mode(Mode::Capturing);
        Err(Signal::Capture {
            receiver: Receiver::Yield,
            stack: self.snapshot(),
        })
    }

    // ------------------------------------------------------------------
    // Driver
    // ------------------------------------------------------------------

    fn abstract_run(&self, body: impl FnOnce(&Rts) -> Run<Value>) -> RunResult {
        match body(self) {
            Ok(v) => RunResult::Normal(v),
            Err(Signal::Capture { receiver, stack }) => {
                self.set_mode(Mode::Running);
                RunResult::Capture { receiver, stack }
            }
            Err(Signal::Restore { stack }) => RunResult::Restore(stack),
            Err(Signal::Err(e)) => {
                self.set_mode(Mode::Running);
                RunResult::Exception(e)
            }
        }
    }

    fn drive(&self, mut job: Job) -> Result<Outcome, RuntimeError> {
        loop {
            let result = match job {
                Job::Start(body) => self.abstract_run(body),
                Job::Apply(f, args) => self.abstract_run(move |rts| rts.apply(&f, &args)),
                Job::Replay(snapshot) => {
                    self.abstract_run(move |rts| rts.replay(&snapshot))
                }
            };
            match result {
                RunResult::Normal(v) => {
                    self.clear_stack();
                    return Ok(Outcome::Done(v));
                }
                RunResult::Capture { receiver, stack } => {
                    self.clear_stack();
                    let k = self.make_cont(stack);
                    match receiver {
                        Receiver::Host(f) => job = Job::Apply(f, vec![k]),
                        Receiver::Yield => {
                            *self.resumable.borrow_mut() = Some(k);
                            if self.pause_hit.replace(false) {
                                self.fire_on_stop();
                            }
                            return Ok(Outcome::Yielded);
                        }
                    }
                }
                RunResult::Restore(snapshot) => job = Job::Replay(snapshot),
                RunResult::Exception(e) => {
                    self.clear_stack();
                    return Err(e);
                }
            }
        }
    }

    /// Begins executing a hosted program on an empty stack.
    pub fn start(
        &self,
        body: impl FnOnce(&Rts) -> Run<Value> + 'static,
    ) -> Result<Outcome, RuntimeError> {
        self.drive(Job::Start(Box::new(body)))
    }

    /// Continues a program paused at a preemption point.
    pub fn resume(&self) -> Result<Outcome, RuntimeError> {
        if self.stopped.get() {
            return Err(RuntimeError::ContinuationAfterStop);
        }
        let k = self
            .resumable
            .borrow_mut()
            .take()
            .ok_or(RuntimeError::NotSuspended)?;
        self.drive(Job::Apply(k, vec![Value::Undefined]))
    }

    /// Runs a program to its final value, resuming through every yield.
    pub fn run_to_completion(
        &self,
        body: impl FnOnce(&Rts) -> Run<Value> + 'static,
    ) -> Result<Value, RuntimeError> {
        let mut outcome = self.start(body)?;
        loop {
            match outcome {
                Outcome::Done(v) => return Ok(v),
                Outcome::Yielded => {
                    if self.stopped.get() {
                        return Err(RuntimeError::Interrupted);
                    }
                    outcome = self.resume()?;
                }
            }
        }
    }

    // ------------------------------------------------------------------
    // Control surface
    // ------------------------------------------------------------------

    /// Marks the runtime stopped. Any later resumption or invocation of a
    /// previously captured continuation fails.
    pub fn stop(&self) {
        self.stopped.set(true);
        self.fire_on_stop();
    }

    pub fn is_stopped(&self) -> bool {
        self.stopped.get()
    }

    /// Resumes until the very next checkpoint, then pauses again.
    pub fn step(&self) -> Result<Outcome, RuntimeError> {
        self.step_mode.set(true);
        let result = self.resume();
        self.step_mode.set(false);
        result
    }

    pub fn set_breakpoints(&self, lines: Vec<u32>) {
        *self.breakpoints.borrow_mut() = lines;
    }

    pub fn set_on_stop(&self, callback: impl Fn() + 'static) {
        *self.on_stop.borrow_mut() = Some(Rc::new(callback));
    }

    fn fire_on_stop(&self) {
        let callback = self.on_stop.borrow().clone();
        if let Some(callback) = callback {
            callback();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::rts::EstimatorKind;

    fn quiet_opts() -> Opts {
        // A countdown period no test will ever reach keeps the estimator
        // out of the way.
        Opts {
            transform: Transform::Eager,
            estimator: EstimatorKind::Countdown,
            time_per_elapsed: 1_000_000,
            ..Opts::default()
        }
    }

    fn saved_slot() -> (Rc<RefCell<Option<Value>>>, Value) {
        let slot: Rc<RefCell<Option<Value>>> = Rc::new(RefCell::new(None));
        let inner = slot.clone();
        let receiver = Value::native("save", move |_, args| {
            *inner.borrow_mut() = Some(args[0].clone());
            Ok(Value::Num(0.0))
        });
        (slot, receiver)
    }

    fn done(outcome: Result<Outcome, RuntimeError>) -> Value {
        match outcome.unwrap() {
            Outcome::Done(v) => v,
            Outcome::Yielded => panic!("expected completion, got a yield"),
        }
    }

    #[test]
    fn captured_frames_replay_on_invocation() {
        let rts = Rts::new(quiet_opts());
        let (slot, receiver) = saved_slot();
        let first = done(rts.start(move |rts| {
            let add_one: ResumeFn = Rc::new(|_, v| Ok(Value::Num(v.as_num()? + 1.0)));
            rts.with_frame(add_one, |rts| rts.capture_cc(receiver))
        }));
        assert_eq!(first, Value::Num(0.0));

        let k = slot.borrow().clone().unwrap();
        let resumed = done(rts.start(move |rts| rts.apply(&k, &[Value::Num(41.0)])));
        assert_eq!(resumed, Value::Num(42.0));
    }

    #[test]
    fn one_snapshot_resumes_many_times() {
        let rts = Rts::new(quiet_opts());
        let (slot, receiver) = saved_slot();
        done(rts.start(move |rts| {
            let double: ResumeFn = Rc::new(|_, v| Ok(Value::Num(v.as_num()? * 2.0)));
            rts.with_frame(double, |rts| rts.capture_cc(receiver))
        }));
        let k = slot.borrow().clone().unwrap();
        for n in [1.0, 2.0, 5.0] {
            let k = k.clone();
            let out = done(rts.start(move |rts| rts.apply(&k, &[Value::Num(n)])));
            assert_eq!(out, Value::Num(n * 2.0));
        }
    }

    #[test]
    fn construction_identity_survives_a_suspension() {
        let rts = Rts::new(quiet_opts());
        let (slot, receiver) = saved_slot();
        let seen: Rc<RefCell<Option<Value>>> = Rc::new(RefCell::new(None));
        let seen_inner = seen.clone();
        let ctor = Ctor::new("Pausy", move |rts, this, _args| {
            *seen_inner.borrow_mut() = Some(this.clone());
            this.set_prop("eager", Value::Bool(true))?;
            let this = this.clone();
            let receiver = receiver.clone();
            rts.with_frame(
                Rc::new(move |_, v| {
                    this.set_prop("resumed", v)?;
                    Ok(Value::Undefined)
                }),
                move |rts| rts.capture_cc(receiver),
            )
        });
        let ctor_val = Value::Ctor(ctor);
        done(rts.start(move |rts| rts.handle_new(&ctor_val, &[])));

        let k = slot.borrow().clone().unwrap();
        let built = done(rts.start(move |rts| rts.apply(&k, &[Value::Num(7.0)])));
        let original = seen.borrow().clone().unwrap();
        assert_eq!(built, original);
        assert_eq!(built.get_prop("eager").unwrap(), Value::Bool(true));
        assert_eq!(built.get_prop("resumed").unwrap(), Value::Num(7.0));
    }

    #[test]
    fn builtin_constructions_bypass_frames() {
        let rts = Rts::new(quiet_opts());
        let array = rts.builtin("Array").unwrap();
        let out = done(
            rts.start(move |rts| rts.handle_new(&array, &[Value::Num(1.0), Value::Num(2.0)])),
        );
        match out {
            Value::Arr(items) => assert_eq!(items.borrow().len(), 2),
            other => panic!("expected an array, got {other:?}"),
        }
        assert_eq!(rts.stack_depth(), 0);
    }

    #[test]
    fn fudge_refuses_to_capture() {
        let rts = Rts::new(Opts {
            transform: Transform::Fudge,
            ..quiet_opts()
        });
        let (_, receiver) = saved_slot();
        let err = rts
            .start(move |rts| rts.capture_cc(receiver))
            .unwrap_err();
        assert_eq!(err, RuntimeError::CaptureUnsupported);
    }

    #[test]
    fn misplaced_top_frame_fails_the_restore() {
        use crate::runtime::value::Continuation;
        let rts = Rts::new(quiet_opts());
        let snapshot = Snapshot::Copied(Rc::new(vec![
            Frame::Top {
                value: Value::Num(1.0),
            },
            Frame::K {
                resume: Rc::new(|_, v| Ok(v)),
            },
        ]));
        let k = Value::Cont(Continuation { snapshot });
        let err = rts
            .start(move |rts| rts.apply(&k, &[Value::Num(2.0)]))
            .unwrap_err();
        assert_eq!(err, RuntimeError::BadRestoreFrame { found: "top" });
    }

    #[test]
    fn estimator_yields_are_transparent_under_run_to_completion() {
        let rts = Rts::new(Opts {
            time_per_elapsed: 2,
            ..quiet_opts()
        });
        let slot: Rc<RefCell<Option<Value>>> = Rc::new(RefCell::new(None));
        let counter = Rc::new(Cell::new(0u32));
        let f = {
            let slot = slot.clone();
            let counter = counter.clone();
            Value::native("spin", move |rts, _| {
                if counter.get() >= 5 {
                    return Ok(Value::Num(counter.get() as f64));
                }
                counter.set(counter.get() + 1);
                let me = slot.borrow().as_ref().cloned().unwrap();
                rts.suspend_apply(None, &me, &[])
            })
        };
        *slot.borrow_mut() = Some(f.clone());
        let out = rts.run_to_completion(move |rts| rts.apply(&f, &[])).unwrap();
        assert_eq!(out, Value::Num(5.0));
    }

    #[test]
    fn stop_blocks_resumption_and_fires_the_callback() {
        let rts = Rts::new(Opts {
            time_per_elapsed: 1,
            ..quiet_opts()
        });
        let fired = Rc::new(Cell::new(false));
        let fired_inner = fired.clone();
        rts.set_on_stop(move || fired_inner.set(true));
        let target = Value::native("noop", |_, _| Ok(Value::Undefined));
        let outcome = rts
            .start(move |rts| rts.suspend_apply(None, &target, &[]))
            .unwrap();
        assert!(matches!(outcome, Outcome::Yielded));
        rts.stop();
        assert!(fired.get());
        assert_eq!(rts.resume().unwrap_err(), RuntimeError::ContinuationAfterStop);
    }

    #[test]
    fn breakpoints_pause_at_their_line() {
        let rts = Rts::new(quiet_opts());
        rts.set_breakpoints(vec![3]);
        let fired = Rc::new(Cell::new(false));
        let fired_inner = fired.clone();
        rts.set_on_stop(move || fired_inner.set(true));
        let target = Value::native("answer", |_, _| Ok(Value::Num(9.0)));
        let outcome = rts
            .start(move |rts| rts.suspend_apply(Some(3), &target, &[]))
            .unwrap();
        assert!(matches!(outcome, Outcome::Yielded));
        assert!(fired.get());
        assert_eq!(done(rts.resume()), Value::Num(9.0));
    }

    #[test]
    fn unbreakpointed_lines_run_through() {
        let rts = Rts::new(quiet_opts());
        rts.set_breakpoints(vec![3]);
        let target = Value::native("answer", |_, _| Ok(Value::Num(9.0)));
        let out = done(rts.start(move |rts| rts.suspend_apply(Some(4), &target, &[])));
        assert_eq!(out, Value::Num(9.0));
    }

    #[test]
    fn step_pauses_at_each_checkpoint() {
        let rts = Rts::new(quiet_opts());
        let slot: Rc<RefCell<Option<Value>>> = Rc::new(RefCell::new(None));
        let counter = Rc::new(Cell::new(0u32));
        let f = {
            let slot = slot.clone();
            let counter = counter.clone();
            Value::native("walk", move |rts, _| {
                if counter.get() >= 2 {
                    return Ok(Value::str("end"));
                }
                counter.set(counter.get() + 1);
                let me = slot.borrow().as_ref().cloned().unwrap();
                rts.suspend_apply(Some(counter.get()), &me, &[])
            })
        };
        *slot.borrow_mut() = Some(f.clone());
        rts.set_breakpoints(vec![1]);
        let outcome = rts.start(move |rts| rts.apply(&f, &[])).unwrap();
        assert!(matches!(outcome, Outcome::Yielded));
        // A step pauses at line 2 even though only line 1 is a breakpoint.
        assert!(matches!(rts.step().unwrap(), Outcome::Yielded));
        assert_eq!(counter.get(), 2);
        assert_eq!(done(rts.resume()), Value::str("end"));
    }

    #[test]
    fn lazy_stacks_share_structure_across_captures() {
        let rts = Rts::new(Opts {
            transform: Transform::Lazy,
            ..quiet_opts()
        });
        let (slot, receiver) = saved_slot();
        done(rts.start(move |rts| {
            let add_one: ResumeFn = Rc::new(|_, v| Ok(Value::Num(v.as_num()? + 1.0)));
            rts.with_frame(add_one.clone(), |rts| {
                rts.with_frame(add_one, |rts| rts.capture_cc(receiver))
            })
        }));
        let k = slot.borrow().clone().unwrap();
        let out = done(rts.start(move |rts| rts.apply(&k, &[Value::Num(40.0)])));
        assert_eq!(out, Value::Num(42.0));
    }

    #[test]
    fn resume_without_a_pause_is_an_error() {
        let rts = Rts::new(quiet_opts());
        assert_eq!(rts.resume().unwrap_err(), RuntimeError::NotSuspended);
    }
}
