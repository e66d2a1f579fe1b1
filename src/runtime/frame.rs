use crate::runtime::machine::{Rts, Run};
use crate::runtime::value::{Ctor, Value};
use std::fmt;
use std::rc::Rc;

/// Resumes a paused caller with the value its pending sub-computation
/// produced.
pub type ResumeFn = Rc<dyn Fn(&Rts, Value) -> Run<Value>>;

/// One pending activation on the shadow stack. The stack grows toward the
/// top; replay consumes it top-down.
#[derive(Clone)]
pub enum Frame {
    /// A construction paused mid-body. `locals[0]` holds the object under
    /// construction so a replayed `new` can reuse its identity.
    Rest {
        ctor: Rc<Ctor>,
        args: Rc<[Value]>,
        locals: Vec<Value>,
        index: usize,
    },
    /// A caller waiting on the value of its pending sub-computation.
    K { resume: ResumeFn },
    /// The value to feed the topmost resumable frame. Only ever the top of
    /// a snapshot about to be restored.
    Top { value: Value },
}

impl Frame {
    pub fn kind_name(&self) -> &'static str {
        match self {
            Frame::Rest { .. } => "rest",
            Frame::K { .. } => "k",
            Frame::Top { .. } => "top",
        }
    }
}

impl fmt::Debug for Frame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Frame::Rest { ctor, index, .. } => f
                .debug_struct("Rest")
                .field("ctor", &ctor.name)
                .field("index", index)
                .finish(),
            Frame::K { .. } => f.write_str("K"),
            Frame::Top { value } => f.debug_tuple("Top").field(value).finish(),
        }
    }
}

/// An immutable copy of the frame stack taken at a capture point. The two
/// layouts mirror the two snapshot strategies: `Copied` is a flat clone
/// made eagerly at capture time, `Shared` aliases the persistent list a
/// sharing stack already maintains.
#[derive(Clone)]
pub enum Snapshot {
    /// Bottom-first, matching the live vector it was cloned from.
    Copied(Rc<Vec<Frame>>),
    /// Head is the top frame.
    Shared(FrameList),
}

impl Snapshot {
    /// A new snapshot with `value` seated above the existing top, ready
    /// for replay.
    pub fn with_top(&self, value: Value) -> Snapshot {
        match self {
            Snapshot::Copied(frames) => {
                let mut copy = frames.as_ref().clone();
                copy.push(Frame::Top { value });
                Snapshot::Copied(Rc::new(copy))
            }
            Snapshot::Shared(list) => Snapshot::Shared(list.cons(Frame::Top { value })),
        }
    }

    pub fn depth(&self) -> usize {
        match self {
            Snapshot::Copied(frames) => frames.len(),
            Snapshot::Shared(list) => list.len(),
        }
    }
}

impl fmt::Debug for Snapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Snapshot::Copied(_) => "Copied",
            Snapshot::Shared(_) => "Shared",
        };
        write!(f, "Snapshot::{}(depth={})", label, self.depth())
    }
}

/// A persistent cons list of frames. Cloning is O(1); pushing never
/// disturbs older snapshots that alias the tail.
#[derive(Clone, Default)]
pub struct FrameList {
    head: Option<Rc<FrameNode>>,
    len: usize,
}

struct FrameNode {
    frame: Frame,
    next: Option<Rc<FrameNode>>,
}

impl FrameList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn cons(&self, frame: Frame) -> FrameList {
        FrameList {
            head: Some(Rc::new(FrameNode {
                frame,
                next: self.head.clone(),
            })),
            len: self.len + 1,
        }
    }

    pub fn head(&self) -> Option<&Frame> {
        self.head.as_deref().map(|node| &node.frame)
    }

    pub fn tail(&self) -> FrameList {
        match &self.head {
            Some(node) => FrameList {
                head: node.next.clone(),
                len: self.len - 1,
            },
            None => FrameList::new(),
        }
    }

    /// Top-first iteration over cloned frames.
    pub fn iter(&self) -> FrameListIter<'_> {
        FrameListIter {
            node: self.head.as_deref(),
        }
    }
}

pub struct FrameListIter<'a> {
    node: Option<&'a FrameNode>,
}

impl<'a> Iterator for FrameListIter<'a> {
    type Item = &'a Frame;

    fn next(&mut self) -> Option<&'a Frame> {
        let node = self.node?;
        self.node = node.next.as_deref();
        Some(&node.frame)
    }
}

/// Storage behind the runtime's frame stack. Swapping the implementation
/// trades capture cost against steady-state push/pop cost.
pub trait StackRepr {
    fn push(&mut self, frame: Frame);
    fn pop(&mut self) -> Option<Frame>;
    fn peek(&self) -> Option<Frame>;
    fn snapshot(&self) -> Snapshot;
    fn load(&mut self, snapshot: &Snapshot);
    fn clear(&mut self);
    fn depth(&self) -> usize;
}

/// Plain vector stack; capture clones the whole vector.
#[derive(Default)]
pub struct EagerStack {
    frames: Vec<Frame>,
}

impl EagerStack {
    pub fn new() -> Self {
        Self::default()
    }
}

impl StackRepr for EagerStack {
    fn push(&mut self, frame: Frame) {
        self.frames.push(frame);
    }

    fn pop(&mut self) -> Option<Frame> {
        self.frames.pop()
    }

    fn peek(&self) -> Option<Frame> {
        self.frames.last().cloned()
    }

    fn snapshot(&self) -> Snapshot {
        Snapshot::Copied(Rc::new(self.frames.clone()))
    }

    fn load(&mut self, snapshot: &Snapshot) {
        self.frames.clear();
        match snapshot {
            Snapshot::Copied(frames) => self.frames.extend(frames.iter().cloned()),
            Snapshot::Shared(list) => {
                self.frames.extend(list.iter().cloned());
                self.frames.reverse();
            }
        }
    }

    fn clear(&mut self) {
        self.frames.clear();
    }

    fn depth(&self) -> usize {
        self.frames.len()
    }
}

/// Persistent-list stack; capture aliases the list in O(1) and pushes
/// after a capture leave old snapshots untouched.
#[derive(Default)]
pub struct SharedStack {
    frames: FrameList,
}

impl SharedStack {
    pub fn new() -> Self {
        Self::default()
    }
}

impl StackRepr for SharedStack {
    fn push(&mut self, frame: Frame) {
        self.frames = self.frames.cons(frame);
    }

    fn pop(&mut self) -> Option<Frame> {
        let top = self.frames.head().cloned()?;
        self.frames = self.frames.tail();
        Some(top)
    }

    fn peek(&self) -> Option<Frame> {
        self.frames.head().cloned()
    }

    fn snapshot(&self) -> Snapshot {
        Snapshot::Shared(self.frames.clone())
    }

    fn load(&mut self, snapshot: &Snapshot) {
        match snapshot {
            Snapshot::Shared(list) => self.frames = list.clone(),
            Snapshot::Copied(frames) => {
                let mut list = FrameList::new();
                for frame in frames.iter() {
                    list = list.cons(frame.clone());
                }
                self.frames = list;
            }
        }
    }

    fn clear(&mut self) {
        self.frames = FrameList::new();
    }

    fn depth(&self) -> usize {
        self.frames.len()
    }
}
