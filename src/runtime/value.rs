use crate::runtime::error::RuntimeError;
use crate::runtime::frame::Snapshot;
use crate::runtime::machine::{Rts, Run};
use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

/// Host code invoked as a hosted function. It may return a control signal,
/// so every native function is a potential capture point.
pub type HostFn = Rc<dyn Fn(&Rts, &[Value]) -> Run<Value>>;

/// Constructor body. Receives the object under construction as `this` and
/// may suspend partway through.
pub type CtorBody = Rc<dyn Fn(&Rts, &Value, &[Value]) -> Run<Value>>;

#[derive(Clone)]
pub struct NativeFn {
    pub name: Rc<str>,
    pub f: HostFn,
}

pub struct Ctor {
    pub name: String,
    pub construct: CtorBody,
    pub prototype: RefCell<HashMap<String, Value>>,
}

impl Ctor {
    pub fn new(
        name: impl Into<String>,
        construct: impl Fn(&Rts, &Value, &[Value]) -> Run<Value> + 'static,
    ) -> Rc<Ctor> {
        Rc::new(Ctor {
            name: name.into(),
            construct: Rc::new(construct),
            prototype: RefCell::new(HashMap::new()),
        })
    }
}

/// A captured continuation. Invoking it through the runtime discards the
/// current stack and replays the snapshot.
#[derive(Clone)]
pub struct Continuation {
    pub snapshot: Snapshot,
}

#[derive(Clone, Default)]
pub struct ObjData {
    pub proto: Option<Rc<Ctor>>,
    pub props: HashMap<String, Value>,
}

#[derive(Clone)]
pub enum Value {
    Undefined,
    Bool(bool),
    Num(f64),
    Str(Rc<str>),
    Arr(Rc<RefCell<Vec<Value>>>),
    Obj(Rc<RefCell<ObjData>>),
    Fn(NativeFn),
    Ctor(Rc<Ctor>),
    Cont(Continuation),
}

impl Value {
    pub fn str(s: impl Into<Rc<str>>) -> Value {
        Value::Str(s.into())
    }

    pub fn native(
        name: &str,
        f: impl Fn(&Rts, &[Value]) -> Run<Value> + 'static,
    ) -> Value {
        Value::Fn(NativeFn {
            name: Rc::from(name),
            f: Rc::new(f),
        })
    }

    pub fn array(items: Vec<Value>) -> Value {
        Value::Arr(Rc::new(RefCell::new(items)))
    }

    pub fn object() -> Value {
        Value::Obj(Rc::new(RefCell::new(ObjData::default())))
    }

    pub fn object_with_proto(ctor: &Rc<Ctor>) -> Value {
        Value::Obj(Rc::new(RefCell::new(ObjData {
            proto: Some(ctor.clone()),
            props: HashMap::new(),
        })))
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Undefined => "undefined",
            Value::Bool(_) => "boolean",
            Value::Num(_) => "number",
            Value::Str(_) => "string",
            Value::Arr(_) => "array",
            Value::Obj(_) => "object",
            Value::Fn(_) => "function",
            Value::Ctor(_) => "constructor",
            Value::Cont(_) => "continuation",
        }
    }

    pub fn is_object(&self) -> bool {
        matches!(self, Value::Obj(_) | Value::Arr(_))
    }

    pub fn truthy(&self) -> bool {
        match self {
            Value::Undefined => false,
            Value::Bool(b) => *b,
            Value::Num(n) => *n != 0.0 && !n.is_nan(),
            Value::Str(s) => !s.is_empty(),
            _ => true,
        }
    }

    pub fn as_num(&self) -> Result<f64, RuntimeError> {
        match self {
            Value::Num(n) => Ok(*n),
            other => Err(RuntimeError::TypeMismatch {
                message: format!("expected a number, got `{}`", other.type_name()),
            }),
        }
    }

    /// Property lookup: own properties first, then the constructor
    /// prototype for objects built with `new`.
    pub fn get_prop(&self, name: &str) -> Result<Value, RuntimeError> {
        match self {
            Value::Obj(obj) => {
                let data = obj.borrow();
                if let Some(v) = data.props.get(name) {
                    return Ok(v.clone());
                }
                if let Some(ctor) = &data.proto {
                    if let Some(v) = ctor.prototype.borrow().get(name) {
                        return Ok(v.clone());
                    }
                }
                Ok(Value::Undefined)
            }
            Value::Arr(items) => match name {
                "length" => Ok(Value::Num(items.borrow().len() as f64)),
                _ => Ok(Value::Undefined),
            },
            other => Err(RuntimeError::TypeMismatch {
                message: format!(
                    "cannot read property `{}` of `{}`",
                    name,
                    other.type_name()
                ),
            }),
        }
    }

    pub fn set_prop(&self, name: &str, value: Value) -> Result<(), RuntimeError> {
        match self {
            Value::Obj(obj) => {
                obj.borrow_mut().props.insert(name.to_string(), value);
                Ok(())
            }
            other => Err(RuntimeError::TypeMismatch {
                message: format!(
                    "cannot set property `{}` on `{}`",
                    name,
                    other.type_name()
                ),
            }),
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Undefined, Value::Undefined) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Num(a), Value::Num(b)) => a == b,
            (Value::Str(a), Value::Str(b)) => a == b,
            (Value::Arr(a), Value::Arr(b)) => Rc::ptr_eq(a, b),
            (Value::Obj(a), Value::Obj(b)) => Rc::ptr_eq(a, b),
            (Value::Fn(a), Value::Fn(b)) => Rc::ptr_eq(&a.f, &b.f),
            (Value::Ctor(a), Value::Ctor(b)) => Rc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Undefined => f.write_str("Undefined"),
            Value::Bool(b) => f.debug_tuple("Bool").field(b).finish(),
            Value::Num(n) => f.debug_tuple("Num").field(n).finish(),
            Value::Str(s) => f.debug_tuple("Str").field(s).finish(),
            Value::Arr(items) => f.debug_tuple("Arr").field(&items.borrow().len()).finish(),
            Value::Obj(obj) => {
                let data = obj.borrow();
                let mut keys: Vec<&String> = data.props.keys().collect();
                keys.sort();
                f.debug_tuple("Obj").field(&keys).finish()
            }
            Value::Fn(native) => f.debug_tuple("Fn").field(&native.name).finish(),
            Value::Ctor(ctor) => f.debug_tuple("Ctor").field(&ctor.name).finish(),
            Value::Cont(c) => f.debug_tuple("Cont").field(&c.snapshot.depth()).finish(),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Undefined => write!(f, "undefined"),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Num(n) => write!(f, "{n}"),
            Value::Str(s) => write!(f, "{s}"),
            Value::Arr(items) => {
                write!(f, "[")?;
                for (i, item) in items.borrow().iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{item}")?;
                }
                write!(f, "]")
            }
            Value::Obj(_) => write!(f, "[object]"),
            Value::Fn(native) => write!(f, "[function {}]", native.name),
            Value::Ctor(ctor) => write!(f, "[constructor {}]", ctor.name),
            Value::Cont(_) => write!(f, "[continuation]"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn truthiness_follows_value_shape() {
        assert!(!Value::Undefined.truthy());
        assert!(!Value::Num(0.0).truthy());
        assert!(Value::Num(1.0).truthy());
        assert!(!Value::str("").truthy());
        assert!(Value::object().truthy());
    }

    #[test]
    fn object_equality_is_identity() {
        let a = Value::object();
        let b = a.clone();
        assert_eq!(a, b);
        assert_ne!(a, Value::object());
    }

    #[test]
    fn prototype_lookup_falls_back_to_the_constructor() {
        let ctor = Ctor::new("Point", |_, this, _| Ok(this.clone()));
        ctor.prototype
            .borrow_mut()
            .insert("zero".to_string(), Value::Num(0.0));
        let obj = Value::object_with_proto(&ctor);
        obj.set_prop("x", Value::Num(3.0)).unwrap();
        assert_eq!(obj.get_prop("x").unwrap(), Value::Num(3.0));
        assert_eq!(obj.get_prop("zero").unwrap(), Value::Num(0.0));
        assert_eq!(obj.get_prop("y").unwrap(), Value::Undefined);
    }
}
