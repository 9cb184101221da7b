// value.rs - Tagged values held on the stacks

use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

use regex::Regex;

use crate::context::Context;
use crate::dictionary::DictEntryRef;
use crate::error::EngineError;

/// Arrays are owned, mutable, and shared by handle.
pub type ArrayRef = Rc<RefCell<Vec<Value>>>;

// ============================================================================
// CALLABLES
// ============================================================================

/// A primitive implementation. Primitives run against the whole context so
/// parsing words can read the cursor and compiling words can reach the
/// compilation stack.
pub struct Builtin {
    pub name: String,
    pub run: Box<dyn Fn(&mut Context) -> Result<(), EngineError>>,
}

pub type Callable = Rc<Builtin>;

pub fn builtin(
    name: impl Into<String>,
    f: impl Fn(&mut Context) -> Result<(), EngineError> + 'static,
) -> Callable {
    Rc::new(Builtin {
        name: name.into(),
        run: Box::new(f),
    })
}

/// The primitive of anonymous compilation targets. Never meant to run.
pub fn placeholder() -> Callable {
    builtin("(anonymous)", |_ctx| Err(EngineError::UncallableCalled))
}

impl fmt::Debug for Builtin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<word {}>", self.name)
    }
}

/// A host-side callable: what `wordToFunc:` produces and `jsApply` consumes.
pub struct HostFunction {
    pub name: String,
    pub call: Box<dyn Fn(&[Value]) -> Result<Value, EngineError>>,
}

impl fmt::Debug for HostFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<fn {}>", self.name)
    }
}

// ============================================================================
// HOST OBJECTS
// ============================================================================

/// Marks what an opaque object handle stands for, so a bridge can tell a
/// plain property bag from the handle `C` pushes for the running context.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ObjectTag {
    Plain,
    Context,
}

/// An opaque host object. The basic host models these as property maps.
#[derive(Debug)]
pub struct ObjectCell {
    pub tag: ObjectTag,
    pub props: RefCell<HashMap<String, Value>>,
}

impl ObjectCell {
    pub fn plain() -> Rc<ObjectCell> {
        Rc::new(ObjectCell {
            tag: ObjectTag::Plain,
            props: RefCell::new(HashMap::new()),
        })
    }

    pub fn context_handle() -> Rc<ObjectCell> {
        Rc::new(ObjectCell {
            tag: ObjectTag::Context,
            props: RefCell::new(HashMap::new()),
        })
    }
}

// ============================================================================
// COMPILED CELLS
// ============================================================================

/// A location inside a dictionary entry's compiled sequence. Entries only
/// grow, so a cell reference stays valid for the life of the program.
#[derive(Clone)]
pub struct CompiledCell {
    pub entry: DictEntryRef,
    pub index: usize,
}

impl CompiledCell {
    pub fn get(&self) -> Value {
        self.entry
            .borrow()
            .compiled
            .get(self.index)
            .cloned()
            .unwrap_or(Value::Undefined)
    }

    /// Writing past the end extends the sequence, like sparse host-language
    /// index assignment.
    pub fn set(&self, value: Value) {
        let mut entry = self.entry.borrow_mut();
        if self.index >= entry.compiled.len() {
            entry.compiled.resize(self.index + 1, Value::Undefined);
        }
        entry.compiled[self.index] = value;
    }

    pub fn same_entry(&self, other: &CompiledCell) -> bool {
        Rc::ptr_eq(&self.entry, &other.entry)
    }
}

impl fmt::Debug for CompiledCell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self.entry.try_borrow() {
            Ok(entry) => entry.name.clone().unwrap_or_else(|| "(anonymous)".into()),
            Err(_) => "(busy)".into(),
        };
        write!(f, "<cell {}[{}]>", name, self.index)
    }
}

// ============================================================================
// VALUE
// ============================================================================

#[derive(Debug, Clone)]
pub enum Value {
    Number(f64),
    Bool(bool),
    Str(Rc<String>),
    Regex(Rc<Regex>),
    Null,
    Undefined,
    Array(ArrayRef),
    Object(Rc<ObjectCell>),
    Function(Rc<HostFunction>),
    Entry(DictEntryRef),
    Cell(CompiledCell),
    Native(Callable),
}

impl Value {
    pub fn string(s: impl Into<String>) -> Value {
        Value::Str(Rc::new(s.into()))
    }

    pub fn array(items: Vec<Value>) -> Value {
        Value::Array(Rc::new(RefCell::new(items)))
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Number(_) => "number",
            Value::Bool(_) => "boolean",
            Value::Str(_) => "string",
            Value::Regex(_) => "regex",
            Value::Null => "null",
            Value::Undefined => "undefined",
            Value::Array(_) => "array",
            Value::Object(_) => "object",
            Value::Function(_) => "function",
            Value::Entry(_) => "word",
            Value::Cell(_) => "cell",
            Value::Native(_) => "word",
        }
    }

    /// Host-language truthiness: false, 0, NaN, "", null and undefined are
    /// falsy, everything else truthy.
    pub fn is_truthy(&self) -> bool {
        match self {
            Value::Bool(b) => *b,
            Value::Number(n) => *n != 0.0 && !n.is_nan(),
            Value::Str(s) => !s.is_empty(),
            Value::Null | Value::Undefined => false,
            _ => true,
        }
    }

    /// Host-language numeric coercion. Values with no numeric reading
    /// become NaN.
    pub fn to_number(&self) -> f64 {
        match self {
            Value::Number(n) => *n,
            Value::Bool(true) => 1.0,
            Value::Bool(false) => 0.0,
            Value::Null => 0.0,
            Value::Str(s) => {
                let trimmed = s.trim();
                if trimmed.is_empty() {
                    0.0
                } else {
                    trimmed.parse::<f64>().unwrap_or(f64::NAN)
                }
            }
            _ => f64::NAN,
        }
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            Value::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<ArrayRef> {
        match self {
            Value::Array(a) => Some(a.clone()),
            _ => None,
        }
    }

    /// Strict equality: same type, same value; reference identity for
    /// aggregates and callables. NaN is not equal to itself.
    pub fn strict_eq(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Number(a), Value::Number(b)) => a == b,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Str(a), Value::Str(b)) => a == b,
            (Value::Null, Value::Null) => true,
            (Value::Undefined, Value::Undefined) => true,
            (Value::Regex(a), Value::Regex(b)) => Rc::ptr_eq(a, b),
            (Value::Array(a), Value::Array(b)) => Rc::ptr_eq(a, b),
            (Value::Object(a), Value::Object(b)) => Rc::ptr_eq(a, b),
            (Value::Function(a), Value::Function(b)) => Rc::ptr_eq(a, b),
            (Value::Entry(a), Value::Entry(b)) => Rc::ptr_eq(a, b),
            (Value::Native(a), Value::Native(b)) => Rc::ptr_eq(a, b),
            (Value::Cell(a), Value::Cell(b)) => a.same_entry(b) && a.index == b.index,
            _ => false,
        }
    }

    /// Loose equality: null and undefined match each other, numbers and
    /// strings compare after numeric coercion, booleans coerce to numbers.
    /// Aggregates still compare by identity.
    pub fn loose_eq(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Null, Value::Undefined) | (Value::Undefined, Value::Null) => true,
            (Value::Number(a), Value::Str(_)) => *a == other.to_number(),
            (Value::Str(_), Value::Number(b)) => self.to_number() == *b,
            (Value::Bool(_), _) => {
                Value::Number(self.to_number()).loose_eq(other)
            }
            (_, Value::Bool(_)) => {
                self.loose_eq(&Value::Number(other.to_number()))
            }
            _ => self.strict_eq(other),
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        self.strict_eq(other)
    }
}

fn write_number(f: &mut fmt::Formatter<'_>, n: f64) -> fmt::Result {
    if n.fract() == 0.0 && n.is_finite() && n.abs() < 1e15 {
        write!(f, "{}", n as i64)
    } else {
        write!(f, "{}", n)
    }
}

std::thread_local! {
    // Arrays can contain themselves (the context handle exposes the live
    // parameter stack), so rendering tracks its depth.
    static DISPLAY_DEPTH: std::cell::Cell<usize> = const { std::cell::Cell::new(0) };
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Number(n) => write_number(f, *n),
            Value::Bool(b) => write!(f, "{}", b),
            Value::Str(s) => write!(f, "{}", s),
            Value::Regex(r) => write!(f, "/{}/", r.as_str()),
            Value::Null => write!(f, "null"),
            Value::Undefined => write!(f, "undefined"),
            Value::Array(items) => {
                let depth = DISPLAY_DEPTH.with(|d| {
                    let depth = d.get();
                    d.set(depth + 1);
                    depth
                });
                let result = if depth > 8 {
                    write!(f, "[..]")
                } else {
                    (|| {
                        write!(f, "[")?;
                        for (i, item) in items.borrow().iter().enumerate() {
                            if i > 0 {
                                write!(f, ", ")?;
                            }
                            write!(f, "{}", item)?;
                        }
                        write!(f, "]")
                    })()
                };
                DISPLAY_DEPTH.with(|d| d.set(d.get() - 1));
                result
            }
            Value::Object(o) => match o.tag {
                ObjectTag::Context => write!(f, "<context>"),
                ObjectTag::Plain => write!(f, "<object>"),
            },
            Value::Function(h) => write!(f, "<fn {}>", h.name),
            Value::Entry(e) => {
                let entry = e.borrow();
                write!(f, "<word {}>", entry.name.as_deref().unwrap_or("(anonymous)"))
            }
            Value::Cell(c) => write!(f, "{:?}", c),
            Value::Native(p) => write!(f, "<word {}>", p.name),
        }
    }
}
