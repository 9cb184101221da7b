// context.rs - Per-invocation run state

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use crate::cursor::Cursor;
use crate::dictionary::{DictEntryRef, Dictionary};
use crate::error::EngineError;
use crate::host::HostBridge;
use crate::value::{ArrayRef, Callable, ObjectCell, Value};

/// An in-progress threaded execution: the entry being run and the index of
/// the next cell to execute.
pub struct Frame {
    pub entry: DictEntryRef,
    pub index: usize,
}

/// One-shot completion signal, resolved when the context halts. Hosts can
/// keep a clone and poll it after handing the context off.
#[derive(Clone, Default)]
pub struct Completion(Rc<Cell<bool>>);

impl Completion {
    pub fn is_resolved(&self) -> bool {
        self.0.get()
    }

    fn resolve(&self) {
        self.0.set(true);
    }
}

/// Owns the stacks, the cursor and the halted/paused flags. Contexts share
/// the dictionary and the host bridge but nothing else.
///
/// The parameter and control stacks are handed out by reference through the
/// context handle (`C`), so they live behind shared array cells.
pub struct Context {
    pub dict: Rc<RefCell<Dictionary>>,
    pub host: Rc<dyn HostBridge>,
    pub parameter_stack: ArrayRef,
    pub return_stack: Vec<Frame>,
    pub control_stack: ArrayRef,
    pub compilation_stack: Vec<DictEntryRef>,
    pub input: Cursor,
    pub halted: bool,
    pub paused: bool,
    /// Millisecond delay requested by `sleep`, taken by the run driver.
    pub sleep_ms: Option<f64>,
    pub execute_at_end: bool,
    pub did_execute_and_end: bool,
    /// Per-invocation receiver, seeded by event collaborators.
    pub me: Value,
    halt_signal: Completion,
    self_object: Rc<ObjectCell>,
}

impl Context {
    pub fn new(dict: Rc<RefCell<Dictionary>>, host: Rc<dyn HostBridge>, input: &str) -> Self {
        let base = dict.borrow_mut().define_anonymous();
        Context {
            dict,
            host,
            parameter_stack: Rc::new(RefCell::new(Vec::new())),
            return_stack: Vec::new(),
            control_stack: Rc::new(RefCell::new(Vec::new())),
            compilation_stack: vec![base],
            input: Cursor::new(input),
            halted: false,
            paused: false,
            sleep_ms: None,
            execute_at_end: true,
            did_execute_and_end: false,
            me: Value::Undefined,
            halt_signal: Completion::default(),
            self_object: ObjectCell::context_handle(),
        }
    }

    // ------------------------------------------------------------------
    // parameter stack
    // ------------------------------------------------------------------

    pub fn push(&mut self, value: Value) {
        self.parameter_stack.borrow_mut().push(value);
    }

    pub fn pop(&mut self) -> Result<Value, EngineError> {
        self.parameter_stack
            .borrow_mut()
            .pop()
            .ok_or(EngineError::StackUnderflow)
    }

    pub fn peek(&self) -> Result<Value, EngineError> {
        self.parameter_stack
            .borrow()
            .last()
            .cloned()
            .ok_or(EngineError::StackUnderflow)
    }

    pub fn depth(&self) -> usize {
        self.parameter_stack.borrow().len()
    }

    /// Snapshot of the parameter stack, bottom first.
    pub fn stack_values(&self) -> Vec<Value> {
        self.parameter_stack.borrow().clone()
    }

    // ------------------------------------------------------------------
    // control stack
    // ------------------------------------------------------------------

    pub fn push_control(&mut self, value: Value) {
        self.control_stack.borrow_mut().push(value);
    }

    pub fn pop_control(&mut self) -> Result<Value, EngineError> {
        self.control_stack
            .borrow_mut()
            .pop()
            .ok_or(EngineError::StackUnderflow)
    }

    pub fn peek_control(&self) -> Result<Value, EngineError> {
        self.control_stack
            .borrow()
            .last()
            .cloned()
            .ok_or(EngineError::StackUnderflow)
    }

    // ------------------------------------------------------------------
    // return and compilation stacks
    // ------------------------------------------------------------------

    pub fn pop_frame(&mut self) -> Result<Frame, EngineError> {
        self.return_stack
            .pop()
            .ok_or(EngineError::ReturnStackUnderflow)
    }

    /// The entry currently being compiled into.
    pub fn current_target(&self) -> Result<DictEntryRef, EngineError> {
        self.compilation_stack
            .last()
            .cloned()
            .ok_or(EngineError::CompilationStackUnderflow)
    }

    /// Append one cell to the current compilation target.
    pub fn compile(&mut self, cell: Value) -> Result<(), EngineError> {
        self.current_target()?.borrow_mut().compiled.push(cell);
        Ok(())
    }

    // ------------------------------------------------------------------
    // run state
    // ------------------------------------------------------------------

    pub fn set_halted(&mut self) {
        self.halted = true;
        self.halt_signal.resolve();
    }

    pub fn halt_signal(&self) -> Completion {
        self.halt_signal.clone()
    }

    pub fn take_sleep(&mut self) -> Option<f64> {
        self.sleep_ms.take()
    }

    /// A core primitive, immune to user shadowing.
    pub fn core(&self, name: &str) -> Result<Callable, EngineError> {
        self.dict
            .borrow()
            .core_word(name)
            .ok_or_else(|| EngineError::Host(format!("missing core word {}", name)))
    }

    /// The handle `C` pushes; bridges recognize it by its tag.
    pub fn context_value(&self) -> Value {
        Value::Object(self.self_object.clone())
    }

    /// Is `handle` this context's own object handle?
    pub fn is_self_object(&self, handle: &Rc<ObjectCell>) -> bool {
        Rc::ptr_eq(handle, &self.self_object)
    }

    /// Re-arm a halted context with new input: fresh cursor, fresh base
    /// compilation target, cleared return stack and run flags. The
    /// parameter and control stacks and the dictionary survive, which is
    /// what keeps a REPL session coherent across lines.
    pub fn refill(&mut self, input: &str) {
        let base = self.dict.borrow_mut().define_anonymous();
        self.compilation_stack = vec![base];
        self.return_stack.clear();
        self.input = Cursor::new(input);
        self.halted = false;
        self.paused = false;
        self.sleep_ms = None;
        self.did_execute_and_end = false;
        self.halt_signal = Completion::default();
    }
}
