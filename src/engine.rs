// engine.rs - Compiler step, executor inner loop, engine facade

use std::cell::RefCell;
use std::rc::Rc;

use tracing::{debug, trace};

use crate::context::{Context, Frame};
use crate::cursor::Delimiter;
use crate::dictionary::{DictEntryRef, Dictionary};
use crate::error::EngineError;
use crate::host::{BasicHost, HostBridge};
use crate::value::{builtin, Callable, Value};
use crate::words;

/// Higher words compiled at startup: structured control flow in terms of
/// the branch primitives.
const BOOT_SOURCE: &str = include_str!("boot.fth");

// ============================================================================
// COMPILER
// ============================================================================

/// Literal fallback for words not found in the dictionary: signed integers
/// and floats, the three keyword literals, and single-token quoted strings
/// (`'X'` with no embedded whitespace; spaced strings go through the quote
/// word).
pub fn parse_literal(word: &str) -> Option<Value> {
    match word {
        "true" => return Some(Value::Bool(true)),
        "false" => return Some(Value::Bool(false)),
        "undefined" => return Some(Value::Undefined),
        _ => {}
    }
    if word.len() >= 2 && word.starts_with('\'') && word.ends_with('\'') {
        return Some(Value::string(&word[1..word.len() - 1]));
    }
    if let Ok(n) = word.parse::<i64>() {
        return Some(Value::Number(n as f64));
    }
    word.parse::<f64>()
        .ok()
        .filter(|n| n.is_finite())
        .map(Value::Number)
}

/// Consume one word from the cursor and compile it: immediate words run
/// now, everything else lands in the current compilation target. At end of
/// input the whole compiled program is handed to the executor once, then
/// the context halts.
pub fn interpret(ctx: &mut Context) -> Result<(), EngineError> {
    if ctx.input.at_end() {
        if ctx.execute_at_end && !ctx.did_execute_and_end {
            ctx.did_execute_and_end = true;
            ctx.compilation_stack.truncate(1);
            let execute = ctx.core("EXECUTE")?;
            return (execute.run)(ctx);
        }
        ctx.set_halted();
        return Ok(());
    }

    let word = ctx.input.consume(Delimiter::Whitespace, false, true);
    if word.trim().is_empty() {
        return Ok(());
    }
    trace!(word = %word, "interpret");

    let entry = ctx.dict.borrow().find(&word);
    if let Some(entry) = entry {
        let (immediate, primitive) = {
            let e = entry.borrow();
            (e.immediate, e.primitive.clone())
        };
        if immediate {
            return (primitive.run)(ctx);
        }
        return ctx.compile(Value::Native(primitive));
    }

    match parse_literal(&word) {
        Some(value) => ctx.compile(value),
        None => Err(EngineError::UnknownWord(word)),
    }
}

// ============================================================================
// EXECUTOR
// ============================================================================

/// Advance the top frame by one cell: callables run, anything else is
/// pushed verbatim. Running off the end of a body pops the frame.
fn inner_next(ctx: &mut Context) -> Result<(), EngineError> {
    let (entry, index) = {
        let frame = ctx
            .return_stack
            .last_mut()
            .ok_or(EngineError::ReturnStackUnderflow)?;
        let index = frame.index;
        frame.index += 1;
        (frame.entry.clone(), index)
    };

    let cell = {
        let e = entry.borrow();
        if index >= e.compiled.len() {
            None
        } else {
            Some(e.compiled[index].clone())
        }
    };

    match cell {
        None => {
            ctx.pop_frame()?;
            Ok(())
        }
        Some(Value::Native(primitive)) => (primitive.run)(ctx),
        Some(value) => {
            ctx.push(value);
            Ok(())
        }
    }
}

/// The main loop: drain the return stack, and when it is empty ask the
/// compiler for one more word. Returns when the context halts or pauses;
/// errors from primitives propagate uncaught.
pub fn query(ctx: &mut Context) -> Result<(), EngineError> {
    while !ctx.halted && !ctx.paused {
        if ctx.return_stack.is_empty() {
            interpret(ctx)?;
        } else {
            inner_next(ctx)?;
        }
    }
    Ok(())
}

/// Drive a context to completion, serving `sleep` pauses through the host
/// bridge. A pause with no pending wakeup returns to the caller, who owns
/// resumption.
pub fn run(ctx: &mut Context) -> Result<(), EngineError> {
    loop {
        query(ctx)?;
        if ctx.halted {
            return Ok(());
        }
        match ctx.take_sleep() {
            Some(ms) => {
                debug!(ms, "sleeping");
                ctx.host.clone().wait(ms);
                ctx.paused = false;
            }
            None => return Ok(()),
        }
    }
}

// ============================================================================
// ENGINE FACADE
// ============================================================================

/// Shared dictionary plus host bridge: the thing embedders hold. Every
/// context made from one engine sees the same words.
pub struct Engine {
    dict: Rc<RefCell<Dictionary>>,
    host: Rc<dyn HostBridge>,
}

impl Engine {
    pub fn new() -> Self {
        Self::with_host(Rc::new(BasicHost::new()))
    }

    pub fn with_host(host: Rc<dyn HostBridge>) -> Self {
        let mut dict = Dictionary::new();
        words::install(&mut dict);
        dict.seal();
        let engine = Engine {
            dict: Rc::new(RefCell::new(dict)),
            host,
        };
        let mut boot = engine.new_ctx(BOOT_SOURCE);
        run(&mut boot).expect("boot source must compile");
        engine
    }

    pub fn new_ctx(&self, input: &str) -> Context {
        Context::new(self.dict.clone(), self.host.clone(), input)
    }

    /// Compile and run one program on a fresh context, returning the final
    /// parameter stack bottom first.
    pub fn eval(&self, source: &str) -> Result<Vec<Value>, EngineError> {
        let mut ctx = self.new_ctx(source);
        run(&mut ctx)?;
        Ok(ctx.stack_values())
    }

    /// Register a primitive. `None` makes an anonymous entry reachable only
    /// through the returned reference.
    pub fn define(
        &self,
        name: Option<&str>,
        immediate: bool,
        f: impl Fn(&mut Context) -> Result<(), EngineError> + 'static,
    ) -> DictEntryRef {
        let label = name.unwrap_or("(anonymous)").to_string();
        self.dict
            .borrow_mut()
            .define(name, builtin(label, f), immediate)
    }

    pub fn find_dictionary_entry(&self, name: &str) -> Option<DictEntryRef> {
        self.dict.borrow().find(name)
    }

    /// Stable handle to a builtin primitive, immune to shadowing.
    pub fn core_word_impl(&self, name: &str) -> Option<Callable> {
        self.dict.borrow().core_word(name)
    }

    pub fn dictionary(&self) -> Rc<RefCell<Dictionary>> {
        self.dict.clone()
    }

    pub fn host(&self) -> Rc<dyn HostBridge> {
        self.host.clone()
    }
}

impl Default for Engine {
    fn default() -> Self {
        Self::new()
    }
}

/// Run a detached entry on a fresh context sharing this engine's
/// dictionary: the executor is seeded with a single frame and end-of-input
/// execution is disabled. This is the calling convention event
/// collaborators use, and what backs `wordToFunc:`.
pub fn run_entry(
    dict: Rc<RefCell<Dictionary>>,
    host: Rc<dyn HostBridge>,
    entry: DictEntryRef,
    args: &[Value],
    me: Value,
) -> Result<Value, EngineError> {
    let mut ctx = Context::new(dict, host, "");
    ctx.execute_at_end = false;
    ctx.me = me;
    for arg in args {
        ctx.push(arg.clone());
    }
    ctx.return_stack.push(Frame { entry, index: 0 });
    run(&mut ctx)?;
    let result = ctx.pop().unwrap_or(Value::Undefined);
    Ok(result)
}
