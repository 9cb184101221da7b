// words.rs - The primitive word set

use std::rc::Rc;
use std::time::{SystemTime, UNIX_EPOCH};

use regex::Regex;
use tracing::info;

use crate::context::{Context, Frame};
use crate::cursor::Delimiter;
use crate::dictionary::Dictionary;
use crate::engine;
use crate::error::EngineError;
use crate::value::{builtin, CompiledCell, HostFunction, Value};

/// Register every core word. Runs once per engine, before the dictionary
/// is sealed.
pub fn install(dict: &mut Dictionary) {
    install_stack_words(dict);
    install_arithmetic_words(dict);
    install_comparison_words(dict);
    install_definition_words(dict);
    install_branch_words(dict);
    install_variable_words(dict);
    install_parsing_words(dict);
    install_aggregate_words(dict);
    install_host_words(dict);
    install_misc_words(dict);
}

fn def(
    dict: &mut Dictionary,
    name: &str,
    immediate: bool,
    f: impl Fn(&mut Context) -> Result<(), EngineError> + 'static,
) {
    dict.define(Some(name), builtin(name, f), immediate);
}

// ============================================================================
// PARSING AND FRAME HELPERS
// ============================================================================

/// The next whitespace-delimited token, for words that read a name.
fn read_word(ctx: &mut Context) -> Result<String, EngineError> {
    let word = ctx.input.consume(Delimiter::Whitespace, false, true);
    if word.is_empty() {
        return Err(EngineError::UnexpectedEndOfInput);
    }
    Ok(word)
}

/// For parsing words whose payload starts after exactly one space: step
/// over the space, then read through the closing delimiter.
fn read_delimited(ctx: &mut Context, close: char) -> String {
    ctx.input.advance(1);
    ctx.input.consume(Delimiter::Char(close), true, false)
}

/// Read the cell at the executing frame's position and step past it.
/// `lit` and `tick` are this, verbatim.
fn next_cell(ctx: &mut Context) -> Result<Value, EngineError> {
    let frame = ctx
        .return_stack
        .last_mut()
        .ok_or(EngineError::ReturnStackUnderflow)?;
    let index = frame.index;
    frame.index += 1;
    Ok(frame
        .entry
        .borrow()
        .compiled
        .get(index)
        .cloned()
        .unwrap_or(Value::Undefined))
}

/// Advance the executing frame by the signed offset stored in the cell it
/// currently points at.
fn take_branch(ctx: &mut Context) -> Result<(), EngineError> {
    let frame = ctx
        .return_stack
        .last_mut()
        .ok_or(EngineError::ReturnStackUnderflow)?;
    let offset = match frame.entry.borrow().compiled.get(frame.index) {
        Some(Value::Number(n)) if n.is_finite() => *n as i64,
        _ => return Err(EngineError::BadBranch),
    };
    let target = frame.index as i64 + offset;
    if target < 0 {
        return Err(EngineError::BadBranch);
    }
    frame.index = target as usize;
    Ok(())
}

/// Step the executing frame over the offset cell instead of branching.
fn skip_branch(ctx: &mut Context) -> Result<(), EngineError> {
    let frame = ctx
        .return_stack
        .last_mut()
        .ok_or(EngineError::ReturnStackUnderflow)?;
    frame.index += 1;
    Ok(())
}

fn compile_core(ctx: &mut Context, name: &str) -> Result<(), EngineError> {
    let word = ctx.core(name)?;
    ctx.compile(Value::Native(word))
}

// ============================================================================
// STACK SHUFFLING
// ============================================================================

fn install_stack_words(dict: &mut Dictionary) {
    // dup ( a -- a a )
    def(dict, "dup", false, |ctx| {
        let a = ctx.peek()?;
        ctx.push(a);
        Ok(())
    });

    // drop ( a -- )
    def(dict, "drop", false, |ctx| {
        ctx.pop()?;
        Ok(())
    });

    // swap ( a b -- b a )
    def(dict, "swap", false, |ctx| {
        let b = ctx.pop()?;
        let a = ctx.pop()?;
        ctx.push(b);
        ctx.push(a);
        Ok(())
    });

    // over ( a b -- a b a )
    def(dict, "over", false, |ctx| {
        let b = ctx.pop()?;
        let a = ctx.pop()?;
        ctx.push(a.clone());
        ctx.push(b);
        ctx.push(a);
        Ok(())
    });

    // rot ( a b c -- b c a )
    def(dict, "rot", false, |ctx| {
        let c = ctx.pop()?;
        let b = ctx.pop()?;
        let a = ctx.pop()?;
        ctx.push(b);
        ctx.push(c);
        ctx.push(a);
        Ok(())
    });

    // -rot ( a b c -- c a b )
    def(dict, "-rot", false, |ctx| {
        let c = ctx.pop()?;
        let b = ctx.pop()?;
        let a = ctx.pop()?;
        ctx.push(c);
        ctx.push(a);
        ctx.push(b);
        Ok(())
    });

    // depth ( -- n )
    def(dict, "depth", false, |ctx| {
        let n = ctx.depth();
        ctx.push(Value::Number(n as f64));
        Ok(())
    });
}

// ============================================================================
// ARITHMETIC
// ============================================================================

fn binary_number(
    dict: &mut Dictionary,
    name: &str,
    f: impl Fn(f64, f64) -> f64 + 'static,
) {
    def(dict, name, false, move |ctx| {
        let b = ctx.pop()?;
        let a = ctx.pop()?;
        ctx.push(Value::Number(f(a.to_number(), b.to_number())));
        Ok(())
    });
}

fn install_arithmetic_words(dict: &mut Dictionary) {
    // + ( a b -- c ), concatenates when either side is a string
    def(dict, "+", false, |ctx| {
        let b = ctx.pop()?;
        let a = ctx.pop()?;
        let result = match (&a, &b) {
            (Value::Str(_), _) | (_, Value::Str(_)) => {
                Value::string(format!("{}{}", a, b))
            }
            _ => Value::Number(a.to_number() + b.to_number()),
        };
        ctx.push(result);
        Ok(())
    });

    binary_number(dict, "-", |a, b| a - b);
    binary_number(dict, "*", |a, b| a * b);
    binary_number(dict, "/", |a, b| a / b);
    binary_number(dict, "%", |a, b| a % b);

    // not ( a -- flag )
    def(dict, "not", false, |ctx| {
        let a = ctx.pop()?;
        ctx.push(Value::Bool(!a.is_truthy()));
        Ok(())
    });
}

// ============================================================================
// COMPARISON
// ============================================================================

fn compare_word(
    dict: &mut Dictionary,
    name: &str,
    num: impl Fn(f64, f64) -> bool + 'static,
    text: impl Fn(&str, &str) -> bool + 'static,
) {
    def(dict, name, false, move |ctx| {
        let b = ctx.pop()?;
        let a = ctx.pop()?;
        let flag = match (&a, &b) {
            (Value::Str(x), Value::Str(y)) => text(x, y),
            _ => num(a.to_number(), b.to_number()),
        };
        ctx.push(Value::Bool(flag));
        Ok(())
    });
}

fn install_comparison_words(dict: &mut Dictionary) {
    // == ( a b -- flag ), loose
    def(dict, "==", false, |ctx| {
        let b = ctx.pop()?;
        let a = ctx.pop()?;
        ctx.push(Value::Bool(a.loose_eq(&b)));
        Ok(())
    });

    // != ( a b -- flag )
    def(dict, "!=", false, |ctx| {
        let b = ctx.pop()?;
        let a = ctx.pop()?;
        ctx.push(Value::Bool(!a.loose_eq(&b)));
        Ok(())
    });

    // === ( a b -- flag ), strict
    def(dict, "===", false, |ctx| {
        let b = ctx.pop()?;
        let a = ctx.pop()?;
        ctx.push(Value::Bool(a.strict_eq(&b)));
        Ok(())
    });

    // !== ( a b -- flag )
    def(dict, "!==", false, |ctx| {
        let b = ctx.pop()?;
        let a = ctx.pop()?;
        ctx.push(Value::Bool(!a.strict_eq(&b)));
        Ok(())
    });

    compare_word(dict, "<", |a, b| a < b, |a, b| a < b);
    compare_word(dict, ">", |a, b| a > b, |a, b| a > b);
    compare_word(dict, "<=", |a, b| a <= b, |a, b| a <= b);
    compare_word(dict, ">=", |a, b| a >= b, |a, b| a >= b);
}

// ============================================================================
// DEFINITION AND IMMEDIACY
// ============================================================================

fn install_definition_words(dict: &mut Dictionary) {
    // : NAME — open a definition; further words compile into it
    def(dict, ":", true, |ctx| {
        let name = read_word(ctx)?;
        let entry = ctx.dict.borrow_mut().define_with_self(
            Some(&name),
            false,
            |entry| {
                builtin(name.clone(), move |ctx| {
                    ctx.return_stack.push(Frame {
                        entry: entry.clone(),
                        index: 0,
                    });
                    Ok(())
                })
            },
        );
        ctx.compilation_stack.push(entry);
        Ok(())
    });

    // ; — close the innermost definition
    def(dict, ";", true, |ctx| {
        if ctx.compilation_stack.len() <= 1 {
            return Err(EngineError::CompilationStackUnderflow);
        }
        ctx.compilation_stack.pop();
        Ok(())
    });

    // immediate — mark the open definition as immediate
    def(dict, "immediate", true, |ctx| {
        ctx.current_target()?.borrow_mut().immediate = true;
        Ok(())
    });

    // postpone NAME — defer the named word's effect by one level
    def(dict, "postpone", true, |ctx| {
        let name = read_word(ctx)?;
        let entry = ctx
            .dict
            .borrow()
            .find(&name)
            .ok_or(EngineError::UnknownWord(name.clone()))?;
        let (immediate, primitive) = {
            let e = entry.borrow();
            (e.immediate, e.primitive.clone())
        };
        if immediate {
            ctx.compile(Value::Native(primitive))
        } else {
            let helper = builtin(format!("(postpone {})", name), move |ctx| {
                ctx.compile(Value::Native(primitive.clone()))
            });
            ctx.compile(Value::Native(helper))
        }
    });

    // lit / tick — push the inline cell the compiler placed after this word
    def(dict, "lit", false, |ctx| {
        let value = next_cell(ctx)?;
        ctx.push(value);
        Ok(())
    });
    def(dict, "tick", false, |ctx| {
        let value = next_cell(ctx)?;
        ctx.push(value);
        Ok(())
    });

    // , ( x -- ) append to the current compilation target
    def(dict, ",", false, |ctx| {
        let value = ctx.pop()?;
        ctx.compile(value)
    });

    // compileNow: TOKEN — append a literal without a lit pair
    def(dict, "compileNow:", true, |ctx| {
        let word = read_word(ctx)?;
        match engine::parse_literal(&word) {
            Some(value) => ctx.compile(value),
            None => Err(EngineError::CompileNowNotPrimitive(word)),
        }
    });

    // EXECUTE — thread through everything compiled into the current target
    def(dict, "EXECUTE", true, |ctx| {
        let target = ctx.current_target()?;
        ctx.return_stack.push(Frame {
            entry: target,
            index: 0,
        });
        Ok(())
    });

    // interpret — compile one more word from the cursor
    def(dict, "interpret", false, engine::interpret);

    // exit — pop the executing frame
    def(dict, "exit", false, |ctx| {
        ctx.pop_frame()?;
        Ok(())
    });

    // quit — unwind to the bottom frame, then interpret again
    def(dict, "quit", false, |ctx| {
        ctx.return_stack.truncate(1);
        engine::interpret(ctx)
    });
}

// ============================================================================
// BRANCH PRIMITIVES
// ============================================================================

fn install_branch_words(dict: &mut Dictionary) {
    // branch — unconditional, offset in the following cell
    def(dict, "branch", false, take_branch);

    // 0branch — branch when the popped number is exactly zero
    def(dict, "0branch", false, |ctx| {
        let flag = ctx.pop()?;
        let n = match flag {
            Value::Number(n) if n.is_finite() => n,
            _ => return Err(EngineError::BadStackForZeroBranch),
        };
        if n == 0.0 {
            take_branch(ctx)
        } else {
            skip_branch(ctx)
        }
    });

    // falsyBranch — branch on any falsy value
    def(dict, "falsyBranch", false, |ctx| {
        let flag = ctx.pop()?;
        if flag.is_truthy() {
            skip_branch(ctx)
        } else {
            take_branch(ctx)
        }
    });

    // here ( -- cell ) the next free slot of the compilation target
    def(dict, "here", false, |ctx| {
        let target = ctx.current_target()?;
        let index = target.borrow().compiled.len();
        ctx.push(Value::Cell(CompiledCell {
            entry: target,
            index,
        }));
        Ok(())
    });

    // -stackFrame ( a b -- a.i-b.i ) both cells must share an entry
    def(dict, "-stackFrame", false, |ctx| {
        let b = ctx.pop()?;
        let a = ctx.pop()?;
        match (a, b) {
            (Value::Cell(a), Value::Cell(b)) if a.same_entry(&b) => {
                ctx.push(Value::Number(a.index as f64 - b.index as f64));
                Ok(())
            }
            _ => Err(EngineError::BadStackFrame),
        }
    });
}

// ============================================================================
// VARIABLES AND CONSTANTS
// ============================================================================

fn install_variable_words(dict: &mut Dictionary) {
    // var: NAME — NAME pushes a storage cell private to its entry
    def(dict, "var:", true, |ctx| {
        let name = read_word(ctx)?;
        let entry = ctx.dict.borrow_mut().define_with_self(
            Some(&name),
            false,
            |entry| {
                builtin(format!("(var {})", name), move |ctx| {
                    ctx.push(Value::Cell(CompiledCell {
                        entry: entry.clone(),
                        index: 0,
                    }));
                    Ok(())
                })
            },
        );
        entry.borrow_mut().compiled.push(Value::Undefined);
        Ok(())
    });

    // ! ( x cell -- ) store through the cell's setter
    def(dict, "!", false, |ctx| {
        let token = ctx.pop()?;
        let value = ctx.pop()?;
        match token {
            Value::Cell(cell) => {
                cell.set(value);
                Ok(())
            }
            other => Err(EngineError::Host(format!(
                "! needs a storage cell, got {}",
                other.type_name()
            ))),
        }
    });

    // @ ( cell -- x ) fetch through the cell's getter
    def(dict, "@", false, |ctx| {
        let token = ctx.pop()?;
        match token {
            Value::Cell(cell) => {
                ctx.push(cell.get());
                Ok(())
            }
            other => Err(EngineError::Host(format!(
                "@ needs a storage cell, got {}",
                other.type_name()
            ))),
        }
    });

    // const: NAME — NAME pushes a value captured when the defining code runs
    def(dict, "const:", true, |ctx| {
        let name = read_word(ctx)?;
        let entry = ctx.dict.borrow_mut().define_with_self(
            Some(&name),
            false,
            |entry| {
                builtin(format!("(const {})", name), move |ctx| {
                    let value = entry
                        .borrow()
                        .compiled
                        .first()
                        .cloned()
                        .unwrap_or(Value::Undefined);
                    ctx.push(value);
                    Ok(())
                })
            },
        );
        entry.borrow_mut().compiled.push(Value::Undefined);
        let capture = builtin(format!("(capture {})", name), move |ctx| {
            let value = ctx.pop()?;
            entry.borrow_mut().compiled[0] = value;
            Ok(())
        });
        ctx.compile(Value::Native(capture))
    });
}

// ============================================================================
// PARSING WORDS
// ============================================================================

fn install_parsing_words(dict: &mut Dictionary) {
    // ' TEXT' — string literal, one space then up to the closing quote
    def(dict, "'", true, |ctx| {
        let text = read_delimited(ctx, '\'');
        compile_core(ctx, "lit")?;
        ctx.compile(Value::string(text))
    });

    // ( comment )
    def(dict, "(", true, |ctx| {
        ctx.input.consume(Delimiter::Char(')'), true, false);
        Ok(())
    });

    // re/ PATTERN/ — compiled regex literal
    def(dict, "re/", true, |ctx| {
        let pattern = read_delimited(ctx, '/');
        let regex =
            Regex::new(&pattern).map_err(|e| EngineError::BadRegex(e.to_string()))?;
        compile_core(ctx, "lit")?;
        ctx.compile(Value::Regex(Rc::new(regex)))
    });

    // match/ PATTERN/ — sugar for: lit regex swap match
    def(dict, "match/", true, |ctx| {
        let pattern = read_delimited(ctx, '/');
        let regex =
            Regex::new(&pattern).map_err(|e| EngineError::BadRegex(e.to_string()))?;
        compile_core(ctx, "lit")?;
        ctx.compile(Value::Regex(Rc::new(regex)))?;
        compile_core(ctx, "swap")?;
        compile_core(ctx, "match")
    });

    // match ( regex str -- arr|null ) full match then capture groups
    def(dict, "match", false, |ctx| {
        let text = ctx.pop()?;
        let regex = ctx.pop()?;
        let (regex, text) = match (&regex, &text) {
            (Value::Regex(r), Value::Str(s)) => (r.clone(), s.clone()),
            _ => {
                return Err(EngineError::Host(format!(
                    "match needs regex and string, got {} and {}",
                    regex.type_name(),
                    text.type_name()
                )))
            }
        };
        match regex.captures(&text) {
            Some(caps) => {
                let groups: Vec<Value> = caps
                    .iter()
                    .map(|g| match g {
                        Some(m) => Value::string(m.as_str()),
                        None => Value::Undefined,
                    })
                    .collect();
                ctx.push(Value::array(groups));
            }
            None => ctx.push(Value::Null),
        }
        Ok(())
    });

    // word — push the next whitespace-delimited token
    def(dict, "word", true, |ctx| {
        let token = ctx.input.consume(Delimiter::Whitespace, false, true);
        ctx.push(Value::string(token));
        Ok(())
    });
}

// ============================================================================
// AGGREGATES AND ITERATION
// ============================================================================

fn install_aggregate_words(dict: &mut Dictionary) {
    // [] ( -- arr )
    def(dict, "[]", false, |ctx| {
        ctx.push(Value::array(Vec::new()));
        Ok(())
    });

    // push ( arr x -- arr )
    def(dict, "push", false, |ctx| {
        let x = ctx.pop()?;
        let arr = ctx.pop()?;
        let items = arr.as_array().ok_or_else(|| {
            EngineError::Host(format!("push needs an array, got {}", arr.type_name()))
        })?;
        items.borrow_mut().push(x);
        ctx.push(arr);
        Ok(())
    });

    // pop ( arr -- arr x )
    def(dict, "pop", false, |ctx| {
        let arr = ctx.pop()?;
        let items = arr.as_array().ok_or_else(|| {
            EngineError::Host(format!("pop needs an array, got {}", arr.type_name()))
        })?;
        let x = items.borrow_mut().pop().unwrap_or(Value::Undefined);
        ctx.push(arr);
        ctx.push(x);
        Ok(())
    });

    // first ( arr -- x ) undefined when empty or not an array
    def(dict, "first", false, |ctx| {
        let arr = ctx.pop()?;
        let x = match arr.as_array() {
            Some(items) => items.borrow().first().cloned().unwrap_or(Value::Undefined),
            None => Value::Undefined,
        };
        ctx.push(x);
        Ok(())
    });

    // nth ( arr n -- x )
    def(dict, "nth", false, |ctx| {
        let n = ctx.pop()?.to_number();
        let arr = ctx.pop()?;
        let x = match arr.as_array() {
            Some(items) if n >= 0.0 => items
                .borrow()
                .get(n as usize)
                .cloned()
                .unwrap_or(Value::Undefined),
            _ => Value::Undefined,
        };
        ctx.push(x);
        Ok(())
    });

    // clone ( arr -- arr' ) shallow copy
    def(dict, "clone", false, |ctx| {
        let arr = ctx.pop()?;
        let items = arr.as_array().ok_or(EngineError::CloneNonArray)?;
        let copied = items.borrow().clone();
        ctx.push(Value::array(copied));
        Ok(())
    });

    // collect ( xN .. x1 n -- arr ) deepest value lands first
    def(dict, "collect", false, |ctx| {
        let n = ctx.pop()?.to_number();
        if !n.is_finite() || n < 0.0 {
            return Err(EngineError::Host("collect needs a count".into()));
        }
        let mut items = Vec::with_capacity(n as usize);
        for _ in 0..n as usize {
            items.push(ctx.pop()?);
        }
        items.reverse();
        ctx.push(Value::array(items));
        Ok(())
    });

    // spread ( arr -- x1 .. xN )
    def(dict, "spread", false, |ctx| {
        let arr = ctx.pop()?;
        let items = arr.as_array().ok_or_else(|| {
            EngineError::Host(format!("spread needs an array, got {}", arr.type_name()))
        })?;
        let items = items.borrow().clone();
        for item in items {
            ctx.push(item);
        }
        Ok(())
    });

    // >control ( x -- ) move to the control stack
    def(dict, ">control", false, |ctx| {
        let x = ctx.pop()?;
        ctx.push_control(x);
        Ok(())
    });

    // control> ( -- x ) move back from the control stack
    def(dict, "control>", false, |ctx| {
        let x = ctx.pop_control()?;
        ctx.push(x);
        Ok(())
    });

    // I ( -- x ) copy of the control-stack top: the current loop element
    def(dict, "I", false, |ctx| {
        let x = ctx.peek_control()?;
        ctx.push(x);
        Ok(())
    });

    // [ — open an anonymous compilation target
    def(dict, "[", true, |ctx| {
        let anon = ctx.dict.borrow_mut().define_anonymous();
        ctx.compilation_stack.push(anon);
        Ok(())
    });

    // ] — close it and plant its compiled sequence as an array literal
    def(dict, "]", true, |ctx| {
        if ctx.compilation_stack.len() <= 1 {
            return Err(EngineError::CompilationStackUnderflow);
        }
        let anon = ctx
            .compilation_stack
            .pop()
            .ok_or(EngineError::CompilationStackUnderflow)?;
        let items = anon.borrow().compiled.clone();
        ctx.compile(Value::array(items))
    });

    install_each_words(dict);
}

/// The per-iteration loop head. Control stack on entry: [.., array, index].
/// While elements remain it pushes the current one and steps over the
/// offset cell after it; when exhausted it unwinds the loop state and
/// branches forward past the loop tail.
fn each_primer(ctx: &mut Context) -> Result<(), EngineError> {
    let (arr, idx) = {
        let control = ctx.control_stack.borrow();
        let len = control.len();
        if len < 2 {
            return Err(EngineError::Host("each: loop state missing".into()));
        }
        (control[len - 2].clone(), control[len - 1].clone())
    };
    let items = arr
        .as_array()
        .ok_or_else(|| EngineError::Host("each: loop array missing".into()))?;
    let index = idx
        .as_number()
        .ok_or_else(|| EngineError::Host("each: loop index missing".into()))?
        as usize;
    if index < items.borrow().len() {
        let element = items.borrow()[index].clone();
        ctx.push_control(element);
        skip_branch(ctx)
    } else {
        ctx.pop_control()?;
        ctx.pop_control()?;
        take_branch(ctx)
    }
}

fn install_each_words(dict: &mut Dictionary) {
    // each — compile the loop head over a clone of the array on top
    def(dict, "each", true, |ctx| {
        let guard = builtin("(each guard)", |ctx| match ctx.peek()? {
            Value::Array(_) => Ok(()),
            _ => Err(EngineError::EachNeedsArray),
        });
        ctx.compile(Value::Native(guard))?;
        compile_core(ctx, "clone")?;
        compile_core(ctx, ">control")?;
        ctx.compile(Value::Number(0.0))?;
        compile_core(ctx, ">control")?;
        ctx.compile(Value::Native(builtin("(each)", each_primer)))?;
        // leave a cell for endeach; the primer's exit offset goes there
        let target = ctx.current_target()?;
        let index = target.borrow().compiled.len();
        ctx.push(Value::Cell(CompiledCell {
            entry: target,
            index,
        }));
        ctx.compile(Value::Null)
    });

    // endeach — patch the exit offset and compile the loop tail
    def(dict, "endeach", true, |ctx| {
        let head = match ctx.pop()? {
            Value::Cell(cell) => cell,
            _ => return Err(EngineError::BadStackFrame),
        };
        let target = ctx.current_target()?;
        if !Rc::ptr_eq(&head.entry, &target) {
            return Err(EngineError::BadStackFrame);
        }
        let tail_index = target.borrow().compiled.len();
        head.set(Value::Number((tail_index + 1 - head.index) as f64));
        let back = (head.index as i64 - 1) - (tail_index as i64 + 1);
        let tail = builtin("(endeach)", move |ctx| {
            ctx.pop_control()?;
            let idx = ctx.pop_control()?;
            let arr = ctx.pop_control()?;
            let index = idx
                .as_number()
                .ok_or_else(|| EngineError::Host("endeach: loop index missing".into()))?;
            ctx.push_control(arr);
            ctx.push_control(Value::Number(index + 1.0));
            let frame = ctx
                .return_stack
                .last_mut()
                .ok_or(EngineError::ReturnStackUnderflow)?;
            let jump = frame.index as i64 + back;
            if jump < 0 {
                return Err(EngineError::BadBranch);
            }
            frame.index = jump as usize;
            Ok(())
        });
        ctx.compile(Value::Native(tail))
    });
}

// ============================================================================
// HOST BRIDGE WORDS
// ============================================================================

fn install_host_words(dict: &mut Dictionary) {
    // C ( -- ctx ) the running context as a host object
    def(dict, "C", false, |ctx| {
        let handle = ctx.context_value();
        ctx.push(handle);
        Ok(())
    });

    // globalThis ( -- obj )
    def(dict, "globalThis", false, |ctx| {
        let globals = ctx.host.global_object();
        ctx.push(globals);
        Ok(())
    });

    // {} ( -- obj ) fresh host object
    def(dict, "{}", false, |ctx| {
        let obj = ctx.host.new_object();
        ctx.push(obj);
        Ok(())
    });

    // . NAME — compile a property read: ( obj -- obj[NAME] )
    def(dict, ".", true, |ctx| {
        ctx.input.advance(1);
        let name = ctx.input.consume(Delimiter::Whitespace, false, false);
        if name.is_empty() {
            return Err(EngineError::UnexpectedEndOfInput);
        }
        let helper = builtin(format!("(. {})", name), move |ctx| {
            let target = ctx.pop()?;
            let host = ctx.host.clone();
            let value = host.property_get(ctx, &target, &name)?;
            ctx.push(value);
            Ok(())
        });
        ctx.compile(Value::Native(helper))
    });

    // .! NAME — compile a property write: ( value obj -- )
    def(dict, ".!", true, |ctx| {
        ctx.input.advance(1);
        let name = ctx.input.consume(Delimiter::Whitespace, false, false);
        if name.is_empty() {
            return Err(EngineError::UnexpectedEndOfInput);
        }
        let helper = builtin(format!("(.! {})", name), move |ctx| {
            let target = ctx.pop()?;
            let value = ctx.pop()?;
            let host = ctx.host.clone();
            host.property_set(ctx, &target, &name, value)
        });
        ctx.compile(Value::Native(helper))
    });

    // jsApply ( fn args -- result )
    def(dict, "jsApply", false, |ctx| {
        let args = ctx.pop()?;
        let func = ctx.pop()?;
        let args = args
            .as_array()
            .ok_or_else(|| {
                EngineError::Host(format!(
                    "jsApply needs an argument array, got {}",
                    args.type_name()
                ))
            })?
            .borrow()
            .clone();
        let result = ctx.host.clone().apply(&func, &args)?;
        ctx.push(result);
        Ok(())
    });

    // .apply: NAME — compile a method call: ( obj args -- result )
    def(dict, ".apply:", true, |ctx| {
        let name = read_word(ctx)?;
        let helper = builtin(format!("(.apply: {})", name), move |ctx| {
            let args = ctx.pop()?;
            let target = ctx.pop()?;
            let args = args
                .as_array()
                .ok_or_else(|| {
                    EngineError::Host(format!(
                        ".apply: needs an argument array, got {}",
                        args.type_name()
                    ))
                })?
                .borrow()
                .clone();
            let host = ctx.host.clone();
            let result = host.method_apply(ctx, &target, &name, &args)?;
            ctx.push(result);
            Ok(())
        });
        ctx.compile(Value::Native(helper))
    });

    // wordToFunc: NAME — push a host callable running NAME on a fresh context
    def(dict, "wordToFunc:", true, |ctx| {
        let name = read_word(ctx)?;
        let entry = ctx
            .dict
            .borrow()
            .find(&name)
            .ok_or(EngineError::UnknownWord(name.clone()))?;
        let dict = ctx.dict.clone();
        let host = ctx.host.clone();
        let func = HostFunction {
            name: name.clone(),
            call: Box::new(move |args| {
                engine::run_entry(
                    dict.clone(),
                    host.clone(),
                    entry.clone(),
                    args,
                    Value::Undefined,
                )
            }),
        };
        ctx.push(Value::Function(Rc::new(func)));
        Ok(())
    });
}

// ============================================================================
// TIME, PAUSE, DIAGNOSTICS
// ============================================================================

fn install_misc_words(dict: &mut Dictionary) {
    // sleep ( ms -- ) pause; the host re-enters after the delay
    def(dict, "sleep", false, |ctx| {
        let ms = ctx.pop()?.to_number();
        let ms = if ms.is_finite() && ms > 0.0 { ms } else { 0.0 };
        ctx.paused = true;
        ctx.sleep_ms = Some(ms);
        Ok(())
    });

    // now ( -- ms ) wall clock in milliseconds
    def(dict, "now", false, |ctx| {
        let ms = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as f64)
            .unwrap_or(0.0);
        ctx.push(Value::Number(ms));
        Ok(())
    });

    // throwNewError ( msg -- )
    def(dict, "throwNewError", false, |ctx| {
        let message = ctx.pop()?;
        Err(EngineError::UserThrow(message.to_string()))
    });

    // log ( x -- )
    def(dict, "log", false, |ctx| {
        let x = ctx.pop()?;
        info!("{}", x);
        Ok(())
    });

    // debug ( -- ) log both data stacks
    def(dict, "debug", false, |ctx| {
        let params: Vec<String> = ctx
            .parameter_stack
            .borrow()
            .iter()
            .map(|v| v.to_string())
            .collect();
        let control: Vec<String> = ctx
            .control_stack
            .borrow()
            .iter()
            .map(|v| v.to_string())
            .collect();
        info!(parameters = ?params, control = ?control, "debug");
        Ok(())
    });
}
