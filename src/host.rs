// host.rs - Bridge between the engine and its embedding environment

use std::rc::Rc;
use std::time::Duration;

use crate::context::Context;
use crate::error::EngineError;
use crate::value::{ObjectCell, ObjectTag, Value};

/// Everything the core needs from its embedding: dynamic property access,
/// function application, object construction and a scheduler for `sleep`.
/// The core only ever talks to this trait; a browser-style embedding swaps
/// in its own implementation.
pub trait HostBridge {
    fn property_get(
        &self,
        ctx: &mut Context,
        target: &Value,
        name: &str,
    ) -> Result<Value, EngineError>;

    fn property_set(
        &self,
        ctx: &mut Context,
        target: &Value,
        name: &str,
        value: Value,
    ) -> Result<(), EngineError>;

    fn apply(&self, func: &Value, args: &[Value]) -> Result<Value, EngineError>;

    fn method_apply(
        &self,
        ctx: &mut Context,
        target: &Value,
        name: &str,
        args: &[Value],
    ) -> Result<Value, EngineError>;

    fn new_object(&self) -> Value;

    fn global_object(&self) -> Value;

    /// Blocking wait used by the run driver between pause and resume.
    fn wait(&self, ms: f64) {
        if ms > 0.0 {
            std::thread::sleep(Duration::from_millis(ms as u64));
        }
    }
}

/// In-process host: objects are property maps, `C` exposes the live stacks
/// of the running context, and waiting blocks the thread.
pub struct BasicHost {
    globals: Rc<ObjectCell>,
}

impl BasicHost {
    pub fn new() -> Self {
        BasicHost {
            globals: ObjectCell::plain(),
        }
    }

    fn context_property(ctx: &Context, name: &str) -> Value {
        match name {
            "parameterStack" => Value::Array(ctx.parameter_stack.clone()),
            "controlStack" => Value::Array(ctx.control_stack.clone()),
            "me" => ctx.me.clone(),
            "halted" => Value::Bool(ctx.halted),
            "paused" => Value::Bool(ctx.paused),
            _ => Value::Undefined,
        }
    }
}

impl Default for BasicHost {
    fn default() -> Self {
        Self::new()
    }
}

impl HostBridge for BasicHost {
    fn property_get(
        &self,
        ctx: &mut Context,
        target: &Value,
        name: &str,
    ) -> Result<Value, EngineError> {
        match target {
            Value::Object(o) if o.tag == ObjectTag::Context && ctx.is_self_object(o) => {
                Ok(Self::context_property(ctx, name))
            }
            Value::Object(o) => Ok(o.props.borrow().get(name).cloned().unwrap_or(Value::Undefined)),
            Value::Array(items) => {
                if name == "length" {
                    return Ok(Value::Number(items.borrow().len() as f64));
                }
                match name.parse::<usize>() {
                    Ok(i) => Ok(items.borrow().get(i).cloned().unwrap_or(Value::Undefined)),
                    Err(_) => Ok(Value::Undefined),
                }
            }
            Value::Str(s) => {
                if name == "length" {
                    Ok(Value::Number(s.chars().count() as f64))
                } else {
                    Ok(Value::Undefined)
                }
            }
            Value::Null | Value::Undefined => Err(EngineError::Host(format!(
                "cannot read property {} of {}",
                name,
                target.type_name()
            ))),
            _ => Ok(Value::Undefined),
        }
    }

    fn property_set(
        &self,
        ctx: &mut Context,
        target: &Value,
        name: &str,
        value: Value,
    ) -> Result<(), EngineError> {
        match target {
            Value::Object(o) if o.tag == ObjectTag::Context && ctx.is_self_object(o) => {
                match name {
                    "me" => ctx.me = value,
                    "halted" => {
                        if value.is_truthy() {
                            ctx.set_halted();
                        } else {
                            ctx.halted = false;
                        }
                    }
                    "paused" => ctx.paused = value.is_truthy(),
                    _ => {
                        return Err(EngineError::Host(format!(
                            "context has no writable property {}",
                            name
                        )))
                    }
                }
                Ok(())
            }
            Value::Object(o) => {
                o.props.borrow_mut().insert(name.to_string(), value);
                Ok(())
            }
            Value::Array(items) => match name.parse::<usize>() {
                Ok(i) => {
                    let mut items = items.borrow_mut();
                    if i >= items.len() {
                        items.resize(i + 1, Value::Undefined);
                    }
                    items[i] = value;
                    Ok(())
                }
                Err(_) => Err(EngineError::Host(format!(
                    "cannot set property {} on an array",
                    name
                ))),
            },
            _ => Err(EngineError::Host(format!(
                "cannot set property {} on {}",
                name,
                target.type_name()
            ))),
        }
    }

    fn apply(&self, func: &Value, args: &[Value]) -> Result<Value, EngineError> {
        match func {
            Value::Function(f) => (f.call)(args),
            _ => Err(EngineError::Host(format!(
                "{} is not callable",
                func.type_name()
            ))),
        }
    }

    fn method_apply(
        &self,
        ctx: &mut Context,
        target: &Value,
        name: &str,
        args: &[Value],
    ) -> Result<Value, EngineError> {
        let member = self.property_get(ctx, target, name)?;
        match member {
            Value::Function(f) => (f.call)(args),
            _ => Err(EngineError::Host(format!(
                "property {} of {} is not callable",
                name,
                target.type_name()
            ))),
        }
    }

    fn new_object(&self) -> Value {
        Value::Object(ObjectCell::plain())
    }

    fn global_object(&self) -> Value {
        Value::Object(self.globals.clone())
    }
}
