// The host bridge: property access, apply, and the embedding contract
// event collaborators rely on.

use std::cell::RefCell;
use std::rc::Rc;

use bellows::cursor::Delimiter;
use bellows::dictionary::DictEntryRef;
use bellows::engine::{run, run_entry, Engine};
use bellows::Value;

fn eval(source: &str) -> Vec<Value> {
    Engine::new().eval(source).expect("program should run")
}

#[test]
fn test_object_property_roundtrip() {
    assert_eq!(
        eval("var: o {} o ! 5 o @ .! size o @ . size"),
        vec![Value::Number(5.0)]
    );
}

#[test]
fn test_missing_property_is_undefined() {
    assert_eq!(eval("{} . nothing"), vec![Value::Undefined]);
}

#[test]
fn test_array_length_property() {
    assert_eq!(eval("[ 1 2 3 ] . length"), vec![Value::Number(3.0)]);
}

#[test]
fn test_string_length_property() {
    assert_eq!(eval("' abc' . length"), vec![Value::Number(3.0)]);
}

#[test]
fn test_context_me_read() {
    let engine = Engine::new();
    let mut ctx = engine.new_ctx("C . me");
    ctx.me = Value::string("button");
    run(&mut ctx).expect("program should run");
    assert_eq!(ctx.stack_values(), vec![Value::string("button")]);
}

#[test]
fn test_context_me_write() {
    let engine = Engine::new();
    let mut ctx = engine.new_ctx("5 C .! me");
    run(&mut ctx).expect("program should run");
    assert_eq!(ctx.me, Value::Number(5.0));
}

#[test]
fn test_context_exposes_live_parameter_stack() {
    assert_eq!(
        eval("1 2 C . parameterStack . length"),
        vec![
            Value::Number(1.0),
            Value::Number(2.0),
            Value::Number(2.0)
        ]
    );
}

#[test]
fn test_globals_are_shared_across_contexts() {
    let engine = Engine::new();
    engine
        .eval("5 globalThis .! x")
        .expect("setter should run");
    assert_eq!(
        engine.eval("globalThis . x").expect("getter should run"),
        vec![Value::Number(5.0)]
    );
}

#[test]
fn test_word_to_func_makes_a_callable() {
    let stack = eval(": triple 3 * ; wordToFunc: triple");
    match &stack[0] {
        Value::Function(f) => {
            let result = (f.call)(&[Value::Number(5.0)]).expect("call should run");
            assert_eq!(result, Value::Number(15.0));
        }
        other => panic!("expected a function, got {:?}", other),
    }
}

#[test]
fn test_js_apply() {
    assert_eq!(
        eval(": double 2 * ; wordToFunc: double [ 21 ] jsApply"),
        vec![Value::Number(42.0)]
    );
}

#[test]
fn test_method_apply() {
    assert_eq!(
        eval(": double 2 * ; wordToFunc: double {} dup -rot .! dbl [ 5 ] .apply: dbl"),
        vec![Value::Number(10.0)]
    );
}

#[test]
fn test_event_collaborator_contract() {
    // An extension defines an immediate word that captures an anonymous
    // entry, redirects compilation into it until the matching ; and later
    // invokes the entry on a fresh context with a seeded return stack.
    let engine = Engine::new();
    let captured: Rc<RefCell<Option<DictEntryRef>>> = Rc::new(RefCell::new(None));

    let slot = captured.clone();
    engine.define(Some("on:"), true, move |ctx| {
        let _event = ctx.input.consume(Delimiter::Whitespace, false, true);
        let anon = ctx.dict.borrow_mut().define_anonymous();
        *slot.borrow_mut() = Some(anon.clone());
        ctx.compilation_stack.push(anon);
        Ok(())
    });

    // nothing observable runs at load time
    let stack = engine
        .eval("on: click 1 + C . me + ;")
        .expect("handler definition should run");
    assert!(stack.is_empty());

    let entry = captured.borrow().clone().expect("handler should be captured");
    let result = run_entry(
        engine.dictionary(),
        engine.host(),
        entry,
        &[Value::Number(40.0)],
        Value::string("!"),
    )
    .expect("handler should run");
    assert_eq!(result, Value::string("41!"));
}

#[test]
fn test_core_words_survive_shadowing() {
    // a user redefinition of clone must not break each's machinery
    assert_eq!(
        eval(": clone 999 ; 0 [ 1 2 ] each I + endeach"),
        vec![Value::Number(3.0)]
    );
}

#[test]
fn test_find_dictionary_entry() {
    let engine = Engine::new();
    engine.eval(": mine 1 ;").expect("definition should run");
    assert!(engine.find_dictionary_entry("mine").is_some());
    assert!(engine.find_dictionary_entry("dup").is_some());
    assert!(engine.find_dictionary_entry("absent").is_none());
    assert!(engine.core_word_impl("dup").is_some());
}
