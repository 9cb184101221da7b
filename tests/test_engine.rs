// End-to-end programs through the full compile-and-execute pipeline.

use bellows::engine::{run, Engine};
use bellows::Value;

fn eval(source: &str) -> Vec<Value> {
    Engine::new().eval(source).expect("program should run")
}

#[test]
fn test_addition() {
    assert_eq!(eval("3 5 +"), vec![Value::Number(8.0)]);
}

#[test]
fn test_minus_rot() {
    assert_eq!(
        eval("111 222 333 -rot"),
        vec![
            Value::Number(333.0),
            Value::Number(111.0),
            Value::Number(222.0)
        ]
    );
}

#[test]
fn test_nested_definitions() {
    assert_eq!(
        eval(": inner 3 ; : outer 4 inner ; outer"),
        vec![Value::Number(4.0), Value::Number(3.0)]
    );
}

#[test]
fn test_conditional_takes_true_branch() {
    assert_eq!(
        eval(": iffy true if true else 'X' endif ; iffy"),
        vec![Value::Bool(true)]
    );
}

#[test]
fn test_countdown_loop() {
    assert_eq!(
        eval(": count begin 1 - dup 1 < until ; 5 count 0 ==="),
        vec![Value::Bool(true)]
    );
}

#[test]
fn test_each_sums_array() {
    assert_eq!(
        eval("0 [ 3 5 7 ] : addall each I + endeach ; addall"),
        vec![Value::Number(15.0)]
    );
}

#[test]
fn test_variable_store_and_fetch() {
    assert_eq!(eval("var: v 5 v ! v @"), vec![Value::Number(5.0)]);
}

#[test]
fn test_regex_match() {
    assert_eq!(
        eval(r"re/ e\\d+/ ' te123st' match first ' e123' ==="),
        vec![Value::Bool(true)]
    );
}

#[test]
fn test_literals_land_in_order() {
    assert_eq!(
        eval("1 2.5 -3 true false undefined"),
        vec![
            Value::Number(1.0),
            Value::Number(2.5),
            Value::Number(-3.0),
            Value::Bool(true),
            Value::Bool(false),
            Value::Undefined,
        ]
    );
}

#[test]
fn test_definition_is_equivalent_to_inline_words() {
    assert_eq!(eval(": w 2 3 * 1 + ; w"), eval("2 3 * 1 +"));
}

#[test]
fn test_immediate_word_runs_during_compilation() {
    // five appends a literal into six's body while six is being compiled
    assert_eq!(
        eval(": five immediate 5 , ; : six five ; six"),
        vec![Value::Number(5.0)]
    );
}

#[test]
fn test_postpone_non_immediate_defers_compilation() {
    assert_eq!(
        eval(": compiles-dup immediate postpone dup ; : user 5 compiles-dup ; user"),
        vec![Value::Number(5.0), Value::Number(5.0)]
    );
}

#[test]
fn test_postpone_immediate_defers_execution() {
    assert_eq!(
        eval(": im immediate 42 , ; : defer immediate postpone im ; : w defer ; w"),
        vec![Value::Number(42.0)]
    );
}

#[test]
fn test_halts_and_resolves_completion() {
    let engine = Engine::new();
    let mut ctx = engine.new_ctx("1 2 +");
    let signal = ctx.halt_signal();
    assert!(!signal.is_resolved());
    run(&mut ctx).expect("program should run");
    assert!(ctx.halted);
    assert!(signal.is_resolved());
}

#[test]
fn test_quit_unwinds_to_one_frame() {
    let engine = Engine::new();
    let mut ctx = engine.new_ctx("1 2 : boom quit ; boom 3");
    run(&mut ctx).expect("program should run");
    assert_eq!(
        ctx.stack_values(),
        vec![Value::Number(1.0), Value::Number(2.0)]
    );
    assert_eq!(ctx.return_stack.len(), 1);
}

#[test]
fn test_sleep_waits_at_least_the_requested_time() {
    let stack = eval("now 60 sleep now");
    let t0 = stack[0].as_number().expect("start time");
    let t1 = stack[1].as_number().expect("end time");
    assert!(t1 - t0 >= 55.0, "only {}ms elapsed", t1 - t0);
}

#[test]
fn test_context_can_be_refilled_after_halt() {
    let engine = Engine::new();
    let mut ctx = engine.new_ctx("1 2");
    run(&mut ctx).expect("first program should run");
    assert_eq!(ctx.stack_values().len(), 2);

    ctx.refill("+");
    run(&mut ctx).expect("second program should run");
    assert_eq!(ctx.stack_values(), vec![Value::Number(3.0)]);
}

#[test]
fn test_string_escapes_are_stripped() {
    assert_eq!(eval(r"' a\bc'"), vec![Value::string("abc")]);
}

#[test]
fn test_single_token_quoted_string() {
    assert_eq!(eval("'X'"), vec![Value::string("X")]);
}

#[test]
fn test_definitions_are_shared_between_contexts() {
    let engine = Engine::new();
    engine.eval(": shared 17 ;").expect("definition should run");
    assert_eq!(
        engine.eval("shared").expect("word should be visible"),
        vec![Value::Number(17.0)]
    );
}

#[test]
fn test_user_definitions_shadow_earlier_ones() {
    assert_eq!(
        eval(": f 1 ; : f 2 ; f"),
        vec![Value::Number(2.0)]
    );
}
