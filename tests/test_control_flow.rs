// Structured control flow: the boot words over the branch primitives.

use bellows::engine::Engine;
use bellows::Value;

fn eval(source: &str) -> Vec<Value> {
    Engine::new().eval(source).expect("program should run")
}

fn numbers(source: &str) -> Vec<f64> {
    eval(source)
        .iter()
        .map(|v| v.as_number().expect("number on stack"))
        .collect()
}

// ----------------------------------------------------------------------------
// if / else / endif
// ----------------------------------------------------------------------------

#[test]
fn test_if_true_runs_body() {
    assert_eq!(numbers(": t true if 1 endif 2 ; t"), vec![1.0, 2.0]);
}

#[test]
fn test_if_false_skips_body() {
    assert_eq!(numbers(": f false if 1 endif 2 ; f"), vec![2.0]);
}

#[test]
fn test_else_branch() {
    assert_eq!(numbers(": e 0 if 1 else 2 endif ; e"), vec![2.0]);
    assert_eq!(numbers(": e 3 if 1 else 2 endif ; e"), vec![1.0]);
}

#[test]
fn test_if_is_falsy_not_just_zero() {
    assert_eq!(numbers(": e ' ' if 1 else 2 endif ; e"), vec![2.0]);
    assert_eq!(numbers(": e undefined if 1 else 2 endif ; e"), vec![2.0]);
}

#[test]
fn test_nested_if() {
    assert_eq!(
        numbers(": n true if false if 1 else 2 endif else 3 endif ; n"),
        vec![2.0]
    );
}

#[test]
fn test_if_at_top_level() {
    assert_eq!(numbers("true if 7 endif"), vec![7.0]);
}

// ----------------------------------------------------------------------------
// begin / until / again / repeat
// ----------------------------------------------------------------------------

#[test]
fn test_begin_until() {
    assert_eq!(numbers(": count begin 1 - dup 1 < until ; 5 count"), vec![0.0]);
}

#[test]
fn test_begin_again_with_exit() {
    assert_eq!(
        numbers(": cnt begin 1 + dup 5 < not if exit endif again ; 0 cnt"),
        vec![5.0]
    );
}

#[test]
fn test_if_begin_repeat() {
    // repeat closes both the open begin (branch back) and the guarding if
    assert_eq!(
        numbers(": up true if begin 1 + dup 5 < not if exit endif repeat ; 0 up"),
        vec![5.0]
    );
    assert_eq!(
        numbers(": skip false if begin 1 + repeat 9 ; 0 skip"),
        vec![0.0, 9.0]
    );
}

// ----------------------------------------------------------------------------
// raw branch primitives
// ----------------------------------------------------------------------------

#[test]
fn test_zero_branch_taken_on_zero() {
    assert_eq!(numbers(": z 0 0branch 2 7 8 ; z"), vec![8.0]);
}

#[test]
fn test_zero_branch_steps_over_on_nonzero() {
    assert_eq!(numbers(": nz 1 0branch 2 7 8 ; nz"), vec![7.0, 8.0]);
}

#[test]
fn test_falsy_branch_accepts_any_type() {
    assert_eq!(numbers(": fb ' ' falsyBranch 2 7 8 ; fb"), vec![8.0]);
    assert_eq!(numbers(": tb ' x' falsyBranch 2 7 8 ; tb"), vec![7.0, 8.0]);
}

#[test]
fn test_branch_lands_past_end_of_body() {
    // branching to exactly the body length behaves like running off the end
    assert_eq!(numbers(": b 1 branch 1 ; b 2"), vec![1.0, 2.0]);
}

// ----------------------------------------------------------------------------
// each / endeach
// ----------------------------------------------------------------------------

#[test]
fn test_each_sums() {
    assert_eq!(numbers("0 [ 3 5 7 ] each I + endeach"), vec![15.0]);
}

#[test]
fn test_each_over_empty_array_runs_zero_times() {
    assert_eq!(numbers("0 [ ] each I + endeach"), vec![0.0]);
}

#[test]
fn test_each_nests() {
    assert_eq!(
        numbers("0 [ 1 2 3 ] each [ 1 2 ] each 1 + endeach endeach"),
        vec![6.0]
    );
}

#[test]
fn test_each_iterates_a_clone() {
    // the body grows the original array every pass, yet the loop still
    // visits exactly the three elements it started with
    assert_eq!(
        numbers("var: a [ 1 2 3 ] a ! 0 a @ each a @ 99 push drop I + endeach a @ . length"),
        vec![6.0, 6.0]
    );
}

#[test]
fn test_each_inside_definition_reused() {
    assert_eq!(
        numbers(": sum 0 swap each I + endeach ; [ 1 2 ] sum [ 10 20 30 ] sum"),
        vec![3.0, 60.0]
    );
}
