use bellows::cursor::{Cursor, Delimiter};

#[test]
fn test_consume_whitespace_delimited() {
    let mut cursor = Cursor::new("hello world");
    let word = cursor.consume(Delimiter::Whitespace, false, true);
    assert_eq!(word, "hello");
    let word = cursor.consume(Delimiter::Whitespace, false, true);
    assert_eq!(word, "world");
    assert!(cursor.at_end());
}

#[test]
fn test_consume_skips_leading_whitespace() {
    let mut cursor = Cursor::new("   spaced");
    let word = cursor.consume(Delimiter::Whitespace, false, true);
    assert_eq!(word, "spaced");
}

#[test]
fn test_consume_without_skipping_stops_immediately() {
    let mut cursor = Cursor::new(" x");
    let word = cursor.consume(Delimiter::Whitespace, false, false);
    assert_eq!(word, "");
}

#[test]
fn test_consume_including_steps_over_delimiter() {
    let mut cursor = Cursor::new("abc)def");
    let text = cursor.consume(Delimiter::Char(')'), true, false);
    assert_eq!(text, "abc");
    let rest = cursor.consume(Delimiter::Whitespace, false, false);
    assert_eq!(rest, "def");
}

#[test]
fn test_consume_excluding_leaves_pointer_on_delimiter() {
    let mut cursor = Cursor::new("abc)def");
    cursor.consume(Delimiter::Char(')'), false, false);
    let rest = cursor.consume(Delimiter::Whitespace, false, false);
    assert_eq!(rest, ")def");
}

#[test]
fn test_consume_runs_to_end_when_delimiter_missing() {
    let mut cursor = Cursor::new("no-quote-here");
    let text = cursor.consume(Delimiter::Char('\''), true, false);
    assert_eq!(text, "no-quote-here");
    assert!(cursor.at_end());
}

#[test]
fn test_escape_stripping() {
    let mut cursor = Cursor::new("a\\bc d");
    let word = cursor.consume(Delimiter::Whitespace, false, true);
    assert_eq!(word, "abc");
}

#[test]
fn test_double_backslash_passes_through() {
    let mut cursor = Cursor::new("e\\\\d+/");
    let text = cursor.consume(Delimiter::Char('/'), true, false);
    assert_eq!(text, "e\\d+");
}

#[test]
fn test_advance_clamps_at_end() {
    let mut cursor = Cursor::new("ab");
    cursor.advance(10);
    assert!(cursor.at_end());
    let word = cursor.consume(Delimiter::Whitespace, false, true);
    assert_eq!(word, "");
}

#[test]
fn test_marked_inserts_pointer_tag() {
    let mut cursor = Cursor::new("one two");
    cursor.consume(Delimiter::Whitespace, false, true);
    assert_eq!(cursor.marked(), "one<--!--> two");
}

#[test]
fn test_marked_at_end() {
    let mut cursor = Cursor::new("ab");
    cursor.advance(2);
    assert_eq!(cursor.marked(), "ab<--!-->");
}
