//! Whole-script tests of the language semantics: substitution, control
//! flow, procedures, macros, and the non-local jumps.

use warble::{Interp, Value};

fn eval(interp: &mut Interp, script: &str) -> String {
    match interp.eval(script) {
        Ok(value) => value.as_str().into_owned(),
        Err(e) => panic!("script {:?} failed: {}", script, e.value()),
    }
}

fn eval_err(interp: &mut Interp, script: &str) -> String {
    match interp.eval(script) {
        Ok(value) => panic!("script {:?} unexpectedly returned {}", script, value),
        Err(e) => e.value().as_str().into_owned(),
    }
}

#[test]
fn expr_with_variable() {
    let mut interp = Interp::new();
    eval(&mut interp, "set x 3");
    assert_eq!(eval(&mut interp, "expr {$x+4}"), "7");
    assert_eq!(eval(&mut interp, "set x 3; expr {$x+4}"), "7");
}

#[test]
fn proc_with_return() {
    let mut interp = Interp::new();
    eval(&mut interp, "proc f {a b} { return [expr {$a*$b}] }");
    assert_eq!(eval(&mut interp, "f 6 7"), "42");
}

#[test]
fn list_indexing_with_end() {
    let mut interp = Interp::new();
    eval(&mut interp, "set L {1 2 3 4 5}");
    assert_eq!(eval(&mut interp, "lrange $L 1 end"), "2 3 4 5");
    assert_eq!(eval(&mut interp, "lindex $L end"), "5");
    assert_eq!(eval(&mut interp, "lindex $L 0"), "1");
}

#[test]
fn foreach_with_stride() {
    let mut interp = Interp::new();
    eval(
        &mut interp,
        "foreach {k v} {a 1 b 2 c 3} { lappend out $k=$v }",
    );
    assert_eq!(eval(&mut interp, "set out"), "a=1 b=2 c=3");
}

#[test]
fn catch_stores_message_and_status() {
    let mut interp = Interp::new();
    assert_eq!(eval(&mut interp, "catch {error oops} e"), "1");
    assert_eq!(eval(&mut interp, "list $e"), "oops");
    assert_eq!(eval(&mut interp, "catch {set ok 5} r"), "0");
    assert_eq!(eval(&mut interp, "set r"), "5");
}

#[test]
fn string_match_globs() {
    let mut interp = Interp::new();
    assert_eq!(eval(&mut interp, "string match a*c abc"), "1");
    assert_eq!(eval(&mut interp, "string match {a[bc]d} abd"), "1");
    assert_eq!(eval(&mut interp, "string match {a[bc]d} aXd"), "0");
}

#[test]
fn upvar_aliases_caller_variable() {
    let mut interp = Interp::new();
    eval(&mut interp, "proc inc {v} { upvar 1 $v x; incr x }");
    eval(&mut interp, "set n 10");
    eval(&mut interp, "inc n");
    assert_eq!(eval(&mut interp, "set n"), "11");
}

#[test]
fn hash_commands() {
    let mut interp = Interp::new();
    eval(&mut interp, "set h [hash a 1 b 2]");
    assert_eq!(eval(&mut interp, "hget $h a"), "1");
    assert_eq!(eval(&mut interp, "hkeys $h"), "a b");
    eval(&mut interp, "hset $h c 3");
    assert_eq!(eval(&mut interp, "hkeys $h"), "a b c");
    eval(&mut interp, "hdel $h b");
    assert_eq!(eval(&mut interp, "hkeys $h"), "a c");
    assert!(eval_err(&mut interp, "hget $h b").contains("does not contain key"));
}

#[test]
fn macro_expansion() {
    let mut interp = Interp::new();
    assert_eq!(
        eval(&mut interp, "macro double {x} { expr {$x + $x} }; double 21"),
        "42"
    );
    // Macros persist for later evaluations.
    assert_eq!(eval(&mut interp, "double 4"), "8");
    assert_eq!(eval(&mut interp, "info macros"), "double");
}

#[test]
fn macro_with_args_tail() {
    let mut interp = Interp::new();
    eval(&mut interp, "macro front {x ARGS} { list $x {*}$ARGS }");
    assert_eq!(eval(&mut interp, "front a b c"), "a b c");
    assert_eq!(eval(&mut interp, "front a"), "a");
    assert!(eval_err(&mut interp, "macro front {y} {list $y}").contains("already exists"));
}

#[test]
fn macro_and_command_namespaces_are_disjoint() {
    let mut interp = Interp::new();
    assert!(eval_err(&mut interp, "macro set {x} {list $x}").contains("already exists"));
    eval(&mut interp, "macro twice {x} { expr {2 * $x} }");
    assert!(eval_err(&mut interp, "proc twice {x} {return $x}").contains("already exists"));
}

#[test]
fn braces_preserve_contents() {
    let mut interp = Interp::new();
    assert_eq!(
        eval(&mut interp, "set s {a {b} \\n c}"),
        "a {b} \\n c"
    );
    // Backslash-newline inside braces collapses to a space.
    assert_eq!(eval(&mut interp, "set s {a\\\nb}"), "a b");
}

#[test]
fn quoted_words_substitute() {
    let mut interp = Interp::new();
    eval(&mut interp, "set name world");
    assert_eq!(eval(&mut interp, "set s \"hello $name\""), "hello world");
    assert_eq!(
        eval(&mut interp, "set s \"1+1 is [expr {1+1}]\""),
        "1+1 is 2"
    );
    assert_eq!(eval(&mut interp, "set s \"tab\\there\""), "tab\there");
}

#[test]
fn expansion_commutes_with_literal_splicing() {
    let mut interp = Interp::new();
    eval(&mut interp, "proc id {args} { return $args }");
    let spliced = eval(&mut interp, "id {*}[list a b c]");
    let literal = eval(&mut interp, "id a b c");
    assert_eq!(spliced, literal);

    eval(&mut interp, "set v {x y}");
    assert_eq!(eval(&mut interp, "id {*}$v z"), "x y z");
}

#[test]
fn command_substitution_nests() {
    let mut interp = Interp::new();
    assert_eq!(
        eval(&mut interp, "expr {[expr {1 + 2}] * [expr {3 + 4}]}"),
        "21"
    );
    assert_eq!(eval(&mut interp, "set x a[list b c]d"), "ab cd");
}

#[test]
fn comments_only_at_command_start() {
    let mut interp = Interp::new();
    assert_eq!(
        eval(&mut interp, "# a comment\nset a 1\n# another\nset a"),
        "1"
    );
    assert_eq!(eval(&mut interp, "set b #notacomment"), "#notacomment");
}

#[test]
fn while_loop_with_break_and_continue() {
    let mut interp = Interp::new();
    let script = "
        set i 0
        set sum 0
        while {$i < 10} {
            incr i
            if {$i == 3} { continue }
            if {$i > 5} { break }
            set sum [expr {$sum + $i}]
        }
        set sum
    ";
    assert_eq!(eval(&mut interp, script), "12");
}

#[test]
fn for_loop() {
    let mut interp = Interp::new();
    let script = "
        set out {}
        for {set i 0} {$i < 4} {incr i} { lappend out $i }
        set out
    ";
    assert_eq!(eval(&mut interp, script), "0 1 2 3");
}

#[test]
fn case_dispatches_on_glob_patterns() {
    let mut interp = Interp::new();
    let script = "proc kind {x} {
        case $x in {a*} {return letter-a} {[0-9]*} {return digit} default {return other}
    }";
    eval(&mut interp, script);
    assert_eq!(eval(&mut interp, "kind apple"), "letter-a");
    assert_eq!(eval(&mut interp, "kind 5x"), "digit");
    assert_eq!(eval(&mut interp, "kind zebra"), "other");
}

#[test]
fn return_escapes_loops_inside_proc() {
    let mut interp = Interp::new();
    eval(
        &mut interp,
        "proc first {list} { foreach i $list { return $i } }",
    );
    assert_eq!(eval(&mut interp, "first {7 8 9}"), "7");
}

#[test]
fn break_outside_loop_is_an_error() {
    let mut interp = Interp::new();
    assert_eq!(
        eval_err(&mut interp, "break"),
        "invoked \"break\" outside of a loop"
    );
    eval(&mut interp, "proc bad {} { break }");
    let msg = eval_err(&mut interp, "bad");
    assert!(msg.starts_with("invoked \"break\" outside of a loop"));
    assert!(msg.contains("in proc \"bad\""));
}

#[test]
fn throw_carries_free_codes() {
    let mut interp = Interp::new();
    assert_eq!(eval(&mut interp, "catch {throw 17 boom} e"), "17");
    assert_eq!(eval(&mut interp, "set e"), "boom");
    // A thrown break code behaves like break.
    assert_eq!(
        eval(&mut interp, "set n 0; foreach i {1 2 3} { incr n; throw 3 x }; set n"),
        "1"
    );
}

#[test]
fn catch_is_total() {
    let mut interp = Interp::new();
    // Parse errors, name errors, type errors, and jumps all land in catch.
    for script in [
        "catch {[}",
        "catch {no-such-command}",
        "catch {expr {zzz}}",
        "catch {break}",
        "catch {return 1}",
        "catch {throw 99 x}",
    ] {
        let status = eval(&mut interp, script);
        let status: i64 = status.parse().expect("catch must return an integer");
        assert!(status != 0, "{} returned {}", script, status);
    }
}

#[test]
fn proc_argument_defaults_and_args() {
    let mut interp = Interp::new();
    eval(&mut interp, "proc g {a {b 5}} { expr {$a + $b} }");
    assert_eq!(eval(&mut interp, "g 1"), "6");
    assert_eq!(eval(&mut interp, "g 1 2"), "3");
    assert!(eval_err(&mut interp, "g").starts_with("wrong # args"));
    assert!(eval_err(&mut interp, "g 1 2 3").starts_with("wrong # args"));

    eval(&mut interp, "proc v {first args} { list $first [llength $args] }");
    assert_eq!(eval(&mut interp, "v a b c d"), "a 3");
    assert_eq!(eval(&mut interp, "v a"), "a 0");
}

#[test]
fn proc_may_not_shadow_builtin_or_proc() {
    let mut interp = Interp::new();
    assert!(eval_err(&mut interp, "proc set {} {}").contains("cannot redefine"));
    eval(&mut interp, "proc mine {} { return 1 }");
    assert!(eval_err(&mut interp, "proc mine {} { return 2 }").contains("already exists"));
}

#[test]
fn proc_errors_carry_a_stack_trace() {
    let mut interp = Interp::new();
    eval(
        &mut interp,
        "proc inner {x} { error boom }\nproc outer {} { inner 42 }",
    );
    let msg = eval_err(&mut interp, "outer");
    assert!(msg.starts_with("boom"));
    assert!(msg.contains("in proc \"inner\""));
    assert!(msg.contains("arg:0 = \"42\""));
    assert!(msg.contains("in proc \"outer\""));
}

#[test]
fn global_links_into_procs() {
    let mut interp = Interp::new();
    eval(&mut interp, "set counter 0");
    eval(&mut interp, "proc bump {} { global counter; incr counter }");
    eval(&mut interp, "bump; bump; bump");
    assert_eq!(eval(&mut interp, "set counter"), "3");
}

#[test]
fn uplevel_runs_in_the_chosen_frame() {
    let mut interp = Interp::new();
    eval(&mut interp, "proc setg {n v} { uplevel #0 set $n $v }");
    eval(&mut interp, "proc setc {n v} { uplevel 1 set $n $v }");

    eval(&mut interp, "setg gx 5");
    assert_eq!(eval(&mut interp, "set gx"), "5");

    // uplevel 1 from the global frame stays at the global frame.
    eval(&mut interp, "setc cy 6");
    assert_eq!(eval(&mut interp, "set cy"), "6");

    // From a nested proc, uplevel 1 writes into the caller's locals.
    eval(
        &mut interp,
        "proc outer {} { setc local 7; return $local }",
    );
    assert_eq!(eval(&mut interp, "outer"), "7");
    assert!(eval_err(&mut interp, "set local").contains("does not exist"));
}

#[test]
fn array_subscript_variables() {
    let mut interp = Interp::new();
    eval(&mut interp, "set a(x) 1");
    eval(&mut interp, "set a(y) 2");
    assert_eq!(eval(&mut interp, "set a(x)"), "1");
    assert_eq!(eval(&mut interp, "array names a"), "x y");
    assert_eq!(eval(&mut interp, "array size a"), "2");
    assert_eq!(eval(&mut interp, "array exists a"), "1");
    assert_eq!(eval(&mut interp, "array exists missing"), "0");
    eval(&mut interp, "set k y");
    assert_eq!(eval(&mut interp, "set v $a($k)"), "2");
    assert!(eval_err(&mut interp, "set a(zzz)").contains("no key"));
}

#[test]
fn hash_enumeration_is_lexicographic() {
    let mut interp = Interp::new();
    eval(&mut interp, "array set h {delta 4 alpha 1 charlie 3 bravo 2}");
    assert_eq!(eval(&mut interp, "array names h"), "alpha bravo charlie delta");
    assert_eq!(
        eval(&mut interp, "array get h"),
        "alpha 1 bravo 2 charlie 3 delta 4"
    );
    assert_eq!(
        eval(&mut interp, "hkeys [hash z 1 a 2 m 3]"),
        "a m z"
    );
}

#[test]
fn string_canonicity_round_trips() {
    let mut interp = Interp::new();
    // A value's string form parses back to an equal value.
    for script in ["expr {2 + 2}", "list a {b c} {}", "hash b 2 a 1"] {
        let first = eval(&mut interp, script);
        let _ = interp.set_var("tmp", Value::from(first.as_str()));
        let second = eval(&mut interp, "set tmp");
        assert_eq!(first, second);
    }

    // List round trip through element quoting: force the list into its
    // string form, then split it back.
    for s in ["plain", "two words", "", "brace{y", "line\nfeed"] {
        let _ = interp.set_var("v", Value::from(s));
        let joined = eval(&mut interp, "set joined [list $v x]");
        let _ = interp.set_var("js", Value::from(joined));
        assert_eq!(eval(&mut interp, "llength $js"), "2");
        assert_eq!(eval(&mut interp, "lindex $js 0"), s);
    }
}

#[test]
fn nested_evaluation_is_bounded() {
    let mut interp = Interp::new();
    interp.set_recursion_limit(50);
    eval(&mut interp, "proc loop {} { loop }");
    assert!(eval_err(&mut interp, "loop").starts_with("too many nested evaluations"));
}

#[test]
fn semicolons_and_newlines_terminate_commands() {
    let mut interp = Interp::new();
    assert_eq!(eval(&mut interp, "set a 1; set b 2; expr {$a + $b}"), "3");
    assert_eq!(eval(&mut interp, "set a 5\nset b 6\nexpr {$a + $b}"), "11");
    // A backslash-newline continues the command.
    assert_eq!(eval(&mut interp, "expr {1 + \\\n2}"), "3");
}
