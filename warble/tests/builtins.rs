//! Command-by-command coverage of the built-in set.

use warble::{test_counters, Interp};

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
fn set_and_incr() {
    let mut interp = Interp::new();
    assert_eq!(eval(&mut interp, "set a 5"), "5");
    assert_eq!(eval(&mut interp, "set a"), "5");
    assert_eq!(eval(&mut interp, "incr a"), "6");
    assert_eq!(eval(&mut interp, "incr a 10"), "16");
    assert_eq!(eval(&mut interp, "incr a -1"), "15");
    // An absent variable starts at zero.
    assert_eq!(eval(&mut interp, "incr fresh"), "1");
    assert_eq!(eval(&mut interp, "incr half 1.5"), "2.5");
    assert!(eval_err(&mut interp, "set nope").contains("does not exist"));
}

#[test]
fn append_and_lappend() {
    let mut interp = Interp::new();
    assert_eq!(eval(&mut interp, "append s foo bar"), "foobar");
    assert_eq!(eval(&mut interp, "append s !"), "foobar!");
    assert_eq!(eval(&mut interp, "append s"), "foobar!");

    assert_eq!(eval(&mut interp, "lappend l a"), "a");
    assert_eq!(eval(&mut interp, "lappend l {b c} d"), "a {b c} d");
    assert_eq!(eval(&mut interp, "llength $l"), "3");
}

#[test]
fn list_commands() {
    let mut interp = Interp::new();
    assert_eq!(eval(&mut interp, "list a b c"), "a b c");
    assert_eq!(eval(&mut interp, "list"), "");
    assert_eq!(eval(&mut interp, "list {a b} {}"), "{a b} {}");
    assert_eq!(eval(&mut interp, "llength {a b c}"), "3");
    assert_eq!(eval(&mut interp, "llength {}"), "0");
    assert_eq!(eval(&mut interp, "lreverse {1 2 3}"), "3 2 1");
    assert_eq!(eval(&mut interp, "concat {a b} {c} {} {d}"), "a b c d");
    assert!(eval_err(&mut interp, "lindex {a b} 5").contains("bad index"));
    assert_eq!(eval(&mut interp, "lrange {a b c} 2 0"), "");
}

#[test]
fn lsort_modes() {
    let mut interp = Interp::new();
    assert_eq!(eval(&mut interp, "lsort {banana apple cherry}"), "apple banana cherry");
    assert_eq!(eval(&mut interp, "lsort {10 9 2}"), "10 2 9");
    assert_eq!(eval(&mut interp, "lsort -integer {10 9 2}"), "2 9 10");
    assert_eq!(eval(&mut interp, "lsort -real {2.5 1.5 10.25}"), "1.5 2.5 10.25");
    assert_eq!(eval(&mut interp, "lsort -decreasing {a c b}"), "c b a");
    assert_eq!(
        eval(&mut interp, "lsort -integer -index 1 {{x 20} {y 3} {z 10}}"),
        "{y 3} {z 10} {x 20}"
    );
    assert_eq!(eval(&mut interp, "lsort {solo}"), "solo");
    assert!(eval_err(&mut interp, "lsort -bogus {a b}").contains("bad option"));
}

#[test]
fn split_and_join() {
    let mut interp = Interp::new();
    assert_eq!(eval(&mut interp, "split {a,b,,c} ,"), "a b {} c");
    assert_eq!(eval(&mut interp, "split {a b\tc}"), "a b c");
    assert_eq!(eval(&mut interp, "split {}"), "");
    assert_eq!(eval(&mut interp, "llength [split {}]"), "0");
    assert_eq!(eval(&mut interp, "join {a b c} -"), "a-b-c");
    assert_eq!(eval(&mut interp, "join {a b c}"), "a b c");
}

#[test]
fn string_ensemble() {
    let mut interp = Interp::new();
    assert_eq!(eval(&mut interp, "string length hello"), "5");
    assert_eq!(eval(&mut interp, "string length {}"), "0");
    assert_eq!(eval(&mut interp, "string range hello 1 3"), "ell");
    assert_eq!(eval(&mut interp, "string range hello 1 end"), "ello");
    assert_eq!(eval(&mut interp, "string slice hello 1 3"), "el");
    assert_eq!(eval(&mut interp, "string slice hello 1 end"), "ello");
    assert_eq!(eval(&mut interp, "string first ll hello"), "2");
    assert_eq!(eval(&mut interp, "string first zz hello"), "-1");
    assert_eq!(eval(&mut interp, "string index hello 1"), "e");
    assert_eq!(eval(&mut interp, "string index hello 99"), "");
    assert_eq!(eval(&mut interp, "string trim {  spaced\t}"), "spaced");
    // Subcommands dispatch on unique prefixes.
    assert_eq!(eval(&mut interp, "string len hello"), "5");
    assert!(eval_err(&mut interp, "string bogus x").contains("unknown subcommand"));
}

#[test]
fn format_command() {
    let mut interp = Interp::new();
    assert_eq!(eval(&mut interp, "format {%d-%s} 7 seven"), "7-seven");
    assert_eq!(eval(&mut interp, "format {%05d} 42"), "00042");
    assert_eq!(eval(&mut interp, "format {%-4d|} 3"), "3   |");
    assert_eq!(eval(&mut interp, "format {%.2f} 3.14159"), "3.14");
    assert_eq!(eval(&mut interp, "format {%x %X %o} 255 255 8"), "ff FF 10");
    assert_eq!(eval(&mut interp, "format {%c} 65"), "A");
    assert_eq!(eval(&mut interp, "format {%e} 350"), "3.500000e+02");
    assert_eq!(eval(&mut interp, "format {100%%}"), "100%");
    assert!(eval_err(&mut interp, "format {%d}").contains("not enough arguments"));
    assert!(eval_err(&mut interp, "format {%d} 1 2").contains("too many arguments"));
}

#[test]
fn scan_command() {
    let mut interp = Interp::new();
    assert_eq!(eval(&mut interp, "scan {12 34} {%d %d} a b"), "2");
    assert_eq!(eval(&mut interp, "set a"), "12");
    assert_eq!(eval(&mut interp, "set b"), "34");
    assert_eq!(eval(&mut interp, "scan {3.5 pear} {%f %s} x y"), "2");
    assert_eq!(eval(&mut interp, "set x"), "3.5");
    assert_eq!(eval(&mut interp, "set y"), "pear");
    // Conversion stops at the first mismatch.
    assert_eq!(eval(&mut interp, "scan {12 pear} {%d %d} p q"), "1");
}

#[test]
fn expr_operators() {
    let mut interp = Interp::new();
    assert_eq!(eval(&mut interp, "expr {2 + 3 * 4}"), "14");
    assert_eq!(eval(&mut interp, "expr {(2 + 3) * 4}"), "20");
    assert_eq!(eval(&mut interp, "expr {7 / 2}"), "3");
    assert_eq!(eval(&mut interp, "expr {-7 / 2}"), "-3");
    assert_eq!(eval(&mut interp, "expr {7 % 3}"), "1");
    assert_eq!(eval(&mut interp, "expr {7.0 / 2}"), "3.5");
    assert_eq!(eval(&mut interp, "expr {1.1 + 2.2}"), "3.3");
    assert_eq!(eval(&mut interp, "expr {6 & 3}"), "2");
    assert_eq!(eval(&mut interp, "expr {6 | 3}"), "7");
    assert_eq!(eval(&mut interp, "expr {6 ^ 3}"), "5");
    assert_eq!(eval(&mut interp, "expr {1 << 4}"), "16");
    assert_eq!(eval(&mut interp, "expr {16 >> 2}"), "4");
    assert_eq!(eval(&mut interp, "expr {~0}"), "-1");
    assert_eq!(eval(&mut interp, "expr {!1}"), "0");
    assert_eq!(eval(&mut interp, "expr {-3 + 5}"), "2");
    assert_eq!(eval(&mut interp, "expr {1 < 2}"), "1");
    assert_eq!(eval(&mut interp, "expr {2 <= 1}"), "0");
    assert_eq!(eval(&mut interp, "expr {1 == 1.0}"), "1");
    assert_eq!(eval(&mut interp, "expr {1 != 2}"), "1");
    assert_eq!(eval(&mut interp, "expr {{abc} lt {abd}}"), "1");
    assert_eq!(eval(&mut interp, "expr {{abc} eq {abc}}"), "1");
    assert_eq!(eval(&mut interp, "expr {{abc} ne {abc}}"), "0");
    assert_eq!(eval(&mut interp, "expr {1 ? {yes} : {no}}"), "yes");
    assert_eq!(eval(&mut interp, "expr {0 ? {yes} : {no}}"), "no");
    assert_eq!(eval(&mut interp, "expr {1 && 0}"), "0");
    assert_eq!(eval(&mut interp, "expr {1 || 0}"), "1");
    assert!(eval_err(&mut interp, "expr {1 / 0}").contains("divide by zero"));
    // The right side of && only evaluates when needed.
    assert_eq!(eval(&mut interp, "expr {0 && [error never]}"), "0");
    // Multiple arguments join with spaces.
    assert_eq!(eval(&mut interp, "expr 1 + 2"), "3");
}

#[test]
fn eval_and_concat_forms() {
    let mut interp = Interp::new();
    assert_eq!(eval(&mut interp, "eval {set y 9}"), "9");
    assert_eq!(eval(&mut interp, "set y"), "9");
    assert_eq!(eval(&mut interp, "eval set z 4"), "4");
    assert_eq!(eval(&mut interp, "eval [list set w 8]"), "8");
    // eval of an empty list is a no-op.
    assert_eq!(eval(&mut interp, "eval [list]"), "");
}

#[test]
fn subst_flags() {
    let mut interp = Interp::new();
    eval(&mut interp, "set x 5");
    assert_eq!(eval(&mut interp, "subst {x is $x}"), "x is 5");
    assert_eq!(eval(&mut interp, "subst {n=[expr {1+1}]}"), "n=2");
    assert_eq!(eval(&mut interp, "subst {a\\tb}"), "a\tb");
    assert_eq!(eval(&mut interp, "subst -novariables {x is $x}"), "x is $x");
    assert_eq!(
        eval(&mut interp, "subst -nocommands {n=[expr {1+1}]}"),
        "n=[expr {1+1}]"
    );
    assert_eq!(eval(&mut interp, "subst -nobackslashes {a\\tb}"), "a\\tb");
    // Flags match on glob-style prefixes.
    assert_eq!(eval(&mut interp, "subst -nov {x is $x}"), "x is $x");
    assert!(eval_err(&mut interp, "subst -wrong {x}").contains("bad option"));
}

#[test]
fn info_ensemble() {
    let mut interp = Interp::new();
    eval(&mut interp, "set g 1");
    assert!(eval(&mut interp, "info globals").contains('g'));
    assert_eq!(eval(&mut interp, "info exists g"), "1");
    assert_eq!(eval(&mut interp, "info exists nothere"), "0");

    eval(&mut interp, "set arr(k) 5");
    assert_eq!(eval(&mut interp, "info exists arr(k)"), "1");
    assert_eq!(eval(&mut interp, "info exists arr(zzz)"), "0");

    eval(&mut interp, "proc p {} { set local 1; info locals }");
    assert_eq!(eval(&mut interp, "p"), "local");

    let commands = eval(&mut interp, "info commands");
    assert!(commands.contains("set"));
    assert!(commands.contains("foreach"));
    assert!(commands.contains('p'));
}

#[test]
fn usage_probe() {
    let mut interp = Interp::new();
    assert_eq!(
        eval(&mut interp, "usage set"),
        "*** Usage:  set varName ?newValue?"
    );
    assert_eq!(
        eval(&mut interp, "usage lindex"),
        "*** Usage:  lindex list index"
    );
    // Procs answer the probe with their formal signature.
    eval(&mut interp, "proc h {a {b 1} args} { return x }");
    assert_eq!(eval(&mut interp, "usage h"), "*** Usage:  h a ?b? ?arg ...?");
    assert!(eval_err(&mut interp, "usage no-such").contains("no usage found"));
}

#[test]
fn wrong_arity_reports_usage() {
    let mut interp = Interp::new();
    assert_eq!(
        eval_err(&mut interp, "llength"),
        "wrong # args: should be \"llength list\""
    );
    assert_eq!(
        eval_err(&mut interp, "string length"),
        "wrong # args: should be \"string length string\""
    );
}

#[test]
fn time_reports_microseconds() {
    let mut interp = Interp::new();
    let report = eval(&mut interp, "time {set t 1} 5");
    assert!(report.ends_with("microseconds per iteration"), "{}", report);
}

#[test]
fn must_and_mustfail_count() {
    let mut interp = Interp::new();
    let before = test_counters();

    eval(&mut interp, "must 4 [expr {2 + 2}]");
    eval(&mut interp, "mustfail {error boom}");
    let after = test_counters();
    assert!(after.succeeds >= before.succeeds + 2);

    assert!(eval_err(&mut interp, "must a b").starts_with("FAILED: must:"));
    assert!(eval_err(&mut interp, "mustfail {set ok 1}").contains("did not fail"));
    let failed = test_counters();
    assert!(failed.fails >= before.fails + 2);
}

#[test]
fn log_command() {
    let mut interp = Interp::new();
    assert_eq!(eval(&mut interp, "log 4 {all quiet}"), "");
    eval(&mut interp, "set who world");
    assert_eq!(eval(&mut interp, "log 8 {hello $who}"), "");
    // 'p' logs and raises.
    assert_eq!(eval_err(&mut interp, "log p {bad news}"), "log p: bad news");
    assert!(eval_err(&mut interp, "log zz {m}").contains("log level"));
}

#[test]
fn clock_ensemble() {
    let mut interp = Interp::new();
    let seconds: i64 = eval(&mut interp, "clock seconds").parse().expect("integer");
    assert!(seconds > 1_500_000_000);
    let millis: i64 = eval(&mut interp, "clock milliseconds").parse().expect("integer");
    assert!(millis / 1000 >= seconds - 1);
    let micros: i64 = eval(&mut interp, "clock microseconds").parse().expect("integer");
    assert!(micros / 1000 >= millis - 1000);

    assert_eq!(
        eval(&mut interp, "clock format 0 -gmt 1 -format {%Y-%m-%d}"),
        "1970-01-01"
    );
    assert_eq!(
        eval(&mut interp, "clock format 86400 -gmt 1 -format {%H:%M:%S}"),
        "00:00:00"
    );
    assert!(eval_err(&mut interp, "clock format 0 -bogus 1").contains("bad option"));
}

#[test]
fn binary_ensemble() {
    let mut interp = Interp::new();
    assert_eq!(eval(&mut interp, "binary explode abc"), "97 98 99");
    assert_eq!(eval(&mut interp, "binary implode {104 105}"), "hi");
    assert_eq!(eval(&mut interp, "binary split abcdef 2"), "ab cd ef");
    assert_eq!(eval(&mut interp, "binary split abcde 2"), "ab cd e");
    assert_eq!(eval(&mut interp, "binary join {ab cd} {ef}"), "abcdef");

    eval(&mut interp, "binary scan [binary format S 515] S v");
    assert_eq!(eval(&mut interp, "set v"), "515");
    eval(&mut interp, "binary scan [binary format cc 65 66] cc p q");
    assert_eq!(eval(&mut interp, "list $p $q"), "65 66");

    assert!(eval_err(&mut interp, "binary split abc 0").contains("positive"));
}

#[test]
fn binary_file_round_trip() {
    let mut interp = Interp::new();
    let path = std::env::temp_dir().join(format!("warble-binary-{}.dat", std::process::id()));
    let path = path.to_string_lossy().into_owned();

    let _ = interp.set_var("path", warble::Value::from(path.as_str()));
    eval(&mut interp, "binary writefile $path {some payload}");
    assert_eq!(eval(&mut interp, "binary readfile $path"), "some payload");
    assert_eq!(eval(&mut interp, "binary readfile $path 5"), "payload");
    assert_eq!(eval(&mut interp, "binary readfile $path 5 3"), "pay");
    assert!(eval_err(&mut interp, "binary readfile /no/such/file-zzz").contains("cannot read"));

    let _ = std::fs::remove_file(&path);
}

#[test]
fn echo_and_say() {
    let mut interp = Interp::new();
    assert_eq!(eval(&mut interp, "echo hello world"), "");
    // say returns its arguments, like list.
    assert_eq!(eval(&mut interp, "say a {b c}"), "a {b c}");
}

#[test]
fn go_detaches() {
    let mut interp = Interp::new();
    eval(&mut interp, "set shared 1");
    assert_eq!(eval(&mut interp, "go {set x $shared}"), "");
    // The parent's state is untouched by the detached evaluation.
    assert_eq!(eval(&mut interp, "set shared"), "1");
}
