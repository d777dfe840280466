//! Environment round-trip through the exported operations.
//!
//! `unsetEnv` clears the whole process environment, so the full sequence
//! runs inside a single test in its own binary, away from the other suites.

use sandjs_plugin::{FAILURE, MemoryHost, SUCCESS};
use sandjs_runtime::Lifecycle;

#[test]
fn test_set_env_round_trip() {
    let mut lifecycle = Lifecycle::new();
    let mut host = MemoryHost::new();

    assert_eq!(sandjs_plugin::warmup(&mut host, &mut lifecycle), SUCCESS);

    // Environment operations need a live instance.
    let mut cold = Lifecycle::new();
    host.next_call(r#"{"A":"1"}"#);
    assert_eq!(sandjs_plugin::set_env(&mut host, &mut cold), FAILURE);
    assert_eq!(sandjs_plugin::unset_env(&mut host, &mut cold), FAILURE);

    // Non-object input is rejected before touching anything.
    host.next_call(r#"["A", "1"]"#);
    assert_eq!(sandjs_plugin::set_env(&mut host, &mut lifecycle), FAILURE);
    let error = host.error.clone().expect("error buffer");
    assert!(error.contains("JSON object"), "got: {error}");

    host.next_call(r#"{"A":"1","B":"2"}"#);
    assert_eq!(sandjs_plugin::set_env(&mut host, &mut lifecycle), SUCCESS);
    assert_eq!(std::env::var("A").as_deref(), Ok("1"));
    assert_eq!(std::env::var("B").as_deref(), Ok("2"));

    // Both the env sub-object and the std module's view see the change.
    host.next_call(
        r#"
        import * as std from "qjs:std";
        if (process.env.A !== "1") throw new Error("process.env miss");
        if (std.getenviron()["B"] !== "2") throw new Error("getenviron miss");
        "#,
    );
    assert_eq!(sandjs_plugin::eval(&mut host, &mut lifecycle), SUCCESS);

    // A second setEnv replaces the mapping wholesale.
    host.next_call(r#"{"C":"3"}"#);
    assert_eq!(sandjs_plugin::set_env(&mut host, &mut lifecycle), SUCCESS);
    host.next_call("if ('A' in process.env) throw new Error('stale key');");
    assert_eq!(sandjs_plugin::eval(&mut host, &mut lifecycle), SUCCESS);

    host.next_call("");
    assert_eq!(sandjs_plugin::unset_env(&mut host, &mut lifecycle), SUCCESS);
    assert!(std::env::var("A").is_err());
    assert!(std::env::var("B").is_err());
    assert!(std::env::var("C").is_err());

    host.next_call(
        r#"
        import * as std from "qjs:std";
        if (Object.keys(process.env).length !== 0) throw new Error("env object not empty");
        if (Object.keys(std.getenviron()).length !== 0) throw new Error("environ not empty");
        "#,
    );
    assert_eq!(sandjs_plugin::eval(&mut host, &mut lifecycle), SUCCESS);
}
