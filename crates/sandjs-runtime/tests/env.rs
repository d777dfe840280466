//! Environment mirroring through the pipeline.
//!
//! `set_env`/`unset_env` mutate the process environment while other code may
//! be iterating it, so the whole sequence runs inside a single test in its
//! own binary, isolated from the parallel unit-test threads.

use sandjs_runtime::{Engine, pipeline};

fn probe_string(engine: &Engine, expr: &str) -> String {
    engine.with(|ctx| ctx.eval::<String, _>(expr).unwrap())
}

#[test]
fn test_env_replacement_and_mirroring() {
    let engine = Engine::new().unwrap();

    pipeline::set_env(&engine, r#"{"SANDJS_ENV_A": "1", "SANDJS_ENV_N": 7}"#).unwrap();
    assert_eq!(probe_string(&engine, "process.env.SANDJS_ENV_A"), "1");
    // Non-string values are mirrored through their JSON representation.
    assert_eq!(probe_string(&engine, "process.env.SANDJS_ENV_N"), "7");
    assert_eq!(std::env::var("SANDJS_ENV_A").as_deref(), Ok("1"));
    assert_eq!(std::env::var("SANDJS_ENV_N").as_deref(), Ok("7"));

    // The std module reads the same mirrored state.
    pipeline::eval(
        &engine,
        r#"
        import * as std from "qjs:std";
        if (std.getenv("SANDJS_ENV_A") !== "1") throw new Error("getenv miss");
        if (std.getenviron()["SANDJS_ENV_N"] !== "7") throw new Error("getenviron miss");
        "#,
        &sandjs_runtime::EvalOptions::default(),
    )
    .unwrap();

    // Wholesale replacement: keys absent from the new object are gone from
    // the sub-object (the process keeps previously mirrored variables).
    pipeline::set_env(&engine, r#"{"SANDJS_ENV_B": "2"}"#).unwrap();
    assert_eq!(
        probe_string(&engine, "String(process.env.SANDJS_ENV_A)"),
        "undefined"
    );
    assert_eq!(probe_string(&engine, "process.env.SANDJS_ENV_B"), "2");

    // A re-initialized instance seeds process.env from the mirrored state.
    let fresh = Engine::new().unwrap();
    assert_eq!(probe_string(&fresh, "process.env.SANDJS_ENV_B"), "2");

    pipeline::unset_env(&engine).unwrap();
    assert!(std::env::var("SANDJS_ENV_A").is_err());
    assert!(std::env::var("SANDJS_ENV_B").is_err());
    assert!(std::env::var("SANDJS_ENV_N").is_err());
    assert_eq!(
        probe_string(&engine, "String(Object.keys(process.env).length)"),
        "0"
    );
}
