//! Default bindings injected into a freshly created execution context.
//!
//! Applied exactly once per engine instance, never per-eval. Scripts may
//! rely on every name registered here: `gc`, `print`, `console`, `process`
//! (with its `env` sub-object), `navigator`, `scriptArgs` and `argv0`.

use rquickjs::{Context, Ctx, Function, Object, Runtime};
use rquickjs::convert::Coerced;
use rquickjs::function::Rest;

use crate::version::ENGINE_VERSION;

/// Install the default global bindings into the context.
pub(crate) fn install(runtime: &Runtime, context: &Context) -> rquickjs::Result<()> {
    context.with(|ctx| -> rquickjs::Result<()> {
        let globals = ctx.globals();

        let gc_runtime = runtime.clone();
        let registrations: [(&str, Function); 2] = [
            ("gc", Function::new(ctx.clone(), move || gc_runtime.run_gc())?),
            ("print", Function::new(ctx.clone(), print)?),
        ];
        for (name, function) in registrations {
            globals.set(name, function)?;
        }

        install_console(&ctx)?;
        install_process(&ctx)?;

        // navigator is read-only for scripts; defining it from JS keeps the
        // freeze/defineProperty handling in one place.
        ctx.eval::<(), _>(format!(
            r#"
            Object.defineProperty(globalThis, "navigator", {{
                value: Object.freeze({{
                    userAgent: "{ENGINE_VERSION}",
                    [Symbol.toStringTag]: "Navigator",
                }}),
                writable: false,
                configurable: true,
                enumerable: true,
            }});
            globalThis.scriptArgs = [];
            "#,
        ))?;

        Ok(())
    })
}

fn print(args: Rest<Coerced<String>>) {
    let line = args
        .0
        .iter()
        .map(|part| part.0.as_str())
        .collect::<Vec<_>>()
        .join(" ");
    println!("{line}");
}

/// `console.log` mirrors `print`; the leveled variants route through tracing
/// so host operators see script diagnostics alongside plugin logs.
fn install_console(ctx: &Ctx<'_>) -> rquickjs::Result<()> {
    let console = Object::new(ctx.clone())?;

    console.set("log", Function::new(ctx.clone(), print)?)?;

    console.set(
        "info",
        Function::new(ctx.clone(), |args: Rest<Coerced<String>>| {
            tracing::info!(target: "sandjs.js", "{}", join(&args));
        })?,
    )?;
    console.set(
        "warn",
        Function::new(ctx.clone(), |args: Rest<Coerced<String>>| {
            tracing::warn!(target: "sandjs.js", "{}", join(&args));
        })?,
    )?;
    console.set(
        "error",
        Function::new(ctx.clone(), |args: Rest<Coerced<String>>| {
            tracing::error!(target: "sandjs.js", "{}", join(&args));
        })?,
    )?;
    console.set(
        "debug",
        Function::new(ctx.clone(), |args: Rest<Coerced<String>>| {
            tracing::debug!(target: "sandjs.js", "{}", join(&args));
        })?,
    )?;

    ctx.globals().set("console", console)?;
    Ok(())
}

/// `process.env` starts from the current process environment so that a
/// re-initialized instance still observes variables mirrored by `setEnv`.
fn install_process(ctx: &Ctx<'_>) -> rquickjs::Result<()> {
    let process = Object::new(ctx.clone())?;
    let env = Object::new(ctx.clone())?;
    for (key, value) in std::env::vars() {
        env.set(key.as_str(), value.as_str())?;
    }
    process.set("env", env)?;
    ctx.globals().set("process", process)?;
    Ok(())
}

fn join(args: &Rest<Coerced<String>>) -> String {
    args.0
        .iter()
        .map(|part| part.0.as_str())
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use crate::engine::Engine;

    #[test]
    fn test_gc_is_callable() {
        let engine = Engine::new().unwrap();
        engine.with(|ctx| {
            let _: () = ctx.eval("gc()").unwrap();
        });
    }

    #[test]
    fn test_navigator_is_frozen_with_version_tag() {
        let engine = Engine::new().unwrap();
        engine.with(|ctx| {
            let agent: String = ctx.eval("navigator.userAgent").unwrap();
            assert_eq!(agent, crate::version::ENGINE_VERSION);

            let tag: String = ctx.eval("Object.prototype.toString.call(navigator)").unwrap();
            assert_eq!(tag, "[object Navigator]");

            let frozen: bool = ctx.eval("Object.isFrozen(navigator)").unwrap();
            assert!(frozen);
        });
    }

    #[test]
    fn test_process_env_starts_as_object() {
        let engine = Engine::new().unwrap();
        engine.with(|ctx| {
            let is_object: bool = ctx
                .eval("typeof process === 'object' && typeof process.env === 'object'")
                .unwrap();
            assert!(is_object);
        });
    }

    #[test]
    fn test_print_coerces_non_string_arguments() {
        let engine = Engine::new().unwrap();
        engine.with(|ctx| {
            let _: () = ctx.eval("print('x =', 42, true)").unwrap();
            let _: () = ctx.eval("console.log('hello', 1)").unwrap();
        });
    }
}
