//! The evaluation pipeline: configuration, dialect translation, module
//! detection, two-phase evaluation, and synchronous completion draining.
//!
//! Every engine exception is converted into an [`EngineError`] here; nothing
//! unwinds past this boundary.

use std::borrow::Cow;

use rquickjs::{CatchResultExt, Ctx, Module, Object};

use crate::config::{EvalFileOptions, EvalOptions};
use crate::engine::Engine;
use crate::error::{EngineError, describe_exception};

/// Evaluated ahead of plain scripts so that code written against global
/// `std`/`os`/`bjson` keeps working without explicit imports.
const GLOBAL_SHIM: &str = r#"
import * as std from "qjs:std";
import * as os from "qjs:os";
import * as bjson from "qjs:bjson";
globalThis.std = std;
globalThis.os = os;
globalThis.bjson = bjson;
"#;

// ─────────────────────────────────────────────────────────────────────────────
// Evaluation
// ─────────────────────────────────────────────────────────────────────────────

/// Run one script through the full pipeline against a live engine.
pub fn eval(engine: &Engine, source: &str, options: &EvalOptions) -> Result<(), EngineError> {
    if let Some(bytes) = options.memory_limit {
        engine.set_memory_limit(bytes);
    }
    if let Some(bytes) = options.stack_size {
        engine.set_max_stack_size(bytes);
    }
    if let Some(dir) = &options.dir {
        change_dir(dir)?;
    }

    let script = apply_dialect(engine, source, options.dialect.as_deref())?;
    let as_module = options.module.unwrap_or_else(|| detect_module(&script));
    tracing::debug!(as_module, "evaluating script");

    engine.with(|ctx| -> Result<(), EngineError> {
        if as_module {
            run_module(&ctx, "<eval>", &script)
        } else {
            run_module(&ctx, "<shim>", GLOBAL_SHIM)?;
            run_script(&ctx, &script)
        }
    })?;

    engine.drain_jobs()
}

/// Run a script file: apply the directory override, pick the dialect from
/// the option or the file extension, populate `argv0`/`scriptArgs`, then
/// evaluate through the same machinery as [`eval`].
pub fn eval_file(
    engine: &Engine,
    path: &str,
    options: &EvalFileOptions,
) -> Result<(), EngineError> {
    if let Some(dir) = &options.dir {
        change_dir(dir)?;
    }

    let source = std::fs::read_to_string(path)
        .map_err(|e| EngineError::Input(format!("cannot read {path}: {e}")))?;

    let dialect = options
        .dialect
        .clone()
        .or_else(|| path.ends_with(".civet").then(|| "civet".to_string()));
    let script = apply_dialect(engine, &source, dialect.as_deref())?;
    let as_module = path.ends_with(".mjs") || detect_module(&script);

    engine.with(|ctx| -> Result<(), EngineError> {
        let globals = ctx.globals();
        globals.set("scriptArgs", options.script_args.clone())?;
        if let Some(argv0) = &options.argv0 {
            globals.set("argv0", argv0.as_str())?;
        }

        if as_module {
            run_module(&ctx, path, &script)
        } else {
            run_module(&ctx, "<shim>", GLOBAL_SHIM)?;
            run_script(&ctx, &script)
        }
    })?;

    engine.drain_jobs()
}

// ─────────────────────────────────────────────────────────────────────────────
// Environment
// ─────────────────────────────────────────────────────────────────────────────

/// Replace the environment sub-object wholesale and mirror every entry into
/// the process environment. A non-object input is an input-shape error,
/// distinct from any engine exception.
pub fn set_env(engine: &Engine, input: &str) -> Result<(), EngineError> {
    let parsed: serde_json::Value = serde_json::from_str(input)
        .map_err(|e| EngineError::Input(format!("environment is not valid JSON: {e}")))?;
    let serde_json::Value::Object(entries) = parsed else {
        return Err(EngineError::Input(
            "environment must be a JSON object".to_string(),
        ));
    };

    engine.with(|ctx| -> Result<(), EngineError> {
        let env = Object::new(ctx.clone())?;
        for (key, value) in &entries {
            env.set(key.as_str(), coerce(value))?;
        }
        let process: Object = ctx.globals().get("process")?;
        process.set("env", env)?;
        Ok(())
    })?;

    for (key, value) in &entries {
        // SAFETY: the host serializes plugin calls; nothing reads the
        // environment concurrently.
        unsafe { std::env::set_var(key, coerce(value)) };
    }
    Ok(())
}

/// Clear every currently-set process environment variable and reset the
/// environment sub-object to empty.
pub fn unset_env(engine: &Engine) -> Result<(), EngineError> {
    let keys: Vec<String> = std::env::vars().map(|(key, _)| key).collect();
    for key in keys {
        // SAFETY: as in set_env.
        unsafe { std::env::remove_var(&key) };
    }

    engine.with(|ctx| -> Result<(), EngineError> {
        let process: Object = ctx.globals().get("process")?;
        process.set("env", Object::new(ctx.clone())?)?;
        Ok(())
    })
}

// ─────────────────────────────────────────────────────────────────────────────
// Dialect and Module Detection
// ─────────────────────────────────────────────────────────────────────────────

/// Sniff the leading syntax for a top-level module marker, skipping
/// whitespace and comments. Only the first significant token decides.
pub fn detect_module(source: &str) -> bool {
    let mut rest = source;
    loop {
        let trimmed = rest.trim_start();
        if let Some(stripped) = trimmed.strip_prefix("//") {
            rest = stripped
                .split_once('\n')
                .map(|(_, tail)| tail)
                .unwrap_or("");
        } else if let Some(stripped) = trimmed.strip_prefix("/*") {
            match stripped.split_once("*/") {
                Some((_, tail)) => rest = tail,
                None => return false,
            }
        } else {
            rest = trimmed;
            break;
        }
    }

    for keyword in ["import", "export"] {
        if let Some(tail) = rest.strip_prefix(keyword) {
            let at_boundary = tail
                .chars()
                .next()
                .is_none_or(|c| !c.is_ascii_alphanumeric() && c != '_' && c != '$');
            if at_boundary {
                return true;
            }
        }
    }
    false
}

#[cfg(feature = "civet")]
fn apply_dialect<'a>(
    engine: &Engine,
    source: &'a str,
    dialect: Option<&str>,
) -> Result<Cow<'a, str>, EngineError> {
    match dialect {
        Some("civet") => Ok(Cow::Owned(engine.transpile(source)?)),
        _ => Ok(Cow::Borrowed(source)),
    }
}

/// Without the feature the dialect tag is never consulted; evaluation falls
/// back to native syntax.
#[cfg(not(feature = "civet"))]
fn apply_dialect<'a>(
    _engine: &Engine,
    source: &'a str,
    _dialect: Option<&str>,
) -> Result<Cow<'a, str>, EngineError> {
    Ok(Cow::Borrowed(source))
}

// ─────────────────────────────────────────────────────────────────────────────
// Engine Invocation
// ─────────────────────────────────────────────────────────────────────────────

/// Two-phase module evaluation: declare first (which fixes the synthetic
/// module name used for import metadata), then execute and await the
/// completion before returning to the host.
fn run_module(ctx: &Ctx<'_>, name: &str, source: &str) -> Result<(), EngineError> {
    let declared = Module::declare(ctx.clone(), name, source)
        .catch(ctx)
        .map_err(|e| EngineError::Script(describe_exception(&e)))?;
    let (_module, promise) = declared
        .eval()
        .catch(ctx)
        .map_err(|e| EngineError::Script(describe_exception(&e)))?;
    promise
        .finish::<()>()
        .catch(ctx)
        .map_err(|e| EngineError::Script(describe_exception(&e)))
}

fn run_script(ctx: &Ctx<'_>, source: &str) -> Result<(), EngineError> {
    let mut options = rquickjs::context::EvalOptions::default();
    options.global = true;
    options.strict = false;
    options.backtrace_barrier = false;

    ctx.eval_with_options::<(), _>(source, options)
        .catch(ctx)
        .map_err(|e| EngineError::Script(describe_exception(&e)))
}

fn change_dir(dir: &str) -> Result<(), EngineError> {
    tracing::debug!(dir, "applying working-directory override");
    std::env::set_current_dir(dir).map_err(|e| EngineError::WorkingDir {
        dir: dir.to_string(),
        reason: e.to_string(),
    })
}

fn coerce(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
