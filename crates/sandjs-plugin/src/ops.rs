//! Exported operation bodies.
//!
//! Each operation takes the host bridge and the plugin's lifecycle slot
//! explicitly, translates buffers and options, and maps every failure onto
//! the error buffer plus a non-zero status. Exactly one of output/error is
//! written per call; success without a result writes neither.
//!
//! `eval`, `evalFile` and `civet` reuse a warmed instance when one is live;
//! without one they initialize a fresh instance for just that call and tear
//! it down afterwards (per-call isolation). Setting `eval.warmup` to
//! `"false"` disables the auto-initialization, making a missing `warmup`
//! call a reported not-ready error.

use sandjs_runtime::{
    Config, EngineError, EvalFileOptions, EvalOptions, Lifecycle, LifecycleState, pipeline,
};

use crate::host::HostBridge;

pub const SUCCESS: i32 = 0;
pub const FAILURE: i32 = 1;

// ─────────────────────────────────────────────────────────────────────────────
// Exported Operations
// ─────────────────────────────────────────────────────────────────────────────

/// Create (or replace) the persistent engine instance.
pub fn warmup(host: &mut dyn HostBridge, lifecycle: &mut Lifecycle) -> i32 {
    match lifecycle.initialize() {
        Ok(_) => SUCCESS,
        Err(err) => fail(host, &err),
    }
}

/// Free the persistent engine instance. Always succeeds.
pub fn cleanup(_host: &mut dyn HostBridge, lifecycle: &mut Lifecycle) -> i32 {
    lifecycle.teardown();
    SUCCESS
}

/// Evaluate the input buffer as script text.
pub fn eval(host: &mut dyn HostBridge, lifecycle: &mut Lifecycle) -> i32 {
    let options = EvalOptions::resolve(&BridgeConfig(&*host));
    let source = match input_text(host) {
        Ok(source) => source,
        Err(err) => return fail(host, &err),
    };

    let ephemeral = lifecycle.state() != LifecycleState::Ready;
    if ephemeral && !options.warmup {
        return fail(host, &EngineError::NotReady);
    }

    let result = {
        let engine = match acquire(lifecycle, ephemeral) {
            Ok(engine) => engine,
            Err(err) => return fail(host, &err),
        };
        pipeline::eval(engine, &source, &options)
    };
    if ephemeral {
        lifecycle.teardown();
    }
    finish(host, result)
}

/// Evaluate a script file named by the input buffer.
pub fn eval_file(host: &mut dyn HostBridge, lifecycle: &mut Lifecycle) -> i32 {
    let options = EvalFileOptions::resolve(&BridgeConfig(&*host));
    let path = match input_text(host) {
        Ok(path) => path,
        Err(err) => return fail(host, &err),
    };

    let ephemeral = lifecycle.state() != LifecycleState::Ready;
    if ephemeral && !options.warmup {
        return fail(host, &EngineError::NotReady);
    }

    let result = {
        let engine = match acquire(lifecycle, ephemeral) {
            Ok(engine) => engine,
            Err(err) => return fail(host, &err),
        };
        pipeline::eval_file(engine, &path, &options)
    };
    if ephemeral {
        lifecycle.teardown();
    }
    finish(host, result)
}

/// Replace the script-visible environment from a JSON object.
pub fn set_env(host: &mut dyn HostBridge, lifecycle: &mut Lifecycle) -> i32 {
    let input = match input_text(host) {
        Ok(input) => input,
        Err(err) => return fail(host, &err),
    };
    let engine = match lifecycle.ensure_ready() {
        Ok(engine) => engine,
        Err(err) => return fail(host, &err),
    };
    finish(host, pipeline::set_env(engine, &input))
}

/// Clear the script-visible environment.
pub fn unset_env(host: &mut dyn HostBridge, lifecycle: &mut Lifecycle) -> i32 {
    let engine = match lifecycle.ensure_ready() {
        Ok(engine) => engine,
        Err(err) => return fail(host, &err),
    };
    finish(host, pipeline::unset_env(engine))
}

/// Compile dialect source to native syntax and return it as output.
#[cfg(feature = "civet")]
pub fn civet(host: &mut dyn HostBridge, lifecycle: &mut Lifecycle) -> i32 {
    let source = match input_text(host) {
        Ok(source) => source,
        Err(err) => return fail(host, &err),
    };

    let ephemeral = lifecycle.state() != LifecycleState::Ready;
    let result = {
        let engine = match acquire(lifecycle, ephemeral) {
            Ok(engine) => engine,
            Err(err) => return fail(host, &err),
        };
        engine.transpile(&source)
    };
    if ephemeral {
        lifecycle.teardown();
    }
    match result {
        Ok(compiled) => {
            host.set_output(compiled.as_bytes());
            SUCCESS
        }
        Err(err) => fail(host, &err),
    }
}

/// Report the engine's (or a compiled-in feature's) version string.
pub fn get_version(host: &mut dyn HostBridge, _lifecycle: &mut Lifecycle) -> i32 {
    let key = match input_text(host) {
        Ok(key) => key,
        Err(err) => return fail(host, &err),
    };
    host.set_output(sandjs_runtime::version_for(&key).as_bytes());
    SUCCESS
}

// ─────────────────────────────────────────────────────────────────────────────
// Buffer and Status Helpers
// ─────────────────────────────────────────────────────────────────────────────

struct BridgeConfig<'a>(&'a dyn HostBridge);

impl Config for BridgeConfig<'_> {
    fn get(&self, key: &str) -> Option<String> {
        self.0.config(key)
    }
}

fn acquire<'a>(
    lifecycle: &'a mut Lifecycle,
    ephemeral: bool,
) -> Result<&'a mut sandjs_runtime::Engine, EngineError> {
    if ephemeral {
        lifecycle.initialize()
    } else {
        lifecycle.ensure_ready()
    }
}

/// Interpret the input buffer as source text: NUL-free, or terminated by the
/// first NUL byte.
fn input_text(host: &dyn HostBridge) -> Result<String, EngineError> {
    let mut bytes = host.input();
    if let Some(pos) = bytes.iter().position(|b| *b == 0) {
        bytes.truncate(pos);
    }
    String::from_utf8(bytes).map_err(|e| EngineError::Input(format!("input is not UTF-8: {e}")))
}

fn finish(host: &mut dyn HostBridge, result: Result<(), EngineError>) -> i32 {
    match result {
        Ok(()) => SUCCESS,
        Err(err) => fail(host, &err),
    }
}

fn fail(host: &mut dyn HostBridge, err: &EngineError) -> i32 {
    tracing::debug!(%err, "operation failed");
    host.set_error(&err.to_string());
    FAILURE
}
