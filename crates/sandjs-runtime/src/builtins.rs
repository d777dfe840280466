//! Native builtin modules registered with the module loader.
//!
//! Scripts import these under the fixed `qjs:` namespace identifiers; in
//! plain-script mode the pipeline re-exposes them as globals. The exported
//! surface is the contract: env access mirrors the process environment, so
//! `setEnv`/`unsetEnv` changes are observable from `std.getenviron()`.

use std::collections::HashMap;
use std::time::{SystemTime, UNIX_EPOCH};

use rquickjs::module::{Declarations, Exports, ModuleDef};
use rquickjs::{ArrayBuffer, Ctx, Exception, Function, Value};

/// `qjs:std`: environment helpers.
pub struct JsStd;

impl ModuleDef for JsStd {
    fn declare(decl: &Declarations) -> rquickjs::Result<()> {
        decl.declare("getenv")?;
        decl.declare("setenv")?;
        decl.declare("unsetenv")?;
        decl.declare("getenviron")?;
        Ok(())
    }

    fn evaluate<'js>(ctx: &Ctx<'js>, exports: &Exports<'js>) -> rquickjs::Result<()> {
        exports.export("getenv", Function::new(ctx.clone(), std_getenv)?)?;
        exports.export("setenv", Function::new(ctx.clone(), std_setenv)?)?;
        exports.export("unsetenv", Function::new(ctx.clone(), std_unsetenv)?)?;
        exports.export("getenviron", Function::new(ctx.clone(), std_getenviron)?)?;
        Ok(())
    }
}

fn std_getenv(name: String) -> Option<String> {
    std::env::var(&name).ok()
}

fn std_setenv(name: String, value: String) {
    // SAFETY: the plugin is invoked single-threaded; no other thread reads
    // the environment concurrently.
    unsafe { std::env::set_var(&name, &value) };
}

fn std_unsetenv(name: String) {
    // SAFETY: as in std_setenv.
    unsafe { std::env::remove_var(&name) };
}

fn std_getenviron() -> HashMap<String, String> {
    std::env::vars().collect()
}

/// `qjs:os`: working directory and clock.
pub struct JsOs;

impl ModuleDef for JsOs {
    fn declare(decl: &Declarations) -> rquickjs::Result<()> {
        decl.declare("getcwd")?;
        decl.declare("chdir")?;
        decl.declare("now")?;
        Ok(())
    }

    fn evaluate<'js>(ctx: &Ctx<'js>, exports: &Exports<'js>) -> rquickjs::Result<()> {
        exports.export("getcwd", Function::new(ctx.clone(), os_getcwd)?)?;
        exports.export("chdir", Function::new(ctx.clone(), os_chdir)?)?;
        exports.export("now", Function::new(ctx.clone(), os_now)?)?;
        Ok(())
    }
}

// Returns `[path, errno]` the way the engine's own os module does.
fn os_getcwd() -> (String, i32) {
    match std::env::current_dir() {
        Ok(path) => (path.to_string_lossy().into_owned(), 0),
        Err(_) => (String::new(), 1),
    }
}

fn os_chdir(path: String) -> i32 {
    match std::env::set_current_dir(&path) {
        Ok(()) => 0,
        Err(_) => 1,
    }
}

fn os_now() -> f64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as f64
}

/// `qjs:bjson`: binary serialization of plain values.
pub struct JsBjson;

impl ModuleDef for JsBjson {
    fn declare(decl: &Declarations) -> rquickjs::Result<()> {
        decl.declare("write")?;
        decl.declare("read")?;
        Ok(())
    }

    fn evaluate<'js>(ctx: &Ctx<'js>, exports: &Exports<'js>) -> rquickjs::Result<()> {
        exports.export("write", Function::new(ctx.clone(), bjson_write)?)?;
        exports.export("read", Function::new(ctx.clone(), bjson_read)?)?;
        Ok(())
    }
}

fn bjson_write<'js>(ctx: Ctx<'js>, value: Value<'js>) -> rquickjs::Result<ArrayBuffer<'js>> {
    let text = match ctx.json_stringify(value)? {
        Some(json) => json.to_string()?,
        None => "undefined".to_string(),
    };
    ArrayBuffer::new(ctx, text.into_bytes())
}

fn bjson_read<'js>(ctx: Ctx<'js>, buffer: ArrayBuffer<'js>) -> rquickjs::Result<Value<'js>> {
    let Some(bytes) = buffer.as_bytes() else {
        return Err(Exception::throw_type(&ctx, "buffer is detached"));
    };
    ctx.json_parse(bytes.to_vec())
}
