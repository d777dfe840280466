//! The bundled Civet-dialect compiler.
//!
//! The compiler ships as a JS module and is compiled once per engine
//! instance, at initialization time; the retained `compile` entry point is
//! the per-instance cache and is never shared across instances. A load
//! failure leaves the transpiler unloaded; later `compile` calls then
//! report a configuration error instead of crashing.

use rquickjs::{CatchResultExt, Context, Function, Module, Object, Persistent};

use crate::error::{EngineError, describe_exception};

/// Version of the bundled compiler, kept in sync with its `version` export.
pub const CIVET_VERSION: &str = "0.6.93";

const MODULE_NAME: &str = "civet";
const SOURCE: &str = include_str!("../js/civet.mjs");

pub(crate) struct Transpiler {
    compile: Option<Persistent<Function<'static>>>,
}

impl Transpiler {
    /// Evaluate the bundled module against the given context and retain its
    /// compile entry point. Never fails the engine initialization.
    pub(crate) fn load(context: &Context) -> Self {
        match Self::try_load(context) {
            Ok(transpiler) => transpiler,
            Err(err) => {
                tracing::warn!(%err, "civet compiler failed to load; dialect disabled");
                Self { compile: None }
            }
        }
    }

    fn try_load(context: &Context) -> Result<Self, EngineError> {
        context.with(|ctx| {
            let declared = Module::declare(ctx.clone(), MODULE_NAME, SOURCE)
                .catch(&ctx)
                .map_err(|e| EngineError::Init(describe_exception(&e)))?;
            let (module, promise) = declared
                .eval()
                .catch(&ctx)
                .map_err(|e| EngineError::Init(describe_exception(&e)))?;
            promise
                .finish::<()>()
                .catch(&ctx)
                .map_err(|e| EngineError::Init(describe_exception(&e)))?;

            let compile: Function = module
                .get("compile")
                .map_err(|e: rquickjs::Error| EngineError::Init(e.to_string()))?;

            if let Ok(version) = module.get::<_, String>("version") {
                if version != CIVET_VERSION {
                    tracing::warn!(
                        bundled = %version,
                        reported = %CIVET_VERSION,
                        "civet version drift between bundle and build"
                    );
                }
            }

            tracing::debug!("civet compiler loaded");
            Ok(Self {
                compile: Some(Persistent::save(&ctx, compile)),
            })
        })
    }

    pub(crate) fn is_loaded(&self) -> bool {
        self.compile.is_some()
    }

    /// Run the compiler's synchronous entry point over `source`.
    pub(crate) fn compile(&self, context: &Context, source: &str) -> Result<String, EngineError> {
        let Some(saved) = &self.compile else {
            return Err(EngineError::TranspilerUnavailable);
        };

        context.with(|ctx| {
            let compile = saved.clone().restore(&ctx)?;
            let options = Object::new(ctx.clone())?;
            options.set("sync", true)?;
            compile
                .call::<_, String>((source, options))
                .catch(&ctx)
                .map_err(|e| EngineError::Transpile(describe_exception(&e)))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::{CIVET_VERSION, SOURCE};
    use crate::engine::Engine;
    use crate::error::EngineError;

    #[test]
    fn test_compiles_const_declarations() {
        let engine = Engine::new().unwrap();
        assert!(engine.transpiler_loaded());
        let out = engine.transpile("x := 1\nprint(x)").unwrap();
        assert_eq!(out, "const x = 1\nprint(x)");
    }

    #[test]
    fn test_compiles_let_declarations() {
        let engine = Engine::new().unwrap();
        let out = engine.transpile("count .= 0\ncount = count + 1").unwrap();
        assert_eq!(out, "let count = 0\ncount = count + 1");
    }

    #[test]
    fn test_plain_javascript_passes_through() {
        let engine = Engine::new().unwrap();
        let src = "const a = [1, 2].map(n => n * 2);";
        assert_eq!(engine.transpile(src).unwrap(), src);
    }

    #[test]
    fn test_dangling_declaration_is_a_transpile_error() {
        let engine = Engine::new().unwrap();
        let err = engine.transpile("broken :=").unwrap_err();
        match err {
            EngineError::Transpile(msg) => {
                assert!(msg.contains("missing initializer"), "got: {msg}")
            }
            other => panic!("expected transpile error, got {other}"),
        }
    }

    #[test]
    fn test_bundled_version_matches_reported_version() {
        let runtime = rquickjs::Runtime::new().unwrap();
        let context = rquickjs::Context::full(&runtime).unwrap();

        context.with(|ctx| {
            let declared = rquickjs::Module::declare(ctx.clone(), "civet-probe", SOURCE).unwrap();
            let (module, promise) = declared.eval().unwrap();
            promise.finish::<()>().unwrap();

            let version: String = module.get("version").unwrap();
            assert_eq!(version, CIVET_VERSION);
        });
    }
}
