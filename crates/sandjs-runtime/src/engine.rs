//! Engine instance ownership and the lifecycle state machine.
//!
//! One live instance per plugin process. The instance is owned by a
//! [`Lifecycle`] slot and passed explicitly into the pipeline; there are no
//! ambient runtime globals. Both usage modes (per-call init/teardown around
//! each eval, and persistent warmup/cleanup bracketing many evals) run on
//! this one state machine.

use rquickjs::loader::{BuiltinResolver, ModuleLoader};
use rquickjs::{Context, Ctx, Runtime};

use crate::builtins::{JsBjson, JsOs, JsStd};
use crate::error::EngineError;
use crate::shim;
#[cfg(feature = "civet")]
use crate::transpiler::Transpiler;

// ─────────────────────────────────────────────────────────────────────────────
// Engine Instance
// ─────────────────────────────────────────────────────────────────────────────

/// One runtime + one execution context, with the default bindings applied
/// and (when compiled in) the dialect compiler loaded.
pub struct Engine {
    // Field order is drop order: compiler reference, then context, then runtime.
    #[cfg(feature = "civet")]
    transpiler: Transpiler,
    context: Context,
    runtime: Runtime,
}

impl Engine {
    /// Allocate the runtime, register the module loader, create the context,
    /// apply the module shim, and load the dialect compiler.
    pub fn new() -> Result<Self, EngineError> {
        tracing::debug!("initializing JS engine");

        let runtime = Runtime::new().map_err(|e| EngineError::Init(e.to_string()))?;

        let resolver = BuiltinResolver::default()
            .with_module("qjs:std")
            .with_module("qjs:os")
            .with_module("qjs:bjson");
        let loader = ModuleLoader::default()
            .with_module("qjs:std", JsStd)
            .with_module("qjs:os", JsOs)
            .with_module("qjs:bjson", JsBjson);
        runtime.set_loader(resolver, loader);

        let context = Context::full(&runtime).map_err(|e| EngineError::Init(e.to_string()))?;
        shim::install(&runtime, &context).map_err(|e| EngineError::Init(e.to_string()))?;

        #[cfg(feature = "civet")]
        let transpiler = Transpiler::load(&context);

        Ok(Self {
            #[cfg(feature = "civet")]
            transpiler,
            context,
            runtime,
        })
    }

    /// Run a closure against the execution context.
    pub fn with<F, R>(&self, f: F) -> R
    where
        F: FnOnce(Ctx) -> R,
    {
        self.context.with(f)
    }

    /// Cap the runtime heap. Applies immediately to the live instance.
    pub fn set_memory_limit(&self, bytes: usize) {
        self.runtime.set_memory_limit(bytes);
    }

    /// Cap the runtime stack. Applies immediately to the live instance.
    pub fn set_max_stack_size(&self, bytes: usize) {
        self.runtime.set_max_stack_size(bytes);
    }

    /// Run the job queue until quiescent so no pending asynchronous work
    /// outlives the current host call. A job that fails surfaces as a script
    /// error after the queue has fully drained.
    pub fn drain_jobs(&self) -> Result<(), EngineError> {
        let mut rejected = false;
        loop {
            match self.runtime.execute_pending_job() {
                Ok(true) => continue,
                Ok(false) => break,
                Err(_) => rejected = true,
            }
        }
        if rejected {
            Err(EngineError::Script(
                "possibly unhandled promise rejection".to_string(),
            ))
        } else {
            Ok(())
        }
    }

    /// Compile dialect source down to native syntax.
    #[cfg(feature = "civet")]
    pub fn transpile(&self, source: &str) -> Result<String, EngineError> {
        self.transpiler.compile(&self.context, source)
    }

    /// Whether the dialect compiler survived loading.
    #[cfg(feature = "civet")]
    pub fn transpiler_loaded(&self) -> bool {
        self.transpiler.is_loaded()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Lifecycle State Machine
// ─────────────────────────────────────────────────────────────────────────────

/// Observable lifecycle states of the plugin's engine slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleState {
    /// No instance has been created yet.
    Uninitialized,
    /// A live instance is available for evaluation.
    Ready,
    /// A previous instance was torn down; re-initialization is allowed.
    Destroyed,
}

/// The process-wide engine slot.
pub struct Lifecycle {
    engine: Option<Engine>,
    state: LifecycleState,
}

impl Lifecycle {
    pub const fn new() -> Self {
        Self {
            engine: None,
            state: LifecycleState::Uninitialized,
        }
    }

    pub fn state(&self) -> LifecycleState {
        self.state
    }

    /// Create a fresh instance, freeing any prior one first. On failure no
    /// stale handle remains visible to later calls.
    pub fn initialize(&mut self) -> Result<&mut Engine, EngineError> {
        self.engine = None;
        match Engine::new() {
            Ok(engine) => {
                self.state = LifecycleState::Ready;
                Ok(self.engine.insert(engine))
            }
            Err(err) => {
                self.state = LifecycleState::Uninitialized;
                Err(err)
            }
        }
    }

    /// Free the live instance. Idempotent: a no-op when nothing is live.
    pub fn teardown(&mut self) {
        if self.engine.take().is_some() {
            tracing::debug!("JS engine torn down");
            self.state = LifecycleState::Destroyed;
        }
    }

    /// Access the live instance without auto-initializing.
    pub fn ensure_ready(&mut self) -> Result<&mut Engine, EngineError> {
        self.engine.as_mut().ok_or(EngineError::NotReady)
    }
}

impl Default for Lifecycle {
    fn default() -> Self {
        Self::new()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_initialize_reaches_ready() {
        let mut lifecycle = Lifecycle::new();
        assert_eq!(lifecycle.state(), LifecycleState::Uninitialized);
        assert!(lifecycle.ensure_ready().is_err());

        lifecycle.initialize().unwrap();
        assert_eq!(lifecycle.state(), LifecycleState::Ready);
        assert!(lifecycle.ensure_ready().is_ok());
    }

    #[test]
    fn test_teardown_is_idempotent() {
        let mut lifecycle = Lifecycle::new();
        lifecycle.teardown();
        assert_eq!(lifecycle.state(), LifecycleState::Uninitialized);

        lifecycle.initialize().unwrap();
        lifecycle.teardown();
        assert_eq!(lifecycle.state(), LifecycleState::Destroyed);

        lifecycle.teardown();
        assert_eq!(lifecycle.state(), LifecycleState::Destroyed);
        assert!(matches!(
            lifecycle.ensure_ready(),
            Err(EngineError::NotReady)
        ));
    }

    #[test]
    fn test_reinitialize_replaces_the_instance() {
        let mut lifecycle = Lifecycle::new();
        lifecycle.initialize().unwrap();
        lifecycle
            .ensure_ready()
            .unwrap()
            .with(|ctx| ctx.eval::<(), _>("globalThis.marker = 7").unwrap());

        lifecycle.initialize().unwrap();
        let survived: bool = lifecycle
            .ensure_ready()
            .unwrap()
            .with(|ctx| ctx.eval("typeof marker !== 'undefined'").unwrap());
        assert!(!survived, "fresh instance leaked prior context state");
    }

    #[test]
    fn test_destroyed_slot_can_reinitialize() {
        let mut lifecycle = Lifecycle::new();
        lifecycle.initialize().unwrap();
        lifecycle.teardown();
        lifecycle.initialize().unwrap();
        assert_eq!(lifecycle.state(), LifecycleState::Ready);
    }

    #[test]
    fn test_limits_apply_without_error() {
        let engine = Engine::new().unwrap();
        engine.set_memory_limit(16 * 1024 * 1024);
        engine.set_max_stack_size(512 * 1024);
        engine.with(|ctx| {
            let n: i32 = ctx.eval("1 + 2").unwrap();
            assert_eq!(n, 3);
        });
    }
}
