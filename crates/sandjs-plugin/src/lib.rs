//! sandjs plugin shell.
//!
//! Exposes the embedded QuickJS runtime as a sandboxed plugin: exported
//! entry points read their input and configuration through the host ABI,
//! drive the engine lifecycle in `sandjs-runtime`, and report results as an
//! output buffer, an error buffer, or a bare status code.
//!
//! The host serializes calls into the plugin, so the lifecycle slot lives in
//! a thread-local and every operation gets exclusive access for its whole
//! duration.

mod host;
mod ops;

pub use host::{HostBridge, MemoryHost};
#[cfg(feature = "civet")]
pub use ops::civet;
pub use ops::{
    FAILURE, SUCCESS, cleanup, eval, eval_file, get_version, set_env, unset_env, warmup,
};

#[cfg(target_arch = "wasm32")]
mod exports {
    use std::cell::RefCell;

    use sandjs_runtime::Lifecycle;

    use crate::host::{ExtismHost, HostBridge};
    use crate::ops;

    thread_local! {
        static LIFECYCLE: RefCell<Lifecycle> = const { RefCell::new(Lifecycle::new()) };
    }

    fn dispatch(op: fn(&mut dyn HostBridge, &mut Lifecycle) -> i32) -> i32 {
        LIFECYCLE.with(|slot| op(&mut ExtismHost, &mut slot.borrow_mut()))
    }

    #[unsafe(no_mangle)]
    pub extern "C" fn warmup() -> i32 {
        dispatch(ops::warmup)
    }

    #[unsafe(no_mangle)]
    pub extern "C" fn cleanup() -> i32 {
        dispatch(ops::cleanup)
    }

    #[unsafe(no_mangle)]
    pub extern "C" fn eval() -> i32 {
        dispatch(ops::eval)
    }

    #[unsafe(export_name = "evalFile")]
    pub extern "C" fn eval_file() -> i32 {
        dispatch(ops::eval_file)
    }

    #[unsafe(export_name = "setEnv")]
    pub extern "C" fn set_env() -> i32 {
        dispatch(ops::set_env)
    }

    #[unsafe(export_name = "unsetEnv")]
    pub extern "C" fn unset_env() -> i32 {
        dispatch(ops::unset_env)
    }

    #[cfg(feature = "civet")]
    #[unsafe(no_mangle)]
    pub extern "C" fn civet() -> i32 {
        dispatch(ops::civet)
    }

    #[unsafe(export_name = "getVersion")]
    pub extern "C" fn get_version() -> i32 {
        dispatch(ops::get_version)
    }
}
