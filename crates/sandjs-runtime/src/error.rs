//! Error types for the embedded engine.

use rquickjs::CaughtError;

/// Errors produced by the engine lifecycle and evaluation pipeline.
///
/// Every failure the host can observe maps to one of these variants; engine
/// exceptions never unwind past the pipeline boundary.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// The runtime or execution context could not be allocated.
    #[error("cannot allocate JS engine: {0}")]
    Init(String),

    /// An operation requiring a live instance was called without one.
    #[error("engine not initialized; call warmup first")]
    NotReady,

    /// An uncaught script exception, carried verbatim.
    #[error("{0}")]
    Script(String),

    /// The dialect compiler reported a failure.
    #[error("transpile error: {0}")]
    Transpile(String),

    /// A dialect was requested but the compiler failed to load.
    #[error("dialect requested but transpiler unavailable")]
    TranspilerUnavailable,

    /// The host handed us input the operation cannot interpret.
    #[error("invalid input: {0}")]
    Input(String),

    /// The configured working-directory override could not be applied.
    #[error("cannot change working directory to {dir}: {reason}")]
    WorkingDir { dir: String, reason: String },
}

impl From<rquickjs::Error> for EngineError {
    fn from(err: rquickjs::Error) -> Self {
        EngineError::Script(err.to_string())
    }
}

/// Render a caught engine exception the way the engine itself would print it:
/// the message, followed by the stack when one is attached.
pub(crate) fn describe_exception(err: &CaughtError<'_>) -> String {
    match err {
        CaughtError::Exception(exception) => {
            let mut text = exception
                .message()
                .unwrap_or_else(|| "unknown exception".to_string());
            if let Some(stack) = exception.stack() {
                if !stack.is_empty() {
                    text.push('\n');
                    text.push_str(&stack);
                }
            }
            text
        }
        CaughtError::Value(value) => {
            if let Some(s) = value.as_string().and_then(|s| s.to_string().ok()) {
                s
            } else {
                format!("exception: {value:?}")
            }
        }
        CaughtError::Error(err) => err.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rquickjs::{CatchResultExt, Context, Runtime, Value};

    #[test]
    fn test_exception_description_carries_message() {
        let runtime = Runtime::new().unwrap();
        let context = Context::full(&runtime).unwrap();

        context.with(|ctx| {
            let err = ctx
                .eval::<Value, _>("throw new Error('boom')")
                .catch(&ctx)
                .unwrap_err();
            let text = describe_exception(&err);
            assert!(text.contains("boom"), "unexpected description: {text}");
        });
    }

    #[test]
    fn test_thrown_string_is_rendered_verbatim() {
        let runtime = Runtime::new().unwrap();
        let context = Context::full(&runtime).unwrap();

        context.with(|ctx| {
            let err = ctx
                .eval::<Value, _>("throw 'plain failure'")
                .catch(&ctx)
                .unwrap_err();
            assert_eq!(describe_exception(&err), "plain failure");
        });
    }
}
