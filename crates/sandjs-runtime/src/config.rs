//! Per-call option resolution from the host configuration store.
//!
//! Config values are always strings and always optional; an absent key is
//! distinct from an explicitly empty value. Resolution is best-effort: a
//! malformed numeric value falls back to "no override" instead of failing
//! the call.

/// Read-only key/value lookup backed by the host.
///
/// Implementations do a single pass-through lookup with no retry and no
/// caching beyond one lookup per key per call.
pub trait Config {
    /// Look up a configuration value; `None` means the key is not set.
    fn get(&self, key: &str) -> Option<String>;
}

impl Config for std::collections::HashMap<String, String> {
    fn get(&self, key: &str) -> Option<String> {
        std::collections::HashMap::get(self, key).cloned()
    }
}

/// Resolved options for one `eval` invocation.
#[derive(Debug, Clone, Default)]
pub struct EvalOptions {
    /// Heap limit in bytes; `None` leaves the engine default in place.
    pub memory_limit: Option<usize>,
    /// Maximum stack size in bytes; `None` leaves the engine default in place.
    pub stack_size: Option<usize>,
    /// Forced module mode; `None` auto-detects from the script text.
    pub module: Option<bool>,
    /// Source dialect tag; `None` is the engine's native syntax.
    pub dialect: Option<String>,
    /// Working directory to switch to before running user code.
    pub dir: Option<String>,
    /// Whether `eval` may initialize an instance itself when none is live.
    pub warmup: bool,
}

impl EvalOptions {
    /// Build the option bag from the `eval.*` config keys.
    pub fn resolve(config: &dyn Config) -> Self {
        Self {
            memory_limit: parse_size(config.get("eval.memoryLimit"), "eval.memoryLimit"),
            stack_size: parse_size(config.get("eval.stackSize"), "eval.stackSize"),
            module: config.get("eval.module").map(|v| v == "true"),
            dialect: config.get("eval.dialect").filter(|v| !v.is_empty()),
            dir: config.get("eval.dir").filter(|v| !v.is_empty()),
            warmup: config.get("eval.warmup").map(|v| v == "true").unwrap_or(true),
        }
    }
}

/// Resolved options for one `evalFile` invocation.
#[derive(Debug, Clone, Default)]
pub struct EvalFileOptions {
    /// Working directory to switch to before reading or running the file.
    pub dir: Option<String>,
    /// Dialect override; a `.civet` extension selects the dialect on its own.
    pub dialect: Option<String>,
    /// Value for the `argv0` global.
    pub argv0: Option<String>,
    /// Values for the `scriptArgs` global.
    pub script_args: Vec<String>,
    /// Whether `evalFile` may initialize an instance itself when none is live.
    pub warmup: bool,
}

impl EvalFileOptions {
    /// Build the option bag from the `evalFile.*` config keys. The shared
    /// `eval.warmup` flag gates auto-initialization for both eval entry points.
    pub fn resolve(config: &dyn Config) -> Self {
        Self {
            dir: config.get("evalFile.dir").filter(|v| !v.is_empty()),
            dialect: config.get("evalFile.dialect").filter(|v| !v.is_empty()),
            argv0: config.get("evalFile.argv0"),
            script_args: parse_script_args(config.get("evalFile.scriptArgs")),
            warmup: config.get("eval.warmup").map(|v| v == "true").unwrap_or(true),
        }
    }
}

/// Parse a byte-count option. Negative and non-numeric values mean "not set";
/// they must never abort the call.
fn parse_size(raw: Option<String>, key: &str) -> Option<usize> {
    let raw = raw?;
    match raw.trim().parse::<i64>() {
        Ok(value) if value >= 0 => Some(value as usize),
        Ok(value) => {
            tracing::warn!(key, value, "ignoring negative size option");
            None
        }
        Err(_) => {
            tracing::warn!(key, %raw, "ignoring non-numeric size option");
            None
        }
    }
}

fn parse_script_args(raw: Option<String>) -> Vec<String> {
    let Some(raw) = raw else {
        return Vec::new();
    };
    match serde_json::from_str::<Vec<String>>(&raw) {
        Ok(args) => args,
        Err(err) => {
            tracing::warn!(%err, "ignoring malformed evalFile.scriptArgs");
            Vec::new()
        }
    }
}
