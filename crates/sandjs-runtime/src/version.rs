//! Version reporting for the engine and the optional dialect compiler.

/// Version string of the embedded QuickJS build.
pub const ENGINE_VERSION: &str = "quickjs/2021-03-27";

/// Resolve the version string for a feature key.
///
/// The empty key reports the engine itself. A dialect key reports the
/// bundled compiler's version when the feature is compiled in and an empty
/// string otherwise, never an error. Requires no live engine instance.
pub fn version_for(key: &str) -> &'static str {
    match key {
        "civet" => {
            #[cfg(feature = "civet")]
            {
                crate::transpiler::CIVET_VERSION
            }
            #[cfg(not(feature = "civet"))]
            {
                ""
            }
        }
        _ => ENGINE_VERSION,
    }
}
