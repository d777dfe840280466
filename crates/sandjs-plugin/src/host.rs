//! Host-boundary buffer handling.
//!
//! [`HostBridge`] is the only seam that touches the plugin ABI. The wasm
//! build talks to the Extism kernel imports; everything else (native builds,
//! tests) goes through [`MemoryHost`], which keeps the whole plugin
//! exercisable without a wasm host.

// ─────────────────────────────────────────────────────────────────────────────
// Host Bridge
// ─────────────────────────────────────────────────────────────────────────────

/// Buffer primitives the plugin ABI provides.
///
/// All transfers are whole-buffer. `config` distinguishes an absent key from
/// an explicitly empty value. Each exported operation performs at most one
/// `set_output` or `set_error` call, never both.
pub trait HostBridge {
    /// The current call's input buffer.
    fn input(&self) -> Vec<u8>;
    /// Look up a host-supplied configuration value.
    fn config(&self, key: &str) -> Option<String>;
    /// Publish the call's output buffer.
    fn set_output(&mut self, bytes: &[u8]);
    /// Publish the call's error buffer.
    fn set_error(&mut self, message: &str);
}

// ─────────────────────────────────────────────────────────────────────────────
// In-Memory Bridge
// ─────────────────────────────────────────────────────────────────────────────

/// In-memory bridge used by tests and native builds.
#[derive(Debug, Default)]
pub struct MemoryHost {
    input: Vec<u8>,
    config: std::collections::HashMap<String, String>,
    /// Output buffer written by the last operation, if any.
    pub output: Option<Vec<u8>>,
    /// Error buffer written by the last operation, if any.
    pub error: Option<String>,
}

impl MemoryHost {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_input(mut self, input: impl Into<Vec<u8>>) -> Self {
        self.input = input.into();
        self
    }

    pub fn with_config(mut self, key: &str, value: &str) -> Self {
        self.config.insert(key.to_string(), value.to_string());
        self
    }

    /// Reset per-call state while keeping the configuration, mirroring how a
    /// host reuses one plugin instance across calls.
    pub fn next_call(&mut self, input: impl Into<Vec<u8>>) {
        self.input = input.into();
        self.output = None;
        self.error = None;
    }

    pub fn output_utf8(&self) -> Option<String> {
        self.output
            .as_ref()
            .map(|bytes| String::from_utf8_lossy(bytes).into_owned())
    }
}

impl HostBridge for MemoryHost {
    fn input(&self) -> Vec<u8> {
        self.input.clone()
    }

    fn config(&self, key: &str) -> Option<String> {
        self.config.get(key).cloned()
    }

    fn set_output(&mut self, bytes: &[u8]) {
        self.output = Some(bytes.to_vec());
    }

    fn set_error(&mut self, message: &str) {
        self.error = Some(message.to_string());
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Extism Kernel Bridge
// ─────────────────────────────────────────────────────────────────────────────

/// Bridge backed by the Extism kernel imports.
#[cfg(target_arch = "wasm32")]
pub struct ExtismHost;

#[cfg(target_arch = "wasm32")]
mod kernel {
    #[link(wasm_import_module = "extism:host/env")]
    unsafe extern "C" {
        pub fn input_length() -> u64;
        pub fn input_load_u8(offset: u64) -> u8;
        pub fn length(handle: u64) -> u64;
        pub fn alloc(length: u64) -> u64;
        pub fn load_u8(handle: u64) -> u8;
        pub fn store_u8(handle: u64, value: u8);
        pub fn output_set(handle: u64, length: u64);
        pub fn error_set(handle: u64);
        pub fn config_get(key: u64) -> u64;
    }
}

#[cfg(target_arch = "wasm32")]
impl ExtismHost {
    fn alloc_bytes(bytes: &[u8]) -> u64 {
        // SAFETY: kernel calls; the returned handle addresses a fresh
        // allocation of exactly `bytes.len()` bytes.
        unsafe {
            let handle = kernel::alloc(bytes.len() as u64);
            for (i, byte) in bytes.iter().enumerate() {
                kernel::store_u8(handle + i as u64, *byte);
            }
            handle
        }
    }

    fn load_handle(handle: u64) -> Vec<u8> {
        // SAFETY: `handle` was returned by the kernel and `length` reports
        // its allocation size.
        unsafe {
            let len = kernel::length(handle);
            let mut bytes = Vec::with_capacity(len as usize);
            for i in 0..len {
                bytes.push(kernel::load_u8(handle + i));
            }
            bytes
        }
    }
}

#[cfg(target_arch = "wasm32")]
impl HostBridge for ExtismHost {
    fn input(&self) -> Vec<u8> {
        // SAFETY: kernel input accessors are valid for the whole call.
        unsafe {
            let len = kernel::input_length();
            let mut bytes = Vec::with_capacity(len as usize);
            for i in 0..len {
                bytes.push(kernel::input_load_u8(i));
            }
            bytes
        }
    }

    fn config(&self, key: &str) -> Option<String> {
        let key_handle = Self::alloc_bytes(key.as_bytes());
        // SAFETY: `key_handle` is a live kernel allocation; config_get
        // returns 0 for absent keys.
        let value = unsafe { kernel::config_get(key_handle) };
        if value == 0 {
            return None;
        }
        Some(String::from_utf8_lossy(&Self::load_handle(value)).into_owned())
    }

    fn set_output(&mut self, bytes: &[u8]) {
        let handle = Self::alloc_bytes(bytes);
        // SAFETY: handle is a live kernel allocation of bytes.len() bytes.
        unsafe { kernel::output_set(handle, bytes.len() as u64) };
    }

    fn set_error(&mut self, message: &str) {
        let handle = Self::alloc_bytes(message.as_bytes());
        // SAFETY: handle is a live kernel allocation.
        unsafe { kernel::error_set(handle) };
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_absent_config_is_distinct_from_empty() {
        let host = MemoryHost::new().with_config("eval.module", "");
        assert_eq!(host.config("eval.module").as_deref(), Some(""));
        assert_eq!(host.config("eval.dialect"), None);
    }

    #[test]
    fn test_next_call_clears_buffers_but_keeps_config() {
        let mut host = MemoryHost::new().with_config("eval.module", "true");
        host.set_output(b"out");
        host.set_error("err");
        host.next_call("fresh input");

        assert!(host.output.is_none());
        assert!(host.error.is_none());
        assert_eq!(host.input(), b"fresh input");
        assert_eq!(host.config("eval.module").as_deref(), Some("true"));
    }
}
