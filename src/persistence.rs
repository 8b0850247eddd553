//! Kernel init-data serialization
//!
//! Every kernel persists the minimal state needed to resume lookups (its
//! hyperparameters, or for the custom kernel its matrix) inside a versioned
//! JSON envelope. Feature collections are never written.

use crate::core::{KernelError, Result};
use crate::kernel::Kernel;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;

/// Current init-data layout version
pub const INIT_DATA_VERSION: u32 = 1;

/// Serializable envelope around a kernel-specific payload
#[derive(Serialize, Deserialize)]
pub struct InitData<P> {
    /// Layout version, checked on load
    pub format_version: u32,
    /// Name of the kernel that wrote the payload
    pub kernel: String,
    /// Creation timestamp
    pub created_at: String,
    /// Kernel-specific state
    pub payload: P,
}

/// Write `payload` for kernel `name` to `dest`
pub fn write_init<P: Serialize>(dest: &mut dyn Write, name: &str, payload: &P) -> Result<()> {
    let data = InitData {
        format_version: INIT_DATA_VERSION,
        kernel: name.to_string(),
        created_at: chrono::Utc::now().to_rfc3339(),
        payload,
    };
    serde_json::to_writer_pretty(&mut *dest, &data)
        .map_err(|e| KernelError::SerializationError(e.to_string()))?;
    dest.flush()?;
    Ok(())
}

/// Read a payload written by kernel `name` from `src`
///
/// The envelope is fully decoded and checked before the payload is handed
/// back, so callers can commit it atomically.
pub fn read_init<P: DeserializeOwned>(src: &mut dyn Read, name: &str) -> Result<P> {
    // Payload stays untyped until the envelope has been checked
    let data: InitData<serde_json::Value> = serde_json::from_reader(&mut *src)
        .map_err(|e| KernelError::SerializationError(e.to_string()))?;

    if data.format_version != INIT_DATA_VERSION {
        return Err(KernelError::FormatVersion {
            expected: INIT_DATA_VERSION,
            found: data.format_version,
        });
    }
    if data.kernel != name {
        return Err(KernelError::KernelMismatch {
            expected: name.to_string(),
            found: data.kernel,
        });
    }

    serde_json::from_value(data.payload).map_err(|e| KernelError::SerializationError(e.to_string()))
}

/// Save a kernel's init data to a file
pub fn save_init_to_file<K: Kernel + ?Sized, P: AsRef<Path>>(kernel: &K, path: P) -> Result<()> {
    let file = File::create(path)?;
    let mut writer = BufWriter::new(file);
    kernel.save_init(&mut writer)
}

/// Load a kernel's init data from a file
pub fn load_init_from_file<K: Kernel + ?Sized, P: AsRef<Path>>(
    kernel: &mut K,
    path: P,
) -> Result<()> {
    let file = File::open(path)?;
    let mut reader = BufReader::new(file);
    kernel.load_init(&mut reader)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[derive(Serialize, Deserialize, Debug, PartialEq)]
    struct Payload {
        width: f64,
    }

    #[test]
    fn test_envelope_round_trip() -> Result<()> {
        let mut buf = Vec::new();
        write_init(&mut buf, "SparseGaussian", &Payload { width: 2.5 })?;

        let payload: Payload = read_init(&mut Cursor::new(buf), "SparseGaussian")?;
        assert_eq!(payload, Payload { width: 2.5 });
        Ok(())
    }

    #[test]
    fn test_kernel_name_mismatch() {
        let mut buf = Vec::new();
        write_init(&mut buf, "SparseGaussian", &Payload { width: 1.0 }).unwrap();

        let result: Result<Payload> = read_init(&mut Cursor::new(buf), "Custom");
        assert!(matches!(result, Err(KernelError::KernelMismatch { .. })));
    }

    #[test]
    fn test_version_mismatch() {
        let doc = r#"{"format_version": 99, "kernel": "Custom", "created_at": "", "payload": {"width": 1.0}}"#;
        let result: Result<Payload> = read_init(&mut Cursor::new(doc), "Custom");
        assert!(matches!(
            result,
            Err(KernelError::FormatVersion { expected: 1, found: 99 })
        ));
    }

    #[test]
    fn test_garbage_input() {
        let result: Result<Payload> = read_init(&mut Cursor::new("not json"), "Custom");
        assert!(matches!(result, Err(KernelError::SerializationError(_))));
    }
}
