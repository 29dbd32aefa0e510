use std::io::Write;
use std::path::Path;

use tempfile::NamedTempFile;

use crate::error::QfsError;

/// Escribe `bytes` en `dest` de forma atómica: primero en un temporal del
/// mismo directorio y luego se renombra. Si algo falla, `dest` no cambia y
/// el temporal se borra al soltarse.
pub fn write_atomically(dest: &Path, bytes: &[u8]) -> Result<(), QfsError> {
    let write_err = |source| QfsError::OutputWrite {
        path: dest.to_path_buf(),
        source,
    };

    let dir = match dest.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };

    let mut tmp = NamedTempFile::new_in(dir).map_err(write_err)?;
    tmp.write_all(bytes).map_err(write_err)?;
    tmp.as_file().sync_all().map_err(write_err)?;
    tmp.persist(dest).map_err(|e| write_err(e.error))?;
    Ok(())
}
