// src/extract.rs
use std::path::Path;

use tracing::debug;

use crate::error::QfsError;
use crate::fs::{ImageSource, QfsImage};
use crate::output::write_atomically;

/// Busca `name` en el directorio y devuelve su contenido completo.
pub fn extract<S: ImageSource>(image: &mut QfsImage<S>, name: &str) -> Result<Vec<u8>, QfsError> {
    let table = image.directory()?;
    let (slot, entry) = table.find_by_name(name)?;
    debug!(
        name,
        slot,
        size = entry.file_size,
        starting_block = entry.starting_block,
        "archivo encontrado"
    );
    image.read_file(entry)
}

/// Extrae `name` de la imagen en `image_path` hacia `dest`. El destino solo
/// se crea o reemplaza si la cadena completa se leyó bien.
pub fn extract_to_path(image_path: &Path, name: &str, dest: &Path) -> Result<u64, QfsError> {
    let mut image = QfsImage::open(image_path)?;
    let data = extract(&mut image, name)?;
    write_atomically(dest, &data)?;
    Ok(data.len() as u64)
}
