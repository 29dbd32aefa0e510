// src/error.rs
use std::io;
use std::path::PathBuf;

use thiserror::Error;

// Códigos de salida de las herramientas. Cada clase de fallo tiene el suyo.
pub const EXIT_USAGE: u8 = 1;
pub const EXIT_OPEN_IMAGE: u8 = 2;
pub const EXIT_METADATA_READ: u8 = 3;
pub const EXIT_BAD_FORMAT: u8 = 4;
pub const EXIT_NOT_FOUND: u8 = 5;
pub const EXIT_OUTPUT_WRITE: u8 = 6;
pub const EXIT_ALLOCATION: u8 = 7;
pub const EXIT_BLOCK_READ: u8 = 8;
pub const EXIT_CHECK_FAILED: u8 = 9;

/// Errores de formato: la imagen no es QFS o su geometría es inválida.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum FormatError {
    #[error("no es un sistema QFS válido (magic = {found:#04X})")]
    BadMagic { found: u8 },
    #[error("{what} truncado: se necesitan {needed} bytes, hay {actual}")]
    Truncated {
        what: &'static str,
        needed: usize,
        actual: usize,
    },
    #[error("bloques de {bytes_per_block} bytes no dejan espacio para datos (mínimo 4)")]
    BlockTooSmall { bytes_per_block: u16 },
}

/// Errores al recorrer una cadena de bloques.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ChainError {
    #[error("lectura incompleta del bloque {block} (offset {offset})")]
    ShortRead { block: u16, offset: u64 },
    #[error("el bloque {block} está fuera de rango (total_blocks = {total_blocks})")]
    OutOfRange { block: u16, total_blocks: u16 },
    #[error("cadena cíclica o demasiado larga: {visited} saltos con {total_blocks} bloques")]
    CycleOrOverrun { visited: u32, total_blocks: u16 },
}

#[derive(Debug, Error)]
pub enum QfsError {
    #[error("argumentos inválidos: {0}")]
    Usage(String),
    #[error("no se pudo abrir la imagen {path:?}")]
    OpenImage {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("la imagen mide {size} bytes, se necesitan al menos {needed}")]
    ImageTooSmall { size: u64, needed: u64 },
    #[error("no se pudo leer {what} de la imagen")]
    MetadataRead {
        what: &'static str,
        #[source]
        source: io::Error,
    },
    #[error(transparent)]
    Format(#[from] FormatError),
    #[error("el archivo '{name}' no existe en la imagen")]
    NotFound { name: String },
    #[error(transparent)]
    Chain(#[from] ChainError),
    #[error("error de E/S leyendo la imagen")]
    ImageIo(#[source] io::Error),
    #[error("error de E/S escribiendo la imagen")]
    ImageWrite(#[source] io::Error),
    #[error("no se pudo escribir {path:?}")]
    OutputWrite {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("no se pudo reservar un buffer de {bytes} bytes")]
    Allocation { bytes: usize },
}

impl QfsError {
    pub fn exit_code(&self) -> u8 {
        match self {
            QfsError::Usage(_) => EXIT_USAGE,
            QfsError::OpenImage { .. } | QfsError::ImageTooSmall { .. } => EXIT_OPEN_IMAGE,
            QfsError::MetadataRead { .. } => EXIT_METADATA_READ,
            QfsError::Format(FormatError::Truncated { .. }) => EXIT_METADATA_READ,
            QfsError::Format(_) => EXIT_BAD_FORMAT,
            QfsError::NotFound { .. } => EXIT_NOT_FOUND,
            QfsError::Chain(_) | QfsError::ImageIo(_) => EXIT_BLOCK_READ,
            QfsError::OutputWrite { .. } | QfsError::ImageWrite(_) => EXIT_OUTPUT_WRITE,
            QfsError::Allocation { .. } => EXIT_ALLOCATION,
        }
    }
}

/// Código de salida para un error que llega a `main` envuelto en `anyhow`.
pub fn exit_code_for(err: &anyhow::Error) -> u8 {
    match err.downcast_ref::<QfsError>() {
        Some(e) => e.exit_code(),
        None => EXIT_USAGE,
    }
}

/// Reserva un buffer vacío con capacidad exacta, sin abortar si no hay memoria.
pub(crate) fn alloc_buffer(bytes: usize) -> Result<Vec<u8>, QfsError> {
    let mut buf = Vec::new();
    buf.try_reserve_exact(bytes)
        .map_err(|_| QfsError::Allocation { bytes })?;
    Ok(buf)
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Context;

    fn io_err() -> io::Error {
        io::Error::new(io::ErrorKind::Other, "falla")
    }

    #[test]
    fn exit_codes_are_distinct_per_class() {
        let cases = [
            (QfsError::Usage("x".into()), EXIT_USAGE),
            (
                QfsError::OpenImage {
                    path: "disk.img".into(),
                    source: io_err(),
                },
                EXIT_OPEN_IMAGE,
            ),
            (QfsError::ImageTooSmall { size: 10, needed: 8192 }, EXIT_OPEN_IMAGE),
            (
                QfsError::MetadataRead {
                    what: "el superblock",
                    source: io_err(),
                },
                EXIT_METADATA_READ,
            ),
            (
                QfsError::Format(FormatError::Truncated {
                    what: "superblock",
                    needed: 32,
                    actual: 3,
                }),
                EXIT_METADATA_READ,
            ),
            (QfsError::Format(FormatError::BadMagic { found: 0 }), EXIT_BAD_FORMAT),
            (
                QfsError::Format(FormatError::BlockTooSmall { bytes_per_block: 3 }),
                EXIT_BAD_FORMAT,
            ),
            (QfsError::NotFound { name: "a".into() }, EXIT_NOT_FOUND),
            (
                QfsError::Chain(ChainError::OutOfRange {
                    block: 9,
                    total_blocks: 4,
                }),
                EXIT_BLOCK_READ,
            ),
            (
                QfsError::Chain(ChainError::ShortRead { block: 1, offset: 0 }),
                EXIT_BLOCK_READ,
            ),
            (
                QfsError::Chain(ChainError::CycleOrOverrun {
                    visited: 5,
                    total_blocks: 4,
                }),
                EXIT_BLOCK_READ,
            ),
            (QfsError::ImageIo(io_err()), EXIT_BLOCK_READ),
            (QfsError::ImageWrite(io_err()), EXIT_OUTPUT_WRITE),
            (
                QfsError::OutputWrite {
                    path: "out.bin".into(),
                    source: io_err(),
                },
                EXIT_OUTPUT_WRITE,
            ),
            (QfsError::Allocation { bytes: 1 << 40 }, EXIT_ALLOCATION),
        ];
        for (err, code) in &cases {
            assert_eq!(err.exit_code(), *code, "{err:?}");
        }

        let all = [
            EXIT_USAGE,
            EXIT_OPEN_IMAGE,
            EXIT_METADATA_READ,
            EXIT_BAD_FORMAT,
            EXIT_NOT_FOUND,
            EXIT_OUTPUT_WRITE,
            EXIT_ALLOCATION,
            EXIT_BLOCK_READ,
            EXIT_CHECK_FAILED,
        ];
        for (i, a) in all.iter().enumerate() {
            assert_ne!(*a, 0);
            for b in &all[i + 1..] {
                assert_ne!(a, b);
            }
        }
    }

    #[test]
    fn exit_code_survives_anyhow_context() {
        let res: Result<(), QfsError> = Err(QfsError::NotFound { name: "x".into() });
        let err = res.context("buscando x").unwrap_err();
        assert_eq!(exit_code_for(&err), EXIT_NOT_FOUND);

        let plain = anyhow::anyhow!("Uso: read_qfs <imagen> <archivo> <salida>");
        assert_eq!(exit_code_for(&plain), EXIT_USAGE);
    }
}
