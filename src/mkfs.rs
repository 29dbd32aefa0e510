// src/mkfs.rs
use std::fs::OpenOptions;
use std::io::{Seek, SeekFrom, Write};
use std::path::Path;

use tracing::{debug, warn};

use crate::chain::{self, Geometry};
use crate::dir::DirectoryTable;
use crate::error::QfsError;
use crate::fs::{Superblock, DATA_REGION_OFFSET};

const MIB: u64 = 1024 * 1024;

/// Umbrales de tamaño de bloque. Son una política fija del formato, no
/// dependen del hardware:
/// - datos ≤ 30 MiB: 512 bytes por bloque
/// - datos ≤ 60 MiB: 1024 bytes por bloque
/// - resto: 2048 bytes por bloque
pub const SMALL_DATA_LIMIT: u64 = 30 * MIB;
pub const MEDIUM_DATA_LIMIT: u64 = 60 * MIB;

pub fn select_block_size(usable: u64) -> u16 {
    if usable <= SMALL_DATA_LIMIT {
        512
    } else if usable <= MEDIUM_DATA_LIMIT {
        1024
    } else {
        2048
    }
}

/// Layout calculado para un contenedor de cierto tamaño.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FsLayout {
    pub bytes_per_block: u16,
    pub total_blocks: u16,
    /// Bytes al final del contenedor que ningún bloque direcciona.
    pub unaddressed: u64,
}

pub fn build_layout(host_size: u64) -> Result<FsLayout, QfsError> {
    let usable = host_size
        .checked_sub(DATA_REGION_OFFSET)
        .ok_or(QfsError::ImageTooSmall {
            size: host_size,
            needed: DATA_REGION_OFFSET,
        })?;

    let bytes_per_block = select_block_size(usable);
    let wanted = usable / bytes_per_block as u64;

    // total_blocks ocupa 16 bits en el superblock.
    let total_blocks = if wanted > u16::MAX as u64 {
        warn!(
            wanted,
            max = u16::MAX,
            "el contenedor direcciona más bloques de los que caben en el superblock"
        );
        u16::MAX
    } else {
        wanted as u16
    };

    let unaddressed = usable - total_blocks as u64 * bytes_per_block as u64;
    Ok(FsLayout {
        bytes_per_block,
        total_blocks,
        unaddressed,
    })
}

/// Formatea un contenedor ya dimensionado: superblock, directorio vacío y
/// marcador libre al inicio de cada bloque.
pub fn format_device<D: Write + Seek>(
    dev: &mut D,
    label: Option<&str>,
) -> Result<Superblock, QfsError> {
    let host_size = dev.seek(SeekFrom::End(0)).map_err(QfsError::ImageIo)?;
    let layout = build_layout(host_size)?;
    debug!(
        host_size,
        bytes_per_block = layout.bytes_per_block,
        total_blocks = layout.total_blocks,
        unaddressed = layout.unaddressed,
        "layout calculado"
    );

    let superblock = Superblock::fresh(layout.bytes_per_block, layout.total_blocks, label);
    let geo = Geometry::new(layout.bytes_per_block, layout.total_blocks)?;

    dev.seek(SeekFrom::Start(0)).map_err(QfsError::ImageWrite)?;
    dev.write_all(&superblock.encode())
        .map_err(QfsError::ImageWrite)?;
    dev.write_all(&DirectoryTable::encode_empty())
        .map_err(QfsError::ImageWrite)?;

    chain::write_free_markers(dev, geo)?;
    dev.flush().map_err(QfsError::ImageWrite)?;

    Ok(superblock)
}

/// Abre `path` en lectura/escritura (sin crearlo) y lo formatea.
pub fn format_path(path: &Path, label: Option<&str>) -> Result<Superblock, QfsError> {
    let mut file = OpenOptions::new()
        .read(true)
        .write(true)
        .open(path)
        .map_err(|source| QfsError::OpenImage {
            path: path.to_path_buf(),
            source,
        })?;

    let superblock = format_device(&mut file, label)?;
    file.sync_all().map_err(QfsError::ImageWrite)?;
    Ok(superblock)
}
