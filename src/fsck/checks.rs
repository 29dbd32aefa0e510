/*Validaciones de fsck sobre una imagen QFS: superblock, tabla de
directorio y cadenas de bloques. Solo lee; nunca modifica la imagen. */
use std::collections::HashMap;

use tracing::debug;

use super::fsck_types::FsckReport;
use crate::chain;
use crate::dir::DirectoryTable;
use crate::error::QfsError;
use crate::fs::{ImageSource, QfsImage, Superblock, DATA_REGION_OFFSET, DIRENTRY_COUNT};

fn check_superblock(sb: &Superblock, image_len: u64, report: &mut FsckReport) {
    // 1. Contadores de bloques
    if sb.available_blocks > sb.total_blocks {
        report.errors.push(format!(
            "Superblock: available_blocks ({}) > total_blocks ({})",
            sb.available_blocks, sb.total_blocks
        ));
        report.superblock_ok = false;
    }

    // 2. Contadores de entradas
    if sb.available_direntries > sb.total_direntries {
        report.errors.push(format!(
            "Superblock: available_direntries ({}) > total_direntries ({})",
            sb.available_direntries, sb.total_direntries
        ));
        report.superblock_ok = false;
    }

    if sb.total_direntries as usize != DIRENTRY_COUNT {
        report.errors.push(format!(
            "Superblock: total_direntries = {}, se esperaban {}",
            sb.total_direntries, DIRENTRY_COUNT
        ));
        report.superblock_ok = false;
    }

    // 3. Bytes reservados
    if sb.reserved.iter().any(|&b| b != 0) {
        report
            .warnings
            .push("Superblock: los bytes reservados no están en cero".into());
    }

    // 4. La imagen debe contener todos los bloques que declara
    let needed = DATA_REGION_OFFSET + sb.data_region_len();
    if image_len < needed {
        report.errors.push(format!(
            "Superblock: declara {} bloques de {} bytes ({} bytes), la imagen mide {}",
            sb.total_blocks, sb.bytes_per_block, needed, image_len
        ));
        report.superblock_ok = false;
        report.blocks_ok = false;
    }
}

fn check_directory(sb: &Superblock, table: &DirectoryTable, report: &mut FsckReport) {
    let used = table.used().count();
    let free = DIRENTRY_COUNT - used;

    if free != sb.available_direntries as usize {
        report.warnings.push(format!(
            "Directorio: hay {} entradas libres pero el superblock dice {}",
            free, sb.available_direntries
        ));
    }

    let mut first_slot: HashMap<&[u8], usize> = HashMap::new();
    for (slot, entry) in table.used() {
        if !entry.is_terminated() {
            report.errors.push(format!(
                "Entrada {}: el nombre no termina en nul",
                slot
            ));
            report.entries_ok = false;
        }

        if let Some(first) = first_slot.get(entry.name_bytes()) {
            report.warnings.push(format!(
                "Entrada {}: nombre '{}' repetido (la búsqueda usa la entrada {})",
                slot,
                entry.name(),
                first
            ));
        } else {
            first_slot.insert(entry.name_bytes(), slot);
        }
    }
}

fn check_chains<S: ImageSource>(
    image: &mut QfsImage<S>,
    table: &DirectoryTable,
    report: &mut FsckReport,
) -> Result<(), QfsError> {
    let geo = image.geometry();
    // bloque -> entrada que lo usa
    let mut owner: HashMap<u16, usize> = HashMap::new();

    for (slot, entry) in table.used() {
        report.files_checked += 1;

        let blocks = match chain::chain_blocks(
            image.source_mut(),
            geo,
            entry.starting_block,
            entry.file_size as u64,
        ) {
            Ok(blocks) => blocks,
            Err(QfsError::Chain(e)) => {
                report.errors.push(format!(
                    "Entrada {} ('{}'): {}",
                    slot,
                    entry.name(),
                    e
                ));
                report.blocks_ok = false;
                continue;
            }
            Err(e) => return Err(e),
        };

        for block in blocks {
            if let Some(&other) = owner.get(&block) {
                report.errors.push(format!(
                    "Bloque {} compartido por las entradas {} y {} ('{}')",
                    block,
                    other,
                    slot,
                    entry.name()
                ));
                report.blocks_ok = false;
            } else {
                owner.insert(block, slot);
            }
        }
    }

    debug!(blocks_in_use = owner.len(), "cadenas verificadas");
    Ok(())
}

/// Revisa la imagen completa. Los problemas de consistencia quedan en el
/// reporte; solo los fallos de E/S abortan la revisión.
pub fn run_fsck<S: ImageSource>(image: &mut QfsImage<S>) -> Result<FsckReport, QfsError> {
    let mut report = FsckReport::new();
    let sb = *image.superblock();

    // --- Paso 1: superblock ---
    let image_len = image.image_len()?;
    check_superblock(&sb, image_len, &mut report);

    // --- Paso 2: tabla de directorio ---
    let table = image.directory()?;
    check_directory(&sb, &table, &mut report);

    // --- Paso 3: cadenas de cada archivo ---
    check_chains(image, &table, &mut report)?;

    Ok(report)
}
