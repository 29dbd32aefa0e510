//! Recuperación por firmas: busca spans `FF D8 .. FF D9` directamente en la
//! región de datos, sin usar la tabla de directorio.
use std::ops::Range;
use std::path::PathBuf;

use tracing::{debug, trace};

use crate::chain;
use crate::error::{alloc_buffer, ChainError, QfsError};
use crate::fs::{ImageSource, QfsImage, DATA_REGION_OFFSET};
use crate::output::write_atomically;

pub const JPEG_START: [u8; 2] = [0xFF, 0xD8];
pub const JPEG_END: [u8; 2] = [0xFF, 0xD9];

pub const DEFAULT_WINDOW: usize = 2_000_000;
pub const DEFAULT_MIN_LEN: usize = 1000;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum CarveMode {
    /// Concatena solo los datos útiles de cada bloque (sin marcador ni puntero).
    #[default]
    Stripped,
    /// Región de datos tal cual, con las cabeceras de bloque intercaladas.
    /// Puede producir falsos positivos que cruzan límites de bloque.
    Raw,
}

#[derive(Clone, Debug)]
pub struct CarveConfig {
    pub mode: CarveMode,
    pub start_marker: [u8; 2],
    pub end_marker: [u8; 2],
    /// Distancia máxima desde el inicio del span hasta el final del marcador de cierre.
    pub window: usize,
    pub min_len: usize,
    pub out_dir: PathBuf,
}

impl Default for CarveConfig {
    fn default() -> Self {
        Self {
            mode: CarveMode::Stripped,
            start_marker: JPEG_START,
            end_marker: JPEG_END,
            window: DEFAULT_WINDOW,
            min_len: DEFAULT_MIN_LEN,
            out_dir: PathBuf::from("."),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Recovered {
    pub index: usize,
    pub path: PathBuf,
    pub len: usize,
}

pub fn artifact_name(index: usize) -> String {
    format!("recovered_file_{index}.jpg")
}

/// Datos útiles de los bloques `0..total_blocks`, uno tras otro.
pub fn stripped_region<S: ImageSource>(image: &mut QfsImage<S>) -> Result<Vec<u8>, QfsError> {
    let geo = image.geometry();
    let bpb = geo.bytes_per_block() as usize;
    let mut out = alloc_buffer(geo.total_blocks() as usize * geo.payload_capacity())?;
    let mut block = alloc_buffer(bpb)?;
    block.resize(bpb, 0);

    for n in 0..geo.total_blocks() {
        let offset = geo.block_offset(n);
        let read = image
            .source_mut()
            .read_at(offset, &mut block)
            .map_err(QfsError::ImageIo)?;
        if read < bpb {
            return Err(ChainError::ShortRead { block: n, offset }.into());
        }
        out.extend_from_slice(chain::payload(&block));
    }
    Ok(out)
}

/// Todo lo que hay desde el inicio de la región de datos hasta el final de la imagen.
pub fn raw_region<S: ImageSource>(image: &mut QfsImage<S>) -> Result<Vec<u8>, QfsError> {
    let len = image.image_len()?.saturating_sub(DATA_REGION_OFFSET) as usize;
    let mut out = alloc_buffer(len)?;
    out.resize(len, 0);
    let read = image
        .source_mut()
        .read_at(DATA_REGION_OFFSET, &mut out)
        .map_err(QfsError::ImageIo)?;
    out.truncate(read);
    Ok(out)
}

fn starts_with_at(data: &[u8], at: usize, marker: &[u8; 2]) -> bool {
    data.get(at..at + 2) == Some(&marker[..])
}

/// Fin (exclusivo, incluye el marcador) del primer cierre dentro de la ventana.
fn find_end(data: &[u8], start: usize, cfg: &CarveConfig) -> Option<usize> {
    let limit = start.saturating_add(cfg.window).min(data.len());
    let from = start + 2;
    if from >= limit {
        return None;
    }
    data[from..limit]
        .windows(2)
        .position(|w| w == cfg.end_marker)
        .map(|pos| from + pos + 2)
}

/// Spans aceptados, en orden. Tras aceptar uno se sigue justo después de él;
/// si se rechaza, se avanza un byte.
pub fn find_spans(data: &[u8], cfg: &CarveConfig) -> Vec<Range<usize>> {
    let mut spans = Vec::new();
    let mut i = 0;

    while i + 1 < data.len() {
        if starts_with_at(data, i, &cfg.start_marker) {
            match find_end(data, i, cfg) {
                Some(end) if (cfg.min_len..=cfg.window).contains(&(end - i)) => {
                    debug!(start = i, end, len = end - i, "span aceptado");
                    spans.push(i..end);
                    i = end;
                    continue;
                }
                Some(end) => trace!(start = i, len = end - i, "span fuera de rango"),
                None => trace!(start = i, "sin marcador de cierre en la ventana"),
            }
        }
        i += 1;
    }

    spans
}

/// Escanea la imagen y guarda cada span aceptado como
/// `recovered_file_<n>.jpg` dentro de `cfg.out_dir`.
pub fn recover<S: ImageSource>(
    image: &mut QfsImage<S>,
    cfg: &CarveConfig,
) -> Result<Vec<Recovered>, QfsError> {
    let data = match cfg.mode {
        CarveMode::Stripped => stripped_region(image)?,
        CarveMode::Raw => raw_region(image)?,
    };
    debug!(mode = ?cfg.mode, len = data.len(), "región de datos cargada");

    let mut recovered = Vec::new();
    for (i, span) in find_spans(&data, cfg).into_iter().enumerate() {
        let index = i + 1;
        let path = cfg.out_dir.join(artifact_name(index));
        write_atomically(&path, &data[span.clone()])?;
        recovered.push(Recovered {
            index,
            path,
            len: span.len(),
        });
    }
    Ok(recovered)
}
