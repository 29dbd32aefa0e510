//! Cadenas de bloques: cada archivo es una lista enlazada de bloques físicos
//! dentro de la región de datos.
//!
//! Un bloque de `bytes_per_block` bytes se organiza así:
//!
//! ```text
//! [0]                      marcador libre/ocupado
//! [1 .. bpb-2)             datos (bpb - 3 bytes)
//! [bpb-2 .. bpb)           siguiente bloque, u16 little-endian
//! ```
use std::io::{Seek, SeekFrom, Write};

use tracing::{debug, trace};

use crate::error::{alloc_buffer, ChainError, FormatError, QfsError};
use crate::fs::{ImageSource, DATA_REGION_OFFSET};

/// Marcador que escribe el formateo en el primer byte de cada bloque.
/// La polaridad libre/ocupado no la interpreta ningún lector.
pub const FREE_MARKER: u8 = 0x00;

/// Byte de marcador + dos bytes de puntero.
pub const BLOCK_OVERHEAD: usize = 3;
pub const MIN_BLOCK_SIZE: u16 = 4;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Geometry {
    bytes_per_block: u16,
    total_blocks: u16,
}

impl Geometry {
    pub fn new(bytes_per_block: u16, total_blocks: u16) -> Result<Self, FormatError> {
        if bytes_per_block < MIN_BLOCK_SIZE {
            return Err(FormatError::BlockTooSmall { bytes_per_block });
        }
        Ok(Self {
            bytes_per_block,
            total_blocks,
        })
    }

    pub fn bytes_per_block(&self) -> u16 {
        self.bytes_per_block
    }

    pub fn total_blocks(&self) -> u16 {
        self.total_blocks
    }

    pub fn payload_capacity(&self) -> usize {
        self.bytes_per_block as usize - BLOCK_OVERHEAD
    }

    /// Offset absoluto del bloque dentro de la imagen.
    pub fn block_offset(&self, block: u16) -> u64 {
        DATA_REGION_OFFSET + block as u64 * self.bytes_per_block as u64
    }

    /// Bloques necesarios para guardar `len` bytes.
    pub fn blocks_for(&self, len: u64) -> u64 {
        len.div_ceil(self.payload_capacity() as u64)
    }
}

/// Puntero al siguiente bloque, en los dos últimos bytes.
pub fn next_pointer(block: &[u8]) -> u16 {
    let n = block.len();
    u16::from_le_bytes([block[n - 2], block[n - 1]])
}

/// Datos útiles del bloque, sin marcador ni puntero.
pub fn payload(block: &[u8]) -> &[u8] {
    &block[1..block.len() - 2]
}

/// Arma un bloque completo. Si `data` excede la capacidad se usan solo los
/// primeros `payload_capacity()` bytes; el resto del área de datos queda en cero.
pub fn encode_block(geo: Geometry, marker: u8, data: &[u8], next: u16) -> Vec<u8> {
    let bpb = geo.bytes_per_block as usize;
    let mut block = vec![0u8; bpb];
    block[0] = marker;
    let len = data.len().min(geo.payload_capacity());
    block[1..1 + len].copy_from_slice(&data[..len]);
    block[bpb - 2..].copy_from_slice(&next.to_le_bytes());
    block
}

/// Lee el bloque `block` completo en `buf`.
fn read_block<S: ImageSource>(
    source: &mut S,
    geo: Geometry,
    block: u16,
    buf: &mut [u8],
) -> Result<(), QfsError> {
    if block >= geo.total_blocks {
        return Err(ChainError::OutOfRange {
            block,
            total_blocks: geo.total_blocks,
        }
        .into());
    }
    let offset = geo.block_offset(block);
    let n = source.read_at(offset, buf).map_err(QfsError::ImageIo)?;
    if n < buf.len() {
        return Err(ChainError::ShortRead { block, offset }.into());
    }
    Ok(())
}

/// Recorre la cadena que empieza en `start` hasta entregar `total_length`
/// bytes. `visit` recibe el número de bloque y su porción de datos útil.
///
/// El número de saltos está acotado por `total_blocks`, así que una cadena
/// cíclica o corrupta termina con `ChainError::CycleOrOverrun`.
pub fn walk_chain<S, F>(
    source: &mut S,
    geo: Geometry,
    start: u16,
    total_length: u64,
    mut visit: F,
) -> Result<(), QfsError>
where
    S: ImageSource,
    F: FnMut(u16, &[u8]) -> Result<(), QfsError>,
{
    let capacity = geo.payload_capacity() as u64;
    let mut remaining = total_length;
    let mut block = start;
    let mut visited: u32 = 0;
    let mut buf = Vec::new();

    while remaining > 0 {
        if buf.is_empty() {
            buf = alloc_buffer(geo.bytes_per_block as usize)?;
            buf.resize(geo.bytes_per_block as usize, 0);
        }
        read_block(source, geo, block, &mut buf)?;

        let take = remaining.min(capacity) as usize;
        trace!(block, take, remaining, "bloque leído");
        visit(block, &payload(&buf)[..take])?;
        remaining -= take as u64;

        if remaining > 0 {
            block = next_pointer(&buf);
            visited += 1;
            if visited > geo.total_blocks as u32 {
                return Err(ChainError::CycleOrOverrun {
                    visited,
                    total_blocks: geo.total_blocks,
                }
                .into());
            }
        }
    }

    Ok(())
}

/// Máximo de bytes que entrega una cadena antes de que `walk_chain` la corte.
pub fn max_chain_bytes(geo: Geometry) -> u64 {
    (geo.total_blocks as u64 + 1) * geo.payload_capacity() as u64
}

/// Reconstruye los `total_length` bytes de la cadena que empieza en `start`.
/// Un largo cero devuelve un buffer vacío sin tocar la imagen.
pub fn read_chain<S: ImageSource>(
    source: &mut S,
    geo: Geometry,
    start: u16,
    total_length: u64,
) -> Result<Vec<u8>, QfsError> {
    // El tamaño viene del directorio y puede ser basura: no se reserva más de
    // lo que la cadena podría entregar antes del límite de saltos.
    let reserve = total_length.min(max_chain_bytes(geo));
    let reserve = usize::try_from(reserve).map_err(|_| QfsError::Allocation {
        bytes: usize::MAX,
    })?;
    let mut out = alloc_buffer(reserve)?;
    walk_chain(source, geo, start, total_length, |_, data| {
        out.extend_from_slice(data);
        Ok(())
    })?;
    debug!(start, len = out.len(), "cadena leída");
    Ok(out)
}

/// Números de bloque que recorre la cadena, en orden.
pub fn chain_blocks<S: ImageSource>(
    source: &mut S,
    geo: Geometry,
    start: u16,
    total_length: u64,
) -> Result<Vec<u16>, QfsError> {
    let mut blocks = Vec::new();
    walk_chain(source, geo, start, total_length, |block, _| {
        blocks.push(block);
        Ok(())
    })?;
    Ok(blocks)
}

/// Escribe el marcador libre en el primer byte de cada bloque. El resto del
/// bloque no se toca.
pub fn write_free_markers<D: Write + Seek>(dev: &mut D, geo: Geometry) -> Result<(), QfsError> {
    for block in 0..geo.total_blocks {
        dev.seek(SeekFrom::Start(geo.block_offset(block)))
            .map_err(QfsError::ImageWrite)?;
        dev.write_all(&[FREE_MARKER])
            .map_err(QfsError::ImageWrite)?;
    }
    debug!(total_blocks = geo.total_blocks, "marcadores de bloque inicializados");
    Ok(())
}

/// Coloca `data` en los bloques `blocks`, en ese orden, enlazando cada uno
/// con el siguiente. El último bloque apunta a 0.
pub fn write_chain<D: Write + Seek>(
    dev: &mut D,
    geo: Geometry,
    marker: u8,
    blocks: &[u16],
    data: &[u8],
) -> Result<(), QfsError> {
    let needed = geo.blocks_for(data.len() as u64);
    if needed != blocks.len() as u64 {
        return Err(QfsError::Usage(format!(
            "{} bytes requieren {} bloques, se dieron {}",
            data.len(),
            needed,
            blocks.len()
        )));
    }

    let chunks = data.chunks(geo.payload_capacity());
    for (i, (chunk, &block)) in chunks.zip(blocks).enumerate() {
        if block >= geo.total_blocks {
            return Err(ChainError::OutOfRange {
                block,
                total_blocks: geo.total_blocks,
            }
            .into());
        }
        let next = blocks.get(i + 1).copied().unwrap_or(0);
        dev.seek(SeekFrom::Start(geo.block_offset(block)))
            .map_err(QfsError::ImageWrite)?;
        dev.write_all(&encode_block(geo, marker, chunk, next))
            .map_err(QfsError::ImageWrite)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn blank_image(geo: Geometry) -> Cursor<Vec<u8>> {
        let len = geo.block_offset(geo.total_blocks) as usize;
        Cursor::new(vec![0xEEu8; len])
    }

    fn pattern(len: usize) -> Vec<u8> {
        (0..len).map(|i| (i * 31 % 251) as u8).collect()
    }

    #[test]
    fn geometry_rejects_blocks_without_payload() {
        assert_eq!(
            Geometry::new(3, 10),
            Err(FormatError::BlockTooSmall { bytes_per_block: 3 })
        );
        assert_eq!(Geometry::new(4, 10).unwrap().payload_capacity(), 1);
    }

    #[test]
    fn block_offsets_start_after_directory() {
        let geo = Geometry::new(512, 100).unwrap();
        assert_eq!(geo.block_offset(0), 8192);
        assert_eq!(geo.block_offset(3), 8192 + 3 * 512);
    }

    #[test]
    fn encoded_block_layout() {
        let geo = Geometry::new(8, 4).unwrap();
        let block = encode_block(geo, 1, b"abc", 0x0302);
        assert_eq!(block, vec![1, b'a', b'b', b'c', 0, 0, 0x02, 0x03]);
        assert_eq!(payload(&block), b"abc\0\0");
        assert_eq!(next_pointer(&block), 0x0302);
    }

    #[test]
    fn zero_length_reads_nothing() {
        // Ni siquiera hay región de datos: si se leyera algo fallaría.
        let geo = Geometry::new(512, 10).unwrap();
        let mut empty = Cursor::new(Vec::<u8>::new());
        assert!(read_chain(&mut empty, geo, 9, 0).unwrap().is_empty());
    }

    #[test]
    fn round_trip_one_two_and_many_blocks() {
        let geo = Geometry::new(16, 40).unwrap();
        let cap = geo.payload_capacity();

        for (len, blocks) in [
            (1usize, vec![5u16]),
            (cap, vec![0]),
            (cap + 1, vec![7, 2]),
            (2 * cap, vec![39, 0]),
            (10 * cap - 4, vec![3, 9, 1, 30, 4, 5, 22, 6, 11, 8]),
        ] {
            let data = pattern(len);
            let mut image = blank_image(geo);
            write_chain(&mut image, geo, 1, &blocks, &data).unwrap();

            let back = read_chain(&mut image, geo, blocks[0], len as u64).unwrap();
            assert_eq!(back, data, "len = {len}");
            assert_eq!(
                chain_blocks(&mut image, geo, blocks[0], len as u64).unwrap(),
                blocks
            );
        }
    }

    #[test]
    fn over_long_length_hits_out_of_range_pointer() {
        let geo = Geometry::new(16, 8).unwrap();
        let mut image = blank_image(geo);
        let data = pattern(2 * geo.payload_capacity());
        write_chain(&mut image, geo, 1, &[1, 2], &data).unwrap();

        // El último bloque apunta a 0; lo corrompemos para que apunte fuera.
        let tail = geo.block_offset(2) as usize + 14;
        image.get_mut()[tail..tail + 2].copy_from_slice(&500u16.to_le_bytes());

        let err = read_chain(&mut image, geo, 1, data.len() as u64 + 1).unwrap_err();
        assert!(matches!(
            err,
            QfsError::Chain(ChainError::OutOfRange { block: 500, .. })
        ));
    }

    #[test]
    fn cyclic_chain_is_bounded() {
        let geo = Geometry::new(8, 3).unwrap();
        let mut image = blank_image(geo);
        // 0 -> 1 -> 0 -> 1 ...
        for (block, next) in [(0u16, 1u16), (1, 0)] {
            let bytes = encode_block(geo, 1, b"xxxxx", next);
            let off = geo.block_offset(block) as usize;
            image.get_mut()[off..off + 8].copy_from_slice(&bytes);
        }

        let err = read_chain(&mut image, geo, 0, 1_000).unwrap_err();
        assert!(matches!(
            err,
            QfsError::Chain(ChainError::CycleOrOverrun {
                visited: 4,
                total_blocks: 3
            })
        ));
    }

    #[test]
    fn corrupt_size_fails_as_chain_error_not_allocation() {
        let geo = Geometry::new(512, 4).unwrap();
        // Todos los punteros valen 0: el bloque 0 apunta a sí mismo.
        let mut image = Cursor::new(vec![0u8; geo.block_offset(4) as usize]);

        assert_eq!(max_chain_bytes(geo), 5 * 509);
        let err = read_chain(&mut image, geo, 0, u32::MAX as u64).unwrap_err();
        assert!(matches!(
            err,
            QfsError::Chain(ChainError::CycleOrOverrun {
                visited: 5,
                total_blocks: 4
            })
        ));
    }

    #[test]
    fn length_at_chain_limit_still_reads() {
        let geo = Geometry::new(8, 2).unwrap();
        let mut image = blank_image(geo);
        let data = pattern(2 * geo.payload_capacity());
        write_chain(&mut image, geo, 1, &[1, 0], &data).unwrap();
        assert!(data.len() as u64 <= max_chain_bytes(geo));
        assert_eq!(read_chain(&mut image, geo, 1, data.len() as u64).unwrap(), data);
    }

    #[test]
    fn truncated_image_is_a_short_read() {
        let geo = Geometry::new(16, 4).unwrap();
        let mut image = blank_image(geo);
        image.get_mut().truncate(geo.block_offset(3) as usize + 5);

        let err = read_chain(&mut image, geo, 3, 4).unwrap_err();
        assert!(matches!(
            err,
            QfsError::Chain(ChainError::ShortRead { block: 3, offset: 8240 })
        ));
    }

    #[test]
    fn free_markers_touch_only_first_byte() {
        let geo = Geometry::new(8, 3).unwrap();
        let mut image = blank_image(geo);
        write_free_markers(&mut image, geo).unwrap();

        let bytes = image.into_inner();
        for block in 0..3u16 {
            let off = geo.block_offset(block) as usize;
            assert_eq!(bytes[off], FREE_MARKER);
            assert!(bytes[off + 1..off + 8].iter().all(|&b| b == 0xEE));
        }
        assert!(bytes[..8192].iter().all(|&b| b == 0xEE));
    }

    #[test]
    fn write_chain_rejects_wrong_block_count() {
        let geo = Geometry::new(8, 3).unwrap();
        let mut image = blank_image(geo);
        let err = write_chain(&mut image, geo, 1, &[0], &pattern(6)).unwrap_err();
        assert!(matches!(err, QfsError::Usage(_)));
    }
}
