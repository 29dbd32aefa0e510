use std::fs::File;
use std::io::{self, ErrorKind, Read, Seek, SeekFrom};
use std::path::Path;

use tracing::debug;

use crate::chain::{self, Geometry};
use crate::dir::{DirEntry, DirectoryTable};
use crate::error::{FormatError, QfsError};

// -----------------------------------------------------------------------------
// Constantes de layout de QFS
// -----------------------------------------------------------------------------

pub const QFS_MAGIC: u8 = 0x51;

pub const RESERVED_LEN: usize = 8;
pub const LABEL_LEN: usize = 15;
pub const NAME_LEN: usize = 23;

/// magic(1) + total_blocks(2) + available_blocks(2) + bytes_per_block(2)
/// + total_direntries(1) + available_direntries(1) + reserved + label.
pub const SUPERBLOCK_SIZE: usize = 1 + 2 + 2 + 2 + 1 + 1 + RESERVED_LEN + LABEL_LEN;

/// filename + permissions(1) + owner_id(1) + group_id(1)
/// + starting_block(2) + file_size(4).
pub const DIRENTRY_SIZE: usize = NAME_LEN + 1 + 1 + 1 + 2 + 4;

pub const DIRENTRY_COUNT: usize = 255;
pub const DIRECTORY_REGION_SIZE: usize = DIRENTRY_SIZE * DIRENTRY_COUNT;
pub const DATA_REGION_OFFSET: u64 = (SUPERBLOCK_SIZE + DIRECTORY_REGION_SIZE) as u64;

const _: () = assert!(SUPERBLOCK_SIZE == 32);
const _: () = assert!(DIRENTRY_SIZE == 32);
const _: () = assert!(DATA_REGION_OFFSET == 8192);

// -------------------- Superblock en disco --------------------

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Superblock {
    pub fs_type: u8,
    pub total_blocks: u16,
    pub available_blocks: u16,
    pub bytes_per_block: u16,
    pub total_direntries: u8,
    pub available_direntries: u8,
    pub reserved: [u8; RESERVED_LEN],
    pub label: [u8; LABEL_LEN],
}

impl Superblock {
    /// Superblock de una imagen recién formateada: todo libre, 255 entradas.
    pub fn fresh(bytes_per_block: u16, total_blocks: u16, label: Option<&str>) -> Self {
        let mut sb = Self {
            fs_type: QFS_MAGIC,
            total_blocks,
            available_blocks: total_blocks,
            bytes_per_block,
            total_direntries: DIRENTRY_COUNT as u8,
            available_direntries: DIRENTRY_COUNT as u8,
            reserved: [0u8; RESERVED_LEN],
            label: [0u8; LABEL_LEN],
        };
        if let Some(label) = label {
            sb.set_label(label);
        }
        sb
    }

    pub fn decode(bytes: &[u8]) -> Result<Self, FormatError> {
        if bytes.len() < SUPERBLOCK_SIZE {
            return Err(FormatError::Truncated {
                what: "superblock",
                needed: SUPERBLOCK_SIZE,
                actual: bytes.len(),
            });
        }
        if bytes[0] != QFS_MAGIC {
            return Err(FormatError::BadMagic { found: bytes[0] });
        }

        let mut reserved = [0u8; RESERVED_LEN];
        reserved.copy_from_slice(&bytes[9..9 + RESERVED_LEN]);
        let mut label = [0u8; LABEL_LEN];
        label.copy_from_slice(&bytes[17..17 + LABEL_LEN]);

        Ok(Self {
            fs_type: bytes[0],
            total_blocks: u16::from_le_bytes([bytes[1], bytes[2]]),
            available_blocks: u16::from_le_bytes([bytes[3], bytes[4]]),
            bytes_per_block: u16::from_le_bytes([bytes[5], bytes[6]]),
            total_direntries: bytes[7],
            available_direntries: bytes[8],
            reserved,
            label,
        })
    }

    pub fn encode(&self) -> [u8; SUPERBLOCK_SIZE] {
        let mut buf = [0u8; SUPERBLOCK_SIZE];
        buf[0] = self.fs_type;
        buf[1..3].copy_from_slice(&self.total_blocks.to_le_bytes());
        buf[3..5].copy_from_slice(&self.available_blocks.to_le_bytes());
        buf[5..7].copy_from_slice(&self.bytes_per_block.to_le_bytes());
        buf[7] = self.total_direntries;
        buf[8] = self.available_direntries;
        buf[9..17].copy_from_slice(&self.reserved);
        buf[17..32].copy_from_slice(&self.label);
        // El label siempre termina en nul, aunque venga mal formado.
        buf[SUPERBLOCK_SIZE - 1] = 0;
        buf
    }

    /// Copia el label truncándolo a LABEL_LEN - 1 bytes más el terminador.
    pub fn set_label(&mut self, label: &str) {
        self.label = [0u8; LABEL_LEN];
        let bytes = label.as_bytes();
        let len = bytes.len().min(LABEL_LEN - 1);
        self.label[..len].copy_from_slice(&bytes[..len]);
    }

    pub fn label(&self) -> String {
        let end = self.label.iter().position(|&b| b == 0).unwrap_or(LABEL_LEN);
        String::from_utf8_lossy(&self.label[..end]).into_owned()
    }

    pub fn geometry(&self) -> Result<Geometry, FormatError> {
        Geometry::new(self.bytes_per_block, self.total_blocks)
    }

    /// Bytes que ocupa la región de datos direccionable.
    pub fn data_region_len(&self) -> u64 {
        self.total_blocks as u64 * self.bytes_per_block as u64
    }
}

// -----------------------------------------------------------------------------
// Fuente de bytes de una imagen
// -----------------------------------------------------------------------------

/// Acceso posicional a los bytes de una imagen QFS.
pub trait ImageSource {
    /// Lee desde `offset` hasta llenar `buf` o llegar al final de la imagen.
    /// Devuelve cuántos bytes se leyeron.
    fn read_at(&mut self, offset: u64, buf: &mut [u8]) -> io::Result<usize>;

    fn image_len(&mut self) -> io::Result<u64>;
}

impl<T: Read + Seek> ImageSource for T {
    fn read_at(&mut self, offset: u64, buf: &mut [u8]) -> io::Result<usize> {
        self.seek(SeekFrom::Start(offset))?;
        let mut filled = 0;
        while filled < buf.len() {
            match self.read(&mut buf[filled..]) {
                Ok(0) => break,
                Ok(n) => filled += n,
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => return Err(e),
            }
        }
        Ok(filled)
    }

    fn image_len(&mut self) -> io::Result<u64> {
        self.seek(SeekFrom::End(0))
    }
}

// -----------------------------------------------------------------------------
// Imagen abierta
// -----------------------------------------------------------------------------

pub struct QfsImage<S> {
    source: S,
    superblock: Superblock,
    geometry: Geometry,
}

impl QfsImage<File> {
    /// Abre una imagen en solo lectura y valida su superblock.
    pub fn open(path: &Path) -> Result<Self, QfsError> {
        let file = File::open(path).map_err(|source| QfsError::OpenImage {
            path: path.to_path_buf(),
            source,
        })?;
        // Abrir un directorio funciona en Linux; se rechaza aquí y no al leer.
        let is_file = file
            .metadata()
            .map_err(|source| QfsError::OpenImage {
                path: path.to_path_buf(),
                source,
            })?
            .is_file();
        if !is_file {
            return Err(QfsError::OpenImage {
                path: path.to_path_buf(),
                source: io::Error::new(ErrorKind::InvalidInput, "no es un archivo regular"),
            });
        }
        debug!(path = %path.display(), "imagen abierta");
        Self::from_source(file)
    }
}

impl<S: ImageSource> QfsImage<S> {
    /// Lee el superblock (bytes 0..32), valida el magic y la geometría.
    pub fn from_source(mut source: S) -> Result<Self, QfsError> {
        let mut buf = [0u8; SUPERBLOCK_SIZE];
        let n = source
            .read_at(0, &mut buf)
            .map_err(|source| QfsError::MetadataRead {
                what: "el superblock",
                source,
            })?;

        let superblock = Superblock::decode(&buf[..n])?;
        let geometry = superblock.geometry()?;

        debug!(
            bytes_per_block = superblock.bytes_per_block,
            total_blocks = superblock.total_blocks,
            "superblock válido"
        );

        Ok(Self {
            source,
            superblock,
            geometry,
        })
    }

    pub fn superblock(&self) -> &Superblock {
        &self.superblock
    }

    pub fn geometry(&self) -> Geometry {
        self.geometry
    }

    /// Lee y decodifica las 255 entradas que siguen al superblock.
    pub fn directory(&mut self) -> Result<DirectoryTable, QfsError> {
        let mut buf = vec![0u8; DIRECTORY_REGION_SIZE];
        let n = self
            .source
            .read_at(SUPERBLOCK_SIZE as u64, &mut buf)
            .map_err(|source| QfsError::MetadataRead {
                what: "la tabla de directorio",
                source,
            })?;
        Ok(DirectoryTable::decode_all(&buf[..n])?)
    }

    /// Contenido completo del archivo descrito por `entry`.
    pub fn read_file(&mut self, entry: &DirEntry) -> Result<Vec<u8>, QfsError> {
        chain::read_chain(
            &mut self.source,
            self.geometry,
            entry.starting_block,
            entry.file_size as u64,
        )
    }

    pub fn image_len(&mut self) -> Result<u64, QfsError> {
        self.source.image_len().map_err(QfsError::ImageIo)
    }

    pub fn source_mut(&mut self) -> &mut S {
        &mut self.source
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn layout_offsets_match_struct_sizes() {
        assert_eq!(DIRECTORY_REGION_SIZE, 8160);
        assert_eq!(DATA_REGION_OFFSET, 8192);
    }

    #[test]
    fn superblock_fields_land_at_fixed_offsets() {
        let sb = Superblock::fresh(512, 8176, Some("TestVol"));
        let bytes = sb.encode();

        assert_eq!(bytes[0], 0x51);
        assert_eq!(&bytes[1..3], &8176u16.to_le_bytes());
        assert_eq!(&bytes[3..5], &8176u16.to_le_bytes());
        assert_eq!(&bytes[5..7], &512u16.to_le_bytes());
        assert_eq!(bytes[7], 255);
        assert_eq!(bytes[8], 255);
        assert!(bytes[9..17].iter().all(|&b| b == 0));
        assert_eq!(&bytes[17..24], b"TestVol");
        assert_eq!(bytes[24], 0);

        let back = Superblock::decode(&bytes).unwrap();
        assert_eq!(back, sb);
        assert_eq!(back.label(), "TestVol");
    }

    #[test]
    fn decode_rejects_bad_magic_whatever_the_rest() {
        let mut bytes = Superblock::fresh(512, 10, Some("x")).encode();
        for magic in [0x00u8, 0x50, 0x52, 0xFF] {
            bytes[0] = magic;
            assert_eq!(
                Superblock::decode(&bytes),
                Err(FormatError::BadMagic { found: magic })
            );
        }
    }

    #[test]
    fn decode_rejects_short_buffer() {
        let bytes = Superblock::fresh(512, 10, None).encode();
        let err = Superblock::decode(&bytes[..31]).unwrap_err();
        assert_eq!(
            err,
            FormatError::Truncated {
                what: "superblock",
                needed: 32,
                actual: 31
            }
        );
    }

    #[test]
    fn long_label_is_truncated_and_terminated() {
        let sb = Superblock::fresh(512, 1, Some("una-etiqueta-muy-larga"));
        assert_eq!(sb.label(), "una-etiqueta-m");
        assert_eq!(sb.encode()[31], 0);
    }

    #[test]
    fn empty_label_reads_back_empty() {
        let sb = Superblock::fresh(1024, 3, None);
        assert_eq!(sb.label(), "");
    }

    #[test]
    fn open_rejects_tiny_block_size() {
        let mut sb = Superblock::fresh(512, 4, None);
        sb.bytes_per_block = 3;
        let mut image = sb.encode().to_vec();
        image.resize(DATA_REGION_OFFSET as usize, 0);

        let err = QfsImage::from_source(Cursor::new(image)).err().unwrap();
        assert!(matches!(
            err,
            QfsError::Format(FormatError::BlockTooSmall { bytes_per_block: 3 })
        ));
    }

    #[test]
    fn open_rejects_a_directory() {
        let dir = tempfile::tempdir().unwrap();
        let err = QfsImage::open(dir.path()).err().unwrap();
        assert!(matches!(err, QfsError::OpenImage { .. }));
        assert_eq!(err.exit_code(), crate::error::EXIT_OPEN_IMAGE);
    }

    #[test]
    fn directory_of_truncated_image_is_an_error() {
        let image = Superblock::fresh(512, 4, None).encode().to_vec();
        let mut img = QfsImage::from_source(Cursor::new(image)).unwrap();
        let err = img.directory().unwrap_err();
        assert!(matches!(
            err,
            QfsError::Format(FormatError::Truncated { actual: 0, .. })
        ));
    }
}
