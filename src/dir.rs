// src/dir.rs
use std::fmt;

use crate::error::{FormatError, QfsError};
use crate::fs::{DIRECTORY_REGION_SIZE, DIRENTRY_COUNT, DIRENTRY_SIZE, NAME_LEN};

// Bits [6:7] de permissions indican el tipo de archivo.
const FILE_TYPE_MASK: u8 = 0xC0;
const FILE_TYPE_DIRECTORY: u8 = 0x40;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FileKind {
    Directory,
    RegularFile,
}

impl FileKind {
    /// Solo `0b01` en los dos bits altos es directorio; cualquier otro
    /// valor se trata como archivo regular.
    pub fn from_permissions(permissions: u8) -> Self {
        if permissions & FILE_TYPE_MASK == FILE_TYPE_DIRECTORY {
            FileKind::Directory
        } else {
            FileKind::RegularFile
        }
    }
}

impl fmt::Display for FileKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FileKind::Directory => f.write_str("Directory"),
            FileKind::RegularFile => f.write_str("Regular File"),
        }
    }
}

/// Byte de permisos: dueño en bits 0-1, grupo en 2-3, resto en 4-5.
/// Dentro de cada par, el bit 1 es lectura y el bit 0 escritura.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Permissions(pub u8);

impl Permissions {
    fn pair(&self, shift: u8) -> (bool, bool) {
        let bits = (self.0 >> shift) & 0x03;
        (bits & 0x02 != 0, bits & 0x01 != 0)
    }

    pub fn owner(&self) -> (bool, bool) {
        self.pair(0)
    }

    pub fn group(&self) -> (bool, bool) {
        self.pair(2)
    }

    pub fn world(&self) -> (bool, bool) {
        self.pair(4)
    }
}

impl fmt::Display for Permissions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (read, write) in [self.owner(), self.group(), self.world()] {
            f.write_str(if read { "r" } else { "-" })?;
            f.write_str(if write { "w" } else { "-" })?;
        }
        Ok(())
    }
}

// -------------------- Entrada de directorio --------------------

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DirEntry {
    pub filename: [u8; NAME_LEN],
    pub permissions: u8,
    pub owner_id: u8,
    pub group_id: u8,
    pub starting_block: u16,
    pub file_size: u32,
}

impl Default for DirEntry {
    fn default() -> Self {
        Self {
            filename: [0u8; NAME_LEN],
            permissions: 0,
            owner_id: 0,
            group_id: 0,
            starting_block: 0,
            file_size: 0,
        }
    }
}

impl DirEntry {
    /// Entrada para un archivo ya colocado en una cadena de bloques.
    /// El nombre se trunca a NAME_LEN - 1 bytes.
    pub fn new(name: &str, permissions: u8, starting_block: u16, file_size: u32) -> Self {
        let mut entry = Self {
            permissions,
            starting_block,
            file_size,
            ..Self::default()
        };
        let bytes = name.as_bytes();
        let len = bytes.len().min(NAME_LEN - 1);
        entry.filename[..len].copy_from_slice(&bytes[..len]);
        entry
    }

    pub fn decode(bytes: &[u8]) -> Result<Self, FormatError> {
        if bytes.len() < DIRENTRY_SIZE {
            return Err(FormatError::Truncated {
                what: "entrada de directorio",
                needed: DIRENTRY_SIZE,
                actual: bytes.len(),
            });
        }
        let mut filename = [0u8; NAME_LEN];
        filename.copy_from_slice(&bytes[..NAME_LEN]);
        Ok(Self {
            filename,
            permissions: bytes[23],
            owner_id: bytes[24],
            group_id: bytes[25],
            starting_block: u16::from_le_bytes([bytes[26], bytes[27]]),
            file_size: u32::from_le_bytes([bytes[28], bytes[29], bytes[30], bytes[31]]),
        })
    }

    pub fn encode(&self) -> [u8; DIRENTRY_SIZE] {
        let mut buf = [0u8; DIRENTRY_SIZE];
        buf[..NAME_LEN].copy_from_slice(&self.filename);
        buf[23] = self.permissions;
        buf[24] = self.owner_id;
        buf[25] = self.group_id;
        buf[26..28].copy_from_slice(&self.starting_block.to_le_bytes());
        buf[28..32].copy_from_slice(&self.file_size.to_le_bytes());
        buf
    }

    /// Bytes del nombre hasta el primer nul (o los 23 si no hay terminador).
    pub fn name_bytes(&self) -> &[u8] {
        let end = self
            .filename
            .iter()
            .position(|&b| b == 0)
            .unwrap_or(NAME_LEN);
        &self.filename[..end]
    }

    pub fn name(&self) -> String {
        String::from_utf8_lossy(self.name_bytes()).into_owned()
    }

    pub fn is_terminated(&self) -> bool {
        self.filename.contains(&0)
    }

    pub fn is_free(&self) -> bool {
        is_free(self)
    }

    pub fn kind(&self) -> FileKind {
        FileKind::from_permissions(self.permissions)
    }

    pub fn access(&self) -> Permissions {
        Permissions(self.permissions)
    }
}

pub fn is_free(entry: &DirEntry) -> bool {
    entry.filename[0] == 0
}

// -------------------- Tabla de directorio --------------------

/// Las 255 ranuras en orden físico; el índice es la posición en disco.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DirectoryTable {
    slots: Vec<DirEntry>,
}

impl Default for DirectoryTable {
    fn default() -> Self {
        Self {
            slots: vec![DirEntry::default(); DIRENTRY_COUNT],
        }
    }
}

impl DirectoryTable {
    pub fn decode_all(bytes: &[u8]) -> Result<Self, FormatError> {
        if bytes.len() < DIRECTORY_REGION_SIZE {
            return Err(FormatError::Truncated {
                what: "tabla de directorio",
                needed: DIRECTORY_REGION_SIZE,
                actual: bytes.len(),
            });
        }
        let slots = bytes[..DIRECTORY_REGION_SIZE]
            .chunks_exact(DIRENTRY_SIZE)
            .map(DirEntry::decode)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { slots })
    }

    /// Región de directorio vacía, tal como la deja el formateo.
    pub fn encode_empty() -> Vec<u8> {
        vec![0u8; DIRECTORY_REGION_SIZE]
    }

    pub fn encode(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(DIRECTORY_REGION_SIZE);
        for entry in &self.slots {
            buf.extend_from_slice(&entry.encode());
        }
        buf
    }

    pub fn slots(&self) -> &[DirEntry] {
        &self.slots
    }

    /// Reemplaza la ranura `slot`. Devuelve la entrada anterior, o `None`
    /// si el índice no existe.
    pub fn set(&mut self, slot: usize, entry: DirEntry) -> Option<DirEntry> {
        let old = self.slots.get_mut(slot)?;
        Some(std::mem::replace(old, entry))
    }

    /// Ranuras ocupadas con su índice físico.
    pub fn used(&self) -> impl Iterator<Item = (usize, &DirEntry)> + '_ {
        self.slots.iter().enumerate().filter(|(_, e)| !e.is_free())
    }

    pub fn find_by_name(&self, name: &str) -> Result<(usize, &DirEntry), QfsError> {
        find_by_name(&self.slots, name)
    }
}

/// Primera ranura ocupada cuyo nombre coincide exactamente con `name`.
pub fn find_by_name<'a>(
    entries: &'a [DirEntry],
    name: &str,
) -> Result<(usize, &'a DirEntry), QfsError> {
    entries
        .iter()
        .enumerate()
        .find(|(_, e)| !e.is_free() && e.name_bytes() == name.as_bytes())
        .ok_or_else(|| QfsError::NotFound {
            name: name.to_string(),
        })
}
