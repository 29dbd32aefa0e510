use crate::dir::{FileKind, Permissions};
use crate::error::QfsError;
use crate::fs::{ImageSource, QfsImage, Superblock};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListedFile {
    pub slot: usize,
    pub name: String,
    pub size: u32,
    pub kind: FileKind,
    pub starting_block: u16,
    pub owner_id: u8,
    pub group_id: u8,
    pub permissions: Permissions,
}

#[derive(Debug, Clone)]
pub struct Listing {
    pub superblock: Superblock,
    pub files: Vec<ListedFile>,
}

impl Listing {
    /// Label del volumen, solo si no está vacío.
    pub fn label(&self) -> Option<String> {
        let label = self.superblock.label();
        (!label.is_empty()).then_some(label)
    }
}

/// Superblock más las ranuras ocupadas, en orden físico.
pub fn list<S: ImageSource>(image: &mut QfsImage<S>) -> Result<Listing, QfsError> {
    let table = image.directory()?;
    let files = table
        .used()
        .map(|(slot, e)| ListedFile {
            slot,
            name: e.name(),
            size: e.file_size,
            kind: e.kind(),
            starting_block: e.starting_block,
            owner_id: e.owner_id,
            group_id: e.group_id,
            permissions: e.access(),
        })
        .collect();

    Ok(Listing {
        superblock: *image.superblock(),
        files,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dir::{DirEntry, DirectoryTable};
    use crate::fs::SUPERBLOCK_SIZE;
    use crate::mkfs::format_device;
    use std::io::Cursor;

    #[test]
    fn lists_used_slots_in_physical_order() {
        let mut dev = Cursor::new(vec![0u8; 32 * 1024]);
        format_device(&mut dev, Some("Fotos")).unwrap();

        let mut table = DirectoryTable::default();
        let mut dir = DirEntry::new("album", 0x40 | 0b10_10_11, 3, 0);
        dir.owner_id = 5;
        dir.group_id = 6;
        table.set(200, dir);
        table.set(1, DirEntry::new("a.jpg", 0x80 | 0b00_00_10, 0, 1234));

        let raw = table.encode();
        dev.get_mut()[SUPERBLOCK_SIZE..SUPERBLOCK_SIZE + raw.len()].copy_from_slice(&raw);

        let mut image = QfsImage::from_source(dev).unwrap();
        let listing = list(&mut image).unwrap();

        assert_eq!(listing.label().as_deref(), Some("Fotos"));
        assert_eq!(listing.files.len(), 2);

        let first = &listing.files[0];
        assert_eq!((first.slot, first.name.as_str()), (1, "a.jpg"));
        assert_eq!(first.kind, FileKind::RegularFile);
        assert_eq!(first.size, 1234);
        assert_eq!(first.permissions.to_string(), "r-----");

        let second = &listing.files[1];
        assert_eq!((second.slot, second.name.as_str()), (200, "album"));
        assert_eq!(second.kind, FileKind::Directory);
        assert_eq!((second.owner_id, second.group_id), (5, 6));
        assert_eq!(second.permissions.to_string(), "rwr-r-");
    }

    #[test]
    fn blank_label_is_omitted() {
        let mut dev = Cursor::new(vec![0u8; 16 * 1024]);
        format_device(&mut dev, None).unwrap();
        let mut image = QfsImage::from_source(dev).unwrap();

        let listing = list(&mut image).unwrap();
        assert_eq!(listing.label(), None);
        assert!(listing.files.is_empty());
    }
}
