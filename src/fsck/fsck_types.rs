/*Estructuras del reporte de fsck: qué partes de la imagen están bien
y la lista de errores (graves) y advertencias (informativas). */

#[derive(Debug)]
pub struct FsckReport {
    pub superblock_ok: bool,
    pub entries_ok: bool,
    pub blocks_ok: bool,
    pub files_checked: usize,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
}

impl FsckReport {
    pub fn new() -> Self {
        Self {
            superblock_ok: true,
            entries_ok: true,
            blocks_ok: true,
            files_checked: 0,
            errors: Vec::new(),
            warnings: Vec::new(),
        }
    }

    pub fn is_clean(&self) -> bool {
        self.errors.is_empty()
    }
}

impl Default for FsckReport {
    fn default() -> Self {
        Self::new()
    }
}
