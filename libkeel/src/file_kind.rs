//! Code for identifying what sort of file we're dealing with based on the bytes of the file.

use crate::bail;
use crate::error::Result;

pub(crate) const BITCODE_MAGIC: &[u8] = b"BC\xc0\xde";

#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum FileKind {
    ElfObject,
    ElfDynamic,
    Archive,
    ThinArchive,
    Bitcode,
}

impl FileKind {
    pub fn identify_bytes(bytes: &[u8]) -> Result<FileKind> {
        if bytes.starts_with(&object::archive::MAGIC) {
            Ok(FileKind::Archive)
        } else if bytes.starts_with(&object::archive::THIN_MAGIC) {
            Ok(FileKind::ThinArchive)
        } else if bytes.starts_with(BITCODE_MAGIC) {
            Ok(FileKind::Bitcode)
        } else if bytes.starts_with(&object::elf::ELFMAG) {
            // Class and data encoding are validated here so that later stages
            // can assume one of the four supported flavours.
            let (_, endian) = crate::elf::parse_ident(bytes)?;
            let e_type = read_u16(endian, bytes, 16)?;
            match e_type {
                object::elf::ET_REL => Ok(FileKind::ElfObject),
                object::elf::ET_DYN => Ok(FileKind::ElfDynamic),
                t => bail!("unsupported ELF kind {t}"),
            }
        } else {
            bail!("couldn't identify file type");
        }
    }
}

fn read_u16(endian: object::Endianness, bytes: &[u8], offset: usize) -> Result<u16> {
    use object::Endian as _;

    let Some(field) = bytes.get(offset..offset + 2) else {
        bail!("file too short");
    };
    Ok(endian.read_u16_bytes(field.try_into().unwrap()))
}

impl std::fmt::Display for FileKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            FileKind::ElfObject => "ELF object",
            FileKind::ElfDynamic => "ELF dynamic",
            FileKind::Archive => "archive",
            FileKind::ThinArchive => "thin archive",
            FileKind::Bitcode => "bitcode",
        };
        std::fmt::Display::fmt(s, f)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn elf_prefix(class: u8, data: u8, e_type: u16) -> Vec<u8> {
        let mut bytes = vec![0u8; 18];
        bytes[..4].copy_from_slice(&object::elf::ELFMAG);
        bytes[4] = class;
        bytes[5] = data;
        let type_bytes = if data == object::elf::ELFDATA2MSB {
            e_type.to_be_bytes()
        } else {
            e_type.to_le_bytes()
        };
        bytes[16..18].copy_from_slice(&type_bytes);
        bytes
    }

    #[test]
    fn test_identify_elf_variants() {
        for class in [object::elf::ELFCLASS32, object::elf::ELFCLASS64] {
            for data in [object::elf::ELFDATA2LSB, object::elf::ELFDATA2MSB] {
                let rel = elf_prefix(class, data, object::elf::ET_REL);
                assert_eq!(
                    FileKind::identify_bytes(&rel).unwrap(),
                    FileKind::ElfObject
                );
                let dyn_ = elf_prefix(class, data, object::elf::ET_DYN);
                assert_eq!(
                    FileKind::identify_bytes(&dyn_).unwrap(),
                    FileKind::ElfDynamic
                );
            }
        }
    }

    #[test]
    fn test_identify_rejects_bad_class_and_encoding() {
        let bad_class = elf_prefix(7, object::elf::ELFDATA2LSB, object::elf::ET_REL);
        assert!(FileKind::identify_bytes(&bad_class).is_err());
        let bad_data = elf_prefix(object::elf::ELFCLASS64, 9, object::elf::ET_REL);
        assert!(FileKind::identify_bytes(&bad_data).is_err());
        let exe = elf_prefix(
            object::elf::ELFCLASS64,
            object::elf::ELFDATA2LSB,
            object::elf::ET_EXEC,
        );
        assert!(FileKind::identify_bytes(&exe).is_err());
    }

    #[test]
    fn test_identify_other_kinds() {
        assert_eq!(
            FileKind::identify_bytes(b"!<arch>\nrest").unwrap(),
            FileKind::Archive
        );
        assert_eq!(
            FileKind::identify_bytes(b"!<thin>\nrest").unwrap(),
            FileKind::ThinArchive
        );
        assert_eq!(
            FileKind::identify_bytes(b"BC\xc0\xde\x00").unwrap(),
            FileKind::Bitcode
        );
        assert!(FileKind::identify_bytes(b"hello").is_err());
    }
}
