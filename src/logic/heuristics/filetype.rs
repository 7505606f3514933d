//! Container Type Consistency
//!
//! Magic-byte sniffing versus the declared extension, plus a structural
//! check for a PE certificate table. No cryptographic validation here;
//! presence of the certificate directory is reported as-is.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FileKind {
    WindowsExecutable,
    ElfExecutable,
    Pdf,
    ZipArchive,
    Png,
    Jpeg,
    Gif,
    Unknown,
}

impl FileKind {
    pub fn is_executable(&self) -> bool {
        matches!(self, FileKind::WindowsExecutable | FileKind::ElfExecutable)
    }
}

/// Identify a file by its leading magic bytes
pub fn sniff(sample: &[u8]) -> FileKind {
    if sample.len() >= 2 && &sample[0..2] == b"MZ" {
        return FileKind::WindowsExecutable;
    }
    if sample.len() >= 4 && &sample[0..4] == b"\x7fELF" {
        return FileKind::ElfExecutable;
    }
    if sample.len() >= 4 && &sample[0..4] == b"%PDF" {
        return FileKind::Pdf;
    }
    if sample.len() >= 4 && &sample[0..4] == b"PK\x03\x04" {
        return FileKind::ZipArchive;
    }
    if sample.len() >= 4 && &sample[0..4] == b"\x89PNG" {
        return FileKind::Png;
    }
    if sample.len() >= 3 && &sample[0..3] == b"\xff\xd8\xff" {
        return FileKind::Jpeg;
    }
    if sample.len() >= 4 && &sample[0..4] == b"GIF8" {
        return FileKind::Gif;
    }
    FileKind::Unknown
}

/// What kind of content an extension claims, where the claim is sniffable
pub fn declared_kind(extension: &str) -> Option<FileKind> {
    match extension {
        "exe" | "dll" | "scr" | "sys" | "ocx" | "cpl" | "drv" => {
            Some(FileKind::WindowsExecutable)
        }
        "so" | "elf" => Some(FileKind::ElfExecutable),
        "pdf" => Some(FileKind::Pdf),
        "zip" | "jar" | "apk" | "docx" | "xlsx" | "pptx" => Some(FileKind::ZipArchive),
        "png" => Some(FileKind::Png),
        "jpg" | "jpeg" => Some(FileKind::Jpeg),
        "gif" => Some(FileKind::Gif),
        _ => None,
    }
}

/// Extensions that never legitimately hold executable content
const NON_EXECUTABLE_EXTS: &[&str] = &[
    "pdf", "txt", "csv", "doc", "docx", "xls", "xlsx", "ppt", "pptx", "jpg", "jpeg", "png",
    "gif", "bmp", "mp3", "mp4", "avi", "zip", "html", "htm",
];

/// Lower-cased extension of a file name, if any
pub fn extension_of(name: &str) -> Option<String> {
    let dot = name.rfind('.')?;
    if dot + 1 >= name.len() {
        return None;
    }
    Some(name[dot + 1..].to_lowercase())
}

/// Declared and sniffed kinds are both known and disagree
pub fn extension_mismatch(sniffed: FileKind, extension: &str) -> bool {
    match declared_kind(extension) {
        Some(declared) => sniffed != FileKind::Unknown && declared != sniffed,
        None => false,
    }
}

/// Executable content behind a document/media extension
pub fn executable_masquerade(sniffed: FileKind, extension: &str) -> bool {
    sniffed.is_executable() && NON_EXECUTABLE_EXTS.contains(&extension)
}

// ============================================================================
// PE CERTIFICATE TABLE
// ============================================================================

const PE32_MAGIC: u16 = 0x10b;
const PE32_PLUS_MAGIC: u16 = 0x20b;

// Security directory is entry 4 of the optional header's data directories.
const SECURITY_DIRECTORY_INDEX: usize = 4;

fn read_u16(sample: &[u8], offset: usize) -> Option<u16> {
    let bytes = sample.get(offset..offset + 2)?;
    Some(u16::from_le_bytes([bytes[0], bytes[1]]))
}

fn read_u32(sample: &[u8], offset: usize) -> Option<u32> {
    let bytes = sample.get(offset..offset + 4)?;
    Some(u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
}

/// Whether a PE sample declares a certificate table.
///
/// `None` when the sample is not a PE or is truncated before the data
/// directories; `Some(false)` when the directory exists but is empty.
pub fn pe_certificate_present(sample: &[u8]) -> Option<bool> {
    if sample.len() < 0x40 || &sample[0..2] != b"MZ" {
        return None;
    }

    let e_lfanew = read_u32(sample, 0x3c)? as usize;
    if sample.get(e_lfanew..e_lfanew + 4)? != b"PE\0\0" {
        return None;
    }

    let optional_header = e_lfanew + 24;
    let magic = read_u16(sample, optional_header)?;

    let (count_offset, directories_offset) = match magic {
        PE32_MAGIC => (optional_header + 92, optional_header + 96),
        PE32_PLUS_MAGIC => (optional_header + 108, optional_header + 112),
        _ => return None,
    };

    let directory_count = read_u32(sample, count_offset)? as usize;
    if directory_count <= SECURITY_DIRECTORY_INDEX {
        return Some(false);
    }

    let entry = directories_offset + SECURITY_DIRECTORY_INDEX * 8;
    let rva = read_u32(sample, entry)?;
    let size = read_u32(sample, entry + 4)?;
    Some(rva != 0 && size != 0)
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    /// Minimal PE32 image: MZ stub, header at 0x80, 16 data directories.
    fn synthetic_pe32(cert_rva: u32, cert_size: u32) -> Vec<u8> {
        let mut image = vec![0u8; 0x200];
        image[0] = b'M';
        image[1] = b'Z';
        image[0x3c..0x40].copy_from_slice(&0x80u32.to_le_bytes());
        image[0x80..0x84].copy_from_slice(b"PE\0\0");

        let optional_header = 0x80 + 24;
        image[optional_header..optional_header + 2].copy_from_slice(&PE32_MAGIC.to_le_bytes());
        image[optional_header + 92..optional_header + 96]
            .copy_from_slice(&16u32.to_le_bytes());

        let entry = optional_header + 96 + SECURITY_DIRECTORY_INDEX * 8;
        image[entry..entry + 4].copy_from_slice(&cert_rva.to_le_bytes());
        image[entry + 4..entry + 8].copy_from_slice(&cert_size.to_le_bytes());
        image
    }

    #[test]
    fn test_sniff_known_magics() {
        assert_eq!(sniff(b"MZ\x90\x00"), FileKind::WindowsExecutable);
        assert_eq!(sniff(b"\x7fELF\x02"), FileKind::ElfExecutable);
        assert_eq!(sniff(b"%PDF-1.7"), FileKind::Pdf);
        assert_eq!(sniff(b"PK\x03\x04"), FileKind::ZipArchive);
        assert_eq!(sniff(b"\x89PNG\r\n"), FileKind::Png);
        assert_eq!(sniff(b"\xff\xd8\xff\xe0"), FileKind::Jpeg);
        assert_eq!(sniff(b"GIF89a"), FileKind::Gif);
        assert_eq!(sniff(b"hello"), FileKind::Unknown);
        assert_eq!(sniff(b""), FileKind::Unknown);
    }

    #[test]
    fn test_extension_mismatch() {
        assert!(extension_mismatch(FileKind::WindowsExecutable, "png"));
        assert!(!extension_mismatch(FileKind::WindowsExecutable, "exe"));
        assert!(!extension_mismatch(FileKind::Unknown, "exe"));
        // Office containers really are zip archives
        assert!(!extension_mismatch(FileKind::ZipArchive, "docx"));
    }

    #[test]
    fn test_executable_masquerade() {
        assert!(executable_masquerade(FileKind::WindowsExecutable, "pdf"));
        assert!(executable_masquerade(FileKind::ElfExecutable, "jpg"));
        assert!(!executable_masquerade(FileKind::WindowsExecutable, "exe"));
        assert!(!executable_masquerade(FileKind::Pdf, "exe"));
    }

    #[test]
    fn test_extension_of() {
        assert_eq!(extension_of("report.PDF"), Some("pdf".to_string()));
        assert_eq!(extension_of("archive.tar.gz"), Some("gz".to_string()));
        assert_eq!(extension_of("README"), None);
        assert_eq!(extension_of("trailing."), None);
    }

    #[test]
    fn test_pe_certificate_present() {
        assert_eq!(pe_certificate_present(&synthetic_pe32(0x1000, 0x400)), Some(true));
        assert_eq!(pe_certificate_present(&synthetic_pe32(0, 0)), Some(false));
        assert_eq!(pe_certificate_present(b"not a pe file at all"), None);
        // MZ but truncated before the PE header
        assert_eq!(pe_certificate_present(&synthetic_pe32(1, 1)[..0x50]), None);
    }
}
