use std::path::Path;

use super::ExtractionError;

pub const DEFAULT_MAX_PDF_BYTES: u64 = 100 * 1024 * 1024; // 100MB

const PDF_MAGIC: &[u8] = b"%PDF-";
const ENCRYPT_SCAN_WINDOW: usize = 1024;

/// Cheap intake checks run before any parser touches the bytes.
///
/// Magic bytes decide the format, never the file extension. The `/Encrypt`
/// probe only covers the head of the file; an encryption dictionary placed
/// later is caught by the parser instead.
pub fn validate_pdf(bytes: &[u8], max_bytes: u64) -> Result<(), ExtractionError> {
    if bytes.is_empty() {
        return Err(ExtractionError::Empty);
    }

    let size = bytes.len() as u64;
    if size > max_bytes {
        return Err(ExtractionError::TooLarge {
            size,
            max: max_bytes,
        });
    }

    if !bytes.starts_with(PDF_MAGIC) {
        return Err(ExtractionError::NotPdf);
    }

    let head = &bytes[..bytes.len().min(ENCRYPT_SCAN_WINDOW)];
    if head.windows(b"/Encrypt".len()).any(|w| w == b"/Encrypt") {
        return Err(ExtractionError::Encrypted);
    }

    Ok(())
}

/// Sanitize a filename: strip path components, limit length
pub fn sanitize_filename(original: &str) -> String {
    let name = Path::new(original)
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("document.pdf");

    let clean: String = name
        .chars()
        .filter(|c| !matches!(c, '/' | '\\' | '\0') && !c.is_control())
        .take(255)
        .collect();

    if clean.is_empty() || clean == "." || clean == ".." {
        "document.pdf".to_string()
    } else {
        clean
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_rejected() {
        assert!(matches!(
            validate_pdf(b"", DEFAULT_MAX_PDF_BYTES),
            Err(ExtractionError::Empty)
        ));
    }

    #[test]
    fn missing_header_rejected() {
        assert!(matches!(
            validate_pdf(b"PK\x03\x04 zip archive", DEFAULT_MAX_PDF_BYTES),
            Err(ExtractionError::NotPdf)
        ));
    }

    #[test]
    fn encrypt_marker_in_head_rejected() {
        let bytes = b"%PDF-1.7\n1 0 obj << /Encrypt 5 0 R >> endobj";
        assert!(matches!(
            validate_pdf(bytes, DEFAULT_MAX_PDF_BYTES),
            Err(ExtractionError::Encrypted)
        ));
    }

    #[test]
    fn encrypt_marker_beyond_window_not_scanned() {
        let mut bytes = b"%PDF-1.4\n".to_vec();
        bytes.extend(std::iter::repeat(b' ').take(2048));
        bytes.extend_from_slice(b"/Encrypt");
        assert!(validate_pdf(&bytes, DEFAULT_MAX_PDF_BYTES).is_ok());
    }

    #[test]
    fn oversized_rejected() {
        let bytes = b"%PDF-1.4 0123456789";
        match validate_pdf(bytes, 8) {
            Err(ExtractionError::TooLarge { size, max }) => {
                assert_eq!(size, bytes.len() as u64);
                assert_eq!(max, 8);
            }
            other => panic!("expected TooLarge, got {other:?}"),
        }
    }

    #[test]
    fn minimal_header_accepted() {
        assert!(validate_pdf(b"%PDF-1.4\n%%EOF", DEFAULT_MAX_PDF_BYTES).is_ok());
    }

    #[test]
    fn sanitize_strips_directories() {
        assert_eq!(sanitize_filename("../../etc/passwd"), "passwd");
        assert_eq!(sanitize_filename("uploads/policy.pdf"), "policy.pdf");
    }

    #[test]
    fn sanitize_falls_back_for_empty() {
        assert_eq!(sanitize_filename(""), "document.pdf");
        assert_eq!(sanitize_filename(".."), "document.pdf");
    }
}
