use chrono::{DateTime, FixedOffset, NaiveDate, TimeZone, Utc};
use lopdf::{Dictionary, Document, Object};

use super::types::{DocumentMetadata, PdfExtractor};
use super::ExtractionError;

/// PDF text extractor using the pdf-extract crate.
/// Handles digital PDFs with embedded text layers; metadata comes from the
/// Info dictionary via lopdf.
pub struct PdfTextExtractor;

impl PdfExtractor for PdfTextExtractor {
    fn extract_pages(&self, pdf_bytes: &[u8]) -> Result<Vec<String>, ExtractionError> {
        pdf_extract::extract_text_from_mem_by_pages(pdf_bytes)
            .map_err(|e| ExtractionError::PdfParsing(e.to_string()))
    }

    fn metadata(&self, pdf_bytes: &[u8]) -> Result<DocumentMetadata, ExtractionError> {
        let doc = Document::load_mem(pdf_bytes)
            .map_err(|e| ExtractionError::PdfParsing(e.to_string()))?;

        if doc.trailer.get(b"Encrypt").is_ok() {
            return Err(ExtractionError::Encrypted);
        }

        let info = match info_dictionary(&doc) {
            Some(dict) => dict,
            None => return Ok(DocumentMetadata::default()),
        };

        Ok(DocumentMetadata {
            title: info_string(info, b"Title"),
            author: info_string(info, b"Author"),
            subject: info_string(info, b"Subject"),
            creator: info_string(info, b"Creator"),
            producer: info_string(info, b"Producer"),
            creation_date: info_string(info, b"CreationDate").and_then(|s| parse_pdf_date(&s)),
            modification_date: info_string(info, b"ModDate").and_then(|s| parse_pdf_date(&s)),
        })
    }
}

fn info_dictionary(doc: &Document) -> Option<&Dictionary> {
    match doc.trailer.get(b"Info").ok()? {
        Object::Reference(id) => doc.get_object(*id).ok()?.as_dict().ok(),
        Object::Dictionary(dict) => Some(dict),
        _ => None,
    }
}

fn info_string(info: &Dictionary, key: &[u8]) -> Option<String> {
    match info.get(key).ok()? {
        Object::String(bytes, _) => {
            let decoded = decode_pdf_string(bytes);
            let trimmed = decoded.trim();
            (!trimmed.is_empty()).then(|| trimmed.to_string())
        }
        Object::Name(name) => Some(String::from_utf8_lossy(name).into_owned()),
        _ => None,
    }
}

/// Text strings are UTF-16BE when they carry a BOM, otherwise PDFDocEncoding,
/// which agrees with Latin-1 for the printable range.
fn decode_pdf_string(bytes: &[u8]) -> String {
    if bytes.len() >= 2 && bytes[0] == 0xFE && bytes[1] == 0xFF {
        let units: Vec<u16> = bytes[2..]
            .chunks_exact(2)
            .map(|c| u16::from_be_bytes([c[0], c[1]]))
            .collect();
        return String::from_utf16_lossy(&units);
    }
    if let Ok(s) = std::str::from_utf8(bytes) {
        return s.to_string();
    }
    bytes.iter().map(|&b| b as char).collect()
}

/// Parse a PDF date string (`D:YYYYMMDDHHmmSSOHH'mm'`). Every component after
/// the year is optional; a missing offset means UTC.
pub fn parse_pdf_date(raw: &str) -> Option<DateTime<Utc>> {
    let s = raw.trim();
    let s = s.strip_prefix("D:").unwrap_or(s);

    let digits: String = s.chars().take_while(|c| c.is_ascii_digit()).collect();
    if digits.len() < 4 {
        return None;
    }
    let field = |start: usize, len: usize, default: u32| -> Option<u32> {
        match digits.get(start..start + len) {
            Some(part) => part.parse().ok(),
            None => Some(default),
        }
    };

    let year: i32 = digits[..4].parse().ok()?;
    let month = field(4, 2, 1)?;
    let day = field(6, 2, 1)?;
    let hour = field(8, 2, 0)?;
    let minute = field(10, 2, 0)?;
    let second = field(12, 2, 0)?;

    let naive = NaiveDate::from_ymd_opt(year, month, day)?.and_hms_opt(hour, minute, second)?;

    let rest = &s[digits.len()..];
    let offset_secs = match rest.chars().next() {
        Some(sign @ ('+' | '-')) => {
            let tz: String = rest[1..].chars().filter(|c| c.is_ascii_digit()).collect();
            let hours: i32 = tz.get(0..2).and_then(|h| h.parse().ok()).unwrap_or(0);
            let minutes: i32 = tz.get(2..4).and_then(|m| m.parse().ok()).unwrap_or(0);
            let secs = hours * 3600 + minutes * 60;
            if sign == '-' {
                -secs
            } else {
                secs
            }
        }
        _ => 0,
    };

    let offset = FixedOffset::east_opt(offset_secs)?;
    let local = offset.from_local_datetime(&naive).single()?;
    Some(local.with_timezone(&Utc))
}

/// Small PDFs for tests, built with lopdf (the library pdf-extract uses internally).
#[cfg(test)]
pub(crate) mod test_pdf {
    use lopdf::dictionary;
    use lopdf::{Document, Object, Stream};

    fn escape(text: &str) -> String {
        text.replace('\\', "\\\\")
            .replace('(', "\\(")
            .replace(')', "\\)")
    }

    /// One page per entry; each line of a page becomes its own text line.
    pub fn build(pages: &[&str], info: &[(&str, &str)]) -> Vec<u8> {
        let mut doc = Document::with_version("1.4");

        let font_id = doc.add_object(dictionary! {
            "Type" => "Font",
            "Subtype" => "Type1",
            "BaseFont" => "Helvetica",
        });
        let resources_id = doc.add_object(dictionary! {
            "Font" => dictionary! {
                "F1" => font_id,
            },
        });

        let pages_id = doc.new_object_id();
        let mut kids: Vec<Object> = Vec::new();

        for page_text in pages {
            let mut content = String::from("BT /F1 11 Tf 14 TL 72 740 Td ");
            for line in page_text.lines() {
                content.push_str(&format!("({}) Tj T* ", escape(line)));
            }
            content.push_str("ET");

            let content_id = doc.add_object(Stream::new(dictionary! {}, content.into_bytes()));
            let page_id = doc.add_object(dictionary! {
                "Type" => "Page",
                "Parent" => pages_id,
                "MediaBox" => vec![0.into(), 0.into(), 612.into(), 792.into()],
                "Contents" => content_id,
                "Resources" => resources_id,
            });
            kids.push(page_id.into());
        }

        let count = kids.len() as i64;
        doc.objects.insert(
            pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => kids,
                "Count" => count,
            }),
        );

        let catalog_id = doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id,
        });
        doc.trailer.set("Root", catalog_id);

        if !info.is_empty() {
            let mut dict = lopdf::Dictionary::new();
            for (key, value) in info {
                dict.set(key.as_bytes().to_vec(), Object::string_literal(*value));
            }
            let info_id = doc.add_object(dict);
            doc.trailer.set("Info", info_id);
        }

        let mut buf = Vec::new();
        doc.save_to(&mut buf).unwrap();
        buf
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Datelike, Timelike};

    #[test]
    fn extract_text_from_digital_pdf() {
        let pdf_bytes = test_pdf::build(&["Coverage Criteria for knee replacement"], &[]);
        let pages = PdfTextExtractor.extract_pages(&pdf_bytes).unwrap();

        assert_eq!(pages.len(), 1);
        assert!(
            pages[0].contains("Coverage") || pages[0].contains("knee"),
            "Expected policy text, got: {}",
            pages[0]
        );
    }

    #[test]
    fn page_order_preserved() {
        let pdf_bytes = test_pdf::build(&["First page", "Second page", "Third page"], &[]);
        let pages = PdfTextExtractor.extract_pages(&pdf_bytes).unwrap();
        assert_eq!(pages.len(), 3);
        assert!(pages[0].contains("First"));
        assert!(pages[2].contains("Third"));
    }

    #[test]
    fn invalid_pdf_returns_error() {
        assert!(matches!(
            PdfTextExtractor.extract_pages(b"not a pdf"),
            Err(ExtractionError::PdfParsing(_))
        ));
        assert!(PdfTextExtractor.metadata(b"not a pdf").is_err());
    }

    #[test]
    fn metadata_read_from_info_dictionary() {
        let pdf_bytes = test_pdf::build(
            &["Body"],
            &[
                ("Title", "Knee Replacement Policy"),
                ("Author", "Utilization Management"),
                ("Producer", "PolicyWriter 2.1"),
                ("CreationDate", "D:20240115103000Z"),
            ],
        );
        let meta = PdfTextExtractor.metadata(&pdf_bytes).unwrap();
        assert_eq!(meta.title.as_deref(), Some("Knee Replacement Policy"));
        assert_eq!(meta.author.as_deref(), Some("Utilization Management"));
        assert_eq!(meta.producer.as_deref(), Some("PolicyWriter 2.1"));
        assert!(meta.subject.is_none());
        assert_eq!(meta.creation_date.unwrap().year(), 2024);
    }

    #[test]
    fn missing_info_yields_default_metadata() {
        let pdf_bytes = test_pdf::build(&["Body"], &[]);
        assert_eq!(
            PdfTextExtractor.metadata(&pdf_bytes).unwrap(),
            DocumentMetadata::default()
        );
    }

    #[test]
    fn pdf_date_with_offset_normalized_to_utc() {
        let dt = parse_pdf_date("D:20240301120000+05'30'").unwrap();
        assert_eq!(dt.hour(), 6);
        assert_eq!(dt.minute(), 30);
    }

    #[test]
    fn pdf_date_partial_components() {
        let dt = parse_pdf_date("D:2023").unwrap();
        assert_eq!((dt.year(), dt.month(), dt.day()), (2023, 1, 1));
        assert!(parse_pdf_date("yesterday").is_none());
        assert!(parse_pdf_date("D:20241345").is_none());
    }

    #[test]
    fn utf16_strings_decoded() {
        let bytes = [0xFE, 0xFF, 0x00, 0x50, 0x00, 0x6F, 0x00, 0x6C];
        assert_eq!(decode_pdf_string(&bytes), "Pol");
    }
}
