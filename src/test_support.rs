//! In-memory fixture archives for unit tests

use std::io::{Cursor, Write};

use flate2::write::DeflateEncoder;
use flate2::Compression;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

use crate::archive::detection::{find_signature, ZIP_DATA_DESCRIPTOR_SIG, ZIP_LOCAL_HEADER_SIG};
use crate::archive::types::FLAG_DATA_DESCRIPTOR;
use crate::archive::zip::locate_central_directory;

pub const CONTENT_TYPES: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types"><Default Extension="rels" ContentType="application/vnd.openxmlformats-package.relationships+xml"/><Default Extension="xml" ContentType="application/xml"/><Override PartName="/word/document.xml" ContentType="application/vnd.openxmlformats-officedocument.wordprocessingml.document.main+xml"/></Types>"#;

pub const ROOT_RELS: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships"><Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/officeDocument" Target="word/document.xml"/></Relationships>"#;

/// Build a deflate-compressed archive
pub fn build_zip(entries: &[(&str, &[u8])]) -> Vec<u8> {
    build_zip_with(entries, CompressionMethod::Deflated)
}

/// Build an archive with a fixed compression method for every entry
pub fn build_zip_with(entries: &[(&str, &[u8])], method: CompressionMethod) -> Vec<u8> {
    let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
    let options = SimpleFileOptions::default().compression_method(method);
    for (name, data) in entries {
        writer.start_file(*name, options).unwrap();
        writer.write_all(data).unwrap();
    }
    writer.finish().unwrap().into_inner()
}

/// Word body XML with one paragraph per string
pub fn document_xml(paragraphs: &[&str]) -> String {
    let body: String = paragraphs
        .iter()
        .map(|text| format!(r#"<w:p><w:r><w:t xml:space="preserve">{}</w:t></w:r></w:p>"#, text))
        .collect();
    format!(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<w:document xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main"><w:body>{}<w:sectPr/></w:body></w:document>"#,
        body
    )
}

/// Minimal DOCX package around the given paragraphs
pub fn build_docx(paragraphs: &[&str]) -> Vec<u8> {
    let document = document_xml(paragraphs);
    build_zip(&[
        ("[Content_Types].xml", CONTENT_TYPES.as_bytes()),
        ("_rels/.rels", ROOT_RELS.as_bytes()),
        ("word/document.xml", document.as_bytes()),
    ])
}

/// Long, varied paragraphs so the compressed body is several KiB
pub fn long_paragraphs(count: usize) -> Vec<String> {
    const WORDS: &[&str] = &[
        "archive", "recovery", "paragraph", "content", "header", "signature", "stream",
        "window", "literal", "distance", "checksum", "document", "section", "margin",
    ];
    (0..count)
        .map(|i| {
            let a = WORDS[i % WORDS.len()];
            let b = WORDS[(i * 7 + 3) % WORDS.len()];
            let c = WORDS[(i * 11 + 5) % WORDS.len()];
            format!("Paragraph {} mentions {} then {} and {} at position {}", i, a, b, c, i * 31)
        })
        .collect()
}

/// Local header offset and data range of the entry named `name`
pub fn entry_data_range(zip: &[u8], name: &str) -> (usize, std::ops::Range<usize>) {
    let mut from = 0;
    while let Some(offset) = find_signature(zip, from, ZIP_LOCAL_HEADER_SIG) {
        let name_len = u16::from_le_bytes([zip[offset + 26], zip[offset + 27]]) as usize;
        let extra_len = u16::from_le_bytes([zip[offset + 28], zip[offset + 29]]) as usize;
        let size = u32::from_le_bytes([
            zip[offset + 18],
            zip[offset + 19],
            zip[offset + 20],
            zip[offset + 21],
        ]) as usize;
        let entry_name = &zip[offset + 30..offset + 30 + name_len];
        if entry_name == name.as_bytes() {
            let start = offset + 30 + name_len + extra_len;
            return (offset, start..start + size);
        }
        from = offset + 1;
    }
    panic!("entry {} not found", name);
}

/// Zero the central directory records, leaving the EOCD in place
pub fn zero_central_directory(zip: &mut [u8]) {
    let info = locate_central_directory(zip).expect("fixture has an EOCD");
    let start = info.central_dir_offset as usize;
    zip[start..info.eocd_offset].fill(0);
}

/// Deflated local entry whose CRC and sizes follow the data in a descriptor
///
/// Streaming writers emit this layout; the header fields are all zero.
pub fn descriptor_entry(name: &str, content: &[u8]) -> Vec<u8> {
    let mut encoder = DeflateEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(content).unwrap();
    let deflated = encoder.finish().unwrap();

    let mut out = Vec::new();
    out.extend_from_slice(ZIP_LOCAL_HEADER_SIG);
    out.extend_from_slice(&20u16.to_le_bytes()); // version
    out.extend_from_slice(&FLAG_DATA_DESCRIPTOR.to_le_bytes());
    out.extend_from_slice(&8u16.to_le_bytes()); // deflate
    out.extend_from_slice(&[0u8; 4]); // time/date
    out.extend_from_slice(&[0u8; 12]); // crc, compressed size, size
    out.extend_from_slice(&(name.len() as u16).to_le_bytes());
    out.extend_from_slice(&0u16.to_le_bytes()); // extra
    out.extend_from_slice(name.as_bytes());
    out.extend_from_slice(&deflated);
    out.extend_from_slice(ZIP_DATA_DESCRIPTOR_SIG);
    out.extend_from_slice(&crc32fast::hash(content).to_le_bytes());
    out.extend_from_slice(&(deflated.len() as u32).to_le_bytes());
    out.extend_from_slice(&(content.len() as u32).to_le_bytes());
    out
}
