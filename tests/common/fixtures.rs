//! Export archive fixtures

use flate2::Compression;
use flate2::write::GzEncoder;
use std::io::{Cursor, Write};

/// Alerts export as produced by CallMiner, BOM included
pub const ALERTS_CSV: &str = "\u{feff}ContactID,AlertID,AlertName,TimeStamp\r\n\
1,100,Escalation,2024-01-01T10:00:00Z\r\n\
2,101,Complaint,2024-01-01T11:30:00Z\r\n";

/// Contacts export with a column the metadata endpoint does not describe
pub const CONTACTS_CSV: &str = "ContactID,Duration,IsCallback,Agent\n\
42,12.5,True,Sam\n\
43,NaN,false,Alex\n";

/// Gzip-compress `content`
pub fn gzip(content: &[u8]) -> Vec<u8> {
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(content).expect("gzip write");
    encoder.finish().expect("gzip finish")
}

/// Build a zip archive holding `entries` gzip-compressed, plus `padding` bytes
/// of filler so the download spans several chunks
pub fn export_archive(entries: &[(&str, &str)], padding: usize) -> Vec<u8> {
    let mut cursor = Cursor::new(Vec::new());
    {
        let mut writer = zip::ZipWriter::new(&mut cursor);
        let stored =
            zip::write::FileOptions::default().compression_method(zip::CompressionMethod::Stored);

        for (name, content) in entries {
            writer.start_file(*name, stored).expect("zip entry");
            writer.write_all(&gzip(content.as_bytes())).expect("zip write");
        }
        if padding > 0 {
            writer.start_file("padding.bin", stored).expect("zip entry");
            writer.write_all(&vec![0u8; padding]).expect("zip write");
        }
        writer.finish().expect("zip finish");
    }
    cursor.into_inner()
}
