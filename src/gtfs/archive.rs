//! Zip archive validation and member extraction.

use std::collections::HashMap;
use std::io::{Cursor, Read};
use std::path::PathBuf;

use tracing::{debug, info};
use zip::ZipArchive;

use crate::error::PipelineError;

/// Opens `bytes` as a zip archive and returns the contents of `names`.
///
/// Every required member is located before any is read, so a missing
/// member fails the whole call. A member may sit at the archive root or
/// inside one top-level folder (`feed/stops.txt`).
pub fn extract_members(
    bytes: &[u8],
    names: &[&str],
    max_uncompressed_bytes: u64,
) -> Result<HashMap<String, Vec<u8>>, PipelineError> {
    let mut archive = ZipArchive::new(Cursor::new(bytes))?;

    // Declared sizes come from the archive itself; reads below are capped too.
    let mut declared: u64 = 0;
    for i in 0..archive.len() {
        if let Ok(entry) = archive.by_index(i) {
            declared = declared
                .checked_add(entry.size())
                .ok_or(PipelineError::ArchiveTooLarge {
                    size: u64::MAX,
                    limit: max_uncompressed_bytes,
                })?;
        }
    }
    if declared > max_uncompressed_bytes {
        return Err(PipelineError::ArchiveTooLarge {
            size: declared,
            limit: max_uncompressed_bytes,
        });
    }
    debug!(entries = archive.len(), declared, "Archive size within limits");

    let entry_names: Vec<String> = archive.file_names().map(str::to_string).collect();
    let mut located = Vec::with_capacity(names.len());
    for name in names {
        let entry = locate_member(&entry_names, name).ok_or_else(|| PipelineError::missing(name))?;
        located.push((*name, entry));
    }

    let mut members = HashMap::with_capacity(located.len());
    let mut extracted: u64 = 0;
    for (name, entry) in located {
        let remaining = max_uncompressed_bytes - extracted;
        let mut contents = Vec::new();
        archive
            .by_name(&entry)?
            .take(remaining.saturating_add(1))
            .read_to_end(&mut contents)
            .map_err(|source| PipelineError::Io {
                path: PathBuf::from(&entry),
                source,
            })?;

        extracted += contents.len() as u64;
        if extracted > max_uncompressed_bytes {
            return Err(PipelineError::ArchiveTooLarge {
                size: extracted,
                limit: max_uncompressed_bytes,
            });
        }
        members.insert(name.to_string(), contents);
    }

    info!(members = members.len(), "Extracted archive members");
    Ok(members)
}

fn locate_member(entry_names: &[String], name: &str) -> Option<String> {
    if entry_names.iter().any(|e| e == name) {
        return Some(name.to_string());
    }
    entry_names
        .iter()
        .find(|entry| {
            !entry.starts_with("__MACOSX/")
                && entry
                    .split_once('/')
                    .is_some_and(|(_, rest)| rest == name)
        })
        .cloned()
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::io::Write;
    use zip::write::FileOptions;

    /// Hand-assembles a stored archive whose central directory claims
    /// `declared` uncompressed bytes per member, using a zip64 extra field
    /// when the claim does not fit in 32 bits.
    fn zip_with_declared_sizes(files: &[(&str, &[u8], u64)]) -> Vec<u8> {
        let mut out = Vec::new();
        let mut central = Vec::new();
        for (name, contents, declared) in files {
            let mut crc = flate2::Crc::new();
            crc.update(contents);
            let len = contents.len() as u32;
            let zip64 = *declared >= u64::from(u32::MAX);
            let short_declared = if zip64 { u32::MAX } else { *declared as u32 };
            let offset = out.len() as u32;

            out.extend_from_slice(&0x04034b50u32.to_le_bytes());
            out.extend_from_slice(&20u16.to_le_bytes());
            out.extend_from_slice(&[0; 8]); // flags, method, time, date
            out.extend_from_slice(&crc.sum().to_le_bytes());
            out.extend_from_slice(&len.to_le_bytes());
            out.extend_from_slice(&(if zip64 { len } else { short_declared }).to_le_bytes());
            out.extend_from_slice(&(name.len() as u16).to_le_bytes());
            out.extend_from_slice(&0u16.to_le_bytes());
            out.extend_from_slice(name.as_bytes());
            out.extend_from_slice(contents);

            let mut extra = Vec::new();
            if zip64 {
                extra.extend_from_slice(&1u16.to_le_bytes());
                extra.extend_from_slice(&8u16.to_le_bytes());
                extra.extend_from_slice(&declared.to_le_bytes());
            }
            central.extend_from_slice(&0x02014b50u32.to_le_bytes());
            central.extend_from_slice(&45u16.to_le_bytes());
            central.extend_from_slice(&45u16.to_le_bytes());
            central.extend_from_slice(&[0; 8]);
            central.extend_from_slice(&crc.sum().to_le_bytes());
            central.extend_from_slice(&len.to_le_bytes());
            central.extend_from_slice(&short_declared.to_le_bytes());
            central.extend_from_slice(&(name.len() as u16).to_le_bytes());
            central.extend_from_slice(&(extra.len() as u16).to_le_bytes());
            central.extend_from_slice(&[0; 8]); // comment, disk, internal attrs
            central.extend_from_slice(&0u32.to_le_bytes());
            central.extend_from_slice(&offset.to_le_bytes());
            central.extend_from_slice(name.as_bytes());
            central.extend_from_slice(&extra);
        }

        let central_offset = out.len() as u32;
        out.extend_from_slice(&central);
        out.extend_from_slice(&0x06054b50u32.to_le_bytes());
        out.extend_from_slice(&[0; 4]);
        out.extend_from_slice(&(files.len() as u16).to_le_bytes());
        out.extend_from_slice(&(files.len() as u16).to_le_bytes());
        out.extend_from_slice(&(central.len() as u32).to_le_bytes());
        out.extend_from_slice(&central_offset.to_le_bytes());
        out.extend_from_slice(&0u16.to_le_bytes());
        out
    }

    pub(crate) fn build_zip(files: &[(&str, &str)]) -> Vec<u8> {
        let mut writer = zip::ZipWriter::new(Cursor::new(Vec::new()));
        for (name, contents) in files {
            writer.start_file(*name, FileOptions::default()).unwrap();
            writer.write_all(contents.as_bytes()).unwrap();
        }
        writer.finish().unwrap().into_inner()
    }

    #[test]
    fn test_extracts_only_requested_members() {
        let bytes = build_zip(&[
            ("stops.txt", "stop_id,stop_name\nS1,Main St\n"),
            ("agency.txt", "agency_name\nTriMet\n"),
        ]);
        let members = extract_members(&bytes, &["stops.txt"], u64::MAX).unwrap();
        assert_eq!(members.len(), 1);
        assert_eq!(members["stops.txt"], b"stop_id,stop_name\nS1,Main St\n");
    }

    #[test]
    fn test_missing_member_is_named() {
        let bytes = build_zip(&[("stops.txt", "stop_id\n"), ("trips.txt", "trip_id\n")]);
        let err = extract_members(&bytes, &["stops.txt", "stop_times.txt", "trips.txt"], u64::MAX)
            .unwrap_err();
        match err {
            PipelineError::MissingInput { name } => assert_eq!(name, "stop_times.txt"),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_not_a_zip_is_invalid_archive() {
        let err = extract_members(b"definitely not a zip", &["stops.txt"], u64::MAX).unwrap_err();
        assert!(matches!(err, PipelineError::InvalidArchive(_)));
    }

    #[test]
    fn test_member_in_nested_folder() {
        let bytes = build_zip(&[("gtfs/stops.txt", "stop_id\n")]);
        let members = extract_members(&bytes, &["stops.txt"], u64::MAX).unwrap();
        assert_eq!(members["stops.txt"], b"stop_id\n");
    }

    #[test]
    fn test_macos_metadata_folder_is_ignored() {
        let bytes = build_zip(&[("__MACOSX/stops.txt", "junk")]);
        let err = extract_members(&bytes, &["stops.txt"], u64::MAX).unwrap_err();
        assert!(matches!(err, PipelineError::MissingInput { .. }));
    }

    #[test]
    fn test_size_limit_enforced() {
        let bytes = build_zip(&[("stops.txt", "stop_id,stop_name\nS1,Main St\n")]);
        let err = extract_members(&bytes, &["stops.txt"], 4).unwrap_err();
        assert!(matches!(err, PipelineError::ArchiveTooLarge { limit: 4, .. }));
    }

    #[test]
    fn test_overflowing_declared_sizes_are_rejected() {
        let bytes = zip_with_declared_sizes(&[
            ("stops.txt", &b"stop_id\n"[..], 1u64 << 63),
            ("trips.txt", &b"trip_id\n"[..], 1u64 << 63),
        ]);
        let err = extract_members(&bytes, &["stops.txt"], 512 * 1024 * 1024).unwrap_err();
        assert!(matches!(err, PipelineError::ArchiveTooLarge { size: u64::MAX, .. }));
    }

    #[test]
    fn test_huge_declared_size_is_rejected() {
        let bytes = zip_with_declared_sizes(&[("stops.txt", &b"stop_id\n"[..], 1u64 << 40)]);
        let err = extract_members(&bytes, &["stops.txt"], 512 * 1024 * 1024).unwrap_err();
        assert!(matches!(err, PipelineError::ArchiveTooLarge { size, .. } if size == 1u64 << 40));
    }

    #[test]
    fn test_understated_size_is_capped_while_reading() {
        let contents = vec![b'x'; 100_000];
        let bytes = zip_with_declared_sizes(&[("stops.txt", contents.as_slice(), 10)]);
        let err = extract_members(&bytes, &["stops.txt"], 1_000).unwrap_err();
        assert!(matches!(err, PipelineError::ArchiveTooLarge { size: 1_001, limit: 1_000 }));
    }

    #[test]
    fn test_read_cap_spans_members() {
        let bytes = zip_with_declared_sizes(&[
            ("stops.txt", &[b'a'; 600][..], 1),
            ("trips.txt", &[b'b'; 600][..], 1),
        ]);
        let members = extract_members(&bytes, &["stops.txt"], 1_000).unwrap();
        assert_eq!(members["stops.txt"].len(), 600);

        let err = extract_members(&bytes, &["stops.txt", "trips.txt"], 1_000).unwrap_err();
        assert!(matches!(err, PipelineError::ArchiveTooLarge { limit: 1_000, .. }));
    }
}
