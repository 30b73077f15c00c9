//! Decodes the features of one accession and writes the matching regions.
//!
//! Output blocks have the form
//!
//! ```text
//! <key> <raw location>
//! <sequence>
//! ```
//!
//! The first block written to a file during one [`FeatureWriter::process`]
//! call truncates it; every later block is appended. A feature whose location
//! fails to decode contributes nothing to the file.

use crate::{
    error::{GbRegionsError, Result},
    feature_location::{LocationError, parse_location},
    reference_sequence::ReferenceSequence,
};
use serde::{Deserialize, Serialize};
use std::{
    collections::HashMap,
    fs::OpenOptions,
    io::{BufWriter, Write},
    path::{Path, PathBuf},
};

/// A feature-table row: the region type and its unparsed location.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FeatureRecord {
    pub key: String,
    pub raw_location: String,
}

impl FeatureRecord {
    pub fn new(key: &str, raw_location: &str) -> Self {
        Self {
            key: key.to_string(),
            raw_location: raw_location.to_string(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct SkippedFeature {
    /// Position of the feature in the accession's feature table.
    pub index: usize,
    pub raw_location: String,
    pub reason: String,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct ProcessReport {
    pub accession: String,
    pub output_path: String,
    /// Features whose key equals the requested region type.
    pub matched_count: usize,
    /// Matched features that decoded and were written.
    pub written_count: usize,
    pub skipped: Vec<SkippedFeature>,
    /// Nothing was written but a file from an earlier run still exists at
    /// `output_path`.
    pub stale_output: bool,
}

impl ProcessReport {
    pub fn is_not_found(&self) -> bool {
        self.written_count == 0
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum FileState {
    NotYetTouched,
    Written,
}

/// Per-call bookkeeping of which output files were already truncated.
#[derive(Debug, Default)]
struct OutputFiles {
    states: HashMap<PathBuf, FileState>,
}

impl OutputFiles {
    fn state(&self, path: &Path) -> FileState {
        self.states
            .get(path)
            .copied()
            .unwrap_or(FileState::NotYetTouched)
    }

    fn write_block(&mut self, path: &Path, record: &FeatureRecord, sequence: &[u8]) -> Result<()> {
        let mut options = OpenOptions::new();
        options.create(true);
        match self.state(path) {
            FileState::NotYetTouched => options.write(true).truncate(true),
            FileState::Written => options.append(true),
        };
        let output_error = |source| GbRegionsError::Output {
            path: path.to_path_buf(),
            source,
        };
        let file = options.open(path).map_err(output_error)?;
        let mut writer = BufWriter::new(file);
        writeln!(writer, "{} {}", record.key, record.raw_location).map_err(output_error)?;
        writer.write_all(sequence).map_err(output_error)?;
        writer.write_all(b"\n").map_err(output_error)?;
        writer.flush().map_err(output_error)?;
        self.states.insert(path.to_path_buf(), FileState::Written);
        Ok(())
    }
}

#[derive(Clone, Debug, Default)]
pub struct FeatureWriter {
    log_sequences: bool,
}

impl FeatureWriter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Echo every extracted sequence at debug level.
    pub fn with_sequence_logging(mut self, log_sequences: bool) -> Self {
        self.log_sequences = log_sequences;
        self
    }

    /// Parse, validate, extract and strand-resolve one feature.
    pub fn decode(
        record: &FeatureRecord,
        reference: &ReferenceSequence,
    ) -> std::result::Result<Vec<u8>, LocationError> {
        let expression = parse_location(&record.raw_location)?;
        expression.validate()?;
        let extracted = reference.extract(&expression)?;
        Ok(expression.resolve_strand(extracted))
    }

    /// Writes every decodable feature of type `region_type` to `output_path`.
    ///
    /// Decoding failures skip the feature and are listed in the report; only
    /// I/O errors abort.
    pub fn process(
        &self,
        accession: &str,
        reference: &ReferenceSequence,
        features: &[FeatureRecord],
        region_type: &str,
        output_path: &Path,
    ) -> Result<ProcessReport> {
        let mut outputs = OutputFiles::default();
        let mut report = ProcessReport {
            accession: accession.to_string(),
            output_path: output_path.display().to_string(),
            ..Default::default()
        };
        for (index, record) in features.iter().enumerate() {
            if record.key != region_type {
                continue;
            }
            report.matched_count += 1;
            log::debug!(
                "{accession}: feature {}/{} {} {}",
                index + 1,
                features.len(),
                record.key,
                record.raw_location
            );
            let sequence = match Self::decode(record, reference) {
                Ok(sequence) => sequence,
                Err(e) => {
                    log::warn!(
                        "{accession}: skipping {} '{}': {e}",
                        record.key,
                        record.raw_location
                    );
                    report.skipped.push(SkippedFeature {
                        index,
                        raw_location: record.raw_location.clone(),
                        reason: e.to_string(),
                    });
                    continue;
                }
            };
            if self.log_sequences {
                log::debug!("{}", String::from_utf8_lossy(&sequence));
            }
            outputs.write_block(output_path, record, &sequence)?;
            report.written_count += 1;
        }
        if report.written_count == 0 && output_path.exists() {
            log::warn!(
                "{accession}: nothing written, '{}' is left over from an earlier run",
                output_path.display()
            );
            report.stale_output = true;
        }
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    fn run(features: &[FeatureRecord], path: &Path) -> ProcessReport {
        let reference = ReferenceSequence::from_sequence("ACGTACGT");
        FeatureWriter::new()
            .process("NC_TEST", &reference, features, "CDS", path)
            .unwrap()
    }

    #[test]
    fn test_decode_forms() {
        let reference = ReferenceSequence::from_sequence("ACGTACGT");
        let decode = |loc| FeatureWriter::decode(&FeatureRecord::new("CDS", loc), &reference);
        assert_eq!(decode("2..5").unwrap(), b"CGTA");
        assert_eq!(decode("complement(2..5)").unwrap(), b"TACG");
        assert_eq!(decode("join(1..2,7..8)").unwrap(), b"ACGT");
        assert_eq!(decode("complement(join(1..2,7..8))").unwrap(), b"ACGT");
        assert_eq!(decode("complement(join(1..3,5..6))").unwrap(), b"GTCGT");
        assert!(matches!(
            decode("join(5..10,20..15)"),
            Err(LocationError::Validation { .. })
        ));
    }

    #[test]
    fn test_process_writes_blocks_and_counts() {
        let td = tempdir().unwrap();
        let path = td.path().join("out.txt");
        let report = run(
            &[
                FeatureRecord::new("gene", "1..8"),
                FeatureRecord::new("CDS", "2..5"),
                FeatureRecord::new("CDS", "join(5..10,20..15)"),
                FeatureRecord::new("CDS", "complement(2..5)"),
            ],
            &path,
        );
        assert_eq!(report.matched_count, 3);
        assert_eq!(report.written_count, 2);
        assert_eq!(report.skipped.len(), 1);
        assert_eq!(report.skipped[0].index, 2);
        assert_eq!(
            fs::read_to_string(&path).unwrap(),
            "CDS 2..5\nCGTA\nCDS complement(2..5)\nTACG\n"
        );
    }

    #[test]
    fn test_first_write_truncates_existing_file() {
        let td = tempdir().unwrap();
        let path = td.path().join("out.txt");
        fs::write(&path, "stale content from an earlier run\n").unwrap();
        run(&[FeatureRecord::new("CDS", "join(1..2,7..8)")], &path);
        assert_eq!(fs::read_to_string(&path).unwrap(), "CDS join(1..2,7..8)\nACGT\n");

        // A second call starts over again.
        run(&[FeatureRecord::new("CDS", "1..2")], &path);
        assert_eq!(fs::read_to_string(&path).unwrap(), "CDS 1..2\nAC\n");
    }

    #[test]
    fn test_only_failures_leave_file_untouched() {
        let td = tempdir().unwrap();
        let path = td.path().join("out.txt");
        let report = run(
            &[
                FeatureRecord::new("CDS", "join(5..10,abc..15)"),
                FeatureRecord::new("CDS", "3..99"),
            ],
            &path,
        );
        assert_eq!(report.matched_count, 2);
        assert_eq!(report.written_count, 0);
        assert!(report.is_not_found());
        assert!(!path.exists());
    }

    #[test]
    fn test_huge_coordinates_skip_the_record() {
        let td = tempdir().unwrap();
        let path = td.path().join("out.txt");
        let max = usize::MAX;
        let report = run(
            &[
                FeatureRecord::new("CDS", &format!("1..{max}")),
                FeatureRecord::new("CDS", "1..900000000000000"),
                FeatureRecord::new("CDS", &format!("join(1..{max},2..{max})")),
                FeatureRecord::new("CDS", "2..5"),
            ],
            &path,
        );
        assert_eq!(report.matched_count, 4);
        assert_eq!(report.written_count, 1);
        assert_eq!(
            report.skipped.iter().map(|s| s.index).collect::<Vec<_>>(),
            vec![0, 1, 2]
        );
        assert_eq!(fs::read_to_string(&path).unwrap(), "CDS 2..5\nCGTA\n");
    }

    #[test]
    fn test_huge_coordinates_alone_write_nothing() {
        let td = tempdir().unwrap();
        let path = td.path().join("out.txt");
        let report = run(&[FeatureRecord::new("CDS", "1..900000000000000")], &path);
        assert_eq!(report.written_count, 0);
        assert!(!report.stale_output);
        assert!(!path.exists());
    }

    #[test]
    fn test_leftover_file_is_reported_as_stale() {
        let td = tempdir().unwrap();
        let path = td.path().join("out.txt");
        run(&[FeatureRecord::new("CDS", "1..2")], &path);
        let report = run(&[FeatureRecord::new("CDS", "0..2")], &path);
        assert_eq!(report.matched_count, 1);
        assert_eq!(report.written_count, 0);
        assert!(report.stale_output);
        assert_eq!(fs::read_to_string(&path).unwrap(), "CDS 1..2\nAC\n");

        let report = run(&[FeatureRecord::new("CDS", "3..4")], &path);
        assert!(!report.stale_output);
    }

    #[test]
    fn test_unwritable_output_is_an_error() {
        let td = tempdir().unwrap();
        let path = td.path().join("missing_dir").join("out.txt");
        let reference = ReferenceSequence::from_sequence("ACGTACGT");
        let err = FeatureWriter::new()
            .process(
                "NC_TEST",
                &reference,
                &[FeatureRecord::new("CDS", "1..2")],
                "CDS",
                &path,
            )
            .unwrap_err();
        assert!(matches!(err, GbRegionsError::Output { .. }), "{err}");
    }
}
