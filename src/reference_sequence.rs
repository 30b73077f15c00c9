use crate::{
    feature_location::{GenomicInterval, LocationError, LocationExpression},
    iupac_code,
    source::open_input,
};
use anyhow::{Result, anyhow};
use bio::io::fasta;
use std::{io::Read, path::Path};

/// The nucleotide sequence of one accession, addressed with 1-based
/// inclusive coordinates.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ReferenceSequence {
    name: Option<String>,
    seq: Vec<u8>,
}

impl ReferenceSequence {
    pub fn new(name: Option<String>, seq: Vec<u8>) -> Self {
        Self { name, seq }
    }

    pub fn from_sequence(sequence: &str) -> Self {
        Self::new(None, sequence.as_bytes().to_vec())
    }

    /// Reads the first record of a FASTA stream.
    pub fn from_fasta_reader<R: Read>(reader: R) -> Result<Self> {
        let record = fasta::Reader::new(reader)
            .records()
            .next()
            .ok_or_else(|| anyhow!("FASTA input does not contain any record"))?
            .map_err(|e| anyhow!("Malformed FASTA record: {e}"))?;
        Ok(Self::from_fasta_record(&record))
    }

    pub fn from_fasta_file(path: &Path) -> Result<Self> {
        let reader = open_input(path)?;
        Self::from_fasta_reader(reader)
            .map_err(|e| anyhow!("Could not read FASTA '{}': {e}", path.display()))
    }

    pub fn from_fasta_record(record: &fasta::Record) -> Self {
        let ret = Self::new(Some(record.id().to_string()), record.seq().to_vec());
        let invalid = iupac_code::count_invalid_letters(&ret.seq);
        if invalid > 0 {
            log::warn!(
                "Reference '{}' contains {invalid} non-IUPAC residue(s)",
                record.id()
            );
        }
        ret
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    #[inline(always)]
    pub fn len(&self) -> usize {
        self.seq.len()
    }

    pub fn is_empty(&self) -> bool {
        self.seq.is_empty()
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.seq
    }

    /// Position 1 is the first base. Out-of-range intervals are an error,
    /// never clamped.
    pub fn get_interval(&self, interval: &GenomicInterval) -> Result<&[u8], LocationError> {
        interval.validate()?;
        let GenomicInterval { start, end } = *interval;
        if end > self.len() {
            return Err(LocationError::OutOfBounds {
                start,
                end,
                length: self.len(),
            });
        }
        Ok(&self.seq[start - 1..end])
    }

    /// Concatenates the intervals of `expression` in their listed order. The
    /// strand is not applied here; see [`LocationExpression::resolve_strand`].
    pub fn extract(&self, expression: &LocationExpression) -> Result<Vec<u8>, LocationError> {
        let intervals = expression.intervals();
        if intervals.is_empty() {
            return Err(LocationError::EmptyJoin);
        }
        let parts = intervals
            .iter()
            .map(|interval| self.get_interval(interval))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(parts.concat())
    }
}
