//! Where the reference sequence and feature table of an accession come from.
//!
//! Remote retrieval is not done here: a network client implements
//! [`FeatureSource`] the same way [`LocalFeatureSource`] does for files that
//! were downloaded beforehand (`efetch ... rettype=fasta` and
//! `efetch ... retmode=xml`, or a GenBank flat file).

use crate::{
    error::{GbRegionsError, Result},
    feature_writer::FeatureRecord,
    ncbi_genbank_xml::parse_gbseq_xml_file,
    reference_sequence::ReferenceSequence,
};
use anyhow::anyhow;
use flate2::read::MultiGzDecoder;
use gb_io::reader::SeqReader;
use std::{
    fs::File,
    io::{BufReader, Read},
    path::{Path, PathBuf},
};

const FASTA_EXTENSIONS: &[&str] = &["fasta", "fa", "fna"];
const XML_EXTENSIONS: &[&str] = &["xml"];
const GENBANK_EXTENSIONS: &[&str] = &["gb", "gbk", "gbff"];

/// Everything the feature writer needs for one accession.
#[derive(Clone, Debug, Default)]
pub struct AccessionData {
    pub accession: String,
    pub reference: ReferenceSequence,
    pub features: Vec<FeatureRecord>,
}

impl AccessionData {
    /// Reference from FASTA, features from a `GBSet/GBSeq` document. Without
    /// a FASTA file the sequence embedded in the XML record is used.
    pub fn from_fasta_and_xml(
        accession: &str,
        fasta: Option<&Path>,
        xml: &Path,
    ) -> anyhow::Result<Self> {
        let records = parse_gbseq_xml_file(xml)?;
        let record_count = records.len();
        let record = records
            .iter()
            .find(|record| record.matches_accession(accession))
            .or_else(|| (record_count == 1).then(|| &records[0]))
            .ok_or_else(|| {
                anyhow!(
                    "XML file '{}' has {record_count} GBSeq records, none for accession '{accession}'",
                    xml.display()
                )
            })?;
        let reference = match fasta {
            Some(path) => ReferenceSequence::from_fasta_file(path)?,
            None => record.reference().ok_or_else(|| {
                anyhow!(
                    "No FASTA given and XML record '{accession}' in '{}' carries no sequence",
                    xml.display()
                )
            })?,
        };
        Ok(Self {
            accession: accession.to_string(),
            reference,
            features: record.features.clone(),
        })
    }

    /// Reads the first record of a GenBank flat file.
    pub fn from_genbank_file(accession: Option<&str>, path: &Path) -> anyhow::Result<Self> {
        let reader = open_input(path)?;
        let seq = SeqReader::new(reader)
            .next()
            .ok_or_else(|| anyhow!("GenBank file '{}' contains no record", path.display()))?
            .map_err(|e| anyhow!("Could not parse GenBank file '{}': {e}", path.display()))?;
        let accession = accession
            .map(str::to_string)
            .or_else(|| seq.accession.clone())
            .or_else(|| seq.name.clone())
            .unwrap_or_else(|| path.display().to_string());
        let features = seq
            .features
            .iter()
            .map(|feature| FeatureRecord {
                key: feature.kind.to_string(),
                raw_location: feature.location.to_gb_format(),
            })
            .collect();
        let name = seq.version.clone().or_else(|| Some(accession.clone()));
        Ok(Self {
            reference: ReferenceSequence::new(name, seq.seq),
            accession,
            features,
        })
    }
}

pub trait FeatureSource {
    fn load(&self, accession: &str) -> Result<AccessionData>;
}

/// Looks up `<dir>/<accession>.<ext>[.gz]`, preferring FASTA + XML pairs over
/// GenBank flat files.
#[derive(Clone, Debug)]
pub struct LocalFeatureSource {
    dir: PathBuf,
}

impl LocalFeatureSource {
    pub fn new<P: Into<PathBuf>>(dir: P) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn find(&self, accession: &str, extensions: &[&str]) -> Option<PathBuf> {
        extensions
            .iter()
            .flat_map(|ext| [format!("{accession}.{ext}"), format!("{accession}.{ext}.gz")])
            .map(|name| self.dir.join(name))
            .find(|path| path.is_file())
    }
}

impl FeatureSource for LocalFeatureSource {
    fn load(&self, accession: &str) -> Result<AccessionData> {
        if let Some(xml) = self.find(accession, XML_EXTENSIONS) {
            let fasta = self.find(accession, FASTA_EXTENSIONS);
            return Ok(AccessionData::from_fasta_and_xml(
                accession,
                fasta.as_deref(),
                &xml,
            )?);
        }
        if let Some(genbank) = self.find(accession, GENBANK_EXTENSIONS) {
            return Ok(AccessionData::from_genbank_file(Some(accession), &genbank)?);
        }
        Err(GbRegionsError::String(format!(
            "No feature table for accession '{accession}' in '{}' (expected .xml or .gb)",
            self.dir.display()
        )))
    }
}

fn is_gzip_path(path: &Path) -> bool {
    path.extension()
        .map(|ext| ext.eq_ignore_ascii_case("gz"))
        .unwrap_or(false)
}

/// Opens a local input file, decompressing `.gz` transparently.
pub fn open_input(path: &Path) -> anyhow::Result<Box<dyn Read>> {
    let file =
        File::open(path).map_err(|e| anyhow!("Could not open '{}': {e}", path.display()))?;
    if is_gzip_path(path) {
        Ok(Box::new(MultiGzDecoder::new(BufReader::new(file))))
    } else {
        Ok(Box::new(BufReader::new(file)))
    }
}
