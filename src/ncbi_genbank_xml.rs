//! NCBI GenBank XML (`GBSet/GBSeq`) feature-table reader and dialect detection.
//!
//! Only `GBSet/GBSeq` is supported, which is what `efetch` returns for
//! `db=nucleotide&retmode=xml`. Other XML dialects (notably
//! `INSDSet/INSDSeq`) are detected and rejected with explicit diagnostics.
//!
//! Feature locations are kept as raw text; decoding happens per record in
//! [`crate::feature_location`] so that one bad location only skips its own
//! feature.

use crate::{
    feature_writer::FeatureRecord, reference_sequence::ReferenceSequence, source::open_input,
};
use anyhow::{Result, anyhow};
use serde::Deserialize;
use std::{io::Read, path::Path};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NcbiXmlDialect {
    GbSetGbSeq,
    InsdSetInsdSeq,
    Unknown,
}

impl NcbiXmlDialect {
    pub fn label(self) -> &'static str {
        match self {
            Self::GbSetGbSeq => "GBSet/GBSeq",
            Self::InsdSetInsdSeq => "INSDSet/INSDSeq",
            Self::Unknown => "unknown",
        }
    }
}

/// One `GBSeq` entry reduced to what region extraction needs.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct GbSeqRecord {
    pub locus: Option<String>,
    pub accession: Option<String>,
    pub accession_version: Option<String>,
    pub definition: Option<String>,
    /// Uppercased residues, empty when the record carries no sequence.
    pub sequence: Vec<u8>,
    pub features: Vec<FeatureRecord>,
}

impl GbSeqRecord {
    /// Matches either the bare accession or the versioned one.
    pub fn matches_accession(&self, accession: &str) -> bool {
        let accession = accession.trim();
        [&self.accession, &self.accession_version, &self.locus]
            .into_iter()
            .flatten()
            .any(|candidate| candidate.eq_ignore_ascii_case(accession))
    }

    pub fn reference(&self) -> Option<ReferenceSequence> {
        (!self.sequence.is_empty()).then(|| {
            ReferenceSequence::new(
                self.accession_version.clone().or(self.accession.clone()),
                self.sequence.clone(),
            )
        })
    }
}

pub fn detect_ncbi_xml_dialect(input: &str) -> NcbiXmlDialect {
    let lower = input.to_ascii_lowercase();
    if lower.contains("<gbset") {
        NcbiXmlDialect::GbSetGbSeq
    } else if lower.contains("<insdset") {
        NcbiXmlDialect::InsdSetInsdSeq
    } else {
        NcbiXmlDialect::Unknown
    }
}

pub fn parse_gbseq_xml_file(path: &Path) -> Result<Vec<GbSeqRecord>> {
    let mut text = String::new();
    open_input(path)?
        .read_to_string(&mut text)
        .map_err(|e| anyhow!("Could not read XML file '{}': {e}", path.display()))?;
    parse_gbseq_xml_text(&text)
        .map_err(|e| anyhow!("Could not parse XML file '{}': {e}", path.display()))
}

pub fn parse_gbseq_xml_text(xml: &str) -> Result<Vec<GbSeqRecord>> {
    match detect_ncbi_xml_dialect(xml) {
        NcbiXmlDialect::GbSetGbSeq => {}
        NcbiXmlDialect::InsdSetInsdSeq => {
            return Err(anyhow!(
                "Unsupported XML dialect '{}'; only GBSet/GBSeq is currently supported",
                NcbiXmlDialect::InsdSetInsdSeq.label()
            ));
        }
        NcbiXmlDialect::Unknown => {
            return Err(anyhow!(
                "Unsupported XML dialect: expected '{}' root element",
                NcbiXmlDialect::GbSetGbSeq.label()
            ));
        }
    }

    let parsed: GbSetXml =
        quick_xml::de::from_str(xml).map_err(|e| anyhow!("Malformed GBSet XML: {e}"))?;
    if parsed.sequences.is_empty() {
        return Err(anyhow!("Malformed GBSet XML: no GBSeq records found"));
    }

    Ok(parsed
        .sequences
        .iter()
        .enumerate()
        .map(|(record_idx, record)| gbseq_record(record, record_idx))
        .collect())
}

#[derive(Debug, Deserialize)]
#[serde(rename = "GBSet")]
struct GbSetXml {
    #[serde(rename = "GBSeq", default)]
    sequences: Vec<GbSeqXml>,
}

#[derive(Debug, Deserialize)]
struct GbSeqXml {
    #[serde(rename = "GBSeq_locus")]
    locus: Option<String>,
    #[serde(rename = "GBSeq_definition")]
    definition: Option<String>,
    #[serde(rename = "GBSeq_primary-accession")]
    primary_accession: Option<String>,
    #[serde(rename = "GBSeq_accession-version")]
    accession_version: Option<String>,
    #[serde(rename = "GBSeq_sequence")]
    sequence: Option<String>,
    #[serde(rename = "GBSeq_feature-table")]
    feature_table: Option<GbFeatureTableXml>,
}

#[derive(Debug, Deserialize)]
struct GbFeatureTableXml {
    #[serde(rename = "GBFeature", default)]
    features: Vec<GbFeatureXml>,
}

#[derive(Debug, Deserialize)]
struct GbFeatureXml {
    #[serde(rename = "GBFeature_key")]
    key: Option<String>,
    #[serde(rename = "GBFeature_location")]
    location: Option<String>,
    #[serde(rename = "GBFeature_intervals")]
    intervals: Option<GbFeatureIntervalsXml>,
}

#[derive(Debug, Deserialize)]
struct GbFeatureIntervalsXml {
    #[serde(rename = "GBInterval", default)]
    intervals: Vec<GbIntervalXml>,
}

#[derive(Debug, Deserialize)]
struct GbIntervalXml {
    #[serde(rename = "GBInterval_from")]
    from: Option<usize>,
    #[serde(rename = "GBInterval_to")]
    to: Option<usize>,
    #[serde(rename = "GBInterval_point")]
    point: Option<usize>,
    #[serde(rename = "GBInterval_iscomp")]
    iscomp: Option<GbIsCompXml>,
}

// NCBI encodes the flag as `<GBInterval_iscomp value="true"/>`.
#[derive(Debug, Deserialize)]
struct GbIsCompXml {
    #[serde(rename = "@value", default)]
    value: Option<String>,
}

impl GbIsCompXml {
    fn is_set(&self) -> bool {
        self.value
            .as_deref()
            .map(|value| value.trim().eq_ignore_ascii_case("true"))
            .unwrap_or(false)
    }
}

fn gbseq_record(record: &GbSeqXml, record_idx: usize) -> GbSeqRecord {
    let sequence: Vec<u8> = record
        .sequence
        .as_deref()
        .unwrap_or_default()
        .bytes()
        .filter(|byte| byte.is_ascii_alphabetic())
        .map(|byte| byte.to_ascii_uppercase())
        .collect();

    let accession = nonempty_owned(record.primary_accession.as_deref())
        .or_else(|| accession_from_accession_version(record.accession_version.as_deref()));
    let locus = nonempty_owned(record.locus.as_deref());
    let seq_label = locus
        .clone()
        .or_else(|| accession.clone())
        .unwrap_or_else(|| format!("record_{}", record_idx + 1));

    GbSeqRecord {
        features: feature_records(record, &seq_label),
        locus,
        accession,
        accession_version: nonempty_owned(record.accession_version.as_deref()),
        definition: nonempty_owned(record.definition.as_deref()),
        sequence,
    }
}

fn feature_records(record: &GbSeqXml, seq_label: &str) -> Vec<FeatureRecord> {
    let Some(feature_table) = &record.feature_table else {
        return vec![];
    };
    let mut features = Vec::with_capacity(feature_table.features.len());
    for (feature_idx, raw_feature) in feature_table.features.iter().enumerate() {
        let key = nonempty_owned(raw_feature.key.as_deref())
            .unwrap_or_else(|| "misc_feature".to_string());
        let Some(raw_location) = resolve_feature_location_text(raw_feature) else {
            log::warn!(
                "GBSeq '{}' feature #{} ('{}') has no location; ignored",
                seq_label,
                feature_idx + 1,
                key
            );
            continue;
        };
        features.push(FeatureRecord { key, raw_location });
    }
    features
}

fn resolve_feature_location_text(feature: &GbFeatureXml) -> Option<String> {
    if let Some(location) = nonempty_owned(feature.location.as_deref()) {
        return Some(location);
    }
    location_from_intervals(
        feature
            .intervals
            .as_ref()
            .map(|raw| raw.intervals.as_slice())
            .unwrap_or_default(),
    )
}

/// Rebuilds location text from `GBFeature_intervals`. A reverse interval is
/// written as `to..from` by NCBI; the complement covers the whole feature,
/// which is only expressible when every interval agrees on the strand.
fn location_from_intervals(intervals: &[GbIntervalXml]) -> Option<String> {
    if intervals.is_empty() {
        return None;
    }
    let mut parts: Vec<String> = vec![];
    let mut complemented = 0;
    for interval in intervals {
        let from = interval.from.or(interval.point)?;
        let to = interval.to.or(interval.point).unwrap_or(from);
        if from == 0 || to == 0 {
            return None;
        }
        let is_comp = interval.iscomp.as_ref().is_some_and(GbIsCompXml::is_set);
        if is_comp {
            complemented += 1;
        }
        let (start, end) = if from <= to { (from, to) } else { (to, from) };
        parts.push(format!("{start}..{end}"));
    }
    if complemented != 0 && complemented != parts.len() {
        return None;
    }
    let body = if parts.len() == 1 {
        parts.remove(0)
    } else {
        // Reverse-strand intervals are listed 5'->3' on the minus strand.
        if complemented != 0 {
            parts.reverse();
        }
        format!("join({})", parts.join(","))
    };
    if complemented != 0 {
        Some(format!("complement({body})"))
    } else {
        Some(body)
    }
}

fn accession_from_accession_version(raw: Option<&str>) -> Option<String> {
    let version = nonempty_owned(raw)?;
    Some(
        version
            .split_once('.')
            .map(|(accession, _)| accession.trim().to_string())
            .filter(|accession| !accession.is_empty())
            .unwrap_or(version),
    )
}

fn nonempty_owned(raw: Option<&str>) -> Option<String> {
    let text = raw.unwrap_or_default().trim();
    (!text.is_empty()).then_some(text.to_string())
}
