//! Per-organism batches: one output directory per organism, one output file
//! per (region type, accession) pair.

use crate::{
    config::ExtractionConfig,
    error::{GbRegionsError, Result},
    feature_writer::{FeatureWriter, ProcessReport},
    source::FeatureSource,
};
use serde::{Deserialize, Serialize};
use std::{
    fs,
    path::{Path, PathBuf},
};

/// One row of the organism index: where the organism sits in the taxonomy
/// tree and which nucleotide accessions belong to it.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrganismJob {
    pub name: String,
    /// Lineage directory (kingdom/group/subgroup) relative to the output root.
    #[serde(default)]
    pub path: PathBuf,
    pub accessions: Vec<String>,
}

impl OrganismJob {
    pub fn directory_name(&self) -> String {
        sanitize_organism_name(&self.name)
    }

    pub fn output_dir(&self, output_root: &Path) -> PathBuf {
        output_root.join(&self.path).join(self.directory_name())
    }

    /// True when the organism directory exists and holds at least one file.
    pub fn is_downloaded(&self, output_root: &Path) -> bool {
        fs::read_dir(self.output_dir(output_root))
            .map(|mut entries| entries.next().is_some())
            .unwrap_or(false)
    }
}

#[derive(Clone, Debug, Default, Serialize)]
pub struct OrganismReport {
    pub organism: String,
    pub region_type: String,
    pub output_dir: String,
    pub matched_count: usize,
    pub written_count: usize,
    pub accessions: Vec<ProcessReport>,
    pub failed_accessions: Vec<String>,
}

impl OrganismReport {
    pub fn is_not_found(&self) -> bool {
        self.written_count == 0
    }
}

pub fn load_jobs(path: &Path) -> Result<Vec<OrganismJob>> {
    let text = fs::read_to_string(path).map_err(|e| {
        GbRegionsError::String(format!(
            "Could not read organism list '{}': {e}",
            path.display()
        ))
    })?;
    serde_json::from_str(&text).map_err(|e| {
        GbRegionsError::String(format!(
            "Could not parse organism list '{}': {e}",
            path.display()
        ))
    })
}

/// Jobs whose organism directory lies at or below `selection`, which is a
/// path relative to the output root (a lineage node or a single organism).
pub fn select_jobs<'a>(jobs: &'a [OrganismJob], selection: &Path) -> Vec<&'a OrganismJob> {
    let root = Path::new("");
    jobs.iter()
        .filter(|job| job.output_dir(root).starts_with(selection))
        .collect()
}

/// Replaces characters that are unsafe or awkward in directory names.
pub fn sanitize_organism_name(name: &str) -> String {
    name.chars()
        .map(|c| match c {
            ' ' | '[' | ']' | ':' | '/' => '_',
            c => c,
        })
        .collect()
}

pub fn output_file_name(organism_dir_name: &str, region_type: &str, accession_index: usize) -> String {
    format!("{organism_dir_name}_{region_type}_NC_{accession_index}.txt")
}

pub fn fetch_organism(
    job: &OrganismJob,
    source: &dyn FeatureSource,
    region_type: &str,
    config: &ExtractionConfig,
) -> Result<OrganismReport> {
    let dir_name = job.directory_name();
    let output_dir = job.output_dir(&config.output_root);
    fs::create_dir_all(&output_dir).map_err(|source| GbRegionsError::Output {
        path: output_dir.clone(),
        source,
    })?;
    log::info!("downloading [{}]", job.name);

    let writer = FeatureWriter::new().with_sequence_logging(config.log_sequences);
    let mut report = OrganismReport {
        organism: job.name.clone(),
        region_type: region_type.to_string(),
        output_dir: output_dir.display().to_string(),
        ..Default::default()
    };
    let total = job.accessions.len();
    for (idx, accession) in job.accessions.iter().enumerate() {
        log::info!("NC : {} / {total} ({accession})", idx + 1);
        let data = match source.load(accession) {
            Ok(data) => data,
            Err(e) => {
                log::warn!("[{}] could not load {accession}: {e}", job.name);
                report.failed_accessions.push(accession.clone());
                continue;
            }
        };
        let output_path = output_dir.join(output_file_name(&dir_name, region_type, idx + 1));
        let accession_report = writer.process(
            accession,
            &data.reference,
            &data.features,
            region_type,
            &output_path,
        )?;
        report.matched_count += accession_report.matched_count;
        report.written_count += accession_report.written_count;
        report.accessions.push(accession_report);
    }

    if report.is_not_found() {
        log::warn!(
            "Selected functional region [{region_type}] not found for organism [{}]",
            job.name
        );
    } else {
        log::info!(
            "[{}] downloaded: {} {region_type} region(s)",
            job.name,
            report.written_count
        );
    }
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        feature_writer::FeatureRecord, reference_sequence::ReferenceSequence,
        source::AccessionData,
    };
    use std::collections::HashMap;
    use tempfile::tempdir;

    struct MemorySource(HashMap<String, AccessionData>);

    impl FeatureSource for MemorySource {
        fn load(&self, accession: &str) -> Result<AccessionData> {
            self.0
                .get(accession)
                .cloned()
                .ok_or_else(|| GbRegionsError::String(format!("unknown accession {accession}")))
        }
    }

    fn accession(name: &str, reference: &str, features: &[(&str, &str)]) -> (String, AccessionData) {
        (
            name.to_string(),
            AccessionData {
                accession: name.to_string(),
                reference: ReferenceSequence::from_sequence(reference),
                features: features
                    .iter()
                    .map(|(key, loc)| FeatureRecord::new(key, loc))
                    .collect(),
            },
        )
    }

    fn job(name: &str, path: &str, accessions: &[&str]) -> OrganismJob {
        OrganismJob {
            name: name.to_string(),
            path: PathBuf::from(path),
            accessions: accessions.iter().map(|s| s.to_string()).collect(),
        }
    }

    #[test]
    fn test_sanitize_organism_name() {
        assert_eq!(
            sanitize_organism_name("Candidatus [Bacteroides] sp. strain:X/1"),
            "Candidatus__Bacteroides__sp._strain_X_1"
        );
        assert_eq!(sanitize_organism_name(" Homo sapiens "), "_Homo_sapiens_");
        assert_eq!(
            output_file_name("Homo_sapiens", "tRNA", 2),
            "Homo_sapiens_tRNA_NC_2.txt"
        );
    }

    #[test]
    fn test_fetch_organism_writes_one_file_per_accession() {
        let td = tempdir().unwrap();
        let config = ExtractionConfig {
            output_root: td.path().to_path_buf(),
            ..Default::default()
        };
        let source = MemorySource(HashMap::from([
            accession("NC_1", "ACGTACGT", &[("CDS", "2..5"), ("tRNA", "1..2")]),
            accession("NC_2", "AACCGGTT", &[("CDS", "complement(join(1..2,7..8))")]),
        ]));
        let organism = job("Toy organism", "Bacteria/Proteobacteria/Gamma", &["NC_1", "NC_missing", "NC_2"]);

        let report = fetch_organism(&organism, &source, "CDS", &config).unwrap();
        assert_eq!(report.matched_count, 2);
        assert_eq!(report.written_count, 2);
        assert_eq!(report.failed_accessions, vec!["NC_missing".to_string()]);

        let dir = td.path().join("Bacteria/Proteobacteria/Gamma/Toy_organism");
        assert_eq!(
            fs::read_to_string(dir.join("Toy_organism_CDS_NC_1.txt")).unwrap(),
            "CDS 2..5\nCGTA\n"
        );
        assert!(!dir.join("Toy_organism_CDS_NC_2.txt").exists());
        assert_eq!(
            fs::read_to_string(dir.join("Toy_organism_CDS_NC_3.txt")).unwrap(),
            "CDS complement(join(1..2,7..8))\nAATT\n"
        );
        assert!(organism.is_downloaded(td.path()));
    }

    #[test]
    fn test_fetch_organism_reports_not_found() {
        let td = tempdir().unwrap();
        let config = ExtractionConfig {
            output_root: td.path().to_path_buf(),
            ..Default::default()
        };
        let source = MemorySource(HashMap::from([accession("NC_1", "ACGT", &[("CDS", "1..4")])]));
        let report = fetch_organism(&job("Toy", "", &["NC_1"]), &source, "rRNA", &config).unwrap();
        assert_eq!(report.matched_count, 0);
        assert!(report.is_not_found());
        assert!(!job("Toy", "", &["NC_1"]).is_downloaded(td.path()));
    }

    #[test]
    fn test_select_jobs_by_lineage_node() {
        let jobs = vec![
            job("A a", "Bacteria/Firmicutes/Bacilli", &["NC_1"]),
            job("B b", "Bacteria/Proteobacteria/Gamma", &["NC_2"]),
            job("C c", "Eukaryota/Animals/Mammals", &["NC_3"]),
        ];
        let names = |selection: &str| -> Vec<String> {
            select_jobs(&jobs, Path::new(selection))
                .into_iter()
                .map(|job| job.name.clone())
                .collect()
        };
        assert_eq!(names("Bacteria"), vec!["A a", "B b"]);
        assert_eq!(names("Bacteria/Proteobacteria/Gamma/B_b"), vec!["B b"]);
        // Component-wise, so "Bact" does not match "Bacteria".
        assert!(names("Bact").is_empty());
    }
}
