//! Extraction of functional regions (CDS, tRNA, intron, ...) from annotated
//! nucleotide records into per-organism text files.

pub mod config;
pub mod error;
pub mod feature_location;
pub mod feature_writer;
pub mod iupac_code;
pub mod ncbi_genbank_xml;
pub mod organism;
pub mod reference_sequence;
pub mod source;

pub use error::{GbRegionsError, Result};
pub use feature_location::{GenomicInterval, LocationError, LocationExpression, parse_location};
pub use feature_writer::{FeatureRecord, FeatureWriter, ProcessReport};
pub use reference_sequence::ReferenceSequence;
