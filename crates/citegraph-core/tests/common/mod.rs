//! Shared fixtures for citegraph-core integration tests
//!
//! Builds small synthetic dumps in the same container formats as the real
//! ones: a tar.gz of metadata CSVs and a zip of citation CSVs.

#![allow(dead_code)]

use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use citegraph_core::{
    CacheOptions, DataLayout, TarredCsvMetadata, VocabularyCache, ZippedCsvCitations,
};

/// Write a gzip tarball containing `entries` as (name, content) pairs.
pub fn write_tarball(path: &Path, entries: &[(&str, String)]) {
    let file = File::create(path).unwrap();
    let encoder = flate2::write::GzEncoder::new(file, flate2::Compression::default());
    let mut builder = tar::Builder::new(encoder);
    for (name, content) in entries {
        let mut header = tar::Header::new_gnu();
        header.set_size(content.len() as u64);
        header.set_mode(0o644);
        header.set_cksum();
        builder
            .append_data(&mut header, name, content.as_bytes())
            .unwrap();
    }
    builder.into_inner().unwrap().finish().unwrap();
}

/// Write a zip file containing `entries` as (name, content) pairs.
pub fn write_zip(path: &Path, entries: &[(&str, String)]) {
    let file = File::create(path).unwrap();
    let mut writer = zip::ZipWriter::new(file);
    let options = zip::write::SimpleFileOptions::default()
        .compression_method(zip::CompressionMethod::Deflated);
    for (name, content) in entries {
        writer.start_file(*name, options).unwrap();
        writer.write_all(content.as_bytes()).unwrap();
    }
    writer.finish().unwrap();
}

/// Metadata CSV with an `id` column holding each bundle
pub fn metadata_csv(bundles: &[&str]) -> String {
    let mut csv = String::from("id,title,pub_date\n");
    for (i, bundle) in bundles.iter().enumerate() {
        csv.push_str(&format!("\"{}\",Title {},2021\n", bundle, i));
    }
    csv
}

/// Citation CSV whose first column holds each citation identifier
pub fn citations_csv(rows: &[&str]) -> String {
    let mut csv = String::from("oci,citing,cited,creation,timespan,journal_sc,author_sc\n");
    for row in rows {
        csv.push_str(&format!("{},x,y,2021,P1Y,no,no\n", row));
    }
    csv
}

/// Raw dumps laid out on disk
pub struct Dumps {
    pub metadata: PathBuf,
    pub citations: Vec<PathBuf>,
}

impl Dumps {
    /// Write the metadata into one tarball and split citations across two zips.
    pub fn write(dir: &Path, bundles: &[&str], rows: &[&str]) -> Self {
        let raw = dir.join("raw");
        std::fs::create_dir_all(&raw).unwrap();

        let metadata = raw.join("meta.tar.gz");
        let (first_half, second_half) = bundles.split_at(bundles.len() / 2);
        write_tarball(
            &metadata,
            &[
                ("csv/0001.csv", metadata_csv(first_half)),
                ("csv/0002.csv", metadata_csv(second_half)),
            ],
        );

        let (first_rows, second_rows) = rows.split_at(rows.len() / 2);
        let first = raw.join("citations-1.zip");
        let second = raw.join("citations-2.zip");
        write_zip(&first, &[("part-a.csv", citations_csv(first_rows))]);
        write_zip(&second, &[("part-b.csv", citations_csv(second_rows))]);

        Self {
            metadata,
            citations: vec![first, second],
        }
    }

    pub fn cache(&self, data_dir: &Path, options: CacheOptions) -> VocabularyCache {
        VocabularyCache::with_batch_size(
            DataLayout::new(data_dir),
            Arc::new(TarredCsvMetadata::new(&self.metadata)),
            Arc::new(ZippedCsvCitations::new(self.citations.clone())),
            options,
            3,
        )
    }
}

/// Small corpus used by most tests.
///
/// br/1 cites br/2 and br/3, br/3 cites br/2, br/2 cites br/1, br/4 has no
/// external identifiers and br/5 only appears in citations.
pub const BUNDLES: &[&str] = &[
    "omid:br/1 pmid:11 doi:10.1/a",
    "omid:br/2 pmid:22",
    "omid:br/3 doi:10.1/c",
    "omid:br/4",
    "doi:10.1/orphan",
];

pub const CITATIONS: &[&str] = &[
    "oci:1-2",
    "oci:1-3",
    "oci:3-2",
    "oci:2-1",
    "oci:4-1",
    "oci:1-5",
    "garbage",
    "oci:1-2",
];
