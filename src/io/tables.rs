//! Tab-delimited input tables: count table, sample sheet, gene map, GO annotation

use std::collections::HashMap;
use std::path::Path;

use ndarray::Array2;

use crate::data::{CountMatrix, DGEList, GeneAnnotation, SampleSheet, Tissue};
use crate::enrichment::{GoAnnotation, Ontology};
use crate::error::{DgeError, Result};

use super::series_matrix::open_text;

fn tsv_reader<P: AsRef<Path>>(path: P) -> Result<csv::Reader<Box<dyn std::io::BufRead>>> {
    Ok(csv::ReaderBuilder::new()
        .delimiter(b'\t')
        .has_headers(true)
        .flexible(false)
        .comment(Some(b'#'))
        .from_reader(open_text(path)?))
}

fn is_count(cell: &str) -> bool {
    let cell = cell.trim();
    !cell.is_empty() && cell.parse::<f64>().is_ok()
}

/// How to split the count table into annotation and count columns
#[derive(Debug, Clone, Default)]
pub struct CountTableLayout {
    /// Number of leading annotation columns; detected when `None` as the
    /// leading columns holding at least one non-numeric value
    pub annotation_columns: Option<usize>,
    /// Annotation column used as gene identifier; first column when `None`
    pub id_column: Option<String>,
}

/// Read a tab-delimited count table into a DGEList
pub fn read_count_table<P: AsRef<Path>>(path: P, layout: &CountTableLayout) -> Result<DGEList> {
    let mut reader = tsv_reader(path)?;
    let header: Vec<String> = reader
        .headers()?
        .iter()
        .map(|h| h.trim().trim_matches('"').to_string())
        .collect();
    let records: Vec<csv::StringRecord> = reader.records().collect::<std::result::Result<_, _>>()?;

    if records.is_empty() {
        return Err(DgeError::EmptyData {
            reason: "count table has no rows".to_string(),
        });
    }

    let n_annot = match layout.annotation_columns {
        Some(n) => n,
        None => {
            let numeric_from = (0..header.len())
                .rev()
                .take_while(|&c| records.iter().all(|r| r.get(c).map_or(false, is_count)))
                .last()
                .unwrap_or(header.len());
            numeric_from.max(1)
        }
    };

    if n_annot == 0 || n_annot >= header.len() {
        return Err(DgeError::InvalidCountMatrix {
            reason: format!(
                "need at least one annotation column and one count column, header has {} columns with {} annotation",
                header.len(),
                n_annot
            ),
        });
    }

    let id_idx = match &layout.id_column {
        Some(name) => header[..n_annot]
            .iter()
            .position(|h| h == name)
            .ok_or_else(|| DgeError::InvalidCountMatrix {
                reason: format!("id column '{}' not among annotation columns {:?}", name, &header[..n_annot]),
            })?,
        None => 0,
    };

    let sample_ids: Vec<String> = header[n_annot..].to_vec();
    let n_genes = records.len();
    let mut counts = Array2::zeros((n_genes, sample_ids.len()));
    let mut annot_values: Vec<Vec<String>> = vec![Vec::with_capacity(n_genes); n_annot];

    for (i, record) in records.iter().enumerate() {
        for (c, values) in annot_values.iter_mut().enumerate() {
            values.push(record.get(c).unwrap_or_default().trim().trim_matches('"').to_string());
        }
        for (j, cell) in record.iter().skip(n_annot).enumerate() {
            counts[[i, j]] = cell.trim().parse::<f64>().map_err(|_| DgeError::InvalidCountMatrix {
                reason: format!("invalid count '{}' in row {}, column {}", cell, i + 2, sample_ids[j]),
            })?;
        }
    }

    let gene_ids = annot_values[id_idx].clone();
    let mut genes = GeneAnnotation::new(n_genes);
    for (name, values) in header[..n_annot].iter().zip(annot_values) {
        genes.add_column(name, values)?;
    }

    log::info!(
        "Read count table: {} genes x {} samples ({} annotation columns)",
        n_genes,
        sample_ids.len(),
        n_annot
    );

    DGEList::new(CountMatrix::new(counts, gene_ids, sample_ids)?, genes)
}

fn column_index(header: &csv::StringRecord, name: &str, what: &str) -> Result<usize> {
    header
        .iter()
        .position(|h| h.trim().eq_ignore_ascii_case(name))
        .ok_or_else(|| DgeError::InvalidInput {
            reason: format!("{} is missing column '{}'", what, name),
        })
}

/// Read a sample sheet with `sample`, `patient` and `tissue` columns
pub fn read_sample_sheet<P: AsRef<Path>>(path: P) -> Result<SampleSheet> {
    let mut reader = tsv_reader(path)?;
    let header = reader.headers()?.clone();
    let s = column_index(&header, "sample", "sample sheet")?;
    let p = column_index(&header, "patient", "sample sheet")?;
    let t = column_index(&header, "tissue", "sample sheet")?;

    let mut samples = Vec::new();
    let mut patients = Vec::new();
    let mut tissues = Vec::new();
    for record in reader.records() {
        let record = record?;
        samples.push(record.get(s).unwrap_or_default().trim().to_string());
        patients.push(record.get(p).unwrap_or_default().trim().to_string());
        tissues.push(record.get(t).unwrap_or_default().parse::<Tissue>()?);
    }

    if samples.is_empty() {
        return Err(DgeError::EmptyData {
            reason: "sample sheet has no rows".to_string(),
        });
    }
    SampleSheet::new(samples, patients, tissues)
}

/// Accession to gene mapping (e.g. RefSeq to Entrez gene id and symbol)
#[derive(Debug, Clone, Default)]
pub struct GeneMap {
    entries: HashMap<String, (String, String)>,
}

impl GeneMap {
    pub fn insert(&mut self, accession: &str, gene_id: &str, symbol: &str) {
        self.entries
            .entry(accession.to_string())
            .or_insert_with(|| (gene_id.to_string(), symbol.to_string()));
    }

    /// Gene id and symbol for an accession; version suffixes (`NM_000546.5`)
    /// are ignored when the exact key is absent
    pub fn lookup(&self, accession: &str) -> Option<(&str, &str)> {
        let hit = self.entries.get(accession).or_else(|| {
            accession
                .split_once('.')
                .and_then(|(base, _)| self.entries.get(base))
        });
        hit.map(|(g, s)| (g.as_str(), s.as_str()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Read a gene map with `accession`, `gene_id` and `symbol` columns
pub fn read_gene_map<P: AsRef<Path>>(path: P) -> Result<GeneMap> {
    let mut reader = tsv_reader(path)?;
    let header = reader.headers()?.clone();
    let a = column_index(&header, "accession", "gene map")?;
    let g = column_index(&header, "gene_id", "gene map")?;
    let s = column_index(&header, "symbol", "gene map")?;

    let mut map = GeneMap::default();
    for record in reader.records() {
        let record = record?;
        let accession = record.get(a).unwrap_or_default().trim();
        if accession.is_empty() {
            continue;
        }
        map.insert(
            accession,
            record.get(g).unwrap_or_default().trim(),
            record.get(s).unwrap_or_default().trim(),
        );
    }
    log::info!("Read gene map with {} accessions", map.len());
    Ok(map)
}

/// Read GO annotation with `gene_id`, `go_id`, `ontology` and `term` columns
pub fn read_go_annotation<P: AsRef<Path>>(path: P) -> Result<GoAnnotation> {
    let mut reader = tsv_reader(path)?;
    let header = reader.headers()?.clone();
    let g = column_index(&header, "gene_id", "GO annotation")?;
    let id = column_index(&header, "go_id", "GO annotation")?;
    let o = column_index(&header, "ontology", "GO annotation")?;
    let t = column_index(&header, "term", "GO annotation")?;

    let mut go = GoAnnotation::new();
    for record in reader.records() {
        let record = record?;
        let gene_id = record.get(g).unwrap_or_default().trim();
        let go_id = record.get(id).unwrap_or_default().trim();
        if gene_id.is_empty() || go_id.is_empty() {
            continue;
        }
        let ontology: Ontology = record.get(o).unwrap_or_default().parse()?;
        go.insert(gene_id, go_id, ontology, record.get(t).unwrap_or_default().trim());
    }
    if go.n_genes() == 0 {
        return Err(DgeError::EmptyData {
            reason: "GO annotation has no rows".to_string(),
        });
    }
    log::info!("Read GO annotation: {} genes, {} terms", go.n_genes(), go.n_terms());
    Ok(go)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn write_tmp(content: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_count_table_detects_annotation_columns() {
        let file = write_tmp(
            "RefSeqID\tSymbol\t8N\t8T\n\
             NM_1\tTP53\t10\t20\n\
             NM_2\tEGFR\t0\t5\n",
        );
        let y = read_count_table(file.path(), &CountTableLayout::default()).unwrap();
        assert_eq!(y.n_genes(), 2);
        assert_eq!(y.counts().sample_ids(), &["8N".to_string(), "8T".to_string()]);
        assert_eq!(y.counts().gene_ids()[0], "NM_1");
        assert_eq!(y.genes().value("Symbol", 1), "EGFR");
        assert_eq!(y.lib_sizes(), &[10.0, 25.0]);
    }

    #[test]
    fn test_count_table_explicit_layout() {
        let file = write_tmp(
            "RefSeqID\tSymbol\tNbrOfExons\t8N\t8T\n\
             NM_1\tTP53\t11\t10\t20\n\
             NM_2\tEGFR\t28\t3\t5\n",
        );
        let layout = CountTableLayout {
            annotation_columns: Some(3),
            id_column: Some("Symbol".to_string()),
        };
        let y = read_count_table(file.path(), &layout).unwrap();
        assert_eq!(y.n_samples(), 2);
        assert_eq!(y.counts().gene_ids(), &["TP53".to_string(), "EGFR".to_string()]);
        assert_eq!(y.genes().value("NbrOfExons", 0), "11");
    }

    #[test]
    fn test_count_table_bad_value() {
        let file = write_tmp("id\ta\tb\ng1\t1\tx\n");
        let layout = CountTableLayout {
            annotation_columns: Some(1),
            id_column: None,
        };
        assert!(read_count_table(file.path(), &layout).is_err());
    }

    #[test]
    fn test_sample_sheet() {
        let file = write_tmp("sample\tpatient\ttissue\n8N\t8\tnormal\n8T\t8\ttumor\n");
        let sheet = read_sample_sheet(file.path()).unwrap();
        assert_eq!(sheet.n_samples(), 2);
        assert_eq!(sheet.tissues(), &[Tissue::Normal, Tissue::Tumor]);
    }

    #[test]
    fn test_gene_map_version_fallback() {
        let file = write_tmp("accession\tgene_id\tsymbol\nNM_000546\t7157\tTP53\n");
        let map = read_gene_map(file.path()).unwrap();
        assert_eq!(map.lookup("NM_000546.5"), Some(("7157", "TP53")));
        assert_eq!(map.lookup("NM_999"), None);
    }

    #[test]
    fn test_go_annotation() {
        let file = write_tmp(
            "gene_id\tgo_id\tontology\tterm\n\
             7157\tGO:0006915\tBP\tapoptotic process\n\
             7157\tGO:0005634\tCC\tnucleus\n\
             4609\tGO:0005634\tCC\tnucleus\n",
        );
        let go = read_go_annotation(file.path()).unwrap();
        assert_eq!(go.n_genes(), 2);
        assert_eq!(go.n_terms(), 2);
        assert_eq!(go.term("GO:0005634").unwrap().ontology, Ontology::CellularComponent);

        let bad = write_tmp("gene_id\tgo_id\tontology\tterm\n1\tGO:1\tXX\tfoo\n");
        assert!(read_go_annotation(bad.path()).is_err());
    }
}
