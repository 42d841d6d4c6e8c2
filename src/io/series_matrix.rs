//! GEO series matrix and platform annotation parsing

use std::collections::HashMap;
use std::fs::File;
use std::io::{BufRead, BufReader, Read};
use std::path::Path;

use flate2::read::MultiGzDecoder;
use ndarray::Array2;

use crate::data::{ExpressionMatrix, GeneAnnotation};
use crate::error::{DgeError, Result};

const TABLE_BEGIN: &str = "!series_matrix_table_begin";
const TABLE_END: &str = "!series_matrix_table_end";
const PLATFORM_BEGIN: &str = "!platform_table_begin";
const PLATFORM_END: &str = "!platform_table_end";

/// Open a text file, transparently decompressing gzip content
pub fn open_text<P: AsRef<Path>>(path: P) -> Result<Box<dyn BufRead>> {
    let mut file = File::open(path.as_ref())?;
    let mut magic = [0u8; 2];
    let n = file.read(&mut magic)?;
    let file = File::open(path.as_ref())?;
    if n == 2 && magic == [0x1f, 0x8b] {
        Ok(Box::new(BufReader::new(MultiGzDecoder::new(file))))
    } else {
        Ok(Box::new(BufReader::new(file)))
    }
}

/// Strip surrounding quotes and whitespace
fn unquote(s: &str) -> String {
    let s = s.trim();
    if s.len() >= 2 && s.starts_with('"') && s.ends_with('"') {
        s[1..s.len() - 1].to_string()
    } else {
        s.to_string()
    }
}

/// Parse an expression cell; GEO writes missing values as `null`, `NA` or blanks
fn parse_value(cell: &str) -> Result<f64> {
    let v = unquote(cell);
    if v.is_empty() || v.eq_ignore_ascii_case("null") || v == "NA" || v.eq_ignore_ascii_case("nan") {
        return Ok(f64::NAN);
    }
    v.parse::<f64>().map_err(|_| DgeError::ParseError {
        format: "series matrix".to_string(),
        reason: format!("invalid expression value '{}'", v),
    })
}

/// Make syntactically valid column names: every character outside
/// `[A-Za-z0-9._]` becomes `.`
pub fn make_names(name: &str) -> String {
    let mut out: String = name
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '.' || c == '_' { c } else { '.' })
        .collect();
    if out.is_empty() || out.starts_with(|c: char| c.is_ascii_digit() || c == '_') {
        out.insert(0, 'X');
    }
    out
}

/// One GEO series matrix: header metadata plus the expression table
#[derive(Debug, Clone)]
pub struct SeriesMatrix {
    pub accession: Option<String>,
    pub title: Option<String>,
    pub platform: Option<String>,
    /// `!Sample_geo_accession` per sample; the table's column names when absent
    pub sample_accessions: Vec<String>,
    /// `!Sample_title` per sample
    pub sample_titles: Vec<String>,
    /// `!Sample_source_name_ch1` per sample
    pub sample_source_names: Vec<String>,
    /// All `!Sample_characteristics_ch1` rows, each one value per sample
    pub sample_characteristics: Vec<Vec<String>>,
    pub expression: ExpressionMatrix,
}

impl SeriesMatrix {
    /// Characteristics of one sample joined with `; `
    pub fn characteristics_of(&self, sample_idx: usize) -> String {
        self.sample_characteristics
            .iter()
            .filter_map(|row| row.get(sample_idx))
            .filter(|v| !v.is_empty())
            .cloned()
            .collect::<Vec<_>>()
            .join("; ")
    }
}

/// Read a series matrix file (`.txt` or `.txt.gz`)
pub fn read_series_matrix<P: AsRef<Path>>(path: P) -> Result<SeriesMatrix> {
    parse_series_matrix(open_text(path)?)
}

pub fn parse_series_matrix<R: BufRead>(reader: R) -> Result<SeriesMatrix> {
    let mut header: HashMap<String, Vec<Vec<String>>> = HashMap::new();
    let mut in_table = false;
    let mut table_header: Option<Vec<String>> = None;
    let mut feature_ids = Vec::new();
    let mut rows: Vec<Vec<f64>> = Vec::new();

    for line in reader.lines() {
        let line = line?;
        let trimmed = line.trim_end_matches(&['\r', '\n'][..]);
        if trimmed.trim().is_empty() {
            continue;
        }

        if trimmed.starts_with(TABLE_BEGIN) {
            in_table = true;
            continue;
        }
        if trimmed.starts_with(TABLE_END) {
            in_table = false;
            continue;
        }

        if !in_table {
            if let Some(rest) = trimmed.strip_prefix('!') {
                let mut fields = rest.split('\t');
                let key = fields.next().unwrap_or_default().to_string();
                let values: Vec<String> = fields.map(unquote).collect();
                header.entry(key).or_default().push(values);
            }
            continue;
        }

        let fields: Vec<&str> = trimmed.split('\t').collect();
        match &table_header {
            None => {
                table_header = Some(fields.iter().map(|f| unquote(f)).collect());
            }
            Some(cols) => {
                if fields.len() != cols.len() {
                    return Err(DgeError::ParseError {
                        format: "series matrix".to_string(),
                        reason: format!(
                            "row {} has {} columns, expected {}",
                            feature_ids.len() + 1,
                            fields.len(),
                            cols.len()
                        ),
                    });
                }
                feature_ids.push(unquote(fields[0]));
                rows.push(fields[1..].iter().map(|f| parse_value(f)).collect::<Result<_>>()?);
            }
        }
    }

    let cols = table_header.ok_or_else(|| DgeError::ParseError {
        format: "series matrix".to_string(),
        reason: "no expression table found".to_string(),
    })?;
    let sample_ids: Vec<String> = cols[1..].to_vec();
    if feature_ids.is_empty() {
        return Err(DgeError::EmptyData {
            reason: "series matrix expression table has no rows".to_string(),
        });
    }

    let n_samples = sample_ids.len();
    let mut values = Array2::from_elem((feature_ids.len(), n_samples), f64::NAN);
    for (i, row) in rows.iter().enumerate() {
        for (j, &v) in row.iter().enumerate() {
            values[[i, j]] = v;
        }
    }

    let first = |key: &str| -> Option<String> {
        header
            .get(key)
            .and_then(|rows| rows.first())
            .and_then(|v| v.first())
            .cloned()
    };

    let sample_row = |key: &str| -> Option<Vec<String>> { header.get(key).and_then(|rows| rows.first()).cloned() };
    let sample_accessions = sample_row("Sample_geo_accession").unwrap_or_else(|| sample_ids.clone());
    let sample_titles = sample_row("Sample_title").unwrap_or_else(|| vec![String::new(); n_samples]);
    let sample_source_names = sample_row("Sample_source_name_ch1").unwrap_or_else(|| vec![String::new(); n_samples]);
    let sample_characteristics = header
        .get("Sample_characteristics_ch1")
        .cloned()
        .unwrap_or_default();

    log::debug!(
        "Parsed series matrix: {} features x {} samples",
        feature_ids.len(),
        n_samples
    );

    Ok(SeriesMatrix {
        accession: first("Series_geo_accession"),
        title: first("Series_title"),
        platform: first("Series_platform_id")
            .or_else(|| header.get("Sample_platform_id").and_then(|r| r[0].first().cloned())),
        sample_accessions,
        sample_titles,
        sample_source_names,
        sample_characteristics,
        expression: ExpressionMatrix::new(values, feature_ids, sample_ids)?,
    })
}

/// Platform annotation table (GPL `.annot` SOFT file or plain TSV)
#[derive(Debug, Clone)]
pub struct PlatformTable {
    columns: Vec<String>,
    index: HashMap<String, usize>,
    rows: Vec<Vec<String>>,
}

impl PlatformTable {
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn n_rows(&self) -> usize {
        self.rows.len()
    }

    /// Build an annotation aligned to `feature_ids`, column names passed
    /// through [`make_names`] (e.g. `Gene symbol` -> `Gene.symbol`).
    /// Features absent from the platform get empty values.
    pub fn align(&self, feature_ids: &[String]) -> Result<GeneAnnotation> {
        let mut ann = GeneAnnotation::new(feature_ids.len());
        let mut missing = 0usize;
        let positions: Vec<Option<usize>> = feature_ids
            .iter()
            .map(|id| {
                let pos = self.index.get(id).copied();
                if pos.is_none() {
                    missing += 1;
                }
                pos
            })
            .collect();
        if missing > 0 {
            log::warn!("{} features have no platform annotation", missing);
        }

        for (c, name) in self.columns.iter().enumerate() {
            let values = positions
                .iter()
                .map(|p| p.map(|r| self.rows[r].get(c).cloned().unwrap_or_default()).unwrap_or_default())
                .collect();
            ann.add_column(&make_names(name), values)?;
        }
        Ok(ann)
    }
}

pub fn read_platform_table<P: AsRef<Path>>(path: P) -> Result<PlatformTable> {
    parse_platform_table(open_text(path)?)
}

/// Parse a platform table. SOFT files delimit the table with
/// `!platform_table_begin`/`_end`; without those markers the first
/// non-comment line is the header.
pub fn parse_platform_table<R: BufRead>(reader: R) -> Result<PlatformTable> {
    let lines: Vec<String> = reader.lines().collect::<std::io::Result<_>>()?;
    let has_markers = lines.iter().any(|l| l.starts_with(PLATFORM_BEGIN));

    let mut in_table = !has_markers;
    let mut columns: Option<Vec<String>> = None;
    let mut rows = Vec::new();

    for line in &lines {
        let line = line.trim_end_matches(&['\r', '\n'][..]);
        if line.starts_with(PLATFORM_BEGIN) {
            in_table = true;
            continue;
        }
        if line.starts_with(PLATFORM_END) {
            break;
        }
        if !in_table || line.trim().is_empty() {
            continue;
        }
        if columns.is_none() && (line.starts_with('#') || line.starts_with('!') || line.starts_with('^')) {
            continue;
        }

        let fields: Vec<String> = line.split('\t').map(unquote).collect();
        if columns.is_none() {
            columns = Some(fields);
        } else {
            rows.push(fields);
        }
    }

    let columns = columns.ok_or_else(|| DgeError::ParseError {
        format: "platform annotation".to_string(),
        reason: "no table header found".to_string(),
    })?;

    let mut index = HashMap::with_capacity(rows.len());
    for (i, row) in rows.iter().enumerate() {
        if let Some(id) = row.first() {
            index.entry(id.clone()).or_insert(i);
        }
    }

    Ok(PlatformTable { columns, index, rows })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Cursor, Write};

    const SERIES: &str = "!Series_title\t\"Tumor vs normal\"\n\
!Series_geo_accession\t\"GSE0001\"\n\
!Series_platform_id\t\"GPL570\"\n\
!Sample_title\t\"tumor 1\"\t\"normal 1\"\t\"tumor 2\"\n\
!Sample_geo_accession\t\"GSM1\"\t\"GSM2\"\t\"GSM3\"\n\
!Sample_source_name_ch1\t\"breast tumor\"\t\"adjacent normal\"\t\"breast tumor\"\n\
!Sample_characteristics_ch1\t\"tissue: tumor\"\t\"tissue: normal\"\t\"tissue: tumor\"\n\
!Sample_characteristics_ch1\t\"age: 50\"\t\"age: 61\"\t\"\"\n\
!series_matrix_table_begin\n\
\"ID_REF\"\t\"GSM1\"\t\"GSM2\"\t\"GSM3\"\n\
\"1007_s_at\"\t10.5\t11.0\tnull\n\
\"1053_at\"\t5\t6\t7\n\
!series_matrix_table_end\n";

    #[test]
    fn test_parse_series_matrix() {
        let sm = parse_series_matrix(Cursor::new(SERIES)).unwrap();
        assert_eq!(sm.accession.as_deref(), Some("GSE0001"));
        assert_eq!(sm.platform.as_deref(), Some("GPL570"));
        assert_eq!(sm.expression.n_features(), 2);
        assert_eq!(sm.expression.sample_ids(), &["GSM1", "GSM2", "GSM3"]);
        assert!(sm.expression.values()[[0, 2]].is_nan());
        assert_eq!(sm.sample_titles[1], "normal 1");
        assert_eq!(sm.sample_accessions, vec!["GSM1", "GSM2", "GSM3"]);
        assert_eq!(sm.sample_source_names[1], "adjacent normal");
        assert_eq!(sm.characteristics_of(0), "tissue: tumor; age: 50");
        assert_eq!(sm.characteristics_of(2), "tissue: tumor");
    }

    #[test]
    fn test_missing_table_is_error() {
        assert!(parse_series_matrix(Cursor::new("!Series_title\t\"x\"\n")).is_err());
    }

    #[test]
    fn test_read_gzipped_series_matrix() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        {
            let mut enc = flate2::write::GzEncoder::new(&mut file, flate2::Compression::default());
            enc.write_all(SERIES.as_bytes()).unwrap();
            enc.finish().unwrap();
        }
        let sm = read_series_matrix(file.path()).unwrap();
        assert_eq!(sm.expression.n_samples(), 3);
    }

    #[test]
    fn test_make_names() {
        assert_eq!(make_names("Gene symbol"), "Gene.symbol");
        assert_eq!(make_names("ID"), "ID");
        assert_eq!(make_names("5' end"), "X5..end");
    }

    #[test]
    fn test_platform_table_soft() {
        let soft = "^Annotation\n\
!Annotation_platform = GPL570\n\
#ID = probe\n\
!platform_table_begin\n\
ID\tGene title\tGene symbol\n\
1007_s_at\tdiscoidin domain receptor\tDDR1\n\
1053_at\treplication factor C\tRFC2\n\
!platform_table_end\n";
        let table = parse_platform_table(Cursor::new(soft)).unwrap();
        assert_eq!(table.n_rows(), 2);
        let ann = table
            .align(&["1053_at".to_string(), "unknown".to_string()])
            .unwrap();
        assert_eq!(ann.value("Gene.symbol", 0), "RFC2");
        assert_eq!(ann.value("Gene.symbol", 1), "");
        assert_eq!(ann.column_names(), vec!["ID", "Gene.title", "Gene.symbol"]);
    }

    #[test]
    fn test_platform_table_plain_tsv() {
        let tsv = "# comment\nID\tGene symbol\nA\tTP53\n";
        let table = parse_platform_table(Cursor::new(tsv)).unwrap();
        assert_eq!(table.columns(), &["ID".to_string(), "Gene symbol".to_string()]);
    }
}
