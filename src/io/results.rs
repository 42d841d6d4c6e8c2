//! CSV writers for result tables

use std::path::Path;

use serde::Serialize;

use crate::enrichment::GoRow;
use crate::error::Result;
use crate::linear::TopTableRow;
use crate::testing::TopTags;

fn create_parent_dir(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    Ok(())
}

fn write_rows<P: AsRef<Path>, T: Serialize>(path: P, rows: &[T]) -> Result<()> {
    let path = path.as_ref();
    create_parent_dir(path)?;
    let mut writer = csv::Writer::from_path(path)?;
    for row in rows {
        writer.serialize(row)?;
    }
    writer.flush()?;
    log::info!("Wrote {} rows to {}", rows.len(), path.display());
    Ok(())
}

/// Write the moderated t table (`ID, adj.P.Val, P.Value, t, B, logFC, Gene.symbol, Gene.title`)
pub fn write_top_table<P: AsRef<Path>>(path: P, rows: &[TopTableRow]) -> Result<()> {
    write_rows(path, rows)
}

pub fn write_go_table<P: AsRef<Path>>(path: P, rows: &[GoRow]) -> Result<()> {
    write_rows(path, rows)
}

/// Write the likelihood ratio test table: gene annotation columns followed
/// by `logFC, logCPM, LR, PValue, FDR`
pub fn write_top_tags<P: AsRef<Path>>(path: P, table: &TopTags) -> Result<()> {
    let path = path.as_ref();
    create_parent_dir(path)?;
    let mut writer = csv::Writer::from_path(path)?;

    let mut header: Vec<&str> = table.annotation_columns.iter().map(String::as_str).collect();
    header.extend(["logFC", "logCPM", "LR", "PValue", "FDR"]);
    writer.write_record(&header)?;

    for row in &table.rows {
        let mut record = row.annotation.clone();
        record.extend(
            [row.log_fc, row.log_cpm, row.lr, row.p_value, row.fdr]
                .iter()
                .map(|v| v.to_string()),
        );
        writer.write_record(&record)?;
    }
    writer.flush()?;
    log::info!("Wrote {} genes to {}", table.rows.len(), path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{AdjustMethod, TopTagsRow};
    use tempfile::tempdir;

    #[test]
    fn test_write_top_table_header() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("out").join("table.csv");
        let rows = vec![TopTableRow {
            id: "1007_s_at".into(),
            adj_p_value: 0.01,
            p_value: 0.001,
            t: 5.5,
            b: 2.0,
            log_fc: 1.25,
            gene_symbol: "DDR1".into(),
            gene_title: "discoidin domain receptor, 1".into(),
        }];
        write_top_table(&path, &rows).unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        let mut lines = content.lines();
        assert_eq!(lines.next().unwrap(), "ID,adj.P.Val,P.Value,t,B,logFC,Gene.symbol,Gene.title");
        assert_eq!(lines.next().unwrap(), "1007_s_at,0.01,0.001,5.5,2.0,1.25,DDR1,\"discoidin domain receptor, 1\"");
    }

    #[test]
    fn test_write_top_tags_dynamic_columns() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("tags.csv");
        let table = TopTags {
            coef_name: "tissuetumor".into(),
            adjust: AdjustMethod::BenjaminiHochberg,
            annotation_columns: vec!["GeneID".into(), "Symbol".into()],
            rows: vec![TopTagsRow {
                gene_id: "7157".into(),
                annotation: vec!["7157".into(), "TP53".into()],
                log_fc: -2.5,
                log_cpm: 6.0,
                lr: 30.0,
                p_value: 1e-8,
                fdr: 1e-6,
            }],
        };
        write_top_tags(&path, &table).unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines[0], "GeneID,Symbol,logFC,logCPM,LR,PValue,FDR");
        assert!(lines[1].starts_with("7157,TP53,-2.5,6,30,"));
    }
}
