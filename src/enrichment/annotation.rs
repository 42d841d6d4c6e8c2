//! Gene ontology annotation of genes

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fmt;
use std::str::FromStr;

use crate::error::{DgeError, Result};

/// GO sub-ontology
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Ontology {
    BiologicalProcess,
    CellularComponent,
    MolecularFunction,
}

impl FromStr for Ontology {
    type Err = DgeError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "bp" | "p" | "biological_process" => Ok(Ontology::BiologicalProcess),
            "cc" | "c" | "cellular_component" => Ok(Ontology::CellularComponent),
            "mf" | "f" | "molecular_function" => Ok(Ontology::MolecularFunction),
            other => Err(DgeError::InvalidInput {
                reason: format!("unknown GO ontology '{}' (BP, CC, MF)", other),
            }),
        }
    }
}

impl fmt::Display for Ontology {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let code = match self {
            Ontology::BiologicalProcess => "BP",
            Ontology::CellularComponent => "CC",
            Ontology::MolecularFunction => "MF",
        };
        write!(f, "{}", code)
    }
}

/// GO term with its ontology and name
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GoTerm {
    pub ontology: Ontology,
    pub name: String,
}

/// Mapping of gene ids to the GO terms annotating them
#[derive(Debug, Clone, Default)]
pub struct GoAnnotation {
    terms: BTreeMap<String, GoTerm>,
    gene_terms: HashMap<String, BTreeSet<String>>,
}

impl GoAnnotation {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record that `gene_id` is annotated with `go_id`. The first name seen
    /// for a term is kept.
    pub fn insert(&mut self, gene_id: &str, go_id: &str, ontology: Ontology, term: &str) {
        self.terms.entry(go_id.to_string()).or_insert_with(|| GoTerm {
            ontology,
            name: term.to_string(),
        });
        self.gene_terms
            .entry(gene_id.to_string())
            .or_default()
            .insert(go_id.to_string());
    }

    pub fn term(&self, go_id: &str) -> Option<&GoTerm> {
        self.terms.get(go_id)
    }

    pub fn terms_of(&self, gene_id: &str) -> Option<&BTreeSet<String>> {
        self.gene_terms.get(gene_id)
    }

    pub fn n_genes(&self) -> usize {
        self.gene_terms.len()
    }

    pub fn n_terms(&self) -> usize {
        self.terms.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ontology_parse() {
        assert_eq!("BP".parse::<Ontology>().unwrap(), Ontology::BiologicalProcess);
        assert_eq!("molecular_function".parse::<Ontology>().unwrap(), Ontology::MolecularFunction);
        assert_eq!(Ontology::CellularComponent.to_string(), "CC");
        assert!("XX".parse::<Ontology>().is_err());
    }

    #[test]
    fn test_annotation_insert() {
        let mut go = GoAnnotation::new();
        go.insert("7157", "GO:0006915", Ontology::BiologicalProcess, "apoptotic process");
        go.insert("7157", "GO:0006915", Ontology::BiologicalProcess, "renamed");
        go.insert("4609", "GO:0006915", Ontology::BiologicalProcess, "apoptotic process");
        assert_eq!(go.n_genes(), 2);
        assert_eq!(go.n_terms(), 1);
        assert_eq!(go.term("GO:0006915").unwrap().name, "apoptotic process");
        assert_eq!(go.terms_of("7157").unwrap().len(), 1);
    }
}
