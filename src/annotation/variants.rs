use sha2::{Digest, Sha256};

use crate::model::{
    AnnotatedSource, ColumnAnnotation, SchemaContext, SchemaSnapshot, TableAnnotation, Variant,
};

/// The three schema contexts evaluated for one snapshot.
#[derive(Debug, Clone, PartialEq)]
pub struct VariantContexts {
    pub raw: SchemaContext,
    pub hypothesis: SchemaContext,
    pub annotated: SchemaContext,
    pub annotated_source: AnnotatedSource,
}

impl VariantContexts {
    pub fn get(&self, variant: Variant) -> &SchemaContext {
        match variant {
            Variant::Raw => &self.raw,
            Variant::Hypothesis => &self.hypothesis,
            Variant::Annotated => &self.annotated,
        }
    }
}

/// Names and types only; annotation fields are present but empty.
pub fn raw_context(snapshot: &SchemaSnapshot) -> SchemaContext {
    SchemaContext {
        variant: Variant::Raw,
        tables: snapshot
            .tables
            .iter()
            .map(|table| TableAnnotation {
                table_name: table.name.clone(),
                description: String::new(),
                columns: table
                    .columns
                    .iter()
                    .map(|column| ColumnAnnotation {
                        name: column.name.clone(),
                        data_type: column.data_type.clone(),
                        description: String::new(),
                        business_context: String::new(),
                    })
                    .collect(),
            })
            .collect(),
    }
}

pub fn build_contexts(
    snapshot: &SchemaSnapshot,
    hypothesis_tables: Vec<TableAnnotation>,
    reconciled_tables: Option<Vec<TableAnnotation>>,
) -> VariantContexts {
    let raw = raw_context(snapshot);
    let hypothesis = SchemaContext {
        variant: Variant::Hypothesis,
        tables: hypothesis_tables,
    };

    let (annotated, annotated_source) = match reconciled_tables {
        Some(tables) => (
            SchemaContext {
                variant: Variant::Annotated,
                tables,
            },
            AnnotatedSource::Reconciled,
        ),
        None => (
            SchemaContext {
                variant: Variant::Annotated,
                tables: hypothesis.tables.clone(),
            },
            AnnotatedSource::HypothesisFallback,
        ),
    };

    VariantContexts {
        raw,
        hypothesis,
        annotated,
        annotated_source,
    }
}

/// SHA-256 over the context's JSON encoding.
pub fn context_fingerprint(context: &SchemaContext) -> serde_json::Result<String> {
    let encoded = serde_json::to_vec(context)?;
    let mut hasher = Sha256::new();
    hasher.update(&encoded);
    Ok(format!("{:x}", hasher.finalize()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::annotation::HypothesisGenerator;
    use crate::model::{Column, SampleSet, Table};

    fn snapshot() -> SchemaSnapshot {
        SchemaSnapshot {
            dataset_id: "car_1".to_string(),
            tables: vec![Table {
                name: "cars".to_string(),
                columns: vec![
                    Column {
                        name: "car_id".to_string(),
                        data_type: "INTEGER".to_string(),
                        nullable: false,
                    },
                    Column {
                        name: "status".to_string(),
                        data_type: "TEXT".to_string(),
                        nullable: true,
                    },
                ],
            }],
        }
    }

    fn reconciled() -> Vec<TableAnnotation> {
        vec![TableAnnotation {
            table_name: "cars".to_string(),
            description: "Vehicles on the lot.".to_string(),
            columns: Vec::new(),
        }]
    }

    #[test]
    fn raw_context_has_uniform_empty_annotations() {
        let raw = raw_context(&snapshot());
        assert_eq!(raw.variant, Variant::Raw);
        assert_eq!(raw.tables[0].description, "");
        assert!(
            raw.tables[0]
                .columns
                .iter()
                .all(|column| column.description.is_empty() && column.business_context.is_empty())
        );

        let encoded = serde_json::to_value(&raw).expect("raw context serializes");
        assert_eq!(encoded["tables"][0]["columns"][1]["business_context"], "");
        assert_eq!(encoded["tables"][0]["columns"][1]["type"], "TEXT");
    }

    #[test]
    fn standard_mode_builds_identical_contexts_twice() {
        let generator = HypothesisGenerator::heuristic();
        let samples = SampleSet::default();
        let first = build_contexts(
            &snapshot(),
            generator
                .generate_standard(&snapshot(), &samples)
                .expect("heuristic hypotheses")
                .items,
            None,
        );
        let second = build_contexts(
            &snapshot(),
            generator
                .generate_standard(&snapshot(), &samples)
                .expect("heuristic hypotheses")
                .items,
            None,
        );
        assert_eq!(first.raw, second.raw);
        assert_eq!(first.hypothesis, second.hypothesis);
    }

    #[test]
    fn annotated_falls_back_to_hypothesis_without_reconciliation() {
        let hypothesis_tables = HypothesisGenerator::heuristic()
            .generate_standard(&snapshot(), &SampleSet::default())
            .expect("heuristic hypotheses")
            .items;
        let contexts = build_contexts(&snapshot(), hypothesis_tables, None);

        assert_eq!(contexts.annotated_source, AnnotatedSource::HypothesisFallback);
        assert_eq!(contexts.annotated.variant, Variant::Annotated);
        assert_eq!(contexts.annotated.tables, contexts.hypothesis.tables);
    }

    #[test]
    fn annotated_uses_reconciled_tables_when_present() {
        let hypothesis_tables = HypothesisGenerator::heuristic()
            .generate_standard(&snapshot(), &SampleSet::default())
            .expect("heuristic hypotheses")
            .items;
        let contexts = build_contexts(&snapshot(), hypothesis_tables, Some(reconciled()));

        assert_eq!(contexts.annotated_source, AnnotatedSource::Reconciled);
        assert_eq!(contexts.annotated.tables, reconciled());
        assert_ne!(contexts.annotated.tables, contexts.hypothesis.tables);
    }

    #[test]
    fn raw_fingerprint_is_independent_of_annotation_mode() {
        let hypothesis_tables = HypothesisGenerator::heuristic()
            .generate_standard(&snapshot(), &SampleSet::default())
            .expect("heuristic hypotheses")
            .items;
        let standard = build_contexts(&snapshot(), hypothesis_tables.clone(), None);
        let interactive = build_contexts(&snapshot(), hypothesis_tables, Some(reconciled()));

        let standard_raw = context_fingerprint(&standard.raw).expect("fingerprint");
        let interactive_raw = context_fingerprint(&interactive.raw).expect("fingerprint");
        assert_eq!(standard_raw, interactive_raw);
        assert_eq!(standard_raw.len(), 64);
        assert_ne!(
            context_fingerprint(&standard.annotated).expect("fingerprint"),
            context_fingerprint(&interactive.annotated).expect("fingerprint")
        );
    }
}
