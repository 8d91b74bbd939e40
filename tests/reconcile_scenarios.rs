use anyhow::Result;
use biointeract::pipeline::processing::record::FieldValue;
use biointeract::{reconcile, CanonicalRecord, ReconcileStats, SourceCatalog, SourceConfig};
use std::io::Cursor;

const PAIRS_CATALOG: &str = r#"
[[sources]]
source_id = "pairs"
format = "tabular"

[sources.tabular]
header_line = 0
data_start = 1

[sources.fields]
empty_sentinel = "-"
int_fields = ["gene_a", "gene_b", "pubmed"]
float_fields = ["score"]
list_fields = ["synonyms_a"]

[[sources.groups]]
name = "interactor_a"
[sources.groups.fields]
gene_a = "entrezgene"
synonyms_a = "synonyms"

[[sources.groups]]
name = "interactor_b"
[sources.groups.fields]
gene_b = "entrezgene"

[[sources.identifiers.a]]
field = "entrezgene"
namespace = "entrezgene"
numeric = true

[[sources.identifiers.b]]
field = "entrezgene"
namespace = "entrezgene"
numeric = true
"#;

const HEADER: &str = "gene_a\tgene_b\tscore\tsynonyms_a\tpubmed\n";

fn pairs_config() -> SourceConfig {
    SourceCatalog::from_toml_str(PAIRS_CATALOG)
        .unwrap()
        .get("pairs")
        .unwrap()
        .clone()
}

fn run(rows: &[&str]) -> Result<(Vec<CanonicalRecord>, ReconcileStats)> {
    let mut input = HEADER.to_string();
    for row in rows {
        input.push_str(row);
        input.push('\n');
    }
    let reconciliation = reconcile(Cursor::new(input), &pairs_config())?;
    let stats = reconciliation.stats().clone();
    Ok((reconciliation.collect(), stats))
}

fn score(entry: &biointeract::pipeline::processing::record::Record) -> Option<f64> {
    match entry.get("score") {
        Some(FieldValue::Float(f)) => Some(*f),
        _ => None,
    }
}

#[test]
fn test_reversed_rows_share_one_record() -> Result<()> {
    let (records, stats) = run(&["10\t20\t0.5\t-\t-", "20\t10\t0.7\t-\t-"])?;

    assert_eq!(records.len(), 1);
    let record = &records[0];
    assert_eq!(record.id.as_str(), "entrezgene:10-entrezgene:20");
    assert_eq!(record.interactor_a.get("entrezgene"), Some(&FieldValue::Int(10)));
    assert_eq!(record.interactor_b.get("entrezgene"), Some(&FieldValue::Int(20)));

    assert_eq!(record.evidence.len(), 2);
    assert_eq!(score(&record.evidence[0]), Some(0.5));
    assert_eq!(score(&record.evidence[1]), Some(0.7));
    assert_eq!(record.evidence[0].get("direction"), Some(&FieldValue::from("A->B")));
    assert_eq!(record.evidence[1].get("direction"), Some(&FieldValue::from("B->A")));
    assert_eq!(stats.duplicate_evidence, 0);
    Ok(())
}

#[test]
fn test_identical_rows_collapse_to_one_entry() -> Result<()> {
    let (records, stats) = run(&["10\t20\t0.5\t-\t-", "10\t20\t0.5\t-\t-"])?;

    assert_eq!(records.len(), 1);
    assert_eq!(records[0].evidence.len(), 1);
    assert_eq!(stats.duplicate_evidence, 1);
    assert_eq!(stats.duplicate_ids, vec!["entrezgene:10-entrezgene:20".to_string()]);
    Ok(())
}

#[test]
fn test_row_without_gene_b_is_skipped() -> Result<()> {
    let (records, stats) = run(&["10\t\t0.5\t-\t-", "11\t-\t0.5\t-\t-", "1\t2\t0.1\t-\t-"])?;

    assert_eq!(records.len(), 1);
    assert_eq!(records[0].id.as_str(), "entrezgene:1-entrezgene:2");
    assert_eq!(stats.rows_read, 3);
    assert_eq!(stats.rows_skipped, 2);
    Ok(())
}

#[test]
fn test_synonym_lists_and_scalars() -> Result<()> {
    let (records, _) = run(&["1\t2\t0.1\tX|Y|Z\t-", "3\t4\t0.1\tX\t-"])?;

    assert_eq!(records.len(), 2);
    assert_eq!(
        records[0].interactor_a.get("synonyms"),
        Some(&FieldValue::List(vec![
            FieldValue::from("X"),
            FieldValue::from("Y"),
            FieldValue::from("Z"),
        ]))
    );
    assert_eq!(records[1].interactor_a.get("synonyms"), Some(&FieldValue::from("X")));
    Ok(())
}

#[test]
fn test_reversed_input_gives_same_ids() -> Result<()> {
    let (forward, _) = run(&["5\t900\t0.1\t-\t-", "77\t3\t0.2\t-\t-"])?;
    let (backward, _) = run(&["900\t5\t0.1\t-\t-", "3\t77\t0.2\t-\t-"])?;

    let ids = |records: &[CanonicalRecord]| -> Vec<String> {
        records.iter().map(|r| r.id.to_string()).collect()
    };
    assert_eq!(ids(&forward), ids(&backward));
    assert_eq!(ids(&forward), vec!["entrezgene:5-entrezgene:900", "entrezgene:3-entrezgene:77"]);
    Ok(())
}

#[test]
fn test_no_null_or_empty_leaves_emitted() -> Result<()> {
    let (records, _) = run(&["1\t2\t-\t\t-", "1\t2\t0.3\t-\t"])?;

    for record in &records {
        for side in [&record.interactor_a, &record.interactor_b] {
            assert!(side.values().all(|v| !v.is_empty()), "{:?}", side);
        }
        for entry in &record.evidence {
            assert!(entry.values().all(|v| !v.is_empty()), "{:?}", entry);
        }
    }
    // The first row has nothing but its direction left as evidence
    assert_eq!(records[0].evidence[0].len(), 1);
    Ok(())
}

#[test]
fn test_invalid_integer_becomes_zero() -> Result<()> {
    let (records, stats) = run(&["1\t2\t0.1\t-\tunpublished"])?;

    assert_eq!(records[0].evidence[0].get("pubmed"), Some(&FieldValue::Int(0)));
    assert_eq!(stats.coercion_fallbacks, 1);
    Ok(())
}

#[test]
fn test_interactor_metadata_unions_across_rows() -> Result<()> {
    let (records, _) = run(&["1\t2\t0.1\tX\t-", "1\t2\t0.2\tY|X\t-"])?;

    assert_eq!(
        records[0].interactor_a.get("synonyms"),
        Some(&FieldValue::List(vec![FieldValue::from("X"), FieldValue::from("Y")]))
    );
    Ok(())
}

#[test]
fn test_self_interaction_is_b_to_a() -> Result<()> {
    let (records, _) = run(&["7157\t7157\t0.1\tX\t-"])?;

    assert_eq!(records.len(), 1);
    assert_eq!(records[0].id.as_str(), "entrezgene:7157-entrezgene:7157");
    assert_eq!(records[0].evidence[0].get("direction"), Some(&FieldValue::from("B->A")));
    assert_eq!(records[0].interactor_b.get("synonyms"), Some(&FieldValue::from("X")));
    Ok(())
}

#[test]
fn test_truncated_row_fails_whole_source() {
    let result = run(&["1\t2\t0.1\t-\t-", "1\t2"]);
    assert!(result.is_err());
}
