//! End-to-end write path: adapter → validation → dedup → published dump.

use std::fs::{self, File};
use std::io::{Read, Write};
use std::path::Path;

use flate2::read::GzDecoder;
use pretty_assertions::assert_eq;

use biograph::adapter::AdapterRegistry;
use biograph::export::{EDGES_FILE, EDGES_SAMPLE_FILE, NODES_FILE, NODES_SAMPLE_FILE, SUMMARY_FILE};
use biograph::{
    DanglingPolicy, Error, InMemoryAdapter, MergeRule, Node, Pipeline, PipelineConfig, Relation, Stage, Value,
};

fn config(out: &Path) -> PipelineConfig {
    PipelineConfig { output_root: out.to_path_buf(), ..PipelineConfig::default() }
}

fn gunzip(path: &Path) -> String {
    let mut text = String::new();
    GzDecoder::new(File::open(path).unwrap()).read_to_string(&mut text).unwrap();
    text
}

fn rows(table: &str) -> Vec<&str> {
    table.lines().skip(1).collect()
}

#[test]
fn test_gene_disease_example() {
    let out = tempfile::tempdir().unwrap();
    let adapter = InMemoryAdapter::new("disgenet")
        .with_nodes([Node::bio_entity("HGNC", "1100"), Node::bio_entity("MESH", "D001943")])
        .with_relations([Relation::new(("HGNC", "1100"), ("MESH", "D001943"), "gene_disease_association")]);

    let report = Pipeline::new(config(out.path())).run(Box::new(adapter)).unwrap();
    assert_eq!(report.nodes_written, 2);
    assert_eq!(report.edges_written, 1);

    let dir = out.path().join("disgenet");
    let nodes = gunzip(&dir.join(NODES_FILE));
    assert_eq!(rows(&nodes), ["HGNC:1100\tBioEntity", "MESH:D001943\tBioEntity"]);
    let edges = gunzip(&dir.join(EDGES_FILE));
    assert_eq!(rows(&edges), ["HGNC:1100\tMESH:D001943\tgene_disease_association"]);
    assert_eq!(
        fs::read_to_string(dir.join(SUMMARY_FILE)).unwrap(),
        "source_ns\trel\ttarget_ns\tcount\nHGNC\tgene_disease_association\tMESH\t1\n"
    );
    for sample in [NODES_SAMPLE_FILE, EDGES_SAMPLE_FILE] {
        assert!(dir.join(sample).is_file());
    }
}

#[test]
fn test_duplicate_go_term_collapses() {
    let out = tempfile::tempdir().unwrap();
    // Two mentions of GO:3677, spelled differently, with different properties.
    let adapter = InMemoryAdapter::new("go")
        .with_nodes([
            Node::bio_entity("GO", "3677").with_property("name", "DNA binding"),
            Node::bio_entity("go", "GO:0003677")
                .with_property("name", "DNA-binding")
                .with_property("namespace", "molecular_function"),
        ])
        .with_merge_rule(MergeRule::Union);

    Pipeline::new(config(out.path())).run(Box::new(adapter)).unwrap();
    let nodes = gunzip(&out.path().join("go").join(NODES_FILE));
    assert_eq!(
        nodes,
        "id:ID\t:LABEL\tname\tnamespace\nGO:0003677\tBioEntity\tDNA binding\tmolecular_function\n"
    );
}

#[test]
fn test_merged_sources_collapse_across_adapters() {
    let go_a = || {
        InMemoryAdapter::new("go_a")
            .with_nodes([Node::bio_entity("GO", "3677").with_property("name", "DNA binding")])
            .with_relations([Relation::new(("HGNC", "1100"), ("GO", "3677"), "associated_with")])
    };
    let go_b = || {
        InMemoryAdapter::new("go_b")
            .with_nodes([
                Node::bio_entity("GO", "3677")
                    .with_property("name", "DNA-binding")
                    .with_property("namespace", "molecular_function"),
                Node::bio_entity("HGNC", "1100"),
            ])
            .with_relations([Relation::new(("HGNC", "1100"), ("GO", "0003677"), "associated_with")
                .with_property("evidence", "IDA")])
    };
    let out = tempfile::tempdir().unwrap();
    let pipeline = Pipeline::new(config(out.path()));

    let report = pipeline
        .run_merged("go", vec![Box::new(go_a()), Box::new(go_b())], MergeRule::Union)
        .unwrap();
    assert_eq!((report.nodes_written, report.edges_written), (2, 1));
    let dir = out.path().join("go");
    assert_eq!(
        gunzip(&dir.join(NODES_FILE)),
        "id:ID\t:LABEL\tname\tnamespace\nGO:0003677\tBioEntity\tDNA binding\tmolecular_function\nHGNC:1100\tBioEntity\t\t\n"
    );
    assert_eq!(rows(&gunzip(&dir.join(EDGES_FILE))), ["HGNC:1100\tGO:0003677\tassociated_with\tIDA"]);
    assert!(!out.path().join("go_a").exists());

    // Under FirstSeen the earlier adapter supplies the whole row.
    pipeline
        .run_merged("go", vec![Box::new(go_b()), Box::new(go_a())], MergeRule::FirstSeen)
        .unwrap();
    let nodes = gunzip(&dir.join(NODES_FILE));
    assert_eq!(rows(&nodes), ["GO:0003677\tBioEntity\tDNA-binding\tmolecular_function", "HGNC:1100\tBioEntity\t\t"]);
}

#[test]
fn test_invalid_items_are_dropped_and_counted() {
    let out = tempfile::tempdir().unwrap();
    let adapter = InMemoryAdapter::new("indra")
        .with_nodes([
            Node::bio_entity("HGNC", "1100"),
            Node::bio_entity("HGNC", "BRCA1"),
            Node::bio_entity("TEXT", "some gene"),
            Node::bio_entity("UP", "P38398-2"),
        ])
        .with_relations([
            Relation::new(("HGNC", "1100"), ("UP", "P38398"), "has_product"),
            Relation::new(("HGNC", "1100"), ("TEXT", "x"), "mentions"),
        ]);

    let report = Pipeline::new(config(out.path())).run(Box::new(adapter)).unwrap();
    assert_eq!(report.nodes_written, 2);
    assert_eq!(report.edges_written, 1);
    assert_eq!(report.rejections.nodes, 2);
    assert_eq!(report.rejections.relations, 1);
    assert_eq!(report.rejections.unknown_namespaces().collect::<Vec<_>>(), [("TEXT", 2)]);

    let nodes = gunzip(&out.path().join("indra").join(NODES_FILE));
    assert_eq!(rows(&nodes), ["HGNC:1100\tBioEntity", "UP:P38398\tBioEntity"]);
}

#[test]
fn test_typed_properties_render_as_cells() {
    let out = tempfile::tempdir().unwrap();
    let date = chrono::NaiveDate::from_ymd_opt(2021, 3, 4).unwrap();
    let adapter = InMemoryAdapter::new("indra_db")
        .with_nodes([Node::bio_entity("HGNC", "1100"), Node::bio_entity("HGNC", "1101")])
        .with_relations([Relation::new(("HGNC", "1100"), ("HGNC", "1101"), "indra_rel")
            .with_property("belief:float", 1.0)
            .with_property("evidence_count:int", 3)
            .with_property("source_counts", Value::Map([("reach".to_string(), Value::Int(2))].into()))
            .with_property("sources:string[]", vec!["reach", "sparser"])
            .with_property("updated", date)]);

    Pipeline::new(config(out.path())).run(Box::new(adapter)).unwrap();
    let edges = gunzip(&out.path().join("indra_db").join(EDGES_FILE));
    assert_eq!(
        edges,
        concat!(
            ":START_ID\t:END_ID\t:TYPE\tbelief:float\tevidence_count:int\tsource_counts\tsources:string[]\tupdated\n",
            "HGNC:1100\tHGNC:1101\tindra_rel\t1.0\t3\t\"{\"\"reach\"\":2}\"\treach;sparser\t2021-03-04\n",
        )
    );
}

#[test]
fn test_dangling_fail_publishes_nothing() {
    let out = tempfile::tempdir().unwrap();
    let pipeline = Pipeline::new(PipelineConfig { dangling: DanglingPolicy::Fail, ..config(out.path()) });

    let good = InMemoryAdapter::new("sider")
        .with_nodes([Node::bio_entity("CHEBI", "45783"), Node::bio_entity("UMLS", "C0027497")])
        .with_relations([Relation::new(("CHEBI", "45783"), ("UMLS", "C0027497"), "has_side_effect")]);
    pipeline.run(Box::new(good)).unwrap();
    let published = fs::read(out.path().join("sider").join(EDGES_FILE)).unwrap();

    let broken = InMemoryAdapter::new("sider")
        .with_nodes([Node::bio_entity("CHEBI", "45783")])
        .with_relations([Relation::new(("CHEBI", "45783"), ("UMLS", "C0027497"), "has_side_effect")]);
    let err = pipeline.run(Box::new(broken)).unwrap_err();
    match err {
        Error::DumpFailed { stage, cause, .. } => {
            assert_eq!(stage, Stage::Write);
            assert!(matches!(*cause, Error::DanglingReference { .. }));
        }
        other => panic!("unexpected error: {other}"),
    }

    // The earlier dump is untouched and no staging directory is left.
    assert_eq!(fs::read(out.path().join("sider").join(EDGES_FILE)).unwrap(), published);
    assert_eq!(fs::read_dir(out.path()).unwrap().count(), 1);
}

#[test]
fn test_jsonl_sources_through_registry() {
    let input = tempfile::tempdir().unwrap();
    let out = tempfile::tempdir().unwrap();
    let dir = input.path().join("bgee");
    fs::create_dir(&dir).unwrap();
    let mut nodes = File::create(dir.join("nodes.jsonl")).unwrap();
    writeln!(nodes, r#"{{"namespace":"HGNC","local_id":"1100","labels":["BioEntity"]}}"#).unwrap();
    writeln!(nodes, r#"{{"namespace":"UBERON","local_id":"UBERON:2107","labels":["BioEntity"]}}"#).unwrap();
    let mut rels = File::create(dir.join("relations.jsonl")).unwrap();
    writeln!(
        rels,
        r#"{{"source_ns":"HGNC","source_id":"1100","target_ns":"UBERON","target_id":"2107","relation_type":"expressed_in"}}"#
    )
    .unwrap();

    let mut registry = AdapterRegistry::new();
    assert_eq!(registry.discover_jsonl(input.path(), MergeRule::FirstSeen).unwrap(), 1);

    let pipeline = Pipeline::new(PipelineConfig {
        input_root: Some(input.path().to_path_buf()),
        ..config(out.path())
    });
    let results = pipeline.run_registered(&registry, &["bgee".to_string()]).unwrap();
    let report = results.into_iter().next().unwrap().unwrap();
    assert_eq!(report.edges_written, 1);
    assert_eq!(report.summary[0].target_ns, "UBERON");

    let edges = gunzip(&out.path().join("bgee").join(EDGES_FILE));
    assert_eq!(rows(&edges), ["HGNC:1100\tUBERON:0002107\texpressed_in"]);
}

#[test]
fn test_external_sort_matches_in_memory() {
    let nodes: Vec<Node> = (0..200)
        .rev()
        .flat_map(|i| {
            [
                Node::bio_entity("HGNC", (i % 150).to_string()).with_property("rank:int", i),
                Node::bio_entity("CHEBI", (i * 7 % 97).to_string()),
            ]
        })
        .collect();
    let relations: Vec<Relation> = (0..200)
        .map(|i| Relation::new(("HGNC", (i % 150).to_string()), ("CHEBI", (i * 7 % 97).to_string()), "binds"))
        .collect();
    let adapter = || {
        Box::new(InMemoryAdapter::new("chembl").with_nodes(nodes.clone()).with_relations(relations.clone()))
    };

    let memory = tempfile::tempdir().unwrap();
    let spilled = tempfile::tempdir().unwrap();
    Pipeline::new(config(memory.path())).run(adapter()).unwrap();
    Pipeline::new(PipelineConfig { spill_threshold: 7, ..config(spilled.path()) }).run(adapter()).unwrap();

    for file in [NODES_FILE, EDGES_FILE, SUMMARY_FILE] {
        assert_eq!(
            fs::read(memory.path().join("chembl").join(file)).unwrap(),
            fs::read(spilled.path().join("chembl").join(file)).unwrap(),
            "{file} differs"
        );
    }
}
