//! Domain queries used by the analysis and curation front ends.
//!
//! Thin wrappers over the one-hop primitives, named for what they ask.
//! Edge conventions in the loaded graph:
//!
//! ```text
//! gene    -expressed_in->     tissue
//! gene    -associated_with->  GO term
//! drug    -tested_in->        trial
//! disease -has_trial->        trial
//! pathway -haspart->          gene
//! drug    -has_side_effect->  side effect
//! term    -isa/partof->       parent term
//! ```

use std::collections::{BTreeMap, BTreeSet};

use crate::model::{Direction, Grounding, Node};
use crate::storage::GraphStore;
use crate::Result;

use super::{GraphClient, HIERARCHY};

pub const EXPRESSED_IN: &str = "expressed_in";
pub const ASSOCIATED_WITH: &str = "associated_with";
pub const TESTED_IN: &str = "tested_in";
pub const HAS_TRIAL: &str = "has_trial";
pub const HAS_PART: &str = "haspart";
pub const HAS_SIDE_EFFECT: &str = "has_side_effect";

impl<S: GraphStore> GraphClient<S> {
    // ========================================================================
    // Tissues
    // ========================================================================

    pub async fn get_genes_in_tissue(&self, tissue: impl Into<Grounding>) -> Result<Vec<Node>> {
        self.get_sources(tissue, EXPRESSED_IN).await
    }

    pub async fn get_tissues_for_gene(&self, gene: impl Into<Grounding>) -> Result<Vec<Node>> {
        self.get_targets(gene, EXPRESSED_IN).await
    }

    pub async fn is_gene_in_tissue(&self, gene: impl Into<Grounding>, tissue: impl Into<Grounding>) -> Result<bool> {
        self.has_relation(gene, tissue, EXPRESSED_IN).await
    }

    // ========================================================================
    // GO
    // ========================================================================

    /// GO terms annotated on a gene. With `include_indirect`, the parents
    /// (`isa`) of each annotated term are added; annotated terms win.
    pub async fn get_go_terms_for_gene(&self, gene: impl Into<Grounding>, include_indirect: bool) -> Result<Vec<Node>> {
        let direct = self.get_targets(gene, ASSOCIATED_WITH).await?;
        if !include_indirect {
            return Ok(direct);
        }
        let mut terms: BTreeMap<Grounding, Node> = direct.iter().map(|t| (t.grounding(), t.clone())).collect();
        for term in &direct {
            for parent in self.get_successors(term.grounding(), &["isa"]).await? {
                terms.entry(parent.grounding()).or_insert(parent);
            }
        }
        Ok(terms.into_values().collect())
    }

    /// Genes annotated with a GO term. With `include_indirect`, genes
    /// annotated with its direct child terms (`isa`/`partof`) count too.
    pub async fn get_genes_for_go_term(&self, go_term: impl Into<Grounding>, include_indirect: bool) -> Result<Vec<Node>> {
        let go_term = self.key(go_term)?;
        let mut terms = vec![go_term.clone()];
        if include_indirect {
            terms.extend(self.get_ontology_child_terms(go_term).await?.iter().map(Node::grounding));
        }
        let mut genes: BTreeMap<Grounding, Node> = BTreeMap::new();
        for term in terms {
            for gene in self.get_sources(term, ASSOCIATED_WITH).await? {
                genes.entry(gene.grounding()).or_insert(gene);
            }
        }
        Ok(genes.into_values().collect())
    }

    pub async fn is_go_term_for_gene(&self, gene: impl Into<Grounding>, go_term: impl Into<Grounding>) -> Result<bool> {
        self.has_relation(gene, go_term, ASSOCIATED_WITH).await
    }

    // ========================================================================
    // Trials
    // ========================================================================

    pub async fn get_trials_for_drug(&self, drug: impl Into<Grounding>) -> Result<Vec<Node>> {
        self.get_targets(drug, TESTED_IN).await
    }

    pub async fn get_trials_for_disease(&self, disease: impl Into<Grounding>) -> Result<Vec<Node>> {
        self.get_targets(disease, HAS_TRIAL).await
    }

    pub async fn get_drugs_for_trial(&self, trial: impl Into<Grounding>) -> Result<Vec<Node>> {
        self.get_sources(trial, TESTED_IN).await
    }

    pub async fn get_diseases_for_trial(&self, trial: impl Into<Grounding>) -> Result<Vec<Node>> {
        self.get_sources(trial, HAS_TRIAL).await
    }

    // ========================================================================
    // Pathways
    // ========================================================================

    pub async fn get_pathways_for_gene(&self, gene: impl Into<Grounding>) -> Result<Vec<Node>> {
        self.get_sources(gene, HAS_PART).await
    }

    pub async fn get_genes_for_pathway(&self, pathway: impl Into<Grounding>) -> Result<Vec<Node>> {
        self.get_targets(pathway, HAS_PART).await
    }

    pub async fn is_gene_in_pathway(&self, gene: impl Into<Grounding>, pathway: impl Into<Grounding>) -> Result<bool> {
        self.has_relation(pathway, gene, HAS_PART).await
    }

    // ========================================================================
    // Side effects
    // ========================================================================

    pub async fn get_side_effects_for_drug(&self, drug: impl Into<Grounding>) -> Result<Vec<Node>> {
        self.get_targets(drug, HAS_SIDE_EFFECT).await
    }

    pub async fn get_drugs_for_side_effect(&self, side_effect: impl Into<Grounding>) -> Result<Vec<Node>> {
        self.get_sources(side_effect, HAS_SIDE_EFFECT).await
    }

    pub async fn is_side_effect_for_drug(
        &self,
        drug: impl Into<Grounding>,
        side_effect: impl Into<Grounding>,
    ) -> Result<bool> {
        self.has_relation(drug, side_effect, HAS_SIDE_EFFECT).await
    }

    // ========================================================================
    // Gene sets for enrichment
    // ========================================================================

    /// GO term → annotated genes. Edge orientation is ignored.
    pub async fn go_gene_sets(&self) -> Result<BTreeMap<Grounding, BTreeSet<Grounding>>> {
        self.gene_sets("GO", ASSOCIATED_WITH, Direction::Both).await
    }

    pub async fn reactome_gene_sets(&self) -> Result<BTreeMap<Grounding, BTreeSet<Grounding>>> {
        self.gene_sets("REACTOME", HAS_PART, Direction::Both).await
    }

    pub async fn wikipathways_gene_sets(&self) -> Result<BTreeMap<Grounding, BTreeSet<Grounding>>> {
        self.gene_sets("WIKIPATHWAYS", HAS_PART, Direction::Both).await
    }

    // ========================================================================
    // Ontology
    // ========================================================================

    pub async fn get_ontology_child_terms(&self, term: impl Into<Grounding>) -> Result<Vec<Node>> {
        self.get_predecessors(term, &HIERARCHY).await
    }

    pub async fn get_ontology_parent_terms(&self, term: impl Into<Grounding>) -> Result<Vec<Node>> {
        self.get_successors(term, &HIERARCHY).await
    }

    /// Whether `parent` is a direct `isa`/`partof` parent of `term`.
    pub async fn isa_or_partof(&self, term: impl Into<Grounding>, parent: impl Into<Grounding>) -> Result<bool> {
        let parent = self.key(parent)?;
        Ok(self
            .get_ontology_parent_terms(term)
            .await?
            .iter()
            .any(|p| p.grounding() == parent))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Relation;
    use crate::storage::MemoryStore;

    fn ids(nodes: &[Node]) -> Vec<String> {
        nodes.iter().map(|n| n.grounding().to_string()).collect()
    }

    fn client() -> GraphClient<MemoryStore> {
        let store = MemoryStore::new();
        for (ns, id) in [
            ("HGNC", "1100"),
            ("HGNC", "1101"),
            ("GO", "0003677"),
            ("GO", "0003676"),
            ("GO", "0005488"),
            ("UBERON", "0002107"),
            ("REACTOME", "R-HSA-73894"),
            ("CHEBI", "45783"),
            ("CLINICALTRIALS", "NCT00000001"),
            ("MESH", "D001943"),
            ("UMLS", "C0027497"),
        ] {
            store.insert_node(Node::bio_entity(ns, id));
        }
        for (a, b, rel) in [
            (("HGNC", "1100"), ("UBERON", "0002107"), EXPRESSED_IN),
            (("HGNC", "1100"), ("GO", "0003677"), ASSOCIATED_WITH),
            (("HGNC", "1101"), ("GO", "0003676"), ASSOCIATED_WITH),
            (("GO", "0003677"), ("GO", "0003676"), "isa"),
            (("GO", "0003676"), ("GO", "0005488"), "partof"),
            (("REACTOME", "R-HSA-73894"), ("HGNC", "1100"), HAS_PART),
            (("CHEBI", "45783"), ("CLINICALTRIALS", "NCT00000001"), TESTED_IN),
            (("MESH", "D001943"), ("CLINICALTRIALS", "NCT00000001"), HAS_TRIAL),
            (("CHEBI", "45783"), ("UMLS", "C0027497"), HAS_SIDE_EFFECT),
        ] {
            store.insert_relation(Relation::new(a, b, rel)).unwrap();
        }
        GraphClient::new(store)
    }

    #[tokio::test]
    async fn test_go_indirect() {
        let client = client();
        let direct = client.get_go_terms_for_gene(("HGNC", "1100"), false).await.unwrap();
        assert_eq!(ids(&direct), ["GO:0003677"]);
        let indirect = client.get_go_terms_for_gene(("HGNC", "1100"), true).await.unwrap();
        assert_eq!(ids(&indirect), ["GO:0003676", "GO:0003677"]);

        let genes = client.get_genes_for_go_term(("GO", "0003676"), false).await.unwrap();
        assert_eq!(ids(&genes), ["HGNC:1101"]);
        let genes = client.get_genes_for_go_term(("GO", "0003676"), true).await.unwrap();
        assert_eq!(ids(&genes), ["HGNC:1100", "HGNC:1101"]);
        assert!(client.is_go_term_for_gene(("HGNC", "1100"), ("GO", "GO:0003677")).await.unwrap());
    }

    #[tokio::test]
    async fn test_tissues_pathways_trials_side_effects() {
        let client = client();
        assert_eq!(ids(&client.get_tissues_for_gene(("HGNC", "1100")).await.unwrap()), ["UBERON:0002107"]);
        assert_eq!(ids(&client.get_genes_in_tissue(("UBERON", "0002107")).await.unwrap()), ["HGNC:1100"]);
        assert!(client.is_gene_in_tissue(("HGNC", "1100"), ("UBERON", "0002107")).await.unwrap());

        assert_eq!(ids(&client.get_pathways_for_gene(("HGNC", "1100")).await.unwrap()), ["REACTOME:R-HSA-73894"]);
        assert_eq!(ids(&client.get_genes_for_pathway(("REACTOME", "R-HSA-73894")).await.unwrap()), ["HGNC:1100"]);
        assert!(client.is_gene_in_pathway(("HGNC", "1100"), ("REACTOME", "R-HSA-73894")).await.unwrap());

        assert_eq!(
            ids(&client.get_trials_for_drug(("CHEBI", "45783")).await.unwrap()),
            ["CLINICALTRIALS:NCT00000001"]
        );
        assert_eq!(ids(&client.get_drugs_for_trial(("CLINICALTRIALS", "NCT00000001")).await.unwrap()), ["CHEBI:45783"]);
        assert_eq!(
            ids(&client.get_trials_for_disease(("MESH", "D001943")).await.unwrap()),
            ["CLINICALTRIALS:NCT00000001"]
        );
        assert_eq!(
            ids(&client.get_diseases_for_trial(("CLINICALTRIALS", "NCT00000001")).await.unwrap()),
            ["MESH:D001943"]
        );

        assert_eq!(ids(&client.get_side_effects_for_drug(("CHEBI", "45783")).await.unwrap()), ["UMLS:C0027497"]);
        assert_eq!(ids(&client.get_drugs_for_side_effect(("UMLS", "C0027497")).await.unwrap()), ["CHEBI:45783"]);
        assert!(client.is_side_effect_for_drug(("CHEBI", "45783"), ("UMLS", "C0027497")).await.unwrap());
    }

    #[tokio::test]
    async fn test_enrichment_gene_sets() {
        let client = client();
        let store = client.store();
        store.insert_node(Node::bio_entity("WIKIPATHWAYS", "WP254"));
        store.insert_relation(Relation::new(("WIKIPATHWAYS", "WP254"), ("HGNC", "1100"), HAS_PART)).unwrap();
        store.insert_relation(Relation::new(("WIKIPATHWAYS", "WP254"), ("HGNC", "1101"), HAS_PART)).unwrap();
        store.insert_relation(Relation::new(("HGNC", "1101"), ("REACTOME", "R-HSA-73894"), HAS_PART)).unwrap();
        let flat = |sets: BTreeMap<Grounding, BTreeSet<Grounding>>| -> Vec<(String, Vec<String>)> {
            sets.into_iter()
                .map(|(term, genes)| (term.to_string(), genes.iter().map(Grounding::to_string).collect()))
                .collect()
        };

        assert_eq!(
            flat(client.go_gene_sets().await.unwrap()),
            [
                ("GO:0003676".to_string(), vec!["HGNC:1101".to_string()]),
                ("GO:0003677".to_string(), vec!["HGNC:1100".to_string()]),
            ]
        );
        assert_eq!(
            flat(client.reactome_gene_sets().await.unwrap()),
            [("REACTOME:R-HSA-73894".to_string(), vec!["HGNC:1100".to_string(), "HGNC:1101".to_string()])]
        );
        assert_eq!(
            flat(client.wikipathways_gene_sets().await.unwrap()),
            [("WIKIPATHWAYS:WP254".to_string(), vec!["HGNC:1100".to_string(), "HGNC:1101".to_string()])]
        );
    }

    #[tokio::test]
    async fn test_ontology_helpers() {
        let client = client();
        assert_eq!(ids(&client.get_ontology_parent_terms(("GO", "0003676")).await.unwrap()), ["GO:0005488"]);
        assert_eq!(ids(&client.get_ontology_child_terms(("GO", "0003676")).await.unwrap()), ["GO:0003677"]);
        assert!(client.isa_or_partof(("GO", "0003676"), ("GO", "0005488")).await.unwrap());
        assert!(!client.isa_or_partof(("GO", "0003677"), ("GO", "0005488")).await.unwrap());
    }
}
