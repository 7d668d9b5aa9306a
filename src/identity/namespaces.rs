//! Built-in namespace rules.

use super::{Fixup, NamespaceRule};

/// (canonical, pattern, embedded prefix, pad width, aliases)
const SIMPLE_RULES: &[(&str, &str, Option<&str>, Option<usize>, &[&str])] = &[
    ("HGNC", r"^\d+$", Some("HGNC:"), None, &[]),
    ("EGID", r"^\d+$", Some("NCBIGENE:"), None, &["NCBIGENE", "ENTREZ", "NCBI_GENE"]),
    ("GO", r"^\d{7}$", Some("GO:"), Some(7), &[]),
    ("MESH", r"^[CDQ]\d{6,9}$", Some("MESH:"), None, &[]),
    ("CHEBI", r"^\d+$", Some("CHEBI:"), None, &[]),
    ("CHEMBL", r"^CHEMBL\d+$", None, None, &["CHEMBL.COMPOUND"]),
    ("EFO", r"^\d{7}$", Some("EFO:"), Some(7), &[]),
    ("HP", r"^\d{7}$", Some("HP:"), Some(7), &[]),
    ("DOID", r"^\d+$", Some("DOID:"), None, &[]),
    ("MONDO", r"^\d{7}$", Some("MONDO:"), Some(7), &[]),
    ("UBERON", r"^\d{7}$", Some("UBERON:"), Some(7), &[]),
    ("CL", r"^\d{7}$", Some("CL:"), Some(7), &[]),
    ("UMLS", r"^C\d{7}$", Some("UMLS:"), None, &[]),
    ("UPLOC", r"^SL-\d{4}$", None, None, &[]),
    ("REACTOME", r"^R-[A-Z]{3}-\d+(-\d+)?(\.\d+)?$", None, None, &[]),
    ("WIKIPATHWAYS", r"^WP\d{1,5}(_r\d+)?$", None, None, &["WP"]),
    ("CLINICALTRIALS", r"^NCT\d{8}$", None, None, &["NCT", "CLINICALTRIALS.GOV"]),
    ("PUBCHEM", r"^\d+$", None, None, &["PUBCHEM.COMPOUND"]),
    ("DRUGBANK", r"^DB\d{5}$", None, None, &[]),
    ("PUBMED", r"^\d+$", None, None, &["PMID"]),
    ("ECCODE", r"^\d+(\.(\d+|-)){3}$", Some("EC:"), None, &["EC", "EC-CODE"]),
];

const UNIPROT_PATTERN: &str =
    r"^([OPQ][0-9][A-Z0-9]{3}[0-9]|[A-NR-Z][0-9]([A-Z][A-Z0-9]{2}[0-9]){1,2})$";

const FAMPLEX_PATTERN: &str = r"^[a-zA-Z0-9][A-Za-z0-9_]+$";

pub(super) fn builtin_rules() -> Vec<NamespaceRule> {
    let mut rules: Vec<NamespaceRule> = SIMPLE_RULES
        .iter()
        .map(|(canonical, pattern, prefix, pad, aliases)| {
            let mut rule = NamespaceRule::new(*canonical, pattern)
                .expect("built-in namespace pattern is a valid regex");
            if let Some(prefix) = prefix {
                rule = rule.embedded_prefix(prefix);
            }
            if let Some(width) = pad {
                rule = rule.pad(*width);
            }
            for alias in *aliases {
                rule = rule.alias(alias);
            }
            rule
        })
        .collect();

    rules.push(
        NamespaceRule::new("UP", UNIPROT_PATTERN)
            .expect("built-in namespace pattern is a valid regex")
            .alias("UNIPROT")
            .alias("UNIPROTKB")
            .embedded_prefix("UNIPROT:")
            .fixup(Fixup::Redirect { prefix: "SL".into(), namespace: "UPLOC".into() })
            .fixup(Fixup::StripIsoform { exempt_prefix: "SL-".into() }),
    );
    rules.push(
        NamespaceRule::new("FPLX", FAMPLEX_PATTERN)
            .expect("built-in namespace pattern is a valid regex")
            .alias("FAMPLEX")
            .fixup(Fixup::Replace { from: "TCF-LEF".into(), to: "TCF_LEF".into() }),
    );
    rules
}
