use colineage::catalog::InMemoryCatalog;
use colineage::{analyze_query, Dialect};
use proptest::prelude::*;

fn seeded_with_names(
    src_cols: &[String],
    dst_cols: &[String],
) -> (InMemoryCatalog, colineage::catalog::SourceId) {
    let mut cat = InMemoryCatalog::new();
    let source = cat.add_source("test", Dialect::Generic);
    let schema = cat.add_schema(source, "default");
    cat.set_default_schema(source, schema);
    let src_refs: Vec<&str> = src_cols.iter().map(|s| s.as_str()).collect();
    let dst_refs: Vec<&str> = dst_cols.iter().map(|s| s.as_str()).collect();
    cat.add_table_with_columns(schema, "src", &src_refs);
    cat.add_table_with_columns(schema, "dst", &dst_refs);
    (cat, source)
}

proptest! {
    /// Every `INSERT INTO dst SELECT <cols> FROM src` with matching arity
    /// writes exactly one edge per projected column, regardless of the
    /// column names chosen.
    #[test]
    fn insert_select_writes_one_edge_per_projected_column(
        cols in prop::collection::vec("[a-z]{1,6}", 1..6),
    ) {
        let unique: Vec<String> = {
            let mut seen = std::collections::HashSet::new();
            cols.into_iter().filter(|c| seen.insert(c.clone())).collect()
        };
        prop_assume!(!unique.is_empty());

        let (mut cat, source) = seeded_with_names(&unique, &unique);
        let projection = unique
            .iter()
            .map(|c| format!("src.{c}"))
            .collect::<Vec<_>>()
            .join(", ");
        let sql = format!("INSERT INTO dst SELECT {projection} FROM src");

        let outcome = analyze_query(&mut cat, source, &sql, None).unwrap();
        prop_assert_eq!(outcome.edges_written, unique.len());
    }

    /// `SELECT *` pairs source and target columns positionally: the Nth
    /// source column feeds the Nth target column no matter what either is
    /// named.
    #[test]
    fn star_expansion_pairs_positionally(
        src_cols in prop::collection::vec("[a-z]{1,6}", 2..6),
        dst_cols in prop::collection::vec("[a-z]{1,6}", 2..6),
    ) {
        prop_assume!(src_cols.len() == dst_cols.len());
        let mut seen = std::collections::HashSet::new();
        prop_assume!(src_cols.iter().all(|c| seen.insert(c.clone())));
        let mut seen = std::collections::HashSet::new();
        prop_assume!(dst_cols.iter().all(|c| seen.insert(c.clone())));

        let (mut cat, source) = seeded_with_names(&src_cols, &dst_cols);
        analyze_query(&mut cat, source, "INSERT INTO dst SELECT * FROM src", None).unwrap();

        let mut edges = cat.lineage_edges();
        edges.sort();
        let mut expected: Vec<(String, String)> = src_cols
            .iter()
            .zip(dst_cols.iter())
            .map(|(s, d)| (format!("src.{s}"), format!("dst.{d}")))
            .collect();
        expected.sort();
        prop_assert_eq!(edges, expected);
    }

    /// Table name resolution is case-insensitive: any mixed-case spelling of
    /// a registered table name resolves to the same table.
    #[test]
    fn table_resolution_is_case_insensitive(
        table in "[a-z]{1,8}",
        upper_mask in prop::collection::vec(any::<bool>(), 1..8),
    ) {
        let mut cat = InMemoryCatalog::new();
        let source = cat.add_source("test", Dialect::Generic);
        let schema = cat.add_schema(source, "default");
        cat.set_default_schema(source, schema);
        cat.add_table_with_columns(schema, &table, &["a", "b"]);

        let spelled: String = table
            .chars()
            .zip(upper_mask.iter().cycle())
            .map(|(c, upper)| if *upper { c.to_ascii_uppercase() } else { c })
            .collect();

        let sql = format!("INSERT INTO {table} SELECT * FROM {spelled}");
        let outcome = analyze_query(&mut cat, source, &sql, None);
        prop_assert!(outcome.is_ok(), "expected case-insensitive resolution of {spelled}");
    }

    /// Analyzing the same statement twice against separately-seeded but
    /// identical catalogs produces the same number of edges each time.
    #[test]
    fn analysis_is_deterministic(
        cols in prop::collection::vec("[a-z]{1,6}", 1..5),
    ) {
        let unique: Vec<String> = {
            let mut seen = std::collections::HashSet::new();
            cols.into_iter().filter(|c| seen.insert(c.clone())).collect()
        };
        prop_assume!(!unique.is_empty());

        let sql = format!(
            "INSERT INTO dst SELECT {} FROM src",
            unique.iter().map(|c| format!("src.{c}")).collect::<Vec<_>>().join(", ")
        );

        let (mut cat_a, source_a) = seeded_with_names(&unique, &unique);
        let (mut cat_b, source_b) = seeded_with_names(&unique, &unique);

        let outcome_a = analyze_query(&mut cat_a, source_a, &sql, None).unwrap();
        let outcome_b = analyze_query(&mut cat_b, source_b, &sql, None).unwrap();

        prop_assert_eq!(outcome_a.edges_written, outcome_b.edges_written);
    }
}
