use coterie::pipeline::grouped_by_meta;
use coterie::{cluster_terms, ClusterConfig, LevelConfig, Term, TermStats, TermTable};
use std::collections::HashMap;

fn genes(prefix: &str, range: std::ops::RangeInclusive<usize>) -> Vec<String> {
    range.map(|i| format!("{prefix}{i}")).collect()
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // RUST_LOG=coterie=debug shows every graph, partition and resolver round.
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    // A toy enrichment result: cell-cycle and immune terms from GO and KEGG,
    // one broad GO parent that overlaps both, and an unrelated pathway.
    let mut terms = vec![
        Term::new("GO:0007049", "GO:BP", genes("CDK", 1..=8)).with_definition("cell cycle"),
        Term::new("GO:0000278", "GO:BP", genes("CDK", 1..=7)).with_definition("mitotic cell cycle"),
        Term::new("GO:0051301", "GO:BP", genes("CDK", 2..=8)).with_definition("cell division"),
        Term::new("hsa04110", "KEGG", genes("CDK", 1..=6)).with_definition("Cell cycle"),
        Term::new("GO:0006955", "GO:BP", genes("IL", 1..=8)).with_definition("immune response"),
        Term::new("GO:0006954", "GO:BP", genes("IL", 2..=9))
            .with_definition("inflammatory response"),
        Term::new("hsa04060", "KEGG", genes("IL", 1..=7))
            .with_definition("Cytokine-cytokine receptor interaction"),
        Term::new("hsa00010", "KEGG", genes("PFK", 1..=5))
            .with_definition("Glycolysis / Gluconeogenesis"),
    ];
    let mut broad = genes("CDK", 1..=4);
    broad.extend(genes("IL", 1..=4));
    terms.push(Term::new("GO:0008150", "GO:BP", broad).with_definition("biological_process"));

    let stats: HashMap<String, TermStats> = [
        ("GO:0007049", TermStats::new(12, 3)),
        ("GO:0000278", TermStats::new(6, 4)),
        ("GO:0051301", TermStats::new(9, 3)),
        ("GO:0006955", TermStats::new(20, 3)),
        ("GO:0006954", TermStats::new(8, 4)),
        ("GO:0008150", TermStats::new(48, 0)),
    ]
    .into_iter()
    .map(|(id, s)| (id.to_string(), s))
    .collect();

    let table = TermTable::from_terms(terms)?;
    // A small cap so the broad parent has to be resolved away.
    let config = ClusterConfig::default().with_term_level(LevelConfig::terms().with_size_cap(5));
    let clustering = cluster_terms(&table, &stats, &config)?;
    let h = &clustering.hierarchy;

    for (meta, members) in grouped_by_meta(h) {
        println!("{}", meta.unwrap_or("(no meta-community)"));
        for id in members {
            let Some(community) = h.community(id) else { continue };
            println!("  {} ({} genes)", community.name, community.genes.len());
            for term in &community.members {
                let definition = table.get(term).map_or("", |t| t.definition.as_str());
                println!("    {term:<12} {definition}");
            }
            let also = h.also_overlaps(id);
            if !also.is_empty() {
                println!("    also overlaps: {}", also.join(", "));
            }
        }
    }

    println!("singletons");
    for (i, singleton) in h.singletons().iter().enumerate() {
        let linked = h.linked_communities(coterie::SingletonId(i));
        println!("  {:<12} linked to [{}]", singleton.id, linked.join(", "));
    }

    for (run, rounds) in clustering.term_runs.iter().enumerate() {
        for round in rounds {
            println!(
                "resolver run {} round {}: bound={:?} threshold={:.1} dropped={:?} accepted={:?}",
                run + 1,
                round.round,
                round.bound,
                round.threshold,
                round.dropped,
                round.accepted
            );
        }
    }

    let report = h.validate(&table);
    println!("{report}");
    Ok(())
}
