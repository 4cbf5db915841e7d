use hazard_logic_tree::config::AppConfig;
use hazard_logic_tree::model::LogicTree;
use hazard_logic_tree::store::BranchRegistry;

fn main() -> anyhow::Result<()> {
    // Load environment variables from .env file if it exists
    dotenvy::dotenv().ok();

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = AppConfig::load()?;
    let tree_path = config.tree_path(std::env::args().nth(1))?;

    let json = std::fs::read_to_string(&tree_path)
        .map_err(|e| anyhow::anyhow!("failed to read {}: {}", tree_path, e))?;
    let tree = LogicTree::from_json(&json)?;
    let summary = tree.summary()?;

    println!("{} (version {})", tree.title(), tree.version());
    for branch_set in tree.branch_sets() {
        println!(
            "  {:<12} {:>3} branches  {}",
            branch_set.short_name(),
            branch_set.len(),
            branch_set.long_name()
        );
    }
    println!(
        "{} raw combinations, {} composite branches ({} removed by {} correlations), total weight {:.12}",
        summary.raw_combinations,
        summary.composite_branches,
        summary.discarded,
        tree.correlations().len(),
        summary.total_weight
    );

    if config.output.show_composites {
        let limit = config.output.limit.unwrap_or(usize::MAX);
        for composite in tree.combined_branches().take(limit) {
            println!("  {:.6}  {}", composite.weight(), composite);
        }
    }

    if let Some(registry_path) = &config.registry.path {
        let mut registry = BranchRegistry::load(registry_path)?;
        let added = registry.register_tree(&tree);
        registry.save(registry_path)?;
        log::info!(
            "Registry {}: {} entries ({} new)",
            registry_path,
            registry.len(),
            added
        );
    }

    Ok(())
}
