//! Demolition search CLI - Search a structure for a controlled-collapse plan.

use std::fs;
use std::path::{Path, PathBuf};
use std::process;

use serde::de::DeserializeOwned;

use demolition_search::{
    compute::{CollapseSimulator, PhysicsSettings, evolution::SearchEngine},
    schema::{SearchConfig, StructureModel},
};

fn main() {
    env_logger::init();

    let args: Vec<String> = std::env::args().collect();

    if args.len() < 2 {
        eprintln!("Usage: {} <structure.json> [config.json] [generations]", args[0]);
        eprintln!();
        eprintln!("Search for a set of joints whose removal collapses the structure tightly.");
        eprintln!();
        eprintln!("Arguments:");
        eprintln!("  structure.json  Joints, members, and connections of the structure");
        eprintln!("  config.json     Search configuration (default: built-in defaults)");
        eprintln!("  generations     Generations to run (default: generations_per_run)");
        eprintln!();
        eprintln!("Physics settings are read from <structure>.physics.json when present.");
        eprintln!("Example files are printed with the --example flag.");
        process::exit(1);
    }

    if args[1] == "--example" {
        print_example();
        return;
    }

    let structure_path = PathBuf::from(&args[1]);
    let model: StructureModel = load_json(&structure_path, "structure");

    let physics_path = structure_path.with_extension("physics.json");
    let physics: PhysicsSettings = if physics_path.exists() {
        load_json(&physics_path, "physics settings")
    } else {
        PhysicsSettings::default()
    };

    let config = match args.get(2) {
        Some(path) => SearchConfig::from_json_file(path).unwrap_or_else(|e| {
            eprintln!("Error loading config: {e}");
            process::exit(1);
        }),
        None => SearchConfig::default(),
    };
    let generations = parse_generations(
        args.get(3).map(String::as_str),
        config.population.generations_per_run,
    )
    .unwrap_or_else(|e| {
        eprintln!("{e}");
        process::exit(1);
    });

    let registry = model.registry().unwrap_or_else(|e| {
        eprintln!("Invalid structure: {e}");
        process::exit(1);
    });

    let simulators: Vec<CollapseSimulator> = (0..config.evaluation.workers)
        .map(|_| CollapseSimulator::new(model.clone(), physics.clone()))
        .collect::<Result<_, _>>()
        .unwrap_or_else(|e| {
            eprintln!("Invalid structure: {e}");
            process::exit(1);
        });

    println!("Demolition Search");
    println!("=================");
    println!(
        "Structure: {} joints, {} members, {} connections",
        model.joints.len(),
        model.members.len(),
        model.connections.len()
    );
    println!(
        "Pool: {} chromosomes, up to {} genes",
        config.population.pool_size, config.population.max_genes_per_chromosome
    );
    println!("Cluster radius: {}", config.genetics.cluster_radius);
    println!("Workers: {}", config.evaluation.workers);
    println!("Generations: {generations}");
    println!();

    let mut engine =
        SearchEngine::with_workers(config, &registry, simulators).unwrap_or_else(|e| {
            eprintln!("Error starting search: {e}");
            process::exit(1);
        });
    println!(
        "Seed: {} ({} clusters, mean size {:.2})",
        engine.seed(),
        engine.clusters().len(),
        engine.clusters().mean_size()
    );
    println!();

    let result = engine
        .run_with_callback(generations, |progress| {
            let s = &progress.summary;
            println!(
                "  Generation {}/{}: min={:.4} avg={:.4} max={:.4} best={:.4}{}",
                progress.completed,
                progress.total_generations,
                s.min,
                s.avg,
                s.max,
                s.best_so_far,
                if s.failures > 0 {
                    format!(" ({} failed)", s.failures)
                } else {
                    String::new()
                }
            );
        })
        .unwrap_or_else(|e| {
            eprintln!("Search failed: {e}");
            process::exit(1);
        });

    println!();
    println!(
        "Stopped: {:?} after {} generations, {} evaluations ({} failed)",
        result.stats.stop_reason,
        result.stats.generations,
        result.stats.total_evaluations,
        result.stats.failed_evaluations
    );
    println!(
        "Time: {:.2}s ({:.1} evaluations/s)",
        result.stats.elapsed_seconds, result.stats.evaluations_per_second
    );
    println!();

    match engine.best() {
        Ok(best) => {
            println!("Best plan:");
            match serde_json::to_string_pretty(best) {
                Ok(json) => println!("{json}"),
                Err(e) => eprintln!("Error serializing best plan: {e}"),
            }
        }
        Err(e) => println!("{e}"),
    }

    if let Some(dir) = &engine.config().archive.archive_dir {
        println!();
        println!("Archive: {} plans in {}", engine.archive().len(), dir.display());
    }
}

fn load_json<T: DeserializeOwned>(path: &Path, what: &str) -> T {
    let text = fs::read_to_string(path).unwrap_or_else(|e| {
        eprintln!("Error reading {what} file {}: {e}", path.display());
        process::exit(1);
    });
    serde_json::from_str(&text).unwrap_or_else(|e| {
        eprintln!("Error parsing {what}: {e}");
        process::exit(1);
    })
}

/// The generations argument, or `default` when absent.
fn parse_generations(arg: Option<&str>, default: usize) -> Result<usize, String> {
    match arg {
        None => Ok(default),
        Some(s) => s
            .parse()
            .map_err(|e| format!("Invalid generations '{s}': {e}")),
    }
}

fn print_example() {
    let pretty = |value: serde_json::Result<String>| {
        value.unwrap_or_else(|e| {
            eprintln!("Error serializing example: {e}");
            process::exit(1);
        })
    };

    println!("Example structure (structure.json):");
    println!("{}", pretty(serde_json::to_string_pretty(&StructureModel::example())));
    println!();
    println!("Example physics settings (structure.physics.json):");
    println!("{}", pretty(serde_json::to_string_pretty(&PhysicsSettings::default())));
    println!();
    println!("Example configuration (config.json):");
    println!("{}", pretty(serde_json::to_string_pretty(&SearchConfig::default())));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_generations() {
        assert_eq!(parse_generations(None, 7), Ok(7));
        assert_eq!(parse_generations(Some("12"), 7), Ok(12));
        assert!(parse_generations(Some("abc"), 7).is_err());
        assert!(parse_generations(Some("-3"), 7).is_err());
        assert!(parse_generations(Some(""), 7).is_err());
    }
}
