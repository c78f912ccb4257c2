use std::env;
use std::sync::Arc;

use strata::config::{Config, Resolved, Resolver};
use strata::laz::LasDriver;
use strata::storage::{BlobStore, LocalFs};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();
    let args: Vec<String> = env::args().collect();

    match args.len() {
        2 => run(&args[1], None),
        3 => run(&args[1], Some(&args[2])),
        _ => {
            eprintln!("Usage:");
            eprintln!("  {} <config.json>                          (resolve a build)", args[0]);
            eprintln!(
                "  {} <config.json> <out.entwine-inference>  (also save the inference)",
                args[0]
            );
            std::process::exit(1);
        }
    }
}

fn run(config_path: &str, artifact_out: Option<&str>) -> Result<(), Box<dyn std::error::Error>> {
    let raw = std::fs::read(config_path)?;
    let config = Config::from_slice(&raw)?;

    let store: Arc<dyn BlobStore> = Arc::new(LocalFs);
    let resolver = Resolver::new(Arc::new(LasDriver), Arc::clone(&store));

    match resolver.resolve(config)? {
        Resolved::Continuation(continuation) => {
            println!("Existing build found at {}", continuation.output);
            println!("  Marker: {}", continuation.marker);
            println!("  Appending {} input files", continuation.appended.len());
        }
        Resolved::Build(descriptor) => {
            let stats = descriptor.file_stats;
            println!("Resolved build descriptor:");
            println!("  Points: {}", descriptor.num_points);
            println!(
                "  Bounds: ({:.2}, {:.2}, {:.2}) to ({:.2}, {:.2}, {:.2})",
                descriptor.bounds.min().x,
                descriptor.bounds.min().y,
                descriptor.bounds.min().z,
                descriptor.bounds.max().x,
                descriptor.bounds.max().y,
                descriptor.bounds.max().z,
            );
            println!(
                "  Schema: {} dims, stride {}",
                descriptor.schema.dims().len(),
                descriptor.schema.stride()
            );
            println!(
                "  Files: {} inserted, {} omitted, {} errors",
                stats.inserts, stats.omits, stats.errors
            );
            if let Some(delta) = &descriptor.delta {
                println!(
                    "  Scale: ({}, {}, {})  Offset: ({}, {}, {})",
                    delta.scale.x,
                    delta.scale.y,
                    delta.scale.z,
                    delta.offset.x,
                    delta.offset.y,
                    delta.offset.z
                );
            }
            println!(
                "  Depths: null {} base {}{}",
                descriptor.null_depth,
                descriptor.base_depth,
                descriptor
                    .bump_depth
                    .map(|d| format!(" (bumped from {d})"))
                    .unwrap_or_default()
            );

            if let Some(out) = artifact_out {
                let json = descriptor.to_inference_json()?;
                store.put(out, &serde_json::to_vec_pretty(&json)?)?;
                println!("Saved {out}");
            }
        }
    }

    Ok(())
}
