//! Genetic Tone Mapping CLI - Evolve tone-mapping recipes from JSON configuration.

use std::path::PathBuf;
use std::time::Instant;

use genetic_tonemap::{
    compute::evolution::{EvolutionEngine, FitnessEvaluator},
    compute::{Image, compose},
    schema::EvolutionConfig,
};

fn main() {
    env_logger::init();

    let args: Vec<String> = std::env::args().collect();

    if args.len() < 2 {
        eprintln!("Usage: {} <config.json> [epochs]", args[0]);
        eprintln!();
        eprintln!("Evolve a composite tone-mapping recipe from JSON configuration.");
        eprintln!();
        eprintln!("Arguments:");
        eprintln!("  config.json  Path to evolution configuration file");
        eprintln!("  epochs       Number of epochs (default: from config)");
        eprintln!();
        eprintln!("Example configuration is generated with --example flag.");
        std::process::exit(1);
    }

    if args[1] == "--example" {
        print_example_config();
        return;
    }

    let config_path = PathBuf::from(&args[1]);
    let mut config = EvolutionConfig::load(&config_path).unwrap_or_else(|e| {
        eprintln!("Error loading config: {}", e);
        std::process::exit(1);
    });
    if let Some(epochs) = args.get(2).and_then(|s| s.parse().ok()) {
        config.population.max_epochs = epochs;
    }

    let training = config.training.clone();

    println!("Genetic Tone Mapping");
    println!("====================");
    println!(
        "Reference scenes: {} at {}x{}",
        training.scenes.len(),
        training.width,
        training.height
    );
    println!("Population: {}", config.population.size);
    println!("Operators: {:?}", config.operators);
    println!("Epochs: {}", config.population.max_epochs);
    println!();

    let fitness = config.fitness.clone();
    let mut engine = EvolutionEngine::from_config(config).unwrap_or_else(|e| {
        eprintln!("Error creating engine: {}", e);
        std::process::exit(1);
    });

    println!("Evolving...");
    let start = Instant::now();

    let result = engine.run_with_callback(|progress| {
        let species = progress.species_sizes.len();
        println!(
            "  Epoch {}/{}: best={:.3}, epoch best={:.3}, avg={:.3}, species={}",
            progress.epoch,
            progress.total_epochs,
            progress.best_fitness,
            progress.epoch_best,
            progress.avg_fitness,
            species
        );
    });

    println!();
    println!(
        "Stopped after {} epochs ({:?}) in {:.2}s",
        result.stats.epochs,
        result.stats.stop_reason,
        start.elapsed().as_secs_f32()
    );
    println!("Best raw fitness: {:.3}", result.stats.best_fitness);
    println!("Evaluations: {}", result.stats.total_evaluations);
    println!();

    match serde_json::to_string_pretty(&result.best) {
        Ok(json) => {
            println!("Best chromosome:");
            println!("{}", json);
        }
        Err(e) => eprintln!("Error serializing best chromosome: {}", e),
    }

    if !training.test_scenes.is_empty() {
        let test_images =
            Image::render_scenes(&training.test_scenes, training.width, training.height);
        let total = engine.evaluate_on(&result.best, &test_images);
        println!();
        println!(
            "Test scenes: {} total fitness {:.3} ({:.3} per scene)",
            test_images.len(),
            total,
            total / test_images.len() as f32
        );

        let evaluator = FitnessEvaluator::new(fitness);
        for (i, image) in test_images.iter().enumerate() {
            let breakdown = evaluator.evaluate(&compose(image, &result.best.genes));
            println!(
                "  Scene {}: entropy={:.3}, contrast={:.3}, saturation={:.3}, sharpness={:.3}",
                i, breakdown.entropy, breakdown.contrast, breakdown.saturation, breakdown.sharpness
            );
        }
    }
}

fn print_example_config() {
    let config = EvolutionConfig {
        random_seed: Some(42),
        ..Default::default()
    };

    println!("Example configuration (config.json):");
    match serde_json::to_string_pretty(&config) {
        Ok(json) => println!("{}", json),
        Err(e) => {
            eprintln!("Error serializing config: {}", e);
            std::process::exit(1);
        }
    }
}
