use std::env;

use log::info;
use rs_gram_core::grammar::export::{to_arrow, to_tracery};
use rs_gram_core::io::{build_output_path, read_dataset};
use rs_gram_core::{Generator, Grammar, GrammarInducer, InductionConfig};

const BUILTIN_DATASET: [&str; 5] = [
    "I like my cat and my dog",
    "I like my dog and my chicken",
    "Alice the cat is jumping",
    "Bob the dog is walking",
    "Cathy the cat is walking",
];

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // RUST_LOG=debug shows every alignment, merge and pruning step
    env_logger::init();

    let args: Vec<String> = env::args().skip(1).collect();

    // Optional second argument: a JSON file with any InductionConfig field
    let config = match args.get(1) {
        Some(path) => InductionConfig::from_json_file(path)?,
        None => InductionConfig::default(),
    };

    // Invalid values are refused by the setters
    let mut refused = config.clone();
    match refused.set_relative_similarity_threshold(2.0) {
        Ok(_) => println!("Should not happen"),
        Err(e) => println!("Threshold 2.0 refused: {}", e),
    }

    // Optional first argument: one example per line.
    // With the default config, the induced grammar is cached next to it as a .bin file
    let (dataset, grammar) = match args.first() {
        Some(path) => {
            let dataset = read_dataset(path)?;
            let cache = build_output_path(path, "bin")?;
            let grammar = if args.get(1).is_some() {
                info!("config given, not using the cache at {}", cache.display());
                GrammarInducer::new(config)?.induce(&dataset)?
            } else if cache.exists() {
                info!("loading cached grammar from {}", cache.display());
                Grammar::load(&cache)?
            } else {
                let grammar = GrammarInducer::new(config)?.induce(&dataset)?;
                grammar.save(&cache)?;
                grammar
            };
            (dataset, grammar)
        }
        None => {
            let dataset: Vec<String> = BUILTIN_DATASET.iter().map(|s| s.to_string()).collect();
            let induction = GrammarInducer::new(config)?.induce_detailed(&dataset)?;
            println!("Statistics: {:?}", induction.stats);
            (dataset, induction.grammar)
        }
    };

    println!("Grammar:\n{}\n", to_arrow(&grammar));
    println!("Tracery:\n{}\n", to_tracery(&grammar)?);
    println!(
        "{} nonterminals, {} productions, depth {}, {} derivations",
        grammar.rules().len(),
        grammar.size(),
        grammar.depth(),
        grammar.derivation_count()
    );

    // Number of retries if the generated string is already in the dataset
    let mut generator = Generator::new(grammar).with_known(dataset);
    generator.nb_try = 100;

    // Same seed, same string
    println!("Seeded: {}", generator.generate_seeded(42)?);

    for i in 0..10 {
        println!("Generated {}: {}", i + 1, generator.generate_novel()?);
    }

    match generator.generate_all() {
        Ok(all) => println!("The grammar generates {} strings", all.len()),
        Err(e) => println!("Too many strings to list: {}", e),
    }

    Ok(())
}
