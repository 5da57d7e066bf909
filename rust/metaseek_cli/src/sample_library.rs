/// Inspection helper for the inputs of a run.
///
/// Used to check that metabolite libraries produced by the extraction
/// scripts parse correctly in Rust, and to dump the built-in adduct tables
/// as a starting point for a configuration file.
use clap::{
    Parser,
    Subcommand,
};
use metaseek::adducts::{
    AdductPriors,
    AdductTable,
};
use metaseek::MetaboliteLibrary;

#[derive(Parser)]
#[command(version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: SubCommands,
}

#[derive(Subcommand)]
enum SubCommands {
    /// Parse a metabolite library and print it as JSON
    Parse {
        #[arg(short, long)]
        metabolites_file: String,
    },
    /// Print the built-in adduct table
    Adducts,
    /// Print the built-in adduct priors
    Priors,
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<(), Box<dyn std::error::Error>> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    match &cli.command {
        SubCommands::Parse { metabolites_file } => {
            let library = MetaboliteLibrary::from_file(std::path::Path::new(metabolites_file))?;
            eprintln!("Parsed {} metabolites", library.len());
            print_json(&library)
        }
        SubCommands::Adducts => print_json(&AdductTable::default()),
        SubCommands::Priors => print_json(&AdductPriors::default()),
    }
}
