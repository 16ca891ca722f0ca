//! `biblio` command-line entrypoint.

use anyhow::Context;
use biblio_app::{modules, App};
use biblio_kernel::{settings::Settings, ModuleRegistry};
use clap::{Parser, Subcommand};

/// Library catalog service
#[derive(Parser, Debug)]
#[command(name = "biblio")]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run the HTTP service
    Serve {
        /// Override the configured listen port
        #[arg(short, long)]
        port: Option<u16>,
        /// Seed the demo catalogue on start-up
        #[arg(long)]
        seed: bool,
    },

    /// Print the schema migrations contributed by each module, in order
    Migrations,

    /// Print the effective configuration
    Config,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let mut settings = Settings::load().with_context(|| "failed to load settings")?;

    match cli.command {
        Commands::Serve { port, seed } => {
            if let Some(port) = port {
                settings.server.port = port;
            }
            settings.database.seed_demo_data |= seed;
            serve(settings)
        }
        Commands::Migrations => print_migrations(),
        Commands::Config => {
            println!("{settings:#?}");
            Ok(())
        }
    }
}

fn serve(settings: Settings) -> anyhow::Result<()> {
    biblio_telemetry::init(&settings.telemetry)?;

    let runtime = tokio::runtime::Runtime::new().context("failed to start tokio runtime")?;
    runtime.block_on(async move {
        tracing::info!(env = ?settings.environment, "biblio serve starting");
        App::build(settings).await?.serve().await
    })
}

fn print_migrations() -> anyhow::Result<()> {
    let mut registry = ModuleRegistry::new();
    modules::register_all(&mut registry)?;

    for (module, migration) in registry.collect_migrations() {
        println!("-- {module}/{}", migration.id);
        println!("{}", migration.up.trim());
        println!();
    }
    Ok(())
}
