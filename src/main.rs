use anyhow::Result;
use clap::Parser;
use dotenv::dotenv;
use log::{ error, info };

use cisforge::config::ForgeConfig;
use cisforge::implementations::workflow::GenerateOptions;
mod cli;
use cli::{ Commands, ForgeCli };

#[tokio::main(flavor = "current_thread")]
async fn main() {
    dotenv().ok();

    // Parse the command line arguments
    let cli = ForgeCli::parse();

    // Setup logging
    let log_level = if cli.verbose { "debug" } else { cli.log_level.as_str() };
    setup_logging(log_level);

    if let Err(e) = run(cli).await {
        error!("{:#}", e);
        cli::ui::print_error(&format!("{:#}", e));
        std::process::exit(1);
    }
}

async fn run(cli: ForgeCli) -> Result<()> {
    let mut config = ForgeConfig::load(cli.config.as_deref())?;

    match cli.command {
        Commands::Repair { input, output, no_repair } => {
            cli::commands::repair::execute(&input, &output, no_repair).await?;
        }

        Commands::Parse { input, output, id_only } => {
            cli::commands::parse::execute(&input, output.as_deref(), id_only).await?;
        }

        Commands::Index { input, output } => {
            cli::commands::index::execute(&config, &input, &output).await?;
        }

        Commands::Show { checkpoint, store, index } => {
            cli::commands::show::execute(
                &config,
                &checkpoint,
                store.as_deref(),
                index.as_deref()
            ).await?;
        }

        Commands::Generate {
            checkpoint,
            all,
            store,
            index,
            target_host,
            test_host,
            become_user,
            max_retries,
            skip_execution,
            no_interactive,
            output_dir,
            filename,
        } => {
            if let Some(user) = become_user {
                config.workflow.become_user = user;
            }
            let options = GenerateOptions {
                target_host,
                test_host,
                max_retries,
                skip_execution,
                output_dir: output_dir.unwrap_or_else(|| config.workflow.output_dir.clone()),
                file_name: filename,
            };
            cli::commands::generate::execute(
                config,
                &checkpoint,
                all,
                store.as_deref(),
                index.as_deref(),
                options,
                !no_interactive
            ).await?;
        }
    }

    Ok(())
}

fn setup_logging(log_level: &str) {
    // Set up the logger based on the log level
    let level = match log_level.to_lowercase().as_str() {
        "trace" => log::LevelFilter::Trace,
        "debug" => log::LevelFilter::Debug,
        "info" => log::LevelFilter::Info,
        "warn" => log::LevelFilter::Warn,
        "error" => log::LevelFilter::Error,
        _ => log::LevelFilter::Info,
    };

    env_logger::Builder::new().filter_level(level).init();

    info!("Logger initialized with level: {}", log_level);
}
