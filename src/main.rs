mod cli_main;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{info, warn};
use tracing_subscriber::FmtSubscriber;

use cli_main::{Cli, Commands};
use shardalign::{Driver, RunContext, Session};

fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = if cli.verbose {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    };
    let subscriber = FmtSubscriber::builder().with_max_level(level).finish();
    tracing::subscriber::set_global_default(subscriber)
        .context("Setting tracing default failed")?;

    match cli.command {
        Commands::Bwa(options) => {
            let start = std::time::Instant::now();
            let session = Session::new(&options.app_name, options.threads)
                .context("Could not start alignment session")?;
            let ctx = RunContext::new(&options, session.run_id())
                .context("Invalid alignment configuration")?;
            info!(
                "Aligning {} against {} with bwa {}",
                ctx.input.display(),
                ctx.index_path.display(),
                ctx.algorithm
            );

            let report = Driver::new(&session, &ctx)
                .run()
                .with_context(|| format!("Could not read input {}", ctx.input.display()))?;

            if let Some(dir) = &ctx.output {
                let path = report
                    .write_json(dir)
                    .with_context(|| format!("Could not write run report to {}", dir.display()))?;
                info!("Run report written to {}", path.display());
            }

            if !report.is_complete() {
                warn!(
                    "{} partitions missing; check the log for failed alignments",
                    report.missing_partitions()
                );
            }
            for output in report.outputs() {
                println!("{}", output.display());
            }
            info!("Alignment completed in {:.2}s", start.elapsed().as_secs_f32());
        }
    }

    Ok(())
}
