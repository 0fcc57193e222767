//! `mdt init` command - Initialize a new project

use console::style;
use miette::{IntoDiagnostic, Result};

use crate::core::identity::EntityPrefix;
use crate::core::project::{Project, ProjectError};

#[derive(clap::Args, Debug)]
pub struct InitArgs {
    /// Directory to initialize (default: current directory)
    #[arg(default_value = ".")]
    pub path: std::path::PathBuf,
}

pub fn run(args: InitArgs) -> Result<()> {
    let path = if args.path.as_os_str() == "." {
        std::env::current_dir().into_diagnostic()?
    } else {
        args.path.clone()
    };

    if !path.exists() {
        std::fs::create_dir_all(&path).into_diagnostic()?;
        println!(
            "{} Created directory {}",
            style("✓").green(),
            style(path.display()).cyan()
        );
    }

    match Project::init(&path) {
        Ok(project) => {
            println!(
                "{} Initialized MDT project at {}",
                style("✓").green(),
                style(project.root().display()).cyan()
            );
            println!();
            println!("Created project structure:");
            for prefix in EntityPrefix::all() {
                println!("  {}/", Project::entity_directory(*prefix));
            }
            println!();
            println!("Next steps:");
            println!(
                "  {} Define your first attribute",
                style("mdt attr new").yellow()
            );
            println!(
                "  {} Build the type hierarchy",
                style("mdt type new").yellow()
            );
            println!("  {} Create an item", style("mdt item new").yellow());
            Ok(())
        }
        Err(ProjectError::AlreadyExists(path)) => {
            println!(
                "{} MDT project already exists at {}",
                style("!").yellow(),
                style(path.display()).cyan()
            );
            Ok(())
        }
        Err(e) => Err(miette::miette!("{}", e)),
    }
}
