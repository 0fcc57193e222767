use clap::Parser;
use miette::Result;
use mdt::cli::{Cli, Commands};

fn main() -> Result<()> {
    // Reset SIGPIPE to default behavior (terminate silently) for proper Unix piping.
    // Without this, piping to `head`, `grep -q`, etc. causes a panic on broken pipe.
    // This is standard practice for CLI tools that output to stdout.
    #[cfg(unix)]
    {
        unsafe {
            libc::signal(libc::SIGPIPE, libc::SIG_DFL);
        }
    }
    // Install miette's fancy error handler for beautiful diagnostics
    miette::set_hook(Box::new(|_| {
        Box::new(
            miette::MietteHandlerOpts::new()
                .terminal_links(true)
                .unicode(true)
                .context_lines(2)
                .tab_width(4)
                .build(),
        )
    }))?;

    let cli = Cli::parse();
    let global = cli.global;

    match cli.command {
        Commands::Init(args) => mdt::cli::commands::init::run(args),
        Commands::Attr(cmd) => mdt::cli::commands::attr::run(cmd, &global),
        Commands::Group(cmd) => mdt::cli::commands::group::run(cmd, &global),
        Commands::ItemType(cmd) => mdt::cli::commands::hierarchy::run_type(cmd, &global),
        Commands::Category(cmd) => mdt::cli::commands::hierarchy::run_category(cmd, &global),
        Commands::Family(cmd) => mdt::cli::commands::hierarchy::run_family(cmd, &global),
        Commands::Item(cmd) => mdt::cli::commands::item::run(cmd, &global),
        Commands::Assoc(cmd) => mdt::cli::commands::assoc::run(cmd, &global),
        Commands::Link(cmd) => mdt::cli::commands::link::run(cmd, &global),
        Commands::Completions(args) => mdt::cli::commands::completions::run(args),
    }
}
