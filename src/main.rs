use clap::Parser;

use adw::cli::{Action, Args};

fn main() -> std::io::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let args = Args::parse();
    match args.cmd {
        Action::Info { path } => adw::cli::info::info(path),
        Action::Count { path, output } => adw::cli::count::count(path, output),
        Action::Convert { input, output, to } => adw::cli::convert::convert(&input, &output, to),
    }
}
