use anyhow::Result;
use clap::{Parser, Subcommand};
use std::process::Command;

#[derive(Parser)]
#[command(name = "xtask", about = "Workspace automation for aquifer")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run fmt, clippy, tests and doc in sequence
    Check,
    /// Run cargo fmt --check on all crates
    Fmt,
    /// Run clippy on all crates, warnings denied
    Clippy,
    /// Run all tests, including property tests
    Test {
        /// Proptest cases per property
        #[arg(long)]
        cases: Option<u32>,
    },
    /// Build rustdoc for the workspace
    Doc,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Check => {
            fmt()?;
            clippy()?;
            test(None)?;
            doc()?;
        }
        Commands::Fmt => fmt()?,
        Commands::Clippy => clippy()?,
        Commands::Test { cases } => test(cases)?,
        Commands::Doc => doc()?,
    }

    Ok(())
}

fn cargo(label: &str, args: &[&str], env: &[(&str, String)]) -> Result<()> {
    println!("==> {label}");
    let mut command = Command::new("cargo");
    command.args(args);
    for (key, value) in env {
        command.env(key, value);
    }
    let status = command.status()?;
    if !status.success() {
        anyhow::bail!("{label} failed");
    }
    Ok(())
}

fn fmt() -> Result<()> {
    cargo("cargo fmt --check", &["fmt", "--all", "--", "--check"], &[])
}

fn clippy() -> Result<()> {
    cargo(
        "cargo clippy",
        &["clippy", "--workspace", "--all-targets", "--", "-D", "warnings"],
        &[],
    )
}

fn test(cases: Option<u32>) -> Result<()> {
    let env: Vec<(&str, String)> = cases
        .map(|n| vec![("PROPTEST_CASES", n.to_string())])
        .unwrap_or_default();
    cargo("cargo test", &["test", "--workspace"], &env)
}

fn doc() -> Result<()> {
    cargo("cargo doc", &["doc", "--workspace", "--no-deps"], &[])
}
