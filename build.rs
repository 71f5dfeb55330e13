// Generates the man page and shell completions from the CLI definition.

use clap::CommandFactory;
use clap_complete::Shell;
use std::env;
use std::fs;
use std::io;

include!("src/cli.rs");

fn main() -> io::Result<()> {
    println!("cargo:rerun-if-changed=src/cli.rs");

    let out_dir = PathBuf::from(env::var_os("OUT_DIR").ok_or(io::ErrorKind::NotFound)?);
    let mut cmd = Cli::command();

    let mut man = Vec::new();
    clap_mangen::Man::new(cmd.clone()).render(&mut man)?;
    fs::write(out_dir.join("profile-migrate.1"), man)?;

    for shell in [Shell::Bash, Shell::Zsh, Shell::Fish] {
        clap_complete::generate_to(shell, &mut cmd, "profile-migrate", &out_dir)?;
    }

    Ok(())
}
