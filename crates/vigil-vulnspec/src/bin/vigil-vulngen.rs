// SPDX-License-Identifier: MIT OR Apache-2.0
use std::fs;
use std::io::{IsTerminal, Read, Write};
use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::Parser;

#[derive(Parser, Debug)]
#[command(
    name = "vigil-vulngen",
    version,
    about = "Compile vulnspec source into a bytecode image"
)]
struct Args {
    /// Source file; stdin when omitted.
    #[arg(short = 'f', long = "file")]
    input: Option<PathBuf>,

    /// Image output file; stdout when omitted.
    #[arg(short = 'o', long = "output")]
    output: Option<PathBuf>,
}

fn main() -> Result<()> {
    let args = Args::parse();

    let source = match &args.input {
        Some(path) => fs::read(path).with_context(|| format!("read {}", path.display()))?,
        None => {
            let mut buf = Vec::new();
            std::io::stdin()
                .read_to_end(&mut buf)
                .context("read stdin")?;
            buf
        }
    };

    let image = vigil_vulnspec::compile(&source).context("compile vulnspec")?;

    match &args.output {
        Some(path) => {
            fs::write(path, &image).with_context(|| format!("write {}", path.display()))?
        }
        None => {
            let mut stdout = std::io::stdout();
            if stdout.is_terminal() {
                bail!("refusing image output to a tty");
            }
            stdout.write_all(&image).context("write stdout")?;
        }
    }

    Ok(())
}
