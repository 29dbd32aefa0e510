use std::env;
use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{anyhow, Context, Result};
use colored::*;
use qfs::extract::extract_to_path;

const USAGE: &str = "Uso: read_qfs <imagen> <archivo> <salida>";

fn main() -> ExitCode {
    qfs::init_tracing();
    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("{} {err:#}", "read_qfs:".red().bold());
            ExitCode::from(qfs::exit_code_for(&err))
        }
    }
}

fn run() -> Result<()> {
    let mut args = env::args().skip(1);
    let image = args.next().map(PathBuf::from).context(USAGE)?;
    let name = args.next().context(USAGE)?;
    let dest = args.next().map(PathBuf::from).context(USAGE)?;

    if args.next().is_some() {
        return Err(anyhow!("{USAGE} (solo tres argumentos)"));
    }

    let written = extract_to_path(&image, &name, &dest)
        .with_context(|| format!("No se pudo extraer '{}' de {:?}", name, image))?;

    println!(
        "{} '{}' -> '{}' ({} bytes)",
        "✓".green(),
        name,
        dest.display(),
        written
    );
    Ok(())
}
