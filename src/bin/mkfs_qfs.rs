use std::env;
use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{anyhow, Context, Result};
use colored::*;
use qfs::mkfs;

fn main() -> ExitCode {
    qfs::init_tracing();
    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("{} {err:#}", "mkfs.qfs:".red().bold());
            ExitCode::from(qfs::exit_code_for(&err))
        }
    }
}

fn run() -> Result<()> {
    // 1. Imagen (ya dimensionada) y label opcional
    let mut args = env::args().skip(1);
    let image = args
        .next()
        .map(PathBuf::from)
        .context("Uso: mkfs.qfs <imagen> [label]")?;
    let label = args.next();

    if args.next().is_some() {
        return Err(anyhow!("Uso: mkfs.qfs <imagen> [label] (máximo dos argumentos)"));
    }

    // 2. Formatear: superblock, directorio vacío y marcadores de bloque
    let sb = mkfs::format_path(&image, label.as_deref())
        .with_context(|| format!("No se pudo formatear {:?}", image))?;

    println!(
        "mkfs.qfs: sistema QFS creado con {} bloques de {} bytes.",
        sb.total_blocks.to_string().green(),
        sb.bytes_per_block.to_string().green()
    );
    let label = sb.label();
    if !label.is_empty() {
        println!("mkfs.qfs: label del volumen: {}", label.bold());
    }

    Ok(())
}
