use std::env;
use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{anyhow, Context, Result};
use colored::*;
use qfs::list::list;
use qfs::QfsImage;

fn main() -> ExitCode {
    qfs::init_tracing();
    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("{} {err:#}", "list_qfs:".red().bold());
            ExitCode::from(qfs::exit_code_for(&err))
        }
    }
}

fn run() -> Result<()> {
    let mut args = env::args().skip(1);
    let path = args
        .next()
        .map(PathBuf::from)
        .context("Uso: list_qfs <imagen>")?;

    if args.next().is_some() {
        return Err(anyhow!("Uso: list_qfs <imagen> (solo un argumento)"));
    }

    let mut image = QfsImage::open(&path)?;
    let listing = list(&mut image).with_context(|| format!("No se pudo listar {:?}", path))?;
    let sb = &listing.superblock;

    // ——————————————————————————————————————————
    //       SUPERBLOCK
    // ——————————————————————————————————————————
    println!("\n{}", " QFS DISK INFORMATION ".on_blue().bold());
    if let Some(label) = listing.label() {
        println!("Volume Label: {}", label.bold());
    }
    println!("Block Size: {} bytes", sb.bytes_per_block);
    println!("Total Blocks: {}", sb.total_blocks);
    println!("Free Blocks: {}", sb.available_blocks);
    println!("Total Directory Entries: {}", sb.total_direntries);
    println!("Free Directory Entries: {}", sb.available_direntries);

    // ——————————————————————————————————————————
    //       DIRECTORIO
    // ——————————————————————————————————————————
    println!("\n{}", "Directory Contents".bold().underline());

    for (n, file) in listing.files.iter().enumerate() {
        println!("File #{}:", n + 1);
        println!("  Name: {}", file.name.green());
        println!("  Size: {} bytes", file.size);
        println!("  Type: {}", file.kind);
        println!("  Starting Block: {}", file.starting_block);
        println!("  Owner ID: {}", file.owner_id);
        println!("  Group ID: {}", file.group_id);
        println!("  Permissions: {}\n", file.permissions);
    }

    if listing.files.is_empty() {
        println!("{}", "(No files found)".yellow());
    } else {
        println!("Total files: {}", listing.files.len().to_string().bold());
    }

    Ok(())
}
