use std::env;
use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{anyhow, Context, Result};
use colored::*;
use qfs::fsck::{run_fsck, FsckReport};
use qfs::QfsImage;

fn main() -> ExitCode {
    qfs::init_tracing();
    match run() {
        Ok(report) if report.is_clean() => ExitCode::SUCCESS,
        Ok(_) => ExitCode::from(qfs::EXIT_CHECK_FAILED),
        Err(err) => {
            eprintln!("{} {err:#}", "fsck.qfs:".red().bold());
            ExitCode::from(qfs::exit_code_for(&err))
        }
    }
}

fn status(ok: bool, good: &str, bad: &str) {
    if ok {
        println!("  {} {}", "✓".green(), good);
    } else {
        println!("  {} {}", "✗".red(), bad);
    }
}

fn run() -> Result<FsckReport> {
    let mut args = env::args().skip(1);
    let path = args
        .next()
        .map(PathBuf::from)
        .context("Uso: fsck.qfs <imagen>")?;

    if args.next().is_some() {
        return Err(anyhow!("Uso: fsck.qfs <imagen> (solo un argumento)"));
    }

    // ——————————————————————————————————————————
    //       EJECUTAR FSCK
    // ——————————————————————————————————————————
    let mut image = QfsImage::open(&path)?;
    let rep = run_fsck(&mut image).with_context(|| format!("No se pudo revisar {:?}", path))?;

    println!("\n{}", " QFS FILESYSTEM CHECK ".on_blue().bold());
    println!("{}", "──────────────────────────────────────────".blue());

    println!("\n{}", "Superblock".bold().underline());
    status(rep.superblock_ok, "Superblock OK", "Errores en el superblock");

    println!("\n{}", "Directorio".bold().underline());
    status(rep.entries_ok, "Entradas OK", "Errores en las entradas");
    println!("  {} archivos revisados", rep.files_checked);

    println!("\n{}", "Bloques".bold().underline());
    status(rep.blocks_ok, "Cadenas OK", "Errores en las cadenas de bloques");

    // ——————————————————————————————————————————
    //       ERRORES Y ADVERTENCIAS
    // ——————————————————————————————————————————
    println!("\n{}", "Errores detectados".bold().underline());
    if rep.errors.is_empty() {
        println!("  {} No se encontraron errores", "✓".green());
    } else {
        for err in &rep.errors {
            println!("  {} {}", "•".red(), err.red());
        }
    }

    if !rep.warnings.is_empty() {
        println!("\n{}", "Advertencias".bold().underline());
        for w in &rep.warnings {
            println!("  {} {}", "•".yellow(), w.yellow());
        }
    }

    // ——————————————————————————————————————————
    //       RESUMEN FINAL
    // ——————————————————————————————————————————
    println!("\n{}", "Resumen".bold().underline());
    if rep.is_clean() {
        println!("{} Sistema de archivos limpio.\n", "✓ OK".green().bold());
    } else {
        println!(
            "{} {} errores encontrados.\n",
            "✗ FSCK completado con errores:".red().bold(),
            rep.errors.len().to_string().yellow()
        );
    }

    Ok(rep)
}
