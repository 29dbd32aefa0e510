use std::env;
use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{anyhow, Context, Result};
use colored::*;
use qfs::carve::{recover, CarveConfig, CarveMode};
use qfs::QfsImage;

const USAGE: &str =
    "Uso: recover_qfs <imagen> [--raw] [--out-dir DIR] [--min-size N] [--window N]";

fn main() -> ExitCode {
    qfs::init_tracing();
    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("{} {err:#}", "recover_qfs:".red().bold());
            ExitCode::from(qfs::exit_code_for(&err))
        }
    }
}

fn parse_args() -> Result<(PathBuf, CarveConfig)> {
    let mut image = None;
    let mut cfg = CarveConfig::default();
    let mut args = env::args().skip(1);

    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--raw" => cfg.mode = CarveMode::Raw,
            "--out-dir" => {
                cfg.out_dir = args.next().map(PathBuf::from).context(USAGE)?;
            }
            "--min-size" => {
                let v = args.next().context(USAGE)?;
                cfg.min_len = v
                    .parse()
                    .with_context(|| format!("--min-size inválido: {v}"))?;
            }
            "--window" => {
                let v = args.next().context(USAGE)?;
                cfg.window = v
                    .parse()
                    .with_context(|| format!("--window inválido: {v}"))?;
            }
            _ if image.is_none() && !arg.starts_with("--") => image = Some(PathBuf::from(&arg)),
            _ => return Err(anyhow!("argumento inesperado '{arg}'\n{USAGE}")),
        }
    }

    let image = image.context(USAGE)?;
    Ok((image, cfg))
}

fn run() -> Result<()> {
    let (path, cfg) = parse_args()?;
    if cfg.mode == CarveMode::Raw {
        println!(
            "{}",
            "Modo raw: las cabeceras de bloque pueden producir falsos positivos.".yellow()
        );
    }

    let mut image = QfsImage::open(&path)?;
    let recovered = recover(&mut image, &cfg)
        .with_context(|| format!("No se pudo recuperar archivos de {:?}", path))?;

    for r in &recovered {
        println!(
            "{} Recovered: {} ({} bytes)",
            "✓".green(),
            r.path.display(),
            r.len
        );
    }

    if recovered.is_empty() {
        println!("{}", "No JPG files recovered.".yellow());
    } else {
        println!(
            "\nTotal files recovered: {}",
            recovered.len().to_string().bold()
        );
    }
    Ok(())
}
