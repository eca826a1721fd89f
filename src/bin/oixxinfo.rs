//! `oixxinfo` — inspect oiDL/oiSB/oiSH/oiBC files from the command line.
//!
//! Dispatches on the file's leading magic number and prints a structural
//! summary; similar in spirit to `exiftool`, scoped to the `oiXX` family.

use clap::{Parser, Subcommand};
use colored::*;
use std::fs;
use std::path::PathBuf;

use oixx_core::container::{MAGIC_OIBC, MAGIC_OIDL, MAGIC_OISB, MAGIC_OISH};
use oixx_core::oibc::BcFile;
use oixx_core::oidl::DlFile;
use oixx_core::oisb::SbFile;
use oixx_core::oish::ShFile;

#[derive(Parser)]
#[command(name = "oixxinfo")]
#[command(about = "Inspect oiDL/oiSB/oiSH/oiBC files", long_about = None)]
#[command(version)]
struct Cli {
    /// oiXX file to inspect
    #[arg(value_name = "FILE")]
    file: PathBuf,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Show detailed file information (default)
    Info,
    /// Only print the detected format and version
    Identify,
}

fn main() {
    let cli = Cli::parse();

    let data = match fs::read(&cli.file) {
        Ok(d) => d,
        Err(e) => {
            eprintln!("{} reading {}: {}", "error".red().bold(), cli.file.display(), e);
            std::process::exit(1);
        }
    };

    let result = match cli.command {
        Some(Commands::Identify) => identify(&data),
        Some(Commands::Info) | None => show_info(&data),
    };

    if let Err(e) = result {
        eprintln!("{} {}", "error:".red().bold(), e);
        std::process::exit(1);
    }
}

fn detect_magic(data: &[u8]) -> Option<u32> {
    if data.len() < 4 {
        return None;
    }
    Some(u32::from_le_bytes(data[0..4].try_into().unwrap()))
}

fn identify(data: &[u8]) -> Result<(), String> {
    match detect_magic(data) {
        Some(MAGIC_OIDL) => println!("oiDL"),
        Some(MAGIC_OISB) => println!("oiSB"),
        Some(MAGIC_OISH) => println!("oiSH"),
        Some(MAGIC_OIBC) => println!("oiBC"),
        _ => return Err("unrecognized magic number".to_string()),
    }
    Ok(())
}

fn show_info(data: &[u8]) -> Result<(), String> {
    match detect_magic(data) {
        Some(MAGIC_OIDL) => show_dl(data),
        Some(MAGIC_OISB) => show_sb(data),
        Some(MAGIC_OISH) => show_sh(data),
        Some(MAGIC_OIBC) => show_bc(data),
        _ => Err("unrecognized magic number (expected oiDL/oiSB/oiSH/oiBC)".to_string()),
    }
}

fn show_dl(data: &[u8]) -> Result<(), String> {
    let (file, read_len) = DlFile::read(data, None, false).map_err(|e| e.to_string())?;
    println!("{}", "oiDL".green().bold());
    println!("  data type:   {:?}", file.settings.data_type);
    println!("  entries:     {}", file.len());
    println!("  read length: {}", read_len);
    Ok(())
}

fn show_sb(data: &[u8]) -> Result<(), String> {
    let file = SbFile::read(data, false).map_err(|e| e.to_string())?;
    println!("{}", "oiSB".green().bold());
    print!("{}", file.print());
    Ok(())
}

fn show_sh(data: &[u8]) -> Result<(), String> {
    let file = ShFile::read(data, false).map_err(|e| e.to_string())?;
    println!("{}", "oiSH".green().bold());
    println!("  pipeline:    {:?}", file.pipeline_type);
    println!("  extensions:  {:?}", file.extensions);
    println!("  entries:     {}", file.entries.len());
    for entry in &file.entries {
        println!("    - {:?} {:?}", entry.stage, entry.name);
    }
    Ok(())
}

fn show_bc(data: &[u8]) -> Result<(), String> {
    let (file, read_len) = BcFile::read(data, None, false).map_err(|e| e.to_string())?;
    println!("{}", "oiBC".green().bold());
    println!("  fidiA:       {} bytes", file.fidi_a().len());
    println!("  fidiB:       {} bytes", file.fidi_b().len());
    println!("  gida:        {} u16s", file.gida().len());
    println!("  leon:        {} u32s", file.leon().len());
    println!("  read length: {}", read_len);
    Ok(())
}
