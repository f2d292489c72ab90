//! AppImage inspector
//!
//! Command-line front end for the library: classify AppImages, list and
//! extract payload files, query the desktop entry.

use anyhow::{bail, Context, Result};
use appimage::core::validation::sanitize_for_path;
use appimage::{AppImage, AppImageFormat, Config};
use clap::{Parser, Subcommand};
use std::io::Write;
use std::path::PathBuf;
use tracing::info;

#[derive(Parser, Debug)]
#[command(name = "appimage-inspect")]
#[command(about = "Inspect and extract AppImage containers")]
struct Args {
    /// Log filter (overrides LIBAPPIMAGE_LOG and the config file)
    #[arg(long, global = true)]
    log: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print the AppImage type (1, 2) or -1
    Type {
        appimage: PathBuf,
    },

    /// List payload files
    List {
        appimage: PathBuf,
    },

    /// Write a payload file to stdout, following symlinks
    Cat {
        appimage: PathBuf,
        file: String,
    },

    /// Extract a payload file, following symlinks
    Extract {
        appimage: PathBuf,
        file: String,

        /// Destination (defaults to a sanitized copy of the file path)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Print the payload offset
    Offset {
        appimage: PathBuf,
    },

    /// Print the thumbnail md5 of a path
    Md5 {
        path: PathBuf,
    },

    /// Print the desktop entry flags
    Desktop {
        appimage: PathBuf,

        /// Also print a value, e.g. "Desktop Entry/Name"
        #[arg(short, long)]
        key: Vec<String>,
    },
}

fn init_logging(args: &Args) {
    let mut config = Config::load();
    if let Some(filter) = &args.log {
        config.log_filter = filter.clone();
    }
    appimage::logging::init_subscriber(&config);
}

fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(&args);

    match args.command {
        Command::Type { appimage } => {
            let format = match AppImage::open(&appimage) {
                Ok(image) => image.format(),
                Err(e) => {
                    info!("{:?} is not an AppImage: {}", appimage, e);
                    AppImageFormat::Invalid
                }
            };
            println!("{}", format.code());
        }

        Command::List { appimage } => {
            let image = AppImage::open(&appimage)?;
            let stdout = std::io::stdout();
            let mut out = stdout.lock();
            for path in image.list_files()? {
                writeln!(out, "{}", path)?;
            }
        }

        Command::Cat { appimage, file } => {
            let image = AppImage::open(&appimage)?;
            let data = image
                .read_file(&file)
                .with_context(|| format!("cannot read {} from {:?}", file, appimage))?;
            std::io::stdout().write_all(&data)?;
        }

        Command::Extract {
            appimage,
            file,
            output,
        } => {
            let image = AppImage::open(&appimage)?;
            let output = output.unwrap_or_else(|| PathBuf::from(sanitize_for_path(&file)));
            if output.exists() {
                bail!("{:?} already exists", output);
            }
            let written = image
                .extract_file(&file, &output)
                .with_context(|| format!("cannot extract {} from {:?}", file, appimage))?;
            info!("Wrote {} bytes to {:?}", written, output);
            println!("{}", output.display());
        }

        Command::Offset { appimage } => {
            let image = AppImage::open(&appimage)?;
            println!("{}", image.payload_offset()?);
        }

        Command::Md5 { path } => match appimage::core::hash::identifier_hash(&path)? {
            Some(digest) => println!("{}", digest),
            None => bail!("empty path has no identifier"),
        },

        Command::Desktop { appimage, key } => {
            let image = AppImage::open(&appimage)?;
            let entry = image.desktop_entry()?;
            println!("shall-not-be-integrated: {}", image.shall_not_be_integrated()?);
            println!("terminal: {}", image.is_terminal_app()?);
            for key in key {
                match entry.get_opt(&key) {
                    Some(value) => println!("{}: {}", key, value),
                    None => println!("{}: <unset>", key),
                }
            }
        }
    }

    Ok(())
}
