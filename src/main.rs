//! Command-line front end: an unzip-style tool over tokzip.
//!
//! Archives can come from a local file, an HTTP URL or stdin. Seekable
//! sources are parsed through the central directory; stdin, `--stream` and
//! servers without Range support are parsed front to back.

use anyhow::Result;
use clap::Parser;
use std::io::Write;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, warn};
use tracing_subscriber::EnvFilter;

use tokzip::tokenizer::{self, FileInfo, Tokenizer};
use tokzip::{Cli, Error, HttpRangeReader, HttpStream, ZipExtractor, ZipFileEntry};

/// An opened archive source.
struct Source {
    tokenizer: Box<dyn Tokenizer>,
    /// Set when the archive is read through HTTP Range requests.
    range_reader: Option<Arc<HttpRangeReader>>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let source = open_source(&cli).await?;
    debug!(
        file = %cli.file,
        random_access = source.tokenizer.supports_random_access(),
        "opened archive"
    );

    let transferred_before = source
        .range_reader
        .as_ref()
        .map_or(0, |reader| reader.transferred_bytes());

    process_zip(source.tokenizer, &cli).await?;

    // Display network transfer statistics for HTTP sources
    if let Some(reader) = source.range_reader
        && !cli.is_very_quiet()
    {
        let transferred = reader.transferred_bytes() - transferred_before;
        eprintln!("\nTotal bytes transferred: {}", format_size(transferred));
    }

    Ok(())
}

/// Pick a tokenizer backend for the FILE argument.
async fn open_source(cli: &Cli) -> Result<Source> {
    if cli.is_stdin() {
        let tokenizer: Box<dyn Tokenizer> =
            Box::new(tokenizer::from_async_read(tokio::io::stdin(), FileInfo::default()));
        return Ok(Source {
            tokenizer,
            range_reader: None,
        });
    }

    if cli.is_http_url() {
        if !cli.stream {
            match HttpRangeReader::new(cli.file.clone()).await {
                Ok(reader) => {
                    let reader = Arc::new(reader);
                    let tokenizer: Box<dyn Tokenizer> = Box::new(tokenizer::from_blob(reader.clone()));
                    return Ok(Source {
                        tokenizer,
                        range_reader: Some(reader),
                    });
                }
                Err(Error::RangeNotSupported) => {
                    warn!(url = %cli.file, "server does not accept range requests, streaming instead");
                }
                Err(err) => return Err(err.into()),
            }
        }

        let stream = HttpStream::open(cli.file.clone()).await?;
        let file_info = stream.file_info().clone();
        let tokenizer: Box<dyn Tokenizer> = Box::new(tokenizer::from_chunks(stream, file_info));
        return Ok(Source {
            tokenizer,
            range_reader: None,
        });
    }

    let tokenizer: Box<dyn Tokenizer> = if cli.stream {
        let file = tokio::fs::File::open(&cli.file).await?;
        let file_info = FileInfo {
            size: Some(file.metadata().await?.len()),
            path: Some(cli.file.clone()),
            mime_type: None,
        };
        Box::new(tokenizer::from_async_read(file, file_info))
    } else {
        Box::new(tokenizer::from_file(&cli.file)?)
    };
    Ok(Source {
        tokenizer,
        range_reader: None,
    })
}

/// Process a ZIP archive based on CLI options.
///
/// - List mode (`-l` or `-v`): Display archive contents
/// - Extract mode: Write each matching file as soon as it is decompressed
async fn process_zip(tokenizer: Box<dyn Tokenizer>, cli: &Cli) -> Result<()> {
    let random_access = tokenizer.supports_random_access();
    let mut extractor = ZipExtractor::with_options(tokenizer, cli.zip_options());

    if cli.list || cli.verbose {
        let entries = extractor.list_files().await?;
        print_listing(&entries, cli.verbose);
    } else {
        // a stream cannot be counted ahead, so only a single named file goes unlabelled
        let show_filename = cli.pipe
            && if random_access {
                let entries = extractor.list_files().await?;
                entries.iter().filter(|e| should_extract(e, cli)).count() > 1
            } else {
                !names_single_file(cli)
            };

        extractor
            .extract_each(
                |entry| should_extract(entry, cli) && (cli.pipe || may_write(entry, cli)),
                |entry, data| Ok(write_entry(entry, &data, cli, show_filename)?),
            )
            .await?;
    }

    extractor.close().await?;
    Ok(())
}

fn names_single_file(cli: &Cli) -> bool {
    matches!(cli.files.as_slice(), [name] if !has_glob_chars(name))
}

/// Apply the FILES and `-x` filters. Directories are never extracted; they
/// are created on demand for the files inside them.
fn should_extract(entry: &ZipFileEntry, cli: &Cli) -> bool {
    if entry.is_directory {
        return false;
    }

    // No wildcards: exact match on the full path or the base name
    if !cli.files.is_empty() {
        let matches = cli.files.iter().any(|f| {
            if has_glob_chars(f) {
                glob_match(f, &entry.file_name)
            } else {
                let basename = Path::new(&entry.file_name)
                    .file_name()
                    .map(|s| s.to_string_lossy())
                    .unwrap_or_default();
                entry.file_name == *f || basename == *f
            }
        });
        if !matches {
            return false;
        }
    }

    !cli
        .exclude
        .iter()
        .any(|x| entry.file_name.contains(x) || glob_match(x, &entry.file_name))
}

/// Percentage saved by compression, right-aligned to five columns.
fn compression_ratio(compressed: u64, uncompressed: u64) -> String {
    if uncompressed == 0 {
        return "  0%".to_string();
    }
    let saved = 100u64.saturating_sub(compressed.saturating_mul(100) / uncompressed);
    format!("{:>4}%", saved)
}

/// Print entries one per line (`-l`) or as a table with sizes,
/// compression ratio and timestamps (`-v`).
fn print_listing(entries: &[ZipFileEntry], verbose: bool) {
    if !verbose {
        for entry in entries {
            println!("{}", entry.file_name);
        }
        return;
    }

    println!(
        "{:>10}  {:>10}  {:>5}  {:>10}  {:>5}  Name",
        "Length", "Size", "Cmpr", "Date", "Time"
    );
    println!("{}", "-".repeat(70));

    let mut total_uncompressed = 0u64;
    let mut total_compressed = 0u64;
    let mut file_count = 0usize;

    for entry in entries {
        let (year, month, day) = entry.mod_date();
        let (hour, minute, _second) = entry.mod_time();

        println!(
            "{:>10}  {:>10}  {}  {:04}-{:02}-{:02}  {:02}:{:02}  {}",
            entry.uncompressed_size,
            entry.compressed_size,
            compression_ratio(entry.compressed_size, entry.uncompressed_size),
            year,
            month,
            day,
            hour,
            minute,
            entry.file_name
        );

        if !entry.is_directory {
            total_uncompressed += entry.uncompressed_size;
            total_compressed += entry.compressed_size;
            file_count += 1;
        }
    }

    println!("{}", "-".repeat(70));
    println!(
        "{:>10}  {:>10}  {}  {:>21}  {} files",
        total_uncompressed,
        total_compressed,
        compression_ratio(total_compressed, total_uncompressed),
        "",
        file_count
    );
}

/// Where an entry lands on disk, or `None` when its name would escape the
/// output directory.
fn output_path(entry: &ZipFileEntry, cli: &Cli) -> Option<PathBuf> {
    let relative = if cli.junk_paths {
        PathBuf::from(Path::new(&entry.file_name).file_name()?)
    } else {
        PathBuf::from(&entry.file_name)
    };
    if relative
        .components()
        .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir))
    {
        return None;
    }

    Some(match cli.extract_dir {
        Some(ref dir) => PathBuf::from(dir).join(relative),
        None => relative,
    })
}

/// Apply the overwrite rules (`-n`, `-o`) before anything is decompressed.
fn may_write(entry: &ZipFileEntry, cli: &Cli) -> bool {
    let Some(output_path) = output_path(entry, cli) else {
        warn!(name = %entry.file_name, "skipping entry with an unsafe path");
        return false;
    };
    if !output_path.exists() {
        return true;
    }

    if cli.never_overwrite {
        if !cli.is_quiet() {
            eprintln!("Skipping: {} (file exists)", entry.file_name);
        }
        return false;
    }
    if !cli.overwrite {
        if !cli.is_quiet() {
            eprintln!("Skipping: {} (use -o to overwrite)", entry.file_name);
        }
        return false;
    }
    true
}

/// Write one extracted entry.
///
/// - Pipe mode (`-p`): Write to stdout instead of file
/// - Custom output directory (`-d`): Extract to specified directory
/// - Junk paths (`-j`): Ignore directory structure in archive
fn write_entry(entry: &ZipFileEntry, data: &[u8], cli: &Cli, show_filename: bool) -> std::io::Result<()> {
    if cli.pipe {
        let mut stdout = std::io::stdout().lock();
        if show_filename {
            writeln!(stdout, "--- {} ---", entry.file_name)?;
        }
        stdout.write_all(data)?;
        return stdout.flush();
    }

    // filtered by may_write already
    let Some(output_path) = output_path(entry, cli) else {
        return Ok(());
    };

    if !cli.is_quiet() {
        println!("  extracting: {}", entry.file_name);
    }

    if let Some(parent) = output_path.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(&output_path, data)
}

fn has_glob_chars(pattern: &str) -> bool {
    pattern.contains('*') || pattern.contains('?')
}

/// Glob matching with `*` (any run of characters) and `?` (one character).
fn glob_match(pattern: &str, text: &str) -> bool {
    let pattern_chars: Vec<char> = pattern.chars().collect();
    let text_chars: Vec<char> = text.chars().collect();

    fn do_match(pattern: &[char], text: &[char]) -> bool {
        match (pattern.first(), text.first()) {
            (None, None) => true,
            // skip the star, or let it swallow one more character
            (Some('*'), _) => {
                do_match(&pattern[1..], text) || (!text.is_empty() && do_match(pattern, &text[1..]))
            }
            (Some('?'), Some(_)) => do_match(&pattern[1..], &text[1..]),
            (Some(p), Some(t)) if *p == *t => do_match(&pattern[1..], &text[1..]),
            _ => false,
        }
    }

    do_match(&pattern_chars, &text_chars)
}

/// Format a byte size into a human-readable string.
fn format_size(size: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;
    const GB: u64 = MB * 1024;

    if size >= GB {
        format!("{:.2} GB", size as f64 / GB as f64)
    } else if size >= MB {
        format!("{:.2} MB", size as f64 / MB as f64)
    } else if size >= KB {
        format!("{:.2} KB", size as f64 / KB as f64)
    } else {
        format!("{} bytes", size)
    }
}
