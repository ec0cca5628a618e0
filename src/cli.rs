use clap::Parser;

use crate::zip::ZipOptions;

#[derive(Parser, Debug)]
#[command(name = "tokzip")]
#[command(version)]
#[command(about = "List and extract ZIP archives from files, URLs or stdin", long_about = None)]
#[command(after_help = "Examples:\n  \
  tokzip data1.zip -x joe        extract all files except joe from data1.zip\n  \
  tokzip -p foo.zip | more       send contents of foo.zip via pipe into more\n  \
  cat foo.zip | tokzip -l -      list files from a zip read on stdin\n  \
  tokzip -l https://example.com/archive.zip   list files from remote ZIP")]
pub struct Cli {
    /// ZIP file path, HTTP URL, or - for stdin
    #[arg(value_name = "FILE")]
    pub file: String,

    /// Files to extract (default: all)
    #[arg(value_name = "FILES")]
    pub files: Vec<String>,

    /// List files (short format)
    #[arg(short = 'l')]
    pub list: bool,

    /// List verbosely
    #[arg(short = 'v')]
    pub verbose: bool,

    /// Extract files to pipe, no messages
    #[arg(short = 'p')]
    pub pipe: bool,

    /// Extract files into exdir
    #[arg(short = 'd', value_name = "DIR")]
    pub extract_dir: Option<String>,

    /// Exclude files that follow
    #[arg(short = 'x', value_name = "FILE", num_args = 1..)]
    pub exclude: Vec<String>,

    /// Never overwrite existing files
    #[arg(short = 'n')]
    pub never_overwrite: bool,

    /// Overwrite files WITHOUT prompting
    #[arg(short = 'o')]
    pub overwrite: bool,

    /// Junk paths (do not make directories)
    #[arg(short = 'j')]
    pub junk_paths: bool,

    /// Quiet mode (-qq => quieter)
    #[arg(short = 'q', action = clap::ArgAction::Count)]
    pub quiet: u8,

    /// Read the archive front to back instead of seeking to the central directory
    #[arg(long)]
    pub stream: bool,

    /// Bytes scanned at the end of the archive for the end of central directory
    #[arg(long, value_name = "BYTES", default_value_t = ZipOptions::default().eocd_window)]
    pub eocd_window: usize,

    /// Bytes searched per pass for the data descriptor of a streamed entry
    #[arg(long, value_name = "BYTES", default_value_t = ZipOptions::default().sync_window)]
    pub sync_window: usize,
}

impl Cli {
    pub fn is_http_url(&self) -> bool {
        self.file.starts_with("http://") || self.file.starts_with("https://")
    }

    pub fn is_stdin(&self) -> bool {
        self.file == "-"
    }

    pub fn is_quiet(&self) -> bool {
        self.quiet > 0 || self.pipe
    }

    /// -qq also silences the transfer summary
    pub fn is_very_quiet(&self) -> bool {
        self.quiet > 1
    }

    pub fn zip_options(&self) -> ZipOptions {
        ZipOptions {
            eocd_window: self.eocd_window,
            sync_window: self.sync_window,
        }
    }
}
