//! Core CLI definitions

use clap::{Args, Parser, Subcommand, ValueEnum};
use mes_archive::{BlockCodec, Lz10, Raw};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "mes")]
#[command(about = "Dialogue script archive extractor and builder", long_about = None)]
pub struct Cli {
    /// Increase log verbosity (-v for debug, -vv for trace)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Commands,
}

/// Selects the mapping file (control codes and font) for a game and region
#[derive(Args, Debug, Clone, Default)]
pub struct MappingArgs {
    /// Directory holding `{game}_{region}.json` mapping files
    #[arg(long, env = "MES_MAPPINGS")]
    pub mappings: Option<PathBuf>,

    /// Mapping file to use directly, bypassing the game/region lookup
    #[arg(long, conflicts_with_all = ["game", "region"])]
    pub mapping_file: Option<PathBuf>,

    /// Game identifier (e.g. aa1)
    #[arg(short, long)]
    pub game: Option<String>,

    /// Region of the game (e.g. us, eu, jp)
    #[arg(short, long)]
    pub region: Option<String>,

    /// Font variant layered over the original font
    #[arg(short, long)]
    pub font: Option<String>,
}

/// Block compression used inside archives
#[derive(ValueEnum, Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum CodecKind {
    #[default]
    Lz10,
    Raw,
}

impl CodecKind {
    pub fn codec(self) -> Box<dyn BlockCodec> {
        match self {
            Self::Lz10 => Box::new(Lz10),
            Self::Raw => Box::new(Raw),
        }
    }
}

#[derive(Subcommand)]
pub enum Commands {
    /// Extract every section of an archive into numbered text files
    #[command(visible_alias = "x")]
    Extract {
        /// Archive file (e.g. mes_all.bin)
        input: PathBuf,

        /// Output directory (default: directory named after the archive)
        #[arg(short, long)]
        output: Option<PathBuf>,

        #[command(flatten)]
        mapping: MappingArgs,

        /// Block compression of the archive
        #[arg(long, value_enum, default_value_t)]
        codec: CodecKind,
    },

    /// Build an archive from the text files in a directory
    #[command(visible_alias = "c")]
    Create {
        /// Directory of `.txt` sections, packed in file name order
        input: PathBuf,

        /// Output archive (default: mes_all.bin inside the input directory)
        #[arg(short, long)]
        output: Option<PathBuf>,

        #[command(flatten)]
        mapping: MappingArgs,

        /// Block compression of the archive
        #[arg(long, value_enum, default_value_t)]
        codec: CodecKind,
    },

    /// Decode a single section to text
    #[command(visible_alias = "d")]
    Decode {
        /// Section file
        input: PathBuf,

        /// Output text file (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Input is an LZ10 block
        #[arg(short, long)]
        compressed: bool,

        #[command(flatten)]
        mapping: MappingArgs,
    },

    /// Encode a single text file to a section
    #[command(visible_alias = "e")]
    Encode {
        /// Text file
        input: PathBuf,

        /// Output section file (default: input with a .bin extension)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Write an LZ10 block instead of a raw section
        #[arg(short, long)]
        compress: bool,

        #[command(flatten)]
        mapping: MappingArgs,
    },

    /// Check that every section of an archive survives decode and re-encode unchanged
    Verify {
        /// Archive file
        input: PathBuf,

        #[command(flatten)]
        mapping: MappingArgs,

        /// Block compression of the archive
        #[arg(long, value_enum, default_value_t)]
        codec: CodecKind,
    },

    /// Show a section's offset table and page layout
    #[command(visible_alias = "i")]
    Inspect {
        /// Section file
        input: PathBuf,

        /// Input is an LZ10 block
        #[arg(short, long)]
        compressed: bool,

        /// Bytes of each inline page to show
        #[arg(long, default_value_t = 16)]
        preview: usize,
    },

    /// Configure default settings
    Configure {
        /// Set the default mappings directory
        #[arg(long)]
        mappings: Option<PathBuf>,

        /// Set the default game
        #[arg(short, long)]
        game: Option<String>,

        /// Set the default region
        #[arg(short, long)]
        region: Option<String>,

        /// Set the default font variant
        #[arg(short, long)]
        font: Option<String>,

        /// Show current configuration
        #[arg(long)]
        show: bool,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_extract() {
        let cli = Cli::try_parse_from([
            "mes", "-v", "extract", "mes_all.bin", "-g", "aa1", "-r", "us", "-f", "edited",
        ])
        .unwrap();

        assert_eq!(cli.verbose, 1);
        let Commands::Extract {
            input,
            output,
            mapping,
            codec,
        } = cli.command
        else {
            panic!("expected extract");
        };
        assert_eq!(input, PathBuf::from("mes_all.bin"));
        assert!(output.is_none());
        assert_eq!(mapping.game.as_deref(), Some("aa1"));
        assert_eq!(mapping.region.as_deref(), Some("us"));
        assert_eq!(mapping.font.as_deref(), Some("edited"));
        assert_eq!(codec, CodecKind::Lz10);
    }

    #[test]
    fn test_mapping_file_conflicts_with_game() {
        let result = Cli::try_parse_from([
            "mes",
            "decode",
            "000.bin",
            "--mapping-file",
            "custom.json",
            "-g",
            "aa1",
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn test_codec_kind() {
        let cli = Cli::try_parse_from(["mes", "verify", "a.bin", "--codec", "raw"]).unwrap();
        let Commands::Verify { codec, .. } = cli.command else {
            panic!("expected verify");
        };
        assert_eq!(codec.codec().name(), "raw");
    }
}
