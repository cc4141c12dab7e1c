use crate::catchpoint::CatchKind;
use crate::symbols::Domain;
use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "ada-eval")]
#[command(author, version, about = "Resolve Ada dynamic types and symbols from GNAT debug information")]
#[command(
    long_about = "ada-eval reads the DWARF debugging information of a GNAT-compiled program and \
answers the questions a debugger's Ada support asks: how encoded names decode, which symbols \
a name denotes, what a variable-size type looks like, and where exception catchpoints go.\n\n\
Example:\n  ada-eval lookup ./main value --function pck.process"
)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalArgs,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Args)]
pub struct GlobalArgs {
    /// Engine configuration file (YAML)
    #[arg(long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Output format
    #[arg(short, long, global = true, value_enum, default_value = "table")]
    pub output: OutputFormat,

    /// Disable colored output
    #[arg(long, global = true)]
    pub no_color: bool,

    /// Pretty-print JSON output
    #[arg(long, global = true)]
    pub pretty: bool,

    /// Log engine decisions to stderr (overridden by ADA_EVAL_LOG)
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Decode a GNAT-encoded name into its Ada spelling
    Decode {
        #[arg(value_name = "NAME")]
        name: String,
    },

    /// Encode an Ada name the way GNAT spells it in symbol tables
    Encode {
        #[arg(value_name = "NAME")]
        name: String,
    },

    /// List the symbols an Ada name denotes
    Lookup {
        /// Path to the binary file to analyze
        #[arg(value_name = "BINARY")]
        binary: PathBuf,

        /// Name to look up (a simple name matches in any package)
        #[arg(value_name = "NAME")]
        name: String,

        /// Namespace to search
        #[arg(short, long, value_enum, default_value = "var")]
        domain: DomainArg,

        /// Search from inside the body of this subprogram
        #[arg(short, long, value_name = "F")]
        function: Option<String>,
    },

    /// Show the static layout of a type, fixing variable-size templates
    Layout {
        /// Path to the binary file to analyze
        #[arg(value_name = "BINARY")]
        binary: PathBuf,

        /// Type name, encoded or in Ada spelling
        #[arg(value_name = "TYPE")]
        type_name: String,
    },

    /// Locate the runtime routine for an exception catchpoint
    Catch {
        /// Path to the binary file to analyze
        #[arg(value_name = "BINARY")]
        binary: PathBuf,

        /// What to stop on
        #[arg(value_enum)]
        kind: CatchKind,

        /// Stop only when this exception is raised
        #[arg(short, long, value_name = "NAME")]
        exception: Option<String>,
    },
}

#[derive(Clone, Copy, Debug, ValueEnum, PartialEq, Eq)]
pub enum OutputFormat {
    Table,
    Json,
}

#[derive(Clone, Copy, Debug, ValueEnum, PartialEq, Eq)]
pub enum DomainArg {
    Var,
    Type,
    Struct,
}

impl From<DomainArg> for Domain {
    fn from(arg: DomainArg) -> Self {
        match arg {
            DomainArg::Var | DomainArg::Type => Domain::Var,
            DomainArg::Struct => Domain::Struct,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn global_flags_follow_subcommands() {
        let cli = Cli::try_parse_from(["ada-eval", "decode", "pck__foo", "--output", "json", "--pretty"]).unwrap();
        assert_eq!(cli.global.output, OutputFormat::Json);
        assert!(cli.global.pretty);
        assert!(matches!(cli.command, Commands::Decode { ref name } if name == "pck__foo"));
    }

    #[test]
    fn catch_accepts_all_alias() {
        let cli = Cli::try_parse_from(["ada-eval", "catch", "./main", "all"]).unwrap();
        assert!(matches!(cli.command, Commands::Catch { kind: CatchKind::Exception, .. }));
        let cli = Cli::try_parse_from(["ada-eval", "catch", "./main", "exception", "-e", "constraint_error"]).unwrap();
        assert!(matches!(cli.command, Commands::Catch { exception: Some(_), .. }));
    }
}
