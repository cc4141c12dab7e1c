use ada_eval::catchpoint::{CatchKind, catchpoint_location};
use ada_eval::config::{DEFAULT_CONFIG_FILE, EngineConfig};
use ada_eval::fixing::static_fixed_type;
use ada_eval::logging::initialize_logging;
use ada_eval::output::{JsonFormatter, NameReport, SymbolReport, TableFormatter};
use ada_eval::types::RecordLayout;
use ada_eval::{BinaryData, Cli, Commands, DomainArg, OutputFormat, Session, lookup, names};
use anyhow::{Context, Result, bail};
use clap::Parser;
use serde::Serialize;
use std::path::Path;

/// How results are written to stdout.
struct Printer {
    format: OutputFormat,
    no_color: bool,
    pretty: bool,
}

impl Printer {
    fn print<T: Serialize>(&self, command: &str, result: &T, warnings: &[String], table: impl FnOnce(&TableFormatter) -> String) {
        match self.format {
            OutputFormat::Table => {
                let formatter = TableFormatter::new(self.no_color);
                println!("{}", table(&formatter));
                if !warnings.is_empty() {
                    eprintln!("{}", formatter.format_warnings(warnings));
                }
            }
            OutputFormat::Json => {
                let formatter = JsonFormatter::new(self.pretty);
                println!("{}", formatter.format(command, result, warnings));
            }
        }
    }
}

fn run_cli(cli: Cli) -> Result<()> {
    let printer = Printer { format: cli.global.output, no_color: cli.global.no_color, pretty: cli.global.pretty };
    if printer.no_color {
        colored::control::set_override(false);
    }
    let config_path = cli.global.config.as_deref();

    match cli.command {
        Commands::Decode { name } => {
            let report = NameReport { output: names::decode(&name).into_owned(), input: name };
            printer.print("decode", &report, &[], |t| t.format_name(&report));
        }
        Commands::Encode { name } => {
            let encoded = names::encode(&names::fold_name(&name))
                .with_context(|| format!("Cannot encode {name}"))?;
            let report = NameReport { input: name, output: encoded };
            printer.print("encode", &report, &[], |t| t.format_name(&report));
        }
        Commands::Lookup { binary, name, domain, function } => {
            let mut session = open_session(&binary, config_path)?;
            run_lookup(&mut session, &printer, &name, domain, function.as_deref())?;
        }
        Commands::Layout { binary, type_name } => {
            let mut session = open_session(&binary, config_path)?;
            run_layout(&mut session, &printer, &type_name)?;
        }
        Commands::Catch { binary, kind, exception } => {
            let session = open_session(&binary, config_path)?;
            run_catch(&session, &printer, kind, exception.as_deref())?;
        }
    }

    Ok(())
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    initialize_logging(cli.global.verbose);
    run_cli(cli)
}

fn load_config(path: Option<&Path>) -> Result<EngineConfig> {
    match path {
        Some(path) => EngineConfig::load(path)
            .with_context(|| format!("Failed to load config: {}", path.display())),
        None => EngineConfig::load_or_default(Path::new(DEFAULT_CONFIG_FILE))
            .with_context(|| format!("Failed to load config: {}", DEFAULT_CONFIG_FILE)),
    }
}

fn open_session(binary_path: &Path, config_path: Option<&Path>) -> Result<Session> {
    let mut config = load_config(config_path)?;
    let binary = BinaryData::load(binary_path)
        .with_context(|| format!("Failed to load binary: {}", binary_path.display()))?;
    let db = binary.load_database().context("Failed to load DWARF debug info")?;
    config.big_endian_bits.get_or_insert(db.big_endian);
    Ok(Session::new(db.types, db.symbols, config))
}

fn run_lookup(
    session: &mut Session,
    printer: &Printer,
    name: &str,
    domain: DomainArg,
    function: Option<&str>,
) -> Result<()> {
    if let Some(function) = function {
        let candidates = lookup::lookup_name(session, function, None, ada_eval::symbols::Domain::Var)?;
        let Some(body) = candidates
            .iter()
            .filter(|info| session.symbols.symbol(info.symbol).is_function())
            .find_map(|info| session.symbols.function_body(info.symbol))
        else {
            bail!("No subprogram named {function}");
        };
        session.select_frame(Some(body), None);
    }

    session.begin_command();
    let mut found = lookup::lookup_name(session, name, session.frame.block, domain.into())?;
    if domain == DomainArg::Type {
        found.retain(|info| session.symbols.symbol(info.symbol).is_typedef());
    }
    let reports: Vec<SymbolReport> = found.iter().map(|info| SymbolReport::new(session, info)).collect();
    printer.print("lookup", &reports, session.warnings.messages(), |t| t.format_symbols(name, &reports));
    Ok(())
}

fn run_layout(session: &mut Session, printer: &Printer, type_name: &str) -> Result<()> {
    session.begin_command();
    let encoded = if type_name.contains('.') {
        names::encode(&names::fold_name(type_name)).with_context(|| format!("Cannot encode {type_name}"))?
    } else {
        type_name.to_string()
    };
    let Some(ty) = lookup::find_type(session, &encoded) else {
        bail!("No type named {type_name}");
    };
    let fixed = static_fixed_type(session, ty);
    session
        .ensure_size_limit(fixed)
        .with_context(|| format!("Cannot lay out {type_name}"))?;
    let layout = RecordLayout::from_type(&session.types, fixed);
    printer.print("layout", &layout, session.warnings.messages(), |t| t.format_layout(&layout));
    Ok(())
}

fn run_catch(session: &Session, printer: &Printer, kind: CatchKind, exception: Option<&str>) -> Result<()> {
    let location = catchpoint_location(session, kind, exception)?;
    printer.print("catch", &location, &[], |t| t.format_catchpoint(&location));
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn explicit_config_must_exist() {
        let err = load_config(Some(Path::new("/nonexistent/.ada-eval.yaml"))).unwrap_err();
        assert!(err.to_string().contains("Failed to load config"));
    }

    #[test]
    fn explicit_config_is_parsed() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "max_warnings: 2").unwrap();
        let config = load_config(Some(file.path())).unwrap();
        assert_eq!(config.max_warnings, 2);
    }

    #[test]
    fn name_commands_run_without_a_binary() {
        let cli = Cli::try_parse_from(["ada-eval", "decode", "pck__Oadd", "--no-color"]).unwrap();
        run_cli(cli).unwrap();
        let cli = Cli::try_parse_from(["ada-eval", "encode", "Pck.Foo", "--output", "json"]).unwrap();
        run_cli(cli).unwrap();
    }

    #[test]
    fn missing_binary_is_reported() {
        let cli = Cli::try_parse_from(["ada-eval", "layout", "/nonexistent/prog", "pck.rec"]).unwrap();
        let err = run_cli(cli).unwrap_err();
        assert!(format!("{err:#}").contains("Failed to load binary"));
    }
}
