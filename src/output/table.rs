use super::{NameReport, SymbolReport};
use crate::catchpoint::CatchpointLocation;
use crate::types::RecordLayout;
use colored::Colorize;
use comfy_table::{Cell, Color, Table, presets::UTF8_FULL_CONDENSED};

pub struct TableFormatter {
    no_color: bool,
}

impl TableFormatter {
    pub fn new(no_color: bool) -> Self {
        Self { no_color }
    }

    fn header(&self, text: String) -> String {
        if self.no_color { text } else { text.bold().to_string() }
    }

    pub fn format_name(&self, report: &NameReport) -> String {
        format!("{} => {}", report.input, self.header(report.output.clone()))
    }

    pub fn format_symbols(&self, name: &str, symbols: &[SymbolReport]) -> String {
        if symbols.is_empty() {
            let msg = format!("No definition of \"{name}\" found.");
            return if self.no_color { msg } else { msg.yellow().to_string() };
        }

        let mut table = Table::new();
        table.load_preset(UTF8_FULL_CONDENSED);
        table.set_header(vec!["Name", "Kind", "Location", "Scope", "Linkage name"]);
        for sym in symbols {
            let name = if self.no_color { Cell::new(&sym.name) } else { Cell::new(&sym.name).fg(Color::Cyan) };
            table.add_row(vec![
                name,
                Cell::new(&sym.description),
                Cell::new(&sym.location),
                Cell::new(format!("{:?}", sym.scope).to_lowercase()),
                Cell::new(&sym.linkage_name),
            ]);
        }

        let title = format!("{} match(es) for \"{name}\"", symbols.len());
        format!("{}\n{}", self.header(title), table)
    }

    pub fn format_layout(&self, layout: &RecordLayout) -> String {
        let mut output = self.header(format!("{} {} ({} bytes)", layout.kind, layout.name, layout.size));
        if let Some(align) = layout.alignment {
            output.push_str(&format!(", align {align}"));
        }
        output.push('\n');
        if layout.fields.is_empty() {
            return output;
        }

        let mut table = Table::new();
        table.load_preset(UTF8_FULL_CONDENSED);
        table.set_header(vec!["Offset", "Size", "Bits", "Type", "Field"]);
        for field in &layout.fields {
            let bits = match (field.bit_offset, field.bit_size) {
                (Some(off), Some(size)) => format!("{off}+{size}"),
                _ => String::new(),
            };
            let bits = if self.no_color || bits.is_empty() {
                Cell::new(bits)
            } else {
                Cell::new(bits).fg(Color::Yellow)
            };
            table.add_row(vec![
                Cell::new(field.offset.to_string()),
                Cell::new(field.size.to_string()),
                bits,
                Cell::new(&field.type_name),
                Cell::new(&field.name),
            ]);
        }
        output.push_str(&table.to_string());
        output
    }

    pub fn format_catchpoint(&self, loc: &CatchpointLocation) -> String {
        let mut output = format!(
            "{} at {:#x} ({})",
            self.header("Catchpoint".to_string()),
            loc.address,
            loc.routine
        );
        if let Some(condition) = &loc.condition {
            output.push_str(&format!("\n  condition: {condition}"));
        }
        output
    }

    pub fn format_warnings(&self, warnings: &[String]) -> String {
        warnings
            .iter()
            .map(|w| if self.no_color { format!("warning: {w}") } else { format!("warning: {w}").yellow().to_string() })
            .collect::<Vec<_>>()
            .join("\n")
    }
}
