use std::collections::HashMap;
use std::path::Path;

use crate::config::AppConfig;
use crate::data::{filter_options, load_snapshot, load_stage_records, FilterLevel, FilterSelection};
use crate::funnel::{
    parse_numeric_input, sanitize_start, FunnelOutcome, ParseModeError, SimulationMode,
    SimulationParams, StageKey,
};
use crate::logging;
use crate::report::simulate_all_combinations;
use crate::server;
use crate::server::api::{OptionsResponse, ReportResponse, SimulateResponse};
use crate::session::SimulationSession;

const USAGE: &str = "usage: funnelsim <serve|simulate|options|report|validate>";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Serve,
    Simulate,
    Options,
    Report,
    Validate,
}

pub fn parse_command(args: &[String]) -> Option<Command> {
    match args.get(1).map(String::as_str) {
        Some("serve") => Some(Command::Serve),
        Some("simulate") => Some(Command::Simulate),
        Some("options") => Some(Command::Options),
        Some("report") => Some(Command::Report),
        Some("validate") => Some(Command::Validate),
        _ => None,
    }
}

/// `--name value`, `--name=value` and bare `--switch` flags after the
/// subcommand; anything else is positional.
#[derive(Debug, Default)]
struct Flags {
    values: HashMap<String, Vec<String>>,
    switches: Vec<String>,
    positional: Vec<String>,
}

const SWITCHES: &[&str] = &["table"];

impl Flags {
    fn parse(args: &[String]) -> Self {
        let mut flags = Self::default();
        let mut iter = args.iter().skip(2);
        while let Some(arg) = iter.next() {
            let Some(name) = arg.strip_prefix("--") else {
                flags.positional.push(arg.clone());
                continue;
            };
            if let Some((name, value)) = name.split_once('=') {
                flags.push(name, value.to_string());
            } else if SWITCHES.contains(&name) {
                flags.switches.push(name.to_string());
            } else if let Some(value) = iter.next() {
                flags.push(name, value.clone());
            } else {
                flags.switches.push(name.to_string());
            }
        }
        flags
    }

    fn push(&mut self, name: &str, value: String) {
        self.values.entry(name.to_string()).or_default().push(value);
    }

    fn get(&self, name: &str) -> Option<&str> {
        self.values
            .get(name)
            .and_then(|values| values.last())
            .map(String::as_str)
    }

    fn all(&self, name: &str) -> &[String] {
        self.values.get(name).map(Vec::as_slice).unwrap_or(&[])
    }

    fn has(&self, name: &str) -> bool {
        self.switches.iter().any(|switch| switch == name)
    }

    fn selection(&self) -> FilterSelection {
        let mut selection = FilterSelection::default();
        for level in FilterLevel::CASCADE {
            if let Some(value) = self.get(level.as_str()) {
                selection.select(level, Some(value));
            }
        }
        selection
    }
}

pub fn run_with_args(args: &[String]) -> i32 {
    let Some(command) = parse_command(args) else {
        eprintln!("{USAGE}");
        return 2;
    };

    let config = match AppConfig::load() {
        Ok(config) => config,
        Err(err) => {
            eprintln!("config error: {err}");
            return 1;
        }
    };
    logging::init(&config.log_filter);

    let flags = Flags::parse(args);
    match command {
        Command::Serve => handle_serve(&config),
        Command::Simulate => handle_simulate(&config, &flags),
        Command::Options => handle_options(&config, &flags),
        Command::Report => handle_report(&config, &flags),
        Command::Validate => handle_validate(&flags),
    }
}

fn handle_serve(config: &AppConfig) -> i32 {
    match server::run_server(config) {
        Ok(()) => 0,
        Err(err) => {
            eprintln!("server error: {err}");
            1
        }
    }
}

/// `ORDER:STAGE=VALUE`, e.g. `2:Phone Screen=30`.
pub fn parse_edit(raw: &str) -> Result<(StageKey, String), String> {
    let (key, value) = raw
        .split_once('=')
        .ok_or_else(|| format!("invalid edit '{raw}', expected ORDER:STAGE=VALUE"))?;
    let (order, stage) = key
        .split_once(':')
        .ok_or_else(|| format!("invalid edit '{raw}', expected ORDER:STAGE=VALUE"))?;
    let order = order
        .trim()
        .parse::<u32>()
        .map_err(|_| format!("invalid stage order '{}' in '{raw}'", order.trim()))?;
    let stage = stage.trim();
    if stage.is_empty() {
        return Err(format!("missing stage name in '{raw}'"));
    }
    Ok((StageKey::new(order, stage), value.to_string()))
}

fn parse_mode_flag(flags: &Flags, fallback: SimulationMode) -> Result<SimulationMode, String> {
    match flags.get("mode") {
        Some(raw) => raw.parse().map_err(|err: ParseModeError| err.to_string()),
        None => Ok(fallback),
    }
}

fn print_json<T: serde::Serialize>(payload: &T) -> i32 {
    match serde_json::to_string_pretty(payload) {
        Ok(payload) => {
            println!("{payload}");
            0
        }
        Err(err) => {
            eprintln!("failed to serialize output: {err}");
            1
        }
    }
}

fn format_value(value: Option<f64>) -> String {
    value.map_or_else(|| "undefined".to_string(), |v| format!("{v:.2}"))
}

fn print_outcome_table(outcome: &FunnelOutcome) {
    println!("order\tstage\tptr\tcandidates\tresult\toverride\tsum");
    for stage in &outcome.stages {
        println!(
            "{}\t{}\t{}\t{}\t{}\t{}\t{}",
            stage.order,
            stage.stage,
            stage.ptr,
            format_value(stage.candidates),
            format_value(stage.result),
            if stage.is_override { "yes" } else { "no" },
            format_value(stage.sum),
        );
    }
    println!(
        "total\t{}\tgrand_sum\t{}",
        format_value(outcome.total),
        format_value(outcome.grand_sum)
    );
}

fn handle_simulate(config: &AppConfig, flags: &Flags) -> i32 {
    let mode = match parse_mode_flag(flags, config.defaults.mode) {
        Ok(mode) => mode,
        Err(err) => {
            eprintln!("{err}");
            return 2;
        }
    };

    let mut session = SimulationSession::new(
        mode,
        config.defaults.starting_candidates,
        config.defaults.target_hires,
    );
    if let Some(raw) = flags.get("value") {
        let accepted = match mode {
            SimulationMode::TopDown => session.set_starting_candidates(raw),
            SimulationMode::BottomUp => session.set_target_hires(raw),
        };
        if !accepted {
            eprintln!("invalid value '{raw}', expected a number");
            return 2;
        }
    }
    for level in FilterLevel::CASCADE {
        if let Some(value) = flags.get(level.as_str()) {
            session.select_filter(level, Some(value));
        }
    }
    for (name, is_override) in [("override", true), ("sum", false)] {
        for raw in flags.all(name) {
            let (key, value) = match parse_edit(raw) {
                Ok(edit) => edit,
                Err(err) => {
                    eprintln!("{err}");
                    return 2;
                }
            };
            let stored = if is_override {
                session.edit_override(key.clone(), &value)
            } else {
                session.edit_sum(key.clone(), &value)
            };
            if stored.is_none() {
                tracing::warn!(key = %key, value = %value, "ignoring non-numeric {name}");
            }
        }
    }

    let snapshot = load_snapshot(flags.get("data").or(config.data_path.as_deref()));
    let outcome = session.recompute(&snapshot.records);
    for warning in &outcome.warnings {
        eprintln!("warning: {warning}");
    }

    if flags.has("table") {
        print_outcome_table(&outcome);
        return 0;
    }
    print_json(&SimulateResponse {
        status: "ok",
        selection: session.selection().complete(&snapshot.records),
        value: sanitize_start(session.params().value()),
        outcome,
    })
}

fn handle_options(config: &AppConfig, flags: &Flags) -> i32 {
    let snapshot = load_snapshot(flags.get("data").or(config.data_path.as_deref()));
    let selection = flags.selection();
    let resolved = selection.complete(&snapshot.records);
    let options = filter_options(&snapshot.records, &selection);
    print_json(&OptionsResponse {
        selection,
        resolved,
        options,
    })
}

fn handle_report(config: &AppConfig, flags: &Flags) -> i32 {
    let mode = match parse_mode_flag(flags, config.defaults.mode) {
        Ok(mode) => mode,
        Err(err) => {
            eprintln!("{err}");
            return 2;
        }
    };
    let value = match flags.get("value") {
        Some(raw) => match parse_numeric_input(raw) {
            Some(value) => value,
            None => {
                eprintln!("invalid value '{raw}', expected a number");
                return 2;
            }
        },
        None => config.defaults.value_for(mode),
    };
    let value = sanitize_start(value);

    let snapshot = load_snapshot(flags.get("data").or(config.data_path.as_deref()));
    let combinations =
        simulate_all_combinations(&snapshot.records, SimulationParams::new(mode, value));

    if flags.has("table") {
        println!("function\tlevel\tcountry\tsource\tstages\ttotal\tgrand_sum");
        for entry in &combinations {
            println!(
                "{}\t{}\t{}\t{}\t{}\t{}\t{}",
                entry.function,
                entry.level,
                entry.country,
                entry.source,
                entry.stage_count,
                format_value(entry.total),
                format_value(entry.grand_sum),
            );
        }
        return 0;
    }
    print_json(&ReportResponse {
        mode,
        value,
        combinations,
    })
}

fn handle_validate(flags: &Flags) -> i32 {
    let Some(path) = flags.positional.first().map(String::as_str).or(flags.get("data")) else {
        eprintln!("usage: funnelsim validate <path-to-records.(json|csv|xlsx)>");
        return 2;
    };

    match load_stage_records(Path::new(path)) {
        Ok(report) if report.skipped.is_empty() && !report.records.is_empty() => {
            println!(
                "validation passed: {path} (records={})",
                report.records.len()
            );
            0
        }
        Ok(report) => {
            let issues = report.skipped.len().max(1);
            eprintln!("validation failed: {issues} issue(s)");
            if report.records.is_empty() {
                eprintln!("- no usable stage records");
            }
            for skipped in &report.skipped {
                eprintln!("- row {}: {}", skipped.row, skipped.reason);
            }
            1
        }
        Err(err) => {
            eprintln!("validation failed: {err}");
            1
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn parse_command_maps_subcommands() {
        assert_eq!(parse_command(&args(&["funnelsim", "simulate"])), Some(Command::Simulate));
        assert_eq!(parse_command(&args(&["funnelsim", "report"])), Some(Command::Report));
        assert_eq!(parse_command(&args(&["funnelsim"])), None);
        assert_eq!(parse_command(&args(&["funnelsim", "launch"])), None);
    }

    #[test]
    fn flags_collect_repeated_values_switches_and_positionals() {
        let flags = Flags::parse(&args(&[
            "funnelsim",
            "simulate",
            "--override",
            "2:Screen=30",
            "--override=3:Onsite=5",
            "--table",
            "--mode",
            "bottom-up",
            "extra.csv",
        ]));
        assert_eq!(flags.all("override"), ["2:Screen=30", "3:Onsite=5"]);
        assert!(flags.has("table"));
        assert_eq!(flags.get("mode"), Some("bottom-up"));
        assert_eq!(flags.positional, vec!["extra.csv".to_string()]);
        assert!(flags.all("sum").is_empty());
    }

    #[test]
    fn flag_selection_applies_levels_in_cascade_order() {
        let flags = Flags::parse(&args(&[
            "funnelsim",
            "options",
            "--country",
            "Germany",
            "--function",
            "Engineering",
        ]));
        let selection = flags.selection();
        assert_eq!(selection.function.as_deref(), Some("Engineering"));
        assert_eq!(selection.country.as_deref(), Some("Germany"));
    }

    #[test]
    fn parse_edit_splits_order_stage_and_value() {
        let (key, value) = parse_edit("2:Phone Screen=30").expect("edit should parse");
        assert_eq!(key, StageKey::new(2, "Phone Screen"));
        assert_eq!(value, "30");

        let (_, blank) = parse_edit("1:Screen=").expect("blank value clears");
        assert_eq!(blank, "");

        assert!(parse_edit("Screen=30").is_err());
        assert!(parse_edit("x:Screen=30").is_err());
        assert!(parse_edit("2:=30").is_err());
    }

    #[test]
    fn format_value_marks_undefined() {
        assert_eq!(format_value(Some(12.5)), "12.50");
        assert_eq!(format_value(None), "undefined");
    }
}
