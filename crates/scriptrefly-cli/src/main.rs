use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::Colorize;
use std::io::{BufRead, Write};
use std::path::{Path, PathBuf};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};
use walkdir::WalkDir;

use scriptrefly_core::{
    Config, ConfigStore, Dialect, FieldDescriptor, FileStore, RuleSeverity, RuleStore, SchemaStore, TableSchema,
    ValidationReport, ValidationRule, ValueKind, RULES_KEY,
};
use scriptrefly_engine::{ScriptValidator, ValidatorOptions};
use scriptrefly_extract::{
    declares_class, extract_mapping_fields, resolve_with_options, AncestorLocator, ResolveOptions,
};

/// ScriptRefly - Schema-aware checks for MySQL and MongoDB scripts
#[derive(Parser)]
#[command(name = "scriptrefly")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to config file (default: scriptrefly.toml)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build a table schema from a source document and store it
    Extract {
        #[command(subcommand)]
        source: ExtractSource,
    },

    /// Validate a script line by line against the stored schemas and rules
    Validate {
        /// Script file to check
        script: PathBuf,

        /// Dialect of the script (default: config default_dialect)
        #[arg(short, long)]
        dialect: Option<Dialect>,

        /// Output file for report.json
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Manage validation rules
    Rules {
        #[command(subcommand)]
        action: RulesAction,
    },

    /// Manage stored table schemas
    Schema {
        #[command(subcommand)]
        action: SchemaAction,
    },
}

#[derive(Subcommand)]
enum ExtractSource {
    /// Java entity class, merged with the fields of its ancestors
    Java {
        /// Java source file
        file: PathBuf,

        /// Table name (default: the class name)
        #[arg(short, long)]
        table: Option<String>,

        /// Dialect of the table (default: config default_dialect)
        #[arg(short, long)]
        dialect: Option<Dialect>,

        /// Never ask on stdin for ancestors that cannot be found
        #[arg(long)]
        no_prompt: bool,
    },

    /// MyBatis mapper XML result map
    Mybatis {
        /// Mapper XML file
        file: PathBuf,

        /// Table name
        #[arg(short, long)]
        table: String,

        /// Dialect of the table (default: config default_dialect)
        #[arg(short, long)]
        dialect: Option<Dialect>,
    },
}

#[derive(Subcommand)]
enum RulesAction {
    /// List rules, optionally filtered by dialect and value-kind
    List {
        #[arg(short, long)]
        dialect: Option<Dialect>,

        #[arg(short, long)]
        kind: Option<ValueKind>,

        /// Print the listed rules as JSON
        #[arg(long)]
        json: bool,
    },

    /// Write the whole rule table as JSON
    Export {
        /// Output file (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Replace the rule table with a JSON document
    Import {
        file: PathBuf,
    },

    /// Restore the built-in rules
    Reset,

    /// Add a rule to a (dialect, value-kind) bucket
    Add {
        #[arg(short, long)]
        dialect: Dialect,

        #[arg(short, long)]
        kind: ValueKind,

        #[arg(long)]
        id: String,

        #[arg(long)]
        name: String,

        /// Pattern a passing value (or line, for Syntax rules) matches
        #[arg(long)]
        pattern: String,

        #[arg(long)]
        message: String,

        #[arg(long, default_value = "error", value_parser = parse_severity)]
        severity: RuleSeverity,

        #[arg(long)]
        description: Option<String>,
    },

    /// Remove a rule by id
    Remove {
        #[arg(short, long)]
        dialect: Dialect,

        #[arg(short, long)]
        kind: ValueKind,

        id: String,
    },
}

#[derive(Subcommand)]
enum SchemaAction {
    /// List stored tables
    List,

    /// Show the fields of one table
    Show {
        table: String,
    },

    /// Write all tables as JSON
    Export {
        /// Output file (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Replace all tables with a JSON document
    Import {
        file: PathBuf,
    },

    /// Delete one table
    Remove {
        table: String,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let config = load_config(cli.config.as_deref(), cli.verbose)?;
    let store = FileStore::new(config.store_dir());

    if cli.verbose {
        eprintln!("{} {}", "Using store:".cyan(), store.dir().display());
    }

    match cli.command {
        Commands::Extract { source } => match source {
            ExtractSource::Java {
                file,
                table,
                dialect,
                no_prompt,
            } => extract_java_command(&config, &store, &file, table, dialect, no_prompt, cli.verbose),
            ExtractSource::Mybatis { file, table, dialect } => {
                extract_mybatis_command(&config, &store, &file, &table, dialect)
            }
        },
        Commands::Validate {
            script,
            dialect,
            output,
        } => validate_command(&config, &store, &script, dialect, output.as_deref(), cli.verbose),
        Commands::Rules { action } => rules_command(&store, action),
        Commands::Schema { action } => schema_command(&store, action),
    }
}

/// Log to stderr; RUST_LOG wins over the --verbose default
fn init_tracing(verbose: bool) {
    let default_level = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();
}

fn load_config(path: Option<&Path>, verbose: bool) -> Result<Config> {
    let default_path = Path::new("scriptrefly.toml");

    let config = match path {
        Some(path) => Config::from_file(path)?,
        None if default_path.exists() => Config::from_file(default_path)?,
        None => {
            if verbose {
                eprintln!("{}", "No config file found, using defaults".yellow());
            }
            Config::default()
        }
    };

    Ok(config)
}

/// Open the rule store, seeding the built-in rules on first use
fn open_rules(store: &FileStore) -> Result<RuleStore<FileStore>> {
    let first_use = store.load(RULES_KEY)?.is_none();
    let mut rules = RuleStore::load(store.clone())?;

    if first_use {
        rules.reset_to_default()?;
        tracing::info!(dir = %store.dir().display(), "seeded built-in rules");
    }

    Ok(rules)
}

fn read_file(path: &Path) -> Result<String> {
    std::fs::read_to_string(path).with_context(|| format!("Failed to read {}", path.display()))
}

/// Extract command - Java class with inherited fields
fn extract_java_command(
    config: &Config,
    store: &FileStore,
    file: &Path,
    table: Option<String>,
    dialect: Option<Dialect>,
    no_prompt: bool,
    verbose: bool,
) -> Result<()> {
    let source = read_file(file)?;

    // The class's own directory is searched before the configured ones
    let mut search_dirs: Vec<PathBuf> = file
        .parent()
        .filter(|dir| !dir.as_os_str().is_empty())
        .map(Path::to_path_buf)
        .into_iter()
        .collect();
    search_dirs.extend(config.inheritance.search_dirs.iter().map(|dir| config.resolve(dir)));

    let locator = SourceLocator::new(search_dirs, config.inheritance.prompt && !no_prompt);
    let options = ResolveOptions {
        max_depth: config.inheritance.max_depth,
        ..ResolveOptions::default()
    };

    if verbose {
        eprintln!("{} {}", "Extracting fields from:".cyan(), file.display());
    }

    let resolution = resolve_with_options(&source, locator, options);

    for warning in &resolution.warnings {
        eprintln!("{} {}", "warning:".yellow().bold(), warning);
    }

    if resolution.fields.is_empty() {
        return Err(anyhow::anyhow!("No fields found in {}", file.display()));
    }

    if verbose && !resolution.ancestors.is_empty() {
        eprintln!("{} {}", "Inherited from:".cyan(), resolution.ancestors.join(", "));
    }

    let table_name = table
        .or_else(|| resolution.class_name.clone())
        .ok_or_else(|| anyhow::anyhow!("No class name found in {}; pass --table", file.display()))?;

    save_table(store, &table_name, dialect.unwrap_or(config.default_dialect), resolution.fields)
}

/// Extract command - MyBatis mapper result map
fn extract_mybatis_command(
    config: &Config,
    store: &FileStore,
    file: &Path,
    table: &str,
    dialect: Option<Dialect>,
) -> Result<()> {
    let source = read_file(file)?;
    let fields = extract_mapping_fields(&source);

    if fields.is_empty() {
        return Err(anyhow::anyhow!(
            "No <id> or <result> bindings found in {}",
            file.display()
        ));
    }

    save_table(store, table, dialect.unwrap_or(config.default_dialect), fields)
}

fn save_table(store: &FileStore, name: &str, dialect: Dialect, fields: Vec<FieldDescriptor>) -> Result<()> {
    let table = TableSchema::new(dialect, fields);
    print_fields(name, &table);

    let mut schemas = SchemaStore::load(store.clone())?;
    let replaced = schemas.schemas().get(name).is_some();
    schemas.upsert_table(name, table)?;

    let verb = if replaced { "Updated" } else { "Saved" };
    eprintln!("{} {} {}", "✓".green(), verb.green(), name.bold());

    Ok(())
}

fn print_fields(name: &str, table: &TableSchema) {
    println!("{} {} ({}, {} fields)", "Table".bold(), name.green(), table.dialect, table.fields.len());
    for field in &table.fields {
        let field_type = if field.field_type.is_empty() {
            "-".dimmed().to_string()
        } else {
            field.field_type.clone()
        };
        println!("  {:<24} {}", field.name, field_type);
    }
}

/// Validate command - check a script against stored schemas and rules
fn validate_command(
    config: &Config,
    store: &FileStore,
    script_path: &Path,
    dialect: Option<Dialect>,
    output: Option<&Path>,
    verbose: bool,
) -> Result<()> {
    let script = read_file(script_path)?;
    let dialect = dialect.unwrap_or(config.default_dialect);

    let schemas = SchemaStore::load(store.clone())?;
    let rules = open_rules(store)?;

    if schemas.schemas().is_empty() {
        eprintln!(
            "{}",
            "No table schemas stored; run 'scriptrefly extract' or 'scriptrefly schema import' first".yellow()
        );
    }

    if verbose {
        eprintln!("{} {} as {}", "Validating".cyan(), script_path.display(), dialect);
    }

    let options = ValidatorOptions {
        structural_checks: config.validation.structural_checks,
    };
    let validator = ScriptValidator::new(dialect, schemas.schemas(), rules.table()).with_options(options);

    for skipped in validator.skipped_rules() {
        eprintln!(
            "{} rule {} ({}) skipped: {}",
            "warning:".yellow().bold(),
            skipped.rule_id,
            skipped.kind,
            skipped.reason
        );
    }

    let diagnostics = validator.validate(&script);
    let report = ValidationReport::from_diagnostics(dialect, diagnostics)
        .with_source(script_path.display().to_string());

    if let Some(output) = output {
        report.save_to_file(output)?;
        if verbose {
            eprintln!("{} {}", "Report saved to:".green(), output.display());
        }
    }

    print_report(&report, verbose);

    // Exit with error code if any line is invalid
    if report.has_invalid_lines() {
        std::process::exit(1);
    }

    Ok(())
}

fn print_report(report: &ValidationReport, verbose: bool) {
    for diag in &report.diagnostics {
        if diag.is_valid {
            if verbose {
                println!("{} {:>4}  {}", "✓".green(), diag.line_number, diag.content.dimmed());
            }
            continue;
        }

        println!("{} {:>4}  {}", "✗".red(), diag.line_number, diag.content);
        for issue in &diag.issues {
            let severity = match issue.severity {
                RuleSeverity::Error => "ERROR".red().bold(),
                RuleSeverity::Warning => "WARN".yellow().bold(),
                RuleSeverity::Info => "INFO".cyan(),
            };
            println!("         [{}] {}: {}", severity, issue.code, issue.message);
        }
    }

    println!("\n{}", "=".repeat(60).bright_blue());
    println!("{}", "Script Validation Report".bold().bright_blue());
    println!("{}", "=".repeat(60).bright_blue());
    println!();

    println!("{}", "Summary:".bold());
    println!("  Lines:   {}", report.summary.lines);
    println!("  Valid:   {}", report.summary.valid.to_string().green());

    if report.summary.invalid > 0 {
        println!("  Invalid: {}", report.summary.invalid.to_string().red().bold());
    } else {
        println!("  Invalid: {}", report.summary.invalid.to_string().green());
        println!();
        println!("{}", "✓ No issues found!".green().bold());
    }
}

/// Rules command - list, export, import, reset and edit rules
fn rules_command(store: &FileStore, action: RulesAction) -> Result<()> {
    let mut rules = open_rules(store)?;

    match action {
        RulesAction::List { dialect, kind, json } => {
            let dialects = dialect.map(|d| vec![d]).unwrap_or_else(|| Dialect::ALL.to_vec());
            let mut listed: Vec<(Dialect, ValueKind, &ValidationRule)> = Vec::new();

            for dialect in dialects {
                for (bucket, bucket_rules) in rules.table().dialect(dialect) {
                    if kind.is_some_and(|k| k != *bucket) {
                        continue;
                    }
                    listed.extend(bucket_rules.iter().map(|rule| (dialect, *bucket, rule)));
                }
            }

            if json {
                let entries: Vec<serde_json::Value> = listed
                    .iter()
                    .map(|(dialect, kind, rule)| {
                        serde_json::json!({ "dialect": dialect, "kind": kind, "rule": rule })
                    })
                    .collect();
                println!("{}", serde_json::to_string_pretty(&entries)?);
                return Ok(());
            }

            if listed.is_empty() {
                println!("{}", "No rules".yellow());
            }
            for (dialect, kind, rule) in listed {
                println!(
                    "{:<8} {:<8} {:>4}  {} [{}]",
                    dialect.to_string().cyan(),
                    kind,
                    rule.id.bold(),
                    rule.name,
                    rule.severity
                );
                println!("                        {}", rule.pattern.dimmed());
            }
        }

        RulesAction::Export { output } => write_document(&rules.export_rules()?, output.as_deref())?,

        RulesAction::Import { file } => {
            let table = rules.import_rules(&read_file(&file)?)?;
            eprintln!("{} Imported {} rules", "✓".green(), table.len());
        }

        RulesAction::Reset => {
            let table = rules.reset_to_default()?;
            eprintln!("{} Restored {} built-in rules", "✓".green(), table.len());
        }

        RulesAction::Add {
            dialect,
            kind,
            id,
            name,
            pattern,
            message,
            severity,
            description,
        } => {
            let mut rule = ValidationRule::new(id.as_str(), name, pattern, message, severity);
            if let Some(description) = description {
                rule = rule.with_description(description);
            }
            rules.add_rule(dialect, kind, rule)?;
            eprintln!("{} Added rule {} to {}/{}", "✓".green(), id.bold(), dialect, kind);
        }

        RulesAction::Remove { dialect, kind, id } => {
            let removed = rules.remove_rule(dialect, kind, &id)?;
            eprintln!("{} Removed rule {} ({})", "✓".green(), removed.id.bold(), removed.name);
        }
    }

    Ok(())
}

/// Schema command - list, show, export, import and remove tables
fn schema_command(store: &FileStore, action: SchemaAction) -> Result<()> {
    let mut schemas = SchemaStore::load(store.clone())?;

    match action {
        SchemaAction::List => {
            if schemas.schemas().is_empty() {
                println!("{}", "No tables stored".yellow());
            }
            for (name, table) in schemas.schemas().iter() {
                println!("{:<24} {:<8} {} fields", name.green(), table.dialect, table.fields.len());
            }
        }

        SchemaAction::Show { table } => {
            let schema = schemas
                .schemas()
                .get(&table)
                .ok_or_else(|| anyhow::anyhow!("Table '{}' is not stored", table))?;
            print_fields(&table, schema);
        }

        SchemaAction::Export { output } => write_document(&schemas.export_schemas()?, output.as_deref())?,

        SchemaAction::Import { file } => {
            let imported = schemas.import_schemas(&read_file(&file)?)?;
            eprintln!("{} Imported {} tables", "✓".green(), imported.len());
        }

        SchemaAction::Remove { table } => {
            schemas.remove_table(&table)?;
            eprintln!("{} Removed {}", "✓".green(), table.bold());
        }
    }

    Ok(())
}

fn write_document(json: &str, output: Option<&Path>) -> Result<()> {
    match output {
        Some(path) => {
            std::fs::write(path, json).with_context(|| format!("Failed to write {}", path.display()))?;
            eprintln!("{} {}", "Written to:".green(), path.display());
        }
        None => println!("{}", json),
    }
    Ok(())
}

fn parse_severity(value: &str) -> Result<RuleSeverity, String> {
    match value.trim().to_ascii_lowercase().as_str() {
        "error" => Ok(RuleSeverity::Error),
        "warning" | "warn" => Ok(RuleSeverity::Warning),
        "info" => Ok(RuleSeverity::Info),
        other => Err(format!("unknown severity '{}', expected error, warning or info", other)),
    }
}

/// Finds ancestor sources under the search directories, then asks on stdin
struct SourceLocator {
    search_dirs: Vec<PathBuf>,
    prompt: bool,
}

impl SourceLocator {
    fn new(search_dirs: Vec<PathBuf>, prompt: bool) -> Self {
        Self { search_dirs, prompt }
    }

    /// First `<ClassName>.java` under the search directories that declares the class
    fn search(&self, class_name: &str) -> Option<String> {
        let file_name = format!("{}.java", class_name);

        for dir in &self.search_dirs {
            let candidates = WalkDir::new(dir)
                .follow_links(true)
                .into_iter()
                .filter_map(|entry| entry.ok())
                .filter(|entry| entry.file_type().is_file() && entry.file_name() == file_name.as_str());

            for entry in candidates {
                match std::fs::read_to_string(entry.path()) {
                    Ok(source) if declares_class(&source, class_name) => {
                        tracing::debug!(class_name, path = %entry.path().display(), "found ancestor source");
                        return Some(source);
                    }
                    Ok(_) => {
                        tracing::debug!(path = %entry.path().display(), "file does not declare the class");
                    }
                    Err(e) => {
                        tracing::warn!(path = %entry.path().display(), error = %e, "failed to read candidate");
                    }
                }
            }
        }

        None
    }

    /// Ask for a path until one can be read; an empty answer declines
    fn ask(&self, class_name: &str, input: &mut impl BufRead) -> Option<String> {
        loop {
            eprint!(
                "{} ",
                format!("Path to the source of '{}' (empty to skip):", class_name).cyan()
            );
            let _ = std::io::stderr().flush();

            let mut answer = String::new();
            match input.read_line(&mut answer) {
                Ok(0) | Err(_) => return None,
                Ok(_) => {}
            }

            let answer = answer.trim();
            if answer.is_empty() {
                return None;
            }

            match std::fs::read_to_string(answer) {
                Ok(source) => return Some(source),
                Err(e) => eprintln!("{} {}: {}", "error:".red().bold(), answer, e),
            }
        }
    }
}

impl AncestorLocator for SourceLocator {
    fn locate(&mut self, class_name: &str) -> Option<String> {
        if let Some(source) = self.search(class_name) {
            return Some(source);
        }

        if !self.prompt {
            return None;
        }

        let stdin = std::io::stdin();
        let mut input = stdin.lock();
        self.ask(class_name, &mut input)
    }
}
