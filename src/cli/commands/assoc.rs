//! `mdt assoc` command - Association definitions and rules

use console::style;
use miette::{IntoDiagnostic, Result};

use crate::assoc::{
    AssociationDefinition, AssociationEngine, AssociationRule, Cardinality, FilterCriteria,
    SortDirection, ValidationRule,
};
use crate::cli::helpers::{actor, format_short_id, open_store, print_doc};
use crate::cli::table::Listing;
use crate::cli::{GlobalOpts, OutputFormat};
use crate::core::identity::EntityPrefix;
use crate::core::CoreError;

#[derive(clap::Subcommand, Debug)]
pub enum AssocCommands {
    /// Declare an association definition between item types
    DefNew(NewDefArgs),

    /// List association definitions
    DefList,

    /// Show one association definition
    DefShow(CodeArgs),

    /// Register a rule binding a definition to one source/target type pair
    RuleNew(NewRuleArgs),

    /// List association rules
    RuleList,

    /// Show one association rule
    RuleShow(CodeArgs),

    /// List the rules that apply to a source item type, reverse bindings
    /// included
    Rules(RulesArgs),
}

#[derive(clap::Args, Debug)]
pub struct NewDefArgs {
    /// Unique machine code (e.g. "order_customer")
    pub code: String,

    /// Cardinality class
    #[arg(long, short = 'c', value_enum)]
    pub cardinality: Cardinality,

    /// Allowed source item-type codes
    #[arg(long, short = 's', required = true)]
    pub source: Vec<String>,

    /// Allowed target item-type codes
    #[arg(long, short = 't', required = true)]
    pub target: Vec<String>,

    /// Only the source side may create or remove links
    #[arg(long)]
    pub directional: bool,

    /// Source-side filter criteria as YAML/JSON
    #[arg(long)]
    pub source_filter: Option<String>,

    /// Target-side filter criteria as YAML/JSON
    #[arg(long)]
    pub target_filter: Option<String>,
}

#[derive(clap::Args, Debug)]
#[command(after_help = "\
EXAMPLES:
  mdt assoc rule-new ORDER_FABRIC_SELECTION --definition order_fabric \\
      --source order --target fabric \\
      --validate '{rule: min_count, count: 1}' \\
      --validate '{rule: max_count, count: 3}' \\
      --searchable name --searchable material
")]
pub struct NewRuleArgs {
    /// Unique machine code (e.g. "ORDER_FABRIC_SELECTION")
    pub code: String,

    /// Definition code the rule instantiates
    #[arg(long, short = 'd')]
    pub definition: String,

    /// Source item-type code
    #[arg(long, short = 's')]
    pub source: String,

    /// Target item-type code
    #[arg(long, short = 't')]
    pub target: String,

    /// Target criteria as YAML/JSON, layered on the definition's filter
    #[arg(long, short = 'c')]
    pub criteria: Option<String>,

    /// Validation rule as YAML/JSON, in evaluation order
    #[arg(long, value_name = "RULE")]
    pub validate: Vec<String>,

    /// Lookup priority (higher wins)
    #[arg(long, default_value_t = 0)]
    pub priority: i64,

    /// The association must always hold at least one link
    #[arg(long)]
    pub required: bool,

    /// Scrub links from owners when a linked target is deleted
    #[arg(long)]
    pub cascade_delete: bool,

    /// Attribute codes searched by `link candidates --search`
    #[arg(long)]
    pub searchable: Vec<String>,

    /// Attribute code candidate listings sort by
    #[arg(long)]
    pub sort_by: Option<String>,

    /// Sort direction for candidate listings
    #[arg(long, value_enum, default_value = "desc")]
    pub sort_direction: SortDirection,
}

#[derive(clap::Args, Debug)]
pub struct CodeArgs {
    pub code: String,
}

#[derive(clap::Args, Debug)]
pub struct RulesArgs {
    /// Source item-type code
    pub item_type: String,

    /// Include inactive rules
    #[arg(long)]
    pub all: bool,
}

pub fn run(cmd: AssocCommands, global: &GlobalOpts) -> Result<()> {
    match cmd {
        AssocCommands::DefNew(args) => new_def(args, global),
        AssocCommands::DefList => list_defs(global),
        AssocCommands::DefShow(args) => show_def(args, global),
        AssocCommands::RuleNew(args) => new_rule(args, global),
        AssocCommands::RuleList => list_rules(global),
        AssocCommands::RuleShow(args) => show_rule(args, global),
        AssocCommands::Rules(args) => rules_for_type(args, global),
    }
}

fn parse_criteria(raw: &Option<String>) -> Result<FilterCriteria> {
    match raw {
        Some(raw) => serde_yml::from_str(raw).into_diagnostic(),
        None => Ok(FilterCriteria::default()),
    }
}

fn new_def(args: NewDefArgs, global: &GlobalOpts) -> Result<()> {
    let (_, store) = open_store(global)?;

    // Every named type must exist before the definition goes in
    for code in args.source.iter().chain(args.target.iter()) {
        store.item_type_by_code(code)?;
    }

    let mut def = AssociationDefinition::new(
        args.code,
        args.cardinality,
        args.source,
        args.target,
        &actor(),
    );
    def.directional = args.directional;
    def.source_filter = parse_criteria(&args.source_filter)?;
    def.target_filter = parse_criteria(&args.target_filter)?;

    let def = store.definitions.insert(def).map_err(CoreError::from)?;
    if !global.quiet {
        println!(
            "{} Created definition {} ({})",
            style("✓").green(),
            style(&def.code).cyan(),
            def.cardinality
        );
    }
    Ok(())
}

fn list_defs(global: &GlobalOpts) -> Result<()> {
    let (_, store) = open_store(global)?;
    let mut defs = store.definitions.list().map_err(CoreError::from)?;
    defs.sort_by(|a, b| a.code.cmp(&b.code));

    if matches!(global.format, OutputFormat::Yaml | OutputFormat::Json) {
        return print_doc(&defs, global);
    }

    let mut listing = Listing::new(
        &["ID", "CODE", "CARDINALITY", "SOURCES", "TARGETS", "DIRECTIONAL"],
        "definition",
    );
    for def in &defs {
        listing.push(
            def.id.to_string(),
            vec![
                format_short_id(&def.id),
                def.code.clone(),
                def.cardinality.to_string(),
                def.source_types.join(","),
                def.target_types.join(","),
                if def.directional { "yes" } else { "no" }.to_string(),
            ],
        );
    }
    listing.print(global);
    Ok(())
}

fn show_def(args: CodeArgs, global: &GlobalOpts) -> Result<()> {
    let (_, store) = open_store(global)?;
    let def = store
        .definitions
        .find_by_code(&args.code)
        .map_err(CoreError::from)?
        .ok_or_else(|| CoreError::not_found(EntityPrefix::Assoc, &*args.code))?;
    print_doc(&def, global)
}

fn new_rule(args: NewRuleArgs, global: &GlobalOpts) -> Result<()> {
    let (_, store) = open_store(global)?;
    let def = store
        .definitions
        .find_by_code(&args.definition)
        .map_err(CoreError::from)?
        .ok_or_else(|| CoreError::not_found(EntityPrefix::Assoc, &*args.definition))?;

    let mut rule = AssociationRule::new(
        args.code,
        def.id,
        args.source,
        args.target,
        def.cardinality,
        &actor(),
    );
    rule.criteria = parse_criteria(&args.criteria)?;
    rule.validations = args
        .validate
        .iter()
        .map(|raw| serde_yml::from_str::<ValidationRule>(raw).into_diagnostic())
        .collect::<Result<_>>()?;
    rule.priority = args.priority;
    rule.required = args.required;
    rule.cascade_delete = args.cascade_delete;
    rule.searchable = args.searchable;
    rule.sort_by = args.sort_by;
    rule.sort_direction = args.sort_direction;

    let engine = AssociationEngine::new(&store);
    let rule = engine.define_rule(rule)?;
    if !global.quiet {
        println!(
            "{} Created rule {} ({} -> {}, {})",
            style("✓").green(),
            style(&rule.code).cyan(),
            rule.source_type,
            rule.target_type,
            rule.cardinality
        );
    }
    Ok(())
}

fn list_rules(global: &GlobalOpts) -> Result<()> {
    let (_, store) = open_store(global)?;
    let mut rules = store.rules.list().map_err(CoreError::from)?;
    rules.sort_by(|a, b| a.code.cmp(&b.code));

    if matches!(global.format, OutputFormat::Yaml | OutputFormat::Json) {
        return print_doc(&rules, global);
    }

    let mut listing = Listing::new(
        &["ID", "CODE", "SOURCE", "TARGET", "CARDINALITY", "PRIORITY", "ACTIVE"],
        "rule",
    );
    for rule in &rules {
        listing.push(
            rule.id.to_string(),
            vec![
                format_short_id(&rule.id),
                rule.code.clone(),
                rule.source_type.clone(),
                rule.target_type.clone(),
                rule.cardinality.to_string(),
                rule.priority.to_string(),
                if rule.active { "yes" } else { "no" }.to_string(),
            ],
        );
    }
    listing.print(global);
    Ok(())
}

fn show_rule(args: CodeArgs, global: &GlobalOpts) -> Result<()> {
    let (_, store) = open_store(global)?;
    let rule = store.rule_by_code(&args.code)?;
    print_doc(&rule, global)
}

fn rules_for_type(args: RulesArgs, global: &GlobalOpts) -> Result<()> {
    let (_, store) = open_store(global)?;
    let engine = AssociationEngine::new(&store);
    let bound = engine.rules_for_source_type(&args.item_type, args.all)?;

    let mut listing = Listing::new(
        &["ID", "CODE", "DIRECTION", "KEY", "CARDINALITY", "PRIORITY"],
        "rule",
    );
    for b in &bound {
        listing.push(
            b.rule.id.to_string(),
            vec![
                format_short_id(&b.rule.id),
                b.rule.code.clone(),
                format!("{:?}", b.direction).to_lowercase(),
                b.effective_key(),
                b.effective_cardinality().to_string(),
                b.rule.priority.to_string(),
            ],
        );
    }
    listing.print(global);
    Ok(())
}
