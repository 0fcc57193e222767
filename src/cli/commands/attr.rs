//! `mdt attr` command - Attribute definition management

use console::style;
use miette::{IntoDiagnostic, Result};

use crate::catalog::{AttributeDefinition, Constraints};
use crate::cli::helpers::{actor, format_short_id, open_store, print_doc};
use crate::cli::table::Listing;
use crate::cli::{GlobalOpts, OutputFormat};
use crate::core::identity::EntityPrefix;
use crate::core::value::AttributeKind;
use crate::core::CoreError;

#[derive(clap::Subcommand, Debug)]
pub enum AttrCommands {
    /// Define a new attribute
    New(NewAttrArgs),

    /// List attribute definitions
    List,

    /// Show one attribute definition
    Show(ShowAttrArgs),
}

#[derive(clap::Args, Debug)]
pub struct NewAttrArgs {
    /// Unique machine code (e.g. "screen_size")
    pub code: String,

    /// Value kind
    #[arg(long, short = 'k', value_enum)]
    pub kind: AttributeKind,

    /// Required when one of its groups applies
    #[arg(long, short = 'r')]
    pub required: bool,

    /// Display-name key
    #[arg(long)]
    pub name: Option<String>,

    /// Declared options (select/multiselect kinds)
    #[arg(long, short = 'o')]
    pub option: Vec<String>,

    /// Constraints as YAML/JSON (e.g. '{min_value: 1, integer: true}')
    #[arg(long, short = 'c')]
    pub constraints: Option<String>,
}

#[derive(clap::Args, Debug)]
pub struct ShowAttrArgs {
    /// Attribute code
    pub code: String,
}

pub fn run(cmd: AttrCommands, global: &GlobalOpts) -> Result<()> {
    match cmd {
        AttrCommands::New(args) => new_attr(args, global),
        AttrCommands::List => list_attrs(global),
        AttrCommands::Show(args) => show_attr(args, global),
    }
}

fn new_attr(args: NewAttrArgs, global: &GlobalOpts) -> Result<()> {
    let (_, store) = open_store(global)?;

    let mut attr = AttributeDefinition::new(args.code, args.kind, args.required, &actor());
    attr.name = args.name;
    attr.options = args.option;
    if let Some(raw) = &args.constraints {
        attr.constraints = serde_yml::from_str::<Constraints>(raw).into_diagnostic()?;
    }

    let attr = store.attributes.insert(attr).map_err(CoreError::from)?;
    if !global.quiet {
        println!(
            "{} Created attribute {} ({})",
            style("✓").green(),
            style(&attr.code).cyan(),
            attr.id
        );
    }
    Ok(())
}

fn list_attrs(global: &GlobalOpts) -> Result<()> {
    let (_, store) = open_store(global)?;
    let mut attrs = store.attributes.list().map_err(CoreError::from)?;
    attrs.sort_by(|a, b| a.code.cmp(&b.code));

    if matches!(global.format, OutputFormat::Yaml | OutputFormat::Json) {
        return print_doc(&attrs, global);
    }

    let mut listing = Listing::new(&["ID", "CODE", "KIND", "REQUIRED"], "attribute");
    for attr in &attrs {
        listing.push(attr.id.to_string(), vec![
            format_short_id(&attr.id),
            attr.code.clone(),
            format!("{:?}", attr.kind).to_lowercase(),
            if attr.required { "yes" } else { "no" }.to_string(),
        ]);
    }
    listing.print(global);
    Ok(())
}

fn show_attr(args: ShowAttrArgs, global: &GlobalOpts) -> Result<()> {
    let (_, store) = open_store(global)?;
    let attr = store
        .attributes
        .find_by_code(&args.code)
        .map_err(CoreError::from)?
        .ok_or_else(|| CoreError::not_found(EntityPrefix::Attr, &*args.code))?;
    print_doc(&attr, global)
}
