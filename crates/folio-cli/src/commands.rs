use anyhow::{bail, Context};
use colored::Colorize;
use folio_db::{Database, DbConfig};
use folio_doc::{Container, Document, Node};
use folio_fs::Repository;
use folio_index::{HashIndex, Index, KeyedHashIndex};
use serde_json::Value;

use crate::cli::*;

pub fn run_command(cli: Cli) -> anyhow::Result<()> {
    let format = cli.format;
    match cli.command {
        Command::Init => cmd_init(&cli),
        Command::Put(ref args) => cmd_put(&cli, args),
        Command::Get(ref args) => cmd_get(&cli, args, format),
        Command::Rm(ref args) => cmd_rm(&cli, args),
        Command::Ls(ref args) => cmd_ls(&cli, args, format),
        Command::Index(ref args) => cmd_index(&cli, args),
        Command::Find(ref args) => cmd_find(&cli, args, format),
        Command::Show(ref args) => cmd_show(&cli, args),
        Command::Branches => cmd_branches(&cli),
    }
}

fn config(cli: &Cli) -> anyhow::Result<DbConfig> {
    let mut config = DbConfig::load_or_default(&cli.repo)
        .with_context(|| format!("reading configuration in {}", cli.repo.display()))?;
    if let Some(branch) = &cli.branch {
        config = config.with_branch(branch.clone());
    }
    Ok(config)
}

fn open(cli: &Cli) -> anyhow::Result<Database> {
    Database::open_path(&cli.repo, config(cli)?)
        .with_context(|| format!("opening repository in {}", cli.repo.display()))
}

/// Save, pointing at the quarantine branch if the commit failed.
fn save(db: &mut Database) -> anyhow::Result<()> {
    if let Err(e) = db.save() {
        if let Some(branch) = db.last_quarantine() {
            eprintln!(
                "{} changes were saved to branch {} instead",
                "!".red().bold(),
                branch.yellow().bold()
            );
        }
        return Err(e.into());
    }
    Ok(())
}

fn print_json(value: &impl serde::Serialize) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn cmd_init(cli: &Cli) -> anyhow::Result<()> {
    let db = Database::init_path(&cli.repo, config(cli)?)?;
    println!(
        "{} Initialized folio repository in {}",
        "✓".green().bold(),
        cli.repo.display().to_string().bold()
    );
    println!("  Branch: {}", db.branch().yellow());
    Ok(())
}

fn cmd_put(cli: &Cli, args: &PutArgs) -> anyhow::Result<()> {
    let mut db = open(cli)?;
    let node: Node = match (&args.json, args.container) {
        (_, true) => Container::new().into(),
        (Some(text), false) => {
            let value: Value = serde_json::from_str(text).context("parsing document body")?;
            Document::from_value(value)?.into()
        }
        (None, false) => bail!("give a JSON body or --container"),
    };
    let kind = node.kind();
    db.insert_path(&args.path, node)?;
    save(&mut db)?;
    println!("{} Stored {:?} {}", "✓".green(), kind, args.path.bold());
    Ok(())
}

fn cmd_get(cli: &Cli, args: &PathArgs, format: OutputFormat) -> anyhow::Result<()> {
    let db = open(cli)?;
    match db.get_path(&args.path) {
        Some(Node::Document(doc)) => print_json(doc),
        Some(Node::Container(container)) => list(container, format),
        None => bail!("no such path: {}", args.path),
    }
}

fn cmd_rm(cli: &Cli, args: &PathArgs) -> anyhow::Result<()> {
    let mut db = open(cli)?;
    if !db.remove_path(&args.path)? {
        bail!("no such path: {}", args.path);
    }
    save(&mut db)?;
    println!("{} Removed {}", "✓".green(), args.path.bold());
    Ok(())
}

fn cmd_ls(cli: &Cli, args: &LsArgs, format: OutputFormat) -> anyhow::Result<()> {
    let db = open(cli)?;
    let container = if args.path.is_empty() {
        db.root()
    } else {
        match db.get_path(&args.path) {
            Some(Node::Container(container)) => container,
            Some(Node::Document(_)) => bail!("not a container: {}", args.path),
            None => bail!("no such path: {}", args.path),
        }
    };
    list(container, format)
}

fn list(container: &Container, format: OutputFormat) -> anyhow::Result<()> {
    if format == OutputFormat::Json {
        let entries: serde_json::Map<String, Value> = container
            .iter()
            .map(|(name, node)| (name.to_string(), serde_json::to_value(node.kind()).unwrap_or(Value::Null)))
            .collect();
        return print_json(&entries);
    }
    if let Some(index) = container.index() {
        println!("{} {}", "index:".dimmed(), index.kind().cyan());
    }
    for (name, node) in container.iter() {
        match node {
            Node::Container(_) => println!("  {}/", name.blue().bold()),
            Node::Document(_) => println!("  {name}"),
        }
    }
    Ok(())
}

fn cmd_index(cli: &Cli, args: &IndexArgs) -> anyhow::Result<()> {
    let mut db = open(cli)?;
    let mut hash = HashIndex::new().with_inverse(args.inverse);
    if let Some(name) = &args.name {
        hash = hash.with_name(name.clone());
    }
    if let Some(target) = &args.supply {
        hash = hash.with_supply(target.clone());
    }
    let index: Index = match args.kind {
        IndexKind::Hash => hash.into(),
        IndexKind::Keyed => {
            let keyed = KeyedHashIndex::new(hash);
            match &args.field {
                Some(field) => keyed.with_field(field.clone()).into(),
                None => keyed.into(),
            }
        }
    };
    match &args.sub {
        Some(sub) => db.add_subindex(&args.container, sub, index)?,
        None => {
            db.set_index(&args.container, index)?;
        }
    }
    save(&mut db)?;
    println!("{} Indexed {}", "✓".green(), args.container.bold());
    Ok(())
}

fn cmd_find(cli: &Cli, args: &FindArgs, format: OutputFormat) -> anyhow::Result<()> {
    let db = open(cli)?;
    let sub = args.subindex.as_deref();
    let found = if args.first {
        db.idx_find_first(&args.container, &args.key, sub)?
            .into_iter()
            .collect()
    } else {
        db.idx_find(&args.container, &args.key, sub)?
    };
    if format == OutputFormat::Json {
        return print_json(&found);
    }
    if found.is_empty() {
        println!("No matches.");
    }
    for m in found {
        println!("{}", m.yellow());
    }
    Ok(())
}

fn cmd_show(cli: &Cli, args: &ShowArgs) -> anyhow::Result<()> {
    let db = open(cli)?;
    print_json(&db.object_by_hash(&args.hash)?)
}

fn cmd_branches(cli: &Cli) -> anyhow::Result<()> {
    let repo = Repository::open(&cli.repo)?;
    let config = config(cli)?;
    let current = match &config.branch {
        Some(branch) => branch.clone(),
        None => repo.default_branch()?,
    };
    let quarantine = format!("{}-", config.conflict_prefix);
    let branches = repo.branches()?;
    if branches.is_empty() {
        println!("No branches.");
    }
    for branch in branches {
        let tip = branch.tip.short_hex();
        if branch.name == current {
            println!("* {} {}", branch.name.green().bold(), tip.dimmed());
        } else if branch.name.starts_with(&quarantine) {
            println!("  {} {}", branch.name.red(), tip.dimmed());
        } else {
            println!("  {} {}", branch.name, tip.dimmed());
        }
    }
    Ok(())
}
