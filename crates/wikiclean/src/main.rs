use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use clap::{Args, CommandFactory, Parser, Subcommand};
use serde::Serialize;
use similar::TextDiff;
use tracing::info;
use tracing_subscriber::EnvFilter;
use wikiclean_core::analysis::{ElementCategory, PageAnalysis, PageElement};
use wikiclean_core::bot::{
    BotOptions, RelinkOptions, automatic_fix, full_analysis, relink_pages, replace_all_links,
};
use wikiclean_core::check::{CheckRegistry, CheckRun};
use wikiclean_core::config::{DEFAULT_CONFIG_PATH, WikicleanConfig, load_config};
use wikiclean_core::filesystem::{scan_stats, scan_wiki_files};
use wikiclean_core::gateway::{GatewayConfig, MediaWikiGateway};
use wikiclean_core::mediawiki::{MediaWiki, TextReplacement, create_update_page_comment};
use wikiclean_core::orchestrator::DrainStatus;
use wikiclean_core::page::{DisambiguationStatus, PageStore};
use wikiclean_core::site::SiteConfig;

#[derive(Debug, Parser)]
#[command(
    name = "wikiclean",
    version,
    about = "Wikitext analysis, check algorithms and bulk wiki cleanup"
)]
struct Cli {
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,
    #[arg(short, long, global = true, help = "Enable debug logging")]
    verbose: bool,
    #[arg(long, global = true, help = "Print results as JSON")]
    json: bool,
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Debug, Subcommand)]
enum Commands {
    #[command(about = "Run check algorithms on a local file or a wiki page")]
    Check(CheckArgs),
    #[command(about = "Apply automatic fixes and show the diff")]
    Fix(FixArgs),
    #[command(about = "List the elements of one category found in a page")]
    Elements(ElementsArgs),
    #[command(about = "List registered check algorithms")]
    Algorithms,
    #[command(about = "Check every .wiki file under a directory")]
    Scan(ScanArgs),
    #[command(about = "Backlinks of a page, optionally through redirects")]
    Backlinks(BacklinksArgs),
    #[command(about = "Links of a page with their disambiguation status")]
    Links(LinksArgs),
    #[command(about = "Disambiguation status of pages")]
    Disambig(DisambigArgs),
    #[command(about = "Literal text replacement on wiki pages")]
    Replace(ReplaceArgs),
    #[command(about = "Point links to one page at another, keeping their displayed text")]
    Relink(RelinkArgs),
    #[command(about = "Automatic fixing of selected algorithms on wiki pages")]
    Bot(BotArgs),
    #[command(about = "Expand templates or render a page to HTML")]
    Expand(ExpandArgs),
}

#[derive(Debug, Args)]
struct SourceArgs {
    #[arg(value_name = "FILE", help = "Local wikitext file")]
    path: Option<PathBuf>,
    #[arg(long, value_name = "TITLE", help = "Fetch the page from the wiki instead")]
    title: Option<String>,
}

#[derive(Debug, Args)]
struct CheckArgs {
    #[command(flatten)]
    source: SourceArgs,
    #[arg(long, value_delimiter = ',', value_name = "IDS")]
    only: Vec<u32>,
    #[arg(long, help = "Only algorithms able to fix automatically")]
    automatic: bool,
}

#[derive(Debug, Args)]
struct FixArgs {
    #[command(flatten)]
    source: SourceArgs,
    #[arg(long, value_delimiter = ',', value_name = "IDS")]
    only: Vec<u32>,
    #[arg(long, help = "Write the result back (file or wiki page)")]
    write: bool,
}

#[derive(Debug, Args)]
struct ElementsArgs {
    #[command(flatten)]
    source: SourceArgs,
    #[arg(short, long, value_name = "CATEGORY")]
    category: String,
}

#[derive(Debug, Args)]
struct ScanArgs {
    directory: PathBuf,
    #[arg(long, value_delimiter = ',', value_name = "IDS")]
    only: Vec<u32>,
}

#[derive(Debug, Args)]
struct BacklinksArgs {
    title: String,
    #[arg(long, help = "Follow redirects to the page transitively")]
    all: bool,
}

#[derive(Debug, Args)]
struct LinksArgs {
    title: String,
    #[arg(long, value_name = "ID")]
    namespace: Option<i32>,
}

#[derive(Debug, Args)]
struct DisambigArgs {
    #[arg(required = true)]
    titles: Vec<String>,
    #[arg(long, help = "Also fetch the links of disambiguation pages")]
    links: bool,
}

#[derive(Debug, Args)]
struct ReplaceArgs {
    #[arg(required = true)]
    titles: Vec<String>,
    #[arg(long)]
    from: String,
    #[arg(long)]
    to: String,
    #[arg(long, default_value = "replacement")]
    label: String,
    #[arg(long)]
    comment: Option<String>,
}

#[derive(Debug, Args)]
struct RelinkArgs {
    #[arg(required_unless_present = "file", conflicts_with = "file")]
    titles: Vec<String>,
    #[arg(long, value_name = "FILE", help = "Rewrite a local wikitext file and print it")]
    file: Option<PathBuf>,
    #[arg(long)]
    from: String,
    #[arg(long)]
    to: String,
    #[arg(long)]
    comment: Option<String>,
    #[arg(long, help = "Compute replacements without writing")]
    dry_run: bool,
}

#[derive(Debug, Args)]
struct BotArgs {
    #[arg(required = true)]
    titles: Vec<String>,
    #[arg(long = "algorithm", value_delimiter = ',', value_name = "IDS", required = true)]
    algorithms: Vec<u32>,
    #[arg(long, help = "Analyze and fix without writing")]
    dry_run: bool,
    #[arg(long, help = "Full analysis of each page instead of fixing")]
    analyze: bool,
}

#[derive(Debug, Args)]
struct ExpandArgs {
    title: String,
    #[arg(long, value_name = "FILE", help = "Use this text instead of the page contents")]
    text: Option<PathBuf>,
    #[arg(long, help = "Render to HTML instead of expanding templates")]
    html: bool,
}

struct AppContext {
    config: WikicleanConfig,
    site: Arc<SiteConfig>,
    json: bool,
}

fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let config_path = cli
        .config
        .clone()
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH));
    let config = load_config(&config_path)?;
    let context = AppContext {
        site: Arc::new(config.site.clone()),
        config,
        json: cli.json,
    };

    match cli.command {
        Some(Commands::Check(args)) => run_check(&context, args),
        Some(Commands::Fix(args)) => run_fix(&context, args),
        Some(Commands::Elements(args)) => run_elements(&context, args),
        Some(Commands::Algorithms) => run_algorithms(&context),
        Some(Commands::Scan(args)) => run_scan(&context, args),
        Some(Commands::Backlinks(args)) => run_backlinks(&context, args),
        Some(Commands::Links(args)) => run_links(&context, args),
        Some(Commands::Disambig(args)) => run_disambig(&context, args),
        Some(Commands::Replace(args)) => run_replace(&context, args),
        Some(Commands::Relink(args)) => run_relink(&context, args),
        Some(Commands::Bot(args)) => run_bot(&context, args),
        Some(Commands::Expand(args)) => run_expand(&context, args),
        None => {
            let mut command = Cli::command();
            command.print_help()?;
            println!();
            Ok(())
        }
    }
}

fn init_logging(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("wikiclean=debug,wikiclean_core=debug,info")
    } else {
        EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new("wikiclean=info,wikiclean_core=info,warn"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn run_check(context: &AppContext, args: CheckArgs) -> Result<()> {
    let (label, text) = load_source(context, &args.source)?;
    let registry = registry_with_only(&args.only);
    let analysis = PageAnalysis::new(text, Arc::clone(&context.site));
    let run = registry.run_all(&analysis, args.automatic);

    if context.json {
        return print_json(&run);
    }
    println!("check");
    println!("source: {label}");
    print_check_run(&analysis, &run);
    Ok(())
}

fn run_fix(context: &AppContext, args: FixArgs) -> Result<()> {
    let (label, text) = load_source(context, &args.source)?;
    let registry = CheckRegistry::with_default_algorithms();
    let only = (!args.only.is_empty()).then_some(args.only.as_slice());
    let outcome = registry.fix_all(&text, &context.site, only);

    if context.json {
        print_json(&outcome)?;
    } else {
        println!("fix");
        println!("source: {label}");
        println!("applied: {}", format_ids(&outcome.applied));
        for failure in &outcome.failures {
            println!("failure: [{}] {}", failure.id, failure.message);
        }
        if outcome.text != text {
            let diff = TextDiff::from_lines(text.as_str(), outcome.text.as_str());
            print!(
                "{}",
                diff.unified_diff()
                    .context_radius(3)
                    .header(&format!("a/{label}"), &format!("b/{label}"))
            );
        }
    }

    if !args.write || outcome.text == text {
        return Ok(());
    }
    match (&args.source.path, &args.source.title) {
        (Some(path), _) => {
            fs::write(path, &outcome.text)
                .with_context(|| format!("failed to write {}", path.display()))?;
            info!("wrote {}", path.display());
        }
        (None, Some(title)) => {
            let mut wiki = connect_wiki(context)?;
            let page = wiki.page(title);
            let comment = create_update_page_comment(
                context.config.bot_comment(),
                &describe_applied(&registry, &outcome.applied),
            );
            let result = wiki.update_page(page, &outcome.text, &comment, false)?;
            if let Some(result) = result {
                info!(
                    "updated {} (revision {})",
                    result.title,
                    result
                        .new_revision_id
                        .map(|id| id.to_string())
                        .unwrap_or_else(|| "unchanged".to_string())
                );
            }
        }
        (None, None) => {}
    }
    Ok(())
}

fn run_elements(context: &AppContext, args: ElementsArgs) -> Result<()> {
    let Some(category) = ElementCategory::parse(&args.category) else {
        let known: Vec<&str> = ElementCategory::ALL
            .iter()
            .map(|category| category.as_str())
            .collect();
        bail!(
            "unknown element category `{}` (expected one of: {})",
            args.category,
            known.join(", ")
        );
    };
    let (_, text) = load_source(context, &args.source)?;
    let analysis = PageAnalysis::new(text, Arc::clone(&context.site));
    let elements = analysis.elements(category);

    if context.json {
        return print_json(&elements);
    }
    println!("category: {}", category.as_str());
    println!("count: {}", elements.len());
    for element in &elements {
        let span = element.span();
        println!("{}..{}\t{}", span.begin, span.end, element.to_wikitext());
    }
    Ok(())
}

fn run_algorithms(context: &AppContext) -> Result<()> {
    #[derive(Serialize)]
    struct AlgorithmRow<'a> {
        id: u32,
        description: &'a str,
        can_fix: bool,
        special_list: bool,
    }

    let registry = CheckRegistry::with_default_algorithms();
    let rows: Vec<AlgorithmRow<'_>> = registry
        .algorithms()
        .map(|algorithm| AlgorithmRow {
            id: algorithm.id(),
            description: algorithm.short_description(),
            can_fix: algorithm.can_fix(),
            special_list: algorithm.has_special_list(),
        })
        .collect();

    if context.json {
        return print_json(&rows);
    }
    for row in &rows {
        println!(
            "{:>4}  {}{}",
            row.id,
            row.description,
            if row.can_fix { " (fix)" } else { "" }
        );
    }
    Ok(())
}

fn run_scan(context: &AppContext, args: ScanArgs) -> Result<()> {
    #[derive(Serialize)]
    struct FileReport {
        title: String,
        relative_path: String,
        findings: usize,
        algorithms: Vec<u32>,
    }

    let files = scan_wiki_files(&args.directory, &context.site)?;
    let registry = registry_with_only(&args.only);
    let mut reports = Vec::new();
    let mut by_algorithm: BTreeMap<u32, usize> = BTreeMap::new();

    for file in &files {
        if file.is_redirect {
            continue;
        }
        let analysis = PageAnalysis::new(file.read()?, Arc::clone(&context.site));
        let run = registry.run_all(&analysis, false);
        if run.findings.is_empty() {
            continue;
        }
        let algorithms: Vec<u32> = run.detected_ids().into_iter().collect();
        for id in &algorithms {
            *by_algorithm.entry(*id).or_insert(0) += 1;
        }
        reports.push(FileReport {
            title: file.title.clone(),
            relative_path: file.relative_path.clone(),
            findings: run.findings.len(),
            algorithms,
        });
    }

    if context.json {
        return print_json(&reports);
    }
    let stats = scan_stats(&files);
    println!("scan");
    println!("directory: {}", normalize_path(&args.directory));
    println!("scan.total_files: {}", stats.total_files);
    println!("scan.redirects: {}", stats.redirects);
    for (namespace, count) in &stats.by_namespace {
        println!("scan.namespace.{namespace}: {count}");
    }
    println!("pages_with_findings: {}", reports.len());
    for (id, count) in &by_algorithm {
        println!("algorithm.{id}: {count}");
    }
    for report in &reports {
        println!(
            "  - {} ({}): {}",
            report.title,
            report.relative_path,
            format_ids(&report.algorithms)
        );
    }
    Ok(())
}

fn run_backlinks(context: &AppContext, args: BacklinksArgs) -> Result<()> {
    let mut wiki = connect_wiki(context)?;
    let page = wiki.page(&args.title);
    let status = if args.all {
        wiki.retrieve_all_backlinks(&[page])?
    } else {
        wiki.retrieve_backlinks(&[page], true)?
    };
    warn_if_stopped(status);

    let store = wiki.store();
    let backlinks = if args.all {
        store.backlinks_with_redirects(page)
    } else {
        store.page(page).backlinks.clone()
    };
    let titles = store.titles(&backlinks);
    if context.json {
        return print_json(&titles);
    }
    println!("title: {}", store.title(page));
    println!("backlinks: {}", titles.len());
    for title in &titles {
        println!("  - {title}");
    }
    Ok(())
}

fn run_links(context: &AppContext, args: LinksArgs) -> Result<()> {
    #[derive(Serialize)]
    struct LinkRow {
        title: String,
        redirects_to: Option<String>,
        disambiguation: DisambiguationStatus,
    }

    let mut wiki = connect_wiki(context)?;
    let page = wiki.page(&args.title);
    warn_if_stopped(wiki.retrieve_links(&[page], args.namespace)?);
    let links = wiki.store().page(page).links.clone();
    warn_if_stopped(wiki.retrieve_disambiguation_information(&links, false)?);

    let store = wiki.store();
    let rows: Vec<LinkRow> = links
        .iter()
        .map(|link| {
            let destination = store.redirect_destination(*link);
            LinkRow {
                title: store.title(*link).to_string(),
                redirects_to: (destination != *link).then(|| store.title(destination).to_string()),
                disambiguation: store.page(destination).disambiguation,
            }
        })
        .collect();

    if context.json {
        return print_json(&rows);
    }
    println!("title: {}", store.title(page));
    println!("links: {}", rows.len());
    for row in &rows {
        let marker = if row.disambiguation == DisambiguationStatus::Yes {
            " [disambiguation]"
        } else {
            ""
        };
        match &row.redirects_to {
            Some(target) => println!("  - {} -> {target}{marker}", row.title),
            None => println!("  - {}{marker}", row.title),
        }
    }
    Ok(())
}

fn run_disambig(context: &AppContext, args: DisambigArgs) -> Result<()> {
    let mut wiki = connect_wiki(context)?;
    let pages: Vec<_> = args.titles.iter().map(|title| wiki.page(title)).collect();
    warn_if_stopped(wiki.retrieve_disambiguation_information(&pages, args.links)?);

    let store = wiki.store();
    let rows: BTreeMap<String, DisambiguationStatus> = pages
        .iter()
        .map(|page| {
            let destination = store.redirect_destination(*page);
            (
                store.title(*page).to_string(),
                store.page(destination).disambiguation,
            )
        })
        .collect();
    if context.json {
        return print_json(&rows);
    }
    for page in &pages {
        let destination = store.redirect_destination(*page);
        let status = store.page(destination).disambiguation;
        println!("{}: {status:?}", store.title(*page));
        if args.links && status == DisambiguationStatus::Yes {
            for link in store.titles(&store.page(destination).links) {
                println!("  - {link}");
            }
        }
    }
    Ok(())
}

fn run_replace(context: &AppContext, args: ReplaceArgs) -> Result<()> {
    let mut wiki = connect_wiki(context)?;
    let pages: Vec<_> = args.titles.iter().map(|title| wiki.page(title)).collect();
    let mut replacements = BTreeMap::new();
    replacements.insert(args.label, vec![TextReplacement::new(args.from, args.to)]);
    let comment = args
        .comment
        .unwrap_or_else(|| context.config.bot_comment().to_string());

    let report = wiki.replace_text(&pages, &replacements, &comment)?;
    if context.json {
        return print_json(&report);
    }
    println!("modified: {}", report.count);
    print!("{}", report.description);
    Ok(())
}

fn run_relink(context: &AppContext, args: RelinkArgs) -> Result<()> {
    if let Some(path) = &args.file {
        let text = read_text_file(path)?;
        let analysis = PageAnalysis::new(text.as_str(), Arc::clone(&context.site));
        print!("{}", replace_all_links(&analysis, &args.from, &args.to));
        return Ok(());
    }

    let mut wiki = connect_wiki(context)?;
    let pages: Vec<_> = args.titles.iter().map(|title| wiki.page(title)).collect();
    let mut options = RelinkOptions::from_config(&context.config, args.from, args.to);
    if let Some(comment) = args.comment {
        options.comment = comment;
    }
    options.dry_run = args.dry_run;
    let report = relink_pages(&mut wiki, &pages, &options)?;
    if context.json {
        return print_json(&report);
    }
    println!("analyzed: {}", report.analyzed);
    println!("modified: {}", report.modified);
    println!("links_replaced: {}", report.links_replaced);
    println!("skipped: {}", report.skipped);
    println!("failed: {}", report.failed);
    Ok(())
}

fn run_bot(context: &AppContext, args: BotArgs) -> Result<()> {
    let mut wiki = connect_wiki(context)?;
    let registry = CheckRegistry::with_default_algorithms();
    for id in &args.algorithms {
        if registry.get(*id).is_none() {
            bail!("unknown check algorithm {id}");
        }
    }
    let pages: Vec<_> = args.titles.iter().map(|title| wiki.page(title)).collect();

    if args.analyze {
        let mut analyses = Vec::with_capacity(pages.len());
        for page in pages {
            analyses.push(full_analysis(&mut wiki, &registry, page)?);
        }
        if context.json {
            return print_json(&analyses);
        }
        for analysis in &analyses {
            println!("title: {}", analysis.title);
            println!("links: {}", analysis.links.len());
            println!(
                "disambiguation_links: {}",
                analysis.disambiguation_links.join(", ")
            );
            println!("findings: {}", analysis.check.findings.len());
        }
        return Ok(());
    }

    let mut options = BotOptions::from_config(&context.config, args.algorithms);
    options.dry_run = args.dry_run;
    let report = automatic_fix(&mut wiki, &registry, &pages, &options)?;
    if context.json {
        return print_json(&report);
    }
    println!("analyzed: {}", report.analyzed);
    println!("modified: {}", report.modified);
    println!("marked: {}", report.marked);
    println!("marked_other: {}", report.marked_other);
    println!("skipped: {}", report.skipped);
    println!("failed: {}", report.failed);
    Ok(())
}

fn run_expand(context: &AppContext, args: ExpandArgs) -> Result<()> {
    let mut wiki = connect_wiki(context)?;
    let text = match &args.text {
        Some(path) => read_text_file(path)?,
        None => fetch_page_text(&mut wiki, &args.title)?,
    };
    let output = if args.html {
        wiki.parse_text(&args.title, &text)?
    } else {
        wiki.expand_templates(&args.title, &text)?
    };
    match output {
        Some(output) => println!("{output}"),
        None => bail!("operation stopped before completion"),
    }
    Ok(())
}

fn load_source(context: &AppContext, source: &SourceArgs) -> Result<(String, String)> {
    match (&source.path, &source.title) {
        (Some(_), Some(_)) => bail!("pass either a FILE or --title, not both"),
        (Some(path), None) => Ok((normalize_path(path), read_text_file(path)?)),
        (None, Some(title)) => {
            let mut wiki = connect_wiki(context)?;
            let text = fetch_page_text(&mut wiki, title)?;
            Ok((title.clone(), text))
        }
        (None, None) => bail!("missing input: pass a FILE or --title"),
    }
}

fn fetch_page_text(wiki: &mut MediaWiki, title: &str) -> Result<String> {
    let page = wiki.page(title);
    warn_if_stopped(wiki.retrieve_contents(&[page])?);
    wiki.store()
        .page(page)
        .contents
        .clone()
        .with_context(|| format!("page {title} does not exist"))
}

fn read_text_file(path: &Path) -> Result<String> {
    fs::read_to_string(path).with_context(|| format!("failed to read {}", path.display()))
}

fn connect_wiki(context: &AppContext) -> Result<MediaWiki> {
    if context.config.api_url().is_none() {
        bail!("no wiki configured: set WIKI_API_URL or [wiki] api_url in {DEFAULT_CONFIG_PATH}");
    }
    let gateway = MediaWikiGateway::connect(GatewayConfig::from_config(&context.config))?;
    Ok(MediaWiki::new(
        Arc::new(gateway),
        PageStore::new(Arc::clone(&context.site)),
        context.config.workers(),
    ))
}

fn registry_with_only(only: &[u32]) -> CheckRegistry {
    let mut registry = CheckRegistry::with_default_algorithms();
    if only.is_empty() {
        return registry;
    }
    let ids: Vec<u32> = registry.algorithms().map(|algorithm| algorithm.id()).collect();
    for id in ids {
        if !only.contains(&id) {
            registry.disable(id);
        }
    }
    registry
}

fn print_check_run(analysis: &PageAnalysis, run: &CheckRun) {
    println!("findings: {}", run.findings.len());
    for finding in &run.findings {
        let excerpt = finding.span.slice(analysis.text());
        println!(
            "  [{}] {}..{} {}",
            finding.algorithm_id, finding.span.begin, finding.span.end, finding.reason
        );
        println!("      {}", excerpt.lines().next().unwrap_or(""));
        for replacement in &finding.replacements {
            println!(
                "      -> {}{}",
                replacement.text,
                if replacement.automatic {
                    " (automatic)"
                } else {
                    ""
                }
            );
        }
    }
    for failure in &run.failures {
        println!("failure: [{}] {}", failure.id, failure.message);
    }
}

fn describe_applied(registry: &CheckRegistry, ids: &[u32]) -> String {
    ids.iter()
        .filter_map(|id| registry.get(*id))
        .map(|algorithm| algorithm.short_description().to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

fn warn_if_stopped(status: DrainStatus) {
    if status == DrainStatus::Stopped {
        tracing::warn!("operation stopped before completion; results are partial");
    }
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<()> {
    println!(
        "{}",
        serde_json::to_string_pretty(value).context("failed to serialize output")?
    );
    Ok(())
}

fn format_ids(ids: &[u32]) -> String {
    if ids.is_empty() {
        return "none".to_string();
    }
    ids.iter()
        .map(|id| id.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

fn normalize_path(path: &Path) -> String {
    path.to_string_lossy().replace('\\', "/")
}

#[cfg(test)]
mod tests {
    use clap::Parser;

    use super::{Cli, Commands, format_ids, registry_with_only};

    #[test]
    fn parses_check_with_algorithm_filter() {
        let cli = Cli::try_parse_from(["wikiclean", "check", "page.wiki", "--only", "7,64"])
            .expect("parse");
        let Some(Commands::Check(args)) = cli.command else {
            panic!("expected check command");
        };
        assert_eq!(args.only, vec![7, 64]);
        assert!(args.source.path.is_some());
    }

    #[test]
    fn bot_requires_algorithms() {
        assert!(Cli::try_parse_from(["wikiclean", "bot", "Paris"]).is_err());
        assert!(Cli::try_parse_from(["wikiclean", "bot", "Paris", "--algorithm", "64"]).is_ok());
    }

    #[test]
    fn relink_takes_titles_or_a_file() {
        let cli = Cli::try_parse_from([
            "wikiclean", "relink", "Paris", "Lyon", "--from", "Mercury", "--to", "Mercury (planet)",
        ])
        .expect("parse");
        let Some(Commands::Relink(args)) = cli.command else {
            panic!("expected relink command");
        };
        assert_eq!(args.titles, vec!["Paris", "Lyon"]);
        assert_eq!(args.to, "Mercury (planet)");
        assert!(args.file.is_none());

        assert!(
            Cli::try_parse_from(["wikiclean", "relink", "--file", "a.wiki", "--from", "A", "--to", "B"])
                .is_ok()
        );
        assert!(Cli::try_parse_from(["wikiclean", "relink", "--from", "A", "--to", "B"]).is_err());
        assert!(Cli::try_parse_from(["wikiclean", "relink", "Paris", "--from", "A"]).is_err());
    }

    #[test]
    fn only_filter_disables_other_algorithms() {
        let registry = registry_with_only(&[64]);
        assert!(registry.is_enabled(64));
        assert!(!registry.is_enabled(7));
    }

    #[test]
    fn formats_id_lists() {
        assert_eq!(format_ids(&[]), "none");
        assert_eq!(format_ids(&[7, 64]), "7, 64");
    }
}
