use std::collections::BTreeSet;
use std::sync::Arc;

use anyhow::{Context, Result};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::analysis::{PageAnalysis, Span, create_internal_link};
use crate::check::{CheckRegistry, CheckRun, apply_edits};
use crate::config::WikicleanConfig;
use crate::mediawiki::{MediaWiki, create_update_page_comment};
use crate::orchestrator::DrainStatus;
use crate::page::{DisambiguationStatus, PageId};
use crate::site::{NS_MAIN, SiteConfig, are_same_title};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BotOptions {
    /// Algorithms the run is about. Other algorithms still fix whatever
    /// they can on pages that get written.
    pub selected: Vec<u32>,
    pub comment: String,
    pub nobot_templates: Vec<String>,
    /// Analyze and fix without writing.
    pub dry_run: bool,
}

impl BotOptions {
    pub fn from_config(config: &WikicleanConfig, selected: Vec<u32>) -> Self {
        Self {
            selected,
            comment: config.bot_comment().to_string(),
            nobot_templates: config.nobot_templates(),
            dry_run: false,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BotReport {
    pub analyzed: usize,
    pub modified: usize,
    /// Pages where a selected algorithm no longer detects anything after
    /// the write.
    pub marked: usize,
    /// Pages where only non-selected algorithms were fixed for good.
    pub marked_other: usize,
    pub skipped: usize,
    pub failed: usize,
}

/// Fix `pages` with every registered algorithm, writing only pages on which
/// a selected algorithm was actually fixed.
pub fn automatic_fix(
    wiki: &mut MediaWiki,
    registry: &CheckRegistry,
    pages: &[PageId],
    options: &BotOptions,
) -> Result<BotReport> {
    let mut report = BotReport::default();
    let status = wiki
        .retrieve_contents(pages)
        .context("failed to retrieve page contents")?;
    if status == DrainStatus::Stopped {
        return Ok(report);
    }
    let site = Arc::clone(wiki.store().site());
    let selected: BTreeSet<u32> = options.selected.iter().copied().collect();

    for page in pages {
        let title = wiki.store().title(*page).to_string();
        let Some(contents) = wiki.store().page(*page).contents.clone() else {
            debug!("{title}: missing page skipped");
            report.skipped += 1;
            continue;
        };
        report.analyzed += 1;

        let analysis = PageAnalysis::new(contents.as_str(), Arc::clone(&site));
        if carries_nobot_template(&analysis, &options.nobot_templates) {
            debug!("{title}: nobots template present");
            report.skipped += 1;
            continue;
        }

        let detected = detect_selected(registry, &analysis, &selected);
        if detected.is_empty() {
            continue;
        }

        let outcome = registry.fix_all(&contents, &site, None);
        let fixed_selected: Vec<u32> = outcome
            .applied
            .iter()
            .copied()
            .filter(|id| selected.contains(id))
            .collect();
        if fixed_selected.is_empty() {
            debug!("{title}: detected {detected:?} but nothing could be fixed");
            continue;
        }

        if !options.dry_run {
            let comment = create_update_page_comment(
                &options.comment,
                &describe_algorithms(registry, &outcome.applied),
            );
            match wiki.update_page(*page, &outcome.text, &comment, false) {
                Ok(Some(result)) if result.changed => {}
                Ok(Some(_)) => continue,
                Ok(None) => break,
                Err(error) => {
                    warn!("{title}: write failed: {error}");
                    report.failed += 1;
                    continue;
                }
            }
        }
        report.modified += 1;

        let (marked, marked_other) =
            recheck_applied(registry, &outcome.text, &site, &outcome.applied, &selected);
        if marked {
            report.marked += 1;
        } else if marked_other {
            report.marked_other += 1;
        }
    }

    info!(
        "bot run: {} analyzed, {} modified, {} marked, {} skipped, {} failed",
        report.analyzed, report.modified, report.marked, report.skipped, report.failed
    );
    Ok(report)
}

#[derive(Debug, Clone, Serialize)]
pub struct FullAnalysis {
    pub title: String,
    pub exists: Option<bool>,
    pub links: Vec<String>,
    /// Links leading (possibly through redirects) to disambiguation pages.
    pub disambiguation_links: Vec<String>,
    pub check: CheckRun,
}

/// Contents, main-namespace links with their disambiguation status, and a
/// check run over the page.
pub fn full_analysis(
    wiki: &mut MediaWiki,
    registry: &CheckRegistry,
    page: PageId,
) -> Result<FullAnalysis> {
    let title = wiki.store().title(page).to_string();
    wiki.retrieve_contents(&[page])
        .with_context(|| format!("failed to retrieve contents of {title}"))?;
    wiki.retrieve_links(&[page], Some(NS_MAIN))
        .with_context(|| format!("failed to retrieve links of {title}"))?;
    let links = wiki.store().page(page).links.clone();
    wiki.retrieve_disambiguation_information(&links, true)
        .with_context(|| format!("failed to retrieve disambiguation status for {title}"))?;

    let store = wiki.store();
    let disambiguation_links: Vec<String> = links
        .iter()
        .filter(|link| {
            let destination = store.redirect_destination(**link);
            store.page(destination).disambiguation == DisambiguationStatus::Yes
        })
        .map(|link| store.title(*link).to_string())
        .collect();

    let entry = store.page(page);
    let analysis = PageAnalysis::new(
        entry.contents.clone().unwrap_or_default(),
        Arc::clone(store.site()),
    );
    Ok(FullAnalysis {
        title,
        exists: entry.exists,
        links: store.titles(&links),
        disambiguation_links,
        check: registry.run_all(&analysis, false),
    })
}

/// Rewrite every internal link to `from` as a link to `to`, keeping the
/// text readers see. Every other byte of the page is left as is.
pub fn replace_all_links(analysis: &PageAnalysis, from: &str, to: &str) -> String {
    apply_edits(analysis.text(), link_replacements(analysis, from, to))
}

fn link_replacements(analysis: &PageAnalysis, from: &str, to: &str) -> Vec<(Span, String)> {
    analysis
        .internal_links()
        .iter()
        .filter(|link| are_same_title(&link.target, from))
        .map(|link| {
            let display = link.display_text();
            let replacement = match link.anchor_raw.as_deref() {
                Some(anchor) => format!("[[{to}#{anchor}|{display}]]"),
                None => create_internal_link(to, None, Some(&display)),
            };
            (link.span, replacement)
        })
        .collect()
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelinkOptions {
    pub from: String,
    pub to: String,
    pub comment: String,
    pub nobot_templates: Vec<String>,
    pub dry_run: bool,
}

impl RelinkOptions {
    pub fn from_config(
        config: &WikicleanConfig,
        from: impl Into<String>,
        to: impl Into<String>,
    ) -> Self {
        Self {
            from: from.into(),
            to: to.into(),
            comment: config.bot_comment().to_string(),
            nobot_templates: config.nobot_templates(),
            dry_run: false,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RelinkReport {
    pub analyzed: usize,
    pub modified: usize,
    pub links_replaced: usize,
    pub skipped: usize,
    pub failed: usize,
}

/// Point the links of `pages` to `options.from` at `options.to`, typically
/// to resolve a link to a disambiguation page.
pub fn relink_pages(
    wiki: &mut MediaWiki,
    pages: &[PageId],
    options: &RelinkOptions,
) -> Result<RelinkReport> {
    let mut report = RelinkReport::default();
    let status = wiki
        .retrieve_contents(pages)
        .context("failed to retrieve page contents")?;
    if status == DrainStatus::Stopped {
        return Ok(report);
    }
    let site = Arc::clone(wiki.store().site());
    let comment = create_update_page_comment(
        &options.comment,
        &format!("link to {} replaced by {}", options.from, options.to),
    );

    for page in pages {
        let title = wiki.store().title(*page).to_string();
        let Some(contents) = wiki.store().page(*page).contents.clone() else {
            report.skipped += 1;
            continue;
        };
        report.analyzed += 1;
        let analysis = PageAnalysis::new(contents.as_str(), Arc::clone(&site));
        if carries_nobot_template(&analysis, &options.nobot_templates) {
            debug!("{title}: nobots template present");
            report.skipped += 1;
            continue;
        }
        let edits = link_replacements(&analysis, &options.from, &options.to);
        if edits.is_empty() {
            continue;
        }
        let replaced = edits.len();
        let text = apply_edits(&contents, edits);

        if !options.dry_run {
            match wiki.update_page(*page, &text, &comment, false) {
                Ok(Some(result)) if result.changed => {}
                Ok(Some(_)) => continue,
                Ok(None) => break,
                Err(error) => {
                    warn!("{title}: write failed: {error}");
                    report.failed += 1;
                    continue;
                }
            }
        }
        report.modified += 1;
        report.links_replaced += replaced;
    }

    info!(
        "relink {} -> {}: {} analyzed, {} modified, {} links",
        options.from, options.to, report.analyzed, report.modified, report.links_replaced
    );
    Ok(report)
}

fn carries_nobot_template(analysis: &PageAnalysis, nobot_templates: &[String]) -> bool {
    analysis.templates().iter().any(|template| {
        nobot_templates
            .iter()
            .any(|name| are_same_title(&template.name, name))
    })
}

fn detect_selected(
    registry: &CheckRegistry,
    analysis: &PageAnalysis,
    selected: &BTreeSet<u32>,
) -> Vec<u32> {
    let mut detected = Vec::new();
    for id in selected {
        match registry.run(*id, analysis, true) {
            Ok(findings) if !findings.is_empty() => detected.push(*id),
            Ok(_) => {}
            Err(failure) => warn!("check algorithm {id} skipped: {}", failure.message),
        }
    }
    detected
}

/// Whether a selected (first) or another (second) applied algorithm no
/// longer detects anything on the new text.
fn recheck_applied(
    registry: &CheckRegistry,
    text: &str,
    site: &Arc<SiteConfig>,
    applied: &[u32],
    selected: &BTreeSet<u32>,
) -> (bool, bool) {
    let analysis = PageAnalysis::new(text, Arc::clone(site));
    let mut marked = false;
    let mut marked_other = false;
    for id in applied {
        let clean = matches!(registry.run(*id, &analysis, false), Ok(findings) if findings.is_empty());
        if !clean {
            continue;
        }
        if selected.contains(id) {
            marked = true;
        } else {
            marked_other = true;
        }
    }
    (marked, marked_other)
}

fn describe_algorithms(registry: &CheckRegistry, ids: &[u32]) -> String {
    ids.iter()
        .filter_map(|id| registry.get(*id))
        .map(|algorithm| format!("{} (#{})", algorithm.short_description(), algorithm.id()))
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};

    use super::{
        BotOptions, RelinkOptions, automatic_fix, full_analysis, relink_pages, replace_all_links,
    };
    use crate::analysis::{PageAnalysis, PageElement};
    use crate::check::CheckRegistry;
    use crate::gateway::{
        DisambiguationReport, Gateway, GatewayResult, LinkedPage, PageContent, WriteResult,
    };
    use crate::mediawiki::MediaWiki;
    use crate::page::PageStore;
    use crate::site::SiteConfig;

    #[derive(Default)]
    struct MockApi {
        contents: BTreeMap<String, String>,
        writes: Mutex<Vec<(String, String, String)>>,
        request_count: AtomicUsize,
    }

    impl Gateway for MockApi {
        fn max_pages_per_query(&self) -> usize {
            50
        }

        fn fetch_content(&self, title: &str) -> GatewayResult<Option<PageContent>> {
            self.request_count.fetch_add(1, Ordering::SeqCst);
            Ok(self.contents.get(title).map(|text| PageContent {
                title: title.to_string(),
                namespace: 0,
                revision_id: Some(1),
                timestamp: None,
                text: text.clone(),
            }))
        }

        fn fetch_links(&self, _: &str, _: Option<i32>) -> GatewayResult<Vec<LinkedPage>> {
            Ok(vec![
                LinkedPage::new("Paris", 0),
                LinkedPage::new("Mercury", 0),
            ])
        }

        fn fetch_backlinks(&self, _: &str, _: bool) -> GatewayResult<Vec<LinkedPage>> {
            Ok(Vec::new())
        }

        fn fetch_templates(&self, _: &str) -> GatewayResult<Vec<String>> {
            Ok(Vec::new())
        }

        fn fetch_embedded_in(&self, _: &str, _: &[i32]) -> GatewayResult<Vec<String>> {
            Ok(Vec::new())
        }

        fn fetch_disambiguation_status(
            &self,
            titles: &[String],
        ) -> GatewayResult<DisambiguationReport> {
            let mut report = DisambiguationReport::default();
            for title in titles {
                report.statuses.insert(title.clone(), title == "Mercury");
            }
            Ok(report)
        }

        fn write_page(
            &self,
            title: &str,
            text: &str,
            comment: &str,
            _: bool,
        ) -> GatewayResult<WriteResult> {
            self.writes.lock().expect("writes").push((
                title.to_string(),
                text.to_string(),
                comment.to_string(),
            ));
            Ok(WriteResult {
                title: title.to_string(),
                new_revision_id: Some(2),
                changed: true,
            })
        }

        fn expand_templates(&self, _: &str, text: &str) -> GatewayResult<String> {
            Ok(text.to_string())
        }

        fn parse_to_html(&self, _: &str, text: &str) -> GatewayResult<String> {
            Ok(text.to_string())
        }

        fn request_count(&self) -> usize {
            self.request_count.load(Ordering::SeqCst)
        }
    }

    fn options(selected: Vec<u32>) -> BotOptions {
        BotOptions {
            selected,
            comment: "Cleanup".to_string(),
            nobot_templates: vec!["Nobots".to_string()],
            dry_run: false,
        }
    }

    fn wiki(api: &Arc<MockApi>) -> MediaWiki {
        MediaWiki::new(
            api.clone(),
            PageStore::new(Arc::new(SiteConfig::default())),
            2,
        )
    }

    #[test]
    fn writes_pages_fixed_by_a_selected_algorithm() {
        let mut api = MockApi::default();
        api.contents
            .insert("A".to_string(), "[[Foo|Foo]] and [[Bar|Bar]]\n".to_string());
        api.contents
            .insert("B".to_string(), "{{nobots}}\n[[Foo|Foo]]\n".to_string());
        api.contents
            .insert("C".to_string(), "Nothing to do.\n".to_string());
        let api = Arc::new(api);
        let mut wiki = wiki(&api);
        let pages = vec![wiki.page("A"), wiki.page("B"), wiki.page("C"), wiki.page("Gone")];

        let report = automatic_fix(
            &mut wiki,
            &CheckRegistry::with_default_algorithms(),
            &pages,
            &options(vec![64]),
        )
        .expect("bot run");

        assert_eq!(report.analyzed, 3);
        assert_eq!(report.skipped, 2);
        assert_eq!(report.modified, 1);
        assert_eq!(report.marked, 1);
        assert_eq!(report.failed, 0);
        let writes = api.writes.lock().expect("writes");
        assert_eq!(writes.len(), 1);
        assert_eq!(writes[0].0, "A");
        assert_eq!(writes[0].1, "[[Foo]] and [[Bar]]\n");
        assert!(writes[0].2.starts_with("Cleanup - "));
        assert!(writes[0].2.contains("#64"));
    }

    #[test]
    fn unselected_findings_do_not_trigger_writes() {
        let mut api = MockApi::default();
        api.contents
            .insert("A".to_string(), "[[Foo|Foo]]\n".to_string());
        let api = Arc::new(api);
        let mut wiki = wiki(&api);
        let pages = vec![wiki.page("A")];

        let report = automatic_fix(
            &mut wiki,
            &CheckRegistry::with_default_algorithms(),
            &pages,
            &options(vec![17]),
        )
        .expect("bot run");
        assert_eq!(report.analyzed, 1);
        assert_eq!(report.modified, 0);
        assert!(api.writes.lock().expect("writes").is_empty());
    }

    #[test]
    fn full_analysis_reports_disambiguation_links() {
        let mut api = MockApi::default();
        api.contents
            .insert("A".to_string(), "[[Paris]] and [[Mercury]]\n".to_string());
        let api = Arc::new(api);
        let mut wiki = wiki(&api);
        let page = wiki.page("A");

        let analysis = full_analysis(&mut wiki, &CheckRegistry::with_default_algorithms(), page)
            .expect("analysis");
        assert_eq!(analysis.exists, Some(true));
        assert_eq!(analysis.links, vec!["Paris", "Mercury"]);
        assert_eq!(analysis.disambiguation_links, vec!["Mercury"]);
        assert!(analysis.check.findings.is_empty());
    }

    #[test]
    fn replaces_links_keeping_displayed_text() {
        let text = "See [[Mercury]], [[mercury|the planet]], [[Mercury#Orbit]], \
                    [[Venus|Mercury]] and [[Mercury (planet)]].";
        let analysis = PageAnalysis::new(text, Arc::new(SiteConfig::default()));
        let replaced = replace_all_links(&analysis, "Mercury", "Mercury (planet)");
        assert_eq!(
            replaced,
            "See [[Mercury (planet)|Mercury]], [[Mercury (planet)|the planet]], \
             [[Mercury (planet)#Orbit|Mercury#Orbit]], [[Venus|Mercury]] and [[Mercury (planet)]]."
        );

        let after = PageAnalysis::new(replaced.as_str(), Arc::new(SiteConfig::default()));
        assert!(after.internal_links().iter().all(|link| link.target != "Mercury"));
        let untouched: Vec<String> = after
            .internal_links()
            .iter()
            .filter(|link| link.target != "Mercury (planet)")
            .map(|link| link.to_wikitext())
            .collect();
        assert_eq!(untouched, vec!["[[Venus|Mercury]]"]);
        assert!(replaced.ends_with("[[Venus|Mercury]] and [[Mercury (planet)]]."));
    }

    #[test]
    fn page_without_matching_links_is_unchanged() {
        let text = "[[Paris]] {{cite|[[Lyon]]}}";
        let analysis = PageAnalysis::new(text, Arc::new(SiteConfig::default()));
        assert_eq!(replace_all_links(&analysis, "Mercury", "Mercury (planet)"), text);
    }

    #[test]
    fn relinks_pages_and_writes_changes() {
        let mut api = MockApi::default();
        api.contents
            .insert("A".to_string(), "[[Mercury]] and [[Mercury]]\n".to_string());
        api.contents
            .insert("B".to_string(), "{{nobots}} [[Mercury]]\n".to_string());
        api.contents
            .insert("C".to_string(), "[[Paris]]\n".to_string());
        let api = Arc::new(api);
        let mut wiki = wiki(&api);
        let pages = vec![wiki.page("A"), wiki.page("B"), wiki.page("C")];
        let options = RelinkOptions {
            from: "Mercury".to_string(),
            to: "Mercury (planet)".to_string(),
            comment: "Cleanup".to_string(),
            nobot_templates: vec!["Nobots".to_string()],
            dry_run: false,
        };

        let report = relink_pages(&mut wiki, &pages, &options).expect("relink");

        assert_eq!(report.analyzed, 3);
        assert_eq!(report.skipped, 1);
        assert_eq!(report.modified, 1);
        assert_eq!(report.links_replaced, 2);
        let writes = api.writes.lock().expect("writes");
        assert_eq!(writes.len(), 1);
        assert_eq!(
            writes[0].1,
            "[[Mercury (planet)|Mercury]] and [[Mercury (planet)|Mercury]]\n"
        );
        assert_eq!(
            writes[0].2,
            "Cleanup - link to Mercury replaced by Mercury (planet)"
        );
    }
}
