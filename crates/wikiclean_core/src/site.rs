use serde::{Deserialize, Serialize};

pub const NS_MAIN: i32 = 0;
pub const NS_USER: i32 = 2;
pub const NS_PROJECT: i32 = 4;
pub const NS_FILE: i32 = 6;
pub const NS_MEDIAWIKI: i32 = 8;
pub const NS_TEMPLATE: i32 = 10;
pub const NS_HELP: i32 = 12;
pub const NS_CATEGORY: i32 = 14;
pub const NS_MODULE: i32 = 828;

/// Protocols that turn `[[...]]` or `[...]` content into an external link.
pub const EXTERNAL_PROTOCOLS: &[&str] = &[
    "http://", "https://", "ftp://", "ftps://", "irc://", "ircs://", "news:", "mailto:",
    "gopher://", "telnet://", "sftp://", "svn://", "git://", "//",
];

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
pub struct NamespaceDef {
    pub id: i32,
    pub name: String,
    #[serde(default)]
    pub aliases: Vec<String>,
}

impl NamespaceDef {
    pub fn new(id: i32, name: &str, aliases: &[&str]) -> Self {
        Self {
            id,
            name: name.to_string(),
            aliases: aliases.iter().map(|alias| alias.to_string()).collect(),
        }
    }

    /// Whether `prefix` names this namespace (canonical name or alias).
    pub fn is_possible_name(&self, prefix: &str) -> bool {
        let normalized = normalize_title(prefix);
        if normalized.is_empty() {
            return false;
        }
        normalized.eq_ignore_ascii_case(&self.name)
            || self
                .aliases
                .iter()
                .any(|alias| normalized.eq_ignore_ascii_case(alias))
    }
}

/// Namespace tables, interwiki prefixes and language codes of one wiki.
///
/// The analyzer consults it to decide whether a colon-prefixed link target is
/// a category, a file, an interwiki or a language link.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
pub struct SiteConfig {
    #[serde(default = "default_namespaces")]
    pub namespaces: Vec<NamespaceDef>,
    #[serde(default = "default_interwikis")]
    pub interwikis: Vec<String>,
    #[serde(default = "default_languages")]
    pub languages: Vec<String>,
}

impl Default for SiteConfig {
    fn default() -> Self {
        Self {
            namespaces: default_namespaces(),
            interwikis: default_interwikis(),
            languages: default_languages(),
        }
    }
}

impl SiteConfig {
    pub fn namespace(&self, id: i32) -> Option<&NamespaceDef> {
        self.namespaces.iter().find(|namespace| namespace.id == id)
    }

    pub fn namespace_by_prefix(&self, prefix: &str) -> Option<&NamespaceDef> {
        self.namespaces
            .iter()
            .find(|namespace| namespace.is_possible_name(prefix))
    }

    pub fn is_namespace(&self, id: i32, prefix: &str) -> bool {
        self.namespace(id)
            .is_some_and(|namespace| namespace.is_possible_name(prefix))
    }

    pub fn is_interwiki(&self, prefix: &str) -> bool {
        let trimmed = prefix.trim();
        self.interwikis
            .iter()
            .any(|interwiki| interwiki.eq_ignore_ascii_case(trimmed))
    }

    pub fn is_language(&self, prefix: &str) -> bool {
        let trimmed = prefix.trim();
        self.languages.iter().any(|code| code == trimmed)
    }

    /// Namespace id of a (possibly unnormalized) title.
    pub fn namespace_of(&self, title: &str) -> i32 {
        match title.split_once(':') {
            Some((prefix, _)) => self
                .namespace_by_prefix(prefix)
                .map(|namespace| namespace.id)
                .unwrap_or(NS_MAIN),
            None => NS_MAIN,
        }
    }

    /// Normalize a title and rewrite a known namespace prefix to its
    /// canonical name: `category:foo_bar` becomes `Category:Foo bar`.
    pub fn canonical_title(&self, title: &str) -> String {
        let normalized = normalize_title(title);
        if let Some((prefix, rest)) = normalized.split_once(':')
            && let Some(namespace) = self.namespace_by_prefix(prefix)
            && namespace.id != NS_MAIN
        {
            let body = normalize_title(rest);
            if !body.is_empty() {
                return format!("{}:{body}", namespace.name);
            }
        }
        normalized
    }
}

fn default_namespaces() -> Vec<NamespaceDef> {
    vec![
        NamespaceDef::new(NS_MAIN, "", &[]),
        NamespaceDef::new(NS_USER, "User", &[]),
        NamespaceDef::new(NS_PROJECT, "Wikipedia", &["Project", "WP"]),
        NamespaceDef::new(NS_FILE, "File", &["Image"]),
        NamespaceDef::new(NS_MEDIAWIKI, "MediaWiki", &[]),
        NamespaceDef::new(NS_TEMPLATE, "Template", &[]),
        NamespaceDef::new(NS_HELP, "Help", &[]),
        NamespaceDef::new(NS_CATEGORY, "Category", &[]),
        NamespaceDef::new(NS_MODULE, "Module", &[]),
    ]
}

fn default_interwikis() -> Vec<String> {
    [
        "commons",
        "d",
        "m",
        "meta",
        "mw",
        "q",
        "s",
        "species",
        "v",
        "voy",
        "wikibooks",
        "wikidata",
        "wikinews",
        "wikiquote",
        "wikisource",
        "wikiversity",
        "wikivoyage",
        "wikt",
        "wiktionary",
    ]
    .iter()
    .map(|value| value.to_string())
    .collect()
}

fn default_languages() -> Vec<String> {
    [
        "ar", "bg", "ca", "cs", "da", "de", "el", "en", "eo", "es", "et", "eu", "fa", "fi", "fr",
        "gl", "he", "hi", "hr", "hu", "id", "it", "ja", "ko", "lt", "ms", "nl", "nn", "no", "pl",
        "pt", "ro", "ru", "simple", "sk", "sl", "sr", "sv", "th", "tr", "uk", "vi", "zh",
    ]
    .iter()
    .map(|value| value.to_string())
    .collect()
}

/// Collapse underscores and whitespace runs to single spaces, trim, and
/// upper-case the first character.
pub fn normalize_title(title: &str) -> String {
    let mut output = String::with_capacity(title.len());
    let mut previous_was_space = false;

    for ch in title.chars() {
        if ch.is_whitespace() || ch == '_' || ch == '\u{a0}' {
            if !previous_was_space {
                output.push(' ');
                previous_was_space = true;
            }
        } else {
            output.push(ch);
            previous_was_space = false;
        }
    }

    ucfirst(output.trim())
}

pub fn are_same_title(left: &str, right: &str) -> bool {
    normalize_title(left) == normalize_title(right)
}

fn ucfirst(value: &str) -> String {
    let mut chars = value.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_title_collapses_spaces_and_capitalizes() {
        assert_eq!(normalize_title("  foo__bar  baz "), "Foo bar baz");
        assert_eq!(normalize_title("élan"), "Élan");
        assert_eq!(normalize_title(""), "");
    }

    #[test]
    fn same_title_ignores_underscores_and_first_letter_case() {
        assert!(are_same_title("paris", "Paris"));
        assert!(are_same_title("New_York", "New York"));
        assert!(!are_same_title("Paris", "paris, Texas"));
    }

    #[test]
    fn namespace_aliases_are_recognized() {
        let site = SiteConfig::default();
        assert!(site.is_namespace(NS_FILE, "Image"));
        assert!(site.is_namespace(NS_FILE, "file"));
        assert!(site.is_namespace(NS_CATEGORY, "category"));
        assert!(!site.is_namespace(NS_CATEGORY, "Catgory"));
        assert_eq!(site.namespace_of("Template:Cite book"), NS_TEMPLATE);
        assert_eq!(site.namespace_of("Star Wars: Episode IV"), NS_MAIN);
    }

    #[test]
    fn canonical_title_rewrites_namespace_prefix() {
        let site = SiteConfig::default();
        assert_eq!(site.canonical_title("category:foo_bar"), "Category:Foo bar");
        assert_eq!(site.canonical_title("image:x.jpg"), "File:X.jpg");
        assert_eq!(site.canonical_title("paris"), "Paris");
    }

    #[test]
    fn interwiki_and_language_lookup() {
        let site = SiteConfig::default();
        assert!(site.is_interwiki("wikt"));
        assert!(site.is_interwiki("Commons"));
        assert!(site.is_language("fr"));
        assert!(!site.is_language("FR"));
    }
}
