use bimap::BiMap;

/// Translates between the names users put into requests and the canonical resource names of the catalog.
pub trait AliasResolver {
    /// Canonical name for a request name. Names without alias resolve to themselves.
    fn resolve_request_name<'a>(&'a self, name: &'a str) -> &'a str;

    /// Friendly alias of a canonical name, if one is registered.
    fn display_alias(&self, canonical_name: &str) -> Option<&str>;
}

/// Alias table backed by a bidirectional map `alias <-> canonical name`.
#[derive(Debug, Clone, Default)]
pub struct AliasTable {
    aliases: BiMap<String, String>,
}

impl AliasTable {
    pub fn new() -> Self {
        AliasTable { aliases: BiMap::new() }
    }

    /// Registers `alias` for `canonical_name`, replacing earlier mappings of either side.
    pub fn insert(&mut self, alias: impl Into<String>, canonical_name: impl Into<String>) {
        let alias = alias.into();
        let canonical_name = canonical_name.into();
        log::debug!("Alias '{}' now refers to '{}'.", alias, canonical_name);
        self.aliases.insert(alias, canonical_name);
    }

    pub fn remove(&mut self, alias: &str) -> Option<String> {
        self.aliases.remove_by_left(alias).map(|(_, canonical_name)| canonical_name)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &String)> {
        self.aliases.iter()
    }

    pub fn len(&self) -> usize {
        self.aliases.len()
    }

    pub fn is_empty(&self) -> bool {
        self.aliases.is_empty()
    }
}

impl AliasResolver for AliasTable {
    fn resolve_request_name<'a>(&'a self, name: &'a str) -> &'a str {
        self.aliases.get_by_left(name).map(String::as_str).unwrap_or(name)
    }

    fn display_alias(&self, canonical_name: &str) -> Option<&str> {
        self.aliases.get_by_right(canonical_name).map(String::as_str)
    }
}
