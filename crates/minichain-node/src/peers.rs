use std::collections::BTreeSet;

/// Trailing-slash-insensitive peer identity.
pub fn normalize(url: &str) -> String {
    url.trim().trim_end_matches('/').to_string()
}

/// Known peers: statically configured ones from the command line plus
/// dynamically registered ones, deduplicated by normalized URL. Static
/// peers cannot be unregistered.
#[derive(Debug, Default)]
pub struct PeerRegistry {
    static_peers: BTreeSet<String>,
    dynamic_peers: BTreeSet<String>,
}

impl PeerRegistry {
    pub fn new(static_peers: impl IntoIterator<Item = String>) -> Self {
        Self {
            static_peers: static_peers
                .into_iter()
                .map(|url| normalize(&url))
                .filter(|url| !url.is_empty())
                .collect(),
            dynamic_peers: BTreeSet::new(),
        }
    }

    /// Returns false for empty URLs and duplicates.
    pub fn register(&mut self, url: &str) -> bool {
        let url = normalize(url);
        if url.is_empty() || self.static_peers.contains(&url) {
            return false;
        }
        self.dynamic_peers.insert(url)
    }

    /// No-op on static peers.
    pub fn unregister(&mut self, url: &str) -> bool {
        self.dynamic_peers.remove(&normalize(url))
    }

    pub fn all(&self) -> Vec<String> {
        self.static_peers.union(&self.dynamic_peers).cloned().collect()
    }

    /// Every peer except `exclude` (the announcing node itself).
    pub fn all_except(&self, exclude: &str) -> Vec<String> {
        let excluded = normalize(exclude);
        self.all().into_iter().filter(|p| *p != excluded).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalization_dedupes_trailing_slash_variants() {
        let mut peers = PeerRegistry::new(vec!["http://a:1/".to_string()]);
        assert!(!peers.register("http://a:1"));
        assert!(peers.register("http://b:2/"));
        assert!(!peers.register("http://b:2"));
        assert_eq!(peers.all(), vec!["http://a:1", "http://b:2"]);
    }

    #[test]
    fn static_peers_survive_unregister() {
        let mut peers = PeerRegistry::new(vec!["http://a:1".to_string()]);
        assert!(!peers.unregister("http://a:1/"));
        assert_eq!(peers.all(), vec!["http://a:1"]);
    }

    #[test]
    fn dynamic_peers_can_be_unregistered() {
        let mut peers = PeerRegistry::new(Vec::new());
        assert!(peers.register("http://b:2"));
        assert!(peers.unregister("http://b:2/"));
        assert!(peers.all().is_empty());
    }

    #[test]
    fn broadcast_set_excludes_self() {
        let mut peers = PeerRegistry::new(vec!["http://a:1".to_string()]);
        peers.register("http://b:2");
        assert_eq!(peers.all_except("http://a:1/"), vec!["http://b:2"]);
    }

    #[test]
    fn empty_urls_are_rejected() {
        let mut peers = PeerRegistry::new(vec!["  ".to_string()]);
        assert!(!peers.register(""));
        assert!(peers.all().is_empty());
    }
}
