use emporia_shared::Site;

/// Sites served by this process, resolved from the request's Host header.
#[derive(Debug, Clone, Default)]
pub struct SiteRegistry {
    sites: Vec<Site>,
}

impl SiteRegistry {
    pub fn new(sites: Vec<Site>) -> Self {
        Self { sites }
    }

    /// Site whose domain matches `host` (port ignored), else the first site.
    pub fn resolve(&self, host: Option<&str>) -> Option<&Site> {
        let domain = host.map(|h| h.split(':').next().unwrap_or(h));
        domain
            .and_then(|d| self.sites.iter().find(|s| s.domain.eq_ignore_ascii_case(d)))
            .or_else(|| self.sites.first())
    }

    pub fn len(&self) -> usize {
        self.sites.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sites.is_empty()
    }
}
