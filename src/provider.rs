//! Streaming provider identification.

use std::fmt;

/// A streaming service with a bespoke ad strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Provider {
    /// Ad-break marker, fixed fast-forward window.
    Netflix,
    /// Countdown label, exact position jump.
    PrimeVideo,
    /// Playhead class mutations, accelerate and mute.
    Hulu,
    /// Badge plus countdown label, exact position jump.
    DisneyPlus,
}

/// Match order matters: the first provider whose needle occurs in the origin wins.
const ORIGIN_NEEDLES: &[(Provider, &[&str])] = &[
    (Provider::PrimeVideo, &["amazon", "primevideo"]),
    (Provider::Netflix, &["netflix"]),
    (Provider::Hulu, &["hulu"]),
    (Provider::DisneyPlus, &["disneyplus"]),
];

impl Provider {
    pub const ALL: [Provider; 4] = [
        Provider::Netflix,
        Provider::PrimeVideo,
        Provider::Hulu,
        Provider::DisneyPlus,
    ];

    /// Resolve a provider from a page host name.
    ///
    /// Case-insensitive substring match against a fixed list.
    pub fn from_origin(origin: &str) -> Option<Self> {
        let origin = origin.to_lowercase();
        ORIGIN_NEEDLES
            .iter()
            .find(|(_, needles)| needles.iter().any(|n| origin.contains(n)))
            .map(|(provider, _)| *provider)
    }

    /// Resolve a provider from a full page URL.
    pub fn from_url(url: &str) -> Option<Self> {
        let parsed = url::Url::parse(url).ok()?;
        Self::from_origin(parsed.host_str()?)
    }

    /// Short lowercase name.
    pub fn name(self) -> &'static str {
        match self {
            Provider::Netflix => "netflix",
            Provider::PrimeVideo => "primevideo",
            Provider::Hulu => "hulu",
            Provider::DisneyPlus => "disneyplus",
        }
    }

    /// Domains that resolve to this provider.
    pub fn domains(self) -> &'static [&'static str] {
        for (provider, needles) in ORIGIN_NEEDLES {
            if *provider == self {
                return needles;
            }
        }
        &[]
    }
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
