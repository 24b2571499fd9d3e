// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Lodestone service orchestration
//!
//! Builds upstream URLs, runs them through the configured fetcher (cached or
//! not) and turns the documents into domain objects.

use std::sync::Arc;
use tracing::{debug, info};
use url::Url;

use super::caching::{CachingFetcher, DocumentCache};
use super::client::{FetchClient, Fetcher};
use super::pagination::{PageAggregator, PagedResource};
use super::parser::{self, Achievement, Character, SearchResult};
use super::types::{LodestoneError, RawResponse};
use crate::config::GatewayConfig;

/// Optional parts of a character that need extra upstream requests
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Features {
    /// Fetch every page of the achievement listing
    pub achievements: bool,
    /// Fetch the class and job listing
    pub class_jobs: bool,
}

/// Achievement listing of one character
pub struct AchievementListing {
    base_url: Url,
    character_id: u64,
}

impl AchievementListing {
    pub fn new(base_url: Url, character_id: u64) -> Self {
        Self {
            base_url,
            character_id,
        }
    }
}

impl PagedResource for AchievementListing {
    type Item = Achievement;

    fn describe(&self) -> String {
        format!("achievements of character {}", self.character_id)
    }

    fn page_url(&self, page: u32) -> Url {
        let mut url = self.base_url.clone();
        url.set_path(&format!(
            "/lodestone/character/{}/achievement/",
            self.character_id
        ));
        if page > 1 {
            url.query_pairs_mut().append_pair("page", &page.to_string());
        }
        url
    }

    fn last_page(&self, first: &RawResponse) -> Option<u32> {
        parser::last_page(&first.text())
    }

    fn parse_page(&self, page: &RawResponse) -> Result<Vec<Achievement>, LodestoneError> {
        Ok(parser::parse_achievements(&page.text()))
    }
}

/// Title-case a world name the way the Lodestone search expects it
fn title_case(s: &str) -> String {
    s.split_whitespace()
        .map(|word| {
            let lower = word.to_lowercase();
            let mut chars = lower.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// Entry point for Lodestone lookups
pub struct LodestoneService {
    base_url: Url,
    fetcher: Arc<dyn Fetcher>,
    aggregator: PageAggregator,
}

impl LodestoneService {
    /// Create a service over an arbitrary fetcher
    pub fn new(base_url: Url, fetcher: Arc<dyn Fetcher>, max_concurrent_pages: usize) -> Self {
        let aggregator = PageAggregator::new(Arc::clone(&fetcher), max_concurrent_pages);
        Self {
            base_url,
            fetcher,
            aggregator,
        }
    }

    /// Create a service from configuration
    ///
    /// When the upstream cache is enabled, every upstream GET goes through
    /// `cache`, which callers may share or inspect.
    pub fn from_config(
        config: &GatewayConfig,
        cache: Arc<DocumentCache>,
    ) -> Result<Self, LodestoneError> {
        let base_url = Url::parse(&config.lodestone_base_url())
            .map_err(|e| LodestoneError::Parse(format!("invalid lodestone url: {}", e)))?;
        let client = FetchClient::new(config.request_timeout)?;

        let fetcher: Arc<dyn Fetcher> = if config.upstream_cache_enabled {
            debug!(
                "Upstream cache enabled (ttl {}s)",
                config.upstream_cache_ttl.as_secs()
            );
            Arc::new(CachingFetcher::new(
                client,
                cache,
                config.upstream_cache_ttl,
            ))
        } else {
            debug!("Upstream cache disabled");
            Arc::new(client)
        };

        Ok(Self::new(base_url, fetcher, config.max_concurrent_pages))
    }

    fn url(&self, path: &str, params: &[(&str, &str)]) -> Url {
        let mut url = self.base_url.clone();
        url.set_path(path);
        if !params.is_empty() {
            url.query_pairs_mut().extend_pairs(params);
        }
        url
    }

    /// Search characters by name on a world
    pub async fn search(
        &self,
        name: &str,
        world: &str,
    ) -> Result<Vec<SearchResult>, LodestoneError> {
        let world = title_case(world);
        let url = self.url(
            "/lodestone/character/",
            &[("q", name), ("worldname", &world)],
        );

        let document = self.fetcher.fetch(&url).await?;
        let results = parser::parse_search(&document.text());

        info!(
            "Search for '{}' on {} returned {} characters",
            name,
            world,
            results.len()
        );
        Ok(results)
    }

    /// Character profile, plus whatever `features` asks for
    ///
    /// Optional parts are fetched concurrently with the profile. A failure in
    /// any of them fails the whole lookup.
    pub async fn character(
        &self,
        id: u64,
        features: Features,
    ) -> Result<Character, LodestoneError> {
        let profile = async {
            let url = self.url(&format!("/lodestone/character/{}/", id), &[]);
            let document = self.fetcher.fetch(&url).await?;
            parser::parse_character(id, &document.text())
        };
        let achievements = async {
            if features.achievements {
                self.achievements(id).await.map(Some)
            } else {
                Ok(None)
            }
        };
        let class_jobs = async {
            if features.class_jobs {
                self.class_jobs(id).await.map(Some)
            } else {
                Ok(None)
            }
        };

        let (profile, achievements, class_jobs) =
            tokio::join!(profile, achievements, class_jobs);

        let mut character = profile?;
        character.achievements = achievements?;
        if let Some(jobs) = class_jobs? {
            character.class_jobs = jobs;
        }
        Ok(character)
    }

    /// Every achievement of a character, across all listing pages
    pub async fn achievements(&self, id: u64) -> Result<Vec<Achievement>, LodestoneError> {
        let listing = Arc::new(AchievementListing::new(self.base_url.clone(), id));
        let achievements = self.aggregator.fetch_all(listing).await?;
        debug!("Character {} has {} achievements", id, achievements.len());
        Ok(achievements)
    }

    /// Classes and jobs of a character
    pub async fn class_jobs(&self, id: u64) -> Result<Vec<parser::ClassJob>, LodestoneError> {
        let url = self.url(&format!("/lodestone/character/{}/class_job/", id), &[]);
        let document = self.fetcher.fetch(&url).await?;
        Ok(parser::parse_class_jobs(&document.text()))
    }
}
