// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! HTML extraction for Lodestone pages
//!
//! Turns fetched documents into domain objects using CSS selectors. The
//! Lodestone markup is not an API, so every field is best effort: missing
//! optional fields come back empty rather than failing the whole parse.

use chrono::{DateTime, TimeZone, Utc};
use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use serde::{Deserialize, Serialize};
use std::sync::OnceLock;

use super::types::LodestoneError;

/// Grand company membership
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GrandCompany {
    pub name: String,
    pub rank: String,
}

/// Free company membership
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FreeCompany {
    pub id: String,
    pub name: String,
}

/// Progress of a character in a class or job
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClassJob {
    /// Empty for the active class on the profile page, which only shows its icon
    pub name: String,
    pub icon: String,
    pub level: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exp: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exp_next: Option<u64>,
}

/// An unlocked achievement
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Achievement {
    pub id: u64,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub obtained: Option<DateTime<Utc>>,
}

/// Character profile
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Character {
    pub parsed_at: DateTime<Utc>,
    pub id: u64,
    pub name: String,
    pub world: String,
    pub avatar: String,
    pub portrait: String,
    pub nameday: String,
    pub city: String,
    pub grand_company: GrandCompany,
    pub free_company: FreeCompany,
    pub class_jobs: Vec<ClassJob>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub achievements: Option<Vec<Achievement>>,
}

/// One hit of a character search
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchResult {
    pub id: u64,
    pub level: u32,
    pub avatar: String,
    pub lang: String,
    pub name: String,
    pub world: String,
}

/// Trailing numeric path segment, e.g. 31688528 in /lodestone/character/31688528/
fn url_id_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"/(\d+)/?$").unwrap())
}

fn page_param_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"[?&]page=(\d+)").unwrap())
}

fn achievement_name_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r#"achievement "(.+)" earned"#).unwrap())
}

/// Unix timestamp embedded in the script the Lodestone uses to print dates
fn achievement_time_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"ldst_strftime\((\d+), 'YMD'\)").unwrap())
}

fn select_first<'a>(root: ElementRef<'a>, css: &str) -> Option<ElementRef<'a>> {
    let selector = Selector::parse(css).ok()?;
    root.select(&selector).next()
}

fn first_text(root: ElementRef<'_>, css: &str) -> String {
    select_first(root, css)
        .map(|el| el.text().collect::<String>().trim().to_string())
        .unwrap_or_default()
}

fn first_attr(root: ElementRef<'_>, css: &str, attr: &str) -> String {
    select_first(root, css)
        .and_then(|el| el.value().attr(attr))
        .unwrap_or_default()
        .to_string()
}

fn id_from_url(href: &str) -> Option<u64> {
    url_id_regex()
        .captures(href)
        .and_then(|c| c.get(1))
        .and_then(|m| m.as_str().parse().ok())
}

/// Index of the last page from the `page=` parameter of the "last page" pager
/// button, `None` when the listing does not expose one
pub fn last_page(html: &str) -> Option<u32> {
    let document = Html::parse_document(html);
    let href = first_attr_opt(document.root_element(), ".btn__pager__next--all", "href")?;

    page_param_regex()
        .captures(&href)
        .and_then(|c| c.get(1))
        .and_then(|m| m.as_str().parse().ok())
}

fn first_attr_opt(root: ElementRef<'_>, css: &str, attr: &str) -> Option<String> {
    select_first(root, css)
        .and_then(|el| el.value().attr(attr))
        .map(str::to_string)
}

/// Parse one page of a character's achievement list
pub fn parse_achievements(html: &str) -> Vec<Achievement> {
    let document = Html::parse_document(html);
    let Ok(selector) = Selector::parse(".entry__achievement") else {
        return Vec::new();
    };

    // 50 achievements per page
    let mut achievements = Vec::with_capacity(50);
    for entry in document.select(&selector) {
        let Some(id) = entry.value().attr("href").and_then(id_from_url) else {
            continue;
        };

        let flavour = first_text(entry, ".entry__activity__txt");
        let name = achievement_name_regex()
            .captures(&flavour)
            .and_then(|c| c.get(1))
            .map(|m| m.as_str().to_string())
            .unwrap_or_default();

        let script = select_first(entry, "script")
            .map(|el| el.text().collect::<String>())
            .unwrap_or_default();
        let obtained = achievement_time_regex()
            .captures(&script)
            .and_then(|c| c.get(1))
            .and_then(|m| m.as_str().parse::<i64>().ok())
            .and_then(|ts| Utc.timestamp_opt(ts, 0).single());

        achievements.push(Achievement { id, name, obtained });
    }

    achievements
}

/// Parse a character search result page
pub fn parse_search(html: &str) -> Vec<SearchResult> {
    let document = Html::parse_document(html);
    let Ok(selector) = Selector::parse("a.entry__link") else {
        return Vec::new();
    };

    document
        .select(&selector)
        .filter_map(|entry| {
            let href = entry.value().attr("href")?;
            let id = href
                .trim_matches('/')
                .rsplit('/')
                .next()
                .and_then(|segment| segment.parse().ok())?;

            let avatar = first_attr_opt(entry, "img", "src")?;

            let level_text = select_first(entry, ".entry__chara_info")
                .map(|info| first_text(info, "span"))
                .unwrap_or_default();
            if level_text.is_empty() {
                return None;
            }

            Some(SearchResult {
                id,
                level: level_text.parse().unwrap_or(0),
                avatar,
                lang: first_text(entry, ".entry__chara__lang"),
                name: first_text(entry, "p.entry__name"),
                world: first_text(entry, "p.entry__world"),
            })
        })
        .collect()
}

/// Parse a character profile page
///
/// Achievements are left unset; they live on their own paginated listing.
pub fn parse_character(id: u64, html: &str) -> Result<Character, LodestoneError> {
    let document = Html::parse_document(html);
    let root = document.root_element();

    let name = first_text(root, ".frame__chara__name");
    if name.is_empty() {
        return Err(LodestoneError::Parse(format!(
            "character {} page has no name",
            id
        )));
    }

    let level_text = first_text(root, ".character__class__data > p");
    let active_class = ClassJob {
        icon: first_attr(root, ".character__class_icon > img", "src"),
        level: level_text
            .replace("LEVEL", "")
            .trim()
            .parse()
            .unwrap_or(0),
        ..ClassJob::default()
    };

    let details: Vec<ElementRef<'_>> = select_first(root, ".character__profile__data__detail")
        .map(|el| el.children().filter_map(ElementRef::wrap).collect())
        .unwrap_or_default();
    let detail_name = |index: usize| {
        details
            .get(index)
            .map(|el| first_text(*el, ".character-block__name"))
            .unwrap_or_default()
    };

    let grand_company = match detail_name(3).split_once(" / ") {
        Some((name, rank)) => GrandCompany {
            name: name.to_string(),
            rank: rank.to_string(),
        },
        None => GrandCompany::default(),
    };

    let free_company = select_first(root, ".character__freecompany__name a")
        .and_then(|link| {
            let href = link.value().attr("href")?;
            let id = url_id_regex().captures(href)?.get(1)?.as_str().to_string();
            Some(FreeCompany {
                id,
                name: link.text().collect::<String>().trim().to_string(),
            })
        })
        .unwrap_or_default();

    Ok(Character {
        parsed_at: Utc::now(),
        id,
        name,
        world: first_text(root, ".frame__chara__world"),
        avatar: first_attr(root, ".frame__chara__face > img", "src"),
        portrait: first_attr(root, ".character__detail__image > a > img", "src"),
        nameday: first_text(root, ".character-block__birth"),
        city: detail_name(2),
        grand_company,
        free_company,
        class_jobs: vec![active_class],
        achievements: None,
    })
}

/// Parse the class and job listing of a character
///
/// Levels shown as "-" (never unlocked) parse as 0, experience as "-- / --"
/// parses as `None`.
pub fn parse_class_jobs(html: &str) -> Vec<ClassJob> {
    let document = Html::parse_document(html);
    let Ok(selector) = Selector::parse(".character__job li") else {
        return Vec::new();
    };

    document
        .select(&selector)
        .filter_map(|entry| {
            let name = first_text(entry, ".character__job__name");
            if name.is_empty() {
                return None;
            }

            let exp = first_text(entry, ".character__job__exp");
            let (current, next) = exp.split_once('/').unwrap_or(("", ""));
            let parse_exp = |s: &str| s.trim().replace(',', "").parse::<u64>().ok();

            Some(ClassJob {
                name,
                icon: first_attr(entry, "img", "src"),
                level: first_text(entry, ".character__job__level").parse().unwrap_or(0),
                exp: parse_exp(current),
                exp_next: parse_exp(next),
            })
        })
        .collect()
}
