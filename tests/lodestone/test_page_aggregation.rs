// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1

//! Achievement aggregation end to end over HTTP

use lodestone_gateway::lodestone::{
    Features, FetchClient, Fetcher, LodestoneError, LodestoneService,
};
use std::sync::Arc;
use std::time::Duration;

use crate::common::{achievement_html, character_html, MockUpstream};

const PROFILE: &str = "/lodestone/character/7/";
const ACHIEVEMENTS: &str = "/lodestone/character/7/achievement/";

fn service(upstream: &MockUpstream, max_concurrent_pages: usize) -> LodestoneService {
    let client = FetchClient::new(Duration::from_secs(5)).unwrap();
    LodestoneService::new(
        upstream.base_url(),
        Arc::new(client) as Arc<dyn Fetcher>,
        max_concurrent_pages,
    )
}

fn page_target(page: u32) -> String {
    format!("{}?page={}", ACHIEVEMENTS, page)
}

#[tokio::test]
async fn test_three_pages_fetched_exactly_once() {
    let upstream = MockUpstream::start().await;
    upstream.serve(ACHIEVEMENTS, achievement_html(1, Some(3), 50));
    upstream.serve(&page_target(2), achievement_html(2, Some(3), 50));
    upstream.serve(&page_target(3), achievement_html(3, Some(3), 12));

    let achievements = service(&upstream, 8).achievements(7).await.unwrap();

    assert_eq!(achievements.len(), 112);
    assert_eq!(upstream.requests().len(), 3);
    assert_eq!(upstream.hits(ACHIEVEMENTS), 1);
    assert_eq!(upstream.hits(&page_target(2)), 1);
    assert_eq!(upstream.hits(&page_target(3)), 1);

    let mut ids: Vec<u64> = achievements.iter().map(|a| a.id).collect();
    ids.sort_unstable();
    ids.dedup();
    assert_eq!(ids.len(), 112);
}

#[tokio::test]
async fn test_many_pages_with_narrow_fan_out() {
    let upstream = MockUpstream::start().await;
    upstream.serve(ACHIEVEMENTS, achievement_html(1, Some(10), 5));
    for page in 2..=10 {
        upstream.serve(&page_target(page), achievement_html(page, Some(10), 5));
    }

    let achievements = service(&upstream, 2).achievements(7).await.unwrap();

    assert_eq!(achievements.len(), 50);
    assert_eq!(upstream.requests().len(), 10);
}

#[tokio::test]
async fn test_private_listing_stops_after_first_page() {
    let upstream = MockUpstream::start().await;
    upstream.serve(ACHIEVEMENTS, achievement_html(1, None, 0));
    upstream.serve(&page_target(2), achievement_html(2, Some(2), 5));

    let err = service(&upstream, 8).achievements(7).await.unwrap_err();

    assert!(matches!(err, LodestoneError::NotPublic { .. }), "{:?}", err);
    assert_eq!(upstream.requests().len(), 1);
}

#[tokio::test]
async fn test_missing_page_fails_whole_aggregation() {
    let upstream = MockUpstream::start().await;
    upstream.serve(ACHIEVEMENTS, achievement_html(1, Some(3), 5));
    upstream.serve(&page_target(2), achievement_html(2, Some(3), 5));
    // Page 3 is not scripted and answers 404

    let err = service(&upstream, 8).achievements(7).await.unwrap_err();

    assert_eq!(err, LodestoneError::Status(404));
}

#[tokio::test]
async fn test_character_with_achievements() {
    let upstream = MockUpstream::start().await;
    upstream.serve(
        PROFILE,
        character_html("Roo Bre", "https://img.example/face.jpg"),
    );
    upstream.serve(ACHIEVEMENTS, achievement_html(1, Some(2), 3));
    upstream.serve(&page_target(2), achievement_html(2, Some(2), 3));

    let character = service(&upstream, 8)
        .character(
            7,
            Features {
                achievements: true,
                class_jobs: false,
            },
        )
        .await
        .unwrap();

    assert_eq!(character.name, "Roo Bre");
    assert_eq!(character.avatar, "https://img.example/face.jpg");
    assert_eq!(character.grand_company.name, "Maelstrom");
    assert_eq!(character.achievements.map(|a| a.len()), Some(6));
    assert_eq!(upstream.requests().len(), 3);
}

#[tokio::test]
async fn test_pager_without_page_parameter_is_not_public() {
    let upstream = MockUpstream::start().await;
    upstream.serve(
        ACHIEVEMENTS,
        r#"<html><body><a href="/lodestone/character/31688528/achievement/" class="btn__pager__next--all"></a></body></html>"#,
    );

    let err = service(&upstream, 8).achievements(7).await.unwrap_err();

    assert!(matches!(err, LodestoneError::NotPublic { .. }), "{:?}", err);
    assert_eq!(upstream.requests().len(), 1);
}
