//! Integration tests for the artwork waterfall.

mod common;

use std::time::{Duration, Instant};

use common::TestHarness;
use mediaforge_common::{CanonicalItem, Category, ItemType, SearchQuery};
use serde_json::json;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, ResponseTemplate};

const RADIOHEAD: &str = "a74b1b7f-71a5-4011-9441-d0b5e4122711";
const OK_COMPUTER: &str = "b1392450-e666-3926-a536-22c65f834433";

fn artist() -> CanonicalItem {
    CanonicalItem::new("musicbrainz", ItemType::Artist, RADIOHEAD, "Radiohead")
}

fn album() -> CanonicalItem {
    CanonicalItem::new("musicbrainz", ItemType::Album, OK_COMPUTER, "OK Computer")
}

fn fanart_thumb() -> serde_json::Value {
    json!({
        "name": "Radiohead",
        "artistthumb": [
            {"url": "https://assets.fanart.tv/fanart/music/a74b/artistthumb/old.jpg", "likes": "1"},
            {"url": "https://assets.fanart.tv/fanart/music/a74b/artistthumb/best.jpg", "likes": "9"}
        ]
    })
}

#[tokio::test]
async fn fanart_hit_skips_later_sources() {
    let h = TestHarness::new().await;
    Mock::given(method("GET"))
        .and(path(format!("/music/{RADIOHEAD}")))
        .and(query_param("api_key", "fanart-key"))
        .respond_with(ResponseTemplate::new(200).set_body_json(fanart_thumb()))
        .expect(1)
        .mount(&h.server)
        .await;
    Mock::given(method("GET"))
        .and(path(format!("/ws/2/artist/{RADIOHEAD}")))
        .respond_with(ResponseTemplate::new(500))
        .expect(0)
        .mount(&h.server)
        .await;

    let waterfall = h.engine.waterfall().unwrap();
    assert_eq!(
        waterfall.resolve(&artist()).await.as_deref(),
        Some("https://assets.fanart.tv/preview/music/a74b/artistthumb/best.jpg")
    );
}

#[tokio::test]
async fn wikidata_image_is_used_when_fanart_misses() {
    let h = TestHarness::new().await;
    Mock::given(method("GET"))
        .and(path(format!("/music/{RADIOHEAD}")))
        .respond_with(ResponseTemplate::new(404))
        .expect(1)
        .mount(&h.server)
        .await;
    Mock::given(method("GET"))
        .and(path(format!("/ws/2/artist/{RADIOHEAD}")))
        .and(query_param("inc", "url-rels"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": RADIOHEAD,
            "relations": [
                {"type": "official homepage", "url": {"resource": "https://radiohead.com"}},
                {"type": "wikidata", "url": {"resource": "https://www.wikidata.org/wiki/Q44190"}}
            ]
        })))
        .expect(1)
        .mount(&h.server)
        .await;
    Mock::given(method("GET"))
        .and(path("/wiki/Special:EntityData/Q44190.json"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "entities": {"Q44190": {"claims": {"P18": [
                {"mainsnak": {"datavalue": {"value": "Radiohead live 2008.jpg", "type": "string"}}}
            ]}}}
        })))
        .expect(1)
        .mount(&h.server)
        .await;

    let waterfall = h.engine.waterfall().unwrap();
    assert_eq!(
        waterfall.resolve(&artist()).await.as_deref(),
        Some("https://commons.wikimedia.org/wiki/Special:FilePath/Radiohead_live_2008.jpg?width=250")
    );
}

#[tokio::test]
async fn cover_art_falls_back_to_first_release() {
    let h = TestHarness::new().await;
    Mock::given(method("GET"))
        .and(path(format!("/ws/2/release-group/{OK_COMPUTER}")))
        .and(query_param("inc", "url-rels"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"relations": []})))
        .mount(&h.server)
        .await;
    Mock::given(method("GET"))
        .and(path(format!("/release-group/{OK_COMPUTER}")))
        .respond_with(ResponseTemplate::new(404))
        .expect(1)
        .mount(&h.server)
        .await;
    Mock::given(method("GET"))
        .and(path(format!("/ws/2/release-group/{OK_COMPUTER}")))
        .and(query_param("inc", "releases"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "releases": [{"id": "r-first"}, {"id": "r-second"}]
        })))
        .expect(1)
        .mount(&h.server)
        .await;
    Mock::given(method("GET"))
        .and(path("/release/r-first"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "images": [{"front": true, "image": "http://x/full.jpg"}]
        })))
        .expect(1)
        .mount(&h.server)
        .await;

    let waterfall = h.engine.waterfall().unwrap();
    let url = waterfall.resolve(&album()).await.unwrap();
    assert_eq!(url, format!("{}/release/r-first/front-250", h.server.uri()));
}

#[tokio::test]
async fn every_miss_yields_none() {
    // nothing mounted: every request is a 404
    let h = TestHarness::new().await;
    let waterfall = h.engine.waterfall().unwrap();
    assert_eq!(waterfall.resolve(&album()).await, None);
    assert_eq!(waterfall.resolve(&artist()).await, None);
}

#[tokio::test]
async fn search_results_are_enriched_in_the_background() {
    let h = TestHarness::new().await;
    Mock::given(method("GET"))
        .and(path("/ws/2/artist"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "count": 1,
            "artists": [{"id": RADIOHEAD, "name": "Radiohead", "type": "Group", "country": "GB"}]
        })))
        .expect(2)
        .mount(&h.server)
        .await;
    Mock::given(method("GET"))
        .and(path(format!("/music/{RADIOHEAD}")))
        .respond_with(ResponseTemplate::new(200).set_body_json(fanart_thumb()))
        .expect(1)
        .mount(&h.server)
        .await;

    let query = SearchQuery::new(ItemType::Artist, "radiohead");
    let first = h.engine.search(Category::Music, None, &query).await.unwrap();
    assert!(first.items[0].lacks_image());

    h.engine.waterfall().unwrap().flush().await;

    let expected = "https://assets.fanart.tv/preview/music/a74b/artistthumb/best.jpg";
    let registered = h.engine.registry().get_item(&first.items[0].id).unwrap();
    assert_eq!(registered.image_url.as_deref(), Some(expected));
    assert_eq!(registered.subtitle.as_deref(), Some("Group · GB"));

    let second = h.engine.search(Category::Music, None, &query).await.unwrap();
    assert_eq!(second.items[0].image_url.as_deref(), Some(expected));
}

#[tokio::test]
async fn resolve_image_for_an_unseen_id() {
    let h = TestHarness::new().await;
    Mock::given(method("GET"))
        .and(path(format!("/music/{RADIOHEAD}")))
        .respond_with(ResponseTemplate::new(200).set_body_json(fanart_thumb()))
        .mount(&h.server)
        .await;

    let url = h.engine.resolve_image(&artist().id).await.unwrap();
    assert!(url.unwrap().ends_with("/best.jpg"));
    assert!(h.engine.registry().get_item(&artist().id).is_some());
}

#[tokio::test]
async fn musicbrainz_budget_is_shared_with_image_sources() {
    let h = TestHarness::with_config(|c| c.providers.musicbrainz.rate_limit_per_second = Some(1)).await;
    Mock::given(method("GET"))
        .and(path("/ws/2/recording"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "count": 1,
            "recordings": [{"id": "rec1", "title": "Airbag"}]
        })))
        .expect(1)
        .mount(&h.server)
        .await;
    Mock::given(method("GET"))
        .and(path(format!("/ws/2/release-group/{OK_COMPUTER}")))
        .and(query_param("inc", "url-rels"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"relations": []})))
        .expect(1)
        .mount(&h.server)
        .await;
    Mock::given(method("GET"))
        .and(path(format!("/release-group/{OK_COMPUTER}")))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"images": [{"front": true}]})))
        .mount(&h.server)
        .await;

    let start = Instant::now();
    h.engine
        .search(Category::Music, None, &SearchQuery::new(ItemType::Track, "airbag"))
        .await
        .unwrap();
    let url = h.engine.resolve_image(&album().id).await.unwrap();

    assert!(url.unwrap().ends_with("/front-250"));
    // second MusicBrainz request waits for the next one-second slot
    assert!(start.elapsed() >= Duration::from_millis(900), "elapsed {:?}", start.elapsed());
}
