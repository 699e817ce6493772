//! Source B: the Wikidata image (P18) linked from a MusicBrainz entity.
//!
//! Three hops: MusicBrainz url-relations give the Wikidata item, the item's
//! P18 claim gives a Commons file name, and Commons serves a scaled
//! rendition of that file by name.

use async_trait::async_trait;
use mediaforge_common::{CanonicalItem, ItemType, Result};
use serde::Deserialize;
use serde_json::Value;
use tracing::debug;

use super::source::{encode_segment, ImageSource};
use crate::config::ProviderSettings;
use crate::fetch::{FetchClient, FetchOptions};
use crate::metadata::providers::musicbrainz;

pub const DEFAULT_BASE_URL: &str = "https://www.wikidata.org";
pub const COMMONS_FILE_PATH: &str = "https://commons.wikimedia.org/wiki/Special:FilePath";

/// Width requested from Commons.
const THUMB_WIDTH: u32 = 250;

/// Wikidata's "image" property.
const IMAGE_PROPERTY: &str = "P18";

#[derive(Debug, Deserialize)]
struct UrlRels {
    #[serde(default)]
    relations: Vec<UrlRel>,
}

#[derive(Debug, Deserialize)]
struct UrlRel {
    #[serde(rename = "type", default)]
    kind: String,
    #[serde(default)]
    url: Option<RelTarget>,
}

#[derive(Debug, Deserialize)]
struct RelTarget {
    resource: String,
}

/// The `Q…` id at the end of a Wikidata item URL.
pub fn wikidata_qid(resource: &str) -> Option<&str> {
    let qid = resource.trim_end_matches('/').rsplit('/').next()?;
    let valid = qid.len() > 1
        && qid.starts_with('Q')
        && qid[1..].bytes().all(|b| b.is_ascii_digit());
    valid.then_some(qid)
}

/// Commons thumbnail URL for a file name as stored in a P18 claim.
pub fn commons_thumbnail(file_name: &str) -> String {
    let normalized = file_name.trim().replace(' ', "_");
    format!(
        "{COMMONS_FILE_PATH}/{}?width={THUMB_WIDTH}",
        encode_segment(&normalized)
    )
}

/// First P18 file name of `qid` in an `EntityData` document.
fn image_claim<'a>(entity_data: &'a Value, qid: &str) -> Option<&'a str> {
    entity_data
        .get("entities")?
        .get(qid)?
        .get("claims")?
        .get(IMAGE_PROPERTY)?
        .as_array()?
        .iter()
        .find_map(|claim| claim.pointer("/mainsnak/datavalue/value")?.as_str())
        .filter(|name| !name.trim().is_empty())
}

pub struct WikidataSource {
    musicbrainz: FetchClient,
    wikidata: FetchClient,
    musicbrainz_url: String,
    wikidata_url: String,
}

impl WikidataSource {
    pub fn new(
        fetch: &FetchClient,
        musicbrainz: FetchClient,
        musicbrainz_settings: &ProviderSettings,
        settings: &ProviderSettings,
    ) -> Self {
        Self {
            musicbrainz,
            wikidata: settings.throttle(fetch, 0),
            musicbrainz_url: musicbrainz_settings.base_url_or(musicbrainz::DEFAULT_BASE_URL),
            wikidata_url: settings.base_url_or(DEFAULT_BASE_URL),
        }
    }

    async fn linked_qid(&self, item: &CanonicalItem) -> Result<Option<String>> {
        let entity = match item.item_type {
            ItemType::Album => "release-group",
            _ => "artist",
        };
        let url = format!(
            "{}/ws/2/{entity}/{}",
            self.musicbrainz_url,
            encode_segment(&item.external_id)
        );
        let opts = FetchOptions::new().query("inc", "url-rels").query("fmt", "json");
        let Some(rels) = self.musicbrainz.get_optional_json::<UrlRels>(&url, &opts).await? else {
            return Ok(None);
        };
        Ok(rels
            .relations
            .iter()
            .filter(|r| r.kind == "wikidata")
            .filter_map(|r| r.url.as_ref())
            .find_map(|t| wikidata_qid(&t.resource))
            .map(str::to_string))
    }
}

#[async_trait]
impl ImageSource for WikidataSource {
    fn name(&self) -> &'static str {
        "wikidata"
    }

    async fn lookup(&self, item: &CanonicalItem) -> Result<Option<String>> {
        let Some(qid) = self.linked_qid(item).await? else {
            debug!(id = %item.id, "No Wikidata relation");
            return Ok(None);
        };

        let url = format!("{}/wiki/Special:EntityData/{qid}.json", self.wikidata_url);
        let Some(doc) = self
            .wikidata
            .get_optional_json::<Value>(&url, &FetchOptions::new())
            .await?
        else {
            return Ok(None);
        };

        Ok(image_claim(&doc, &qid).map(commons_thumbnail))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn qid_from_item_url() {
        assert_eq!(wikidata_qid("https://www.wikidata.org/wiki/Q44190"), Some("Q44190"));
        assert_eq!(wikidata_qid("https://www.wikidata.org/wiki/Q44190/"), Some("Q44190"));
        assert_eq!(wikidata_qid("https://www.wikidata.org/wiki/Property:P18"), None);
        assert_eq!(wikidata_qid("Q"), None);
    }

    #[test]
    fn thumbnail_url_normalizes_file_name() {
        assert_eq!(
            commons_thumbnail("Radiohead live 2008.jpg"),
            "https://commons.wikimedia.org/wiki/Special:FilePath/Radiohead_live_2008.jpg?width=250"
        );
    }

    #[test]
    fn picks_first_non_empty_claim() {
        let doc = json!({
            "entities": {
                "Q44190": {
                    "claims": {
                        "P18": [
                            { "mainsnak": { "snaktype": "novalue" } },
                            { "mainsnak": { "datavalue": { "value": "Radiohead.jpg", "type": "string" } } }
                        ]
                    }
                }
            }
        });
        assert_eq!(image_claim(&doc, "Q44190"), Some("Radiohead.jpg"));
        assert_eq!(image_claim(&doc, "Q1"), None);
    }
}
