//! The [`ImageSource`] seam of the waterfall.

use async_trait::async_trait;
use mediaforge_common::{CanonicalItem, ItemType, Result};

use crate::metadata::providers::musicbrainz;

/// One stage of the image waterfall.
///
/// `lookup` answers `Ok(None)` for a miss (404, empty listing, no usable
/// field). Errors are reported but the waterfall treats them as misses too.
#[async_trait]
pub trait ImageSource: Send + Sync {
    fn name(&self) -> &'static str;

    /// Whether this source can say anything about `item`.
    fn applies_to(&self, item: &CanonicalItem) -> bool {
        is_musicbrainz_entity(item)
    }

    async fn lookup(&self, item: &CanonicalItem) -> Result<Option<String>>;
}

/// MusicBrainz artists and release groups, the entities every bundled
/// source is keyed by.
pub fn is_musicbrainz_entity(item: &CanonicalItem) -> bool {
    item.provider_id == musicbrainz::PROVIDER_ID
        && matches!(item.item_type, ItemType::Artist | ItemType::Album)
}

/// Percent-encode one URL path segment.
pub(crate) fn encode_segment(s: &str) -> String {
    const HEX: [u8; 16] = *b"0123456789ABCDEF";
    let mut out = String::with_capacity(s.len());
    for b in s.bytes() {
        match b {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => {
                out.push(b as char);
            }
            _ => {
                out.push('%');
                out.push(char::from(HEX[(b >> 4) as usize]));
                out.push(char::from(HEX[(b & 0x0f) as usize]));
            }
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_musicbrainz_artists_and_albums_apply() {
        let artist = CanonicalItem::new("musicbrainz", ItemType::Artist, "a", "A");
        let track = CanonicalItem::new("musicbrainz", ItemType::Track, "t", "T");
        let movie = CanonicalItem::new("tmdb", ItemType::Movie, "1", "M");
        assert!(is_musicbrainz_entity(&artist));
        assert!(!is_musicbrainz_entity(&track));
        assert!(!is_musicbrainz_entity(&movie));
    }

    #[test]
    fn segment_encoding() {
        assert_eq!(encode_segment("Radiohead_2008.jpg"), "Radiohead_2008.jpg");
        assert_eq!(encode_segment("Björk (1).jpg"), "Bj%C3%B6rk%20%281%29.jpg");
    }
}
