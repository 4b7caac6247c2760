// Content-bearing rules shared by pagination, context assembly and the scheduler

use parley_types::Message;

const MEDIA_REQUEST_MARKERS: [&str; 2] = ["<request img>", "<request media>"];
const MEDIA_TAG_PREFIX: &str = "[Media ID:";

/// True when the text is a media request or a media placeholder tag
pub fn is_media_control(content: &str) -> bool {
    let lowered = content.to_lowercase();
    MEDIA_REQUEST_MARKERS.iter().any(|marker| lowered.contains(marker))
        || content.contains(MEDIA_TAG_PREFIX)
}

/// True when the reply asks the client to send a piece of media
pub fn is_media_request(content: &str) -> bool {
    let lowered = content.to_lowercase();
    MEDIA_REQUEST_MARKERS.iter().any(|marker| lowered.contains(marker))
}

/// A message counts as conversation when it has text that is not media plumbing
pub fn is_content_bearing(message: &Message) -> bool {
    !message.content.trim().is_empty() && !is_media_control(&message.content)
}

pub fn media_tag(media_id: &str) -> String {
    format!("{} {}]", MEDIA_TAG_PREFIX, media_id)
}

/// Extract the id from a `[Media ID: x]` tag
pub fn parse_media_id(content: &str) -> Option<&str> {
    let start = content.find(MEDIA_TAG_PREFIX)? + MEDIA_TAG_PREFIX.len();
    let rest = &content[start..];
    let end = rest.find(']')?;
    let id = rest[..end].trim();
    (!id.is_empty()).then_some(id)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_content_bearing() {
        assert!(is_content_bearing(&Message::user("t", "hello")));
        assert!(!is_content_bearing(&Message::user("t", "   ")));
        assert!(!is_content_bearing(&Message::assistant_placeholder("t")));
        assert!(!is_content_bearing(&Message::assistant("t", "sure <request img>")));
        assert!(!is_content_bearing(&Message::assistant("t", "<REQUEST MEDIA>")));
        assert!(!is_content_bearing(&Message::assistant("t", "[Media ID: abc]")));
    }

    #[test]
    fn test_media_request_ignores_tags() {
        assert!(is_media_request("here <request img>"));
        assert!(!is_media_request("[Media ID: abc]"));
    }

    #[test]
    fn test_media_tag_round_trip() {
        let tag = media_tag("m-42");
        assert_eq!(tag, "[Media ID: m-42]");
        assert_eq!(parse_media_id(&tag), Some("m-42"));
        assert_eq!(parse_media_id("[Media ID: ]"), None);
        assert_eq!(parse_media_id("no tag"), None);
    }
}
