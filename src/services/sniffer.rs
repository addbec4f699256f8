//! Content sniffing
//!
//! Classifies raw documents by their leading bytes so the right parser can be
//! picked without trusting file extensions or `Content-Type` headers, which
//! IPTV publishers routinely get wrong.

use serde::Serialize;

const XSPF_NAMESPACE: &str = "http://xspf.org/ns/0/";
const VLC_NAMESPACE: &str = "http://www.videolan.org/vlc/playlist/ns/0/";

/// Playlist document formats
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PlaylistFormat {
    M3u,
    Xspf,
    Xml,
    Json,
    Unknown,
}

impl std::fmt::Display for PlaylistFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PlaylistFormat::M3u => write!(f, "m3u"),
            PlaylistFormat::Xspf => write!(f, "xspf"),
            PlaylistFormat::Xml => write!(f, "xml"),
            PlaylistFormat::Json => write!(f, "json"),
            PlaylistFormat::Unknown => write!(f, "unknown"),
        }
    }
}

/// Guide document formats
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EpgFormat {
    Xmltv,
    Json,
    Unknown,
}

impl std::fmt::Display for EpgFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EpgFormat::Xmltv => write!(f, "xmltv"),
            EpgFormat::Json => write!(f, "json"),
            EpgFormat::Unknown => write!(f, "unknown"),
        }
    }
}

/// Strip a UTF-8 BOM and leading whitespace
pub fn trim_leading(content: &str) -> &str {
    content.trim_start_matches('\u{feff}').trim_start()
}

/// Detect the playlist format. First matching rule wins.
pub fn detect_format(content: &str) -> PlaylistFormat {
    let head = trim_leading(content);

    if head.starts_with("#EXTM3U") {
        return PlaylistFormat::M3u;
    }

    if head.starts_with("<?xml")
        && head.contains("<playlist")
        && (head.contains(XSPF_NAMESPACE) || head.contains(VLC_NAMESPACE))
    {
        return PlaylistFormat::Xspf;
    }

    if head.starts_with("<?xml") || head.starts_with("<tv") {
        return PlaylistFormat::Xml;
    }

    if head.starts_with('{') || head.starts_with('[') {
        return PlaylistFormat::Json;
    }

    PlaylistFormat::Unknown
}

/// Detect the guide format
pub fn detect_epg_format(content: &str) -> EpgFormat {
    let head = trim_leading(content);

    if head.starts_with("<?xml") || head.starts_with("<tv") {
        EpgFormat::Xmltv
    } else if head.starts_with('{') || head.starts_with('[') {
        EpgFormat::Json
    } else {
        EpgFormat::Unknown
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detect_m3u() {
        assert_eq!(detect_format("#EXTM3U\n#EXTINF:-1,A\nhttp://a"), PlaylistFormat::M3u);
        assert_eq!(detect_format("\u{feff}  \n#EXTM3U"), PlaylistFormat::M3u);
    }

    #[test]
    fn test_detect_xspf_requires_namespace() {
        let xspf = r#"<?xml version="1.0" encoding="UTF-8"?>
<playlist xmlns="http://xspf.org/ns/0/" version="1"><trackList/></playlist>"#;
        assert_eq!(detect_format(xspf), PlaylistFormat::Xspf);

        let vlc = r#"<?xml version="1.0"?>
<playlist version="1" xmlns:vlc="http://www.videolan.org/vlc/playlist/ns/0/"></playlist>"#;
        assert_eq!(detect_format(vlc), PlaylistFormat::Xspf);

        // A <playlist> without either namespace falls through to plain XML
        let bare = r#"<?xml version="1.0"?><playlist></playlist>"#;
        assert_eq!(detect_format(bare), PlaylistFormat::Xml);
    }

    #[test]
    fn test_detect_xml() {
        assert_eq!(detect_format("<?xml version=\"1.0\"?><tv></tv>"), PlaylistFormat::Xml);
        assert_eq!(detect_format("<tv generator-info-name=\"x\">"), PlaylistFormat::Xml);
    }

    #[test]
    fn test_detect_json() {
        assert_eq!(detect_format("{\"channels\":[]}"), PlaylistFormat::Json);
        assert_eq!(detect_format("  [ ]"), PlaylistFormat::Json);
    }

    #[test]
    fn test_detect_unknown() {
        assert_eq!(detect_format(""), PlaylistFormat::Unknown);
        assert_eq!(detect_format("http://example.com/a.ts"), PlaylistFormat::Unknown);
        assert_eq!(detect_format("<html><body>404</body></html>"), PlaylistFormat::Unknown);
    }

    #[test]
    fn test_detect_epg_format() {
        assert_eq!(detect_epg_format("<?xml version=\"1.0\"?><tv/>"), EpgFormat::Xmltv);
        assert_eq!(detect_epg_format("{\"programs\":[]}"), EpgFormat::Json);
        assert_eq!(detect_epg_format("#EXTM3U"), EpgFormat::Unknown);
    }
}
