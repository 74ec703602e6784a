//! Stream selection for the engine-backed backends.

use crate::model::{ContainerFormat, Resolution, Stream, StreamKind};

/// Whether the engine can play `stream` at all.
///
/// HLS and progressive streams always qualify; adaptive streams only in MP4
/// containers.
pub fn can_play(stream: &Stream) -> bool {
    match stream.kind {
        StreamKind::Hls | StreamKind::Stream => true,
        StreamKind::Adaptive => stream.format == ContainerFormat::Mp4,
    }
}

/// Picks the stream to play from `streams`.
///
/// HLS wins outright. Otherwise the highest progressive stream within
/// `max_resolution`, then the highest adaptive one.
pub fn best_playable(streams: &[Stream], max_resolution: Resolution) -> Option<&Stream> {
    if let Some(hls) = streams.iter().find(|s| s.kind == StreamKind::Hls) {
        return Some(hls);
    }

    let mut candidates: Vec<&Stream> = streams
        .iter()
        .filter(|s| matches!(s.kind, StreamKind::Adaptive | StreamKind::Stream))
        .filter(|s| s.resolution <= max_resolution)
        .collect();
    candidates.sort_by(|a, b| b.resolution.cmp(&a.resolution));

    candidates
        .iter()
        .find(|s| s.kind == StreamKind::Stream)
        .or_else(|| candidates.first())
        .copied()
}

#[cfg(test)]
mod tests {
    use super::*;
    use url::Url;

    fn url(path: &str) -> Url {
        Url::parse(&format!("https://cdn.example.com/{}", path)).unwrap()
    }

    fn progressive(height: u32) -> Stream {
        Stream::single(
            StreamKind::Stream,
            Resolution(height),
            ContainerFormat::Mp4,
            url(&format!("{}.mp4", height)),
        )
    }

    fn adaptive(height: u32, format: ContainerFormat) -> Stream {
        Stream::separate(
            Resolution(height),
            format,
            url("audio.m4a"),
            url(&format!("{}.mp4", height)),
        )
    }

    #[test]
    fn adaptive_requires_mp4() {
        assert!(can_play(&adaptive(1080, ContainerFormat::Mp4)));
        assert!(!can_play(&adaptive(1080, ContainerFormat::Webm)));
        assert!(can_play(&progressive(360)));
        assert!(can_play(&Stream::hls(url("master.m3u8"))));
    }

    #[test]
    fn hls_is_preferred() {
        let streams = vec![progressive(720), Stream::hls(url("master.m3u8"))];
        let best = best_playable(&streams, Resolution(1080)).unwrap();
        assert_eq!(best.kind, StreamKind::Hls);
    }

    #[test]
    fn progressive_beats_higher_adaptive() {
        let streams = vec![
            adaptive(1080, ContainerFormat::Mp4),
            progressive(360),
            progressive(720),
        ];
        let best = best_playable(&streams, Resolution(1080)).unwrap();
        assert_eq!(best, &streams[2]);
    }

    #[test]
    fn falls_back_to_best_adaptive_within_limit() {
        let streams = vec![
            adaptive(2160, ContainerFormat::Mp4),
            adaptive(1080, ContainerFormat::Mp4),
            adaptive(480, ContainerFormat::Mp4),
        ];
        let best = best_playable(&streams, Resolution(1080)).unwrap();
        assert_eq!(best.resolution, Resolution(1080));
        assert!(best_playable(&streams, Resolution(240)).is_none());
    }
}
