//! LRC parsing.
//!
//! Accepts `[mm:ss]`, `[mm:ss.x]`, `[mm:ss.xx]` and `[mm:ss.xxx]` time tags
//! (a `:` before the fraction is tolerated too). A line may carry several time
//! tags, in which case it is emitted once per tag. ID tags such as `[ar:...]`
//! or `[ti:...]` are skipped.
//!
//! When no line carries a time tag the text is treated as plain lyrics and
//! returned line by line without timestamps.

use core_library::LyricLine;

/// Parse LRC or plain text into lyric lines.
///
/// Timed output is sorted by timestamp; lines with equal timestamps keep
/// their source order. Untagged lines inside timed lyrics are dropped.
pub fn parse_lrc(text: &str) -> Vec<LyricLine> {
    let mut timed = Vec::new();
    let mut plain = Vec::new();

    for raw in text.lines() {
        let line = raw.trim();
        if line.is_empty() {
            continue;
        }

        let (stamps, rest, saw_tag) = split_tags(line);
        if !stamps.is_empty() {
            let body = rest.trim();
            for ms in stamps {
                timed.push(LyricLine::timed(ms, body));
            }
        } else if !saw_tag {
            plain.push(LyricLine::plain(line));
        }
    }

    if timed.is_empty() {
        return plain;
    }

    timed.sort_by_key(|line| line.time_ms);
    timed
}

/// True when at least one line of `text` carries a time tag.
pub fn has_timestamps(text: &str) -> bool {
    text.lines()
        .any(|line| !split_tags(line.trim()).0.is_empty())
}

/// Lyrics text with every tag removed, one non-empty line per row.
pub fn strip_timestamps(text: &str) -> String {
    parse_lrc(text)
        .into_iter()
        .filter(|line| !line.text.is_empty())
        .map(|line| line.text)
        .collect::<Vec<_>>()
        .join("\n")
}

/// Format milliseconds as an LRC `[mm:ss.xx]` tag.
pub fn format_timestamp(ms: u64) -> String {
    let centis = ms / 10;
    format!("[{:02}:{:02}.{:02}]", centis / 6000, (centis / 100) % 60, centis % 100)
}

/// Split the leading bracket tags off a line.
///
/// Returns the parsed timestamps, the remaining text and whether any tag
/// (time or ID) was consumed.
fn split_tags(line: &str) -> (Vec<u64>, &str, bool) {
    let mut stamps = Vec::new();
    let mut rest = line;
    let mut saw_tag = false;

    while let Some(inner) = rest.strip_prefix('[') {
        let Some(end) = inner.find(']') else {
            break;
        };
        let tag = &inner[..end];

        if let Some(ms) = parse_timestamp(tag) {
            stamps.push(ms);
        } else if !is_id_tag(tag) {
            break;
        }

        saw_tag = true;
        rest = inner[end + 1..].trim_start();
    }

    (stamps, rest, saw_tag)
}

fn is_id_tag(tag: &str) -> bool {
    match tag.split_once(':') {
        Some((key, _)) => !key.is_empty() && key.chars().all(|c| c.is_ascii_alphabetic()),
        None => false,
    }
}

/// Parse `mm:ss`, `mm:ss.f{1,3}` or `mm:ss:f{1,3}` into milliseconds.
fn parse_timestamp(tag: &str) -> Option<u64> {
    let (minutes, rest) = tag.split_once(':')?;
    let minutes: u64 = digits(minutes)?;

    let (seconds, fraction) = match rest.find(&['.', ':'][..]) {
        Some(idx) => (&rest[..idx], Some(&rest[idx + 1..])),
        None => (rest, None),
    };
    let seconds: u64 = digits(seconds)?;
    if seconds >= 60 {
        return None;
    }

    let fraction_ms = match fraction {
        None => 0,
        Some(f) if (1..=3).contains(&f.len()) => {
            let value: u64 = digits(f)?;
            value * 10u64.pow(3 - f.len() as u32)
        }
        Some(_) => return None,
    };

    Some(minutes * 60_000 + seconds * 1_000 + fraction_ms)
}

fn digits(s: &str) -> Option<u64> {
    if s.is_empty() || !s.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    s.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_timestamp_variants() {
        assert_eq!(parse_timestamp("01:02"), Some(62_000));
        assert_eq!(parse_timestamp("01:02.5"), Some(62_500));
        assert_eq!(parse_timestamp("01:02.50"), Some(62_500));
        assert_eq!(parse_timestamp("01:02.505"), Some(62_505));
        assert_eq!(parse_timestamp("00:12:34"), Some(12_340));
        assert_eq!(parse_timestamp("00:75.00"), None);
        assert_eq!(parse_timestamp("ar:Someone"), None);
        assert_eq!(parse_timestamp("00:01.1234"), None);
    }

    #[test]
    fn test_parse_synced_sorts_and_expands_repeated_tags() {
        let text = "[ti:Song]\n[ar:Band]\n[00:20.00]second\n[00:05.10][00:30.00]chorus\n";
        let lines = parse_lrc(text);

        assert_eq!(
            lines,
            vec![
                LyricLine::timed(5_100, "chorus"),
                LyricLine::timed(20_000, "second"),
                LyricLine::timed(30_000, "chorus"),
            ]
        );
    }

    #[test]
    fn test_parse_keeps_empty_timed_lines() {
        let lines = parse_lrc("[00:01.00]hello\n[00:04.00]\n[00:06.00]again");
        assert_eq!(lines[1], LyricLine::timed(4_000, ""));
    }

    #[test]
    fn test_plain_fallback() {
        let lines = parse_lrc("first line\n\n  second line  \n");
        assert_eq!(
            lines,
            vec![LyricLine::plain("first line"), LyricLine::plain("second line")]
        );
        assert!(!has_timestamps("first line"));
    }

    #[test]
    fn test_bracketed_text_is_not_a_tag() {
        let lines = parse_lrc("[Chorus]\nla la la");
        assert_eq!(
            lines,
            vec![LyricLine::plain("[Chorus]"), LyricLine::plain("la la la")]
        );
    }

    #[test]
    fn test_strip_timestamps() {
        let text = "[length:03:20]\n[00:01.00]Hello there\n[00:02.00]\n[00:03.00]General";
        assert_eq!(strip_timestamps(text), "Hello there\nGeneral");
        assert!(has_timestamps(text));
    }

    #[test]
    fn test_format_timestamp() {
        assert_eq!(format_timestamp(62_500), "[01:02.50]");
        assert_eq!(format_timestamp(0), "[00:00.00]");
    }
}
